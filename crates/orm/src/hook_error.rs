use std::fmt;

/// Error raised by a lifecycle hook. Returning one aborts the surrounding
/// save/delete and surfaces through `ModelError::Hook`.
#[derive(Debug, Clone)]
pub enum HookError {
    Validation {
        message: String,
        hint: Option<String>,
    },
    Aborted {
        reason: String,
    },
    Failed {
        message: String,
    },
}

impl HookError {
    pub fn validation(message: &str) -> Self {
        Self::Validation {
            message: message.to_string(),
            hint: None,
        }
    }

    pub fn validation_with_hint(message: &str, hint: &str) -> Self {
        Self::Validation {
            message: message.to_string(),
            hint: Some(hint.to_string()),
        }
    }

    pub fn aborted(reason: &str) -> Self {
        Self::Aborted {
            reason: reason.to_string(),
        }
    }

    pub fn failed(message: &str) -> Self {
        Self::Failed {
            message: message.to_string(),
        }
    }
}

impl fmt::Display for HookError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HookError::Validation { message, hint } => {
                write!(f, "Validation error: {}", message)?;
                if let Some(hint) = hint {
                    write!(f, " (hint: {})", hint)?;
                }
                Ok(())
            }
            HookError::Aborted { reason } => write!(f, "Operation aborted: {}", reason),
            HookError::Failed { message } => write!(f, "Hook failed: {}", message),
        }
    }
}

impl std::error::Error for HookError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validation_with_hint_display() {
        let err = HookError::validation_with_hint("username taken", "pick another");
        assert_eq!(
            err.to_string(),
            "Validation error: username taken (hint: pick another)"
        );
    }

    #[test]
    fn test_aborted_display() {
        assert_eq!(
            HookError::aborted("read only").to_string(),
            "Operation aborted: read only"
        );
    }
}
