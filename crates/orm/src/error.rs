//! Error types for the ORM system
//!
//! Provides error handling for storage round-trips, model state violations,
//! relationship resolution and query building.

use thiserror::Error;

use crate::config::ConfigError;
use crate::hook_error::HookError;

/// Result type alias for model operations
pub type ModelResult<T> = Result<T, ModelError>;

/// ORM error type alias
pub type OrmError = ModelError;

/// ORM result type alias
pub type OrmResult<T> = ModelResult<T>;

/// Error types for ORM operations
#[derive(Debug, Clone, Error)]
pub enum ModelError {
    /// A strict finder matched no row
    #[error("E_ROW_NOT_FOUND: no {model} row matches {lookup}")]
    RecordNotFound { model: String, lookup: String },

    /// Mutation attempted on a deleted instance
    #[error("cannot modify deleted {model} instance (field '{field}')")]
    FrozenInstance { model: String, field: String },

    /// Attempt to change the primary key of a persisted instance
    #[error("primary key '{field}' of a persisted {model} instance cannot change")]
    ImmutablePrimaryKey { model: String, field: String },

    /// Primary key is missing where one is required
    #[error("{0} instance has no primary key value")]
    MissingPrimaryKey(String),

    /// Error reported by the storage backend, passed through verbatim
    #[error("Database error: {0}")]
    Database(String),

    /// Connection pool or connection lookup error
    #[error("Connection error: {0}")]
    Connection(String),

    /// Transaction lifecycle error
    #[error("Transaction error: {0}")]
    Transaction(String),

    /// Query building or execution misuse
    #[error("Query error: {0}")]
    Query(String),

    /// Relationship declaration or resolution error
    #[error("Relationship error: {0}")]
    Relationship(String),

    /// Model name not present in the registry
    #[error("model '{0}' is not registered")]
    UnknownModel(String),

    /// Serialization/deserialization error
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// A lifecycle hook aborted the operation
    #[error("Hook error: {0}")]
    Hook(#[from] HookError),
}

impl ModelError {
    pub fn not_found(model: &str, lookup: impl Into<String>) -> Self {
        ModelError::RecordNotFound {
            model: model.to_string(),
            lookup: lookup.into(),
        }
    }

    /// Check if this error is a `RecordNotFound`
    pub fn is_not_found(&self) -> bool {
        matches!(self, ModelError::RecordNotFound { .. })
    }

    /// Check if this error is a `FrozenInstance`
    pub fn is_frozen(&self) -> bool {
        matches!(self, ModelError::FrozenInstance { .. })
    }
}

// Convert from sqlx errors
impl From<sqlx::Error> for ModelError {
    fn from(err: sqlx::Error) -> Self {
        ModelError::Database(err.to_string())
    }
}

// Convert from serde_json errors
impl From<serde_json::Error> for ModelError {
    fn from(err: serde_json::Error) -> Self {
        ModelError::Serialization(err.to_string())
    }
}

// Convert from anyhow errors
impl From<anyhow::Error> for ModelError {
    fn from(err: anyhow::Error) -> Self {
        ModelError::Database(err.to_string())
    }
}

impl From<ConfigError> for ModelError {
    fn from(err: ConfigError) -> Self {
        ModelError::Configuration(err.to_string())
    }
}

/// Error types for query builder operations
#[derive(Debug, Clone, Error)]
pub enum QueryError {
    /// Missing required parts of a statement
    #[error("Missing fields: {0}")]
    MissingFields(String),
    /// Invalid parameter binding
    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),
    /// Unsupported operation
    #[error("Unsupported operation: {0}")]
    UnsupportedOperation(String),
}

impl From<QueryError> for ModelError {
    fn from(err: QueryError) -> Self {
        ModelError::Query(err.to_string())
    }
}
