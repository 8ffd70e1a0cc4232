//! Model registry - definitions looked up by name, booted once

use std::sync::Arc;

use dashmap::DashMap;
use once_cell::sync::OnceCell;
use tracing::debug;

use crate::error::{ModelError, ModelResult};
use crate::model::ModelDefinition;

struct RegistryEntry {
    definition: ModelDefinition,
    booted: OnceCell<Arc<ModelDefinition>>,
}

impl RegistryEntry {
    fn boot(&self) -> Arc<ModelDefinition> {
        self.booted
            .get_or_init(|| {
                let mut definition = self.definition.clone();
                let callbacks = definition.take_boot_callbacks();
                for callback in &callbacks {
                    callback(&mut definition);
                }
                debug!(model = %definition.name(), callbacks = callbacks.len(), "model booted");
                Arc::new(definition)
            })
            .clone()
    }
}

/// Name-keyed model definitions
#[derive(Default)]
pub struct ModelRegistry {
    entries: DashMap<String, Arc<RegistryEntry>>,
}

impl ModelRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register or replace a definition
    pub fn register(&self, definition: ModelDefinition) {
        let name = definition.name().to_string();
        debug!(model = %name, table = %definition.table_name(), "registering model");
        self.entries.insert(
            name,
            Arc::new(RegistryEntry {
                definition,
                booted: OnceCell::new(),
            }),
        );
    }

    pub fn contains(&self, name: &str) -> bool {
        self.entries.contains_key(name)
    }

    pub fn is_booted(&self, name: &str) -> bool {
        self.entries
            .get(name)
            .map(|entry| entry.booted.get().is_some())
            .unwrap_or(false)
    }

    /// Booted definition; boot callbacks run on the first call only
    pub fn boot(&self, name: &str) -> ModelResult<Arc<ModelDefinition>> {
        let entry = self
            .entries
            .get(name)
            .map(|entry| entry.value().clone())
            .ok_or_else(|| ModelError::UnknownModel(name.to_string()))?;
        Ok(entry.boot())
    }

    pub fn names(&self) -> Vec<String> {
        self.entries.iter().map(|entry| entry.key().clone()).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn test_boot_runs_once() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = calls.clone();
        let registry = ModelRegistry::new();
        registry.register(ModelDefinition::new("User").on_boot(move |definition| {
            counter.fetch_add(1, Ordering::SeqCst);
            definition.add_date("dob");
        }));

        assert!(!registry.is_booted("User"));
        let first = registry.boot("User").unwrap();
        let second = registry.boot("User").unwrap();

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(registry.is_booted("User"));
        assert!(first.is_date_field("dob"));
        assert!(Arc::ptr_eq(&first, &second));
    }

    #[test]
    fn test_unknown_model() {
        let registry = ModelRegistry::new();
        let err = registry.boot("Ghost").unwrap_err();
        assert!(matches!(err, ModelError::UnknownModel(name) if name == "Ghost"));
    }

    #[test]
    fn test_register_replaces_entry() {
        let registry = ModelRegistry::new();
        registry.register(ModelDefinition::new("User"));
        registry.register(ModelDefinition::new("User").table("accounts"));
        assert_eq!(registry.boot("User").unwrap().table_name(), "accounts");
        assert_eq!(registry.names(), vec!["User".to_string()]);
    }
}
