//! Model handle - the static side of a model
//!
//! A `ModelHandle` is what `Database::model` hands out: the booted
//! definition plus the database, optionally pinned to a transaction.

use std::fmt;
use std::sync::Arc;

use crate::database::Database;
use crate::model::{ModelDefinition, ModelInstance};
use crate::query::ModelQuery;
use crate::transaction::Transaction;

#[derive(Clone)]
pub struct ModelHandle {
    pub(crate) definition: Arc<ModelDefinition>,
    pub(crate) db: Database,
    pub(crate) transaction: Option<Transaction>,
}

impl fmt::Debug for ModelHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ModelHandle")
            .field("model", &self.definition.name())
            .field("table", &self.definition.table_name())
            .field("transaction", &self.transaction.as_ref().map(|trx| trx.id()))
            .finish()
    }
}

impl ModelHandle {
    pub(crate) fn new(definition: Arc<ModelDefinition>, db: Database) -> Self {
        Self {
            definition,
            db,
            transaction: None,
        }
    }

    /// Same model, with every query and new instance bound to `trx`
    pub fn using(&self, trx: &Transaction) -> Self {
        Self {
            definition: self.definition.clone(),
            db: self.db.clone(),
            transaction: Some(trx.clone()),
        }
    }

    pub fn query(&self) -> ModelQuery {
        ModelQuery::new(self.definition.clone(), self.db.clone(), self.transaction.clone())
    }

    /// Empty, unsaved instance
    pub fn new_instance(&self) -> ModelInstance {
        ModelInstance::new(self.definition.clone(), self.db.clone(), self.transaction.clone())
    }

    pub fn definition(&self) -> &Arc<ModelDefinition> {
        &self.definition
    }

    pub fn name(&self) -> &str {
        self.definition.name()
    }

    pub fn table(&self) -> &str {
        self.definition.table_name()
    }

    pub fn transaction(&self) -> Option<&Transaction> {
        self.transaction.as_ref()
    }
}
