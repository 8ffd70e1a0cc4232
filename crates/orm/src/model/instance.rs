//! Model instance - one row's live representation

use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;

use crate::collection::ModelCollection;
use crate::database::{Database, QueryClient};
use crate::error::{ModelError, ModelResult};
use crate::model::attributes::{object_entries, parse_datetime, Attributes, STORAGE_DATE_FORMAT};
use crate::model::ModelDefinition;
use crate::transaction::Transaction;

/// Persistence state of an instance
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InstanceState {
    /// Not yet inserted
    New,
    /// Backed by a stored row
    Persisted,
    /// Deleted: readable, not writable
    Frozen,
}

/// A loaded relation
#[derive(Debug, Clone)]
pub enum RelationValue {
    One(Option<Box<ModelInstance>>),
    Many(ModelCollection),
}

impl RelationValue {
    pub fn as_one(&self) -> Option<&ModelInstance> {
        match self {
            RelationValue::One(instance) => instance.as_deref(),
            RelationValue::Many(_) => None,
        }
    }

    pub fn as_many(&self) -> &[ModelInstance] {
        match self {
            RelationValue::One(_) => &[],
            RelationValue::Many(collection) => collection.as_slice(),
        }
    }

    pub fn len(&self) -> usize {
        match self {
            RelationValue::One(instance) => usize::from(instance.is_some()),
            RelationValue::Many(collection) => collection.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[derive(Clone)]
pub struct ModelInstance {
    pub(crate) definition: Arc<ModelDefinition>,
    pub(crate) db: Database,
    pub(crate) attributes: Attributes,
    pub(crate) state: InstanceState,
    pub(crate) relations: IndexMap<String, RelationValue>,
    pub(crate) extras: IndexMap<String, Value>,
    pub(crate) transaction: Option<Transaction>,
}

impl fmt::Debug for ModelInstance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ModelInstance")
            .field("model", &self.definition.name())
            .field("state", &self.state)
            .field("attributes", self.attributes.values())
            .field("relations", &self.relations)
            .field("extras", &self.extras)
            .finish()
    }
}

impl ModelInstance {
    pub(crate) fn new(definition: Arc<ModelDefinition>, db: Database, transaction: Option<Transaction>) -> Self {
        Self {
            definition,
            db,
            attributes: Attributes::new(),
            state: InstanceState::New,
            relations: IndexMap::new(),
            extras: IndexMap::new(),
            transaction,
        }
    }

    /// Build a persisted instance from a fetched row. Columns named in
    /// `extra_columns` go to the extras instead of the attributes.
    pub(crate) fn hydrate(
        definition: Arc<ModelDefinition>,
        db: Database,
        transaction: Option<Transaction>,
        row: IndexMap<String, Value>,
        extra_columns: &[String],
    ) -> Self {
        let mut instance = Self::new(definition, db, transaction);
        for (column, value) in row {
            if extra_columns.iter().any(|c| *c == column) {
                instance.extras.insert(column, value);
            } else {
                let value = instance.normalize_stored(&column, value);
                instance.attributes.set(&column, value);
            }
        }
        instance.attributes.sync_original();
        instance.state = InstanceState::Persisted;
        instance
    }

    /// Storage values of date fields are normalised the same way writes
    /// are, so a fetched row starts clean.
    pub(crate) fn normalize_stored(&self, field: &str, value: Value) -> Value {
        if self.definition.is_date_field(field) {
            self.definition
                .date_adapter_ref()
                .format_date(field, &value)
                .unwrap_or(value)
        } else {
            value
        }
    }

    pub fn model_name(&self) -> &str {
        self.definition.name()
    }

    pub fn definition(&self) -> &Arc<ModelDefinition> {
        &self.definition
    }

    pub fn database(&self) -> &Database {
        &self.db
    }

    pub fn state(&self) -> InstanceState {
        self.state
    }

    pub fn is_new(&self) -> bool {
        self.state == InstanceState::New
    }

    pub fn is_persisted(&self) -> bool {
        self.state == InstanceState::Persisted
    }

    pub fn is_deleted(&self) -> bool {
        self.state == InstanceState::Frozen
    }

    // Attribute access

    /// Value of a field; absent fields read as `Null`
    pub fn get(&self, field: &str) -> &Value {
        self.attributes.get(field)
    }

    /// Field deserialized into `T`
    pub fn get_as<T: DeserializeOwned>(&self, field: &str) -> ModelResult<T> {
        Ok(serde_json::from_value(self.get(field).clone())?)
    }

    pub fn attributes(&self) -> &IndexMap<String, Value> {
        self.attributes.values()
    }

    pub fn original(&self) -> &IndexMap<String, Value> {
        self.attributes.original()
    }

    pub fn primary_key(&self) -> &Value {
        self.get(self.definition.primary_key_name())
    }

    pub fn set(&mut self, field: &str, value: impl Into<Value>) -> ModelResult<()> {
        self.ensure_writable(field)?;
        let value = self.prepare(field, value.into())?;
        self.ensure_primary_key_kept(field, &value)?;
        self.attributes.set(field, value);
        Ok(())
    }

    /// Replace every attribute. A persisted instance keeps its primary key.
    pub fn fill(&mut self, values: Value) -> ModelResult<()> {
        let entries = object_entries(values)?;
        self.ensure_writable(entries.keys().next().map(String::as_str).unwrap_or("*"))?;

        let mut prepared = IndexMap::with_capacity(entries.len() + 1);
        for (field, value) in entries {
            let value = self.prepare(&field, value)?;
            self.ensure_primary_key_kept(&field, &value)?;
            prepared.insert(field, value);
        }

        let pk = self.definition.primary_key_name();
        if self.is_persisted() && !prepared.contains_key(pk) {
            prepared.insert(pk.to_string(), self.primary_key().clone());
        }
        self.attributes.fill(prepared);
        Ok(())
    }

    /// Patch only the given attributes
    pub fn merge(&mut self, values: Value) -> ModelResult<()> {
        let entries = object_entries(values)?;
        self.ensure_writable(entries.keys().next().map(String::as_str).unwrap_or("*"))?;

        let mut prepared = IndexMap::with_capacity(entries.len());
        for (field, value) in entries {
            let value = self.prepare(&field, value)?;
            self.ensure_primary_key_kept(&field, &value)?;
            prepared.insert(field, value);
        }
        self.attributes.merge(prepared);
        Ok(())
    }

    pub fn is_dirty(&self) -> bool {
        self.attributes.is_dirty()
    }

    pub fn dirty(&self) -> IndexMap<String, Value> {
        self.attributes.dirty()
    }

    pub fn dirty_fields(&self) -> Vec<String> {
        self.attributes.dirty_fields()
    }

    /// Date field parsed on demand
    pub fn date(&self, field: &str) -> ModelResult<Option<DateTime<Utc>>> {
        match self.get(field) {
            Value::Null => Ok(None),
            Value::String(raw) => parse_datetime(raw).map(Some).ok_or_else(|| {
                ModelError::Serialization(format!("'{}' does not hold a date: {}", field, raw))
            }),
            other => Err(ModelError::Serialization(format!(
                "'{}' does not hold a date: {}",
                field, other
            ))),
        }
    }

    pub fn set_date(&mut self, field: &str, value: DateTime<Utc>) -> ModelResult<()> {
        self.set(field, value.format(STORAGE_DATE_FORMAT).to_string())
    }

    fn ensure_writable(&self, field: &str) -> ModelResult<()> {
        if self.state == InstanceState::Frozen {
            return Err(ModelError::FrozenInstance {
                model: self.definition.name().to_string(),
                field: field.to_string(),
            });
        }
        Ok(())
    }

    fn ensure_primary_key_kept(&self, field: &str, value: &Value) -> ModelResult<()> {
        if self.is_persisted()
            && field == self.definition.primary_key_name()
            && self.attributes.original().get(field) != Some(value)
        {
            return Err(ModelError::ImmutablePrimaryKey {
                model: self.definition.name().to_string(),
                field: field.to_string(),
            });
        }
        Ok(())
    }

    fn prepare(&self, field: &str, value: Value) -> ModelResult<Value> {
        if self.definition.is_date_field(field) {
            self.definition.date_adapter_ref().format_date(field, &value)
        } else {
            Ok(value)
        }
    }

    /// Write without state checks; used for timestamps and returned rows
    pub(crate) fn set_raw(&mut self, field: &str, value: Value) {
        let value = self.normalize_stored(field, value);
        self.attributes.set(field, value);
    }

    // Extras

    /// Non-column values carried by the row, such as pivot columns
    pub fn extras(&self) -> &IndexMap<String, Value> {
        &self.extras
    }

    pub fn extra(&self, name: &str) -> Option<&Value> {
        self.extras.get(name)
    }

    // Transactions

    /// Run this instance's writes and lazy loads inside `trx`.
    ///
    /// Once `trx` is committed or rolled back the instance goes back to its
    /// model's connection.
    pub fn use_transaction(&mut self, trx: &Transaction) -> &mut Self {
        self.transaction = Some(trx.clone());
        self
    }

    /// Stop using any transaction given earlier
    pub fn release_transaction(&mut self) -> &mut Self {
        self.transaction = None;
        self
    }

    /// The transaction this instance runs in, if it is still open
    pub fn transaction(&self) -> Option<&Transaction> {
        self.transaction.as_ref().filter(|trx| !trx.is_completed())
    }

    pub(crate) fn client(&self) -> ModelResult<QueryClient> {
        match self.transaction() {
            Some(trx) => Ok(QueryClient::Transaction(trx.clone())),
            None => Ok(QueryClient::Connection(
                self.db.connection(self.definition.connection_name())?,
            )),
        }
    }

    // Relations

    /// A relation loaded earlier, without querying
    pub fn preloaded(&self, name: &str) -> Option<&RelationValue> {
        self.relations.get(name)
    }

    pub fn loaded_relations(&self) -> &IndexMap<String, RelationValue> {
        &self.relations
    }

    pub(crate) fn set_relation(&mut self, name: &str, value: RelationValue) {
        self.relations.insert(name.to_string(), value);
    }

    // Typed bridge

    /// Attributes deserialized into `T`; date fields use their cast form
    pub fn to_typed<T: DeserializeOwned>(&self) -> ModelResult<T> {
        let adapter = self.definition.date_adapter_ref();
        let object: serde_json::Map<String, Value> = self
            .attributes
            .values()
            .iter()
            .map(|(field, value)| {
                let value = if self.definition.is_date_field(field) {
                    adapter.cast_date(field, value)
                } else {
                    value.clone()
                };
                (field.clone(), value)
            })
            .collect();
        Ok(serde_json::from_value(Value::Object(object))?)
    }

    /// Fill from a serializable struct; a null primary key is ignored
    pub fn fill_from<T: Serialize>(&mut self, source: &T) -> ModelResult<()> {
        let mut entries = object_entries(serde_json::to_value(source)?)?;
        let pk = self.definition.primary_key_name();
        if entries.get(pk).map(Value::is_null).unwrap_or(false) {
            entries.shift_remove(pk);
        }
        self.fill(Value::Object(entries.into_iter().collect()))
    }
}
