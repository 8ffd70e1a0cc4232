//! CRUD Operations - insert, update, delete and refresh of single instances
//!
//! `save()` decides between insert and update from the instance state, runs
//! the lifecycle hooks around the write and stamps timestamp columns.

use chrono::Utc;
use indexmap::IndexMap;
use serde_json::Value;
use tracing::debug;

use crate::error::{ModelError, ModelResult};
use crate::events::HookEvent;
use crate::model::attributes::{Attributes, STORAGE_DATE_FORMAT};
use crate::model::instance::{InstanceState, ModelInstance};
use crate::query::QueryBuilder;

impl ModelInstance {
    /// Insert a new instance or update the dirty fields of a persisted one.
    /// A persisted instance without changes issues no query and runs no hooks.
    pub async fn save(&mut self) -> ModelResult<()> {
        match self.state {
            InstanceState::Frozen => Err(ModelError::FrozenInstance {
                model: self.model_name().to_string(),
                field: "*".to_string(),
            }),
            InstanceState::New => self.insert().await,
            InstanceState::Persisted if !self.is_dirty() => Ok(()),
            InstanceState::Persisted => self.update().await,
        }
    }

    async fn insert(&mut self) -> ModelResult<()> {
        let definition = self.definition.clone();
        let lifecycle = definition.lifecycle();
        lifecycle.trigger(HookEvent::BeforeCreate, self).await?;
        lifecycle.trigger(HookEvent::BeforeSave, self).await?;

        if definition.has_timestamps() {
            let now = now_value();
            if self.get(definition.created_at()).is_null() {
                self.set_raw(definition.created_at(), now.clone());
            }
            self.set_raw(definition.updated_at(), now);
        }

        let mut values: IndexMap<String, Value> = self.attributes.values().clone();
        let pk = definition.primary_key_name();
        if values.get(pk).map(Value::is_null).unwrap_or(false) {
            values.shift_remove(pk);
        }

        let client = self.client()?;
        let query = QueryBuilder::table(definition.table_name())
            .date_columns(definition.date_fields())
            .to_insert_sql(client.dialect(), &values, true)?;
        let returned = client.fetch_optional(&query).await?;
        if let Some(row) = returned {
            for (column, value) in row.to_json_map() {
                self.set_raw(&column, value);
            }
        }

        self.attributes.sync_original();
        self.state = InstanceState::Persisted;
        debug!(model = %definition.name(), id = %self.primary_key(), "inserted row");

        lifecycle.trigger(HookEvent::AfterCreate, self).await?;
        lifecycle.trigger(HookEvent::AfterSave, self).await?;
        Ok(())
    }

    async fn update(&mut self) -> ModelResult<()> {
        let definition = self.definition.clone();
        let lifecycle = definition.lifecycle();
        lifecycle.trigger(HookEvent::BeforeUpdate, self).await?;
        lifecycle.trigger(HookEvent::BeforeSave, self).await?;

        if definition.has_timestamps() {
            self.set_raw(definition.updated_at(), now_value());
        }

        let dirty = self.dirty();
        if !dirty.is_empty() {
            let client = self.client()?;
            let query = self
                .key_query()?
                .to_update_sql(client.dialect(), &dirty)?;
            client.execute(&query).await?;
            debug!(
                model = %definition.name(),
                id = %self.primary_key(),
                fields = ?dirty.keys().collect::<Vec<_>>(),
                "updated row"
            );
        }
        self.attributes.sync_original();

        lifecycle.trigger(HookEvent::AfterUpdate, self).await?;
        lifecycle.trigger(HookEvent::AfterSave, self).await?;
        Ok(())
    }

    /// Delete the row; the instance stays readable but rejects writes
    pub async fn delete(&mut self) -> ModelResult<()> {
        match self.state {
            InstanceState::Frozen => {
                return Err(ModelError::FrozenInstance {
                    model: self.model_name().to_string(),
                    field: "*".to_string(),
                })
            }
            InstanceState::New => return Err(ModelError::MissingPrimaryKey(self.model_name().to_string())),
            InstanceState::Persisted => {}
        }

        let definition = self.definition.clone();
        let lifecycle = definition.lifecycle();
        lifecycle.trigger(HookEvent::BeforeDelete, self).await?;

        let client = self.client()?;
        let query = self.key_query()?.to_delete_sql(client.dialect())?;
        client.execute(&query).await?;
        self.state = InstanceState::Frozen;
        debug!(model = %definition.name(), id = %self.primary_key(), "deleted row");

        lifecycle.trigger(HookEvent::AfterDelete, self).await?;
        Ok(())
    }

    /// Re-read the row, discarding unsaved changes
    pub async fn refresh(&mut self) -> ModelResult<()> {
        match self.state {
            InstanceState::Frozen => {
                return Err(ModelError::FrozenInstance {
                    model: self.model_name().to_string(),
                    field: "*".to_string(),
                })
            }
            InstanceState::New => return Err(ModelError::MissingPrimaryKey(self.model_name().to_string())),
            InstanceState::Persisted => {}
        }

        let client = self.client()?;
        let query = self.key_query()?.limit(1).to_select_sql(client.dialect())?;
        let row = client.fetch_optional(&query).await?.ok_or_else(|| {
            ModelError::not_found(
                self.model_name(),
                format!("{} = {}", self.definition.primary_key_name(), self.primary_key()),
            )
        })?;

        let mut fresh = Attributes::new();
        for (column, value) in row.to_json_map() {
            let value = self.normalize_stored(&column, value);
            fresh.set(&column, value);
        }
        fresh.sync_original();
        self.attributes = fresh;
        Ok(())
    }

    /// `WHERE pk = <persisted pk>` on this model's table
    fn key_query(&self) -> ModelResult<QueryBuilder> {
        let pk = self.definition.primary_key_name();
        let value = self
            .attributes
            .original()
            .get(pk)
            .filter(|value| !value.is_null())
            .cloned()
            .ok_or_else(|| ModelError::MissingPrimaryKey(self.model_name().to_string()))?;
        Ok(QueryBuilder::table(self.definition.table_name())
            .date_columns(self.definition.date_fields())
            .where_eq(pk, value))
    }
}

fn now_value() -> Value {
    Value::String(Utc::now().format(STORAGE_DATE_FORMAT).to_string())
}
