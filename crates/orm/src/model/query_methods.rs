//! Query Methods - static finders and creators on `ModelHandle`
//!
//! Shorthands over common `ModelQuery` shapes. Each call builds a fresh
//! query, so a handle can be reused freely.

use indexmap::IndexMap;
use serde_json::Value;

use crate::collection::ModelCollection;
use crate::error::{ModelError, ModelResult};
use crate::model::{ModelHandle, ModelInstance};
use crate::query::OrderDirection;

impl ModelHandle {
    fn primary_key_name(&self) -> &str {
        self.definition.primary_key_name()
    }

    /// Row by primary key, `None` when missing
    pub async fn find(&self, id: impl Into<Value>) -> ModelResult<Option<ModelInstance>> {
        self.query().where_eq(self.primary_key_name(), id).first().await
    }

    pub async fn find_or_fail(&self, id: impl Into<Value>) -> ModelResult<ModelInstance> {
        self.query().where_eq(self.primary_key_name(), id).first_or_fail().await
    }

    pub async fn find_by(&self, column: &str, value: impl Into<Value>) -> ModelResult<Option<ModelInstance>> {
        self.query().where_eq(column, value).first().await
    }

    pub async fn find_by_or_fail(&self, column: &str, value: impl Into<Value>) -> ModelResult<ModelInstance> {
        self.query().where_eq(column, value).first_or_fail().await
    }

    /// Rows for several keys, newest key first
    pub async fn find_many<T: Into<Value>>(&self, ids: Vec<T>) -> ModelResult<ModelCollection> {
        let pk = self.primary_key_name();
        self.query().where_in(pk, ids).order_by_desc(pk).fetch().await
    }

    /// Lowest primary key
    pub async fn first(&self) -> ModelResult<Option<ModelInstance>> {
        self.query()
            .order_by(self.primary_key_name(), OrderDirection::Asc)
            .first()
            .await
    }

    pub async fn first_or_fail(&self) -> ModelResult<ModelInstance> {
        self.query()
            .order_by(self.primary_key_name(), OrderDirection::Asc)
            .first_or_fail()
            .await
    }

    /// First `count` rows by primary key
    pub async fn pick(&self, count: i64) -> ModelResult<ModelCollection> {
        self.query()
            .order_by(self.primary_key_name(), OrderDirection::Asc)
            .limit(count)
            .fetch()
            .await
    }

    /// Last `count` rows by primary key
    pub async fn pick_inverse(&self, count: i64) -> ModelResult<ModelCollection> {
        self.query()
            .order_by_desc(self.primary_key_name())
            .limit(count)
            .fetch()
            .await
    }

    /// Every row, newest key first
    pub async fn all(&self) -> ModelResult<ModelCollection> {
        self.query().order_by_desc(self.primary_key_name()).fetch().await
    }

    /// Primary keys in ascending order
    pub async fn ids(&self) -> ModelResult<Vec<Value>> {
        let pk = self.primary_key_name();
        let rows = self
            .query()
            .select([pk])
            .order_by(pk, OrderDirection::Asc)
            .fetch()
            .await?;
        Ok(rows.iter().map(|row| row.primary_key().clone()).collect())
    }

    /// `lhs` value to `rhs` value for every row, in result order
    pub async fn pair(&self, lhs: &str, rhs: &str) -> ModelResult<IndexMap<String, Value>> {
        let rows = self.query().select([lhs, rhs]).fetch().await?;
        Ok(rows
            .iter()
            .map(|row| (pair_key(row.get(lhs)), row.get(rhs).clone()))
            .collect())
    }

    /// Insert one row from a JSON object
    pub async fn create(&self, values: Value) -> ModelResult<ModelInstance> {
        let mut instance = self.new_instance();
        instance.fill(values)?;
        instance.save().await?;
        Ok(instance)
    }

    /// Insert rows one at a time; stops at the first failure
    pub async fn create_many(&self, rows: Vec<Value>) -> ModelResult<ModelCollection> {
        let mut created = Vec::with_capacity(rows.len());
        for values in rows {
            created.push(self.create(values).await?);
        }
        Ok(ModelCollection::from(created))
    }

    /// Row matching `search`, or an unsaved instance holding `search`
    /// merged with `payload`
    pub async fn first_or_new(&self, search: Value, payload: Value) -> ModelResult<ModelInstance> {
        ensure_object(&search)?;
        if let Some(found) = self.query().where_attributes(&search).first().await? {
            return Ok(found);
        }
        let mut instance = self.new_instance();
        instance.fill(search)?;
        instance.merge(payload)?;
        Ok(instance)
    }

    pub async fn first_or_create(&self, search: Value, payload: Value) -> ModelResult<ModelInstance> {
        let mut instance = self.first_or_new(search, payload).await?;
        if instance.is_new() {
            instance.save().await?;
        }
        Ok(instance)
    }

    /// Update the row matching `search` with `payload`, creating it when
    /// missing
    pub async fn update_or_create(&self, search: Value, payload: Value) -> ModelResult<ModelInstance> {
        ensure_object(&search)?;
        let mut instance = match self.query().where_attributes(&search).first().await? {
            Some(found) => found,
            None => {
                let mut instance = self.new_instance();
                instance.fill(search)?;
                instance
            }
        };
        instance.merge(payload)?;
        instance.save().await?;
        Ok(instance)
    }
}

fn ensure_object(search: &Value) -> ModelResult<()> {
    match search {
        Value::Object(map) if !map.is_empty() => Ok(()),
        other => Err(ModelError::Query(format!(
            "search payload must be a non-empty object, got {}",
            other
        ))),
    }
}

fn pair_key(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_pair_key() {
        assert_eq!(pair_key(&json!(1)), "1");
        assert_eq!(pair_key(&json!("uk")), "uk");
        assert_eq!(pair_key(&Value::Null), "null");
    }

    #[test]
    fn test_ensure_object() {
        assert!(ensure_object(&json!({"email": "a@b.c"})).is_ok());
        assert!(ensure_object(&json!({})).is_err());
        assert!(ensure_object(&json!([1])).is_err());
    }
}
