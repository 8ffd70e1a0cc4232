//! Writes through relations: related creation and pivot rows

use indexmap::IndexMap;
use serde_json::Value;
use tracing::debug;

use super::resolver::{key_string, RelationPlan};
use super::types::ResolvedRelation;
use crate::error::{ModelError, ModelResult};
use crate::model::ModelInstance;
use crate::query::{compile_insert, QueryBuilder};

/// Pivot location for one parent row
struct PivotTarget {
    table: String,
    foreign_key: String,
    related_key: String,
    parent_value: Value,
}

impl ModelInstance {
    fn pivot_target(&self, relation: &str) -> ModelResult<PivotTarget> {
        let plan = RelationPlan::resolve(&self.definition, relation, &self.db)?;
        match plan.resolved {
            ResolvedRelation::ManyToMany {
                local_key,
                pivot_table,
                pivot_foreign_key,
                pivot_related_key,
                ..
            } => {
                let parent_value = self.persisted_key(&local_key)?;
                Ok(PivotTarget {
                    table: pivot_table,
                    foreign_key: pivot_foreign_key,
                    related_key: pivot_related_key,
                    parent_value,
                })
            }
            _ => Err(ModelError::Relationship(format!(
                "'{}' on {} is a {} relation; pivot rows need manyToMany",
                relation,
                self.model_name(),
                plan.descriptor.kind
            ))),
        }
    }

    /// Value of `column` on a persisted instance
    fn persisted_key(&self, column: &str) -> ModelResult<Value> {
        let value = self.get(column);
        if !self.is_persisted() || value.is_null() {
            return Err(ModelError::MissingPrimaryKey(self.model_name().to_string()));
        }
        Ok(value.clone())
    }

    /// Insert pivot rows linking this instance to `ids`
    pub async fn attach<T: Into<Value>>(&mut self, relation: &str, ids: Vec<T>) -> ModelResult<()> {
        let rows: Vec<(Value, Value)> = ids.into_iter().map(|id| (id.into(), Value::Null)).collect();
        self.attach_with(relation, rows).await
    }

    /// Insert pivot rows with extra pivot columns, given as `(id, {column: value})`
    pub async fn attach_with(&mut self, relation: &str, rows: Vec<(Value, Value)>) -> ModelResult<()> {
        let target = self.pivot_target(relation)?;
        let client = self.client()?;

        for (id, extra) in rows {
            let mut values: IndexMap<String, Value> = IndexMap::new();
            values.insert(target.foreign_key.clone(), target.parent_value.clone());
            values.insert(target.related_key.clone(), id);
            if let Value::Object(extra) = extra {
                values.extend(extra);
            }
            let query = compile_insert(client.dialect(), &target.table, &values, false);
            client.execute(&query).await?;
        }

        debug!(model = %self.model_name(), %relation, table = %target.table, "attached pivot rows");
        self.forget_relation(relation);
        Ok(())
    }

    /// Remove pivot rows for `ids`, or every pivot row of this instance
    /// when `ids` is `None`. Returns the number of rows removed.
    pub async fn detach(&mut self, relation: &str, ids: Option<Vec<Value>>) -> ModelResult<u64> {
        let target = self.pivot_target(relation)?;
        let client = self.client()?;

        let mut query = QueryBuilder::table(&target.table).where_eq(&target.foreign_key, target.parent_value.clone());
        if let Some(ids) = ids {
            query = query.where_in(&target.related_key, ids);
        }
        let removed = client.execute(&query.to_delete_sql(client.dialect())?).await?;

        debug!(model = %self.model_name(), %relation, removed, "detached pivot rows");
        self.forget_relation(relation);
        Ok(removed)
    }

    /// Make the pivot rows match `ids` exactly: detach the rest, attach
    /// the missing ones
    pub async fn sync<T: Into<Value>>(&mut self, relation: &str, ids: Vec<T>) -> ModelResult<()> {
        let target = self.pivot_target(relation)?;
        let client = self.client()?;

        let existing_query = QueryBuilder::table(&target.table)
            .select([target.related_key.as_str()])
            .where_eq(&target.foreign_key, target.parent_value.clone())
            .to_select_sql(client.dialect())?;
        let existing: Vec<Value> = client
            .fetch_all(&existing_query)
            .await?
            .iter()
            .filter_map(|row| row.get_by_name(&target.related_key).map(|value| value.to_json()))
            .collect();

        let wanted: IndexMap<String, Value> = ids
            .into_iter()
            .map(|id| {
                let id: Value = id.into();
                (key_string(&id), id)
            })
            .collect();
        let stale: Vec<Value> = existing
            .iter()
            .filter(|value| !wanted.contains_key(&key_string(value)))
            .cloned()
            .collect();
        let present: Vec<String> = existing.iter().map(key_string).collect();
        let missing: Vec<Value> = wanted
            .into_iter()
            .filter(|(key, _)| !present.contains(key))
            .map(|(_, id)| id)
            .collect();

        if !stale.is_empty() {
            self.detach(relation, Some(stale)).await?;
        }
        if !missing.is_empty() {
            self.attach(relation, missing).await?;
        }
        self.forget_relation(relation);
        Ok(())
    }

    /// Create a related row linked to this instance. hasOne/hasMany set the
    /// foreign key, manyToMany inserts the pivot row after saving.
    pub async fn create_related(&mut self, relation: &str, values: Value) -> ModelResult<ModelInstance> {
        let plan = RelationPlan::resolve(&self.definition, relation, &self.db)?;
        let mut related = ModelInstance::new(plan.related.clone(), self.db.clone(), self.transaction().cloned());
        related.fill(values)?;

        match &plan.resolved {
            ResolvedRelation::HasOneOrMany { local_key, foreign_key } => {
                let parent_value = self.persisted_key(local_key)?;
                related.set(foreign_key, parent_value)?;
                related.save().await?;
            }
            ResolvedRelation::ManyToMany { local_key, .. } => {
                self.persisted_key(local_key)?;
                related.save().await?;
                let id = related.primary_key().clone();
                self.attach(relation, vec![id]).await?;
            }
            ResolvedRelation::BelongsTo { .. } | ResolvedRelation::Through { .. } => {
                return Err(ModelError::Relationship(format!(
                    "cannot create through {} relation '{}' on {}",
                    plan.descriptor.kind,
                    relation,
                    self.model_name()
                )));
            }
        }

        self.forget_relation(relation);
        Ok(related)
    }
}
