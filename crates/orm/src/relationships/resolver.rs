//! Relation resolver - turns a relation name into the related definition,
//! concrete key names and the query that reads the related rows.

use std::collections::HashMap;
use std::sync::Arc;

use indexmap::IndexMap;
use serde_json::Value;

use super::types::{MatchKey, RelationDescriptor, ResolvedRelation};
use crate::collection::ModelCollection;
use crate::database::Database;
use crate::error::ModelResult;
use crate::model::{ModelDefinition, ModelInstance, RelationValue};
use crate::query::{ModelQuery, QueryOperator};
use crate::transaction::Transaction;

/// A relation with both sides booted and keys resolved
#[derive(Debug, Clone)]
pub(crate) struct RelationPlan {
    pub descriptor: RelationDescriptor,
    pub related: Arc<ModelDefinition>,
    pub resolved: ResolvedRelation,
}

impl RelationPlan {
    pub fn resolve(parent: &ModelDefinition, name: &str, db: &Database) -> ModelResult<Self> {
        let descriptor = parent.relation_descriptor(name)?.clone();
        let related = db.registry().boot(&descriptor.related)?;
        let through = match &descriptor.keys.through {
            Some(through) => Some(db.registry().boot(through)?),
            None => None,
        };
        let resolved = descriptor.resolve(parent, &related, through.as_deref())?;
        Ok(Self {
            descriptor,
            related,
            resolved,
        })
    }

    /// Unique, non-null linking values of the parents, in first-seen order
    pub fn parent_keys(&self, parents: &[ModelInstance]) -> Vec<Value> {
        let column = self.resolved.parent_key();
        let mut keys: IndexMap<String, Value> = IndexMap::new();
        for parent in parents {
            let value = parent.get(column);
            if !value.is_null() {
                keys.entry(key_string(value)).or_insert_with(|| value.clone());
            }
        }
        keys.into_values().collect()
    }

    /// Related model query with joins and linkage columns, but no key filter
    pub fn base_query(&self, db: &Database, transaction: Option<&Transaction>) -> ModelQuery {
        let query = ModelQuery::new(self.related.clone(), db.clone(), transaction.cloned());
        let related_table = self.related.table_name();

        let query = match &self.resolved {
            ResolvedRelation::HasOneOrMany { .. } | ResolvedRelation::BelongsTo { .. } => query,
            ResolvedRelation::ManyToMany {
                related_key,
                pivot_table,
                pivot_related_key,
                ..
            } => query.join(
                pivot_table,
                &qualify(pivot_table, pivot_related_key),
                &qualify(related_table, related_key),
            ),
            ResolvedRelation::Through {
                through_table,
                through_local_key,
                foreign_key,
                ..
            } => query.join(
                through_table,
                &qualify(through_table, through_local_key),
                &qualify(related_table, foreign_key),
            ),
        };

        match &self.descriptor.constraint {
            Some(constraint) => constraint(query),
            None => query,
        }
    }

    /// Related rows linked to any of `keys`
    pub fn query_for(&self, db: &Database, transaction: Option<&Transaction>, keys: Vec<Value>) -> ModelQuery {
        let related_table = self.related.table_name();
        let query = self.base_query(db, transaction);
        let column = match &self.resolved {
            ResolvedRelation::HasOneOrMany { foreign_key, .. } => qualify(related_table, foreign_key),
            ResolvedRelation::BelongsTo { owner_key, .. } => qualify(related_table, owner_key),
            ResolvedRelation::ManyToMany {
                pivot_table,
                pivot_foreign_key,
                ..
            } => qualify(pivot_table, pivot_foreign_key),
            ResolvedRelation::Through {
                through_table,
                through_foreign_key,
                ..
            } => qualify(through_table, through_foreign_key),
        };

        let query = if keys.len() == 1 {
            query.where_eq(&column, keys.into_iter().next().unwrap_or(Value::Null))
        } else {
            query.where_in(&column, keys)
        };
        self.with_linkage_columns(query)
    }

    /// Correlate the related query with the outer parent table
    pub fn correlated_query(&self, db: &Database, transaction: Option<&Transaction>, parent_table: &str) -> ModelQuery {
        let related_table = self.related.table_name();
        let (first, second) = match &self.resolved {
            ResolvedRelation::HasOneOrMany { local_key, foreign_key } => {
                (qualify(related_table, foreign_key), qualify(parent_table, local_key))
            }
            ResolvedRelation::BelongsTo { foreign_key, owner_key } => {
                (qualify(related_table, owner_key), qualify(parent_table, foreign_key))
            }
            ResolvedRelation::ManyToMany {
                local_key,
                pivot_table,
                pivot_foreign_key,
                ..
            } => (qualify(pivot_table, pivot_foreign_key), qualify(parent_table, local_key)),
            ResolvedRelation::Through {
                local_key,
                through_table,
                through_foreign_key,
                ..
            } => (qualify(through_table, through_foreign_key), qualify(parent_table, local_key)),
        };
        self.base_query(db, transaction)
            .with_builder(|b| b.where_column(&first, QueryOperator::Equal, &second))
    }

    /// Select `related.*` plus the pivot/through columns as extras
    fn with_linkage_columns(&self, query: ModelQuery) -> ModelQuery {
        let related_table = self.related.table_name();
        let (table, prefix, columns): (&str, &str, Vec<&String>) = match &self.resolved {
            ResolvedRelation::HasOneOrMany { .. } | ResolvedRelation::BelongsTo { .. } => return query,
            ResolvedRelation::ManyToMany {
                pivot_table,
                pivot_foreign_key,
                pivot_related_key,
                pivot_columns,
                ..
            } => {
                let mut columns = vec![pivot_foreign_key, pivot_related_key];
                columns.extend(pivot_columns.iter());
                (pivot_table.as_str(), "pivot", columns)
            }
            ResolvedRelation::Through {
                through_table,
                through_foreign_key,
                ..
            } => (through_table.as_str(), "through", vec![through_foreign_key]),
        };

        let aliases: Vec<String> = columns.iter().map(|c| format!("{}_{}", prefix, c)).collect();
        let mut selection: Vec<String> = Vec::with_capacity(columns.len() + 1);
        if !query.builder().has_columns() {
            selection.push(format!("{}.*", related_table));
        }
        selection.extend(
            columns
                .iter()
                .zip(&aliases)
                .map(|(column, alias)| format!("{} as {}", qualify(table, column), alias)),
        );
        query.select(selection).with_extra_columns(aliases)
    }

    /// Distribute fetched related rows over their parents
    pub fn assign(&self, name: &str, parents: &mut [ModelInstance], related: Vec<ModelInstance>) {
        let match_key = self.resolved.match_key();
        let mut buckets: HashMap<String, Vec<ModelInstance>> = HashMap::new();
        for instance in related {
            let value = match &match_key {
                MatchKey::Attribute(column) => instance.get(column).clone(),
                MatchKey::Extra(extra) => instance.extra(extra).cloned().unwrap_or(Value::Null),
            };
            if !value.is_null() {
                buckets.entry(key_string(&value)).or_default().push(instance);
            }
        }

        let parent_key = self.resolved.parent_key();
        for parent in parents.iter_mut() {
            let key = parent.get(parent_key);
            let matched = if key.is_null() {
                Vec::new()
            } else {
                buckets.get(&key_string(key)).cloned().unwrap_or_default()
            };
            let value = if self.descriptor.kind.is_collection() {
                RelationValue::Many(ModelCollection::from(matched))
            } else {
                RelationValue::One(matched.into_iter().next().map(Box::new))
            };
            parent.set_relation(name, value);
        }
    }
}

pub(crate) fn qualify(table: &str, column: &str) -> String {
    if column.contains('.') {
        column.to_string()
    } else {
        format!("{}.{}", table, column)
    }
}

/// Keys compare by text so `1` and `"1"` from different drivers match
pub(crate) fn key_string(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}
