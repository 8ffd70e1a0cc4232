//! Model-bound queries
//!
//! `ModelQuery` pairs a `QueryBuilder` with a booted model definition and the
//! client to run it on. Terminals hydrate rows into `ModelInstance`s, run
//! preloads and fire the fetch hooks; aggregates return scalars directly.

use std::fmt;
use std::sync::Arc;

use indexmap::IndexMap;
use serde_json::Value;

use super::builder::QueryBuilder;
use super::pagination::PaginationMeta;
use super::sql_generation::CompiledQuery;
use super::types::*;
use crate::collection::{ModelCollection, Paginator};
use crate::database::{Database, QueryClient};
use crate::error::{ModelError, ModelResult};
use crate::events::HookEvent;
use crate::model::attributes::object_entries;
use crate::model::{ModelDefinition, ModelInstance};
use crate::relationships::eager_loading::{load_relations, PreloadTree};
use crate::transaction::Transaction;

#[derive(Clone)]
pub struct ModelQuery {
    pub(crate) definition: Arc<ModelDefinition>,
    pub(crate) db: Database,
    pub(crate) builder: QueryBuilder,
    pub(crate) transaction: Option<Transaction>,
    pub(crate) preloads: PreloadTree,
    pub(crate) extra_columns: Vec<String>,
    pub(crate) error: Option<ModelError>,
}

impl fmt::Debug for ModelQuery {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ModelQuery")
            .field("model", &self.definition.name())
            .field("builder", &self.builder)
            .field("preloads", &self.preloads.keys().collect::<Vec<_>>())
            .field("error", &self.error)
            .finish()
    }
}

impl ModelQuery {
    pub(crate) fn new(definition: Arc<ModelDefinition>, db: Database, transaction: Option<Transaction>) -> Self {
        let builder = QueryBuilder::table(definition.table_name()).date_columns(definition.date_fields());
        Self {
            definition,
            db,
            builder,
            transaction,
            preloads: PreloadTree::new(),
            extra_columns: Vec::new(),
            error: None,
        }
    }

    pub fn definition(&self) -> &Arc<ModelDefinition> {
        &self.definition
    }

    pub fn builder(&self) -> &QueryBuilder {
        &self.builder
    }

    /// Apply arbitrary descriptor changes
    pub fn with_builder<F>(mut self, f: F) -> Self
    where
        F: FnOnce(QueryBuilder) -> QueryBuilder,
    {
        self.builder = f(self.builder);
        self
    }

    /// Remember the first misuse; terminals report it
    pub(crate) fn fail(mut self, error: ModelError) -> Self {
        if self.error.is_none() {
            self.error = Some(error);
        }
        self
    }

    pub(crate) fn with_extra_columns(mut self, columns: Vec<String>) -> Self {
        self.extra_columns.extend(columns);
        self
    }

    /// Run inside `trx`; instances fetched inherit it
    pub fn use_transaction(mut self, trx: &Transaction) -> Self {
        self.transaction = Some(trx.clone());
        self
    }

    // Select

    pub fn select<I, S>(self, columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.with_builder(|b| b.select(columns))
    }

    pub fn select_raw(self, expression: &str) -> Self {
        self.with_builder(|b| b.select_raw(expression))
    }

    pub fn distinct(self) -> Self {
        self.with_builder(|b| b.distinct())
    }

    // Where

    pub fn where_eq<T: Into<Value>>(self, column: &str, value: T) -> Self {
        self.with_builder(|b| b.where_eq(column, value))
    }

    /// Comparison with an operator token such as `>=` or `like`
    pub fn where_op<T: Into<Value>>(self, column: &str, operator: &str, value: T) -> Self {
        match QueryOperator::parse(operator) {
            Ok(operator) => self.with_builder(|b| b.where_op(column, operator, value)),
            Err(err) => self.fail(err.into()),
        }
    }

    pub fn or_where_op<T: Into<Value>>(self, column: &str, operator: &str, value: T) -> Self {
        match QueryOperator::parse(operator) {
            Ok(operator) => self.with_builder(|b| b.or_where_op(column, operator, value)),
            Err(err) => self.fail(err.into()),
        }
    }

    pub fn where_ne<T: Into<Value>>(self, column: &str, value: T) -> Self {
        self.with_builder(|b| b.where_ne(column, value))
    }

    pub fn where_gt<T: Into<Value>>(self, column: &str, value: T) -> Self {
        self.with_builder(|b| b.where_gt(column, value))
    }

    pub fn where_gte<T: Into<Value>>(self, column: &str, value: T) -> Self {
        self.with_builder(|b| b.where_gte(column, value))
    }

    pub fn where_lt<T: Into<Value>>(self, column: &str, value: T) -> Self {
        self.with_builder(|b| b.where_lt(column, value))
    }

    pub fn where_lte<T: Into<Value>>(self, column: &str, value: T) -> Self {
        self.with_builder(|b| b.where_lte(column, value))
    }

    pub fn where_like(self, column: &str, pattern: &str) -> Self {
        self.with_builder(|b| b.where_like(column, pattern))
    }

    pub fn where_not_like(self, column: &str, pattern: &str) -> Self {
        self.with_builder(|b| b.where_not_like(column, pattern))
    }

    pub fn where_in<T: Into<Value>>(self, column: &str, values: Vec<T>) -> Self {
        self.with_builder(|b| b.where_in(column, values))
    }

    pub fn where_not_in<T: Into<Value>>(self, column: &str, values: Vec<T>) -> Self {
        self.with_builder(|b| b.where_not_in(column, values))
    }

    pub fn where_null(self, column: &str) -> Self {
        self.with_builder(|b| b.where_null(column))
    }

    pub fn where_not_null(self, column: &str) -> Self {
        self.with_builder(|b| b.where_not_null(column))
    }

    pub fn where_between<T: Into<Value>>(self, column: &str, low: T, high: T) -> Self {
        self.with_builder(|b| b.where_between(column, low, high))
    }

    pub fn where_not_between<T: Into<Value>>(self, column: &str, low: T, high: T) -> Self {
        self.with_builder(|b| b.where_not_between(column, low, high))
    }

    /// Compare two columns, e.g. `where_column("updated_at", ">", "created_at")`
    pub fn where_column(self, first: &str, operator: &str, second: &str) -> Self {
        match QueryOperator::parse(operator) {
            Ok(operator) => self.with_builder(|b| b.where_column(first, operator, second)),
            Err(err) => self.fail(err.into()),
        }
    }

    pub fn where_raw(self, sql: &str, bindings: Vec<Value>) -> Self {
        self.with_builder(|b| b.where_raw(sql, bindings))
    }

    pub fn or_where_raw(self, sql: &str, bindings: Vec<Value>) -> Self {
        self.with_builder(|b| b.or_where_raw(sql, bindings))
    }

    pub fn or_where_eq<T: Into<Value>>(self, column: &str, value: T) -> Self {
        self.with_builder(|b| b.or_where_eq(column, value))
    }

    pub fn or_where_in<T: Into<Value>>(self, column: &str, values: Vec<T>) -> Self {
        self.with_builder(|b| b.or_where_in(column, values))
    }

    pub fn or_where_null(self, column: &str) -> Self {
        self.with_builder(|b| b.or_where_null(column))
    }

    pub fn where_group<F>(self, build: F) -> Self
    where
        F: FnOnce(QueryBuilder) -> QueryBuilder,
    {
        self.with_builder(|b| b.where_group(build))
    }

    pub fn or_where_group<F>(self, build: F) -> Self
    where
        F: FnOnce(QueryBuilder) -> QueryBuilder,
    {
        self.with_builder(|b| b.or_where_group(build))
    }

    /// Add all `column = value` pairs of a JSON object
    pub fn where_attributes(self, search: &Value) -> Self {
        match object_entries(search.clone()) {
            Ok(entries) => entries
                .into_iter()
                .fold(self, |query, (column, value)| query.where_eq(&column, value)),
            Err(err) => self.fail(err),
        }
    }

    // Joins, ordering, limits

    pub fn join(self, table: &str, left: &str, right: &str) -> Self {
        self.with_builder(|b| b.join(table, left, right))
    }

    pub fn left_join(self, table: &str, left: &str, right: &str) -> Self {
        self.with_builder(|b| b.left_join(table, left, right))
    }

    pub fn right_join(self, table: &str, left: &str, right: &str) -> Self {
        self.with_builder(|b| b.right_join(table, left, right))
    }

    pub fn order_by(self, column: &str, direction: OrderDirection) -> Self {
        self.with_builder(|b| b.order_by(column, direction))
    }

    pub fn order_by_desc(self, column: &str) -> Self {
        self.with_builder(|b| b.order_by_desc(column))
    }

    pub fn order_by_raw(self, expression: &str) -> Self {
        self.with_builder(|b| b.order_by_raw(expression))
    }

    pub fn group_by(self, column: &str) -> Self {
        self.with_builder(|b| b.group_by(column))
    }

    pub fn having_raw(self, sql: &str, bindings: Vec<Value>) -> Self {
        self.with_builder(|b| b.having_raw(sql, bindings))
    }

    pub fn limit(self, count: i64) -> Self {
        self.with_builder(|b| b.limit(count))
    }

    pub fn offset(self, count: i64) -> Self {
        self.with_builder(|b| b.offset(count))
    }

    pub fn for_page(self, page: i64, per_page: i64) -> Self {
        self.with_builder(|b| b.for_page(page, per_page))
    }

    // Scopes

    /// Apply a named scope
    pub fn apply(self, name: &str) -> Self {
        self.apply_with(name, &[])
    }

    /// Apply a named scope with arguments
    pub fn apply_with(self, name: &str, args: &[Value]) -> Self {
        match self.definition.scope_fn(name).cloned() {
            Some(scope) => scope(self, args),
            None => {
                let error = ModelError::Query(format!(
                    "unknown scope '{}' on {}",
                    name,
                    self.definition.name()
                ));
                self.fail(error)
            }
        }
    }

    // Execution

    fn check(&self) -> ModelResult<()> {
        match &self.error {
            Some(err) => Err(err.clone()),
            None => Ok(()),
        }
    }

    pub(crate) fn client(&self) -> ModelResult<QueryClient> {
        match &self.transaction {
            Some(trx) => Ok(QueryClient::Transaction(trx.clone())),
            None => Ok(QueryClient::Connection(
                self.db.connection(self.definition.connection_name())?,
            )),
        }
    }

    /// Compiled SELECT for inspection
    pub fn to_sql(&self) -> ModelResult<CompiledQuery> {
        self.check()?;
        let dialect = self.client()?.dialect();
        Ok(self.builder.to_select_sql(dialect)?)
    }

    async fn fetch_instances(&self, builder: &QueryBuilder) -> ModelResult<Vec<ModelInstance>> {
        self.check()?;
        let client = self.client()?;
        let query = builder.to_select_sql(client.dialect())?;
        let rows = client.fetch_all(&query).await?;
        Ok(rows
            .iter()
            .map(|row| {
                ModelInstance::hydrate(
                    self.definition.clone(),
                    self.db.clone(),
                    self.transaction.clone(),
                    row.to_json_map(),
                    &self.extra_columns,
                )
            })
            .collect())
    }

    /// Run the query; preloads resolve with one query per relation level
    pub async fn fetch(&self) -> ModelResult<ModelCollection> {
        let mut instances = self.fetch_instances(&self.builder).await?;
        load_relations(&mut instances, &self.preloads, &self.db, self.transaction.as_ref()).await?;
        self.definition.lifecycle().trigger_fetch(&mut instances).await?;
        Ok(ModelCollection::from(instances))
    }

    pub async fn first(&self) -> ModelResult<Option<ModelInstance>> {
        let builder = self.builder.clone().limit(1);
        let mut instances = self.fetch_instances(&builder).await?;
        load_relations(&mut instances, &self.preloads, &self.db, self.transaction.as_ref()).await?;
        match instances.into_iter().next() {
            Some(mut instance) => {
                self.definition
                    .lifecycle()
                    .trigger(HookEvent::AfterFind, &mut instance)
                    .await?;
                Ok(Some(instance))
            }
            None => Ok(None),
        }
    }

    pub async fn first_or_fail(&self) -> ModelResult<ModelInstance> {
        self.first().await?.ok_or_else(|| {
            ModelError::not_found(self.definition.name(), describe_constraints(&self.builder))
        })
    }

    // Aggregates

    async fn aggregate(&self, function: AggregateFunction, column: Option<&str>, distinct: bool) -> ModelResult<Value> {
        self.check()?;
        let client = self.client()?;
        let query = self.builder.to_aggregate_sql(client.dialect(), function, column, distinct)?;
        let row = client.fetch_optional(&query).await?;
        Ok(row
            .and_then(|row| row.get_by_name("aggregate").map(|value| value.to_json()))
            .unwrap_or(Value::Null))
    }

    pub async fn count(&self) -> ModelResult<i64> {
        let value = self.aggregate(AggregateFunction::Count, None, false).await?;
        Ok(value_to_i64(&value))
    }

    pub async fn count_distinct(&self, column: &str) -> ModelResult<i64> {
        let value = self.aggregate(AggregateFunction::Count, Some(column), true).await?;
        Ok(value_to_i64(&value))
    }

    pub async fn sum(&self, column: &str) -> ModelResult<Value> {
        self.aggregate(AggregateFunction::Sum, Some(column), false).await
    }

    pub async fn sum_distinct(&self, column: &str) -> ModelResult<Value> {
        self.aggregate(AggregateFunction::Sum, Some(column), true).await
    }

    pub async fn avg(&self, column: &str) -> ModelResult<Value> {
        self.aggregate(AggregateFunction::Avg, Some(column), false).await
    }

    pub async fn avg_distinct(&self, column: &str) -> ModelResult<Value> {
        self.aggregate(AggregateFunction::Avg, Some(column), true).await
    }

    pub async fn min(&self, column: &str) -> ModelResult<Value> {
        self.aggregate(AggregateFunction::Min, Some(column), false).await
    }

    pub async fn max(&self, column: &str) -> ModelResult<Value> {
        self.aggregate(AggregateFunction::Max, Some(column), false).await
    }

    pub async fn exists(&self) -> ModelResult<bool> {
        self.check()?;
        let client = self.client()?;
        let mut builder = self.builder.clone().limit(1);
        builder.columns = vec![SelectColumn::Raw("1".to_string())];
        let query = builder.to_select_sql(client.dialect())?;
        Ok(client.fetch_optional(&query).await?.is_some())
    }

    /// One page of results plus totals
    pub async fn paginate(&self, page: i64, per_page: i64) -> ModelResult<Paginator> {
        let mut counter = self.clone();
        counter.builder = counter.builder.without_ordering_and_limits();
        let total = counter.count().await?;

        let meta = PaginationMeta::new(total, page, per_page);
        let data = self.clone().for_page(meta.page, meta.per_page).fetch().await?;
        Ok(Paginator::new(data, meta))
    }

    // Bulk writes: no hooks, no dirty checks

    pub async fn update(&self, values: Value) -> ModelResult<u64> {
        self.check()?;
        let values: IndexMap<String, Value> = object_entries(values)?;
        let client = self.client()?;
        let query = self.builder.to_update_sql(client.dialect(), &values)?;
        client.execute(&query).await
    }

    pub async fn delete(&self) -> ModelResult<u64> {
        self.check()?;
        let client = self.client()?;
        let query = self.builder.to_delete_sql(client.dialect())?;
        client.execute(&query).await
    }

    pub async fn increment(&self, column: &str, by: i64) -> ModelResult<u64> {
        self.check()?;
        let client = self.client()?;
        let query = self
            .builder
            .to_increment_sql(client.dialect(), column, Value::from(by), &IndexMap::new())?;
        client.execute(&query).await
    }

    pub async fn decrement(&self, column: &str, by: i64) -> ModelResult<u64> {
        self.increment(column, -by).await
    }
}

fn value_to_i64(value: &Value) -> i64 {
    match value {
        Value::Number(number) => number
            .as_i64()
            .or_else(|| number.as_f64().map(|f| f as i64))
            .unwrap_or(0),
        Value::String(raw) => raw.parse().unwrap_or(0),
        _ => 0,
    }
}

/// Human-readable summary of simple equality filters for not-found errors
fn describe_constraints(builder: &QueryBuilder) -> String {
    let parts: Vec<String> = builder
        .where_clauses()
        .iter()
        .filter_map(|clause| match &clause.condition {
            Condition::Basic { column, operator, value } => Some(format!("{} {} {}", column, operator, value)),
            _ => None,
        })
        .collect();
    if parts.is_empty() {
        "the given constraints".to_string()
    } else {
        parts.join(" and ")
    }
}
