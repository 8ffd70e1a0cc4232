//! Query Builder - Core builder implementation
//!
//! `QueryBuilder` is the query descriptor: it only accumulates constraints.
//! Compilation lives in `sql_generation`, execution in `model_query`.

use super::types::*;

/// Query builder for constructing database queries
#[derive(Debug, Clone, Default)]
pub struct QueryBuilder {
    pub(crate) table: Option<String>,
    pub(crate) columns: Vec<SelectColumn>,
    pub(crate) distinct: bool,
    pub(crate) joins: Vec<JoinClause>,
    pub(crate) wheres: Vec<WhereClause>,
    pub(crate) group_by: Vec<String>,
    pub(crate) havings: Vec<WhereClause>,
    pub(crate) orders: Vec<OrderClause>,
    pub(crate) limit_count: Option<i64>,
    pub(crate) offset_value: Option<i64>,
    /// Columns holding dates; bound as timestamps where the dialect needs it
    pub(crate) date_columns: Vec<String>,
}

impl QueryBuilder {
    /// Create a new query builder
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a query builder selecting from the given table
    pub fn table(table: &str) -> Self {
        Self {
            table: Some(table.to_string()),
            ..Self::default()
        }
    }

    /// Set the FROM table
    pub fn from(mut self, table: &str) -> Self {
        self.table = Some(table.to_string());
        self
    }

    /// Select specific columns
    pub fn select<I, S>(mut self, columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.columns.extend(columns.into_iter().map(|c| SelectColumn::Column(c.as_ref().to_string())));
        self
    }

    /// Select a raw expression
    pub fn select_raw(mut self, expression: &str) -> Self {
        self.columns.push(SelectColumn::Raw(expression.to_string()));
        self
    }

    /// Add DISTINCT to the query
    pub fn distinct(mut self) -> Self {
        self.distinct = true;
        self
    }

    /// Add GROUP BY columns
    pub fn group_by(mut self, column: &str) -> Self {
        self.group_by.push(column.to_string());
        self
    }

    /// Add a HAVING condition
    pub fn having_raw(mut self, sql: &str, bindings: Vec<serde_json::Value>) -> Self {
        self.havings.push(WhereClause {
            boolean: BooleanOperator::And,
            condition: Condition::Raw {
                sql: sql.to_string(),
                bindings,
            },
        });
        self
    }

    /// Mark columns as date columns
    pub fn date_columns<I, S>(mut self, columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.date_columns.extend(columns.into_iter().map(|c| c.as_ref().to_string()));
        self
    }

    /// Table the query reads from
    pub fn table_name(&self) -> Option<&str> {
        self.table.as_deref()
    }

    /// Accumulated where clauses
    pub fn where_clauses(&self) -> &[WhereClause] {
        &self.wheres
    }

    /// Whether any explicit select column is set
    pub fn has_columns(&self) -> bool {
        !self.columns.is_empty()
    }

    pub(crate) fn push_where(mut self, boolean: BooleanOperator, condition: Condition) -> Self {
        self.wheres.push(WhereClause { boolean, condition });
        self
    }

    /// Drop ordering, limit and offset; used for counting a paginated query
    pub(crate) fn without_ordering_and_limits(mut self) -> Self {
        self.orders.clear();
        self.limit_count = None;
        self.offset_value = None;
        self
    }
}
