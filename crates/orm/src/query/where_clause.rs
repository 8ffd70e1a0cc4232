//! Query Builder WHERE clause operations

use super::builder::QueryBuilder;
use super::types::*;
use serde_json::Value;

impl QueryBuilder {
    /// Add WHERE condition with equality
    pub fn where_eq<T: Into<Value>>(self, column: &str, value: T) -> Self {
        self.where_op(column, QueryOperator::Equal, value)
    }

    /// Add WHERE condition with not equal
    pub fn where_ne<T: Into<Value>>(self, column: &str, value: T) -> Self {
        self.where_op(column, QueryOperator::NotEqual, value)
    }

    /// Add WHERE condition with greater than
    pub fn where_gt<T: Into<Value>>(self, column: &str, value: T) -> Self {
        self.where_op(column, QueryOperator::GreaterThan, value)
    }

    /// Add WHERE condition with greater than or equal
    pub fn where_gte<T: Into<Value>>(self, column: &str, value: T) -> Self {
        self.where_op(column, QueryOperator::GreaterThanOrEqual, value)
    }

    /// Add WHERE condition with less than
    pub fn where_lt<T: Into<Value>>(self, column: &str, value: T) -> Self {
        self.where_op(column, QueryOperator::LessThan, value)
    }

    /// Add WHERE condition with less than or equal
    pub fn where_lte<T: Into<Value>>(self, column: &str, value: T) -> Self {
        self.where_op(column, QueryOperator::LessThanOrEqual, value)
    }

    /// Add WHERE condition with LIKE
    pub fn where_like(self, column: &str, pattern: &str) -> Self {
        self.where_op(column, QueryOperator::Like, pattern)
    }

    /// Add WHERE condition with NOT LIKE
    pub fn where_not_like(self, column: &str, pattern: &str) -> Self {
        self.where_op(column, QueryOperator::NotLike, pattern)
    }

    /// Add WHERE condition with an explicit operator
    pub fn where_op<T: Into<Value>>(self, column: &str, operator: QueryOperator, value: T) -> Self {
        self.push_where(
            BooleanOperator::And,
            Condition::Basic {
                column: column.to_string(),
                operator,
                value: value.into(),
            },
        )
    }

    /// Add OR WHERE condition with an explicit operator
    pub fn or_where_op<T: Into<Value>>(self, column: &str, operator: QueryOperator, value: T) -> Self {
        self.push_where(
            BooleanOperator::Or,
            Condition::Basic {
                column: column.to_string(),
                operator,
                value: value.into(),
            },
        )
    }

    /// Add OR WHERE condition with equality
    pub fn or_where_eq<T: Into<Value>>(self, column: &str, value: T) -> Self {
        self.or_where_op(column, QueryOperator::Equal, value)
    }

    /// Add WHERE condition with IN
    pub fn where_in<T: Into<Value>>(self, column: &str, values: Vec<T>) -> Self {
        self.push_where(
            BooleanOperator::And,
            Condition::In {
                column: column.to_string(),
                values: values.into_iter().map(Into::into).collect(),
                negated: false,
            },
        )
    }

    /// Add WHERE condition with NOT IN
    pub fn where_not_in<T: Into<Value>>(self, column: &str, values: Vec<T>) -> Self {
        self.push_where(
            BooleanOperator::And,
            Condition::In {
                column: column.to_string(),
                values: values.into_iter().map(Into::into).collect(),
                negated: true,
            },
        )
    }

    /// Add OR WHERE condition with IN
    pub fn or_where_in<T: Into<Value>>(self, column: &str, values: Vec<T>) -> Self {
        self.push_where(
            BooleanOperator::Or,
            Condition::In {
                column: column.to_string(),
                values: values.into_iter().map(Into::into).collect(),
                negated: false,
            },
        )
    }

    /// Add WHERE condition with IS NULL
    pub fn where_null(self, column: &str) -> Self {
        self.push_where(
            BooleanOperator::And,
            Condition::Null {
                column: column.to_string(),
                negated: false,
            },
        )
    }

    /// Add WHERE condition with IS NOT NULL
    pub fn where_not_null(self, column: &str) -> Self {
        self.push_where(
            BooleanOperator::And,
            Condition::Null {
                column: column.to_string(),
                negated: true,
            },
        )
    }

    /// Add OR WHERE condition with IS NULL
    pub fn or_where_null(self, column: &str) -> Self {
        self.push_where(
            BooleanOperator::Or,
            Condition::Null {
                column: column.to_string(),
                negated: false,
            },
        )
    }

    /// Add WHERE condition with BETWEEN
    pub fn where_between<T: Into<Value>>(self, column: &str, start: T, end: T) -> Self {
        self.push_where(
            BooleanOperator::And,
            Condition::Between {
                column: column.to_string(),
                low: start.into(),
                high: end.into(),
                negated: false,
            },
        )
    }

    /// Add WHERE condition with NOT BETWEEN
    pub fn where_not_between<T: Into<Value>>(self, column: &str, start: T, end: T) -> Self {
        self.push_where(
            BooleanOperator::And,
            Condition::Between {
                column: column.to_string(),
                low: start.into(),
                high: end.into(),
                negated: true,
            },
        )
    }

    /// Compare two columns
    pub fn where_column(self, first: &str, operator: QueryOperator, second: &str) -> Self {
        self.push_where(
            BooleanOperator::And,
            Condition::Column {
                first: first.to_string(),
                operator,
                second: second.to_string(),
            },
        )
    }

    /// Add raw WHERE condition; `?` marks are bound in order
    pub fn where_raw(self, sql: &str, bindings: Vec<Value>) -> Self {
        self.push_where(
            BooleanOperator::And,
            Condition::Raw {
                sql: sql.to_string(),
                bindings,
            },
        )
    }

    /// Add raw OR WHERE condition
    pub fn or_where_raw(self, sql: &str, bindings: Vec<Value>) -> Self {
        self.push_where(
            BooleanOperator::Or,
            Condition::Raw {
                sql: sql.to_string(),
                bindings,
            },
        )
    }

    /// Add a parenthesised group of conditions
    pub fn where_group<F>(self, build: F) -> Self
    where
        F: FnOnce(QueryBuilder) -> QueryBuilder,
    {
        let group = build(QueryBuilder::new()).wheres;
        if group.is_empty() {
            return self;
        }
        self.push_where(BooleanOperator::And, Condition::Group(group))
    }

    /// Add a parenthesised group joined with OR
    pub fn or_where_group<F>(self, build: F) -> Self
    where
        F: FnOnce(QueryBuilder) -> QueryBuilder,
    {
        let group = build(QueryBuilder::new()).wheres;
        if group.is_empty() {
            return self;
        }
        self.push_where(BooleanOperator::Or, Condition::Group(group))
    }

    /// Add EXISTS subquery condition
    pub fn where_exists(self, subquery: QueryBuilder) -> Self {
        self.push_where(
            BooleanOperator::And,
            Condition::Exists {
                query: Box::new(subquery),
                negated: false,
            },
        )
    }

    /// Add OR EXISTS subquery condition
    pub fn or_where_exists(self, subquery: QueryBuilder) -> Self {
        self.push_where(
            BooleanOperator::Or,
            Condition::Exists {
                query: Box::new(subquery),
                negated: false,
            },
        )
    }

    /// Add NOT EXISTS subquery condition
    pub fn where_not_exists(self, subquery: QueryBuilder) -> Self {
        self.push_where(
            BooleanOperator::And,
            Condition::Exists {
                query: Box::new(subquery),
                negated: true,
            },
        )
    }

    /// Compare the row count of a subquery against a number
    pub fn where_subquery_count(self, subquery: QueryBuilder, operator: QueryOperator, count: i64) -> Self {
        self.push_where(
            BooleanOperator::And,
            Condition::SubqueryCount {
                query: Box::new(subquery),
                operator,
                count,
            },
        )
    }
}
