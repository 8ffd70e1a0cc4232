//! Query Builder ordering operations

use super::builder::QueryBuilder;
use super::types::*;

impl QueryBuilder {
    /// Add ORDER BY clause
    pub fn order_by(mut self, column: &str, direction: OrderDirection) -> Self {
        self.orders.push(OrderClause::Column(column.to_string(), direction));
        self
    }

    /// Add ORDER BY ... DESC clause
    pub fn order_by_desc(self, column: &str) -> Self {
        self.order_by(column, OrderDirection::Desc)
    }

    /// Add a raw ORDER BY expression
    pub fn order_by_raw(mut self, expression: &str) -> Self {
        self.orders.push(OrderClause::Raw(expression.to_string()));
        self
    }

    /// Whether any ordering has been applied
    pub fn has_ordering(&self) -> bool {
        !self.orders.is_empty()
    }
}
