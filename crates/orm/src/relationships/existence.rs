//! Relationship existence filters (`has`, `where_has`, ...)
//!
//! Each filter compiles to a sub-query over the related table correlated
//! with the outer table, wrapped in `EXISTS` or compared by count.

use super::resolver::RelationPlan;
use crate::error::ModelResult;
use crate::query::{BooleanOperator, Condition, ModelQuery, QueryBuilder, QueryOperator};

impl ModelQuery {
    fn existence_subquery<F>(&self, relation: &str, constraint: Option<F>) -> ModelResult<QueryBuilder>
    where
        F: FnOnce(ModelQuery) -> ModelQuery,
    {
        let plan = RelationPlan::resolve(&self.definition, relation, &self.db)?;
        let correlated = plan.correlated_query(
            &self.db,
            self.transaction.as_ref(),
            self.definition.table_name(),
        );
        if let Some(error) = correlated.error {
            return Err(error);
        }

        let Some(constraint) = constraint else {
            return Ok(correlated.builder);
        };

        // Caller conditions are grouped so an OR inside them cannot escape
        // the correlation
        let scoped = constraint(ModelQuery::new(
            plan.related.clone(),
            self.db.clone(),
            self.transaction.clone(),
        ));
        if let Some(error) = scoped.error {
            return Err(error);
        }
        let mut builder = correlated.builder;
        builder.joins.extend(scoped.builder.joins);
        if !scoped.builder.wheres.is_empty() {
            builder = builder.push_where(BooleanOperator::And, Condition::Group(scoped.builder.wheres));
        }
        Ok(builder)
    }

    fn with_existence<F, G>(self, relation: &str, constraint: Option<F>, attach: G) -> Self
    where
        F: FnOnce(ModelQuery) -> ModelQuery,
        G: FnOnce(QueryBuilder, QueryBuilder) -> QueryBuilder,
    {
        match self.existence_subquery(relation, constraint) {
            Ok(subquery) => self.with_builder(|b| attach(b, subquery)),
            Err(error) => self.fail(error),
        }
    }

    /// Rows with at least one related row
    pub fn has(self, relation: &str) -> Self {
        self.with_existence(relation, None::<fn(ModelQuery) -> ModelQuery>, |b, sub| b.where_exists(sub))
    }

    /// Rows whose related row count compares to `count`, e.g. `(">=", 2)`
    pub fn has_count(self, relation: &str, operator: &str, count: i64) -> Self {
        let operator = match QueryOperator::parse(operator) {
            Ok(operator) => operator,
            Err(error) => return self.fail(error.into()),
        };
        self.with_existence(relation, None::<fn(ModelQuery) -> ModelQuery>, |b, sub| {
            b.where_subquery_count(sub, operator, count)
        })
    }

    /// Rows without any related row
    pub fn doesnt_have(self, relation: &str) -> Self {
        self.with_existence(relation, None::<fn(ModelQuery) -> ModelQuery>, |b, sub| {
            b.where_not_exists(sub)
        })
    }

    /// Rows with a related row matching the constraint
    pub fn where_has<F>(self, relation: &str, constraint: F) -> Self
    where
        F: FnOnce(ModelQuery) -> ModelQuery,
    {
        self.with_existence(relation, Some(constraint), |b, sub| b.where_exists(sub))
    }

    pub fn or_where_has<F>(self, relation: &str, constraint: F) -> Self
    where
        F: FnOnce(ModelQuery) -> ModelQuery,
    {
        self.with_existence(relation, Some(constraint), |b, sub| b.or_where_exists(sub))
    }

    /// Rows with no related row matching the constraint
    pub fn where_doesnt_have<F>(self, relation: &str, constraint: F) -> Self
    where
        F: FnOnce(ModelQuery) -> ModelQuery,
    {
        self.with_existence(relation, Some(constraint), |b, sub| b.where_not_exists(sub))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backends::SqlDialect;

    #[test]
    fn test_grouped_constraint_sql() {
        let correlated = QueryBuilder::table("posts").where_column("posts.user_id", QueryOperator::Equal, "users.id");
        let scoped = QueryBuilder::new().where_eq("status", "draft").or_where_eq("status", "review");
        let sub = correlated.push_where(BooleanOperator::And, Condition::Group(scoped.wheres));

        let compiled = QueryBuilder::table("users")
            .where_exists(sub)
            .to_select_sql(SqlDialect::PostgreSQL)
            .unwrap();
        assert_eq!(
            compiled.sql,
            "SELECT * FROM \"users\" WHERE EXISTS (SELECT 1 FROM \"posts\" WHERE \"posts\".\"user_id\" = \"users\".\"id\" AND (\"status\" = $1 OR \"status\" = $2))"
        );
    }
}
