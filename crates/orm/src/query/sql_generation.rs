//! Query Builder SQL generation
//!
//! Every statement is rendered through one `SqlWriter` so nested
//! sub-queries share a single binding list and placeholders stay numbered
//! in order for the target dialect.

use indexmap::IndexMap;
use serde_json::Value;

use super::builder::QueryBuilder;
use super::types::*;
use crate::backends::{DatabaseValue, SqlDialect};
use crate::error::QueryError;

/// SQL text with its positional bindings
#[derive(Debug, Clone, PartialEq)]
pub struct CompiledQuery {
    pub sql: String,
    pub bindings: Vec<Value>,
}

impl CompiledQuery {
    /// Bindings converted for the driver
    pub fn database_values(&self) -> Vec<DatabaseValue> {
        self.bindings.iter().map(DatabaseValue::from_json).collect()
    }
}

struct SqlWriter {
    dialect: SqlDialect,
    sql: String,
    bindings: Vec<Value>,
    date_columns: Vec<String>,
}

impl SqlWriter {
    fn new(dialect: SqlDialect) -> Self {
        Self {
            dialect,
            sql: String::new(),
            bindings: Vec::new(),
            date_columns: Vec::new(),
        }
    }

    fn for_query(dialect: SqlDialect, query: &QueryBuilder) -> Self {
        let mut writer = Self::new(dialect);
        writer.date_columns = query.date_columns.clone();
        writer
    }

    fn push(&mut self, fragment: &str) {
        self.sql.push_str(fragment);
    }

    /// Placeholder for `value`. PostgreSQL types every parameter, so a
    /// NULL is written inline instead of as a text-typed parameter.
    fn bind(&mut self, value: Value) -> String {
        if self.dialect == SqlDialect::PostgreSQL && value.is_null() {
            return "NULL".to_string();
        }
        let placeholder = self.dialect.parameter_placeholder(self.bindings.len());
        self.bindings.push(value);
        placeholder
    }

    /// Placeholder for a value compared with or written to `column`.
    /// Date columns get an explicit timestamp cast on PostgreSQL since
    /// dates travel as text.
    fn bind_for(&mut self, column: &str, value: Value) -> String {
        let cast = self.dialect == SqlDialect::PostgreSQL && !value.is_null() && self.is_date_column(column);
        let placeholder = self.bind(value);
        if cast {
            format!("{}::timestamptz", placeholder)
        } else {
            placeholder
        }
    }

    fn is_date_column(&self, column: &str) -> bool {
        let name = column.rsplit('.').next().unwrap_or(column).trim();
        self.date_columns.iter().any(|c| c == name)
    }

    fn push_bind(&mut self, value: Value) {
        let placeholder = self.bind(value);
        self.sql.push_str(&placeholder);
    }

    fn quote(&self, identifier: &str) -> String {
        self.dialect.quote_identifier(identifier)
    }

    fn finish(self) -> CompiledQuery {
        CompiledQuery {
            sql: self.sql,
            bindings: self.bindings,
        }
    }

    fn write_select(&mut self, query: &QueryBuilder) -> Result<(), QueryError> {
        let table = query
            .table
            .as_deref()
            .ok_or_else(|| QueryError::MissingFields("FROM table".to_string()))?;

        let outer_dates = std::mem::replace(&mut self.date_columns, query.date_columns.clone());
        self.push(if query.distinct { "SELECT DISTINCT " } else { "SELECT " });
        if query.columns.is_empty() {
            self.push("*");
        } else {
            let columns: Vec<String> = query
                .columns
                .iter()
                .map(|column| match column {
                    SelectColumn::Column(name) => self.quote(name),
                    SelectColumn::Raw(expression) => expression.clone(),
                })
                .collect();
            self.push(&columns.join(", "));
        }

        self.push(" FROM ");
        let table = self.quote(table);
        self.push(&table);
        self.write_joins(query);
        self.write_wheres(" WHERE ", &query.wheres);
        self.write_group_by(query);
        self.write_wheres(" HAVING ", &query.havings);
        self.write_orders(query);
        self.write_limits(query);
        self.date_columns = outer_dates;
        Ok(())
    }

    fn write_joins(&mut self, query: &QueryBuilder) {
        for join in &query.joins {
            let table = self.quote(&join.table);
            self.push(&format!(" {} {} ON ", join.join_type, table));
            let on: Vec<String> = join
                .on_conditions
                .iter()
                .map(|(left, right)| format!("{} = {}", self.quote(left), self.quote(right)))
                .collect();
            self.push(&on.join(" AND "));
        }
    }

    fn write_group_by(&mut self, query: &QueryBuilder) {
        if query.group_by.is_empty() {
            return;
        }
        let columns: Vec<String> = query.group_by.iter().map(|c| self.quote(c)).collect();
        self.push(" GROUP BY ");
        self.push(&columns.join(", "));
    }

    fn write_orders(&mut self, query: &QueryBuilder) {
        if query.orders.is_empty() {
            return;
        }
        let orders: Vec<String> = query
            .orders
            .iter()
            .map(|order| match order {
                OrderClause::Column(column, direction) => format!("{} {}", self.quote(column), direction),
                OrderClause::Raw(expression) => expression.clone(),
            })
            .collect();
        self.push(" ORDER BY ");
        self.push(&orders.join(", "));
    }

    fn write_limits(&mut self, query: &QueryBuilder) {
        match (query.limit_count, query.offset_value) {
            (Some(limit), Some(offset)) => self.push(&format!(" LIMIT {} OFFSET {}", limit, offset)),
            (Some(limit), None) => self.push(&format!(" LIMIT {}", limit)),
            // SQLite needs a LIMIT before OFFSET
            (None, Some(offset)) => self.push(&format!(" LIMIT -1 OFFSET {}", offset)),
            (None, None) => {}
        }
    }

    fn write_wheres(&mut self, keyword: &str, clauses: &[WhereClause]) {
        if clauses.is_empty() {
            return;
        }
        self.push(keyword);
        self.write_clause_list(clauses);
    }

    fn write_clause_list(&mut self, clauses: &[WhereClause]) {
        for (index, clause) in clauses.iter().enumerate() {
            if index > 0 {
                self.push(&format!(" {} ", clause.boolean));
            }
            self.write_condition(&clause.condition);
        }
    }

    fn write_condition(&mut self, condition: &Condition) {
        match condition {
            Condition::Basic { column, operator, value } => {
                if value.is_null() {
                    let quoted = self.quote(column);
                    match operator {
                        QueryOperator::Equal => return self.push(&format!("{} IS NULL", quoted)),
                        QueryOperator::NotEqual => return self.push(&format!("{} IS NOT NULL", quoted)),
                        _ => {}
                    }
                }
                let placeholder = self.bind_for(column, value.clone());
                let column = self.quote(column);
                self.push(&format!("{} {} {}", column, operator, placeholder));
            }
            Condition::In { column, values, negated } => {
                if values.is_empty() {
                    self.push(if *negated { "1 = 1" } else { "1 = 0" });
                    return;
                }
                let placeholders: Vec<String> = values.iter().map(|v| self.bind_for(column, v.clone())).collect();
                let column = self.quote(column);
                let keyword = if *negated { "NOT IN" } else { "IN" };
                self.push(&format!("{} {} ({})", column, keyword, placeholders.join(", ")));
            }
            Condition::Null { column, negated } => {
                let column = self.quote(column);
                let keyword = if *negated { "IS NOT NULL" } else { "IS NULL" };
                self.push(&format!("{} {}", column, keyword));
            }
            Condition::Between { column, low, high, negated } => {
                let low = self.bind_for(column, low.clone());
                let high = self.bind_for(column, high.clone());
                let column = self.quote(column);
                let keyword = if *negated { "NOT BETWEEN" } else { "BETWEEN" };
                self.push(&format!("{} {} {} AND {}", column, keyword, low, high));
            }
            Condition::Column { first, operator, second } => {
                let fragment = format!("{} {} {}", self.quote(first), operator, self.quote(second));
                self.push(&fragment);
            }
            Condition::Raw { sql, bindings } => self.write_raw(sql, bindings),
            Condition::Exists { query, negated } => {
                self.push(if *negated { "NOT EXISTS (" } else { "EXISTS (" });
                let mut inner = query.as_ref().clone();
                if inner.columns.is_empty() {
                    inner.columns.push(SelectColumn::Raw("1".to_string()));
                }
                self.write_subquery(&inner);
                self.push(")");
            }
            Condition::SubqueryCount { query, operator, count } => {
                self.push("(");
                let mut inner = query.as_ref().clone();
                inner.columns = vec![SelectColumn::Raw("COUNT(*)".to_string())];
                inner.orders.clear();
                self.write_subquery(&inner);
                self.push(&format!(") {} ", operator));
                self.push_bind(Value::from(*count));
            }
            Condition::Group(clauses) => {
                self.push("(");
                self.write_clause_list(clauses);
                self.push(")");
            }
        }
    }

    fn write_subquery(&mut self, query: &QueryBuilder) {
        // A sub-query without a table is a builder bug; render it so the
        // database reports it rather than silently dropping the predicate.
        if self.write_select(query).is_err() {
            self.push("SELECT 1 WHERE 1 = 0");
        }
    }

    fn write_raw(&mut self, sql: &str, bindings: &[Value]) {
        let mut remaining = bindings.iter();
        for ch in sql.chars() {
            if ch == '?' {
                if let Some(value) = remaining.next() {
                    self.push_bind(value.clone());
                    continue;
                }
            }
            self.sql.push(ch);
        }
    }
}

impl QueryBuilder {
    /// Compile a SELECT statement
    pub fn to_select_sql(&self, dialect: SqlDialect) -> Result<CompiledQuery, QueryError> {
        let mut writer = SqlWriter::new(dialect);
        writer.write_select(self)?;
        Ok(writer.finish())
    }

    /// Compile an aggregate over the rows this query matches.
    ///
    /// Grouped or limited queries are wrapped in a derived table so the
    /// aggregate sees exactly the rows the plain select would return.
    pub fn to_aggregate_sql(
        &self,
        dialect: SqlDialect,
        function: AggregateFunction,
        column: Option<&str>,
        distinct: bool,
    ) -> Result<CompiledQuery, QueryError> {
        let target = match column {
            Some(column) => dialect.quote_identifier(column),
            None if function == AggregateFunction::Count => "*".to_string(),
            None => {
                return Err(QueryError::MissingFields(format!("{} requires a column", function)));
            }
        };
        let distinct_keyword = if distinct { "DISTINCT " } else { "" };
        let expression = format!("{}({}{}) AS \"aggregate\"", function, distinct_keyword, target);

        let mut writer = SqlWriter::new(dialect);
        let needs_wrapping = !self.group_by.is_empty()
            || self.limit_count.is_some()
            || self.offset_value.is_some()
            || self.distinct;

        if needs_wrapping {
            writer.push(&format!("SELECT {} FROM (", expression));
            writer.write_select(self)?;
            writer.push(") AS \"aggregate_source\"");
        } else {
            let mut inner = self.clone();
            inner.columns = vec![SelectColumn::Raw(expression)];
            inner.orders.clear();
            writer.write_select(&inner)?;
        }
        Ok(writer.finish())
    }

    /// Compile an UPDATE of the matched rows
    pub fn to_update_sql(
        &self,
        dialect: SqlDialect,
        values: &IndexMap<String, Value>,
    ) -> Result<CompiledQuery, QueryError> {
        if values.is_empty() {
            return Err(QueryError::MissingFields("UPDATE requires at least one column".to_string()));
        }
        let table = self.require_table()?;
        let mut writer = SqlWriter::for_query(dialect, self);
        let table = writer.quote(table);
        writer.push(&format!("UPDATE {} SET ", table));
        for (index, (column, value)) in values.iter().enumerate() {
            if index > 0 {
                writer.push(", ");
            }
            let placeholder = writer.bind_for(column, value.clone());
            let column = writer.quote(column);
            writer.push(&format!("{} = {}", column, placeholder));
        }
        writer.write_wheres(" WHERE ", &self.wheres);
        Ok(writer.finish())
    }

    /// Compile `column = column + amount` over the matched rows
    pub fn to_increment_sql(
        &self,
        dialect: SqlDialect,
        column: &str,
        amount: Value,
        extra: &IndexMap<String, Value>,
    ) -> Result<CompiledQuery, QueryError> {
        let table = self.require_table()?;
        let mut writer = SqlWriter::for_query(dialect, self);
        let table = writer.quote(table);
        let column = writer.quote(column);
        writer.push(&format!("UPDATE {} SET {} = {} + ", table, column, column));
        writer.push_bind(amount);
        for (name, value) in extra {
            let placeholder = writer.bind_for(name, value.clone());
            let name = writer.quote(name);
            writer.push(&format!(", {} = {}", name, placeholder));
        }
        writer.write_wheres(" WHERE ", &self.wheres);
        Ok(writer.finish())
    }

    /// Compile a DELETE of the matched rows
    pub fn to_delete_sql(&self, dialect: SqlDialect) -> Result<CompiledQuery, QueryError> {
        let table = self.require_table()?;
        let mut writer = SqlWriter::for_query(dialect, self);
        let table = writer.quote(table);
        writer.push(&format!("DELETE FROM {}", table));
        writer.write_wheres(" WHERE ", &self.wheres);
        Ok(writer.finish())
    }

    fn require_table(&self) -> Result<&str, QueryError> {
        self.table
            .as_deref()
            .ok_or_else(|| QueryError::MissingFields("table".to_string()))
    }
}

/// Compile an INSERT, optionally returning the stored row
pub fn compile_insert(
    dialect: SqlDialect,
    table: &str,
    values: &IndexMap<String, Value>,
    returning: bool,
) -> CompiledQuery {
    write_insert(SqlWriter::new(dialect), table, values, returning)
}

impl QueryBuilder {
    /// Compile an INSERT into this query's table
    pub fn to_insert_sql(
        &self,
        dialect: SqlDialect,
        values: &IndexMap<String, Value>,
        returning: bool,
    ) -> Result<CompiledQuery, QueryError> {
        let table = self.require_table()?;
        Ok(write_insert(SqlWriter::for_query(dialect, self), table, values, returning))
    }
}

fn write_insert(
    mut writer: SqlWriter,
    table: &str,
    values: &IndexMap<String, Value>,
    returning: bool,
) -> CompiledQuery {
    let table = writer.quote(table);
    writer.push(&format!("INSERT INTO {}", table));

    if values.is_empty() {
        writer.push(" DEFAULT VALUES");
    } else {
        let columns: Vec<String> = values.keys().map(|c| writer.quote(c)).collect();
        let placeholders: Vec<String> = values
            .iter()
            .map(|(column, value)| writer.bind_for(column, value.clone()))
            .collect();
        writer.push(&format!(" ({}) VALUES ({})", columns.join(", "), placeholders.join(", ")));
    }

    if returning {
        writer.push(" RETURNING *");
    }
    writer.finish()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_select_with_wheres_and_limits() {
        let compiled = QueryBuilder::table("users")
            .where_eq("status", "active")
            .or_where_in("role", vec!["admin", "owner"])
            .order_by_desc("id")
            .limit(5)
            .offset(10)
            .to_select_sql(SqlDialect::PostgreSQL)
            .unwrap();

        assert_eq!(
            compiled.sql,
            "SELECT * FROM \"users\" WHERE \"status\" = $1 OR \"role\" IN ($2, $3) ORDER BY \"id\" DESC LIMIT 5 OFFSET 10"
        );
        assert_eq!(compiled.bindings, vec![json!("active"), json!("admin"), json!("owner")]);
    }

    #[test]
    fn test_sqlite_placeholders() {
        let compiled = QueryBuilder::table("users")
            .where_between("age", 18, 30)
            .to_select_sql(SqlDialect::SQLite)
            .unwrap();
        assert_eq!(compiled.sql, "SELECT * FROM \"users\" WHERE \"age\" BETWEEN ? AND ?");
    }

    #[test]
    fn test_group_and_null_equality() {
        let compiled = QueryBuilder::table("posts")
            .where_eq("deleted_at", Value::Null)
            .where_group(|q| q.where_eq("a", 1).or_where_eq("b", 2))
            .to_select_sql(SqlDialect::PostgreSQL)
            .unwrap();
        assert_eq!(
            compiled.sql,
            "SELECT * FROM \"posts\" WHERE \"deleted_at\" IS NULL AND (\"a\" = $1 OR \"b\" = $2)"
        );
    }

    #[test]
    fn test_empty_in_matches_nothing() {
        let compiled = QueryBuilder::table("users")
            .where_in::<i64>("id", vec![])
            .to_select_sql(SqlDialect::SQLite)
            .unwrap();
        assert!(compiled.sql.ends_with("WHERE 1 = 0"));
        assert!(compiled.bindings.is_empty());
    }

    #[test]
    fn test_exists_subquery_shares_placeholders() {
        let sub = QueryBuilder::table("posts")
            .where_column("posts.user_id", QueryOperator::Equal, "users.id")
            .where_eq("posts.published", true);
        let compiled = QueryBuilder::table("users")
            .where_eq("users.active", true)
            .where_exists(sub)
            .where_eq("users.role", "admin")
            .to_select_sql(SqlDialect::PostgreSQL)
            .unwrap();

        assert_eq!(
            compiled.sql,
            "SELECT * FROM \"users\" WHERE \"users\".\"active\" = $1 AND EXISTS (SELECT 1 FROM \"posts\" WHERE \"posts\".\"user_id\" = \"users\".\"id\" AND \"posts\".\"published\" = $2) AND \"users\".\"role\" = $3"
        );
        assert_eq!(compiled.bindings.len(), 3);
    }

    #[test]
    fn test_subquery_count() {
        let sub = QueryBuilder::table("posts").where_column("posts.user_id", QueryOperator::Equal, "users.id");
        let compiled = QueryBuilder::table("users")
            .where_subquery_count(sub, QueryOperator::GreaterThanOrEqual, 2)
            .to_select_sql(SqlDialect::SQLite)
            .unwrap();
        assert_eq!(
            compiled.sql,
            "SELECT * FROM \"users\" WHERE (SELECT COUNT(*) FROM \"posts\" WHERE \"posts\".\"user_id\" = \"users\".\"id\") >= ?"
        );
        assert_eq!(compiled.bindings, vec![json!(2)]);
    }

    #[test]
    fn test_raw_bindings_are_renumbered() {
        let compiled = QueryBuilder::table("users")
            .where_eq("a", 1)
            .where_raw("score > ? AND score < ?", vec![json!(10), json!(20)])
            .to_select_sql(SqlDialect::PostgreSQL)
            .unwrap();
        assert_eq!(
            compiled.sql,
            "SELECT * FROM \"users\" WHERE \"a\" = $1 AND score > $2 AND score < $3"
        );
    }

    #[test]
    fn test_aggregate_sql() {
        let query = QueryBuilder::table("users").where_eq("active", true).order_by_desc("id");
        let count = query
            .to_aggregate_sql(SqlDialect::SQLite, AggregateFunction::Count, None, false)
            .unwrap();
        assert_eq!(
            count.sql,
            "SELECT COUNT(*) AS \"aggregate\" FROM \"users\" WHERE \"active\" = ?"
        );

        let distinct = query
            .to_aggregate_sql(SqlDialect::SQLite, AggregateFunction::Count, Some("email"), true)
            .unwrap();
        assert!(distinct.sql.starts_with("SELECT COUNT(DISTINCT \"email\") AS \"aggregate\""));

        assert!(query
            .to_aggregate_sql(SqlDialect::SQLite, AggregateFunction::Sum, None, false)
            .is_err());
    }

    #[test]
    fn test_aggregate_wraps_limited_query() {
        let compiled = QueryBuilder::table("users")
            .limit(2)
            .to_aggregate_sql(SqlDialect::SQLite, AggregateFunction::Count, None, false)
            .unwrap();
        assert_eq!(
            compiled.sql,
            "SELECT COUNT(*) AS \"aggregate\" FROM (SELECT * FROM \"users\" LIMIT 2) AS \"aggregate_source\""
        );
    }

    #[test]
    fn test_insert_update_delete() {
        let mut values = IndexMap::new();
        values.insert("name".to_string(), json!("virk"));
        values.insert("age".to_string(), json!(30));

        let insert = compile_insert(SqlDialect::PostgreSQL, "users", &values, true);
        assert_eq!(
            insert.sql,
            "INSERT INTO \"users\" (\"name\", \"age\") VALUES ($1, $2) RETURNING *"
        );

        let update = QueryBuilder::table("users")
            .where_eq("id", 1)
            .to_update_sql(SqlDialect::PostgreSQL, &values)
            .unwrap();
        assert_eq!(
            update.sql,
            "UPDATE \"users\" SET \"name\" = $1, \"age\" = $2 WHERE \"id\" = $3"
        );

        let delete = QueryBuilder::table("users")
            .where_in("id", vec![1, 2])
            .to_delete_sql(SqlDialect::SQLite)
            .unwrap();
        assert_eq!(delete.sql, "DELETE FROM \"users\" WHERE \"id\" IN (?, ?)");

        assert!(QueryBuilder::table("users")
            .to_update_sql(SqlDialect::SQLite, &IndexMap::new())
            .is_err());
    }

    #[test]
    fn test_increment_sql() {
        let compiled = QueryBuilder::table("posts")
            .where_eq("id", 7)
            .to_increment_sql(SqlDialect::PostgreSQL, "views", json!(1), &IndexMap::new())
            .unwrap();
        assert_eq!(
            compiled.sql,
            "UPDATE \"posts\" SET \"views\" = \"views\" + $1 WHERE \"id\" = $2"
        );
    }

    #[test]
    fn test_join_rendering() {
        let compiled = QueryBuilder::table("users")
            .select(["users.*"])
            .join("posts", "posts.user_id", "users.id")
            .to_select_sql(SqlDialect::SQLite)
            .unwrap();
        assert_eq!(
            compiled.sql,
            "SELECT \"users\".* FROM \"users\" INNER JOIN \"posts\" ON \"posts\".\"user_id\" = \"users\".\"id\""
        );
    }

    #[test]
    fn test_postgres_writes_null_inline() {
        let mut values = IndexMap::new();
        values.insert("email".to_string(), json!("n@y.z"));
        values.insert("age".to_string(), Value::Null);

        let insert = compile_insert(SqlDialect::PostgreSQL, "users", &values, true);
        assert_eq!(
            insert.sql,
            "INSERT INTO \"users\" (\"email\", \"age\") VALUES ($1, NULL) RETURNING *"
        );
        assert_eq!(insert.bindings, vec![json!("n@y.z")]);

        let update = QueryBuilder::table("users")
            .where_eq("id", 1)
            .to_update_sql(SqlDialect::PostgreSQL, &values)
            .unwrap();
        assert_eq!(
            update.sql,
            "UPDATE \"users\" SET \"email\" = $1, \"age\" = NULL WHERE \"id\" = $2"
        );

        let sqlite = compile_insert(SqlDialect::SQLite, "users", &values, false);
        assert_eq!(sqlite.sql, "INSERT INTO \"users\" (\"email\", \"age\") VALUES (?, ?)");
        assert_eq!(sqlite.bindings.len(), 2);
    }

    #[test]
    fn test_postgres_casts_date_columns() {
        let mut values = IndexMap::new();
        values.insert("email".to_string(), json!("a@b.c"));
        values.insert("created_at".to_string(), json!("2024-05-17 09:30:00"));

        let builder = QueryBuilder::table("users").date_columns(["created_at", "updated_at"]);
        let insert = builder.to_insert_sql(SqlDialect::PostgreSQL, &values, true).unwrap();
        assert_eq!(
            insert.sql,
            "INSERT INTO \"users\" (\"email\", \"created_at\") VALUES ($1, $2::timestamptz) RETURNING *"
        );

        let select = builder
            .clone()
            .where_gt("users.updated_at", "2024-01-01 00:00:00")
            .where_between("created_at", "2024-01-01", "2024-12-31")
            .to_select_sql(SqlDialect::PostgreSQL)
            .unwrap();
        assert_eq!(
            select.sql,
            "SELECT * FROM \"users\" WHERE \"users\".\"updated_at\" > $1::timestamptz AND \"created_at\" BETWEEN $2::timestamptz AND $3::timestamptz"
        );

        let sqlite = builder.to_insert_sql(SqlDialect::SQLite, &values, false).unwrap();
        assert_eq!(sqlite.sql, "INSERT INTO \"users\" (\"email\", \"created_at\") VALUES (?, ?)");
    }

    #[test]
    fn test_subquery_uses_its_own_date_columns() {
        let sub = QueryBuilder::table("posts")
            .date_columns(["published_at"])
            .where_column("posts.user_id", QueryOperator::Equal, "users.id")
            .where_gt("published_at", "2024-01-01 00:00:00");
        let compiled = QueryBuilder::table("users")
            .date_columns(["created_at"])
            .where_exists(sub)
            .where_gt("published_at", "2024-01-01 00:00:00")
            .to_select_sql(SqlDialect::PostgreSQL)
            .unwrap();
        assert_eq!(
            compiled.sql,
            "SELECT * FROM \"users\" WHERE EXISTS (SELECT 1 FROM \"posts\" WHERE \"posts\".\"user_id\" = \"users\".\"id\" AND \"published_at\" > $1::timestamptz) AND \"published_at\" > $2"
        );
    }
}
