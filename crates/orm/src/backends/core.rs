//! Core Database Backend Traits
//!
//! This module defines the storage capability the model layer consumes: a
//! pool that executes parameterised statements and hands out transactions.
//! SQL dialect specifics stay behind `SqlDialect` and the backend
//! implementations.

use std::collections::HashMap;
use std::sync::Arc;
use async_trait::async_trait;
use indexmap::IndexMap;
use serde_json::Value as JsonValue;

use crate::backends::DatabaseBackendType;
use crate::config::PoolConfig;
use crate::error::{OrmError, OrmResult};

/// Abstract database transaction trait
#[async_trait]
pub trait DatabaseTransaction: Send {
    /// Execute a query within the transaction
    async fn execute(&mut self, sql: &str, params: &[DatabaseValue]) -> OrmResult<u64>;

    /// Execute a query and return result rows within the transaction
    async fn fetch_all(&mut self, sql: &str, params: &[DatabaseValue]) -> OrmResult<Vec<DatabaseRow>>;

    /// Execute a query and return the first result row within the transaction
    async fn fetch_optional(&mut self, sql: &str, params: &[DatabaseValue]) -> OrmResult<Option<DatabaseRow>>;

    /// Commit the transaction
    async fn commit(self: Box<Self>) -> OrmResult<()>;

    /// Rollback the transaction
    async fn rollback(self: Box<Self>) -> OrmResult<()>;
}

/// Abstract database connection pool trait
#[async_trait]
pub trait DatabasePool: Send + Sync {
    /// Begin a transaction from the pool
    async fn begin_transaction(&self) -> OrmResult<Box<dyn DatabaseTransaction>>;

    /// Execute a query directly on the pool
    async fn execute(&self, sql: &str, params: &[DatabaseValue]) -> OrmResult<u64>;

    /// Execute a query and return result rows directly on the pool
    async fn fetch_all(&self, sql: &str, params: &[DatabaseValue]) -> OrmResult<Vec<DatabaseRow>>;

    /// Execute a query and return the first result row directly on the pool
    async fn fetch_optional(&self, sql: &str, params: &[DatabaseValue]) -> OrmResult<Option<DatabaseRow>>;

    /// Close the pool
    async fn close(&self) -> OrmResult<()>;

    /// Get pool statistics
    fn stats(&self) -> DatabasePoolStats;

    /// Perform a health check on the pool
    async fn health_check(&self) -> OrmResult<std::time::Duration>;
}

/// Database pool statistics
#[derive(Debug, Clone)]
pub struct DatabasePoolStats {
    pub total_connections: u32,
    pub idle_connections: u32,
    pub active_connections: u32,
}

/// A fetched row, decoded eagerly so it can outlive the driver connection.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct DatabaseRow {
    columns: Vec<String>,
    values: Vec<DatabaseValue>,
}

impl DatabaseRow {
    pub fn new(columns: Vec<String>, values: Vec<DatabaseValue>) -> Self {
        debug_assert_eq!(columns.len(), values.len());
        Self { columns, values }
    }

    /// Get a column value by name
    pub fn get_by_name(&self, name: &str) -> Option<&DatabaseValue> {
        self.columns
            .iter()
            .position(|column| column == name)
            .and_then(|index| self.values.get(index))
    }

    /// Convert row to JSON values keyed by column, in select order
    pub fn to_json_map(&self) -> IndexMap<String, JsonValue> {
        self.columns
            .iter()
            .cloned()
            .zip(self.values.iter().map(DatabaseValue::to_json))
            .collect()
    }

    /// Convert row to a JSON object
    pub fn to_json(&self) -> JsonValue {
        JsonValue::Object(self.to_json_map().into_iter().collect())
    }
}

/// Database value enumeration for type-safe parameter binding
#[derive(Debug, Clone, PartialEq)]
pub enum DatabaseValue {
    Null,
    Bool(bool),
    Int32(i32),
    Int64(i64),
    Float32(f32),
    Float64(f64),
    String(String),
    Bytes(Vec<u8>),
    Uuid(uuid::Uuid),
    DateTime(chrono::DateTime<chrono::Utc>),
    Date(chrono::NaiveDate),
    Time(chrono::NaiveTime),
    Json(JsonValue),
    Array(Vec<DatabaseValue>),
}

impl DatabaseValue {
    /// Check if the value is null
    pub fn is_null(&self) -> bool {
        matches!(self, DatabaseValue::Null)
    }

    /// Convert to JSON value
    pub fn to_json(&self) -> JsonValue {
        match self {
            DatabaseValue::Null => JsonValue::Null,
            DatabaseValue::Bool(b) => JsonValue::Bool(*b),
            DatabaseValue::Int32(i) => JsonValue::Number(serde_json::Number::from(*i)),
            DatabaseValue::Int64(i) => JsonValue::Number(serde_json::Number::from(*i)),
            DatabaseValue::Float32(f) => serde_json::Number::from_f64(*f as f64)
                .map(JsonValue::Number)
                .unwrap_or(JsonValue::Null),
            DatabaseValue::Float64(f) => serde_json::Number::from_f64(*f)
                .map(JsonValue::Number)
                .unwrap_or(JsonValue::Null),
            DatabaseValue::String(s) => JsonValue::String(s.clone()),
            DatabaseValue::Bytes(b) => JsonValue::Array(b.iter().map(|&x| JsonValue::Number(serde_json::Number::from(x))).collect()),
            DatabaseValue::Uuid(u) => JsonValue::String(u.to_string()),
            DatabaseValue::DateTime(dt) => JsonValue::String(dt.to_rfc3339()),
            DatabaseValue::Date(d) => JsonValue::String(d.to_string()),
            DatabaseValue::Time(t) => JsonValue::String(t.to_string()),
            DatabaseValue::Json(j) => j.clone(),
            DatabaseValue::Array(arr) => JsonValue::Array(arr.iter().map(|v| v.to_json()).collect()),
        }
    }

    /// Create a bind value from an attribute value. Strings are kept as
    /// strings; date normalisation happens on the model write path.
    pub fn from_json(json: &JsonValue) -> Self {
        match json {
            JsonValue::Null => DatabaseValue::Null,
            JsonValue::Bool(b) => DatabaseValue::Bool(*b),
            JsonValue::Number(n) => {
                if let Some(i) = n.as_i64() {
                    DatabaseValue::Int64(i)
                } else if let Some(f) = n.as_f64() {
                    DatabaseValue::Float64(f)
                } else {
                    DatabaseValue::Null
                }
            }
            JsonValue::String(s) => DatabaseValue::String(s.clone()),
            JsonValue::Array(arr) => DatabaseValue::Array(arr.iter().map(DatabaseValue::from_json).collect()),
            JsonValue::Object(_) => DatabaseValue::Json(json.clone()),
        }
    }
}

impl From<bool> for DatabaseValue {
    fn from(value: bool) -> Self {
        DatabaseValue::Bool(value)
    }
}

impl From<i32> for DatabaseValue {
    fn from(value: i32) -> Self {
        DatabaseValue::Int32(value)
    }
}

impl From<i64> for DatabaseValue {
    fn from(value: i64) -> Self {
        DatabaseValue::Int64(value)
    }
}

impl From<f64> for DatabaseValue {
    fn from(value: f64) -> Self {
        DatabaseValue::Float64(value)
    }
}

impl From<String> for DatabaseValue {
    fn from(value: String) -> Self {
        DatabaseValue::String(value)
    }
}

impl From<&str> for DatabaseValue {
    fn from(value: &str) -> Self {
        DatabaseValue::String(value.to_string())
    }
}

impl From<Vec<u8>> for DatabaseValue {
    fn from(value: Vec<u8>) -> Self {
        DatabaseValue::Bytes(value)
    }
}

impl From<uuid::Uuid> for DatabaseValue {
    fn from(value: uuid::Uuid) -> Self {
        DatabaseValue::Uuid(value)
    }
}

impl From<chrono::DateTime<chrono::Utc>> for DatabaseValue {
    fn from(value: chrono::DateTime<chrono::Utc>) -> Self {
        DatabaseValue::DateTime(value)
    }
}

impl From<JsonValue> for DatabaseValue {
    fn from(value: JsonValue) -> Self {
        DatabaseValue::from_json(&value)
    }
}

impl<T> From<Option<T>> for DatabaseValue
where
    T: Into<DatabaseValue>,
{
    fn from(value: Option<T>) -> Self {
        match value {
            Some(v) => v.into(),
            None => DatabaseValue::Null,
        }
    }
}

/// SQL dialect enumeration for generating database-specific SQL
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SqlDialect {
    PostgreSQL,
    SQLite,
}

impl SqlDialect {
    /// Get the parameter placeholder for the zero-based binding index
    pub fn parameter_placeholder(&self, index: usize) -> String {
        match self {
            SqlDialect::PostgreSQL => format!("${}", index + 1),
            SqlDialect::SQLite => "?".to_string(),
        }
    }

    /// Quote an identifier, handling `table.column`, `*` and `expr AS alias`
    pub fn quote_identifier(&self, identifier: &str) -> String {
        let trimmed = identifier.trim();
        if let Some(position) = find_alias(trimmed) {
            let (expr, alias) = (&trimmed[..position], &trimmed[position + 4..]);
            return format!("{} AS {}", self.quote_identifier(expr), self.quote_segment(alias.trim()));
        }

        trimmed
            .split('.')
            .map(|segment| self.quote_segment(segment))
            .collect::<Vec<_>>()
            .join(".")
    }

    fn quote_segment(&self, segment: &str) -> String {
        if segment == "*" {
            return segment.to_string();
        }
        // both dialects quote with double quotes
        format!("\"{}\"", segment.replace('"', "\"\""))
    }
}

fn find_alias(identifier: &str) -> Option<usize> {
    identifier.to_ascii_lowercase().find(" as ")
}

/// Database backend trait that provides database-specific implementations
#[async_trait]
pub trait DatabaseBackend: Send + Sync {
    /// Create a connection pool from a database URL
    async fn create_pool(&self, database_url: &str, config: &PoolConfig) -> OrmResult<Arc<dyn DatabasePool>>;

    /// Get the SQL dialect used by this backend
    fn sql_dialect(&self) -> SqlDialect;

    /// Get the backend type
    fn backend_type(&self) -> DatabaseBackendType;

    /// Validate a database URL for this backend
    fn validate_database_url(&self, url: &str) -> OrmResult<()>;
}

/// Database backend registry for managing multiple backend implementations
pub struct DatabaseBackendRegistry {
    backends: HashMap<DatabaseBackendType, Arc<dyn DatabaseBackend>>,
}

impl DatabaseBackendRegistry {
    /// Create a new backend registry
    pub fn new() -> Self {
        Self {
            backends: HashMap::new(),
        }
    }

    /// Registry with the SQLite and PostgreSQL backends installed
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        registry.register(DatabaseBackendType::SQLite, Arc::new(crate::backends::SqliteBackend::new()));
        registry.register(DatabaseBackendType::PostgreSQL, Arc::new(crate::backends::PostgresBackend::new()));
        registry
    }

    /// Register a database backend
    pub fn register(&mut self, backend_type: DatabaseBackendType, backend: Arc<dyn DatabaseBackend>) {
        self.backends.insert(backend_type, backend);
    }

    /// Get a database backend by type
    pub fn get(&self, backend_type: &DatabaseBackendType) -> Option<Arc<dyn DatabaseBackend>> {
        self.backends.get(backend_type).cloned()
    }

    /// Create a connection pool using the appropriate backend for the given URL
    pub async fn create_pool(&self, database_url: &str, config: &PoolConfig) -> OrmResult<(Arc<dyn DatabasePool>, SqlDialect)> {
        let backend_type = Self::detect_backend_from_url(database_url)?;
        let backend = self.get(&backend_type)
            .ok_or_else(|| OrmError::Connection(format!("No backend registered for {}", backend_type)))?;

        backend.validate_database_url(database_url)?;
        let pool = backend.create_pool(database_url, config).await?;
        Ok((pool, backend.sql_dialect()))
    }

    /// Detect database backend type from URL
    pub fn detect_backend_from_url(url: &str) -> OrmResult<DatabaseBackendType> {
        if url.starts_with("postgresql://") || url.starts_with("postgres://") {
            Ok(DatabaseBackendType::PostgreSQL)
        } else if url.starts_with("sqlite:") || url.starts_with("file:") {
            Ok(DatabaseBackendType::SQLite)
        } else {
            Err(OrmError::Connection(format!("Unable to detect database backend from URL: {}", url)))
        }
    }
}

impl Default for DatabaseBackendRegistry {
    fn default() -> Self {
        Self::with_defaults()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_quote_identifier_variants() {
        let dialect = SqlDialect::SQLite;
        assert_eq!(dialect.quote_identifier("users"), "\"users\"");
        assert_eq!(dialect.quote_identifier("users.id"), "\"users\".\"id\"");
        assert_eq!(dialect.quote_identifier("posts.*"), "\"posts\".*");
        assert_eq!(
            dialect.quote_identifier("skill_user.user_id as pivot_user_id"),
            "\"skill_user\".\"user_id\" AS \"pivot_user_id\""
        );
    }

    #[test]
    fn test_placeholders_per_dialect() {
        assert_eq!(SqlDialect::PostgreSQL.parameter_placeholder(0), "$1");
        assert_eq!(SqlDialect::PostgreSQL.parameter_placeholder(4), "$5");
        assert_eq!(SqlDialect::SQLite.parameter_placeholder(4), "?");
    }

    #[test]
    fn test_from_json_keeps_strings() {
        let value = DatabaseValue::from_json(&json!("2024-01-01T00:00:00Z"));
        assert_eq!(value, DatabaseValue::String("2024-01-01T00:00:00Z".to_string()));
        assert_eq!(DatabaseValue::from_json(&json!(7)), DatabaseValue::Int64(7));
        assert_eq!(DatabaseValue::from_json(&json!(null)), DatabaseValue::Null);
    }

    #[test]
    fn test_row_accessors() {
        let row = DatabaseRow::new(
            vec!["id".to_string(), "country".to_string()],
            vec![DatabaseValue::Int64(1), DatabaseValue::String("ind".into())],
        );
        assert_eq!(row.get_by_name("country"), Some(&DatabaseValue::String("ind".into())));
        assert_eq!(row.get_by_name("missing"), None);
        assert_eq!(row.to_json(), json!({"id": 1, "country": "ind"}));
    }

    #[test]
    fn test_detect_backend_from_url() {
        assert_eq!(
            DatabaseBackendRegistry::detect_backend_from_url("sqlite::memory:").unwrap(),
            DatabaseBackendType::SQLite
        );
        assert_eq!(
            DatabaseBackendRegistry::detect_backend_from_url("postgres://localhost/app").unwrap(),
            DatabaseBackendType::PostgreSQL
        );
        assert!(DatabaseBackendRegistry::detect_backend_from_url("mysql://localhost/app").is_err());
    }
}
