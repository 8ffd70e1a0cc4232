//! SQLite Backend Implementation
//!
//! SQLite implementation of the backend traits using sqlx. In-memory
//! databases live only as long as their connection, so an in-memory URL
//! always gets a single connection that never idles out.

use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;
use async_trait::async_trait;
use sqlx::sqlite::{SqliteArguments, SqliteConnectOptions, SqlitePoolOptions, SqliteRow};
use sqlx::{Column, Pool, Row, Sqlite, TypeInfo, ValueRef};

use crate::backends::DatabaseBackendType;
use crate::config::PoolConfig;
use crate::error::{OrmError, OrmResult};
use super::core::*;

type SqliteQuery<'q> = sqlx::query::Query<'q, Sqlite, SqliteArguments<'q>>;

/// SQLite database backend implementation
#[derive(Debug, Default)]
pub struct SqliteBackend;

impl SqliteBackend {
    /// Create a new SQLite backend instance
    pub fn new() -> Self {
        Self
    }

    fn is_in_memory(url: &str) -> bool {
        url.contains(":memory:") || url.contains("mode=memory")
    }
}

#[async_trait]
impl DatabaseBackend for SqliteBackend {
    async fn create_pool(&self, database_url: &str, config: &PoolConfig) -> OrmResult<Arc<dyn DatabasePool>> {
        let connect_options = SqliteConnectOptions::from_str(database_url)
            .map_err(|e| OrmError::Connection(format!("Invalid SQLite URL: {}", e)))?
            .create_if_missing(true);

        let mut options = SqlitePoolOptions::new()
            .acquire_timeout(Duration::from_secs(config.acquire_timeout))
            .test_before_acquire(config.test_before_acquire);

        if Self::is_in_memory(database_url) {
            options = options
                .max_connections(1)
                .min_connections(1)
                .idle_timeout(None)
                .max_lifetime(None);
        } else {
            options = options
                .max_connections(config.max_connections)
                .min_connections(config.min_connections)
                .idle_timeout(config.idle_timeout.map(Duration::from_secs))
                .max_lifetime(config.max_lifetime.map(Duration::from_secs));
        }

        let sqlx_pool = options.connect_with(connect_options)
            .await
            .map_err(|e| OrmError::Connection(format!("Failed to create SQLite pool: {}", e)))?;

        tracing::debug!("SQLite pool created for {}", database_url);
        Ok(Arc::new(SqlitePool::new(sqlx_pool)))
    }

    fn sql_dialect(&self) -> SqlDialect {
        SqlDialect::SQLite
    }

    fn backend_type(&self) -> DatabaseBackendType {
        DatabaseBackendType::SQLite
    }

    fn validate_database_url(&self, url: &str) -> OrmResult<()> {
        if !url.starts_with("sqlite:") && !url.starts_with("file:") {
            return Err(OrmError::Connection("Invalid SQLite URL scheme".to_string()));
        }
        Ok(())
    }
}

/// SQLite connection pool implementation
pub struct SqlitePool {
    pool: Pool<Sqlite>,
}

impl SqlitePool {
    pub fn new(pool: Pool<Sqlite>) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl DatabasePool for SqlitePool {
    async fn begin_transaction(&self) -> OrmResult<Box<dyn DatabaseTransaction>> {
        let tx = self.pool.begin()
            .await
            .map_err(|e| OrmError::Transaction(format!("Failed to begin transaction: {}", e)))?;

        Ok(Box::new(SqliteTransaction::new(tx)))
    }

    async fn execute(&self, sql: &str, params: &[DatabaseValue]) -> OrmResult<u64> {
        let query = bind_all(sqlx::query(sql), params)?;

        let result = query.execute(&self.pool).await?;

        Ok(result.rows_affected())
    }

    async fn fetch_all(&self, sql: &str, params: &[DatabaseValue]) -> OrmResult<Vec<DatabaseRow>> {
        let query = bind_all(sqlx::query(sql), params)?;

        let rows = query.fetch_all(&self.pool).await?;

        rows.iter().map(sqlite_row_to_database_row).collect()
    }

    async fn fetch_optional(&self, sql: &str, params: &[DatabaseValue]) -> OrmResult<Option<DatabaseRow>> {
        let query = bind_all(sqlx::query(sql), params)?;

        let row = query.fetch_optional(&self.pool).await?;

        row.as_ref().map(sqlite_row_to_database_row).transpose()
    }

    async fn close(&self) -> OrmResult<()> {
        self.pool.close().await;
        Ok(())
    }

    fn stats(&self) -> DatabasePoolStats {
        let total = self.pool.size();
        let idle = self.pool.num_idle() as u32;

        DatabasePoolStats {
            total_connections: total,
            idle_connections: idle,
            active_connections: total.saturating_sub(idle),
        }
    }

    async fn health_check(&self) -> OrmResult<Duration> {
        let start = std::time::Instant::now();

        sqlx::query("SELECT 1")
            .execute(&self.pool)
            .await
            .map_err(|e| OrmError::Connection(format!("Health check failed: {}", e)))?;

        Ok(start.elapsed())
    }
}

/// SQLite transaction implementation
pub struct SqliteTransaction {
    tx: Option<sqlx::Transaction<'static, Sqlite>>,
}

impl SqliteTransaction {
    pub fn new(tx: sqlx::Transaction<'static, Sqlite>) -> Self {
        Self { tx: Some(tx) }
    }

    fn active(&mut self) -> OrmResult<&mut sqlx::Transaction<'static, Sqlite>> {
        self.tx.as_mut().ok_or_else(|| OrmError::Transaction("Transaction already completed".to_string()))
    }
}

#[async_trait]
impl DatabaseTransaction for SqliteTransaction {
    async fn execute(&mut self, sql: &str, params: &[DatabaseValue]) -> OrmResult<u64> {
        let query = bind_all(sqlx::query(sql), params)?;
        let tx = self.active()?;

        let result = query.execute(&mut **tx).await?;

        Ok(result.rows_affected())
    }

    async fn fetch_all(&mut self, sql: &str, params: &[DatabaseValue]) -> OrmResult<Vec<DatabaseRow>> {
        let query = bind_all(sqlx::query(sql), params)?;
        let tx = self.active()?;

        let rows = query.fetch_all(&mut **tx).await?;

        rows.iter().map(sqlite_row_to_database_row).collect()
    }

    async fn fetch_optional(&mut self, sql: &str, params: &[DatabaseValue]) -> OrmResult<Option<DatabaseRow>> {
        let query = bind_all(sqlx::query(sql), params)?;
        let tx = self.active()?;

        let row = query.fetch_optional(&mut **tx).await?;

        row.as_ref().map(sqlite_row_to_database_row).transpose()
    }

    async fn commit(mut self: Box<Self>) -> OrmResult<()> {
        let tx = self.tx.take().ok_or_else(|| OrmError::Transaction("Transaction already completed".to_string()))?;

        tx.commit()
            .await
            .map_err(|e| OrmError::Transaction(format!("Transaction commit failed: {}", e)))
    }

    async fn rollback(mut self: Box<Self>) -> OrmResult<()> {
        let tx = self.tx.take().ok_or_else(|| OrmError::Transaction("Transaction already completed".to_string()))?;

        tx.rollback()
            .await
            .map_err(|e| OrmError::Transaction(format!("Transaction rollback failed: {}", e)))
    }
}

fn bind_all<'q>(mut query: SqliteQuery<'q>, params: &[DatabaseValue]) -> OrmResult<SqliteQuery<'q>> {
    for param in params {
        query = bind_database_value(query, param)?;
    }
    Ok(query)
}

/// Bind a DatabaseValue to a sqlx query. Types SQLite has no storage class
/// for are bound as their text form.
fn bind_database_value<'q>(query: SqliteQuery<'q>, value: &DatabaseValue) -> OrmResult<SqliteQuery<'q>> {
    match value {
        DatabaseValue::Null => Ok(query.bind(Option::<String>::None)),
        DatabaseValue::Bool(b) => Ok(query.bind(*b)),
        DatabaseValue::Int32(i) => Ok(query.bind(*i)),
        DatabaseValue::Int64(i) => Ok(query.bind(*i)),
        DatabaseValue::Float32(f) => Ok(query.bind(*f)),
        DatabaseValue::Float64(f) => Ok(query.bind(*f)),
        DatabaseValue::String(s) => Ok(query.bind(s.clone())),
        DatabaseValue::Bytes(b) => Ok(query.bind(b.clone())),
        DatabaseValue::Uuid(u) => Ok(query.bind(u.to_string())),
        DatabaseValue::DateTime(dt) => Ok(query.bind(dt.format("%Y-%m-%d %H:%M:%S").to_string())),
        DatabaseValue::Date(d) => Ok(query.bind(d.to_string())),
        DatabaseValue::Time(t) => Ok(query.bind(t.to_string())),
        DatabaseValue::Json(j) => Ok(query.bind(j.to_string())),
        DatabaseValue::Array(_) => Err(OrmError::Query("Array binding is not supported by SQLite".to_string())),
    }
}

fn sqlite_row_to_database_row(row: &SqliteRow) -> OrmResult<DatabaseRow> {
    let mut columns = Vec::with_capacity(row.len());
    let mut values = Vec::with_capacity(row.len());

    for (index, column) in row.columns().iter().enumerate() {
        columns.push(column.name().to_string());
        values.push(sqlite_value_to_database_value(row, index)?);
    }

    Ok(DatabaseRow::new(columns, values))
}

/// Decode by the value's runtime storage class rather than the declared
/// column type, which SQLite does not enforce.
fn sqlite_value_to_database_value(row: &SqliteRow, index: usize) -> OrmResult<DatabaseValue> {
    let raw = row.try_get_raw(index)?;
    if raw.is_null() {
        return Ok(DatabaseValue::Null);
    }
    let type_name = raw.type_info().name().to_string();

    match type_name.as_str() {
        "INTEGER" | "BOOLEAN" => Ok(DatabaseValue::Int64(row.try_get_unchecked::<i64, _>(index)?)),
        "REAL" | "NUMERIC" => Ok(DatabaseValue::Float64(row.try_get_unchecked::<f64, _>(index)?)),
        "BLOB" => Ok(DatabaseValue::Bytes(row.try_get_unchecked::<Vec<u8>, _>(index)?)),
        _ => Ok(DatabaseValue::String(row.try_get_unchecked::<String, _>(index)?)),
    }
}
