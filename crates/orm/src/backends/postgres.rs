//! PostgreSQL Backend Implementation
//!
//! This module provides the PostgreSQL-specific implementation of the database
//! backend traits using sqlx as the underlying database driver.

use std::sync::Arc;
use std::time::Duration;
use async_trait::async_trait;
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde_json::Value as JsonValue;
use sqlx::postgres::{PgArguments, PgPoolOptions, PgRow};
use sqlx::{Column, Executor, Pool, Postgres, Row, TypeInfo, ValueRef};

use crate::backends::DatabaseBackendType;
use crate::config::PoolConfig;
use crate::error::{OrmError, OrmResult};
use super::core::*;

type PgQuery<'q> = sqlx::query::Query<'q, Postgres, PgArguments>;

/// PostgreSQL database backend implementation
#[derive(Debug, Default)]
pub struct PostgresBackend;

impl PostgresBackend {
    /// Create a new PostgreSQL backend instance
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl DatabaseBackend for PostgresBackend {
    async fn create_pool(&self, database_url: &str, config: &PoolConfig) -> OrmResult<Arc<dyn DatabasePool>> {
        let mut options = PgPoolOptions::new()
            .max_connections(config.max_connections)
            .min_connections(config.min_connections)
            .acquire_timeout(Duration::from_secs(config.acquire_timeout))
            .test_before_acquire(config.test_before_acquire);

        if let Some(idle_timeout) = config.idle_timeout {
            options = options.idle_timeout(Duration::from_secs(idle_timeout));
        }

        if let Some(max_lifetime) = config.max_lifetime {
            options = options.max_lifetime(Duration::from_secs(max_lifetime));
        }

        // Dates travel as UTC text; pin the session zone so casts and
        // TIMESTAMP columns agree with it.
        let sqlx_pool = options
            .after_connect(|conn, _meta| {
                Box::pin(async move {
                    conn.execute("SET TIME ZONE 'UTC'").await?;
                    Ok(())
                })
            })
            .connect(database_url)
            .await
            .map_err(|e| OrmError::Connection(format!("Failed to create PostgreSQL pool: {}", e)))?;

        Ok(Arc::new(PostgresPool::new(sqlx_pool)))
    }

    fn sql_dialect(&self) -> SqlDialect {
        SqlDialect::PostgreSQL
    }

    fn backend_type(&self) -> DatabaseBackendType {
        DatabaseBackendType::PostgreSQL
    }

    fn validate_database_url(&self, url: &str) -> OrmResult<()> {
        if !url.starts_with("postgresql://") && !url.starts_with("postgres://") {
            return Err(OrmError::Connection("Invalid PostgreSQL URL scheme".to_string()));
        }

        let parsed = url::Url::parse(url)
            .map_err(|e| OrmError::Connection(format!("Invalid database URL: {}", e)))?;

        if parsed.host_str().is_none() {
            return Err(OrmError::Connection("Missing host in database URL".to_string()));
        }

        if parsed.path().trim_start_matches('/').is_empty() {
            return Err(OrmError::Connection("Missing database name in URL".to_string()));
        }

        Ok(())
    }
}

/// PostgreSQL connection pool implementation
pub struct PostgresPool {
    pool: Pool<Postgres>,
}

impl PostgresPool {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl DatabasePool for PostgresPool {
    async fn begin_transaction(&self) -> OrmResult<Box<dyn DatabaseTransaction>> {
        let tx = self.pool.begin()
            .await
            .map_err(|e| OrmError::Transaction(format!("Failed to begin transaction: {}", e)))?;

        Ok(Box::new(PostgresTransaction::new(tx)))
    }

    async fn execute(&self, sql: &str, params: &[DatabaseValue]) -> OrmResult<u64> {
        let query = bind_all(sqlx::query(sql), params)?;

        let result = query.execute(&self.pool).await?;

        Ok(result.rows_affected())
    }

    async fn fetch_all(&self, sql: &str, params: &[DatabaseValue]) -> OrmResult<Vec<DatabaseRow>> {
        let query = bind_all(sqlx::query(sql), params)?;

        let rows = query.fetch_all(&self.pool).await?;

        rows.iter().map(postgres_row_to_database_row).collect()
    }

    async fn fetch_optional(&self, sql: &str, params: &[DatabaseValue]) -> OrmResult<Option<DatabaseRow>> {
        let query = bind_all(sqlx::query(sql), params)?;

        let row = query.fetch_optional(&self.pool).await?;

        row.as_ref().map(postgres_row_to_database_row).transpose()
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

/// PostgreSQL transaction implementation
pub struct PostgresTransaction {
    tx: Option<sqlx::Transaction<'static, Postgres>>,
}

impl PostgresTransaction {
    pub fn new(tx: sqlx::Transaction<'static, Postgres>) -> Self {
        Self { tx: Some(tx) }
    }

    fn active(&mut self) -> OrmResult<&mut sqlx::Transaction<'static, Postgres>> {
        self.tx.as_mut().ok_or_else(|| OrmError::Transaction("Transaction already completed".to_string()))
    }
}

#[async_trait]
impl DatabaseTransaction for PostgresTransaction {
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

        rows.iter().map(postgres_row_to_database_row).collect()
    }

    async fn fetch_optional(&mut self, sql: &str, params: &[DatabaseValue]) -> OrmResult<Option<DatabaseRow>> {
        let query = bind_all(sqlx::query(sql), params)?;
        let tx = self.active()?;

        let row = query.fetch_optional(&mut **tx).await?;

        row.as_ref().map(postgres_row_to_database_row).transpose()
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

fn bind_all<'q>(mut query: PgQuery<'q>, params: &[DatabaseValue]) -> OrmResult<PgQuery<'q>> {
    for param in params {
        query = bind_database_value(query, param)?;
    }
    Ok(query)
}

/// Bind a DatabaseValue to a sqlx query
fn bind_database_value<'q>(query: PgQuery<'q>, value: &DatabaseValue) -> OrmResult<PgQuery<'q>> {
    match value {
        DatabaseValue::Null => Ok(query.bind(Option::<String>::None)),
        DatabaseValue::Bool(b) => Ok(query.bind(*b)),
        DatabaseValue::Int32(i) => Ok(query.bind(*i)),
        DatabaseValue::Int64(i) => Ok(query.bind(*i)),
        DatabaseValue::Float32(f) => Ok(query.bind(*f)),
        DatabaseValue::Float64(f) => Ok(query.bind(*f)),
        DatabaseValue::String(s) => Ok(query.bind(s.clone())),
        DatabaseValue::Bytes(b) => Ok(query.bind(b.clone())),
        DatabaseValue::Uuid(u) => Ok(query.bind(*u)),
        DatabaseValue::DateTime(dt) => Ok(query.bind(*dt)),
        DatabaseValue::Date(d) => Ok(query.bind(*d)),
        DatabaseValue::Time(t) => Ok(query.bind(*t)),
        DatabaseValue::Json(j) => Ok(query.bind(j.clone())),
        DatabaseValue::Array(_) => Err(OrmError::Query("Array binding not yet implemented for PostgreSQL".to_string())),
    }
}

fn postgres_row_to_database_row(row: &PgRow) -> OrmResult<DatabaseRow> {
    let mut columns = Vec::with_capacity(row.len());
    let mut values = Vec::with_capacity(row.len());

    for (index, column) in row.columns().iter().enumerate() {
        columns.push(column.name().to_string());
        values.push(postgres_value_to_database_value(row, index)?);
    }

    Ok(DatabaseRow::new(columns, values))
}

/// Convert a PostgreSQL column value to DatabaseValue
fn postgres_value_to_database_value(row: &PgRow, index: usize) -> OrmResult<DatabaseValue> {
    if row.try_get_raw(index)?.is_null() {
        return Ok(DatabaseValue::Null);
    }

    let type_name = row.columns()[index].type_info().name().to_string();

    let value = match type_name.as_str() {
        "BOOL" => DatabaseValue::Bool(row.try_get(index)?),
        "INT2" => DatabaseValue::Int64(row.try_get::<i16, _>(index)? as i64),
        "INT4" => DatabaseValue::Int64(row.try_get::<i32, _>(index)? as i64),
        "INT8" => DatabaseValue::Int64(row.try_get(index)?),
        "FLOAT4" => DatabaseValue::Float64(row.try_get::<f32, _>(index)? as f64),
        "FLOAT8" => DatabaseValue::Float64(row.try_get(index)?),
        "BYTEA" => DatabaseValue::Bytes(row.try_get(index)?),
        "UUID" => DatabaseValue::Uuid(row.try_get(index)?),
        "TIMESTAMPTZ" => DatabaseValue::DateTime(row.try_get(index)?),
        "TIMESTAMP" => {
            let naive: chrono::NaiveDateTime = row.try_get(index)?;
            DatabaseValue::String(naive.format("%Y-%m-%d %H:%M:%S").to_string())
        }
        "DATE" => DatabaseValue::Date(row.try_get(index)?),
        "TIME" => DatabaseValue::Time(row.try_get(index)?),
        "JSON" | "JSONB" => DatabaseValue::Json(row.try_get::<JsonValue, _>(index)?),
        "NUMERIC" => numeric_value(row.try_get::<Decimal, _>(index)?),
        "TEXT" | "VARCHAR" | "BPCHAR" | "NAME" | "UNKNOWN" => DatabaseValue::String(row.try_get(index)?),
        _ => {
            return Err(OrmError::Database(format!(
                "cannot decode PostgreSQL column '{}' of type {}",
                row.columns()[index].name(),
                type_name
            )))
        }
    };

    Ok(value)
}

/// Whole numbers (SUM over BIGINT) stay integers; AVG and other
/// fractional results become floats.
fn numeric_value(decimal: Decimal) -> DatabaseValue {
    let as_integer = if decimal.scale() == 0 { decimal.to_i64() } else { None };
    match (as_integer, decimal.to_f64()) {
        (Some(integer), _) => DatabaseValue::Int64(integer),
        (None, Some(float)) => DatabaseValue::Float64(float),
        (None, None) => DatabaseValue::String(decimal.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn test_numeric_values() {
        assert_eq!(numeric_value(Decimal::from(90)), DatabaseValue::Int64(90));
        assert_eq!(
            numeric_value(Decimal::from_str("15.0000000000000000").unwrap()),
            DatabaseValue::Float64(15.0)
        );
        assert_eq!(numeric_value(Decimal::from_str("2.5").unwrap()), DatabaseValue::Float64(2.5));
    }

    #[test]
    fn test_url_validation() {
        let backend = PostgresBackend::new();
        assert!(backend.validate_database_url("postgres://localhost/app").is_ok());
        assert!(backend.validate_database_url("postgres://localhost").is_err());
        assert!(backend.validate_database_url("sqlite::memory:").is_err());
    }
}
