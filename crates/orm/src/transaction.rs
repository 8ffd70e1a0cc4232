//! Transaction Management
//!
//! A `Transaction` is an explicit context: operations take part in it only
//! when it is handed to them (`use_transaction`, `using`). Clones share the
//! same underlying database transaction.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tokio::sync::Mutex;
use tracing::debug;
use uuid::Uuid;

use crate::backends::{DatabaseRow, DatabaseTransaction, SqlDialect};
use crate::database::Connection;
use crate::error::{ModelError, ModelResult};
use crate::query::CompiledQuery;

/// Transaction isolation levels
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IsolationLevel {
    ReadUncommitted,
    ReadCommitted,
    RepeatableRead,
    Serializable,
}

impl IsolationLevel {
    /// Convert to SQL string for SET TRANSACTION ISOLATION LEVEL command
    pub fn as_sql(&self) -> &'static str {
        match self {
            IsolationLevel::ReadUncommitted => "READ UNCOMMITTED",
            IsolationLevel::ReadCommitted => "READ COMMITTED",
            IsolationLevel::RepeatableRead => "REPEATABLE READ",
            IsolationLevel::Serializable => "SERIALIZABLE",
        }
    }
}

/// Transaction configuration options
#[derive(Debug, Clone, Default)]
pub struct TransactionConfig {
    /// Isolation level; applied on PostgreSQL only
    pub isolation_level: Option<IsolationLevel>,
    /// Whether the transaction is read-only; applied on PostgreSQL only
    pub read_only: bool,
}

impl TransactionConfig {
    pub fn read_only() -> Self {
        Self {
            read_only: true,
            ..Default::default()
        }
    }

    pub fn serializable() -> Self {
        Self {
            isolation_level: Some(IsolationLevel::Serializable),
            ..Default::default()
        }
    }
}

/// Shared handle to an open database transaction
#[derive(Clone)]
pub struct Transaction {
    id: Uuid,
    connection: Connection,
    inner: Arc<Mutex<Option<Box<dyn DatabaseTransaction>>>>,
    completed: Arc<AtomicBool>,
}

impl std::fmt::Debug for Transaction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Transaction")
            .field("id", &self.id)
            .field("connection", &self.connection.name())
            .finish()
    }
}

impl Transaction {
    /// Begin a transaction on the given connection
    pub(crate) async fn begin(connection: Connection, config: TransactionConfig) -> ModelResult<Self> {
        debug!(connection = %connection.name(), ?config, "beginning transaction");

        let mut tx = connection
            .pool()
            .begin_transaction()
            .await
            .map_err(|e| ModelError::Transaction(format!("Failed to begin transaction: {}", e)))?;

        if connection.dialect() == SqlDialect::PostgreSQL {
            if let Some(isolation_level) = config.isolation_level {
                let sql = format!("SET TRANSACTION ISOLATION LEVEL {}", isolation_level.as_sql());
                tx.execute(&sql, &[])
                    .await
                    .map_err(|e| ModelError::Transaction(format!("Failed to set isolation level: {}", e)))?;
            }
            if config.read_only {
                tx.execute("SET TRANSACTION READ ONLY", &[])
                    .await
                    .map_err(|e| ModelError::Transaction(format!("Failed to set read-only mode: {}", e)))?;
            }
        } else if config.isolation_level.is_some() || config.read_only {
            debug!(connection = %connection.name(), "transaction options ignored on this dialect");
        }

        Ok(Self {
            id: Uuid::new_v4(),
            connection,
            inner: Arc::new(Mutex::new(Some(tx))),
            completed: Arc::new(AtomicBool::new(false)),
        })
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    /// Connection the transaction was opened on
    pub fn connection(&self) -> &Connection {
        &self.connection
    }

    pub fn dialect(&self) -> SqlDialect {
        self.connection.dialect()
    }

    /// Commit the transaction
    pub async fn commit(&self) -> ModelResult<()> {
        let tx = self.take("commit").await?;
        debug!(transaction = %self.id, "committing transaction");
        tx.commit()
            .await
            .map_err(|e| ModelError::Transaction(format!("Failed to commit transaction: {}", e)))
    }

    /// Rollback the transaction
    pub async fn rollback(&self) -> ModelResult<()> {
        let tx = self.take("rollback").await?;
        debug!(transaction = %self.id, "rolling back transaction");
        tx.rollback()
            .await
            .map_err(|e| ModelError::Transaction(format!("Failed to rollback transaction: {}", e)))
    }

    /// Whether commit or rollback has already run
    pub fn is_completed(&self) -> bool {
        self.completed.load(Ordering::Acquire)
    }

    async fn take(&self, action: &str) -> ModelResult<Box<dyn DatabaseTransaction>> {
        let tx = self.inner.lock().await.take().ok_or_else(|| {
            ModelError::Transaction(format!("cannot {}: transaction is already completed", action))
        })?;
        self.completed.store(true, Ordering::Release);
        Ok(tx)
    }

    pub(crate) async fn execute(&self, query: &CompiledQuery) -> ModelResult<u64> {
        let mut guard = self.inner.lock().await;
        let tx = guard.as_mut().ok_or_else(completed)?;
        let started = std::time::Instant::now();
        let result = tx.execute(&query.sql, &query.database_values()).await;
        self.connection.record(query, started, true, result.is_ok());
        result
    }

    pub(crate) async fn fetch_all(&self, query: &CompiledQuery) -> ModelResult<Vec<DatabaseRow>> {
        let mut guard = self.inner.lock().await;
        let tx = guard.as_mut().ok_or_else(completed)?;
        let started = std::time::Instant::now();
        let result = tx.fetch_all(&query.sql, &query.database_values()).await;
        self.connection.record(query, started, true, result.is_ok());
        result
    }

    pub(crate) async fn fetch_optional(&self, query: &CompiledQuery) -> ModelResult<Option<DatabaseRow>> {
        let mut guard = self.inner.lock().await;
        let tx = guard.as_mut().ok_or_else(completed)?;
        let started = std::time::Instant::now();
        let result = tx.fetch_optional(&query.sql, &query.database_values()).await;
        self.connection.record(query, started, true, result.is_ok());
        result
    }
}

fn completed() -> ModelError {
    ModelError::Transaction("transaction is already completed".to_string())
}
