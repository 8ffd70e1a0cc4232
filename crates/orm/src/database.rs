//! Database Integration
//!
//! `Database` owns the named connections, the model registry and the query
//! listeners. Every statement the ORM runs goes through a `Connection` or a
//! `Transaction`, which time it, log it on `lucid_orm::query` and notify
//! listeners.

use std::collections::HashMap;
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock};
use std::time::{Duration, Instant};

use indexmap::IndexMap;
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::backends::{DatabaseBackendRegistry, DatabasePool, DatabasePoolStats, DatabaseRow, SqlDialect};
use crate::config::{DatabaseConfig, DEFAULT_CONNECTION};
use crate::error::{ModelError, ModelResult};
use crate::model::{ModelDefinition, ModelHandle, ModelRegistry};
use crate::query::CompiledQuery;
use crate::transaction::{Transaction, TransactionConfig};

/// One executed statement
#[derive(Debug, Clone)]
pub struct QueryEvent {
    pub connection: String,
    pub sql: String,
    pub bindings: Vec<Value>,
    pub duration: Duration,
    pub in_transaction: bool,
    pub success: bool,
}

/// Receives every statement executed through the ORM
pub trait QueryListener: Send + Sync {
    fn on_query(&self, event: &QueryEvent);
}

impl<F> QueryListener for F
where
    F: Fn(&QueryEvent) + Send + Sync,
{
    fn on_query(&self, event: &QueryEvent) {
        self(event)
    }
}

type Listeners = Arc<RwLock<Vec<Arc<dyn QueryListener>>>>;

/// Connection statistics
#[derive(Debug, Clone)]
pub struct ConnectionStats {
    pub pool: DatabasePoolStats,
    pub query_count: u64,
    pub query_errors: u64,
}

#[derive(Debug, Default)]
struct Counters {
    queries: AtomicU64,
    errors: AtomicU64,
}

/// A named pool plus the dialect used to compile statements for it
#[derive(Clone)]
pub struct Connection {
    name: String,
    pool: Arc<dyn DatabasePool>,
    dialect: SqlDialect,
    debug: bool,
    listeners: Listeners,
    counters: Arc<Counters>,
}

impl std::fmt::Debug for Connection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Connection")
            .field("name", &self.name)
            .field("dialect", &self.dialect)
            .finish()
    }
}

impl Connection {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn dialect(&self) -> SqlDialect {
        self.dialect
    }

    pub(crate) fn pool(&self) -> &Arc<dyn DatabasePool> {
        &self.pool
    }

    pub fn stats(&self) -> ConnectionStats {
        ConnectionStats {
            pool: self.pool.stats(),
            query_count: self.counters.queries.load(Ordering::Relaxed),
            query_errors: self.counters.errors.load(Ordering::Relaxed),
        }
    }

    /// Round-trip latency of a trivial statement
    pub async fn health_check(&self) -> ModelResult<Duration> {
        self.pool.health_check().await
    }

    pub(crate) async fn execute(&self, query: &CompiledQuery) -> ModelResult<u64> {
        let started = Instant::now();
        let result = self.pool.execute(&query.sql, &query.database_values()).await;
        self.record(query, started, false, result.is_ok());
        result
    }

    pub(crate) async fn fetch_all(&self, query: &CompiledQuery) -> ModelResult<Vec<DatabaseRow>> {
        let started = Instant::now();
        let result = self.pool.fetch_all(&query.sql, &query.database_values()).await;
        self.record(query, started, false, result.is_ok());
        result
    }

    pub(crate) async fn fetch_optional(&self, query: &CompiledQuery) -> ModelResult<Option<DatabaseRow>> {
        let started = Instant::now();
        let result = self.pool.fetch_optional(&query.sql, &query.database_values()).await;
        self.record(query, started, false, result.is_ok());
        result
    }

    pub(crate) fn record(&self, query: &CompiledQuery, started: Instant, in_transaction: bool, success: bool) {
        let duration = started.elapsed();
        self.counters.queries.fetch_add(1, Ordering::Relaxed);
        if !success {
            self.counters.errors.fetch_add(1, Ordering::Relaxed);
        }

        if self.debug {
            info!(
                target: "lucid_orm::query",
                connection = %self.name,
                sql = %query.sql,
                bindings = query.bindings.len(),
                duration_us = duration.as_micros() as u64,
                in_transaction,
                success,
                "query"
            );
        } else {
            debug!(
                target: "lucid_orm::query",
                connection = %self.name,
                sql = %query.sql,
                bindings = query.bindings.len(),
                duration_us = duration.as_micros() as u64,
                in_transaction,
                success,
                "query"
            );
        }

        let listeners = match self.listeners.read() {
            Ok(listeners) => listeners.clone(),
            Err(_) => {
                warn!("query listener list is poisoned; skipping notification");
                return;
            }
        };
        if listeners.is_empty() {
            return;
        }
        let event = QueryEvent {
            connection: self.name.clone(),
            sql: query.sql.clone(),
            bindings: query.bindings.clone(),
            duration,
            in_transaction,
            success,
        };
        for listener in listeners {
            listener.on_query(&event);
        }
    }
}

/// Where a statement runs: directly on a pool or inside a transaction
#[derive(Clone, Debug)]
pub enum QueryClient {
    Connection(Connection),
    Transaction(Transaction),
}

impl QueryClient {
    pub fn dialect(&self) -> SqlDialect {
        match self {
            QueryClient::Connection(connection) => connection.dialect(),
            QueryClient::Transaction(trx) => trx.dialect(),
        }
    }

    pub fn transaction(&self) -> Option<&Transaction> {
        match self {
            QueryClient::Connection(_) => None,
            QueryClient::Transaction(trx) => Some(trx),
        }
    }

    pub async fn execute(&self, query: &CompiledQuery) -> ModelResult<u64> {
        match self {
            QueryClient::Connection(connection) => connection.execute(query).await,
            QueryClient::Transaction(trx) => trx.execute(query).await,
        }
    }

    pub async fn fetch_all(&self, query: &CompiledQuery) -> ModelResult<Vec<DatabaseRow>> {
        match self {
            QueryClient::Connection(connection) => connection.fetch_all(query).await,
            QueryClient::Transaction(trx) => trx.fetch_all(query).await,
        }
    }

    pub async fn fetch_optional(&self, query: &CompiledQuery) -> ModelResult<Option<DatabaseRow>> {
        match self {
            QueryClient::Connection(connection) => connection.fetch_optional(query).await,
            QueryClient::Transaction(trx) => trx.fetch_optional(query).await,
        }
    }
}

struct DatabaseInner {
    default_connection: String,
    connections: HashMap<String, Connection>,
    registry: ModelRegistry,
    listeners: Listeners,
}

/// Entry point: connections, models, transactions and raw SQL
#[derive(Clone)]
pub struct Database {
    inner: Arc<DatabaseInner>,
}

impl std::fmt::Debug for Database {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Database")
            .field("default_connection", &self.inner.default_connection)
            .field("connections", &self.inner.connections.keys().collect::<Vec<_>>())
            .finish()
    }
}

impl Database {
    /// Open every configured connection
    pub async fn connect(config: DatabaseConfig) -> ModelResult<Self> {
        config.validate()?;
        let backends = DatabaseBackendRegistry::with_defaults();
        let listeners: Listeners = Arc::new(RwLock::new(Vec::new()));
        let mut connections = HashMap::new();

        for (name, connection_config) in &config.connections {
            let (pool, dialect) = backends.create_pool(&connection_config.url, &connection_config.pool).await?;
            info!(connection = %name, client = %connection_config.client, "database connection established");
            connections.insert(
                name.clone(),
                Connection {
                    name: name.clone(),
                    pool,
                    dialect,
                    debug: connection_config.debug,
                    listeners: listeners.clone(),
                    counters: Arc::new(Counters::default()),
                },
            );
        }

        Ok(Self {
            inner: Arc::new(DatabaseInner {
                default_connection: config.connection,
                connections,
                registry: ModelRegistry::new(),
                listeners,
            }),
        })
    }

    /// Single connection named `primary`
    pub async fn connect_url(url: &str) -> ModelResult<Self> {
        Self::connect(DatabaseConfig::single(DEFAULT_CONNECTION, url)?).await
    }

    /// Connection from `DATABASE_URL` and friends
    pub async fn from_env() -> ModelResult<Self> {
        Self::connect(DatabaseConfig::from_env()?).await
    }

    /// Named connection, or the default one for `None`
    pub fn connection(&self, name: Option<&str>) -> ModelResult<Connection> {
        let name = name.unwrap_or(&self.inner.default_connection);
        self.inner
            .connections
            .get(name)
            .cloned()
            .ok_or_else(|| ModelError::Connection(format!("connection '{}' is not configured", name)))
    }

    pub fn default_connection_name(&self) -> &str {
        &self.inner.default_connection
    }

    pub fn registry(&self) -> &ModelRegistry {
        &self.inner.registry
    }

    /// Register a model definition under its name
    pub fn register(&self, definition: ModelDefinition) {
        self.inner.registry.register(definition);
    }

    /// Handle for a registered model; boots it on first use
    pub fn model(&self, name: &str) -> ModelResult<ModelHandle> {
        let definition = self.inner.registry.boot(name)?;
        Ok(ModelHandle::new(definition, self.clone()))
    }

    /// Register a query listener
    pub fn on_query(&self, listener: Arc<dyn QueryListener>) {
        match self.inner.listeners.write() {
            Ok(mut listeners) => listeners.push(listener),
            Err(_) => warn!("query listener list is poisoned; listener dropped"),
        }
    }

    /// Begin a transaction on the default connection
    pub async fn transaction(&self) -> ModelResult<Transaction> {
        self.transaction_with(None, TransactionConfig::default()).await
    }

    /// Begin a transaction on a named connection with options
    pub async fn transaction_with(&self, connection: Option<&str>, config: TransactionConfig) -> ModelResult<Transaction> {
        Transaction::begin(self.connection(connection)?, config).await
    }

    /// Run `f` in a transaction; commits on `Ok`, rolls back on `Err`
    pub async fn transaction_scope<F, Fut, T>(&self, f: F) -> ModelResult<T>
    where
        F: FnOnce(Transaction) -> Fut,
        Fut: Future<Output = ModelResult<T>>,
    {
        let trx = self.transaction().await?;
        match f(trx.clone()).await {
            Ok(value) => {
                if !trx.is_completed() {
                    trx.commit().await?;
                }
                Ok(value)
            }
            Err(err) => {
                if !trx.is_completed() {
                    if let Err(rollback_err) = trx.rollback().await {
                        warn!(error = %rollback_err, "rollback after failed transaction scope failed");
                    }
                }
                Err(err)
            }
        }
    }

    /// Execute raw SQL on the default connection; placeholders are passed through
    pub async fn raw_execute(&self, sql: &str, bindings: Vec<Value>) -> ModelResult<u64> {
        let connection = self.connection(None)?;
        connection.execute(&CompiledQuery { sql: sql.to_string(), bindings }).await
    }

    /// Run a raw query on the default connection, rows as JSON objects
    pub async fn raw_query(&self, sql: &str, bindings: Vec<Value>) -> ModelResult<Vec<IndexMap<String, Value>>> {
        let connection = self.connection(None)?;
        let rows = connection
            .fetch_all(&CompiledQuery { sql: sql.to_string(), bindings })
            .await?;
        Ok(rows.iter().map(DatabaseRow::to_json_map).collect())
    }

    /// Close every pool
    pub async fn close(&self) -> ModelResult<()> {
        for connection in self.inner.connections.values() {
            connection.pool.close().await?;
            debug!(connection = %connection.name, "database connection closed");
        }
        Ok(())
    }
}
