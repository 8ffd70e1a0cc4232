//! # lucid-orm: Active-Record ORM
//!
//! Models are described at runtime with a `ModelDefinition` (table, keys,
//! relations, scopes, hooks) and registered on a `Database`. Rows come back
//! as `ModelInstance`s that track dirty state, save themselves and load
//! their relations lazily or in batched preloads.
//!
//! ```no_run
//! use lucid_orm::{Database, ModelDefinition};
//! use serde_json::json;
//!
//! # async fn run() -> lucid_orm::ModelResult<()> {
//! let db = Database::connect_url("sqlite::memory:").await?;
//! db.register(ModelDefinition::new("User").has_many("posts", "Post"));
//! db.register(ModelDefinition::new("Post").belongs_to("author", "User"));
//!
//! let users = db.model("User")?;
//! let user = users.create(json!({ "email": "virk@adonisjs.com" })).await?;
//! let with_posts = users.query().preload("posts").fetch().await?;
//! # let _ = (user, with_posts);
//! # Ok(())
//! # }
//! ```

pub mod backends;
pub mod collection;
pub mod config;
pub mod database;
pub mod error;
pub mod events;
pub mod hook_error;
pub mod model;
pub mod query;
pub mod relationships;
pub mod serializer;
pub mod transaction;

pub use backends::{DatabaseRow, DatabaseValue, SqlDialect};
pub use collection::{ModelCollection, Paginator};
pub use config::{ConfigError, ConnectionConfig, DatabaseConfig, PoolConfig, DEFAULT_CONNECTION};
pub use database::{Connection, ConnectionStats, Database, QueryClient, QueryEvent, QueryListener};
pub use error::*;
pub use events::{CallbackObserver, HookEvent, ModelObserver};
pub use hook_error::HookError;
pub use model::*;
pub use query::{
    AggregateFunction, CompiledQuery, ModelQuery, OrderDirection, PaginationMeta, QueryBuilder, QueryOperator,
};
pub use relationships::{RelationDescriptor, RelationKind};
pub use transaction::{IsolationLevel, Transaction, TransactionConfig};
