//! Model System - runtime-described models and their instances
//!
//! - `definition`: table, keys, relations, scopes, hooks of one model
//! - `registry`: name lookup and one-time boot
//! - `instance`: attribute state of a single row
//! - `crud_operations`: save/delete/refresh
//! - `handle`, `query_methods`: the static side (`find`, `create`, ...)

pub mod attributes;
pub mod crud_operations;
pub mod definition;
pub mod handle;
pub mod instance;
pub mod lifecycle;
pub mod query_methods;
pub mod registry;

pub use attributes::{Attributes, DateAdapter, DefaultDateAdapter};
pub use definition::{canonical_scope_name, ComputedFn, ModelDefinition, ScopeFn, Visibility};
pub use handle::ModelHandle;
pub use instance::{InstanceState, ModelInstance, RelationValue};
pub use lifecycle::ModelLifecycle;
pub use registry::ModelRegistry;
