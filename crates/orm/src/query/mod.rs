//! Query Builder Module - fluent query descriptors, SQL generation and
//! model-bound execution

pub mod builder;
pub mod joins;
pub mod model_query;
pub mod ordering;
pub mod pagination;
pub mod sql_generation;
pub mod types;
pub mod where_clause;

pub use builder::QueryBuilder;
pub use model_query::ModelQuery;
pub use pagination::PaginationMeta;
pub use sql_generation::{compile_insert, CompiledQuery};
pub use types::*;
