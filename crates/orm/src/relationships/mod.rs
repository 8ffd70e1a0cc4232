//! Relationships Module - relation descriptors, lazy and eager loading,
//! existence filters and writes through relations

pub mod eager_loading;
pub mod existence;
pub mod loader;
pub mod pivot;
pub(crate) mod resolver;
pub mod types;

pub use eager_loading::{PreloadFn, PreloadNode, PreloadTree};
pub use types::{MatchKey, RelationConstraint, RelationDescriptor, RelationKeys, RelationKind, ResolvedRelation};
