//! Eager Loading System - one query per relation level
//!
//! `preload("posts.comments")` builds a tree of relation names. Loading
//! walks the tree breadth-first per level: all parents' keys go into a
//! single `IN (...)` query, the rows are partitioned back by key, and the
//! children of each node are loaded on the combined related rows.

use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use indexmap::IndexMap;
use tracing::debug;

use super::resolver::RelationPlan;
use crate::database::Database;
use crate::error::ModelResult;
use crate::model::ModelInstance;
use crate::query::ModelQuery;
use crate::transaction::Transaction;

/// Constraint applied to the query of one preloaded relation
pub type PreloadFn = Arc<dyn Fn(ModelQuery) -> ModelQuery + Send + Sync>;

/// Relations to load, keyed by name
pub type PreloadTree = IndexMap<String, PreloadNode>;

#[derive(Clone, Default)]
pub struct PreloadNode {
    pub(crate) constraint: Option<PreloadFn>,
    pub(crate) children: PreloadTree,
}

impl fmt::Debug for PreloadNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PreloadNode")
            .field("constrained", &self.constraint.is_some())
            .field("children", &self.children)
            .finish()
    }
}

impl PreloadNode {
    pub fn children(&self) -> &PreloadTree {
        &self.children
    }
}

/// Add a dotted path to the tree; the constraint applies to its last segment
pub(crate) fn insert_path(tree: &mut PreloadTree, path: &str, constraint: Option<PreloadFn>) {
    let mut constraint = constraint;
    let mut segments = path.split('.').map(str::trim).filter(|s| !s.is_empty()).peekable();
    let mut current = tree;
    while let Some(segment) = segments.next() {
        let node = current.entry(segment.to_string()).or_default();
        if segments.peek().is_none() {
            if let Some(constraint) = constraint.take() {
                node.constraint = Some(constraint);
            }
        }
        current = &mut node.children;
    }
}

impl ModelQuery {
    /// Eager load a relation; dotted paths load nested relations
    pub fn preload(mut self, path: &str) -> Self {
        insert_path(&mut self.preloads, path, None);
        self
    }

    /// Eager load a relation with a constraint on its query
    pub fn preload_with<F>(mut self, path: &str, constraint: F) -> Self
    where
        F: Fn(ModelQuery) -> ModelQuery + Send + Sync + 'static,
    {
        insert_path(&mut self.preloads, path, Some(Arc::new(constraint)));
        self
    }

    pub(crate) fn with_preloads(mut self, preloads: PreloadTree) -> Self {
        self.preloads = preloads;
        self
    }
}

/// Load every relation in `tree` onto `parents`
pub(crate) fn load_relations<'a>(
    parents: &'a mut [ModelInstance],
    tree: &'a PreloadTree,
    db: &'a Database,
    transaction: Option<&'a Transaction>,
) -> Pin<Box<dyn Future<Output = ModelResult<()>> + Send + 'a>> {
    Box::pin(async move {
        if parents.is_empty() || tree.is_empty() {
            return Ok(());
        }
        let definition = parents[0].definition.clone();

        for (name, node) in tree {
            let plan = RelationPlan::resolve(&definition, name, db)?;
            let keys = plan.parent_keys(parents);

            let related = if keys.is_empty() {
                Vec::new()
            } else {
                debug!(
                    model = %definition.name(),
                    relation = %name,
                    parents = parents.len(),
                    keys = keys.len(),
                    "preloading relation"
                );
                let mut query = plan.query_for(db, transaction, keys);
                if let Some(constraint) = &node.constraint {
                    query = constraint(query);
                }
                query.with_preloads(node.children.clone()).fetch().await?.into_vec()
            };

            plan.assign(name, parents, related);
        }
        Ok(())
    })
}
