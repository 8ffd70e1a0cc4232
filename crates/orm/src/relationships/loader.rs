//! Lazy relation loading on a single instance

use super::eager_loading::{insert_path, load_relations, PreloadTree};
use super::resolver::RelationPlan;
use crate::error::{ModelError, ModelResult};
use crate::model::{ModelInstance, RelationValue};
use crate::query::ModelQuery;

impl ModelInstance {
    /// Query for this instance's related rows, open for further constraints
    pub fn related_query(&self, name: &str) -> ModelResult<ModelQuery> {
        let plan = RelationPlan::resolve(&self.definition, name, &self.db)?;
        let keys = plan.parent_keys(std::slice::from_ref(self));
        Ok(plan.query_for(&self.db, self.transaction(), keys))
    }

    /// Related rows, loaded on first access and cached on the instance.
    ///
    /// A nested path such as `posts.comments` is always loaded and the
    /// first relation of the path is returned.
    pub async fn related(&mut self, path: &str) -> ModelResult<&RelationValue> {
        let name = path.split('.').next().unwrap_or(path).trim();
        if path.contains('.') || !self.relations.contains_key(name) {
            self.load(path).await?;
        }
        self.relations.get(name).ok_or_else(|| {
            ModelError::Relationship(format!("'{}' is not a relation of {}", name, self.model_name()))
        })
    }

    /// (Re)load a relation path such as `posts.comments`, replacing any
    /// cached value
    pub async fn load(&mut self, path: &str) -> ModelResult<()> {
        let mut tree = PreloadTree::new();
        insert_path(&mut tree, path, None);
        let db = self.db.clone();
        let transaction = self.transaction().cloned();
        load_relations(std::slice::from_mut(self), &tree, &db, transaction.as_ref()).await
    }

    /// Drop a cached relation so the next `related` call queries again
    pub fn forget_relation(&mut self, name: &str) {
        self.relations.shift_remove(name);
    }
}
