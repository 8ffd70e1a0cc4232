//! Result collections returned by model queries

use serde::de::DeserializeOwned;
use serde::{Serialize, Serializer};
use serde_json::{json, Value};

use crate::error::ModelResult;
use crate::model::ModelInstance;
use crate::query::PaginationMeta;

/// Rows of one `fetch`, in result order
#[derive(Debug, Clone, Default)]
pub struct ModelCollection(Vec<ModelInstance>);

impl ModelCollection {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn as_slice(&self) -> &[ModelInstance] {
        &self.0
    }

    pub fn as_mut_slice(&mut self) -> &mut [ModelInstance] {
        &mut self.0
    }

    pub fn iter(&self) -> std::slice::Iter<'_, ModelInstance> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn first(&self) -> Option<&ModelInstance> {
        self.0.first()
    }

    pub fn get(&self, index: usize) -> Option<&ModelInstance> {
        self.0.get(index)
    }

    pub fn into_vec(self) -> Vec<ModelInstance> {
        self.0
    }

    pub fn to_json(&self) -> Value {
        Value::Array(self.0.iter().map(ModelInstance::to_json).collect())
    }

    /// Every row deserialized into `T`
    pub fn to_typed<T: DeserializeOwned>(&self) -> ModelResult<Vec<T>> {
        self.0.iter().map(|instance| instance.to_typed()).collect()
    }
}

impl From<Vec<ModelInstance>> for ModelCollection {
    fn from(instances: Vec<ModelInstance>) -> Self {
        Self(instances)
    }
}

impl IntoIterator for ModelCollection {
    type Item = ModelInstance;
    type IntoIter = std::vec::IntoIter<ModelInstance>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

impl<'a> IntoIterator for &'a ModelCollection {
    type Item = &'a ModelInstance;
    type IntoIter = std::slice::Iter<'a, ModelInstance>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

impl Serialize for ModelCollection {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.to_json().serialize(serializer)
    }
}

/// One page of rows with its totals
#[derive(Debug, Clone)]
pub struct Paginator {
    meta: PaginationMeta,
    data: ModelCollection,
}

impl Paginator {
    pub fn new(data: ModelCollection, meta: PaginationMeta) -> Self {
        Self { meta, data }
    }

    pub fn meta(&self) -> &PaginationMeta {
        &self.meta
    }

    pub fn data(&self) -> &ModelCollection {
        &self.data
    }

    pub fn into_data(self) -> ModelCollection {
        self.data
    }

    pub fn total(&self) -> i64 {
        self.meta.total
    }

    pub fn has_more_pages(&self) -> bool {
        self.meta.has_more_pages()
    }

    /// `{ total, perPage, lastPage, page, data }`
    pub fn to_json(&self) -> Value {
        json!({
            "total": self.meta.total,
            "perPage": self.meta.per_page,
            "lastPage": self.meta.last_page,
            "page": self.meta.page,
            "data": self.data.to_json(),
        })
    }
}

impl Serialize for Paginator {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.to_json().serialize(serializer)
    }
}
