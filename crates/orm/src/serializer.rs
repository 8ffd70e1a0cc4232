//! Serializer - JSON projection of model instances
//!
//! Attributes pass the model's hidden/visible filter and date fields are
//! cast through the date adapter. Computed fields follow, then preloaded
//! relations (recursively), then row extras under `__meta__`.

use serde::{Serialize, Serializer};
use serde_json::{Map, Value};

use crate::model::{ModelInstance, RelationValue};

impl ModelInstance {
    pub fn to_json(&self) -> Value {
        let definition = &self.definition;
        let visibility = definition.visibility();
        let adapter = definition.date_adapter_ref();
        let mut object = Map::new();

        for (field, value) in self.attributes.values() {
            if !visibility.allows(field) {
                continue;
            }
            let value = if definition.is_date_field(field) {
                adapter.cast_date(field, value)
            } else {
                value.clone()
            };
            object.insert(field.clone(), value);
        }

        for (field, compute) in definition.computed_fields() {
            if visibility.allows(field) {
                object.insert(field.clone(), compute(self));
            }
        }

        for (name, relation) in &self.relations {
            object.insert(name.clone(), relation.to_json());
        }

        if !self.extras.is_empty() {
            let meta: Map<String, Value> = self
                .extras
                .iter()
                .map(|(key, value)| (key.clone(), value.clone()))
                .collect();
            object.insert("__meta__".to_string(), Value::Object(meta));
        }

        Value::Object(object)
    }
}

impl RelationValue {
    pub fn to_json(&self) -> Value {
        match self {
            RelationValue::One(Some(instance)) => instance.to_json(),
            RelationValue::One(None) => Value::Null,
            RelationValue::Many(collection) => collection.to_json(),
        }
    }
}

impl Serialize for ModelInstance {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.to_json().serialize(serializer)
    }
}
