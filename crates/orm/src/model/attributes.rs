//! Attribute store and date handling

use chrono::{DateTime, NaiveDate, NaiveDateTime, SecondsFormat, TimeZone, Utc};
use indexmap::IndexMap;
use serde_json::Value;

use crate::error::{ModelError, ModelResult};

static NULL: Value = Value::Null;

/// Canonical storage format of date fields
pub const STORAGE_DATE_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Current values plus the last-persisted snapshot
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Attributes {
    values: IndexMap<String, Value>,
    original: IndexMap<String, Value>,
}

impl Attributes {
    pub fn new() -> Self {
        Self::default()
    }

    /// Value of a field; absent fields read as `Null`
    pub fn get(&self, field: &str) -> &Value {
        self.values.get(field).unwrap_or(&NULL)
    }

    pub fn contains(&self, field: &str) -> bool {
        self.values.contains_key(field)
    }

    pub fn set(&mut self, field: &str, value: Value) {
        self.values.insert(field.to_string(), value);
    }

    /// Replace the whole attribute set
    pub fn fill(&mut self, values: IndexMap<String, Value>) {
        self.values = values;
    }

    /// Patch only the given fields
    pub fn merge(&mut self, values: IndexMap<String, Value>) {
        for (field, value) in values {
            self.values.insert(field, value);
        }
    }

    pub fn values(&self) -> &IndexMap<String, Value> {
        &self.values
    }

    pub fn original(&self) -> &IndexMap<String, Value> {
        &self.original
    }

    pub fn is_dirty(&self) -> bool {
        self.values.iter().any(|(field, value)| self.original.get(field) != Some(value))
    }

    /// Changed fields and their current values, in insertion order
    pub fn dirty(&self) -> IndexMap<String, Value> {
        self.values
            .iter()
            .filter(|(field, value)| self.original.get(*field) != Some(*value))
            .map(|(field, value)| (field.clone(), value.clone()))
            .collect()
    }

    pub fn dirty_fields(&self) -> Vec<String> {
        self.values
            .iter()
            .filter(|(field, value)| self.original.get(*field) != Some(*value))
            .map(|(field, _)| field.clone())
            .collect()
    }

    /// Take the current values as the persisted snapshot
    pub fn sync_original(&mut self) {
        self.original = self.values.clone();
    }
}

/// Write/read conversion of date fields
pub trait DateAdapter: Send + Sync {
    /// Write path: normalise to the storage representation
    fn format_date(&self, field: &str, value: &Value) -> ModelResult<Value>;

    /// Read path: representation used when serializing
    fn cast_date(&self, field: &str, value: &Value) -> Value;
}

/// Stores `YYYY-MM-DD HH:MM:SS` (UTC) and serializes RFC 3339 with millis
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultDateAdapter;

impl DateAdapter for DefaultDateAdapter {
    fn format_date(&self, field: &str, value: &Value) -> ModelResult<Value> {
        match value {
            Value::Null => Ok(Value::Null),
            Value::String(raw) => parse_datetime(raw)
                .map(|dt| Value::String(dt.format(STORAGE_DATE_FORMAT).to_string()))
                .ok_or_else(|| invalid_date(field, value)),
            Value::Number(number) => number
                .as_i64()
                .and_then(|seconds| Utc.timestamp_opt(seconds, 0).single())
                .map(|dt| Value::String(dt.format(STORAGE_DATE_FORMAT).to_string()))
                .ok_or_else(|| invalid_date(field, value)),
            _ => Err(invalid_date(field, value)),
        }
    }

    fn cast_date(&self, _field: &str, value: &Value) -> Value {
        match value {
            Value::String(raw) => parse_datetime(raw)
                .map(|dt| Value::String(dt.to_rfc3339_opts(SecondsFormat::Millis, true)))
                .unwrap_or_else(|| value.clone()),
            _ => value.clone(),
        }
    }
}

fn invalid_date(field: &str, value: &Value) -> ModelError {
    ModelError::Serialization(format!("invalid date value for '{}': {}", field, value))
}

/// Parse RFC 3339, SQL timestamps (with optional fraction) and plain dates
pub fn parse_datetime(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.with_timezone(&Utc));
    }
    for format in ["%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M:%S%.f"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(raw, format) {
            return Some(Utc.from_utc_datetime(&naive));
        }
    }
    // postgres text form of timestamptz, e.g. `2024-01-02 03:04:05+00`
    if let Ok(dt) = DateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S%.f%#z") {
        return Some(dt.with_timezone(&Utc));
    }
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .map(|naive| Utc.from_utc_datetime(&naive))
}

/// Turn a JSON object into an ordered field map
pub fn object_entries(value: Value) -> ModelResult<IndexMap<String, Value>> {
    match value {
        Value::Object(map) => Ok(map.into_iter().collect()),
        Value::Null => Ok(IndexMap::new()),
        other => Err(ModelError::Serialization(format!(
            "expected an object of attributes, got {}",
            other
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn map(value: Value) -> IndexMap<String, Value> {
        object_entries(value).unwrap()
    }

    #[test]
    fn test_fill_replaces_and_merge_patches() {
        let mut attributes = Attributes::new();
        attributes.fill(map(json!({"name": "virk", "age": 30})));

        attributes.merge(map(json!({"age": 31})));
        assert_eq!(attributes.get("name"), &json!("virk"));
        assert_eq!(attributes.get("age"), &json!(31));

        attributes.fill(map(json!({"age": 1})));
        assert_eq!(attributes.get("name"), &Value::Null);
        assert_eq!(attributes.get("age"), &json!(1));
    }

    #[test]
    fn test_dirty_tracking() {
        let mut attributes = Attributes::new();
        attributes.fill(map(json!({"id": 1, "name": "virk", "email": "v@adonis.dev"})));
        attributes.sync_original();
        assert!(!attributes.is_dirty());

        attributes.set("email", json!("virk@adonis.dev"));
        attributes.set("name", json!("virk"));
        assert!(attributes.is_dirty());
        assert_eq!(attributes.dirty_fields(), vec!["email".to_string()]);
        assert_eq!(attributes.dirty().get("email"), Some(&json!("virk@adonis.dev")));

        attributes.sync_original();
        assert!(attributes.dirty().is_empty());
    }

    #[test]
    fn test_new_fields_are_dirty() {
        let mut attributes = Attributes::new();
        attributes.set("bio", Value::Null);
        assert_eq!(attributes.dirty_fields(), vec!["bio".to_string()]);
    }

    #[test]
    fn test_format_date_normalises_inputs() {
        let adapter = DefaultDateAdapter;
        assert_eq!(
            adapter.format_date("created_at", &json!("2024-01-02T03:04:05Z")).unwrap(),
            json!("2024-01-02 03:04:05")
        );
        assert_eq!(
            adapter.format_date("created_at", &json!("2024-01-02T05:04:05+02:00")).unwrap(),
            json!("2024-01-02 03:04:05")
        );
        assert_eq!(
            adapter.format_date("created_at", &json!("2024-01-02 03:04:05.123")).unwrap(),
            json!("2024-01-02 03:04:05")
        );
        assert_eq!(adapter.format_date("dob", &json!("2024-01-02")).unwrap(), json!("2024-01-02 00:00:00"));
        assert_eq!(adapter.format_date("dob", &Value::Null).unwrap(), Value::Null);
        assert!(adapter.format_date("dob", &json!("yesterday")).is_err());
        assert!(adapter.format_date("dob", &json!(true)).is_err());
    }

    #[test]
    fn test_cast_date_renders_rfc3339_millis() {
        let adapter = DefaultDateAdapter;
        assert_eq!(
            adapter.cast_date("created_at", &json!("2024-01-02 03:04:05")),
            json!("2024-01-02T03:04:05.000Z")
        );
        assert_eq!(adapter.cast_date("created_at", &json!("not a date")), json!("not a date"));
        assert_eq!(adapter.cast_date("created_at", &Value::Null), Value::Null);
    }

    #[test]
    fn test_object_entries_rejects_scalars() {
        assert!(object_entries(json!([1, 2])).is_err());
        assert!(object_entries(Value::Null).unwrap().is_empty());
        let entries = object_entries(json!({"b": 1, "a": 2})).unwrap();
        assert_eq!(entries.len(), 2);
    }
}
