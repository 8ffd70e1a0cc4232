//! Model definition - per-model configuration supplied at registration time

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use heck::ToSnakeCase;
use indexmap::IndexMap;
use serde_json::Value;

use crate::error::{ModelError, ModelResult};
use crate::events::{CallbackObserver, FetchHook, HookEvent, ModelObserver};
use crate::hook_error::HookError;
use crate::model::attributes::{DateAdapter, DefaultDateAdapter};
use crate::model::lifecycle::ModelLifecycle;
use crate::model::ModelInstance;
use crate::query::ModelQuery;
use crate::relationships::{RelationDescriptor, RelationKind};

pub type ScopeFn = Arc<dyn Fn(ModelQuery, &[Value]) -> ModelQuery + Send + Sync>;
pub type ComputedFn = Arc<dyn Fn(&ModelInstance) -> Value + Send + Sync>;
pub type BootFn = Arc<dyn Fn(&mut ModelDefinition) + Send + Sync>;

/// Serialization field filter; `hidden` and `visible` exclude each other
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum Visibility {
    #[default]
    All,
    Hidden(Vec<String>),
    Visible(Vec<String>),
}

impl Visibility {
    pub fn allows(&self, field: &str) -> bool {
        match self {
            Visibility::All => true,
            Visibility::Hidden(fields) => !fields.iter().any(|f| f == field),
            Visibility::Visible(fields) => fields.iter().any(|f| f == field),
        }
    }
}

/// Canonical scope name: a leading `scope` prefix is dropped and the rest
/// snake_cased, so `scopeActiveUsers`, `activeUsers` and `active_users`
/// all name the same scope.
pub fn canonical_scope_name(name: &str) -> String {
    let trimmed = name.trim();
    let stripped = match trimmed.strip_prefix("scope") {
        Some(rest) if rest.starts_with(|c: char| c.is_ascii_uppercase() || c == '_') => rest,
        _ => trimmed,
    };
    stripped.to_snake_case()
}

#[derive(Clone)]
pub struct ModelDefinition {
    name: String,
    table: String,
    primary_key: String,
    timestamps: bool,
    created_at_column: String,
    updated_at_column: String,
    visibility: Visibility,
    dates: Vec<String>,
    connection: Option<String>,
    relations: IndexMap<String, RelationDescriptor>,
    scopes: HashMap<String, ScopeFn>,
    computed: IndexMap<String, ComputedFn>,
    lifecycle: ModelLifecycle,
    date_adapter: Arc<dyn DateAdapter>,
    boot_callbacks: Vec<BootFn>,
}

impl fmt::Debug for ModelDefinition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ModelDefinition")
            .field("name", &self.name)
            .field("table", &self.table)
            .field("primary_key", &self.primary_key)
            .field("timestamps", &self.timestamps)
            .field("visibility", &self.visibility)
            .field("dates", &self.dates)
            .field("connection", &self.connection)
            .field("relations", &self.relations.keys().collect::<Vec<_>>())
            .field("scopes", &self.scopes.keys().collect::<Vec<_>>())
            .field("computed", &self.computed.keys().collect::<Vec<_>>())
            .field("observers", &self.lifecycle.len())
            .finish()
    }
}

impl ModelDefinition {
    /// New definition; the table defaults to the plural snake_case name
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            table: pluralizer::pluralize(&name.to_snake_case(), 2, false),
            primary_key: "id".to_string(),
            timestamps: false,
            created_at_column: "created_at".to_string(),
            updated_at_column: "updated_at".to_string(),
            visibility: Visibility::All,
            dates: Vec::new(),
            connection: None,
            relations: IndexMap::new(),
            scopes: HashMap::new(),
            computed: IndexMap::new(),
            lifecycle: ModelLifecycle::new(),
            date_adapter: Arc::new(DefaultDateAdapter),
            boot_callbacks: Vec::new(),
        }
    }

    // Builder methods

    pub fn table(mut self, table: &str) -> Self {
        self.table = table.to_string();
        self
    }

    pub fn primary_key(mut self, key: &str) -> Self {
        self.primary_key = key.to_string();
        self
    }

    pub fn timestamps(mut self, enabled: bool) -> Self {
        self.timestamps = enabled;
        self
    }

    pub fn created_at_column(mut self, column: &str) -> Self {
        self.created_at_column = column.to_string();
        self
    }

    pub fn updated_at_column(mut self, column: &str) -> Self {
        self.updated_at_column = column.to_string();
        self
    }

    /// Fields never serialized; replaces any `visible` list
    pub fn hidden<I, S>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.visibility = Visibility::Hidden(fields.into_iter().map(|f| f.as_ref().to_string()).collect());
        self
    }

    /// Only these fields are serialized; replaces any `hidden` list
    pub fn visible<I, S>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.visibility = Visibility::Visible(fields.into_iter().map(|f| f.as_ref().to_string()).collect());
        self
    }

    pub fn dates<I, S>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.dates.extend(fields.into_iter().map(|f| f.as_ref().to_string()));
        self
    }

    pub fn connection(mut self, name: &str) -> Self {
        self.connection = Some(name.to_string());
        self
    }

    pub fn relation(mut self, descriptor: RelationDescriptor) -> Self {
        self.relations.insert(descriptor.name.clone(), descriptor);
        self
    }

    pub fn has_one(self, name: &str, related: &str) -> Self {
        self.relation(RelationDescriptor::has_one(name, related))
    }

    pub fn has_many(self, name: &str, related: &str) -> Self {
        self.relation(RelationDescriptor::has_many(name, related))
    }

    pub fn belongs_to(self, name: &str, related: &str) -> Self {
        self.relation(RelationDescriptor::belongs_to(name, related))
    }

    pub fn many_to_many(self, name: &str, related: &str) -> Self {
        self.relation(RelationDescriptor::many_to_many(name, related))
    }

    pub fn has_many_through(self, name: &str, related: &str, through: &str) -> Self {
        self.relation(RelationDescriptor::has_many_through(name, related, through))
    }

    /// Named reusable constraint; `args` are the values given to `apply_with`
    pub fn scope<F>(mut self, name: &str, scope: F) -> Self
    where
        F: Fn(ModelQuery, &[Value]) -> ModelQuery + Send + Sync + 'static,
    {
        self.scopes.insert(canonical_scope_name(name), Arc::new(scope));
        self
    }

    /// Field derived from the instance at serialization time
    pub fn computed<F>(mut self, name: &str, getter: F) -> Self
    where
        F: Fn(&ModelInstance) -> Value + Send + Sync + 'static,
    {
        self.computed.insert(name.to_string(), Arc::new(getter));
        self
    }

    pub fn observer(mut self, observer: Arc<dyn ModelObserver>) -> Self {
        self.lifecycle.register_observer(observer);
        self
    }

    /// Closure hook for a single-instance event
    pub fn hook<F>(mut self, event: HookEvent, hook: F) -> Self
    where
        F: Fn(&mut ModelInstance) -> Result<(), HookError> + Send + Sync + 'static,
    {
        let observer: Arc<dyn ModelObserver> = if event == HookEvent::AfterFetch {
            let hook = Arc::new(hook);
            let fetch: FetchHook = Arc::new(move |models: &mut [ModelInstance]| {
                for model in models.iter_mut() {
                    hook(model)?;
                }
                Ok(())
            });
            Arc::new(CallbackObserver::fetch(fetch))
        } else {
            Arc::new(CallbackObserver::instance(event, Arc::new(hook)))
        };
        self.lifecycle.register_observer(observer);
        self
    }

    pub fn before_save<F>(self, hook: F) -> Self
    where
        F: Fn(&mut ModelInstance) -> Result<(), HookError> + Send + Sync + 'static,
    {
        self.hook(HookEvent::BeforeSave, hook)
    }

    pub fn after_save<F>(self, hook: F) -> Self
    where
        F: Fn(&mut ModelInstance) -> Result<(), HookError> + Send + Sync + 'static,
    {
        self.hook(HookEvent::AfterSave, hook)
    }

    pub fn before_create<F>(self, hook: F) -> Self
    where
        F: Fn(&mut ModelInstance) -> Result<(), HookError> + Send + Sync + 'static,
    {
        self.hook(HookEvent::BeforeCreate, hook)
    }

    pub fn after_create<F>(self, hook: F) -> Self
    where
        F: Fn(&mut ModelInstance) -> Result<(), HookError> + Send + Sync + 'static,
    {
        self.hook(HookEvent::AfterCreate, hook)
    }

    pub fn before_update<F>(self, hook: F) -> Self
    where
        F: Fn(&mut ModelInstance) -> Result<(), HookError> + Send + Sync + 'static,
    {
        self.hook(HookEvent::BeforeUpdate, hook)
    }

    pub fn after_update<F>(self, hook: F) -> Self
    where
        F: Fn(&mut ModelInstance) -> Result<(), HookError> + Send + Sync + 'static,
    {
        self.hook(HookEvent::AfterUpdate, hook)
    }

    pub fn before_delete<F>(self, hook: F) -> Self
    where
        F: Fn(&mut ModelInstance) -> Result<(), HookError> + Send + Sync + 'static,
    {
        self.hook(HookEvent::BeforeDelete, hook)
    }

    pub fn after_delete<F>(self, hook: F) -> Self
    where
        F: Fn(&mut ModelInstance) -> Result<(), HookError> + Send + Sync + 'static,
    {
        self.hook(HookEvent::AfterDelete, hook)
    }

    pub fn after_find<F>(self, hook: F) -> Self
    where
        F: Fn(&mut ModelInstance) -> Result<(), HookError> + Send + Sync + 'static,
    {
        self.hook(HookEvent::AfterFind, hook)
    }

    /// Hook receiving every fetched batch at once
    pub fn after_fetch<F>(mut self, hook: F) -> Self
    where
        F: Fn(&mut [ModelInstance]) -> Result<(), HookError> + Send + Sync + 'static,
    {
        self.lifecycle
            .register_observer(Arc::new(CallbackObserver::fetch(Arc::new(hook))));
        self
    }

    pub fn date_adapter(mut self, adapter: Arc<dyn DateAdapter>) -> Self {
        self.date_adapter = adapter;
        self
    }

    /// Runs once, the first time the model is used
    pub fn on_boot<F>(mut self, callback: F) -> Self
    where
        F: Fn(&mut ModelDefinition) + Send + Sync + 'static,
    {
        self.boot_callbacks.push(Arc::new(callback));
        self
    }

    // In-place variants for boot callbacks

    pub fn add_scope(&mut self, name: &str, scope: ScopeFn) {
        self.scopes.insert(canonical_scope_name(name), scope);
    }

    pub fn add_date(&mut self, field: &str) {
        if !self.dates.iter().any(|f| f == field) {
            self.dates.push(field.to_string());
        }
    }

    pub fn add_relation(&mut self, descriptor: RelationDescriptor) {
        self.relations.insert(descriptor.name.clone(), descriptor);
    }

    pub fn add_observer(&mut self, observer: Arc<dyn ModelObserver>) {
        self.lifecycle.register_observer(observer);
    }

    pub(crate) fn take_boot_callbacks(&mut self) -> Vec<BootFn> {
        std::mem::take(&mut self.boot_callbacks)
    }

    // Accessors

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn table_name(&self) -> &str {
        &self.table
    }

    pub fn primary_key_name(&self) -> &str {
        &self.primary_key
    }

    pub fn has_timestamps(&self) -> bool {
        self.timestamps
    }

    pub fn created_at(&self) -> &str {
        &self.created_at_column
    }

    pub fn updated_at(&self) -> &str {
        &self.updated_at_column
    }

    pub fn visibility(&self) -> &Visibility {
        &self.visibility
    }

    pub fn connection_name(&self) -> Option<&str> {
        self.connection.as_deref()
    }

    /// Declared date fields plus the timestamp columns when enabled
    pub fn is_date_field(&self, field: &str) -> bool {
        self.dates.iter().any(|f| f == field)
            || (self.timestamps && (field == self.created_at_column || field == self.updated_at_column))
    }

    pub fn date_fields(&self) -> Vec<&str> {
        let mut fields: Vec<&str> = self.dates.iter().map(String::as_str).collect();
        if self.timestamps {
            for column in [self.created_at_column.as_str(), self.updated_at_column.as_str()] {
                if !fields.contains(&column) {
                    fields.push(column);
                }
            }
        }
        fields
    }

    pub fn date_adapter_ref(&self) -> &Arc<dyn DateAdapter> {
        &self.date_adapter
    }

    pub fn relation_descriptor(&self, name: &str) -> ModelResult<&RelationDescriptor> {
        self.relations.get(name).ok_or_else(|| {
            ModelError::Relationship(format!("'{}' is not a relation of {}", name, self.name))
        })
    }

    pub fn relations(&self) -> impl Iterator<Item = &RelationDescriptor> {
        self.relations.values()
    }

    pub fn relation_kind(&self, name: &str) -> Option<RelationKind> {
        self.relations.get(name).map(|r| r.kind)
    }

    pub fn scope_fn(&self, name: &str) -> Option<&ScopeFn> {
        self.scopes.get(&canonical_scope_name(name))
    }

    pub fn has_scope(&self, name: &str) -> bool {
        self.scope_fn(name).is_some()
    }

    pub fn computed_fields(&self) -> &IndexMap<String, ComputedFn> {
        &self.computed
    }

    pub fn lifecycle(&self) -> &ModelLifecycle {
        &self.lifecycle
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_table_names() {
        assert_eq!(ModelDefinition::new("User").table_name(), "users");
        assert_eq!(ModelDefinition::new("UserProfile").table_name(), "user_profiles");
        assert_eq!(ModelDefinition::new("Category").table_name(), "categories");
        assert_eq!(ModelDefinition::new("Post").table("blog_posts").table_name(), "blog_posts");
    }

    #[test]
    fn test_defaults() {
        let definition = ModelDefinition::new("User");
        assert_eq!(definition.primary_key_name(), "id");
        assert!(!definition.has_timestamps());
        assert_eq!(definition.created_at(), "created_at");
        assert_eq!(definition.visibility(), &Visibility::All);
        assert!(definition.connection_name().is_none());
    }

    #[test]
    fn test_hidden_and_visible_are_exclusive() {
        let definition = ModelDefinition::new("User").hidden(["password"]);
        assert!(!definition.visibility().allows("password"));
        assert!(definition.visibility().allows("email"));

        let definition = definition.visible(["email"]);
        assert!(definition.visibility().allows("email"));
        assert!(!definition.visibility().allows("name"));
        assert!(matches!(definition.visibility(), Visibility::Visible(_)));
    }

    #[test]
    fn test_date_fields_include_timestamps() {
        let definition = ModelDefinition::new("User").dates(["dob"]).timestamps(true);
        assert!(definition.is_date_field("dob"));
        assert!(definition.is_date_field("created_at"));
        assert!(definition.is_date_field("updated_at"));
        assert!(!definition.is_date_field("name"));
        assert_eq!(definition.date_fields(), vec!["dob", "created_at", "updated_at"]);

        let without = ModelDefinition::new("User").dates(["dob"]);
        assert!(!without.is_date_field("created_at"));
    }

    #[test]
    fn test_canonical_scope_names() {
        assert_eq!(canonical_scope_name("scopeActiveUsers"), "active_users");
        assert_eq!(canonical_scope_name("activeUsers"), "active_users");
        assert_eq!(canonical_scope_name("active_users"), "active_users");
        assert_eq!(canonical_scope_name("scope_published"), "published");
        assert_eq!(canonical_scope_name("scoped"), "scoped");
    }

    #[test]
    fn test_scope_lookup_uses_canonical_name() {
        let definition = ModelDefinition::new("Post").scope("scopePublished", |q, _| q);
        assert!(definition.has_scope("published"));
        assert!(definition.has_scope("scopePublished"));
        assert!(!definition.has_scope("drafts"));
    }

    #[test]
    fn test_unknown_relation() {
        let definition = ModelDefinition::new("User").has_many("posts", "Post");
        assert!(definition.relation_descriptor("posts").is_ok());
        assert_eq!(definition.relation_kind("posts"), Some(RelationKind::HasMany));
        assert!(matches!(
            definition.relation_descriptor("comments"),
            Err(ModelError::Relationship(_))
        ));
    }
}
