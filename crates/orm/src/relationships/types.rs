//! Relationship Types - descriptors declared on a model definition and the
//! key names they resolve to once both sides are known.

use std::fmt;
use std::sync::Arc;

use heck::ToSnakeCase;

use crate::error::{ModelError, ModelResult};
use crate::model::ModelDefinition;
use crate::query::ModelQuery;

/// Extra constraint applied to every query a relation issues
pub type RelationConstraint = Arc<dyn Fn(ModelQuery) -> ModelQuery + Send + Sync>;

/// Defines the type of relationship between models
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RelationKind {
    HasOne,
    HasMany,
    BelongsTo,
    ManyToMany,
    HasManyThrough,
}

impl RelationKind {
    /// Returns true if this relationship returns a collection
    pub fn is_collection(self) -> bool {
        matches!(self, Self::HasMany | Self::ManyToMany | Self::HasManyThrough)
    }
}

impl fmt::Display for RelationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            RelationKind::HasOne => "hasOne",
            RelationKind::HasMany => "hasMany",
            RelationKind::BelongsTo => "belongsTo",
            RelationKind::ManyToMany => "manyToMany",
            RelationKind::HasManyThrough => "hasManyThrough",
        };
        write!(f, "{}", name)
    }
}

/// Key overrides; anything left `None` resolves to the naming convention
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RelationKeys {
    pub local_key: Option<String>,
    pub foreign_key: Option<String>,
    pub pivot_table: Option<String>,
    pub pivot_foreign_key: Option<String>,
    pub pivot_related_key: Option<String>,
    pub pivot_columns: Vec<String>,
    pub through: Option<String>,
    pub through_foreign_key: Option<String>,
    pub through_local_key: Option<String>,
}

/// A named relation from one model to another, by registry name
#[derive(Clone)]
pub struct RelationDescriptor {
    pub name: String,
    pub kind: RelationKind,
    pub related: String,
    pub keys: RelationKeys,
    pub(crate) constraint: Option<RelationConstraint>,
}

impl fmt::Debug for RelationDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RelationDescriptor")
            .field("name", &self.name)
            .field("kind", &self.kind)
            .field("related", &self.related)
            .field("keys", &self.keys)
            .field("constrained", &self.constraint.is_some())
            .finish()
    }
}

impl RelationDescriptor {
    pub fn new(name: &str, kind: RelationKind, related: &str) -> Self {
        Self {
            name: name.to_string(),
            kind,
            related: related.to_string(),
            keys: RelationKeys::default(),
            constraint: None,
        }
    }

    pub fn has_one(name: &str, related: &str) -> Self {
        Self::new(name, RelationKind::HasOne, related)
    }

    pub fn has_many(name: &str, related: &str) -> Self {
        Self::new(name, RelationKind::HasMany, related)
    }

    pub fn belongs_to(name: &str, related: &str) -> Self {
        Self::new(name, RelationKind::BelongsTo, related)
    }

    pub fn many_to_many(name: &str, related: &str) -> Self {
        Self::new(name, RelationKind::ManyToMany, related)
    }

    pub fn has_many_through(name: &str, related: &str, through: &str) -> Self {
        let mut descriptor = Self::new(name, RelationKind::HasManyThrough, related);
        descriptor.keys.through = Some(through.to_string());
        descriptor
    }

    pub fn local_key(mut self, key: &str) -> Self {
        self.keys.local_key = Some(key.to_string());
        self
    }

    pub fn foreign_key(mut self, key: &str) -> Self {
        self.keys.foreign_key = Some(key.to_string());
        self
    }

    pub fn pivot_table(mut self, table: &str) -> Self {
        self.keys.pivot_table = Some(table.to_string());
        self
    }

    pub fn pivot_foreign_key(mut self, key: &str) -> Self {
        self.keys.pivot_foreign_key = Some(key.to_string());
        self
    }

    pub fn pivot_related_key(mut self, key: &str) -> Self {
        self.keys.pivot_related_key = Some(key.to_string());
        self
    }

    /// Additional pivot columns to expose under the instance extras
    pub fn pivot_columns<I, S>(mut self, columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.keys.pivot_columns = columns.into_iter().map(|c| c.as_ref().to_string()).collect();
        self
    }

    pub fn through_foreign_key(mut self, key: &str) -> Self {
        self.keys.through_foreign_key = Some(key.to_string());
        self
    }

    pub fn through_local_key(mut self, key: &str) -> Self {
        self.keys.through_local_key = Some(key.to_string());
        self
    }

    /// Constrain every query issued for this relation
    pub fn on_query<F>(mut self, constraint: F) -> Self
    where
        F: Fn(ModelQuery) -> ModelQuery + Send + Sync + 'static,
    {
        self.constraint = Some(Arc::new(constraint));
        self
    }

    /// Resolve key names against the definitions on both sides
    pub fn resolve(
        &self,
        parent: &ModelDefinition,
        related: &ModelDefinition,
        through: Option<&ModelDefinition>,
    ) -> ModelResult<ResolvedRelation> {
        let keys = &self.keys;
        let parent_snake = parent.name().to_snake_case();
        let related_snake = related.name().to_snake_case();

        let resolved = match self.kind {
            RelationKind::HasOne | RelationKind::HasMany => ResolvedRelation::HasOneOrMany {
                local_key: keys.local_key.clone().unwrap_or_else(|| parent.primary_key_name().to_string()),
                foreign_key: keys
                    .foreign_key
                    .clone()
                    .unwrap_or_else(|| format!("{}_{}", parent_snake, parent.primary_key_name())),
            },
            RelationKind::BelongsTo => ResolvedRelation::BelongsTo {
                foreign_key: keys
                    .foreign_key
                    .clone()
                    .unwrap_or_else(|| format!("{}_{}", related_snake, related.primary_key_name())),
                owner_key: keys.local_key.clone().unwrap_or_else(|| related.primary_key_name().to_string()),
            },
            RelationKind::ManyToMany => {
                let pivot_table = keys.pivot_table.clone().unwrap_or_else(|| {
                    let mut names = [parent_snake.clone(), related_snake.clone()];
                    names.sort();
                    names.join("_")
                });
                ResolvedRelation::ManyToMany {
                    local_key: keys.local_key.clone().unwrap_or_else(|| parent.primary_key_name().to_string()),
                    related_key: related.primary_key_name().to_string(),
                    pivot_table,
                    pivot_foreign_key: keys
                        .pivot_foreign_key
                        .clone()
                        .unwrap_or_else(|| format!("{}_{}", parent_snake, parent.primary_key_name())),
                    pivot_related_key: keys
                        .pivot_related_key
                        .clone()
                        .unwrap_or_else(|| format!("{}_{}", related_snake, related.primary_key_name())),
                    pivot_columns: keys.pivot_columns.clone(),
                }
            }
            RelationKind::HasManyThrough => {
                let through = through.ok_or_else(|| {
                    ModelError::Relationship(format!(
                        "relation '{}' on {} needs a through model",
                        self.name,
                        parent.name()
                    ))
                })?;
                ResolvedRelation::Through {
                    local_key: keys.local_key.clone().unwrap_or_else(|| parent.primary_key_name().to_string()),
                    through_table: through.table_name().to_string(),
                    through_foreign_key: keys
                        .through_foreign_key
                        .clone()
                        .unwrap_or_else(|| format!("{}_{}", parent_snake, parent.primary_key_name())),
                    through_local_key: keys
                        .through_local_key
                        .clone()
                        .unwrap_or_else(|| through.primary_key_name().to_string()),
                    foreign_key: keys.foreign_key.clone().unwrap_or_else(|| {
                        format!("{}_{}", through.name().to_snake_case(), through.primary_key_name())
                    }),
                }
            }
        };
        Ok(resolved)
    }
}

/// Concrete key names of a relation between two tables
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResolvedRelation {
    /// `related.foreign_key = parent.local_key`
    HasOneOrMany { local_key: String, foreign_key: String },
    /// `related.owner_key = parent.foreign_key`
    BelongsTo { foreign_key: String, owner_key: String },
    /// `pivot.pivot_foreign_key = parent.local_key` and
    /// `pivot.pivot_related_key = related.related_key`
    ManyToMany {
        local_key: String,
        related_key: String,
        pivot_table: String,
        pivot_foreign_key: String,
        pivot_related_key: String,
        pivot_columns: Vec<String>,
    },
    /// `through.through_foreign_key = parent.local_key` and
    /// `related.foreign_key = through.through_local_key`
    Through {
        local_key: String,
        through_table: String,
        through_foreign_key: String,
        through_local_key: String,
        foreign_key: String,
    },
}

impl ResolvedRelation {
    /// Attribute on the parent whose value links to the related rows
    pub fn parent_key(&self) -> &str {
        match self {
            ResolvedRelation::HasOneOrMany { local_key, .. }
            | ResolvedRelation::ManyToMany { local_key, .. }
            | ResolvedRelation::Through { local_key, .. } => local_key,
            ResolvedRelation::BelongsTo { foreign_key, .. } => foreign_key,
        }
    }

    /// Name under which a related row carries the parent key it matched.
    /// Plain columns for direct relations, extras for pivot/through rows.
    pub fn match_key(&self) -> MatchKey {
        match self {
            ResolvedRelation::HasOneOrMany { foreign_key, .. } => MatchKey::Attribute(foreign_key.clone()),
            ResolvedRelation::BelongsTo { owner_key, .. } => MatchKey::Attribute(owner_key.clone()),
            ResolvedRelation::ManyToMany { pivot_foreign_key, .. } => {
                MatchKey::Extra(format!("pivot_{}", pivot_foreign_key))
            }
            ResolvedRelation::Through { through_foreign_key, .. } => {
                MatchKey::Extra(format!("through_{}", through_foreign_key))
            }
        }
    }
}

/// Where the linking value lives on a related instance
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MatchKey {
    Attribute(String),
    Extra(String),
}
