//! Registry bootstrap from a TOML schema document.
//!
//! ```toml
//! [[entity]]
//! name = "User"
//! table = "users"
//! fields = [{ name = "id", type = "int" }, { name = "name", type = "string" }]
//!
//! [[entity.relation]]
//! name = "posts"
//! kind = "has_many"
//! target = "Post"
//! local_key = "id"
//! foreign_key = "user_id"
//! constraints = [{ column = "published", op = "=", value = true }]
//! ```

use std::path::{Path, PathBuf};

use hydrate_types::{FieldType, Value};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::entity::EntityType;
use crate::error::HydrateError;
use crate::query::{Column, Operator, Predicate};
use crate::registry::Registry;
use crate::relation::{Morph, Pivot, RelationDescriptor, RelationKind, Through};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SchemaConfig {
    #[serde(default, rename = "entity")]
    pub entities: Vec<EntityConfig>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntityConfig {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub table: Option<String>,
    #[serde(default = "default_primary_key")]
    pub primary_key: String,
    #[serde(default)]
    pub fields: Vec<FieldConfig>,
    #[serde(default, rename = "relation")]
    pub relations: Vec<RelationConfig>,
}

fn default_primary_key() -> String {
    "id".to_string()
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldConfig {
    pub name: String,
    #[serde(rename = "type")]
    pub ty: FieldType,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RelationConfig {
    pub name: String,
    pub target: String,
    pub local_key: String,
    pub foreign_key: String,
    #[serde(flatten)]
    pub kind: RelationKindConfig,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub constraints: Vec<ConstraintConfig>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RelationKindConfig {
    BelongsTo,
    HasOne,
    HasMany,
    HasManyThrough {
        through: String,
        first_key: String,
        second_key: String,
    },
    BelongsToMany {
        pivot: String,
        source_key: String,
        target_key: String,
        #[serde(default)]
        pivot_columns: Vec<String>,
        #[serde(default)]
        timestamps: bool,
    },
    MorphMany {
        type_column: String,
        type_value: String,
    },
}

/// A default scope: `column op value`, or `column op [values]` for
/// `in` / `not in`. `is null` and `is not null` take no value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConstraintConfig {
    pub column: String,
    pub op: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<Value>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub values: Vec<Value>,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("schema config not found: {}", .0.display())]
    NotFound(PathBuf),

    #[error("failed to read {}: {}", .0.display(), .1)]
    Io(PathBuf, #[source] std::io::Error),

    #[error("failed to parse {origin}: {source}")]
    Parse {
        origin: String,
        #[source]
        source: toml::de::Error,
    },

    #[error("unknown operator '{op}' in a constraint of '{entity}.{relation}'")]
    Operator {
        entity: String,
        relation: String,
        op: String,
    },

    #[error("operator '{op}' in a constraint of '{entity}.{relation}' needs a value")]
    MissingValue {
        entity: String,
        relation: String,
        op: String,
    },

    #[error(transparent)]
    Schema(#[from] HydrateError),
}

impl SchemaConfig {
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        toml::from_str(content).map_err(|source| ConfigError::Parse {
            origin: "schema config".to_string(),
            source,
        })
    }

    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                ConfigError::NotFound(path.into())
            } else {
                ConfigError::Io(path.into(), e)
            }
        })?;
        toml::from_str(&content).map_err(|source| ConfigError::Parse {
            origin: path.display().to_string(),
            source,
        })
    }

    pub fn to_toml_string(&self) -> Result<String, toml::ser::Error> {
        toml::to_string_pretty(self)
    }

    /// Builds every entity; structural errors surface as
    /// [`ConfigError::Schema`].
    pub fn into_entities(self) -> Result<Vec<EntityType>, ConfigError> {
        self.entities.into_iter().map(EntityConfig::build).collect()
    }

    /// Builds and registers every entity as one atomic batch.
    pub fn into_registry(self) -> Result<Registry, ConfigError> {
        let mut registry = Registry::new();
        registry.register_all(self.into_entities()?)?;
        Ok(registry)
    }
}

impl EntityConfig {
    fn build(self) -> Result<EntityType, ConfigError> {
        let mut builder = EntityType::builder(self.name.as_str()).primary_key(self.primary_key);
        if let Some(table) = self.table {
            builder = builder.table(table);
        }
        for field in self.fields {
            builder = builder.field(field.name, field.ty);
        }
        for relation in self.relations {
            builder = builder.relation(relation.build(&self.name)?);
        }
        Ok(builder.build()?)
    }
}

impl RelationConfig {
    fn build(self, entity: &str) -> Result<RelationDescriptor, ConfigError> {
        let kind = match self.kind {
            RelationKindConfig::BelongsTo => RelationKind::BelongsTo,
            RelationKindConfig::HasOne => RelationKind::HasOne,
            RelationKindConfig::HasMany => RelationKind::HasMany,
            RelationKindConfig::HasManyThrough {
                through,
                first_key,
                second_key,
            } => RelationKind::HasManyThrough(Through::new(through, first_key, second_key)),
            RelationKindConfig::BelongsToMany {
                pivot,
                source_key,
                target_key,
                pivot_columns,
                timestamps,
            } => {
                let mut pivot = Pivot::new(pivot, source_key, target_key).columns(pivot_columns);
                pivot.timestamps = timestamps;
                RelationKind::BelongsToMany(pivot)
            }
            RelationKindConfig::MorphMany {
                type_column,
                type_value,
            } => RelationKind::MorphMany(Morph::new(type_column, type_value)),
        };

        let mut relation = RelationDescriptor::new(
            self.name.as_str(),
            kind,
            self.target,
            self.local_key,
            self.foreign_key,
        );
        for constraint in self.constraints {
            let op = Operator::parse(&constraint.op).ok_or_else(|| ConfigError::Operator {
                entity: entity.to_string(),
                relation: self.name.clone(),
                op: constraint.op.clone(),
            })?;
            let column = Column::parse(&constraint.column);
            let predicate = match op {
                Operator::IsNull => Predicate::null(column),
                Operator::IsNotNull => Predicate::not_null(column),
                Operator::In => Predicate::is_in(column, constraint.values),
                Operator::NotIn => Predicate::not_in(column, constraint.values),
                op => {
                    let value = constraint.value.ok_or_else(|| ConfigError::MissingValue {
                        entity: entity.to_string(),
                        relation: self.name.clone(),
                        op: constraint.op.clone(),
                    })?;
                    Predicate::compare(column, op, value)
                }
            };
            relation = relation.with_constraint(predicate);
        }
        Ok(relation)
    }
}
