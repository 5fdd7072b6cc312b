//! The entity registry.
//!
//! Built once at startup and shared read-only afterwards, usually behind an
//! `Arc`. Every mutation either succeeds completely or leaves the registry
//! untouched.

use compact_str::CompactString;
use hashbrown::HashMap;
use smallvec::SmallVec;

use crate::entity::EntityType;
use crate::error::{HydrateError, Result};
use crate::query::{Column, Scope};
use crate::relation::{RelationDescriptor, RelationKind};

/// One resolved edge of a relation path.
#[derive(Debug, Clone, Copy)]
pub struct Hop<'r> {
    pub source: &'r EntityType,
    pub relation: &'r RelationDescriptor,
    pub target: &'r EntityType,
    /// Intermediate entity of a has-many-through edge.
    pub through: Option<&'r EntityType>,
}

/// Resolved relation path, one hop per segment.
pub type Hops<'r> = SmallVec<[Hop<'r>; 4]>;

#[derive(Debug, Clone, Default)]
pub struct Registry {
    entities: Vec<EntityType>,
    index: HashMap<CompactString, usize>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers one entity whose relations only reference entities already
    /// registered (or itself).
    pub fn register(&mut self, entity: EntityType) -> Result<()> {
        self.register_all([entity])
    }

    /// Registers a batch atomically.
    ///
    /// Names are checked against the registry and within the batch first;
    /// relations are then validated against the registry plus the whole
    /// batch, so entities in one batch may reference each other in any
    /// order.
    pub fn register_all(&mut self, batch: impl IntoIterator<Item = EntityType>) -> Result<()> {
        let batch: Vec<EntityType> = batch.into_iter().collect();

        self.validate_batch(&batch)?;

        self.entities.reserve(batch.len());
        for entity in batch {
            self.index
                .insert(CompactString::from(entity.name()), self.entities.len());
            self.entities.push(entity);
        }
        Ok(())
    }

    fn validate_batch(&self, batch: &[EntityType]) -> Result<()> {
        let mut pending: HashMap<&str, &EntityType> = HashMap::with_capacity(batch.len());
        for entity in batch {
            if self.contains(entity.name()) || pending.insert(entity.name(), entity).is_some() {
                return Err(HydrateError::DuplicateEntity {
                    entity: entity.name().to_string(),
                });
            }
        }

        let resolve = |name: &str| pending.get(name).copied().or_else(|| self.get(name));
        for entity in batch {
            for relation in entity.relations() {
                validate_relation(entity, relation, &resolve)?;
            }
        }
        Ok(())
    }

    /// Looks up an entity type by name.
    pub fn lookup(&self, name: &str) -> Result<&EntityType> {
        self.get(name).ok_or_else(|| HydrateError::UnknownEntity {
            entity: name.to_string(),
        })
    }

    pub fn get(&self, name: &str) -> Option<&EntityType> {
        self.index.get(name).map(|&i| &self.entities[i])
    }

    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.index.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.entities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }

    /// Entities in registration order.
    pub fn entities(&self) -> impl Iterator<Item = &EntityType> {
        self.entities.iter()
    }

    /// Resolves a dotted relation path starting at `entity`.
    ///
    /// ```
    /// # use hydrate_core::{EntityType, Registry, RelationDescriptor};
    /// # use hydrate_types::FieldType;
    /// let mut registry = Registry::new();
    /// registry.register_all([
    ///     EntityType::builder("User")
    ///         .field("id", FieldType::Int)
    ///         .relation(RelationDescriptor::has_many("posts", "Post", "id", "user_id"))
    ///         .build()?,
    ///     EntityType::builder("Post")
    ///         .field("id", FieldType::Int)
    ///         .field("user_id", FieldType::Int)
    ///         .relation(RelationDescriptor::belongs_to("author", "User", "user_id", "id"))
    ///         .build()?,
    /// ])?;
    ///
    /// let hops = registry.relation("User", "posts.author")?;
    /// assert_eq!(hops.len(), 2);
    /// assert_eq!(hops[1].target.name(), "User");
    /// assert!(registry.relation("User", "posts.comments").is_err());
    /// # Ok::<(), hydrate_core::HydrateError>(())
    /// ```
    pub fn relation(&self, entity: &str, path: &str) -> Result<Hops<'_>> {
        let mut source = self.lookup(entity)?;
        let unknown = || HydrateError::UnknownRelation {
            entity: entity.to_string(),
            path: path.to_string(),
        };

        let mut hops = Hops::new();
        for segment in path.split('.') {
            let relation = source.relation(segment).ok_or_else(unknown)?;
            let target = self.get(relation.target()).ok_or_else(unknown)?;
            let through = match relation.kind() {
                RelationKind::HasManyThrough(through) => {
                    Some(self.get(&through.entity).ok_or_else(unknown)?)
                }
                _ => None,
            };
            hops.push(Hop {
                source,
                relation,
                target,
                through,
            });
            source = target;
        }
        Ok(hops)
    }
}

fn validate_relation<'a>(
    source: &EntityType,
    relation: &RelationDescriptor,
    resolve: &impl Fn(&str) -> Option<&'a EntityType>,
) -> Result<()> {
    let invalid = |reason: String| HydrateError::InvalidRelation {
        entity: source.name().to_string(),
        relation: relation.name().to_string(),
        reason,
    };
    let require = |entity: &EntityType, field: &str| {
        if entity.has_field(field) {
            Ok(())
        } else {
            Err(invalid(format!(
                "key '{field}' is not a field of '{}'",
                entity.name()
            )))
        }
    };

    let target = resolve(relation.target())
        .ok_or_else(|| invalid(format!("unknown target entity '{}'", relation.target())))?;
    require(source, relation.local_key())?;
    require(target, relation.foreign_key())?;

    match relation.kind() {
        RelationKind::BelongsTo | RelationKind::HasOne | RelationKind::HasMany => {}
        RelationKind::HasManyThrough(through) => {
            let intermediate = resolve(&through.entity).ok_or_else(|| {
                invalid(format!("unknown intermediate entity '{}'", through.entity))
            })?;
            require(intermediate, &through.first_key)?;
            require(intermediate, &through.second_key)?;
        }
        RelationKind::BelongsToMany(pivot) => {
            if pivot.table.is_empty() || pivot.source_key.is_empty() || pivot.target_key.is_empty()
            {
                return Err(invalid("pivot table and keys must be named".to_string()));
            }
        }
        RelationKind::MorphMany(morph) => require(target, &morph.type_column)?,
    }

    let valid_column = |column: &Column| match column.scope {
        Scope::Field => target.has_field(&column.name),
        Scope::Pivot => relation
            .pivot()
            .is_some_and(|pivot| pivot.has_column(&column.name)),
    };
    for constraint in relation.constraints() {
        if let Some(column) = constraint
            .referenced_columns()
            .find(|c| !valid_column(c))
        {
            return Err(invalid(format!("constraint column '{column}' does not exist")));
        }
    }
    Ok(())
}
