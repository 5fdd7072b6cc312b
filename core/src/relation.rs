//! Relation descriptors: one typed edge of the entity graph.
//!
//! Every kind is wired the same way at its outer edge: `local_key` is a
//! field of the source entity and `foreign_key` a field of the target.
//!
//! | kind            | wiring                                                              |
//! |-----------------|---------------------------------------------------------------------|
//! | `BelongsTo`     | `source.local_key = target.foreign_key` (one)                       |
//! | `HasOne`        | `source.local_key = target.foreign_key` (one)                       |
//! | `HasMany`       | `source.local_key = target.foreign_key` (many)                      |
//! | `HasManyThrough`| `source.local_key = through.first_key`, `through.second_key = target.foreign_key` |
//! | `BelongsToMany` | `source.local_key = pivot.source_key`, `pivot.target_key = target.foreign_key` |
//! | `MorphMany`     | `source.local_key = target.foreign_key AND target.type_column = type_value` |

use compact_str::CompactString;
use hydrate_types::Value;

use crate::query::{Column, Operator, Predicate};

/// Intermediate entity of a has-many-through relation.
#[derive(Debug, Clone, PartialEq)]
pub struct Through {
    pub entity: CompactString,
    /// Field on the intermediate entity matching the source's local key.
    pub first_key: CompactString,
    /// Field on the intermediate entity matching the target's foreign key.
    pub second_key: CompactString,
}

impl Through {
    pub fn new(
        entity: impl Into<CompactString>,
        first_key: impl Into<CompactString>,
        second_key: impl Into<CompactString>,
    ) -> Self {
        Self {
            entity: entity.into(),
            first_key: first_key.into(),
            second_key: second_key.into(),
        }
    }
}

/// Pivot table of a many-to-many relation.
#[derive(Debug, Clone, PartialEq)]
pub struct Pivot {
    pub table: CompactString,
    /// Pivot column holding the source's local key.
    pub source_key: CompactString,
    /// Pivot column holding the target's foreign key.
    pub target_key: CompactString,
    /// Extra pivot columns exposed on loaded records.
    pub columns: Vec<CompactString>,
    /// Adds `created_at` / `updated_at` to the exposed columns.
    pub timestamps: bool,
}

impl Pivot {
    pub fn new(
        table: impl Into<CompactString>,
        source_key: impl Into<CompactString>,
        target_key: impl Into<CompactString>,
    ) -> Self {
        Self {
            table: table.into(),
            source_key: source_key.into(),
            target_key: target_key.into(),
            columns: Vec::new(),
            timestamps: false,
        }
    }

    pub fn columns<I, S>(mut self, columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<CompactString>,
    {
        self.columns = columns.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_timestamps(mut self) -> Self {
        self.timestamps = true;
        self
    }

    /// Every column a loaded record exposes under its pivot map, keys first.
    pub fn exposed_columns(&self) -> impl Iterator<Item = &str> {
        let timestamps: &[&str] = if self.timestamps {
            &["created_at", "updated_at"]
        } else {
            &[]
        };
        [self.source_key.as_str(), self.target_key.as_str()]
            .into_iter()
            .chain(self.columns.iter().map(CompactString::as_str))
            .chain(timestamps.iter().copied())
    }

    #[must_use]
    pub fn has_column(&self, name: &str) -> bool {
        self.exposed_columns().any(|c| c == name)
    }
}

/// Discriminator of a polymorphic has-many relation.
#[derive(Debug, Clone, PartialEq)]
pub struct Morph {
    /// Field on the target holding the owner type.
    pub type_column: CompactString,
    /// Value identifying the source entity type.
    pub type_value: CompactString,
}

impl Morph {
    pub fn new(type_column: impl Into<CompactString>, type_value: impl Into<CompactString>) -> Self {
        Self {
            type_column: type_column.into(),
            type_value: type_value.into(),
        }
    }

    pub(crate) fn predicate(&self) -> Predicate {
        Predicate::compare(
            Column::field(self.type_column.clone()),
            Operator::Eq,
            Value::Text(self.type_value.to_string()),
        )
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum RelationKind {
    BelongsTo,
    HasOne,
    HasMany,
    HasManyThrough(Through),
    BelongsToMany(Pivot),
    MorphMany(Morph),
}

impl RelationKind {
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            RelationKind::BelongsTo => "belongs_to",
            RelationKind::HasOne => "has_one",
            RelationKind::HasMany => "has_many",
            RelationKind::HasManyThrough(_) => "has_many_through",
            RelationKind::BelongsToMany(_) => "belongs_to_many",
            RelationKind::MorphMany(_) => "morph_many",
        }
    }
}

/// A declared relation from one entity type to another.
#[derive(Debug, Clone, PartialEq)]
pub struct RelationDescriptor {
    name: CompactString,
    kind: RelationKind,
    target: CompactString,
    local_key: CompactString,
    foreign_key: CompactString,
    constraints: Vec<Predicate>,
}

impl RelationDescriptor {
    pub fn new(
        name: impl Into<CompactString>,
        kind: RelationKind,
        target: impl Into<CompactString>,
        local_key: impl Into<CompactString>,
        foreign_key: impl Into<CompactString>,
    ) -> Self {
        Self {
            name: name.into(),
            kind,
            target: target.into(),
            local_key: local_key.into(),
            foreign_key: foreign_key.into(),
            constraints: Vec::new(),
        }
    }

    /// `Post::author`: `posts.user_id = users.id`.
    pub fn belongs_to(
        name: impl Into<CompactString>,
        target: impl Into<CompactString>,
        local_key: impl Into<CompactString>,
        owner_key: impl Into<CompactString>,
    ) -> Self {
        Self::new(name, RelationKind::BelongsTo, target, local_key, owner_key)
    }

    /// `User::profile`: `users.id = profiles.user_id`.
    pub fn has_one(
        name: impl Into<CompactString>,
        target: impl Into<CompactString>,
        local_key: impl Into<CompactString>,
        foreign_key: impl Into<CompactString>,
    ) -> Self {
        Self::new(name, RelationKind::HasOne, target, local_key, foreign_key)
    }

    /// `User::posts`: `users.id = posts.user_id`.
    pub fn has_many(
        name: impl Into<CompactString>,
        target: impl Into<CompactString>,
        local_key: impl Into<CompactString>,
        foreign_key: impl Into<CompactString>,
    ) -> Self {
        Self::new(name, RelationKind::HasMany, target, local_key, foreign_key)
    }

    pub fn has_many_through(
        name: impl Into<CompactString>,
        target: impl Into<CompactString>,
        through: Through,
        local_key: impl Into<CompactString>,
        foreign_key: impl Into<CompactString>,
    ) -> Self {
        Self::new(
            name,
            RelationKind::HasManyThrough(through),
            target,
            local_key,
            foreign_key,
        )
    }

    pub fn belongs_to_many(
        name: impl Into<CompactString>,
        target: impl Into<CompactString>,
        pivot: Pivot,
        local_key: impl Into<CompactString>,
        foreign_key: impl Into<CompactString>,
    ) -> Self {
        Self::new(
            name,
            RelationKind::BelongsToMany(pivot),
            target,
            local_key,
            foreign_key,
        )
    }

    pub fn morph_many(
        name: impl Into<CompactString>,
        target: impl Into<CompactString>,
        morph: Morph,
        local_key: impl Into<CompactString>,
        foreign_key: impl Into<CompactString>,
    ) -> Self {
        Self::new(
            name,
            RelationKind::MorphMany(morph),
            target,
            local_key,
            foreign_key,
        )
    }

    /// Attaches a default filter applied to every load of this relation.
    pub fn constrain(mut self, column: &str, op: Operator, value: impl Into<Value>) -> Self {
        self.constraints
            .push(Predicate::compare(Column::parse(column), op, value));
        self
    }

    pub fn with_constraint(mut self, predicate: Predicate) -> Self {
        self.constraints.push(predicate);
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> &RelationKind {
        &self.kind
    }

    pub fn target(&self) -> &str {
        &self.target
    }

    pub fn local_key(&self) -> &str {
        &self.local_key
    }

    pub fn foreign_key(&self) -> &str {
        &self.foreign_key
    }

    pub fn constraints(&self) -> &[Predicate] {
        &self.constraints
    }

    /// Pivot of a many-to-many relation.
    pub fn pivot(&self) -> Option<&Pivot> {
        match &self.kind {
            RelationKind::BelongsToMany(pivot) => Some(pivot),
            _ => None,
        }
    }

    /// Whether the relation resolves to at most one record.
    #[must_use]
    pub const fn is_single(&self) -> bool {
        matches!(self.kind, RelationKind::BelongsTo | RelationKind::HasOne)
    }

    /// Filters every fetch of this relation carries besides the key match.
    pub(crate) fn implicit_filters(&self) -> impl Iterator<Item = Predicate> + '_ {
        let morph = match &self.kind {
            RelationKind::MorphMany(morph) => Some(morph.predicate()),
            _ => None,
        };
        morph.into_iter().chain(self.constraints.iter().cloned())
    }
}
