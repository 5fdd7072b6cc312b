//! Entity type metadata.

use compact_str::CompactString;
use hashbrown::HashSet;
use hydrate_types::{FieldType, Value};

use crate::error::{HydrateError, Result};
use crate::record::Record;
use crate::relation::RelationDescriptor;

/// A declared field of an entity type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldDef {
    pub name: CompactString,
    pub ty: FieldType,
}

/// Metadata of one entity type: fields, primary key and relations.
///
/// Built once through [`EntityType::builder`] and immutable afterwards.
#[derive(Debug, Clone, PartialEq)]
pub struct EntityType {
    name: CompactString,
    table: CompactString,
    primary_key: CompactString,
    fields: Vec<FieldDef>,
    relations: Vec<RelationDescriptor>,
}

impl EntityType {
    /// Starts a definition. The table defaults to the entity name and the
    /// primary key to `id`.
    pub fn builder(name: impl Into<CompactString>) -> EntityBuilder {
        EntityBuilder {
            name: name.into(),
            table: None,
            primary_key: CompactString::const_new("id"),
            fields: Vec::new(),
            relations: Vec::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn table(&self) -> &str {
        &self.table
    }

    pub fn primary_key(&self) -> &str {
        &self.primary_key
    }

    pub fn fields(&self) -> &[FieldDef] {
        &self.fields
    }

    pub fn field(&self, name: &str) -> Option<&FieldDef> {
        self.fields.iter().find(|f| f.name == name)
    }

    #[must_use]
    pub fn has_field(&self, name: &str) -> bool {
        self.field(name).is_some()
    }

    /// Relations in declaration order.
    pub fn relations(&self) -> &[RelationDescriptor] {
        &self.relations
    }

    pub fn relation(&self, name: &str) -> Option<&RelationDescriptor> {
        self.relations.iter().find(|r| r.name() == name)
    }

    /// Builds a new record from caller-supplied attributes.
    ///
    /// Only declared fields are accepted; anything else fails with
    /// [`HydrateError::UnknownField`]. Values are coerced to the declared
    /// field types.
    pub fn make<I, K, V>(&self, attributes: I) -> Result<Record>
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: Into<Value>,
    {
        let mut record = Record::new(self.name.clone());
        for (key, value) in attributes {
            let key = key.as_ref();
            let field = self
                .field(key)
                .ok_or_else(|| HydrateError::unknown_field(&self.name, key))?;
            record.set(field.name.clone(), value.into().coerce(field.ty));
        }
        Ok(record)
    }
}

/// Builder for [`EntityType`].
#[derive(Debug, Clone)]
pub struct EntityBuilder {
    name: CompactString,
    table: Option<CompactString>,
    primary_key: CompactString,
    fields: Vec<FieldDef>,
    relations: Vec<RelationDescriptor>,
}

impl EntityBuilder {
    pub fn table(mut self, table: impl Into<CompactString>) -> Self {
        self.table = Some(table.into());
        self
    }

    pub fn primary_key(mut self, field: impl Into<CompactString>) -> Self {
        self.primary_key = field.into();
        self
    }

    pub fn field(mut self, name: impl Into<CompactString>, ty: FieldType) -> Self {
        self.fields.push(FieldDef {
            name: name.into(),
            ty,
        });
        self
    }

    pub fn relation(mut self, relation: RelationDescriptor) -> Self {
        self.relations.push(relation);
        self
    }

    /// Checks the definition's own structure. Cross-entity references are
    /// validated when the entity is registered.
    pub fn build(self) -> Result<EntityType> {
        self.validate()?;
        Ok(EntityType {
            table: self.table.unwrap_or_else(|| self.name.clone()),
            name: self.name,
            primary_key: self.primary_key,
            fields: self.fields,
            relations: self.relations,
        })
    }

    fn validate(&self) -> Result<()> {
        let invalid = |reason: String| HydrateError::InvalidEntity {
            entity: self.name.to_string(),
            reason,
        };

        let mut seen = HashSet::new();
        for field in &self.fields {
            if !seen.insert(field.name.as_str()) {
                return Err(invalid(format!("field '{}' declared twice", field.name)));
            }
        }
        if !seen.contains(self.primary_key.as_str()) {
            return Err(invalid(format!(
                "primary key '{}' is not a declared field",
                self.primary_key
            )));
        }

        let mut names = HashSet::new();
        for relation in &self.relations {
            let reason = if !names.insert(relation.name()) {
                "relation declared twice"
            } else if seen.contains(relation.name()) {
                "relation name shadows a field"
            } else if relation.name().contains('.') || relation.name().is_empty() {
                "relation names must be non-empty and contain no '.'"
            } else {
                continue;
            };
            return Err(HydrateError::InvalidRelation {
                entity: self.name.to_string(),
                relation: relation.name().to_string(),
                reason: reason.to_string(),
            });
        }
        Ok(())
    }
}
