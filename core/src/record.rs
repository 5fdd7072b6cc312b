//! Hydrated entity instances.

use compact_str::CompactString;
use hashbrown::HashMap;
use hydrate_types::Value;

use crate::entity::EntityType;
use crate::executor::Row;
use crate::query::PIVOT_PREFIX;

/// A loaded relation.
///
/// A relation absent from [`Record::relations`] was never loaded;
/// `One(None)` and an empty `Many` were loaded and matched nothing.
#[derive(Debug, Clone, PartialEq)]
pub enum Related {
    /// `BelongsTo` / `HasOne`
    One(Option<Box<Record>>),
    Many(Vec<Record>),
}

impl Related {
    /// Loaded records as a slice, zero or one for single relations.
    pub fn records(&self) -> &[Record] {
        match self {
            Related::One(Some(record)) => core::slice::from_ref(record.as_ref()),
            Related::One(None) => &[],
            Related::Many(records) => records,
        }
    }

    pub fn len(&self) -> usize {
        self.records().len()
    }

    pub fn is_empty(&self) -> bool {
        self.records().is_empty()
    }
}

/// An in-memory instance of an entity type.
///
/// Fields keep their result-set order. Pushdown aggregates land here too,
/// under their alias. Pivot columns of a many-to-many load are kept apart
/// in [`Record::pivot`].
#[derive(Debug, Clone, PartialEq)]
pub struct Record {
    entity: CompactString,
    fields: Vec<(CompactString, Value)>,
    relations: HashMap<CompactString, Related>,
    pivot: Option<Vec<(CompactString, Value)>>,
}

impl Record {
    pub fn new(entity: impl Into<CompactString>) -> Self {
        Self {
            entity: entity.into(),
            fields: Vec::new(),
            relations: HashMap::new(),
            pivot: None,
        }
    }

    /// Hydrates a row of `entity`.
    ///
    /// Declared fields are coerced to their semantic type, `__pivot_*`
    /// columns go to the pivot map and anything else is kept verbatim.
    pub fn from_row(entity: &EntityType, row: Row) -> Self {
        let mut record = Record::new(entity.name());
        record.fields.reserve(row.len());
        for (column, value) in row {
            if let Some(name) = column.strip_prefix(PIVOT_PREFIX) {
                record
                    .pivot
                    .get_or_insert_with(Vec::new)
                    .push((name.into(), value));
                continue;
            }
            let value = match entity.field(&column) {
                Some(field) => value.coerce(field.ty),
                None => value,
            };
            record.fields.push((column, value));
        }
        record
    }

    pub fn entity(&self) -> &str {
        &self.entity
    }

    pub fn get(&self, field: &str) -> Option<&Value> {
        self.fields
            .iter()
            .find_map(|(name, value)| (name == field).then_some(value))
    }

    pub fn set(&mut self, field: impl Into<CompactString>, value: impl Into<Value>) {
        let field = field.into();
        let value = value.into();
        match self.fields.iter_mut().find(|(name, _)| *name == field) {
            Some(slot) => slot.1 = value,
            None => self.fields.push((field, value)),
        }
    }

    pub fn fields(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.fields.iter().map(|(name, value)| (name.as_str(), value))
    }

    pub fn relation(&self, name: &str) -> Option<&Related> {
        self.relations.get(name)
    }

    pub fn relations(&self) -> &HashMap<CompactString, Related> {
        &self.relations
    }

    #[must_use]
    pub fn is_loaded(&self, relation: &str) -> bool {
        self.relations.contains_key(relation)
    }

    /// Records of a loaded to-many relation.
    pub fn many(&self, relation: &str) -> Option<&[Record]> {
        match self.relations.get(relation)? {
            Related::Many(records) => Some(records),
            Related::One(_) => None,
        }
    }

    /// Record of a loaded to-one relation; `Some(None)` when it matched nothing.
    pub fn one(&self, relation: &str) -> Option<Option<&Record>> {
        match self.relations.get(relation)? {
            Related::One(record) => Some(record.as_deref()),
            Related::Many(_) => None,
        }
    }

    /// Replaces a relation wholesale.
    pub fn set_relation(&mut self, name: impl Into<CompactString>, related: Related) {
        self.relations.insert(name.into(), related);
    }

    pub fn unset_relation(&mut self, name: &str) -> Option<Related> {
        self.relations.remove(name)
    }

    /// Pivot columns of a record loaded through a many-to-many relation.
    pub fn pivot(&self) -> Option<&[(CompactString, Value)]> {
        self.pivot.as_deref()
    }

    pub fn pivot_value(&self, column: &str) -> Option<&Value> {
        self.pivot
            .as_deref()?
            .iter()
            .find_map(|(name, value)| (name == column).then_some(value))
    }
}

#[cfg(feature = "serde")]
impl Record {
    /// Converts the record tree to a JSON value; relations nest under their
    /// names and pivot values under `"pivot"`.
    pub fn to_json(&self) -> Result<serde_json::Value, serde_json::Error> {
        serde_json::to_value(self)
    }
}

#[cfg(feature = "serde")]
impl serde::Serialize for Record {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        use serde::ser::SerializeMap;

        let mut relations: Vec<_> = self.relations.iter().collect();
        relations.sort_unstable_by(|a, b| a.0.cmp(b.0));

        let len = self.fields.len() + relations.len() + usize::from(self.pivot.is_some());
        let mut map = serializer.serialize_map(Some(len))?;
        for (name, value) in &self.fields {
            map.serialize_entry(name.as_str(), value)?;
        }
        for (name, related) in relations {
            map.serialize_entry(name.as_str(), related)?;
        }
        if let Some(pivot) = &self.pivot {
            map.serialize_entry("pivot", &PivotMap(pivot))?;
        }
        map.end()
    }
}

#[cfg(feature = "serde")]
impl serde::Serialize for Related {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Related::One(record) => record.serialize(serializer),
            Related::Many(records) => records.serialize(serializer),
        }
    }
}

#[cfg(feature = "serde")]
struct PivotMap<'a>(&'a [(CompactString, Value)]);

#[cfg(feature = "serde")]
impl serde::Serialize for PivotMap<'_> {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_map(self.0.iter().map(|(k, v)| (k.as_str(), v)))
    }
}
