//! The executor seam: how resolved queries reach a relational store.

mod memory;

pub use memory::MemoryExecutor;

use compact_str::CompactString;
use hydrate_types::Value;

use crate::error::ExecutionError;
use crate::query::QuerySpec;

/// Executes a resolved [`QuerySpec`] against a relational store.
///
/// The planner only hands over specs whose eager directives have already
/// been planned away: root queries (with pushdown filters and aggregate
/// columns) and batched secondary fetches (`IN` filters, optional pivot
/// join). Every call is one round trip.
///
/// Lock modes are advisory; pairing them with a transaction is up to the
/// implementation.
pub trait Executor {
    fn execute(&self, spec: &QuerySpec) -> Result<Vec<Row>, ExecutionError>;
}

impl<E: Executor + ?Sized> Executor for &E {
    #[inline]
    fn execute(&self, spec: &QuerySpec) -> Result<Vec<Row>, ExecutionError> {
        (**self).execute(spec)
    }
}

impl<E: Executor + ?Sized> Executor for std::sync::Arc<E> {
    #[inline]
    fn execute(&self, spec: &QuerySpec) -> Result<Vec<Row>, ExecutionError> {
        (**self).execute(spec)
    }
}

/// One raw result row: ordered `(column, value)` pairs.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Row {
    columns: Vec<(CompactString, Value)>,
}

impl Row {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            columns: Vec::with_capacity(capacity),
        }
    }

    /// Appends a column, replacing an earlier one with the same name.
    pub fn push(&mut self, column: impl Into<CompactString>, value: impl Into<Value>) {
        let column = column.into();
        let value = value.into();
        match self.columns.iter_mut().find(|(c, _)| *c == column) {
            Some(slot) => slot.1 = value,
            None => self.columns.push((column, value)),
        }
    }

    pub fn get(&self, column: &str) -> Option<&Value> {
        self.columns
            .iter()
            .find_map(|(c, v)| (c == column).then_some(v))
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.columns.iter().map(|(c, v)| (c.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }
}

impl<K, V> FromIterator<(K, V)> for Row
where
    K: Into<CompactString>,
    V: Into<Value>,
{
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut row = Row::new();
        for (k, v) in iter {
            row.push(k, v);
        }
        row
    }
}

impl IntoIterator for Row {
    type Item = (CompactString, Value);
    type IntoIter = std::vec::IntoIter<(CompactString, Value)>;

    fn into_iter(self) -> Self::IntoIter {
        self.columns.into_iter()
    }
}
