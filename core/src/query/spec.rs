//! The executor-facing query description.

use compact_str::CompactString;

use crate::error::HydrateError;

use super::directive::EagerLoadDirective;
use super::predicate::{Column, Predicate};

/// Sort direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Direction {
    #[default]
    Asc,
    Desc,
}

impl Direction {
    #[must_use]
    pub const fn as_sql(&self) -> &'static str {
        match self {
            Direction::Asc => "ASC",
            Direction::Desc => "DESC",
        }
    }
}

/// One `ORDER BY` term.
#[derive(Debug, Clone, PartialEq)]
pub struct OrderBy {
    pub column: Column,
    pub direction: Direction,
}

/// Pessimistic locking requested for the root query.
///
/// Advisory metadata for the executor; never propagated to secondary
/// eager-load fetches.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum LockMode {
    #[default]
    None,
    ForUpdate,
    SharedLock,
}

/// Aggregate function of an aggregate pushdown.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Aggregate {
    Count,
    Sum,
    Avg,
    Min,
    Max,
}

impl Aggregate {
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Aggregate::Count => "count",
            Aggregate::Sum => "sum",
            Aggregate::Avg => "avg",
            Aggregate::Min => "min",
            Aggregate::Max => "max",
        }
    }

    #[must_use]
    pub const fn as_sql(&self) -> &'static str {
        match self {
            Aggregate::Count => "COUNT",
            Aggregate::Sum => "SUM",
            Aggregate::Avg => "AVG",
            Aggregate::Min => "MIN",
            Aggregate::Max => "MAX",
        }
    }
}

impl core::str::FromStr for Aggregate {
    type Err = HydrateError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let function = s.trim();
        [
            Aggregate::Count,
            Aggregate::Sum,
            Aggregate::Avg,
            Aggregate::Min,
            Aggregate::Max,
        ]
        .into_iter()
        .find(|a| a.as_str().eq_ignore_ascii_case(function))
        .ok_or_else(|| HydrateError::UnsupportedAggregate(s.to_string()))
    }
}

impl core::fmt::Display for Aggregate {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A filter on the queried rows.
#[derive(Debug, Clone, PartialEq)]
pub enum Filter {
    Predicate(Predicate),
    /// `[NOT] EXISTS (correlated subquery)`
    Exists {
        subquery: Box<Subquery>,
        negated: bool,
    },
}

impl From<Predicate> for Filter {
    fn from(p: Predicate) -> Self {
        Filter::Predicate(p)
    }
}

/// Join table sitting between the enclosing row and a subquery's target.
///
/// Matches `via.parent_key = outer.<parent_key>` and
/// `via.key = target.<key>`.
#[derive(Debug, Clone, PartialEq)]
pub struct Via {
    pub table: CompactString,
    pub parent_key: CompactString,
    pub key: CompactString,
}

/// A subquery correlated with the row of its enclosing query.
///
/// Without `via`: `target.key = outer.parent_key`.
#[derive(Debug, Clone, PartialEq)]
pub struct Subquery {
    /// Relation name, for diagnostics.
    pub relation: CompactString,
    pub table: CompactString,
    pub key: CompactString,
    pub parent_key: CompactString,
    pub via: Option<Via>,
    /// Filters on the target row. Pivot-scoped columns read the `via` row.
    pub filters: Vec<Filter>,
}

/// A computed column: `(SELECT fn(target.column) FROM ...) AS alias`.
#[derive(Debug, Clone, PartialEq)]
pub struct AggregateColumn {
    pub alias: CompactString,
    pub function: Aggregate,
    /// `None` means `COUNT(*)`.
    pub column: Option<CompactString>,
    pub subquery: Subquery,
}

/// Reserved alias prefix for pivot columns in a result row.
pub const PIVOT_PREFIX: &str = "__pivot_";

/// Pivot join of a batched many-to-many fetch.
///
/// `INNER JOIN table ON table.target_key = target.foreign_key`; the listed
/// pivot columns come back aliased `__pivot_<column>`.
#[derive(Debug, Clone, PartialEq)]
pub struct PivotJoin {
    pub table: CompactString,
    pub target_key: CompactString,
    pub foreign_key: CompactString,
    pub columns: Vec<CompactString>,
}

/// A resolved query against one entity.
///
/// Built by [`Query`](super::Query). The planner hands the executor specs
/// whose `directives` are empty: eager loads become separate specs and
/// pushdowns become `filters` / `aggregates`.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct QuerySpec {
    pub entity: CompactString,
    pub table: CompactString,
    /// Projected fields, empty selects every column.
    pub columns: Vec<CompactString>,
    pub filters: Vec<Filter>,
    pub order_by: Vec<OrderBy>,
    pub limit: Option<u64>,
    pub offset: Option<u64>,
    pub lock: LockMode,
    pub pivot: Option<PivotJoin>,
    pub aggregates: Vec<AggregateColumn>,
    pub directives: Vec<EagerLoadDirective>,
}

impl QuerySpec {
    pub fn new(entity: impl Into<CompactString>, table: impl Into<CompactString>) -> Self {
        Self {
            entity: entity.into(),
            table: table.into(),
            ..Default::default()
        }
    }

    /// Adds `column` to a non-empty projection.
    pub(crate) fn ensure_column(&mut self, column: &str) {
        if !self.columns.is_empty() && !self.columns.iter().any(|c| c == column) {
            self.columns.push(column.into());
        }
    }

    /// The `IN` list of the first predicate on `column`, if any.
    pub fn in_values(&self, column: &Column) -> Option<&[hydrate_types::Value]> {
        self.filters.iter().find_map(|f| match f {
            Filter::Predicate(Predicate {
                column: c,
                op: super::Operator::In,
                operand: super::Operand::List(values),
            }) if c == column => Some(values.as_slice()),
            _ => None,
        })
    }
}
