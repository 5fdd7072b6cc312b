//! Relation-load directives attached to a query with `.with_directive()`.

use compact_str::CompactString;
use hydrate_types::Value;

use super::predicate::{Column, Operator, Predicate};
use super::spec::{Aggregate, Direction, OrderBy};

/// How a relation path participates in a query.
#[derive(Debug, Clone, PartialEq)]
pub enum DirectiveMode {
    /// Batch-load the related records onto each parent.
    Load,
    /// Pushdown: `<path>_count` column.
    CountOnly,
    /// Pushdown: `<path>_<fn>` column over a target field.
    AggregateOnly {
        function: Aggregate,
        column: CompactString,
    },
    /// Pushdown: keep parents that have at least one match.
    ExistsOnly,
    /// Pushdown: keep parents that have no match.
    Missing,
}

impl DirectiveMode {
    /// Whether the directive is folded into the parent query.
    #[must_use]
    pub const fn is_pushdown(&self) -> bool {
        !matches!(self, DirectiveMode::Load)
    }

    #[must_use]
    pub const fn is_aggregate(&self) -> bool {
        matches!(
            self,
            DirectiveMode::CountOnly | DirectiveMode::AggregateOnly { .. }
        )
    }
}

/// Configures how one relation path is loaded or pushed down.
///
/// Filters, columns and ordering are validated against the relation's
/// target entity when the directive is attached to a [`Query`](super::Query).
///
/// ```
/// use hydrate_core::query::{Direction, EagerLoadDirective, Operator};
///
/// let recent = EagerLoadDirective::load()
///     .columns(["id", "title"])
///     .filter("published", Operator::Eq, true)
///     .order_by("created_at", Direction::Desc);
/// assert_eq!(recent.columns.len(), 2);
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct EagerLoadDirective {
    /// Dotted relation path, set when attached to a query.
    pub path: CompactString,
    pub columns: Vec<CompactString>,
    pub filters: Vec<Predicate>,
    pub order_by: Vec<OrderBy>,
    pub mode: DirectiveMode,
    /// Alias of the pushdown column, defaults to `<path>_<fn>`.
    pub alias: Option<CompactString>,
}

impl EagerLoadDirective {
    fn with_mode(mode: DirectiveMode) -> Self {
        Self {
            path: CompactString::default(),
            columns: Vec::new(),
            filters: Vec::new(),
            order_by: Vec::new(),
            mode,
            alias: None,
        }
    }

    pub fn load() -> Self {
        Self::with_mode(DirectiveMode::Load)
    }

    pub fn count() -> Self {
        Self::with_mode(DirectiveMode::CountOnly)
    }

    /// `Aggregate::Count` over a column counts its non-null values; use
    /// [`count`](Self::count) to count rows.
    pub fn aggregate(function: Aggregate, column: impl Into<CompactString>) -> Self {
        Self::with_mode(DirectiveMode::AggregateOnly {
            function,
            column: column.into(),
        })
    }

    pub fn exists() -> Self {
        Self::with_mode(DirectiveMode::ExistsOnly)
    }

    pub fn missing() -> Self {
        Self::with_mode(DirectiveMode::Missing)
    }

    /// Restricts the loaded columns. Join keys are always fetched.
    pub fn columns<I, S>(mut self, columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<CompactString>,
    {
        self.columns = columns.into_iter().map(Into::into).collect();
        self
    }

    /// Adds a filter on a target field, or on a pivot column
    /// (`pivot.<col>`, or a bare name the target does not declare).
    pub fn filter(mut self, column: &str, op: Operator, value: impl Into<Value>) -> Self {
        self.filters
            .push(Predicate::compare(Column::parse(column), op, value));
        self
    }

    pub fn filter_in<I, V>(mut self, column: &str, values: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        self.filters.push(Predicate::is_in(
            Column::parse(column),
            values.into_iter().map(Into::into).collect(),
        ));
        self
    }

    pub fn filter_null(mut self, column: &str) -> Self {
        self.filters.push(Predicate::null(Column::parse(column)));
        self
    }

    pub fn filter_not_null(mut self, column: &str) -> Self {
        self.filters.push(Predicate::not_null(Column::parse(column)));
        self
    }

    pub fn order_by(mut self, column: &str, direction: Direction) -> Self {
        self.order_by.push(OrderBy {
            column: Column::parse(column),
            direction,
        });
        self
    }

    pub fn alias(mut self, alias: impl Into<CompactString>) -> Self {
        self.alias = Some(alias.into());
        self
    }

    /// Column name the pushdown result is stored under.
    #[must_use]
    pub fn aggregate_alias(&self) -> Option<CompactString> {
        if let Some(alias) = &self.alias {
            return Some(alias.clone());
        }
        let function = match &self.mode {
            DirectiveMode::CountOnly => Aggregate::Count,
            DirectiveMode::AggregateOnly { function, .. } => *function,
            _ => return None,
        };
        Some(compact_str::format_compact!("{}_{}", self.path, function))
    }

    /// Relation path split into segments.
    pub fn segments(&self) -> impl Iterator<Item = &str> {
        self.path.split('.')
    }
}
