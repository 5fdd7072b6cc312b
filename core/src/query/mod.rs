//! Query description layer.
//!
//! [`Query`] validates and accumulates filters, ordering, locking and
//! relation directives into a [`QuerySpec`]. The planner turns that spec
//! into the executor-facing root query plus one batched fetch per eager
//! relation path.

mod builder;
mod directive;
mod predicate;
mod spec;

pub use builder::Query;
pub use directive::{DirectiveMode, EagerLoadDirective};
pub use predicate::{Column, Operand, Operator, Predicate, Scope};
pub use spec::{
    Aggregate, AggregateColumn, Direction, Filter, LockMode, OrderBy, PIVOT_PREFIX, PivotJoin,
    QuerySpec, Subquery, Via,
};
