//! Core of the hydrate eager-loading resolver.
//!
//! Entities and their relations are declared once in a [`Registry`]. A
//! [`Query`](query::Query) collects filters, ordering, locking and eager-load
//! directives; a [`Resolver`] turns it into one root fetch plus one batched
//! fetch per relation path and stitches the results into [`Record`] trees.
//!
//! Storage is reached through the [`Executor`] trait. [`MemoryExecutor`]
//! evaluates [`QuerySpec`](query::QuerySpec)s in memory; SQL adapters render
//! them with [`sql::render`].
//!
//! # Features
//!
//! - `serde` - Serialize records to JSON-shaped trees
//! - `config` - Load entity schemas from TOML
//! - `tracing` - Emit `tracing` events for every fetch
//! - `profiling` - Puffin scopes around planner phases

pub mod entity;
pub mod error;
pub mod executor;
pub mod plan;
pub mod query;
pub mod record;
pub mod registry;
pub mod relation;
pub mod sql;
mod trace;

pub mod profiling;

#[cfg(feature = "config")]
pub mod config;

pub use entity::{EntityBuilder, EntityType, FieldDef};
pub use error::{ExecutionError, HydrateError, Result};
pub use executor::{Executor, MemoryExecutor, Row};
pub use plan::Resolver;
pub use record::{Record, Related};
pub use registry::{Hop, Hops, Registry};
pub use relation::{Morph, Pivot, RelationDescriptor, RelationKind, Through};
pub use sql::{RenderedQuery, render};

pub use hydrate_types;

/// Prelude module for commonly used types
pub mod prelude {
    pub use crate::query::{Aggregate, Direction, EagerLoadDirective, Operator, Query};
    pub use crate::{
        EntityType, Executor, HydrateError, MemoryExecutor, Record, Registry, Related,
        RelationDescriptor, Resolver, Row,
    };
    pub use hydrate_types::{Dialect, FieldType, Value};
}
