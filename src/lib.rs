//! # Hydrate
//!
//! An eager-loading relationship resolver for object-relational mappers.
//!
//! Declare entities and relations once, then resolve a query together
//! with any number of relation paths in a bounded number of round trips:
//! one root fetch, plus one batched fetch per distinct relation path.
//!
//! ## Quick Start
//!
//! ```rust
//! use hydrate::prelude::*;
//!
//! # fn main() -> hydrate::Result<()> {
//! let mut registry = Registry::new();
//! registry.register_all([
//!     EntityType::builder("User")
//!         .table("users")
//!         .field("id", FieldType::Int)
//!         .field("name", FieldType::String)
//!         .relation(RelationDescriptor::has_many("posts", "Post", "id", "user_id"))
//!         .build()?,
//!     EntityType::builder("Post")
//!         .table("posts")
//!         .field("id", FieldType::Int)
//!         .field("user_id", FieldType::Int)
//!         .build()?,
//! ])?;
//!
//! let store = MemoryExecutor::new()
//!     .with_table("users", [Row::from_iter([("id", Value::from(1)), ("name", "ada".into())])])
//!     .with_table("posts", [
//!         Row::from_iter([("id", 10), ("user_id", 1)]),
//!         Row::from_iter([("id", 11), ("user_id", 1)]),
//!     ]);
//!
//! let resolver = Resolver::new(&registry, &store);
//! let users = resolver.get(resolver.query("User")?.with("posts").with_count("posts"))?;
//!
//! assert_eq!(users[0].many("posts").map(<[_]>::len), Some(2));
//! assert_eq!(users[0].get("posts_count"), Some(&Value::Int(2)));
//! # Ok(())
//! # }
//! ```
//!
//! ## Adapters
//!
//! | Store            | Executor                      | Feature Flag |
//! |------------------|-------------------------------|--------------|
//! | In-memory        | [`MemoryExecutor`]            | -            |
//! | SQLite rusqlite  | `sqlite::SqliteExecutor`      | `rusqlite`   |
//!
//! Any other store implements [`Executor`] and renders specs with
//! [`sql::render`] for its [`Dialect`].

/// Result type for resolver operations
pub use hydrate_core::error::Result;

/// Error types
pub mod error {
    pub use hydrate_core::error::{ExecutionError, HydrateError};
}

/// Value model shared by every crate
pub use hydrate_types as types;

/// Database dialect enum
pub use hydrate_types::Dialect;

pub use hydrate_core::{
    EntityBuilder, EntityType, ExecutionError, Executor, FieldDef, HydrateError, MemoryExecutor,
    Morph, Pivot, Record, Related, Registry, RelationDescriptor, RelationKind, Resolver, Row,
    Through,
};

/// Query builder, directives and the executor-facing query spec.
pub use hydrate_core::query;

/// SQL rendering of query specs.
pub use hydrate_core::sql;

/// Registry bootstrap from TOML.
#[cfg(feature = "config")]
pub use hydrate_core::config;

pub mod sqlite;

pub mod prelude {
    pub use hydrate_core::prelude::*;

    #[cfg(feature = "rusqlite")]
    pub use crate::sqlite::SqliteExecutor;
}
