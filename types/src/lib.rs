//! Shared type definitions for hydrate
//!
//! This crate provides the value model used across the hydrate crates:
//!
//! - [`Value`] - a dynamically typed column value
//! - [`FieldType`] - the semantic type of a declared entity field
//! - [`Dialect`] - database dialect enum (SQLite, PostgreSQL, MySQL)
//!
//! # Features
//!
//! - `serde` - Enable serde serialization/deserialization

mod dialect;
mod field;
mod value;

pub use dialect::{Dialect, DialectParseError};
pub use field::FieldType;
pub use value::Value;

/// Prelude module for commonly used types
pub mod prelude {
    pub use crate::{Dialect, FieldType, Value};
}
