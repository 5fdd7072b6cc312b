//! SQLite adapters.
//!
//! Every adapter renders [`QuerySpec`](hydrate_core::query::QuerySpec)s with
//! [`Dialect::SQLite`](hydrate_types::Dialect::SQLite) and reads result
//! columns back by name.

#[cfg(feature = "rusqlite")]
pub mod rusqlite;

#[cfg(feature = "rusqlite")]
pub use self::rusqlite::SqliteExecutor;
