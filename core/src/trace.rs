//! Tracing utilities for resolver observability.
//!
//! Enable the `tracing` feature to emit events via the `tracing` crate.
//! These macros no-op when the feature is disabled, avoiding `#[cfg]` boilerplate
//! at every call site.

/// Emit a debug-level tracing event for one executor round trip issued by the
/// planner.
///
/// ```ignore
/// hydrate_trace_fetch!("posts.comments", "comments", keys.len());
/// ```
#[macro_export]
macro_rules! hydrate_trace_fetch {
    ($path:expr, $table:expr, $batch:expr) => {
        #[cfg(feature = "tracing")]
        ::tracing::debug!(path = %$path, table = %$table, batch = $batch, "hydrate.fetch");
    };
}

/// Emit a debug-level tracing event with the SQL text and parameter count.
///
/// ```ignore
/// hydrate_trace_query!(&rendered.sql, rendered.params.len());
/// ```
#[macro_export]
macro_rules! hydrate_trace_query {
    ($sql:expr, $param_count:expr) => {
        #[cfg(feature = "tracing")]
        ::tracing::debug!(sql = %$sql, params = $param_count, "hydrate.query");
    };
}

/// Emit a debug-level tracing event for the root query of a resolution.
///
/// ```ignore
/// hydrate_trace_root!("User", spec.lock, spec.aggregates.len());
/// ```
#[macro_export]
macro_rules! hydrate_trace_root {
    ($entity:expr, $lock:expr, $pushdown:expr) => {
        #[cfg(feature = "tracing")]
        ::tracing::debug!(entity = %$entity, lock = ?$lock, pushdown = $pushdown, "hydrate.root");
    };
}
