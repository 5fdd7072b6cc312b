//! Profiling utilities for the eager-load planner
//!
//! This module provides integration with the puffin profiler to track
//! planner phases when the "profiling" feature is enabled. Without it the
//! macros expand to nothing.

/// Re-export puffin macros for convenience
#[cfg(feature = "profiling")]
pub use puffin::{profile_function, profile_scope};

/// Generic profiling scope macro for planner phase instrumentation.
#[macro_export]
macro_rules! hydrate_profile_scope {
    ($category:literal, $operation:literal) => {
        #[cfg(feature = "profiling")]
        ::puffin::profile_scope!($category, $operation);
    };
}

/// Generic profiling function marker.
#[macro_export]
macro_rules! hydrate_profile_function {
    () => {
        #[cfg(feature = "profiling")]
        ::puffin::profile_function!();
    };
}
