//! Tracing utilities for statement cache and transaction observability.
//!
//! The `#[cfg(feature = "tracing")]` inside each macro is evaluated in the
//! crate that invokes it, so a caller emits events only when its own `tracing`
//! feature (and `tracing` dependency) is enabled. Otherwise the macros expand to
//! nothing, avoiding `#[cfg]` boilerplate at every call site.

/// Emit a debug-level tracing event when a statement is sent to the driver for
/// preparation.
///
/// ```ignore
/// stmtcache_trace_prepare!(query, "named", "pool");
/// ```
#[macro_export]
macro_rules! stmtcache_trace_prepare {
    ($sql:expr, $namespace:expr, $scope:expr) => {
        #[cfg(feature = "tracing")]
        tracing::debug!(
            sql = %$sql,
            namespace = $namespace,
            scope = $scope,
            "stmtcache.prepare"
        );
    };
}

/// Emit a trace-level event for a cache hit.
#[macro_export]
macro_rules! stmtcache_trace_hit {
    ($sql:expr, $namespace:expr, $scope:expr) => {
        #[cfg(feature = "tracing")]
        tracing::trace!(
            sql = %$sql,
            namespace = $namespace,
            scope = $scope,
            "stmtcache.hit"
        );
    };
}

/// Emit an info-level tracing event for transaction lifecycle (begin, commit, rollback).
///
/// ```ignore
/// stmtcache_trace_tx!("begin", "sqlite.rusqlite");
/// ```
#[macro_export]
macro_rules! stmtcache_trace_tx {
    ($event:literal, $driver:expr) => {
        #[cfg(feature = "tracing")]
        tracing::info!(event = $event, driver = %$driver, "stmtcache.transaction");
    };
}
