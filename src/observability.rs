//! Logging helpers for term-filter evaluation.
//!
//! Events go through `tracing` with target "tonbo::term" and always carry an
//! `event` field. The crate never installs a subscriber; embedders configure
//! `tracing` themselves.
//!
//! ## Conventions
//!
//! - `event`: snake_case event name (required)
//! - `component`: strategy or subsystem (e.g., "term_set", "pk", "index")
//! - Use `%` for Display, `?` for Debug formatting
//! - Per-batch events stay at trace level; per-node events at debug.

/// Target for all term-filter log events.
pub(crate) const TERM_TARGET: &str = "tonbo::term";

/// Macro for trace-level log events.
macro_rules! log_trace {
    ($($field:tt)*) => {
        ::tracing::trace!(target: $crate::observability::TERM_TARGET, $($field)*)
    };
}

/// Macro for debug-level log events.
///
/// # Example
/// ```ignore
/// log_debug!(
///     component = "pk",
///     event = "pk_offsets_resolved",
///     column = %name,
///     matches = offsets.len(),
/// );
/// ```
macro_rules! log_debug {
    ($($field:tt)*) => {
        ::tracing::debug!(target: $crate::observability::TERM_TARGET, $($field)*)
    };
}

/// Macro for error-level log events.
macro_rules! log_error {
    ($($field:tt)*) => {
        ::tracing::error!(target: $crate::observability::TERM_TARGET, $($field)*)
    };
}

pub(crate) use log_debug;
pub(crate) use log_error;
pub(crate) use log_trace;
