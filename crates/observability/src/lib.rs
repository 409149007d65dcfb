//! Process-wide logging setup for hosts embedding the field guards.
//!
//! The library crates only emit `tracing` events (permission loads at
//! `debug`, denials at `warn`, loader failures at `error`); installing a
//! subscriber is left to the host, which can call [`init`].

/// Initialize process-wide tracing/logging.
///
/// This is safe to call multiple times; subsequent calls become no-ops.
pub fn init() {
    tracing::init();
}

/// Tracing configuration (filters, layers).
pub mod tracing;
