//! Shared test utilities used across proxima crates.

pub mod datasets;
pub mod profile;
pub mod tracing;
