//! Benchmark support crate for proxima.
//!
//! Provides the datasets, parameter labels and setup error type shared by the
//! Criterion benchmarks for graph construction, search and cleanup.

pub mod error;
pub mod params;
pub mod setup;
