//! Benchmark setup error type.

use proxima_core::{GraphError, SourceError};

/// Errors that may occur while preparing a benchmark.
#[derive(Debug, thiserror::Error)]
pub enum BenchSetupError {
    /// Graph parameter validation, construction or search failed.
    #[error("graph operation failed: {0}")]
    Graph(#[from] GraphError),
    /// The benchmark dataset could not be stored.
    #[error("vector source error: {0}")]
    Source(#[from] SourceError),
}
