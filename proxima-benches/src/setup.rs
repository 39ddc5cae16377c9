//! Dataset and graph construction shared by the benchmarks.

use proxima_core::{FlatVectors, GraphBuilder, GraphParams, GraphStore};
use proxima_test_support::datasets::uniform_vectors;

use crate::{error::BenchSetupError, params::GraphBenchParams};

/// Seed used for all synthetic data generation.
pub const SEED: u64 = 42;

/// Vector dimensionality for all benchmark datasets.
pub const DIMENSIONS: usize = 16;

/// Seeded uniform dataset of `point_count` vectors.
///
/// # Errors
/// Returns [`BenchSetupError::Source`] if the rows cannot be stored.
pub fn uniform_source(point_count: usize) -> Result<FlatVectors<f32>, BenchSetupError> {
    Ok(FlatVectors::from_rows(uniform_vectors(
        SEED,
        point_count,
        DIMENSIONS,
    ))?)
}

/// Graph parameters for a benchmark run.
///
/// # Errors
/// Returns [`BenchSetupError::Graph`] when the parameters are invalid.
pub fn graph_params(bench: GraphBenchParams) -> Result<GraphParams, BenchSetupError> {
    Ok(GraphParams::new(bench.max_connections, bench.beam_width)?.with_rng_seed(SEED))
}

/// Builds a complete graph over `vectors`.
///
/// # Errors
/// Propagates parameter and construction failures.
pub fn build_graph(
    vectors: &FlatVectors<f32>,
    bench: GraphBenchParams,
) -> Result<GraphStore, BenchSetupError> {
    Ok(GraphBuilder::new(vectors.clone(), graph_params(bench)?)?.build()?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn built_graphs_cover_the_dataset() -> Result<(), BenchSetupError> {
        let bench = GraphBenchParams {
            point_count: 64,
            max_connections: 4,
            beam_width: 16,
        };
        let vectors = uniform_source(bench.point_count)?;
        let graph = build_graph(&vectors, bench)?;
        assert_eq!(graph.size(), 64);
        Ok(())
    }
}
