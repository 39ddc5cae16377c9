//! Benchmark parameter types.

use std::fmt;

/// Parameters for a graph benchmark run.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct GraphBenchParams {
    /// Number of vectors in the dataset.
    pub point_count: usize,
    /// Neighbours kept per node before doubling into the degree bound.
    pub max_connections: usize,
    /// Beam width used while inserting.
    pub beam_width: usize,
}

impl fmt::Display for GraphBenchParams {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "n={},M={},beam={}",
            self.point_count, self.max_connections, self.beam_width
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(100, 8, 16, "n=100,M=8,beam=16")]
    #[case(5_000, 16, 100, "n=5000,M=16,beam=100")]
    fn labels_name_every_parameter(
        #[case] point_count: usize,
        #[case] max_connections: usize,
        #[case] beam_width: usize,
        #[case] expected: &str,
    ) {
        let params = GraphBenchParams {
            point_count,
            max_connections,
            beam_width,
        };
        assert_eq!(params.to_string(), expected);
    }
}
