//! Parameter handling for graph construction.

use crate::{graph::error::GraphError, similarity::SimilarityFunction};

/// Default number of insertions between entry-point refreshes.
pub const DEFAULT_ENTRY_REFRESH_INTERVAL: usize = 10_000;
/// Default fraction by which backlinking may overfill a neighbour list.
pub const DEFAULT_NEIGHBOUR_OVERFLOW: f32 = 0.2;
/// Default diversity parameter.
pub const DEFAULT_ALPHA: f32 = 1.2;
/// Number of labels tracked when none is configured explicitly.
pub const DEFAULT_LABEL_CAPACITY: usize = 64;

/// Periodic re-optimisation of random nodes for low-dimensional data.
///
/// Greedy search over low-dimensional vectors is prone to local maxima; once
/// the graph is large enough, every insertion also refreshes the neighbours
/// of one randomly chosen older node.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct LowDimensionRepair {
    max_dimension: usize,
    min_graph_size: usize,
    attempts: usize,
}

impl LowDimensionRepair {
    /// Creates a repair policy.
    ///
    /// # Errors
    /// Returns [`GraphError::InvalidParameters`] when `attempts` is zero.
    pub fn new(
        max_dimension: usize,
        min_graph_size: usize,
        attempts: usize,
    ) -> Result<Self, GraphError> {
        if attempts == 0 {
            return Err(GraphError::InvalidParameters {
                reason: "low-dimension repair needs at least one attempt".into(),
            });
        }
        Ok(Self {
            max_dimension,
            min_graph_size,
            attempts,
        })
    }

    /// Returns `true` when the policy applies to a graph of `size` nodes over
    /// vectors of `dimension` components.
    #[must_use]
    pub fn applies(&self, dimension: usize, size: usize) -> bool {
        dimension <= self.max_dimension && size > self.min_graph_size
    }

    /// Number of random picks tried before giving up.
    #[rustfmt::skip]
    #[must_use]
    pub fn attempts(&self) -> usize { self.attempts }
}

impl Default for LowDimensionRepair {
    fn default() -> Self {
        Self {
            max_dimension: 3,
            min_graph_size: 20_000,
            attempts: 3,
        }
    }
}

/// Configuration parameters for the proximity graph.
#[derive(Clone, Debug)]
pub struct GraphParams {
    max_connections: usize,
    beam_width: usize,
    alpha: f32,
    neighbour_overflow: f32,
    similarity: SimilarityFunction,
    entry_refresh_interval: usize,
    low_dimension_repair: Option<LowDimensionRepair>,
    label_capacity: usize,
    rng_seed: u64,
}

impl GraphParams {
    /// Creates a parameter set with explicit fan-out and search breadth.
    ///
    /// Each node keeps up to `2 × max_connections` neighbours.
    ///
    /// # Errors
    /// Returns [`GraphError::InvalidParameters`] when either argument is zero
    /// or when `max_connections` cannot be doubled.
    ///
    /// # Examples
    /// ```
    /// use proxima_core::GraphParams;
    ///
    /// let params = GraphParams::new(16, 100).expect("parameters must be valid");
    /// assert_eq!(params.max_degree(), 32);
    /// ```
    pub fn new(max_connections: usize, beam_width: usize) -> Result<Self, GraphError> {
        if max_connections == 0 {
            return Err(GraphError::InvalidParameters {
                reason: "max_connections must be greater than zero".into(),
            });
        }
        if max_connections.checked_mul(2).is_none() {
            return Err(GraphError::InvalidParameters {
                reason: format!("max_connections ({max_connections}) overflows the degree bound"),
            });
        }
        if beam_width == 0 {
            return Err(GraphError::InvalidParameters {
                reason: "beam_width must be greater than zero".into(),
            });
        }
        Ok(Self {
            max_connections,
            beam_width,
            alpha: DEFAULT_ALPHA,
            neighbour_overflow: DEFAULT_NEIGHBOUR_OVERFLOW,
            similarity: SimilarityFunction::default(),
            entry_refresh_interval: DEFAULT_ENTRY_REFRESH_INTERVAL,
            low_dimension_repair: Some(LowDimensionRepair::default()),
            label_capacity: DEFAULT_LABEL_CAPACITY,
            rng_seed: 42,
        })
    }

    /// Sets the diversity parameter used when pruning neighbour lists.
    ///
    /// # Errors
    /// Returns [`GraphError::InvalidParameters`] unless `alpha` is finite and
    /// at least `1.0`.
    pub fn with_alpha(mut self, alpha: f32) -> Result<Self, GraphError> {
        if !alpha.is_finite() || alpha < 1.0 {
            return Err(GraphError::InvalidParameters {
                reason: format!("alpha must be finite and >= 1.0 (got {alpha})"),
            });
        }
        self.alpha = alpha;
        Ok(self)
    }

    /// Sets the fraction by which backlinks may temporarily overfill a
    /// neighbour list.
    ///
    /// # Errors
    /// Returns [`GraphError::InvalidParameters`] unless `overflow` is finite
    /// and non-negative.
    pub fn with_neighbour_overflow(mut self, overflow: f32) -> Result<Self, GraphError> {
        if !overflow.is_finite() || overflow < 0.0 {
            return Err(GraphError::InvalidParameters {
                reason: format!("neighbour_overflow must be finite and >= 0.0 (got {overflow})"),
            });
        }
        self.neighbour_overflow = overflow;
        Ok(self)
    }

    /// Selects the similarity function used to score vectors.
    #[must_use]
    pub fn with_similarity(mut self, similarity: SimilarityFunction) -> Self {
        self.similarity = similarity;
        self
    }

    /// Sets how many insertions pass between entry-point refreshes.
    ///
    /// # Errors
    /// Returns [`GraphError::InvalidParameters`] when `interval` is zero.
    pub fn with_entry_refresh_interval(mut self, interval: usize) -> Result<Self, GraphError> {
        if interval == 0 {
            return Err(GraphError::InvalidParameters {
                reason: "entry_refresh_interval must be greater than zero".into(),
            });
        }
        self.entry_refresh_interval = interval;
        Ok(self)
    }

    /// Replaces the low-dimension repair policy.
    #[must_use]
    pub fn with_low_dimension_repair(mut self, repair: LowDimensionRepair) -> Self {
        self.low_dimension_repair = Some(repair);
        self
    }

    /// Disables low-dimension repair.
    #[must_use]
    pub fn without_low_dimension_repair(mut self) -> Self {
        self.low_dimension_repair = None;
        self
    }

    /// Sets the number of label identifiers tracked by labelled graphs.
    ///
    /// # Errors
    /// Returns [`GraphError::InvalidParameters`] when `capacity` is zero.
    pub fn with_label_capacity(mut self, capacity: usize) -> Result<Self, GraphError> {
        if capacity == 0 {
            return Err(GraphError::InvalidParameters {
                reason: "label_capacity must be greater than zero".into(),
            });
        }
        self.label_capacity = capacity;
        Ok(self)
    }

    /// Seeds the internal RNGs to make random choices reproducible.
    #[must_use]
    pub fn with_rng_seed(mut self, seed: u64) -> Self {
        self.rng_seed = seed;
        self
    }

    /// Returns the configured fan-out `M`.
    #[rustfmt::skip]
    #[must_use]
    pub fn max_connections(&self) -> usize { self.max_connections }

    /// Returns the neighbour-list bound enforced after cleanup (`2 × M`).
    #[must_use]
    pub fn max_degree(&self) -> usize {
        self.max_connections * 2
    }

    /// Returns the neighbour-list bound tolerated while backlinking.
    #[must_use]
    pub fn overflow_capacity(&self) -> usize {
        let scaled = (self.max_degree() as f32 * (1.0 + self.neighbour_overflow)).floor() as usize;
        scaled.max(self.max_degree())
    }

    /// Returns the search breadth used while inserting.
    #[rustfmt::skip]
    #[must_use]
    pub fn beam_width(&self) -> usize { self.beam_width }

    /// Returns the diversity parameter.
    #[rustfmt::skip]
    #[must_use]
    pub fn alpha(&self) -> f32 { self.alpha }

    /// Returns the backlink overflow fraction.
    #[rustfmt::skip]
    #[must_use]
    pub fn neighbour_overflow(&self) -> f32 { self.neighbour_overflow }

    /// Returns the similarity function.
    #[rustfmt::skip]
    #[must_use]
    pub fn similarity(&self) -> SimilarityFunction { self.similarity }

    /// Returns the number of insertions between entry-point refreshes.
    #[rustfmt::skip]
    #[must_use]
    pub fn entry_refresh_interval(&self) -> usize { self.entry_refresh_interval }

    /// Returns the low-dimension repair policy, if enabled.
    #[rustfmt::skip]
    #[must_use]
    pub fn low_dimension_repair(&self) -> Option<LowDimensionRepair> { self.low_dimension_repair }

    /// Returns the number of label identifiers tracked by labelled graphs.
    #[rustfmt::skip]
    #[must_use]
    pub fn label_capacity(&self) -> usize { self.label_capacity }

    /// Returns the RNG seed.
    #[rustfmt::skip]
    #[must_use]
    pub fn rng_seed(&self) -> u64 { self.rng_seed }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(0, 10, "max_connections")]
    #[case(4, 0, "beam_width")]
    #[case(usize::MAX, 10, "overflows")]
    fn new_rejects_degenerate_widths(
        #[case] max_connections: usize,
        #[case] beam_width: usize,
        #[case] needle: &str,
    ) {
        let err = GraphParams::new(max_connections, beam_width).expect_err("must reject");
        match err {
            GraphError::InvalidParameters { reason } => {
                assert!(reason.contains(needle), "{reason}");
            }
            other => panic!("expected InvalidParameters, got {other:?}"),
        }
    }

    #[rstest]
    #[case(0.99)]
    #[case(f32::NAN)]
    #[case(f32::INFINITY)]
    fn alpha_must_be_at_least_one(#[case] alpha: f32) {
        let params = GraphParams::new(4, 10).expect("params");
        assert!(params.with_alpha(alpha).is_err());
    }

    #[rstest]
    #[case(0.0, 8)]
    #[case(0.2, 9)]
    #[case(0.5, 12)]
    #[case(1.0, 16)]
    fn overflow_capacity_scales_the_degree_bound(#[case] overflow: f32, #[case] expected: usize) {
        let params = GraphParams::new(4, 10)
            .expect("params")
            .with_neighbour_overflow(overflow)
            .expect("overflow");
        assert_eq!(params.max_degree(), 8);
        assert_eq!(params.overflow_capacity(), expected);
    }

    #[test]
    fn negative_overflow_is_rejected() {
        let params = GraphParams::new(4, 10).expect("params");
        assert!(params.with_neighbour_overflow(-0.1).is_err());
    }

    #[rstest]
    #[case(3, 20_001, true)]
    #[case(3, 20_000, false)]
    #[case(4, 50_000, false)]
    #[case(2, 100_000, true)]
    fn low_dimension_repair_gates_on_size_and_dimension(
        #[case] dimension: usize,
        #[case] size: usize,
        #[case] expected: bool,
    ) {
        assert_eq!(LowDimensionRepair::default().applies(dimension, size), expected);
    }

    #[test]
    fn defaults_match_documented_values() {
        let params = GraphParams::new(8, 32).expect("params");
        assert_eq!(params.entry_refresh_interval(), DEFAULT_ENTRY_REFRESH_INTERVAL);
        assert!((params.alpha() - DEFAULT_ALPHA).abs() < f32::EPSILON);
        assert_eq!(params.low_dimension_repair(), Some(LowDimensionRepair::default()));
        assert_eq!(params.label_capacity(), DEFAULT_LABEL_CAPACITY);
        assert!(params.without_low_dimension_repair().low_dimension_repair().is_none());
    }
}
