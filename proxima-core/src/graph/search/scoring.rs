//! Score functions used by searches and insertion.

use crate::{similarity::SimilarityFunction, vectors::VectorSource};

use super::super::{error::GraphError, neighbours::PairSimilarity};

/// Similarity between a fixed query and indexed nodes.
pub trait ScoreFunction {
    /// Scores `node` against the query; larger is more similar.
    ///
    /// # Errors
    /// Returns [`GraphError`] when the node's vector cannot be read.
    fn similarity_to(&mut self, node: usize) -> Result<f32, GraphError>;

    /// Returns `false` when scores only approximate the true similarity.
    /// Approximate functions must be paired with a [`ReRanker`].
    fn is_exact(&self) -> bool {
        true
    }
}

impl<F> ScoreFunction for F
where
    F: FnMut(usize) -> f32,
{
    fn similarity_to(&mut self, node: usize) -> Result<f32, GraphError> {
        Ok(self(node))
    }
}

/// Exact rescoring applied to the results of an approximate search.
pub trait ReRanker {
    /// Returns the exact similarity of `node` to the query.
    ///
    /// # Errors
    /// Returns [`GraphError`] when the node's vector cannot be read.
    fn rescore(&mut self, node: usize) -> Result<f32, GraphError>;
}

impl<T: ScoreFunction> ReRanker for T {
    fn rescore(&mut self, node: usize) -> Result<f32, GraphError> {
        self.similarity_to(node)
    }
}

/// Exact scorer comparing a query vector with the vectors of a source view.
///
/// # Examples
/// ```
/// use proxima_core::{FlatVectors, QueryScorer, ScoreFunction, SimilarityFunction, VectorSource};
///
/// let vectors = FlatVectors::new(2, vec![0.0_f32, 0.0, 3.0, 4.0]).expect("flat");
/// let mut view = vectors.copy();
/// let query = [0.0_f32, 0.0];
/// let mut scorer = QueryScorer::new(&query, &mut view, SimilarityFunction::Euclidean);
/// assert_eq!(scorer.similarity_to(0).expect("node 0"), 1.0);
/// assert_eq!(scorer.similarity_to(1).expect("node 1"), 1.0 / 26.0);
/// ```
pub struct QueryScorer<'a, S: VectorSource> {
    query: &'a [S::Element],
    view: &'a mut S,
    function: SimilarityFunction,
}

impl<'a, S: VectorSource> QueryScorer<'a, S> {
    /// Scores nodes of `view` against `query`.
    pub fn new(query: &'a [S::Element], view: &'a mut S, function: SimilarityFunction) -> Self {
        Self {
            query,
            view,
            function,
        }
    }

    /// Scores nodes against the vector of `node`. The anchor is read through
    /// `value` and stays borrowed for the scorer's lifetime; candidates are
    /// read through `comparison`.
    ///
    /// # Errors
    /// Returns [`GraphError::Source`] when `node` cannot be read.
    pub fn for_node(
        node: usize,
        value: &'a mut S,
        comparison: &'a mut S,
        function: SimilarityFunction,
    ) -> Result<Self, GraphError> {
        let query = value.vector_value(node)?;
        Ok(Self::new(query, comparison, function))
    }

    /// The anchored query vector.
    #[rustfmt::skip]
    #[must_use]
    pub fn query(&self) -> &[S::Element] { self.query }
}

impl<S: VectorSource> ScoreFunction for QueryScorer<'_, S> {
    fn similarity_to(&mut self, node: usize) -> Result<f32, GraphError> {
        let vector = self.view.vector_value(node)?;
        Ok(self.function.compare(self.query, vector))
    }
}

/// Scores arbitrary node pairs through two independent views.
pub struct PairScorer<'a, S> {
    left: &'a mut S,
    right: &'a mut S,
    function: SimilarityFunction,
}

impl<'a, S: VectorSource> PairScorer<'a, S> {
    /// Reads the two sides of each pair through `left` and `right`.
    pub fn new(left: &'a mut S, right: &'a mut S, function: SimilarityFunction) -> Self {
        Self {
            left,
            right,
            function,
        }
    }
}

impl<S: VectorSource> PairSimilarity for PairScorer<'_, S> {
    fn similarity(&mut self, left: usize, right: usize) -> Result<f32, GraphError> {
        let a = self.left.vector_value(left)?;
        let b = self.right.vector_value(right)?;
        Ok(self.function.compare(a, b))
    }
}

/// Wraps an exact scorer and coarsens its output to multiples of `step`.
///
/// Searches driven by an approximate scorer collect candidates with the
/// coarse score and rely on a [`ReRanker`] for the final order.
#[derive(Debug)]
pub struct ApproximateScorer<F> {
    inner: F,
    step: f32,
}

impl<F: ScoreFunction> ApproximateScorer<F> {
    /// Quantises the scores of `inner` to multiples of `step`.
    ///
    /// # Errors
    /// Returns [`GraphError::InvalidParameters`] unless `step` is finite and
    /// positive.
    pub fn new(inner: F, step: f32) -> Result<Self, GraphError> {
        if !step.is_finite() || step <= 0.0 {
            return Err(GraphError::InvalidParameters {
                reason: format!("quantisation step must be finite and > 0 (got {step})"),
            });
        }
        Ok(Self { inner, step })
    }
}

impl<F: ScoreFunction> ScoreFunction for ApproximateScorer<F> {
    fn similarity_to(&mut self, node: usize) -> Result<f32, GraphError> {
        let exact = self.inner.similarity_to(node)?;
        Ok((exact / self.step).floor() * self.step)
    }

    fn is_exact(&self) -> bool {
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vectors::FlatVectors;

    fn vectors() -> FlatVectors<f32> {
        FlatVectors::from_rows(vec![vec![1.0, 0.0], vec![0.0, 1.0], vec![1.0, 1.0]]).expect("rows")
    }

    #[test]
    fn node_scorer_keeps_the_anchor_fixed() {
        let vectors = vectors();
        let mut value = vectors.copy();
        let mut comparison = vectors.copy();
        let mut scorer = QueryScorer::for_node(
            2,
            &mut value,
            &mut comparison,
            SimilarityFunction::Euclidean,
        )
        .expect("anchor");
        assert_eq!(scorer.similarity_to(2).expect("self"), 1.0);
        assert_eq!(scorer.similarity_to(0).expect("node 0"), 0.5);
        assert_eq!(scorer.query(), &[1.0, 1.0]);
    }

    #[test]
    fn pair_scorer_is_symmetric() {
        let vectors = vectors();
        let mut left = vectors.copy();
        let mut right = vectors.copy();
        let mut scorer = PairScorer::new(&mut left, &mut right, SimilarityFunction::DotProduct);
        let forward = scorer.similarity(0, 2).expect("pair");
        let backward = scorer.similarity(2, 0).expect("pair");
        assert_eq!(forward, backward);
        assert_eq!(forward, 1.0);
    }

    #[test]
    fn approximate_scorer_reports_inexact_quantised_scores() {
        let exact = |node: usize| -> f32 { [0.93, 0.41][node] };
        let mut approximate = ApproximateScorer::new(exact, 0.25).expect("step");
        assert!(!approximate.is_exact());
        assert_eq!(approximate.similarity_to(0).expect("node 0"), 0.75);
        assert_eq!(approximate.similarity_to(1).expect("node 1"), 0.25);
    }

    #[test]
    fn approximate_scorer_rejects_non_positive_steps() {
        assert!(ApproximateScorer::new(|_: usize| -> f32 { 1.0 }, 0.0).is_err());
    }
}
