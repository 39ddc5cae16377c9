//! Scored node and search result types. Scores are similarities: larger is
//! better.

use std::cmp::Ordering;

/// Node paired with its similarity to some reference vector.
///
/// Ordering follows the score: `a > b` when `a` is the better neighbour.
/// Equal scores rank the smaller id higher so heaps stay deterministic.
///
/// # Examples
/// ```
/// use proxima_core::ScoredNode;
///
/// let near = ScoredNode::new(3, 0.9);
/// let far = ScoredNode::new(1, 0.2);
/// assert!(near > far);
/// ```
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ScoredNode {
    /// Node identifier.
    pub id: usize,
    /// Similarity between [`ScoredNode::id`] and the reference vector.
    pub score: f32,
}

impl ScoredNode {
    /// Pairs `id` with `score`.
    #[must_use]
    pub const fn new(id: usize, score: f32) -> Self {
        Self { id, score }
    }
}

impl Eq for ScoredNode {}

impl Ord for ScoredNode {
    fn cmp(&self, other: &Self) -> Ordering {
        self.score
            .total_cmp(&other.score)
            .then_with(|| other.id.cmp(&self.id))
    }
}

impl PartialOrd for ScoredNode {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Sorts best-first, keeping the relative order of equal scores.
pub(crate) fn sort_best_first(nodes: &mut [ScoredNode]) {
    nodes.sort_by(|a, b| b.score.total_cmp(&a.score));
}

/// Ranked output of a graph search.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct SearchResult {
    nodes: Vec<ScoredNode>,
    visited: usize,
}

impl SearchResult {
    pub(crate) fn new(nodes: Vec<ScoredNode>, visited: usize) -> Self {
        Self { nodes, visited }
    }

    /// Results ordered by descending similarity.
    #[rustfmt::skip]
    #[must_use]
    pub fn nodes(&self) -> &[ScoredNode] { &self.nodes }

    /// Number of nodes scored during the traversal.
    #[rustfmt::skip]
    #[must_use]
    pub fn visited(&self) -> usize { self.visited }

    /// Identifiers of the results in rank order.
    pub fn ids(&self) -> impl Iterator<Item = usize> + '_ {
        self.nodes.iter().map(|node| node.id)
    }

    /// Consumes the result, returning the ranked nodes.
    #[must_use]
    pub fn into_nodes(self) -> Vec<ScoredNode> {
        self.nodes
    }

    /// Returns `true` when the search produced no results.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }
}
