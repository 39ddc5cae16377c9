//! Best-first beam search over the proximity graph.
//!
//! A search seeds its candidate heap with the entry points, then repeatedly
//! expands the best unexplored candidate. Accepted live nodes enter a bounded
//! result heap; once that heap is full, candidates scoring below its worst
//! member are no longer worth expanding and the search ends.

mod filters;
mod scoring;
mod tracker;
mod visited;

use std::{cmp::Reverse, collections::BinaryHeap, fmt};

use tracing::trace;

use super::{
    error::GraphError,
    store::GraphStore,
    types::{ScoredNode, SearchResult},
};

pub use self::{
    filters::{AcceptAll, Bits, Excluding, LabelPredicate, NodePredicate},
    scoring::{ApproximateScorer, PairScorer, QueryScorer, ReRanker, ScoreFunction},
};
use self::{tracker::ScoreTracker, visited::VisitedSet};

/// Parameters of a single search.
///
/// # Examples
/// ```
/// use proxima_core::{AcceptAll, SearchRequest};
///
/// let request = SearchRequest::new(10).with_accept(&AcceptAll).with_threshold(0.5);
/// assert_eq!(request.top_k(), 10);
/// ```
pub struct SearchRequest<'r> {
    top_k: usize,
    threshold: f32,
    accept: Option<&'r dyn Bits>,
    predicate: Option<&'r dyn NodePredicate>,
    entries: Option<&'r [usize]>,
    re_ranker: Option<&'r mut dyn ReRanker>,
}

impl<'r> SearchRequest<'r> {
    /// Requests the `top_k` best nodes. An accept filter must still be set
    /// with [`SearchRequest::with_accept`].
    #[must_use]
    pub fn new(top_k: usize) -> Self {
        Self {
            top_k,
            threshold: 0.0,
            accept: None,
            predicate: None,
            entries: None,
            re_ranker: None,
        }
    }

    /// Sets the filter deciding which nodes may be returned.
    #[must_use]
    pub fn with_accept(mut self, accept: &'r dyn Bits) -> Self {
        self.accept = Some(accept);
        self
    }

    /// Drops results scoring below `threshold`. A positive threshold also
    /// enables the statistical early stop.
    #[must_use]
    pub fn with_threshold(mut self, threshold: f32) -> Self {
        self.threshold = threshold;
        self
    }

    /// Restricts traversal to nodes passing `predicate`.
    #[must_use]
    pub fn with_predicate(mut self, predicate: &'r dyn NodePredicate) -> Self {
        self.predicate = Some(predicate);
        self
    }

    /// Seeds the search from `entries` instead of the graph's entry points.
    #[must_use]
    pub fn with_entries(mut self, entries: &'r [usize]) -> Self {
        self.entries = Some(entries);
        self
    }

    /// Rescores the final results with `re_ranker`.
    #[must_use]
    pub fn with_re_ranker(mut self, re_ranker: &'r mut dyn ReRanker) -> Self {
        self.re_ranker = Some(re_ranker);
        self
    }

    /// Number of results requested.
    #[rustfmt::skip]
    #[must_use]
    pub fn top_k(&self) -> usize { self.top_k }

    /// Minimum score a result must reach.
    #[rustfmt::skip]
    #[must_use]
    pub fn threshold(&self) -> f32 { self.threshold }

    fn passes(&self, node: usize) -> Result<bool, GraphError> {
        self.predicate.map_or(Ok(true), |predicate| predicate.test(node))
    }
}

impl fmt::Debug for SearchRequest<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SearchRequest")
            .field("top_k", &self.top_k)
            .field("threshold", &self.threshold)
            .field("has_accept", &self.accept.is_some())
            .field("has_predicate", &self.predicate.is_some())
            .field("entries", &self.entries)
            .field("has_re_ranker", &self.re_ranker.is_some())
            .finish()
    }
}

/// Reusable beam searcher bound to one [`GraphStore`].
///
/// The visited set is kept between searches to avoid reallocating it.
#[derive(Debug)]
pub struct GraphSearcher<'g> {
    store: &'g GraphStore,
    visited: VisitedSet,
}

impl<'g> GraphSearcher<'g> {
    /// Creates a searcher whose visited set is sized for the ids present now.
    ///
    /// Use [`GraphSearcher::concurrent`] when nodes may be added while the
    /// searcher is alive.
    #[must_use]
    pub fn new(store: &'g GraphStore) -> Self {
        Self {
            store,
            visited: VisitedSet::fixed(store.id_upper_bound()),
        }
    }

    /// Creates a searcher tolerating ids added after construction.
    #[must_use]
    pub fn concurrent(store: &'g GraphStore) -> Self {
        Self {
            store,
            visited: VisitedSet::growable(store.id_upper_bound()),
        }
    }

    /// Runs a beam search scored by `scorer`.
    ///
    /// Soft-deleted nodes are traversed but never returned. Results are
    /// ordered best-first.
    ///
    /// # Errors
    /// Returns [`GraphError::MissingAcceptFilter`] when the request carries
    /// no accept filter, [`GraphError::InexactScoreWithoutReRanker`] when an
    /// approximate scorer lacks a re-ranker, [`GraphError::InvalidParameters`]
    /// for a zero `top_k`, [`GraphError::VisitedCapacityExceeded`] when a
    /// fixed searcher meets a newer id, and scorer or predicate failures.
    pub fn search(
        &mut self,
        scorer: &mut dyn ScoreFunction,
        request: SearchRequest<'_>,
    ) -> Result<SearchResult, GraphError> {
        let accept = request.accept.ok_or(GraphError::MissingAcceptFilter)?;
        if !scorer.is_exact() && request.re_ranker.is_none() {
            return Err(GraphError::InexactScoreWithoutReRanker);
        }
        if request.top_k == 0 {
            return Err(GraphError::InvalidParameters {
                reason: "top_k must be greater than zero".into(),
            });
        }
        self.visited.clear();
        let default_entries;
        let entries = if let Some(entries) = request.entries {
            entries
        } else {
            default_entries = self.store.entries();
            &default_entries
        };

        let mut candidates: BinaryHeap<ScoredNode> = BinaryHeap::new();
        let mut results: BinaryHeap<Reverse<ScoredNode>> =
            BinaryHeap::with_capacity(request.top_k + 1);
        let mut tracker = ScoreTracker::new(request.threshold);
        let mut scored = 0_usize;

        for &entry in entries {
            if !self.store.contains_node(entry) || !request.passes(entry)? {
                continue;
            }
            if !self.visited.insert(entry)? {
                continue;
            }
            let score = scorer.similarity_to(entry)?;
            scored += 1;
            candidates.push(ScoredNode::new(entry, score));
        }

        let mut min_accepted = f32::NEG_INFINITY;
        while let Some(top) = candidates.peek().copied() {
            if top.score < min_accepted || tracker.should_stop() {
                break;
            }
            candidates.pop();
            if accept.get(top.id) && !self.store.is_deleted(top.id) && top.score >= request.threshold
            {
                results.push(Reverse(top));
                if results.len() > request.top_k {
                    results.pop();
                }
                if results.len() == request.top_k
                    && let Some(Reverse(worst)) = results.peek()
                {
                    min_accepted = worst.score;
                }
            }
            let Some(neighbours) = self.store.neighbours(top.id) else {
                continue;
            };
            for neighbour in neighbours.snapshot().iter() {
                if !self.store.contains_node(neighbour.id) || !request.passes(neighbour.id)? {
                    continue;
                }
                if !self.visited.insert(neighbour.id)? {
                    continue;
                }
                let score = scorer.similarity_to(neighbour.id)?;
                scored += 1;
                tracker.track(score);
                if score >= min_accepted {
                    candidates.push(ScoredNode::new(neighbour.id, score));
                }
            }
        }

        let mut nodes: Vec<ScoredNode> = results.into_iter().map(|Reverse(node)| node).collect();
        if let Some(re_ranker) = request.re_ranker {
            for node in &mut nodes {
                node.score = re_ranker.rescore(node.id)?;
            }
        }
        nodes.sort_unstable_by(|a, b| b.cmp(a));
        trace!(results = nodes.len(), scored, "search finished");
        Ok(SearchResult::new(nodes, scored))
    }
}
