//! Copy-on-write neighbour lists with diversity-aware insertion.
//!
//! Every mutation reads the current immutable snapshot, derives a new list
//! and installs it with a compare-and-swap. A failed swap means another
//! writer got there first, so the update is recomputed against the newer
//! snapshot. Readers never block and never observe a partially applied
//! update.

use std::{convert::Infallible, fmt, sync::Arc};

use arc_swap::ArcSwap;
use dashmap::DashSet;

use super::{
    error::GraphError,
    store::GraphStore,
    types::{ScoredNode, sort_best_first},
};

/// Alpha increment applied between diversity passes.
const ALPHA_STEP: f32 = 0.2;
const ALPHA_TOLERANCE: f32 = 1e-6;

/// Similarity between two indexed nodes.
pub trait PairSimilarity {
    /// Scores `left` against `right`.
    ///
    /// # Errors
    /// Returns [`GraphError`] when either vector cannot be read.
    fn similarity(&mut self, left: usize, right: usize) -> Result<f32, GraphError>;
}

impl<F> PairSimilarity for F
where
    F: FnMut(usize, usize) -> f32,
{
    fn similarity(&mut self, left: usize, right: usize) -> Result<f32, GraphError> {
        Ok(self(left, right))
    }
}

/// Bounded, concurrently mutable neighbour list of one node.
///
/// Entries are kept best-first with unique ids. Diverse insertion keeps at
/// most `max_degree` entries; backlinks may temporarily push the list up to
/// the caller-supplied overflow capacity until [`NeighbourSet::cleanup`]
/// trims it again.
pub struct NeighbourSet {
    node: usize,
    max_degree: usize,
    alpha: f32,
    neighbours: ArcSwap<Vec<ScoredNode>>,
}

impl NeighbourSet {
    /// Creates an empty neighbour list for `node`.
    #[must_use]
    pub fn new(node: usize, max_degree: usize, alpha: f32) -> Self {
        Self::with_neighbours(node, max_degree, alpha, Vec::new())
    }

    pub(crate) fn with_neighbours(
        node: usize,
        max_degree: usize,
        alpha: f32,
        neighbours: Vec<ScoredNode>,
    ) -> Self {
        Self {
            node,
            max_degree,
            alpha,
            neighbours: ArcSwap::from_pointee(neighbours),
        }
    }

    /// Node owning this list.
    #[rustfmt::skip]
    #[must_use]
    pub fn node(&self) -> usize { self.node }

    /// Returns the current snapshot, best neighbour first.
    #[must_use]
    pub fn snapshot(&self) -> Arc<Vec<ScoredNode>> {
        self.neighbours.load_full()
    }

    /// Number of neighbours in the current snapshot.
    #[must_use]
    pub fn len(&self) -> usize {
        self.neighbours.load().len()
    }

    /// Returns `true` when the node has no neighbours yet.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.neighbours.load().is_empty()
    }

    /// Returns `true` when `id` is a neighbour in the current snapshot.
    #[must_use]
    pub fn contains(&self, id: usize) -> bool {
        self.neighbours.load().iter().any(|n| n.id == id)
    }

    /// Identifiers of the current neighbours, best first.
    #[must_use]
    pub fn ids(&self) -> Vec<usize> {
        self.neighbours.load().iter().map(|n| n.id).collect()
    }

    fn try_update<E>(
        &self,
        mut derive: impl FnMut(&[ScoredNode]) -> Result<Option<Vec<ScoredNode>>, E>,
    ) -> Result<bool, E> {
        loop {
            let current = self.neighbours.load_full();
            let Some(next) = derive(&current)? else {
                return Ok(false);
            };
            let previous = self.neighbours.compare_and_swap(&current, Arc::new(next));
            if Arc::ptr_eq(&previous, &current) {
                return Ok(true);
            }
        }
    }

    fn update(&self, mut derive: impl FnMut(&[ScoredNode]) -> Option<Vec<ScoredNode>>) -> bool {
        match self.try_update(|current| Ok::<_, Infallible>(derive(current))) {
            Ok(changed) => changed,
            Err(never) => match never {},
        }
    }

    /// Merges search results and concurrently inserted candidates into the
    /// list, keeping a diverse subset of at most `max_degree` neighbours.
    ///
    /// The existing neighbours, `natural` and `concurrent` are pooled, sorted
    /// best-first (earlier sources win ties) and filtered with
    /// [`NeighbourSet::select_diverse`].
    ///
    /// # Errors
    /// Propagates failures from `scorer`.
    pub fn insert_diverse(
        &self,
        natural: &[ScoredNode],
        concurrent: &[ScoredNode],
        scorer: &mut impl PairSimilarity,
    ) -> Result<(), GraphError> {
        if natural.is_empty() && concurrent.is_empty() {
            return Ok(());
        }
        self.try_update(|current| {
            let candidates = self.merge_candidates(current, natural, concurrent);
            let selected = self.select_diverse(&candidates, scorer)?;
            Ok::<_, GraphError>(Some(selected))
        })?;
        Ok(())
    }

    fn merge_candidates(
        &self,
        current: &[ScoredNode],
        natural: &[ScoredNode],
        concurrent: &[ScoredNode],
    ) -> Vec<ScoredNode> {
        let mut merged: Vec<ScoredNode> =
            Vec::with_capacity(current.len() + natural.len() + concurrent.len());
        for candidate in current.iter().chain(natural).chain(concurrent) {
            if candidate.id != self.node && !merged.iter().any(|m| m.id == candidate.id) {
                merged.push(*candidate);
            }
        }
        sort_best_first(&mut merged);
        merged
    }

    /// Selects a diverse subset of `candidates` (sorted best-first).
    ///
    /// A candidate `c` is kept when `similarity(c, o) <= alpha × score(c)` for
    /// every already kept `o`. The first pass runs at alpha `1.0`; while fewer
    /// than `max_degree` neighbours are kept, further passes relax alpha in
    /// steps of `0.2` up to the configured value. The result is best-first.
    ///
    /// # Errors
    /// Propagates failures from `scorer`.
    pub fn select_diverse(
        &self,
        candidates: &[ScoredNode],
        scorer: &mut impl PairSimilarity,
    ) -> Result<Vec<ScoredNode>, GraphError> {
        let mut selected = vec![false; candidates.len()];
        let mut count = 0;
        let mut alpha = 1.0_f32;
        loop {
            for (index, candidate) in candidates.iter().enumerate() {
                if count >= self.max_degree {
                    break;
                }
                if selected.get(index).copied().unwrap_or(true) {
                    continue;
                }
                if is_diverse(*candidate, candidates, &selected, alpha, scorer)? {
                    if let Some(slot) = selected.get_mut(index) {
                        *slot = true;
                    }
                    count += 1;
                }
            }
            if count >= self.max_degree || alpha + ALPHA_TOLERANCE >= self.alpha {
                break;
            }
            alpha = (alpha + ALPHA_STEP).min(self.alpha);
        }
        Ok(candidates
            .iter()
            .zip(selected)
            .filter_map(|(candidate, keep)| keep.then_some(*candidate))
            .collect())
    }

    /// Adds a reverse edge to `self.node` into every neighbour's own list.
    ///
    /// Reverse edges skip the diversity check but respect `capacity`.
    /// Returns the number of lists that changed.
    pub fn backlink(&self, store: &GraphStore, capacity: usize) -> usize {
        self.snapshot()
            .iter()
            .filter(|neighbour| {
                store.neighbours(neighbour.id).is_some_and(|other| {
                    other.insert_not_diverse(self.node, neighbour.score, false, capacity)
                })
            })
            .count()
    }

    /// Inserts `id` without a diversity check.
    ///
    /// When the list already holds `capacity` entries the worst one is
    /// evicted if `id` scores better, or unconditionally when `force` is set;
    /// otherwise the edge is dropped. Returns `true` when the list changed.
    pub fn insert_not_diverse(&self, id: usize, score: f32, force: bool, capacity: usize) -> bool {
        self.update(|current| {
            if id == self.node || current.iter().any(|n| n.id == id) {
                return None;
            }
            let mut next = current.to_vec();
            if next.len() >= capacity {
                let worst = next.last()?;
                if !force && score <= worst.score {
                    return None;
                }
                next.truncate(capacity.saturating_sub(1));
            }
            let position = next.partition_point(|n| n.score >= score);
            next.insert(position, ScoredNode::new(id, score));
            Some(next)
        })
    }

    /// Trims the list back to `max_degree` entries, keeping a diverse subset.
    /// Lists already within bounds are left untouched. Returns `true` when the
    /// list changed.
    ///
    /// # Errors
    /// Propagates failures from `scorer`.
    pub fn cleanup(&self, scorer: &mut impl PairSimilarity) -> Result<bool, GraphError> {
        self.try_update(|current| {
            if current.len() <= self.max_degree {
                return Ok(None);
            }
            self.select_diverse(current, scorer).map(Some)
        })
    }

    /// Drops every neighbour present in `deleted`. Returns `true` when at
    /// least one edge was removed.
    pub fn remove_deleted_neighbours(&self, deleted: &DashSet<usize>) -> bool {
        self.update(|current| {
            if !current.iter().any(|n| deleted.contains(&n.id)) {
                return None;
            }
            Some(
                current
                    .iter()
                    .filter(|n| !deleted.contains(&n.id))
                    .copied()
                    .collect(),
            )
        })
    }

    /// Appends `candidates` without a diversity check until the list holds
    /// `max_degree` entries. Returns the number of neighbours added.
    pub fn pad_with_random(&self, candidates: &[ScoredNode]) -> usize {
        let mut added = 0;
        self.update(|current| {
            let mut next = current.to_vec();
            added = 0;
            for candidate in candidates {
                if next.len() >= self.max_degree {
                    break;
                }
                if candidate.id == self.node || next.iter().any(|n| n.id == candidate.id) {
                    continue;
                }
                let position = next.partition_point(|n| n.score >= candidate.score);
                next.insert(position, *candidate);
                added += 1;
            }
            (added > 0).then_some(next)
        });
        added
    }
}

fn is_diverse(
    candidate: ScoredNode,
    candidates: &[ScoredNode],
    selected: &[bool],
    alpha: f32,
    scorer: &mut impl PairSimilarity,
) -> Result<bool, GraphError> {
    for (other, _) in candidates
        .iter()
        .zip(selected)
        .filter(|(_, keep)| **keep)
    {
        if scorer.similarity(candidate.id, other.id)? > candidate.score * alpha {
            return Ok(false);
        }
    }
    Ok(true)
}

impl fmt::Debug for NeighbourSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NeighbourSet")
            .field("node", &self.node)
            .field("max_degree", &self.max_degree)
            .field("neighbours", &self.neighbours.load())
            .finish()
    }
}
