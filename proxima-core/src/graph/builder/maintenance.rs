//! Deletion purge, overflow trimming and orphan reconnection.

use std::sync::atomic::{AtomicUsize, Ordering};

use rand::Rng;
use rayon::prelude::*;
use tracing::{debug, info, instrument, warn};

use crate::{
    graph::{
        connectivity::ConnectivityReport,
        error::GraphError,
        neighbours::PairSimilarity,
        search::{Excluding, GraphSearcher, LabelPredicate, PairScorer, QueryScorer, SearchRequest},
        types::{ScoredNode, sort_best_first},
    },
    labels::LabelSource,
    vectors::VectorSource,
};

use super::{GraphBuilder, record_nodes_purged, record_orphans_reconnected};

/// Reachability-and-reconnect cycles attempted before giving up.
const MAX_RECONNECT_PASSES: usize = 3;

/// Summary of one [`GraphBuilder::cleanup`] run.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct CleanupReport {
    purged: usize,
    padded: usize,
    affected: usize,
    trimmed: usize,
    reconnect_passes: Vec<usize>,
    entries: Vec<usize>,
}

impl CleanupReport {
    /// Soft-deleted nodes removed from the store.
    #[rustfmt::skip]
    #[must_use]
    pub fn purged(&self) -> usize { self.purged }

    /// Random neighbours added to nodes left under-connected by the purge.
    #[rustfmt::skip]
    #[must_use]
    pub fn padded(&self) -> usize { self.padded }

    /// Nodes that lost edges to deleted nodes or were padded.
    #[rustfmt::skip]
    #[must_use]
    pub fn affected(&self) -> usize { self.affected }

    /// Neighbour lists trimmed back to the maximum degree.
    #[rustfmt::skip]
    #[must_use]
    pub fn trimmed(&self) -> usize { self.trimmed }

    /// Orphans reconnected in each pass.
    #[rustfmt::skip]
    #[must_use]
    pub fn reconnect_passes(&self) -> &[usize] { &self.reconnect_passes }

    /// Orphans reconnected across all passes.
    #[must_use]
    pub fn reconnected(&self) -> usize {
        self.reconnect_passes.iter().sum()
    }

    /// Entry points after cleanup, global first.
    #[rustfmt::skip]
    #[must_use]
    pub fn entries(&self) -> &[usize] { &self.entries }
}

#[derive(Clone, Copy, Debug, Default)]
struct PurgeOutcome {
    purged: usize,
    padded: usize,
    affected: usize,
}

#[derive(Clone, Copy, Debug, Default)]
struct NodeRepair {
    node: usize,
    stripped: bool,
    padded: usize,
}

impl NodeRepair {
    const fn is_affected(&self) -> bool {
        self.stripped || self.padded > 0
    }
}

impl<S: VectorSource, L: LabelSource> GraphBuilder<S, L> {
    /// Brings the graph into its steady state: removes soft-deleted nodes,
    /// recomputes the entry points, trims overflowing neighbour lists and
    /// reconnects nodes no entry point reaches.
    ///
    /// Must not run concurrently with insertions.
    ///
    /// # Errors
    /// Returns [`GraphError::GraphInvariantViolation`] when an entry point or
    /// a deleted id is not in the graph, and vector or label lookup failures.
    #[instrument(
        name = "graph.cleanup",
        err,
        skip(self),
        fields(size = self.store.size(), deleted = self.store.deleted_count())
    )]
    pub fn cleanup(&self) -> Result<CleanupReport, GraphError> {
        if self.store.is_empty() {
            return Ok(CleanupReport::default());
        }
        info!("graph cleanup started");
        self.store.validate_entries()?;
        let outcome = self.purge_deleted()?;
        // Refreshing improves the new entries' lists, which may overflow them.
        let entries = self.refresh_all_entries()?;
        let trimmed = self.trim_overflow()?;
        let reconnect_passes = self.reconnect_orphans()?;
        let report = CleanupReport {
            purged: outcome.purged,
            padded: outcome.padded,
            affected: outcome.affected,
            trimmed,
            reconnect_passes,
            entries,
        };
        info!(
            purged = report.purged,
            affected = report.affected,
            trimmed = report.trimmed,
            reconnected = report.reconnected(),
            "graph cleanup complete"
        );
        Ok(report)
    }

    #[instrument(
        name = "graph.purge_deleted",
        err,
        skip(self),
        fields(deleted = self.store.deleted_count())
    )]
    fn purge_deleted(&self) -> Result<PurgeOutcome, GraphError> {
        let deleted = self.store.deleted_nodes();
        if deleted.is_empty() {
            return Ok(PurgeOutcome::default());
        }
        if let Some(missing) = deleted.iter().find(|&&id| !self.store.contains_node(id)) {
            return Err(GraphError::invariant(format!(
                "deleted node {missing} is not present in the graph"
            )));
        }
        let live: Vec<usize> = self
            .store
            .node_ids()
            .into_iter()
            .filter(|&id| !self.store.is_deleted(id))
            .collect();

        let repairs: Vec<NodeRepair> = live
            .par_iter()
            .map(|&id| self.repair_node(id))
            .collect::<Result<_, _>>()?;
        let affected: Vec<usize> = repairs
            .iter()
            .filter(|repair| repair.is_affected())
            .map(|repair| repair.node)
            .collect();
        let padded = repairs.iter().map(|repair| repair.padded).sum();

        self.replace_deleted_entries(&live)?;
        affected
            .par_iter()
            .try_for_each(|&id| self.improve_connections(id))?;

        for &id in &deleted {
            self.store.remove_node(id);
            if self.is_labelled() {
                for label in self.labels.labels_of(id)?.iter() {
                    if let Some(population) = self.label_populations.get(label) {
                        decrement(population);
                    }
                }
            }
        }
        self.store.clear_deleted();
        record_nodes_purged(deleted.len());
        debug!(
            purged = deleted.len(),
            affected = affected.len(),
            padded,
            "deleted nodes purged"
        );
        Ok(PurgeOutcome {
            purged: deleted.len(),
            padded,
            affected: affected.len(),
        })
    }

    /// Strips edges to deleted nodes from `id` and pads the list with random
    /// live nodes whenever it holds fewer than `1 + max_degree / 2` entries.
    fn repair_node(&self, id: usize) -> Result<NodeRepair, GraphError> {
        let Some(neighbours) = self.store.neighbours(id) else {
            return Ok(NodeRepair {
                node: id,
                ..NodeRepair::default()
            });
        };
        let stripped = neighbours.remove_deleted_neighbours(self.store.deleted_set());
        let floor = 1 + self.params.max_degree() / 2;
        let padded = if neighbours.len() < floor {
            let candidates = self.random_candidates(id)?;
            neighbours.pad_with_random(&candidates)
        } else {
            0
        };
        Ok(NodeRepair {
            node: id,
            stripped,
            padded,
        })
    }

    /// Samples live nodes other than `id`, scored against it, best first.
    /// Labelled nodes only sample nodes sharing one of their labels.
    fn random_candidates(&self, id: usize) -> Result<Vec<ScoredNode>, GraphError> {
        let labels = self.labels_for(id)?;
        let restrict = self.restricts_to_labels(&labels);
        let upper = self.store.id_upper_bound();
        let attempts = 2 * self.params.max_degree();
        let drawn: Vec<usize> =
            self.with_rng(|rng| (0..attempts).map(|_| rng.gen_range(0..upper)).collect())?;

        let mut left = self.views.acquire()?;
        let mut right = self.views.acquire()?;
        let mut pairs = PairScorer::new(&mut *left, &mut *right, self.params.similarity());
        let mut candidates: Vec<ScoredNode> = Vec::with_capacity(drawn.len());
        for candidate in drawn {
            if candidate == id
                || !self.store.contains_node(candidate)
                || self.store.is_deleted(candidate)
                || candidates.iter().any(|n| n.id == candidate)
            {
                continue;
            }
            if restrict && !self.labels.labels_of(candidate)?.contains_any(&labels) {
                continue;
            }
            candidates.push(ScoredNode::new(candidate, pairs.similarity(id, candidate)?));
        }
        sort_best_first(&mut candidates);
        Ok(candidates)
    }

    /// Moves deleted entry points to the first live node in scope.
    fn replace_deleted_entries(&self, live: &[usize]) -> Result<(), GraphError> {
        if let Some(entry) = self.store.entry()
            && self.store.is_deleted(entry)
        {
            self.store.update_entry(live.first().copied());
        }
        for label in 0..self.store.label_capacity() {
            let Some(entry) = self.store.label_entry(label) else {
                continue;
            };
            if !self.store.is_deleted(entry) {
                continue;
            }
            let mut replacement = None;
            for &id in live {
                if self.labels.labels_of(id)?.contains(label) {
                    replacement = Some(id);
                    break;
                }
            }
            self.store.update_label_entry(label, replacement);
        }
        Ok(())
    }

    /// Trims every neighbour list above the maximum degree to a diverse
    /// subset. Returns the number of lists trimmed.
    fn trim_overflow(&self) -> Result<usize, GraphError> {
        let trimmed: Vec<bool> = self
            .store
            .node_ids()
            .par_iter()
            .map(|&id| {
                let Some(neighbours) = self.store.neighbours(id) else {
                    return Ok(false);
                };
                if neighbours.len() <= self.params.max_degree() {
                    return Ok(false);
                }
                let mut left = self.views.acquire()?;
                let mut right = self.views.acquire()?;
                let mut pairs = PairScorer::new(&mut *left, &mut *right, self.params.similarity());
                neighbours.cleanup(&mut pairs)
            })
            .collect::<Result<_, GraphError>>()?;
        Ok(trimmed.into_iter().filter(|&changed| changed).count())
    }

    /// Links every node unreachable from its scope's entry point to its
    /// nearest reachable node, repeating while passes still reconnect nodes.
    #[instrument(name = "graph.reconnect_orphans", err, skip(self))]
    fn reconnect_orphans(&self) -> Result<Vec<usize>, GraphError> {
        let mut passes = Vec::with_capacity(MAX_RECONNECT_PASSES);
        for _ in 0..MAX_RECONNECT_PASSES {
            let mut reconnected = self.reconnect_scope(None)?;
            for label in 0..self.store.label_capacity() {
                if self.store.label_entry(label).is_some() {
                    reconnected += self.reconnect_scope(Some(label))?;
                }
            }
            passes.push(reconnected);
            record_orphans_reconnected(reconnected);
            if reconnected == 0 {
                break;
            }
        }
        let report = self.store.connectivity();
        if !report.is_connected() {
            warn!(
                unreachable = report.unreachable().len(),
                "graph still has unreachable nodes after reconnection"
            );
        }
        Ok(passes)
    }

    fn reconnect_scope(&self, label: Option<usize>) -> Result<usize, GraphError> {
        let (report, entries): (ConnectivityReport, Vec<usize>) = match label {
            Some(label) => (
                self.label_connectivity(label)?,
                self.store.label_entry(label).into_iter().collect(),
            ),
            None => (self.store.connectivity(), self.store.entries()),
        };
        if report.is_connected() {
            return Ok(0);
        }
        let function = self.params.similarity();
        let mut targets: Vec<usize> = Vec::new();
        for &orphan in report.unreachable() {
            let mut value = self.views.acquire()?;
            let mut comparison = self.views.acquire()?;
            let mut scorer = QueryScorer::for_node(orphan, &mut *value, &mut *comparison, function)?;
            let mut searcher = GraphSearcher::concurrent(&self.store);
            let not_self = Excluding(orphan);
            let predicate = label.map(|label| LabelPredicate::containing(&self.labels, label));
            let mut request = SearchRequest::new(self.params.beam_width())
                .with_accept(&not_self)
                .with_entries(&entries);
            if let Some(predicate) = &predicate {
                request = request.with_predicate(predicate);
            }
            let result = searcher.search(&mut scorer, request)?;
            let Some(target) = result
                .nodes()
                .iter()
                .find(|candidate| !targets.contains(&candidate.id))
                .copied()
            else {
                debug!(node = orphan, "no reconnection target found");
                continue;
            };
            let Some(neighbours) = self.store.neighbours(target.id) else {
                continue;
            };
            if neighbours.insert_not_diverse(orphan, target.score, true, self.params.max_degree()) {
                targets.push(target.id);
                debug!(node = orphan, target = target.id, "orphan reconnected");
            }
        }
        Ok(targets.len())
    }
}

fn decrement(counter: &AtomicUsize) {
    let _ = counter.fetch_update(Ordering::AcqRel, Ordering::Acquire, |value| {
        value.checked_sub(1)
    });
}
