//! Concurrent incremental construction of the proximity graph.
//!
//! [`GraphBuilder`] owns the [`GraphStore`] and the bookkeeping that insertion
//! needs: the set of in-flight insertions, the entry-point refresh countdowns
//! and per-worker random generators. Insertions may run concurrently from any
//! number of threads; maintenance via [`GraphBuilder::cleanup`] must not
//! overlap with insertions.

mod entry;
mod in_flight;
mod insert;
mod maintenance;
mod persist;
mod rng;

use std::sync::{
    Mutex,
    atomic::{AtomicIsize, AtomicUsize, Ordering},
};

use rand::{SeedableRng, rngs::SmallRng};

use crate::{
    error::SourceError,
    labels::{LabelSet, LabelSource, NoLabels},
    vectors::VectorSource,
};

use super::{
    connectivity::{ConnectivityReport, reachable_from},
    error::GraphError,
    params::GraphParams,
    pool::ViewPool,
    store::GraphStore,
};

pub use self::maintenance::CleanupReport;
use self::{in_flight::InFlight, rng::build_worker_rngs};

/// Builds a proximity graph over the vectors of a [`VectorSource`].
///
/// # Examples
/// ```
/// use proxima_core::{AcceptAll, FlatVectors, GraphBuilder, GraphParams, GraphSearcher,
///     QueryScorer, SearchRequest, SimilarityFunction, VectorSource};
///
/// let rows: Vec<Vec<f32>> = (0..20).map(|i| vec![i as f32, 0.0]).collect();
/// let vectors = FlatVectors::from_rows(rows).expect("rows");
/// let params = GraphParams::new(4, 16).expect("params");
/// let builder = GraphBuilder::new(vectors.clone(), params).expect("builder");
/// for id in 0..20 {
///     builder.add_node(id).expect("insert");
/// }
/// builder.cleanup().expect("cleanup");
///
/// let mut view = vectors.copy();
/// let query = [7.2_f32, 0.0];
/// let mut scorer = QueryScorer::new(&query, &mut view, SimilarityFunction::Euclidean);
/// let mut searcher = GraphSearcher::new(builder.graph());
/// let result = searcher
///     .search(&mut scorer, SearchRequest::new(1).with_accept(&AcceptAll))
///     .expect("search");
/// assert_eq!(result.ids().next(), Some(7));
/// ```
#[derive(Debug)]
pub struct GraphBuilder<S: VectorSource, L: LabelSource = NoLabels> {
    params: GraphParams,
    dimension: usize,
    store: GraphStore,
    views: ViewPool<S>,
    labels: L,
    in_flight: InFlight,
    entry_countdown: AtomicIsize,
    label_populations: Box<[AtomicUsize]>,
    label_countdowns: Box<[AtomicIsize]>,
    rng: Mutex<SmallRng>,
    worker_rngs: Vec<Mutex<SmallRng>>,
}

impl<S: VectorSource> GraphBuilder<S, NoLabels> {
    /// Creates a builder for an unlabelled graph.
    ///
    /// # Errors
    /// Returns [`GraphError::Source`] when `vectors` reports a zero dimension.
    pub fn new(vectors: S, params: GraphParams) -> Result<Self, GraphError> {
        Self::with_labels(vectors, NoLabels, params)
    }
}

impl<S: VectorSource, L: LabelSource> GraphBuilder<S, L> {
    /// Creates a builder whose nodes carry labels from `labels`.
    ///
    /// Every label below [`GraphParams::label_capacity`] gets its own entry
    /// point, and insertions only link nodes that share a label.
    ///
    /// # Errors
    /// Returns [`GraphError::Source`] when `vectors` reports a zero dimension.
    pub fn with_labels(vectors: S, labels: L, params: GraphParams) -> Result<Self, GraphError> {
        let dimension = vectors.dimension();
        if dimension == 0 {
            return Err(SourceError::ZeroDimension.into());
        }
        let label_slots = if labels.is_labelled() {
            params.label_capacity()
        } else {
            0
        };
        let interval = countdown(params.entry_refresh_interval());
        let store = GraphStore::new(
            params.max_degree(),
            params.overflow_capacity(),
            params.alpha(),
            label_slots,
        );
        Ok(Self {
            dimension,
            store,
            views: ViewPool::new(vectors),
            labels,
            in_flight: InFlight::default(),
            entry_countdown: AtomicIsize::new(interval),
            label_populations: (0..label_slots).map(|_| AtomicUsize::new(0)).collect(),
            label_countdowns: (0..label_slots).map(|_| AtomicIsize::new(interval)).collect(),
            rng: Mutex::new(SmallRng::seed_from_u64(params.rng_seed())),
            worker_rngs: build_worker_rngs(params.rng_seed()),
            params,
        })
    }

    /// Returns the configuration used by the builder.
    #[rustfmt::skip]
    #[must_use]
    pub fn params(&self) -> &GraphParams { &self.params }

    /// Returns the graph under construction.
    #[rustfmt::skip]
    #[must_use]
    pub fn graph(&self) -> &GraphStore { &self.store }

    /// Consumes the builder, returning the graph.
    #[must_use]
    pub fn into_graph(self) -> GraphStore {
        self.store
    }

    /// Dimension of the indexed vectors.
    #[rustfmt::skip]
    #[must_use]
    pub fn dimension(&self) -> usize { self.dimension }

    /// Returns `true` when the builder tracks labels.
    #[must_use]
    pub fn is_labelled(&self) -> bool {
        self.labels.is_labelled()
    }

    /// Number of insertions currently linking their node.
    #[must_use]
    pub fn inserts_in_progress(&self) -> usize {
        self.in_flight.len()
    }

    /// Flags `id` for removal by the next [`GraphBuilder::cleanup`]. The node
    /// keeps its edges and stays traversable until then but is no longer
    /// returned by searches.
    pub fn mark_node_deleted(&self, id: usize) {
        self.store.mark_deleted(id);
    }

    /// Estimated heap bytes held by the graph and the builder's bookkeeping.
    #[must_use]
    pub fn ram_bytes_used(&self) -> usize {
        let per_label = 2 * std::mem::size_of::<AtomicUsize>();
        self.store.ram_bytes_used()
            + self.label_populations.len() * per_label
            + self.worker_rngs.len() * std::mem::size_of::<Mutex<SmallRng>>()
    }

    /// Number of live nodes carrying `label`.
    ///
    /// # Errors
    /// Returns [`GraphError::UnlabelledGraph`] for unlabelled builders and
    /// [`GraphError::LabelOutOfRange`] for labels beyond the capacity.
    pub fn label_population(&self, label: usize) -> Result<usize, GraphError> {
        Ok(self.label_slot(&self.label_populations, label)?.load(Ordering::Acquire))
    }

    /// Reports which nodes carrying `label` are reachable from the label's
    /// entry point through nodes that also carry it.
    ///
    /// # Errors
    /// Returns [`GraphError::UnlabelledGraph`] for unlabelled builders,
    /// [`GraphError::LabelOutOfRange`] for labels beyond the capacity and
    /// label lookup failures.
    pub fn label_connectivity(&self, label: usize) -> Result<ConnectivityReport, GraphError> {
        self.label_slot(&self.label_populations, label)?;
        let members = self.label_members(label)?;
        let entries: Vec<usize> = self.store.label_entry(label).into_iter().collect();
        Ok(reachable_from(&self.store, &entries, |id| {
            members.get(id).copied().unwrap_or(false)
        }))
    }

    fn label_slot<'a, T>(&self, slots: &'a [T], label: usize) -> Result<&'a T, GraphError> {
        if !self.is_labelled() {
            return Err(GraphError::UnlabelledGraph);
        }
        slots.get(label).ok_or(GraphError::LabelOutOfRange {
            label,
            capacity: slots.len(),
        })
    }

    fn check_labels(&self, labels: &LabelSet) -> Result<(), GraphError> {
        match labels.max_label() {
            Some(label) if label >= self.store.label_capacity() => Err(GraphError::LabelOutOfRange {
                label,
                capacity: self.store.label_capacity(),
            }),
            _ => Ok(()),
        }
    }

    /// Membership bitmap of registered nodes carrying `label`.
    fn label_members(&self, label: usize) -> Result<Vec<bool>, GraphError> {
        let mut members = vec![false; self.store.id_upper_bound()];
        for id in self.store.node_ids() {
            if self.labels.labels_of(id)?.contains(label)
                && let Some(slot) = members.get_mut(id)
            {
                *slot = true;
            }
        }
        Ok(members)
    }

    fn labels_for(&self, id: usize) -> Result<LabelSet, GraphError> {
        if self.is_labelled() {
            Ok(self.labels.labels_of(id)?)
        } else {
            Ok(LabelSet::empty())
        }
    }
}

fn countdown(value: usize) -> isize {
    isize::try_from(value).unwrap_or(isize::MAX)
}

#[cfg(feature = "metrics")]
fn record_node_inserted() {
    metrics::counter!("proxima_nodes_inserted_total").increment(1);
}

#[cfg(not(feature = "metrics"))]
fn record_node_inserted() {}

#[cfg(feature = "metrics")]
fn record_inserts_in_progress(count: usize) {
    metrics::gauge!("proxima_inserts_in_progress").set(count as f64);
}

#[cfg(not(feature = "metrics"))]
fn record_inserts_in_progress(_count: usize) {}

#[cfg(feature = "metrics")]
fn record_entry_refresh() {
    metrics::counter!("proxima_entry_refreshes_total").increment(1);
}

#[cfg(not(feature = "metrics"))]
fn record_entry_refresh() {}

#[cfg(feature = "metrics")]
fn record_nodes_purged(count: usize) {
    metrics::counter!("proxima_nodes_purged_total").increment(count as u64);
}

#[cfg(not(feature = "metrics"))]
fn record_nodes_purged(_count: usize) {}

#[cfg(feature = "metrics")]
fn record_orphans_reconnected(count: usize) {
    metrics::counter!("proxima_orphans_reconnected_total").increment(count as u64);
}

#[cfg(not(feature = "metrics"))]
fn record_orphans_reconnected(_count: usize) {}
