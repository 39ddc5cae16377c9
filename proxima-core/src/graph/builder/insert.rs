//! Node insertion and neighbour improvement.

use rand::Rng;
use rayon::prelude::*;
use tracing::{debug, info, instrument};

use crate::{
    error::SourceError,
    graph::{
        error::GraphError,
        search::{
            Excluding, GraphSearcher, LabelPredicate, PairScorer, QueryScorer, ScoreFunction,
            SearchRequest,
        },
        store::GraphStore,
        types::{ScoredNode, sort_best_first},
    },
    labels::{LabelSet, LabelSource},
    vectors::VectorSource,
};

use super::{GraphBuilder, record_inserts_in_progress, record_node_inserted};

impl<S: VectorSource, L: LabelSource> GraphBuilder<S, L> {
    /// Inserts `id`, linking it to its approximate nearest neighbours.
    ///
    /// Labelled builders read the node's labels from their label source.
    /// Safe to call concurrently for distinct ids. Returns the estimated
    /// bytes added by the node.
    ///
    /// # Errors
    /// Returns [`GraphError::Source`] when a vector or label cannot be read,
    /// [`GraphError::LabelOutOfRange`] for labels beyond the capacity and
    /// [`GraphError::LockPoisoned`] when shared state is poisoned.
    #[instrument(name = "graph.add_node", err, skip(self), fields(node = id))]
    pub fn add_node(&self, id: usize) -> Result<usize, GraphError> {
        let labels = self.labels_for(id)?;
        self.insert(id, &labels)
    }

    /// Inserts `id` carrying `labels` instead of the labels its source
    /// reports right now. Later maintenance reads the source again, so the
    /// source should report the same labels once the insertion returns.
    ///
    /// # Errors
    /// Returns [`GraphError::UnlabelledGraph`] for unlabelled builders, plus
    /// every error of [`GraphBuilder::add_node`].
    #[instrument(name = "graph.add_node", err, skip(self, labels), fields(node = id))]
    pub fn add_node_with_labels(&self, id: usize, labels: &LabelSet) -> Result<usize, GraphError> {
        if !self.is_labelled() {
            return Err(GraphError::UnlabelledGraph);
        }
        self.insert(id, labels)
    }

    fn insert(&self, id: usize, labels: &LabelSet) -> Result<usize, GraphError> {
        let len = self.views.prototype().len();
        if id >= len {
            return Err(SourceError::OutOfBounds { index: id, len }.into());
        }
        self.check_labels(labels)?;
        self.store.add_node(id);
        let (guard, in_flight) = self.in_flight.begin(id)?;
        record_inserts_in_progress(self.in_flight.len());

        self.link_node(id, labels, &in_flight)?;
        self.update_entry_points(id, labels)?;
        self.maybe_repair_low_dimension()?;

        drop(guard);
        record_inserts_in_progress(self.in_flight.len());
        record_node_inserted();
        Ok(self.store.ram_bytes_used_one_node())
    }

    /// Re-runs the neighbour search for an existing node and merges the
    /// results into its list, then backlinks.
    ///
    /// # Errors
    /// Returns [`GraphError::GraphInvariantViolation`] when `id` is not in
    /// the graph, and vector or label lookup failures.
    #[instrument(name = "graph.improve_connections", err, skip(self), fields(node = id))]
    pub fn improve_connections(&self, id: usize) -> Result<(), GraphError> {
        if !self.store.contains_node(id) {
            return Err(GraphError::invariant(format!(
                "cannot improve connections of node {id}: not in the graph"
            )));
        }
        let labels = self.labels_for(id)?;
        self.link_node(id, &labels, &[])
    }

    /// Searches for `id`'s neighbours, scores the concurrently inserted
    /// nodes, merges both into `id`'s list and backlinks.
    fn link_node(&self, id: usize, labels: &LabelSet, in_flight: &[usize]) -> Result<(), GraphError> {
        let Some(neighbours) = self.store.neighbours(id) else {
            return Err(GraphError::invariant(format!(
                "node {id} vanished while being linked"
            )));
        };
        let function = self.params.similarity();
        let mut value = self.views.acquire()?;
        let mut comparison = self.views.acquire()?;
        let (natural, concurrent) = {
            let mut scorer = QueryScorer::for_node(id, &mut *value, &mut *comparison, function)?;
            let natural = self.search_neighbours(id, labels, &mut scorer)?;
            let concurrent = self.score_concurrent(id, labels, in_flight, &mut scorer)?;
            (natural, concurrent)
        };
        let mut pairs = PairScorer::new(&mut *value, &mut *comparison, function);
        neighbours.insert_diverse(&natural, &concurrent, &mut pairs)?;
        neighbours.backlink(&self.store, self.params.overflow_capacity());
        Ok(())
    }

    fn search_neighbours(
        &self,
        id: usize,
        labels: &LabelSet,
        scorer: &mut dyn ScoreFunction,
    ) -> Result<Vec<ScoredNode>, GraphError> {
        let mut searcher = GraphSearcher::concurrent(&self.store);
        let not_self = Excluding(id);
        let predicate = LabelPredicate::overlapping(&self.labels, labels.clone());
        let mut request = SearchRequest::new(self.params.beam_width()).with_accept(&not_self);
        if self.restricts_to_labels(labels) {
            request = request.with_predicate(&predicate);
        }
        Ok(searcher.search(scorer, request)?.into_nodes())
    }

    fn score_concurrent(
        &self,
        id: usize,
        labels: &LabelSet,
        in_flight: &[usize],
        scorer: &mut dyn ScoreFunction,
    ) -> Result<Vec<ScoredNode>, GraphError> {
        let restrict = self.restricts_to_labels(labels);
        let mut concurrent = Vec::with_capacity(in_flight.len());
        for &other in in_flight {
            if other == id || !self.store.contains_node(other) {
                continue;
            }
            if restrict && !self.labels.labels_of(other)?.contains_any(labels) {
                continue;
            }
            concurrent.push(ScoredNode::new(other, scorer.similarity_to(other)?));
        }
        sort_best_first(&mut concurrent);
        Ok(concurrent)
    }

    /// Labelled nodes only link to nodes sharing a label; nodes without
    /// labels link through the whole graph.
    pub(super) fn restricts_to_labels(&self, labels: &LabelSet) -> bool {
        self.is_labelled() && !labels.is_empty()
    }

    /// Improves one random older node when low-dimensional data makes greedy
    /// search prone to local maxima.
    fn maybe_repair_low_dimension(&self) -> Result<(), GraphError> {
        let Some(repair) = self.params.low_dimension_repair() else {
            return Ok(());
        };
        if !repair.applies(self.dimension, self.store.size()) {
            return Ok(());
        }
        let upper = self.store.id_upper_bound();
        for _ in 0..repair.attempts() {
            let candidate = self.with_rng(|rng| rng.gen_range(0..upper))?;
            if self.store.contains_node(candidate)
                && !self.store.is_deleted(candidate)
                && !self.in_flight.contains(candidate)?
            {
                debug!(node = candidate, "improving random node in low dimension");
                return self.improve_connections(candidate);
            }
        }
        Ok(())
    }

    /// Inserts every vector of the source in parallel, runs
    /// [`GraphBuilder::cleanup`] and returns the finished graph.
    ///
    /// # Errors
    /// Propagates the first insertion or cleanup failure.
    #[instrument(
        name = "graph.build",
        err,
        skip(self),
        fields(nodes = self.views.prototype().len(), dimension = self.dimension)
    )]
    pub fn build(self) -> Result<GraphStore, GraphError> {
        let nodes = self.views.prototype().len();
        (0..nodes)
            .into_par_iter()
            .try_for_each(|id| self.add_node(id).map(|_| ()))?;
        let report = self.cleanup()?;
        info!(
            nodes,
            purged = report.purged(),
            trimmed = report.trimmed(),
            reconnected = report.reconnected(),
            "graph build complete"
        );
        Ok(self.into_graph())
    }
}
