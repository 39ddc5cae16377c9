//! Entry-point maintenance.
//!
//! The first node linked becomes the entry point. Every
//! `entry_refresh_interval` insertions the entry is moved to the node nearest
//! the mean of all live vectors, and the countdown is topped up by the
//! current population, so refreshes grow rarer as the graph grows. Labelled
//! graphs run the same cycle independently per label.

use std::sync::atomic::Ordering;

use tracing::{debug, instrument};

use crate::{
    graph::{
        error::GraphError,
        search::{AcceptAll, GraphSearcher, LabelPredicate, QueryScorer, SearchRequest},
    },
    labels::{LabelSet, LabelSource},
    similarity::VectorElement,
    vectors::VectorSource,
};

use super::{GraphBuilder, countdown, record_entry_refresh};

impl<S: VectorSource, L: LabelSource> GraphBuilder<S, L> {
    /// Installs `id` as entry where none exists and advances the refresh
    /// countdowns, refreshing any that reach zero.
    pub(super) fn update_entry_points(&self, id: usize, labels: &LabelSet) -> Result<(), GraphError> {
        self.store.maybe_set_initial_entry(id);
        if self.entry_countdown.fetch_sub(1, Ordering::AcqRel) == 1 {
            self.refresh_entry(None)?;
            self.entry_countdown
                .fetch_add(countdown(self.store.size()), Ordering::AcqRel);
        }
        if !self.is_labelled() {
            return Ok(());
        }
        for label in labels.iter() {
            let (Some(population), Some(remaining)) = (
                self.label_populations.get(label),
                self.label_countdowns.get(label),
            ) else {
                continue;
            };
            let before = population.fetch_add(1, Ordering::AcqRel);
            if before == 0 {
                self.store.maybe_set_initial_label_entry(id, label);
            }
            if remaining.fetch_sub(1, Ordering::AcqRel) == 1 {
                self.refresh_entry(Some(label))?;
                remaining.fetch_add(countdown(before + 1), Ordering::AcqRel);
            }
        }
        Ok(())
    }

    /// Moves the entry point (global, or of `label`) to the live node nearest
    /// the mean of the live vectors in scope, then improves that node's
    /// neighbours. Returns the new entry, or `None` when the scope is empty or
    /// its element type has no mean.
    #[instrument(name = "graph.refresh_entry", err, skip(self), fields(label = ?label))]
    pub(super) fn refresh_entry(&self, label: Option<usize>) -> Result<Option<usize>, GraphError> {
        let Some(centroid) = self.centroid(label)? else {
            debug!("entry point left unchanged");
            return Ok(None);
        };
        let mut view = self.views.acquire()?;
        let mut scorer = QueryScorer::<S>::new(&centroid, &mut *view, self.params.similarity());
        let entries = self.store.entries();
        let mut searcher = GraphSearcher::concurrent(&self.store);
        let result = match label {
            Some(label) => {
                let predicate = LabelPredicate::containing(&self.labels, label);
                searcher.search(
                    &mut scorer,
                    SearchRequest::new(1)
                        .with_accept(&AcceptAll)
                        .with_predicate(&predicate)
                        .with_entries(&entries),
                )?
            }
            None => searcher.search(
                &mut scorer,
                SearchRequest::new(1)
                    .with_accept(&AcceptAll)
                    .with_entries(&entries),
            )?,
        };
        drop(view);
        let Some(best) = result.nodes().first().copied() else {
            return Ok(None);
        };
        match label {
            Some(label) => self.store.update_label_entry(label, Some(best.id)),
            None => self.store.update_entry(Some(best.id)),
        }
        debug!(entry = best.id, score = best.score, "entry point refreshed");
        record_entry_refresh();
        self.improve_connections(best.id)?;
        Ok(Some(best.id))
    }

    /// Mean of the live vectors in scope.
    fn centroid(&self, label: Option<usize>) -> Result<Option<Vec<S::Element>>, GraphError> {
        let mut view = self.views.acquire()?;
        let mut sum = vec![0.0_f64; self.dimension];
        let mut count = 0_usize;
        for id in self.store.node_ids() {
            if self.store.is_deleted(id) {
                continue;
            }
            if let Some(label) = label
                && !self.labels.labels_of(id)?.contains(label)
            {
                continue;
            }
            S::Element::accumulate(view.vector_value(id)?, &mut sum);
            count += 1;
        }
        Ok(S::Element::mean(&sum, count))
    }

    /// Refreshes the global entry and every populated label entry, then
    /// restarts the countdowns from the current population.
    pub(super) fn refresh_all_entries(&self) -> Result<Vec<usize>, GraphError> {
        let interval = self.params.entry_refresh_interval();
        self.refresh_entry(None)?;
        let size = self.store.size();
        let next = if size == 0 { interval } else { size };
        self.entry_countdown.store(countdown(next), Ordering::Release);
        for (label, population) in self.label_populations.iter().enumerate() {
            if population.load(Ordering::Acquire) == 0 {
                self.store.update_label_entry(label, None);
            } else {
                self.refresh_entry(Some(label))?;
            }
            if let Some(remaining) = self.label_countdowns.get(label) {
                let current = remaining.load(Ordering::Acquire);
                remaining.store(current.max(countdown(interval)), Ordering::Release);
            }
        }
        Ok(self.store.entries())
    }
}
