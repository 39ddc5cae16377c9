//! Sparse node store, entry-point registry and snapshot writer.

use std::{
    io::Write,
    sync::{
        Arc,
        atomic::{AtomicUsize, Ordering},
    },
};

use dashmap::{DashMap, DashSet};
use tracing::{error, info, instrument};

use crate::memory::{estimate_graph_bytes, estimate_node_bytes};

use super::{
    connectivity::{ConnectivityReport, reachable_from},
    error::GraphError,
    invariants::GraphInvariantChecker,
    neighbours::NeighbourSet,
    types::ScoredNode,
};

/// Marker stored in entry slots that hold no node.
pub(crate) const UNSET: usize = usize::MAX;

/// Map from node id to its [`NeighbourSet`], plus entry points and
/// soft-deletion bookkeeping.
///
/// Nodes are identified by dense-ish ordinals; edges are plain ids resolved
/// through this store. Entry slots are individually atomic: one global slot
/// and, for labelled graphs, one slot per label.
#[derive(Debug)]
pub struct GraphStore {
    nodes: DashMap<usize, Arc<NeighbourSet>>,
    deleted: DashSet<usize>,
    id_upper_bound: AtomicUsize,
    entry: AtomicUsize,
    label_entries: Box<[AtomicUsize]>,
    max_degree: usize,
    overflow_capacity: usize,
    alpha: f32,
}

impl GraphStore {
    pub(crate) fn new(
        max_degree: usize,
        overflow_capacity: usize,
        alpha: f32,
        label_slots: usize,
    ) -> Self {
        Self {
            nodes: DashMap::new(),
            deleted: DashSet::new(),
            id_upper_bound: AtomicUsize::new(0),
            entry: AtomicUsize::new(UNSET),
            label_entries: (0..label_slots).map(|_| AtomicUsize::new(UNSET)).collect(),
            max_degree,
            overflow_capacity,
            alpha,
        }
    }

    /// Registers an empty neighbour list for `id`.
    ///
    /// Concurrent readers see the node as present without neighbours. Each id
    /// is expected to be added once; re-adding returns the existing list.
    pub fn add_node(&self, id: usize) -> Arc<NeighbourSet> {
        let neighbours = Arc::clone(
            self.nodes
                .entry(id)
                .or_insert_with(|| Arc::new(NeighbourSet::new(id, self.max_degree, self.alpha)))
                .value(),
        );
        self.id_upper_bound.fetch_max(id + 1, Ordering::AcqRel);
        neighbours
    }

    pub(crate) fn add_loaded_node(&self, id: usize, neighbours: Vec<ScoredNode>) {
        self.nodes.insert(
            id,
            Arc::new(NeighbourSet::with_neighbours(
                id,
                self.max_degree,
                self.alpha,
                neighbours,
            )),
        );
        self.id_upper_bound.fetch_max(id + 1, Ordering::AcqRel);
    }

    /// Flags `id` as soft-deleted. The node keeps its edges until cleanup.
    pub fn mark_deleted(&self, id: usize) {
        self.deleted.insert(id);
    }

    /// Physically removes `id`, returning whether it was present.
    pub fn remove_node(&self, id: usize) -> bool {
        self.nodes.remove(&id).is_some()
    }

    /// Sets the global entry point to `id` unless one is already set.
    /// Returns `true` when this call installed the entry.
    pub fn maybe_set_initial_entry(&self, id: usize) -> bool {
        self.entry
            .compare_exchange(UNSET, id, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }

    /// Sets the entry point of `label` to `id` unless one is already set.
    /// Labels beyond the configured capacity are ignored.
    pub fn maybe_set_initial_label_entry(&self, id: usize, label: usize) -> bool {
        self.label_entries.get(label).is_some_and(|slot| {
            slot.compare_exchange(UNSET, id, Ordering::AcqRel, Ordering::Acquire)
                .is_ok()
        })
    }

    /// Overwrites the global entry point; `None` clears it.
    pub fn update_entry(&self, id: Option<usize>) {
        self.entry.store(id.unwrap_or(UNSET), Ordering::Release);
    }

    /// Overwrites the entry point of `label`; `None` clears it.
    pub fn update_label_entry(&self, label: usize, id: Option<usize>) {
        if let Some(slot) = self.label_entries.get(label) {
            slot.store(id.unwrap_or(UNSET), Ordering::Release);
        }
    }

    /// Returns the global entry point.
    #[must_use]
    pub fn entry(&self) -> Option<usize> {
        read_slot(&self.entry)
    }

    /// Returns the entry point of `label`.
    #[must_use]
    pub fn label_entry(&self, label: usize) -> Option<usize> {
        self.label_entries.get(label).and_then(read_slot)
    }

    /// Returns every set entry point, global first, without duplicates.
    #[must_use]
    pub fn entries(&self) -> Vec<usize> {
        let mut entries: Vec<usize> = Vec::with_capacity(1 + self.label_entries.len());
        for id in self
            .entry()
            .into_iter()
            .chain(self.label_entries.iter().filter_map(read_slot))
        {
            if !entries.contains(&id) {
                entries.push(id);
            }
        }
        entries
    }

    /// Number of label entry slots.
    #[must_use]
    pub fn label_capacity(&self) -> usize {
        self.label_entries.len()
    }

    /// Confirms every set entry point references a registered node.
    ///
    /// # Errors
    /// Returns [`GraphError::GraphInvariantViolation`] naming the first entry
    /// that is not registered.
    pub fn validate_entries(&self) -> Result<(), GraphError> {
        if let Some(id) = self.entry()
            && !self.contains_node(id)
        {
            error!(entry = id, "global entry point references a missing node");
            return Err(GraphError::invariant(format!(
                "entry point {id} is not present in the graph"
            )));
        }
        for (label, slot) in self.label_entries.iter().enumerate() {
            if let Some(id) = read_slot(slot)
                && !self.contains_node(id)
            {
                error!(entry = id, label, "label entry point references a missing node");
                return Err(GraphError::invariant(format!(
                    "entry point {id} for label {label} is not present in the graph"
                )));
            }
        }
        Ok(())
    }

    /// Returns the neighbour list of `id`, if registered.
    #[must_use]
    pub fn neighbours(&self, id: usize) -> Option<Arc<NeighbourSet>> {
        self.nodes.get(&id).map(|entry| Arc::clone(entry.value()))
    }

    /// Number of registered nodes, including soft-deleted ones not yet purged.
    ///
    /// Soft-deleted nodes stay registered until [`GraphBuilder::cleanup`]
    /// removes them, so this can exceed the number of searchable nodes; take
    /// [`GraphStore::deleted_count`] away for the active count.
    ///
    /// [`GraphBuilder::cleanup`]: crate::GraphBuilder::cleanup
    #[must_use]
    pub fn size(&self) -> usize {
        self.nodes.len()
    }

    /// Returns `true` when no node is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Returns `true` when `id` is registered.
    #[must_use]
    pub fn contains_node(&self, id: usize) -> bool {
        self.nodes.contains_key(&id)
    }

    /// Returns `true` when `id` is flagged for deletion.
    #[must_use]
    pub fn is_deleted(&self, id: usize) -> bool {
        self.deleted.contains(&id)
    }

    /// One past the highest id ever added.
    #[must_use]
    pub fn id_upper_bound(&self) -> usize {
        self.id_upper_bound.load(Ordering::Acquire)
    }

    /// Neighbour-list bound enforced after cleanup.
    #[rustfmt::skip]
    #[must_use]
    pub fn max_degree(&self) -> usize { self.max_degree }

    /// Neighbour-list bound tolerated while backlinking.
    #[rustfmt::skip]
    #[must_use]
    pub fn overflow_capacity(&self) -> usize { self.overflow_capacity }

    /// Soft-deleted ids in ascending order.
    #[must_use]
    pub fn deleted_nodes(&self) -> Vec<usize> {
        let mut ids: Vec<usize> = self.deleted.iter().map(|id| *id).collect();
        ids.sort_unstable();
        ids
    }

    /// Number of soft-deleted ids awaiting cleanup.
    #[must_use]
    pub fn deleted_count(&self) -> usize {
        self.deleted.len()
    }

    pub(crate) fn deleted_set(&self) -> &DashSet<usize> {
        &self.deleted
    }

    pub(crate) fn clear_deleted(&self) {
        self.deleted.clear();
    }

    /// Registered ids in ascending order.
    #[must_use]
    pub fn node_ids(&self) -> Vec<usize> {
        let mut ids: Vec<usize> = self.nodes.iter().map(|entry| *entry.key()).collect();
        ids.sort_unstable();
        ids
    }

    /// Estimated heap bytes held by one node's neighbour list.
    #[must_use]
    pub fn ram_bytes_used_one_node(&self) -> usize {
        estimate_node_bytes(self.overflow_capacity)
    }

    /// Estimated heap bytes held by the whole store.
    #[must_use]
    pub fn ram_bytes_used(&self) -> usize {
        estimate_graph_bytes(self.size(), self.overflow_capacity, self.label_entries.len())
    }

    /// Returns a checker for the structural invariants of the graph.
    #[must_use]
    pub fn invariants(&self) -> GraphInvariantChecker<'_> {
        GraphInvariantChecker::new(self)
    }

    /// Reports which registered nodes are reachable from any entry point.
    #[must_use]
    pub fn connectivity(&self) -> ConnectivityReport {
        reachable_from(self, &self.entries(), |_| true)
    }

    /// Writes the adjacency lists in the flat big-endian `i32` format:
    /// node count, entry id (`-1` when unset), max degree, then for each node
    /// in ascending id order its id, neighbour count and neighbour ids.
    ///
    /// # Errors
    /// Returns [`GraphError::PendingDeletions`] while soft-deleted nodes
    /// remain, [`GraphError::NodeIdOverflow`] for ids beyond `i32::MAX` and
    /// [`GraphError::Io`] when writing fails.
    #[instrument(name = "graph.save", err, skip(self, writer), fields(size = self.size()))]
    pub fn save<W: Write>(&self, writer: &mut W) -> Result<(), GraphError> {
        let pending = self.deleted_count();
        if pending > 0 {
            return Err(GraphError::PendingDeletions { count: pending });
        }
        let ids = self.node_ids();
        write_i32(writer, ids.len())?;
        match self.entry() {
            Some(entry) => write_i32(writer, entry)?,
            None => writer.write_all(&(-1_i32).to_be_bytes())?,
        }
        write_i32(writer, self.max_degree)?;
        for id in &ids {
            let snapshot = self
                .neighbours(*id)
                .map(|neighbours| neighbours.snapshot())
                .unwrap_or_default();
            write_i32(writer, *id)?;
            write_i32(writer, snapshot.len())?;
            for neighbour in snapshot.iter() {
                write_i32(writer, neighbour.id)?;
            }
        }
        writer.flush()?;
        info!(nodes = ids.len(), "graph snapshot written");
        Ok(())
    }
}

fn read_slot(slot: &AtomicUsize) -> Option<usize> {
    let id = slot.load(Ordering::Acquire);
    (id != UNSET).then_some(id)
}

fn write_i32<W: Write>(writer: &mut W, value: usize) -> Result<(), GraphError> {
    let encoded = i32::try_from(value).map_err(|_| GraphError::NodeIdOverflow { node: value })?;
    writer.write_all(&encoded.to_be_bytes())?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::{fixture, rstest};

    #[fixture]
    fn store() -> GraphStore {
        GraphStore::new(4, 5, 1.0, 3)
    }

    #[rstest]
    fn add_node_tracks_the_id_upper_bound(store: GraphStore) {
        store.add_node(7);
        store.add_node(2);
        assert_eq!(store.id_upper_bound(), 8);
        assert_eq!(store.size(), 2);
        assert!(store.neighbours(7).expect("node 7").is_empty());
    }

    #[rstest]
    fn first_writer_wins_the_initial_entry(store: GraphStore) {
        assert!(store.maybe_set_initial_entry(3));
        assert!(!store.maybe_set_initial_entry(4));
        assert_eq!(store.entry(), Some(3));
        store.update_entry(Some(4));
        assert_eq!(store.entry(), Some(4));
        store.update_entry(None);
        assert_eq!(store.entry(), None);
    }

    #[rstest]
    fn entries_are_deduplicated_across_labels(store: GraphStore) {
        store.maybe_set_initial_entry(1);
        store.maybe_set_initial_label_entry(1, 0);
        store.maybe_set_initial_label_entry(5, 2);
        assert!(!store.maybe_set_initial_label_entry(9, 99));
        assert_eq!(store.entries(), vec![1, 5]);
        assert_eq!(store.label_entry(1), None);
    }

    #[rstest]
    fn validate_entries_rejects_missing_nodes(store: GraphStore) {
        store.add_node(0);
        store.update_entry(Some(0));
        store.validate_entries().expect("entry registered");
        store.update_label_entry(1, Some(9));
        let err = store.validate_entries().expect_err("label entry missing");
        assert!(matches!(err, GraphError::GraphInvariantViolation { .. }));
    }

    #[rstest]
    fn soft_deletion_keeps_the_node_until_removed(store: GraphStore) {
        store.add_node(0);
        store.mark_deleted(0);
        assert!(store.contains_node(0));
        assert!(store.is_deleted(0));
        assert_eq!(store.deleted_nodes(), vec![0]);
        assert!(store.remove_node(0));
        assert!(!store.remove_node(0));
    }

    #[rstest]
    fn save_refuses_pending_deletions(store: GraphStore) {
        store.add_node(0);
        store.mark_deleted(0);
        let mut buffer = Vec::new();
        let err = store.save(&mut buffer).expect_err("pending deletion");
        assert!(matches!(err, GraphError::PendingDeletions { count: 1 }));
        assert!(buffer.is_empty());
    }

    #[rstest]
    fn save_writes_big_endian_adjacency(store: GraphStore) {
        store.add_loaded_node(0, vec![ScoredNode::new(1, 0.5)]);
        store.add_loaded_node(1, vec![ScoredNode::new(0, 0.5)]);
        store.update_entry(Some(1));
        let mut buffer = Vec::new();
        store.save(&mut buffer).expect("save");
        let words: Vec<i32> = buffer
            .chunks_exact(4)
            .map(|chunk| i32::from_be_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]))
            .collect();
        assert_eq!(words, vec![2, 1, 4, 0, 1, 1, 1, 1, 0]);
    }

    #[rstest]
    fn save_writes_unset_entry_as_minus_one(store: GraphStore) {
        let mut buffer = Vec::new();
        store.save(&mut buffer).expect("save");
        assert_eq!(buffer, [0, 0, 0, 0, 0xFF, 0xFF, 0xFF, 0xFF, 0, 0, 0, 4]);
    }

    #[rstest]
    fn save_rejects_ids_beyond_i32(store: GraphStore) {
        store.add_node(usize::try_from(i64::from(i32::MAX) + 1).expect("64-bit usize"));
        let mut buffer = Vec::new();
        let err = store.save(&mut buffer).expect_err("overflow");
        assert!(matches!(err, GraphError::NodeIdOverflow { .. }));
    }
}
