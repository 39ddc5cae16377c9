//! Heap usage estimates for callers budgeting graph memory.
//!
//! The figures are approximations: they count the structures the graph owns
//! and ignore allocator slack and hash-map load factor.

use std::{
    mem::size_of,
    sync::{Arc, atomic::AtomicUsize},
};

use crate::graph::{NeighbourSet, ScoredNode};

/// Reference counts stored ahead of every `Arc` allocation.
const ARC_COUNTS_BYTES: usize = 2 * size_of::<usize>();
/// Pointer, capacity and length of a `Vec`.
const VEC_HEADER_BYTES: usize = 3 * size_of::<usize>();
/// Key plus `Arc` pointer held by one store map entry.
const MAP_ENTRY_BYTES: usize = size_of::<usize>() + size_of::<Arc<NeighbourSet>>();
/// Fixed footprint of a store: maps, deleted set, counters and entry slot.
const STORE_BASE_BYTES: usize = 512;

/// Estimates the heap bytes held by one node whose neighbour list may grow to
/// `capacity` entries.
///
/// # Examples
/// ```
/// use proxima_core::memory::estimate_node_bytes;
///
/// assert!(estimate_node_bytes(32) > estimate_node_bytes(16));
/// ```
#[must_use]
pub const fn estimate_node_bytes(capacity: usize) -> usize {
    let set = ARC_COUNTS_BYTES + size_of::<NeighbourSet>();
    let snapshot = ARC_COUNTS_BYTES + VEC_HEADER_BYTES + capacity * size_of::<ScoredNode>();
    MAP_ENTRY_BYTES + set + snapshot
}

/// Estimates the heap bytes held by a store of `nodes` nodes with
/// `label_slots` label entry points.
#[must_use]
pub const fn estimate_graph_bytes(nodes: usize, capacity: usize, label_slots: usize) -> usize {
    STORE_BASE_BYTES + nodes * estimate_node_bytes(capacity) + label_slots * size_of::<AtomicUsize>()
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(0)]
    #[case(8)]
    #[case(64)]
    fn node_estimate_grows_with_capacity(#[case] capacity: usize) {
        let delta = estimate_node_bytes(capacity + 1) - estimate_node_bytes(capacity);
        assert_eq!(delta, size_of::<ScoredNode>());
    }

    #[test]
    fn graph_estimate_counts_every_node() {
        let empty = estimate_graph_bytes(0, 8, 0);
        let ten = estimate_graph_bytes(10, 8, 0);
        assert_eq!(ten - empty, 10 * estimate_node_bytes(8));
    }
}
