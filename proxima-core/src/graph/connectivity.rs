//! Reachability over directed neighbour edges.

use std::collections::VecDeque;

use super::store::GraphStore;

/// Outcome of a breadth-first walk from a set of entry points.
///
/// # Examples
/// ```
/// use proxima_core::{FlatVectors, GraphBuilder, GraphParams};
///
/// let vectors = FlatVectors::from_rows(vec![vec![0.0_f32], vec![1.0], vec![2.0]]).expect("rows");
/// let params = GraphParams::new(2, 8).expect("params");
/// let graph = GraphBuilder::new(vectors, params).expect("builder").build().expect("build");
/// let report = graph.connectivity();
/// assert!(report.is_connected());
/// assert_eq!(report.reachable(), 3);
/// ```
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct ConnectivityReport {
    scope: usize,
    reachable: usize,
    unreachable: Vec<usize>,
}

impl ConnectivityReport {
    /// Number of nodes considered by the walk.
    #[rustfmt::skip]
    #[must_use]
    pub fn scope(&self) -> usize { self.scope }

    /// Number of in-scope nodes reached from an entry point.
    #[rustfmt::skip]
    #[must_use]
    pub fn reachable(&self) -> usize { self.reachable }

    /// In-scope nodes no entry point reaches, in ascending order.
    #[rustfmt::skip]
    #[must_use]
    pub fn unreachable(&self) -> &[usize] { &self.unreachable }

    /// Returns `true` when every in-scope node was reached.
    #[must_use]
    pub fn is_connected(&self) -> bool {
        self.unreachable.is_empty()
    }
}

/// Walks outgoing edges from `entries`, staying within nodes accepted by
/// `in_scope`.
pub(crate) fn reachable_from(
    store: &GraphStore,
    entries: &[usize],
    in_scope: impl Fn(usize) -> bool,
) -> ConnectivityReport {
    let mut visited = vec![false; store.id_upper_bound()];
    let mut queue = VecDeque::new();
    let mut visit = |node: usize, queue: &mut VecDeque<usize>| {
        if let Some(seen) = visited.get_mut(node)
            && !*seen
        {
            *seen = true;
            queue.push_back(node);
        }
    };

    for &entry in entries {
        if store.contains_node(entry) && in_scope(entry) {
            visit(entry, &mut queue);
        }
    }
    while let Some(node) = queue.pop_front() {
        let Some(neighbours) = store.neighbours(node) else {
            continue;
        };
        for neighbour in neighbours.snapshot().iter() {
            if store.contains_node(neighbour.id) && in_scope(neighbour.id) {
                visit(neighbour.id, &mut queue);
            }
        }
    }

    let mut scope = 0;
    let mut unreachable = Vec::new();
    for id in store.node_ids() {
        if !in_scope(id) {
            continue;
        }
        scope += 1;
        if !visited.get(id).copied().unwrap_or(false) {
            unreachable.push(id);
        }
    }
    ConnectivityReport {
        scope,
        reachable: scope - unreachable.len(),
        unreachable,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::types::ScoredNode;

    fn edges(targets: &[usize]) -> Vec<ScoredNode> {
        targets.iter().map(|&id| ScoredNode::new(id, 0.5)).collect()
    }

    #[test]
    fn walk_follows_directed_edges_only() {
        let store = GraphStore::new(4, 4, 1.0, 0);
        store.add_loaded_node(0, edges(&[1]));
        store.add_loaded_node(1, edges(&[]));
        store.add_loaded_node(2, edges(&[0]));
        let report = reachable_from(&store, &[0], |_| true);
        assert_eq!(report.reachable(), 2);
        assert_eq!(report.unreachable(), &[2]);
        assert!(!report.is_connected());
    }

    #[test]
    fn scope_limits_traversal() {
        let store = GraphStore::new(4, 4, 1.0, 0);
        store.add_loaded_node(0, edges(&[1]));
        store.add_loaded_node(1, edges(&[2]));
        store.add_loaded_node(2, edges(&[]));
        let report = reachable_from(&store, &[0], |id| id != 1);
        assert_eq!(report.scope(), 2);
        assert_eq!(report.unreachable(), &[2]);
    }

    #[test]
    fn dangling_edges_are_ignored() {
        let store = GraphStore::new(4, 4, 1.0, 0);
        store.add_loaded_node(0, edges(&[7]));
        let report = reachable_from(&store, &[0], |_| true);
        assert!(report.is_connected());
        assert_eq!(report.scope(), 1);
    }
}
