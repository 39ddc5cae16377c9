//! Tests for the invariant checker against hand-built graphs.

use rstest::{fixture, rstest};

use super::*;
use crate::graph::types::ScoredNode;

fn edges(targets: &[usize]) -> Vec<ScoredNode> {
    targets.iter().map(|&id| ScoredNode::new(id, 0.5)).collect()
}

/// Triangle 0 -> 1 -> 2 -> 0 with degree bound 2.
#[fixture]
fn triangle() -> GraphStore {
    let store = GraphStore::new(2, 3, 1.0, 0);
    store.add_loaded_node(0, edges(&[1]));
    store.add_loaded_node(1, edges(&[2]));
    store.add_loaded_node(2, edges(&[0]));
    store.update_entry(Some(0));
    store
}

#[rstest]
fn healthy_graphs_pass_every_check(triangle: GraphStore) {
    triangle.invariants().check_all().expect("graph valid");
    assert!(triangle.invariants().collect_all().is_empty());
}

#[test]
fn empty_graphs_pass_every_check() {
    let store = GraphStore::new(2, 3, 1.0, 0);
    store.invariants().check_all().expect("empty graph valid");
}

#[rstest]
fn oversized_lists_break_degree_bounds(triangle: GraphStore) {
    triangle.add_loaded_node(3, edges(&[0, 1, 2]));
    triangle
        .neighbours(2)
        .expect("node 2")
        .insert_not_diverse(3, 0.9, true, 3);
    let err = triangle
        .invariants()
        .check(GraphInvariant::DegreeBounds)
        .expect_err("node 3 overflows");
    assert_eq!(
        err,
        GraphInvariantViolation::DegreeBounds {
            node: 3,
            degree: 3,
            limit: 2
        }
    );
}

#[rstest]
#[case::dangling(&[9], GraphInvariantViolation::DanglingEdge { origin: 0, target: 9 })]
#[case::self_loop(&[0], GraphInvariantViolation::SelfLoop { node: 0 })]
#[case::duplicate(&[1, 1], GraphInvariantViolation::DuplicateNeighbour { origin: 0, target: 1 })]
fn corrupt_edges_are_reported(
    triangle: GraphStore,
    #[case] targets: &[usize],
    #[case] expected: GraphInvariantViolation,
) {
    assert!(triangle.remove_node(0));
    triangle.add_loaded_node(0, edges(targets));
    let err = triangle
        .invariants()
        .check(GraphInvariant::DanglingEdges)
        .expect_err("corrupt edge");
    assert_eq!(err, expected);
}

#[rstest]
fn stale_and_missing_entries_are_reported(triangle: GraphStore) {
    triangle.update_entry(Some(7));
    assert_eq!(
        triangle.invariants().check(GraphInvariant::EntryPoints),
        Err(GraphInvariantViolation::StaleEntryPoint { node: 7 })
    );
    triangle.update_entry(None);
    assert_eq!(
        triangle.invariants().check(GraphInvariant::EntryPoints),
        Err(GraphInvariantViolation::MissingEntryPoint)
    );
}

#[rstest]
fn reachability_collects_all_orphans(triangle: GraphStore) {
    triangle.add_loaded_node(3, edges(&[0]));
    triangle.add_loaded_node(4, edges(&[3]));
    let violations = triangle
        .invariants()
        .collect_many([GraphInvariant::Reachability]);
    assert_eq!(
        violations,
        vec![
            GraphInvariantViolation::UnreachableNode { node: 3 },
            GraphInvariantViolation::UnreachableNode { node: 4 },
        ]
    );
}

#[test]
fn invariants_are_listed_once() {
    let all = GraphInvariant::all();
    for (index, invariant) in all.iter().enumerate() {
        assert!(!all[index + 1..].contains(invariant));
    }
}
