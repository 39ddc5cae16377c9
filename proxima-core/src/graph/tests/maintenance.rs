//! Deletion purge, trimming and orphan reconnection.

use dashmap::DashSet;
use rstest::rstest;

use crate::graph::{
    CleanupReport, GraphBuilder, GraphError, GraphInvariant, GraphInvariantViolation,
};

use super::fixtures::{assert_healthy, insert_all, line, params, search_ids, uniform};

#[test]
fn cleanup_of_an_empty_graph_reports_nothing() {
    let builder = GraphBuilder::new(line(3), params(2, 8)).expect("builder");
    assert_eq!(builder.cleanup().expect("cleanup"), CleanupReport::default());
}

#[rstest]
#[case(&[3])]
#[case(&[0, 1, 2])]
#[case(&[5, 9, 14, 15])]
fn deleted_nodes_disappear_from_store_and_results(#[case] deleted: &[usize]) {
    let vectors = line(20);
    let builder = GraphBuilder::new(vectors.clone(), params(2, 16)).expect("builder");
    insert_all(&builder, 0..20);
    for &id in deleted {
        builder.mark_node_deleted(id);
    }
    let report = builder.cleanup().expect("cleanup");
    assert_eq!(report.purged(), deleted.len());

    let graph = builder.graph();
    assert_eq!(graph.size(), 20 - deleted.len());
    assert_eq!(graph.deleted_count(), 0);
    for id in graph.node_ids() {
        let neighbours = graph.neighbours(id).expect("live node");
        assert!(deleted.iter().all(|gone| !neighbours.contains(*gone)), "node {id}");
    }
    assert_healthy(graph);
    for &id in deleted {
        let found = search_ids(graph, &vectors, &[id as f32], 5);
        assert!(found.iter().all(|hit| !deleted.contains(hit)), "{found:?}");
    }
}

#[test]
fn deleted_nodes_are_hidden_before_cleanup() {
    let vectors = line(10);
    let builder = GraphBuilder::new(vectors.clone(), params(2, 16)).expect("builder");
    insert_all(&builder, 0..10);
    builder.mark_node_deleted(4);
    let found = search_ids(builder.graph(), &vectors, &[4.0], 3);
    assert!(!found.contains(&4), "{found:?}");
    assert!(builder.graph().contains_node(4));
    assert_eq!(builder.graph().size(), 10);
    assert_eq!(builder.graph().deleted_count(), 1);
}

#[test]
fn deleting_the_entry_point_moves_it_to_a_live_node() {
    let builder = GraphBuilder::new(line(12), params(2, 16)).expect("builder");
    insert_all(&builder, 0..12);
    let entry = builder.graph().entry().expect("entry");
    builder.mark_node_deleted(entry);
    let report = builder.cleanup().expect("cleanup");
    let replacement = builder.graph().entry().expect("replacement entry");
    assert_ne!(replacement, entry);
    assert!(builder.graph().contains_node(replacement));
    assert_eq!(report.entries(), &[replacement]);
}

#[test]
fn deleting_every_node_empties_the_graph() {
    let builder = GraphBuilder::new(line(4), params(2, 8)).expect("builder");
    insert_all(&builder, 0..4);
    for id in 0..4 {
        builder.mark_node_deleted(id);
    }
    let report = builder.cleanup().expect("cleanup");
    assert_eq!(report.purged(), 4);
    assert!(builder.graph().is_empty());
    assert_eq!(builder.graph().entry(), None);
}

#[test]
fn deleting_an_unknown_node_fails_cleanup() {
    let builder = GraphBuilder::new(line(4), params(2, 8)).expect("builder");
    insert_all(&builder, 0..3);
    builder.mark_node_deleted(3);
    let err = builder.cleanup().expect_err("node 3 was never inserted");
    assert!(matches!(err, GraphError::GraphInvariantViolation { .. }));
}

#[test]
fn cleanup_trims_backlink_overflow() {
    let params = params(2, 16).with_neighbour_overflow(1.0).expect("overflow");
    let builder = GraphBuilder::new(uniform(17, 200, 3), params).expect("builder");
    insert_all(&builder, 0..200);
    let report = builder.cleanup().expect("cleanup");
    builder
        .graph()
        .invariants()
        .check(GraphInvariant::DegreeBounds)
        .expect("lists must be trimmed to the maximum degree");
    assert!(report.trimmed() <= builder.graph().size());
}

#[test]
fn cleanup_reconnects_orphans() {
    let builder = GraphBuilder::new(line(8), params(2, 16)).expect("builder");
    insert_all(&builder, 0..8);
    let cut: DashSet<usize> = [7].into_iter().collect();
    for id in builder.graph().node_ids() {
        if let Some(neighbours) = builder.graph().neighbours(id) {
            neighbours.remove_deleted_neighbours(&cut);
        }
    }
    let violations = builder
        .graph()
        .invariants()
        .collect_many([GraphInvariant::Reachability]);
    assert!(violations.contains(&GraphInvariantViolation::UnreachableNode { node: 7 }));

    let report = builder.cleanup().expect("cleanup");
    assert!(report.reconnected() >= 1);
    assert_eq!(report.reconnect_passes().last(), Some(&0));
    assert!(builder.graph().connectivity().is_connected());
}

#[test]
fn repeated_cleanup_is_stable() {
    let builder = GraphBuilder::new(uniform(23, 90, 4), params(3, 20)).expect("builder");
    insert_all(&builder, 0..90);
    builder.cleanup().expect("first cleanup");
    let second = builder.cleanup().expect("second cleanup");
    assert_eq!(second.purged(), 0);
    assert_eq!(second.affected(), 0);
    assert_healthy(builder.graph());
}

#[test]
fn purge_pads_sparse_lists_that_lost_no_edges() {
    let builder = GraphBuilder::new(line(12), params(2, 16)).expect("builder");
    insert_all(&builder, 0..12);
    let graph = builder.graph();
    let unlinked: DashSet<usize> = [11].into_iter().collect();
    for id in graph.node_ids() {
        if let Some(neighbours) = graph.neighbours(id) {
            neighbours.remove_deleted_neighbours(&unlinked);
        }
    }
    let sparse: DashSet<usize> = (2..12).collect();
    graph
        .neighbours(0)
        .expect("node 0")
        .remove_deleted_neighbours(&sparse);
    assert_eq!(graph.neighbours(0).expect("node 0").ids(), vec![1]);

    // No live list points at node 11, so nothing is stripped by the purge.
    builder.mark_node_deleted(11);
    let report = builder.cleanup().expect("cleanup");
    assert_eq!(report.purged(), 1);
    assert!(report.padded() >= 1, "{report:?}");
    assert!(report.affected() >= 1, "{report:?}");
    assert_healthy(builder.graph());
}
