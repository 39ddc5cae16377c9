//! Long-running graph use: concurrent growth, deletion, persistence and
//! labelled search through the public API.

mod common;

use std::thread;

use common::{flat, recall_params, top_k};
use proxima_core::{
    AcceptAll, DenseVectors, GraphBuilder, GraphError, GraphParams, GraphSearcher,
    InMemoryLabels, LabelPredicate, LabelSet, QueryScorer, SearchRequest, SimilarityFunction,
    VectorSource,
};
use proxima_test_support::datasets::{circle_points, uniform_vectors};
use rstest::rstest;

#[rstest]
#[case(2)]
#[case(4)]
fn vectors_appended_while_building_are_all_linked(#[case] writers: usize) {
    let rows = uniform_vectors(41, 240, 5);
    let vectors = DenseVectors::<f32>::new(5).expect("dimension");
    let builder = GraphBuilder::new(vectors.copy(), recall_params()).expect("builder");

    thread::scope(|scope| {
        for worker in 0..writers {
            let (builder, vectors, rows) = (&builder, &vectors, &rows);
            scope.spawn(move || {
                for row in rows.iter().skip(worker).step_by(writers) {
                    let id = vectors.push(row.clone()).expect("row");
                    builder.add_node(id).expect("insert");
                }
            });
        }
    });

    assert_eq!(builder.inserts_in_progress(), 0);
    assert_eq!(builder.graph().size(), rows.len());
    builder.cleanup().expect("cleanup");
    builder.graph().invariants().check_all().expect("healthy");

    let mut view = vectors.copy();
    let query = view.vector_value(17).expect("row 17").to_vec();
    assert_eq!(top_k(builder.graph(), &vectors, &query, 1, 30), vec![17]);
}

#[test]
fn deleted_nodes_stay_gone_across_a_snapshot() {
    let rows = uniform_vectors(53, 150, 3);
    let vectors = flat(&rows);
    let builder = GraphBuilder::new(vectors.clone(), recall_params()).expect("builder");
    for id in 0..rows.len() {
        builder.add_node(id).expect("insert");
    }
    let deleted: Vec<usize> = (0..rows.len()).step_by(5).collect();
    for &id in &deleted {
        builder.mark_node_deleted(id);
    }

    let mut bytes = Vec::new();
    let err = builder.graph().save(&mut bytes).expect_err("deletions pending");
    assert!(matches!(err, GraphError::PendingDeletions { count } if count == deleted.len()));

    builder.cleanup().expect("cleanup");
    bytes.clear();
    builder.graph().save(&mut bytes).expect("save");
    let restored = GraphBuilder::new(vectors.clone(), recall_params()).expect("builder");
    restored.load(&mut bytes.as_slice()).expect("load");
    restored.graph().invariants().check_all().expect("healthy");

    for &id in &deleted {
        assert!(!restored.graph().contains_node(id));
        let found = top_k(restored.graph(), &vectors, &rows[id], 5, 30);
        assert!(found.iter().all(|hit| hit % 5 != 0), "{found:?}");
        assert_eq!(found, top_k(builder.graph(), &vectors, &rows[id], 5, 30));
    }
}

#[test]
fn labelled_rings_are_searched_independently() {
    // Two concentric rings; label 0 marks the inner ring, label 1 the outer.
    let inner = circle_points(60, 1.0);
    let outer = circle_points(60, 1.5);
    let rows: Vec<Vec<f32>> = inner.into_iter().chain(outer).collect();
    let labels = InMemoryLabels::default();
    for id in 0..rows.len() {
        labels.put(id, LabelSet::single(usize::from(id >= 60)));
    }
    let vectors = flat(&rows);
    let params = GraphParams::new(4, 24)
        .and_then(|params| params.with_label_capacity(2))
        .expect("params");
    let builder = GraphBuilder::with_labels(vectors.clone(), labels.clone(), params).expect("builder");
    for id in 0..rows.len() {
        builder.add_node(id).expect("insert");
    }
    builder.cleanup().expect("cleanup");
    assert_eq!(builder.label_population(1).expect("population"), 60);
    for label in 0..2 {
        assert!(builder.label_connectivity(label).expect("report").is_connected());
    }

    // A query on the outer ring, searched within the inner ring, lands on the
    // inner point at the same angle.
    let query = &rows[75];
    let entries: Vec<usize> = builder.graph().label_entry(0).into_iter().collect();
    let predicate = LabelPredicate::containing(&labels, 0);
    let mut view = vectors.copy();
    let mut scorer = QueryScorer::new(query, &mut view, SimilarityFunction::Euclidean);
    let found: Vec<usize> = GraphSearcher::new(builder.graph())
        .search(
            &mut scorer,
            SearchRequest::new(10)
                .with_accept(&AcceptAll)
                .with_predicate(&predicate)
                .with_entries(&entries),
        )
        .expect("search")
        .ids()
        .collect();
    assert_eq!(found.first(), Some(&15));
    assert!(found.iter().all(|&id| id < 60), "{found:?}");
}

#[test]
fn builds_are_reproducible_for_a_fixed_insertion_order() {
    let rows = uniform_vectors(61, 90, 4);
    let snapshot = || {
        let builder = GraphBuilder::new(flat(&rows), recall_params()).expect("builder");
        for id in 0..rows.len() {
            builder.add_node(id).expect("insert");
        }
        builder.cleanup().expect("cleanup");
        let mut bytes = Vec::new();
        builder.graph().save(&mut bytes).expect("save");
        bytes
    };
    assert_eq!(snapshot(), snapshot());
}
