//! Shared builders and assertions for graph scenario tests.

use std::collections::BTreeSet;

use proxima_test_support::datasets::{unit_circle_at, uniform_vectors};

use crate::{
    graph::{
        AcceptAll, GraphBuilder, GraphParams, GraphSearcher, GraphStore, QueryScorer,
        SearchRequest,
    },
    labels::{LabelSource, NoLabels},
    similarity::SimilarityFunction,
    vectors::{FlatVectors, VectorSource},
};

pub(super) type Vectors = FlatVectors<f32>;

pub(super) fn flat(rows: Vec<Vec<f32>>) -> Vectors {
    FlatVectors::from_rows(rows).expect("rows must share a dimension")
}

pub(super) fn uniform(seed: u64, count: usize, dimension: usize) -> Vectors {
    flat(uniform_vectors(seed, count, dimension))
}

/// Points on the number line at `0, 1, .., count - 1`.
pub(super) fn line(count: usize) -> Vectors {
    flat((0..count).map(|i| vec![i as f32]).collect())
}

pub(super) fn params(max_connections: usize, beam_width: usize) -> GraphParams {
    GraphParams::new(max_connections, beam_width).expect("params must be valid")
}

/// Dot-product builder over unit vectors at fractions of π with
/// `max_connections` 2, full backlink overflow and no diversity relaxation.
pub(super) fn circle_builder(fractions: &[f32]) -> GraphBuilder<Vectors, NoLabels> {
    let params = params(2, 10)
        .with_alpha(1.0)
        .expect("alpha")
        .with_neighbour_overflow(1.0)
        .expect("overflow")
        .with_similarity(SimilarityFunction::DotProduct);
    GraphBuilder::new(flat(unit_circle_at(fractions)), params).expect("builder")
}

pub(super) fn insert_all<S: VectorSource, L: LabelSource>(builder: &GraphBuilder<S, L>, ids: impl IntoIterator<Item = usize>) {
    for id in ids {
        builder.add_node(id).expect("insert must succeed");
    }
}

pub(super) fn neighbour_ids(store: &GraphStore, node: usize) -> BTreeSet<usize> {
    store
        .neighbours(node)
        .expect("node must be present")
        .ids()
        .into_iter()
        .collect()
}

/// Every node's neighbour ids, in ascending node order.
pub(super) fn adjacency(store: &GraphStore) -> Vec<(usize, BTreeSet<usize>)> {
    store
        .node_ids()
        .into_iter()
        .map(|id| (id, neighbour_ids(store, id)))
        .collect()
}

/// Top-`k` ids for `query` searched from the store's entry points.
pub(super) fn search_ids(store: &GraphStore, vectors: &Vectors, query: &[f32], k: usize) -> Vec<usize> {
    let mut view = vectors.copy();
    let mut scorer = QueryScorer::new(query, &mut view, SimilarityFunction::Euclidean);
    let mut searcher = GraphSearcher::new(store);
    searcher
        .search(&mut scorer, SearchRequest::new(k).with_accept(&AcceptAll))
        .expect("search must succeed")
        .ids()
        .collect()
}

pub(super) fn assert_healthy(store: &GraphStore) {
    store
        .invariants()
        .check_all()
        .expect("cleaned-up graph must satisfy every invariant");
}
