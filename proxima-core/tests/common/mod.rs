use proxima_core::{
    AcceptAll, FlatVectors, GraphParams, GraphSearcher, GraphStore, QueryScorer,
    SearchRequest, SimilarityFunction, VectorSource,
};

#[must_use]
pub fn flat(rows: &[Vec<f32>]) -> FlatVectors<f32> {
    FlatVectors::from_rows(rows.to_vec()).expect("rows must share a dimension")
}

/// `max_connections` 10, beam 30 and alpha 1.4 over Euclidean similarity.
#[must_use]
pub fn recall_params() -> GraphParams {
    GraphParams::new(10, 30)
        .and_then(|params| params.with_alpha(1.4))
        .expect("params must be valid")
}

/// Searches `beam` candidates and returns the best `k` ids.
pub fn top_k<S: VectorSource<Element = f32>>(
    store: &GraphStore,
    vectors: &S,
    query: &[f32],
    k: usize,
    beam: usize,
) -> Vec<usize> {
    let mut view = vectors.copy();
    let mut scorer = QueryScorer::new(query, &mut view, SimilarityFunction::Euclidean);
    GraphSearcher::new(store)
        .search(&mut scorer, SearchRequest::new(beam).with_accept(&AcceptAll))
        .expect("search must succeed")
        .ids()
        .take(k)
        .collect()
}
