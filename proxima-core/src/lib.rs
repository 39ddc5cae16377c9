//! Proxima core library.
//!
//! Builds and searches approximate-nearest-neighbour proximity graphs over
//! caller-supplied vectors. Construction is incremental and safe to drive from
//! many threads; [`GraphBuilder::cleanup`] restores the degree bound and
//! connectivity after deletions and concurrent insertion.
#![cfg_attr(docsrs, feature(doc_cfg))]

mod error;
mod graph;
mod labels;
pub mod memory;
mod similarity;
mod vectors;

pub use crate::{
    error::{SourceError, SourceErrorCode},
    graph::{
        AcceptAll, ApproximateScorer, Bits, CleanupReport, ConnectivityReport, DEFAULT_ALPHA,
        DEFAULT_ENTRY_REFRESH_INTERVAL, DEFAULT_LABEL_CAPACITY, DEFAULT_NEIGHBOUR_OVERFLOW,
        Excluding, GraphBuilder, GraphError, GraphErrorCode, GraphInvariant,
        GraphInvariantChecker, GraphInvariantViolation, GraphParams, GraphSearcher, GraphStore,
        LabelPredicate, LowDimensionRepair, NeighbourSet, NodePredicate, PairScorer,
        PairSimilarity, Pooled, QueryScorer, ReRanker, ScoreFunction, ScoredNode, SearchRequest,
        SearchResult, ViewPool,
    },
    labels::{InMemoryLabels, LabelSet, LabelSource, NoLabels},
    similarity::{SimilarityFunction, VectorElement},
    vectors::{DenseVectors, FlatVectors, VectorSource},
};
