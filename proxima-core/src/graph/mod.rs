//! Concurrent proximity graph in the Vamana style.
//!
//! Nodes are linked to a diverse set of near neighbours chosen with the
//! alpha-relaxed robust prune. Insertions run concurrently: neighbour lists
//! are copy-on-write snapshots swapped atomically, and nodes whose insertion
//! is still in flight are scored directly so concurrent neighbours are not
//! missed. Deletions are soft until [`GraphBuilder::cleanup`] purges them.

mod builder;
mod connectivity;
mod error;
mod invariants;
mod neighbours;
mod params;
mod pool;
mod search;
mod store;
mod types;

pub use self::{
    builder::{CleanupReport, GraphBuilder},
    connectivity::ConnectivityReport,
    error::{GraphError, GraphErrorCode},
    invariants::{GraphInvariant, GraphInvariantChecker, GraphInvariantViolation},
    neighbours::{NeighbourSet, PairSimilarity},
    params::{
        DEFAULT_ALPHA, DEFAULT_ENTRY_REFRESH_INTERVAL, DEFAULT_LABEL_CAPACITY,
        DEFAULT_NEIGHBOUR_OVERFLOW, GraphParams, LowDimensionRepair,
    },
    pool::{Pooled, ViewPool},
    search::{
        AcceptAll, ApproximateScorer, Bits, Excluding, GraphSearcher, LabelPredicate,
        NodePredicate, PairScorer, QueryScorer, ReRanker, ScoreFunction, SearchRequest,
    },
    store::GraphStore,
    types::{ScoredNode, SearchResult},
};

#[cfg(test)]
mod tests;
