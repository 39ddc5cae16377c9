//! Error types produced by graph construction, search and persistence.

use std::{fmt, io, sync::Arc};

use thiserror::Error;

use crate::error::{SourceError, define_error_codes};

/// Errors produced by the proximity graph.
#[derive(Clone, Debug, Error)]
#[non_exhaustive]
pub enum GraphError {
    /// Parameters were invalid for the current configuration.
    #[error("invalid graph parameter: {reason}")]
    InvalidParameters { reason: String },
    /// A snapshot was loaded into a graph that already holds nodes.
    #[error("cannot load a snapshot into a graph holding {size} node(s)")]
    NonEmptyGraph { size: usize },
    /// The graph was saved while soft-deleted nodes were still present.
    #[error("cannot save a graph with {count} pending deletion(s); run cleanup first")]
    PendingDeletions { count: usize },
    /// A search was issued without an accept filter.
    #[error("search requires an explicit accept filter")]
    MissingAcceptFilter,
    /// An approximate score function was supplied without a re-ranker.
    #[error("approximate score functions require a re-ranker")]
    InexactScoreWithoutReRanker,
    /// A label operation was issued against a graph built without labels.
    #[error("graph was built without a label source")]
    UnlabelledGraph,
    /// A node carried a label beyond the configured label capacity.
    #[error("label {label} exceeds the configured label capacity of {capacity}")]
    LabelOutOfRange { label: usize, capacity: usize },
    /// A fixed-capacity visited set met a node id it cannot track.
    #[error("node {node} exceeds the visited-set capacity of {capacity}; use a concurrent searcher")]
    VisitedCapacityExceeded { node: usize, capacity: usize },
    /// Attempted to operate on an inconsistent graph state.
    #[error("graph invariant violated: {message}")]
    GraphInvariantViolation { message: String },
    /// A shared lock was poisoned by a panicking thread.
    #[error("{resource} lock poisoned")]
    LockPoisoned { resource: &'static str },
    /// A node id cannot be represented in the snapshot format.
    #[error("node id {node} does not fit the 32-bit snapshot format")]
    NodeIdOverflow { node: usize },
    /// A snapshot could not be decoded.
    #[error("malformed snapshot: {reason}")]
    MalformedSnapshot { reason: String },
    /// Snapshot I/O failed.
    #[error("snapshot I/O failed: {0}")]
    Io(#[source] Arc<io::Error>),
    /// Wrapped [`SourceError`].
    #[error("source failure: {0}")]
    Source(#[from] SourceError),
}

impl From<io::Error> for GraphError {
    fn from(error: io::Error) -> Self {
        Self::Io(Arc::new(error))
    }
}

impl GraphError {
    pub(crate) fn invariant(message: impl Into<String>) -> Self {
        Self::GraphInvariantViolation {
            message: message.into(),
        }
    }
}

define_error_codes! {
    /// Stable codes describing [`GraphError`] variants.
    enum GraphErrorCode for GraphError {
        /// Parameters were invalid for the current configuration.
        InvalidParameters => InvalidParameters { .. } => "GRAPH_INVALID_PARAMETERS",
        /// A snapshot was loaded into a populated graph.
        NonEmptyGraph => NonEmptyGraph { .. } => "GRAPH_NON_EMPTY",
        /// The graph was saved with pending deletions.
        PendingDeletions => PendingDeletions { .. } => "GRAPH_PENDING_DELETIONS",
        /// A search was issued without an accept filter.
        MissingAcceptFilter => MissingAcceptFilter => "GRAPH_MISSING_ACCEPT_FILTER",
        /// An approximate score function lacked a re-ranker.
        InexactScoreWithoutReRanker => InexactScoreWithoutReRanker => "GRAPH_INEXACT_SCORE_WITHOUT_RERANKER",
        /// A label operation targeted an unlabelled graph.
        UnlabelledGraph => UnlabelledGraph => "GRAPH_UNLABELLED",
        /// A label exceeded the configured capacity.
        LabelOutOfRange => LabelOutOfRange { .. } => "GRAPH_LABEL_OUT_OF_RANGE",
        /// A fixed visited set overflowed.
        VisitedCapacityExceeded => VisitedCapacityExceeded { .. } => "GRAPH_VISITED_CAPACITY_EXCEEDED",
        /// An internal invariant was violated.
        GraphInvariantViolation => GraphInvariantViolation { .. } => "GRAPH_INVARIANT_VIOLATION",
        /// A shared lock was poisoned.
        LockPoisoned => LockPoisoned { .. } => "GRAPH_LOCK_POISONED",
        /// A node id overflowed the snapshot format.
        NodeIdOverflow => NodeIdOverflow { .. } => "GRAPH_NODE_ID_OVERFLOW",
        /// A snapshot could not be decoded.
        MalformedSnapshot => MalformedSnapshot { .. } => "GRAPH_MALFORMED_SNAPSHOT",
        /// Snapshot I/O failed.
        Io => Io(..) => "GRAPH_IO",
        /// A vector or label source failed.
        Source => Source(..) => "GRAPH_SOURCE",
    }
}
