//! Structural invariant checks for the proximity graph.
//!
//! The checker is surfaced via [`GraphStore::invariants`] so tests can assert
//! graph health after each operation without reimplementing traversal logic.

mod degree_bounds;
mod edges;
mod entry_points;
mod reachability;

use thiserror::Error;

use super::store::GraphStore;

use self::{
    degree_bounds::check_degree_bounds, edges::check_dangling_edges,
    entry_points::check_entry_points, reachability::check_reachability,
};

/// Enumerates the structural invariants of a cleaned-up graph.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum GraphInvariant {
    /// Every neighbour list holds at most `max_degree` entries.
    DegreeBounds,
    /// Every edge targets a registered node other than its source, and no
    /// list repeats an id.
    DanglingEdges,
    /// A populated graph has entry points, and each references a registered
    /// node.
    EntryPoints,
    /// Every registered node is reachable from some entry point.
    Reachability,
}

impl GraphInvariant {
    /// Returns all invariants in the order they should be evaluated.
    #[must_use]
    pub const fn all() -> [Self; 4] {
        [
            Self::EntryPoints,
            Self::DanglingEdges,
            Self::DegreeBounds,
            Self::Reachability,
        ]
    }
}

/// Reports an invariant violation surfaced by [`GraphInvariantChecker`].
#[derive(Clone, Debug, Error, Eq, PartialEq)]
pub enum GraphInvariantViolation {
    /// A neighbour list exceeded the degree bound.
    #[error("node {node} has {degree} neighbour(s), exceeding limit {limit}")]
    DegreeBounds {
        /// Node whose list is too long.
        node: usize,
        /// Actual number of neighbours.
        degree: usize,
        /// Maximum permitted neighbours.
        limit: usize,
    },
    /// An edge targets a node that is not registered.
    #[error("node {origin} references missing node {target}")]
    DanglingEdge {
        /// Node holding the edge.
        origin: usize,
        /// Missing target.
        target: usize,
    },
    /// A node lists itself as a neighbour.
    #[error("node {node} lists itself as a neighbour")]
    SelfLoop {
        /// Offending node.
        node: usize,
    },
    /// A neighbour list repeats an id.
    #[error("node {origin} lists neighbour {target} more than once")]
    DuplicateNeighbour {
        /// Node holding the list.
        origin: usize,
        /// Repeated neighbour.
        target: usize,
    },
    /// A populated graph lacks an entry point.
    #[error("graph entry point missing despite populated nodes")]
    MissingEntryPoint,
    /// An entry point references a node that is not registered.
    #[error("entry point {node} is not registered")]
    StaleEntryPoint {
        /// Entry id.
        node: usize,
    },
    /// A node cannot be reached from any entry point.
    #[error("node {node} is unreachable from the entry points")]
    UnreachableNode {
        /// Identifier of the unreachable node.
        node: usize,
    },
}

/// Helper returned by [`GraphStore::invariants`] to run structural checks.
#[derive(Debug)]
pub struct GraphInvariantChecker<'graph> {
    store: &'graph GraphStore,
}

impl<'graph> GraphInvariantChecker<'graph> {
    pub(crate) fn new(store: &'graph GraphStore) -> Self {
        Self { store }
    }

    /// Runs all invariants, returning the first violation encountered.
    ///
    /// # Errors
    /// Returns the first [`GraphInvariantViolation`] found.
    pub fn check_all(&self) -> Result<(), GraphInvariantViolation> {
        self.check_many(GraphInvariant::all())
    }

    /// Runs a custom subset of invariants in the provided order.
    ///
    /// # Errors
    /// Returns the first [`GraphInvariantViolation`] found.
    pub fn check_many(
        &self,
        invariants: impl IntoIterator<Item = GraphInvariant>,
    ) -> Result<(), GraphInvariantViolation> {
        self.run_with_mode(invariants, &mut EvaluationMode::FailFast)
    }

    /// Runs a single invariant.
    ///
    /// # Errors
    /// Returns the first [`GraphInvariantViolation`] found.
    pub fn check(&self, invariant: GraphInvariant) -> Result<(), GraphInvariantViolation> {
        self.check_many([invariant])
    }

    /// Executes every invariant and returns the full set of violations.
    #[must_use]
    pub fn collect_all(&self) -> Vec<GraphInvariantViolation> {
        self.collect_many(GraphInvariant::all())
    }

    /// Executes the selected invariants and returns every violation found.
    #[must_use]
    pub fn collect_many(
        &self,
        invariants: impl IntoIterator<Item = GraphInvariant>,
    ) -> Vec<GraphInvariantViolation> {
        let mut violations = Vec::new();
        let _ = self.run_with_mode(invariants, &mut EvaluationMode::Collect(&mut violations));
        violations
    }

    fn run_with_mode(
        &self,
        invariants: impl IntoIterator<Item = GraphInvariant>,
        mode: &mut EvaluationMode<'_>,
    ) -> Result<(), GraphInvariantViolation> {
        for invariant in invariants {
            dispatch(self.store, invariant, mode)?;
        }
        Ok(())
    }
}

fn dispatch(
    store: &GraphStore,
    invariant: GraphInvariant,
    mode: &mut EvaluationMode<'_>,
) -> Result<(), GraphInvariantViolation> {
    match invariant {
        GraphInvariant::DegreeBounds => check_degree_bounds(store, mode),
        GraphInvariant::DanglingEdges => check_dangling_edges(store, mode),
        GraphInvariant::EntryPoints => check_entry_points(store, mode),
        GraphInvariant::Reachability => check_reachability(store, mode),
    }
}

pub(super) enum EvaluationMode<'a> {
    FailFast,
    Collect(&'a mut Vec<GraphInvariantViolation>),
}

impl EvaluationMode<'_> {
    fn record(&mut self, violation: GraphInvariantViolation) -> Result<(), GraphInvariantViolation> {
        match self {
            Self::FailFast => Err(violation),
            Self::Collect(sink) => {
                sink.push(violation);
                Ok(())
            }
        }
    }
}

#[cfg(test)]
mod tests;
