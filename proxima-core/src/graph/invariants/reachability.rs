//! Every registered node must be reachable from some entry point by
//! following outgoing edges.

use super::{EvaluationMode, GraphInvariantViolation, GraphStore};

pub(super) fn check_reachability(
    store: &GraphStore,
    mode: &mut EvaluationMode<'_>,
) -> Result<(), GraphInvariantViolation> {
    if store.is_empty() {
        return Ok(());
    }
    if store.entries().is_empty() {
        return mode.record(GraphInvariantViolation::MissingEntryPoint);
    }
    let report = store.connectivity();
    for &node in report.unreachable() {
        mode.record(GraphInvariantViolation::UnreachableNode { node })?;
    }
    Ok(())
}
