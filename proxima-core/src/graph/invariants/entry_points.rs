use super::{EvaluationMode, GraphInvariantViolation, GraphStore};

pub(super) fn check_entry_points(
    store: &GraphStore,
    mode: &mut EvaluationMode<'_>,
) -> Result<(), GraphInvariantViolation> {
    let entries = store.entries();
    if entries.is_empty() {
        if !store.is_empty() {
            mode.record(GraphInvariantViolation::MissingEntryPoint)?;
        }
        return Ok(());
    }
    for node in entries {
        if !store.contains_node(node) {
            mode.record(GraphInvariantViolation::StaleEntryPoint { node })?;
        }
    }
    Ok(())
}
