use super::{EvaluationMode, GraphInvariantViolation, GraphStore};

pub(super) fn check_degree_bounds(
    store: &GraphStore,
    mode: &mut EvaluationMode<'_>,
) -> Result<(), GraphInvariantViolation> {
    let limit = store.max_degree();
    for node in store.node_ids() {
        let degree = store.neighbours(node).map_or(0, |n| n.len());
        if degree > limit {
            mode.record(GraphInvariantViolation::DegreeBounds {
                node,
                degree,
                limit,
            })?;
        }
    }
    Ok(())
}
