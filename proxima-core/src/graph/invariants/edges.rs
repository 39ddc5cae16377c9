use std::collections::HashSet;

use super::{EvaluationMode, GraphInvariantViolation, GraphStore};

pub(super) fn check_dangling_edges(
    store: &GraphStore,
    mode: &mut EvaluationMode<'_>,
) -> Result<(), GraphInvariantViolation> {
    let mut seen = HashSet::new();
    for origin in store.node_ids() {
        let Some(neighbours) = store.neighbours(origin) else {
            continue;
        };
        seen.clear();
        for neighbour in neighbours.snapshot().iter() {
            let target = neighbour.id;
            if target == origin {
                mode.record(GraphInvariantViolation::SelfLoop { node: origin })?;
            } else if !store.contains_node(target) {
                mode.record(GraphInvariantViolation::DanglingEdge { origin, target })?;
            }
            if !seen.insert(target) {
                mode.record(GraphInvariantViolation::DuplicateNeighbour { origin, target })?;
            }
        }
    }
    Ok(())
}
