//! Tracking of insertions that have registered a node but not finished
//! linking it.

use std::{collections::BTreeSet, sync::Mutex};

use crate::graph::error::GraphError;

const RESOURCE: &str = "in-flight insertion set";

#[derive(Debug, Default)]
pub(super) struct InFlight {
    ids: Mutex<BTreeSet<usize>>,
}

impl InFlight {
    /// Registers `id` and returns a guard that removes it on drop, together
    /// with a snapshot of the other insertions running at that moment.
    pub(super) fn begin(&self, id: usize) -> Result<(InFlightGuard<'_>, Vec<usize>), GraphError> {
        let mut ids = self
            .ids
            .lock()
            .map_err(|_| GraphError::LockPoisoned { resource: RESOURCE })?;
        ids.insert(id);
        let others = ids.iter().copied().filter(|other| *other != id).collect();
        Ok((InFlightGuard { owner: self, id }, others))
    }

    pub(super) fn contains(&self, id: usize) -> Result<bool, GraphError> {
        self.ids
            .lock()
            .map(|ids| ids.contains(&id))
            .map_err(|_| GraphError::LockPoisoned { resource: RESOURCE })
    }

    pub(super) fn len(&self) -> usize {
        match self.ids.lock() {
            Ok(ids) => ids.len(),
            Err(poisoned) => poisoned.into_inner().len(),
        }
    }
}

/// Removes its id from the in-flight set when dropped, including on error
/// paths.
#[derive(Debug)]
pub(super) struct InFlightGuard<'a> {
    owner: &'a InFlight,
    id: usize,
}

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        let mut ids = match self.owner.ids.lock() {
            Ok(ids) => ids,
            Err(poisoned) => poisoned.into_inner(),
        };
        ids.remove(&self.id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn snapshot_lists_other_insertions() {
        let in_flight = InFlight::default();
        let (first, before_first) = in_flight.begin(3).expect("begin 3");
        assert!(before_first.is_empty());
        let (second, before_second) = in_flight.begin(1).expect("begin 1");
        assert_eq!(before_second, vec![3]);
        assert_eq!(in_flight.len(), 2);
        drop(first);
        assert!(!in_flight.contains(3).expect("lock"));
        drop(second);
        assert_eq!(in_flight.len(), 0);
    }

    #[test]
    fn guard_releases_on_early_return() {
        fn failing(in_flight: &InFlight) -> Result<(), GraphError> {
            let (_guard, _) = in_flight.begin(9)?;
            Err(GraphError::MissingAcceptFilter)
        }
        let in_flight = InFlight::default();
        assert!(failing(&in_flight).is_err());
        assert_eq!(in_flight.len(), 0);
    }
}
