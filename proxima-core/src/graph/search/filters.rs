//! Accept filters and traversal predicates.

use crate::labels::{LabelSet, LabelSource};

use super::super::error::GraphError;

/// Accept filter deciding which nodes may appear in a result set.
///
/// Rejected nodes are still traversed. Searches require an explicit filter;
/// pass [`AcceptAll`] to accept every live node.
pub trait Bits {
    /// Returns `true` when `node` may be returned.
    fn get(&self, node: usize) -> bool;
}

/// Filter accepting every node.
#[derive(Clone, Copy, Debug, Default)]
pub struct AcceptAll;

impl Bits for AcceptAll {
    #[rustfmt::skip]
    fn get(&self, _node: usize) -> bool { true }
}

/// Filter rejecting a single node.
#[derive(Clone, Copy, Debug)]
pub struct Excluding(pub usize);

impl Bits for Excluding {
    fn get(&self, node: usize) -> bool {
        node != self.0
    }
}

impl<F> Bits for F
where
    F: Fn(usize) -> bool,
{
    fn get(&self, node: usize) -> bool {
        self(node)
    }
}

/// Traversal predicate: nodes failing it are neither scored nor expanded.
pub trait NodePredicate {
    /// Returns `true` when `node` may be visited.
    ///
    /// # Errors
    /// Returns [`GraphError`] when the node's attributes cannot be read.
    fn test(&self, node: usize) -> Result<bool, GraphError>;
}

#[derive(Clone, Debug)]
enum LabelMatch {
    Overlaps(LabelSet),
    Contains(usize),
}

/// Restricts traversal to nodes whose labels match.
#[derive(Clone, Debug)]
pub struct LabelPredicate<'src, L> {
    source: &'src L,
    matcher: LabelMatch,
}

impl<'src, L: LabelSource> LabelPredicate<'src, L> {
    /// Accepts nodes sharing at least one label with `labels`.
    #[must_use]
    pub fn overlapping(source: &'src L, labels: LabelSet) -> Self {
        Self {
            source,
            matcher: LabelMatch::Overlaps(labels),
        }
    }

    /// Accepts nodes carrying `label`.
    #[must_use]
    pub fn containing(source: &'src L, label: usize) -> Self {
        Self {
            source,
            matcher: LabelMatch::Contains(label),
        }
    }
}

impl<L: LabelSource> NodePredicate for LabelPredicate<'_, L> {
    fn test(&self, node: usize) -> Result<bool, GraphError> {
        let labels = self.source.labels_of(node)?;
        Ok(match &self.matcher {
            LabelMatch::Overlaps(wanted) => labels.contains_any(wanted),
            LabelMatch::Contains(label) => labels.contains(*label),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::labels::InMemoryLabels;
    use rstest::rstest;

    #[test]
    fn closures_act_as_accept_filters() {
        let even = |node: usize| node % 2 == 0;
        assert!(even.get(4));
        assert!(!even.get(3));
        assert!(!Excluding(3).get(3));
        assert!(AcceptAll.get(3));
    }

    #[rstest]
    #[case(0, true)]
    #[case(1, false)]
    #[case(2, true)]
    fn label_predicates_match_overlap(#[case] node: usize, #[case] expected: bool) {
        let labels = InMemoryLabels::default();
        labels.put(0, [1, 4].into_iter().collect());
        labels.put(1, LabelSet::single(2));
        labels.put(2, LabelSet::single(4));
        let predicate = LabelPredicate::overlapping(&labels, [4, 7].into_iter().collect());
        assert_eq!(predicate.test(node).expect("labels"), expected);
    }

    #[test]
    fn containing_predicate_checks_one_label() {
        let labels = InMemoryLabels::default();
        labels.put(0, [1, 4].into_iter().collect());
        assert!(LabelPredicate::containing(&labels, 4).test(0).expect("labels"));
        assert!(!LabelPredicate::containing(&labels, 2).test(0).expect("labels"));
    }
}
