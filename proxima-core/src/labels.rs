//! Small-integer label sets attached to graph nodes.
//!
//! Labels restrict traversal to nodes sharing at least one label with a query
//! and give every label its own entry point.

use std::{fmt, sync::Arc};

use dashmap::DashMap;

use crate::error::SourceError;

const WORD_BITS: usize = u64::BITS as usize;

/// Immutable bitmap of non-negative label identifiers.
///
/// # Examples
/// ```
/// use proxima_core::LabelSet;
///
/// let colours = LabelSet::from_iter([1, 4]);
/// let warm = LabelSet::from_iter([4, 7]);
/// assert!(colours.contains(4));
/// assert!(colours.contains_any(&warm));
/// assert_eq!(colours.intersect(&warm).iter().collect::<Vec<_>>(), vec![4]);
/// ```
#[derive(Clone, Default, Eq, Hash, PartialEq)]
pub struct LabelSet {
    words: Box<[u64]>,
}

impl LabelSet {
    /// Returns the empty label set.
    #[must_use]
    pub fn empty() -> Self {
        Self::default()
    }

    /// Returns a set holding a single label.
    #[must_use]
    pub fn single(label: usize) -> Self {
        Self::from_iter([label])
    }

    fn from_words(mut words: Vec<u64>) -> Self {
        while words.last() == Some(&0) {
            words.pop();
        }
        Self {
            words: words.into_boxed_slice(),
        }
    }

    /// Returns `true` when `label` is a member of the set.
    #[must_use]
    pub fn contains(&self, label: usize) -> bool {
        self.words
            .get(label / WORD_BITS)
            .is_some_and(|word| word & (1_u64 << (label % WORD_BITS)) != 0)
    }

    /// Returns `true` when the two sets share at least one label.
    #[must_use]
    pub fn contains_any(&self, other: &Self) -> bool {
        self.words
            .iter()
            .zip(other.words.iter())
            .any(|(left, right)| left & right != 0)
    }

    /// Returns `true` when every label of `other` is also in `self`.
    #[must_use]
    pub fn includes(&self, other: &Self) -> bool {
        other.words.iter().enumerate().all(|(index, word)| {
            let mine = self.words.get(index).copied().unwrap_or(0);
            word & !mine == 0
        })
    }

    /// Returns the labels present in both sets.
    #[must_use]
    pub fn intersect(&self, other: &Self) -> Self {
        Self::from_words(
            self.words
                .iter()
                .zip(other.words.iter())
                .map(|(left, right)| left & right)
                .collect(),
        )
    }

    /// Iterates over the labels in ascending order.
    pub fn iter(&self) -> impl Iterator<Item = usize> + '_ {
        self.words.iter().enumerate().flat_map(|(index, word)| {
            let base = index * WORD_BITS;
            (0..WORD_BITS)
                .filter(move |bit| word & (1_u64 << bit) != 0)
                .map(move |bit| base + bit)
        })
    }

    /// Number of labels in the set.
    #[must_use]
    pub fn len(&self) -> usize {
        self.words.iter().map(|word| word.count_ones() as usize).sum()
    }

    /// Returns `true` when the set holds no labels.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.words.is_empty()
    }

    /// Largest label in the set, if any.
    #[must_use]
    pub fn max_label(&self) -> Option<usize> {
        let (index, word) = self.words.iter().enumerate().next_back()?;
        let top = WORD_BITS - 1 - word.leading_zeros() as usize;
        Some(index * WORD_BITS + top)
    }
}

impl FromIterator<usize> for LabelSet {
    fn from_iter<I: IntoIterator<Item = usize>>(iter: I) -> Self {
        let mut words: Vec<u64> = Vec::new();
        for label in iter {
            let index = label / WORD_BITS;
            if words.len() <= index {
                words.resize(index + 1, 0);
            }
            if let Some(word) = words.get_mut(index) {
                *word |= 1_u64 << (label % WORD_BITS);
            }
        }
        Self::from_words(words)
    }
}

impl fmt::Debug for LabelSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.iter()).finish()
    }
}

/// Per-node label lookup.
pub trait LabelSource: Send + Sync {
    /// Returns the labels attached to `ordinal`; unlabelled nodes yield the
    /// empty set.
    ///
    /// # Errors
    /// Implementations backed by fallible storage report lookup failures as
    /// [`SourceError`].
    fn labels_of(&self, ordinal: usize) -> Result<LabelSet, SourceError>;

    /// Returns an independent view over the same labels.
    #[must_use]
    fn copy(&self) -> Self
    where
        Self: Sized;

    /// Reports whether the source carries labels at all. Graphs built over a
    /// source returning `false` keep a single global entry point.
    fn is_labelled(&self) -> bool {
        true
    }
}

/// Label source for graphs without labels.
#[derive(Clone, Copy, Debug, Default)]
pub struct NoLabels;

impl LabelSource for NoLabels {
    fn labels_of(&self, _ordinal: usize) -> Result<LabelSet, SourceError> {
        Ok(LabelSet::empty())
    }

    fn copy(&self) -> Self {
        Self
    }

    fn is_labelled(&self) -> bool {
        false
    }
}

/// Concurrent in-memory label store shared between copies.
///
/// # Examples
/// ```
/// use proxima_core::{InMemoryLabels, LabelSet, LabelSource};
///
/// let labels = InMemoryLabels::default();
/// labels.put(3, LabelSet::from_iter([0, 2]));
/// assert!(labels.labels_of(3).expect("lookup").contains(2));
/// assert!(labels.labels_of(4).expect("lookup").is_empty());
/// ```
#[derive(Clone, Debug, Default)]
pub struct InMemoryLabels {
    labels: Arc<DashMap<usize, LabelSet>>,
}

impl InMemoryLabels {
    /// Attaches `labels` to `ordinal`, replacing any previous assignment.
    pub fn put(&self, ordinal: usize, labels: LabelSet) {
        self.labels.insert(ordinal, labels);
    }

    /// Number of labelled ordinals.
    #[must_use]
    pub fn len(&self) -> usize {
        self.labels.len()
    }

    /// Returns `true` when no ordinal carries labels.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }
}

impl LabelSource for InMemoryLabels {
    fn labels_of(&self, ordinal: usize) -> Result<LabelSet, SourceError> {
        Ok(self
            .labels
            .get(&ordinal)
            .map(|entry| entry.value().clone())
            .unwrap_or_default())
    }

    fn copy(&self) -> Self {
        self.clone()
    }
}
