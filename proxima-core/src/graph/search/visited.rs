//! Visited-node tracking for beam searches.

use super::super::error::GraphError;

const WORD_BITS: usize = u64::BITS as usize;

/// Bitset of visited node ids.
///
/// The fixed variant is sized once and rejects ids beyond its capacity; the
/// growable variant widens itself so searches can run while insertions add
/// new ids.
#[derive(Clone, Debug)]
pub(crate) enum VisitedSet {
    Fixed { words: Vec<u64>, capacity: usize },
    Growable { words: Vec<u64> },
}

impl VisitedSet {
    pub(crate) fn fixed(capacity: usize) -> Self {
        Self::Fixed {
            words: vec![0; capacity.div_ceil(WORD_BITS)],
            capacity,
        }
    }

    pub(crate) fn growable(initial: usize) -> Self {
        Self::Growable {
            words: vec![0; initial.div_ceil(WORD_BITS)],
        }
    }

    /// Marks `node`, returning `true` when it was not yet visited.
    pub(crate) fn insert(&mut self, node: usize) -> Result<bool, GraphError> {
        let word = node / WORD_BITS;
        let mask = 1_u64 << (node % WORD_BITS);
        let words = match self {
            Self::Fixed { words, capacity } => {
                if node >= *capacity {
                    return Err(GraphError::VisitedCapacityExceeded {
                        node,
                        capacity: *capacity,
                    });
                }
                words
            }
            Self::Growable { words } => {
                if word >= words.len() {
                    words.resize((word + 1).max(words.len() * 2), 0);
                }
                words
            }
        };
        let Some(slot) = words.get_mut(word) else {
            return Err(GraphError::invariant(format!(
                "visited set lost track of node {node}"
            )));
        };
        let fresh = *slot & mask == 0;
        *slot |= mask;
        Ok(fresh)
    }

    pub(crate) fn clear(&mut self) {
        match self {
            Self::Fixed { words, .. } | Self::Growable { words } => words.fill(0),
        }
    }
}
