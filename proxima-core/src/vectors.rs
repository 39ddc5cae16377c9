//! Random-access vector sources consumed by the graph.
//!
//! The graph never owns vector contents. It reads them through
//! [`VectorSource`] views, taking independent copies whenever two vectors must
//! be alive at the same time.

use std::sync::{Arc, RwLock};

use crate::{error::SourceError, similarity::VectorElement};

/// Random access to vectors by ordinal.
///
/// [`VectorSource::vector_value`] borrows the view mutably: the returned
/// slice is only valid until the next call on the same view. Callers that
/// need two vectors simultaneously take a second view with
/// [`VectorSource::copy`].
pub trait VectorSource: Send + Sync {
    /// Element type of the stored vectors.
    type Element: VectorElement;

    /// Number of vectors addressable by ordinal.
    fn len(&self) -> usize;

    /// Returns `true` when the source holds no vectors.
    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Dimension shared by every vector of the source.
    fn dimension(&self) -> usize;

    /// Returns the vector stored at `ordinal`.
    ///
    /// # Errors
    /// Returns [`SourceError::OutOfBounds`] when `ordinal` is not addressable.
    fn vector_value(&mut self, ordinal: usize) -> Result<&[Self::Element], SourceError>;

    /// Reports whether values are handed out through a per-view buffer that
    /// the next call overwrites.
    ///
    /// Views of such sources are worth pooling; views of sources that hand
    /// out slices of immutable storage are free to create.
    fn is_value_shared(&self) -> bool;

    /// Returns an independent view over the same vectors.
    #[must_use]
    fn copy(&self) -> Self
    where
        Self: Sized;
}

fn validate_dimension(dimension: usize) -> Result<(), SourceError> {
    if dimension == 0 {
        Err(SourceError::ZeroDimension)
    } else {
        Ok(())
    }
}

fn validate_row<T>(row: &[T], dimension: usize) -> Result<(), SourceError> {
    if row.len() == dimension {
        Ok(())
    } else {
        Err(SourceError::DimensionMismatch {
            expected: dimension,
            actual: row.len(),
        })
    }
}

/// Immutable vectors stored contiguously and shared between copies.
///
/// # Examples
/// ```
/// use proxima_core::{FlatVectors, VectorSource};
///
/// let mut vectors = FlatVectors::new(2, vec![0.0_f32, 1.0, 2.0, 3.0])
///     .expect("two rows of dimension 2");
/// assert_eq!(vectors.len(), 2);
/// assert_eq!(vectors.vector_value(1).expect("row 1"), &[2.0, 3.0]);
/// ```
#[derive(Clone, Debug)]
pub struct FlatVectors<T> {
    data: Arc<[T]>,
    dimension: usize,
}

impl<T: VectorElement> FlatVectors<T> {
    /// Wraps `data`, interpreted as rows of `dimension` components.
    ///
    /// # Errors
    /// Returns [`SourceError::ZeroDimension`] for a zero dimension and
    /// [`SourceError::DimensionMismatch`] when `data` is not a whole number of
    /// rows.
    pub fn new(dimension: usize, data: Vec<T>) -> Result<Self, SourceError> {
        validate_dimension(dimension)?;
        let remainder = data.len() % dimension;
        if remainder != 0 {
            return Err(SourceError::DimensionMismatch {
                expected: dimension,
                actual: remainder,
            });
        }
        Ok(Self {
            data: data.into(),
            dimension,
        })
    }

    /// Builds a source from one `Vec` per row.
    ///
    /// # Errors
    /// Returns [`SourceError::DimensionMismatch`] when rows disagree on their
    /// length and [`SourceError::ZeroDimension`] for empty rows.
    pub fn from_rows(rows: Vec<Vec<T>>) -> Result<Self, SourceError> {
        let dimension = rows.first().map_or(1, Vec::len);
        validate_dimension(dimension)?;
        let mut data = Vec::with_capacity(rows.len() * dimension);
        for row in rows {
            validate_row(&row, dimension)?;
            data.extend(row);
        }
        Self::new(dimension, data)
    }
}

impl<T: VectorElement> VectorSource for FlatVectors<T> {
    type Element = T;

    fn len(&self) -> usize {
        self.data.len() / self.dimension
    }

    #[rustfmt::skip]
    fn dimension(&self) -> usize { self.dimension }

    fn vector_value(&mut self, ordinal: usize) -> Result<&[T], SourceError> {
        let start = ordinal.checked_mul(self.dimension);
        start
            .and_then(|start| self.data.get(start..start + self.dimension))
            .ok_or_else(|| SourceError::OutOfBounds {
                index: ordinal,
                len: self.data.len() / self.dimension,
            })
    }

    #[rustfmt::skip]
    fn is_value_shared(&self) -> bool { false }

    fn copy(&self) -> Self {
        self.clone()
    }
}

/// Growable row store whose rows are visible to every copy.
///
/// Each view keeps the most recently requested row in a private slot, so the
/// slice returned by [`VectorSource::vector_value`] is replaced by the next
/// call on the same view.
///
/// # Examples
/// ```
/// use proxima_core::{DenseVectors, VectorSource};
///
/// let vectors = DenseVectors::<f32>::new(2).expect("positive dimension");
/// let mut view = vectors.copy();
/// vectors.push(vec![1.0, 2.0]).expect("row matches dimension");
/// assert_eq!(view.vector_value(0).expect("row 0"), &[1.0, 2.0]);
/// ```
#[derive(Debug)]
pub struct DenseVectors<T> {
    rows: Arc<RwLock<Vec<Arc<[T]>>>>,
    dimension: usize,
    current: Option<Arc<[T]>>,
}

impl<T: VectorElement> DenseVectors<T> {
    /// Creates an empty store for vectors of `dimension` components.
    ///
    /// # Errors
    /// Returns [`SourceError::ZeroDimension`] when `dimension` is zero.
    pub fn new(dimension: usize) -> Result<Self, SourceError> {
        validate_dimension(dimension)?;
        Ok(Self {
            rows: Arc::new(RwLock::new(Vec::new())),
            dimension,
            current: None,
        })
    }

    /// Creates a store pre-populated with `rows`.
    ///
    /// # Errors
    /// Returns [`SourceError::DimensionMismatch`] when a row differs in length
    /// from `dimension`.
    pub fn from_rows(dimension: usize, rows: Vec<Vec<T>>) -> Result<Self, SourceError> {
        let store = Self::new(dimension)?;
        for row in rows {
            store.push(row)?;
        }
        Ok(store)
    }

    /// Appends a vector and returns its ordinal.
    ///
    /// # Errors
    /// Returns [`SourceError::DimensionMismatch`] when `row` has the wrong
    /// length and [`SourceError::StoragePoisoned`] when a writer panicked.
    pub fn push(&self, row: Vec<T>) -> Result<usize, SourceError> {
        validate_row(&row, self.dimension)?;
        let mut rows = self
            .rows
            .write()
            .map_err(|_| SourceError::StoragePoisoned)?;
        rows.push(row.into());
        Ok(rows.len() - 1)
    }
}

impl<T: VectorElement> VectorSource for DenseVectors<T> {
    type Element = T;

    fn len(&self) -> usize {
        self.rows.read().map_or(0, |rows| rows.len())
    }

    #[rustfmt::skip]
    fn dimension(&self) -> usize { self.dimension }

    fn vector_value(&mut self, ordinal: usize) -> Result<&[T], SourceError> {
        let row = {
            let rows = self.rows.read().map_err(|_| SourceError::StoragePoisoned)?;
            rows.get(ordinal)
                .cloned()
                .ok_or(SourceError::OutOfBounds {
                    index: ordinal,
                    len: rows.len(),
                })?
        };
        Ok(&**self.current.insert(row))
    }

    #[rustfmt::skip]
    fn is_value_shared(&self) -> bool { true }

    fn copy(&self) -> Self {
        Self {
            rows: Arc::clone(&self.rows),
            dimension: self.dimension,
            current: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(0, vec![1.0], SourceError::ZeroDimension)]
    #[case(2, vec![1.0, 2.0, 3.0], SourceError::DimensionMismatch { expected: 2, actual: 1 })]
    fn flat_vectors_reject_malformed_storage(
        #[case] dimension: usize,
        #[case] data: Vec<f32>,
        #[case] expected: SourceError,
    ) {
        let err = FlatVectors::new(dimension, data).expect_err("storage must be rejected");
        assert_eq!(err, expected);
    }

    #[test]
    fn flat_vectors_report_out_of_bounds_ordinals() {
        let mut vectors = FlatVectors::from_rows(vec![vec![1.0_f32, 2.0]]).expect("one row");
        let err = vectors.vector_value(3).expect_err("ordinal 3 is absent");
        assert_eq!(err, SourceError::OutOfBounds { index: 3, len: 1 });
    }

    #[test]
    fn flat_vector_rows_must_agree_on_dimension() {
        let err = FlatVectors::from_rows(vec![vec![1.0_f32, 2.0], vec![3.0]])
            .expect_err("ragged rows must be rejected");
        assert_eq!(
            err,
            SourceError::DimensionMismatch {
                expected: 2,
                actual: 1
            }
        );
    }

    #[test]
    fn dense_vector_pushes_are_visible_to_existing_copies() {
        let vectors = DenseVectors::<i8>::new(3).expect("dimension");
        let mut view = vectors.copy();
        assert!(view.is_empty());
        let ordinal = vectors.push(vec![1, 2, 3]).expect("push");
        assert_eq!(ordinal, 0);
        assert_eq!(view.len(), 1);
        assert_eq!(view.vector_value(0).expect("row"), &[1, 2, 3]);
        assert!(view.is_value_shared());
    }

    #[test]
    fn dense_vectors_validate_row_length() {
        let vectors = DenseVectors::<f32>::new(2).expect("dimension");
        let err = vectors.push(vec![1.0]).expect_err("short row");
        assert_eq!(
            err,
            SourceError::DimensionMismatch {
                expected: 2,
                actual: 1
            }
        );
    }
}
