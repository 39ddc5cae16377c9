//! Similarity functions and the element types they operate on.
//!
//! Every score is "larger is better" and non-negative so the graph can treat
//! all functions uniformly during pruning and search.

use std::fmt;

/// Similarity function applied between two vectors.
///
/// # Examples
/// ```
/// use proxima_core::SimilarityFunction;
///
/// let score = SimilarityFunction::Euclidean.compare(&[0.0_f32, 0.0], &[3.0, 4.0]);
/// assert!((score - 1.0 / 26.0).abs() < 1e-6);
/// ```
#[derive(Clone, Copy, Debug, Default, Eq, Hash, PartialEq)]
pub enum SimilarityFunction {
    /// `(1 + a·b) / 2`; intended for unit-length vectors.
    DotProduct,
    /// `1 / (1 + |a - b|²)`.
    #[default]
    Euclidean,
    /// `(1 + cos(a, b)) / 2`.
    Cosine,
}

impl SimilarityFunction {
    /// Scores two vectors of the same element type.
    #[must_use]
    pub fn compare<E: VectorElement>(self, left: &[E], right: &[E]) -> f32 {
        E::similarity(self, left, right)
    }

    fn from_parts(self, dot: f32, squared_distance: f32, left_norm: f32, right_norm: f32) -> f32 {
        match self {
            Self::DotProduct => (1.0 + dot) / 2.0,
            Self::Euclidean => 1.0 / (1.0 + squared_distance),
            Self::Cosine => {
                let denominator = (left_norm * right_norm).sqrt();
                if denominator == 0.0 {
                    0.5
                } else {
                    (1.0 + dot / denominator) / 2.0
                }
            }
        }
    }
}

impl fmt::Display for SimilarityFunction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::DotProduct => "dot_product",
            Self::Euclidean => "euclidean",
            Self::Cosine => "cosine",
        })
    }
}

/// Element type of an indexed vector.
///
/// Implemented once per vector representation so scoring is chosen at
/// compile time rather than by inspecting vectors at runtime.
pub trait VectorElement: Copy + Send + Sync + fmt::Debug + 'static {
    /// Scores `left` against `right` with `function`.
    fn similarity(function: SimilarityFunction, left: &[Self], right: &[Self]) -> f32;

    /// Adds `values` component-wise onto `sum`.
    fn accumulate(values: &[Self], sum: &mut [f64]);

    /// Converts a component-wise sum of `count` vectors into their mean.
    ///
    /// Returns `None` when the representation cannot express a centroid, in
    /// which case medoid refreshes leave the entry point untouched.
    fn mean(sum: &[f64], count: usize) -> Option<Vec<Self>>;
}

fn components(values: impl Iterator<Item = (f32, f32)>) -> (f32, f32, f32, f32) {
    values.fold((0.0, 0.0, 0.0, 0.0), |(dot, dist, ln, rn), (a, b)| {
        let diff = a - b;
        (dot + a * b, dist + diff * diff, ln + a * a, rn + b * b)
    })
}

impl VectorElement for f32 {
    fn similarity(function: SimilarityFunction, left: &[Self], right: &[Self]) -> f32 {
        let (dot, dist, ln, rn) = components(left.iter().copied().zip(right.iter().copied()));
        function.from_parts(dot, dist, ln, rn)
    }

    fn accumulate(values: &[Self], sum: &mut [f64]) {
        for (slot, value) in sum.iter_mut().zip(values) {
            *slot += f64::from(*value);
        }
    }

    fn mean(sum: &[f64], count: usize) -> Option<Vec<Self>> {
        if count == 0 {
            return None;
        }
        let divisor = count as f64;
        Some(sum.iter().map(|total| (total / divisor) as f32).collect())
    }
}

impl VectorElement for i8 {
    fn similarity(function: SimilarityFunction, left: &[Self], right: &[Self]) -> f32 {
        let (dot, dist, ln, rn) = components(
            left.iter()
                .zip(right)
                .map(|(a, b)| (f32::from(*a), f32::from(*b))),
        );
        function.from_parts(dot, dist, ln, rn)
    }

    fn accumulate(values: &[Self], sum: &mut [f64]) {
        for (slot, value) in sum.iter_mut().zip(values) {
            *slot += f64::from(*value);
        }
    }

    fn mean(_sum: &[f64], _count: usize) -> Option<Vec<Self>> {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    const EPSILON: f32 = 1e-6;

    #[rstest]
    #[case(SimilarityFunction::DotProduct, [1.0, 0.0], [1.0, 0.0], 1.0)]
    #[case(SimilarityFunction::DotProduct, [1.0, 0.0], [-1.0, 0.0], 0.0)]
    #[case(SimilarityFunction::DotProduct, [1.0, 0.0], [0.0, 1.0], 0.5)]
    #[case(SimilarityFunction::Euclidean, [0.0, 0.0], [0.0, 0.0], 1.0)]
    #[case(SimilarityFunction::Euclidean, [1.0, 1.0], [2.0, 1.0], 0.5)]
    #[case(SimilarityFunction::Cosine, [2.0, 0.0], [5.0, 0.0], 1.0)]
    #[case(SimilarityFunction::Cosine, [0.0, 3.0], [4.0, 0.0], 0.5)]
    #[case(SimilarityFunction::Cosine, [0.0, 0.0], [4.0, 0.0], 0.5)]
    fn float_similarity_matches_normalised_formulae(
        #[case] function: SimilarityFunction,
        #[case] left: [f32; 2],
        #[case] right: [f32; 2],
        #[case] expected: f32,
    ) {
        let score = function.compare(&left, &right);
        assert!(
            (score - expected).abs() < EPSILON,
            "{function}: expected {expected}, got {score}"
        );
    }

    #[rstest]
    #[case(SimilarityFunction::DotProduct)]
    #[case(SimilarityFunction::Euclidean)]
    #[case(SimilarityFunction::Cosine)]
    fn byte_vectors_score_like_their_float_equivalents(#[case] function: SimilarityFunction) {
        let left: [i8; 3] = [1, -2, 3];
        let right: [i8; 3] = [0, 4, -1];
        let left_f: Vec<f32> = left.iter().map(|v| f32::from(*v)).collect();
        let right_f: Vec<f32> = right.iter().map(|v| f32::from(*v)).collect();
        let bytes = function.compare(&left, &right);
        let floats = function.compare(&left_f, &right_f);
        assert!((bytes - floats).abs() < EPSILON);
    }

    #[test]
    fn float_mean_divides_component_sums() {
        let mut sum = vec![0.0; 2];
        f32::accumulate(&[1.0, 2.0], &mut sum);
        f32::accumulate(&[3.0, 6.0], &mut sum);
        assert_eq!(f32::mean(&sum, 2), Some(vec![2.0, 4.0]));
    }

    #[test]
    fn byte_vectors_have_no_centroid() {
        let mut sum = vec![0.0; 2];
        i8::accumulate(&[1, 2], &mut sum);
        assert_eq!(i8::mean(&sum, 1), None);
    }
}
