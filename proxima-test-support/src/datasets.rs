//! Seeded vector datasets and brute-force ground truth.

use rand::{Rng, SeedableRng, rngs::SmallRng};

/// `count` vectors of `dimension` uniform components in `[-1, 1)`.
///
/// # Examples
/// ```
/// use proxima_test_support::datasets::uniform_vectors;
///
/// let rows = uniform_vectors(7, 10, 3);
/// assert_eq!(rows.len(), 10);
/// assert!(rows.iter().all(|row| row.len() == 3));
/// assert_eq!(rows, uniform_vectors(7, 10, 3));
/// ```
#[must_use]
pub fn uniform_vectors(seed: u64, count: usize, dimension: usize) -> Vec<Vec<f32>> {
    let mut rng = SmallRng::seed_from_u64(seed);
    (0..count)
        .map(|_| (0..dimension).map(|_| rng.gen_range(-1.0..1.0)).collect())
        .collect()
}

/// `count` points evenly spaced on the unit circle, scaled by `radius`.
#[must_use]
pub fn circle_points(count: usize, radius: f32) -> Vec<Vec<f32>> {
    (0..count)
        .map(|index| {
            let angle = std::f32::consts::TAU * index as f32 / count as f32;
            vec![radius * angle.cos(), radius * angle.sin()]
        })
        .collect()
}

/// Unit vectors at the given fractions of π.
#[must_use]
pub fn unit_circle_at(fractions: &[f32]) -> Vec<Vec<f32>> {
    fractions
        .iter()
        .map(|fraction| {
            let angle = std::f32::consts::PI * fraction;
            vec![angle.cos(), angle.sin()]
        })
        .collect()
}

/// Ids of the `k` rows most similar to `query`, best first; ties break on
/// the lower id. Rows rejected by `accept` are skipped.
#[must_use]
pub fn brute_force_top_k(
    rows: &[Vec<f32>],
    query: &[f32],
    k: usize,
    similarity: impl Fn(&[f32], &[f32]) -> f32,
    accept: impl Fn(usize) -> bool,
) -> Vec<usize> {
    let mut scored: Vec<(usize, f32)> = rows
        .iter()
        .enumerate()
        .filter(|(id, _)| accept(*id))
        .map(|(id, row)| (id, similarity(query, row)))
        .collect();
    scored.sort_by(|left, right| right.1.total_cmp(&left.1).then(left.0.cmp(&right.0)));
    scored.into_iter().take(k).map(|(id, _)| id).collect()
}

/// Fraction of `expected` present in `found`; `1.0` when `expected` is empty.
#[must_use]
pub fn recall_overlap(expected: &[usize], found: &[usize]) -> f64 {
    if expected.is_empty() {
        return 1.0;
    }
    let hits = expected.iter().filter(|id| found.contains(id)).count();
    hits as f64 / expected.len() as f64
}

/// Similarity `1 / (1 + squared distance)`, matching the graph's Euclidean
/// scoring.
#[must_use]
pub fn euclidean_similarity(left: &[f32], right: &[f32]) -> f32 {
    let squared: f32 = left
        .iter()
        .zip(right)
        .map(|(a, b)| (a - b) * (a - b))
        .sum();
    1.0 / (1.0 + squared)
}
