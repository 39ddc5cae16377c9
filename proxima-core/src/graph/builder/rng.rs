//! Per-worker random number generators.
//!
//! Each rayon worker draws from its own `SmallRng` seeded from the graph seed,
//! so parallel insertions do not contend on one generator. Calls made outside
//! the pool share a single generator, which keeps sequential builds
//! reproducible.

use std::sync::Mutex;

use rand::{SeedableRng, rngs::SmallRng};
use rayon::{current_num_threads, current_thread_index};

use crate::{
    graph::error::GraphError,
    labels::LabelSource,
    vectors::VectorSource,
};

use super::GraphBuilder;

/// Golden-ratio stride separating worker streams.
const GOLDEN_GAMMA: u64 = 0x9E37_79B9_7F4A_7C15;

/// Seed for worker `index`: the base seed offset by `index + 1` golden
/// strides, then passed through the SplitMix64 finaliser.
pub(super) fn worker_seed(base_seed: u64, index: usize) -> u64 {
    let stride = u64::try_from(index).map_or(u64::MAX, |index| index.wrapping_add(1));
    let mut z = (base_seed ^ stride.wrapping_mul(GOLDEN_GAMMA)).wrapping_add(GOLDEN_GAMMA);
    z = (z ^ (z >> 30)).wrapping_mul(0xBF58_476D_1CE4_E5B9);
    z = (z ^ (z >> 27)).wrapping_mul(0x94D0_49BB_1331_11EB);
    z ^ (z >> 31)
}

/// One generator per rayon worker in the current pool.
pub(super) fn build_worker_rngs(base_seed: u64) -> Vec<Mutex<SmallRng>> {
    let workers = current_num_threads();
    let mut rngs = Vec::with_capacity(workers);
    for index in 0..workers {
        rngs.push(Mutex::new(SmallRng::seed_from_u64(worker_seed(base_seed, index))));
    }
    rngs
}

impl<S: VectorSource, L: LabelSource> GraphBuilder<S, L> {
    /// Runs `draw` against the calling worker's generator, or the shared one
    /// outside the pool.
    pub(super) fn with_rng<T>(&self, draw: impl FnOnce(&mut SmallRng) -> T) -> Result<T, GraphError> {
        let (rng, resource) = match current_thread_index().and_then(|index| self.worker_rngs.get(index)) {
            Some(worker) => (worker, "worker generator"),
            None => (&self.rng, "shared generator"),
        };
        let mut guard = rng.lock().map_err(|_| GraphError::LockPoisoned { resource })?;
        Ok(draw(&mut guard))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::Rng;

    #[test]
    fn worker_seeds_differ_per_index() {
        let seeds: Vec<u64> = (0..4).map(|index| worker_seed(42, index)).collect();
        for (index, seed) in seeds.iter().enumerate() {
            assert!(!seeds[index + 1..].contains(seed));
        }
    }

    #[test]
    fn worker_rngs_are_reproducible() {
        let draw = |rngs: Vec<Mutex<SmallRng>>| -> Vec<u32> {
            rngs.into_iter()
                .map(|rng| rng.into_inner().expect("fresh mutex").r#gen())
                .collect()
        };
        assert_eq!(draw(build_worker_rngs(7)), draw(build_worker_rngs(7)));
    }
}
