// geoanchor_sim/src/simulation/core/prng.rs

use nalgebra::Vector3;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use rand_distr::{Distribution, Normal};

/// A newtype wrapper around `ChaCha8Rng`.
/// This is the central, deterministic pseudo-random number generator for a run.
#[derive(Debug, Clone)]
pub struct SimulationRng(pub ChaCha8Rng);

impl SimulationRng {
    /// Seeded runs are reproducible; without a seed the generator draws from the OS.
    pub fn new(seed: Option<u64>) -> Self {
        match seed {
            Some(seed) => Self(ChaCha8Rng::seed_from_u64(seed)),
            None => Self(ChaCha8Rng::from_entropy()),
        }
    }

    /// Three independent draws from `noise`, or zero when there is no noise.
    pub fn jitter(&mut self, noise: Option<&Normal<f64>>) -> Vector3<f64> {
        match noise {
            Some(dist) => Vector3::new(
                dist.sample(&mut self.0),
                dist.sample(&mut self.0),
                dist.sample(&mut self.0),
            ),
            None => Vector3::zeros(),
        }
    }
}
