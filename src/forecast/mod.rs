pub mod extrapolation;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rand_distr::{Distribution, Normal};

/// Source of the zero-mean perturbation added to each forecast step.
pub trait NoiseSource {
    fn sample(&mut self, std_dev: f64) -> f64;
}

/// Gaussian noise from any RNG. Seed it for reproducible curves.
pub struct GaussianNoise<R: Rng> {
    rng: R,
}

impl<R: Rng> GaussianNoise<R> {
    pub fn new(rng: R) -> Self {
        Self { rng }
    }
}

impl GaussianNoise<StdRng> {
    pub fn seeded(seed: u64) -> Self {
        Self::new(StdRng::seed_from_u64(seed))
    }

    pub fn from_entropy() -> Self {
        Self::new(StdRng::from_entropy())
    }

    /// Seeded when a seed is configured, entropy otherwise.
    pub fn from_seed(seed: Option<u64>) -> Self {
        match seed {
            Some(seed) => Self::seeded(seed),
            None => Self::from_entropy(),
        }
    }
}

impl<R: Rng> NoiseSource for GaussianNoise<R> {
    fn sample(&mut self, std_dev: f64) -> f64 {
        if !std_dev.is_finite() || std_dev <= 0.0 {
            return 0.0;
        }
        match Normal::new(0.0, std_dev) {
            Ok(dist) => dist.sample(&mut self.rng),
            Err(_) => 0.0,
        }
    }
}

/// No perturbation at all.
#[derive(Debug, Default, Clone, Copy)]
pub struct ZeroNoise;

impl NoiseSource for ZeroNoise {
    fn sample(&mut self, _std_dev: f64) -> f64 {
        0.0
    }
}
