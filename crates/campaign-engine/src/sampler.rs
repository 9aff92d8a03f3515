//! Seeded Gaussian sampler for human-call-like duration scheduling.

use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};

/// Stateful normal-distribution generator using the polar Box-Muller method.
///
/// Each pass over the unit disk yields two independent samples; the second is
/// cached and returned on the next call, scaled by that call's mean/stdev.
/// Output is fully determined by the seed and the call sequence.
#[derive(Debug)]
pub struct GaussianSampler {
    rng: SmallRng,
    cached: Option<f64>,
}

impl GaussianSampler {
    /// Create a sampler with a fixed seed.
    pub fn new(seed: u64) -> Self {
        Self {
            rng: SmallRng::seed_from_u64(seed),
            cached: None,
        }
    }

    /// Create a sampler seeded from OS entropy.
    pub fn from_entropy() -> Self {
        Self {
            rng: SmallRng::from_entropy(),
            cached: None,
        }
    }

    /// Reset internal state to a fresh seed, discarding any cached sample.
    pub fn reset(&mut self, seed: u64) {
        self.rng = SmallRng::seed_from_u64(seed);
        self.cached = None;
    }

    /// Draw one sample from N(mean, stdev²).
    pub fn sample(&mut self, mean: f64, stdev: f64) -> f64 {
        if let Some(y2) = self.cached.take() {
            return y2 * stdev + mean;
        }

        let (x1, x2, w) = loop {
            let x1: f64 = self.rng.gen_range(-1.0..1.0);
            let x2: f64 = self.rng.gen_range(-1.0..1.0);
            let w = x1 * x1 + x2 * x2;
            // Rejection-sample the open unit disk; w==0 would divide by zero below.
            if w < 1.0 && w > 0.0 {
                break (x1, x2, w);
            }
        };

        let scale = ((-2.0 * w.ln()) / w).sqrt();
        self.cached = Some(x2 * scale);
        x1 * scale * stdev + mean
    }
}
