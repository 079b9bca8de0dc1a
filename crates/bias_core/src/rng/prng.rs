//! Pseudo-random number generator wrapper for transport simulations.

use std::f64::consts::PI;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rand_distr::{Distribution, Exp1};

use crate::types::Vec3;

/// Transport random number generator.
///
/// Wraps `StdRng` with seed tracking and the few draws the engine and the
/// reference kernel need (uniforms, exponential path lengths, isotropic
/// directions).
///
/// # Examples
///
/// ```rust
/// use bias_core::rng::TransportRng;
///
/// let mut a = TransportRng::from_seed(7);
/// let mut b = TransportRng::from_seed(7);
/// assert_eq!(a.gen_uniform(), b.gen_uniform());
///
/// let path = a.gen_exponential(0.5);
/// assert!(path >= 0.0);
/// ```
#[derive(Clone, Debug)]
pub struct TransportRng {
    /// The underlying PRNG instance.
    inner: StdRng,
    /// The seed used for initialisation.
    seed: u64,
}

impl TransportRng {
    /// Creates a generator initialised with `seed`.
    #[inline]
    pub fn from_seed(seed: u64) -> Self {
        Self {
            inner: StdRng::seed_from_u64(seed),
            seed,
        }
    }

    /// Creates the generator for stream `index` of a run seeded with
    /// `run_seed`.
    ///
    /// Stream seeds are scrambled with the SplitMix64 finaliser so that
    /// neighbouring indices yield unrelated sequences.
    pub fn stream(run_seed: u64, index: u64) -> Self {
        let mut z = run_seed
            .wrapping_add(index.wrapping_add(1).wrapping_mul(0x9E37_79B9_7F4A_7C15));
        z = (z ^ (z >> 30)).wrapping_mul(0xBF58_476D_1CE4_E5B9);
        z = (z ^ (z >> 27)).wrapping_mul(0x94D0_49BB_1331_11EB);
        Self::from_seed(z ^ (z >> 31))
    }

    /// Returns the seed used for initialisation.
    #[inline]
    pub fn seed(&self) -> u64 {
        self.seed
    }

    /// Uniform value in [0, 1).
    #[inline]
    pub fn gen_uniform(&mut self) -> f64 {
        self.inner.gen()
    }

    /// Uniform value in (0, 1], safe to pass to `ln`.
    #[inline]
    pub fn gen_uniform_open(&mut self) -> f64 {
        1.0 - self.inner.gen::<f64>()
    }

    /// Returns `true` with probability `p` (clamped to [0, 1]).
    #[inline]
    pub fn gen_bool(&mut self, p: f64) -> bool {
        self.gen_uniform() < p.clamp(0.0, 1.0)
    }

    /// Exponential path length for interaction rate `rate` (1/mm).
    ///
    /// Returns `f64::INFINITY` for a non-positive rate.
    #[inline]
    pub fn gen_exponential(&mut self, rate: f64) -> f64 {
        if rate > 0.0 {
            let unit: f64 = Exp1.sample(&mut self.inner);
            unit / rate
        } else {
            f64::INFINITY
        }
    }

    /// Number of mean free paths to the next interaction, `-ln(u)`.
    #[inline]
    pub fn gen_mean_free_paths(&mut self) -> f64 {
        Exp1.sample(&mut self.inner)
    }

    /// Unit vector uniformly distributed on the sphere.
    pub fn isotropic_direction(&mut self) -> Vec3 {
        let cos_theta = 2.0 * self.gen_uniform() - 1.0;
        let sin_theta = (1.0 - cos_theta * cos_theta).max(0.0).sqrt();
        let phi = 2.0 * PI * self.gen_uniform();
        Vec3::new(sin_theta * phi.cos(), sin_theta * phi.sin(), cos_theta)
    }

    /// Fills the buffer with uniform values in [0, 1).
    #[inline]
    pub fn fill_uniform(&mut self, buffer: &mut [f64]) {
        for value in buffer.iter_mut() {
            *value = self.inner.gen();
        }
    }
}
