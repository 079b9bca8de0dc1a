//! Shared forced-interaction law.
//!
//! A forced interaction pools the rates of every candidate process into one
//! exponential law truncated at the distance to the region exit. The
//! interaction point is drawn once per episode from
//!
//! ```text
//! p(l) = Σ exp(-Σ l) / P,    0 <= l < l_max,    P = 1 - exp(-Σ l_max)
//! ```
//!
//! and the winning process is picked with probability proportional to its
//! rate. The forced track's weight is multiplied by `P` exactly once.

use bias_core::geometry::SURFACE_TOLERANCE;
use bias_core::{Track, TransportRng, Vec3};

/// Draws allowed before a length that rounds onto the bound is clamped.
pub const MAX_REDRAWS: u32 = 8;

/// Why an episode cannot be forced.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LawDegeneracy {
    /// The track is already (numerically) at the region exit.
    ZeroLength,
    /// No candidate process has a positive rate.
    ZeroRate,
    /// The interaction probability underflows.
    ZeroProbability,
}

/// One draw from a truncated law.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct LawDraw {
    /// Sampled length (mm), strictly below the bound.
    pub length: f64,
    /// `true` if every redraw rounded onto the bound and the length was
    /// clamped.
    pub clamped: bool,
}

/// Exponential law with rate `rate` truncated to `[0, max_length)`.
///
/// # Examples
///
/// ```rust
/// use bias_core::TransportRng;
/// use bias_engine::law::TruncatedExponential;
///
/// let law = TruncatedExponential::new(0.007, 10.0).unwrap();
/// assert!((law.interaction_probability() - (1.0 - (-0.07f64).exp())).abs() < 1e-15);
///
/// let mut rng = TransportRng::from_seed(1);
/// let l = law.sample(&mut rng);
/// assert!(l >= 0.0 && l < 10.0);
/// ```
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct TruncatedExponential {
    rate: f64,
    max_length: f64,
    probability: f64,
}

impl TruncatedExponential {
    /// Creates the law.
    ///
    /// # Errors
    ///
    /// Returns the [`LawDegeneracy`] that makes the law unusable.
    pub fn new(rate: f64, max_length: f64) -> Result<Self, LawDegeneracy> {
        if !(max_length.is_finite() && max_length > SURFACE_TOLERANCE) {
            return Err(LawDegeneracy::ZeroLength);
        }
        if !(rate.is_finite() && rate > 0.0) {
            return Err(LawDegeneracy::ZeroRate);
        }
        let probability = -(-rate * max_length).exp_m1();
        if !(probability > 0.0) {
            return Err(LawDegeneracy::ZeroProbability);
        }
        Ok(Self {
            rate,
            max_length,
            probability,
        })
    }

    /// Pooled rate `Σ` (1/mm).
    #[inline]
    pub fn rate(&self) -> f64 {
        self.rate
    }

    /// Truncation bound (mm).
    #[inline]
    pub fn max_length(&self) -> f64 {
        self.max_length
    }

    /// Probability `P` that the untruncated law interacts before the
    /// bound; the weight factor of a forced interaction.
    #[inline]
    pub fn interaction_probability(&self) -> f64 {
        self.probability
    }

    /// Inverse CDF at `u` in [0, 1).
    #[inline]
    pub fn quantile(&self, u: f64) -> f64 {
        -(-u * self.probability).ln_1p() / self.rate
    }

    /// Draws a length strictly below the bound.
    #[inline]
    pub fn sample(&self, rng: &mut TransportRng) -> f64 {
        self.draw(rng).length
    }

    /// Draws a length strictly below the bound, reporting whether it had
    /// to be clamped.
    pub fn draw(&self, rng: &mut TransportRng) -> LawDraw {
        for _ in 0..MAX_REDRAWS {
            let length = self.quantile(rng.gen_uniform());
            if length < self.max_length {
                return LawDraw {
                    length,
                    clamped: false,
                };
            }
        }
        LawDraw {
            length: self.max_length * (1.0 - f64::EPSILON),
            clamped: true,
        }
    }

    /// Mean of the truncated law.
    pub fn mean(&self) -> f64 {
        let tail = (-self.rate * self.max_length).exp();
        1.0 / self.rate - self.max_length * tail / self.probability
    }
}

/// Per-episode state of a forced interaction.
///
/// Lifecycle: [`initialize`](Self::initialize) at the first step inside the
/// region, [`add_cross_section`](Self::add_cross_section) per candidate,
/// [`sample`](Self::sample) once, then
/// [`update_for_step`](Self::update_for_step) after each move. A momentum
/// change that the law did not cause invalidates the sample
/// ([`momentum_changed`](Self::momentum_changed)).
#[derive(Clone, Debug, Default)]
pub struct SharedInteractionLaw {
    candidates: Vec<(String, f64)>,
    total_rate: f64,
    max_length: f64,
    law: Option<TruncatedExponential>,
    remaining: f64,
    winner: Option<String>,
    origin_direction: Vec3,
    origin_energy: f64,
    last_updated_step: Option<u32>,
}

impl SharedInteractionLaw {
    /// Creates an empty law.
    pub fn new() -> Self {
        Self::default()
    }

    /// Starts a new episode for `track` with bound `max_length`.
    pub fn initialize(&mut self, track: &Track, max_length: f64) {
        self.candidates.clear();
        self.total_rate = 0.0;
        self.max_length = max_length;
        self.law = None;
        self.remaining = f64::INFINITY;
        self.winner = None;
        self.origin_direction = track.direction;
        self.origin_energy = track.kinetic_energy;
        self.last_updated_step = None;
    }

    /// Pools a candidate process. Non-positive rates are ignored.
    pub fn add_cross_section(&mut self, process: &str, rate: f64) {
        if rate.is_finite() && rate > 0.0 {
            self.candidates.push((process.to_string(), rate));
            self.total_rate += rate;
        }
    }

    /// Draws the interaction length and the winning process.
    ///
    /// # Errors
    ///
    /// Returns the degeneracy that prevents forcing; the episode must then
    /// be abandoned.
    pub fn sample(&mut self, rng: &mut TransportRng) -> Result<LawDraw, LawDegeneracy> {
        let law = TruncatedExponential::new(self.total_rate, self.max_length)?;
        let draw = law.draw(rng);

        let mut pick = rng.gen_uniform() * self.total_rate;
        let mut winner = None;
        for (name, rate) in &self.candidates {
            winner = Some(name.clone());
            if pick < *rate {
                break;
            }
            pick -= rate;
        }

        self.law = Some(law);
        self.remaining = draw.length;
        self.winner = winner;
        Ok(draw)
    }

    /// Returns `true` once a length has been drawn for this episode.
    #[inline]
    pub fn is_sampled(&self) -> bool {
        self.law.is_some()
    }

    /// Returns `true` if the track's momentum differs from the one the
    /// episode was initialised with.
    pub fn momentum_changed(&self, track: &Track) -> bool {
        let direction_moved = (track.direction - self.origin_direction).norm() > 1e-12;
        let energy_moved = (track.kinetic_energy - self.origin_energy).abs()
            > 1e-12 * self.origin_energy.abs().max(1.0);
        direction_moved || energy_moved
    }

    /// Shrinks the remaining length and the bound by a step of `length`.
    ///
    /// Several processes report the same move; only the first report for
    /// `step_number` is applied.
    pub fn update_for_step(&mut self, step_number: u32, length: f64) {
        if self.last_updated_step == Some(step_number) {
            return;
        }
        self.last_updated_step = Some(step_number);
        self.remaining = (self.remaining - length).max(0.0);
        self.max_length = (self.max_length - length).max(0.0);
    }

    /// Interaction length to report for `process`: the remaining length for
    /// the winner, infinity for every other process.
    #[inline]
    pub fn remaining_length_for(&self, process: &str) -> f64 {
        match &self.winner {
            Some(winner) if winner == process => self.remaining,
            _ => f64::INFINITY,
        }
    }

    /// The winning process.
    #[inline]
    pub fn winner(&self) -> Option<&str> {
        self.winner.as_deref()
    }

    /// Weight factor of the episode (1 before sampling).
    #[inline]
    pub fn weight_factor(&self) -> f64 {
        self.law.map_or(1.0, |law| law.interaction_probability())
    }

    /// Pooled rate.
    #[inline]
    pub fn total_rate(&self) -> f64 {
        self.total_rate
    }

    /// Current bound.
    #[inline]
    pub fn max_length(&self) -> f64 {
        self.max_length
    }
}
