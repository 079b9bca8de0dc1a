//! Russian roulette.
//!
//! One implementation serves every call site: split products of Compton,
//! bremsstrahlung, pair production, generic splitting and last-vertex
//! replays all go through [`AngularRoulette::play`]. Low-weight tracks
//! leaving a free-flight region go through [`weight_roulette`].

use bias_core::{TrackStatus, TransportRng, Track, Vec3};

use crate::error::ConfigError;
use crate::gate::AcceptanceGate;

/// Cone of preferred directions.
///
/// # Examples
///
/// ```rust
/// use bias_core::Vec3;
/// use bias_engine::roulette::BiasCone;
///
/// let cone = BiasCone::new(Vec3::z(), 10.0).unwrap();
/// assert!(cone.contains(&Vec3::new(0.0, 0.1, 1.0)));
/// assert!(!cone.contains(&Vec3::x()));
/// ```
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct BiasCone {
    axis: Vec3,
    half_angle_deg: f64,
    cos_half_angle: f64,
}

impl BiasCone {
    /// Creates a cone around `direction` (normalised here).
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` for a zero or non-finite direction, or a
    /// half-angle outside (0, 180] degrees.
    pub fn new(direction: Vec3, half_angle_deg: f64) -> Result<Self, ConfigError> {
        let norm = direction.norm();
        if !norm.is_finite() || norm <= f64::EPSILON {
            return Err(ConfigError::InvalidDirection("bias_cone"));
        }
        if !(half_angle_deg > 0.0 && half_angle_deg <= 180.0) {
            return Err(ConfigError::InvalidConeAngle(half_angle_deg));
        }
        Ok(Self {
            axis: direction / norm,
            half_angle_deg,
            cos_half_angle: half_angle_deg.to_radians().cos(),
        })
    }

    /// Unit axis.
    #[inline]
    pub fn axis(&self) -> Vec3 {
        self.axis
    }

    /// Half-angle in degrees.
    #[inline]
    pub fn half_angle_deg(&self) -> f64 {
        self.half_angle_deg
    }

    /// Returns `true` if `direction` lies within the cone.
    #[inline]
    pub fn contains(&self, direction: &Vec3) -> bool {
        let norm = direction.norm();
        norm > 0.0 && self.axis.dot(direction) / norm >= self.cos_half_angle
    }
}

/// Where products survive roulette untouched.
#[derive(Clone, Debug)]
pub enum SurvivalRegion {
    /// Directions inside the bias cone.
    Cone(BiasCone),
    /// Rays that hit the acceptance volume.
    Acceptance(AcceptanceGate),
}

impl SurvivalRegion {
    /// Returns `true` if a product at `position` heading along `direction`
    /// is in the preferred region.
    #[inline]
    pub fn contains(&self, position: &Vec3, direction: &Vec3) -> bool {
        match self {
            SurvivalRegion::Cone(cone) => cone.contains(direction),
            SurvivalRegion::Acceptance(gate) => gate.accepts(position, direction),
        }
    }
}

/// Result of one roulette game.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum RouletteOutcome {
    /// In the preferred region; weight unchanged.
    Accepted,
    /// Outside the region and survived; weight multiplied by `multiplier`.
    Survived {
        /// Weight multiplier (the splitting factor).
        multiplier: f64,
    },
    /// Outside the region and killed.
    Killed,
}

impl RouletteOutcome {
    /// Factor applied to the product's weight.
    #[inline]
    pub fn weight_multiplier(&self) -> f64 {
        match self {
            RouletteOutcome::Accepted => 1.0,
            RouletteOutcome::Survived { multiplier } => *multiplier,
            RouletteOutcome::Killed => 0.0,
        }
    }
}

/// Angular Russian roulette for split products.
///
/// A product outside the survival region survives with probability
/// `1/factor` and then carries `factor` times its weight, so its expected
/// weight is unchanged. Layered on a `1/N` split this composes
/// multiplicatively: survivors are restored to the unsplit weight.
///
/// # Examples
///
/// ```rust
/// use bias_core::{TransportRng, Vec3};
/// use bias_engine::roulette::{AngularRoulette, BiasCone, RouletteOutcome, SurvivalRegion};
///
/// let cone = BiasCone::new(Vec3::z(), 5.0).unwrap();
/// let roulette = AngularRoulette::new(SurvivalRegion::Cone(cone), 10.0);
/// let mut rng = TransportRng::from_seed(1);
///
/// let inside = roulette.play(&Vec3::zeros(), &Vec3::z(), &mut rng);
/// assert_eq!(inside, RouletteOutcome::Accepted);
///
/// let outside = roulette.play(&Vec3::zeros(), &Vec3::x(), &mut rng);
/// assert_ne!(outside, RouletteOutcome::Accepted);
/// ```
#[derive(Clone, Debug)]
pub struct AngularRoulette {
    region: SurvivalRegion,
    factor: f64,
}

impl AngularRoulette {
    /// Creates a roulette with survival probability `1/factor`.
    pub fn new(region: SurvivalRegion, factor: f64) -> Self {
        Self { region, factor }
    }

    /// Survival region.
    #[inline]
    pub fn region(&self) -> &SurvivalRegion {
        &self.region
    }

    /// Inverse survival probability.
    #[inline]
    pub fn factor(&self) -> f64 {
        self.factor
    }

    /// Plays one game for a product at `position` heading along `direction`.
    pub fn play(&self, position: &Vec3, direction: &Vec3, rng: &mut TransportRng) -> RouletteOutcome {
        if self.factor <= 1.0 || self.region.contains(position, direction) {
            return RouletteOutcome::Accepted;
        }
        if rng.gen_uniform() * self.factor < 1.0 {
            RouletteOutcome::Survived {
                multiplier: self.factor,
            }
        } else {
            RouletteOutcome::Killed
        }
    }

    /// Plays one game for `track` and applies the outcome to its weight and
    /// status.
    pub fn apply(&self, track: &mut Track, rng: &mut TransportRng) -> RouletteOutcome {
        let outcome = self.play(&track.position, &track.direction, rng);
        match outcome {
            RouletteOutcome::Accepted => {}
            RouletteOutcome::Survived { multiplier } => track.weight *= multiplier,
            RouletteOutcome::Killed => {
                track.weight = 0.0;
                track.status = TrackStatus::StopAndKill;
            }
        }
        outcome
    }
}

/// Weight-threshold roulette.
///
/// A weight below `threshold` survives with probability `weight/threshold`
/// and is then raised to `threshold`. Returns the new weight, or `None` if
/// the track is killed. Weights at or above the threshold pass unchanged.
///
/// # Examples
///
/// ```rust
/// use bias_core::TransportRng;
/// use bias_engine::roulette::weight_roulette;
///
/// let mut rng = TransportRng::from_seed(3);
/// assert_eq!(weight_roulette(0.5, 0.1, &mut rng), Some(0.5));
/// match weight_roulette(0.01, 0.1, &mut rng) {
///     Some(w) => assert_eq!(w, 0.1),
///     None => {}
/// }
/// ```
pub fn weight_roulette(weight: f64, threshold: f64, rng: &mut TransportRng) -> Option<f64> {
    if weight >= threshold {
        return Some(weight);
    }
    if rng.gen_uniform() < weight / threshold {
        Some(threshold)
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use bias_core::{ParticleKind, TrackId};
    use proptest::prelude::*;

    #[test]
    fn test_cone_validation() {
        assert!(BiasCone::new(Vec3::zeros(), 10.0).is_err());
        assert!(BiasCone::new(Vec3::z(), 180.5).is_err());
        assert!(BiasCone::new(Vec3::z(), f64::NAN).is_err());
        let full = BiasCone::new(Vec3::z(), 180.0).unwrap();
        assert!(full.contains(&-Vec3::z()));
    }

    #[test]
    fn test_unit_factor_never_plays() {
        let cone = BiasCone::new(Vec3::z(), 1.0).unwrap();
        let roulette = AngularRoulette::new(SurvivalRegion::Cone(cone), 1.0);
        let mut rng = TransportRng::from_seed(1);
        for _ in 0..100 {
            assert_eq!(roulette.play(&Vec3::zeros(), &Vec3::x(), &mut rng), RouletteOutcome::Accepted);
        }
    }

    #[test]
    fn test_off_cone_expectation_preserved() {
        let factor = 8.0;
        let cone = BiasCone::new(Vec3::z(), 10.0).unwrap();
        let roulette = AngularRoulette::new(SurvivalRegion::Cone(cone), factor);
        let mut rng = TransportRng::from_seed(2024);

        let w_in = 0.25;
        let n = 400_000;
        let mut total = 0.0;
        let mut survivors = 0usize;
        for _ in 0..n {
            let outcome = roulette.play(&Vec3::zeros(), &Vec3::x(), &mut rng);
            if matches!(outcome, RouletteOutcome::Survived { .. }) {
                survivors += 1;
            }
            total += w_in * outcome.weight_multiplier();
        }
        let mean = total / n as f64;
        // E = w_in; standard error = w_in * sqrt(factor - 1) / sqrt(n).
        let se = w_in * (factor - 1.0).sqrt() / (n as f64).sqrt();
        assert!((mean - w_in).abs() < 4.0 * se, "mean {mean} vs {w_in}");
        assert_relative_eq!(survivors as f64 / n as f64, 1.0 / factor, epsilon = 0.005);
    }

    #[test]
    fn test_apply_kills_or_scales_track() {
        let cone = BiasCone::new(Vec3::z(), 10.0).unwrap();
        let roulette = AngularRoulette::new(SurvivalRegion::Cone(cone), 4.0);
        let mut rng = TransportRng::from_seed(5);
        for _ in 0..50 {
            let mut track = Track::new(TrackId(1), ParticleKind::Gamma, Vec3::zeros(), Vec3::x(), 1.0)
                .with_weight(0.25);
            match roulette.apply(&mut track, &mut rng) {
                RouletteOutcome::Survived { .. } => {
                    assert_relative_eq!(track.weight, 1.0);
                    assert!(track.is_alive());
                }
                RouletteOutcome::Killed => {
                    assert_eq!(track.weight, 0.0);
                    assert!(track.status.is_killed());
                }
                RouletteOutcome::Accepted => panic!("off-cone product accepted"),
            }
        }
    }

    #[test]
    fn test_weight_roulette_expectation() {
        let mut rng = TransportRng::from_seed(77);
        let n = 200_000;
        let total: f64 = (0..n)
            .map(|_| weight_roulette(0.02, 0.1, &mut rng).unwrap_or(0.0))
            .sum();
        assert_relative_eq!(total / n as f64, 0.02, max_relative = 0.03);
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(64))]

        #[test]
        fn prop_outcome_weights_are_zero_or_factor(seed in any::<u64>(), factor in 1.5f64..50.0) {
            let cone = BiasCone::new(Vec3::z(), 30.0).unwrap();
            let roulette = AngularRoulette::new(SurvivalRegion::Cone(cone), factor);
            let mut rng = TransportRng::from_seed(seed);
            let m = roulette.play(&Vec3::zeros(), &(-Vec3::z()), &mut rng).weight_multiplier();
            prop_assert!(m == 0.0 || m == factor);
        }
    }
}
