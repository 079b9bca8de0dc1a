//! Acceptance/direction gate.
//!
//! Decides whether a ray starting at a point would enter a target volume,
//! optionally within an incidence-angle tolerance. Used by primary sources
//! to reject directions that can never score, and by angular roulette as a
//! survival region. Calls are pure: the same position, direction and
//! placement always give the same decision.

use bias_core::{GeometryStore, PlacedVolume, TransportRng, Vec3};
use tracing::debug;

use crate::config::{AcceptanceConfig, ExhaustionPolicy};
use crate::error::ConfigError;

/// Outcome of sampling through the gate.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum GateSample {
    /// A trial passed.
    Accepted {
        /// Start position.
        position: Vec3,
        /// Unit direction.
        direction: Vec3,
        /// Trials rejected before this one.
        rejected: u32,
    },
    /// Every trial up to the cap was rejected.
    Exhausted {
        /// Trials rejected (equal to the cap).
        rejected: u32,
        /// What the source must do with the event.
        policy: ExhaustionPolicy,
    },
}

impl GateSample {
    /// Number of rejected trials.
    #[inline]
    pub fn rejected(&self) -> u32 {
        match self {
            GateSample::Accepted { rejected, .. } | GateSample::Exhausted { rejected, .. } => {
                *rejected
            }
        }
    }
}

/// Geometric acceptance test against one placed volume.
#[derive(Clone, Debug)]
pub struct AcceptanceGate {
    volume: PlacedVolume,
    min_cos_incidence: Option<f64>,
    max_trials: u32,
    exhaustion: ExhaustionPolicy,
}

impl AcceptanceGate {
    /// Resolves the target volume in `geometry`.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if the configuration is invalid or the volume
    /// is unknown.
    pub fn resolve(
        config: &AcceptanceConfig,
        geometry: &dyn GeometryStore,
    ) -> Result<Self, ConfigError> {
        config.validate()?;
        let volume = geometry.placed(&config.volume)?.clone();
        Ok(Self {
            volume,
            min_cos_incidence: config
                .max_incidence_angle_deg
                .map(|deg| deg.to_radians().cos()),
            max_trials: config.max_trials,
            exhaustion: config.exhaustion,
        })
    }

    /// Target volume name.
    #[inline]
    pub fn volume_name(&self) -> &str {
        self.volume.name()
    }

    /// Trial cap.
    #[inline]
    pub fn max_trials(&self) -> u32 {
        self.max_trials
    }

    /// Returns `true` if a ray from `position` along `direction` enters the
    /// volume within the incidence tolerance.
    ///
    /// Points already inside the volume are accepted without an incidence
    /// check.
    pub fn accepts(&self, position: &Vec3, direction: &Vec3) -> bool {
        if self.volume.contains(position) {
            return true;
        }
        let distance = self.volume.distance_to_in(position, direction);
        if !distance.is_finite() {
            return false;
        }
        match self.min_cos_incidence {
            None => true,
            Some(min_cos) => {
                let hit = position + direction * distance;
                let normal = self.volume.surface_normal(&hit);
                // Outward normal: an entering ray has a negative projection.
                -direction.dot(&normal) / direction.norm() >= min_cos
            }
        }
    }

    /// Draws `(position, direction)` pairs from `draw` until one passes or
    /// the trial cap is reached.
    pub fn sample<F>(&self, rng: &mut TransportRng, mut draw: F) -> GateSample
    where
        F: FnMut(&mut TransportRng) -> (Vec3, Vec3),
    {
        for rejected in 0..self.max_trials {
            let (position, direction) = draw(rng);
            if self.accepts(&position, &direction) {
                return GateSample::Accepted {
                    position,
                    direction,
                    rejected,
                };
            }
        }
        debug!(
            volume = self.volume.name(),
            trials = self.max_trials,
            "acceptance gate exhausted"
        );
        GateSample::Exhausted {
            rejected: self.max_trials,
            policy: self.exhaustion,
        }
    }
}
