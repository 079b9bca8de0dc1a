//! Primary generation.

use bias_core::{ParticleKind, Track, TrackId, TransportRng, Vec3};
use bias_engine::config::ExhaustionPolicy;
use bias_engine::{BiasingWorker, GateSample};

/// Monoenergetic point source, either a pencil beam or isotropic.
#[derive(Clone, Debug, PartialEq)]
pub struct Source {
    particle: ParticleKind,
    energy: f64,
    position: Vec3,
    direction: Option<Vec3>,
}

/// Outcome of one source event.
#[derive(Clone, Debug, PartialEq)]
pub struct PrimaryDraw {
    /// The primary to transport, if any.
    pub primary: Option<Track>,
    /// Source trials that produced no primary and score zero.
    pub empty_trials: u64,
}

impl Source {
    /// Creates a source; `direction: None` means isotropic emission.
    pub fn new(particle: ParticleKind, energy: f64, position: Vec3, direction: Option<Vec3>) -> Self {
        Self {
            particle,
            energy,
            position,
            direction,
        }
    }

    /// Species emitted.
    #[inline]
    pub fn particle(&self) -> ParticleKind {
        self.particle
    }

    /// Draws one `(position, direction)` pair.
    pub fn draw(&self, rng: &mut TransportRng) -> (Vec3, Vec3) {
        let direction = match self.direction {
            Some(direction) => direction,
            None => rng.isotropic_direction(),
        };
        (self.position, direction)
    }

    /// Generates the primary of one event, through the acceptance gate
    /// when the biasing worker configures one.
    ///
    /// Rejected gate trials are returned as empty trials. On exhaustion
    /// the event either has no primary or, under
    /// [`ExhaustionPolicy::ZeroEnergy`], a zero-energy primary standing in
    /// for the last trial.
    pub fn generate(
        &self,
        biasing: Option<&mut BiasingWorker>,
        rng: &mut TransportRng,
        id: TrackId,
    ) -> PrimaryDraw {
        let sample = biasing.and_then(|worker| worker.gate_primary(rng, |r| self.draw(r)));
        match sample {
            None => {
                let (position, direction) = self.draw(rng);
                PrimaryDraw {
                    primary: Some(self.primary(id, position, direction, self.energy)),
                    empty_trials: 0,
                }
            }
            Some(GateSample::Accepted {
                position,
                direction,
                rejected,
            }) => PrimaryDraw {
                primary: Some(self.primary(id, position, direction, self.energy)),
                empty_trials: u64::from(rejected),
            },
            Some(GateSample::Exhausted {
                rejected,
                policy: ExhaustionPolicy::SkipEvent,
            }) => PrimaryDraw {
                primary: None,
                empty_trials: u64::from(rejected),
            },
            Some(GateSample::Exhausted {
                rejected,
                policy: ExhaustionPolicy::ZeroEnergy,
            }) => {
                let direction = self.direction.unwrap_or_else(Vec3::z);
                PrimaryDraw {
                    primary: Some(self.primary(id, self.position, direction, 0.0)),
                    empty_trials: u64::from(rejected).saturating_sub(1),
                }
            }
        }
    }

    fn primary(&self, id: TrackId, position: Vec3, direction: Vec3, energy: f64) -> Track {
        Track::new(id, self.particle, position, direction, energy)
    }
}
