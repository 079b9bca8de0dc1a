//! Transport steps.

use super::{Track, Vec3};

/// What limited a step (stored on its post-step point).
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum StepStatus {
    /// No step taken yet (fresh primary or secondary).
    #[default]
    Undefined,
    /// Step ended on a volume boundary.
    GeomBoundary,
    /// Step ended on the world boundary; the track leaves the simulation.
    WorldBoundary,
    /// Step ended at a discrete interaction.
    PostStepProcess,
    /// Step limited by a user limit (step limiter, time cut).
    UserLimit,
}

/// One end of a step.
#[derive(Clone, Debug, PartialEq)]
pub struct StepPoint {
    /// Position (mm).
    pub position: Vec3,
    /// Unit momentum direction.
    pub direction: Vec3,
    /// Kinetic energy (MeV).
    pub kinetic_energy: f64,
    /// Global time (ns).
    pub global_time: f64,
    /// Containing volume (`None` outside the world).
    pub volume: Option<String>,
    /// How this point was reached.
    pub status: StepStatus,
}

impl StepPoint {
    /// Captures a track's current state.
    pub fn of(track: &Track) -> Self {
        Self {
            position: track.position,
            direction: track.direction,
            kinetic_energy: track.kinetic_energy,
            global_time: track.global_time,
            volume: track.volume.clone(),
            status: track.last_step_status,
        }
    }
}

/// A completed transport step.
#[derive(Clone, Debug, PartialEq)]
pub struct Step {
    /// State at the start of the step.
    pub pre: StepPoint,
    /// State at the end of the step (before any final state is applied).
    pub post: StepPoint,
    /// True path length (mm).
    pub length: f64,
    /// Process whose interaction length limited the step, if any.
    pub limiting_process: Option<String>,
}

impl Step {
    /// Zero-length step at the track's current point.
    ///
    /// Used when an interaction is re-simulated from a stored snapshot.
    pub fn at_rest(track: &Track, process: &str) -> Self {
        let mut point = StepPoint::of(track);
        point.status = StepStatus::PostStepProcess;
        Self {
            pre: point.clone(),
            post: point,
            length: 0.0,
            limiting_process: Some(process.to_string()),
        }
    }

    /// Returns `true` if this step crossed out of `volume`.
    #[inline]
    pub fn exits(&self, volume: &str) -> bool {
        self.pre.volume.as_deref() == Some(volume)
            && self.post.volume.as_deref() != Some(volume)
            && matches!(
                self.post.status,
                StepStatus::GeomBoundary | StepStatus::WorldBoundary
            )
    }

    /// Returns `true` if the step ended on a boundary.
    #[inline]
    pub fn on_boundary(&self) -> bool {
        matches!(
            self.post.status,
            StepStatus::GeomBoundary | StepStatus::WorldBoundary
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{ParticleKind, TrackId};

    #[test]
    fn test_exit_detection() {
        let track = Track::new(TrackId(1), ParticleKind::Gamma, Vec3::zeros(), Vec3::z(), 1.0)
            .in_volume("slab");
        let mut post = StepPoint::of(&track);
        post.volume = Some("world".to_string());
        post.status = StepStatus::GeomBoundary;
        let step = Step {
            pre: StepPoint::of(&track),
            post,
            length: 5.0,
            limiting_process: None,
        };
        assert!(step.exits("slab"));
        assert!(!step.exits("world"));
        assert!(step.on_boundary());
    }

    #[test]
    fn test_at_rest_step() {
        let track = Track::new(TrackId(3), ParticleKind::Positron, Vec3::zeros(), Vec3::z(), 0.0);
        let step = Step::at_rest(&track, "annihil");
        assert_eq!(step.length, 0.0);
        assert_eq!(step.limiting_process.as_deref(), Some("annihil"));
        assert!(!step.on_boundary());
    }
}
