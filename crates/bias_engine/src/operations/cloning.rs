//! Cloning operation.

use bias_core::{ParticleChange, Track};

/// Creator-process label carried by clones.
pub const CLONE_CREATOR: &str = "biasing-clone";

/// Produces exactly one copy of a track, with caller-chosen weights for
/// the original and the copy.
///
/// The two weights need not sum to the original weight: forced collision
/// zeroes the original (its weight is restored at region exit by free
/// flight) and gives the full weight to the copy.
///
/// # Examples
///
/// ```rust
/// use bias_core::{ParticleKind, Track, TrackId, Vec3};
/// use bias_engine::operations::CloningOperation;
///
/// let track = Track::new(TrackId(1), ParticleKind::Gamma, Vec3::zeros(), Vec3::z(), 1.0)
///     .with_weight(0.5);
///
/// let mut cloning = CloningOperation::new();
/// cloning.set_clone_weights(0.0, track.weight);
/// let change = cloning.generate(&track);
///
/// assert_eq!(change.weight(), Some(0.0));
/// assert_eq!(change.secondaries().len(), 1);
/// assert_eq!(change.secondaries()[0].weight, 0.5);
/// ```
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct CloningOperation {
    original_weight: f64,
    clone_weight: f64,
}

impl Default for CloningOperation {
    fn default() -> Self {
        Self {
            original_weight: 1.0,
            clone_weight: 1.0,
        }
    }
}

impl CloningOperation {
    /// Creates a cloning operation with unit weights.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the weights given to the original and to the copy.
    #[inline]
    pub fn set_clone_weights(&mut self, original: f64, clone: f64) {
        self.original_weight = original;
        self.clone_weight = clone;
    }

    /// Weights `(original, clone)`.
    #[inline]
    pub fn clone_weights(&self) -> (f64, f64) {
        (self.original_weight, self.clone_weight)
    }

    /// Final state: the original re-weighted, the copy as sole secondary.
    ///
    /// The copy shares the original's kinematics and volume; its first step
    /// is not a boundary entry, so it is never cloned again on arrival.
    pub fn generate(&self, track: &Track) -> ParticleChange {
        let mut change = ParticleChange::new();
        change.propose_weight(self.original_weight);
        change.add_secondary(Track::secondary(
            track,
            track.particle,
            track.kinematics(),
            self.clone_weight,
            CLONE_CREATOR,
        ));
        change
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bias_core::{ParticleKind, StepStatus, TrackId, Vec3};

    #[test]
    fn test_clone_shares_kinematics() {
        let mut track = Track::new(
            TrackId(7),
            ParticleKind::Gamma,
            Vec3::new(1.0, 2.0, 3.0),
            Vec3::new(0.0, 1.0, 1.0),
            0.8,
        )
        .in_volume("slab");
        track.last_step_status = StepStatus::GeomBoundary;
        track.global_time = 4.0;

        let mut cloning = CloningOperation::new();
        cloning.set_clone_weights(0.0, 2.0);
        let change = cloning.generate(&track);

        let clone = &change.secondaries()[0];
        assert_eq!(clone.kinematics(), track.kinematics());
        assert_eq!(clone.parent_id, Some(TrackId(7)));
        assert!(clone.is_in("slab"));
        assert!(!clone.entered_through_boundary("slab"));
        assert_eq!(clone.creator_process.as_deref(), Some(CLONE_CREATOR));
        assert_eq!(clone.weight, 2.0);
        assert_eq!(change.weight(), Some(0.0));
        assert!(change.status() == bias_core::TrackStatus::Alive);
    }
}
