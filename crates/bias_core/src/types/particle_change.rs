//! Interaction outcomes.

use super::{unit_or_z, Track, TrackStatus, Vec3};

/// Outcome of an interaction, proposed to the host kernel.
///
/// Every field left at `None` means "unchanged". Each secondary carries its
/// own weight; the kernel assigns secondary identifiers when it stacks them.
/// The local energy deposit is scored with the track's pre-interaction
/// weight.
///
/// # Examples
///
/// ```rust
/// use bias_core::types::{ParticleChange, ParticleKind, Track, TrackId, TrackStatus, Vec3};
///
/// let mut track = Track::new(TrackId(1), ParticleKind::Gamma, Vec3::zeros(), Vec3::z(), 1.0);
///
/// let mut change = ParticleChange::new();
/// change.propose_energy(0.4);
/// change.propose_direction(Vec3::x());
/// change.apply_to(&mut track);
///
/// assert_eq!(track.kinetic_energy, 0.4);
/// assert_eq!(track.status, TrackStatus::Alive);
/// ```
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ParticleChange {
    status: TrackStatus,
    energy: Option<f64>,
    direction: Option<Vec3>,
    polarization: Option<Vec3>,
    weight: Option<f64>,
    local_energy_deposit: f64,
    secondaries: Vec<Track>,
    declined: bool,
}

impl ParticleChange {
    /// An outcome that leaves the track alive and unchanged.
    pub fn new() -> Self {
        Self::default()
    }

    /// An interaction the process declined to perform.
    ///
    /// Integral-approach processes reject a fraction of sampled interaction
    /// points to follow the cross-section variation along a step.
    pub fn declined() -> Self {
        Self {
            declined: true,
            ..Self::default()
        }
    }

    /// An outcome that stops and kills the track.
    pub fn kill() -> Self {
        Self {
            status: TrackStatus::StopAndKill,
            energy: Some(0.0),
            ..Self::default()
        }
    }

    /// Returns `true` if the process declined the interaction.
    #[inline]
    pub fn is_declined(&self) -> bool {
        self.declined
    }

    /// Proposed status.
    #[inline]
    pub fn status(&self) -> TrackStatus {
        self.status
    }

    /// Proposes a new status.
    #[inline]
    pub fn propose_status(&mut self, status: TrackStatus) {
        self.status = status;
    }

    /// Proposed kinetic energy.
    #[inline]
    pub fn energy(&self) -> Option<f64> {
        self.energy
    }

    /// Proposes a new kinetic energy.
    #[inline]
    pub fn propose_energy(&mut self, energy: f64) {
        self.energy = Some(energy);
    }

    /// Proposed direction.
    #[inline]
    pub fn direction(&self) -> Option<Vec3> {
        self.direction
    }

    /// Proposes a new direction (normalised on storage).
    #[inline]
    pub fn propose_direction(&mut self, direction: Vec3) {
        self.direction = Some(unit_or_z(direction));
    }

    /// Proposed polarisation.
    #[inline]
    pub fn polarization(&self) -> Option<Vec3> {
        self.polarization
    }

    /// Proposes a new polarisation.
    #[inline]
    pub fn propose_polarization(&mut self, polarization: Vec3) {
        self.polarization = Some(polarization);
    }

    /// Proposed parent weight.
    #[inline]
    pub fn weight(&self) -> Option<f64> {
        self.weight
    }

    /// Proposes a new parent weight.
    #[inline]
    pub fn propose_weight(&mut self, weight: f64) {
        self.weight = Some(weight);
    }

    /// Energy deposited locally at the interaction point (MeV).
    #[inline]
    pub fn local_energy_deposit(&self) -> f64 {
        self.local_energy_deposit
    }

    /// Sets the local energy deposit.
    #[inline]
    pub fn propose_local_energy_deposit(&mut self, energy: f64) {
        self.local_energy_deposit = energy;
    }

    /// Secondaries produced by the interaction.
    #[inline]
    pub fn secondaries(&self) -> &[Track] {
        &self.secondaries
    }

    /// Mutable access to the secondaries.
    #[inline]
    pub fn secondaries_mut(&mut self) -> &mut Vec<Track> {
        &mut self.secondaries
    }

    /// Adds a secondary.
    #[inline]
    pub fn add_secondary(&mut self, secondary: Track) {
        self.secondaries.push(secondary);
    }

    /// Moves the secondaries out, leaving none behind.
    #[inline]
    pub fn take_secondaries(&mut self) -> Vec<Track> {
        std::mem::take(&mut self.secondaries)
    }

    /// Multiplies the parent's weight, every secondary weight and the
    /// local deposit by `factor`.
    ///
    /// `parent_weight` is the parent's current weight, used when no weight
    /// has been proposed yet.
    pub fn scale_weights(&mut self, parent_weight: f64, factor: f64) {
        let base = self.weight.unwrap_or(parent_weight);
        self.weight = Some(base * factor);
        self.local_energy_deposit *= factor;
        for secondary in &mut self.secondaries {
            secondary.weight *= factor;
        }
    }

    /// Total weight carried by the secondaries.
    pub fn secondary_weight(&self) -> f64 {
        self.secondaries.iter().map(|t| t.weight).sum()
    }

    /// Writes the proposed parent state into `track`.
    ///
    /// Secondaries are left in place for the kernel to stack.
    pub fn apply_to(&self, track: &mut Track) {
        if let Some(energy) = self.energy {
            track.kinetic_energy = energy;
        }
        if let Some(direction) = self.direction {
            track.direction = direction;
        }
        if let Some(polarization) = self.polarization {
            track.polarization = polarization;
        }
        if let Some(weight) = self.weight {
            track.weight = weight;
        }
        track.status = self.status;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{ParticleKind, TrackId};
    use approx::assert_relative_eq;

    fn gamma(weight: f64) -> Track {
        Track::new(TrackId(1), ParticleKind::Gamma, Vec3::zeros(), Vec3::z(), 1.0)
            .with_weight(weight)
    }

    #[test]
    fn test_scale_weights_defaults_to_parent_weight() {
        let parent = gamma(2.0);
        let mut change = ParticleChange::new();
        change.add_secondary(Track::secondary(
            &parent,
            ParticleKind::Electron,
            parent.kinematics(),
            2.0,
            "compt",
        ));
        change.propose_local_energy_deposit(0.2);
        change.scale_weights(parent.weight, 0.25);

        assert_relative_eq!(change.weight().unwrap(), 0.5);
        assert_relative_eq!(change.secondary_weight(), 0.5);
        assert_relative_eq!(change.local_energy_deposit(), 0.05);
    }

    #[test]
    fn test_kill_outcome() {
        let mut track = gamma(1.0);
        ParticleChange::kill().apply_to(&mut track);
        assert!(track.status.is_killed());
        assert_eq!(track.kinetic_energy, 0.0);
    }

    #[test]
    fn test_declined_outcome_changes_nothing() {
        let mut track = gamma(1.0);
        let before = track.clone();
        let change = ParticleChange::declined();
        assert!(change.is_declined());
        change.apply_to(&mut track);
        assert_eq!(track, before);
    }

    #[test]
    fn test_take_secondaries() {
        let parent = gamma(1.0);
        let mut change = ParticleChange::new();
        change.add_secondary(Track::secondary(
            &parent,
            ParticleKind::Electron,
            parent.kinematics(),
            1.0,
            "phot",
        ));
        assert_eq!(change.take_secondaries().len(), 1);
        assert!(change.secondaries().is_empty());
    }
}
