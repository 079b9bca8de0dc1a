//! Particle tracks.

use super::step::StepStatus;
use super::{unit_or_z, ParticleKind, TrackId, Vec3, SPEED_OF_LIGHT};

/// Track status as seen by the host kernel.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum TrackStatus {
    /// Being transported.
    #[default]
    Alive,
    /// Put back on the stack; tracking resumes later in the same event.
    Suspended,
    /// Killed at the end of the current step; secondaries survive.
    StopAndKill,
    /// Killed together with the secondaries produced in the current step.
    KillTrackAndSecondaries,
}

impl TrackStatus {
    /// Returns `true` for both kill variants.
    #[inline]
    pub fn is_killed(&self) -> bool {
        matches!(
            self,
            TrackStatus::StopAndKill | TrackStatus::KillTrackAndSecondaries
        )
    }
}

/// Kinematic snapshot of a track.
///
/// Used to record the state immediately before an interaction so the
/// interaction can be re-simulated later.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Kinematics {
    /// Position (mm).
    pub position: Vec3,
    /// Unit momentum direction.
    pub direction: Vec3,
    /// Kinetic energy (MeV).
    pub kinetic_energy: f64,
    /// Polarisation vector.
    pub polarization: Vec3,
    /// Global time (ns).
    pub global_time: f64,
}

/// A physical particle instance.
///
/// The host kernel owns track lifetime. Engine-side state is kept in
/// side-tables keyed by [`TrackId`], never inside the track.
#[derive(Clone, Debug, PartialEq)]
pub struct Track {
    /// Unique (per event) identifier.
    pub id: TrackId,
    /// Parent identifier; `None` for primaries.
    pub parent_id: Option<TrackId>,
    /// Species.
    pub particle: ParticleKind,
    /// Position (mm).
    pub position: Vec3,
    /// Unit momentum direction.
    pub direction: Vec3,
    /// Kinetic energy (MeV).
    pub kinetic_energy: f64,
    /// Polarisation vector.
    pub polarization: Vec3,
    /// Global time (ns).
    pub global_time: f64,
    /// Statistical weight.
    pub weight: f64,
    /// Kernel-facing status.
    pub status: TrackStatus,
    /// Name of the process that created this track.
    pub creator_process: Option<String>,
    /// Name of the volume currently containing the track.
    pub volume: Option<String>,
    /// Status of the step that brought the track to its current point.
    pub last_step_status: StepStatus,
    /// Number of steps taken so far.
    pub step_number: u32,
}

impl Track {
    /// Creates a primary track of unit weight.
    pub fn new(
        id: TrackId,
        particle: ParticleKind,
        position: Vec3,
        direction: Vec3,
        kinetic_energy: f64,
    ) -> Self {
        Self {
            id,
            parent_id: None,
            particle,
            position,
            direction: unit_or_z(direction),
            kinetic_energy,
            polarization: Vec3::zeros(),
            global_time: 0.0,
            weight: 1.0,
            status: TrackStatus::Alive,
            creator_process: None,
            volume: None,
            last_step_status: StepStatus::Undefined,
            step_number: 0,
        }
    }

    /// Creates an unassigned secondary born at `kinematics`.
    ///
    /// The secondary inherits the parent's volume; its first step is not a
    /// boundary entry.
    pub fn secondary(
        parent: &Track,
        particle: ParticleKind,
        kinematics: Kinematics,
        weight: f64,
        creator_process: &str,
    ) -> Self {
        Self {
            id: TrackId::UNASSIGNED,
            parent_id: Some(parent.id),
            particle,
            position: kinematics.position,
            direction: unit_or_z(kinematics.direction),
            kinetic_energy: kinematics.kinetic_energy,
            polarization: kinematics.polarization,
            global_time: kinematics.global_time,
            weight,
            status: TrackStatus::Alive,
            creator_process: Some(creator_process.to_string()),
            volume: parent.volume.clone(),
            last_step_status: StepStatus::Undefined,
            step_number: 0,
        }
    }

    /// Sets the weight (builder style).
    #[inline]
    pub fn with_weight(mut self, weight: f64) -> Self {
        self.weight = weight;
        self
    }

    /// Sets the current volume (builder style).
    #[inline]
    pub fn in_volume(mut self, volume: impl Into<String>) -> Self {
        self.volume = Some(volume.into());
        self
    }

    /// Returns `true` while the kernel should keep transporting the track.
    #[inline]
    pub fn is_alive(&self) -> bool {
        self.status == TrackStatus::Alive
    }

    /// Returns `true` if the track is currently inside `volume`.
    #[inline]
    pub fn is_in(&self, volume: &str) -> bool {
        self.volume.as_deref() == Some(volume)
    }

    /// Returns `true` if the previous step ended on the entry boundary of
    /// `volume`, i.e. the track has just crossed into it.
    #[inline]
    pub fn entered_through_boundary(&self, volume: &str) -> bool {
        self.is_in(volume) && self.last_step_status == StepStatus::GeomBoundary
    }

    /// Current kinematic snapshot.
    #[inline]
    pub fn kinematics(&self) -> Kinematics {
        Kinematics {
            position: self.position,
            direction: self.direction,
            kinetic_energy: self.kinetic_energy,
            polarization: self.polarization,
            global_time: self.global_time,
        }
    }

    /// Overwrites the kinematic state from a snapshot.
    pub fn restore_kinematics(&mut self, kinematics: &Kinematics) {
        self.position = kinematics.position;
        self.direction = unit_or_z(kinematics.direction);
        self.kinetic_energy = kinematics.kinetic_energy;
        self.polarization = kinematics.polarization;
        self.global_time = kinematics.global_time;
    }

    /// Speed in mm/ns.
    pub fn speed(&self) -> f64 {
        let mass = self.particle.mass();
        if mass == 0.0 {
            return SPEED_OF_LIGHT;
        }
        let gamma = (self.kinetic_energy + mass) / mass;
        SPEED_OF_LIGHT * (1.0 - 1.0 / (gamma * gamma)).max(0.0).sqrt()
    }

    /// Moves the track `distance` mm along its direction and advances time.
    pub fn advance(&mut self, distance: f64) {
        self.position += self.direction * distance;
        let speed = self.speed();
        if speed > 0.0 {
            self.global_time += distance / speed;
        }
    }
}
