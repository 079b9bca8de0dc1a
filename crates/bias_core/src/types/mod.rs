//! Core value types shared across the workspace.
//!
//! This module provides:
//! - [`Vec3`] and [`Transform`]: nalgebra aliases used for positions,
//!   directions and world-to-local placements
//! - [`TrackId`], [`EventId`] and [`TrackIdAllocator`]: identity
//! - [`ParticleKind`]: the particle species the engine distinguishes
//! - [`Track`], [`Kinematics`], [`TrackStatus`]: particle instances
//! - [`Step`], [`StepPoint`], [`StepStatus`]: one transport step
//! - [`ParticleChange`]: the outcome of an interaction
//! - [`GeometryError`]: geometry lookup failures

pub mod error;
pub mod ids;
pub mod particle;
pub mod particle_change;
pub mod step;
pub mod track;

pub use error::{GeometryError, UnknownParticle};
pub use ids::{EventId, TrackId, TrackIdAllocator};
pub use particle::ParticleKind;
pub use particle_change::ParticleChange;
pub use step::{Step, StepPoint, StepStatus};
pub use track::{Kinematics, Track, TrackStatus};

/// Three-vector in millimetres (positions) or dimensionless (directions).
pub type Vec3 = nalgebra::Vector3<f64>;

/// Rigid placement mapping world coordinates into a volume's local frame.
pub type Transform = nalgebra::Isometry3<f64>;

/// Speed of light in mm/ns.
pub const SPEED_OF_LIGHT: f64 = 299.792_458;

/// Electron rest mass in MeV.
pub const ELECTRON_MASS: f64 = 0.510_998_95;

/// Returns `v` normalised, or the +z axis when `v` has no usable length.
///
/// Directions handed over by physics collaborators are renormalised with
/// this helper before they are stored on a track.
#[inline]
pub fn unit_or_z(v: Vec3) -> Vec3 {
    let norm = v.norm();
    if norm > f64::EPSILON && norm.is_finite() {
        v / norm
    } else {
        Vec3::z()
    }
}
