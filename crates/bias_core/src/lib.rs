//! # Bias Core (Layer 1: Foundation)
//!
//! Shared data model and collaborator seams for the variance-reduction engine.
//!
//! ## Layer 1 Role
//!
//! bias_core holds everything the engine needs to talk about a transport
//! simulation without owning one:
//! - Track, step and particle-change types ([`types`])
//! - Solid and geometry-store traits with a box implementation ([`geometry`])
//! - Interaction-process and physics-list traits ([`physics`])
//! - Seeded random number generation ([`rng`])
//!
//! The host transport kernel owns track lifetime, navigation and physics
//! models; this crate only describes the shapes exchanged across that
//! boundary.
//!
//! ## Units
//!
//! Lengths are in millimetres, energies in MeV, times in nanoseconds and
//! interaction rates (macroscopic cross-sections) in inverse millimetres.
//!
//! ## Usage Example
//!
//! ```rust
//! use bias_core::types::{ParticleKind, Track, TrackId, Vec3};
//!
//! let track = Track::new(
//!     TrackId(1),
//!     ParticleKind::Gamma,
//!     Vec3::new(0.0, 0.0, -50.0),
//!     Vec3::new(0.0, 0.0, 1.0),
//!     1.0,
//! );
//! assert_eq!(track.weight, 1.0);
//! assert!(track.is_alive());
//! ```

#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![allow(unknown_lints)]

pub mod geometry;
pub mod physics;
pub mod rng;
pub mod types;

// Re-export commonly used items for convenience
pub use geometry::{BoxSolid, EInside, GeometryStore, PlacedVolume, Solid, VolumeStore};
pub use physics::{InteractionProcess, PhysicsList, ProcessList};
pub use rng::TransportRng;
pub use types::{
    EventId, GeometryError, Kinematics, ParticleChange, ParticleKind, Step, StepPoint,
    StepStatus, Track, TrackId, TrackIdAllocator, TrackStatus, Transform, UnknownParticle, Vec3,
};
