//! Geometry seams consumed by the engine.
//!
//! The engine never navigates. It asks two questions of the host geometry:
//! where a named volume sits (`world_to_local`) and how far a straight ray
//! travels before entering or leaving a solid (`distance_to_in`,
//! `distance_to_out`).
//!
//! ## Module Structure
//!
//! - [`solid`]: the [`Solid`] trait and [`EInside`]
//! - [`box_solid`]: axis-aligned box implementation
//! - [`store`]: [`PlacedVolume`], [`GeometryStore`] and the map-backed [`VolumeStore`]

pub mod box_solid;
pub mod solid;
pub mod store;

pub use box_solid::BoxSolid;
pub use solid::{EInside, Solid, SURFACE_TOLERANCE};
pub use store::{GeometryStore, PlacedVolume, VolumeStore};
