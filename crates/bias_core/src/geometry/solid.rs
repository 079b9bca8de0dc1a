//! Solid representation trait.

use std::fmt;

use crate::types::Vec3;

/// Half-thickness of a solid's surface (mm).
pub const SURFACE_TOLERANCE: f64 = 1e-9;

/// Classification of a point against a solid.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum EInside {
    /// Strictly inside.
    Inside,
    /// Within [`SURFACE_TOLERANCE`] of the surface.
    Surface,
    /// Strictly outside.
    Outside,
}

/// Solid in its own local frame.
///
/// All arguments and results are local coordinates; `direction` arguments
/// are unit vectors.
pub trait Solid: Send + Sync + fmt::Debug {
    /// Classifies `point`.
    fn inside(&self, point: &Vec3) -> EInside;

    /// Distance along `direction` from an outside `point` to the surface.
    ///
    /// Returns `f64::INFINITY` when the ray misses, `0.0` for points already
    /// inside or on the surface and entering.
    fn distance_to_in(&self, point: &Vec3, direction: &Vec3) -> f64;

    /// Distance along `direction` from an inside `point` to the surface.
    ///
    /// Returns `0.0` for points outside or on the surface and leaving.
    fn distance_to_out(&self, point: &Vec3, direction: &Vec3) -> f64;

    /// Outward unit normal at (or nearest to) a surface `point`.
    fn surface_normal(&self, point: &Vec3) -> Vec3;

    /// Describes why the solid is unusable, if it is.
    fn degeneracy(&self) -> Option<String> {
        None
    }
}
