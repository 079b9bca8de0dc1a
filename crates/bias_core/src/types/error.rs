//! Error types for geometry lookups and name parsing.

use thiserror::Error;

/// Geometry-store and solid errors.
///
/// # Examples
/// ```
/// use bias_core::types::GeometryError;
///
/// let err = GeometryError::UnknownVolume("slab".to_string());
/// assert_eq!(format!("{}", err), "Unknown volume: slab");
/// ```
#[derive(Debug, Clone, PartialEq, Error)]
pub enum GeometryError {
    /// No placed volume with this name exists in the store.
    #[error("Unknown volume: {0}")]
    UnknownVolume(String),

    /// Solid with zero (or non-finite) extent along some axis.
    #[error("Degenerate solid for volume '{volume}': {reason}")]
    DegenerateSolid {
        /// Volume name.
        volume: String,
        /// What makes the solid unusable.
        reason: String,
    },
}

/// Unrecognised particle name.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Unknown particle name: {0}")]
pub struct UnknownParticle(pub String);
