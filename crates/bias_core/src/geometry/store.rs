//! Placed volumes and the geometry store seam.

use std::collections::HashMap;
use std::sync::Arc;

use nalgebra::Point3;

use super::solid::{EInside, Solid};
use crate::types::{GeometryError, Transform, Vec3};

/// A named solid placed in the world.
///
/// World-frame helpers transform their arguments into the local frame
/// before querying the solid.
#[derive(Clone, Debug)]
pub struct PlacedVolume {
    name: String,
    solid: Arc<dyn Solid>,
    world_to_local: Transform,
}

impl PlacedVolume {
    /// Places `solid` under `name`.
    ///
    /// # Errors
    ///
    /// Returns [`GeometryError::DegenerateSolid`] if the solid reports a
    /// degeneracy (for instance a box of zero thickness).
    pub fn new(
        name: impl Into<String>,
        solid: Arc<dyn Solid>,
        world_to_local: Transform,
    ) -> Result<Self, GeometryError> {
        let name = name.into();
        if let Some(reason) = solid.degeneracy() {
            return Err(GeometryError::DegenerateSolid {
                volume: name,
                reason,
            });
        }
        Ok(Self {
            name,
            solid,
            world_to_local,
        })
    }

    /// Volume name.
    #[inline]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The placed solid.
    #[inline]
    pub fn solid(&self) -> &dyn Solid {
        self.solid.as_ref()
    }

    /// World-to-local placement.
    #[inline]
    pub fn world_to_local(&self) -> Transform {
        self.world_to_local
    }

    /// Maps a world point into the local frame.
    #[inline]
    pub fn local_point(&self, point: &Vec3) -> Vec3 {
        self.world_to_local
            .transform_point(&Point3::from(*point))
            .coords
    }

    /// Maps a world direction into the local frame.
    #[inline]
    pub fn local_direction(&self, direction: &Vec3) -> Vec3 {
        self.world_to_local.transform_vector(direction)
    }

    /// Classifies a world point.
    pub fn inside(&self, point: &Vec3) -> EInside {
        self.solid.inside(&self.local_point(point))
    }

    /// Returns `true` for points inside or on the surface.
    pub fn contains(&self, point: &Vec3) -> bool {
        self.inside(point) != EInside::Outside
    }

    /// World-frame distance to entry along `direction`.
    pub fn distance_to_in(&self, point: &Vec3, direction: &Vec3) -> f64 {
        self.solid
            .distance_to_in(&self.local_point(point), &self.local_direction(direction))
    }

    /// World-frame distance to exit along `direction`.
    pub fn distance_to_out(&self, point: &Vec3, direction: &Vec3) -> f64 {
        self.solid
            .distance_to_out(&self.local_point(point), &self.local_direction(direction))
    }

    /// Outward unit normal in the world frame.
    pub fn surface_normal(&self, point: &Vec3) -> Vec3 {
        let local = self.solid.surface_normal(&self.local_point(point));
        self.world_to_local.inverse_transform_vector(&local)
    }
}

/// Lookup of placed volumes by name.
pub trait GeometryStore {
    /// Returns the volume called `name`, if any.
    fn volume(&self, name: &str) -> Option<&PlacedVolume>;

    /// Returns the volume called `name`.
    ///
    /// # Errors
    ///
    /// Returns [`GeometryError::UnknownVolume`] if no such volume exists.
    fn placed(&self, name: &str) -> Result<&PlacedVolume, GeometryError> {
        self.volume(name)
            .ok_or_else(|| GeometryError::UnknownVolume(name.to_string()))
    }

    /// World-to-local placement of the volume called `name`.
    ///
    /// # Errors
    ///
    /// Returns [`GeometryError::UnknownVolume`] if no such volume exists.
    fn world_to_local(&self, name: &str) -> Result<Transform, GeometryError> {
        self.placed(name).map(PlacedVolume::world_to_local)
    }
}

/// Map-backed [`GeometryStore`].
///
/// # Examples
///
/// ```rust
/// use std::sync::Arc;
/// use bias_core::geometry::{BoxSolid, GeometryStore, PlacedVolume, VolumeStore};
/// use bias_core::types::{Transform, Vec3};
///
/// let slab = PlacedVolume::new(
///     "slab",
///     Arc::new(BoxSolid::new(Vec3::new(100.0, 100.0, 5.0))),
///     Transform::identity(),
/// )
/// .unwrap();
///
/// let store = VolumeStore::new().with_volume(slab);
/// assert!(store.volume("slab").is_some());
/// assert!(store.world_to_local("detector").is_err());
/// ```
#[derive(Clone, Debug, Default)]
pub struct VolumeStore {
    volumes: HashMap<String, PlacedVolume>,
}

impl VolumeStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts a volume, replacing any volume of the same name.
    pub fn insert(&mut self, volume: PlacedVolume) {
        self.volumes.insert(volume.name().to_string(), volume);
    }

    /// Inserts a volume (builder style).
    pub fn with_volume(mut self, volume: PlacedVolume) -> Self {
        self.insert(volume);
        self
    }

    /// Number of volumes.
    pub fn len(&self) -> usize {
        self.volumes.len()
    }

    /// Returns `true` if the store holds no volumes.
    pub fn is_empty(&self) -> bool {
        self.volumes.is_empty()
    }
}

impl GeometryStore for VolumeStore {
    fn volume(&self, name: &str) -> Option<&PlacedVolume> {
        self.volumes.get(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::BoxSolid;
    use approx::assert_relative_eq;
    use nalgebra::{Translation3, UnitQuaternion};

    fn shifted_slab() -> PlacedVolume {
        // Slab centred at z = 50 in the world.
        let world_to_local = Transform::from_parts(
            Translation3::new(0.0, 0.0, -50.0),
            UnitQuaternion::identity(),
        );
        PlacedVolume::new(
            "slab",
            Arc::new(BoxSolid::new(Vec3::new(100.0, 100.0, 5.0))),
            world_to_local,
        )
        .unwrap()
    }

    #[test]
    fn test_world_frame_queries() {
        let slab = shifted_slab();
        let origin = Vec3::zeros();
        assert_relative_eq!(slab.distance_to_in(&origin, &Vec3::z()), 45.0);
        assert!(slab.contains(&Vec3::new(0.0, 0.0, 50.0)));
        assert!(!slab.contains(&origin));
        assert_relative_eq!(
            slab.distance_to_out(&Vec3::new(0.0, 0.0, 50.0), &Vec3::z()),
            5.0
        );
    }

    #[test]
    fn test_rotated_normal() {
        let rotation = UnitQuaternion::from_axis_angle(&Vec3::x_axis(), std::f64::consts::FRAC_PI_2);
        let volume = PlacedVolume::new(
            "tilted",
            Arc::new(BoxSolid::new(Vec3::new(1.0, 1.0, 1.0))),
            Transform::from_parts(Translation3::identity(), rotation),
        )
        .unwrap();
        let normal = volume.surface_normal(&Vec3::new(0.0, 1.0, 0.0));
        assert_relative_eq!(normal.norm(), 1.0, epsilon = 1e-12);
        assert_relative_eq!(normal.y.abs(), 1.0, epsilon = 1e-12);
    }

    #[test]
    fn test_degenerate_volume_rejected() {
        let result = PlacedVolume::new(
            "flat",
            Arc::new(BoxSolid::new(Vec3::new(1.0, 1.0, 0.0))),
            Transform::identity(),
        );
        assert!(matches!(
            result,
            Err(GeometryError::DegenerateSolid { ref volume, .. }) if volume == "flat"
        ));
    }

    #[test]
    fn test_unknown_volume() {
        let store = VolumeStore::new().with_volume(shifted_slab());
        assert_eq!(store.len(), 1);
        assert_eq!(
            store.world_to_local("missing"),
            Err(GeometryError::UnknownVolume("missing".to_string()))
        );
    }
}
