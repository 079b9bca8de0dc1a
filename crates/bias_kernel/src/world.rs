//! Slab world geometry and navigation.
//!
//! The world is a vacuum box holding a water slab centred on the origin
//! (faces normal to z) and, optionally, a thin vacuum detector plane
//! downstream of it. Only the slab carries matter. Navigation is the
//! minimum needed by a straight-line kernel: locate a point, and measure
//! the distance to the next boundary along a ray.

use std::sync::Arc;

use bias_core::{BoxSolid, GeometryStore, PlacedVolume, Transform, Vec3, VolumeStore};

use crate::error::KernelError;
use crate::scenario::{DetectorSettings, SlabSettings};

/// Name of the mother volume.
pub const WORLD: &str = "world";

/// Name of the water slab.
pub const SLAB: &str = "slab";

/// Name of the detector plane.
pub const DETECTOR: &str = "detector";

/// Distance a track is pushed past a boundary it has just reached (mm).
pub const BOUNDARY_PUSH: f64 = 1e-6;

/// Clearance between the outermost component and the world walls (mm).
const WORLD_MARGIN: f64 = 10.0;

/// World box, slab and optional detector.
#[derive(Clone, Debug)]
pub struct SlabWorld {
    store: VolumeStore,
    world: PlacedVolume,
    daughters: Vec<PlacedVolume>,
    slab_half_thickness: f64,
}

impl SlabWorld {
    /// Builds the world around the slab, the detector and a source point.
    ///
    /// # Errors
    ///
    /// Returns [`KernelError::Geometry`] for boxes of zero extent.
    pub fn build(
        slab: &SlabSettings,
        detector: Option<&DetectorSettings>,
        source: &Vec3,
    ) -> Result<Self, KernelError> {
        let half_t = 0.5 * slab.thickness;
        let slab_volume = PlacedVolume::new(
            SLAB,
            Arc::new(BoxSolid::new(Vec3::new(
                slab.half_width,
                slab.half_width,
                half_t,
            ))),
            Transform::identity(),
        )?;

        let mut daughters = Vec::with_capacity(2);
        let mut half_xy = slab.half_width;
        let mut z_far = half_t;
        if let Some(det) = detector {
            let centre = half_t + det.distance + 0.5 * det.thickness;
            daughters.push(PlacedVolume::new(
                DETECTOR,
                Arc::new(BoxSolid::new(Vec3::new(
                    det.half_width,
                    det.half_width,
                    0.5 * det.thickness,
                ))),
                Transform::translation(0.0, 0.0, -centre),
            )?);
            half_xy = half_xy.max(det.half_width);
            z_far = z_far.max(centre + 0.5 * det.thickness);
        }
        daughters.push(slab_volume);

        half_xy = half_xy.max(source.x.abs()).max(source.y.abs());
        z_far = z_far.max(source.z.abs());
        let world = PlacedVolume::new(
            WORLD,
            Arc::new(BoxSolid::new(Vec3::new(
                half_xy + WORLD_MARGIN,
                half_xy + WORLD_MARGIN,
                z_far + WORLD_MARGIN,
            ))),
            Transform::identity(),
        )?;

        let mut store = VolumeStore::new().with_volume(world.clone());
        for daughter in &daughters {
            store.insert(daughter.clone());
        }
        Ok(Self {
            store,
            world,
            daughters,
            slab_half_thickness: half_t,
        })
    }

    /// Name of the innermost volume containing `point`, or `None` outside
    /// the world.
    pub fn locate(&self, point: &Vec3) -> Option<&str> {
        if let Some(daughter) = self.daughters.iter().find(|v| v.contains(point)) {
            return Some(daughter.name());
        }
        self.world.contains(point).then_some(WORLD)
    }

    /// Distance along `direction` to the next boundary, given the volume
    /// the point is in.
    pub fn distance_to_boundary(
        &self,
        point: &Vec3,
        direction: &Vec3,
        volume: Option<&str>,
    ) -> f64 {
        match volume {
            None => 0.0,
            Some(WORLD) => self
                .daughters
                .iter()
                .map(|v| v.distance_to_in(point, direction))
                .fold(self.world.distance_to_out(point, direction), f64::min),
            Some(name) => self
                .daughters
                .iter()
                .find(|v| v.name() == name)
                .map_or(0.0, |v| v.distance_to_out(point, direction)),
        }
    }

    /// Returns `true` for the volume that carries matter.
    #[inline]
    pub fn has_material(&self, volume: Option<&str>) -> bool {
        volume == Some(SLAB)
    }

    /// Returns `true` if a detector plane was placed.
    #[inline]
    pub fn has_detector(&self) -> bool {
        self.daughters.iter().any(|v| v.name() == DETECTOR)
    }

    /// z of the slab's downstream face.
    #[inline]
    pub fn downstream_face(&self) -> f64 {
        self.slab_half_thickness
    }

    /// Placed-volume store seen by the engine.
    #[inline]
    pub fn store(&self) -> &VolumeStore {
        &self.store
    }
}

impl GeometryStore for SlabWorld {
    fn volume(&self, name: &str) -> Option<&PlacedVolume> {
        self.store.volume(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn world(detector: bool) -> SlabWorld {
        let slab = SlabSettings {
            thickness: 10.0,
            half_width: 100.0,
        };
        let det = DetectorSettings {
            distance: 20.0,
            thickness: 2.0,
            half_width: 50.0,
        };
        SlabWorld::build(
            &slab,
            detector.then_some(&det),
            &Vec3::new(0.0, 0.0, -30.0),
        )
        .unwrap()
    }

    #[test]
    fn test_locate() {
        let w = world(true);
        assert_eq!(w.locate(&Vec3::zeros()), Some(SLAB));
        assert_eq!(w.locate(&Vec3::new(0.0, 0.0, -20.0)), Some(WORLD));
        assert_eq!(w.locate(&Vec3::new(0.0, 0.0, 26.0)), Some(DETECTOR));
        assert_eq!(w.locate(&Vec3::new(0.0, 0.0, 1000.0)), None);
    }

    #[test]
    fn test_distance_from_source_to_slab() {
        let w = world(false);
        let d = w.distance_to_boundary(&Vec3::new(0.0, 0.0, -30.0), &Vec3::z(), Some(WORLD));
        assert_relative_eq!(d, 25.0, epsilon = 1e-9);
    }

    #[test]
    fn test_distance_across_slab() {
        let w = world(true);
        let d = w.distance_to_boundary(&Vec3::new(0.0, 0.0, -5.0), &Vec3::z(), Some(SLAB));
        assert_relative_eq!(d, 10.0, epsilon = 1e-9);
        // From the downstream face to the detector.
        let d = w.distance_to_boundary(
            &Vec3::new(0.0, 0.0, 5.0 + BOUNDARY_PUSH),
            &Vec3::z(),
            Some(WORLD),
        );
        assert_relative_eq!(d, 20.0, epsilon = 1e-5);
    }

    #[test]
    fn test_only_slab_has_material() {
        let w = world(true);
        assert!(w.has_material(Some(SLAB)));
        assert!(!w.has_material(Some(WORLD)));
        assert!(!w.has_material(Some(DETECTOR)));
        assert!(w.has_detector());
        assert!(w.volume(SLAB).is_some());
        assert_eq!(w.downstream_face(), 5.0);
    }
}
