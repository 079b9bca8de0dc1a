//! Axis-aligned box centred on the local origin.

use super::solid::{EInside, Solid, SURFACE_TOLERANCE};
use crate::types::Vec3;

/// Box with half-lengths `half` along the local axes.
///
/// # Examples
///
/// ```rust
/// use bias_core::geometry::{BoxSolid, EInside, Solid};
/// use bias_core::types::Vec3;
///
/// let slab = BoxSolid::new(Vec3::new(100.0, 100.0, 5.0));
///
/// let from = Vec3::new(0.0, 0.0, -20.0);
/// assert_eq!(slab.distance_to_in(&from, &Vec3::z()), 15.0);
/// assert_eq!(slab.distance_to_out(&Vec3::zeros(), &Vec3::z()), 5.0);
/// assert_eq!(slab.inside(&Vec3::zeros()), EInside::Inside);
/// ```
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct BoxSolid {
    half: Vec3,
}

impl BoxSolid {
    /// Creates a box from its half-lengths.
    pub fn new(half: Vec3) -> Self {
        Self { half }
    }

    /// Half-lengths.
    #[inline]
    pub fn half_lengths(&self) -> Vec3 {
        self.half
    }

    /// Signed distance from `point` to the surface (positive outside).
    #[inline]
    fn safety(&self, point: &Vec3) -> f64 {
        (point.x.abs() - self.half.x)
            .max(point.y.abs() - self.half.y)
            .max(point.z.abs() - self.half.z)
    }
}

impl Solid for BoxSolid {
    fn inside(&self, point: &Vec3) -> EInside {
        let dist = self.safety(point);
        if dist > SURFACE_TOLERANCE {
            EInside::Outside
        } else if dist > -SURFACE_TOLERANCE {
            EInside::Surface
        } else {
            EInside::Inside
        }
    }

    fn distance_to_in(&self, point: &Vec3, direction: &Vec3) -> f64 {
        let mut t_enter = f64::NEG_INFINITY;
        let mut t_leave = f64::INFINITY;

        for axis in 0..3 {
            let p = point[axis];
            let v = direction[axis];
            let h = self.half[axis];

            if v.abs() < f64::MIN_POSITIVE {
                // Parallel to this pair of faces: must already lie between them.
                if p.abs() >= h - SURFACE_TOLERANCE {
                    return f64::INFINITY;
                }
                continue;
            }

            let t1 = (-h - p) / v;
            let t2 = (h - p) / v;
            let (near, far) = if t1 < t2 { (t1, t2) } else { (t2, t1) };
            t_enter = t_enter.max(near);
            t_leave = t_leave.min(far);
        }

        if t_leave <= t_enter + SURFACE_TOLERANCE || t_leave <= SURFACE_TOLERANCE {
            return f64::INFINITY;
        }
        t_enter.max(0.0)
    }

    fn distance_to_out(&self, point: &Vec3, direction: &Vec3) -> f64 {
        let mut t_leave = f64::INFINITY;

        for axis in 0..3 {
            let v = direction[axis];
            if v.abs() < f64::MIN_POSITIVE {
                continue;
            }
            let target = self.half[axis].copysign(v);
            t_leave = t_leave.min((target - point[axis]) / v);
        }

        if t_leave.is_finite() {
            t_leave.max(0.0)
        } else {
            0.0
        }
    }

    fn surface_normal(&self, point: &Vec3) -> Vec3 {
        let mut best_axis = 0;
        let mut best = f64::NEG_INFINITY;
        for axis in 0..3 {
            let dist = point[axis].abs() - self.half[axis];
            if dist > best {
                best = dist;
                best_axis = axis;
            }
        }
        let mut normal = Vec3::zeros();
        normal[best_axis] = 1.0_f64.copysign(point[best_axis]);
        normal
    }

    fn degeneracy(&self) -> Option<String> {
        if self
            .half
            .iter()
            .any(|h| !h.is_finite() || *h <= SURFACE_TOLERANCE)
        {
            Some(format!(
                "box half-lengths ({}, {}, {}) must be finite and positive",
                self.half.x, self.half.y, self.half.z
            ))
        } else {
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn slab() -> BoxSolid {
        BoxSolid::new(Vec3::new(100.0, 100.0, 5.0))
    }

    #[test]
    fn test_inside_classification() {
        let solid = slab();
        assert_eq!(solid.inside(&Vec3::zeros()), EInside::Inside);
        assert_eq!(solid.inside(&Vec3::new(0.0, 0.0, 5.0)), EInside::Surface);
        assert_eq!(solid.inside(&Vec3::new(0.0, 0.0, 6.0)), EInside::Outside);
    }

    #[test]
    fn test_distance_to_in_hits_and_misses() {
        let solid = slab();
        let from = Vec3::new(0.0, 0.0, -10.0);
        assert_relative_eq!(solid.distance_to_in(&from, &Vec3::z()), 5.0);
        assert_eq!(solid.distance_to_in(&from, &(-Vec3::z())), f64::INFINITY);

        // Oblique ray entering through the lower face.
        let dir = Vec3::new(1.0, 0.0, 1.0).normalize();
        assert_relative_eq!(
            solid.distance_to_in(&from, &dir),
            5.0 * 2.0_f64.sqrt(),
            epsilon = 1e-12
        );

        // Parallel ray outside the faces.
        let beside = Vec3::new(0.0, 0.0, 20.0);
        assert_eq!(solid.distance_to_in(&beside, &Vec3::x()), f64::INFINITY);
    }

    #[test]
    fn test_distance_to_out() {
        let solid = slab();
        assert_relative_eq!(solid.distance_to_out(&Vec3::zeros(), &Vec3::z()), 5.0);
        assert_relative_eq!(
            solid.distance_to_out(&Vec3::new(0.0, 0.0, -5.0), &Vec3::z()),
            10.0
        );
        let dir = Vec3::new(0.0, 1.0, 1.0).normalize();
        assert_relative_eq!(
            solid.distance_to_out(&Vec3::zeros(), &dir),
            5.0 * 2.0_f64.sqrt(),
            epsilon = 1e-12
        );
    }

    #[test]
    fn test_surface_normal() {
        let solid = slab();
        assert_eq!(solid.surface_normal(&Vec3::new(1.0, 2.0, 5.0)), Vec3::z());
        assert_eq!(solid.surface_normal(&Vec3::new(1.0, 2.0, -5.0)), -Vec3::z());
        assert_eq!(solid.surface_normal(&Vec3::new(100.0, 0.0, 0.0)), Vec3::x());
    }

    #[test]
    fn test_degenerate_box() {
        assert!(BoxSolid::new(Vec3::new(1.0, 1.0, 0.0)).degeneracy().is_some());
        assert!(slab().degeneracy().is_none());
    }
}
