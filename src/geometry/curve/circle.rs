use std::f64::consts::TAU;

use crate::error::{GeometryError, Result};
use crate::math::{Point3, Vector3, TOLERANCE};

use super::{Curve, CurveDomain};

/// A full circle in 3D space.
///
/// Defined by a center, radius, normal axis and a reference direction
/// for the zero angle. The parametric domain is `[0, 2*pi)` and the
/// curve is always closed.
///
/// `P(t) = center + radius * cos(t) * ref_dir + radius * sin(t) * binormal`
/// where `binormal = normal x ref_dir`.
#[derive(Debug, Clone)]
pub struct Circle {
    center: Point3,
    radius: f64,
    normal: Vector3,
    ref_dir: Vector3,
    binormal: Vector3,
}

impl Circle {
    /// Creates a new circle.
    ///
    /// # Errors
    ///
    /// Returns an error if the radius is non-positive, the normal is
    /// zero-length, or the reference direction is not perpendicular to
    /// the normal.
    pub fn new(center: Point3, radius: f64, normal: Vector3, ref_dir: Vector3) -> Result<Self> {
        if radius < TOLERANCE {
            return Err(GeometryError::Degenerate("circle radius must be positive".into()).into());
        }

        let normal_len = normal.norm();
        if normal_len < TOLERANCE {
            return Err(GeometryError::ZeroVector.into());
        }
        let normal = normal / normal_len;

        let ref_len = ref_dir.norm();
        if ref_len < TOLERANCE {
            return Err(GeometryError::ZeroVector.into());
        }
        let ref_dir = ref_dir / ref_len;

        if normal.dot(&ref_dir).abs() > TOLERANCE {
            return Err(GeometryError::Degenerate(
                "reference direction must be perpendicular to normal".into(),
            )
            .into());
        }

        let binormal = normal.cross(&ref_dir);
        Ok(Self {
            center,
            radius,
            normal,
            ref_dir,
            binormal,
        })
    }

    /// Creates a circle in the plane with the given normal, picking an
    /// arbitrary perpendicular reference direction.
    ///
    /// # Errors
    ///
    /// Returns an error if the radius is non-positive or the normal is
    /// zero-length.
    pub fn in_plane(center: Point3, radius: f64, normal: Vector3) -> Result<Self> {
        let len = normal.norm();
        if len < TOLERANCE {
            return Err(GeometryError::ZeroVector.into());
        }
        let n = normal / len;
        let reference = if n.x.abs() < 0.9 {
            Vector3::new(1.0, 0.0, 0.0)
        } else {
            Vector3::new(0.0, 1.0, 0.0)
        };
        let ref_dir = n.cross(&reference).normalize();
        Self::new(center, radius, n, ref_dir)
    }

    /// Returns the center of the circle.
    #[must_use]
    pub fn center(&self) -> &Point3 {
        &self.center
    }

    /// Returns the radius.
    #[must_use]
    pub fn radius(&self) -> f64 {
        self.radius
    }

    /// Returns the unit normal of the circle plane.
    #[must_use]
    pub fn circle_normal(&self) -> &Vector3 {
        &self.normal
    }
}

impl Curve for Circle {
    fn evaluate(&self, t: f64) -> Result<Point3> {
        Ok(self.center
            + self.ref_dir * (self.radius * t.cos())
            + self.binormal * (self.radius * t.sin()))
    }

    fn tangent(&self, t: f64) -> Result<Vector3> {
        Ok(self.ref_dir * (-t.sin()) + self.binormal * t.cos())
    }

    fn domain(&self) -> CurveDomain {
        CurveDomain::new(0.0, TAU)
    }

    fn is_closed(&self) -> bool {
        true
    }

    fn closest_parameter(&self, point: &Point3) -> f64 {
        // Project into the circle plane and take the polar angle.
        let diff = point - self.center;
        let u = diff.dot(&self.ref_dir);
        let v = diff.dot(&self.binormal);
        if u.abs() < TOLERANCE && v.abs() < TOLERANCE {
            return 0.0;
        }
        let angle = v.atan2(u);
        if angle < 0.0 {
            angle + TAU
        } else {
            angle
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::f64::consts::{FRAC_PI_2, PI};

    use super::*;

    fn unit_circle() -> Circle {
        Circle::new(
            Point3::origin(),
            1.0,
            Vector3::new(0.0, 0.0, 1.0),
            Vector3::new(1.0, 0.0, 0.0),
        )
        .unwrap()
    }

    #[test]
    fn evaluate_quarter_turn() {
        let c = unit_circle();
        let p = c.evaluate(FRAC_PI_2).unwrap();
        assert!((p - Point3::new(0.0, 1.0, 0.0)).norm() < 1e-12);
    }

    #[test]
    fn closest_parameter_is_polar_angle() {
        let c = unit_circle();
        let t = c.closest_parameter(&Point3::new(-2.0, 0.0, 0.5));
        assert!((t - PI).abs() < 1e-12);
    }

    #[test]
    fn skewed_reference_is_rejected() {
        assert!(Circle::new(
            Point3::origin(),
            1.0,
            Vector3::new(0.0, 0.0, 1.0),
            Vector3::new(0.0, 0.5, 1.0),
        )
        .is_err());
    }
}
