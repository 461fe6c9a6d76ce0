use std::f64::consts::{FRAC_PI_2, TAU};

use crate::error::{GeometryError, Result};
use crate::math::{Point3, Vector3, TOLERANCE};

use super::{Surface, SurfaceDomain};

/// A spherical surface in 3D space.
///
/// Defined by a center, radius, axis (north pole direction) and a
/// reference direction for the equator at u = 0.
///
/// `P(u, v) = center + r * cos(v) * cos(u) * ref_dir + r * cos(v) * sin(u) * binormal + r * sin(v) * axis`
///
/// Parameters: `u` = longitude `[0, 2*pi)`, `v` = latitude
/// `[-pi/2, pi/2]`. The outward normal is `(P - center) / radius`.
#[derive(Debug, Clone)]
pub struct Sphere {
    center: Point3,
    radius: f64,
    axis: Vector3,
    ref_dir: Vector3,
    binormal: Vector3,
}

impl Sphere {
    /// Creates a new sphere.
    ///
    /// # Errors
    ///
    /// Returns an error if the radius is non-positive, the axis is
    /// zero-length, or the reference direction is not perpendicular to
    /// the axis.
    pub fn new(center: Point3, radius: f64, axis: Vector3, ref_dir: Vector3) -> Result<Self> {
        if radius < TOLERANCE {
            return Err(GeometryError::Degenerate("sphere radius must be positive".into()).into());
        }

        let axis_len = axis.norm();
        if axis_len < TOLERANCE {
            return Err(GeometryError::ZeroVector.into());
        }
        let axis = axis / axis_len;

        let ref_len = ref_dir.norm();
        if ref_len < TOLERANCE {
            return Err(GeometryError::ZeroVector.into());
        }
        let ref_dir = ref_dir / ref_len;

        if axis.dot(&ref_dir).abs() > TOLERANCE {
            return Err(GeometryError::Degenerate(
                "reference direction must be perpendicular to axis".into(),
            )
            .into());
        }

        let binormal = axis.cross(&ref_dir);
        Ok(Self {
            center,
            radius,
            axis,
            ref_dir,
            binormal,
        })
    }

    /// Creates a sphere with the default axis frame.
    ///
    /// # Errors
    ///
    /// Returns an error if the radius is non-positive.
    pub fn from_center(center: Point3, radius: f64) -> Result<Self> {
        Self::new(
            center,
            radius,
            Vector3::new(0.0, 0.0, 1.0),
            Vector3::new(1.0, 0.0, 0.0),
        )
    }

    /// Returns the center of the sphere.
    #[must_use]
    pub fn center(&self) -> &Point3 {
        &self.center
    }

    /// Returns the radius.
    #[must_use]
    pub fn radius(&self) -> f64 {
        self.radius
    }
}

impl Surface for Sphere {
    fn evaluate(&self, u: f64, v: f64) -> Result<Point3> {
        let cos_v = v.cos();
        Ok(self.center
            + self.ref_dir * (self.radius * cos_v * u.cos())
            + self.binormal * (self.radius * cos_v * u.sin())
            + self.axis * (self.radius * v.sin()))
    }

    fn normal(&self, u: f64, v: f64) -> Result<Vector3> {
        let p = self.evaluate(u, v)?;
        let diff = p - self.center;
        let len = diff.norm();
        if len < TOLERANCE {
            return Err(GeometryError::ZeroVector.into());
        }
        Ok(diff / len)
    }

    fn domain(&self) -> SurfaceDomain {
        SurfaceDomain::new(0.0, TAU, -FRAC_PI_2, FRAC_PI_2)
    }

    fn signed_distance(&self, point: &Point3) -> f64 {
        (point - self.center).norm() - self.radius
    }

    fn project(&self, point: &Point3) -> (f64, f64) {
        let diff = point - self.center;
        let x = diff.dot(&self.ref_dir);
        let y = diff.dot(&self.binormal);
        let z = diff.dot(&self.axis);

        let u = if x.abs() < TOLERANCE && y.abs() < TOLERANCE {
            0.0
        } else {
            let angle = y.atan2(x);
            if angle < 0.0 {
                angle + TAU
            } else {
                angle
            }
        };
        let v = z.atan2(x.hypot(y));
        (u, v)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn signed_distance_from_center() {
        let s = Sphere::from_center(Point3::new(1.0, 0.0, 0.0), 2.0).unwrap();
        assert!((s.signed_distance(&Point3::new(4.0, 0.0, 0.0)) - 1.0).abs() < TOLERANCE);
        assert!((s.signed_distance(&Point3::new(1.0, 0.0, 0.0)) + 2.0).abs() < TOLERANCE);
    }

    #[test]
    fn project_pole() {
        let s = Sphere::from_center(Point3::origin(), 1.0).unwrap();
        let (_, v) = s.project(&Point3::new(0.0, 0.0, 5.0));
        assert!((v - FRAC_PI_2).abs() < TOLERANCE);
    }

    #[test]
    fn project_roundtrips() {
        let s = Sphere::from_center(Point3::origin(), 2.0).unwrap();
        let target = Point3::new(1.0, 1.0, 1.0);
        let (u, v) = s.project(&target);
        let q = s.evaluate(u, v).unwrap();
        // q is the closest surface point: collinear with center and target.
        let dir = (target - Point3::origin()).normalize();
        assert!((q - Point3::origin() - dir * 2.0).norm() < 1e-12);
    }
}
