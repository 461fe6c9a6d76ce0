use std::f64::consts::TAU;

use crate::error::{GeometryError, Result};
use crate::math::{Point3, Vector3, TOLERANCE};

use super::{Surface, SurfaceDomain};

/// A cylindrical surface in 3D space.
///
/// Defined by a point on the axis, radius, axis direction and a
/// reference direction for u = 0.
///
/// `P(u, v) = center + radius * cos(u) * ref_dir + radius * sin(u) * binormal + v * axis`
/// where `binormal = axis x ref_dir`. The outward normal is the radial
/// direction.
#[derive(Debug, Clone)]
pub struct Cylinder {
    center: Point3,
    radius: f64,
    axis: Vector3,
    ref_dir: Vector3,
    binormal: Vector3,
}

impl Cylinder {
    /// Creates a new cylinder.
    ///
    /// # Errors
    ///
    /// Returns an error if the radius is non-positive, the axis is
    /// zero-length, or the reference direction is not perpendicular to
    /// the axis.
    pub fn new(center: Point3, radius: f64, axis: Vector3, ref_dir: Vector3) -> Result<Self> {
        if radius < TOLERANCE {
            return Err(
                GeometryError::Degenerate("cylinder radius must be positive".into()).into(),
            );
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

    /// Returns a point on the cylinder axis.
    #[must_use]
    pub fn center(&self) -> &Point3 {
        &self.center
    }

    /// Returns the radius.
    #[must_use]
    pub fn radius(&self) -> f64 {
        self.radius
    }

    /// Returns the unit axis direction.
    #[must_use]
    pub fn axis(&self) -> &Vector3 {
        &self.axis
    }

    /// Distance of a point from the axis.
    #[must_use]
    pub fn radial_distance(&self, point: &Point3) -> f64 {
        let diff = point - self.center;
        let along = diff.dot(&self.axis);
        (diff - self.axis * along).norm()
    }
}

impl Surface for Cylinder {
    fn evaluate(&self, u: f64, v: f64) -> Result<Point3> {
        Ok(self.center
            + self.ref_dir * (self.radius * u.cos())
            + self.binormal * (self.radius * u.sin())
            + self.axis * v)
    }

    fn normal(&self, u: f64, _v: f64) -> Result<Vector3> {
        Ok(self.ref_dir * u.cos() + self.binormal * u.sin())
    }

    fn domain(&self) -> SurfaceDomain {
        SurfaceDomain::new(0.0, TAU, f64::NEG_INFINITY, f64::INFINITY)
    }

    fn signed_distance(&self, point: &Point3) -> f64 {
        self.radial_distance(point) - self.radius
    }

    fn project(&self, point: &Point3) -> (f64, f64) {
        let diff = point - self.center;
        let v = diff.dot(&self.axis);
        let radial = diff - self.axis * v;
        let x = radial.dot(&self.ref_dir);
        let y = radial.dot(&self.binormal);
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
        (u, v)
    }
}
