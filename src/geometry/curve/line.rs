use crate::error::{GeometryError, Result};
use crate::math::{intersect_3d::project_point_on_line, Point3, Vector3, TOLERANCE};

use super::{Curve, CurveDomain};

/// An infinite line defined by an origin point and a unit direction.
///
/// The parametric form is: `P(t) = origin + t * direction`, so the
/// parameter is arc length.
#[derive(Debug, Clone)]
pub struct Line {
    origin: Point3,
    direction: Vector3,
}

impl Line {
    /// Creates a new line from an origin and direction.
    ///
    /// # Errors
    ///
    /// Returns an error if the direction vector is zero-length.
    pub fn new(origin: Point3, direction: Vector3) -> Result<Self> {
        let len = direction.norm();
        if len < TOLERANCE {
            return Err(GeometryError::ZeroVector.into());
        }
        Ok(Self {
            origin,
            direction: direction / len,
        })
    }

    /// Creates the line through two points.
    ///
    /// # Errors
    ///
    /// Returns an error if the points coincide.
    pub fn through(a: Point3, b: Point3) -> Result<Self> {
        Self::new(a, b - a)
    }

    /// Returns the origin point of the line.
    #[must_use]
    pub fn origin(&self) -> &Point3 {
        &self.origin
    }

    /// Returns the unit direction vector of the line.
    #[must_use]
    pub fn direction(&self) -> &Vector3 {
        &self.direction
    }
}

impl Curve for Line {
    fn evaluate(&self, t: f64) -> Result<Point3> {
        Ok(self.origin + self.direction * t)
    }

    fn tangent(&self, _t: f64) -> Result<Vector3> {
        Ok(self.direction)
    }

    fn domain(&self) -> CurveDomain {
        CurveDomain::new(f64::NEG_INFINITY, f64::INFINITY)
    }

    fn is_closed(&self) -> bool {
        false
    }

    fn closest_parameter(&self, point: &Point3) -> f64 {
        project_point_on_line(point, &self.origin, &self.direction)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn parameter_is_arc_length() {
        let line = Line::new(Point3::new(1.0, 0.0, 0.0), Vector3::new(0.0, 3.0, 0.0)).unwrap();
        let p = line.evaluate(2.0).unwrap();
        assert!((p - Point3::new(1.0, 2.0, 0.0)).norm() < TOLERANCE);
    }

    #[test]
    fn closest_parameter_projects() {
        let line = Line::new(Point3::origin(), Vector3::new(1.0, 0.0, 0.0)).unwrap();
        let t = line.closest_parameter(&Point3::new(4.0, 5.0, -2.0));
        assert!((t - 4.0).abs() < TOLERANCE);
    }

    #[test]
    fn zero_direction_is_rejected() {
        assert!(Line::new(Point3::origin(), Vector3::zeros()).is_err());
    }
}
