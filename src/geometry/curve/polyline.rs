use crate::error::{GeometryError, Result};
use crate::math::{Point3, Vector3, TOLERANCE};

use super::{Curve, CurveDomain};

/// A 3D polyline, used as the carrier of marched section curves.
///
/// The parameter is cumulative chord length: segment `i` spans
/// `[params[i], params[i + 1]]` and evaluation interpolates linearly
/// within it.
#[derive(Debug, Clone)]
pub struct Polyline {
    points: Vec<Point3>,
    params: Vec<f64>,
}

impl Polyline {
    /// Creates a polyline from an ordered point sequence.
    ///
    /// # Errors
    ///
    /// Returns an error if fewer than two points are given or the total
    /// chord length is degenerate.
    pub fn new(points: Vec<Point3>) -> Result<Self> {
        if points.len() < 2 {
            return Err(
                GeometryError::Degenerate("polyline needs at least two points".into()).into(),
            );
        }

        let mut params = Vec::with_capacity(points.len());
        let mut total = 0.0;
        params.push(0.0);
        for pair in points.windows(2) {
            total += (pair[1] - pair[0]).norm();
            params.push(total);
        }

        if total < TOLERANCE {
            return Err(GeometryError::Degenerate("zero-length polyline".into()).into());
        }

        Ok(Self { points, params })
    }

    /// Returns the vertex sequence.
    #[must_use]
    pub fn points(&self) -> &[Point3] {
        &self.points
    }

    /// Total chord length.
    #[must_use]
    pub fn length(&self) -> f64 {
        *self.params.last().unwrap_or(&0.0)
    }

    /// Segment index and local parameter for a global parameter.
    fn locate(&self, t: f64) -> (usize, f64) {
        let t = t.clamp(0.0, self.length());
        let idx = match self
            .params
            .binary_search_by(|v| v.partial_cmp(&t).unwrap_or(std::cmp::Ordering::Less))
        {
            Ok(i) => i.min(self.points.len() - 2),
            Err(i) => i.saturating_sub(1).min(self.points.len() - 2),
        };
        let span = self.params[idx + 1] - self.params[idx];
        let local = if span > 0.0 { (t - self.params[idx]) / span } else { 0.0 };
        (idx, local)
    }
}

impl Curve for Polyline {
    fn evaluate(&self, t: f64) -> Result<Point3> {
        let (idx, local) = self.locate(t);
        let a = self.points[idx];
        let b = self.points[idx + 1];
        Ok(a + (b - a) * local)
    }

    fn tangent(&self, t: f64) -> Result<Vector3> {
        let (idx, _) = self.locate(t);
        let dir = self.points[idx + 1] - self.points[idx];
        let len = dir.norm();
        if len < TOLERANCE {
            return Err(GeometryError::ZeroVector.into());
        }
        Ok(dir / len)
    }

    fn domain(&self) -> CurveDomain {
        CurveDomain::new(0.0, self.length())
    }

    fn is_closed(&self) -> bool {
        (self.points[0] - self.points[self.points.len() - 1]).norm() < TOLERANCE
    }

    fn closest_parameter(&self, point: &Point3) -> f64 {
        let mut best_t = 0.0;
        let mut best_dist = f64::INFINITY;
        for i in 0..self.points.len() - 1 {
            let a = self.points[i];
            let b = self.points[i + 1];
            let ab = b - a;
            let len_sq = ab.norm_squared();
            let local = if len_sq > 0.0 {
                ((point - a).dot(&ab) / len_sq).clamp(0.0, 1.0)
            } else {
                0.0
            };
            let candidate = a + ab * local;
            let dist = (point - candidate).norm_squared();
            if dist < best_dist {
                best_dist = dist;
                best_t = self.params[i] + (self.params[i + 1] - self.params[i]) * local;
            }
        }
        best_t
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn p(x: f64, y: f64, z: f64) -> Point3 {
        Point3::new(x, y, z)
    }

    fn l_shape() -> Polyline {
        Polyline::new(vec![p(0.0, 0.0, 0.0), p(2.0, 0.0, 0.0), p(2.0, 1.0, 0.0)]).unwrap()
    }

    #[test]
    fn parameter_is_chord_length() {
        let pl = l_shape();
        assert!((pl.length() - 3.0).abs() < TOLERANCE);
        let mid = pl.evaluate(2.5).unwrap();
        assert!((mid - p(2.0, 0.5, 0.0)).norm() < TOLERANCE);
    }

    #[test]
    fn tangent_follows_active_segment() {
        let pl = l_shape();
        let t = pl.tangent(2.5).unwrap();
        assert!((t - Vector3::new(0.0, 1.0, 0.0)).norm() < TOLERANCE);
    }

    #[test]
    fn closest_parameter_on_corner() {
        let pl = l_shape();
        let t = pl.closest_parameter(&p(2.5, -0.5, 0.0));
        assert!((t - 2.0).abs() < TOLERANCE);
    }

    #[test]
    fn single_point_is_rejected() {
        assert!(Polyline::new(vec![p(0.0, 0.0, 0.0)]).is_err());
    }
}
