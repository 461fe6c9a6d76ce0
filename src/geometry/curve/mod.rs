mod circle;
mod line;
mod polyline;

pub use circle::Circle;
pub use line::Line;
pub use polyline::Polyline;

use crate::error::Result;
use crate::math::{Point3, Vector3};

/// Parameter domain for a curve.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CurveDomain {
    /// Start of the parameter range.
    pub t_min: f64,
    /// End of the parameter range.
    pub t_max: f64,
}

impl CurveDomain {
    /// Creates a new curve domain.
    #[must_use]
    pub fn new(t_min: f64, t_max: f64) -> Self {
        Self { t_min, t_max }
    }

    /// Clamps a parameter into the domain.
    #[must_use]
    pub fn clamp(&self, t: f64) -> f64 {
        t.clamp(self.t_min, self.t_max)
    }

    /// Whether `t` lies inside the domain, widened by `tol`.
    #[must_use]
    pub fn contains(&self, t: f64, tol: f64) -> bool {
        t >= self.t_min - tol && t <= self.t_max + tol
    }
}

/// Trait for parametric curves in 3D space.
///
/// This is the uniform evaluation surface the intersection handlers
/// work against; every edge carries one implementor.
pub trait Curve {
    /// Evaluates the curve at parameter `t`, returning the 3D point.
    ///
    /// # Errors
    ///
    /// Returns an error if the parameter is out of range or evaluation fails.
    fn evaluate(&self, t: f64) -> Result<Point3>;

    /// Computes the tangent vector at parameter `t`.
    ///
    /// # Errors
    ///
    /// Returns an error if the parameter is out of range or the tangent is degenerate.
    fn tangent(&self, t: f64) -> Result<Vector3>;

    /// Returns the parameter domain of the curve.
    fn domain(&self) -> CurveDomain;

    /// Returns whether the curve is closed.
    fn is_closed(&self) -> bool;

    /// Parameter of the point on the (unbounded) curve closest to `point`.
    fn closest_parameter(&self, point: &Point3) -> f64;
}
