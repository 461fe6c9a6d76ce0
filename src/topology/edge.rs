use crate::geometry::curve::{Circle, Curve, Line, Polyline};
use crate::math::{Point3, Vector3, VERTEX_TOLERANCE};

use super::vertex::VertexId;

slotmap::new_key_type! {
    /// Unique identifier for an edge in the topology store.
    pub struct EdgeId;
}

/// The geometric curve associated with an edge.
#[derive(Debug, Clone)]
pub enum EdgeCurve {
    /// A line segment.
    Line(Line),
    /// A circle (or circular arc, via the parameter range).
    Circle(Circle),
    /// A polyline, carrying marched section curves.
    Polyline(Polyline),
}

impl EdgeCurve {
    /// Evaluates the underlying curve at parameter `t`.
    ///
    /// # Errors
    ///
    /// Returns an error if evaluation fails for the parameter.
    pub fn evaluate(&self, t: f64) -> crate::error::Result<Point3> {
        match self {
            Self::Line(c) => c.evaluate(t),
            Self::Circle(c) => c.evaluate(t),
            Self::Polyline(c) => c.evaluate(t),
        }
    }

    /// Tangent of the underlying curve at parameter `t`.
    ///
    /// # Errors
    ///
    /// Returns an error if the tangent is degenerate at the parameter.
    pub fn tangent(&self, t: f64) -> crate::error::Result<Vector3> {
        match self {
            Self::Line(c) => c.tangent(t),
            Self::Circle(c) => c.tangent(t),
            Self::Polyline(c) => c.tangent(t),
        }
    }

    /// Parameter of the closest point on the unbounded curve.
    #[must_use]
    pub fn closest_parameter(&self, point: &Point3) -> f64 {
        match self {
            Self::Line(c) => c.closest_parameter(point),
            Self::Circle(c) => c.closest_parameter(point),
            Self::Polyline(c) => c.closest_parameter(point),
        }
    }
}

/// Data associated with a topological edge.
///
/// An edge connects two vertices and carries a geometric curve bounded
/// to the `[t_start, t_end]` parameter range.
#[derive(Debug, Clone)]
pub struct EdgeData {
    /// Start vertex of the edge.
    pub start: VertexId,
    /// End vertex of the edge.
    pub end: VertexId,
    /// The geometric curve defining this edge's shape.
    pub curve: EdgeCurve,
    /// Parameter on the curve corresponding to the start vertex.
    pub t_start: f64,
    /// Parameter on the curve corresponding to the end vertex.
    pub t_end: f64,
    /// Tolerance tube radius around the curve.
    pub tolerance: f64,
}

impl EdgeData {
    /// Creates an edge with the default tolerance.
    #[must_use]
    pub fn new(start: VertexId, end: VertexId, curve: EdgeCurve, t_start: f64, t_end: f64) -> Self {
        Self {
            start,
            end,
            curve,
            t_start,
            t_end,
            tolerance: VERTEX_TOLERANCE,
        }
    }
}
