use crate::math::{Point3, VERTEX_TOLERANCE};

slotmap::new_key_type! {
    /// Unique identifier for a vertex in the topology store.
    pub struct VertexId;
}

/// Data associated with a topological vertex.
#[derive(Debug, Clone)]
pub struct VertexData {
    /// The 3D position of the vertex.
    pub point: Point3,
    /// Confusion tolerance: points within this distance are this vertex.
    pub tolerance: f64,
}

impl VertexData {
    /// Creates a new vertex at the given point with the default tolerance.
    #[must_use]
    pub fn new(point: Point3) -> Self {
        Self {
            point,
            tolerance: VERTEX_TOLERANCE,
        }
    }

    /// Creates a new vertex with an explicit tolerance.
    #[must_use]
    pub fn with_tolerance(point: Point3, tolerance: f64) -> Self {
        Self { point, tolerance }
    }
}
