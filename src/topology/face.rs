use crate::geometry::surface::{Cylinder, Plane, Sphere, Surface};
use crate::math::{Point3, Vector3, VERTEX_TOLERANCE};

use super::wire::WireId;

slotmap::new_key_type! {
    /// Unique identifier for a face in the topology store.
    pub struct FaceId;
}

/// The geometric surface associated with a face.
#[derive(Debug, Clone)]
pub enum FaceSurface {
    /// A planar surface.
    Plane(Plane),
    /// A cylindrical surface.
    Cylinder(Cylinder),
    /// A spherical surface.
    Sphere(Sphere),
}

impl FaceSurface {
    /// Signed distance from a point, positive on the outward-normal side
    /// of the underlying surface.
    #[must_use]
    pub fn signed_distance(&self, point: &Point3) -> f64 {
        match self {
            Self::Plane(s) => s.signed_distance(point),
            Self::Cylinder(s) => s.signed_distance(point),
            Self::Sphere(s) => s.signed_distance(point),
        }
    }

    /// Surface normal at the parameters of the point closest to `point`.
    ///
    /// # Errors
    ///
    /// Returns an error if the normal is degenerate there.
    pub fn normal_near(&self, point: &Point3) -> crate::error::Result<Vector3> {
        match self {
            Self::Plane(s) => {
                let (u, v) = s.project(point);
                s.normal(u, v)
            }
            Self::Cylinder(s) => {
                let (u, v) = s.project(point);
                s.normal(u, v)
            }
            Self::Sphere(s) => {
                let (u, v) = s.project(point);
                s.normal(u, v)
            }
        }
    }
}

/// Data associated with a topological face.
///
/// A face is a bounded region on a surface, defined by an outer wire
/// and optionally inner wires (holes).
#[derive(Debug, Clone)]
pub struct FaceData {
    /// The geometric surface on which this face lies.
    pub surface: FaceSurface,
    /// The outer boundary wire.
    pub outer_wire: WireId,
    /// Inner boundary wires (holes).
    pub inner_wires: Vec<WireId>,
    /// If `true`, the face normal agrees with the surface normal.
    pub same_sense: bool,
    /// Tolerance shell thickness around the surface.
    pub tolerance: f64,
}

impl FaceData {
    /// Creates a face with the default tolerance.
    #[must_use]
    pub fn new(surface: FaceSurface, outer_wire: WireId, inner_wires: Vec<WireId>) -> Self {
        Self {
            surface,
            outer_wire,
            inner_wires,
            same_sense: true,
            tolerance: VERTEX_TOLERANCE,
        }
    }
}
