//! Low-level shape construction from geometry plus topology.
//!
//! This is the collaborator seam the boolean engine consumes: thin
//! command structs that assemble store entities without any feature
//! logic. `make_box` exists because nearly every test needs one.

use crate::error::{Result, TopologyError};
use crate::geometry::curve::Line;
use crate::geometry::surface::Plane;
use crate::math::{polygon_3d::polygon_area_3d, Point3, Vector3, TOLERANCE};
use crate::topology::{
    EdgeCurve, EdgeData, FaceData, FaceId, FaceSurface, OrientedEdge, ShellData, ShellId,
    SolidData, SolidId, TopologyStore, VertexData, VertexId, WireData, WireId,
};

/// Creates a closed polygonal wire from a sequence of 3D points.
pub struct MakeWire {
    points: Vec<Point3>,
}

impl MakeWire {
    /// Creates a new `MakeWire` operation.
    #[must_use]
    pub fn new(points: Vec<Point3>) -> Self {
        Self { points }
    }

    /// Executes the operation, creating vertices, line edges and the
    /// closed wire in the store.
    ///
    /// # Errors
    ///
    /// Returns an error if fewer than three points are given or two
    /// consecutive points coincide.
    pub fn execute(&self, store: &mut TopologyStore) -> Result<WireId> {
        let n = self.points.len();
        if n < 3 {
            return Err(TopologyError::InvalidTopology(
                "a closed wire needs at least three points".into(),
            )
            .into());
        }

        let vertex_ids: Vec<VertexId> = self
            .points
            .iter()
            .map(|p| store.add_vertex(VertexData::new(*p)))
            .collect();

        let mut edges = Vec::with_capacity(n);
        for i in 0..n {
            let j = (i + 1) % n;
            let edge = make_line_edge(
                store,
                vertex_ids[i],
                vertex_ids[j],
                self.points[i],
                self.points[j],
            )?;
            edges.push(OrientedEdge::new(edge, true));
        }

        Ok(store.add_wire(WireData {
            edges,
            is_closed: true,
        }))
    }
}

/// Creates a planar face from an outer wire and optional hole wires.
pub struct MakeFace {
    outer_wire: WireId,
    inner_wires: Vec<WireId>,
}

impl MakeFace {
    /// Creates a new `MakeFace` operation.
    #[must_use]
    pub fn new(outer_wire: WireId, inner_wires: Vec<WireId>) -> Self {
        Self {
            outer_wire,
            inner_wires,
        }
    }

    /// Executes the operation, deriving the support plane from the wire
    /// polygon (Newell's method) and creating the face.
    ///
    /// # Errors
    ///
    /// Returns an error if the wire is open, too short, or degenerate
    /// (zero area).
    pub fn execute(&self, store: &mut TopologyStore) -> Result<FaceId> {
        let wire = store.wire(self.outer_wire)?;
        if !wire.is_closed {
            return Err(TopologyError::WireNotClosed.into());
        }

        let polygon = store.wire_polygon(self.outer_wire)?;
        let normal = newell_normal(&polygon);
        if normal.norm() < TOLERANCE {
            return Err(
                TopologyError::InvalidTopology("face boundary has zero area".into()).into(),
            );
        }

        let plane = Plane::from_normal(polygon[0], normal)?;
        if polygon_area_3d(&polygon, plane.plane_normal()) < TOLERANCE {
            return Err(
                TopologyError::InvalidTopology("face boundary has zero area".into()).into(),
            );
        }

        Ok(store.add_face(FaceData::new(
            FaceSurface::Plane(plane),
            self.outer_wire,
            self.inner_wires.clone(),
        )))
    }
}

/// Creates a shell from a set of faces.
pub struct MakeShell {
    faces: Vec<FaceId>,
    closed: bool,
}

impl MakeShell {
    /// Creates a new `MakeShell` operation.
    #[must_use]
    pub fn new(faces: Vec<FaceId>, closed: bool) -> Self {
        Self { faces, closed }
    }

    /// Executes the operation.
    ///
    /// # Errors
    ///
    /// Returns an error if the face list is empty.
    pub fn execute(&self, store: &mut TopologyStore) -> Result<ShellId> {
        if self.faces.is_empty() {
            return Err(TopologyError::InvalidTopology("shell without faces".into()).into());
        }
        Ok(store.add_shell(ShellData {
            faces: self.faces.clone(),
            is_closed: self.closed,
        }))
    }
}

/// Creates a solid from an outer shell and optional void shells.
pub struct MakeSolid {
    outer_shell: ShellId,
    inner_shells: Vec<ShellId>,
}

impl MakeSolid {
    /// Creates a new `MakeSolid` operation.
    #[must_use]
    pub fn new(outer_shell: ShellId, inner_shells: Vec<ShellId>) -> Self {
        Self {
            outer_shell,
            inner_shells,
        }
    }

    /// Executes the operation.
    ///
    /// # Errors
    ///
    /// Returns an error if the outer shell is missing or open.
    pub fn execute(&self, store: &mut TopologyStore) -> Result<SolidId> {
        let shell = store.shell(self.outer_shell)?;
        if !shell.is_closed {
            return Err(TopologyError::InvalidTopology("outer shell is open".into()).into());
        }
        Ok(store.add_solid(SolidData {
            outer_shell: self.outer_shell,
            inner_shells: self.inner_shells.clone(),
        }))
    }
}

/// Creates a line edge between two existing vertices.
///
/// # Errors
///
/// Returns an error if the points coincide.
pub fn make_line_edge(
    store: &mut TopologyStore,
    start: VertexId,
    end: VertexId,
    start_point: Point3,
    end_point: Point3,
) -> Result<crate::topology::EdgeId> {
    let direction = end_point - start_point;
    let t_end = direction.norm();
    let line = Line::new(start_point, direction)?;
    Ok(store.add_edge(EdgeData::new(
        start,
        end,
        EdgeCurve::Line(line),
        0.0,
        t_end,
    )))
}

/// Builds an axis-aligned box solid spanning `min` to `max`.
///
/// Faces are wound so that every outward normal points away from the
/// box interior.
///
/// # Errors
///
/// Returns an error if the extents are degenerate along any axis.
pub fn make_box(store: &mut TopologyStore, min: Point3, max: Point3) -> Result<SolidId> {
    if max.x - min.x < TOLERANCE || max.y - min.y < TOLERANCE || max.z - min.z < TOLERANCE {
        return Err(TopologyError::InvalidTopology("box extents are degenerate".into()).into());
    }

    let p = |x: f64, y: f64, z: f64| Point3::new(x, y, z);
    let quads: [[Point3; 4]; 6] = [
        // z = min, normal -Z
        [
            p(min.x, min.y, min.z),
            p(min.x, max.y, min.z),
            p(max.x, max.y, min.z),
            p(max.x, min.y, min.z),
        ],
        // z = max, normal +Z
        [
            p(min.x, min.y, max.z),
            p(max.x, min.y, max.z),
            p(max.x, max.y, max.z),
            p(min.x, max.y, max.z),
        ],
        // y = min, normal -Y
        [
            p(min.x, min.y, min.z),
            p(max.x, min.y, min.z),
            p(max.x, min.y, max.z),
            p(min.x, min.y, max.z),
        ],
        // y = max, normal +Y
        [
            p(min.x, max.y, min.z),
            p(min.x, max.y, max.z),
            p(max.x, max.y, max.z),
            p(max.x, max.y, min.z),
        ],
        // x = min, normal -X
        [
            p(min.x, min.y, min.z),
            p(min.x, min.y, max.z),
            p(min.x, max.y, max.z),
            p(min.x, max.y, min.z),
        ],
        // x = max, normal +X
        [
            p(max.x, min.y, min.z),
            p(max.x, max.y, min.z),
            p(max.x, max.y, max.z),
            p(max.x, min.y, max.z),
        ],
    ];

    let mut faces = Vec::with_capacity(6);
    for quad in &quads {
        let wire = MakeWire::new(quad.to_vec()).execute(store)?;
        faces.push(MakeFace::new(wire, vec![]).execute(store)?);
    }

    let shell = MakeShell::new(faces, true).execute(store)?;
    MakeSolid::new(shell, vec![]).execute(store)
}

/// Builds a sphere solid: one closed face covering the whole spherical
/// surface, carried by a boundary-less wire.
///
/// # Errors
///
/// Returns an error if the radius is not positive.
pub fn make_sphere(store: &mut TopologyStore, center: Point3, radius: f64) -> Result<SolidId> {
    let sphere = crate::geometry::surface::Sphere::from_center(center, radius)?;
    let wire = store.add_wire(WireData {
        edges: vec![],
        is_closed: true,
    });
    let face = store.add_face(FaceData::new(FaceSurface::Sphere(sphere), wire, vec![]));
    let shell = MakeShell::new(vec![face], true).execute(store)?;
    MakeSolid::new(shell, vec![]).execute(store)
}

/// Newell's method polygon normal (not normalized).
fn newell_normal(polygon: &[Point3]) -> Vector3 {
    let n = polygon.len();
    let mut normal = Vector3::zeros();
    for i in 0..n {
        let a = polygon[i];
        let b = polygon[(i + 1) % n];
        normal.x += (a.y - b.y) * (a.z + b.z);
        normal.y += (a.z - b.z) * (a.x + b.x);
        normal.z += (a.x - b.x) * (a.y + b.y);
    }
    normal
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn p(x: f64, y: f64, z: f64) -> Point3 {
        Point3::new(x, y, z)
    }

    #[test]
    fn wire_needs_three_points() {
        let mut store = TopologyStore::new();
        assert!(MakeWire::new(vec![p(0.0, 0.0, 0.0), p(1.0, 0.0, 0.0)])
            .execute(&mut store)
            .is_err());
    }

    #[test]
    fn face_derives_its_plane() {
        let mut store = TopologyStore::new();
        let wire = MakeWire::new(vec![
            p(0.0, 0.0, 2.0),
            p(1.0, 0.0, 2.0),
            p(1.0, 1.0, 2.0),
            p(0.0, 1.0, 2.0),
        ])
        .execute(&mut store)
        .unwrap();
        let face = MakeFace::new(wire, vec![]).execute(&mut store).unwrap();

        let FaceSurface::Plane(ref plane) = store.face(face).unwrap().surface else {
            panic!("expected a planar face");
        };
        assert!(plane.plane_normal().z.abs() > 0.99);
    }

    #[test]
    fn box_has_six_faces_and_outward_normals() {
        let mut store = TopologyStore::new();
        let solid = make_box(&mut store, p(0.0, 0.0, 0.0), p(1.0, 2.0, 3.0)).unwrap();
        let faces = store.solid_faces(solid).unwrap();
        assert_eq!(faces.len(), 6);

        let center = p(0.5, 1.0, 1.5);
        for face_id in faces {
            let polygon = store.face_outer_polygon(face_id).unwrap();
            let normal = newell_normal(&polygon).normalize();
            let to_face = crate::math::polygon_3d::polygon_centroid(&polygon) - center;
            assert!(
                normal.dot(&to_face) > 0.0,
                "face normal must point away from the box center"
            );
        }
    }

    #[test]
    fn degenerate_box_is_rejected() {
        let mut store = TopologyStore::new();
        assert!(make_box(&mut store, p(0.0, 0.0, 0.0), p(1.0, 1.0, 0.0)).is_err());
    }
}
