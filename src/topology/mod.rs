pub mod edge;
pub mod face;
pub mod shell;
pub mod solid;
pub mod vertex;
pub mod wire;

pub use edge::{EdgeCurve, EdgeData, EdgeId};
pub use face::{FaceData, FaceId, FaceSurface};
pub use shell::{ShellData, ShellId};
pub use solid::{SolidData, SolidId};
pub use vertex::{VertexData, VertexId};
pub use wire::{OrientedEdge, WireData, WireId};

use crate::error::TopologyError;
use crate::math::Point3;
use slotmap::SlotMap;

/// Central arena that owns all topological entities.
///
/// Entities reference each other via typed IDs (generational indices),
/// avoiding self-referential structures and enabling safe mutation.
/// Operand shapes and the boolean result live in the same store.
#[derive(Debug, Default)]
pub struct TopologyStore {
    vertices: SlotMap<VertexId, VertexData>,
    edges: SlotMap<EdgeId, EdgeData>,
    wires: SlotMap<WireId, WireData>,
    faces: SlotMap<FaceId, FaceData>,
    shells: SlotMap<ShellId, ShellData>,
    solids: SlotMap<SolidId, SolidData>,
}

impl TopologyStore {
    /// Creates a new, empty topology store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    // --- Vertex operations ---

    /// Inserts a vertex and returns its ID.
    pub fn add_vertex(&mut self, data: VertexData) -> VertexId {
        self.vertices.insert(data)
    }

    /// Returns a reference to the vertex data, or an error if not found.
    ///
    /// # Errors
    ///
    /// Returns an error if the entity is not found in the store.
    pub fn vertex(&self, id: VertexId) -> Result<&VertexData, TopologyError> {
        self.vertices
            .get(id)
            .ok_or_else(|| TopologyError::EntityNotFound("vertex".into()))
    }

    /// Returns a mutable reference to the vertex data, or an error if not found.
    ///
    /// # Errors
    ///
    /// Returns an error if the entity is not found in the store.
    pub fn vertex_mut(&mut self, id: VertexId) -> Result<&mut VertexData, TopologyError> {
        self.vertices
            .get_mut(id)
            .ok_or_else(|| TopologyError::EntityNotFound("vertex".into()))
    }

    // --- Edge operations ---

    /// Inserts an edge and returns its ID.
    pub fn add_edge(&mut self, data: EdgeData) -> EdgeId {
        self.edges.insert(data)
    }

    /// Returns a reference to the edge data, or an error if not found.
    ///
    /// # Errors
    ///
    /// Returns an error if the entity is not found in the store.
    pub fn edge(&self, id: EdgeId) -> Result<&EdgeData, TopologyError> {
        self.edges
            .get(id)
            .ok_or_else(|| TopologyError::EntityNotFound("edge".into()))
    }

    /// Returns a mutable reference to the edge data, or an error if not found.
    ///
    /// # Errors
    ///
    /// Returns an error if the entity is not found in the store.
    pub fn edge_mut(&mut self, id: EdgeId) -> Result<&mut EdgeData, TopologyError> {
        self.edges
            .get_mut(id)
            .ok_or_else(|| TopologyError::EntityNotFound("edge".into()))
    }

    // --- Wire operations ---

    /// Inserts a wire and returns its ID.
    pub fn add_wire(&mut self, data: WireData) -> WireId {
        self.wires.insert(data)
    }

    /// Returns a reference to the wire data, or an error if not found.
    ///
    /// # Errors
    ///
    /// Returns an error if the entity is not found in the store.
    pub fn wire(&self, id: WireId) -> Result<&WireData, TopologyError> {
        self.wires
            .get(id)
            .ok_or_else(|| TopologyError::EntityNotFound("wire".into()))
    }

    // --- Face operations ---

    /// Inserts a face and returns its ID.
    pub fn add_face(&mut self, data: FaceData) -> FaceId {
        self.faces.insert(data)
    }

    /// Returns a reference to the face data, or an error if not found.
    ///
    /// # Errors
    ///
    /// Returns an error if the entity is not found in the store.
    pub fn face(&self, id: FaceId) -> Result<&FaceData, TopologyError> {
        self.faces
            .get(id)
            .ok_or_else(|| TopologyError::EntityNotFound("face".into()))
    }

    // --- Shell operations ---

    /// Inserts a shell and returns its ID.
    pub fn add_shell(&mut self, data: ShellData) -> ShellId {
        self.shells.insert(data)
    }

    /// Returns a reference to the shell data, or an error if not found.
    ///
    /// # Errors
    ///
    /// Returns an error if the entity is not found in the store.
    pub fn shell(&self, id: ShellId) -> Result<&ShellData, TopologyError> {
        self.shells
            .get(id)
            .ok_or_else(|| TopologyError::EntityNotFound("shell".into()))
    }

    // --- Solid operations ---

    /// Inserts a solid and returns its ID.
    pub fn add_solid(&mut self, data: SolidData) -> SolidId {
        self.solids.insert(data)
    }

    /// Returns a reference to the solid data, or an error if not found.
    ///
    /// # Errors
    ///
    /// Returns an error if the entity is not found in the store.
    pub fn solid(&self, id: SolidId) -> Result<&SolidData, TopologyError> {
        self.solids
            .get(id)
            .ok_or_else(|| TopologyError::EntityNotFound("solid".into()))
    }

    // --- Traversal ---

    /// All faces of a solid, outer shell first, in stored order.
    ///
    /// # Errors
    ///
    /// Returns an error if the solid or one of its shells is missing.
    pub fn solid_faces(&self, id: SolidId) -> Result<Vec<FaceId>, TopologyError> {
        let solid = self.solid(id)?;
        let mut faces = Vec::new();
        faces.extend(self.shell(solid.outer_shell)?.faces.iter().copied());
        for &shell_id in &solid.inner_shells {
            faces.extend(self.shell(shell_id)?.faces.iter().copied());
        }
        Ok(faces)
    }

    /// Ordered start vertices of a wire (one per oriented edge).
    ///
    /// # Errors
    ///
    /// Returns an error if the wire or an edge is missing.
    pub fn wire_vertices(&self, id: WireId) -> Result<Vec<VertexId>, TopologyError> {
        let wire = self.wire(id)?;
        let mut vertices = Vec::with_capacity(wire.edges.len());
        for oe in &wire.edges {
            let edge = self.edge(oe.edge)?;
            vertices.push(if oe.forward { edge.start } else { edge.end });
        }
        Ok(vertices)
    }

    /// The outer boundary polygon of a face, one point per wire vertex.
    ///
    /// # Errors
    ///
    /// Returns an error if the face topology cannot be read.
    pub fn face_outer_polygon(&self, id: FaceId) -> Result<Vec<Point3>, TopologyError> {
        let face = self.face(id)?;
        self.wire_polygon(face.outer_wire)
    }

    /// The boundary polygon of one wire.
    ///
    /// # Errors
    ///
    /// Returns an error if the wire topology cannot be read.
    pub fn wire_polygon(&self, id: WireId) -> Result<Vec<Point3>, TopologyError> {
        let mut polygon = Vec::new();
        for vid in self.wire_vertices(id)? {
            polygon.push(self.vertex(vid)?.point);
        }
        Ok(polygon)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::geometry::curve::Line;
    use crate::math::Vector3;

    #[test]
    fn store_roundtrip() {
        let mut store = TopologyStore::new();
        let v = store.add_vertex(VertexData::new(Point3::new(1.0, 2.0, 3.0)));
        assert!((store.vertex(v).unwrap().point.x - 1.0).abs() < f64::EPSILON);
        store.vertex_mut(v).unwrap().tolerance = 1e-4;
        assert!((store.vertex(v).unwrap().tolerance - 1e-4).abs() < f64::EPSILON);
    }

    #[test]
    fn missing_entity_reports_kind() {
        let store = TopologyStore::new();
        let err = store.vertex(VertexId::default()).unwrap_err();
        assert!(matches!(err, TopologyError::EntityNotFound(_)));
    }

    #[test]
    fn wire_vertices_follow_orientation() {
        let mut store = TopologyStore::new();
        let a = store.add_vertex(VertexData::new(Point3::origin()));
        let b = store.add_vertex(VertexData::new(Point3::new(1.0, 0.0, 0.0)));
        let line = Line::new(Point3::origin(), Vector3::new(1.0, 0.0, 0.0)).unwrap();
        let e = store.add_edge(EdgeData::new(a, b, EdgeCurve::Line(line), 0.0, 1.0));

        let forward = store.add_wire(WireData {
            edges: vec![OrientedEdge::new(e, true)],
            is_closed: false,
        });
        let reversed = store.add_wire(WireData {
            edges: vec![OrientedEdge::new(e, false)],
            is_closed: false,
        });

        assert_eq!(store.wire_vertices(forward).unwrap(), vec![a]);
        assert_eq!(store.wire_vertices(reversed).unwrap(), vec![b]);
    }
}
