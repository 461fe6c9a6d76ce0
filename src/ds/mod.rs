pub mod interference;
pub mod pave;

pub use interference::{Interference, InterferenceKind, InterferencePayload};
pub use pave::{CommonBlock, Pave, PaveBlock};

use std::collections::HashMap;
use std::sync::Mutex;

use crate::error::{Result, TopologyError};
use crate::index::BoundingBox;
use crate::math::Point3;
use crate::topology::{
    EdgeCurve, EdgeId, FaceId, FaceSurface, SolidId, TopologyStore, VertexData, VertexId,
};

/// Dense index of a sub-shape in the intersection data store.
pub type ShapeIndex = usize;

/// Kind of an indexed sub-shape.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShapeKind {
    Vertex,
    Edge,
    Face,
}

/// Store identity of an indexed sub-shape.
#[derive(Debug, Clone, Copy)]
pub enum EntityRef {
    Vertex(VertexId),
    Edge(EdgeId),
    Face(FaceId),
}

/// One flattened sub-shape record.
#[derive(Debug, Clone)]
pub struct ShapeEntry {
    /// The store entity behind this index.
    pub entity: EntityRef,
    /// Operand the sub-shape belongs to; `None` for vertices created by
    /// the operation itself.
    pub operand: Option<usize>,
    /// Tolerance-free bounds of the sub-shape.
    pub bounds: BoundingBox,
    /// Own tolerance of the sub-shape.
    pub tolerance: f64,
}

impl ShapeEntry {
    /// Kind of the entity.
    #[must_use]
    pub fn kind(&self) -> ShapeKind {
        match self.entity {
            EntityRef::Vertex(_) => ShapeKind::Vertex,
            EntityRef::Edge(_) => ShapeKind::Edge,
            EntityRef::Face(_) => ShapeKind::Face,
        }
    }
}

/// A split-point event appended to an edge during the narrow phase.
///
/// Multiple candidate pairs may touch the same edge concurrently, so
/// these land in per-edge mutex-guarded slots and are sorted by a
/// stable key before consolidation.
#[derive(Debug, Clone)]
pub struct EdgeEvent {
    /// Parameter on the owning edge.
    pub t: f64,
    /// Split-point location.
    pub point: Point3,
    /// Operand of the shape that caused the split.
    pub source_operand: usize,
    /// Dense index of the shape that caused the split.
    pub source_shape: ShapeIndex,
    /// Tolerance the event is valid at.
    pub tolerance: f64,
}

/// Per-operand sub-shape listing in discovery order.
#[derive(Debug, Default, Clone)]
pub struct OperandShapes {
    pub solid: SolidId,
    pub vertices: Vec<ShapeIndex>,
    pub edges: Vec<ShapeIndex>,
    pub faces: Vec<ShapeIndex>,
}

/// Append-only repository shared by all boolean phases.
///
/// Shapes are flattened to dense indices in deterministic traversal
/// order at construction; interferences, paves and common blocks are
/// appended by the phases and the store is frozen before the split
/// phase runs.
#[derive(Debug)]
pub struct IntersectionStore {
    entries: Vec<ShapeEntry>,
    operands: Vec<OperandShapes>,
    vertex_index: HashMap<VertexId, ShapeIndex>,
    edge_index: HashMap<EdgeId, ShapeIndex>,
    face_index: HashMap<FaceId, ShapeIndex>,
    interferences: Vec<Interference>,
    edge_slots: Vec<Mutex<Vec<EdgeEvent>>>,
    pave_blocks: Vec<PaveBlock>,
    blocks_of_edge: HashMap<ShapeIndex, Vec<usize>>,
    common_blocks: Vec<CommonBlock>,
    frozen: bool,
}

impl IntersectionStore {
    /// Flattens the operand solids into the dense index map, computing
    /// bounds and tolerances for every sub-shape.
    ///
    /// # Errors
    ///
    /// Returns an error if operand topology cannot be read.
    pub fn build(store: &TopologyStore, operand_solids: &[SolidId]) -> Result<Self> {
        let mut ds = Self {
            entries: Vec::new(),
            operands: Vec::with_capacity(operand_solids.len()),
            vertex_index: HashMap::new(),
            edge_index: HashMap::new(),
            face_index: HashMap::new(),
            interferences: Vec::new(),
            edge_slots: Vec::new(),
            pave_blocks: Vec::new(),
            blocks_of_edge: HashMap::new(),
            common_blocks: Vec::new(),
            frozen: false,
        };

        for (operand, &solid) in operand_solids.iter().enumerate() {
            let mut shapes = OperandShapes {
                solid,
                ..OperandShapes::default()
            };

            for face_id in store.solid_faces(solid)? {
                let face = store.face(face_id)?;
                let mut wires = vec![face.outer_wire];
                wires.extend(face.inner_wires.iter().copied());

                for wire_id in wires {
                    let wire = store.wire(wire_id)?;
                    for oe in &wire.edges {
                        let edge = store.edge(oe.edge)?;
                        for vid in [edge.start, edge.end] {
                            if !ds.vertex_index.contains_key(&vid) {
                                let vertex = store.vertex(vid)?;
                                let index = ds.push_entry(ShapeEntry {
                                    entity: EntityRef::Vertex(vid),
                                    operand: Some(operand),
                                    bounds: BoundingBox::from_points(&[vertex.point]),
                                    tolerance: vertex.tolerance,
                                });
                                ds.vertex_index.insert(vid, index);
                                shapes.vertices.push(index);
                            }
                        }
                        if !ds.edge_index.contains_key(&oe.edge) {
                            let bounds = edge_bounds(store, oe.edge)?;
                            let index = ds.push_entry(ShapeEntry {
                                entity: EntityRef::Edge(oe.edge),
                                operand: Some(operand),
                                bounds,
                                tolerance: edge.tolerance,
                            });
                            ds.edge_index.insert(oe.edge, index);
                            shapes.edges.push(index);
                        }
                    }
                }

                let bounds = face_bounds(store, face_id)?;
                let index = ds.push_entry(ShapeEntry {
                    entity: EntityRef::Face(face_id),
                    operand: Some(operand),
                    bounds,
                    tolerance: face.tolerance,
                });
                ds.face_index.insert(face_id, index);
                shapes.faces.push(index);
            }

            ds.operands.push(shapes);
        }

        Ok(ds)
    }

    fn push_entry(&mut self, entry: ShapeEntry) -> ShapeIndex {
        debug_assert!(!self.frozen, "the data store is frozen");
        self.entries.push(entry);
        self.edge_slots.push(Mutex::new(Vec::new()));
        self.entries.len() - 1
    }

    // --- Queries ---

    /// Number of indexed sub-shapes (including appended vertices).
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the store indexes anything.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// The entry behind a dense index.
    #[must_use]
    pub fn entry(&self, index: ShapeIndex) -> &ShapeEntry {
        &self.entries[index]
    }

    /// Number of operands.
    #[must_use]
    pub fn operand_count(&self) -> usize {
        self.operands.len()
    }

    /// Sub-shape listing of one operand.
    #[must_use]
    pub fn operand(&self, operand: usize) -> &OperandShapes {
        &self.operands[operand]
    }

    /// Dense index of a store vertex, if indexed.
    #[must_use]
    pub fn vertex_index(&self, id: VertexId) -> Option<ShapeIndex> {
        self.vertex_index.get(&id).copied()
    }

    /// Dense index of a store edge, if indexed.
    #[must_use]
    pub fn edge_index(&self, id: EdgeId) -> Option<ShapeIndex> {
        self.edge_index.get(&id).copied()
    }

    /// Dense index of a store face, if indexed.
    #[must_use]
    pub fn face_index(&self, id: FaceId) -> Option<ShapeIndex> {
        self.face_index.get(&id).copied()
    }

    /// Store vertex id behind a dense vertex index.
    ///
    /// # Errors
    ///
    /// Returns an error if the index is not a vertex.
    pub fn vertex_id(&self, index: ShapeIndex) -> Result<VertexId> {
        match self.entries[index].entity {
            EntityRef::Vertex(id) => Ok(id),
            _ => Err(TopologyError::EntityNotFound("vertex index".into()).into()),
        }
    }

    /// Store edge id behind a dense edge index.
    ///
    /// # Errors
    ///
    /// Returns an error if the index is not an edge.
    pub fn edge_id(&self, index: ShapeIndex) -> Result<EdgeId> {
        match self.entries[index].entity {
            EntityRef::Edge(id) => Ok(id),
            _ => Err(TopologyError::EntityNotFound("edge index".into()).into()),
        }
    }

    /// Store face id behind a dense face index.
    ///
    /// # Errors
    ///
    /// Returns an error if the index is not a face.
    pub fn face_id(&self, index: ShapeIndex) -> Result<FaceId> {
        match self.entries[index].entity {
            EntityRef::Face(id) => Ok(id),
            _ => Err(TopologyError::EntityNotFound("face index".into()).into()),
        }
    }

    // --- Appends ---

    /// Appends a vertex created by the operation (a new split point),
    /// materializing it in the topology store as well.
    pub fn append_vertex(
        &mut self,
        store: &mut TopologyStore,
        point: Point3,
        tolerance: f64,
    ) -> ShapeIndex {
        let vid = store.add_vertex(VertexData::with_tolerance(point, tolerance));
        let index = self.push_entry(ShapeEntry {
            entity: EntityRef::Vertex(vid),
            operand: None,
            bounds: BoundingBox::from_points(&[point]),
            tolerance,
        });
        self.vertex_index.insert(vid, index);
        index
    }

    /// Appends one interference record.
    pub fn add_interference(&mut self, interference: Interference) {
        debug_assert!(!self.frozen, "the data store is frozen");
        self.interferences.push(interference);
    }

    /// Appends a batch of interferences.
    pub fn add_interferences(&mut self, batch: impl IntoIterator<Item = Interference>) {
        debug_assert!(!self.frozen, "the data store is frozen");
        self.interferences.extend(batch);
    }

    /// All interferences recorded so far.
    #[must_use]
    pub fn interferences(&self) -> &[Interference] {
        &self.interferences
    }

    /// Sorts the interference list by its stable key, making the order
    /// independent of narrow-phase scheduling.
    pub fn sort_interferences(&mut self) {
        self.interferences.sort_by_key(Interference::sort_key);
    }

    /// Appends a split event to an edge's slot. Safe to call from
    /// parallel narrow-phase tasks: each edge has its own lock.
    pub fn record_edge_event(&self, edge: ShapeIndex, event: EdgeEvent) {
        debug_assert!(matches!(self.entries[edge].kind(), ShapeKind::Edge));
        #[allow(clippy::unwrap_used)] // a poisoned slot means a panicked sibling task
        self.edge_slots[edge].lock().unwrap().push(event);
    }

    /// Drains the event slot of one edge.
    #[must_use]
    pub fn take_edge_events(&mut self, edge: ShapeIndex) -> Vec<EdgeEvent> {
        #[allow(clippy::unwrap_used)]
        let mut events = std::mem::take(&mut *self.edge_slots[edge].lock().unwrap());
        events.sort_by(|a, b| {
            a.t.partial_cmp(&b.t)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then(a.source_operand.cmp(&b.source_operand))
                .then(a.source_shape.cmp(&b.source_shape))
        });
        events
    }

    /// Registers a pave block for its edge and returns the block id.
    pub fn add_pave_block(&mut self, block: PaveBlock) -> usize {
        debug_assert!(!self.frozen, "the data store is frozen");
        let edge = block.edge;
        self.pave_blocks.push(block);
        let id = self.pave_blocks.len() - 1;
        self.blocks_of_edge.entry(edge).or_default().push(id);
        id
    }

    /// Pave blocks of one edge, in ascending parameter order.
    #[must_use]
    pub fn blocks_of_edge(&self, edge: ShapeIndex) -> &[usize] {
        self.blocks_of_edge.get(&edge).map_or(&[], Vec::as_slice)
    }

    /// All pave blocks.
    #[must_use]
    pub fn pave_blocks(&self) -> &[PaveBlock] {
        &self.pave_blocks
    }

    /// One pave block.
    #[must_use]
    pub fn pave_block(&self, id: usize) -> &PaveBlock {
        &self.pave_blocks[id]
    }

    /// Creates a common block over the given pave blocks and wires up
    /// the back references.
    pub fn add_common_block(&mut self, blocks: Vec<usize>, tolerance: f64) -> usize {
        debug_assert!(!self.frozen, "the data store is frozen");
        debug_assert!(!blocks.is_empty());

        // Representative: lowest (operand, edge, parameter) key.
        let representative = blocks
            .iter()
            .copied()
            .min_by(|&x, &y| {
                let bx = &self.pave_blocks[x];
                let by = &self.pave_blocks[y];
                (bx.operand, bx.edge)
                    .cmp(&(by.operand, by.edge))
                    .then(
                        bx.pave1
                            .t
                            .partial_cmp(&by.pave1.t)
                            .unwrap_or(std::cmp::Ordering::Equal),
                    )
            })
            .unwrap_or(blocks[0]);

        self.common_blocks.push(CommonBlock {
            blocks: blocks.clone(),
            representative,
            tolerance,
        });
        let id = self.common_blocks.len() - 1;
        for block in blocks {
            self.pave_blocks[block].common_block = Some(id);
        }
        id
    }

    /// Adds members to an existing common block, re-electing the
    /// representative and widening the merged tolerance.
    pub fn extend_common_block(&mut self, id: usize, members: Vec<usize>, tolerance: f64) {
        debug_assert!(!self.frozen, "the data store is frozen");
        for block in members {
            if !self.common_blocks[id].blocks.contains(&block) {
                self.common_blocks[id].blocks.push(block);
            }
            self.pave_blocks[block].common_block = Some(id);
        }
        self.common_blocks[id].tolerance = self.common_blocks[id].tolerance.max(tolerance);

        let blocks = self.common_blocks[id].blocks.clone();
        if let Some(representative) = blocks.iter().copied().min_by(|&x, &y| {
            let bx = &self.pave_blocks[x];
            let by = &self.pave_blocks[y];
            (bx.operand, bx.edge).cmp(&(by.operand, by.edge)).then(
                bx.pave1
                    .t
                    .partial_cmp(&by.pave1.t)
                    .unwrap_or(std::cmp::Ordering::Equal),
            )
        }) {
            self.common_blocks[id].representative = representative;
        }
    }

    /// All common blocks.
    #[must_use]
    pub fn common_blocks(&self) -> &[CommonBlock] {
        &self.common_blocks
    }

    /// Freezes the store: all population is complete, the build phases
    /// may only read from here on.
    pub fn freeze(&mut self) {
        self.frozen = true;
    }

    /// Whether the store is frozen.
    #[must_use]
    pub fn is_frozen(&self) -> bool {
        self.frozen
    }
}

/// Conservative bounds of an edge, covering the whole carrier for
/// closed curves.
fn edge_bounds(store: &TopologyStore, id: EdgeId) -> Result<BoundingBox> {
    let edge = store.edge(id)?;
    let mut bounds = BoundingBox::empty();
    bounds.grow(&store.vertex(edge.start)?.point);
    bounds.grow(&store.vertex(edge.end)?.point);

    match &edge.curve {
        EdgeCurve::Line(_) => {}
        EdgeCurve::Circle(circle) => {
            let r = circle.radius();
            bounds = bounds.merged(&BoundingBox::from_points(&[
                circle.center() + crate::math::Vector3::new(-r, -r, -r),
                circle.center() + crate::math::Vector3::new(r, r, r),
            ]));
        }
        EdgeCurve::Polyline(polyline) => {
            for p in polyline.points() {
                bounds.grow(p);
            }
        }
    }
    Ok(bounds)
}

/// Conservative bounds of a face, padded for curved supports.
fn face_bounds(store: &TopologyStore, id: FaceId) -> Result<BoundingBox> {
    let face = store.face(id)?;
    let mut bounds = BoundingBox::empty();

    let mut wires = vec![face.outer_wire];
    wires.extend(face.inner_wires.iter().copied());
    for wire_id in wires {
        for p in store.wire_polygon(wire_id)? {
            bounds.grow(&p);
        }
    }

    match &face.surface {
        FaceSurface::Plane(_) => {}
        FaceSurface::Cylinder(cylinder) => {
            bounds = bounds.enlarged(cylinder.radius());
        }
        FaceSurface::Sphere(sphere) => {
            let r = sphere.radius();
            bounds = bounds.merged(&BoundingBox::from_points(&[
                sphere.center() + crate::math::Vector3::new(-r, -r, -r),
                sphere.center() + crate::math::Vector3::new(r, r, r),
            ]));
        }
    }
    Ok(bounds)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::build::make_box;

    fn two_boxes(store: &mut TopologyStore) -> (SolidId, SolidId) {
        let a = make_box(
            store,
            Point3::new(0.0, 0.0, 0.0),
            Point3::new(1.0, 1.0, 1.0),
        )
        .unwrap();
        let b = make_box(
            store,
            Point3::new(0.5, 0.0, 0.0),
            Point3::new(1.5, 1.0, 1.0),
        )
        .unwrap();
        (a, b)
    }

    #[test]
    fn indices_are_deterministic() {
        let mut store_a = TopologyStore::new();
        let (a1, b1) = two_boxes(&mut store_a);
        let ds1 = IntersectionStore::build(&store_a, &[a1, b1]).unwrap();

        let mut store_b = TopologyStore::new();
        let (a2, b2) = two_boxes(&mut store_b);
        let ds2 = IntersectionStore::build(&store_b, &[a2, b2]).unwrap();

        assert_eq!(ds1.len(), ds2.len());
        for i in 0..ds1.len() {
            assert_eq!(ds1.entry(i).kind(), ds2.entry(i).kind());
            assert_eq!(ds1.entry(i).operand, ds2.entry(i).operand);
        }
    }

    #[test]
    fn box_operand_counts() {
        let mut store = TopologyStore::new();
        let (a, b) = two_boxes(&mut store);
        let ds = IntersectionStore::build(&store, &[a, b]).unwrap();

        assert_eq!(ds.operand_count(), 2);
        for operand in 0..2 {
            let shapes = ds.operand(operand);
            assert_eq!(shapes.faces.len(), 6);
            // make_box does not share vertices/edges between faces, so
            // the flattened counts follow the wire structure directly.
            assert_eq!(shapes.edges.len(), 24);
            assert_eq!(shapes.vertices.len(), 24);
        }
    }

    #[test]
    fn edge_events_sort_stably() {
        let mut store = TopologyStore::new();
        let (a, b) = two_boxes(&mut store);
        let mut ds = IntersectionStore::build(&store, &[a, b]).unwrap();
        let edge = ds.operand(0).edges[0];

        let event = |t: f64, operand: usize| EdgeEvent {
            t,
            point: Point3::origin(),
            source_operand: operand,
            source_shape: 0,
            tolerance: 1e-7,
        };
        ds.record_edge_event(edge, event(0.7, 1));
        ds.record_edge_event(edge, event(0.2, 1));
        ds.record_edge_event(edge, event(0.2, 0));

        let drained = ds.take_edge_events(edge);
        assert_eq!(drained.len(), 3);
        assert!((drained[0].t - 0.2).abs() < 1e-12 && drained[0].source_operand == 0);
        assert!((drained[1].t - 0.2).abs() < 1e-12 && drained[1].source_operand == 1);
        assert!((drained[2].t - 0.7).abs() < 1e-12);
    }

    #[test]
    fn appended_vertices_extend_the_map() {
        let mut store = TopologyStore::new();
        let (a, b) = two_boxes(&mut store);
        let mut ds = IntersectionStore::build(&store, &[a, b]).unwrap();
        let before = ds.len();
        let index = ds.append_vertex(&mut store, Point3::new(0.5, 0.5, 0.5), 1e-7);
        assert_eq!(index, before);
        assert_eq!(ds.entry(index).operand, None);
        assert_eq!(ds.entry(index).kind(), ShapeKind::Vertex);
    }

    #[test]
    fn common_block_picks_lowest_key_representative() {
        let mut store = TopologyStore::new();
        let (a, b) = two_boxes(&mut store);
        let mut ds = IntersectionStore::build(&store, &[a, b]).unwrap();

        let edge_a = ds.operand(0).edges[0];
        let edge_b = ds.operand(1).edges[0];
        let v = ds.append_vertex(&mut store, Point3::origin(), 1e-7);
        let w = ds.append_vertex(&mut store, Point3::new(1.0, 0.0, 0.0), 1e-7);

        let block = |edge, operand| PaveBlock {
            edge,
            operand,
            pave1: Pave { vertex: v, t: 0.0 },
            pave2: Pave { vertex: w, t: 1.0 },
            common_block: None,
        };
        let id_b = ds.add_pave_block(block(edge_b, 1));
        let id_a = ds.add_pave_block(block(edge_a, 0));

        let cb = ds.add_common_block(vec![id_b, id_a], 1e-7);
        assert_eq!(ds.common_blocks()[cb].representative, id_a);
        assert_eq!(ds.pave_block(id_a).common_block, Some(cb));
        assert_eq!(ds.pave_block(id_b).common_block, Some(cb));
    }
}
