//! Result assembly: applies the keep table, re-glues faces, stitches
//! kept fragments into closed shells over merged vertices, orients and
//! nests them, and emits the result solids plus the history map.

pub mod history;
pub mod select;

pub use history::{HistoryMap, ResultShape};
pub use select::{combine_states, decide, BooleanOp, CombinedState, KeepDecision, OperandGroup};

use std::collections::HashMap;

use tracing::debug;

use crate::ds::{InterferencePayload, IntersectionStore, ShapeIndex};
use crate::error::{BooleanError, Result};
use crate::geometry::curve::Polyline;
use crate::math::polygon_3d::polygon_area_3d;
use crate::math::{Point3, Vector3, VERTEX_TOLERANCE};
use crate::report::{DiagnosticCode, Report};
use crate::split::{EdgeSplits, FaceFragment};
use crate::topology::{
    EdgeCurve, EdgeData, EdgeId, FaceData, FaceSurface, OrientedEdge, ShellData, SolidData,
    SolidId, TopologyStore, VertexData, VertexId, WireData, WireId,
};

/// Everything a finished boolean operation hands back to the caller.
#[derive(Debug)]
pub struct BooleanOutput {
    /// Result solids; empty is a valid outcome.
    pub solids: Vec<SolidId>,
    /// Section wires (only populated by `Section`).
    pub section_wires: Vec<WireId>,
    /// Accumulated diagnostics and phase counters.
    pub report: Report,
    /// Provenance of result shapes.
    pub history: HistoryMap,
}

/// A face queued for insertion, winding already resolved.
struct EmittedFace {
    boundary: Vec<Point3>,
    holes: Vec<Vec<Point3>>,
    surface: FaceSurface,
    same_sense: bool,
    source_face: ShapeIndex,
    modified: bool,
}

/// Builds the result solids from the selected fragments.
///
/// # Errors
///
/// Returns a fatal [`BooleanError::Assembly`] if the kept fragments do
/// not stitch into closed shells.
pub fn assemble_solids(
    store: &mut TopologyStore,
    ds: &IntersectionStore,
    fragments: &[(FaceFragment, KeepDecision)],
    splits: &EdgeSplits,
    report: &mut Report,
) -> Result<(Vec<SolidId>, HistoryMap)> {
    let mut history = HistoryMap::new();
    let emitted = emit_faces(store, ds, fragments, &mut history)?;

    if emitted.is_empty() {
        report.warn(DiagnosticCode::EmptyResult, vec![]);
        return Ok((Vec::new(), history));
    }

    // Merge coincident vertices and resolve every face to vertex rings.
    // The merger is seeded with the operand and pave vertices so the
    // result reuses them (and with them, the trimmed split edges).
    let mut merger = VertexMerger::new(VERTEX_TOLERANCE * 10.0);
    for index in 0..ds.len() {
        if let crate::ds::EntityRef::Vertex(vid) = ds.entry(index).entity {
            let point = store.vertex(vid)?.point;
            merger.seed(vid, point);
        }
    }
    let mut rings: Vec<FaceRings> = Vec::with_capacity(emitted.len());
    for face in &emitted {
        rings.push(FaceRings {
            outer: merge_ring(store, &mut merger, &face.boundary),
            holes: face
                .holes
                .iter()
                .map(|h| merge_ring(store, &mut merger, h))
                .collect(),
        });
    }

    let shells = group_shells(&emitted, &rings);
    check_watertight(&emitted, &rings, &shells, report)?;

    // Orientation: outer shells positive, voids negative.
    let volumes: Vec<Option<f64>> = shells
        .iter()
        .map(|shell| shell_volume(&emitted, shell))
        .collect();
    let nesting = nest_shells(&emitted, &rings, &shells, store);

    // Outer shells enclose positive volume, voids negative; flip any
    // shell whose sign disagrees with its role.
    let mut flip_shell = vec![false; shells.len()];
    for i in 0..shells.len() {
        if let Some(volume) = volumes[i] {
            if volume != 0.0 {
                flip_shell[i] = (volume > 0.0) == nesting[i].is_some();
            }
        }
    }

    // Insert faces shell by shell in deterministic order.
    let reuse = block_edge_lookup(store, ds, splits, &merger)?;
    let mut shell_ids: Vec<crate::topology::ShellId> = Vec::with_capacity(shells.len());
    for (i, shell) in shells.iter().enumerate() {
        let mut face_ids = Vec::with_capacity(shell.len());
        for &f in shell {
            let face_id = insert_face(
                store,
                &emitted[f],
                &rings[f],
                flip_shell[i],
                &reuse,
                &mut history,
            )?;
            face_ids.push(face_id);
        }
        shell_ids.push(store.add_shell(ShellData {
            faces: face_ids,
            is_closed: true,
        }));
    }

    // Solids: one per outer shell, voids attached to their parents.
    let mut solids = Vec::new();
    for (i, shell_id) in shell_ids.iter().enumerate() {
        if nesting[i].is_some() {
            continue;
        }
        let voids: Vec<_> = nesting
            .iter()
            .enumerate()
            .filter(|&(_, parent)| *parent == Some(i))
            .map(|(child, _)| shell_ids[child])
            .collect();
        solids.push(store.add_solid(SolidData {
            outer_shell: *shell_id,
            inner_shells: voids,
        }));
    }

    debug!(
        solids = solids.len(),
        shells = shells.len(),
        "assembled boolean result"
    );
    Ok((solids, history))
}

/// Applies the decisions, re-gluing faces whose every fragment
/// survived unflipped back to their original boundary.
fn emit_faces(
    store: &TopologyStore,
    ds: &IntersectionStore,
    fragments: &[(FaceFragment, KeepDecision)],
    history: &mut HistoryMap,
) -> Result<Vec<EmittedFace>> {
    // Per-source tallies, preserving fragment order.
    let mut order: Vec<ShapeIndex> = Vec::new();
    let mut by_source: HashMap<ShapeIndex, Vec<&(FaceFragment, KeepDecision)>> = HashMap::new();
    for pair in fragments {
        let source = pair.0.source_face;
        if !by_source.contains_key(&source) {
            order.push(source);
        }
        by_source.entry(source).or_default().push(pair);
    }

    let mut emitted = Vec::new();
    for source in order {
        let group = &by_source[&source];
        let total = group.len();
        let kept: Vec<&(FaceFragment, KeepDecision)> = group
            .iter()
            .copied()
            .filter(|(_, d)| *d != KeepDecision::Discard)
            .collect();

        if kept.is_empty() {
            history.mark_deleted(source);
            continue;
        }

        let all_kept_plain =
            kept.len() == total && kept.iter().all(|(_, d)| *d == KeepDecision::Keep);

        if all_kept_plain {
            // The whole face survived: re-glue it to its boundary with
            // the pave vertices kept, so split neighbors still find
            // their twin sub-edges.
            let face_id = ds.face_id(source)?;
            let face = store.face(face_id)?;
            let boundary = crate::split::boundary_with_paves(store, ds, face.outer_wire)?;
            let holes = face
                .inner_wires
                .iter()
                .map(|&w| crate::split::boundary_with_paves(store, ds, w))
                .collect::<Result<Vec<_>>>()?;
            emitted.push(EmittedFace {
                boundary,
                holes,
                surface: face.surface.clone(),
                same_sense: face.same_sense,
                source_face: source,
                modified: false,
            });
            continue;
        }

        history.mark_modified(source);
        for (fragment, decision) in kept {
            let flipped = *decision == KeepDecision::KeepFlipped;
            let mut boundary = fragment.boundary.clone();
            let mut holes = fragment.holes.clone();
            if flipped {
                boundary.reverse();
                for hole in &mut holes {
                    hole.reverse();
                }
            }
            emitted.push(EmittedFace {
                boundary,
                holes,
                surface: fragment.surface.clone(),
                same_sense: if flipped {
                    !fragment.same_sense
                } else {
                    fragment.same_sense
                },
                source_face: source,
                modified: true,
            });
        }
    }
    Ok(emitted)
}

/// Vertex rings of one emitted face after merging.
struct FaceRings {
    outer: Vec<VertexId>,
    holes: Vec<Vec<VertexId>>,
}

/// Merges a polygon into vertex ids, dropping collapsed neighbors.
fn merge_ring(
    store: &mut TopologyStore,
    merger: &mut VertexMerger,
    polygon: &[Point3],
) -> Vec<VertexId> {
    let mut ring: Vec<VertexId> = Vec::with_capacity(polygon.len());
    for p in polygon {
        let vid = merger.get_or_create(store, p);
        if ring.last() == Some(&vid) {
            continue;
        }
        ring.push(vid);
    }
    while ring.len() > 1 && ring.first() == ring.last() {
        ring.pop();
    }
    ring
}

/// Undirected edge key between two merged vertices.
fn edge_key(a: VertexId, b: VertexId) -> (VertexId, VertexId) {
    if slotmap::Key::data(&a).as_ffi() <= slotmap::Key::data(&b).as_ffi() {
        (a, b)
    } else {
        (b, a)
    }
}

fn face_edge_keys(rings: &FaceRings) -> Vec<(VertexId, VertexId)> {
    let mut keys = Vec::new();
    for ring in std::iter::once(&rings.outer).chain(rings.holes.iter()) {
        let n = ring.len();
        if n < 2 {
            continue;
        }
        for i in 0..n {
            keys.push(edge_key(ring[i], ring[(i + 1) % n]));
        }
    }
    keys
}

/// Groups faces into connected shells via shared boundary edges; faces
/// without boundary edges (closed surfaces) form their own shells.
fn group_shells(emitted: &[EmittedFace], rings: &[FaceRings]) -> Vec<Vec<usize>> {
    let n = emitted.len();
    let mut key_to_faces: HashMap<(VertexId, VertexId), Vec<usize>> = HashMap::new();
    for (i, ring) in rings.iter().enumerate() {
        for key in face_edge_keys(ring) {
            key_to_faces.entry(key).or_default().push(i);
        }
    }

    let mut component = vec![usize::MAX; n];
    let mut shells: Vec<Vec<usize>> = Vec::new();
    for start in 0..n {
        if component[start] != usize::MAX {
            continue;
        }
        let id = shells.len();
        let mut queue = vec![start];
        component[start] = id;
        let mut members = vec![start];
        while let Some(f) = queue.pop() {
            for key in face_edge_keys(&rings[f]) {
                if let Some(neighbors) = key_to_faces.get(&key) {
                    for &g in neighbors {
                        if component[g] == usize::MAX {
                            component[g] = id;
                            members.push(g);
                            queue.push(g);
                        }
                    }
                }
            }
        }
        members.sort_unstable();
        shells.push(members);
    }
    shells
}

/// Watertightness: every boundary edge must be used exactly twice.
fn check_watertight(
    emitted: &[EmittedFace],
    rings: &[FaceRings],
    shells: &[Vec<usize>],
    report: &mut Report,
) -> Result<()> {
    for shell in shells {
        let mut counts: HashMap<(VertexId, VertexId), usize> = HashMap::new();
        let mut has_edges = false;
        for &f in shell {
            for key in face_edge_keys(&rings[f]) {
                has_edges = true;
                *counts.entry(key).or_insert(0) += 1;
            }
        }
        if !has_edges {
            // A closed surface without boundary (full sphere).
            continue;
        }
        if let Some((_, &count)) = counts.iter().find(|&(_, &c)| c != 2) {
            let sources: Vec<ShapeIndex> = shell.iter().map(|&f| emitted[f].source_face).collect();
            report.error(DiagnosticCode::UnclosedResult, sources);
            return Err(BooleanError::Assembly {
                reason: format!("result shell has an edge used {count} times (expected 2)"),
            }
            .into());
        }
    }
    Ok(())
}

/// Signed volume of a shell via the divergence theorem; `None` when the
/// shell contains faces without a reliable contribution (bounded
/// quadric patches).
fn shell_volume(emitted: &[EmittedFace], shell: &[usize]) -> Option<f64> {
    let mut volume = 0.0;
    for &f in shell {
        let face = &emitted[f];
        match &face.surface {
            FaceSurface::Plane(plane) => {
                let n_eff = if face.same_sense {
                    *plane.plane_normal()
                } else {
                    -plane.plane_normal()
                };
                let offset = face.boundary.first()?.coords.dot(&n_eff);
                let mut area = polygon_area_3d(&face.boundary, plane.plane_normal());
                for hole in &face.holes {
                    area -= polygon_area_3d(hole, plane.plane_normal());
                }
                volume += offset * area / 3.0;
            }
            FaceSurface::Sphere(sphere) if face.boundary.is_empty() => {
                let r = sphere.radius();
                let v = 4.0 / 3.0 * std::f64::consts::PI * r * r * r;
                volume += if face.same_sense { v } else { -v };
            }
            FaceSurface::Sphere(_) | FaceSurface::Cylinder(_) => return None,
        }
    }
    Some(volume)
}

/// Parent shell of each shell (`None` for outer shells): a shell whose
/// sample point lies inside an odd number of other shells is a void of
/// its innermost container.
fn nest_shells(
    emitted: &[EmittedFace],
    rings: &[FaceRings],
    shells: &[Vec<usize>],
    store: &TopologyStore,
) -> Vec<Option<usize>> {
    let sample: Vec<Option<Point3>> = shells
        .iter()
        .map(|shell| {
            shell.iter().find_map(|&f| {
                rings[f]
                    .outer
                    .first()
                    .and_then(|&vid| store.vertex(vid).ok().map(|v| v.point))
                    .or_else(|| match &emitted[f].surface {
                        FaceSurface::Sphere(s) => {
                            Some(s.center() + Vector3::new(s.radius(), 0.0, 0.0))
                        }
                        _ => None,
                    })
            })
        })
        .collect();

    let mut parents: Vec<Option<usize>> = vec![None; shells.len()];
    for i in 0..shells.len() {
        let Some(point) = sample[i] else { continue };
        let mut containers: Vec<usize> = Vec::new();
        for (j, shell) in shells.iter().enumerate() {
            if i != j && emitted_shell_contains(emitted, shell, &point) {
                containers.push(j);
            }
        }
        if containers.len() % 2 == 1 {
            // Innermost container: the one contained in all the others.
            let innermost = containers
                .iter()
                .copied()
                .max_by_key(|&j| {
                    sample[j].map_or(0, |p| {
                        containers
                            .iter()
                            .filter(|&&k| k != j && emitted_shell_contains(emitted, &shells[k], &p))
                            .count()
                    })
                })
                .unwrap_or(containers[0]);
            parents[i] = Some(innermost);
        }
    }
    parents
}

/// Ray-parity containment of a point in a set of emitted faces.
fn emitted_shell_contains(emitted: &[EmittedFace], shell: &[usize], point: &Point3) -> bool {
    let directions = [
        Vector3::new(1.0, 0.0, 0.0),
        Vector3::new(0.0, 1.0, 0.0),
        Vector3::new(0.577_350_3, 0.577_350_3, 0.577_350_3),
    ];
    'directions: for dir in directions {
        let mut crossings = 0u32;
        for &f in shell {
            let face = &emitted[f];
            match &face.surface {
                FaceSurface::Plane(plane) => {
                    match crate::math::intersect_3d::line_plane_intersect(
                        point,
                        &dir,
                        plane,
                        1e-12,
                    ) {
                        crate::math::intersect_3d::LinePlaneRelation::Point { point: hit, t } => {
                            if t <= VERTEX_TOLERANCE {
                                continue;
                            }
                            if !crate::math::polygon_3d::point_in_polygon_3d(
                                &hit,
                                &face.boundary,
                                plane,
                            ) {
                                continue;
                            }
                            if face.holes.iter().any(|h| {
                                crate::math::polygon_3d::point_in_polygon_3d(&hit, h, plane)
                            }) {
                                continue;
                            }
                            let near_edge = {
                                let n = face.boundary.len();
                                (0..n).any(|k| {
                                    crate::math::polygon_3d::point_segment_distance(
                                        &hit,
                                        &face.boundary[k],
                                        &face.boundary[(k + 1) % n],
                                    ) < VERTEX_TOLERANCE * 100.0
                                })
                            };
                            if near_edge {
                                continue 'directions;
                            }
                            crossings += 1;
                        }
                        crate::math::intersect_3d::LinePlaneRelation::OnPlane => {
                            continue 'directions;
                        }
                        crate::math::intersect_3d::LinePlaneRelation::Parallel => {}
                    }
                }
                FaceSurface::Sphere(sphere) if face.boundary.is_empty() => {
                    let oc = point - sphere.center();
                    let b = 2.0 * oc.dot(&dir);
                    let c = oc.norm_squared() - sphere.radius() * sphere.radius();
                    let disc = b * b - 4.0 * c;
                    if disc > 0.0 {
                        let sq = disc.sqrt();
                        for t in [(-b - sq) / 2.0, (-b + sq) / 2.0] {
                            if t > VERTEX_TOLERANCE {
                                crossings += 1;
                            }
                        }
                    }
                }
                FaceSurface::Sphere(_) | FaceSurface::Cylinder(_) => {}
            }
        }
        return crossings % 2 == 1;
    }
    false
}

/// Map from merged vertex pairs to the trimmed edges built by the
/// split stage, so the result topology reuses them (one output edge
/// per common block).
fn block_edge_lookup(
    store: &TopologyStore,
    ds: &IntersectionStore,
    splits: &EdgeSplits,
    merger: &VertexMerger,
) -> Result<HashMap<(VertexId, VertexId), EdgeId>> {
    let mut lookup = HashMap::new();
    for (id, block) in ds.pave_blocks().iter().enumerate() {
        let Some(edge_id) = splits.edge_of_block(id) else {
            continue;
        };
        let p1 = store.vertex(ds.vertex_id(block.pave1.vertex)?)?.point;
        let p2 = store.vertex(ds.vertex_id(block.pave2.vertex)?)?.point;
        let (Some(v1), Some(v2)) = (merger.lookup(&p1), merger.lookup(&p2)) else {
            continue;
        };
        lookup.entry(edge_key(v1, v2)).or_insert(edge_id);
    }
    Ok(lookup)
}

/// Inserts one emitted face into the store.
fn insert_face(
    store: &mut TopologyStore,
    face: &EmittedFace,
    rings: &FaceRings,
    flip: bool,
    reuse: &HashMap<(VertexId, VertexId), EdgeId>,
    history: &mut HistoryMap,
) -> Result<crate::topology::FaceId> {
    let mut outer = rings.outer.clone();
    let mut holes = rings.holes.clone();
    let same_sense = if flip { !face.same_sense } else { face.same_sense };
    if flip {
        outer.reverse();
        for hole in &mut holes {
            hole.reverse();
        }
    }

    let outer_wire = insert_ring_wire(store, &outer, reuse)?;
    let mut hole_wires = Vec::with_capacity(holes.len());
    for hole in &holes {
        if hole.len() >= 3 {
            hole_wires.push(insert_ring_wire(store, hole, reuse)?);
        }
    }

    let mut data = FaceData::new(face.surface.clone(), outer_wire, hole_wires);
    data.same_sense = same_sense;
    let face_id = store.add_face(data);
    history.add_result(face.source_face, ResultShape::Face(face_id));
    if face.modified {
        history.mark_modified(face.source_face);
    }
    Ok(face_id)
}

/// Builds a closed wire over a vertex ring, reusing split-stage edges
/// where the endpoints match one.
fn insert_ring_wire(
    store: &mut TopologyStore,
    ring: &[VertexId],
    reuse: &HashMap<(VertexId, VertexId), EdgeId>,
) -> Result<WireId> {
    let n = ring.len();
    let mut edges = Vec::with_capacity(n);

    if n == 0 {
        // Boundary-less wire carrying a closed surface.
        return Ok(store.add_wire(WireData {
            edges,
            is_closed: true,
        }));
    }

    for i in 0..n {
        let a = ring[i];
        let b = ring[(i + 1) % n];
        if a == b {
            continue;
        }
        let pa = store.vertex(a)?.point;
        let pb = store.vertex(b)?.point;
        if let Some(&existing) = reuse.get(&edge_key(a, b)) {
            // Orientation by position: the reused edge may hang off a
            // merged twin of the ring vertex.
            let start_point = store.vertex(store.edge(existing)?.start)?.point;
            let forward = (start_point - pa).norm() <= VERTEX_TOLERANCE * 10.0;
            edges.push(OrientedEdge::new(existing, forward));
            continue;
        }
        let line = crate::geometry::curve::Line::through(pa, pb)?;
        let edge = store.add_edge(EdgeData::new(
            a,
            b,
            EdgeCurve::Line(line),
            0.0,
            (pb - pa).norm(),
        ));
        edges.push(OrientedEdge::new(edge, true));
    }

    Ok(store.add_wire(WireData {
        edges,
        is_closed: true,
    }))
}

/// Chains the recorded section curves into wires.
///
/// # Errors
///
/// Returns an error if the section geometry is degenerate.
pub fn assemble_section(
    store: &mut TopologyStore,
    ds: &IntersectionStore,
    history: &mut HistoryMap,
) -> Result<Vec<WireId>> {
    let mut merger = VertexMerger::new(VERTEX_TOLERANCE * 10.0);
    let mut wires = Vec::new();

    for interference in ds.interferences() {
        let InterferencePayload::Section { points } = &interference.payload else {
            continue;
        };
        if points.len() < 2 {
            continue;
        }

        let start = merger.get_or_create(store, &points[0]);
        let end = merger.get_or_create(store, &points[points.len() - 1]);
        let polyline = Polyline::new(points.clone())?;
        let length = polyline.length();
        let edge = store.add_edge(EdgeData::new(
            start,
            end,
            EdgeCurve::Polyline(polyline),
            0.0,
            length,
        ));
        let wire = store.add_wire(WireData {
            edges: vec![OrientedEdge::new(edge, true)],
            is_closed: start == end,
        });
        history.add_result(interference.a, ResultShape::Wire(wire));
        history.add_result(interference.b, ResultShape::Wire(wire));
        wires.push(wire);
    }
    Ok(wires)
}

/// Spatial hash-based vertex merger.
///
/// Groups points by grid cell and reuses a vertex for any point within
/// `cell_size` of one already seen.
struct VertexMerger {
    cell_size: f64,
    map: HashMap<(i64, i64, i64), Vec<(VertexId, Point3)>>,
}

impl VertexMerger {
    fn new(cell_size: f64) -> Self {
        Self {
            cell_size,
            map: HashMap::new(),
        }
    }

    #[allow(clippy::cast_possible_truncation)]
    fn cell_key(&self, p: &Point3) -> (i64, i64, i64) {
        let inv = 1.0 / self.cell_size;
        (
            (p.x * inv).floor() as i64,
            (p.y * inv).floor() as i64,
            (p.z * inv).floor() as i64,
        )
    }

    fn find(&self, point: &Point3) -> Option<VertexId> {
        let key = self.cell_key(point);
        for dx in -1..=1 {
            for dy in -1..=1 {
                for dz in -1..=1 {
                    let neighbor = (key.0 + dx, key.1 + dy, key.2 + dz);
                    if let Some(entries) = self.map.get(&neighbor) {
                        for &(vid, ref existing) in entries {
                            if (point - existing).norm() < self.cell_size {
                                return Some(vid);
                            }
                        }
                    }
                }
            }
        }
        None
    }

    fn lookup(&self, point: &Point3) -> Option<VertexId> {
        self.find(point)
    }

    /// Registers an existing vertex without creating a new one; the
    /// first seed at a location wins.
    fn seed(&mut self, vid: VertexId, point: Point3) {
        if self.find(&point).is_some() {
            return;
        }
        self.map
            .entry(self.cell_key(&point))
            .or_default()
            .push((vid, point));
    }

    fn get_or_create(&mut self, store: &mut TopologyStore, point: &Point3) -> VertexId {
        if let Some(existing) = self.find(point) {
            return existing;
        }
        let vid = store.add_vertex(VertexData::new(*point));
        self.map
            .entry(self.cell_key(point))
            .or_default()
            .push((vid, *point));
        vid
    }
}
