//! Face splitting: boundary polygons with pave points inserted, cut by
//! the face/face section geometry into provenance-tagged fragments.
//!
//! Open section curves touching a face are chained into paths whose
//! endpoints land on the face boundary; each path carves the piece it
//! crosses into two. Splitting along paths (rather than unbounded
//! lines) keeps boundary subdivisions confined to real section
//! endpoints, which is what makes the fragments of adjacent faces
//! stitch back together watertight.

use tracing::{debug, warn};

use crate::ds::{InterferencePayload, IntersectionStore, ShapeIndex};
use crate::error::Result;
use crate::geometry::surface::{Plane, Surface};
use crate::intersect::IntersectContext;
use crate::math::polygon_3d::{
    point_in_polygon_3d, point_segment_distance, polygon_area_3d, polygon_centroid,
};
use crate::math::{points_equal, Point3};
use crate::report::{DiagnosticCode, Report};
use crate::topology::{FaceSurface, TopologyStore, WireId};

/// A face region produced by the split stage, tagged with provenance.
#[derive(Debug, Clone)]
pub struct FaceFragment {
    /// Outer boundary polygon, pave vertices included.
    pub boundary: Vec<Point3>,
    /// Hole polygons.
    pub holes: Vec<Vec<Point3>>,
    /// Support surface of the source face.
    pub surface: FaceSurface,
    /// Orientation flag carried over from the source face.
    pub same_sense: bool,
    /// Dense index of the source face.
    pub source_face: ShapeIndex,
    /// Operand the source face belongs to.
    pub operand: usize,
    /// Interior sample point used by classification.
    pub probe: Point3,
    /// Whether the source face was actually divided.
    pub was_split: bool,
}

/// Splits every face of every operand into fragments.
///
/// # Errors
///
/// Returns an error if face topology cannot be read.
pub fn split_faces(
    store: &TopologyStore,
    ds: &IntersectionStore,
    ctx: &IntersectContext,
    report: &mut Report,
) -> Result<Vec<FaceFragment>> {
    let mut fragments = Vec::new();
    for operand in 0..ds.operand_count() {
        for &face_index in &ds.operand(operand).faces {
            split_one_face(store, ds, ctx, report, face_index, operand, &mut fragments)?;
        }
    }
    report.stats.fragments = fragments.len();
    Ok(fragments)
}

pub(crate) fn split_one_face(
    store: &TopologyStore,
    ds: &IntersectionStore,
    ctx: &IntersectContext,
    report: &mut Report,
    face_index: ShapeIndex,
    operand: usize,
    out: &mut Vec<FaceFragment>,
) -> Result<()> {
    let face_id = ds.face_id(face_index)?;
    let face = store.face(face_id)?;
    let tol = ctx.pair_tolerance(ds, face_index, face_index);

    let sections: Vec<Vec<Point3>> = ds
        .interferences()
        .iter()
        .filter(|i| i.a == face_index || i.b == face_index)
        .filter_map(|i| match &i.payload {
            InterferencePayload::Section { points } => Some(points.clone()),
            _ => None,
        })
        .collect();

    match &face.surface {
        FaceSurface::Plane(plane) => {
            let boundary = boundary_with_paves(store, ds, face.outer_wire)?;
            let holes: Vec<Vec<Point3>> = face
                .inner_wires
                .iter()
                .map(|&w| boundary_with_paves(store, ds, w))
                .collect::<Result<_>>()?;
            split_planar(
                report, face_index, operand, face.same_sense, plane, boundary, holes, &sections,
                tol, out,
            );
        }
        FaceSurface::Sphere(sphere) => {
            split_spherical(
                report,
                face_index,
                operand,
                face.same_sense,
                &face.surface,
                sphere.center(),
                sphere.radius(),
                &sections,
                out,
            );
        }
        FaceSurface::Cylinder(cylinder) => {
            if !sections.is_empty() {
                warn!(face = face_index, "cylindrical face splitting is unsupported; kept whole");
                report.warn(DiagnosticCode::AmbiguousClassification, vec![face_index]);
            }
            let boundary = store.face_outer_polygon(face_id)?;
            let probe = boundary
                .first()
                .copied()
                .unwrap_or_else(|| cylinder.evaluate(0.0, 0.0).unwrap_or_else(|_| Point3::origin()));
            out.push(FaceFragment {
                boundary,
                holes: vec![],
                surface: face.surface.clone(),
                same_sense: face.same_sense,
                source_face: face_index,
                operand,
                probe,
                was_split: false,
            });
        }
    }
    Ok(())
}

/// The wire polygon with each edge's internal pave points spliced in at
/// their traversal positions, so fragment boundaries share the exact
/// split-vertex coordinates.
///
/// The assembler uses this ring as well when it re-glues a fully kept
/// face: the pave vertices must survive there, or neighbors that did
/// split would have no twin for their sub-edges.
pub(crate) fn boundary_with_paves(
    store: &TopologyStore,
    ds: &IntersectionStore,
    wire_id: WireId,
) -> Result<Vec<Point3>> {
    let wire = store.wire(wire_id)?;
    let mut polygon = Vec::new();

    for oe in &wire.edges {
        let edge = store.edge(oe.edge)?;
        let start = if oe.forward { edge.start } else { edge.end };
        polygon.push(store.vertex(start)?.point);

        if let Some(edge_index) = ds.edge_index(oe.edge) {
            let blocks = ds.blocks_of_edge(edge_index);
            if blocks.len() > 1 {
                let mut inner: Vec<Point3> = Vec::with_capacity(blocks.len() - 1);
                for &block in &blocks[..blocks.len() - 1] {
                    let vertex = ds.pave_block(block).pave2.vertex;
                    inner.push(store.vertex(ds.vertex_id(vertex)?)?.point);
                }
                if !oe.forward {
                    inner.reverse();
                }
                polygon.extend(inner);
            }
        }
    }
    Ok(polygon)
}

/// Planar splitting: chained section paths carve pieces in two, closed
/// section loops carve disks and holes.
#[allow(clippy::too_many_arguments)]
fn split_planar(
    report: &mut Report,
    face_index: ShapeIndex,
    operand: usize,
    same_sense: bool,
    plane: &Plane,
    boundary: Vec<Point3>,
    holes: Vec<Vec<Point3>>,
    sections: &[Vec<Point3>],
    tol: f64,
    out: &mut Vec<FaceFragment>,
) {
    let snap = tol * 10.0;
    let (paths, loops) = chain_sections(sections, &boundary, snap);

    let mut pieces: Vec<(Vec<Point3>, Vec<Vec<Point3>>)> = vec![(boundary, holes)];

    for path in paths {
        let mut applied = false;
        for index in 0..pieces.len() {
            let Some((left, right)) = split_polygon_by_path(&pieces[index].0, &path, plane, snap)
            else {
                continue;
            };

            // A path grazing the boundary produces an empty sliver:
            // treat it as a no-op rather than inserting stray vertices.
            let min_area = tol * tol;
            let normal = plane.plane_normal();
            if polygon_area_3d(&left, normal) <= min_area
                || polygon_area_3d(&right, normal) <= min_area
            {
                applied = true;
                break;
            }

            let piece_holes = pieces[index].1.clone();
            let assign = |part: &[Point3]| -> Vec<Vec<Point3>> {
                piece_holes
                    .iter()
                    .filter(|h| point_in_polygon_3d(&polygon_centroid(h), part, plane))
                    .cloned()
                    .collect()
            };
            let left_holes = assign(&left);
            let right_holes = assign(&right);
            pieces[index] = (left, left_holes);
            pieces.push((right, right_holes));
            applied = true;
            break;
        }
        if !applied {
            // Dead-ended or tangential path: no piece can be carved.
            debug!(face = face_index, "section path did not cross the face; skipped");
        }
    }

    // Closed loops strictly inside a piece carve a disk out of it.
    for ring in loops {
        let center = polygon_centroid(&ring);
        let mut carved = false;
        for (piece, piece_holes) in &mut pieces {
            let interior = point_in_polygon_3d(&center, piece, plane)
                && ring.iter().all(|p| {
                    point_in_polygon_3d(p, piece, plane)
                        && ring_boundary_distance(p, piece) > snap
                });
            if interior {
                piece_holes.push(ring.clone());
                carved = true;
                break;
            }
        }
        if carved {
            pieces.push((ring, vec![]));
        }
    }

    let normal = plane.plane_normal();
    let min_area = tol * tol;
    let survivors: Vec<(Vec<Point3>, Vec<Vec<Point3>>)> = pieces
        .into_iter()
        .filter(|(piece, _)| piece.len() >= 3 && polygon_area_3d(piece, normal) > min_area)
        .collect();

    let was_split = survivors.len() > 1;
    for (piece, piece_holes) in survivors {
        let probe = interior_probe(&piece, &piece_holes, plane);
        out.push(FaceFragment {
            boundary: piece,
            holes: piece_holes,
            surface: FaceSurface::Plane(plane.clone()),
            same_sense,
            source_face: face_index,
            operand,
            probe,
            was_split,
        });
    }
}

/// Spherical splitting: one closed section loop divides the sphere into
/// two caps; anything more intricate stays whole with a warning.
#[allow(clippy::too_many_arguments)]
fn split_spherical(
    report: &mut Report,
    face_index: ShapeIndex,
    operand: usize,
    same_sense: bool,
    surface: &FaceSurface,
    center: &Point3,
    radius: f64,
    sections: &[Vec<Point3>],
    out: &mut Vec<FaceFragment>,
) {
    let fallback_probe = center + crate::math::Vector3::new(radius, 0.0, 0.0);

    let whole = |probe: Point3, out: &mut Vec<FaceFragment>| {
        out.push(FaceFragment {
            boundary: vec![],
            holes: vec![],
            surface: surface.clone(),
            same_sense,
            source_face: face_index,
            operand,
            probe,
            was_split: false,
        });
    };

    if sections.is_empty() {
        whole(fallback_probe, out);
        return;
    }

    if sections.len() > 1 {
        warn!(
            face = face_index,
            sections = sections.len(),
            "multiple section loops on a spherical face; kept whole"
        );
        report.warn(DiagnosticCode::AmbiguousClassification, vec![face_index]);
        whole(fallback_probe, out);
        return;
    }

    // Cap centers: project the loop centroid onto the sphere from both
    // sides.
    let ring = &sections[0];
    let centroid = polygon_centroid(ring);
    let offset = centroid - center;
    let dir = if offset.norm() < radius * 1e-6 {
        // The loop is a great circle; use its plane normal instead.
        ring_normal(ring, &centroid)
    } else {
        offset.normalize()
    };

    let near = center + dir * radius;
    let far = center - dir * radius;

    for (probe, reversed) in [(near, false), (far, true)] {
        let mut boundary = ring.clone();
        if reversed {
            boundary.reverse();
        }
        out.push(FaceFragment {
            boundary,
            holes: vec![],
            surface: surface.clone(),
            same_sense,
            source_face: face_index,
            operand,
            probe,
            was_split: true,
        });
    }
}

/// Normal of a ring of points around a centroid.
fn ring_normal(ring: &[Point3], centroid: &Point3) -> crate::math::Vector3 {
    let mut normal = crate::math::Vector3::zeros();
    for i in 0..ring.len() {
        let a = ring[i] - centroid;
        let b = ring[(i + 1) % ring.len()] - centroid;
        normal += a.cross(&b);
    }
    let len = normal.norm();
    if len > 0.0 {
        normal / len
    } else {
        crate::math::Vector3::new(0.0, 0.0, 1.0)
    }
}

/// Sorts the raw section polylines of one face into open paths and
/// closed loops.
///
/// Boundary-hugging sections (seams already represented by paves) are
/// discarded; the remaining open polylines are chained end to end
/// within `snap` so an L-shaped crossing assembled from several
/// pairwise sections becomes one path.
fn chain_sections(
    sections: &[Vec<Point3>],
    boundary: &[Point3],
    snap: f64,
) -> (Vec<Vec<Point3>>, Vec<Vec<Point3>>) {
    let mut open: Vec<Vec<Point3>> = Vec::new();
    let mut loops: Vec<Vec<Point3>> = Vec::new();

    for section in sections {
        if section.len() < 2 {
            continue;
        }
        if section
            .iter()
            .all(|p| ring_boundary_distance(p, boundary) <= snap)
        {
            continue;
        }
        let closed =
            section.len() > 2 && points_equal(&section[0], &section[section.len() - 1], snap);
        if closed {
            let mut ring = section.clone();
            ring.pop();
            loops.push(ring);
        } else {
            open.push(section.clone());
        }
    }

    // Chain open polylines that share endpoints.
    let mut paths: Vec<Vec<Point3>> = Vec::new();
    while let Some(mut path) = open.pop() {
        loop {
            let tail = path[path.len() - 1];
            let head = path[0];
            let Some(pos) = open.iter().position(|other| {
                points_equal(&other[0], &tail, snap)
                    || points_equal(&other[other.len() - 1], &tail, snap)
                    || points_equal(&other[0], &head, snap)
                    || points_equal(&other[other.len() - 1], &head, snap)
            }) else {
                break;
            };
            let mut other = open.swap_remove(pos);
            if points_equal(&other[0], &tail, snap) {
                path.extend(other.into_iter().skip(1));
            } else if points_equal(&other[other.len() - 1], &tail, snap) {
                other.reverse();
                path.extend(other.into_iter().skip(1));
            } else if points_equal(&other[other.len() - 1], &head, snap) {
                other.extend(path.into_iter().skip(1));
                path = other;
            } else {
                other.reverse();
                other.extend(path.into_iter().skip(1));
                path = other;
            }
        }

        if path.len() > 2 && points_equal(&path[0], &path[path.len() - 1], snap) {
            path.pop();
            loops.push(path);
        } else {
            paths.push(path);
        }
    }

    (paths, loops)
}

/// Distance from a point to a closed ring boundary.
fn ring_boundary_distance(point: &Point3, ring: &[Point3]) -> f64 {
    let n = ring.len();
    if n < 2 {
        return f64::INFINITY;
    }
    let mut best = f64::INFINITY;
    for i in 0..n {
        best = best.min(point_segment_distance(point, &ring[i], &ring[(i + 1) % n]));
    }
    best
}

/// Where a path endpoint sits on a ring.
enum RingLocation {
    Vertex(usize),
    /// Edge index plus the normalized position along it.
    Edge(usize, f64),
}

fn locate_on_ring(ring: &[Point3], point: &Point3, snap: f64) -> Option<RingLocation> {
    for (i, v) in ring.iter().enumerate() {
        if points_equal(v, point, snap) {
            return Some(RingLocation::Vertex(i));
        }
    }
    let n = ring.len();
    for i in 0..n {
        let a = ring[i];
        let b = ring[(i + 1) % n];
        if point_segment_distance(point, &a, &b) <= snap {
            let ab = b - a;
            let len_sq = ab.norm_squared();
            if len_sq > 0.0 {
                let t = ((point - a).dot(&ab) / len_sq).clamp(0.0, 1.0);
                return Some(RingLocation::Edge(i, t));
            }
        }
    }
    None
}

#[allow(clippy::cast_precision_loss)]
fn ring_key(location: &RingLocation) -> f64 {
    match location {
        RingLocation::Vertex(i) => *i as f64,
        RingLocation::Edge(i, t) => *i as f64 + t.clamp(1e-6, 1.0 - 1e-6),
    }
}

/// Splits a polygon in two along a path whose endpoints lie on the
/// polygon boundary and whose interior crosses the polygon.
///
/// Returns `None` when the path does not properly cross this polygon
/// (endpoints off the boundary, or interior outside).
fn split_polygon_by_path(
    polygon: &[Point3],
    path: &[Point3],
    plane: &Plane,
    snap: f64,
) -> Option<(Vec<Point3>, Vec<Point3>)> {
    if polygon.len() < 3 || path.len() < 2 {
        return None;
    }

    let start = locate_on_ring(polygon, &path[0], snap)?;
    let end = locate_on_ring(polygon, &path[path.len() - 1], snap)?;
    let start_key = ring_key(&start);
    let end_key = ring_key(&end);
    if (start_key - end_key).abs() < 1e-9 {
        return None;
    }

    // The path must pass through the polygon interior.
    let probe = if path.len() == 2 {
        nalgebra::center(&path[0], &path[1])
    } else {
        path[path.len() / 2]
    };
    if !point_in_polygon_3d(&probe, polygon, plane) {
        return None;
    }

    // Augment the ring with the path endpoints (snapped endpoints reuse
    // the existing vertex).
    #[allow(clippy::cast_precision_loss)]
    let mut aug: Vec<(f64, Point3)> = polygon
        .iter()
        .enumerate()
        .map(|(i, p)| (i as f64, *p))
        .collect();
    if matches!(start, RingLocation::Edge(..)) {
        aug.push((start_key, path[0]));
    }
    if matches!(end, RingLocation::Edge(..)) {
        aug.push((end_key, path[path.len() - 1]));
    }
    aug.sort_by(|x, y| x.0.partial_cmp(&y.0).unwrap_or(std::cmp::Ordering::Equal));

    let position = |key: f64| -> usize {
        aug.iter()
            .position(|(k, _)| (k - key).abs() < 1e-12)
            .unwrap_or(0)
    };
    let a = position(start_key);
    let b = position(end_key);

    let n = aug.len();
    let interior: Vec<Point3> = path[1..path.len() - 1].to_vec();

    // Piece one: boundary from the start location forward to the end
    // location, then back along the path.
    let mut left: Vec<Point3> = Vec::new();
    let mut i = a;
    loop {
        left.push(aug[i].1);
        if i == b {
            break;
        }
        i = (i + 1) % n;
    }
    left.extend(interior.iter().rev().copied());

    // Piece two: the remaining boundary, then forward along the path.
    let mut right: Vec<Point3> = Vec::new();
    let mut i = b;
    loop {
        right.push(aug[i].1);
        if i == a {
            break;
        }
        i = (i + 1) % n;
    }
    right.extend(interior.iter().copied());

    if left.len() < 3 || right.len() < 3 {
        return None;
    }
    Some((left, right))
}

/// An interior point of a polygon-with-holes, for classification.
fn interior_probe(boundary: &[Point3], holes: &[Vec<Point3>], plane: &Plane) -> Point3 {
    let inside = |p: &Point3| {
        point_in_polygon_3d(p, boundary, plane)
            && holes.iter().all(|h| !point_in_polygon_3d(p, h, plane))
    };

    let centroid = polygon_centroid(boundary);
    if inside(&centroid) {
        return centroid;
    }

    // Non-convex or holed piece: probe midpoints of vertex diagonals.
    let n = boundary.len();
    for offset in 2..n {
        for i in 0..n {
            let candidate = nalgebra::center(&boundary[i], &boundary[(i + offset) % n]);
            if inside(&candidate) {
                return candidate;
            }
        }
    }
    centroid
}
