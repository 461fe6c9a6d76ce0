//! Narrow-phase handlers with a vertex participant: VV, VE, VF.

use crate::ds::{
    Interference, InterferenceKind, InterferencePayload, IntersectionStore, ShapeIndex,
};
use crate::error::Result;
use crate::math::{midpoint, points_equal, Point3};
use crate::topology::{FaceSurface, TopologyStore};

use super::IntersectContext;

/// Vertex/vertex coincidence within the combined tolerance.
pub(super) fn vertex_vertex(
    store: &TopologyStore,
    ds: &IntersectionStore,
    ctx: &IntersectContext,
    a: ShapeIndex,
    b: ShapeIndex,
) -> Result<Vec<Interference>> {
    let tol = ctx.pair_tolerance(ds, a, b);
    let pa = store.vertex(ds.vertex_id(a)?)?.point;
    let pb = store.vertex(ds.vertex_id(b)?)?.point;

    if !points_equal(&pa, &pb, tol) {
        return Ok(Vec::new());
    }

    Ok(vec![Interference {
        kind: InterferenceKind::VertexVertex,
        a,
        b,
        payload: InterferencePayload::Point {
            point: midpoint(&pa, &pb),
            t_a: None,
            t_b: None,
        },
        tolerance: tol,
    }])
}

/// Vertex/edge: closest-point projection onto the edge curve plus a
/// distance test.
pub(super) fn vertex_edge(
    store: &TopologyStore,
    ds: &IntersectionStore,
    ctx: &IntersectContext,
    a: ShapeIndex,
    b: ShapeIndex,
) -> Result<Vec<Interference>> {
    let tol = ctx.pair_tolerance(ds, a, b);
    let point = store.vertex(ds.vertex_id(a)?)?.point;
    let edge = store.edge(ds.edge_id(b)?)?;

    let t = edge.curve.closest_parameter(&point);
    if t < edge.t_start - tol || t > edge.t_end + tol {
        return Ok(Vec::new());
    }

    let on_curve = edge.curve.evaluate(t)?;
    if !points_equal(&point, &on_curve, tol) {
        return Ok(Vec::new());
    }

    Ok(vec![Interference {
        kind: InterferenceKind::VertexEdge,
        a,
        b,
        payload: InterferencePayload::Point {
            point: on_curve,
            t_a: None,
            t_b: Some(t.clamp(edge.t_start, edge.t_end)),
        },
        tolerance: tol,
    }])
}

/// Vertex/face: signed surface distance plus boundary containment.
pub(super) fn vertex_face(
    store: &TopologyStore,
    ds: &IntersectionStore,
    ctx: &IntersectContext,
    a: ShapeIndex,
    b: ShapeIndex,
) -> Result<Vec<Interference>> {
    let tol = ctx.pair_tolerance(ds, a, b);
    let point = store.vertex(ds.vertex_id(a)?)?.point;
    let face_id = ds.face_id(b)?;
    let face = store.face(face_id)?;

    if face.surface.signed_distance(&point).abs() > tol {
        return Ok(Vec::new());
    }
    if !point_on_face(store, ds, b, &point, tol)? {
        return Ok(Vec::new());
    }

    Ok(vec![Interference {
        kind: InterferenceKind::VertexFace,
        a,
        b,
        payload: InterferencePayload::Point {
            point,
            t_a: None,
            t_b: None,
        },
        tolerance: tol,
    }])
}

/// Whether a point already known to lie on the face's surface falls
/// within the face boundary.
///
/// Planar faces test the boundary polygon; a face without boundary
/// edges covers its whole (closed) surface; anything else answers
/// conservatively.
pub(crate) fn point_on_face(
    store: &TopologyStore,
    ds: &IntersectionStore,
    face: ShapeIndex,
    point: &Point3,
    _tol: f64,
) -> Result<bool> {
    let face_data = store.face(ds.face_id(face)?)?;
    let wire = store.wire(face_data.outer_wire)?;
    if wire.edges.is_empty() {
        return Ok(true);
    }

    match &face_data.surface {
        FaceSurface::Plane(plane) => {
            let polygon = store.face_outer_polygon(ds.face_id(face)?)?;
            if !crate::math::polygon_3d::point_in_polygon_3d(point, &polygon, plane) {
                return Ok(false);
            }
            for &hole in &face_data.inner_wires {
                let hole_polygon = store.wire_polygon(hole)?;
                if crate::math::polygon_3d::point_in_polygon_3d(point, &hole_polygon, plane) {
                    return Ok(false);
                }
            }
            Ok(true)
        }
        // Bounded quadric patches keep the candidate; downstream
        // classification resolves the over-approximation.
        FaceSurface::Cylinder(_) | FaceSurface::Sphere(_) => Ok(true),
    }
}
