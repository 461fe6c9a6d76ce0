//! Edge/face narrow phase: analytic line/plane, sampled sign-change
//! bracketing against the signed surface distance otherwise.

use crate::ds::{
    Interference, InterferenceKind, InterferencePayload, IntersectionStore, ShapeIndex,
};
use crate::error::{BooleanError, Result};
use crate::geometry::curve::Curve;
use crate::math::intersect_3d::{line_plane_intersect, LinePlaneRelation};
use crate::math::polygon_3d::clip_segment_to_polygon;
use crate::math::root::bracketed_newton;
use crate::topology::{EdgeCurve, FaceSurface, TopologyStore};

use super::vertex::point_on_face;
use super::IntersectContext;

/// Sample count for the sign-change sweep.
const SAMPLES: usize = 64;

pub(super) fn edge_face(
    store: &TopologyStore,
    ds: &IntersectionStore,
    ctx: &IntersectContext,
    a: ShapeIndex,
    b: ShapeIndex,
) -> Result<Vec<Interference>> {
    let tol = ctx.pair_tolerance(ds, a, b);
    let edge = store.edge(ds.edge_id(a)?)?;
    let face = store.face(ds.face_id(b)?)?;

    if let (EdgeCurve::Line(line), FaceSurface::Plane(plane)) = (&edge.curve, &face.surface) {
        // Analytic fast path.
        match line_plane_intersect(line.origin(), line.direction(), plane, tol) {
            LinePlaneRelation::Point { point, t } => {
                if t < edge.t_start - tol || t > edge.t_end + tol {
                    return Ok(Vec::new());
                }
                if !point_on_face(store, ds, b, &point, tol)? {
                    return Ok(Vec::new());
                }
                return Ok(vec![Interference {
                    kind: InterferenceKind::EdgeFace,
                    a,
                    b,
                    payload: InterferencePayload::Point {
                        point,
                        t_a: Some(t.clamp(edge.t_start, edge.t_end)),
                        t_b: None,
                    },
                    tolerance: tol,
                }]);
            }
            LinePlaneRelation::OnPlane => {
                // The edge lies in the face plane: the contact range is
                // the segment clipped to the face boundary.
                let start = line.evaluate(edge.t_start)?;
                let end = line.evaluate(edge.t_end)?;
                let polygon = store.face_outer_polygon(ds.face_id(b)?)?;
                let spans = clip_segment_to_polygon(&start, &end, &polygon, plane, tol);
                let span_len = edge.t_end - edge.t_start;
                return Ok(spans
                    .into_iter()
                    .filter(|(s0, s1)| (s1 - s0) * span_len > tol)
                    .map(|(s0, s1)| Interference {
                        kind: InterferenceKind::EdgeFace,
                        a,
                        b,
                        payload: InterferencePayload::EdgeOnFace {
                            range: (
                                edge.t_start + s0 * span_len,
                                edge.t_start + s1 * span_len,
                            ),
                        },
                        tolerance: tol,
                    })
                    .collect());
            }
            LinePlaneRelation::Parallel => return Ok(Vec::new()),
        }
    }

    sampled(store, ds, ctx, a, b, tol)
}

/// General path: sweep the signed surface distance along the edge and
/// refine each sign change; a whole-range contact collapses to an
/// on-face interval.
fn sampled(
    store: &TopologyStore,
    ds: &IntersectionStore,
    _ctx: &IntersectContext,
    a: ShapeIndex,
    b: ShapeIndex,
    tol: f64,
) -> Result<Vec<Interference>> {
    let edge = store.edge(ds.edge_id(a)?)?;
    let face = store.face(ds.face_id(b)?)?;

    let span = edge.t_end - edge.t_start;
    if span <= 0.0 {
        return Ok(Vec::new());
    }
    #[allow(clippy::cast_precision_loss)]
    let dt = span / (SAMPLES - 1) as f64;

    let mut distances = Vec::with_capacity(SAMPLES);
    for i in 0..SAMPLES {
        #[allow(clippy::cast_precision_loss)]
        let t = edge.t_start + dt * i as f64;
        let p = edge.curve.evaluate(t)?;
        distances.push((t, face.surface.signed_distance(&p)));
    }

    // Tangential contact over the whole sweep: an on-face interval.
    if distances.iter().all(|&(_, d)| d.abs() <= tol) {
        return Ok(vec![Interference {
            kind: InterferenceKind::EdgeFace,
            a,
            b,
            payload: InterferencePayload::EdgeOnFace {
                range: (edge.t_start, edge.t_end),
            },
            tolerance: tol,
        }]);
    }

    let mut out = Vec::new();
    for i in 0..SAMPLES - 1 {
        let (t0, d0) = distances[i];
        let (t1, d1) = distances[i + 1];
        if d0 * d1 > 0.0 {
            continue;
        }
        if d0.abs() <= tol && d1.abs() <= tol {
            continue;
        }

        let surface = &face.surface;
        let curve = &edge.curve;
        let g = |t: f64| match curve.evaluate(t) {
            Ok(p) => surface.signed_distance(&p),
            Err(_) => f64::NAN,
        };
        let dg = |t: f64| {
            let h = dt * 1e-4;
            (g(t + h) - g(t - h)) / (2.0 * h)
        };

        let Some(t) = bracketed_newton(&g, &dg, t0, t1, tol * 0.1) else {
            // Non-convergence is recoverable: the orchestrator logs it
            // and treats the pair as non-interfering.
            return Err(BooleanError::Intersection { a, b }.into());
        };

        let point = edge.curve.evaluate(t)?;
        if !point_on_face(store, ds, b, &point, tol)? {
            continue;
        }
        out.push(Interference {
            kind: InterferenceKind::EdgeFace,
            a,
            b,
            payload: InterferencePayload::Point {
                point,
                t_a: Some(t),
                t_b: None,
            },
            tolerance: tol,
        });
    }

    Ok(out)
}
