//! Edge/edge narrow phase: analytic line pairs, sampled iteration for
//! curve pairs, tangential overlaps as CommonBlock candidates.

use crate::ds::{
    Interference, InterferenceKind, InterferencePayload, IntersectionStore, ShapeIndex,
};
use crate::error::Result;
use crate::geometry::curve::{Curve, Line};
use crate::math::{intersect_3d::line_line_closest, midpoint, root::golden_minimum, points_equal};
use crate::topology::{EdgeCurve, EdgeData, TopologyStore};

use super::IntersectContext;

/// Sample count for the iterative curve/curve path.
const SAMPLES: usize = 64;

pub(super) fn edge_edge(
    store: &TopologyStore,
    ds: &IntersectionStore,
    ctx: &IntersectContext,
    a: ShapeIndex,
    b: ShapeIndex,
) -> Result<Vec<Interference>> {
    let tol = ctx.pair_tolerance(ds, a, b);
    let ea = store.edge(ds.edge_id(a)?)?;
    let eb = store.edge(ds.edge_id(b)?)?;

    if let (EdgeCurve::Line(la), EdgeCurve::Line(lb)) = (&ea.curve, &eb.curve) {
        return line_line(la, ea, lb, eb, tol, a, b);
    }
    sampled(ea, eb, tol, a, b)
}

/// Analytic path for two line-carried edges.
fn line_line(
    la: &Line,
    ea: &EdgeData,
    lb: &Line,
    eb: &EdgeData,
    tol: f64,
    a: ShapeIndex,
    b: ShapeIndex,
) -> Result<Vec<Interference>> {
    if let Some((s, t)) = line_line_closest(la.origin(), la.direction(), lb.origin(), lb.direction(), tol)
    {
        if s < ea.t_start - tol || s > ea.t_end + tol || t < eb.t_start - tol || t > eb.t_end + tol
        {
            return Ok(Vec::new());
        }
        let pa = la.evaluate(s)?;
        let pb = lb.evaluate(t)?;
        if !points_equal(&pa, &pb, tol) {
            return Ok(Vec::new());
        }
        return Ok(vec![Interference {
            kind: InterferenceKind::EdgeEdge,
            a,
            b,
            payload: InterferencePayload::Point {
                point: midpoint(&pa, &pb),
                t_a: Some(s.clamp(ea.t_start, ea.t_end)),
                t_b: Some(t.clamp(eb.t_start, eb.t_end)),
            },
            tolerance: tol,
        }]);
    }

    // Parallel carriers: either offset (no interference) or collinear,
    // where the shared interval becomes a CommonBlock candidate.
    let offset = {
        let foot = lb.closest_parameter(la.origin());
        (la.origin() - lb.evaluate(foot)?).norm()
    };
    if offset > tol {
        return Ok(Vec::new());
    }

    let a0 = la.evaluate(ea.t_start)?;
    let a1 = la.evaluate(ea.t_end)?;
    let (mut b_lo, mut b_hi) = (lb.closest_parameter(&a0), lb.closest_parameter(&a1));
    if b_lo > b_hi {
        std::mem::swap(&mut b_lo, &mut b_hi);
    }

    let lo = b_lo.max(eb.t_start);
    let hi = b_hi.min(eb.t_end);
    if hi - lo <= tol {
        return Ok(Vec::new());
    }

    let (mut a_lo, mut a_hi) = (
        la.closest_parameter(&lb.evaluate(lo)?),
        la.closest_parameter(&lb.evaluate(hi)?),
    );
    if a_lo > a_hi {
        std::mem::swap(&mut a_lo, &mut a_hi);
    }

    Ok(vec![Interference {
        kind: InterferenceKind::EdgeEdge,
        a,
        b,
        payload: InterferencePayload::EdgeOverlap {
            range_a: (a_lo.max(ea.t_start), a_hi.min(ea.t_end)),
            range_b: (lo, hi),
        },
        tolerance: tol,
    }])
}

/// Iterative path: sample edge `a`, project onto edge `b`, refine
/// touching runs. Contiguous runs collapse to one tangential overlap
/// instead of a chain of points.
fn sampled(
    ea: &EdgeData,
    eb: &EdgeData,
    tol: f64,
    a: ShapeIndex,
    b: ShapeIndex,
) -> Result<Vec<Interference>> {
    let span = ea.t_end - ea.t_start;
    if span <= 0.0 {
        return Ok(Vec::new());
    }
    #[allow(clippy::cast_precision_loss)]
    let dt = span / (SAMPLES - 1) as f64;

    // (t on a, u on b, distance) per sample.
    let mut probes = Vec::with_capacity(SAMPLES);
    for i in 0..SAMPLES {
        #[allow(clippy::cast_precision_loss)]
        let t = ea.t_start + dt * i as f64;
        let pa = ea.curve.evaluate(t)?;
        let u = eb.curve.closest_parameter(&pa).clamp(eb.t_start, eb.t_end);
        let pb = eb.curve.evaluate(u)?;
        probes.push((t, u, (pa - pb).norm()));
    }

    let distance_at = |t: f64| -> f64 {
        let Ok(pa) = ea.curve.evaluate(t) else {
            return f64::INFINITY;
        };
        let u = eb.curve.closest_parameter(&pa).clamp(eb.t_start, eb.t_end);
        match eb.curve.evaluate(u) {
            Ok(pb) => (pa - pb).norm(),
            Err(_) => f64::INFINITY,
        }
    };

    let mut out = Vec::new();
    let mut consumed = vec![false; SAMPLES];

    // Tangential stretches first: three or more consecutive touching
    // samples collapse to one overlap interval.
    let mut run_start: Option<usize> = None;
    for i in 0..=SAMPLES {
        let touching = i < SAMPLES && probes[i].2 <= tol;
        match (run_start, touching) {
            (None, true) => run_start = Some(i),
            (Some(first), false) => {
                let last = i - 1;
                if last - first >= 2 {
                    for flag in &mut consumed[first..=last] {
                        *flag = true;
                    }
                    let (u_lo, u_hi) = {
                        let (mut lo, mut hi) = (probes[first].1, probes[last].1);
                        if lo > hi {
                            std::mem::swap(&mut lo, &mut hi);
                        }
                        (lo, hi)
                    };
                    out.push(Interference {
                        kind: InterferenceKind::EdgeEdge,
                        a,
                        b,
                        payload: InterferencePayload::EdgeOverlap {
                            range_a: (probes[first].0, probes[last].0),
                            range_b: (u_lo, u_hi),
                        },
                        tolerance: tol,
                    });
                }
                run_start = None;
            }
            _ => {}
        }
    }

    // Isolated crossings and tangencies: refine every local minimum of
    // the sampled distance profile, whether or not a sample already
    // dips below tolerance.
    let mut point_params: Vec<f64> = Vec::new();
    for i in 0..SAMPLES {
        if consumed[i] {
            continue;
        }
        let left = if i == 0 { f64::INFINITY } else { probes[i - 1].2 };
        let right = if i + 1 == SAMPLES {
            f64::INFINITY
        } else {
            probes[i + 1].2
        };
        if probes[i].2 > left || probes[i].2 > right {
            continue;
        }

        let lo = (probes[i].0 - dt).max(ea.t_start);
        let hi = (probes[i].0 + dt).min(ea.t_end);
        let t = golden_minimum(&distance_at, lo, hi, tol * 0.01);
        if distance_at(t) > tol {
            continue;
        }
        if point_params.iter().any(|&prev| (prev - t).abs() <= dt) {
            continue;
        }
        point_params.push(t);

        let pa = ea.curve.evaluate(t)?;
        let u = eb.curve.closest_parameter(&pa).clamp(eb.t_start, eb.t_end);
        let pb = eb.curve.evaluate(u)?;
        out.push(Interference {
            kind: InterferenceKind::EdgeEdge,
            a,
            b,
            payload: InterferencePayload::Point {
                point: midpoint(&pa, &pb),
                t_a: Some(t),
                t_b: Some(u),
            },
            tolerance: tol,
        });
    }

    Ok(out)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::math::{Point3, Vector3};
    use crate::topology::{TopologyStore, VertexData};

    fn line_edge(store: &mut TopologyStore, from: Point3, to: Point3) -> EdgeData {
        let start = store.add_vertex(VertexData::new(from));
        let end = store.add_vertex(VertexData::new(to));
        let line = Line::through(from, to).unwrap();
        EdgeData::new(start, end, EdgeCurve::Line(line), 0.0, (to - from).norm())
    }

    fn p(x: f64, y: f64, z: f64) -> Point3 {
        Point3::new(x, y, z)
    }

    #[test]
    fn crossing_segments_meet_at_a_point() {
        let mut store = TopologyStore::new();
        let ea = line_edge(&mut store, p(0.0, 0.0, 0.0), p(2.0, 0.0, 0.0));
        let eb = line_edge(&mut store, p(1.0, -1.0, 0.0), p(1.0, 1.0, 0.0));
        let (EdgeCurve::Line(la), EdgeCurve::Line(lb)) = (&ea.curve, &eb.curve) else {
            unreachable!()
        };

        let out = line_line(la, &ea, lb, &eb, 1e-7, 0, 1).unwrap();
        assert_eq!(out.len(), 1);
        let InterferencePayload::Point { point, t_a, t_b } = &out[0].payload else {
            panic!("expected a point payload");
        };
        assert!(points_equal(point, &p(1.0, 0.0, 0.0), 1e-9));
        assert!((t_a.unwrap() - 1.0).abs() < 1e-9);
        assert!((t_b.unwrap() - 1.0).abs() < 1e-9);
    }

    #[test]
    fn skew_segments_miss() {
        let mut store = TopologyStore::new();
        let ea = line_edge(&mut store, p(0.0, 0.0, 0.0), p(2.0, 0.0, 0.0));
        let eb = line_edge(&mut store, p(1.0, -1.0, 0.5), p(1.0, 1.0, 0.5));
        let (EdgeCurve::Line(la), EdgeCurve::Line(lb)) = (&ea.curve, &eb.curve) else {
            unreachable!()
        };
        assert!(line_line(la, &ea, lb, &eb, 1e-7, 0, 1).unwrap().is_empty());
    }

    #[test]
    fn collinear_overlap_becomes_common_block_candidate() {
        let mut store = TopologyStore::new();
        let ea = line_edge(&mut store, p(0.0, 0.0, 0.0), p(1.0, 0.0, 0.0));
        let eb = line_edge(&mut store, p(0.5, 0.0, 0.0), p(1.5, 0.0, 0.0));
        let (EdgeCurve::Line(la), EdgeCurve::Line(lb)) = (&ea.curve, &eb.curve) else {
            unreachable!()
        };

        let out = line_line(la, &ea, lb, &eb, 1e-7, 0, 1).unwrap();
        assert_eq!(out.len(), 1);
        let InterferencePayload::EdgeOverlap { range_a, range_b } = &out[0].payload else {
            panic!("expected an overlap payload");
        };
        assert!((range_a.0 - 0.5).abs() < 1e-9 && (range_a.1 - 1.0).abs() < 1e-9);
        assert!(range_b.0.abs() < 1e-9 && (range_b.1 - 0.5).abs() < 1e-9);
    }

    #[test]
    fn parallel_offset_segments_miss() {
        let mut store = TopologyStore::new();
        let ea = line_edge(&mut store, p(0.0, 0.0, 0.0), p(1.0, 0.0, 0.0));
        let eb = line_edge(&mut store, p(0.0, 0.5, 0.0), p(1.0, 0.5, 0.0));
        let (EdgeCurve::Line(la), EdgeCurve::Line(lb)) = (&ea.curve, &eb.curve) else {
            unreachable!()
        };
        assert!(line_line(la, &ea, lb, &eb, 1e-7, 0, 1).unwrap().is_empty());
    }

    #[test]
    fn line_touches_circle_at_tangent_point() {
        use crate::geometry::curve::Circle;
        let mut store = TopologyStore::new();
        // Unit circle in the XY plane; tangent line y = 1.
        let ea = line_edge(&mut store, p(-2.0, 1.0, 0.0), p(2.0, 1.0, 0.0));
        let circle = Circle::new(
            Point3::origin(),
            1.0,
            Vector3::new(0.0, 0.0, 1.0),
            Vector3::new(1.0, 0.0, 0.0),
        )
        .unwrap();
        let s = store.add_vertex(VertexData::new(p(1.0, 0.0, 0.0)));
        let eb = EdgeData::new(
            s,
            s,
            EdgeCurve::Circle(circle),
            0.0,
            std::f64::consts::TAU,
        );

        let out = sampled(&ea, &eb, 1e-6, 0, 1).unwrap();
        assert_eq!(out.len(), 1, "expected one tangency result");
        match &out[0].payload {
            InterferencePayload::Point { point, .. } => {
                assert!(points_equal(point, &p(0.0, 1.0, 0.0), 1e-4));
            }
            InterferencePayload::EdgeOverlap { .. } => {
                // A flat tangency can legitimately collapse to a short
                // overlap at loose tolerance; both are acceptable here.
            }
            other => panic!("unexpected payload {other:?}"),
        }
    }
}
