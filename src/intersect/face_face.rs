//! Face/face narrow phase: analytic fast paths for plane and quadric
//! pairs, marching continuation for the rest, same-support detection
//! for the glue path.

use std::f64::consts::TAU;

use tracing::debug;

use crate::ds::{
    Interference, InterferenceKind, InterferencePayload, IntersectionStore, ShapeIndex,
};
use crate::error::{BooleanError, Result};
use crate::geometry::surface::{Plane, Sphere, Surface};
use crate::math::intersect_3d::{plane_plane_intersect, PlanePairRelation};
use crate::math::polygon_3d::clip_segment_to_polygon;
use crate::math::{Point3, Vector3};
use crate::topology::{FaceSurface, TopologyStore};

use super::vertex::point_on_face;
use super::IntersectContext;

/// Sample count for circle discretization and marching seeds.
const CIRCLE_SEGMENTS: usize = 64;
/// Maximum marching steps per seed.
const MAX_MARCH_STEPS: usize = 256;

pub(super) fn face_face(
    store: &TopologyStore,
    ds: &IntersectionStore,
    ctx: &IntersectContext,
    a: ShapeIndex,
    b: ShapeIndex,
) -> Result<Vec<Interference>> {
    let tol = ctx.pair_tolerance(ds, a, b);

    if let Some(coincident) = detect_coincident_faces(store, ds, ctx, a, b)? {
        return Ok(vec![coincident]);
    }

    let fa = store.face(ds.face_id(a)?)?;
    let fb = store.face(ds.face_id(b)?)?;

    match (&fa.surface, &fb.surface) {
        (FaceSurface::Plane(pa), FaceSurface::Plane(pb)) => {
            plane_plane(store, ds, a, b, pa, pb, tol)
        }
        (FaceSurface::Plane(plane), FaceSurface::Sphere(sphere)) => {
            plane_sphere(store, ds, a, b, plane, sphere, false, tol)
        }
        (FaceSurface::Sphere(sphere), FaceSurface::Plane(plane)) => {
            plane_sphere(store, ds, a, b, plane, sphere, true, tol)
        }
        (FaceSurface::Sphere(sa), FaceSurface::Sphere(sb)) => {
            sphere_sphere(store, ds, a, b, sa, sb, tol)
        }
        _ => march(store, ds, a, b, tol),
    }
}

/// Cheap same-support test; this is all the glue path runs.
///
/// # Errors
///
/// Returns an error if face topology cannot be read.
pub fn detect_coincident_faces(
    store: &TopologyStore,
    ds: &IntersectionStore,
    ctx: &IntersectContext,
    a: ShapeIndex,
    b: ShapeIndex,
) -> Result<Option<Interference>> {
    let tol = ctx.pair_tolerance(ds, a, b);
    let fa = store.face(ds.face_id(a)?)?;
    let fb = store.face(ds.face_id(b)?)?;

    let same = match (&fa.surface, &fb.surface) {
        (FaceSurface::Plane(pa), FaceSurface::Plane(pb)) => matches!(
            plane_plane_intersect(pa, pb, tol),
            PlanePairRelation::Coincident
        ),
        (FaceSurface::Sphere(sa), FaceSurface::Sphere(sb)) => {
            (sa.center() - sb.center()).norm() <= tol && (sa.radius() - sb.radius()).abs() <= tol
        }
        (FaceSurface::Cylinder(ca), FaceSurface::Cylinder(cb)) => {
            ca.axis().cross(cb.axis()).norm() <= tol
                && ca.radial_distance(cb.center()) <= tol
                && (ca.radius() - cb.radius()).abs() <= tol
        }
        _ => false,
    };

    if !same {
        return Ok(None);
    }
    Ok(Some(Interference {
        kind: InterferenceKind::FaceFace,
        a,
        b,
        payload: InterferencePayload::CoincidentSurface,
        tolerance: tol,
    }))
}

/// Crossing planes: clip the intersection line to both boundaries and
/// emit the overlapping spans.
fn plane_plane(
    store: &TopologyStore,
    ds: &IntersectionStore,
    a: ShapeIndex,
    b: ShapeIndex,
    pa: &Plane,
    pb: &Plane,
    tol: f64,
) -> Result<Vec<Interference>> {
    let PlanePairRelation::IntersectionLine { origin, direction } =
        plane_plane_intersect(pa, pb, tol)
    else {
        return Ok(Vec::new());
    };

    let poly_a = store.face_outer_polygon(ds.face_id(a)?)?;
    let poly_b = store.face_outer_polygon(ds.face_id(b)?)?;
    if poly_a.len() < 3 || poly_b.len() < 3 {
        return Ok(Vec::new());
    }

    // Cover the extents of both polygons along the line, with margin.
    let mut t_min = f64::INFINITY;
    let mut t_max = f64::NEG_INFINITY;
    for p in poly_a.iter().chain(poly_b.iter()) {
        let t = (p - origin).dot(&direction);
        t_min = t_min.min(t);
        t_max = t_max.max(t);
    }
    let seg_start = origin + direction * (t_min - 1.0);
    let seg_end = origin + direction * (t_max + 1.0);

    let spans_a = clip_segment_to_polygon(&seg_start, &seg_end, &poly_a, pa, tol);
    let spans_b = clip_segment_to_polygon(&seg_start, &seg_end, &poly_b, pb, tol);

    let seg_dir = seg_end - seg_start;
    let mut out = Vec::new();
    for &(a0, a1) in &spans_a {
        for &(b0, b1) in &spans_b {
            let lo = a0.max(b0);
            let hi = a1.min(b1);
            if (hi - lo) * seg_dir.norm() <= tol {
                continue;
            }
            out.push(Interference {
                kind: InterferenceKind::FaceFace,
                a,
                b,
                payload: InterferencePayload::Section {
                    points: vec![seg_start + seg_dir * lo, seg_start + seg_dir * hi],
                },
                tolerance: tol,
            });
        }
    }
    Ok(out)
}

/// Plane/sphere: the section circle, discretized and clipped to the
/// planar boundary. External or internal tangency collapses to nothing
/// (touching is not overlap).
#[allow(clippy::too_many_arguments)]
fn plane_sphere(
    store: &TopologyStore,
    ds: &IntersectionStore,
    a: ShapeIndex,
    b: ShapeIndex,
    plane: &Plane,
    sphere: &Sphere,
    swapped: bool,
    tol: f64,
) -> Result<Vec<Interference>> {
    let d = plane.signed_distance(sphere.center());
    let r = sphere.radius();
    if d.abs() >= r - tol {
        if (d.abs() - r).abs() <= tol {
            debug!(distance = d, radius = r, "tangential plane/sphere pair collapsed");
        }
        return Ok(Vec::new());
    }

    let circle_center = sphere.center() - plane.plane_normal() * d;
    let circle_radius = (r * r - d * d).sqrt();
    let u = plane.u_dir();
    let v = plane.v_dir();

    let plane_face = if swapped { b } else { a };
    let mut points = Vec::with_capacity(CIRCLE_SEGMENTS + 1);
    #[allow(clippy::cast_precision_loss)]
    for i in 0..=CIRCLE_SEGMENTS {
        let angle = TAU * i as f64 / CIRCLE_SEGMENTS as f64;
        points.push(circle_center + u * (circle_radius * angle.cos()) + v * (circle_radius * angle.sin()));
    }

    Ok(polyline_runs_on_face(store, ds, plane_face, &points, tol)?
        .into_iter()
        .map(|run| Interference {
            kind: InterferenceKind::FaceFace,
            a,
            b,
            payload: InterferencePayload::Section { points: run },
            tolerance: tol,
        })
        .collect())
}

/// Sphere/sphere: the radical circle.
fn sphere_sphere(
    _store: &TopologyStore,
    _ds: &IntersectionStore,
    a: ShapeIndex,
    b: ShapeIndex,
    sa: &Sphere,
    sb: &Sphere,
    tol: f64,
) -> Result<Vec<Interference>> {
    let axis = sb.center() - sa.center();
    let dist = axis.norm();
    if dist <= tol {
        // Concentric, different radii (same-support was handled earlier).
        return Ok(Vec::new());
    }
    let (ra, rb) = (sa.radius(), sb.radius());
    if dist >= ra + rb - tol || dist <= (ra - rb).abs() + tol {
        return Ok(Vec::new());
    }

    let dir = axis / dist;
    let d = (dist * dist + ra * ra - rb * rb) / (2.0 * dist);
    let rc_sq = ra * ra - d * d;
    if rc_sq <= tol * tol {
        return Ok(Vec::new());
    }
    let rc = rc_sq.sqrt();
    let center = sa.center() + dir * d;

    let reference = if dir.x.abs() < 0.9 {
        Vector3::new(1.0, 0.0, 0.0)
    } else {
        Vector3::new(0.0, 1.0, 0.0)
    };
    let u = dir.cross(&reference).normalize();
    let v = dir.cross(&u);

    let mut points = Vec::with_capacity(CIRCLE_SEGMENTS + 1);
    #[allow(clippy::cast_precision_loss)]
    for i in 0..=CIRCLE_SEGMENTS {
        let angle = TAU * i as f64 / CIRCLE_SEGMENTS as f64;
        points.push(center + u * (rc * angle.cos()) + v * (rc * angle.sin()));
    }

    Ok(vec![Interference {
        kind: InterferenceKind::FaceFace,
        a,
        b,
        payload: InterferencePayload::Section { points },
        tolerance: tol,
    }])
}

/// Splits a closed discretized curve into the runs lying on a face.
fn polyline_runs_on_face(
    store: &TopologyStore,
    ds: &IntersectionStore,
    face: ShapeIndex,
    points: &[Point3],
    tol: f64,
) -> Result<Vec<Vec<Point3>>> {
    let mut runs: Vec<Vec<Point3>> = Vec::new();
    let mut current: Vec<Point3> = Vec::new();
    for p in points {
        if point_on_face(store, ds, face, p, tol)? {
            current.push(*p);
        } else if current.len() >= 2 {
            runs.push(std::mem::take(&mut current));
        } else {
            current.clear();
        }
    }
    if current.len() >= 2 {
        runs.push(current);
    }
    Ok(runs)
}

/// Marching continuation for the remaining quadric pairs, seeded from
/// boundary samples of both faces.
fn march(
    store: &TopologyStore,
    ds: &IntersectionStore,
    a: ShapeIndex,
    b: ShapeIndex,
    tol: f64,
) -> Result<Vec<Interference>> {
    let fa = store.face(ds.face_id(a)?)?;
    let fb = store.face(ds.face_id(b)?)?;

    let seed = find_seed(store, ds, a, b, tol)?;
    let Some(seed) = seed else {
        return Ok(Vec::new());
    };

    let step = {
        let bounds = ds.entry(a).bounds.merged(&ds.entry(b).bounds);
        let diagonal = (bounds.max - bounds.min).norm();
        #[allow(clippy::cast_precision_loss)]
        let s = diagonal / MAX_MARCH_STEPS as f64;
        s.max(tol * 100.0)
    };

    let correct = |mut p: Point3| -> Option<Point3> {
        for _ in 0..16 {
            let ga = fa.surface.signed_distance(&p);
            let gb = fb.surface.signed_distance(&p);
            if ga.abs() <= tol && gb.abs() <= tol {
                return Some(p);
            }
            let na = fa.surface.normal_near(&p).ok()?;
            let nb = fb.surface.normal_near(&p).ok()?;
            p -= na * ga;
            p -= nb * gb;
        }
        None
    };

    let Some(start) = correct(seed) else {
        return Err(BooleanError::Intersection { a, b }.into());
    };

    // March both directions from the seed and splice the halves.
    let mut halves: [Vec<Point3>; 2] = [vec![start], vec![]];
    for (half, sign) in halves.iter_mut().zip([1.0_f64, -1.0]) {
        let mut p = start;
        for _ in 0..MAX_MARCH_STEPS {
            let Ok(na) = fa.surface.normal_near(&p) else {
                break;
            };
            let Ok(nb) = fb.surface.normal_near(&p) else {
                break;
            };
            let dir = na.cross(&nb);
            if dir.norm() <= tol {
                break;
            }
            let Some(next) = correct(p + dir.normalize() * (step * sign)) else {
                break;
            };
            if !point_on_face(store, ds, a, &next, tol)?
                || !point_on_face(store, ds, b, &next, tol)?
            {
                break;
            }
            // Closed loop: back near the start after some progress.
            if half.len() > 2 && (next - start).norm() < step * 0.5 {
                break;
            }
            half.push(next);
            p = next;
        }
    }

    let mut points = halves[1].clone();
    points.reverse();
    points.extend(halves[0].iter().copied());

    if points.len() < 2 {
        return Ok(Vec::new());
    }

    debug!(
        points = points.len(),
        "marched a general face/face section curve"
    );
    Ok(vec![Interference {
        kind: InterferenceKind::FaceFace,
        a,
        b,
        payload: InterferencePayload::Section { points },
        tolerance: tol,
    }])
}

/// A seed for the marching path: a boundary sample of one face that
/// brackets a sign change of the other face's distance field.
fn find_seed(
    store: &TopologyStore,
    ds: &IntersectionStore,
    a: ShapeIndex,
    b: ShapeIndex,
    tol: f64,
) -> Result<Option<Point3>> {
    for (own, other) in [(a, b), (b, a)] {
        let other_face = store.face(ds.face_id(other)?)?;
        let polygon = store.face_outer_polygon(ds.face_id(own)?)?;

        let n = polygon.len();
        for i in 0..n {
            let p0 = polygon[i];
            let p1 = polygon[(i + 1) % n];
            let mut prev = p0;
            let mut prev_d = other_face.surface.signed_distance(&prev);
            for k in 1..=CIRCLE_SEGMENTS {
                #[allow(clippy::cast_precision_loss)]
                let t = k as f64 / CIRCLE_SEGMENTS as f64;
                let q = p0 + (p1 - p0) * t;
                let d = other_face.surface.signed_distance(&q);
                if prev_d * d <= 0.0 && (prev_d.abs() > tol || d.abs() > tol) {
                    return Ok(Some(nalgebra::center(&prev, &q)));
                }
                prev = q;
                prev_d = d;
            }
        }
    }
    Ok(None)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::build::{make_box, make_sphere};

    fn ctx() -> IntersectContext {
        IntersectContext {
            tolerance: 1e-9,
            fuzzy: 0.0,
        }
    }

    fn overlapping_boxes() -> (TopologyStore, IntersectionStore) {
        let mut store = TopologyStore::new();
        let a = make_box(
            &mut store,
            Point3::new(0.0, 0.0, 0.0),
            Point3::new(1.0, 1.0, 1.0),
        )
        .unwrap();
        let b = make_box(
            &mut store,
            Point3::new(0.5, 0.0, 0.0),
            Point3::new(1.5, 1.0, 1.0),
        )
        .unwrap();
        let ds = IntersectionStore::build(&store, &[a, b]).unwrap();
        (store, ds)
    }

    fn face_where(
        store: &TopologyStore,
        ds: &IntersectionStore,
        operand: usize,
        pred: impl Fn(&Point3) -> bool,
    ) -> ShapeIndex {
        *ds.operand(operand)
            .faces
            .iter()
            .find(|&&f| {
                let poly = store.face_outer_polygon(ds.face_id(f).unwrap()).unwrap();
                poly.iter().all(&pred)
            })
            .unwrap()
    }

    #[test]
    fn crossing_box_faces_produce_a_section_segment() {
        let (store, ds) = overlapping_boxes();
        // Operand 0's y = 0 face crosses operand 1's x = 0.5 face.
        let fa = face_where(&store, &ds, 0, |p| p.y.abs() < 1e-9);
        let fb = face_where(&store, &ds, 1, |p| (p.x - 0.5).abs() < 1e-9);

        let out = face_face(&store, &ds, &ctx(), fa, fb).unwrap();
        assert_eq!(out.len(), 1);
        let InterferencePayload::Section { points } = &out[0].payload else {
            panic!("expected a section payload");
        };
        assert_eq!(points.len(), 2);
        // The section runs along x = 0.5, y = 0, z in [0, 1].
        for p in points {
            assert!((p.x - 0.5).abs() < 1e-9 && p.y.abs() < 1e-9);
        }
        let len = (points[1] - points[0]).norm();
        assert!((len - 1.0).abs() < 1e-6);
    }

    #[test]
    fn coplanar_box_faces_are_coincident() {
        let (store, ds) = overlapping_boxes();
        let fa = face_where(&store, &ds, 0, |p| p.y.abs() < 1e-9);
        let fb = face_where(&store, &ds, 1, |p| p.y.abs() < 1e-9);

        let out = face_face(&store, &ds, &ctx(), fa, fb).unwrap();
        assert_eq!(out.len(), 1);
        assert!(matches!(
            out[0].payload,
            InterferencePayload::CoincidentSurface
        ));
    }

    #[test]
    fn parallel_distinct_faces_do_not_interfere() {
        let (store, ds) = overlapping_boxes();
        let fa = face_where(&store, &ds, 0, |p| p.y.abs() < 1e-9);
        let fb = face_where(&store, &ds, 1, |p| (p.y - 1.0).abs() < 1e-9);
        assert!(face_face(&store, &ds, &ctx(), fa, fb).unwrap().is_empty());
    }

    #[test]
    fn plane_through_sphere_yields_a_circle() {
        let mut store = TopologyStore::new();
        let slab = make_box(
            &mut store,
            Point3::new(-2.0, -2.0, -1.0),
            Point3::new(2.0, 2.0, 0.0),
        )
        .unwrap();
        let ball = make_sphere(&mut store, Point3::origin(), 1.0).unwrap();
        let ds = IntersectionStore::build(&store, &[slab, ball]).unwrap();

        // The slab's z = 0 face cuts the unit sphere in its equator.
        let fa = face_where(&store, &ds, 0, |p| p.z.abs() < 1e-9);
        let fb = ds.operand(1).faces[0];

        let out = face_face(&store, &ds, &ctx(), fa, fb).unwrap();
        assert_eq!(out.len(), 1);
        let InterferencePayload::Section { points } = &out[0].payload else {
            panic!("expected a section payload");
        };
        assert!(points.len() > CIRCLE_SEGMENTS / 2);
        for p in points {
            assert!(p.z.abs() < 1e-9);
            assert!(((p - Point3::origin()).norm() - 1.0).abs() < 1e-9);
        }
    }

    #[test]
    fn tangent_plane_sphere_collapses_to_nothing() {
        let mut store = TopologyStore::new();
        let cube = make_box(
            &mut store,
            Point3::new(0.0, 0.0, 0.0),
            Point3::new(1.0, 1.0, 1.0),
        )
        .unwrap();
        // Touching the x = 1 face at (1, 0.5, 0.5).
        let ball = make_sphere(&mut store, Point3::new(1.5, 0.5, 0.5), 0.5).unwrap();
        let ds = IntersectionStore::build(&store, &[cube, ball]).unwrap();

        let fb = ds.operand(1).faces[0];
        for &fa in &ds.operand(0).faces {
            assert!(
                face_face(&store, &ds, &ctx(), fa, fb).unwrap().is_empty(),
                "tangency must not produce a section"
            );
        }
    }

    #[test]
    fn two_spheres_share_a_radical_circle() {
        let mut store = TopologyStore::new();
        let sa = make_sphere(&mut store, Point3::origin(), 1.0).unwrap();
        let sb = make_sphere(&mut store, Point3::new(1.0, 0.0, 0.0), 1.0).unwrap();
        let ds = IntersectionStore::build(&store, &[sa, sb]).unwrap();

        let out = face_face(
            &store,
            &ds,
            &ctx(),
            ds.operand(0).faces[0],
            ds.operand(1).faces[0],
        )
        .unwrap();
        assert_eq!(out.len(), 1);
        let InterferencePayload::Section { points } = &out[0].payload else {
            panic!("expected a section payload");
        };
        // Radical plane at x = 0.5, circle radius sqrt(3)/2.
        let expected_r = (3.0_f64).sqrt() / 2.0;
        for p in points {
            assert!((p.x - 0.5).abs() < 1e-9);
            let r = (p.y * p.y + p.z * p.z).sqrt();
            assert!((r - expected_r).abs() < 1e-9);
        }
    }

    #[test]
    fn identical_spheres_are_coincident() {
        let mut store = TopologyStore::new();
        let sa = make_sphere(&mut store, Point3::origin(), 1.0).unwrap();
        let sb = make_sphere(&mut store, Point3::origin(), 1.0).unwrap();
        let ds = IntersectionStore::build(&store, &[sa, sb]).unwrap();

        let out = face_face(
            &store,
            &ds,
            &ctx(),
            ds.operand(0).faces[0],
            ds.operand(1).faces[0],
        )
        .unwrap();
        assert_eq!(out.len(), 1);
        assert!(matches!(
            out[0].payload,
            InterferencePayload::CoincidentSurface
        ));
    }
}
