//! In/Out/On classification of split elements against an operand.
//!
//! The On state comes straight from the recorded coincident-surface
//! interferences, never from re-solving; everything else is decided by
//! ray casting with crossing parity, retrying through a short list of
//! probe directions when a cast hits a degenerate configuration.

use crate::ds::{InterferencePayload, IntersectionStore, ShapeIndex};
use crate::error::Result;
use crate::intersect::{point_on_face, IntersectContext};
use crate::math::intersect_3d::{line_plane_intersect, LinePlaneRelation};
use crate::math::polygon_3d::{point_in_polygon_3d, point_segment_distance};
use crate::math::{Point3, Vector3};
use crate::split::FaceFragment;
use crate::topology::{FaceSurface, TopologyStore};

/// Where a split element sits relative to an operand.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FragmentState {
    /// Strictly inside the operand.
    In,
    /// Strictly outside the operand.
    Out,
    /// On the operand boundary, outward normals aligned.
    OnSame,
    /// On the operand boundary, outward normals opposed.
    OnOpposite,
}

/// Classification outcome; `ambiguous` marks the conservative boundary
/// fallback after every probe direction degenerated.
#[derive(Debug, Clone, Copy)]
pub struct Classification {
    pub state: FragmentState,
    pub ambiguous: bool,
}

/// Probe directions tried in order; the first three match the axes, the
/// rest break axis-aligned degeneracies.
const DIRECTIONS: [[f64; 3]; 5] = [
    [1.0, 0.0, 0.0],
    [0.0, 1.0, 0.0],
    [0.0, 0.0, 1.0],
    [0.577_350_3, 0.577_350_3, 0.577_350_3],
    [0.267_261_2, 0.534_522_5, 0.801_783_7],
];

/// Classifies a face fragment against one operand.
///
/// # Errors
///
/// Returns an error if topology cannot be read.
pub fn classify_fragment(
    store: &TopologyStore,
    ds: &IntersectionStore,
    ctx: &IntersectContext,
    fragment: &FaceFragment,
    other_operand: usize,
) -> Result<Classification> {
    let tol = ctx.tolerance.max(ctx.fuzzy);

    // Boundary state from the DS records first.
    if let Some(state) = on_state_from_records(store, ds, fragment, other_operand, tol)? {
        return Ok(Classification {
            state,
            ambiguous: false,
        });
    }

    for dir in DIRECTIONS {
        let direction = Vector3::new(dir[0], dir[1], dir[2]);
        match ray_cast(store, ds, other_operand, &fragment.probe, &direction, tol)? {
            RayOutcome::Crossings(count) => {
                let state = if count % 2 == 1 {
                    FragmentState::In
                } else {
                    FragmentState::Out
                };
                return Ok(Classification {
                    state,
                    ambiguous: false,
                });
            }
            RayOutcome::OnBoundary(face) => {
                let state = boundary_orientation(store, ds, fragment, face)?;
                return Ok(Classification {
                    state,
                    ambiguous: false,
                });
            }
            RayOutcome::Degenerate => {}
        }
    }

    // Every direction degenerated: fall back to the boundary state.
    Ok(Classification {
        state: FragmentState::OnSame,
        ambiguous: true,
    })
}

/// Checks the coincident-surface records for an On state.
fn on_state_from_records(
    store: &TopologyStore,
    ds: &IntersectionStore,
    fragment: &FaceFragment,
    other_operand: usize,
    tol: f64,
) -> Result<Option<FragmentState>> {
    for interference in ds.interferences() {
        if !matches!(interference.payload, InterferencePayload::CoincidentSurface) {
            continue;
        }
        let other_face = if interference.a == fragment.source_face {
            interference.b
        } else if interference.b == fragment.source_face {
            interference.a
        } else {
            continue;
        };
        if ds.entry(other_face).operand != Some(other_operand) {
            continue;
        }
        if !point_on_face(store, ds, other_face, &fragment.probe, tol)? {
            continue;
        }
        return Ok(Some(boundary_orientation(store, ds, fragment, other_face)?));
    }
    Ok(None)
}

/// OnSame/OnOpposite by comparing effective outward normals at the probe.
fn boundary_orientation(
    store: &TopologyStore,
    ds: &IntersectionStore,
    fragment: &FaceFragment,
    other_face: ShapeIndex,
) -> Result<FragmentState> {
    let own = effective_normal(&fragment.surface, fragment.same_sense, &fragment.probe)?;
    let other_data = store.face(ds.face_id(other_face)?)?;
    let other = effective_normal(&other_data.surface, other_data.same_sense, &fragment.probe)?;

    if own.dot(&other) >= 0.0 {
        Ok(FragmentState::OnSame)
    } else {
        Ok(FragmentState::OnOpposite)
    }
}

/// Outward normal of a face surface at (the projection of) a point.
pub(crate) fn effective_normal(
    surface: &FaceSurface,
    same_sense: bool,
    point: &Point3,
) -> Result<Vector3> {
    let normal = surface.normal_near(point)?;
    Ok(if same_sense { normal } else { -normal })
}

enum RayOutcome {
    Crossings(u32),
    OnBoundary(ShapeIndex),
    Degenerate,
}

/// Casts one ray against every boundary face of an operand.
fn ray_cast(
    store: &TopologyStore,
    ds: &IntersectionStore,
    operand: usize,
    origin: &Point3,
    direction: &Vector3,
    tol: f64,
) -> Result<RayOutcome> {
    let boundary_tol = tol * 10.0;
    let mut crossings = 0u32;

    for &face_index in &ds.operand(operand).faces {
        let face = store.face(ds.face_id(face_index)?)?;
        let hits = match &face.surface {
            FaceSurface::Plane(plane) => {
                match line_plane_intersect(origin, direction, plane, tol) {
                    LinePlaneRelation::Point { point, t } => vec![(t, point)],
                    LinePlaneRelation::OnPlane => return Ok(RayOutcome::Degenerate),
                    LinePlaneRelation::Parallel => vec![],
                }
            }
            FaceSurface::Sphere(sphere) => {
                // |origin + t*d - center|^2 = r^2.
                let oc = origin - sphere.center();
                let b = 2.0 * oc.dot(direction);
                let c = oc.norm_squared() - sphere.radius() * sphere.radius();
                let disc = b * b - 4.0 * c;
                if disc.abs() <= boundary_tol * boundary_tol {
                    return Ok(RayOutcome::Degenerate);
                }
                if disc < 0.0 {
                    vec![]
                } else {
                    let sq = disc.sqrt();
                    [(-b - sq) / 2.0, (-b + sq) / 2.0]
                        .into_iter()
                        .map(|t| (t, origin + direction * t))
                        .collect()
                }
            }
            FaceSurface::Cylinder(cylinder) => {
                let axis = cylinder.axis();
                let d_perp = direction - axis * direction.dot(axis);
                let oc = origin - cylinder.center();
                let oc_perp = oc - axis * oc.dot(axis);
                let a2 = d_perp.norm_squared();
                if a2 <= tol * tol {
                    return Ok(RayOutcome::Degenerate);
                }
                let b = 2.0 * oc_perp.dot(&d_perp);
                let c = oc_perp.norm_squared() - cylinder.radius() * cylinder.radius();
                let disc = b * b - 4.0 * a2 * c;
                if disc.abs() <= boundary_tol * boundary_tol {
                    return Ok(RayOutcome::Degenerate);
                }
                if disc < 0.0 {
                    vec![]
                } else {
                    let sq = disc.sqrt();
                    [(-b - sq) / (2.0 * a2), (-b + sq) / (2.0 * a2)]
                        .into_iter()
                        .map(|t| (t, origin + direction * t))
                        .collect()
                }
            }
        };

        for (t, point) in hits {
            if t < boundary_tol {
                if t > -boundary_tol && point_on_face(store, ds, face_index, &point, tol)? {
                    // The probe itself sits on this boundary face.
                    return Ok(RayOutcome::OnBoundary(face_index));
                }
                continue;
            }
            if !hit_counts(store, ds, face_index, &face.surface, &point, tol)? {
                continue;
            }
            if near_face_boundary(store, ds, face_index, &point, tol)? {
                return Ok(RayOutcome::Degenerate);
            }
            crossings += 1;
        }
    }

    Ok(RayOutcome::Crossings(crossings))
}

/// Whether a surface hit lies within the face's boundary.
fn hit_counts(
    store: &TopologyStore,
    ds: &IntersectionStore,
    face_index: ShapeIndex,
    surface: &FaceSurface,
    point: &Point3,
    tol: f64,
) -> Result<bool> {
    match surface {
        FaceSurface::Plane(plane) => {
            let polygon = store.face_outer_polygon(ds.face_id(face_index)?)?;
            if !point_in_polygon_3d(point, &polygon, plane) {
                return Ok(false);
            }
            let face = store.face(ds.face_id(face_index)?)?;
            for &hole in &face.inner_wires {
                let hole_polygon = store.wire_polygon(hole)?;
                if point_in_polygon_3d(point, &hole_polygon, plane) {
                    return Ok(false);
                }
            }
            Ok(true)
        }
        FaceSurface::Sphere(_) | FaceSurface::Cylinder(_) => {
            point_on_face(store, ds, face_index, point, tol)
        }
    }
}

/// Degeneracy guard: a crossing close to the face boundary would make
/// the parity unreliable.
fn near_face_boundary(
    store: &TopologyStore,
    ds: &IntersectionStore,
    face_index: ShapeIndex,
    point: &Point3,
    tol: f64,
) -> Result<bool> {
    let polygon = store.face_outer_polygon(ds.face_id(face_index)?)?;
    let n = polygon.len();
    if n < 2 {
        return Ok(false);
    }
    let edge_tol = tol * 100.0;
    for i in 0..n {
        let d = point_segment_distance(point, &polygon[i], &polygon[(i + 1) % n]);
        if d < edge_tol {
            return Ok(true);
        }
    }
    Ok(false)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::build::{make_box, make_sphere};
    use crate::ds::{Interference, InterferenceKind};
    use crate::geometry::surface::Plane;

    fn ctx() -> IntersectContext {
        IntersectContext {
            tolerance: 1e-7,
            fuzzy: 0.0,
        }
    }

    fn p(x: f64, y: f64, z: f64) -> Point3 {
        Point3::new(x, y, z)
    }

    fn probe_fragment(probe: Point3, normal: Vector3, source_face: ShapeIndex) -> FaceFragment {
        FaceFragment {
            boundary: vec![],
            holes: vec![],
            surface: FaceSurface::Plane(Plane::from_normal(probe, normal).unwrap()),
            same_sense: true,
            source_face,
            operand: 0,
            probe,
            was_split: false,
        }
    }

    #[test]
    fn probe_inside_box_is_in() {
        let mut store = TopologyStore::new();
        let a = make_box(&mut store, p(0.0, 0.0, 0.0), p(1.0, 1.0, 1.0)).unwrap();
        let b = make_box(&mut store, p(2.0, 0.0, 0.0), p(3.0, 1.0, 1.0)).unwrap();
        let ds = IntersectionStore::build(&store, &[a, b]).unwrap();

        let fragment = probe_fragment(p(2.5, 0.33, 0.47), Vector3::new(0.0, 0.0, 1.0), 0);
        let c = classify_fragment(&store, &ds, &ctx(), &fragment, 1).unwrap();
        assert_eq!(c.state, FragmentState::In);
        assert!(!c.ambiguous);
    }

    #[test]
    fn probe_outside_box_is_out() {
        let mut store = TopologyStore::new();
        let a = make_box(&mut store, p(0.0, 0.0, 0.0), p(1.0, 1.0, 1.0)).unwrap();
        let b = make_box(&mut store, p(2.0, 0.0, 0.0), p(3.0, 1.0, 1.0)).unwrap();
        let ds = IntersectionStore::build(&store, &[a, b]).unwrap();

        let fragment = probe_fragment(p(5.0, 5.0, 5.0), Vector3::new(0.0, 0.0, 1.0), 0);
        let c = classify_fragment(&store, &ds, &ctx(), &fragment, 1).unwrap();
        assert_eq!(c.state, FragmentState::Out);
    }

    #[test]
    fn probe_inside_sphere_is_in() {
        let mut store = TopologyStore::new();
        let a = make_box(&mut store, p(-3.0, -3.0, -3.0), p(-2.0, -2.0, -2.0)).unwrap();
        let ball = make_sphere(&mut store, p(0.0, 0.0, 0.0), 1.0).unwrap();
        let ds = IntersectionStore::build(&store, &[a, ball]).unwrap();

        let inside = probe_fragment(p(0.2, 0.1, -0.3), Vector3::new(0.0, 0.0, 1.0), 0);
        assert_eq!(
            classify_fragment(&store, &ds, &ctx(), &inside, 1).unwrap().state,
            FragmentState::In
        );

        let outside = probe_fragment(p(2.0, 0.0, 0.0), Vector3::new(0.0, 0.0, 1.0), 0);
        assert_eq!(
            classify_fragment(&store, &ds, &ctx(), &outside, 1).unwrap().state,
            FragmentState::Out
        );
    }

    #[test]
    fn coincident_record_gives_on_state_without_ray_casting() {
        let mut store = TopologyStore::new();
        // Two boxes sharing the x = 1 plane.
        let a = make_box(&mut store, p(0.0, 0.0, 0.0), p(1.0, 1.0, 1.0)).unwrap();
        let b = make_box(&mut store, p(1.0, 0.0, 0.0), p(2.0, 1.0, 1.0)).unwrap();
        let mut ds = IntersectionStore::build(&store, &[a, b]).unwrap();

        let face_a = *ds
            .operand(0)
            .faces
            .iter()
            .find(|&&f| {
                let poly = store.face_outer_polygon(ds.face_id(f).unwrap()).unwrap();
                poly.iter().all(|q| (q.x - 1.0).abs() < 1e-9)
            })
            .unwrap();
        let face_b = *ds
            .operand(1)
            .faces
            .iter()
            .find(|&&f| {
                let poly = store.face_outer_polygon(ds.face_id(f).unwrap()).unwrap();
                poly.iter().all(|q| (q.x - 1.0).abs() < 1e-9)
            })
            .unwrap();
        ds.add_interference(Interference {
            kind: InterferenceKind::FaceFace,
            a: face_a,
            b: face_b,
            payload: InterferencePayload::CoincidentSurface,
            tolerance: 1e-7,
        });

        let face_a_data = store.face(ds.face_id(face_a).unwrap()).unwrap();
        let fragment = FaceFragment {
            boundary: vec![],
            holes: vec![],
            surface: face_a_data.surface.clone(),
            same_sense: face_a_data.same_sense,
            source_face: face_a,
            operand: 0,
            probe: p(1.0, 0.5, 0.5),
            was_split: false,
        };

        let c = classify_fragment(&store, &ds, &ctx(), &fragment, 1).unwrap();
        // A's x = 1 face points +x, B's x = 1 face points -x.
        assert_eq!(c.state, FragmentState::OnOpposite);
        assert!(!c.ambiguous);
    }
}
