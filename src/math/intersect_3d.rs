use crate::geometry::surface::Plane;

use super::{Point3, Vector3};

/// Relationship between two planes.
#[derive(Debug)]
pub enum PlanePairRelation {
    /// Planes cross along a line.
    IntersectionLine { origin: Point3, direction: Vector3 },
    /// Planes are parallel but not coincident.
    Parallel { distance: f64 },
    /// Planes share the same support within tolerance.
    Coincident,
}

/// Computes the intersection of two planes at tolerance `tol`.
///
/// The returned `direction` is unit-length and `origin` lies on both
/// planes. Near-parallel normals collapse to `Parallel`/`Coincident`
/// based on the inter-plane distance.
#[must_use]
pub fn plane_plane_intersect(a: &Plane, b: &Plane, tol: f64) -> PlanePairRelation {
    let na = a.plane_normal();
    let nb = b.plane_normal();

    let dir = na.cross(nb);
    let dir_len = dir.norm();

    if dir_len < tol {
        let dist = (b.origin() - a.origin()).dot(na).abs();
        if dist < tol {
            return PlanePairRelation::Coincident;
        }
        return PlanePairRelation::Parallel { distance: dist };
    }

    let direction = dir / dir_len;

    // Point on both planes: p = oa + s*na + t*nb, solving the two
    // plane equations for (s, t).
    let d2 = nb.dot(&(b.origin() - a.origin()));
    let dot_nn = na.dot(nb);
    let denom = 1.0 - dot_nn * dot_nn;

    let origin = if denom.abs() < tol * tol {
        *a.origin()
    } else {
        let s = (-dot_nn * d2) / denom;
        let t = d2 / denom;
        a.origin() + na * s + nb * t
    };

    PlanePairRelation::IntersectionLine { origin, direction }
}

/// Relationship of a line with a plane.
#[derive(Debug)]
pub enum LinePlaneRelation {
    /// Line pierces the plane at a single parameter.
    Point { point: Point3, t: f64 },
    /// Line is parallel to the plane at a nonzero distance.
    Parallel,
    /// Line lies in the plane.
    OnPlane,
}

/// Intersects the line `origin + t * dir` with a plane at tolerance `tol`.
#[must_use]
pub fn line_plane_intersect(
    origin: &Point3,
    dir: &Vector3,
    plane: &Plane,
    tol: f64,
) -> LinePlaneRelation {
    let normal = plane.plane_normal();
    let denom = normal.dot(dir);
    let numer = normal.dot(&(plane.origin() - origin));

    if denom.abs() < tol {
        if numer.abs() < tol {
            LinePlaneRelation::OnPlane
        } else {
            LinePlaneRelation::Parallel
        }
    } else {
        let t = numer / denom;
        LinePlaneRelation::Point {
            point: origin + dir * t,
            t,
        }
    }
}

/// Signed distance from a point to a plane, positive on the normal side.
#[must_use]
pub fn signed_distance_to_plane(point: &Point3, plane: &Plane) -> f64 {
    plane.plane_normal().dot(&(point - plane.origin()))
}

/// Closest-approach parameters of two lines `a0 + s*da`, `b0 + t*db`.
///
/// Returns `None` when the lines are parallel within `tol` (no unique
/// closest pair). The directions need not be normalized.
#[must_use]
pub fn line_line_closest(
    a0: &Point3,
    da: &Vector3,
    b0: &Point3,
    db: &Vector3,
    tol: f64,
) -> Option<(f64, f64)> {
    let r = a0 - b0;
    let aa = da.dot(da);
    let bb = db.dot(db);
    let ab = da.dot(db);
    let denom = aa * bb - ab * ab;

    if denom.abs() < tol * tol {
        return None;
    }

    let ar = da.dot(&r);
    let br = db.dot(&r);
    let s = (ab * br - bb * ar) / denom;
    let t = (aa * br - ab * ar) / denom;
    Some((s, t))
}

/// Parameter of the closest point on the line `origin + t * dir` to `point`.
///
/// `dir` need not be normalized; the parameter is in units of `dir`.
#[must_use]
pub fn project_point_on_line(point: &Point3, origin: &Point3, dir: &Vector3) -> f64 {
    let len_sq = dir.norm_squared();
    if len_sq == 0.0 {
        return 0.0;
    }
    (point - origin).dot(dir) / len_sq
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::math::TOLERANCE;

    fn p(x: f64, y: f64, z: f64) -> Point3 {
        Point3::new(x, y, z)
    }

    fn v(x: f64, y: f64, z: f64) -> Vector3 {
        Vector3::new(x, y, z)
    }

    #[test]
    fn perpendicular_planes_cross_on_axis() {
        let xy = Plane::from_normal(p(0.0, 0.0, 0.0), v(0.0, 0.0, 1.0)).unwrap();
        let xz = Plane::from_normal(p(0.0, 0.0, 0.0), v(0.0, 1.0, 0.0)).unwrap();

        match plane_plane_intersect(&xy, &xz, TOLERANCE) {
            PlanePairRelation::IntersectionLine { origin, direction } => {
                assert!(direction.x.abs() > 0.99);
                assert!(origin.y.abs() < TOLERANCE && origin.z.abs() < TOLERANCE);
            }
            other => panic!("expected IntersectionLine, got {other:?}"),
        }
    }

    #[test]
    fn offset_parallel_planes() {
        let a = Plane::from_normal(p(0.0, 0.0, 0.0), v(0.0, 0.0, 1.0)).unwrap();
        let b = Plane::from_normal(p(3.0, -1.0, 4.0), v(0.0, 0.0, -1.0)).unwrap();

        match plane_plane_intersect(&a, &b, TOLERANCE) {
            PlanePairRelation::Parallel { distance } => {
                assert!((distance - 4.0).abs() < TOLERANCE);
            }
            other => panic!("expected Parallel, got {other:?}"),
        }
    }

    #[test]
    fn coincident_planes_detected() {
        let a = Plane::from_normal(p(0.0, 0.0, 2.0), v(0.0, 0.0, 1.0)).unwrap();
        let b = Plane::from_normal(p(5.0, 5.0, 2.0), v(0.0, 0.0, 1.0)).unwrap();
        assert!(matches!(
            plane_plane_intersect(&a, &b, TOLERANCE),
            PlanePairRelation::Coincident
        ));
    }

    #[test]
    fn line_pierces_plane() {
        let plane = Plane::from_normal(p(0.0, 0.0, 5.0), v(0.0, 0.0, 1.0)).unwrap();
        match line_plane_intersect(&p(1.0, 2.0, 0.0), &v(0.0, 0.0, 1.0), &plane, TOLERANCE) {
            LinePlaneRelation::Point { point, t } => {
                assert!((t - 5.0).abs() < TOLERANCE);
                assert!((point.z - 5.0).abs() < TOLERANCE);
            }
            other => panic!("expected Point, got {other:?}"),
        }
    }

    #[test]
    fn line_in_plane() {
        let plane = Plane::from_normal(p(0.0, 0.0, 0.0), v(0.0, 0.0, 1.0)).unwrap();
        assert!(matches!(
            line_plane_intersect(&p(1.0, 2.0, 0.0), &v(1.0, 1.0, 0.0), &plane, TOLERANCE),
            LinePlaneRelation::OnPlane
        ));
    }

    #[test]
    fn skew_lines_closest_parameters() {
        // X axis and a line along Y at z=1: closest at s=0, t=0.
        let (s, t) = line_line_closest(
            &p(0.0, 0.0, 0.0),
            &v(1.0, 0.0, 0.0),
            &p(0.0, 0.0, 1.0),
            &v(0.0, 1.0, 0.0),
            TOLERANCE,
        )
        .unwrap();
        assert!(s.abs() < TOLERANCE);
        assert!(t.abs() < TOLERANCE);
    }

    #[test]
    fn parallel_lines_have_no_unique_closest() {
        assert!(line_line_closest(
            &p(0.0, 0.0, 0.0),
            &v(1.0, 0.0, 0.0),
            &p(0.0, 1.0, 0.0),
            &v(2.0, 0.0, 0.0),
            TOLERANCE,
        )
        .is_none());
    }

    #[test]
    fn crossing_lines_meet() {
        let (s, t) = line_line_closest(
            &p(0.0, 0.0, 0.0),
            &v(1.0, 0.0, 0.0),
            &p(2.0, -1.0, 0.0),
            &v(0.0, 1.0, 0.0),
            TOLERANCE,
        )
        .unwrap();
        assert!((s - 2.0).abs() < TOLERANCE);
        assert!((t - 1.0).abs() < TOLERANCE);
    }

    #[test]
    fn point_projects_onto_line() {
        let t = project_point_on_line(&p(3.0, 4.0, 0.0), &p(0.0, 0.0, 0.0), &v(1.0, 0.0, 0.0));
        assert!((t - 3.0).abs() < TOLERANCE);
    }
}
