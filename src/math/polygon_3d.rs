use crate::geometry::surface::Plane;

use super::{Point3, Vector3};

/// Projects a 3D point onto the UV coordinate system of a plane.
#[must_use]
pub fn project_to_uv(point: &Point3, plane: &Plane) -> (f64, f64) {
    let diff = point - plane.origin();
    (diff.dot(plane.u_dir()), diff.dot(plane.v_dir()))
}

/// Point-in-polygon test for a 3D point coplanar with the polygon.
///
/// Projects into the plane's UV space and evaluates the winding number.
/// Returns `true` for interior and boundary points.
#[must_use]
pub fn point_in_polygon_3d(point: &Point3, polygon: &[Point3], plane: &Plane) -> bool {
    if polygon.len() < 3 {
        return false;
    }

    let (px, py) = project_to_uv(point, plane);
    let uvs: Vec<(f64, f64)> = polygon.iter().map(|p| project_to_uv(p, plane)).collect();

    winding_number_2d(px, py, &uvs) != 0
}

/// Winding number of `(px, py)` with respect to `verts`. Non-zero means
/// inside.
fn winding_number_2d(px: f64, py: f64, verts: &[(f64, f64)]) -> i32 {
    let n = verts.len();
    let mut winding = 0i32;
    for i in 0..n {
        let (x0, y0) = verts[i];
        let (x1, y1) = verts[(i + 1) % n];

        let cross = (x1 - x0) * (py - y0) - (y1 - y0) * (px - x0);
        if y0 <= py {
            if y1 > py && cross > 0.0 {
                winding += 1;
            }
        } else if y1 <= py && cross < 0.0 {
            winding -= 1;
        }
    }
    winding
}

/// Clips the segment `(seg_start, seg_end)` against a polygon boundary,
/// all coplanar with `plane`.
///
/// Returns the sub-intervals of the segment lying inside the polygon as
/// `(t0, t1)` pairs in `[0, 1]`. Non-convex polygons may yield several
/// intervals.
#[must_use]
pub fn clip_segment_to_polygon(
    seg_start: &Point3,
    seg_end: &Point3,
    polygon: &[Point3],
    plane: &Plane,
    tol: f64,
) -> Vec<(f64, f64)> {
    if polygon.len() < 3 {
        return Vec::new();
    }

    let (su, sv) = project_to_uv(seg_start, plane);
    let (eu, ev) = project_to_uv(seg_end, plane);
    let du = eu - su;
    let dv = ev - sv;

    let uvs: Vec<(f64, f64)> = polygon.iter().map(|p| project_to_uv(p, plane)).collect();

    // All parameters where the segment crosses a polygon edge.
    let n = uvs.len();
    let mut cuts: Vec<f64> = Vec::new();
    for i in 0..n {
        let (ex0, ey0) = uvs[i];
        let (ex1, ey1) = uvs[(i + 1) % n];
        let edx = ex1 - ex0;
        let edy = ey1 - ey0;

        let cross = du * edy - dv * edx;
        if cross.abs() < tol {
            continue;
        }

        let dx = ex0 - su;
        let dy = ey0 - sv;
        let t = (dx * edy - dy * edx) / cross;
        let u_edge = (dx * dv - dy * du) / cross;

        if t >= -tol && t <= 1.0 + tol && u_edge >= -tol && u_edge <= 1.0 + tol {
            cuts.push(t.clamp(0.0, 1.0));
        }
    }

    let mut samples = vec![0.0];
    samples.append(&mut cuts);
    samples.push(1.0);
    samples.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
    samples.dedup_by(|a, b| (*a - *b).abs() < tol);

    // Keep intervals whose midpoint is interior (a midpoint sitting on
    // the boundary itself counts: a section running along a boundary
    // edge is still a section), fusing contiguous runs.
    let mut result: Vec<(f64, f64)> = Vec::new();
    for win in samples.windows(2) {
        let (t0, t1) = (win[0], win[1]);
        if t1 - t0 < tol {
            continue;
        }
        let mid = (t0 + t1) * 0.5;
        let (mu, mv) = (su + du * mid, sv + dv * mid);
        if winding_number_2d(mu, mv, &uvs) != 0 || boundary_distance_2d(mu, mv, &uvs) <= tol {
            if let Some(last) = result.last_mut() {
                if (t0 - last.1).abs() < tol {
                    last.1 = t1;
                    continue;
                }
            }
            result.push((t0, t1));
        }
    }

    result
}

/// Distance from a 2D point to the closest polygon boundary segment.
fn boundary_distance_2d(px: f64, py: f64, verts: &[(f64, f64)]) -> f64 {
    let n = verts.len();
    let mut best = f64::INFINITY;
    for i in 0..n {
        let (x0, y0) = verts[i];
        let (x1, y1) = verts[(i + 1) % n];
        let (ex, ey) = (x1 - x0, y1 - y0);
        let len_sq = ex * ex + ey * ey;
        let t = if len_sq > 0.0 {
            (((px - x0) * ex + (py - y0) * ey) / len_sq).clamp(0.0, 1.0)
        } else {
            0.0
        };
        let (cx, cy) = (x0 + ex * t, y0 + ey * t);
        best = best.min((px - cx).hypot(py - cy));
    }
    best
}

/// Area of a coplanar 3D polygon, via the projected cross-product sum.
#[must_use]
pub fn polygon_area_3d(points: &[Point3], normal: &Vector3) -> f64 {
    if points.len() < 3 {
        return 0.0;
    }
    let n = points.len();
    let mut cross_sum = Vector3::zeros();
    let o = &points[0];
    for i in 1..n {
        let a = points[i] - o;
        let b = points[(i + 1) % n] - o;
        cross_sum += a.cross(&b);
    }
    0.5 * cross_sum.dot(normal).abs()
}

/// Centroid of a polygon (vertex average).
#[must_use]
pub fn polygon_centroid(points: &[Point3]) -> Point3 {
    let n = points.len();
    if n == 0 {
        return Point3::origin();
    }
    #[allow(clippy::cast_precision_loss)]
    let inv_n = 1.0 / n as f64;
    Point3::new(
        points.iter().map(|p| p.x).sum::<f64>() * inv_n,
        points.iter().map(|p| p.y).sum::<f64>() * inv_n,
        points.iter().map(|p| p.z).sum::<f64>() * inv_n,
    )
}

/// Distance from a point to the closed segment `[a, b]`.
#[must_use]
pub fn point_segment_distance(point: &Point3, a: &Point3, b: &Point3) -> f64 {
    let ab = b - a;
    let len_sq = ab.norm_squared();
    if len_sq == 0.0 {
        return (point - a).norm();
    }
    let t = ((point - a).dot(&ab) / len_sq).clamp(0.0, 1.0);
    (point - (a + ab * t)).norm()
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::math::TOLERANCE;

    fn p(x: f64, y: f64, z: f64) -> Point3 {
        Point3::new(x, y, z)
    }

    fn xy_plane() -> Plane {
        Plane::from_normal(p(0.0, 0.0, 0.0), Vector3::new(0.0, 0.0, 1.0)).unwrap()
    }

    fn unit_square() -> Vec<Point3> {
        vec![
            p(0.0, 0.0, 0.0),
            p(1.0, 0.0, 0.0),
            p(1.0, 1.0, 0.0),
            p(0.0, 1.0, 0.0),
        ]
    }

    #[test]
    fn interior_point_is_inside() {
        assert!(point_in_polygon_3d(&p(0.5, 0.5, 0.0), &unit_square(), &xy_plane()));
    }

    #[test]
    fn exterior_point_is_outside() {
        assert!(!point_in_polygon_3d(&p(1.5, 0.5, 0.0), &unit_square(), &xy_plane()));
    }

    #[test]
    fn clip_crossing_segment() {
        let spans = clip_segment_to_polygon(
            &p(-1.0, 0.5, 0.0),
            &p(2.0, 0.5, 0.0),
            &unit_square(),
            &xy_plane(),
            TOLERANCE,
        );
        assert_eq!(spans.len(), 1);
        assert!((spans[0].0 - 1.0 / 3.0).abs() < 0.01);
        assert!((spans[0].1 - 2.0 / 3.0).abs() < 0.01);
    }

    #[test]
    fn clip_disjoint_segment() {
        let spans = clip_segment_to_polygon(
            &p(2.0, 0.5, 0.0),
            &p(3.0, 0.5, 0.0),
            &unit_square(),
            &xy_plane(),
            TOLERANCE,
        );
        assert!(spans.is_empty());
    }

    #[test]
    fn clip_interior_segment_spans_whole() {
        let spans = clip_segment_to_polygon(
            &p(0.25, 0.5, 0.0),
            &p(0.75, 0.5, 0.0),
            &unit_square(),
            &xy_plane(),
            TOLERANCE,
        );
        assert_eq!(spans.len(), 1);
        assert!(spans[0].0.abs() < TOLERANCE);
        assert!((spans[0].1 - 1.0).abs() < TOLERANCE);
    }

    #[test]
    fn square_area_and_centroid() {
        let sq = unit_square();
        let area = polygon_area_3d(&sq, &Vector3::new(0.0, 0.0, 1.0));
        assert!((area - 1.0).abs() < TOLERANCE);
        let c = polygon_centroid(&sq);
        assert!((c.x - 0.5).abs() < TOLERANCE && (c.y - 0.5).abs() < TOLERANCE);
    }

    #[test]
    fn segment_distance_clamps_to_endpoints() {
        let d = point_segment_distance(&p(-1.0, 1.0, 0.0), &p(0.0, 0.0, 0.0), &p(2.0, 0.0, 0.0));
        assert!((d - 2.0_f64.sqrt()).abs() < TOLERANCE);
    }
}
