pub mod intersect_3d;
pub mod polygon_3d;
pub mod root;

/// 3D point type.
pub type Point3 = nalgebra::Point3<f64>;

/// 3D vector type.
pub type Vector3 = nalgebra::Vector3<f64>;

/// Base geometric tolerance for floating-point comparisons.
///
/// Per-shape tolerances and the fuzzy margin are layered on top of this
/// during an operation; it is the floor, not the working tolerance.
pub const TOLERANCE: f64 = 1e-9;

/// Default confusion tolerance assigned to newly built vertices.
pub const VERTEX_TOLERANCE: f64 = 1e-7;

/// Returns `true` when two scalars agree within `tol`.
#[inline]
#[must_use]
pub fn scalars_equal(a: f64, b: f64, tol: f64) -> bool {
    (a - b).abs() <= tol
}

/// Returns `true` when two points coincide within `tol`.
#[inline]
#[must_use]
pub fn points_equal(a: &Point3, b: &Point3, tol: f64) -> bool {
    (a - b).norm_squared() <= tol * tol
}

/// Midpoint of two points.
#[inline]
#[must_use]
pub fn midpoint(a: &Point3, b: &Point3) -> Point3 {
    nalgebra::center(a, b)
}
