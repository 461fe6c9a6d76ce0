use crate::math::{Point3, Vector3, TOLERANCE};

/// An oriented bounding box: a frame (center + three orthonormal axes)
/// and half-extents along each axis.
///
/// Used as an optional second broad-phase filter: tighter than the
/// axis-aligned box for slanted edges and faces, still conservative.
#[derive(Debug, Clone)]
pub struct OrientedBox {
    center: Point3,
    axes: [Vector3; 3],
    half_extents: [f64; 3],
}

impl OrientedBox {
    /// Fits an oriented box around `points` using the given primary
    /// axis (e.g. an edge direction or a face normal). The remaining
    /// axes complete an orthonormal frame.
    ///
    /// Returns `None` for an empty point set or a degenerate axis.
    #[must_use]
    pub fn fit(points: &[Point3], primary: &Vector3) -> Option<Self> {
        if points.is_empty() {
            return None;
        }
        let len = primary.norm();
        if len < TOLERANCE {
            return None;
        }
        let a0 = primary / len;
        let reference = if a0.x.abs() < 0.9 {
            Vector3::new(1.0, 0.0, 0.0)
        } else {
            Vector3::new(0.0, 1.0, 0.0)
        };
        let a1 = a0.cross(&reference).normalize();
        let a2 = a0.cross(&a1);
        let axes = [a0, a1, a2];

        // Project all points onto the frame and take extents.
        let mut lo = [f64::INFINITY; 3];
        let mut hi = [f64::NEG_INFINITY; 3];
        let origin = points[0];
        for p in points {
            let d = p - origin;
            for k in 0..3 {
                let t = d.dot(&axes[k]);
                lo[k] = lo[k].min(t);
                hi[k] = hi[k].max(t);
            }
        }

        let mut center = origin;
        let mut half_extents = [0.0; 3];
        for k in 0..3 {
            let mid = 0.5 * (lo[k] + hi[k]);
            center += axes[k] * mid;
            half_extents[k] = 0.5 * (hi[k] - lo[k]);
        }

        Some(Self {
            center,
            axes,
            half_extents,
        })
    }

    /// Enlarges every half-extent by `margin`.
    #[must_use]
    pub fn enlarged(&self, margin: f64) -> Self {
        let mut grown = self.clone();
        for h in &mut grown.half_extents {
            *h += margin;
        }
        grown
    }

    /// Separating-axis overlap test against another oriented box.
    ///
    /// Tests the 6 face normals and 9 edge cross-product axes; returns
    /// `false` only when a separating axis exists, so the filter never
    /// rejects a truly intersecting pair.
    #[must_use]
    pub fn overlaps(&self, other: &Self) -> bool {
        let d = other.center - self.center;

        let mut axes: Vec<Vector3> = Vec::with_capacity(15);
        axes.extend_from_slice(&self.axes);
        axes.extend_from_slice(&other.axes);
        for a in &self.axes {
            for b in &other.axes {
                let cross = a.cross(b);
                if cross.norm_squared() > TOLERANCE {
                    axes.push(cross.normalize());
                }
            }
        }

        for axis in &axes {
            let ra: f64 = (0..3)
                .map(|k| self.half_extents[k] * self.axes[k].dot(axis).abs())
                .sum();
            let rb: f64 = (0..3)
                .map(|k| other.half_extents[k] * other.axes[k].dot(axis).abs())
                .sum();
            if d.dot(axis).abs() > ra + rb {
                return false;
            }
        }
        true
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn p(x: f64, y: f64, z: f64) -> Point3 {
        Point3::new(x, y, z)
    }

    /// Two thin diagonal slabs whose AABBs overlap but which are far
    /// apart along the shared diagonal normal.
    #[test]
    fn separates_slanted_slabs_where_aabbs_cannot() {
        let diag = Vector3::new(1.0, 1.0, 0.0);
        let slab_a = OrientedBox::fit(
            &[p(0.0, 0.0, 0.0), p(1.0, 1.0, 0.0), p(0.0, 0.0, 1.0)],
            &diag,
        )
        .unwrap();
        let slab_b = OrientedBox::fit(
            &[p(1.0, 0.0, 0.0), p(2.0, 1.0, 0.0), p(1.0, 0.0, 1.0)],
            &diag,
        )
        .unwrap();
        assert!(!slab_a.overlaps(&slab_b));
    }

    #[test]
    fn touching_boxes_overlap() {
        let x = Vector3::new(1.0, 0.0, 0.0);
        let a = OrientedBox::fit(&[p(0.0, 0.0, 0.0), p(1.0, 1.0, 1.0)], &x).unwrap();
        let b = OrientedBox::fit(&[p(0.5, 0.5, 0.5), p(2.0, 2.0, 2.0)], &x).unwrap();
        assert!(a.overlaps(&b));
    }

    #[test]
    fn margin_bridges_separation() {
        let x = Vector3::new(1.0, 0.0, 0.0);
        let a = OrientedBox::fit(&[p(0.0, 0.0, 0.0), p(1.0, 1.0, 1.0)], &x).unwrap();
        let b = OrientedBox::fit(&[p(1.2, 0.0, 0.0), p(2.0, 1.0, 1.0)], &x).unwrap();
        assert!(!a.overlaps(&b));
        assert!(a.enlarged(0.2).overlaps(&b));
    }

    #[test]
    fn empty_fit_is_none() {
        assert!(OrientedBox::fit(&[], &Vector3::new(1.0, 0.0, 0.0)).is_none());
    }
}
