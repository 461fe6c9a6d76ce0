pub mod oriented;

pub use oriented::OrientedBox;

use crate::math::Point3;

/// Axis-aligned bounding box.
#[derive(Debug, Clone, Copy)]
pub struct BoundingBox {
    /// Minimum corner.
    pub min: Point3,
    /// Maximum corner.
    pub max: Point3,
}

impl BoundingBox {
    /// An inverted box that grows from nothing.
    #[must_use]
    pub fn empty() -> Self {
        Self {
            min: Point3::new(f64::INFINITY, f64::INFINITY, f64::INFINITY),
            max: Point3::new(f64::NEG_INFINITY, f64::NEG_INFINITY, f64::NEG_INFINITY),
        }
    }

    /// The tightest box around a point set.
    #[must_use]
    pub fn from_points(points: &[Point3]) -> Self {
        let mut b = Self::empty();
        for p in points {
            b.grow(p);
        }
        b
    }

    /// Whether the box contains at least one point.
    #[must_use]
    pub fn is_valid(&self) -> bool {
        self.min.x <= self.max.x && self.min.y <= self.max.y && self.min.z <= self.max.z
    }

    /// Expands the box to contain `point`.
    pub fn grow(&mut self, point: &Point3) {
        self.min.x = self.min.x.min(point.x);
        self.min.y = self.min.y.min(point.y);
        self.min.z = self.min.z.min(point.z);
        self.max.x = self.max.x.max(point.x);
        self.max.y = self.max.y.max(point.y);
        self.max.z = self.max.z.max(point.z);
    }

    /// The union of two boxes.
    #[must_use]
    pub fn merged(&self, other: &Self) -> Self {
        Self {
            min: Point3::new(
                self.min.x.min(other.min.x),
                self.min.y.min(other.min.y),
                self.min.z.min(other.min.z),
            ),
            max: Point3::new(
                self.max.x.max(other.max.x),
                self.max.y.max(other.max.y),
                self.max.z.max(other.max.z),
            ),
        }
    }

    /// The box enlarged by `margin` on every side.
    #[must_use]
    pub fn enlarged(&self, margin: f64) -> Self {
        Self {
            min: Point3::new(self.min.x - margin, self.min.y - margin, self.min.z - margin),
            max: Point3::new(self.max.x + margin, self.max.y + margin, self.max.z + margin),
        }
    }

    /// Whether two boxes overlap when each is enlarged by `tol`.
    #[must_use]
    pub fn overlaps(&self, other: &Self, tol: f64) -> bool {
        self.min.x <= other.max.x + tol
            && self.max.x >= other.min.x - tol
            && self.min.y <= other.max.y + tol
            && self.max.y >= other.min.y - tol
            && self.min.z <= other.max.z + tol
            && self.max.z >= other.min.z - tol
    }

    /// Center of the box.
    #[must_use]
    pub fn center(&self) -> Point3 {
        nalgebra::center(&self.min, &self.max)
    }

    /// Index of the longest axis (0 = x, 1 = y, 2 = z).
    #[must_use]
    pub fn longest_axis(&self) -> usize {
        let d = self.max - self.min;
        if d.x >= d.y && d.x >= d.z {
            0
        } else if d.y >= d.z {
            1
        } else {
            2
        }
    }
}

#[derive(Debug, Clone, Copy)]
enum Node {
    Leaf {
        bounds: BoundingBox,
        item: usize,
    },
    Branch {
        bounds: BoundingBox,
        left: usize,
        right: usize,
    },
}

impl Node {
    fn bounds(&self) -> &BoundingBox {
        match self {
            Node::Leaf { bounds, .. } | Node::Branch { bounds, .. } => bounds,
        }
    }
}

/// Binary AABB tree over a set of item boxes.
///
/// Built by recursive median split on the longest centroid axis, so
/// construction is O(n log n) and the structure is deterministic for a
/// given input order.
#[derive(Debug)]
pub struct BoxTree {
    nodes: Vec<Node>,
    root: Option<usize>,
}

impl BoxTree {
    /// Builds a tree over `boxes`; item `i` in query results refers to
    /// `boxes[i]`.
    #[must_use]
    pub fn build(boxes: &[BoundingBox]) -> Self {
        let mut tree = Self {
            nodes: Vec::with_capacity(boxes.len().saturating_mul(2)),
            root: None,
        };
        if boxes.is_empty() {
            return tree;
        }
        let mut items: Vec<usize> = (0..boxes.len()).collect();
        let root = tree.build_range(&mut items, boxes);
        tree.root = Some(root);
        tree
    }

    fn build_range(&mut self, items: &mut [usize], boxes: &[BoundingBox]) -> usize {
        if items.len() == 1 {
            let item = items[0];
            self.nodes.push(Node::Leaf {
                bounds: boxes[item],
                item,
            });
            return self.nodes.len() - 1;
        }

        let mut centroid_bounds = BoundingBox::empty();
        for &i in items.iter() {
            centroid_bounds.grow(&boxes[i].center());
        }
        let axis = centroid_bounds.longest_axis();

        let mid = items.len() / 2;
        items.select_nth_unstable_by(mid, |&a, &b| {
            let ca = boxes[a].center()[axis];
            let cb = boxes[b].center()[axis];
            ca.partial_cmp(&cb)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then(a.cmp(&b))
        });

        let (left_items, right_items) = items.split_at_mut(mid);
        let left = self.build_range(left_items, boxes);
        let right = self.build_range(right_items, boxes);
        let bounds = self.nodes[left].bounds().merged(self.nodes[right].bounds());
        self.nodes.push(Node::Branch {
            bounds,
            left,
            right,
        });
        self.nodes.len() - 1
    }

    /// Whether the tree indexes any items.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.root.is_none()
    }
}

/// All item index pairs from `a` and `b` whose boxes overlap when
/// enlarged by `tol`, sorted ascending. Over-approximates: a pair that
/// truly intersects is never excluded.
#[must_use]
pub fn pairs_of(a: &BoxTree, b: &BoxTree, tol: f64) -> Vec<(usize, usize)> {
    let mut out = Vec::new();
    if let (Some(ra), Some(rb)) = (a.root, b.root) {
        descend(a, ra, b, rb, tol, &mut out);
    }
    out.sort_unstable();
    out
}

fn descend(
    a: &BoxTree,
    na: usize,
    b: &BoxTree,
    nb: usize,
    tol: f64,
    out: &mut Vec<(usize, usize)>,
) {
    let node_a = &a.nodes[na];
    let node_b = &b.nodes[nb];
    if !node_a.bounds().overlaps(node_b.bounds(), tol) {
        return;
    }
    match (node_a, node_b) {
        (Node::Leaf { item: ia, .. }, Node::Leaf { item: ib, .. }) => {
            out.push((*ia, *ib));
        }
        (Node::Branch { left, right, .. }, Node::Leaf { .. }) => {
            descend(a, *left, b, nb, tol, out);
            descend(a, *right, b, nb, tol, out);
        }
        (Node::Leaf { .. }, Node::Branch { left, right, .. }) => {
            descend(a, na, b, *left, tol, out);
            descend(a, na, b, *right, tol, out);
        }
        (
            Node::Branch {
                left: la,
                right: ra,
                ..
            },
            Node::Branch {
                left: lb,
                right: rb,
                ..
            },
        ) => {
            descend(a, *la, b, *lb, tol, out);
            descend(a, *la, b, *rb, tol, out);
            descend(a, *ra, b, *lb, tol, out);
            descend(a, *ra, b, *rb, tol, out);
        }
    }
}
