mod edge_edge;
mod edge_face;
mod face_face;
mod vertex;

pub use face_face::detect_coincident_faces;
pub(crate) use vertex::point_on_face;

use crate::ds::{Interference, IntersectionStore, ShapeIndex, ShapeKind};
use crate::error::Result;
use crate::topology::TopologyStore;

/// Immutable per-operation context threaded through every stage and
/// task; there are no ambient tolerance globals.
#[derive(Debug, Clone, Copy)]
pub struct IntersectContext {
    /// Base working tolerance.
    pub tolerance: f64,
    /// Extra fuzzy margin layered onto pairwise tolerances.
    pub fuzzy: f64,
}

impl IntersectContext {
    /// Working tolerance for a specific pair: own tolerances of both
    /// sub-shapes plus the fuzzy margin, floored by the base tolerance.
    #[must_use]
    pub fn pair_tolerance(&self, ds: &IntersectionStore, a: ShapeIndex, b: ShapeIndex) -> f64 {
        let own = ds.entry(a).tolerance.max(ds.entry(b).tolerance);
        (own + self.fuzzy).max(self.tolerance)
    }
}

/// The six narrow-phase handler slots, selected by shape-kind pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PairKind {
    VertexVertex,
    VertexEdge,
    VertexFace,
    EdgeEdge,
    EdgeFace,
    FaceFace,
}

/// Dispatch table indexed by `(kind_a, kind_b)`. The second flag says
/// whether the participants must be swapped so the handler always sees
/// the lower-rank kind first.
const DISPATCH: [[(PairKind, bool); 3]; 3] = [
    [
        (PairKind::VertexVertex, false),
        (PairKind::VertexEdge, false),
        (PairKind::VertexFace, false),
    ],
    [
        (PairKind::VertexEdge, true),
        (PairKind::EdgeEdge, false),
        (PairKind::EdgeFace, false),
    ],
    [
        (PairKind::VertexFace, true),
        (PairKind::EdgeFace, true),
        (PairKind::FaceFace, false),
    ],
];

fn kind_rank(kind: ShapeKind) -> usize {
    match kind {
        ShapeKind::Vertex => 0,
        ShapeKind::Edge => 1,
        ShapeKind::Face => 2,
    }
}

/// Resolves the handler slot for a pair of dense indices.
#[must_use]
pub fn pair_kind(ds: &IntersectionStore, a: ShapeIndex, b: ShapeIndex) -> (PairKind, bool) {
    DISPATCH[kind_rank(ds.entry(a).kind())][kind_rank(ds.entry(b).kind())]
}

/// Runs the narrow-phase solve for one candidate pair.
///
/// The returned interferences always name the participants in handler
/// order (lower-rank kind first). Solver non-convergence surfaces as a
/// recoverable [`BooleanError::Intersection`](crate::error::BooleanError)
/// which the orchestrator downgrades to a warning.
///
/// # Errors
///
/// Returns an error if topology cannot be read or the solver fails.
pub fn intersect_pair(
    store: &TopologyStore,
    ds: &IntersectionStore,
    ctx: &IntersectContext,
    a: ShapeIndex,
    b: ShapeIndex,
) -> Result<Vec<Interference>> {
    let (kind, swap) = pair_kind(ds, a, b);
    let (x, y) = if swap { (b, a) } else { (a, b) };

    match kind {
        PairKind::VertexVertex => vertex::vertex_vertex(store, ds, ctx, x, y),
        PairKind::VertexEdge => vertex::vertex_edge(store, ds, ctx, x, y),
        PairKind::VertexFace => vertex::vertex_face(store, ds, ctx, x, y),
        PairKind::EdgeEdge => edge_edge::edge_edge(store, ds, ctx, x, y),
        PairKind::EdgeFace => edge_face::edge_face(store, ds, ctx, x, y),
        PairKind::FaceFace => face_face::face_face(store, ds, ctx, x, y),
    }
}
