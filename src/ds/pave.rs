use super::ShapeIndex;

/// A split point on an edge: a parameter with its owning vertex.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Pave {
    /// Dense index of the vertex realizing this split point.
    pub vertex: ShapeIndex,
    /// Parameter on the owning edge's curve.
    pub t: f64,
}

/// The interval between two consecutive paves of one edge.
#[derive(Debug, Clone)]
pub struct PaveBlock {
    /// Dense index of the original edge this block came from.
    pub edge: ShapeIndex,
    /// Operand owning the original edge.
    pub operand: usize,
    /// Lower pave.
    pub pave1: Pave,
    /// Upper pave; `pave2.t > pave1.t` always holds.
    pub pave2: Pave,
    /// Owning common block, if this block coincides with blocks of
    /// other edges.
    pub common_block: Option<usize>,
}

impl PaveBlock {
    /// Parameter range of the block.
    #[must_use]
    pub fn range(&self) -> (f64, f64) {
        (self.pave1.t, self.pave2.t)
    }

    /// Length of the parameter interval.
    #[must_use]
    pub fn extent(&self) -> f64 {
        self.pave2.t - self.pave1.t
    }
}

/// A group of pave blocks, possibly from different operands, that share
/// the same geometric interval.
///
/// Blocks are referenced by id; the representative block (lowest
/// (operand, edge, parameter) key) is the one realized as an output
/// edge — the others reuse it.
#[derive(Debug, Clone)]
pub struct CommonBlock {
    /// Member pave-block ids.
    pub blocks: Vec<usize>,
    /// The member whose geometry becomes the single output edge.
    pub representative: usize,
    /// Merged tolerance over all members.
    pub tolerance: f64,
}
