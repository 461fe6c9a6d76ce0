//! Edge splitting: one trimmed edge per pave block, shared vertices at
//! pave locations, one output edge per common block.

use std::collections::HashMap;

use crate::ds::{IntersectionStore, ShapeIndex};
use crate::error::Result;
use crate::topology::{EdgeData, EdgeId, TopologyStore};

/// The result of the edge-split stage: which store edge realizes each
/// pave block.
#[derive(Debug, Default)]
pub struct EdgeSplits {
    edge_of_block: HashMap<usize, EdgeId>,
    /// Original edges that were actually split (more than one block).
    pub modified_edges: Vec<ShapeIndex>,
}

impl EdgeSplits {
    /// The store edge realizing a pave block.
    #[must_use]
    pub fn edge_of_block(&self, block: usize) -> Option<EdgeId> {
        self.edge_of_block.get(&block).copied()
    }
}

/// Emits trimmed edges for every pave block.
///
/// Blocks covering their whole original edge reuse it; members of a
/// common block all map to the representative's single output edge.
///
/// # Errors
///
/// Returns an error if edge topology cannot be read.
pub fn split_edges(store: &mut TopologyStore, ds: &IntersectionStore) -> Result<EdgeSplits> {
    let mut splits = EdgeSplits::default();

    // Representatives first, so members can reuse their output edges.
    let block_order: Vec<usize> = {
        let mut order: Vec<usize> = (0..ds.pave_blocks().len()).collect();
        order.sort_by_key(|&id| {
            let block = ds.pave_block(id);
            let is_representative = block
                .common_block
                .map_or(true, |cb| ds.common_blocks()[cb].representative == id);
            (usize::from(!is_representative), id)
        });
        order
    };

    for id in block_order {
        let block = ds.pave_block(id);

        if let Some(cb) = block.common_block {
            let representative = ds.common_blocks()[cb].representative;
            if representative != id {
                if let Some(edge) = splits.edge_of_block(representative) {
                    splits.edge_of_block.insert(id, edge);
                }
                continue;
            }
        }

        let original_id = ds.edge_id(block.edge)?;
        let original = store.edge(original_id)?;

        let whole_edge = ds.blocks_of_edge(block.edge).len() == 1;
        if whole_edge {
            splits.edge_of_block.insert(id, original_id);
            continue;
        }

        let start = store.vertex(ds.vertex_id(block.pave1.vertex)?)?;
        let end = store.vertex(ds.vertex_id(block.pave2.vertex)?)?;
        let tolerance = original.tolerance.max(start.tolerance).max(end.tolerance);

        let mut trimmed = EdgeData::new(
            ds.vertex_id(block.pave1.vertex)?,
            ds.vertex_id(block.pave2.vertex)?,
            original.curve.clone(),
            block.pave1.t,
            block.pave2.t,
        );
        trimmed.tolerance = tolerance;
        let new_edge = store.add_edge(trimmed);
        splits.edge_of_block.insert(id, new_edge);
        splits.modified_edges.push(block.edge);
    }

    splits.modified_edges.sort_unstable();
    splits.modified_edges.dedup();
    Ok(splits)
}
