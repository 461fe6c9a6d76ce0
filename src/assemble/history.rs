use std::collections::{HashMap, HashSet};

use crate::ds::ShapeIndex;
use crate::topology::{EdgeId, FaceId, WireId};

/// A shape produced by the operation, for history queries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResultShape {
    Face(FaceId),
    Edge(EdgeId),
    Wire(WireId),
}

/// Provenance map from operand sub-shapes to result shapes, consumed by
/// naming and persistence layers.
#[derive(Debug, Default)]
pub struct HistoryMap {
    results: HashMap<ShapeIndex, Vec<ResultShape>>,
    modified: HashSet<ShapeIndex>,
    deleted: HashSet<ShapeIndex>,
}

impl HistoryMap {
    /// Creates an empty history.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Records a result shape generated from an original sub-shape.
    pub fn add_result(&mut self, origin: ShapeIndex, result: ResultShape) {
        self.results.entry(origin).or_default().push(result);
        self.deleted.remove(&origin);
    }

    /// Marks an original sub-shape as modified (split or re-trimmed).
    pub fn mark_modified(&mut self, origin: ShapeIndex) {
        self.modified.insert(origin);
    }

    /// Marks an original sub-shape as absent from the result.
    pub fn mark_deleted(&mut self, origin: ShapeIndex) {
        if !self.results.contains_key(&origin) {
            self.deleted.insert(origin);
        }
    }

    /// Result shapes generated from an original sub-shape.
    #[must_use]
    pub fn results_of(&self, origin: ShapeIndex) -> &[ResultShape] {
        self.results.get(&origin).map_or(&[], Vec::as_slice)
    }

    /// Whether the sub-shape survived in altered form.
    #[must_use]
    pub fn is_modified(&self, origin: ShapeIndex) -> bool {
        self.modified.contains(&origin)
    }

    /// Whether the sub-shape has no counterpart in the result.
    #[must_use]
    pub fn is_deleted(&self, origin: ShapeIndex) -> bool {
        self.deleted.contains(&origin)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn deletion_is_cancelled_by_a_result() {
        let mut history = HistoryMap::new();
        history.mark_deleted(4);
        assert!(history.is_deleted(4));

        history.add_result(4, ResultShape::Face(FaceId::default()));
        assert!(!history.is_deleted(4));
        assert_eq!(history.results_of(4).len(), 1);
    }

    #[test]
    fn results_do_not_imply_modification() {
        let mut history = HistoryMap::new();
        history.add_result(2, ResultShape::Face(FaceId::default()));
        assert!(!history.is_modified(2));
        history.mark_modified(2);
        assert!(history.is_modified(2));
    }
}
