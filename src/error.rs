use thiserror::Error;

use crate::ds::ShapeIndex;

/// Top-level error type for the Carvel boolean kernel.
#[derive(Debug, Error)]
pub enum CarvelError {
    #[error(transparent)]
    Geometry(#[from] GeometryError),

    #[error(transparent)]
    Topology(#[from] TopologyError),

    #[error(transparent)]
    Boolean(#[from] BooleanError),
}

/// Errors related to geometric computations.
#[derive(Debug, Error)]
pub enum GeometryError {
    #[error("parameter {parameter} = {value} is out of range [{min}, {max}]")]
    ParameterOutOfRange {
        parameter: &'static str,
        value: f64,
        min: f64,
        max: f64,
    },

    #[error("degenerate geometry: {0}")]
    Degenerate(String),

    #[error("zero-length vector")]
    ZeroVector,
}

/// Errors related to topological structure.
#[derive(Debug, Error)]
pub enum TopologyError {
    #[error("entity not found: {0}")]
    EntityNotFound(String),

    #[error("wire is not closed")]
    WireNotClosed,

    #[error("invalid topology: {0}")]
    InvalidTopology(String),
}

/// Errors raised by a boolean operation.
///
/// `Input`, `Tolerance` and `Assembly` are fatal: the operation aborts
/// with no partial shape. `Intersection` and `Classification` are
/// recovered locally and only surface here if recovery itself is
/// impossible; in the normal path they become warning diagnostics
/// instead.
#[derive(Debug, Error)]
pub enum BooleanError {
    #[error("invalid operand: {reason}")]
    Input { reason: String, shape: Option<ShapeIndex> },

    #[error("operand tolerance {tolerance} exceeds the requested fuzzy budget {fuzzy}")]
    Tolerance { tolerance: f64, fuzzy: f64 },

    #[error("intersection solver did not converge for pair ({a}, {b})")]
    Intersection { a: ShapeIndex, b: ShapeIndex },

    #[error("classification is ambiguous for split element of shape {shape}")]
    Classification { shape: ShapeIndex },

    #[error("result assembly failed: {reason}")]
    Assembly { reason: String },

    #[error("operation cancelled")]
    Cancelled,
}

impl BooleanError {
    /// Whether the error aborts the whole operation.
    #[must_use]
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            Self::Input { .. } | Self::Tolerance { .. } | Self::Assembly { .. } | Self::Cancelled
        )
    }
}

/// Convenience type alias for results using [`CarvelError`].
pub type Result<T> = std::result::Result<T, CarvelError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fatal_partition() {
        assert!(BooleanError::Input {
            reason: "open shell".into(),
            shape: None
        }
        .is_fatal());
        assert!(BooleanError::Assembly {
            reason: "unclosed wire".into()
        }
        .is_fatal());
        assert!(!BooleanError::Intersection { a: 3, b: 7 }.is_fatal());
        assert!(!BooleanError::Classification { shape: 12 }.is_fatal());
    }
}
