use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Glue mode: with `On`, face pairs sharing a surface support are
/// recorded as coincident without running the face/face solver.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum GlueOption {
    #[default]
    Off,
    On,
}

/// Recognized engine options.
#[derive(Debug, Clone, Copy)]
pub struct BooleanOptions {
    /// Extra tolerance margin layered onto every pairwise test.
    pub fuzzy_value: f64,
    /// Run the parallelizable stages on a worker pool.
    pub run_parallel: bool,
    /// Worker count; 0 picks the pool default.
    pub workers: usize,
    /// Validate operand shell orientation before processing.
    pub check_inverted: bool,
    /// Filter broad-phase candidates with tight oriented boxes.
    pub use_oriented_boxes: bool,
    /// Skip the face/face solver for known-coincident faces.
    pub glue: GlueOption,
}

impl Default for BooleanOptions {
    fn default() -> Self {
        Self {
            fuzzy_value: 0.0,
            run_parallel: false,
            workers: 0,
            check_inverted: false,
            use_oriented_boxes: false,
            glue: GlueOption::Off,
        }
    }
}

/// Cooperative cancellation token, polled between phases and between
/// batches inside the long-running phases.
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    flag: Arc<AtomicBool>,
}

impl CancelToken {
    /// Creates a fresh, unset token.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Requests cancellation.
    pub fn cancel(&self) {
        self.flag.store(true, Ordering::Relaxed);
    }

    /// Whether cancellation was requested.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::Relaxed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn token_is_shared_between_clones() {
        let token = CancelToken::new();
        let clone = token.clone();
        assert!(!clone.is_cancelled());
        token.cancel();
        assert!(clone.is_cancelled());
    }
}
