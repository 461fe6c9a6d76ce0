use crate::assemble::{BooleanOp, BooleanOutput};
use crate::engine::{BooleanEngine, BooleanOptions};
use crate::error::Result;
use crate::topology::{SolidId, TopologyStore};

/// Computes the boolean intersection of two solids.
pub struct Common {
    solid_a: SolidId,
    solid_b: SolidId,
    options: BooleanOptions,
}

impl Common {
    /// Creates a new `Common` operation.
    #[must_use]
    pub fn new(solid_a: SolidId, solid_b: SolidId) -> Self {
        Self {
            solid_a,
            solid_b,
            options: BooleanOptions::default(),
        }
    }

    /// Overrides the engine options.
    #[must_use]
    pub fn with_options(mut self, options: BooleanOptions) -> Self {
        self.options = options;
        self
    }

    /// Executes the intersection. An empty result (disjoint or merely
    /// touching operands) is a valid outcome, not an error.
    ///
    /// # Errors
    ///
    /// Returns an error if the operands are invalid or assembly fails.
    pub fn execute(&self, store: &mut TopologyStore) -> Result<BooleanOutput> {
        let mut engine = BooleanEngine::new(store);
        engine.add_object(self.solid_a);
        engine.add_object(self.solid_b);
        engine.set_options(self.options);
        engine.execute(BooleanOp::Common)
    }
}
