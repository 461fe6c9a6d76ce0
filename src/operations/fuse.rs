use crate::assemble::{BooleanOp, BooleanOutput};
use crate::engine::{BooleanEngine, BooleanOptions};
use crate::error::Result;
use crate::topology::{SolidId, TopologyStore};

/// Computes the boolean union of two solids.
pub struct Fuse {
    solid_a: SolidId,
    solid_b: SolidId,
    options: BooleanOptions,
}

impl Fuse {
    /// Creates a new `Fuse` operation.
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

    /// Executes the union, creating the result in the topology store.
    ///
    /// # Errors
    ///
    /// Returns an error if the operands are invalid or assembly fails.
    pub fn execute(&self, store: &mut TopologyStore) -> Result<BooleanOutput> {
        let mut engine = BooleanEngine::new(store);
        engine.add_object(self.solid_a);
        engine.add_object(self.solid_b);
        engine.set_options(self.options);
        engine.execute(BooleanOp::Fuse)
    }
}
