use crate::assemble::{BooleanOp, BooleanOutput};
use crate::engine::{BooleanEngine, BooleanOptions};
use crate::error::Result;
use crate::topology::{SolidId, TopologyStore};

/// Computes the section (intersection edges) between two solids.
pub struct Section {
    solid_a: SolidId,
    solid_b: SolidId,
    options: BooleanOptions,
}

impl Section {
    /// Creates a new `Section` operation.
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

    /// Executes the section; the result carries wires, never solids.
    ///
    /// # Errors
    ///
    /// Returns an error if the operands are invalid.
    pub fn execute(&self, store: &mut TopologyStore) -> Result<BooleanOutput> {
        let mut engine = BooleanEngine::new(store);
        engine.add_object(self.solid_a);
        engine.add_object(self.solid_b);
        engine.set_options(self.options);
        engine.execute(BooleanOp::Section)
    }
}
