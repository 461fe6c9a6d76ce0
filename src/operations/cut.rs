use crate::assemble::{BooleanOp, BooleanOutput};
use crate::engine::{BooleanEngine, BooleanOptions};
use crate::error::Result;
use crate::topology::{SolidId, TopologyStore};

/// Computes the boolean difference of two solids (object minus tool).
pub struct Cut {
    object: SolidId,
    tool: SolidId,
    reversed: bool,
    options: BooleanOptions,
}

impl Cut {
    /// Creates a new `Cut` operation removing `tool` from `object`.
    #[must_use]
    pub fn new(object: SolidId, tool: SolidId) -> Self {
        Self {
            object,
            tool,
            reversed: false,
            options: BooleanOptions::default(),
        }
    }

    /// Swaps the roles: the result becomes tool minus object.
    #[must_use]
    pub fn reversed(mut self) -> Self {
        self.reversed = true;
        self
    }

    /// Overrides the engine options.
    #[must_use]
    pub fn with_options(mut self, options: BooleanOptions) -> Self {
        self.options = options;
        self
    }

    /// Executes the difference.
    ///
    /// # Errors
    ///
    /// Returns an error if the operands are invalid or assembly fails.
    pub fn execute(&self, store: &mut TopologyStore) -> Result<BooleanOutput> {
        let mut engine = BooleanEngine::new(store);
        engine.add_object(self.object);
        engine.add_tool(self.tool);
        engine.set_options(self.options);
        engine.execute(if self.reversed {
            BooleanOp::CutReverse
        } else {
            BooleanOp::Cut
        })
    }
}
