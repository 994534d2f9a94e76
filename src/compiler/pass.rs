//! Pass traits for the compiler pipeline.
//!
//! This module defines the [`SsaPass`] trait that all passes implement. Passes
//! are organized into phases by the [`PassScheduler`](crate::compiler::PassScheduler):
//!
//! 1. **Inline**: small callees are inlined so that allocations stop escaping
//! 2. **Optimize**: load/store elimination
//! 3. **Normalize**: dead code elimination after every phase

use crate::{analysis::SsaFunction, analysis::Token, compiler::CompilerContext, Result};

/// A compiler pass that operates on SSA form.
///
/// All passes must be thread-safe (Send + Sync) to allow parallel execution
/// over methods. Passes receive mutable access to one method's SSA and shared
/// access to the compiler context.
pub trait SsaPass: Send + Sync {
    /// Unique name for logging and checker phase names.
    fn name(&self) -> &'static str;

    /// Should this pass run on a specific method?
    ///
    /// Called before `run_on_method`. Override to skip methods that
    /// don't need this pass.
    fn should_run(&self, _method_token: Token, _ctx: &CompilerContext) -> bool {
        true
    }

    /// Run the pass on a single method's SSA.
    ///
    /// Returns `true` if any changes were made, `false` otherwise.
    /// Events should be recorded directly to `ctx.events`.
    ///
    /// # Arguments
    ///
    /// * `ssa` - The SSA function to transform.
    /// * `method_token` - The token of the method.
    /// * `ctx` - The compiler context (thread-safe, uses shared reference).
    ///
    /// # Errors
    ///
    /// Returns an error if the pass fails to process the method. The
    /// scheduler then restores the method to its state before the pass.
    fn run_on_method(
        &self,
        ssa: &mut SsaFunction,
        method_token: Token,
        ctx: &CompilerContext,
    ) -> Result<bool>;

    /// Called once before the pass runs in a phase.
    ///
    /// # Errors
    ///
    /// Returns an error if initialization fails.
    fn initialize(&mut self, _ctx: &CompilerContext) -> Result<()> {
        Ok(())
    }

    /// Called once after the pass completes in a phase.
    ///
    /// # Errors
    ///
    /// Returns an error if finalization fails.
    fn finalize(&mut self, _ctx: &CompilerContext) -> Result<()> {
        Ok(())
    }

    /// Get a description of what this pass does.
    fn description(&self) -> &'static str {
        "No description available"
    }
}
