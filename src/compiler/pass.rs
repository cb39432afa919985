//! The pass trait driven by the [`crate::compiler::PassScheduler`].

use crate::{
    analysis::SsaFunction,
    compiler::context::CompilerContext,
    program::{symbols::MethodRef, AppView},
    Result,
};

/// A pass that operates on SSA form, one method at a time.
///
/// Passes must be thread-safe (Send + Sync): the scheduler runs
/// `run_on_method` for the methods of one wave in parallel, handing each
/// call exclusive ownership of that method's body and shared access to the
/// program and the context.
pub trait SsaPass: Send + Sync {
    /// Unique name for logging and debugging.
    fn name(&self) -> &'static str;

    /// Should this pass run on a specific method?
    fn should_run(&self, _method: MethodRef, _ctx: &CompilerContext) -> bool {
        true
    }

    /// Runs the pass on a single method's SSA.
    ///
    /// Returns `true` if the body changed.
    ///
    /// # Errors
    ///
    /// Returns an error if the pass fails to process the method. The first
    /// error aborts the run.
    fn run_on_method(
        &self,
        ssa: &mut SsaFunction,
        method: MethodRef,
        ctx: &CompilerContext,
        app: &AppView,
    ) -> Result<bool>;

    /// Called after every wave of methods.
    ///
    /// # Errors
    ///
    /// Returns an error if the wave boundary bookkeeping fails.
    fn on_wave_done(&self, _ctx: &CompilerContext, _app: &AppView) -> Result<()> {
        Ok(())
    }

    /// Called once before the first wave.
    ///
    /// # Errors
    ///
    /// Returns an error if initialization fails.
    fn initialize(&mut self, _ctx: &CompilerContext) -> Result<()> {
        Ok(())
    }

    /// Called once after the last wave.
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
