//! The two scheduler passes of enum unboxing.
//!
//! - [`EnumUnboxingAnalysisPass`] feeds every program method to the
//!   [`EnumUnboxer`] and prunes candidates at wave boundaries.
//! - [`EnumUnboxingRewritePass`] brings each reprocessed method up to date
//!   with the lens and then rewrites its enum operations.

use crate::{
    analysis::SsaFunction,
    compiler::{CompilerContext, EventKind, LensCodeRewriter, SsaPass},
    enums::{rewriter::EnumUnboxingRewriter, unboxer::EnumUnboxer},
    program::{app::AppView, symbols::MethodRef},
    Result,
};

/// Collects eligibility facts from method bodies.
pub struct EnumUnboxingAnalysisPass<'a> {
    unboxer: &'a EnumUnboxer,
}

impl<'a> EnumUnboxingAnalysisPass<'a> {
    /// Creates the pass for `unboxer`.
    #[must_use]
    pub fn new(unboxer: &'a EnumUnboxer) -> Self {
        Self { unboxer }
    }
}

impl SsaPass for EnumUnboxingAnalysisPass<'_> {
    fn name(&self) -> &'static str {
        "enum-unboxing-analysis"
    }

    fn should_run(&self, _method: MethodRef, _ctx: &CompilerContext) -> bool {
        !self.unboxer.candidates().is_empty()
    }

    fn run_on_method(
        &self,
        ssa: &mut SsaFunction,
        method: MethodRef,
        _ctx: &CompilerContext,
        app: &AppView,
    ) -> Result<bool> {
        self.unboxer.analyze_method(app, method, ssa)?;
        Ok(false)
    }

    fn on_wave_done(&self, _ctx: &CompilerContext, _app: &AppView) -> Result<()> {
        self.unboxer.update_candidates_info();
        Ok(())
    }

    fn finalize(&mut self, ctx: &CompilerContext) -> Result<()> {
        for method in self.unboxer.library_modeling_methods() {
            ctx.disable_peephole(method);
        }
        Ok(())
    }

    fn description(&self) -> &'static str {
        "Records why enums cannot be unboxed"
    }
}

/// Rewrites methods that mention unboxed enums.
pub struct EnumUnboxingRewritePass<'a> {
    rewriter: &'a EnumUnboxingRewriter,
}

impl<'a> EnumUnboxingRewritePass<'a> {
    /// Creates the pass for `rewriter`.
    #[must_use]
    pub fn new(rewriter: &'a EnumUnboxingRewriter) -> Self {
        Self { rewriter }
    }
}

impl SsaPass for EnumUnboxingRewritePass<'_> {
    fn name(&self) -> &'static str {
        "enum-unboxing-rewrite"
    }

    fn run_on_method(
        &self,
        ssa: &mut SsaFunction,
        method: MethodRef,
        ctx: &CompilerContext,
        app: &AppView,
    ) -> Result<bool> {
        let lensed = LensCodeRewriter::new(app.symbols(), app.graph_lens()).rewrite(ssa);
        let rewritten = self
            .rewriter
            .rewrite_code(ssa, method, &lensed.original_types, &ctx.events)?;

        ctx.events
            .record(EventKind::MethodReprocessed)
            .method(method)
            .pass(self.name());
        Ok(lensed.changed || rewritten)
    }

    fn description(&self) -> &'static str {
        "Rewrites enum operations into int operations"
    }
}
