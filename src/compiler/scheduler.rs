//! Pass scheduler for wave-based parallel method processing.
//!
//! The [`PassScheduler`] runs one [`SsaPass`] over a set of methods. The
//! methods are sorted canonically and split into waves of a fixed size.
//! Every wave runs in parallel, and the pass's wave-boundary hook runs after
//! each wave, before the next one starts:
//!
//! ```text
//!   sorted methods:  m0 m1 m2 m3 | m4 m5 m6 m7 | m8 m9
//!                    └─ wave 0 ──┘ └─ wave 1 ──┘ └wave 2┘
//!                         │             │           │
//!                    on_wave_done  on_wave_done  on_wave_done
//! ```
//!
//! A method body is removed from the context while its task runs, so no two
//! tasks ever see the same body.

use std::sync::atomic::{AtomicBool, Ordering};

use log::debug;
use rayon::prelude::*;

use crate::{
    compiler::{context::CompilerContext, events::EventKind, pass::SsaPass},
    program::{symbols::MethodRef, AppView},
    Result,
};

/// Default number of methods per wave.
pub const DEFAULT_WAVE_SIZE: usize = 64;

/// Runs passes over waves of methods.
#[derive(Debug, Clone)]
pub struct PassScheduler {
    wave_size: usize,
}

impl Default for PassScheduler {
    fn default() -> Self {
        Self::new(DEFAULT_WAVE_SIZE)
    }
}

impl PassScheduler {
    /// Creates a scheduler; a wave size of zero is treated as one.
    #[must_use]
    pub fn new(wave_size: usize) -> Self {
        Self {
            wave_size: wave_size.max(1),
        }
    }

    /// Number of methods per wave.
    #[must_use]
    pub fn wave_size(&self) -> usize {
        self.wave_size
    }

    /// Splits `methods` into deterministic waves.
    #[must_use]
    pub fn waves(&self, app: &AppView, methods: &[MethodRef]) -> Vec<Vec<MethodRef>> {
        let mut sorted = methods.to_vec();
        sorted.sort_by_cached_key(|m| app.symbols().method_sort_key(*m));
        sorted.dedup();
        sorted
            .chunks(self.wave_size)
            .map(<[MethodRef]>::to_vec)
            .collect()
    }

    /// Runs `pass` over every method in `methods` that has a body.
    ///
    /// Returns `true` if any method changed.
    ///
    /// # Errors
    ///
    /// Returns the error of a failing method or wave-boundary hook. The
    /// remaining waves are not run.
    pub fn run(
        &self,
        pass: &mut dyn SsaPass,
        methods: &[MethodRef],
        ctx: &CompilerContext,
        app: &AppView,
    ) -> Result<bool> {
        pass.initialize(ctx)?;
        ctx.events
            .record(EventKind::PassStarted)
            .pass(pass.name())
            .message(format!("{}: {} methods", pass.name(), methods.len()));

        let any_changed = AtomicBool::new(false);
        let waves = self.waves(app, methods);
        for (index, wave) in waves.iter().enumerate() {
            debug!("{}: wave {} with {} methods", pass.name(), index, wave.len());
            let pass_ref: &dyn SsaPass = pass;
            wave.par_iter().try_for_each(|&method| -> Result<()> {
                if !pass_ref.should_run(method, ctx) {
                    return Ok(());
                }

                let Some((_, mut ssa)) = ctx.ssa_functions.remove(&method) else {
                    return Ok(());
                };

                let result = pass_ref.run_on_method(&mut ssa, method, ctx, app);

                ctx.ssa_functions.insert(method, ssa);

                if result? {
                    any_changed.store(true, Ordering::Relaxed);
                    ctx.mark_processed(method);
                }
                Ok(())
            })?;
            pass.on_wave_done(ctx, app)?;
        }

        pass.finalize(ctx)?;
        ctx.events
            .record(EventKind::PassCompleted)
            .pass(pass.name())
            .message(format!("{}: {} waves", pass.name(), waves.len()));
        Ok(any_changed.load(Ordering::Relaxed))
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{
        atomic::{AtomicUsize, Ordering},
        Arc,
    };

    use super::*;
    use crate::{
        analysis::{SsaFunction, SsaFunctionBuilder},
        program::symbols::Symbols,
    };

    struct CountingPass {
        runs: AtomicUsize,
        waves: AtomicUsize,
        fail_on: Option<MethodRef>,
    }

    impl SsaPass for CountingPass {
        fn name(&self) -> &'static str {
            "counting"
        }

        fn run_on_method(
            &self,
            _ssa: &mut SsaFunction,
            method: MethodRef,
            _ctx: &CompilerContext,
            _app: &AppView,
        ) -> Result<bool> {
            if Some(method) == self.fail_on {
                return Err(crate::Error::Error("boom".to_string()));
            }
            self.runs.fetch_add(1, Ordering::SeqCst);
            Ok(true)
        }

        fn on_wave_done(&self, _ctx: &CompilerContext, _app: &AppView) -> Result<()> {
            self.waves.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    fn setup(count: usize) -> (AppView, CompilerContext, Vec<MethodRef>) {
        let symbols = Arc::new(Symbols::new());
        let app = AppView::new(Arc::clone(&symbols));
        let ctx = CompilerContext::new();
        let void = symbols.ty("V");
        let holder = symbols.class("com.example.Main");
        let methods: Vec<MethodRef> = (0..count)
            .map(|i| {
                let m = symbols.method(holder, &format!("m{i}"), symbols.proto(void, &[]));
                let ssa = SsaFunctionBuilder::new(&symbols, &[]).build_with(|f| {
                    f.block(0, |b| b.ret());
                });
                ctx.set_ssa(m, ssa);
                m
            })
            .collect();
        (app, ctx, methods)
    }

    #[test]
    fn test_waves_and_boundaries() {
        let (app, ctx, methods) = setup(5);
        let mut pass = CountingPass {
            runs: AtomicUsize::new(0),
            waves: AtomicUsize::new(0),
            fail_on: None,
        };
        let changed = PassScheduler::new(2).run(&mut pass, &methods, &ctx, &app).unwrap();
        assert!(changed);
        assert_eq!(pass.runs.load(Ordering::SeqCst), 5);
        assert_eq!(pass.waves.load(Ordering::SeqCst), 3);
        assert_eq!(ctx.method_count(), 5);
        assert_eq!(ctx.processed_methods.len(), 5);
    }

    #[test]
    fn test_error_stops_run() {
        let (app, ctx, methods) = setup(3);
        let mut pass = CountingPass {
            runs: AtomicUsize::new(0),
            waves: AtomicUsize::new(0),
            fail_on: Some(methods[0]),
        };
        let result = PassScheduler::new(1).run(&mut pass, &methods, &ctx, &app);
        assert!(result.is_err());
        assert_eq!(ctx.method_count(), 3);
    }
}
