//! The enum unboxer and the unboxing driver.
//!
//! # Lifecycle
//!
//! ```text
//!  prepare ──► analyze_method (per method, in waves) ──► finish_analysis
//!                    │                                         │
//!             update_candidates_info                      unbox_enums
//!              (after every wave)                              │
//!                                         tree fixer ─► lens ─► rewrite pass
//!                                                                  │
//!                                                      utility materialization
//! ```
//!
//! [`unbox_program`] runs the whole lifecycle over an [`AppView`].

use std::{collections::BTreeSet, sync::Arc};

use dashmap::{DashMap, DashSet};
use log::{debug, info, warn};

use crate::{
    analysis::InvokeKind,
    compiler::{CompilerContext, EventKind, EventLog, PassScheduler},
    enums::{
        candidates::CandidateRegistry,
        passes::{EnumUnboxingAnalysisPass, EnumUnboxingRewritePass},
        rewriter::EnumUnboxingRewriter,
        treefixer::EnumUnboxingTreeFixer,
        utility::EnumUnboxingUtilityClasses,
        EnumDataMap, EnumUnboxingConfig, Reason,
    },
    program::{
        app::AppView,
        keep::PrunedItems,
        symbols::{MethodRef, Symbols, TypeRef},
    },
    Error, Result,
};

/// Decides which enums become ints.
///
/// All analysis state is concurrent so that many methods can be analyzed at
/// once.
#[derive(Debug)]
pub struct EnumUnboxer {
    pub(super) symbols: Arc<Symbols>,
    pub(super) config: EnumUnboxingConfig,
    pub(super) candidates: CandidateRegistry,
    pub(super) reasons: DashMap<TypeRef, Vec<Reason>>,
    pub(super) library_modeling: DashSet<MethodRef>,
    pub(super) check_not_null: DashSet<(MethodRef, TypeRef)>,
}

/// What [`EnumUnboxer::unbox_enums`] hands to the rewrite stage.
#[derive(Debug)]
pub struct UnboxingPlan {
    /// The rewriter for the reprocessed methods.
    pub rewriter: EnumUnboxingRewriter,
    /// Methods to reprocess, sorted.
    pub reprocess: Vec<MethodRef>,
    /// Items removed by the tree fixer.
    pub pruned: PrunedItems,
}

/// Outcome of [`unbox_program`].
#[derive(Debug, Default)]
pub struct UnboxingSummary {
    /// Unboxed enums, sorted by canonical name.
    pub unboxed: Vec<TypeRef>,
    /// Rejected enums with their reasons, sorted by canonical name.
    pub rejected: Vec<(TypeRef, Vec<Reason>)>,
    /// Items removed from the program.
    pub pruned: PrunedItems,
    /// Methods rewritten after unboxing.
    pub reprocessed: Vec<MethodRef>,
    /// Data of the unboxed enums.
    pub data: Arc<EnumDataMap>,
}

impl EnumUnboxer {
    /// Creates an unboxer.
    #[must_use]
    pub fn new(symbols: Arc<Symbols>, config: EnumUnboxingConfig) -> Self {
        Self {
            symbols,
            config,
            candidates: CandidateRegistry::new(),
            reasons: DashMap::new(),
            library_modeling: DashSet::new(),
            check_not_null: DashSet::new(),
        }
    }

    /// The configuration.
    #[must_use]
    pub fn config(&self) -> &EnumUnboxingConfig {
        &self.config
    }

    /// The candidate registry.
    #[must_use]
    pub fn candidates(&self) -> &CandidateRegistry {
        &self.candidates
    }

    /// Methods whose modeled library calls must survive until the rewrite.
    #[must_use]
    pub fn library_modeling_methods(&self) -> Vec<MethodRef> {
        let mut methods: Vec<MethodRef> = self.library_modeling.iter().map(|m| *m).collect();
        methods.sort_by_cached_key(|m| self.symbols.method_sort_key(*m));
        methods
    }

    /// Seeds the candidate set.
    pub fn prepare(&self, app: &AppView, events: &EventLog) {
        self.find_candidates(app, events);
        info!(
            "enum unboxing: {} candidates, {} rejected before analysis",
            self.candidates.len(),
            self.reasons.len()
        );
    }

    /// Records that `ty` cannot be unboxed.
    ///
    /// Without debug logging the first reason invalidates the enum and later
    /// reasons are dropped. With debug logging every reason is kept and the
    /// enum stays a candidate until [`EnumUnboxer::finish_analysis`].
    pub fn report_failure(&self, ty: TypeRef, reason: Reason) {
        if reason.is_eligible() {
            return;
        }
        if self.config.debug_log {
            self.reasons.entry(ty).or_default().push(reason);
        } else if self.candidates.invalidate(ty) {
            debug!(
                "enum {} not unboxed: {}",
                self.symbols.source_name(ty),
                reason.describe(&self.symbols)
            );
            self.reasons.entry(ty).or_default().push(reason);
        }
    }

    /// Drops invalidated candidates. Called after every analysis wave.
    pub fn update_candidates_info(&self) {
        let removed = self.candidates.remove_invalidated();
        if !removed.is_empty() {
            debug!("enum unboxing: dropped {} candidates", removed.len());
        }
    }

    /// Forgets a method removed by another optimization.
    pub fn on_method_pruned(&self, method: MethodRef) {
        self.candidates.remove_method(method);
        self.library_modeling.remove(&method);
        self.check_not_null.retain(|(m, _)| *m != method);
    }

    /// Rejected enums with their reasons, sorted by canonical name.
    #[must_use]
    pub fn rejections(&self) -> Vec<(TypeRef, Vec<Reason>)> {
        let mut rejected: Vec<(TypeRef, Vec<Reason>)> = self
            .reasons
            .iter()
            .map(|entry| (*entry.key(), entry.value().clone()))
            .collect();
        rejected.sort_by_cached_key(|(ty, _)| self.symbols.source_name(*ty));
        rejected
    }

    /// Finalizes the data, removes the unboxed classes and installs the lens.
    ///
    /// # Errors
    ///
    /// Returns [`Error::EnumsNotUnboxed`] if a required enum was not unboxed,
    /// and an invariant violation if the class structure contradicts the
    /// analysis.
    pub fn unbox_enums(&self, app: &mut AppView, ctx: &CompilerContext) -> Result<UnboxingPlan> {
        let data = self.finish_analysis(app, &ctx.events);
        self.check_required(app.symbols(), &data)?;

        let symbols = self.symbols.clone();
        for (ty, reasons) in self.rejections() {
            let described: Vec<String> = reasons.iter().map(|r| r.describe(&symbols)).collect();
            ctx.events
                .record(EventKind::CandidateRejected)
                .class(ty)
                .message(format!("{}: {}", symbols.source_name(ty), described.join(", ")));
        }
        for ty in data.unboxed_types() {
            ctx.events
                .record(EventKind::EnumUnboxed)
                .class(*ty)
                .message(symbols.source_name(*ty));
        }

        if data.is_empty() {
            app.set_unboxed_enums(data);
            return Ok(UnboxingPlan {
                rewriter: EnumUnboxingRewriter::empty(app),
                reprocess: Vec::new(),
                pruned: PrunedItems::new(),
            });
        }

        let data = Arc::new(data);
        let utilities = EnumUnboxingUtilityClasses::synthesize(app, ctx, &data);
        let check_not_null: Vec<(MethodRef, TypeRef)> =
            self.check_not_null.iter().map(|entry| *entry).collect();
        let fixed = EnumUnboxingTreeFixer::new(app, ctx, &data, &utilities, check_not_null).fix()?;

        let mut reprocess: BTreeSet<(String, MethodRef)> = BTreeSet::new();
        let lens = Arc::clone(app.graph_lens());
        let mut add = |method: MethodRef| {
            let current = lens.apply_method(&symbols, method, InvokeKind::Direct).method;
            if ctx.has_ssa(current) && !data.is_unboxed(symbols.method_holder(current)) {
                reprocess.insert((symbols.method_sort_key(current), current));
            }
        };
        for ty in data.unboxed_types() {
            for method in self.candidates.dependencies(*ty) {
                add(method);
            }
        }
        for method in self.library_modeling.iter() {
            add(*method);
        }
        for method in &fixed.touched {
            add(*method);
        }
        let reprocess: Vec<MethodRef> = reprocess.into_iter().map(|(_, m)| m).collect();
        info!(
            "enum unboxing: unboxed {} enums, reprocessing {} methods",
            data.len(),
            reprocess.len()
        );

        app.set_unboxed_enums_arc(Arc::clone(&data));
        Ok(UnboxingPlan {
            rewriter: EnumUnboxingRewriter::new(app, data, utilities, fixed.check_not_zero),
            reprocess,
            pruned: fixed.pruned,
        })
    }

    fn check_required(&self, symbols: &Symbols, data: &EnumDataMap) -> Result<()> {
        let mut missing: Vec<String> = self
            .config
            .required_unboxed
            .iter()
            .filter(|name| !data.is_unboxed(symbols.class(name)))
            .cloned()
            .collect();
        if missing.is_empty() {
            return Ok(());
        }
        missing.sort();
        missing.dedup();
        for name in &missing {
            warn!("required enum {name} was not unboxed");
        }
        Err(Error::EnumsNotUnboxed { classes: missing })
    }
}

/// Runs enum unboxing over the whole program.
///
/// Every method body must already be in `ctx`. On success the unboxed
/// classes are gone, the lens is installed and every affected body has been
/// rewritten.
///
/// # Errors
///
/// Returns [`Error::EnumsNotUnboxed`] if a required enum survived, and any
/// error raised while rewriting a body.
///
/// # Examples
///
/// ```rust,ignore
/// use enumbox::prelude::*;
///
/// let summary = unbox_program(&mut app, &ctx, EnumUnboxingConfig::default())?;
/// for ty in &summary.unboxed {
///     println!("unboxed {}", app.symbols().source_name(*ty));
/// }
/// ```
pub fn unbox_program(
    app: &mut AppView,
    ctx: &CompilerContext,
    config: EnumUnboxingConfig,
) -> Result<UnboxingSummary> {
    if !config.enabled {
        return Ok(UnboxingSummary::default());
    }

    let scheduler = PassScheduler::new(config.wave_size);
    let unboxer = EnumUnboxer::new(app.symbols_arc(), config);
    unboxer.prepare(app, &ctx.events);

    let methods = app.program_methods();
    {
        let mut pass = EnumUnboxingAnalysisPass::new(&unboxer);
        scheduler.run(&mut pass, &methods, ctx, app)?;
    }

    let plan = unboxer.unbox_enums(app, ctx)?;
    {
        let mut pass = EnumUnboxingRewritePass::new(&plan.rewriter);
        scheduler.run(&mut pass, &plan.reprocess, ctx, app)?;
    }
    plan.rewriter.materialize(app, ctx)?;

    let data = Arc::clone(app.unboxed_enums());
    Ok(UnboxingSummary {
        unboxed: data.unboxed_types().to_vec(),
        rejected: unboxer.rejections(),
        pruned: plan.pruned,
        reprocessed: plan.reprocess,
        data,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        program::builder::ProgramBuilder,
        test::{color_enum, init_logging, static_method},
    };

    #[test]
    fn test_pruned_method_is_forgotten() {
        init_logging();
        let mut builder = ProgramBuilder::new();
        let known = builder.known().clone();
        let color = color_enum(&mut builder, &["RED", "GREEN"]);
        let green = color.constant(1);
        let name = static_method(&mut builder, "com.example.Main", "greenName", known.string, &[], |f| {
            f.block(0, |b| {
                let value = b.get_static(green);
                let name = b.call(InvokeKind::Virtual, known.enum_name, &[value]);
                b.ret_val(name);
            });
        });
        let (app, ctx) = builder.build();

        let unboxer = EnumUnboxer::new(app.symbols_arc(), EnumUnboxingConfig::default());
        unboxer.prepare(&app, &ctx.events);
        let ssa = ctx.ssa(name).unwrap();
        unboxer.analyze_method(&app, name, &ssa).unwrap();
        unboxer.update_candidates_info();
        assert_eq!(unboxer.library_modeling_methods(), vec![name]);
        assert!(unboxer.candidates().dependencies(color.ty).contains(&name));

        unboxer.on_method_pruned(name);
        assert!(unboxer.library_modeling_methods().is_empty());
        assert!(!unboxer.candidates().dependencies(color.ty).contains(&name));
        assert!(unboxer.rejections().is_empty());
    }
}
