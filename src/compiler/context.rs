//! Compiler context for whole-program optimization.
//!
//! The [`CompilerContext`] holds the method bodies and the cross-method
//! state passes share while they run in parallel.

use std::time::{Duration, Instant};

use dashmap::{DashMap, DashSet};

use crate::{
    analysis::SsaFunction, compiler::events::EventLog, program::symbols::MethodRef,
};

/// Compiler context for the SSA pipeline.
///
/// All collection fields use thread-safe types so that methods can be
/// processed concurrently.
pub struct CompilerContext {
    /// SSA form for each method with a body.
    pub ssa_functions: DashMap<MethodRef, SsaFunction>,

    /// Accumulated events from all passes and operations.
    pub events: EventLog,

    /// Methods whose bodies were changed by a pass.
    pub processed_methods: DashSet<MethodRef>,

    /// Methods whose shape must be preserved because library modeling
    /// depends on it.
    pub no_peephole: DashSet<MethodRef>,

    start_time: Instant,
}

impl Default for CompilerContext {
    fn default() -> Self {
        Self::new()
    }
}

impl CompilerContext {
    /// Creates an empty compiler context.
    #[must_use]
    pub fn new() -> Self {
        Self {
            ssa_functions: DashMap::new(),
            events: EventLog::new(),
            processed_methods: DashSet::new(),
            no_peephole: DashSet::new(),
            start_time: Instant::now(),
        }
    }

    /// Returns the elapsed time since the context was created.
    #[must_use]
    pub fn elapsed(&self) -> Duration {
        self.start_time.elapsed()
    }

    // ── SSA function access ─────────────────────────────────────────────

    /// Executes a closure with a reference to the SSA function.
    pub fn with_ssa<R, F>(&self, method: MethodRef, f: F) -> Option<R>
    where
        F: FnOnce(&SsaFunction) -> R,
    {
        self.ssa_functions.get(&method).map(|r| f(&r))
    }

    /// Executes a closure with a mutable reference to the SSA function.
    pub fn with_ssa_mut<R, F>(&self, method: MethodRef, f: F) -> Option<R>
    where
        F: FnOnce(&mut SsaFunction) -> R,
    {
        self.ssa_functions.get_mut(&method).map(|mut r| f(&mut r))
    }

    /// Checks if an SSA function exists for a method.
    #[must_use]
    pub fn has_ssa(&self, method: MethodRef) -> bool {
        self.ssa_functions.contains_key(&method)
    }

    /// Stores an SSA function for a method.
    pub fn set_ssa(&self, method: MethodRef, ssa: SsaFunction) {
        self.ssa_functions.insert(method, ssa);
    }

    /// Removes and returns the SSA function for a method.
    pub fn take_ssa(&self, method: MethodRef) -> Option<SsaFunction> {
        self.ssa_functions.remove(&method).map(|(_, v)| v)
    }

    /// Returns a copy of the SSA function for a method.
    #[must_use]
    pub fn ssa(&self, method: MethodRef) -> Option<SsaFunction> {
        self.with_ssa(method, SsaFunction::clone)
    }

    /// Returns an iterator over all methods that have SSA functions.
    pub fn all_methods(&self) -> impl Iterator<Item = MethodRef> + '_ {
        self.ssa_functions.iter().map(|r| *r.key())
    }

    /// Returns the count of methods with SSA representations.
    #[must_use]
    pub fn method_count(&self) -> usize {
        self.ssa_functions.len()
    }

    // ── Method state ────────────────────────────────────────────────────

    /// Marks a method as changed.
    pub fn mark_processed(&self, method: MethodRef) {
        self.processed_methods.insert(method);
    }

    /// Returns `true` if a pass changed the method.
    #[must_use]
    pub fn is_processed(&self, method: MethodRef) -> bool {
        self.processed_methods.contains(&method)
    }

    /// Forbids shape-changing peephole rewrites of a method.
    pub fn disable_peephole(&self, method: MethodRef) {
        self.no_peephole.insert(method);
    }

    /// Returns `true` if peephole rewrites of the method are forbidden.
    #[must_use]
    pub fn is_peephole_disabled(&self, method: MethodRef) -> bool {
        self.no_peephole.contains(&method)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::program::symbols::Symbols;

    #[test]
    fn test_take_and_reinsert() {
        let symbols = Symbols::new();
        let void = symbols.ty("V");
        let holder = symbols.class("com.example.Main");
        let m = symbols.method(holder, "run", symbols.proto(void, &[]));

        let ctx = CompilerContext::new();
        ctx.set_ssa(m, SsaFunction::new());
        assert!(ctx.has_ssa(m));

        let ssa = ctx.take_ssa(m).unwrap();
        assert!(!ctx.has_ssa(m));
        ctx.set_ssa(m, ssa);
        assert_eq!(ctx.method_count(), 1);
        assert_eq!(ctx.with_ssa(m, SsaFunction::block_count), Some(0));
    }

    #[test]
    fn test_method_state_sets() {
        let symbols = Symbols::new();
        let void = symbols.ty("V");
        let holder = symbols.class("com.example.Main");
        let m = symbols.method(holder, "run", symbols.proto(void, &[]));

        let ctx = CompilerContext::new();
        assert!(!ctx.is_processed(m));
        assert!(!ctx.is_peephole_disabled(m));
        ctx.mark_processed(m);
        ctx.disable_peephole(m);
        assert!(ctx.is_processed(m));
        assert!(ctx.is_peephole_disabled(m));
    }
}
