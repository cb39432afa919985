//! The whole-program view.
//!
//! [`AppView`] owns the class graph, the keep info, the current lens chain
//! and the installed enum data. Method bodies are not part of it: they live in
//! [`crate::compiler::CompilerContext`] so that the scheduler can hand them to
//! worker threads while the view is shared read-only.

use std::{
    collections::{HashMap, HashSet, VecDeque},
    sync::Arc,
};

use crate::{
    analysis::ssa::InvokeKind,
    enums::EnumDataMap,
    program::{
        class::{AccessFlags, ClassDef, FieldDef, MethodDef},
        keep::KeepInfo,
        known::KnownRefs,
        lens::GraphLens,
        library::library_classes,
        symbols::{FieldRef, MethodRef, Symbols, TypeRef},
    },
};

/// The whole program: classes, keep info, lens chain and unboxed enum data.
#[derive(Debug)]
pub struct AppView {
    symbols: Arc<Symbols>,
    known: KnownRefs,
    classes: HashMap<TypeRef, ClassDef>,
    keep: KeepInfo,
    lens: Arc<GraphLens>,
    unboxed_enums: Arc<EnumDataMap>,
}

impl AppView {
    /// Creates a view holding only the modeled library classes.
    #[must_use]
    pub fn new(symbols: Arc<Symbols>) -> Self {
        let known = KnownRefs::new(&symbols);
        let classes = library_classes(&symbols, &known)
            .into_iter()
            .map(|c| (c.ty, c))
            .collect();
        Self {
            symbols,
            known,
            classes,
            keep: KeepInfo::new(),
            lens: GraphLens::identity(),
            unboxed_enums: Arc::new(EnumDataMap::empty()),
        }
    }

    /// The symbol table.
    #[must_use]
    pub fn symbols(&self) -> &Symbols {
        &self.symbols
    }

    /// A shared handle to the symbol table.
    #[must_use]
    pub fn symbols_arc(&self) -> Arc<Symbols> {
        Arc::clone(&self.symbols)
    }

    /// Well-known library references.
    #[must_use]
    pub fn known(&self) -> &KnownRefs {
        &self.known
    }

    // ── Classes ─────────────────────────────────────────────────────────

    /// Looks up a class definition.
    #[must_use]
    pub fn class(&self, ty: TypeRef) -> Option<&ClassDef> {
        self.classes.get(&ty)
    }

    /// Looks up a class definition mutably.
    pub fn class_mut(&mut self, ty: TypeRef) -> Option<&mut ClassDef> {
        self.classes.get_mut(&ty)
    }

    /// Adds (or replaces) a class definition.
    pub fn add_class(&mut self, class: ClassDef) {
        self.classes.insert(class.ty, class);
    }

    /// Removes a class definition.
    pub fn remove_class(&mut self, ty: TypeRef) -> Option<ClassDef> {
        self.classes.remove(&ty)
    }

    /// Returns `true` if `ty` is a program class.
    #[must_use]
    pub fn is_program_class(&self, ty: TypeRef) -> bool {
        self.class(ty).is_some_and(ClassDef::is_program)
    }

    /// Program classes, sorted by canonical name.
    #[must_use]
    pub fn program_classes(&self) -> Vec<&ClassDef> {
        let mut classes: Vec<&ClassDef> =
            self.classes.values().filter(|c| c.is_program()).collect();
        classes.sort_by_cached_key(|c| self.symbols.source_name(c.ty));
        classes
    }

    /// Every non-abstract program method, sorted canonically.
    #[must_use]
    pub fn program_methods(&self) -> Vec<MethodRef> {
        let mut methods: Vec<MethodRef> = self
            .classes
            .values()
            .filter(|c| c.is_program())
            .flat_map(|c| c.methods.iter())
            .filter(|m| !m.is_abstract())
            .map(|m| m.method)
            .collect();
        methods.sort_by_cached_key(|m| self.symbols.method_sort_key(*m));
        methods
    }

    // ── Definitions ─────────────────────────────────────────────────────

    /// Returns the definition a method reference names exactly.
    #[must_use]
    pub fn method_definition(&self, method: MethodRef) -> Option<&MethodDef> {
        self.class(self.symbols.method_holder(method))?.method(method)
    }

    /// Returns the definition a method reference names exactly, mutably.
    pub fn method_definition_mut(&mut self, method: MethodRef) -> Option<&mut MethodDef> {
        let holder = self.symbols.method_holder(method);
        self.class_mut(holder)?.method_mut(method)
    }

    /// Returns the definition a field reference names exactly.
    #[must_use]
    pub fn field_definition(&self, field: FieldRef) -> Option<&FieldDef> {
        self.class(self.symbols.field_holder(field))?.field(field)
    }

    /// Returns the definition a field reference names exactly, mutably.
    pub fn field_definition_mut(&mut self, field: FieldRef) -> Option<&mut FieldDef> {
        let holder = self.symbols.field_holder(field);
        self.class_mut(holder)?
            .fields
            .iter_mut()
            .find(|f| f.field == field)
    }

    // ── Resolution ──────────────────────────────────────────────────────

    /// Resolves a method reference: the holder, then up the superclass
    /// chain, then through the interfaces of that chain.
    #[must_use]
    pub fn resolve_method(&self, method: MethodRef) -> Option<&MethodDef> {
        let holder = self.symbols.method_holder(method);
        self.resolve_method_from(holder, method)
    }

    fn resolve_method_from(&self, start: TypeRef, method: MethodRef) -> Option<&MethodDef> {
        let mut interfaces = VecDeque::new();
        let mut current = Some(start);
        while let Some(ty) = current {
            let class = self.class(ty)?;
            if let Some(def) = class.method_by_signature(&self.symbols, method) {
                return Some(def);
            }
            interfaces.extend(class.interfaces.iter().copied());
            current = class.super_type;
        }

        let mut seen = HashSet::new();
        while let Some(ty) = interfaces.pop_front() {
            if !seen.insert(ty) {
                continue;
            }
            let Some(class) = self.class(ty) else {
                continue;
            };
            if let Some(def) = class.method_by_signature(&self.symbols, method) {
                return Some(def);
            }
            interfaces.extend(class.interfaces.iter().copied());
        }
        None
    }

    /// Returns the single method an invoke can dispatch to, if there is one.
    ///
    /// Static, direct and super invokes target their resolution result. A
    /// virtual or interface invoke resolves from `receiver` (or the holder)
    /// and only has a single target if nothing below the receiver overrides
    /// the resolved method.
    #[must_use]
    pub fn single_target(
        &self,
        method: MethodRef,
        kind: InvokeKind,
        receiver: Option<TypeRef>,
    ) -> Option<&MethodDef> {
        match kind {
            InvokeKind::Static | InvokeKind::Direct | InvokeKind::Super => {
                self.resolve_method(method)
            }
            InvokeKind::Virtual | InvokeKind::Interface => {
                let receiver = receiver
                    .filter(|r| self.symbols.is_class(*r) && self.class(*r).is_some())
                    .unwrap_or_else(|| self.symbols.method_holder(method));
                let resolved = self.resolve_method_from(receiver, method)?;
                if resolved.flags.contains(AccessFlags::FINAL)
                    || !resolved.is_virtual(&self.symbols)
                {
                    return Some(resolved);
                }
                let holder_is_final = self
                    .class(self.symbols.method_holder(resolved.method))
                    .is_some_and(|c| c.flags.contains(AccessFlags::FINAL));
                if holder_is_final {
                    return Some(resolved);
                }
                let overridden = self.subtypes(receiver).into_iter().any(|sub| {
                    self.class(sub).is_some_and(|c| {
                        c.method_by_signature(&self.symbols, method)
                            .is_some_and(|m| m.method != resolved.method && !m.is_abstract())
                    })
                });
                if overridden {
                    None
                } else {
                    Some(resolved)
                }
            }
        }
    }

    /// Resolves a field reference up the superclass chain.
    #[must_use]
    pub fn resolve_field(&self, field: FieldRef) -> Option<&FieldDef> {
        let mut current = Some(self.symbols.field_holder(field));
        while let Some(ty) = current {
            let class = self.class(ty)?;
            if let Some(def) = class.field_by_name(&self.symbols, field) {
                return Some(def);
            }
            current = class.super_type;
        }
        None
    }

    // ── Hierarchy ───────────────────────────────────────────────────────

    /// Returns `true` if `sub` is `sup` or inherits from it.
    #[must_use]
    pub fn is_subtype(&self, sub: TypeRef, sup: TypeRef) -> bool {
        if sub == sup || sup == self.known.object {
            return true;
        }
        let mut pending = vec![sub];
        let mut seen = HashSet::new();
        while let Some(ty) = pending.pop() {
            if ty == sup {
                return true;
            }
            if !seen.insert(ty) {
                continue;
            }
            if let Some(class) = self.class(ty) {
                pending.extend(class.super_type);
                pending.extend(class.interfaces.iter().copied());
            }
        }
        false
    }

    /// Classes whose direct superclass is `ty`, sorted by canonical name.
    #[must_use]
    pub fn direct_subclasses(&self, ty: TypeRef) -> Vec<TypeRef> {
        let mut subs: Vec<TypeRef> = self
            .classes
            .values()
            .filter(|c| c.super_type == Some(ty))
            .map(|c| c.ty)
            .collect();
        subs.sort_by_cached_key(|t| self.symbols.source_name(*t));
        subs
    }

    /// Every strict subtype of `ty` (classes and interfaces).
    #[must_use]
    pub fn subtypes(&self, ty: TypeRef) -> Vec<TypeRef> {
        let mut subs: Vec<TypeRef> = self
            .classes
            .values()
            .filter(|c| c.ty != ty && self.is_subtype(c.ty, ty))
            .map(|c| c.ty)
            .collect();
        subs.sort_by_cached_key(|t| self.symbols.source_name(*t));
        subs
    }

    // ── Keep info, lens, enum data ──────────────────────────────────────

    /// Pinned items.
    #[must_use]
    pub fn keep(&self) -> &KeepInfo {
        &self.keep
    }

    /// Pinned items, mutably.
    pub fn keep_mut(&mut self) -> &mut KeepInfo {
        &mut self.keep
    }

    /// The current lens chain.
    #[must_use]
    pub fn graph_lens(&self) -> &Arc<GraphLens> {
        &self.lens
    }

    /// Replaces the lens chain.
    pub fn set_graph_lens(&mut self, lens: Arc<GraphLens>) {
        self.lens = lens;
    }

    /// Data of the enums unboxed so far.
    #[must_use]
    pub fn unboxed_enums(&self) -> &Arc<EnumDataMap> {
        &self.unboxed_enums
    }

    /// Installs the unboxed enum data.
    pub fn set_unboxed_enums(&mut self, data: EnumDataMap) {
        self.unboxed_enums = Arc::new(data);
    }

    /// Installs shared unboxed enum data.
    pub fn set_unboxed_enums_arc(&mut self, data: Arc<EnumDataMap>) {
        self.unboxed_enums = data;
    }
}
