//! Candidate discovery and the concurrent candidate registry.
//!
//! Every program enum extending `java.lang.Enum` directly starts out as a
//! candidate. Constant body classes join their parent's candidate as
//! subtypes; the parent is the *representative* every analysis result is
//! attributed to.
//!
//! The registry is read and written by the analysis of many methods at once,
//! so all of its state lives in `dashmap` collections.

use dashmap::{mapref::one::Ref, DashMap, DashSet};
use log::debug;

use crate::{
    compiler::{EventKind, EventLog},
    enums::{unboxer::EnumUnboxer, Reason},
    program::{
        app::AppView,
        symbols::{FieldRef, MethodRef, Symbols, TypeRef},
    },
};

/// A candidate enum and what the analysis learned about it so far.
#[derive(Debug)]
pub struct EnumCandidate {
    /// The representative type.
    pub ty: TypeRef,
    /// Constant body classes.
    pub subtypes: DashSet<TypeRef>,
    /// Methods that must be rewritten if the enum is unboxed.
    pub dependencies: DashSet<MethodRef>,
    /// Instance fields some method reads.
    pub required_fields: DashSet<FieldRef>,
}

impl EnumCandidate {
    fn new(ty: TypeRef) -> Self {
        Self {
            ty,
            subtypes: DashSet::new(),
            dependencies: DashSet::new(),
            required_fields: DashSet::new(),
        }
    }
}

/// The set of enums still considered for unboxing.
#[derive(Debug, Default)]
pub struct CandidateRegistry {
    candidates: DashMap<TypeRef, EnumCandidate>,
    subtypes: DashMap<TypeRef, TypeRef>,
    invalidated: DashSet<TypeRef>,
}

impl CandidateRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a representative.
    pub fn add(&self, ty: TypeRef) {
        self.candidates
            .entry(ty)
            .or_insert_with(|| EnumCandidate::new(ty));
    }

    /// Adds a constant body class of `representative`.
    pub fn add_subtype(&self, representative: TypeRef, subtype: TypeRef) {
        if let Some(candidate) = self.candidates.get(&representative) {
            candidate.subtypes.insert(subtype);
            self.subtypes.insert(subtype, representative);
        }
    }

    /// The valid candidate `ty` belongs to.
    #[must_use]
    pub fn representative(&self, ty: TypeRef) -> Option<TypeRef> {
        let rep = if self.candidates.contains_key(&ty) {
            ty
        } else {
            *self.subtypes.get(&ty)?
        };
        (self.candidates.contains_key(&rep) && !self.invalidated.contains(&rep)).then_some(rep)
    }

    /// The valid candidate behind `ty`'s base type.
    #[must_use]
    pub fn representative_of_base(&self, symbols: &Symbols, ty: TypeRef) -> Option<TypeRef> {
        self.representative(symbols.base_type(ty))
    }

    /// Returns `true` if `ty` is a valid representative.
    #[must_use]
    pub fn is_candidate(&self, ty: TypeRef) -> bool {
        self.representative(ty) == Some(ty)
    }

    /// Marks `ty` as not unboxable. Returns `true` the first time.
    pub fn invalidate(&self, ty: TypeRef) -> bool {
        self.candidates.contains_key(&ty) && self.invalidated.insert(ty)
    }

    /// Returns `true` if `ty` was invalidated.
    #[must_use]
    pub fn is_invalidated(&self, ty: TypeRef) -> bool {
        self.invalidated.contains(&ty)
    }

    /// Drops every invalidated candidate, returning them.
    pub fn remove_invalidated(&self) -> Vec<TypeRef> {
        let removed: Vec<TypeRef> = self.invalidated.iter().map(|t| *t).collect();
        for ty in &removed {
            if let Some((_, candidate)) = self.candidates.remove(ty) {
                for sub in candidate.subtypes.iter() {
                    self.subtypes.remove(&*sub);
                }
            }
        }
        removed
    }

    /// Records that `method` must be rewritten if `representative` is unboxed.
    pub fn add_dependency(&self, representative: TypeRef, method: MethodRef) {
        if let Some(candidate) = self.candidates.get(&representative) {
            candidate.dependencies.insert(method);
        }
    }

    /// Records that some method reads `field` of `representative`.
    pub fn add_required_field(&self, representative: TypeRef, field: FieldRef) {
        if let Some(candidate) = self.candidates.get(&representative) {
            candidate.required_fields.insert(field);
        }
    }

    /// Forgets `method` as a dependency of every candidate.
    pub fn remove_method(&self, method: MethodRef) {
        for candidate in self.candidates.iter() {
            candidate.dependencies.remove(&method);
        }
    }

    /// Access to one candidate.
    #[must_use]
    pub fn get(&self, ty: TypeRef) -> Option<Ref<'_, TypeRef, EnumCandidate>> {
        self.candidates.get(&ty)
    }

    /// Dependencies of `representative`.
    #[must_use]
    pub fn dependencies(&self, representative: TypeRef) -> Vec<MethodRef> {
        self.candidates
            .get(&representative)
            .map(|c| c.dependencies.iter().map(|m| *m).collect())
            .unwrap_or_default()
    }

    /// Required fields of `representative`, sorted.
    #[must_use]
    pub fn required_fields(&self, symbols: &Symbols, representative: TypeRef) -> Vec<FieldRef> {
        let mut fields: Vec<FieldRef> = self
            .candidates
            .get(&representative)
            .map(|c| c.required_fields.iter().map(|f| *f).collect())
            .unwrap_or_default();
        fields.sort_by_cached_key(|f| symbols.field_sort_key(*f));
        fields
    }

    /// Subtypes of `representative`, sorted.
    #[must_use]
    pub fn subtypes_of(&self, symbols: &Symbols, representative: TypeRef) -> Vec<TypeRef> {
        let mut subs: Vec<TypeRef> = self
            .candidates
            .get(&representative)
            .map(|c| c.subtypes.iter().map(|t| *t).collect())
            .unwrap_or_default();
        subs.sort_by_cached_key(|t| symbols.source_name(*t));
        subs
    }

    /// Every representative, valid or not, sorted by canonical name.
    #[must_use]
    pub fn all_types(&self, symbols: &Symbols) -> Vec<TypeRef> {
        let mut types: Vec<TypeRef> = self.candidates.iter().map(|c| *c.key()).collect();
        types.sort_by_cached_key(|t| symbols.source_name(*t));
        types
    }

    /// Valid representatives, sorted by canonical name.
    #[must_use]
    pub fn types(&self, symbols: &Symbols) -> Vec<TypeRef> {
        let mut types = self.all_types(symbols);
        types.retain(|t| !self.invalidated.contains(t));
        types
    }

    /// Number of representatives, invalidated ones included.
    #[must_use]
    pub fn len(&self) -> usize {
        self.candidates.len()
    }

    /// Returns `true` if there are no candidates.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.candidates.is_empty()
    }
}

impl EnumUnboxer {
    /// Seeds the registry from the class hierarchy and the keep rules.
    pub(crate) fn find_candidates(&self, app: &AppView, events: &EventLog) {
        let symbols = app.symbols();
        let known = app.known();
        let classes = app.program_classes();

        for class in classes
            .iter()
            .filter(|c| c.is_enum() && c.super_type == Some(known.enum_type))
        {
            self.candidates.add(class.ty);
            events
                .record(EventKind::CandidateFound)
                .class(class.ty)
                .message(symbols.source_name(class.ty));
            debug!("enum unboxing candidate: {}", symbols.source_name(class.ty));
            if class.instance_fields().count() > self.config.max_instance_fields {
                self.report_failure(class.ty, Reason::ManyInstanceFields);
            }
        }

        for class in classes.iter().filter(|c| c.is_enum()) {
            let Some(parent) = class.super_type else {
                continue;
            };
            if parent == known.enum_type {
                continue;
            }
            if self.candidates.get(parent).is_some() {
                if !self.config.allow_subtypes {
                    self.report_failure(parent, Reason::SubtypesDisabled);
                } else if class.instance_fields().next().is_some()
                    || !app.direct_subclasses(class.ty).is_empty()
                {
                    self.report_failure(parent, Reason::InvalidSubtype);
                } else {
                    self.candidates.add_subtype(parent, class.ty);
                }
                continue;
            }
            // Deeper than one level below a candidate.
            let mut current = app.class(parent).and_then(|c| c.super_type);
            while let Some(ty) = current {
                if self.candidates.get(ty).is_some() {
                    self.report_failure(ty, Reason::InvalidSubtype);
                    break;
                }
                current = app.class(ty).and_then(|c| c.super_type);
            }
        }

        for class in classes.iter().filter(|c| c.is_annotation()) {
            for method in &class.methods {
                let ret = symbols.proto_data(symbols.method_proto(method.method)).ret;
                if let Some(rep) = self.candidates.representative_of_base(symbols, ret) {
                    self.report_failure(rep, Reason::Annotation);
                }
            }
        }

        self.find_pinned(app);
    }

    fn find_pinned(&self, app: &AppView) {
        let symbols = app.symbols();
        let keep = app.keep();

        for ty in self.candidates.all_types(symbols) {
            let pinned = keep.is_type_pinned(ty)
                || self
                    .candidates
                    .subtypes_of(symbols, ty)
                    .into_iter()
                    .any(|sub| keep.is_type_pinned(sub));
            if pinned {
                self.report_failure(ty, Reason::Pinned);
            }
        }

        let mut fields: Vec<FieldRef> = keep.pinned_fields().collect();
        fields.sort_by_cached_key(|f| symbols.field_sort_key(*f));
        for field in fields {
            let holder = self.candidates.representative(symbols.field_holder(field));
            let ty = symbols.field_type(field);
            if let Some(rep) = self.candidates.representative_of_base(symbols, ty) {
                if holder != Some(rep) {
                    self.report_failure(rep, Reason::Pinned);
                }
            }
        }

        let mut methods: Vec<MethodRef> = keep.pinned_methods().collect();
        methods.sort_by_cached_key(|m| symbols.method_sort_key(*m));
        for method in methods {
            let holder = self.candidates.representative(symbols.method_holder(method));
            let data = symbols.proto_data(symbols.method_proto(method));
            for ty in std::iter::once(data.ret).chain(data.params.iter().copied()) {
                if let Some(rep) = self.candidates.representative_of_base(symbols, ty) {
                    if holder != Some(rep) {
                        self.report_failure(rep, Reason::Pinned);
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_registry_lifecycle() {
        let symbols = Symbols::new();
        let color = symbols.class("com.example.Color");
        let body = symbols.class("com.example.Color$1");
        let main = symbols.class("com.example.Main");
        let run = symbols.method(main, "run", symbols.proto(symbols.ty("V"), &[]));

        let registry = CandidateRegistry::new();
        registry.add(color);
        registry.add_subtype(color, body);
        registry.add_dependency(color, run);

        assert_eq!(registry.representative(body), Some(color));
        assert!(registry.is_candidate(color));
        assert!(!registry.is_candidate(body));
        assert_eq!(registry.dependencies(color), vec![run]);

        registry.remove_method(run);
        assert!(registry.dependencies(color).is_empty());

        assert!(registry.invalidate(color));
        assert!(!registry.invalidate(color));
        assert_eq!(registry.representative(body), None);
        assert_eq!(registry.remove_invalidated(), vec![color]);
        assert!(registry.is_empty());
    }

    #[test]
    fn test_invalidating_unknown_type_is_ignored() {
        let symbols = Symbols::new();
        let registry = CandidateRegistry::new();
        assert!(!registry.invalidate(symbols.class("com.example.Nothing")));
        assert!(registry.types(&symbols).is_empty());
    }
}
