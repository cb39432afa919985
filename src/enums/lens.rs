//! The enum unboxing lens layer.
//!
//! Unboxed enum types (and arrays of them) become `int`. Enum methods moved
//! to utility classes and members retyped because their signature mentioned
//! an unboxed enum are mapped explicitly. Members of an unboxed class without
//! an explicit mapping (constant fields, `$VALUES`, `ordinal()` and friends)
//! are left untouched so the rewriter still recognizes them.

use std::{
    collections::{HashMap, HashSet},
    sync::Arc,
};

use dashmap::{DashMap, DashSet};

use crate::{
    analysis::ssa::InvokeKind,
    program::{
        lens::{
            map_field_structurally, map_method_structurally, LensLayer, MethodLookup,
            RewrittenPrototype,
        },
        symbols::{FieldRef, MethodRef, Symbols, TypeRef},
    },
};

/// Reference mapping installed by enum unboxing.
#[derive(Debug, Default)]
pub struct EnumUnboxingLens {
    unboxed: HashSet<TypeRef>,
    int: Option<TypeRef>,
    fields: HashMap<FieldRef, FieldRef>,
    methods: HashMap<MethodRef, MethodRef>,
    super_methods: HashMap<MethodRef, MethodRef>,
    prototypes: HashMap<MethodRef, Arc<RewrittenPrototype>>,
    now_static: HashSet<MethodRef>,
}

impl EnumUnboxingLens {
    /// Starts a lens that maps `unboxed` types to `int`.
    #[must_use]
    pub fn builder(unboxed: impl IntoIterator<Item = TypeRef>, int: TypeRef) -> EnumUnboxingLensBuilder {
        EnumUnboxingLensBuilder {
            unboxed: unboxed.into_iter().collect(),
            int,
            fields: DashMap::new(),
            methods: DashMap::new(),
            super_methods: DashMap::new(),
            prototypes: DashMap::new(),
            now_static: DashSet::new(),
        }
    }

    /// Returns `true` if `ty` was unboxed.
    #[must_use]
    pub fn is_unboxed(&self, ty: TypeRef) -> bool {
        self.unboxed.contains(&ty)
    }

    /// The prototype change recorded for the new reference `method`.
    #[must_use]
    pub fn prototype_changes(&self, method: MethodRef) -> Option<&Arc<RewrittenPrototype>> {
        self.prototypes.get(&method)
    }

    /// Returns the explicit mapping of `method`, if any.
    #[must_use]
    pub fn mapped_method(&self, method: MethodRef) -> Option<MethodRef> {
        self.methods.get(&method).copied()
    }

    /// Returns the explicit mapping of `field`, if any.
    #[must_use]
    pub fn mapped_field(&self, field: FieldRef) -> Option<FieldRef> {
        self.fields.get(&field).copied()
    }

    /// Number of explicitly mapped members.
    #[must_use]
    pub fn mapping_count(&self) -> usize {
        self.fields.len() + self.methods.len()
    }

    fn map_type_inner(&self, symbols: &Symbols, ty: TypeRef) -> TypeRef {
        match self.int {
            Some(int) => symbols.map_base_type(ty, |base| self.unboxed.contains(&base).then_some(int)),
            None => ty,
        }
    }
}

impl LensLayer for EnumUnboxingLens {
    fn map_type(&self, symbols: &Symbols, ty: TypeRef) -> TypeRef {
        self.map_type_inner(symbols, ty)
    }

    fn map_field(&self, symbols: &Symbols, field: FieldRef) -> FieldRef {
        if let Some(mapped) = self.fields.get(&field) {
            return *mapped;
        }
        if self.unboxed.contains(&symbols.field_holder(field)) {
            return field;
        }
        map_field_structurally(symbols, field, |t| self.map_type_inner(symbols, t))
    }

    fn map_method(&self, symbols: &Symbols, method: MethodRef, kind: InvokeKind) -> MethodLookup {
        let explicit = if kind == InvokeKind::Super {
            self.super_methods
                .get(&method)
                .or_else(|| self.methods.get(&method))
        } else {
            self.methods.get(&method)
        };
        let mapped = match explicit {
            Some(mapped) => *mapped,
            None if self.unboxed.contains(&symbols.method_holder(method)) => method,
            None => map_method_structurally(symbols, method, |t| self.map_type_inner(symbols, t)),
        };
        let kind = if self.now_static.contains(&mapped) {
            InvokeKind::Static
        } else {
            kind
        };
        MethodLookup {
            method: mapped,
            kind,
            prototype: self.prototypes.get(&mapped).cloned(),
        }
    }
}

/// Collects mappings while the tree fixer runs.
#[derive(Debug)]
pub struct EnumUnboxingLensBuilder {
    unboxed: HashSet<TypeRef>,
    int: TypeRef,
    fields: DashMap<FieldRef, FieldRef>,
    methods: DashMap<MethodRef, MethodRef>,
    super_methods: DashMap<MethodRef, MethodRef>,
    prototypes: DashMap<MethodRef, Arc<RewrittenPrototype>>,
    now_static: DashSet<MethodRef>,
}

impl EnumUnboxingLensBuilder {
    /// Maps a field.
    pub fn map_field(&self, from: FieldRef, to: FieldRef) {
        self.fields.insert(from, to);
    }

    /// Maps a method for every invoke kind but `super`, unless a super
    /// mapping exists.
    pub fn map_method(&self, from: MethodRef, to: MethodRef) {
        self.methods.insert(from, to);
    }

    /// Maps a method for `super` invokes.
    pub fn map_super_method(&self, from: MethodRef, to: MethodRef) {
        self.super_methods.insert(from, to);
    }

    /// Records how the prototype of the new reference `to` changed.
    pub fn record_prototype(&self, to: MethodRef, prototype: RewrittenPrototype) {
        if !prototype.is_empty() {
            self.prototypes.insert(to, Arc::new(prototype));
        }
    }

    /// Marks the new reference `to` as a former instance method.
    pub fn mark_static(&self, to: MethodRef) {
        self.now_static.insert(to);
    }

    /// Maps a type through the lens being built.
    #[must_use]
    pub fn map_type(&self, symbols: &Symbols, ty: TypeRef) -> TypeRef {
        symbols.map_base_type(ty, |base| self.unboxed.contains(&base).then_some(self.int))
    }

    /// Returns `true` if `ty`'s base type is unboxed.
    #[must_use]
    pub fn mentions_unboxed(&self, symbols: &Symbols, ty: TypeRef) -> bool {
        self.unboxed.contains(&symbols.base_type(ty))
    }

    /// Freezes the mappings.
    #[must_use]
    pub fn build(self) -> EnumUnboxingLens {
        EnumUnboxingLens {
            unboxed: self.unboxed,
            int: Some(self.int),
            fields: self.fields.into_iter().collect(),
            methods: self.methods.into_iter().collect(),
            super_methods: self.super_methods.into_iter().collect(),
            prototypes: self.prototypes.into_iter().collect(),
            now_static: self.now_static.into_iter().collect(),
        }
    }
}
