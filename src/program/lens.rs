//! Graph lenses: layered reference renaming.
//!
//! Whole-program optimizations that change the shape of classes (moving a
//! method, retyping a field, deleting a class) cannot rewrite every method
//! body at the same moment. Instead each such optimization pushes a lens
//! layer describing how old references map to new ones, and method bodies are
//! brought up to date lazily by looking their references up through the
//! chain.
//!
//! ```text
//!   Identity ◄── Rename ◄── EnumUnboxing      (newest)
//!      ▲                        │
//!      └──── lookups walk back ─┘ then apply the newest mapping last
//! ```
//!
//! # Structural Mapping
//!
//! A layer maps types through their base type, so a layer that maps
//! `Color -> int` maps `Color[][]` to `int[][]` as well. Members that a layer
//! does not map explicitly are still rewritten structurally: their holder,
//! field type or prototype is pushed through the type mapping.

use std::{
    collections::{BTreeMap, HashMap},
    fmt,
    sync::Arc,
};

use crate::{
    analysis::ssa::InvokeKind,
    enums::EnumUnboxingLens,
    program::symbols::{FieldRef, MethodRef, Symbols, TypeRef},
};

/// How a method's prototype changed under a lens layer.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RewrittenPrototype {
    /// The method moved from instance to static; its receiver is now the
    /// first parameter.
    pub receiver_became_argument: bool,
    /// Indices (into the new parameter list) of parameters retyped to `int`.
    pub retyped_params: Vec<usize>,
    /// The return type was retyped to `int`.
    pub retyped_return: bool,
    /// Parameters that always receive this unboxed constant.
    pub single_values: BTreeMap<usize, i64>,
}

impl RewrittenPrototype {
    /// Returns `true` if nothing changed.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        !self.receiver_became_argument
            && self.retyped_params.is_empty()
            && !self.retyped_return
            && self.single_values.is_empty()
    }
}

/// Result of looking a method reference up through a lens.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MethodLookup {
    /// The current reference.
    pub method: MethodRef,
    /// The invoke kind to use for the current reference.
    pub kind: InvokeKind,
    /// Prototype changes, if the method was retyped or moved.
    pub prototype: Option<Arc<RewrittenPrototype>>,
}

impl MethodLookup {
    /// A lookup that changed nothing.
    #[must_use]
    pub fn unchanged(method: MethodRef, kind: InvokeKind) -> Self {
        Self {
            method,
            kind,
            prototype: None,
        }
    }
}

/// One layer of reference mapping.
pub trait LensLayer: Send + Sync + fmt::Debug {
    /// Maps a type (arrays through their base type).
    fn map_type(&self, symbols: &Symbols, ty: TypeRef) -> TypeRef;

    /// Maps a field reference.
    fn map_field(&self, symbols: &Symbols, field: FieldRef) -> FieldRef;

    /// Maps a method reference invoked with `kind`.
    fn map_method(&self, symbols: &Symbols, method: MethodRef, kind: InvokeKind) -> MethodLookup;
}

/// Rewrites a field reference by pushing its holder and type through `map`.
pub fn map_field_structurally<F>(symbols: &Symbols, field: FieldRef, map: F) -> FieldRef
where
    F: Fn(TypeRef) -> TypeRef,
{
    let data = symbols.field_data(field).clone();
    let holder = map(data.holder);
    let ty = map(data.ty);
    if holder == data.holder && ty == data.ty {
        field
    } else {
        symbols.field(holder, &data.name, ty)
    }
}

/// Rewrites a method reference by pushing its holder and prototype through `map`.
pub fn map_method_structurally<F>(symbols: &Symbols, method: MethodRef, map: F) -> MethodRef
where
    F: Fn(TypeRef) -> TypeRef,
{
    let data = symbols.method_data(method).clone();
    let proto = symbols.proto_data(data.proto).clone();
    let holder = map(data.holder);
    let ret = map(proto.ret);
    let params: Vec<TypeRef> = proto.params.iter().map(|p| map(*p)).collect();
    if holder == data.holder && ret == proto.ret && params == proto.params {
        method
    } else {
        symbols.method(holder, &data.name, symbols.proto(ret, &params))
    }
}

/// A plain renaming layer (types, fields, methods).
#[derive(Debug, Clone, Default)]
pub struct RenameLens {
    types: HashMap<TypeRef, TypeRef>,
    fields: HashMap<FieldRef, FieldRef>,
    methods: HashMap<MethodRef, MethodRef>,
}

impl RenameLens {
    /// Creates an empty renaming.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Renames a type.
    #[must_use]
    pub fn with_type(mut self, from: TypeRef, to: TypeRef) -> Self {
        self.types.insert(from, to);
        self
    }

    /// Renames a field.
    #[must_use]
    pub fn with_field(mut self, from: FieldRef, to: FieldRef) -> Self {
        self.fields.insert(from, to);
        self
    }

    /// Renames a method.
    #[must_use]
    pub fn with_method(mut self, from: MethodRef, to: MethodRef) -> Self {
        self.methods.insert(from, to);
        self
    }
}

impl LensLayer for RenameLens {
    fn map_type(&self, symbols: &Symbols, ty: TypeRef) -> TypeRef {
        symbols.map_base_type(ty, |base| self.types.get(&base).copied())
    }

    fn map_field(&self, symbols: &Symbols, field: FieldRef) -> FieldRef {
        match self.fields.get(&field) {
            Some(mapped) => *mapped,
            None => map_field_structurally(symbols, field, |t| self.map_type(symbols, t)),
        }
    }

    fn map_method(&self, symbols: &Symbols, method: MethodRef, kind: InvokeKind) -> MethodLookup {
        let mapped = match self.methods.get(&method) {
            Some(mapped) => *mapped,
            None => map_method_structurally(symbols, method, |t| self.map_type(symbols, t)),
        };
        MethodLookup::unchanged(mapped, kind)
    }
}

/// The mapping carried by one lens layer.
#[derive(Debug)]
pub enum LensKind {
    /// Maps everything to itself.
    Identity,
    /// Plain renaming.
    Rename(RenameLens),
    /// Enum unboxing: unboxed types become `int`, enum methods move to
    /// utility classes.
    EnumUnboxing(EnumUnboxingLens),
}

impl LensKind {
    fn layer(&self) -> Option<&dyn LensLayer> {
        match self {
            Self::Identity => None,
            Self::Rename(lens) => Some(lens),
            Self::EnumUnboxing(lens) => Some(lens),
        }
    }
}

/// A persistent chain of lens layers.
#[derive(Debug)]
pub struct GraphLens {
    kind: LensKind,
    previous: Option<Arc<GraphLens>>,
}

impl GraphLens {
    /// Creates the identity lens, the root of every chain.
    #[must_use]
    pub fn identity() -> Arc<Self> {
        Arc::new(Self {
            kind: LensKind::Identity,
            previous: None,
        })
    }

    /// Returns a new chain with `kind` on top of `self`.
    #[must_use]
    pub fn push(self: &Arc<Self>, kind: LensKind) -> Arc<Self> {
        Arc::new(Self {
            kind,
            previous: Some(Arc::clone(self)),
        })
    }

    /// The mapping of this (newest) layer.
    #[must_use]
    pub fn kind(&self) -> &LensKind {
        &self.kind
    }

    /// The previous layer, if any.
    #[must_use]
    pub fn previous(&self) -> Option<&Arc<GraphLens>> {
        self.previous.as_ref()
    }

    /// Number of layers in the chain.
    #[must_use]
    pub fn depth(&self) -> usize {
        1 + self.previous.as_ref().map_or(0, |p| p.depth())
    }

    /// Returns `true` if every layer is the identity.
    #[must_use]
    pub fn is_identity(&self) -> bool {
        matches!(self.kind, LensKind::Identity)
            && self.previous.as_ref().is_none_or(|p| p.is_identity())
    }

    /// Returns the enum unboxing layer at the top of the chain, if it is one.
    #[must_use]
    pub fn enum_unboxing(&self) -> Option<&EnumUnboxingLens> {
        match &self.kind {
            LensKind::EnumUnboxing(lens) => Some(lens),
            _ => None,
        }
    }

    /// Maps a type through the whole chain.
    #[must_use]
    pub fn lookup_type(&self, symbols: &Symbols, ty: TypeRef) -> TypeRef {
        let ty = match &self.previous {
            Some(previous) => previous.lookup_type(symbols, ty),
            None => ty,
        };
        self.apply_type(symbols, ty)
    }

    /// Maps a field through the whole chain.
    #[must_use]
    pub fn lookup_field(&self, symbols: &Symbols, field: FieldRef) -> FieldRef {
        let field = match &self.previous {
            Some(previous) => previous.lookup_field(symbols, field),
            None => field,
        };
        self.apply_field(symbols, field)
    }

    /// Maps a method through the whole chain. Prototype changes of the newest
    /// layer that changed the method win.
    #[must_use]
    pub fn lookup_method(&self, symbols: &Symbols, method: MethodRef, kind: InvokeKind) -> MethodLookup {
        let previous = match &self.previous {
            Some(previous) => previous.lookup_method(symbols, method, kind),
            None => MethodLookup::unchanged(method, kind),
        };
        let mut current = self.apply_method(symbols, previous.method, previous.kind);
        if current.prototype.is_none() {
            current.prototype = previous.prototype;
        }
        current
    }

    /// Maps a type through this layer only.
    #[must_use]
    pub fn apply_type(&self, symbols: &Symbols, ty: TypeRef) -> TypeRef {
        match self.kind.layer() {
            Some(layer) => layer.map_type(symbols, ty),
            None => ty,
        }
    }

    /// Maps a field through this layer only.
    #[must_use]
    pub fn apply_field(&self, symbols: &Symbols, field: FieldRef) -> FieldRef {
        match self.kind.layer() {
            Some(layer) => layer.map_field(symbols, field),
            None => field,
        }
    }

    /// Maps a method through this layer only.
    #[must_use]
    pub fn apply_method(&self, symbols: &Symbols, method: MethodRef, kind: InvokeKind) -> MethodLookup {
        match self.kind.layer() {
            Some(layer) => layer.map_method(symbols, method, kind),
            None => MethodLookup::unchanged(method, kind),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_identity_chain() {
        let symbols = Symbols::new();
        let color = symbols.class("com.example.Color");
        let lens = GraphLens::identity();
        assert!(lens.is_identity());
        assert_eq!(lens.lookup_type(&symbols, color), color);
        assert_eq!(lens.depth(), 1);
    }

    #[test]
    fn test_rename_composes_through_chain() {
        let symbols = Symbols::new();
        let a = symbols.class("com.example.A");
        let b = symbols.class("com.example.B");
        let c = symbols.class("com.example.C");
        let int = symbols.ty("I");

        let lens = GraphLens::identity()
            .push(LensKind::Rename(RenameLens::new().with_type(a, b)))
            .push(LensKind::Rename(RenameLens::new().with_type(b, c)));

        assert_eq!(lens.depth(), 3);
        assert!(!lens.is_identity());
        assert_eq!(lens.lookup_type(&symbols, a), c);

        let arr = symbols.array_of(symbols.array_of(a));
        assert_eq!(symbols.descriptor(lens.lookup_type(&symbols, arr)), "[[Lcom/example/C;");

        let field = symbols.field(a, "x", int);
        let mapped = lens.lookup_field(&symbols, field);
        assert_eq!(symbols.field_holder(mapped), c);

        let method = symbols.method(int_holder(&symbols), "take", symbols.proto(int, &[a]));
        let lookup = lens.lookup_method(&symbols, method, InvokeKind::Static);
        let params = &symbols.proto_data(symbols.method_proto(lookup.method)).params;
        assert_eq!(params, &vec![c]);
        assert_eq!(lookup.kind, InvokeKind::Static);
    }

    fn int_holder(symbols: &Symbols) -> TypeRef {
        symbols.class("com.example.Main")
    }
}
