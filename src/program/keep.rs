//! Keep (pinning) information.
//!
//! Items pinned by keep rules or by reflective access must survive
//! optimization with their original names and signatures. The unboxer treats
//! a pinned enum type, or a pinned member whose signature mentions it, as a
//! hard reason not to unbox.

use std::collections::HashSet;

use crate::program::symbols::{FieldRef, MethodRef, TypeRef};

/// Items removed from the program by an optimization.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PrunedItems {
    /// Classes removed entirely.
    pub classes: HashSet<TypeRef>,
    /// Fields removed.
    pub fields: HashSet<FieldRef>,
    /// Methods removed (moved methods count as removed under their old reference).
    pub methods: HashSet<MethodRef>,
}

impl PrunedItems {
    /// Creates an empty set.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns `true` if nothing was pruned.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.classes.is_empty() && self.fields.is_empty() && self.methods.is_empty()
    }

    /// Returns `true` if `method` was pruned.
    #[must_use]
    pub fn is_method_pruned(&self, method: MethodRef) -> bool {
        self.methods.contains(&method)
    }
}

/// Pinned types and members.
#[derive(Debug, Clone, Default)]
pub struct KeepInfo {
    types: HashSet<TypeRef>,
    fields: HashSet<FieldRef>,
    methods: HashSet<MethodRef>,
}

impl KeepInfo {
    /// Creates an empty keep set.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Pins a type.
    pub fn pin_type(&mut self, ty: TypeRef) {
        self.types.insert(ty);
    }

    /// Pins a field.
    pub fn pin_field(&mut self, field: FieldRef) {
        self.fields.insert(field);
    }

    /// Pins a method.
    pub fn pin_method(&mut self, method: MethodRef) {
        self.methods.insert(method);
    }

    /// Returns `true` if `ty` is pinned.
    #[must_use]
    pub fn is_type_pinned(&self, ty: TypeRef) -> bool {
        self.types.contains(&ty)
    }

    /// Returns `true` if `field` is pinned.
    #[must_use]
    pub fn is_field_pinned(&self, field: FieldRef) -> bool {
        self.fields.contains(&field)
    }

    /// Returns `true` if `method` is pinned.
    #[must_use]
    pub fn is_method_pinned(&self, method: MethodRef) -> bool {
        self.methods.contains(&method)
    }

    /// Iterates the pinned fields.
    pub fn pinned_fields(&self) -> impl Iterator<Item = FieldRef> + '_ {
        self.fields.iter().copied()
    }

    /// Iterates the pinned methods.
    pub fn pinned_methods(&self) -> impl Iterator<Item = MethodRef> + '_ {
        self.methods.iter().copied()
    }

    /// Drops keep information for everything in `pruned`.
    pub fn remove_pruned(&mut self, pruned: &PrunedItems) {
        self.types.retain(|t| !pruned.classes.contains(t));
        self.fields.retain(|f| !pruned.fields.contains(f));
        self.methods.retain(|m| !pruned.methods.contains(m));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::program::symbols::Symbols;

    #[test]
    fn test_remove_pruned() {
        let symbols = Symbols::new();
        let color = symbols.class("com.example.Color");
        let other = symbols.class("com.example.Other");
        let field = symbols.field(other, "c", color);

        let mut keep = KeepInfo::new();
        keep.pin_type(color);
        keep.pin_type(other);
        keep.pin_field(field);

        let mut pruned = PrunedItems::new();
        pruned.classes.insert(color);
        keep.remove_pruned(&pruned);

        assert!(!keep.is_type_pinned(color));
        assert!(keep.is_type_pinned(other));
        assert!(keep.is_field_pinned(field));
    }
}
