//! Finalized data of the unboxed enums.
//!
//! After the analysis, every enum that survived is described by an
//! [`EnumData`]: the int each constant becomes, what its instance fields hold
//! per ordinal, and which constant is an instance of which subtype. The
//! tree fixer and the rewriter consult only this data; the class itself is
//! gone by the time they run.

use std::collections::{BTreeMap, HashMap, HashSet};

use crate::program::{
    symbols::{FieldRef, Symbols, TypeRef},
    value::AbstractValue,
};

/// Returns the int an unboxed constant with `ordinal` becomes.
///
/// Zero stands for `null`, so every constant is shifted by one.
#[must_use]
pub fn unboxed_value(ordinal: usize) -> i32 {
    i32::try_from(ordinal).map_or(i32::MAX, |o| o.saturating_add(1))
}

/// What an instance field holds for each constant.
#[derive(Debug, Clone, PartialEq)]
pub enum InstanceFieldData {
    /// The field is an `int` equal to the constant's ordinal.
    OrdinalDerived,
    /// The value per ordinal.
    Mapping(BTreeMap<usize, AbstractValue>),
}

impl InstanceFieldData {
    /// Returns the value of the field for `ordinal`.
    #[must_use]
    pub fn value(&self, ordinal: usize) -> Option<AbstractValue> {
        match self {
            Self::OrdinalDerived => i64::try_from(ordinal).ok().map(AbstractValue::Number),
            Self::Mapping(mapping) => mapping.get(&ordinal).cloned(),
        }
    }

    /// Returns `true` for [`InstanceFieldData::OrdinalDerived`].
    #[must_use]
    pub fn is_ordinal_derived(&self) -> bool {
        matches!(self, Self::OrdinalDerived)
    }
}

/// The data of one unboxed enum.
#[derive(Debug, Clone, Default)]
pub struct EnumData {
    instance_fields: HashMap<FieldRef, InstanceFieldData>,
    subtype_by_ordinal: Option<BTreeMap<usize, TypeRef>>,
    unboxed_values: HashMap<FieldRef, i32>,
    values_fields: HashSet<FieldRef>,
    values_size: Option<usize>,
}

impl EnumData {
    /// Creates enum data.
    ///
    /// # Arguments
    ///
    /// * `instance_fields` - Data of every instance field some method reads
    /// * `subtype_by_ordinal` - Exact class per ordinal, only for enums with subtypes
    /// * `unboxed_values` - The int of every static field holding a constant
    /// * `values_fields` - The `$VALUES`-shaped static fields
    /// * `values_size` - Element count of `$VALUES`, if the enum has one
    #[must_use]
    pub fn new(
        instance_fields: HashMap<FieldRef, InstanceFieldData>,
        subtype_by_ordinal: Option<BTreeMap<usize, TypeRef>>,
        unboxed_values: HashMap<FieldRef, i32>,
        values_fields: HashSet<FieldRef>,
        values_size: Option<usize>,
    ) -> Self {
        Self {
            instance_fields,
            subtype_by_ordinal,
            unboxed_values,
            values_fields,
            values_size,
        }
    }

    /// Data of an instance field, if any method reads it.
    #[must_use]
    pub fn instance_field(&self, field: FieldRef) -> Option<&InstanceFieldData> {
        self.instance_fields.get(&field)
    }

    /// Instance fields with data.
    pub fn instance_fields(&self) -> impl Iterator<Item = (&FieldRef, &InstanceFieldData)> {
        self.instance_fields.iter()
    }

    /// The int a constant field is replaced with.
    #[must_use]
    pub fn unboxed_value(&self, field: FieldRef) -> Option<i32> {
        self.unboxed_values.get(&field).copied()
    }

    /// Returns `true` if `field` holds one of the enum's constants.
    #[must_use]
    pub fn is_enum_instance_field(&self, field: FieldRef) -> bool {
        self.unboxed_values.contains_key(&field)
    }

    /// Static fields holding constants.
    pub fn enum_instance_fields(&self) -> impl Iterator<Item = FieldRef> + '_ {
        self.unboxed_values.keys().copied()
    }

    /// Returns `true` if `field` is one of the enum's `$VALUES` fields.
    #[must_use]
    pub fn is_values_field(&self, field: FieldRef) -> bool {
        self.values_fields.contains(&field)
    }

    /// The `$VALUES`-shaped static fields.
    pub fn values_fields(&self) -> impl Iterator<Item = FieldRef> + '_ {
        self.values_fields.iter().copied()
    }

    /// Element count of `$VALUES`.
    #[must_use]
    pub fn values_size(&self) -> Option<usize> {
        self.values_size
    }

    /// Returns `true` if the enum had constant bodies.
    #[must_use]
    pub fn has_subtypes(&self) -> bool {
        self.subtype_by_ordinal.is_some()
    }

    /// The exact class of the constant with `ordinal`.
    #[must_use]
    pub fn subtype_for_ordinal(&self, ordinal: usize) -> Option<TypeRef> {
        self.subtype_by_ordinal.as_ref()?.get(&ordinal).copied()
    }

    /// Exact classes of the constants, by ordinal.
    #[must_use]
    pub fn subtype_by_ordinal(&self) -> Option<&BTreeMap<usize, TypeRef>> {
        self.subtype_by_ordinal.as_ref()
    }

    /// Ordinals of all constants known to exist, ascending.
    #[must_use]
    pub fn live_ordinals(&self) -> Vec<usize> {
        let mut ordinals: Vec<usize> = self
            .unboxed_values
            .values()
            .filter_map(|v| usize::try_from(*v).ok())
            .map(|v| v - 1)
            .collect();
        if let Some(size) = self.values_size {
            ordinals.extend(0..size);
        }
        ordinals.sort_unstable();
        ordinals.dedup();
        ordinals
    }
}

/// The data of all unboxed enums, keyed by representative.
///
/// Representatives are kept in insertion order, which the finalization makes
/// the sorted order of their canonical names.
#[derive(Debug, Default)]
pub struct EnumDataMap {
    order: Vec<TypeRef>,
    data: HashMap<TypeRef, EnumData>,
    representatives: HashMap<TypeRef, TypeRef>,
}

impl EnumDataMap {
    /// A map without enums.
    #[must_use]
    pub fn empty() -> Self {
        Self::default()
    }

    /// Adds an unboxed enum.
    pub fn insert(&mut self, ty: TypeRef, data: EnumData) {
        if self.data.insert(ty, data).is_none() {
            self.order.push(ty);
        }
        self.representatives.insert(ty, ty);
    }

    /// Records `subtype` as a constant body class of `representative`.
    pub fn add_subtype(&mut self, subtype: TypeRef, representative: TypeRef) {
        self.representatives.insert(subtype, representative);
    }

    /// The representative of an unboxed enum or one of its subtypes.
    #[must_use]
    pub fn representative(&self, ty: TypeRef) -> Option<TypeRef> {
        self.representatives.get(&ty).copied()
    }

    /// Returns `true` if `ty` is an unboxed enum or subtype of one.
    #[must_use]
    pub fn is_unboxed(&self, ty: TypeRef) -> bool {
        self.representatives.contains_key(&ty)
    }

    /// The data of the enum `ty` belongs to.
    #[must_use]
    pub fn data(&self, ty: TypeRef) -> Option<&EnumData> {
        self.data.get(&self.representative(ty)?)
    }

    /// Representatives, in insertion order.
    #[must_use]
    pub fn unboxed_types(&self) -> &[TypeRef] {
        &self.order
    }

    /// Representatives and subtypes.
    pub fn all_unboxed_types(&self) -> impl Iterator<Item = TypeRef> + '_ {
        self.representatives.keys().copied()
    }

    /// Subtypes of `representative`, unsorted.
    pub fn subtypes_of(&self, representative: TypeRef) -> impl Iterator<Item = TypeRef> + '_ {
        self.representatives
            .iter()
            .filter(move |(sub, rep)| **rep == representative && **sub != representative)
            .map(|(sub, _)| *sub)
    }

    /// Number of unboxed enums.
    #[must_use]
    pub fn len(&self) -> usize {
        self.order.len()
    }

    /// Returns `true` if no enum is unboxed.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    /// The largest `$VALUES` element count over all enums.
    #[must_use]
    pub fn max_values_size(&self) -> usize {
        self.data
            .values()
            .filter_map(EnumData::values_size)
            .max()
            .unwrap_or(0)
    }

    /// The representative behind `ty`'s base type, arrays included.
    #[must_use]
    pub fn representative_of_base(&self, symbols: &Symbols, ty: TypeRef) -> Option<TypeRef> {
        self.representative(symbols.base_type(ty))
    }

    /// Returns `true` if `ty` is an unboxed enum or an array of one.
    #[must_use]
    pub fn is_unboxed_type_or_array(&self, symbols: &Symbols, ty: TypeRef) -> bool {
        self.representative_of_base(symbols, ty).is_some()
    }
}
