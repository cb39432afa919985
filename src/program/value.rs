//! Abstract values produced by whole-program constant propagation.
//!
//! The enum unboxer never computes these itself. It consumes what the
//! field-value analysis recorded for each enum class: the object state of
//! every enum constant held in a static field, and the per-ordinal contents
//! of the `$VALUES` array.

use std::{collections::HashMap, fmt, sync::Arc};

use crate::program::symbols::{FieldRef, TypeRef};

/// Lattice element describing what is statically known about a value.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum AbstractValue {
    /// Nothing is known.
    #[default]
    Unknown,
    /// The value is always `null`.
    Null,
    /// The value is always this number (any integral primitive).
    Number(i64),
    /// The value is always this string constant.
    String(Arc<str>),
    /// The value is always the object read from this static field.
    SingleField(FieldRef),
}

impl AbstractValue {
    /// Returns `true` if exactly one runtime value is possible.
    #[must_use]
    pub fn is_single_value(&self) -> bool {
        !matches!(self, Self::Unknown)
    }

    /// Returns `true` for a single number or string: the only values an
    /// unboxed enum's instance field data can hold.
    #[must_use]
    pub fn is_number_or_string(&self) -> bool {
        matches!(self, Self::Number(_) | Self::String(_))
    }

    /// Returns the number if this is a single number.
    #[must_use]
    pub fn as_number(&self) -> Option<i64> {
        match self {
            Self::Number(n) => Some(*n),
            _ => None,
        }
    }

    /// Returns the string if this is a single string.
    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(s) => Some(s),
            _ => None,
        }
    }
}

impl fmt::Display for AbstractValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unknown => f.write_str("unknown"),
            Self::Null => f.write_str("null"),
            Self::Number(n) => write!(f, "{n}"),
            Self::String(s) => write!(f, "{s:?}"),
            Self::SingleField(field) => write!(f, "sget {field:?}"),
        }
    }
}

/// Known instance-field values of one object.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ObjectState {
    fields: HashMap<FieldRef, AbstractValue>,
}

static UNKNOWN: AbstractValue = AbstractValue::Unknown;

impl ObjectState {
    /// Creates an empty state (nothing known).
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Records a known field value.
    #[must_use]
    pub fn with(mut self, field: FieldRef, value: AbstractValue) -> Self {
        self.fields.insert(field, value);
        self
    }

    /// Records a known field value in place.
    pub fn set(&mut self, field: FieldRef, value: AbstractValue) {
        self.fields.insert(field, value);
    }

    /// Returns the abstract value of `field`, `Unknown` if nothing is recorded.
    #[must_use]
    pub fn get(&self, field: FieldRef) -> &AbstractValue {
        self.fields.get(&field).unwrap_or(&UNKNOWN)
    }

    /// Returns `true` if no field value is known.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

/// One element of a `$VALUES` array state.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EnumValuesEntry {
    /// Known state of the instance at this ordinal.
    pub state: ObjectState,
    /// Exact runtime class of the instance, if known.
    pub class: Option<TypeRef>,
}

/// Per-ordinal contents of a `$VALUES` array.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EnumValuesObjectState {
    entries: Vec<EnumValuesEntry>,
}

impl EnumValuesObjectState {
    /// Creates a state from per-ordinal entries.
    #[must_use]
    pub fn new(entries: Vec<EnumValuesEntry>) -> Self {
        Self { entries }
    }

    /// Number of elements in the array.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns `true` if the array is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Object state of the instance at `ordinal`.
    #[must_use]
    pub fn state_for_ordinal(&self, ordinal: usize) -> Option<&ObjectState> {
        self.entries.get(ordinal).map(|e| &e.state)
    }

    /// Exact class of the instance at `ordinal`.
    #[must_use]
    pub fn class_for_ordinal(&self, ordinal: usize) -> Option<TypeRef> {
        self.entries.get(ordinal).and_then(|e| e.class)
    }
}

/// Recorded value of one static field of an enum class.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StaticFieldValue {
    /// The field holds an enum instance with this state.
    Object(ObjectState),
    /// The field holds the `$VALUES` array.
    ValuesArray(EnumValuesObjectState),
}

/// Static field values recorded for an enum class.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EnumStaticFieldValues {
    values: HashMap<FieldRef, StaticFieldValue>,
}

impl EnumStaticFieldValues {
    /// Creates an empty record.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Records the value of a static field.
    pub fn insert(&mut self, field: FieldRef, value: StaticFieldValue) {
        self.values.insert(field, value);
    }

    /// Returns the object state recorded for an enum-instance field.
    #[must_use]
    pub fn object_state(&self, field: FieldRef) -> Option<&ObjectState> {
        match self.values.get(&field) {
            Some(StaticFieldValue::Object(state)) => Some(state),
            _ => None,
        }
    }

    /// Returns the array state recorded for a `$VALUES` field.
    #[must_use]
    pub fn values_state(&self, field: FieldRef) -> Option<&EnumValuesObjectState> {
        match self.values.get(&field) {
            Some(StaticFieldValue::ValuesArray(state)) => Some(state),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::program::symbols::Symbols;

    #[test]
    fn test_object_state_defaults_to_unknown() {
        let symbols = Symbols::new();
        let op = symbols.class("com.example.Op");
        let code = symbols.field(op, "code", symbols.ty("I"));

        let state = ObjectState::new();
        assert_eq!(state.get(code), &AbstractValue::Unknown);
        assert!(state.is_empty());

        let state = state.with(code, AbstractValue::Number(7));
        assert_eq!(state.get(code).as_number(), Some(7));
    }

    #[test]
    fn test_single_value_classification() {
        assert!(!AbstractValue::Unknown.is_single_value());
        assert!(AbstractValue::Null.is_single_value());
        assert!(!AbstractValue::Null.is_number_or_string());
        assert!(AbstractValue::String("RED".into()).is_number_or_string());
    }

    #[test]
    fn test_values_state_lookup() {
        let symbols = Symbols::new();
        let color = symbols.class("com.example.Color");
        let values = EnumValuesObjectState::new(vec![
            EnumValuesEntry::default(),
            EnumValuesEntry {
                state: ObjectState::new(),
                class: Some(color),
            },
        ]);
        assert_eq!(values.len(), 2);
        assert_eq!(values.class_for_ordinal(1), Some(color));
        assert!(values.state_for_ordinal(2).is_none());
    }
}
