//! SSA type system.
//!
//! `SsaType` is the analysis-level view of a JVM type. Primitive kinds are
//! collapsed the way the bytecode verifier collapses them (`boolean`, `byte`,
//! `short`, `char` and `int` all become [`SsaType::Int`]), while reference
//! types keep their interned [`TypeRef`] so that the unboxer can ask whether a
//! value is a candidate enum or an array of one.
//!
//! # Nullability
//!
//! There are no separate nullable and non-null variants: two reference types
//! are "equal up to nullability" exactly when they carry the same [`TypeRef`].
//! The literal `null` has its own type, [`SsaType::Null`], which is assignable
//! to every reference type.

use std::fmt;

use crate::program::symbols::{Symbols, TypeRef};

/// Type of an SSA variable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum SsaType {
    /// No value (`void` return).
    Void,
    /// 32-bit integer, also used for `boolean`, `byte`, `short` and `char`.
    Int,
    /// 64-bit integer.
    Long,
    /// 32-bit float.
    Float,
    /// 64-bit float.
    Double,
    /// The `null` literal.
    Null,
    /// A class or array reference.
    Ref(TypeRef),
    /// Not yet known.
    #[default]
    Unknown,
}

impl SsaType {
    /// Converts an interned JVM type to its SSA type.
    #[must_use]
    pub fn from_type(symbols: &Symbols, ty: TypeRef) -> Self {
        match symbols.descriptor(ty) {
            "V" => Self::Void,
            "Z" | "B" | "S" | "C" | "I" => Self::Int,
            "J" => Self::Long,
            "F" => Self::Float,
            "D" => Self::Double,
            _ => Self::Ref(ty),
        }
    }

    /// Returns `true` for references and `null`.
    #[must_use]
    pub fn is_reference(&self) -> bool {
        matches!(self, Self::Ref(_) | Self::Null)
    }

    /// Returns `true` for the `null` literal type.
    #[must_use]
    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    /// Returns `true` for primitive kinds.
    #[must_use]
    pub fn is_primitive(&self) -> bool {
        matches!(
            self,
            Self::Int | Self::Long | Self::Float | Self::Double | Self::Void
        )
    }

    /// Returns the referenced type, if this is a class or array reference.
    #[must_use]
    pub fn type_ref(&self) -> Option<TypeRef> {
        match self {
            Self::Ref(ty) => Some(*ty),
            _ => None,
        }
    }

    /// Renders the type with source names resolved.
    #[must_use]
    pub fn to_source(&self, symbols: &Symbols) -> String {
        match self {
            Self::Ref(ty) => symbols.source_name(*ty),
            other => other.to_string(),
        }
    }
}

impl fmt::Display for SsaType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Void => f.write_str("void"),
            Self::Int => f.write_str("int"),
            Self::Long => f.write_str("long"),
            Self::Float => f.write_str("float"),
            Self::Double => f.write_str("double"),
            Self::Null => f.write_str("null"),
            Self::Ref(ty) => write!(f, "ref {ty:?}"),
            Self::Unknown => f.write_str("?"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_type_collapses_small_ints() {
        let symbols = Symbols::new();
        assert_eq!(SsaType::from_type(&symbols, symbols.ty("Z")), SsaType::Int);
        assert_eq!(SsaType::from_type(&symbols, symbols.ty("C")), SsaType::Int);
        assert_eq!(SsaType::from_type(&symbols, symbols.ty("J")), SsaType::Long);
        assert_eq!(SsaType::from_type(&symbols, symbols.ty("V")), SsaType::Void);

        let color = symbols.class("com.example.Color");
        assert_eq!(SsaType::from_type(&symbols, color), SsaType::Ref(color));
        assert_eq!(
            SsaType::Ref(color).to_source(&symbols),
            "com.example.Color"
        );
    }

    #[test]
    fn test_reference_classification() {
        assert!(SsaType::Null.is_reference());
        assert!(SsaType::Null.is_null());
        assert!(!SsaType::Int.is_reference());
        assert!(SsaType::Int.is_primitive());
        assert_eq!(SsaType::Int.type_ref(), None);
    }
}
