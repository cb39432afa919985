//! Constant values carried by `Const` instructions.

use std::{fmt, sync::Arc};

use crate::analysis::ssa::SsaType;

/// A compile-time constant.
#[derive(Debug, Clone, PartialEq)]
pub enum ConstValue {
    /// 32-bit integer (also booleans and chars).
    Int(i32),
    /// 64-bit integer.
    Long(i64),
    /// 64-bit float.
    Double(f64),
    /// String literal.
    String(Arc<str>),
    /// The `null` reference.
    Null,
}

impl ConstValue {
    /// Returns the SSA type a variable holding this constant has.
    ///
    /// String constants need the interned `java.lang.String` type, which the
    /// caller supplies.
    #[must_use]
    pub fn ssa_type(&self, string: SsaType) -> SsaType {
        match self {
            Self::Int(_) => SsaType::Int,
            Self::Long(_) => SsaType::Long,
            Self::Double(_) => SsaType::Double,
            Self::String(_) => string,
            Self::Null => SsaType::Null,
        }
    }

    /// Returns the integer value of an `Int` constant.
    #[must_use]
    pub fn as_i32(&self) -> Option<i32> {
        match self {
            Self::Int(v) => Some(*v),
            _ => None,
        }
    }

    /// Returns the string of a `String` constant.
    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(s) => Some(s),
            _ => None,
        }
    }

    /// Returns `true` for `null`.
    #[must_use]
    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }
}

impl fmt::Display for ConstValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Int(v) => write!(f, "{v}"),
            Self::Long(v) => write!(f, "{v}L"),
            Self::Double(v) => write!(f, "{v}d"),
            Self::String(s) => write!(f, "{s:?}"),
            Self::Null => f.write_str("null"),
        }
    }
}
