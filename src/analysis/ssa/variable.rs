//! SSA variable representation and identifiers.
//!
//! Each SSA variable has a unique identifier within its function and is
//! assigned exactly once: by the caller (arguments), by one instruction, or by
//! one phi node. Variables carry their [`SsaType`], which the enum unboxer
//! reads to find candidate-typed values and rewrites when a type becomes `int`.
//!
//! Def-use information is deliberately *not* stored on variables. It is
//! recomputed on demand by [`crate::analysis::DefUseIndex`], so removing an
//! instruction never leaves a stale use list behind.

use std::fmt;

use crate::analysis::ssa::SsaType;

/// Unique identifier for an SSA variable.
///
/// A lightweight handle into the variable table of one
/// [`crate::analysis::ssa::SsaFunction`]. Identifiers are not meaningful
/// across functions.
///
/// # Examples
///
/// ```rust,ignore
/// use enumbox::analysis::ssa::SsaVarId;
///
/// let id = SsaVarId::new(42);
/// assert_eq!(id.index(), 42);
/// ```
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SsaVarId(usize);

impl SsaVarId {
    /// Creates a new SSA variable identifier.
    #[must_use]
    pub const fn new(index: usize) -> Self {
        Self(index)
    }

    /// Returns the index into the variable table.
    #[must_use]
    pub const fn index(self) -> usize {
        self.0
    }
}

impl fmt::Debug for SsaVarId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "v{}", self.0)
    }
}

impl fmt::Display for SsaVarId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "v{}", self.0)
    }
}

/// Where an SSA variable comes from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum VariableOrigin {
    /// Method argument at this index (the receiver is argument 0 for
    /// instance methods).
    Argument(u16),
    /// Result of an instruction.
    Local,
    /// Result of a phi node.
    Phi,
}

/// An SSA variable with its type and origin.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SsaVariable {
    id: SsaVarId,
    ty: SsaType,
    origin: VariableOrigin,
}

impl SsaVariable {
    /// Creates a new variable.
    #[must_use]
    pub fn new(id: SsaVarId, ty: SsaType, origin: VariableOrigin) -> Self {
        Self { id, ty, origin }
    }

    /// Returns the identifier.
    #[must_use]
    pub fn id(&self) -> SsaVarId {
        self.id
    }

    /// Returns the type.
    #[must_use]
    pub fn ty(&self) -> &SsaType {
        &self.ty
    }

    /// Replaces the type.
    pub fn set_type(&mut self, ty: SsaType) {
        self.ty = ty;
    }

    /// Returns the origin.
    #[must_use]
    pub fn origin(&self) -> VariableOrigin {
        self.origin
    }

    /// Returns `true` for argument variables.
    #[must_use]
    pub fn is_argument(&self) -> bool {
        matches!(self.origin, VariableOrigin::Argument(_))
    }
}

impl fmt::Display for SsaVariable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.id, self.ty)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_var_id_display() {
        let id = SsaVarId::new(7);
        assert_eq!(format!("{id}"), "v7");
        assert_eq!(format!("{id:?}"), "v7");
        assert_eq!(id.index(), 7);
    }

    #[test]
    fn test_variable_retype() {
        let mut var = SsaVariable::new(SsaVarId::new(0), SsaType::Null, VariableOrigin::Local);
        assert!(!var.is_argument());
        var.set_type(SsaType::Int);
        assert_eq!(var.ty(), &SsaType::Int);
    }
}
