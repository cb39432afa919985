//! SSA instructions.

use std::fmt;

use crate::analysis::ssa::{SsaOp, SsaVarId};

/// One instruction in a block.
///
/// A thin wrapper around [`SsaOp`] so that instructions can grow metadata
/// without touching every operation pattern.
#[derive(Debug, Clone, PartialEq)]
pub struct SsaInstruction {
    op: SsaOp,
}

impl SsaInstruction {
    /// Wraps an operation.
    #[must_use]
    pub fn new(op: SsaOp) -> Self {
        Self { op }
    }

    /// Returns the operation.
    #[must_use]
    pub fn op(&self) -> &SsaOp {
        &self.op
    }

    /// Returns the operation mutably.
    pub fn op_mut(&mut self) -> &mut SsaOp {
        &mut self.op
    }

    /// Consumes the instruction, returning its operation.
    #[must_use]
    pub fn into_op(self) -> SsaOp {
        self.op
    }

    /// Replaces the operation, returning the previous one.
    pub fn set_op(&mut self, op: SsaOp) -> SsaOp {
        std::mem::replace(&mut self.op, op)
    }

    /// Returns the defined variable, if any.
    #[must_use]
    pub fn dest(&self) -> Option<SsaVarId> {
        self.op.dest()
    }

    /// Returns the used variables.
    #[must_use]
    pub fn uses(&self) -> Vec<SsaVarId> {
        self.op.uses()
    }

    /// Returns `true` for terminators.
    #[must_use]
    pub fn is_terminator(&self) -> bool {
        self.op.is_terminator()
    }
}

impl From<SsaOp> for SsaInstruction {
    fn from(op: SsaOp) -> Self {
        Self::new(op)
    }
}

impl fmt::Display for SsaInstruction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.op)
    }
}
