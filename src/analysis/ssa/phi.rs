//! Phi nodes.
//!
//! A phi node merges one value per incoming control-flow edge. Operands name
//! the predecessor block they flow in from, which lets
//! [`crate::analysis::ssa::SsaFunction::verify`] check that every operand
//! belongs to a real predecessor.

use std::fmt;

use crate::analysis::ssa::SsaVarId;

/// One incoming value of a phi node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PhiOperand {
    value: SsaVarId,
    predecessor: usize,
}

impl PhiOperand {
    /// Creates an operand flowing in from `predecessor`.
    #[must_use]
    pub const fn new(value: SsaVarId, predecessor: usize) -> Self {
        Self { value, predecessor }
    }

    /// The incoming value.
    #[must_use]
    pub const fn value(&self) -> SsaVarId {
        self.value
    }

    /// The predecessor block.
    #[must_use]
    pub const fn predecessor(&self) -> usize {
        self.predecessor
    }
}

/// A phi node at the head of a block.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PhiNode {
    result: SsaVarId,
    operands: Vec<PhiOperand>,
}

impl PhiNode {
    /// Creates a phi node with no operands.
    #[must_use]
    pub fn new(result: SsaVarId) -> Self {
        Self {
            result,
            operands: Vec::new(),
        }
    }

    /// The variable this phi defines.
    #[must_use]
    pub fn result(&self) -> SsaVarId {
        self.result
    }

    /// The incoming operands.
    #[must_use]
    pub fn operands(&self) -> &[PhiOperand] {
        &self.operands
    }

    /// Appends an operand.
    pub fn add_operand(&mut self, operand: PhiOperand) {
        self.operands.push(operand);
    }

    /// Replaces every operand reading `old` with `new`.
    pub fn replace_uses(&mut self, old: SsaVarId, new: SsaVarId) -> usize {
        let mut count = 0;
        for operand in &mut self.operands {
            if operand.value == old {
                operand.value = new;
                count += 1;
            }
        }
        count
    }

    /// Returns `true` if any operand reads `var`.
    #[must_use]
    pub fn uses(&self, var: SsaVarId) -> bool {
        self.operands.iter().any(|o| o.value == var)
    }
}

impl fmt::Display for PhiNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} = phi(", self.result)?;
        for (i, operand) in self.operands.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "B{}: {}", operand.predecessor, operand.value)?;
        }
        f.write_str(")")
    }
}
