//! SSA basic blocks.

use std::fmt;

use crate::analysis::ssa::{PhiNode, SsaInstruction, SsaOp};

/// A basic block: phi nodes followed by instructions, the last of which is
/// a terminator.
#[derive(Debug, Clone, PartialEq)]
pub struct SsaBlock {
    id: usize,
    phi_nodes: Vec<PhiNode>,
    instructions: Vec<SsaInstruction>,
}

impl SsaBlock {
    /// Creates an empty block.
    #[must_use]
    pub fn new(id: usize) -> Self {
        Self {
            id,
            phi_nodes: Vec::new(),
            instructions: Vec::new(),
        }
    }

    /// The block index.
    #[must_use]
    pub fn id(&self) -> usize {
        self.id
    }

    /// The phi nodes.
    #[must_use]
    pub fn phi_nodes(&self) -> &[PhiNode] {
        &self.phi_nodes
    }

    /// The phi nodes, mutably.
    pub fn phi_nodes_mut(&mut self) -> &mut Vec<PhiNode> {
        &mut self.phi_nodes
    }

    /// The instructions.
    #[must_use]
    pub fn instructions(&self) -> &[SsaInstruction] {
        &self.instructions
    }

    /// The instructions, mutably.
    pub fn instructions_mut(&mut self) -> &mut Vec<SsaInstruction> {
        &mut self.instructions
    }

    /// Appends a phi node.
    pub fn add_phi(&mut self, phi: PhiNode) {
        self.phi_nodes.push(phi);
    }

    /// Appends an instruction.
    pub fn add_instruction(&mut self, instruction: SsaInstruction) {
        self.instructions.push(instruction);
    }

    /// Inserts an instruction at `index`.
    pub fn insert_instruction(&mut self, index: usize, instruction: SsaInstruction) {
        self.instructions.insert(index, instruction);
    }

    /// Returns the terminator, if the block has one.
    #[must_use]
    pub fn terminator(&self) -> Option<&SsaOp> {
        self.instructions
            .last()
            .map(SsaInstruction::op)
            .filter(|op| op.is_terminator())
    }

    /// Successor block indices.
    #[must_use]
    pub fn successors(&self) -> Vec<usize> {
        self.terminator().map(SsaOp::successors).unwrap_or_default()
    }
}

impl fmt::Display for SsaBlock {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "B{}:", self.id)?;
        for phi in &self.phi_nodes {
            writeln!(f, "  {phi}")?;
        }
        for instr in &self.instructions {
            writeln!(f, "  {instr}")?;
        }
        Ok(())
    }
}
