//! SSA function representation - a complete method body in SSA form.
//!
//! An `SsaFunction` is the top-level container for a method body. It holds
//! the blocks, the variable table and the argument variables.
//!
//! # Structure
//!
//! ```text
//! SsaFunction
//! ├── blocks: Vec<SsaBlock>       // indexed by block id, block 0 is the entry
//! ├── variables: Vec<SsaVariable> // indexed by SsaVarId
//! └── arguments: Vec<SsaVarId>    // receiver first for instance methods
//! ```
//!
//! # Mutation
//!
//! Rewrites edit instructions in place through [`SsaFunction::instruction_mut`],
//! redirect values with [`SsaFunction::replace_all_uses`] and delete
//! instructions with [`SsaFunction::remove_instruction`]. Because def-use
//! chains are never cached, a removed instruction is detached from all of its
//! operands immediately. [`SsaFunction::verify`] checks the result.
//!
//! # Thread Safety
//!
//! `SsaFunction` is `Send` and `Sync`. The scheduler moves a function out of
//! the shared map while a pass works on it, so no locking is needed.

use std::{
    collections::{HashMap, HashSet},
    fmt,
};

use crate::{
    analysis::{
        defuse::Location,
        ssa::{PhiNode, SsaBlock, SsaInstruction, SsaOp, SsaType, SsaVarId, SsaVariable, VariableOrigin},
    },
    Result,
};

/// A method body in SSA form.
///
/// # Examples
///
/// ```rust,ignore
/// use enumbox::analysis::ssa::{SsaFunction, SsaType};
///
/// let mut func = SsaFunction::with_arguments(&[SsaType::Int]);
/// assert_eq!(func.arguments().len(), 1);
/// ```
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SsaFunction {
    blocks: Vec<SsaBlock>,
    variables: Vec<SsaVariable>,
    arguments: Vec<SsaVarId>,
}

impl SsaFunction {
    /// Creates an empty function without arguments.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates an empty function with one argument variable per type.
    #[must_use]
    pub fn with_arguments(types: &[SsaType]) -> Self {
        let mut func = Self::new();
        for (i, ty) in types.iter().enumerate() {
            #[allow(clippy::cast_possible_truncation)]
            let id = func.new_variable(*ty, VariableOrigin::Argument(i as u16));
            func.arguments.push(id);
        }
        func
    }

    // ── Blocks ─────────────────────────────────────────────────────────

    /// Returns the blocks.
    #[must_use]
    pub fn blocks(&self) -> &[SsaBlock] {
        &self.blocks
    }

    /// Returns the blocks mutably.
    pub fn blocks_mut(&mut self) -> &mut Vec<SsaBlock> {
        &mut self.blocks
    }

    /// Returns the block at `index`.
    #[must_use]
    pub fn block(&self, index: usize) -> Option<&SsaBlock> {
        self.blocks.get(index)
    }

    /// Returns the block at `index` mutably.
    pub fn block_mut(&mut self, index: usize) -> Option<&mut SsaBlock> {
        self.blocks.get_mut(index)
    }

    /// Appends a block.
    pub fn add_block(&mut self, block: SsaBlock) {
        self.blocks.push(block);
    }

    /// Number of blocks.
    #[must_use]
    pub fn block_count(&self) -> usize {
        self.blocks.len()
    }

    /// Computes the predecessor lists of every block.
    #[must_use]
    pub fn predecessors(&self) -> Vec<Vec<usize>> {
        let mut preds = vec![Vec::new(); self.blocks.len()];
        for block in &self.blocks {
            for succ in block.successors() {
                if let Some(list) = preds.get_mut(succ) {
                    if !list.contains(&block.id()) {
                        list.push(block.id());
                    }
                }
            }
        }
        preds
    }

    // ── Variables ──────────────────────────────────────────────────────

    /// Returns the variable table.
    #[must_use]
    pub fn variables(&self) -> &[SsaVariable] {
        &self.variables
    }

    /// Returns a variable.
    #[must_use]
    pub fn variable(&self, id: SsaVarId) -> Option<&SsaVariable> {
        self.variables.get(id.index())
    }

    /// Returns the type of a variable, `Unknown` for unknown ids.
    #[must_use]
    pub fn var_type(&self, id: SsaVarId) -> SsaType {
        self.variable(id).map(|v| *v.ty()).unwrap_or_default()
    }

    /// Changes the type of a variable.
    pub fn set_var_type(&mut self, id: SsaVarId, ty: SsaType) {
        if let Some(var) = self.variables.get_mut(id.index()) {
            var.set_type(ty);
        }
    }

    /// Allocates a new variable.
    pub fn new_variable(&mut self, ty: SsaType, origin: VariableOrigin) -> SsaVarId {
        let id = SsaVarId::new(self.variables.len());
        self.variables.push(SsaVariable::new(id, ty, origin));
        id
    }

    /// Returns the argument variables, receiver first.
    #[must_use]
    pub fn arguments(&self) -> &[SsaVarId] {
        &self.arguments
    }

    /// Returns the argument variable at `index`.
    #[must_use]
    pub fn argument(&self, index: usize) -> Option<SsaVarId> {
        self.arguments.get(index).copied()
    }

    /// Returns `true` if `var` is an argument.
    #[must_use]
    pub fn is_argument(&self, var: SsaVarId) -> bool {
        self.arguments.contains(&var)
    }

    /// Replaces the argument list.
    pub fn set_arguments(&mut self, arguments: Vec<SsaVarId>) {
        self.arguments = arguments;
    }

    // ── Instructions ───────────────────────────────────────────────────

    /// Iterates all instructions with their locations.
    pub fn instructions(&self) -> impl Iterator<Item = (Location, &SsaInstruction)> {
        self.blocks.iter().flat_map(|block| {
            block
                .instructions()
                .iter()
                .enumerate()
                .map(move |(i, instr)| (Location::new(block.id(), i), instr))
        })
    }

    /// Iterates all phi nodes with their block.
    pub fn phis(&self) -> impl Iterator<Item = (usize, &PhiNode)> {
        self.blocks
            .iter()
            .flat_map(|block| block.phi_nodes().iter().map(move |phi| (block.id(), phi)))
    }

    /// Returns the instruction at `loc`.
    #[must_use]
    pub fn instruction(&self, loc: Location) -> Option<&SsaInstruction> {
        self.blocks.get(loc.block)?.instructions().get(loc.instruction)
    }

    /// Returns the instruction at `loc` mutably.
    pub fn instruction_mut(&mut self, loc: Location) -> Option<&mut SsaInstruction> {
        self.blocks
            .get_mut(loc.block)?
            .instructions_mut()
            .get_mut(loc.instruction)
    }

    /// Total number of instructions.
    #[must_use]
    pub fn instruction_count(&self) -> usize {
        self.blocks.iter().map(|b| b.instructions().len()).sum()
    }

    /// Inserts an instruction before `loc`.
    pub fn insert_instruction(&mut self, loc: Location, op: SsaOp) {
        if let Some(block) = self.blocks.get_mut(loc.block) {
            block.insert_instruction(loc.instruction, SsaInstruction::new(op));
        }
    }

    /// Inserts an instruction at the very start of the entry block.
    pub fn prepend_to_entry(&mut self, op: SsaOp) {
        if let Some(block) = self.blocks.first_mut() {
            block.insert_instruction(0, SsaInstruction::new(op));
        }
    }

    /// Removes the instruction at `loc` and returns its operation.
    pub fn remove_instruction(&mut self, loc: Location) -> Option<SsaOp> {
        let block = self.blocks.get_mut(loc.block)?;
        if loc.instruction >= block.instructions().len() {
            return None;
        }
        Some(block.instructions_mut().remove(loc.instruction).into_op())
    }

    /// Replaces every use of `old`, in instructions and phis, with `new`.
    pub fn replace_all_uses(&mut self, old: SsaVarId, new: SsaVarId) -> usize {
        let mut count = 0;
        for block in &mut self.blocks {
            for phi in block.phi_nodes_mut() {
                count += phi.replace_uses(old, new);
            }
            for instr in block.instructions_mut() {
                count += instr.op_mut().replace_uses(old, new);
            }
        }
        count
    }

    /// Finds the instruction defining `var`.
    #[must_use]
    pub fn definition(&self, var: SsaVarId) -> Option<(Location, &SsaOp)> {
        self.instructions()
            .find(|(_, instr)| instr.dest() == Some(var))
            .map(|(loc, instr)| (loc, instr.op()))
    }

    /// Returns `true` if any instruction or phi reads `var`.
    #[must_use]
    pub fn has_uses(&self, var: SsaVarId) -> bool {
        self.instructions().any(|(_, i)| i.uses().contains(&var))
            || self.phis().any(|(_, phi)| phi.uses(var))
    }

    /// Repeatedly removes instructions whose result is unused and that
    /// `removable` accepts. Returns the number removed.
    pub fn remove_unused_definitions<F>(&mut self, removable: F) -> usize
    where
        F: Fn(&SsaOp) -> bool,
    {
        let mut removed = 0;
        loop {
            let mut used: HashSet<SsaVarId> = HashSet::new();
            for (_, instr) in self.instructions() {
                used.extend(instr.uses());
            }
            for (_, phi) in self.phis() {
                used.extend(phi.operands().iter().map(|o| o.value()));
            }

            let mut changed = false;
            for block in &mut self.blocks {
                let before = block.instructions().len();
                block.instructions_mut().retain(|instr| match instr.dest() {
                    Some(dest) => used.contains(&dest) || !removable(instr.op()),
                    None => !matches!(instr.op(), SsaOp::Nop),
                });
                let after = block.instructions().len();
                if after != before {
                    removed += before - after;
                    changed = true;
                }
            }
            if !changed {
                return removed;
            }
        }
    }

    /// Returns `true` if the body does nothing but return.
    #[must_use]
    pub fn is_trivial(&self) -> bool {
        self.instructions()
            .all(|(_, i)| matches!(i.op(), SsaOp::Return { value: None } | SsaOp::Nop))
    }

    // ── Verification ───────────────────────────────────────────────────

    /// Checks SSA consistency.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::Malformed`] if a value is defined twice or used
    /// without a definition, if a block does not end in a terminator or
    /// branches to a missing block, or if a phi names a block that is not a
    /// predecessor.
    pub fn verify(&self) -> Result<()> {
        let mut defined: HashSet<SsaVarId> = self.arguments.iter().copied().collect();
        if defined.len() != self.arguments.len() {
            return Err(malformed_error!("Duplicate argument variable"));
        }
        for (block, phi) in self.phis() {
            if !defined.insert(phi.result()) {
                return Err(malformed_error!(
                    "Phi result {} in B{} is defined more than once",
                    phi.result(),
                    block
                ));
            }
        }
        for (loc, instr) in self.instructions() {
            if let Some(dest) = instr.dest() {
                if !defined.insert(dest) {
                    return Err(malformed_error!(
                        "{} defined more than once (at {})",
                        dest,
                        loc
                    ));
                }
            }
        }
        for var in &defined {
            if var.index() >= self.variables.len() {
                return Err(malformed_error!("{} has no variable table entry", var));
            }
        }

        let preds = self.predecessors();
        let mut positions: HashMap<usize, usize> = HashMap::new();
        for (index, block) in self.blocks.iter().enumerate() {
            if block.id() != index {
                return Err(malformed_error!(
                    "Block at index {} has id {}",
                    index,
                    block.id()
                ));
            }
            positions.insert(block.id(), index);
        }

        for block in &self.blocks {
            let instrs = block.instructions();
            match instrs.last() {
                Some(last) if last.is_terminator() => {}
                _ => {
                    return Err(malformed_error!(
                        "B{} does not end in a terminator",
                        block.id()
                    ))
                }
            }
            if instrs[..instrs.len() - 1].iter().any(SsaInstruction::is_terminator) {
                return Err(malformed_error!(
                    "B{} has a terminator before its end",
                    block.id()
                ));
            }
            for succ in block.successors() {
                if !positions.contains_key(&succ) {
                    return Err(malformed_error!(
                        "B{} branches to missing block B{}",
                        block.id(),
                        succ
                    ));
                }
            }
            for phi in block.phi_nodes() {
                for operand in phi.operands() {
                    if !preds[block.id()].contains(&operand.predecessor()) {
                        return Err(malformed_error!(
                            "Phi {} in B{} names B{}, which is not a predecessor",
                            phi.result(),
                            block.id(),
                            operand.predecessor()
                        ));
                    }
                    if !defined.contains(&operand.value()) {
                        return Err(malformed_error!(
                            "Phi {} in B{} reads undefined {}",
                            phi.result(),
                            block.id(),
                            operand.value()
                        ));
                    }
                }
            }
        }

        for (loc, instr) in self.instructions() {
            for used in instr.uses() {
                if !defined.contains(&used) {
                    return Err(malformed_error!("{} reads undefined {}", loc, used));
                }
            }
        }
        Ok(())
    }
}

impl fmt::Display for SsaFunction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let args: Vec<String> = self
            .arguments
            .iter()
            .map(|a| format!("{}: {}", a, self.var_type(*a)))
            .collect();
        writeln!(f, "function({})", args.join(", "))?;
        for block in &self.blocks {
            write!(f, "{block}")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::ssa::{CmpKind, ConstValue, PhiOperand};

    fn diamond() -> SsaFunction {
        let mut func = SsaFunction::with_arguments(&[SsaType::Int]);
        let arg = func.arguments()[0];
        let a = func.new_variable(SsaType::Int, VariableOrigin::Local);
        let b = func.new_variable(SsaType::Int, VariableOrigin::Local);
        let merged = func.new_variable(SsaType::Int, VariableOrigin::Phi);

        let mut b0 = SsaBlock::new(0);
        b0.add_instruction(
            SsaOp::If {
                kind: CmpKind::Eq,
                left: arg,
                right: None,
                true_target: 1,
                false_target: 2,
            }
            .into(),
        );
        let mut b1 = SsaBlock::new(1);
        b1.add_instruction(
            SsaOp::Const {
                dest: a,
                value: ConstValue::Int(1),
            }
            .into(),
        );
        b1.add_instruction(SsaOp::Jump { target: 3 }.into());
        let mut b2 = SsaBlock::new(2);
        b2.add_instruction(
            SsaOp::Const {
                dest: b,
                value: ConstValue::Int(2),
            }
            .into(),
        );
        b2.add_instruction(SsaOp::Jump { target: 3 }.into());
        let mut b3 = SsaBlock::new(3);
        let mut phi = PhiNode::new(merged);
        phi.add_operand(PhiOperand::new(a, 1));
        phi.add_operand(PhiOperand::new(b, 2));
        b3.add_phi(phi);
        b3.add_instruction(
            SsaOp::Return {
                value: Some(merged),
            }
            .into(),
        );

        for block in [b0, b1, b2, b3] {
            func.add_block(block);
        }
        func
    }

    #[test]
    fn test_verify_accepts_diamond() {
        let func = diamond();
        assert!(func.verify().is_ok());
        assert_eq!(func.predecessors()[3], vec![1, 2]);
    }

    #[test]
    fn test_verify_rejects_undefined_use() {
        let mut func = diamond();
        let loc = Location::new(1, 0);
        func.remove_instruction(loc);
        assert!(func.verify().is_err());
    }

    #[test]
    fn test_verify_rejects_bad_phi_predecessor() {
        let mut func = diamond();
        let phi = &mut func.block_mut(3).unwrap().phi_nodes_mut()[0];
        let result = phi.result();
        let value = phi.operands()[0].value();
        *phi = PhiNode::new(result);
        phi.add_operand(PhiOperand::new(value, 0));
        assert!(func.verify().is_err());
    }

    #[test]
    fn test_replace_all_uses_covers_phis() {
        let mut func = diamond();
        let arg = func.arguments()[0];
        let a = SsaVarId::new(1);
        assert_eq!(func.replace_all_uses(a, arg), 1);
        assert!(!func.has_uses(a));
    }

    #[test]
    fn test_remove_unused_definitions() {
        let mut func = SsaFunction::new();
        let c = func.new_variable(SsaType::Int, VariableOrigin::Local);
        let d = func.new_variable(SsaType::Int, VariableOrigin::Local);
        let mut b0 = SsaBlock::new(0);
        b0.add_instruction(
            SsaOp::Const {
                dest: c,
                value: ConstValue::Int(1),
            }
            .into(),
        );
        b0.add_instruction(
            SsaOp::NewArrayFilled {
                dest: d,
                ty: crate::program::symbols::Symbols::new().ty("[I"),
                elements: vec![c],
            }
            .into(),
        );
        b0.add_instruction(SsaOp::Return { value: None }.into());
        func.add_block(b0);

        let removed = func.remove_unused_definitions(SsaOp::is_removable_if_unused);
        assert_eq!(removed, 2);
        assert!(func.is_trivial());
        assert!(func.verify().is_ok());
    }
}
