//! Def-Use Index for SSA variable lookup.
//!
//! [`DefUseIndex`] is a snapshot of where every variable of one
//! [`SsaFunction`] is defined and used. It is built on demand and never
//! cached inside the function, so it has to be rebuilt after the function
//! is mutated.
//!
//! # Basic Usage
//!
//! ```rust,ignore
//! use enumbox::analysis::DefUseIndex;
//!
//! let index = DefUseIndex::build(&ssa);
//!
//! for loc in index.instruction_users(v0) {
//!     println!("v0 used at {loc}");
//! }
//! if index.is_unused(v1) {
//!     println!("v1 can be eliminated");
//! }
//! ```

use std::{collections::HashMap, fmt};

use crate::analysis::ssa::{SsaFunction, SsaVarId};

/// Location in the SSA function (block + instruction).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Location {
    /// Block index.
    pub block: usize,
    /// Instruction index within the block.
    pub instruction: usize,
}

impl Location {
    /// Creates a new location.
    #[must_use]
    pub const fn new(block: usize, instruction: usize) -> Self {
        Self { block, instruction }
    }
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "B{}:{}", self.block, self.instruction)
    }
}

/// Where a variable is defined.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Definition {
    /// A method argument.
    Argument(usize),
    /// A phi node in this block.
    Phi(usize),
    /// An instruction.
    Instruction(Location),
}

/// A phi reading a variable: the block holding the phi and its result.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PhiUser {
    /// Block of the phi.
    pub block: usize,
    /// The phi's result variable.
    pub result: SsaVarId,
}

/// Index for def-use queries on an SSA function.
#[derive(Debug, Clone, Default)]
pub struct DefUseIndex {
    definitions: HashMap<SsaVarId, Definition>,
    instruction_users: HashMap<SsaVarId, Vec<Location>>,
    phi_users: HashMap<SsaVarId, Vec<PhiUser>>,
}

impl DefUseIndex {
    /// Builds the index for `ssa`.
    #[must_use]
    pub fn build(ssa: &SsaFunction) -> Self {
        let mut index = Self::default();
        for (i, arg) in ssa.arguments().iter().enumerate() {
            index.definitions.insert(*arg, Definition::Argument(i));
        }
        for (block, phi) in ssa.phis() {
            index.definitions.insert(phi.result(), Definition::Phi(block));
            for operand in phi.operands() {
                let users = index.phi_users.entry(operand.value()).or_default();
                let user = PhiUser {
                    block,
                    result: phi.result(),
                };
                if !users.contains(&user) {
                    users.push(user);
                }
            }
        }
        for (loc, instr) in ssa.instructions() {
            if let Some(dest) = instr.dest() {
                index.definitions.insert(dest, Definition::Instruction(loc));
            }
            for used in instr.uses() {
                let users = index.instruction_users.entry(used).or_default();
                if !users.contains(&loc) {
                    users.push(loc);
                }
            }
        }
        index
    }

    /// Returns where `var` is defined.
    #[must_use]
    pub fn definition(&self, var: SsaVarId) -> Option<Definition> {
        self.definitions.get(&var).copied()
    }

    /// Returns the instructions reading `var`, each once, in program order.
    #[must_use]
    pub fn instruction_users(&self, var: SsaVarId) -> &[Location] {
        self.instruction_users.get(&var).map_or(&[], Vec::as_slice)
    }

    /// Returns the phis reading `var`, each once.
    #[must_use]
    pub fn phi_users(&self, var: SsaVarId) -> &[PhiUser] {
        self.phi_users.get(&var).map_or(&[], Vec::as_slice)
    }

    /// Returns `true` if `var` has phi users.
    #[must_use]
    pub fn has_phi_users(&self, var: SsaVarId) -> bool {
        !self.phi_users(var).is_empty()
    }

    /// Returns `true` if nothing reads `var`.
    #[must_use]
    pub fn is_unused(&self, var: SsaVarId) -> bool {
        self.instruction_users(var).is_empty() && self.phi_users(var).is_empty()
    }
}
