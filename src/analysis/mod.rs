//! Program analysis infrastructure.
//!
//! This module provides the method-body representation the optimizer works
//! on and the queries built over it.
//!
//! # Architecture
//!
//! - [`ssa`] - SSA form: variables, operations, blocks, functions and a builder
//! - [`defuse`] - On-demand def-use index over one SSA function
//!
//! # Usage
//!
//! ```rust,ignore
//! use enumbox::analysis::{DefUseIndex, SsaFunction};
//!
//! let index = DefUseIndex::build(&ssa);
//! for loc in index.instruction_users(value) {
//!     println!("{} used at {loc}", value);
//! }
//! ```

pub mod defuse;
pub mod ssa;

pub use defuse::{DefUseIndex, Definition, Location, PhiUser};
pub use ssa::{
    ConstValue, InvokeKind, SsaBlock, SsaFunction, SsaFunctionBuilder, SsaInstruction, SsaOp,
    SsaType, SsaVarId,
};
