//! Static Single Assignment (SSA) form for method bodies.
//!
//! Every method body the optimizer touches is held in SSA form: each variable
//! is assigned exactly once, control-flow merges are explicit phi nodes, and
//! every operation names its operands. This makes the two questions the enum
//! unboxer keeps asking cheap to answer: "what produced this value?" and
//! "who reads it?".
//!
//! # Architecture
//!
//! - [`variable`] - SSA variable representation and identifiers
//! - [`types`] - SSA type system over interned JVM types
//! - [`value`] - Constant values
//! - [`ops`] - The closed set of SSA operations
//! - [`callsite`] - `invoke-custom` call sites and lambda descriptors
//! - [`instruction`] - Instructions wrapping operations
//! - [`phi`] - Phi nodes at control-flow merges
//! - [`block`] - Basic blocks
//! - [`function`] - A complete method body, with verification
//! - [`builder`] - Closure-based construction for tests and synthesis
//!
//! # Variable Origins
//!
//! - **Arguments**: Method parameters, receiver first
//! - **Locals**: Results of instructions
//! - **Phi nodes**: Merged values at control-flow joins
//!
//! # Usage
//!
//! ```rust,ignore
//! use enumbox::analysis::ssa::{SsaFunctionBuilder, InvokeKind};
//!
//! let ssa = SsaFunctionBuilder::new(&symbols, &[]).build_with(|f| {
//!     f.block(0, |b| {
//!         let red = b.get_static(color_red);
//!         let ord = b.call(InvokeKind::Virtual, known.enum_ordinal, &[red]);
//!         b.ret_val(ord);
//!     });
//! });
//! ssa.verify()?;
//! ```

mod block;
mod builder;
mod callsite;
mod function;
mod instruction;
mod ops;
mod phi;
mod types;
mod value;
mod variable;

pub use block::SsaBlock;
pub use builder::{SsaBlockBuilder, SsaFunctionBuilder, SsaFunctionContext};
pub use callsite::{
    BootstrapArg, CallSite, HandleMember, LambdaDescriptor, MethodHandle, MethodHandleKind,
};
pub use function::SsaFunction;
pub use instruction::SsaInstruction;
pub use ops::{BinaryOp, CmpKind, InvokeKind, MemberKind, SsaOp};
pub use phi::{PhiNode, PhiOperand};
pub use types::SsaType;
pub use value::ConstValue;
pub use variable::{SsaVarId, SsaVariable, VariableOrigin};
