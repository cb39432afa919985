//! # enumbox Prelude
//!
//! Brings the types needed to build a program, run enum unboxing over it and
//! inspect the result into scope with a single glob import.

// ================================================================================================
// Core Types and Error Handling
// ================================================================================================

/// The main error type for all enumbox operations
pub use crate::Error;

/// The result type used throughout enumbox
pub use crate::Result;

// ================================================================================================
// Program Model
// ================================================================================================

/// Interned references and the symbol table
pub use crate::program::{FieldRef, MethodRef, ProtoRef, Symbols, TypeRef};

/// Class definitions and flags
pub use crate::program::{AccessFlags, ClassDef, ClassOrigin, FieldDef, MethodDef};

/// The whole-program view and its construction
pub use crate::program::{AppView, EnumClass, KnownRefs, ProgramBuilder};

/// Reference mapping across rewrites
pub use crate::program::{GraphLens, LensKind};

// ================================================================================================
// SSA
// ================================================================================================

/// Method bodies in SSA form
pub use crate::analysis::{
    ssa::{CmpKind, MemberKind},
    ConstValue, InvokeKind, SsaFunction, SsaFunctionBuilder, SsaOp, SsaType, SsaVarId,
};

// ================================================================================================
// Compiler
// ================================================================================================

/// Shared compilation state and diagnostics
pub use crate::compiler::{CompilerContext, Event, EventKind, EventLog, PassScheduler, SsaPass};

// ================================================================================================
// Enum Unboxing
// ================================================================================================

/// Running the unboxer and reading its outcome
pub use crate::enums::{
    unbox_program, AnalysisReport, EnumDataMap, EnumUnboxingConfig, Reason, ReasonKind,
    UnboxingSummary,
};
