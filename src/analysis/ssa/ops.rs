//! SSA operations.
//!
//! This module defines `SsaOp`, the closed set of operations a method body is
//! made of. Every operation produces at most one result and names all of its
//! operands as explicit SSA variables, so a classifier can match the enum
//! exhaustively and never miss a use.
//!
//! # Operation Categories
//!
//! - **Constants**: `Const`, `ConstClass`
//! - **Arithmetic**: `Binary`
//! - **Control flow**: `If`, `Jump`, `Switch`, `Return`, `Throw`
//! - **Fields**: instance and static loads and stores
//! - **Arrays**: element access, length, allocation
//! - **Objects**: `NewInstance`, `CheckCast`, `InstanceOf`
//! - **Calls**: `Invoke`, `InvokeCustom`
//! - **Unboxing markers**: `NewUnboxedEnumInstance`
//!
//! # Field Documentation
//!
//! - `dest`: The destination SSA variable for the operation result
//! - `left`, `right`: Binary operands
//! - `value`: A value being stored, returned or switched on
//! - `object`: The object instance for field and type operations
//! - `array`, `index`: Array and index for element operations
//! - `target`, `true_target`, `false_target`, `default`: Branch targets (block indices)

#![allow(missing_docs)]

use std::{fmt, sync::Arc};

use crate::{
    analysis::ssa::{CallSite, ConstValue, SsaVarId},
    program::symbols::{FieldRef, MethodRef, TypeRef},
};

/// Integer arithmetic and bitwise operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    Rem,
    And,
    Or,
    Xor,
    Shl,
    Shr,
}

impl fmt::Display for BinaryOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Add => "add",
            Self::Sub => "sub",
            Self::Mul => "mul",
            Self::Div => "div",
            Self::Rem => "rem",
            Self::And => "and",
            Self::Or => "or",
            Self::Xor => "xor",
            Self::Shl => "shl",
            Self::Shr => "shr",
        };
        f.write_str(name)
    }
}

/// Comparison performed by an `If`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CmpKind {
    Eq,
    Ne,
    Lt,
    Ge,
    Gt,
    Le,
}

impl fmt::Display for CmpKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Eq => "eq",
            Self::Ne => "ne",
            Self::Lt => "lt",
            Self::Ge => "ge",
            Self::Gt => "gt",
            Self::Le => "le",
        };
        f.write_str(name)
    }
}

/// Dispatch kind of an `Invoke`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum InvokeKind {
    /// `invokestatic`
    Static,
    /// `invokevirtual`
    Virtual,
    /// `invokespecial` on a private method or initializer
    Direct,
    /// `invokespecial` on a superclass method
    Super,
    /// `invokeinterface`
    Interface,
}

impl InvokeKind {
    /// Returns `true` if the first argument is the receiver.
    #[must_use]
    pub fn has_receiver(self) -> bool {
        !matches!(self, Self::Static)
    }
}

impl fmt::Display for InvokeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Static => "static",
            Self::Virtual => "virtual",
            Self::Direct => "direct",
            Self::Super => "super",
            Self::Interface => "interface",
        };
        f.write_str(name)
    }
}

/// Element kind of an array access.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MemberKind {
    Object,
    Int,
    Long,
    Double,
}

impl fmt::Display for MemberKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Object => "object",
            Self::Int => "int",
            Self::Long => "long",
            Self::Double => "double",
        };
        f.write_str(name)
    }
}

/// An SSA operation.
#[derive(Debug, Clone, PartialEq)]
pub enum SsaOp {
    // ── Constants ──────────────────────────────────────────────────────
    Const {
        dest: SsaVarId,
        value: ConstValue,
    },
    ConstClass {
        dest: SsaVarId,
        ty: TypeRef,
    },

    // ── Arithmetic ─────────────────────────────────────────────────────
    Binary {
        dest: SsaVarId,
        op: BinaryOp,
        left: SsaVarId,
        right: SsaVarId,
    },

    // ── Control flow ───────────────────────────────────────────────────
    /// Compares `left` against `right`, or against zero/null when `right`
    /// is `None`.
    If {
        kind: CmpKind,
        left: SsaVarId,
        right: Option<SsaVarId>,
        true_target: usize,
        false_target: usize,
    },
    Jump {
        target: usize,
    },
    Switch {
        value: SsaVarId,
        targets: Vec<(i32, usize)>,
        default: usize,
    },
    Return {
        value: Option<SsaVarId>,
    },
    Throw {
        exception: SsaVarId,
    },

    // ── Fields ─────────────────────────────────────────────────────────
    LoadField {
        dest: SsaVarId,
        object: SsaVarId,
        field: FieldRef,
    },
    StoreField {
        object: SsaVarId,
        field: FieldRef,
        value: SsaVarId,
    },
    LoadStaticField {
        dest: SsaVarId,
        field: FieldRef,
    },
    StoreStaticField {
        field: FieldRef,
        value: SsaVarId,
    },

    // ── Arrays ─────────────────────────────────────────────────────────
    LoadElement {
        dest: SsaVarId,
        array: SsaVarId,
        index: SsaVarId,
        kind: MemberKind,
    },
    StoreElement {
        array: SsaVarId,
        index: SsaVarId,
        value: SsaVarId,
        kind: MemberKind,
    },
    ArrayLength {
        dest: SsaVarId,
        array: SsaVarId,
    },
    /// Allocates an array; `ty` is the array type.
    NewArray {
        dest: SsaVarId,
        ty: TypeRef,
        size: SsaVarId,
    },
    /// Allocates an array of the given elements; `ty` is the array type.
    NewArrayFilled {
        dest: SsaVarId,
        ty: TypeRef,
        elements: Vec<SsaVarId>,
    },

    // ── Objects ────────────────────────────────────────────────────────
    NewInstance {
        dest: SsaVarId,
        ty: TypeRef,
    },
    CheckCast {
        dest: SsaVarId,
        object: SsaVarId,
        ty: TypeRef,
    },
    InstanceOf {
        dest: SsaVarId,
        object: SsaVarId,
        ty: TypeRef,
    },

    // ── Calls ──────────────────────────────────────────────────────────
    Invoke {
        dest: Option<SsaVarId>,
        kind: InvokeKind,
        method: MethodRef,
        args: Vec<SsaVarId>,
    },
    InvokeCustom {
        dest: Option<SsaVarId>,
        call_site: Arc<CallSite>,
        args: Vec<SsaVarId>,
    },

    // ── Unboxing markers ───────────────────────────────────────────────
    /// Placeholder for an enum instance that has been unboxed to
    /// `ordinal + 1`; only valid between the tree fix and the rewrite.
    NewUnboxedEnumInstance {
        dest: SsaVarId,
        ty: TypeRef,
        ordinal: i32,
    },

    Nop,
}

impl SsaOp {
    /// Returns the variable this operation defines, if any.
    #[must_use]
    pub fn dest(&self) -> Option<SsaVarId> {
        match self {
            Self::Const { dest, .. }
            | Self::ConstClass { dest, .. }
            | Self::Binary { dest, .. }
            | Self::LoadField { dest, .. }
            | Self::LoadStaticField { dest, .. }
            | Self::LoadElement { dest, .. }
            | Self::ArrayLength { dest, .. }
            | Self::NewArray { dest, .. }
            | Self::NewArrayFilled { dest, .. }
            | Self::NewInstance { dest, .. }
            | Self::CheckCast { dest, .. }
            | Self::InstanceOf { dest, .. }
            | Self::NewUnboxedEnumInstance { dest, .. } => Some(*dest),
            Self::Invoke { dest, .. } | Self::InvokeCustom { dest, .. } => *dest,
            Self::If { .. }
            | Self::Jump { .. }
            | Self::Switch { .. }
            | Self::Return { .. }
            | Self::Throw { .. }
            | Self::StoreField { .. }
            | Self::StoreStaticField { .. }
            | Self::StoreElement { .. }
            | Self::Nop => None,
        }
    }

    /// Returns the variables this operation reads, in operand order.
    #[must_use]
    pub fn uses(&self) -> Vec<SsaVarId> {
        match self {
            Self::Const { .. }
            | Self::ConstClass { .. }
            | Self::Jump { .. }
            | Self::LoadStaticField { .. }
            | Self::NewInstance { .. }
            | Self::NewUnboxedEnumInstance { .. }
            | Self::Nop => vec![],
            Self::Binary { left, right, .. } => vec![*left, *right],
            Self::If { left, right, .. } => {
                let mut uses = vec![*left];
                uses.extend(right);
                uses
            }
            Self::Switch { value, .. } | Self::StoreStaticField { value, .. } => vec![*value],
            Self::Return { value } => value.iter().copied().collect(),
            Self::Throw { exception } => vec![*exception],
            Self::LoadField { object, .. }
            | Self::CheckCast { object, .. }
            | Self::InstanceOf { object, .. } => vec![*object],
            Self::StoreField { object, value, .. } => vec![*object, *value],
            Self::LoadElement { array, index, .. } => vec![*array, *index],
            Self::StoreElement {
                array,
                index,
                value,
                ..
            } => vec![*array, *index, *value],
            Self::ArrayLength { array, .. } => vec![*array],
            Self::NewArray { size, .. } => vec![*size],
            Self::NewArrayFilled { elements, .. } => elements.clone(),
            Self::Invoke { args, .. } | Self::InvokeCustom { args, .. } => args.clone(),
        }
    }

    /// Replaces every read of `old` with `new`. Returns the number of
    /// operands changed.
    pub fn replace_uses(&mut self, old: SsaVarId, new: SsaVarId) -> usize {
        let mut count = 0;
        let mut swap = |var: &mut SsaVarId| {
            if *var == old {
                *var = new;
                count += 1;
            }
        };
        match self {
            Self::Const { .. }
            | Self::ConstClass { .. }
            | Self::Jump { .. }
            | Self::LoadStaticField { .. }
            | Self::NewInstance { .. }
            | Self::NewUnboxedEnumInstance { .. }
            | Self::Nop => {}
            Self::Binary { left, right, .. } => {
                swap(left);
                swap(right);
            }
            Self::If { left, right, .. } => {
                swap(left);
                if let Some(right) = right {
                    swap(right);
                }
            }
            Self::Switch { value, .. } | Self::StoreStaticField { value, .. } => swap(value),
            Self::Return { value } => {
                if let Some(value) = value {
                    swap(value);
                }
            }
            Self::Throw { exception } => swap(exception),
            Self::LoadField { object, .. }
            | Self::CheckCast { object, .. }
            | Self::InstanceOf { object, .. } => swap(object),
            Self::StoreField { object, value, .. } => {
                swap(object);
                swap(value);
            }
            Self::LoadElement { array, index, .. } => {
                swap(array);
                swap(index);
            }
            Self::StoreElement {
                array,
                index,
                value,
                ..
            } => {
                swap(array);
                swap(index);
                swap(value);
            }
            Self::ArrayLength { array, .. } => swap(array),
            Self::NewArray { size, .. } => swap(size),
            Self::NewArrayFilled { elements, .. } => elements.iter_mut().for_each(swap),
            Self::Invoke { args, .. } | Self::InvokeCustom { args, .. } => {
                args.iter_mut().for_each(swap);
            }
        }
        count
    }

    /// Returns the successor blocks of a terminator, empty otherwise.
    #[must_use]
    pub fn successors(&self) -> Vec<usize> {
        match self {
            Self::If {
                true_target,
                false_target,
                ..
            } => vec![*true_target, *false_target],
            Self::Jump { target } => vec![*target],
            Self::Switch {
                targets, default, ..
            } => {
                let mut succs: Vec<usize> = targets.iter().map(|(_, t)| *t).collect();
                succs.push(*default);
                succs
            }
            _ => vec![],
        }
    }

    /// Returns `true` for block terminators.
    #[must_use]
    pub fn is_terminator(&self) -> bool {
        matches!(
            self,
            Self::If { .. }
                | Self::Jump { .. }
                | Self::Switch { .. }
                | Self::Return { .. }
                | Self::Throw { .. }
        )
    }

    /// Returns `true` if the operation can be deleted once its result is
    /// unused.
    #[must_use]
    pub fn is_removable_if_unused(&self) -> bool {
        matches!(
            self,
            Self::Const { .. }
                | Self::ConstClass { .. }
                | Self::NewArrayFilled { .. }
                | Self::NewUnboxedEnumInstance { .. }
                | Self::Nop
        )
    }
}

fn join(vars: &[SsaVarId]) -> String {
    vars.iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

impl fmt::Display for SsaOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Const { dest, value } => write!(f, "{dest} = const {value}"),
            Self::ConstClass { dest, ty } => write!(f, "{dest} = const-class {ty:?}"),
            Self::Binary {
                dest,
                op,
                left,
                right,
            } => write!(f, "{dest} = {op} {left}, {right}"),
            Self::If {
                kind,
                left,
                right: Some(right),
                true_target,
                false_target,
            } => write!(f, "if-{kind} {left}, {right} B{true_target} B{false_target}"),
            Self::If {
                kind,
                left,
                right: None,
                true_target,
                false_target,
            } => write!(f, "if-{kind}z {left} B{true_target} B{false_target}"),
            Self::Jump { target } => write!(f, "goto B{target}"),
            Self::Switch {
                value,
                targets,
                default,
            } => {
                write!(f, "switch {value} [")?;
                for (i, (key, target)) in targets.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{key} -> B{target}")?;
                }
                write!(f, "] default B{default}")
            }
            Self::Return { value: Some(value) } => write!(f, "return {value}"),
            Self::Return { value: None } => f.write_str("return"),
            Self::Throw { exception } => write!(f, "throw {exception}"),
            Self::LoadField {
                dest,
                object,
                field,
            } => write!(f, "{dest} = iget {object}.{field:?}"),
            Self::StoreField {
                object,
                field,
                value,
            } => write!(f, "iput {object}.{field:?} = {value}"),
            Self::LoadStaticField { dest, field } => write!(f, "{dest} = sget {field:?}"),
            Self::StoreStaticField { field, value } => write!(f, "sput {field:?} = {value}"),
            Self::LoadElement {
                dest,
                array,
                index,
                kind,
            } => write!(f, "{dest} = aget-{kind} {array}[{index}]"),
            Self::StoreElement {
                array,
                index,
                value,
                kind,
            } => write!(f, "aput-{kind} {array}[{index}] = {value}"),
            Self::ArrayLength { dest, array } => write!(f, "{dest} = array-length {array}"),
            Self::NewArray { dest, ty, size } => write!(f, "{dest} = new-array {ty:?}[{size}]"),
            Self::NewArrayFilled { dest, ty, elements } => {
                write!(f, "{dest} = new-array-filled {ty:?} {{{}}}", join(elements))
            }
            Self::NewInstance { dest, ty } => write!(f, "{dest} = new-instance {ty:?}"),
            Self::CheckCast { dest, object, ty } => {
                write!(f, "{dest} = check-cast {object} {ty:?}")
            }
            Self::InstanceOf { dest, object, ty } => {
                write!(f, "{dest} = instance-of {object} {ty:?}")
            }
            Self::Invoke {
                dest,
                kind,
                method,
                args,
            } => {
                if let Some(dest) = dest {
                    write!(f, "{dest} = ")?;
                }
                write!(f, "invoke-{kind} {method:?}({})", join(args))
            }
            Self::InvokeCustom {
                dest,
                call_site,
                args,
            } => {
                if let Some(dest) = dest {
                    write!(f, "{dest} = ")?;
                }
                write!(f, "invoke-custom {}({})", call_site.name, join(args))
            }
            Self::NewUnboxedEnumInstance { dest, ty, ordinal } => {
                write!(f, "{dest} = new-unboxed-enum {ty:?} #{ordinal}")
            }
            Self::Nop => f.write_str("nop"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_uses_and_replace() {
        let (v0, v1, v2) = (SsaVarId::new(0), SsaVarId::new(1), SsaVarId::new(2));
        let mut op = SsaOp::Binary {
            dest: v2,
            op: BinaryOp::Add,
            left: v0,
            right: v0,
        };
        assert_eq!(op.uses(), vec![v0, v0]);
        assert_eq!(op.replace_uses(v0, v1), 2);
        assert_eq!(op.uses(), vec![v1, v1]);
        assert_eq!(op.dest(), Some(v2));
        assert_eq!(op.to_string(), "v2 = add v1, v1");
    }

    #[test]
    fn test_terminators() {
        let v0 = SsaVarId::new(0);
        let branch = SsaOp::If {
            kind: CmpKind::Eq,
            left: v0,
            right: None,
            true_target: 1,
            false_target: 2,
        };
        assert!(branch.is_terminator());
        assert_eq!(branch.successors(), vec![1, 2]);

        let switch = SsaOp::Switch {
            value: v0,
            targets: vec![(1, 3), (2, 4)],
            default: 5,
        };
        assert_eq!(switch.successors(), vec![3, 4, 5]);
        assert!(!SsaOp::Nop.is_terminator());
    }

    #[test]
    fn test_removable_if_unused() {
        let v0 = SsaVarId::new(0);
        assert!(SsaOp::Const {
            dest: v0,
            value: ConstValue::Int(1)
        }
        .is_removable_if_unused());

        let symbols = crate::program::symbols::Symbols::new();
        let holder = symbols.class("com.example.Main");
        let method = symbols.method(holder, "run", symbols.proto(symbols.ty("V"), &[]));
        assert!(!SsaOp::Invoke {
            dest: Some(v0),
            kind: InvokeKind::Static,
            method,
            args: vec![],
        }
        .is_removable_if_unused());
    }
}
