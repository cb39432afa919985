//! Builder pattern for programmatic SSA construction.
//!
//! This module provides a fluent API for building SSA functions without the
//! boilerplate of manual block and variable management. It is used to:
//!
//! - write unit tests for analyses and rewrites
//! - synthesize utility method bodies during enum unboxing
//! - build method bodies in [`crate::program::ProgramBuilder`]
//!
//! # Design
//!
//! The builder uses a closure-based API where all blocks are defined within
//! a single expression, making the CFG structure visually clear:
//!
//! ```rust,ignore
//! let ssa = SsaFunctionBuilder::new(&symbols, &[int]).build_with(|f| {
//!     let x = f.arg(0);
//!     f.block(0, |b| b.if_z(CmpKind::Eq, x, 1, 2));
//!     f.block(1, |b| b.ret());
//!     f.block(2, |b| b.ret());
//! });
//! ```
//!
//! # Variable Typing
//!
//! Result variables are typed from the symbol table: a field load gets the
//! field's type, an invoke gets the method's return type, an array load gets
//! the element type of the array operand.

use std::{collections::HashMap, sync::Arc};

use crate::{
    analysis::ssa::{
        BinaryOp, CallSite, CmpKind, ConstValue, InvokeKind, MemberKind, PhiNode, PhiOperand,
        SsaBlock, SsaFunction, SsaInstruction, SsaOp, SsaType, SsaVarId, VariableOrigin,
    },
    program::symbols::{FieldRef, MethodRef, Symbols, TypeRef},
};

/// Builder for constructing SSA functions programmatically.
///
/// # Examples
///
/// ```rust,ignore
/// use enumbox::analysis::ssa::SsaFunctionBuilder;
///
/// // return arg0 + arg1
/// let ssa = SsaFunctionBuilder::new(&symbols, &[int, int]).build_with(|f| {
///     let (a, b) = (f.arg(0), f.arg(1));
///     f.block(0, |blk| {
///         let sum = blk.add(a, b);
///         blk.ret_val(sum);
///     });
/// });
/// ```
pub struct SsaFunctionBuilder<'s> {
    symbols: &'s Symbols,
    func: SsaFunction,
    blocks: HashMap<usize, SsaBlock>,
    max_block_id: usize,
}

impl<'s> SsaFunctionBuilder<'s> {
    /// Creates a builder whose arguments have the given JVM types
    /// (receiver first for instance methods).
    #[must_use]
    pub fn new(symbols: &'s Symbols, params: &[TypeRef]) -> Self {
        let types: Vec<SsaType> = params
            .iter()
            .map(|p| SsaType::from_type(symbols, *p))
            .collect();
        Self {
            symbols,
            func: SsaFunction::with_arguments(&types),
            blocks: HashMap::new(),
            max_block_id: 0,
        }
    }

    /// Builds the SSA function using a closure that defines all blocks.
    pub fn build_with<F>(mut self, f: F) -> SsaFunction
    where
        F: FnOnce(&mut SsaFunctionContext<'_, 's>),
    {
        let mut ctx = SsaFunctionContext { builder: &mut self };
        f(&mut ctx);
        self.build()
    }

    fn build(mut self) -> SsaFunction {
        for id in 0..=self.max_block_id {
            let block = self.blocks.remove(&id).unwrap_or_else(|| SsaBlock::new(id));
            self.func.add_block(block);
        }
        self.func
    }

    fn alloc(&mut self, ty: SsaType, origin: VariableOrigin) -> SsaVarId {
        self.func.new_variable(ty, origin)
    }

    fn ty(&self, ty: TypeRef) -> SsaType {
        SsaType::from_type(self.symbols, ty)
    }
}

/// Context passed to the build closure for defining blocks.
pub struct SsaFunctionContext<'a, 's> {
    builder: &'a mut SsaFunctionBuilder<'s>,
}

impl<'s> SsaFunctionContext<'_, 's> {
    /// Gets the argument variable at the specified index.
    ///
    /// # Panics
    ///
    /// Panics if `index` is out of range.
    #[must_use]
    pub fn arg(&self, index: usize) -> SsaVarId {
        self.builder.func.arguments()[index]
    }

    /// Returns the symbol table.
    #[must_use]
    pub fn symbols(&self) -> &'s Symbols {
        self.builder.symbols
    }

    /// Allocates a variable before its definition (for phi results defined
    /// in a later block, or for ops added through [`SsaBlockBuilder::op`]).
    #[must_use]
    pub fn var(&mut self, ty: SsaType) -> SsaVarId {
        self.builder.alloc(ty, VariableOrigin::Local)
    }

    /// Defines a block with the given ID using a closure.
    pub fn block<F>(&mut self, id: usize, f: F)
    where
        F: FnOnce(&mut SsaBlockBuilder<'_, 's>),
    {
        if id > self.builder.max_block_id {
            self.builder.max_block_id = id;
        }
        let mut block = SsaBlock::new(id);
        let mut block_builder = SsaBlockBuilder {
            builder: self.builder,
            block: &mut block,
        };
        f(&mut block_builder);
        self.builder.blocks.insert(id, block);
    }
}

/// Builder for constructing individual SSA blocks.
pub struct SsaBlockBuilder<'a, 's> {
    builder: &'a mut SsaFunctionBuilder<'s>,
    block: &'a mut SsaBlock,
}

impl SsaBlockBuilder<'_, '_> {
    fn push(&mut self, op: SsaOp) {
        self.block.add_instruction(SsaInstruction::new(op));
    }

    fn local(&mut self, ty: SsaType) -> SsaVarId {
        self.builder.alloc(ty, VariableOrigin::Local)
    }

    // ── Constants ──────────────────────────────────────────────────────

    /// Adds: dest = const i32
    pub fn const_i32(&mut self, value: i32) -> SsaVarId {
        self.const_val(ConstValue::Int(value))
    }

    /// Adds: dest = const "string"
    pub fn const_str(&mut self, value: &str) -> SsaVarId {
        self.const_val(ConstValue::String(Arc::from(value)))
    }

    /// Adds: dest = const null
    pub fn const_null(&mut self) -> SsaVarId {
        self.const_val(ConstValue::Null)
    }

    /// Adds a constant of any kind.
    pub fn const_val(&mut self, value: ConstValue) -> SsaVarId {
        let string = self.builder.symbols.class("java.lang.String");
        let dest = self.local(value.ssa_type(SsaType::Ref(string)));
        self.push(SsaOp::Const { dest, value });
        dest
    }

    /// Adds: dest = const-class ty
    pub fn const_class(&mut self, ty: TypeRef) -> SsaVarId {
        let class = self.builder.symbols.class("java.lang.Class");
        let dest = self.local(SsaType::Ref(class));
        self.push(SsaOp::ConstClass { dest, ty });
        dest
    }

    // ── Arithmetic ─────────────────────────────────────────────────────

    /// Adds an integer binary operation.
    pub fn binary(&mut self, op: BinaryOp, left: SsaVarId, right: SsaVarId) -> SsaVarId {
        let dest = self.local(SsaType::Int);
        self.push(SsaOp::Binary {
            dest,
            op,
            left,
            right,
        });
        dest
    }

    /// Adds: dest = add left, right
    pub fn add(&mut self, left: SsaVarId, right: SsaVarId) -> SsaVarId {
        self.binary(BinaryOp::Add, left, right)
    }

    /// Adds: dest = sub left, right
    pub fn sub(&mut self, left: SsaVarId, right: SsaVarId) -> SsaVarId {
        self.binary(BinaryOp::Sub, left, right)
    }

    // ── Control flow ───────────────────────────────────────────────────

    /// Compares `value` against zero (or null).
    pub fn if_z(&mut self, kind: CmpKind, value: SsaVarId, true_target: usize, false_target: usize) {
        self.push(SsaOp::If {
            kind,
            left: value,
            right: None,
            true_target,
            false_target,
        });
    }

    /// Compares two values.
    pub fn if_cmp(
        &mut self,
        kind: CmpKind,
        left: SsaVarId,
        right: SsaVarId,
        true_target: usize,
        false_target: usize,
    ) {
        self.push(SsaOp::If {
            kind,
            left,
            right: Some(right),
            true_target,
            false_target,
        });
    }

    /// Adds: goto target
    pub fn jump(&mut self, target: usize) {
        self.push(SsaOp::Jump { target });
    }

    /// Adds a keyed switch.
    pub fn switch(&mut self, value: SsaVarId, targets: &[(i32, usize)], default: usize) {
        self.push(SsaOp::Switch {
            value,
            targets: targets.to_vec(),
            default,
        });
    }

    /// Adds: return
    pub fn ret(&mut self) {
        self.push(SsaOp::Return { value: None });
    }

    /// Adds: return value
    pub fn ret_val(&mut self, value: SsaVarId) {
        self.push(SsaOp::Return { value: Some(value) });
    }

    /// Adds: throw exception
    pub fn throw(&mut self, exception: SsaVarId) {
        self.push(SsaOp::Throw { exception });
    }

    // ── Fields ─────────────────────────────────────────────────────────

    /// Adds: dest = object.field
    pub fn get_field(&mut self, object: SsaVarId, field: FieldRef) -> SsaVarId {
        let field_ty = self.builder.symbols.field_type(field);
        let ty = self.builder.ty(field_ty);
        let dest = self.local(ty);
        self.push(SsaOp::LoadField {
            dest,
            object,
            field,
        });
        dest
    }

    /// Adds: object.field = value
    pub fn put_field(&mut self, object: SsaVarId, field: FieldRef, value: SsaVarId) {
        self.push(SsaOp::StoreField {
            object,
            field,
            value,
        });
    }

    /// Adds: dest = Holder.field
    pub fn get_static(&mut self, field: FieldRef) -> SsaVarId {
        let field_ty = self.builder.symbols.field_type(field);
        let ty = self.builder.ty(field_ty);
        let dest = self.local(ty);
        self.push(SsaOp::LoadStaticField { dest, field });
        dest
    }

    /// Adds: Holder.field = value
    pub fn put_static(&mut self, field: FieldRef, value: SsaVarId) {
        self.push(SsaOp::StoreStaticField { field, value });
    }

    // ── Arrays ─────────────────────────────────────────────────────────

    /// Adds: dest = array[index], typed from the array's element type.
    pub fn aget(&mut self, array: SsaVarId, index: SsaVarId, kind: MemberKind) -> SsaVarId {
        let ty = match self.builder.func.var_type(array) {
            SsaType::Ref(array_ty) => self
                .builder
                .symbols
                .element_type(array_ty)
                .map_or(SsaType::Unknown, |e| self.builder.ty(e)),
            _ => SsaType::Unknown,
        };
        let dest = self.local(ty);
        self.push(SsaOp::LoadElement {
            dest,
            array,
            index,
            kind,
        });
        dest
    }

    /// Adds: array[index] = value
    pub fn aput(&mut self, array: SsaVarId, index: SsaVarId, value: SsaVarId, kind: MemberKind) {
        self.push(SsaOp::StoreElement {
            array,
            index,
            value,
            kind,
        });
    }

    /// Adds: dest = array-length array
    pub fn array_length(&mut self, array: SsaVarId) -> SsaVarId {
        let dest = self.local(SsaType::Int);
        self.push(SsaOp::ArrayLength { dest, array });
        dest
    }

    /// Adds: dest = new ty[size], where `ty` is the array type.
    pub fn new_array(&mut self, ty: TypeRef, size: SsaVarId) -> SsaVarId {
        let dest = self.local(SsaType::Ref(ty));
        self.push(SsaOp::NewArray { dest, ty, size });
        dest
    }

    /// Adds: dest = new ty { elements }, where `ty` is the array type.
    pub fn new_array_filled(&mut self, ty: TypeRef, elements: &[SsaVarId]) -> SsaVarId {
        let dest = self.local(SsaType::Ref(ty));
        self.push(SsaOp::NewArrayFilled {
            dest,
            ty,
            elements: elements.to_vec(),
        });
        dest
    }

    // ── Objects ────────────────────────────────────────────────────────

    /// Adds: dest = new-instance ty
    pub fn new_instance(&mut self, ty: TypeRef) -> SsaVarId {
        let dest = self.local(SsaType::Ref(ty));
        self.push(SsaOp::NewInstance { dest, ty });
        dest
    }

    /// Adds: dest = (ty) object
    pub fn check_cast(&mut self, object: SsaVarId, ty: TypeRef) -> SsaVarId {
        let dest = self.local(SsaType::Ref(ty));
        self.push(SsaOp::CheckCast { dest, object, ty });
        dest
    }

    /// Adds: dest = object instanceof ty
    pub fn instance_of(&mut self, object: SsaVarId, ty: TypeRef) -> SsaVarId {
        let dest = self.local(SsaType::Int);
        self.push(SsaOp::InstanceOf { dest, object, ty });
        dest
    }

    // ── Calls ──────────────────────────────────────────────────────────

    /// Adds an invoke whose result is used.
    pub fn call(&mut self, kind: InvokeKind, method: MethodRef, args: &[SsaVarId]) -> SsaVarId {
        let symbols = self.builder.symbols;
        let ret = symbols.proto_data(symbols.method_proto(method)).ret;
        let ty = self.builder.ty(ret);
        let dest = self.local(ty);
        self.push(SsaOp::Invoke {
            dest: Some(dest),
            kind,
            method,
            args: args.to_vec(),
        });
        dest
    }

    /// Adds an invoke without a result.
    pub fn call_void(&mut self, kind: InvokeKind, method: MethodRef, args: &[SsaVarId]) {
        self.push(SsaOp::Invoke {
            dest: None,
            kind,
            method,
            args: args.to_vec(),
        });
    }

    /// Adds an invoke-custom whose result is used.
    pub fn invoke_custom(&mut self, call_site: Arc<CallSite>, args: &[SsaVarId]) -> SsaVarId {
        let ret = self.builder.symbols.proto_data(call_site.proto).ret;
        let ty = self.builder.ty(ret);
        let dest = self.local(ty);
        self.push(SsaOp::InvokeCustom {
            dest: Some(dest),
            call_site,
            args: args.to_vec(),
        });
        dest
    }

    // ── Phis and raw ops ───────────────────────────────────────────────

    /// Adds a phi node and returns the result variable.
    ///
    /// # Arguments
    ///
    /// * `ty` - Type of the merged value
    /// * `operands` - Pairs of (predecessor_block_id, value) for each incoming edge
    pub fn phi(&mut self, ty: SsaType, operands: &[(usize, SsaVarId)]) -> SsaVarId {
        let result = self.builder.alloc(ty, VariableOrigin::Phi);
        self.phi_into(result, operands);
        result
    }

    /// Adds a phi node defining a variable allocated earlier with
    /// [`SsaFunctionContext::var`].
    pub fn phi_into(&mut self, result: SsaVarId, operands: &[(usize, SsaVarId)]) {
        let mut phi = PhiNode::new(result);
        for &(pred, value) in operands {
            phi.add_operand(PhiOperand::new(value, pred));
        }
        self.block.add_phi(phi);
    }

    /// Adds a raw SsaOp (for cases not covered by helpers).
    pub fn op(&mut self, op: SsaOp) {
        self.push(op);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_simple_function() {
        let symbols = Symbols::new();
        let int = symbols.ty("I");
        let ssa = SsaFunctionBuilder::new(&symbols, &[int, int]).build_with(|f| {
            let (a, b) = (f.arg(0), f.arg(1));
            f.block(0, |blk| {
                let sum = blk.add(a, b);
                blk.ret_val(sum);
            });
        });

        assert_eq!(ssa.block_count(), 1);
        assert_eq!(ssa.arguments().len(), 2);
        assert_eq!(ssa.instruction_count(), 2);
        assert!(ssa.verify().is_ok());
    }

    #[test]
    fn test_result_types_follow_symbols() {
        let symbols = Symbols::new();
        let color = symbols.class("com.example.Color");
        let values = symbols.field(color, "$VALUES", symbols.array_of(color));
        let ordinal = symbols.method(color, "ordinal", symbols.proto(symbols.ty("I"), &[]));

        let mut element = None;
        let mut ord = None;
        let ssa = SsaFunctionBuilder::new(&symbols, &[]).build_with(|f| {
            f.block(0, |b| {
                let arr = b.get_static(values);
                let zero = b.const_i32(0);
                let e = b.aget(arr, zero, MemberKind::Object);
                element = Some(e);
                ord = Some(b.call(InvokeKind::Virtual, ordinal, &[e]));
                b.ret();
            });
        });

        assert_eq!(ssa.var_type(element.unwrap()), SsaType::Ref(color));
        assert_eq!(ssa.var_type(ord.unwrap()), SsaType::Int);
    }

    #[test]
    fn test_forward_phi() {
        let symbols = Symbols::new();
        let int = symbols.ty("I");
        let ssa = SsaFunctionBuilder::new(&symbols, &[int]).build_with(|f| {
            let x = f.arg(0);
            let merged = f.var(SsaType::Int);
            f.block(0, |b| b.if_z(CmpKind::Eq, x, 1, 2));
            f.block(1, |b| b.jump(3));
            f.block(2, |b| b.jump(3));
            f.block(3, |b| {
                b.phi_into(merged, &[(1, x), (2, x)]);
                b.ret_val(merged);
            });
        });
        assert!(ssa.verify().is_ok());
        assert_eq!(ssa.phis().count(), 1);
    }
}
