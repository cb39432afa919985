//! Rewrites method bodies to operate on unboxed enum values.
//!
//! Runs after the [`crate::compiler::LensCodeRewriter`] has brought a body up
//! to date with the enum unboxing lens. At that point every variable that
//! used to hold an enum is an `int`, but the instructions still behave as if
//! it were an object: they read `$VALUES`, call `ordinal()`, compare against
//! `null`, cast to the enum class. This module turns each of them into its
//! integer counterpart, usually a call to a utility method.
//!
//! Utility methods are only *referenced* while bodies are rewritten, so the
//! rewriter can run on many methods at once. [`EnumUnboxingRewriter::materialize`]
//! builds the requested ones afterwards.

use std::{
    collections::{HashMap, HashSet},
    sync::Arc,
};

use dashmap::DashMap;
use log::{debug, trace};

use crate::{
    analysis::{
        ssa::{ConstValue, InvokeKind, MemberKind, SsaFunction, SsaOp, SsaType, SsaVarId, VariableOrigin},
        DefUseIndex,
    },
    compiler::{CompilerContext, EventKind, EventLog},
    enums::{
        treefixer::CheckNotZeroMethods,
        utility::{EnumUnboxingUtilityClasses, UtilityMethodKind},
        EnumDataMap, InstanceFieldData,
    },
    program::{
        app::AppView,
        class::{AccessFlags, MethodDef},
        known::KnownRefs,
        symbols::{FieldRef, MethodRef, Symbols, TypeRef},
    },
    Result,
};

/// Rewrites the instructions of reprocessed methods.
///
/// Immutable once built, apart from the set of requested utility methods.
#[derive(Debug)]
pub struct EnumUnboxingRewriter {
    symbols: Arc<Symbols>,
    known: KnownRefs,
    data: Arc<EnumDataMap>,
    utilities: Option<EnumUnboxingUtilityClasses>,
    check_not_zero: CheckNotZeroMethods,
    requested: DashMap<MethodRef, UtilityMethodKind>,
}

impl EnumUnboxingRewriter {
    /// A rewriter for a program where nothing was unboxed.
    #[must_use]
    pub fn empty(app: &AppView) -> Self {
        Self {
            symbols: app.symbols_arc(),
            known: app.known().clone(),
            data: Arc::new(EnumDataMap::empty()),
            utilities: None,
            check_not_zero: CheckNotZeroMethods::default(),
            requested: DashMap::new(),
        }
    }

    /// Creates a rewriter for the unboxed enums in `data`.
    #[must_use]
    pub fn new(
        app: &AppView,
        data: Arc<EnumDataMap>,
        utilities: EnumUnboxingUtilityClasses,
        check_not_zero: CheckNotZeroMethods,
    ) -> Self {
        Self {
            symbols: app.symbols_arc(),
            known: app.known().clone(),
            data,
            utilities: Some(utilities),
            check_not_zero,
            requested: DashMap::new(),
        }
    }

    /// The data of the unboxed enums.
    #[must_use]
    pub fn data(&self) -> &Arc<EnumDataMap> {
        &self.data
    }

    /// The utility classes, unless nothing was unboxed.
    #[must_use]
    pub fn utilities(&self) -> Option<&EnumUnboxingUtilityClasses> {
        self.utilities.as_ref()
    }

    /// Utility methods requested so far, sorted.
    #[must_use]
    pub fn requested_methods(&self) -> Vec<MethodRef> {
        let mut methods: Vec<MethodRef> = self.requested.iter().map(|e| *e.key()).collect();
        methods.sort_by_cached_key(|m| self.symbols.method_sort_key(*m));
        methods
    }

    fn helper(&self, kind: UtilityMethodKind) -> Result<MethodRef> {
        let utilities = self
            .utilities
            .as_ref()
            .ok_or_else(|| invariant_error!("{} requested without unboxed enums", kind.label()))?;
        let method = kind.reference(&self.symbols, &self.known, utilities)?;
        self.requested.entry(method).or_insert(kind);
        Ok(method)
    }

    /// The helper reading `field` of an unboxed value of `rep`.
    fn field_helper(&self, rep: TypeRef, field: FieldRef) -> Result<MethodRef> {
        let symbols = &self.symbols;
        if field == self.known.enum_ordinal_field {
            return self.helper(UtilityMethodKind::Ordinal);
        }
        let data = self
            .data
            .data(rep)
            .ok_or_else(|| invariant_error!("{} is not unboxed", symbols.source_name(rep)))?;

        // Reads through a constant class name the field on its own holder.
        let field = if data.instance_field(field).is_some() {
            field
        } else {
            symbols.field(rep, symbols.field_name(field), symbols.field_type(field))
        };
        match data.instance_field(field) {
            Some(InstanceFieldData::OrdinalDerived) => self.helper(UtilityMethodKind::Ordinal),
            Some(InstanceFieldData::Mapping(_)) => {
                self.helper(UtilityMethodKind::FieldAccessor { enum_ty: rep, field })
            }
            None => Err(invariant_error!(
                "no data for {} of {}",
                symbols.field_to_source(field),
                symbols.source_name(rep)
            )),
        }
    }

    /// Rewrites `ssa`, the body of `method`, in place.
    ///
    /// `original_types` holds the type every variable had before the lens
    /// retyped it. Returns `true` if the body changed.
    ///
    /// # Errors
    ///
    /// Returns an invariant violation if `method` still belongs to an unboxed
    /// class, if a read has no data to be rewritten with, or if the rewritten
    /// body fails verification.
    pub fn rewrite_code(
        &self,
        ssa: &mut SsaFunction,
        method: MethodRef,
        original_types: &HashMap<SsaVarId, TypeRef>,
        events: &EventLog,
    ) -> Result<bool> {
        if self.data.is_empty() {
            return Ok(false);
        }
        let holder = self.symbols.method_holder(method);
        if self.data.is_unboxed(holder) {
            return Err(invariant_error!(
                "{} still belongs to unboxed {}",
                self.symbols.method_to_source(method),
                self.symbols.source_name(holder)
            ));
        }

        let mut scope = MethodRewrite::new(self, method, original_types, ssa);
        scope.rewrite_phis(ssa);
        scope.rewrite_instructions(ssa)?;
        scope.finish(ssa)?;

        if scope.rewritten > 0 {
            debug!(
                "enum unboxing: rewrote {} instructions in {}",
                scope.rewritten,
                self.symbols.method_to_source(method)
            );
            events
                .record(EventKind::InstructionRewritten)
                .method(method)
                .message(format!("{} instructions", scope.rewritten));
        }
        if scope.materialized > 0 {
            events
                .record(EventKind::ConstantMaterialized)
                .method(method)
                .message(format!("{} unboxed constants", scope.materialized));
        }
        if scope.elided_clones > 0 {
            events
                .record(EventKind::CloneElided)
                .method(method)
                .message(format!("{} clones of $VALUES", scope.elided_clones));
        }
        ssa.verify()?;
        Ok(scope.rewritten > 0)
    }

    /// Builds every requested utility method and adds it to its class.
    ///
    /// # Errors
    ///
    /// Returns an invariant violation if a helper's class is missing or the
    /// data lacks what the helper reads.
    pub fn materialize(&self, app: &mut AppView, ctx: &CompilerContext) -> Result<()> {
        let Some(utilities) = &self.utilities else {
            return Ok(());
        };
        let symbols = Arc::clone(&self.symbols);
        let mut requested: Vec<(MethodRef, UtilityMethodKind)> = self
            .requested
            .iter()
            .map(|entry| (*entry.key(), *entry.value()))
            .collect();
        requested.sort_by_cached_key(|(m, _)| symbols.method_sort_key(*m));

        for (method, kind) in requested {
            if ctx.has_ssa(method) {
                continue;
            }
            let body = kind.build_body(&symbols, &self.known, &self.data, utilities)?;
            let holder = symbols.method_holder(method);
            let class = app.class_mut(holder).ok_or_else(|| {
                invariant_error!("missing utility class {}", symbols.source_name(holder))
            })?;
            class.methods.push(MethodDef::new(
                method,
                AccessFlags::PUBLIC | AccessFlags::STATIC | AccessFlags::SYNTHETIC,
            ));
            ctx.set_ssa(method, body);
            ctx.events
                .record(EventKind::UtilityMethodSynthesized)
                .method(method)
                .message(format!("{}: {}", kind.label(), symbols.method_to_source(method)));
        }
        Ok(())
    }
}

/// State of one body being rewritten.
struct MethodRewrite<'a> {
    rewriter: &'a EnumUnboxingRewriter,
    symbols: &'a Symbols,
    known: &'a KnownRefs,
    data: &'a EnumDataMap,
    method: MethodRef,
    original_types: &'a HashMap<SsaVarId, TypeRef>,
    index: DefUseIndex,
    /// Values that became unboxed during this rewrite.
    converted: HashMap<SsaVarId, TypeRef>,
    const_classes: HashMap<SsaVarId, TypeRef>,
    values_reads: HashSet<SsaVarId>,
    redirects: HashMap<SsaVarId, SsaVarId>,
    zero: Option<SsaVarId>,
    rewritten: usize,
    materialized: usize,
    elided_clones: usize,
}

impl<'a> MethodRewrite<'a> {
    fn new(
        rewriter: &'a EnumUnboxingRewriter,
        method: MethodRef,
        original_types: &'a HashMap<SsaVarId, TypeRef>,
        ssa: &SsaFunction,
    ) -> Self {
        let data = rewriter.data.as_ref();
        let symbols = rewriter.symbols.as_ref();
        let mut const_classes = HashMap::new();
        let mut values_reads = HashSet::new();
        for (_, instr) in ssa.instructions() {
            match instr.op() {
                SsaOp::ConstClass { dest, ty } => {
                    const_classes.insert(*dest, *ty);
                }
                SsaOp::LoadStaticField { dest, field } => {
                    let is_values = data
                        .representative(symbols.field_holder(*field))
                        .and_then(|rep| data.data(rep))
                        .is_some_and(|d| d.is_values_field(*field));
                    if is_values {
                        values_reads.insert(*dest);
                    }
                }
                _ => {}
            }
        }
        Self {
            rewriter,
            symbols,
            known: &rewriter.known,
            data,
            method,
            original_types,
            index: DefUseIndex::build(ssa),
            converted: HashMap::new(),
            const_classes,
            values_reads,
            redirects: HashMap::new(),
            zero: None,
            rewritten: 0,
            materialized: 0,
            elided_clones: 0,
        }
    }

    /// The unboxed enum `var` stands for, if any.
    fn enum_type(&self, var: SsaVarId) -> Option<TypeRef> {
        if let Some(rep) = self.converted.get(&var) {
            return Some(*rep);
        }
        let original = *self.original_types.get(&var)?;
        if self.symbols.is_array(original) {
            return None;
        }
        self.data.representative(original)
    }

    /// Returns `true` if `var` used to be a one-dimensional enum array.
    fn is_enum_array(&self, var: SsaVarId) -> bool {
        self.original_types.get(&var).is_some_and(|ty| {
            self.symbols.array_nesting(*ty) == 1
                && self.data.is_unboxed(self.symbols.base_type(*ty))
        })
    }

    fn zero(&mut self, ssa: &mut SsaFunction) -> SsaVarId {
        *self
            .zero
            .get_or_insert_with(|| ssa.new_variable(SsaType::Int, VariableOrigin::Local))
    }

    /// Replaces a `null` operand with the shared zero constant.
    fn null_to_zero(&mut self, ssa: &mut SsaFunction, var: &mut SsaVarId) -> bool {
        if ssa.var_type(*var).is_null() {
            *var = self.zero(ssa);
            true
        } else {
            false
        }
    }

    fn redirect(&mut self, from: SsaVarId, to: SsaVarId) {
        self.redirects.insert(from, to);
    }

    fn mark_converted(&mut self, ssa: &mut SsaFunction, var: SsaVarId, rep: TypeRef) {
        ssa.set_var_type(var, SsaType::Int);
        self.converted.insert(var, rep);
    }

    fn rewrite_phis(&mut self, ssa: &mut SsaFunction) {
        let mut nulls: Vec<(usize, SsaVarId, SsaVarId)> = Vec::new();
        for (block, phi) in ssa.phis() {
            if self.enum_type(phi.result()).is_none() && !self.is_enum_array(phi.result()) {
                continue;
            }
            for operand in phi.operands() {
                if ssa.var_type(operand.value()).is_null() {
                    nulls.push((block, phi.result(), operand.value()));
                }
            }
        }
        for (block, result, null) in nulls {
            let zero = self.zero(ssa);
            if let Some(phi) = ssa
                .block_mut(block)
                .and_then(|b| b.phi_nodes_mut().iter_mut().find(|p| p.result() == result))
            {
                phi.replace_uses(null, zero);
                self.rewritten += 1;
            }
        }
    }

    fn rewrite_instructions(&mut self, ssa: &mut SsaFunction) -> Result<()> {
        let mut blocks = std::mem::take(ssa.blocks_mut());
        let mut result = Ok(());
        'blocks: for block in &mut blocks {
            let instructions = std::mem::take(block.instructions_mut());
            for instr in instructions {
                let before = instr.op().clone();
                let mut out = Vec::with_capacity(1);
                match self.rewrite_op(ssa, instr.into_op(), &mut out) {
                    Ok(true) => {
                        self.rewritten += 1;
                        trace!("enum unboxing: {before} -> {out:?}");
                    }
                    Ok(false) => {}
                    Err(error) => {
                        result = Err(error);
                        break 'blocks;
                    }
                }
                for op in out {
                    block.add_instruction(op.into());
                }
            }
        }
        *ssa.blocks_mut() = blocks;
        result
    }

    /// Rewrites one operation into `out`. Returns `true` if it changed.
    fn rewrite_op(&mut self, ssa: &mut SsaFunction, op: SsaOp, out: &mut Vec<SsaOp>) -> Result<bool> {
        let symbols = self.symbols;
        let known = self.known;
        let changed = match op {
            SsaOp::NewUnboxedEnumInstance { dest, ty, ordinal } => {
                let rep = self.data.representative(ty).unwrap_or(ty);
                self.mark_converted(ssa, dest, rep);
                self.materialized += 1;
                out.push(SsaOp::Const {
                    dest,
                    value: ConstValue::Int(ordinal + 1),
                });
                true
            }
            SsaOp::LoadStaticField { dest, field } => {
                let holder = symbols.field_holder(field);
                match self.data.representative(holder) {
                    Some(rep) => {
                        self.rewrite_static_read(ssa, dest, field, rep, out)?;
                        true
                    }
                    None => {
                        out.push(SsaOp::LoadStaticField { dest, field });
                        false
                    }
                }
            }
            SsaOp::LoadField { dest, object, field } => match self.enum_type(object) {
                Some(rep) => {
                    let helper = self.rewriter.field_helper(rep, field)?;
                    out.push(SsaOp::Invoke {
                        dest: Some(dest),
                        kind: InvokeKind::Static,
                        method: helper,
                        args: vec![object],
                    });
                    true
                }
                None => {
                    out.push(SsaOp::LoadField { dest, object, field });
                    false
                }
            },
            SsaOp::StoreField { object, field, mut value } => {
                let changed = symbols.field_type(field) == known.int && self.null_to_zero(ssa, &mut value);
                out.push(SsaOp::StoreField { object, field, value });
                changed
            }
            SsaOp::StoreStaticField { field, mut value } => {
                let changed = symbols.field_type(field) == known.int && self.null_to_zero(ssa, &mut value);
                out.push(SsaOp::StoreStaticField { field, value });
                changed
            }
            SsaOp::LoadElement { dest, array, index, kind } => {
                let enum_array = self.is_enum_array(array);
                out.push(SsaOp::LoadElement {
                    dest,
                    array,
                    index,
                    kind: if enum_array { MemberKind::Int } else { kind },
                });
                enum_array && kind != MemberKind::Int
            }
            SsaOp::StoreElement { array, index, mut value, kind } => {
                let enum_array = self.is_enum_array(array);
                let zeroed = enum_array && self.null_to_zero(ssa, &mut value);
                out.push(SsaOp::StoreElement {
                    array,
                    index,
                    value,
                    kind: if enum_array { MemberKind::Int } else { kind },
                });
                zeroed || (enum_array && kind != MemberKind::Int)
            }
            SsaOp::NewArrayFilled { dest, ty, mut elements } => {
                let mut changed = false;
                if self.is_enum_array(dest) {
                    for element in &mut elements {
                        changed |= self.null_to_zero(ssa, element);
                    }
                }
                out.push(SsaOp::NewArrayFilled { dest, ty, elements });
                changed
            }
            SsaOp::If {
                kind,
                mut left,
                right: Some(mut right),
                true_target,
                false_target,
            } => {
                let mut changed = false;
                if self.enum_type(left).is_some() || self.enum_type(right).is_some() {
                    changed |= self.null_to_zero(ssa, &mut left);
                    changed |= self.null_to_zero(ssa, &mut right);
                }
                out.push(SsaOp::If {
                    kind,
                    left,
                    right: Some(right),
                    true_target,
                    false_target,
                });
                changed
            }
            SsaOp::Return { value: Some(mut value) } => {
                let ret = symbols.proto_data(symbols.method_proto(self.method)).ret;
                let changed = ret == known.int && self.null_to_zero(ssa, &mut value);
                out.push(SsaOp::Return { value: Some(value) });
                changed
            }
            SsaOp::CheckCast { dest, object, ty } => {
                if ty == known.int || self.data.is_unboxed(ty) {
                    if let Some(rep) = self.enum_type(object) {
                        self.converted.insert(dest, rep);
                    }
                    self.redirect(dest, object);
                    true
                } else {
                    out.push(SsaOp::CheckCast { dest, object, ty });
                    false
                }
            }
            SsaOp::Invoke { dest, kind, method, args } => self.rewrite_invoke(ssa, dest, kind, method, args, out)?,
            SsaOp::InvokeCustom { dest, call_site, mut args } => {
                let params = symbols.proto_data(call_site.proto).params.clone();
                let mut changed = false;
                for (arg, param) in args.iter_mut().zip(params) {
                    if param == known.int {
                        changed |= self.null_to_zero(ssa, arg);
                    }
                }
                out.push(SsaOp::InvokeCustom { dest, call_site, args });
                changed
            }
            other => {
                out.push(other);
                false
            }
        };
        Ok(changed)
    }

    fn rewrite_static_read(
        &mut self,
        ssa: &mut SsaFunction,
        dest: SsaVarId,
        field: FieldRef,
        rep: TypeRef,
        out: &mut Vec<SsaOp>,
    ) -> Result<()> {
        let symbols = self.symbols;
        let data = self
            .data
            .data(rep)
            .ok_or_else(|| invariant_error!("{} is not unboxed", symbols.source_name(rep)))?;
        if data.is_values_field(field) {
            let size = data.values_size().ok_or_else(|| {
                invariant_error!("unknown size of {}", symbols.field_to_source(field))
            })?;
            let size = i32::try_from(size)
                .map_err(|_| invariant_error!("{} is too large", symbols.field_to_source(field)))?;
            let values = self.rewriter.helper(UtilityMethodKind::Values)?;
            let size_var = ssa.new_variable(SsaType::Int, VariableOrigin::Local);
            out.push(SsaOp::Const {
                dest: size_var,
                value: ConstValue::Int(size),
            });
            out.push(SsaOp::Invoke {
                dest: Some(dest),
                kind: InvokeKind::Static,
                method: values,
                args: vec![size_var],
            });
            return Ok(());
        }
        if let Some(value) = data.unboxed_value(field) {
            self.mark_converted(ssa, dest, rep);
            self.materialized += 1;
            out.push(SsaOp::Const {
                dest,
                value: ConstValue::Int(value),
            });
            return Ok(());
        }
        Err(invariant_error!(
            "read of {} has nothing to be rewritten with",
            symbols.field_to_source(field)
        ))
    }

    fn call(out: &mut Vec<SsaOp>, dest: Option<SsaVarId>, method: MethodRef, args: Vec<SsaVarId>) {
        out.push(SsaOp::Invoke {
            dest,
            kind: InvokeKind::Static,
            method,
            args,
        });
    }

    #[allow(clippy::too_many_lines)]
    fn rewrite_invoke(
        &mut self,
        ssa: &mut SsaFunction,
        dest: Option<SsaVarId>,
        kind: InvokeKind,
        method: MethodRef,
        mut args: Vec<SsaVarId>,
        out: &mut Vec<SsaOp>,
    ) -> Result<bool> {
        let symbols = self.symbols;
        let known = self.known;
        let rewriter = self.rewriter;
        let holder = symbols.method_holder(method);
        let first_enum = args.first().and_then(|a| self.enum_type(*a));

        // Methods of java.lang.Enum and java.lang.Object on an unboxed receiver.
        if let (true, Some(rep)) = (kind.has_receiver(), first_enum) {
            let library_holder =
                self.data.is_unboxed(holder) || holder == known.enum_type || holder == known.object;
            if library_holder {
                let same = |m: MethodRef| symbols.same_signature(method, m);
                let receiver = args[0];
                if same(known.enum_ordinal) || same(known.enum_hash_code) {
                    let ordinal = rewriter.helper(UtilityMethodKind::Ordinal)?;
                    Self::call(out, dest, ordinal, vec![receiver]);
                    return Ok(true);
                }
                if same(known.enum_equals) {
                    let equals = rewriter.helper(UtilityMethodKind::Equals)?;
                    for arg in &mut args {
                        self.null_to_zero(ssa, arg);
                    }
                    Self::call(out, dest, equals, args);
                    return Ok(true);
                }
                if same(known.enum_compare_to) || same(known.enum_compare_to_object) {
                    let compare = rewriter.helper(UtilityMethodKind::CompareTo)?;
                    for arg in &mut args {
                        self.null_to_zero(ssa, arg);
                    }
                    Self::call(out, dest, compare, args);
                    return Ok(true);
                }
                if same(known.enum_name) || same(known.enum_to_string) {
                    let name = rewriter.field_helper(rep, known.enum_name_field)?;
                    Self::call(out, dest, name, vec![receiver]);
                    return Ok(true);
                }
                if same(known.object_get_class) {
                    if dest.is_some_and(|d| !self.index.is_unused(d)) {
                        return Err(invariant_error!(
                            "getClass() of an unboxed value is used in {}",
                            symbols.method_to_source(self.method)
                        ));
                    }
                    let check = rewriter.helper(UtilityMethodKind::ZeroCheck)?;
                    Self::call(out, None, check, vec![receiver]);
                    return Ok(true);
                }
            }
        }

        if symbols.is_array(holder) && symbols.method_name(method) == "clone" {
            if let (Some(dest), Some(array)) = (dest, args.first()) {
                if self.values_reads.contains(array) {
                    self.redirect(dest, *array);
                    self.elided_clones += 1;
                    return Ok(true);
                }
            }
        }

        if method == known.enum_value_of {
            let class = args.first().and_then(|a| self.const_classes.get(a)).copied();
            if let (Some(class), Some(name)) = (class, args.get(1)) {
                if let Some(rep) = self.data.representative(class) {
                    let value_of = rewriter.helper(UtilityMethodKind::ValueOf { enum_ty: rep })?;
                    if let Some(dest) = dest {
                        self.mark_converted(ssa, dest, rep);
                    }
                    Self::call(out, dest, value_of, vec![*name]);
                    return Ok(true);
                }
            }
        }

        if let Some(rep) = first_enum {
            if method == known.objects_require_non_null || method == known.objects_require_non_null_message {
                let kind = if method == known.objects_require_non_null {
                    UtilityMethodKind::ZeroCheck
                } else {
                    UtilityMethodKind::ZeroCheckMessage
                };
                let check = rewriter.helper(kind)?;
                if let Some(dest) = dest {
                    self.converted.insert(dest, rep);
                    self.redirect(dest, args[0]);
                }
                Self::call(out, None, check, args);
                return Ok(true);
            }
            if method == known.objects_to_string || method == known.string_value_of {
                let value_of = rewriter.helper(UtilityMethodKind::StringValueOf { enum_ty: rep })?;
                Self::call(out, dest, value_of, args);
                return Ok(true);
            }
            if method == known.system_identity_hash_code {
                if let Some(dest) = dest {
                    self.redirect(dest, args[0]);
                }
                return Ok(true);
            }
        }

        if method == known.objects_equals && args.iter().any(|a| self.enum_type(*a).is_some()) {
            let equals = rewriter.helper(UtilityMethodKind::ObjectsEquals)?;
            for arg in &mut args {
                self.null_to_zero(ssa, arg);
            }
            Self::call(out, dest, equals, args);
            return Ok(true);
        }

        if let Some(builder) = known.string_building(holder) {
            let appended = args.get(1).and_then(|a| self.enum_type(*a));
            if let (true, Some(rep)) = (method == builder.append_object, appended) {
                let value_of = rewriter.helper(UtilityMethodKind::StringValueOf { enum_ty: rep })?;
                let string = ssa.new_variable(SsaType::Ref(known.string), VariableOrigin::Local);
                Self::call(out, Some(string), value_of, vec![args[1]]);
                out.push(SsaOp::Invoke {
                    dest,
                    kind,
                    method: builder.append_string,
                    args: vec![args[0], string],
                });
                return Ok(true);
            }
        }

        let mut changed = false;
        let mut method = method;
        if let Some(twin) = rewriter.check_not_zero.twin(method) {
            if args.iter().any(|a| self.enum_type(*a).is_some() || ssa.var_type(*a).is_null()) {
                method = twin;
                changed = true;
            }
        }

        // Null arguments to parameters that are now `int`.
        let offset = usize::from(kind.has_receiver());
        let params = symbols.proto_data(symbols.method_proto(method)).params.clone();
        for (arg, param) in args.iter_mut().skip(offset).zip(params) {
            if param == known.int {
                changed |= self.null_to_zero(ssa, arg);
            }
        }
        out.push(SsaOp::Invoke {
            dest,
            kind,
            method,
            args,
        });
        Ok(changed)
    }

    /// Applies the collected redirects, materializes the zero constant and
    /// fixes up `const-class` of unboxed types.
    fn finish(&mut self, ssa: &mut SsaFunction) -> Result<()> {
        let mut redirects: Vec<(SsaVarId, SsaVarId)> = self
            .redirects
            .keys()
            .map(|from| {
                let mut to = *from;
                let mut steps = 0;
                while let Some(next) = self.redirects.get(&to) {
                    to = *next;
                    steps += 1;
                    if steps > self.redirects.len() {
                        break;
                    }
                }
                (*from, to)
            })
            .collect();
        redirects.sort_by_key(|(from, _)| from.index());
        for (from, to) in redirects {
            if from == to {
                return Err(invariant_error!(
                    "cyclic redirect of {} in {}",
                    from,
                    self.symbols.method_to_source(self.method)
                ));
            }
            ssa.replace_all_uses(from, to);
        }

        self.rewrite_const_classes(ssa);

        if let Some(zero) = self.zero {
            ssa.prepend_to_entry(SsaOp::Const {
                dest: zero,
                value: ConstValue::Int(0),
            });
        }
        ssa.remove_unused_definitions(SsaOp::is_removable_if_unused);
        Ok(())
    }

    fn rewrite_const_classes(&mut self, ssa: &mut SsaFunction) {
        let symbols = self.symbols;
        let known = self.known;
        let Some(utilities) = self.rewriter.utilities.as_ref() else {
            return;
        };
        let index = DefUseIndex::build(ssa);
        let mut updates: Vec<(SsaVarId, TypeRef)> = Vec::new();
        for (var, ty) in &self.const_classes {
            let Some(rep) = self.data.representative(*ty) else {
                continue;
            };
            if index.is_unused(*var) {
                continue;
            }
            let only_array_creation = !index.has_phi_users(*var)
                && index.instruction_users(*var).iter().all(|loc| {
                    matches!(
                        ssa.instruction(*loc).map(|i| i.op()),
                        Some(SsaOp::Invoke { method, args, .. })
                            if *method == known.array_new_instance_dims && args.first() == Some(var)
                    )
                });
            let replacement = if only_array_creation {
                known.int
            } else {
                utilities.local_class(rep).unwrap_or(known.int)
            };
            updates.push((*var, replacement));
        }
        for block in ssa.blocks_mut() {
            for instr in block.instructions_mut() {
                if let SsaOp::ConstClass { dest, ty } = instr.op_mut() {
                    if let Some((_, replacement)) = updates.iter().find(|(v, _)| *v == *dest) {
                        trace!("enum unboxing: const-class {} -> {}", symbols.descriptor(*ty), symbols.descriptor(*replacement));
                        *ty = *replacement;
                        self.rewritten += 1;
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        analysis::ssa::CmpKind,
        enums::{unbox_program, EnumUnboxingConfig},
        program::builder::ProgramBuilder,
        test::{body_ops, color_enum, init_logging, static_method},
    };

    #[test]
    fn test_constant_and_ordinal_become_ints() {
        init_logging();
        let mut builder = ProgramBuilder::new();
        let known = builder.known().clone();
        let symbols = builder.symbols();
        let color = color_enum(&mut builder, &["RED", "GREEN"]);
        let ordinal = symbols.method_with_holder(known.enum_ordinal, color.ty);
        let green = color.constant(1);
        let method = static_method(&mut builder, "com.example.Main", "greenOrdinal", known.int, &[], |f| {
            f.block(0, |b| {
                let value = b.get_static(green);
                let result = b.call(InvokeKind::Virtual, ordinal, &[value]);
                b.ret_val(result);
            });
        });
        let (mut app, ctx) = builder.build();

        let summary = unbox_program(&mut app, &ctx, EnumUnboxingConfig::default()).unwrap();
        assert_eq!(summary.unboxed, vec![color.ty]);

        let body = body_ops(&ctx, method);
        assert!(body.iter().any(|op| matches!(
            op,
            SsaOp::Const {
                value: ConstValue::Int(2),
                ..
            }
        )));
        let helper = body
            .iter()
            .find_map(|op| match op {
                SsaOp::Invoke {
                    method,
                    kind: InvokeKind::Static,
                    ..
                } => Some(*method),
                _ => None,
            })
            .unwrap();
        assert_eq!(symbols.method_name(helper), "$enumboxing$ordinal");
        assert!(ctx.has_ssa(helper));
        assert!(ctx.events.has(EventKind::ConstantMaterialized));
        assert!(ctx.events.has(EventKind::UtilityMethodSynthesized));
    }

    #[test]
    fn test_null_comparison_uses_zero() {
        let mut builder = ProgramBuilder::new();
        let known = builder.known().clone();
        let color = color_enum(&mut builder, &["RED"]);
        let red = color.constant(0);
        let method = static_method(&mut builder, "com.example.Main", "isNull", known.boolean, &[], |f| {
            f.block(0, |b| {
                let value = b.get_static(red);
                let null = b.const_null();
                b.if_cmp(CmpKind::Eq, value, null, 1, 2);
            });
            f.block(1, |b| {
                let one = b.const_i32(1);
                b.ret_val(one);
            });
            f.block(2, |b| {
                let zero = b.const_i32(0);
                b.ret_val(zero);
            });
        });
        let (mut app, ctx) = builder.build();

        unbox_program(&mut app, &ctx, EnumUnboxingConfig::default()).unwrap();

        let body = body_ops(&ctx, method);
        assert!(!body.iter().any(|op| matches!(
            op,
            SsaOp::Const {
                value: ConstValue::Null,
                ..
            }
        )));
        let right = body
            .iter()
            .find_map(|op| match op {
                SsaOp::If { right, .. } => *right,
                _ => None,
            })
            .unwrap();
        let zero_defined = body.iter().any(|op| {
            matches!(op, SsaOp::Const { dest, value: ConstValue::Int(0) } if *dest == right)
        });
        assert!(zero_defined);
    }

    #[test]
    fn test_empty_rewriter_leaves_body_alone() {
        let mut builder = ProgramBuilder::new();
        let known = builder.known().clone();
        let method = static_method(&mut builder, "com.example.Main", "one", known.int, &[], |f| {
            f.block(0, |b| {
                let one = b.const_i32(1);
                b.ret_val(one);
            });
        });
        let (app, ctx) = builder.build();

        let rewriter = EnumUnboxingRewriter::empty(&app);
        let mut ssa = ctx.take_ssa(method).unwrap();
        let changed = rewriter
            .rewrite_code(&mut ssa, method, &HashMap::new(), &ctx.events)
            .unwrap();
        assert!(!changed);
        assert!(rewriter.requested_methods().is_empty());
    }
}
