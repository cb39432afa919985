//! Per-method eligibility analysis.
//!
//! The analysis of one method body looks at three things:
//!
//! - every instruction that mentions a candidate type on its own (field
//!   accesses on an enum, static enum calls, casts, `const-class`,
//!   `invoke-custom`, allocations),
//! - every user of every value whose type is a candidate or an array of one,
//! - every user of a `null` that ends up where an enum is expected.
//!
//! Each legal use marks the method as a dependency of the enum; each illegal
//! use reports a [`Reason`]. Methods are analyzed concurrently, so all
//! results go straight into the shared registry.

use std::collections::HashSet;

use crate::{
    analysis::{
        ssa::{CallSite, HandleMember, InvokeKind, SsaFunction, SsaOp, SsaType, SsaVarId},
        DefUseIndex, Definition, Location,
    },
    enums::{unboxer::EnumUnboxer, Reason},
    program::{
        app::AppView,
        class::{is_initializer_name, ClassOrigin, MethodDef},
        known::KnownRefs,
        symbols::{FieldRef, MethodRef, ProtoRef, Symbols, TypeRef},
    },
    Result,
};

/// One method under analysis.
struct MethodScope<'a> {
    app: &'a AppView,
    symbols: &'a Symbols,
    known: &'a KnownRefs,
    method: MethodRef,
    holder: TypeRef,
    ssa: &'a SsaFunction,
    index: DefUseIndex,
}

impl MethodScope<'_> {
    fn name(&self) -> &str {
        self.symbols.method_name(self.method)
    }

    fn op_at(&self, loc: Location) -> Option<&SsaOp> {
        self.ssa.instruction(loc).map(|i| i.op())
    }

    fn value_type(&self, var: SsaVarId) -> SsaType {
        self.ssa.var_type(var)
    }

    fn proto_types(&self, proto: ProtoRef) -> Vec<TypeRef> {
        let data = self.symbols.proto_data(proto);
        std::iter::once(data.ret)
            .chain(data.params.iter().copied())
            .collect()
    }
}

impl EnumUnboxer {
    /// Analyzes one method body, recording dependencies and reasons.
    ///
    /// # Errors
    ///
    /// Never fails today; the signature matches the other per-method stages.
    pub fn analyze_method(&self, app: &AppView, method: MethodRef, ssa: &SsaFunction) -> Result<()> {
        if self.candidates.is_empty() {
            return Ok(());
        }
        let symbols = app.symbols();
        let scope = MethodScope {
            app,
            symbols,
            known: app.known(),
            method,
            holder: symbols.method_holder(method),
            ssa,
            index: DefUseIndex::build(ssa),
        };

        self.analyze_instructions(&scope);
        self.analyze_enum_values(&scope);
        self.analyze_null_values(&scope);
        Ok(())
    }

    fn record(&self, scope: &MethodScope<'_>, rep: TypeRef, reason: Reason) {
        if reason.is_eligible() {
            self.candidates.add_dependency(rep, scope.method);
        } else {
            self.report_failure(rep, reason);
        }
    }

    fn mark_dependency(&self, scope: &MethodScope<'_>, ty: TypeRef) {
        if let Some(rep) = self.candidates.representative_of_base(scope.symbols, ty) {
            self.candidates.add_dependency(rep, scope.method);
        }
    }

    /// `from` can stand where `to` is expected: equal types, or `from` is a
    /// subtype of the enum `to` names, at the same array nesting.
    fn assignable(&self, symbols: &Symbols, from: TypeRef, to: TypeRef) -> bool {
        if from == to {
            return true;
        }
        symbols.array_nesting(from) == symbols.array_nesting(to)
            && self.candidates.representative(symbols.base_type(from)) == Some(symbols.base_type(to))
    }

    fn same_candidate(&self, symbols: &Symbols, ty: SsaType, rep: TypeRef, nesting: usize) -> bool {
        match ty {
            SsaType::Null => true,
            SsaType::Ref(t) => {
                symbols.array_nesting(t) == nesting
                    && self.candidates.representative_of_base(symbols, t) == Some(rep)
            }
            _ => false,
        }
    }

    /// The most precise type known for `var`: the class of a
    /// `valueOf(const-class T, ...)` result, or its declared type.
    fn dynamic_type(&self, scope: &MethodScope<'_>, var: SsaVarId) -> Option<TypeRef> {
        if let Some(Definition::Instruction(loc)) = scope.index.definition(var) {
            if let Some(SsaOp::Invoke { method, args, .. }) = scope.op_at(loc) {
                if *method == scope.known.enum_value_of {
                    let class_ty = args
                        .first()
                        .and_then(|arg| match scope.index.definition(*arg)? {
                            Definition::Instruction(l) => match scope.op_at(l)? {
                                SsaOp::ConstClass { ty, .. } => Some(*ty),
                                _ => None,
                            },
                            _ => None,
                        });
                    if class_ty.is_some() {
                        return class_ty;
                    }
                }
            }
        }
        scope.value_type(var).type_ref()
    }

    // ── Instructions that mention a candidate on their own ─────────────

    fn analyze_instructions(&self, scope: &MethodScope<'_>) {
        let symbols = scope.symbols;
        for (_, instr) in scope.ssa.instructions() {
            match instr.op() {
                SsaOp::LoadField { field, .. }
                | SsaOp::StoreField { field, .. }
                | SsaOp::LoadStaticField { field, .. }
                | SsaOp::StoreStaticField { field, .. } => self.analyze_field_access(scope, *field),
                SsaOp::Invoke {
                    kind, method, args, ..
                } => self.analyze_invoke_instruction(scope, *kind, *method, args),
                SsaOp::InvokeCustom { call_site, .. } => self.analyze_invoke_custom(scope, call_site),
                SsaOp::CheckCast { object, ty, .. } => {
                    if symbols.is_array(*ty) {
                        continue;
                    }
                    if let Some(rep) = self.candidates.representative(*ty) {
                        let reason = if self.dynamic_type(scope, *object) == Some(*ty) {
                            Reason::Eligible
                        } else {
                            Reason::DownCast
                        };
                        self.record(scope, rep, reason);
                    }
                }
                SsaOp::ConstClass { dest, ty } => {
                    if let Some(rep) = self.candidates.representative_of_base(symbols, *ty) {
                        if symbols.is_array(*ty) {
                            self.report_failure(rep, Reason::ConstClass);
                        } else {
                            self.analyze_const_class(scope, *dest, *ty, rep);
                        }
                    }
                }
                SsaOp::NewInstance { ty, .. } => {
                    if let Some(rep) = self.candidates.representative(*ty) {
                        let reason = if scope.holder == rep && scope.name() == "<clinit>" {
                            Reason::Eligible
                        } else {
                            Reason::OtherUnsupportedInstruction
                        };
                        self.record(scope, rep, reason);
                    }
                }
                SsaOp::InstanceOf { ty, .. } => {
                    if let Some(rep) = self.candidates.representative_of_base(symbols, *ty) {
                        self.report_failure(rep, Reason::OtherUnsupportedInstruction);
                    }
                }
                SsaOp::NewArray { ty, .. } | SsaOp::NewArrayFilled { ty, .. } => {
                    self.mark_dependency(scope, *ty);
                }
                _ => {}
            }
        }
    }

    fn analyze_field_access(&self, scope: &MethodScope<'_>, field: FieldRef) {
        let symbols = scope.symbols;
        if let Some(rep) = self.candidates.representative(symbols.field_holder(field)) {
            let reason = if scope.app.resolve_field(field).is_some() {
                Reason::Eligible
            } else {
                Reason::UnresolvableField
            };
            self.record(scope, rep, reason);
        }
        self.mark_dependency(scope, symbols.field_type(field));
    }

    fn analyze_invoke_instruction(
        &self,
        scope: &MethodScope<'_>,
        kind: InvokeKind,
        method: MethodRef,
        args: &[SsaVarId],
    ) {
        let symbols = scope.symbols;
        let holder = symbols.method_holder(method);
        if let Some(rep) = self.candidates.representative(holder) {
            if kind == InvokeKind::Static {
                let reason = if scope.app.single_target(method, kind, None).is_some() {
                    Reason::Eligible
                } else {
                    Reason::InvalidInvoke
                };
                self.record(scope, rep, reason);
            } else if args
                .first()
                .is_some_and(|receiver| scope.value_type(*receiver).is_null())
            {
                self.report_failure(rep, Reason::EnumMethodCalledWithNullReceiver);
            }
        }
        for ty in scope.proto_types(symbols.method_proto(method)) {
            self.mark_dependency(scope, ty);
        }
    }

    fn analyze_const_class(&self, scope: &MethodScope<'_>, dest: SsaVarId, ty: TypeRef, rep: TypeRef) {
        let known = scope.known;
        if scope.index.has_phi_users(dest) {
            self.report_failure(rep, Reason::ConstClass);
            return;
        }
        for loc in scope.index.instruction_users(dest) {
            let legal = match scope.op_at(*loc) {
                Some(SsaOp::Invoke {
                    dest: result,
                    method,
                    args,
                    ..
                }) if args.first() == Some(&dest) => {
                    if [
                        known.class_get_name,
                        known.class_get_simple_name,
                        known.class_get_canonical_name,
                    ]
                    .contains(method)
                    {
                        true
                    } else if *method == known.array_new_instance_dims {
                        self.library_modeling.insert(scope.method);
                        true
                    } else if *method == known.enum_value_of {
                        self.library_modeling.insert(scope.method);
                        self.candidates.add_required_field(rep, known.enum_name_field);
                        self.value_of_result_is_cast(scope, *result, ty)
                    } else if *method == known.class_desired_assertion_status {
                        scope.holder == rep && scope.name() == "<clinit>"
                    } else {
                        false
                    }
                }
                _ => false,
            };
            if !legal {
                self.report_failure(rep, Reason::ConstClass);
                return;
            }
        }
        self.candidates.add_dependency(rep, scope.method);
    }

    fn value_of_result_is_cast(&self, scope: &MethodScope<'_>, result: Option<SsaVarId>, ty: TypeRef) -> bool {
        let Some(result) = result else {
            return true;
        };
        !scope.index.has_phi_users(result)
            && scope.index.instruction_users(result).iter().all(|loc| {
                matches!(
                    scope.op_at(*loc),
                    Some(SsaOp::CheckCast { object, ty: cast, .. }) if *object == result && *cast == ty
                )
            })
    }

    fn analyze_invoke_custom(&self, scope: &MethodScope<'_>, site: &CallSite) {
        let symbols = scope.symbols;
        for ty in scope.proto_types(site.proto) {
            self.mark_dependency(scope, ty);
        }

        let descriptor = site.lambda_descriptor(scope.known.lambda_metafactory);
        let typed = |ty: TypeRef| {
            if let Some(rep) = self.candidates.representative_of_base(symbols, ty) {
                if descriptor.is_some() {
                    self.candidates.add_dependency(rep, scope.method);
                } else {
                    self.report_failure(rep, Reason::InvalidInvokeCustom);
                }
            }
        };

        for handle in site.method_handles() {
            let (holder, types) = match handle.member {
                HandleMember::Method(m) => (
                    symbols.method_holder(m),
                    scope.proto_types(symbols.method_proto(m)),
                ),
                HandleMember::Field(f) => (symbols.field_holder(f), vec![symbols.field_type(f)]),
            };
            if let Some(rep) = self.candidates.representative(holder) {
                self.report_failure(rep, Reason::InvalidInvokeCustom);
            }
            types.into_iter().for_each(|t| typed(t));
        }
        for proto in site.method_types() {
            scope.proto_types(proto).into_iter().for_each(|t| typed(t));
        }

        if let Some(descriptor) = descriptor {
            let erased = scope.proto_types(descriptor.erased);
            let enforced = scope.proto_types(descriptor.enforced);
            let mismatched: Vec<TypeRef> = if erased.len() == enforced.len() {
                erased
                    .iter()
                    .zip(&enforced)
                    .filter(|(a, b)| a != b)
                    .flat_map(|(a, b)| [*a, *b])
                    .collect()
            } else {
                erased.iter().chain(&enforced).copied().collect()
            };
            for ty in mismatched {
                if let Some(rep) = self.candidates.representative_of_base(symbols, ty) {
                    self.report_failure(rep, Reason::InvalidInvokeCustom);
                }
            }
        }
    }

    // ── Users of enum-typed values ──────────────────────────────────────

    fn analyze_enum_values(&self, scope: &MethodScope<'_>) {
        let symbols = scope.symbols;
        let mut checked_phis = HashSet::new();
        for variable in scope.ssa.variables() {
            let SsaType::Ref(ty) = *variable.ty() else {
                continue;
            };
            let Some(rep) = self.candidates.representative_of_base(symbols, ty) else {
                continue;
            };
            let value = variable.id();
            self.candidates.add_dependency(rep, scope.method);

            for loc in scope.index.instruction_users(value) {
                if self.candidates.representative(rep).is_none() {
                    break;
                }
                let Some(op) = scope.op_at(*loc) else {
                    continue;
                };
                let reason = self.analyze_user(scope, op, value, ty, rep);
                self.record(scope, rep, reason);
            }

            for user in scope.index.phi_users(value) {
                if !checked_phis.insert(user.result) {
                    continue;
                }
                let reason = self.analyze_phi(scope, user.block, user.result, ty, rep);
                self.record(scope, rep, reason);
            }
        }
    }

    fn analyze_phi(
        &self,
        scope: &MethodScope<'_>,
        block: usize,
        result: SsaVarId,
        ty: TypeRef,
        rep: TypeRef,
    ) -> Reason {
        let symbols = scope.symbols;
        let nesting = symbols.array_nesting(ty);
        let Some(phi) = scope
            .ssa
            .block(block)
            .and_then(|b| b.phi_nodes().iter().find(|p| p.result() == result))
        else {
            return Reason::InvalidPhi;
        };
        let result_ok = self.same_candidate(symbols, scope.value_type(result), rep, nesting);
        let operands_ok = phi
            .operands()
            .iter()
            .all(|o| self.same_candidate(symbols, scope.value_type(o.value()), rep, nesting));
        if result_ok && operands_ok {
            Reason::Eligible
        } else {
            Reason::InvalidPhi
        }
    }

    fn analyze_user(
        &self,
        scope: &MethodScope<'_>,
        op: &SsaOp,
        value: SsaVarId,
        ty: TypeRef,
        rep: TypeRef,
    ) -> Reason {
        let symbols = scope.symbols;
        match op {
            SsaOp::LoadElement { .. } | SsaOp::ArrayLength { .. } => Reason::Eligible,
            SsaOp::StoreElement {
                array,
                value: stored,
                ..
            } => {
                let stored_ty = scope.value_type(*stored);
                if stored_ty.is_null() {
                    return Reason::Eligible;
                }
                let element = scope
                    .value_type(*array)
                    .type_ref()
                    .and_then(|a| symbols.element_type(a));
                match (element, stored_ty.type_ref()) {
                    (Some(element), Some(stored_ty)) if self.assignable(symbols, stored_ty, element) => {
                        Reason::Eligible
                    }
                    _ => Reason::InvalidArrayPut,
                }
            }
            SsaOp::NewArrayFilled {
                ty: array_ty,
                elements,
                ..
            } => {
                let element = symbols.element_type(*array_ty);
                let elements_ok = element.is_some_and(|element| {
                    elements.iter().all(|e| match scope.value_type(*e) {
                        SsaType::Null => true,
                        SsaType::Ref(t) => self.assignable(symbols, t, element),
                        _ => false,
                    })
                });
                if symbols.base_type(*array_ty) == rep && elements_ok {
                    Reason::Eligible
                } else {
                    Reason::InvalidInvokeNewArray
                }
            }
            SsaOp::CheckCast { object, ty: cast, .. } if *object == value => {
                if self.dynamic_type(scope, value) == Some(*cast) {
                    Reason::Eligible
                } else {
                    Reason::DownCast
                }
            }
            SsaOp::LoadField { object, field, .. } if *object == value => {
                match scope.app.resolve_field(*field) {
                    Some(def) => {
                        self.candidates.add_required_field(rep, def.field);
                        Reason::Eligible
                    }
                    None => Reason::UnresolvableField,
                }
            }
            SsaOp::StoreField {
                object,
                field,
                value: stored,
            } => {
                if *object == value {
                    let own_init = scope.name() == "<init>"
                        && self.candidates.representative(scope.holder) == Some(rep);
                    if !own_init {
                        return Reason::AssignmentOutsideInit;
                    }
                }
                if *stored == value {
                    return self.analyze_field_put(scope, *field, ty);
                }
                Reason::Eligible
            }
            SsaOp::StoreStaticField { field, .. } => self.analyze_field_put(scope, *field, ty),
            SsaOp::If { left, right, .. } => {
                let other = if *left == value { *right } else { Some(*left) };
                match other {
                    None => Reason::Eligible,
                    Some(other) => {
                        let other_ty = scope.value_type(other);
                        if other_ty.is_null() || other_ty == scope.value_type(value) {
                            Reason::Eligible
                        } else {
                            Reason::InvalidIfTypes
                        }
                    }
                }
            }
            SsaOp::Return { .. } => {
                let ret = scope
                    .symbols
                    .proto_data(symbols.method_proto(scope.method))
                    .ret;
                if self.assignable(symbols, ty, ret) {
                    Reason::Eligible
                } else {
                    Reason::ImplicitUpCastInReturn
                }
            }
            SsaOp::Invoke {
                dest,
                kind,
                method,
                args,
            } => self.analyze_invoke(scope, *dest, *kind, *method, args, value, ty, rep),
            SsaOp::InvokeCustom { call_site, args, .. } => {
                let params = &symbols.proto_data(call_site.proto).params;
                let legal = args
                    .iter()
                    .zip(params)
                    .filter(|(arg, _)| **arg == value)
                    .all(|(_, param)| self.assignable(symbols, ty, *param));
                if legal {
                    Reason::Eligible
                } else {
                    Reason::InvalidInvokeCustom
                }
            }
            _ => Reason::OtherUnsupportedInstruction,
        }
    }

    fn analyze_field_put(&self, scope: &MethodScope<'_>, field: FieldRef, ty: TypeRef) -> Reason {
        let Some(def) = scope.app.resolve_field(field) else {
            return Reason::InvalidFieldPut;
        };
        let holder = scope.symbols.field_holder(def.field);
        if !scope.app.class(holder).is_some_and(|c| c.is_program()) {
            return Reason::InvalidFieldPut;
        }
        if self.assignable(scope.symbols, ty, scope.symbols.field_type(def.field)) {
            Reason::Eligible
        } else {
            Reason::TypeMismatchFieldPut
        }
    }

    fn analyze_invoke(
        &self,
        scope: &MethodScope<'_>,
        dest: Option<SsaVarId>,
        kind: InvokeKind,
        method: MethodRef,
        args: &[SsaVarId],
        value: SsaVarId,
        ty: TypeRef,
        rep: TypeRef,
    ) -> Reason {
        let symbols = scope.symbols;
        let app = scope.app;
        let holder = symbols.method_holder(method);
        if symbols.is_array(holder) {
            return if symbols.method_name(method) == "clone" {
                Reason::Eligible
            } else {
                Reason::InvalidInvokeOnArray
            };
        }

        let receiver = if kind.has_receiver() {
            args.first().and_then(|r| scope.value_type(*r).type_ref())
        } else {
            None
        };
        let single = app.single_target(method, kind, receiver);
        let Some(resolved) = single.or_else(|| app.resolve_method(method)) else {
            return Reason::InvalidInvoke;
        };
        let Some(class) = app.class(symbols.method_holder(resolved.method)) else {
            return Reason::InvalidInvoke;
        };

        match class.origin {
            ClassOrigin::Program => {
                self.analyze_program_invoke(scope, kind, resolved, class.is_interface(), args, value, ty, rep)
            }
            ClassOrigin::Classpath => Reason::InvalidInvokeClasspath,
            ClassOrigin::Library => {
                let Some(target) = single else {
                    return Reason::InvalidInvoke;
                };
                let reason = self.analyze_library_invoke(scope, dest, target.method, args, rep);
                if reason.is_eligible() {
                    self.library_modeling.insert(scope.method);
                }
                reason
            }
        }
    }

    fn analyze_program_invoke(
        &self,
        scope: &MethodScope<'_>,
        kind: InvokeKind,
        target: &MethodDef,
        interface_holder: bool,
        args: &[SsaVarId],
        value: SsaVarId,
        ty: TypeRef,
        rep: TypeRef,
    ) -> Reason {
        let symbols = scope.symbols;
        let target_holder = symbols.method_holder(target.method);
        let offset = usize::from(kind.has_receiver());

        if target.is_instance_initializer(symbols) {
            if let Some(init_rep) = self.candidates.representative(target_holder) {
                let caller_rep = self.candidates.representative(scope.holder);
                if caller_rep != Some(init_rep) || !is_initializer_name(scope.name()) {
                    return Reason::InvalidInit;
                }
                if scope.name() == "<init>" && args.first() != scope.ssa.argument(0).as_ref() {
                    return Reason::InvalidInit;
                }
                if args.iter().skip(1).all(|a| *a != value) {
                    return Reason::Eligible;
                }
            }
        }

        let positions: Vec<usize> = args
            .iter()
            .enumerate()
            .filter(|(_, a)| **a == value)
            .map(|(i, _)| i)
            .collect();

        let proto = symbols.proto_data(symbols.method_proto(target.method));
        if let Some(check) = target.info.check_not_null {
            if target.is_static() && symbols.is_void(proto.ret) && positions == [check.argument] {
                self.check_not_null.insert((target.method, rep));
                return Reason::Eligible;
            }
        }

        for position in positions {
            if position < offset {
                if interface_holder {
                    return Reason::DefaultMethodInvoke;
                }
                continue;
            }
            let Some(param) = proto.params.get(position - offset) else {
                return Reason::InvalidInvoke;
            };
            if !self.assignable(symbols, ty, *param) {
                return Reason::IllegalInvokeWithImpreciseParameterType(target.method);
            }
        }
        Reason::Eligible
    }

    fn analyze_library_invoke(
        &self,
        scope: &MethodScope<'_>,
        dest: Option<SsaVarId>,
        target: MethodRef,
        args: &[SsaVarId],
        rep: TypeRef,
    ) -> Reason {
        let known = scope.known;
        let comparisons = [
            known.enum_compare_to,
            known.enum_compare_to_object,
            known.enum_equals,
            known.object_equals,
            known.objects_equals,
        ];
        let name_readers = [
            known.enum_name,
            known.enum_to_string,
            known.object_to_string,
            known.objects_to_string,
            known.string_value_of,
            known.string_builder.append_object,
            known.string_buffer.append_object,
        ];
        let plain = [
            known.enum_ordinal,
            known.enum_hash_code,
            known.object_hash_code,
            known.objects_require_non_null,
            known.objects_require_non_null_message,
            known.system_arraycopy,
            known.system_identity_hash_code,
        ];

        if comparisons.contains(&target) {
            let comparable = match args {
                [a, b] => self.comparable(scope, *a, *b),
                _ => false,
            };
            return if comparable {
                Reason::Eligible
            } else {
                Reason::UnboxedValueNonComparable(target)
            };
        }
        if name_readers.contains(&target) {
            self.candidates.add_required_field(rep, known.enum_name_field);
            return Reason::Eligible;
        }
        if plain.contains(&target) {
            return Reason::Eligible;
        }
        if target == known.object_get_class {
            return if dest.is_none_or(|d| scope.index.is_unused(d)) {
                Reason::Eligible
            } else {
                Reason::UnsupportedLibraryInvoke(target)
            };
        }
        if target == known.enum_init {
            let name = scope.name();
            let own = scope.holder == rep && name == "<init>";
            let relaxed = self.config.init_using_superclass_constructor
                && self.candidates.representative(scope.holder) == Some(rep)
                && is_initializer_name(name);
            return if own || relaxed {
                Reason::Eligible
            } else {
                Reason::InvalidInit
            };
        }
        Reason::UnsupportedLibraryInvoke(target)
    }

    fn comparable(&self, scope: &MethodScope<'_>, a: SsaVarId, b: SsaVarId) -> bool {
        let symbols = scope.symbols;
        let candidate = |var: SsaVarId| match scope.value_type(var) {
            SsaType::Ref(t) if !symbols.is_array(t) => self.candidates.representative(t),
            _ => None,
        };
        let (ta, tb) = (scope.value_type(a), scope.value_type(b));
        if ta.is_null() || tb.is_null() {
            return true;
        }
        match (candidate(a), candidate(b)) {
            (Some(x), Some(y)) => x == y,
            _ => false,
        }
    }

    // ── Users of null ───────────────────────────────────────────────────

    fn analyze_null_values(&self, scope: &MethodScope<'_>) {
        let symbols = scope.symbols;
        for variable in scope.ssa.variables() {
            if !variable.ty().is_null() {
                continue;
            }
            let value = variable.id();
            for loc in scope.index.instruction_users(value) {
                match scope.op_at(*loc) {
                    Some(SsaOp::NewArrayFilled { ty, .. }) => self.mark_dependency(scope, *ty),
                    Some(SsaOp::StoreField { field, value: stored, .. })
                    | Some(SsaOp::StoreStaticField { field, value: stored }) => {
                        if *stored == value {
                            self.mark_dependency(scope, symbols.field_type(*field));
                        }
                    }
                    Some(SsaOp::Return { .. }) => {
                        let ret = symbols.proto_data(symbols.method_proto(scope.method)).ret;
                        self.mark_dependency(scope, ret);
                    }
                    Some(SsaOp::StoreElement { array, .. }) => {
                        if let Some(ty) = scope.value_type(*array).type_ref() {
                            self.mark_dependency(scope, ty);
                        }
                    }
                    Some(SsaOp::If { left, right, .. }) => {
                        for other in std::iter::once(*left).chain(*right) {
                            if let Some(ty) = scope.value_type(other).type_ref() {
                                self.mark_dependency(scope, ty);
                            }
                        }
                    }
                    _ => {}
                }
            }
        }
    }
}
