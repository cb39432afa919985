//! The structural rewrite of enum unboxing.
//!
//! Runs once, after the analysis, with exclusive access to the program:
//!
//! 1. class initializers of unboxed enums lose their allocations and the
//!    stores into constant and `$VALUES` fields,
//! 2. every other enum method moves to the local utility class as a static
//!    method taking the receiver as an `int`,
//! 3. virtual methods overridden by constant bodies get a switch-based
//!    dispatch method,
//! 4. program members mentioning an unboxed type are retyped,
//! 5. check-not-null helpers reached by unboxed values get an `int` twin,
//! 6. the unboxed classes are removed and the lens layer is installed.
//!
//! Method bodies are moved, not rewritten; the rewrite pass brings them up to
//! date through the lens afterwards.

use std::{
    collections::{HashMap, HashSet},
    sync::Arc,
};

use log::debug;

use crate::{
    analysis::{
        ssa::{CmpKind, ConstValue, InvokeKind, SsaBlockBuilder, SsaFunction, SsaFunctionBuilder, SsaOp, SsaType},
        DefUseIndex, Location,
    },
    compiler::{CompilerContext, EventKind},
    enums::{
        data::unboxed_value, EnumDataMap, EnumUnboxingLens, EnumUnboxingLensBuilder,
        EnumUnboxingUtilityClasses,
    },
    program::{
        app::AppView,
        class::{AccessFlags, FieldDef, MethodDef},
        keep::PrunedItems,
        known::KnownRefs,
        lens::{LensKind, RewrittenPrototype},
        symbols::{FieldRef, MethodRef, ProtoRef, Symbols, TypeRef},
        value::AbstractValue,
    },
    Result,
};

const DISPATCH_SUFFIX: &str = "$enumunboxing$dispatch";
const CHECK_NOT_ZERO_SUFFIX: &str = "$enumunboxing$checkNotZero";
const COLLISION_SUFFIX: &str = "$enumunboxing$";

/// Check-not-null methods and their `int` twins.
#[derive(Debug, Clone, Default)]
pub struct CheckNotZeroMethods {
    to_twin: HashMap<MethodRef, MethodRef>,
    to_original: HashMap<MethodRef, MethodRef>,
}

impl CheckNotZeroMethods {
    fn insert(&mut self, original: MethodRef, twin: MethodRef) {
        self.to_twin.insert(original, twin);
        self.to_original.insert(twin, original);
    }

    /// The `int` twin of a check-not-null method.
    #[must_use]
    pub fn twin(&self, original: MethodRef) -> Option<MethodRef> {
        self.to_twin.get(&original).copied()
    }

    /// The check-not-null method a twin was made from.
    #[must_use]
    pub fn original(&self, twin: MethodRef) -> Option<MethodRef> {
        self.to_original.get(&twin).copied()
    }

    /// Number of twins.
    #[must_use]
    pub fn len(&self) -> usize {
        self.to_twin.len()
    }

    /// Returns `true` if no twin was synthesized.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.to_twin.is_empty()
    }
}

/// Outcome of [`EnumUnboxingTreeFixer::fix`].
#[derive(Debug, Default)]
pub struct TreeFixResult {
    /// Removed classes, fields and methods.
    pub pruned: PrunedItems,
    /// Methods whose body moved to a new reference and must be rewritten.
    pub touched: Vec<MethodRef>,
    /// The check-not-null twins.
    pub check_not_zero: CheckNotZeroMethods,
}

/// Performs the structural rewrite for a finalized [`EnumDataMap`].
pub struct EnumUnboxingTreeFixer<'a> {
    app: &'a mut AppView,
    ctx: &'a CompilerContext,
    symbols: Arc<Symbols>,
    known: KnownRefs,
    data: &'a EnumDataMap,
    utilities: &'a EnumUnboxingUtilityClasses,
    check_not_null: Vec<(MethodRef, TypeRef)>,
    lens: EnumUnboxingLensBuilder,
    moved: HashMap<MethodRef, MethodRef>,
    retyped: HashMap<MethodRef, MethodRef>,
    signatures: HashMap<TypeRef, HashSet<(String, ProtoRef)>>,
    result: TreeFixResult,
}

impl<'a> EnumUnboxingTreeFixer<'a> {
    /// Creates a tree fixer.
    pub fn new(
        app: &'a mut AppView,
        ctx: &'a CompilerContext,
        data: &'a Arc<EnumDataMap>,
        utilities: &'a EnumUnboxingUtilityClasses,
        check_not_null: Vec<(MethodRef, TypeRef)>,
    ) -> Self {
        let symbols = app.symbols_arc();
        let known = app.known().clone();
        let lens = EnumUnboxingLens::builder(data.all_unboxed_types(), known.int);
        Self {
            app,
            ctx,
            symbols,
            known,
            data: data.as_ref(),
            utilities,
            check_not_null,
            lens,
            moved: HashMap::new(),
            retyped: HashMap::new(),
            signatures: HashMap::new(),
            result: TreeFixResult::default(),
        }
    }

    /// Runs the rewrite and installs the lens.
    ///
    /// # Errors
    ///
    /// Returns an invariant violation if a class or body the analysis relied
    /// on is missing, if an ordinal is not a constant, or if the constant
    /// classes of an enum with overridden methods are unknown.
    pub fn fix(mut self) -> Result<TreeFixResult> {
        let reps = self.data.unboxed_types().to_vec();
        for rep in &reps {
            self.fix_class_initializer(*rep)?;
        }
        for rep in &reps {
            self.move_members(*rep)?;
        }
        for rep in &reps {
            self.synthesize_dispatch(*rep)?;
        }
        self.retype_program();
        self.synthesize_check_not_zero()?;

        let mut unboxed: Vec<TypeRef> = self.data.all_unboxed_types().collect();
        unboxed.sort_by_cached_key(|t| self.symbols.source_name(*t));
        for ty in unboxed {
            self.app.remove_class(ty);
            self.result.pruned.classes.insert(ty);
        }
        self.app.keep_mut().remove_pruned(&self.result.pruned);

        let lens = self.lens.build();
        debug!(
            "enum unboxing lens: {} explicit mappings",
            lens.mapping_count()
        );
        let chained = self.app.graph_lens().push(LensKind::EnumUnboxing(lens));
        self.app.set_graph_lens(chained);
        Ok(self.result)
    }

    fn local_class(&self, rep: TypeRef) -> Result<TypeRef> {
        self.utilities.local_class(rep).ok_or_else(|| {
            invariant_error!("no local utility class for {}", self.symbols.source_name(rep))
        })
    }

    /// Picks the first name in `candidates` whose signature is free in
    /// `holder`, and reserves it.
    fn reserve_name<I>(&mut self, holder: TypeRef, proto: ProtoRef, candidates: I) -> String
    where
        I: IntoIterator<Item = String>,
    {
        let symbols = Arc::clone(&self.symbols);
        let app = &*self.app;
        let used = self.signatures.entry(holder).or_insert_with(|| {
            app.class(holder)
                .map(|c| {
                    c.methods
                        .iter()
                        .map(|m| (symbols.method_name(m.method).to_string(), symbols.method_proto(m.method)))
                        .collect()
                })
                .unwrap_or_default()
        });
        for name in candidates {
            if used.insert((name.clone(), proto)) {
                return name;
            }
        }
        unreachable!("name candidates are unbounded")
    }

    fn numbered_names(base: &str) -> impl Iterator<Item = String> + '_ {
        std::iter::once(base.to_string()).chain((1..).map(move |i| format!("{base}${i}")))
    }

    fn suffixed_names(base: &str) -> impl Iterator<Item = String> + '_ {
        (0..).map(move |n| format!("{base}{}", COLLISION_SUFFIX.repeat(n)))
    }

    fn add_method(&mut self, holder: TypeRef, def: MethodDef) -> Result<()> {
        let class = self.app.class_mut(holder).ok_or_else(|| {
            invariant_error!("missing class {}", self.symbols.source_name(holder))
        })?;
        class.methods.push(def);
        Ok(())
    }

    // ── 1. Class initializers ──────────────────────────────────────────

    fn is_pruned_static_field(&self, field: FieldRef) -> bool {
        let Some(data) = self.data.data(self.symbols.field_holder(field)) else {
            return false;
        };
        data.is_enum_instance_field(field)
            || data.is_values_field(field)
            || (self
                .app
                .field_definition(field)
                .is_some_and(|def| def.info.is_dead)
                && self.lens.mentions_unboxed(&self.symbols, self.symbols.field_type(field)))
    }

    fn fix_class_initializer(&mut self, rep: TypeRef) -> Result<()> {
        let symbols = Arc::clone(&self.symbols);
        let class = self
            .app
            .class(rep)
            .ok_or_else(|| invariant_error!("missing class {}", symbols.source_name(rep)))?;
        let Some(clinit) = class.class_initializer(&symbols).map(|m| m.method) else {
            return Ok(());
        };
        let mut ssa = self
            .ctx
            .take_ssa(clinit)
            .ok_or_else(|| invariant_error!("no body for {}", symbols.method_to_source(clinit)))?;
        self.result.pruned.methods.insert(clinit);

        let index = DefUseIndex::build(&ssa);
        let mut replacements: Vec<(Location, SsaOp)> = Vec::new();
        let mut removals: Vec<Location> = Vec::new();
        for (loc, instr) in ssa.instructions() {
            match instr.op() {
                SsaOp::NewInstance { dest, ty } if self.data.representative(*ty) == Some(rep) => {
                    let (init, ordinal) = constructor_call(&symbols, &ssa, &index, *dest)
                        .ok_or_else(|| {
                            invariant_error!(
                                "no constant ordinal for an instance of {} in {}",
                                symbols.source_name(*ty),
                                symbols.method_to_source(clinit)
                            )
                        })?;
                    replacements.push((
                        loc,
                        SsaOp::NewUnboxedEnumInstance {
                            dest: *dest,
                            ty: rep,
                            ordinal,
                        },
                    ));
                    removals.push(init);
                }
                SsaOp::StoreStaticField { field, .. } if self.is_pruned_static_field(*field) => {
                    removals.push(loc);
                }
                _ => {}
            }
        }
        for (loc, op) in replacements {
            if let Some(instr) = ssa.instruction_mut(loc) {
                instr.set_op(op);
            }
        }
        for loc in removals {
            if let Some(instr) = ssa.instruction_mut(loc) {
                instr.set_op(SsaOp::Nop);
            }
        }
        ssa.remove_unused_definitions(SsaOp::is_removable_if_unused);

        if ssa.is_trivial() {
            return Ok(());
        }
        let local = self.local_class(rep)?;
        let moved = symbols.method(local, "<clinit>", symbols.method_proto(clinit));
        self.ctx.set_ssa(moved, ssa);
        self.add_method(local, MethodDef::new(moved, AccessFlags::STATIC | AccessFlags::SYNTHETIC))?;
        self.result.touched.push(moved);
        self.ctx
            .events
            .record(EventKind::MethodMoved)
            .method(moved)
            .message(format!("residual class initializer of {}", symbols.source_name(rep)));
        Ok(())
    }

    // ── 2. Moving methods and fields ───────────────────────────────────

    fn moved_proto(&self, def: &MethodDef) -> (ProtoRef, RewrittenPrototype) {
        let symbols = &self.symbols;
        let data = symbols.proto_data(symbols.method_proto(def.method)).clone();
        let receiver = !def.is_static();
        let mut params = Vec::with_capacity(data.params.len() + 1);
        let mut retyped_params = Vec::new();
        if receiver {
            params.push(self.known.int);
            retyped_params.push(0);
        }
        for param in &data.params {
            let mapped = self.lens.map_type(symbols, *param);
            if mapped != *param {
                retyped_params.push(params.len());
            }
            params.push(mapped);
        }
        let ret = self.lens.map_type(symbols, data.ret);
        let prototype = RewrittenPrototype {
            receiver_became_argument: receiver,
            retyped_params,
            retyped_return: ret != data.ret,
            ..RewrittenPrototype::default()
        };
        (symbols.proto(ret, &params), prototype)
    }

    fn move_members(&mut self, rep: TypeRef) -> Result<()> {
        let symbols = Arc::clone(&self.symbols);
        let local = self.local_class(rep)?;
        let mut subtypes: Vec<TypeRef> = self.data.subtypes_of(rep).collect();
        subtypes.sort_by_cached_key(|t| symbols.source_name(*t));

        for ty in std::iter::once(rep).chain(subtypes) {
            let Some(class) = self.app.class(ty) else {
                return Err(invariant_error!("missing class {}", symbols.source_name(ty)));
            };
            let mut methods = class.methods.clone();
            methods.sort_by_cached_key(|m| symbols.method_sort_key(m.method));
            let mut fields = class.fields.clone();
            fields.sort_by_cached_key(|f| symbols.field_sort_key(f.field));

            for def in methods {
                if def.is_class_initializer(&symbols) {
                    continue;
                }
                if def.is_instance_initializer(&symbols) || def.is_abstract() {
                    self.ctx.take_ssa(def.method);
                    self.result.pruned.methods.insert(def.method);
                    continue;
                }
                self.move_method(local, &def)?;
            }
            for def in fields {
                self.move_field(local, &def);
            }
        }
        Ok(())
    }

    fn move_method(&mut self, local: TypeRef, def: &MethodDef) -> Result<()> {
        let symbols = Arc::clone(&self.symbols);
        let (proto, prototype) = self.moved_proto(def);
        let name = symbols.method_name(def.method).to_string();
        let name = self.reserve_name(local, proto, Self::numbered_names(&name));
        let moved = symbols.method(local, &name, proto);

        let mut body = self
            .ctx
            .take_ssa(def.method)
            .ok_or_else(|| invariant_error!("no body for {}", symbols.method_to_source(def.method)))?;
        let receiver = prototype.receiver_became_argument;
        if receiver {
            // A static call on the unboxed value 0 must still fail like a
            // virtual call on null. The rewrite pass turns this into a zero
            // check.
            if let Some(this) = body.argument(0) {
                body.prepend_to_entry(SsaOp::Invoke {
                    dest: None,
                    kind: InvokeKind::Static,
                    method: self.known.objects_require_non_null,
                    args: vec![this],
                });
            }
        }
        self.ctx.set_ssa(moved, body);

        self.lens.map_method(def.method, moved);
        self.lens.record_prototype(moved, prototype);
        if receiver {
            self.lens.mark_static(moved);
        }
        let flags = (def.flags - AccessFlags::PRIVATE - AccessFlags::PROTECTED)
            | AccessFlags::PUBLIC
            | AccessFlags::STATIC;
        self.add_method(
            local,
            MethodDef {
                method: moved,
                flags,
                info: def.info.clone(),
            },
        )?;
        self.moved.insert(def.method, moved);
        self.result.pruned.methods.insert(def.method);
        self.result.touched.push(moved);
        self.ctx
            .events
            .record(EventKind::MethodMoved)
            .method(moved)
            .message(format!(
                "{} -> {}",
                symbols.method_to_source(def.method),
                symbols.method_to_source(moved)
            ));
        Ok(())
    }

    fn move_field(&mut self, local: TypeRef, def: &FieldDef) {
        let symbols = Arc::clone(&self.symbols);
        if !def.is_static() || self.is_pruned_static_field(def.field) {
            self.result.pruned.fields.insert(def.field);
            return;
        }
        let ty = self.lens.map_type(&symbols, symbols.field_type(def.field));
        let base = symbols.field_name(def.field).to_string();
        let taken: HashSet<String> = self
            .app
            .class(local)
            .map(|c| c.fields.iter().map(|f| symbols.field_name(f.field).to_string()).collect())
            .unwrap_or_default();
        let name = Self::numbered_names(&base)
            .find(|n| !taken.contains(n))
            .unwrap_or_else(|| base.clone());
        let moved = symbols.field(local, &name, ty);
        if let Some(class) = self.app.class_mut(local) {
            class.fields.push(FieldDef {
                field: moved,
                flags: (def.flags - AccessFlags::PRIVATE - AccessFlags::PROTECTED) | AccessFlags::PUBLIC,
                info: def.info.clone(),
            });
        }
        self.lens.map_field(def.field, moved);
        self.result.pruned.fields.insert(def.field);
    }

    // ── 3. Emulated dispatch ───────────────────────────────────────────

    fn synthesize_dispatch(&mut self, rep: TypeRef) -> Result<()> {
        let symbols = Arc::clone(&self.symbols);
        let mut subtypes: Vec<TypeRef> = self.data.subtypes_of(rep).collect();
        if subtypes.is_empty() {
            return Ok(());
        }
        subtypes.sort_by_cached_key(|t| symbols.source_name(*t));
        let local = self.local_class(rep)?;
        let class = self
            .app
            .class(rep)
            .ok_or_else(|| invariant_error!("missing class {}", symbols.source_name(rep)))?;
        let mut virtuals: Vec<MethodDef> = class
            .methods
            .iter()
            .filter(|m| m.is_virtual(&symbols))
            .cloned()
            .collect();
        virtuals.sort_by_cached_key(|m| symbols.method_sort_key(m.method));

        for def in virtuals {
            let overrides: Vec<(TypeRef, MethodRef)> = subtypes
                .iter()
                .filter_map(|sub| {
                    let sub_class = self.app.class(*sub)?;
                    sub_class
                        .method_by_signature(&symbols, def.method)
                        .map(|m| (*sub, m.method))
                })
                .collect();
            let target = if overrides.is_empty() {
                self.moved.get(&def.method).copied()
            } else {
                Some(self.emit_dispatch(rep, local, &def, &overrides)?)
            };

            // Invokes through a subtype that inherits the method.
            if let Some(target) = target {
                for sub in &subtypes {
                    if overrides.iter().any(|(s, _)| s == sub) {
                        continue;
                    }
                    self.lens
                        .map_method(symbols.method_with_holder(def.method, *sub), target);
                }
            }
        }
        Ok(())
    }

    fn emit_dispatch(
        &mut self,
        rep: TypeRef,
        local: TypeRef,
        def: &MethodDef,
        overrides: &[(TypeRef, MethodRef)],
    ) -> Result<MethodRef> {
        let symbols = Arc::clone(&self.symbols);
        let by_ordinal = self
            .data
            .data(rep)
            .and_then(|d| d.subtype_by_ordinal())
            .ok_or_else(|| {
                invariant_error!(
                    "constant classes of {} are unknown but {} is overridden",
                    symbols.source_name(rep),
                    symbols.method_to_source(def.method)
                )
            })?;

        let mut cases: Vec<(i32, MethodRef)> = Vec::new();
        for (ordinal, sub) in by_ordinal {
            let Some((_, method)) = overrides.iter().find(|(s, _)| s == sub) else {
                continue;
            };
            let moved = self.moved.get(method).copied().ok_or_else(|| {
                invariant_error!("override {} was not moved", symbols.method_to_source(*method))
            })?;
            cases.push((unboxed_value(*ordinal), moved));
        }
        let fallback = if def.is_abstract() {
            None
        } else {
            Some(self.moved.get(&def.method).copied().ok_or_else(|| {
                invariant_error!("{} was not moved", symbols.method_to_source(def.method))
            })?)
        };

        let (proto, prototype) = self.moved_proto(def);
        let base = format!("{}{DISPATCH_SUFFIX}", symbols.method_name(def.method));
        let name = self.reserve_name(local, proto, Self::numbered_names(&base));
        let dispatch = symbols.method(local, &name, proto);

        let proto_data = symbols.proto_data(proto).clone();
        let returns_void = symbols.is_void(proto_data.ret);
        let known = &self.known;
        let body = SsaFunctionBuilder::new(&symbols, &proto_data.params).build_with(|f| {
            let args: Vec<_> = (0..proto_data.params.len()).map(|i| f.arg(i)).collect();
            let default = cases.len() + 1;
            let targets: Vec<(i32, usize)> = cases
                .iter()
                .enumerate()
                .map(|(i, (value, _))| (*value, i + 1))
                .collect();
            f.block(0, |b| b.switch(args[0], &targets, default));
            for (i, (_, target)) in cases.iter().enumerate() {
                f.block(i + 1, |b| call_and_return(b, *target, &args, returns_void));
            }
            f.block(default, |b| match fallback {
                Some(target) => call_and_return(b, target, &args, returns_void),
                None => throw_npe(b, known),
            });
        });
        self.ctx.set_ssa(dispatch, body);
        self.add_method(
            local,
            MethodDef::new(dispatch, AccessFlags::PUBLIC | AccessFlags::STATIC | AccessFlags::SYNTHETIC),
        )?;

        self.lens.map_method(def.method, dispatch);
        self.lens
            .map_super_method(def.method, fallback.unwrap_or(dispatch));
        self.lens.mark_static(dispatch);
        self.lens.record_prototype(dispatch, prototype);
        self.ctx
            .events
            .record(EventKind::DispatchSynthesized)
            .method(dispatch)
            .message(format!(
                "{} over {} overrides",
                symbols.method_to_source(def.method),
                cases.len()
            ));
        Ok(dispatch)
    }

    // ── 4. Retyping ────────────────────────────────────────────────────

    fn single_value(&self, value: &AbstractValue) -> Option<i64> {
        let AbstractValue::SingleField(field) = value else {
            return None;
        };
        self.data
            .data(self.symbols.field_holder(*field))?
            .unboxed_value(*field)
            .map(i64::from)
    }

    fn retype_program(&mut self) {
        let symbols = Arc::clone(&self.symbols);
        let classes: Vec<TypeRef> = self
            .app
            .program_classes()
            .iter()
            .map(|c| c.ty)
            .filter(|t| !self.data.is_unboxed(*t) && !self.utilities.is_utility_class(*t))
            .collect();
        let mentions = |lens: &EnumUnboxingLensBuilder, ty: TypeRef| lens.mentions_unboxed(&symbols, ty);

        for ty in classes {
            let Some(class) = self.app.class(ty) else {
                continue;
            };
            let mut methods: Vec<MethodDef> = class
                .methods
                .iter()
                .filter(|m| symbols.proto_mentions(symbols.method_proto(m.method), |t| mentions(&self.lens, t)))
                .cloned()
                .collect();
            methods.sort_by_cached_key(|m| symbols.method_sort_key(m.method));
            let mut fields: Vec<FieldDef> = class
                .fields
                .iter()
                .filter(|f| mentions(&self.lens, symbols.field_type(f.field)))
                .cloned()
                .collect();
            fields.sort_by_cached_key(|f| symbols.field_sort_key(f.field));
            if methods.is_empty() && fields.is_empty() {
                continue;
            }

            // Signatures that stay put are the ones new names must avoid.
            let retyping: HashSet<MethodRef> = methods.iter().map(|m| m.method).collect();
            let kept: HashSet<(String, ProtoRef)> = class
                .methods
                .iter()
                .filter(|m| !retyping.contains(&m.method))
                .map(|m| (symbols.method_name(m.method).to_string(), symbols.method_proto(m.method)))
                .collect();
            self.signatures.insert(ty, kept);

            let mut replaced: HashMap<MethodRef, MethodDef> = HashMap::new();
            for def in methods {
                let new_def = self.retype_method(ty, &def);
                replaced.insert(def.method, new_def);
            }
            let mut field_map: HashMap<FieldRef, FieldRef> = HashMap::new();
            let mut taken: HashSet<(String, TypeRef)> = self
                .app
                .class(ty)
                .map(|c| {
                    c.fields
                        .iter()
                        .map(|f| (symbols.field_name(f.field).to_string(), symbols.field_type(f.field)))
                        .collect()
                })
                .unwrap_or_default();
            for def in fields {
                let new_ty = self.lens.map_type(&symbols, symbols.field_type(def.field));
                let base = symbols.field_name(def.field).to_string();
                let name = Self::suffixed_names(&base)
                    .find(|n| !taken.contains(&(n.clone(), new_ty)))
                    .unwrap_or_else(|| base.clone());
                taken.insert((name.clone(), new_ty));
                let new_field = symbols.field(ty, &name, new_ty);
                self.lens.map_field(def.field, new_field);
                field_map.insert(def.field, new_field);
            }

            if let Some(class) = self.app.class_mut(ty) {
                for def in &mut class.methods {
                    if let Some(new_def) = replaced.remove(&def.method) {
                        *def = new_def;
                    }
                }
                for def in &mut class.fields {
                    if let Some(new_field) = field_map.get(&def.field) {
                        def.field = *new_field;
                        def.info.exact_dynamic_type = None;
                    }
                }
            }
        }
    }

    fn retype_method(&mut self, holder: TypeRef, def: &MethodDef) -> MethodDef {
        let symbols = Arc::clone(&self.symbols);
        let data = symbols.proto_data(symbols.method_proto(def.method)).clone();
        let params: Vec<TypeRef> = data.params.iter().map(|p| self.lens.map_type(&symbols, *p)).collect();
        let ret = self.lens.map_type(&symbols, data.ret);
        let proto = symbols.proto(ret, &params);
        let base = symbols.method_name(def.method).to_string();
        let name = self.reserve_name(holder, proto, Self::suffixed_names(&base));
        let method = symbols.method(holder, &name, proto);

        let single_values: std::collections::BTreeMap<usize, i64> = def
            .info
            .argument_values
            .iter()
            .enumerate()
            .filter_map(|(i, v)| self.single_value(v).map(|u| (i, u)))
            .collect();
        let prototype = RewrittenPrototype {
            receiver_became_argument: false,
            retyped_params: params
                .iter()
                .zip(&data.params)
                .enumerate()
                .filter(|(_, (new, old))| new != old)
                .map(|(i, _)| i)
                .collect(),
            retyped_return: ret != data.ret,
            single_values: single_values.clone(),
        };
        self.lens.map_method(def.method, method);
        self.lens.record_prototype(method, prototype);
        self.retyped.insert(def.method, method);

        if let Some(body) = self.ctx.take_ssa(def.method) {
            self.ctx.set_ssa(method, body);
            self.result.touched.push(method);
        }
        self.ctx
            .events
            .record(EventKind::SignatureRewritten)
            .method(method)
            .message(format!(
                "{} -> {}",
                symbols.method_to_source(def.method),
                symbols.method_to_source(method)
            ));

        let mut info = def.info.clone();
        info.single_value_arguments = single_values;
        MethodDef {
            method,
            flags: def.flags,
            info,
        }
    }

    // ── 5. checkNotZero twins ──────────────────────────────────────────

    fn synthesize_check_not_zero(&mut self) -> Result<()> {
        let symbols = Arc::clone(&self.symbols);
        let mut methods: Vec<MethodRef> = self
            .check_not_null
            .iter()
            .filter(|(_, rep)| self.data.is_unboxed(*rep))
            .map(|(m, _)| self.retyped.get(m).copied().unwrap_or(*m))
            .collect();
        methods.sort_by_cached_key(|m| symbols.method_sort_key(*m));
        methods.dedup();

        for original in methods {
            let Some(def) = self.app.method_definition(original).cloned() else {
                continue;
            };
            let Some(check) = def.info.check_not_null else {
                continue;
            };
            let holder = symbols.method_holder(original);
            let data = symbols.proto_data(symbols.method_proto(original)).clone();
            let mut params = data.params.clone();
            let Some(slot) = params.get_mut(check.argument) else {
                return Err(invariant_error!(
                    "{} checks missing argument {}",
                    symbols.method_to_source(original),
                    check.argument
                ));
            };
            *slot = self.known.int;
            let proto = symbols.proto(data.ret, &params);
            let base = format!("{}{CHECK_NOT_ZERO_SUFFIX}", symbols.method_name(original));
            let name = self.reserve_name(holder, proto, Self::numbered_names(&base));
            let twin = symbols.method(holder, &name, proto);

            let body = self
                .ctx
                .ssa(original)
                .and_then(|ssa| retyped_check_body(ssa, check.argument))
                .unwrap_or_else(|| canonical_check_body(&symbols, &self.known, &params, check.argument));
            self.ctx.set_ssa(twin, body);
            self.add_method(
                holder,
                MethodDef {
                    method: twin,
                    flags: def.flags | AccessFlags::SYNTHETIC,
                    info: def.info.clone(),
                },
            )?;
            self.result.check_not_zero.insert(original, twin);
            self.ctx
                .events
                .record(EventKind::CheckNotZeroSynthesized)
                .method(twin)
                .message(symbols.method_to_source(original));
        }
        Ok(())
    }
}

/// The constructor call initializing `instance` and its constant ordinal.
fn constructor_call(
    symbols: &Symbols,
    ssa: &SsaFunction,
    index: &DefUseIndex,
    instance: crate::analysis::SsaVarId,
) -> Option<(Location, i32)> {
    index.instruction_users(instance).iter().find_map(|loc| {
        let SsaOp::Invoke {
            kind: InvokeKind::Direct,
            method,
            args,
            ..
        } = ssa.instruction(*loc)?.op()
        else {
            return None;
        };
        if symbols.method_name(*method) != "<init>" || args.first() != Some(&instance) {
            return None;
        }
        match ssa.definition(*args.get(2)?)? {
            (_, SsaOp::Const { value: ConstValue::Int(ordinal), .. }) => Some((*loc, *ordinal)),
            _ => None,
        }
    })
}

/// The original check body with the checked argument retyped to `int`, if
/// the argument is only compared against zero.
fn retyped_check_body(mut ssa: SsaFunction, argument: usize) -> Option<SsaFunction> {
    let var = ssa.argument(argument)?;
    let index = DefUseIndex::build(&ssa);
    if index.has_phi_users(var) {
        return None;
    }
    let only_zero_tests = index.instruction_users(var).iter().all(|loc| {
        matches!(
            ssa.instruction(*loc).map(|i| i.op()),
            Some(SsaOp::If { right: None, kind: CmpKind::Eq | CmpKind::Ne, .. })
        )
    });
    if !only_zero_tests {
        return None;
    }
    ssa.set_var_type(var, SsaType::Int);
    Some(ssa)
}

fn canonical_check_body(symbols: &Symbols, known: &KnownRefs, params: &[TypeRef], argument: usize) -> SsaFunction {
    SsaFunctionBuilder::new(symbols, params).build_with(|f| {
        let value = f.arg(argument);
        f.block(0, |b| b.if_z(CmpKind::Eq, value, 2, 1));
        f.block(1, |b| b.ret());
        f.block(2, |b| throw_npe(b, known));
    })
}

fn call_and_return(
    b: &mut SsaBlockBuilder<'_, '_>,
    target: MethodRef,
    args: &[crate::analysis::SsaVarId],
    returns_void: bool,
) {
    if returns_void {
        b.call_void(InvokeKind::Static, target, args);
        b.ret();
    } else {
        let result = b.call(InvokeKind::Static, target, args);
        b.ret_val(result);
    }
}

fn throw_npe(b: &mut SsaBlockBuilder<'_, '_>, known: &KnownRefs) {
    let exception = b.new_instance(known.npe);
    b.call_void(InvokeKind::Direct, known.npe_init, &[exception]);
    b.throw(exception);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        analysis::ssa::SsaOp,
        enums::{EnumUnboxer, EnumUnboxingConfig},
        program::builder::ProgramBuilder,
    };

    fn unboxed(app: &AppView, ctx: &CompilerContext) -> Arc<EnumDataMap> {
        let unboxer = EnumUnboxer::new(app.symbols_arc(), EnumUnboxingConfig::default());
        unboxer.prepare(app, &ctx.events);
        Arc::new(unboxer.finish_analysis(app, &ctx.events))
    }

    #[test]
    fn test_simple_enum_is_removed_and_methods_move() {
        let mut builder = ProgramBuilder::new();
        let color = builder.enum_class("com.example.Color", |e| {
            e.constants(&["RED", "GREEN"]);
        });
        let (mut app, ctx) = builder.build();
        let data = unboxed(&app, &ctx);
        let utilities = EnumUnboxingUtilityClasses::synthesize(&mut app, &ctx, &data);

        let fixed = EnumUnboxingTreeFixer::new(&mut app, &ctx, &data, &utilities, Vec::new())
            .fix()
            .unwrap();
        let symbols = app.symbols_arc();

        assert!(app.class(color.ty).is_none());
        assert!(fixed.pruned.classes.contains(&color.ty));
        assert!(fixed.pruned.methods.contains(&color.init));
        assert!(fixed.pruned.fields.contains(&color.constant(0)));
        assert!(fixed.pruned.fields.contains(&color.values_field));

        // The class initializer only built the constants.
        let local = utilities.local_class(color.ty).unwrap();
        assert!(app.class(local).unwrap().class_initializer(&symbols).is_none());

        let values = app
            .graph_lens()
            .apply_method(&symbols, color.values.unwrap(), InvokeKind::Static)
            .method;
        assert_eq!(symbols.method_holder(values), local);
        assert_eq!(symbols.proto_descriptor(symbols.method_proto(values)), "()[I");
        assert!(ctx.has_ssa(values));
        assert!(fixed.touched.contains(&values));
    }

    #[test]
    fn test_dispatch_for_overridden_method() {
        let mut builder = ProgramBuilder::new();
        let int = builder.known().int;
        let symbols = builder.symbols();
        let op_ty = symbols.class("com.example.Op");
        let apply = symbols.method(op_ty, "apply", symbols.proto(int, &[int]));
        let op = builder.enum_class("com.example.Op", |e| {
            e.virtual_method("apply", int, &[int], |f| {
                let x = f.arg(1);
                f.block(0, |b| b.ret_val(x));
            });
            e.constant("IDENTITY", &[]);
            e.constant_body("NEGATE", &[], |c| {
                c.virtual_method("apply", int, &[int], |f| {
                    let x = f.arg(1);
                    f.block(0, |b| {
                        let zero = b.const_i32(0);
                        let neg = b.sub(zero, x);
                        b.ret_val(neg);
                    });
                });
            });
        });
        let (mut app, ctx) = builder.build();
        let data = unboxed(&app, &ctx);
        assert!(data.is_unboxed(op.ty));
        let utilities = EnumUnboxingUtilityClasses::synthesize(&mut app, &ctx, &data);
        EnumUnboxingTreeFixer::new(&mut app, &ctx, &data, &utilities, Vec::new())
            .fix()
            .unwrap();

        let lens = Arc::clone(app.graph_lens());
        let virtual_lookup = lens.apply_method(&symbols, apply, InvokeKind::Virtual);
        assert_eq!(symbols.method_name(virtual_lookup.method), "apply$enumunboxing$dispatch");
        assert_eq!(virtual_lookup.kind, InvokeKind::Static);
        let super_lookup = lens.apply_method(&symbols, apply, InvokeKind::Super);
        assert_eq!(symbols.method_name(super_lookup.method), "apply");

        let dispatch = ctx.ssa(virtual_lookup.method).unwrap();
        dispatch.verify().unwrap();
        let switch = dispatch
            .instructions()
            .find_map(|(_, i)| match i.op() {
                SsaOp::Switch { targets, .. } => Some(targets.clone()),
                _ => None,
            })
            .unwrap();
        // Only NEGATE (ordinal 1) overrides.
        assert_eq!(switch.iter().map(|(v, _)| *v).collect::<Vec<_>>(), vec![2]);
    }

    #[test]
    fn test_program_signatures_are_retyped() {
        let mut builder = ProgramBuilder::new();
        let void = builder.known().void;
        let color = builder.enum_class("com.example.Color", |e| {
            e.constants(&["RED"]);
        });
        let mut take = None;
        let mut field = None;
        let main = builder.class("com.example.Main", |c| {
            field = Some(c.field("last", color.ty, AccessFlags::STATIC));
            take = Some(c.static_method("take", void, &[color.ty], |f| {
                f.block(0, |b| b.ret());
            }));
        });
        let (take, field) = (take.unwrap(), field.unwrap());
        let (mut app, ctx) = builder.build();
        let data = unboxed(&app, &ctx);
        let utilities = EnumUnboxingUtilityClasses::synthesize(&mut app, &ctx, &data);
        let fixed = EnumUnboxingTreeFixer::new(&mut app, &ctx, &data, &utilities, Vec::new())
            .fix()
            .unwrap();
        let symbols = app.symbols_arc();

        let retyped = app.graph_lens().apply_method(&symbols, take, InvokeKind::Static).method;
        assert_eq!(symbols.proto_descriptor(symbols.method_proto(retyped)), "(I)V");
        assert!(app.class(main).unwrap().method(retyped).is_some());
        assert!(ctx.has_ssa(retyped) && !ctx.has_ssa(take));
        assert!(fixed.touched.contains(&retyped));

        let new_field = app.graph_lens().apply_field(&symbols, field);
        assert_eq!(symbols.descriptor(symbols.field_type(new_field)), "I");
        assert!(app.class(main).unwrap().field(new_field).is_some());
    }
}
