//! Shared fixtures for the integration tests.
//!
//! - program factories for the enums the scenarios are written against
//! - [`Interpreter`], a small evaluator over SSA bodies used to check that a
//!   program computes the same values before and after unboxing
//! - [`unboxed_references`], the soundness scan run after every unboxing

#![allow(dead_code)]

use std::{
    cell::RefCell,
    collections::{HashMap, HashSet},
    rc::Rc,
    sync::Arc,
};

use enumbox::{
    analysis::ssa::{BinaryOp, CallSite, SsaFunctionContext},
    prelude::*,
};

// The prelude's single-parameter alias would shadow this.
use std::result::Result;

/// Routes `log` output to the test harness.
pub fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

// ================================================================================================
// Program factories
// ================================================================================================

/// `enum Color { RED, GREEN, BLUE }`
pub fn color(builder: &mut ProgramBuilder) -> EnumClass {
    builder.enum_class("com.example.Color", |e| {
        e.constants(&["RED", "GREEN", "BLUE"]);
    })
}

/// `enum Op { ADD(1), SUB(2); final int code; }`
pub fn op(builder: &mut ProgramBuilder) -> EnumClass {
    let int = builder.known().int;
    builder.enum_class("com.example.Op", |e| {
        e.instance_field("code", int);
        e.constant("ADD", &[ConstValue::Int(1)]);
        e.constant("SUB", &[ConstValue::Int(2)]);
    })
}

/// `enum Shape { SQUARE, TRIANGLE { int sides() { return 3; } } }` where
/// `Shape.sides()` returns 4.
pub fn shape(builder: &mut ProgramBuilder) -> (EnumClass, MethodRef) {
    let int = builder.known().int;
    let symbols = builder.symbols();
    let ty = symbols.class("com.example.Shape");
    let sides = symbols.method(ty, "sides", symbols.proto(int, &[]));
    let shape = builder.enum_class("com.example.Shape", |e| {
        e.virtual_method("sides", int, &[], |f| {
            f.block(0, |b| {
                let four = b.const_i32(4);
                b.ret_val(four);
            });
        });
        e.constant("SQUARE", &[]);
        e.constant_body("TRIANGLE", &[], |c| {
            c.virtual_method("sides", int, &[], |f| {
                f.block(0, |b| {
                    let three = b.const_i32(3);
                    b.ret_val(three);
                });
            });
        });
    });
    (shape, sides)
}

/// Declares a public static method on a fresh class named `class`.
pub fn static_method<F>(
    builder: &mut ProgramBuilder,
    class: &str,
    name: &str,
    ret: TypeRef,
    params: &[TypeRef],
    body: F,
) -> MethodRef
where
    F: FnOnce(&mut SsaFunctionContext<'_, '_>),
{
    let mut method = None;
    builder.class(class, |c| {
        method = Some(c.static_method(name, ret, params, body));
    });
    method.expect("static_method declares the method")
}

/// The current reference of `method` after every rewrite of `app`.
pub fn current(app: &AppView, method: MethodRef) -> MethodRef {
    app.graph_lens()
        .lookup_method(app.symbols(), method, InvokeKind::Static)
        .method
}

/// The operations of a method body, in block order.
pub fn body_ops(ctx: &CompilerContext, method: MethodRef) -> Vec<SsaOp> {
    ctx.with_ssa(method, |ssa| {
        ssa.instructions().map(|(_, i)| i.op().clone()).collect()
    })
    .unwrap_or_default()
}

/// Names of the methods invoked by `method`.
pub fn invoked_names(app: &AppView, ctx: &CompilerContext, method: MethodRef) -> Vec<String> {
    body_ops(ctx, method)
        .iter()
        .filter_map(|op| match op {
            SsaOp::Invoke { method, .. } => Some(app.symbols().method_name(*method).to_string()),
            _ => None,
        })
        .collect()
}

/// A lambda call site built by `LambdaMetafactory.metafactory`.
pub fn lambda_site(
    known: &KnownRefs,
    symbols: &Symbols,
    interface: TypeRef,
    erased: ProtoRef,
    implementation: MethodRef,
    enforced: ProtoRef,
) -> Arc<CallSite> {
    use enumbox::analysis::ssa::{BootstrapArg, MethodHandle};
    Arc::new(CallSite {
        name: "apply".into(),
        proto: symbols.proto(interface, &[]),
        bootstrap: known.lambda_metafactory,
        args: vec![
            BootstrapArg::MethodType(erased),
            BootstrapArg::MethodHandle(MethodHandle::invoke_static(implementation)),
            BootstrapArg::MethodType(enforced),
        ],
    })
}

// ================================================================================================
// Soundness scan
// ================================================================================================

/// Every place the live program still mentions one of `types`, described.
///
/// Class members are checked by signature; method bodies by every type an
/// operation or variable names. Leftover `NewUnboxedEnumInstance` markers are
/// reported too.
pub fn unboxed_references(app: &AppView, ctx: &CompilerContext, types: &[TypeRef]) -> Vec<String> {
    let symbols = app.symbols();
    let banned: HashSet<TypeRef> = types.iter().copied().collect();
    let mentions = |ty: TypeRef| banned.contains(&symbols.base_type(ty));
    let method_mentions = |method: MethodRef| {
        mentions(symbols.method_holder(method))
            || symbols.proto_mentions(symbols.method_proto(method), |t| mentions(t))
    };
    let field_mentions =
        |field: FieldRef| mentions(symbols.field_holder(field)) || mentions(symbols.field_type(field));

    let mut found = Vec::new();
    for class in app.program_classes() {
        if mentions(class.ty) {
            found.push(format!("class {}", symbols.source_name(class.ty)));
        }
        for field in &class.fields {
            if field_mentions(field.field) {
                found.push(format!("field {}", symbols.field_to_source(field.field)));
            }
        }
        for method in &class.methods {
            if method_mentions(method.method) {
                found.push(format!("method {}", symbols.method_to_source(method.method)));
            }
        }
    }

    for method in app.program_methods() {
        let Some(ssa) = ctx.ssa(method) else {
            continue;
        };
        let name = symbols.method_to_source(method);
        if let Err(e) = ssa.verify() {
            found.push(format!("{name}: does not verify: {e}"));
        }
        for var in ssa.variables() {
            if let SsaType::Ref(ty) = ssa.var_type(var.id()) {
                if mentions(ty) {
                    found.push(format!("{name}: variable {} is {}", var.id(), symbols.source_name(ty)));
                }
            }
        }
        for (_, instruction) in ssa.instructions() {
            let op = instruction.op();
            let bad = match op {
                SsaOp::ConstClass { ty, .. }
                | SsaOp::NewArray { ty, .. }
                | SsaOp::NewArrayFilled { ty, .. }
                | SsaOp::NewInstance { ty, .. }
                | SsaOp::CheckCast { ty, .. }
                | SsaOp::InstanceOf { ty, .. } => mentions(*ty),
                SsaOp::LoadField { field, .. }
                | SsaOp::StoreField { field, .. }
                | SsaOp::LoadStaticField { field, .. }
                | SsaOp::StoreStaticField { field, .. } => field_mentions(*field),
                SsaOp::Invoke { method, .. } => method_mentions(*method),
                SsaOp::InvokeCustom { call_site, .. } => {
                    symbols.proto_mentions(call_site.proto, |t| mentions(t))
                }
                SsaOp::NewUnboxedEnumInstance { .. } => true,
                _ => false,
            };
            if bad {
                found.push(format!("{name}: {op}"));
            }
        }
    }
    found
}

// ================================================================================================
// Interpreter
// ================================================================================================

/// A runtime value.
#[derive(Debug, Clone)]
pub enum Value {
    Int(i32),
    Long(i64),
    Double(f64),
    Str(Arc<str>),
    Class(TypeRef),
    Null,
    Array(Rc<RefCell<Vec<Value>>>),
    Object(Rc<Object>),
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Int(a), Self::Int(b)) => a == b,
            (Self::Long(a), Self::Long(b)) => a == b,
            (Self::Double(a), Self::Double(b)) => a == b,
            (Self::Str(a), Self::Str(b)) => a == b,
            (Self::Class(a), Self::Class(b)) => a == b,
            (Self::Null, Self::Null) => true,
            (Self::Array(a), Self::Array(b)) => *a.borrow() == *b.borrow(),
            (Self::Object(a), Self::Object(b)) => Rc::ptr_eq(a, b),
            _ => false,
        }
    }
}

impl Value {
    /// The value as an `int`, if it is one.
    pub fn as_int(&self) -> Option<i32> {
        match self {
            Self::Int(v) => Some(*v),
            _ => None,
        }
    }

    /// The elements of an `int[]`.
    pub fn as_ints(&self) -> Option<Vec<i32>> {
        match self {
            Self::Array(elements) => elements.borrow().iter().map(Self::as_int).collect(),
            _ => None,
        }
    }

    fn is_zero(&self) -> bool {
        matches!(self, Self::Int(0) | Self::Long(0) | Self::Null)
    }

    fn same(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Str(a), Self::Str(b)) => Arc::ptr_eq(a, b) || a == b,
            (Self::Array(a), Self::Array(b)) => Rc::ptr_eq(a, b),
            _ => self == other,
        }
    }
}

/// A heap object: its runtime class and its instance fields.
#[derive(Debug)]
pub struct Object {
    pub ty: TypeRef,
    fields: RefCell<HashMap<FieldRef, Value>>,
    text: RefCell<String>,
}

/// Why evaluation stopped without a result.
#[derive(Debug, Clone, PartialEq)]
pub enum Failure {
    /// The program threw an exception of this class.
    Thrown(String),
    /// The body uses something the interpreter does not model.
    Stuck(String),
}

enum Flow {
    Next,
    Goto(usize),
    Return(Option<Value>),
}

const FUEL: usize = 100_000;

/// Evaluates static and instance methods whose bodies are in a
/// [`CompilerContext`], with enough of the library modeled for the code enum
/// unboxing produces and consumes.
pub struct Interpreter<'a> {
    app: &'a AppView,
    ctx: &'a CompilerContext,
    statics: HashMap<FieldRef, Value>,
    initialized: HashSet<TypeRef>,
    fuel: usize,
}

impl<'a> Interpreter<'a> {
    pub fn new(app: &'a AppView, ctx: &'a CompilerContext) -> Self {
        Self {
            app,
            ctx,
            statics: HashMap::new(),
            initialized: HashSet::new(),
            fuel: FUEL,
        }
    }

    /// Calls `method` and returns its result, `None` for `void`.
    pub fn call(&mut self, method: MethodRef, args: Vec<Value>) -> Result<Option<Value>, Failure> {
        self.initialize(self.app.symbols().method_holder(method))?;
        self.execute(method, args)
    }

    /// Calls an `int`-returning method.
    pub fn call_int(&mut self, method: MethodRef, args: Vec<Value>) -> Result<i32, Failure> {
        match self.call(method, args)? {
            Some(Value::Int(v)) => Ok(v),
            other => Err(Failure::Stuck(format!("expected an int, got {other:?}"))),
        }
    }

    fn stuck(message: impl Into<String>) -> Failure {
        Failure::Stuck(message.into())
    }

    fn thrown(&self, ty: TypeRef) -> Failure {
        Failure::Thrown(self.app.symbols().source_name(ty))
    }

    fn initialize(&mut self, ty: TypeRef) -> Result<(), Failure> {
        if !self.initialized.insert(ty) {
            return Ok(());
        }
        let symbols = self.app.symbols();
        if let Some(super_type) = self.app.class(ty).and_then(|c| c.super_type) {
            self.initialize(super_type)?;
        }
        let void = self.app.known().void;
        let clinit = symbols.method(ty, "<clinit>", symbols.proto(void, &[]));
        if self.ctx.has_ssa(clinit) {
            self.execute(clinit, Vec::new())?;
        }
        Ok(())
    }

    fn default_value(&self, ty: TypeRef) -> Value {
        match self.app.symbols().descriptor(ty) {
            "Z" | "B" | "S" | "C" | "I" => Value::Int(0),
            "J" => Value::Long(0),
            "F" | "D" => Value::Double(0.0),
            _ => Value::Null,
        }
    }

    fn execute(&mut self, method: MethodRef, args: Vec<Value>) -> Result<Option<Value>, Failure> {
        let symbols = self.app.symbols();
        let ssa = self
            .ctx
            .ssa(method)
            .ok_or_else(|| Self::stuck(format!("no body for {}", symbols.method_to_source(method))))?;
        if args.len() != ssa.arguments().len() {
            return Err(Self::stuck(format!(
                "{} takes {} arguments, got {}",
                symbols.method_to_source(method),
                ssa.arguments().len(),
                args.len()
            )));
        }

        let mut env: HashMap<SsaVarId, Value> = ssa.arguments().iter().copied().zip(args).collect();
        let mut block_id = 0usize;
        let mut predecessor: Option<usize> = None;
        loop {
            let block = ssa
                .blocks()
                .iter()
                .find(|b| b.id() == block_id)
                .ok_or_else(|| Self::stuck(format!("no block {block_id}")))?;

            if let Some(pred) = predecessor {
                let mut incoming = Vec::new();
                for phi in block.phi_nodes() {
                    let operand = phi
                        .operands()
                        .iter()
                        .find(|o| o.predecessor() == pred)
                        .ok_or_else(|| Self::stuck(format!("phi {} has no operand from {pred}", phi.result())))?;
                    incoming.push((phi.result(), read(&env, operand.value())?));
                }
                env.extend(incoming);
            }

            let mut next = None;
            for instruction in block.instructions() {
                self.fuel = self
                    .fuel
                    .checked_sub(1)
                    .ok_or_else(|| Self::stuck("out of fuel"))?;
                match self.step(instruction.op(), &mut env)? {
                    Flow::Next => {}
                    Flow::Goto(target) => {
                        next = Some(target);
                        break;
                    }
                    Flow::Return(value) => return Ok(value),
                }
            }
            let target = next.ok_or_else(|| Self::stuck(format!("block {block_id} falls through")))?;
            predecessor = Some(block_id);
            block_id = target;
        }
    }

    fn step(&mut self, op: &SsaOp, env: &mut HashMap<SsaVarId, Value>) -> Result<Flow, Failure> {
        let symbols = self.app.symbols();
        let npe = self.app.known().npe;
        match op {
            SsaOp::Const { dest, value } => {
                let value = match value {
                    ConstValue::Int(v) => Value::Int(*v),
                    ConstValue::Long(v) => Value::Long(*v),
                    ConstValue::Double(v) => Value::Double(*v),
                    ConstValue::String(s) => Value::Str(s.clone()),
                    ConstValue::Null => Value::Null,
                };
                env.insert(*dest, value);
            }
            SsaOp::ConstClass { dest, ty } => {
                env.insert(*dest, Value::Class(*ty));
            }
            SsaOp::Binary { dest, op, left, right } => {
                let value = binary(*op, &read(env, *left)?, &read(env, *right)?)?;
                env.insert(*dest, value);
            }
            SsaOp::If { kind, left, right, true_target, false_target } => {
                let left = read(env, *left)?;
                let taken = match right {
                    Some(right) => compare(*kind, &left, &read(env, *right)?)?,
                    None => match (&left, kind) {
                        (Value::Int(v), _) => compare(*kind, &Value::Int(*v), &Value::Int(0))?,
                        (_, CmpKind::Eq) => left.is_zero(),
                        (_, CmpKind::Ne) => !left.is_zero(),
                        _ => return Err(Self::stuck(format!("cannot order {left:?}"))),
                    },
                };
                return Ok(Flow::Goto(if taken { *true_target } else { *false_target }));
            }
            SsaOp::Jump { target } => return Ok(Flow::Goto(*target)),
            SsaOp::Switch { value, targets, default } => {
                let key = read(env, *value)?
                    .as_int()
                    .ok_or_else(|| Self::stuck("switch on a non-int"))?;
                let target = targets
                    .iter()
                    .find(|(k, _)| *k == key)
                    .map_or(*default, |(_, t)| *t);
                return Ok(Flow::Goto(target));
            }
            SsaOp::Return { value } => {
                let value = value.map(|v| read(env, v)).transpose()?;
                return Ok(Flow::Return(value));
            }
            SsaOp::Throw { exception } => {
                return match read(env, *exception)? {
                    Value::Object(object) => Err(self.thrown(object.ty)),
                    _ => Err(self.thrown(npe)),
                };
            }
            SsaOp::LoadField { dest, object, field } => {
                let object = self.object(env, *object)?;
                let value = object
                    .fields
                    .borrow()
                    .get(field)
                    .cloned()
                    .unwrap_or_else(|| self.default_value(symbols.field_type(*field)));
                env.insert(*dest, value);
            }
            SsaOp::StoreField { object, field, value } => {
                let object = self.object(env, *object)?;
                let value = read(env, *value)?;
                object.fields.borrow_mut().insert(*field, value);
            }
            SsaOp::LoadStaticField { dest, field } => {
                self.initialize(symbols.field_holder(*field))?;
                let value = self
                    .statics
                    .get(field)
                    .cloned()
                    .unwrap_or_else(|| self.default_value(symbols.field_type(*field)));
                env.insert(*dest, value);
            }
            SsaOp::StoreStaticField { field, value } => {
                self.initialize(symbols.field_holder(*field))?;
                self.statics.insert(*field, read(env, *value)?);
            }
            SsaOp::LoadElement { dest, array, index, .. } => {
                let array = self.array(env, *array)?;
                let index = read(env, *index)?.as_int().unwrap_or(-1);
                let value = usize::try_from(index)
                    .ok()
                    .and_then(|i| array.borrow().get(i).cloned())
                    .ok_or_else(|| Self::stuck(format!("index {index} out of bounds")))?;
                env.insert(*dest, value);
            }
            SsaOp::StoreElement { array, index, value, .. } => {
                let array = self.array(env, *array)?;
                let index = read(env, *index)?.as_int().unwrap_or(-1);
                let value = read(env, *value)?;
                let mut elements = array.borrow_mut();
                let slot = usize::try_from(index)
                    .ok()
                    .and_then(|i| elements.get_mut(i))
                    .ok_or_else(|| Self::stuck(format!("index {index} out of bounds")))?;
                *slot = value;
            }
            SsaOp::ArrayLength { dest, array } => {
                let length = self.array(env, *array)?.borrow().len();
                env.insert(*dest, Value::Int(i32::try_from(length).unwrap_or(i32::MAX)));
            }
            SsaOp::NewArray { dest, ty, size } => {
                let size = read(env, *size)?
                    .as_int()
                    .and_then(|s| usize::try_from(s).ok())
                    .ok_or_else(|| Self::stuck("negative array size"))?;
                let element = symbols.element_type(*ty).map_or(Value::Null, |e| self.default_value(e));
                env.insert(*dest, Value::Array(Rc::new(RefCell::new(vec![element; size]))));
            }
            SsaOp::NewArrayFilled { dest, elements, .. } => {
                let elements = elements.iter().map(|e| read(env, *e)).collect::<Result<Vec<_>, _>>()?;
                env.insert(*dest, Value::Array(Rc::new(RefCell::new(elements))));
            }
            SsaOp::NewInstance { dest, ty } => {
                self.initialize(*ty)?;
                env.insert(
                    *dest,
                    Value::Object(Rc::new(Object {
                        ty: *ty,
                        fields: RefCell::new(HashMap::new()),
                        text: RefCell::new(String::new()),
                    })),
                );
            }
            SsaOp::CheckCast { dest, object, .. } => {
                let value = read(env, *object)?;
                env.insert(*dest, value);
            }
            SsaOp::InstanceOf { dest, object, ty } => {
                let is = match read(env, *object)? {
                    Value::Object(object) => self.app.is_subtype(object.ty, *ty),
                    _ => false,
                };
                env.insert(*dest, Value::Int(i32::from(is)));
            }
            SsaOp::Invoke { dest, kind, method, args } => {
                let args = args.iter().map(|a| read(env, *a)).collect::<Result<Vec<_>, _>>()?;
                let result = self.invoke(*kind, *method, args)?;
                if let (Some(dest), Some(result)) = (dest, result) {
                    env.insert(*dest, result);
                }
            }
            SsaOp::InvokeCustom { .. } => return Err(Self::stuck("invoke-custom is not modeled")),
            SsaOp::NewUnboxedEnumInstance { dest, ordinal, .. } => {
                env.insert(*dest, Value::Int(ordinal.saturating_add(1)));
            }
            SsaOp::Nop => {}
        }
        Ok(Flow::Next)
    }

    fn object(&self, env: &HashMap<SsaVarId, Value>, var: SsaVarId) -> Result<Rc<Object>, Failure> {
        match read(env, var)? {
            Value::Object(object) => Ok(object),
            Value::Null => Err(self.thrown(self.app.known().npe)),
            other => Err(Self::stuck(format!("{other:?} is not an object"))),
        }
    }

    fn array(
        &self,
        env: &HashMap<SsaVarId, Value>,
        var: SsaVarId,
    ) -> Result<Rc<RefCell<Vec<Value>>>, Failure> {
        match read(env, var)? {
            Value::Array(array) => Ok(array),
            Value::Null => Err(self.thrown(self.app.known().npe)),
            other => Err(Self::stuck(format!("{other:?} is not an array"))),
        }
    }

    fn invoke(
        &mut self,
        kind: InvokeKind,
        method: MethodRef,
        args: Vec<Value>,
    ) -> Result<Option<Value>, Failure> {
        let symbols = self.app.symbols();
        let target = match (kind, args.first()) {
            (InvokeKind::Virtual | InvokeKind::Interface, Some(Value::Object(receiver))) => {
                self.dispatch(receiver.ty, method)
            }
            (InvokeKind::Virtual | InvokeKind::Interface, Some(Value::Null)) => {
                return Err(self.thrown(self.app.known().npe));
            }
            _ => Some(method).filter(|m| self.ctx.has_ssa(*m)),
        };
        match target {
            Some(target) => {
                if kind == InvokeKind::Static {
                    self.initialize(symbols.method_holder(target))?;
                }
                self.execute(target, args)
            }
            None => self.library(method, args),
        }
    }

    /// The program method a virtual call on an instance of `ty` runs.
    fn dispatch(&self, ty: TypeRef, method: MethodRef) -> Option<MethodRef> {
        let symbols = self.app.symbols();
        let mut current = Some(ty);
        while let Some(ty) = current {
            let class = self.app.class(ty)?;
            if let Some(def) = class.method_by_signature(symbols, method) {
                if !def.is_abstract() && self.ctx.has_ssa(def.method) {
                    return Some(def.method);
                }
            }
            current = class.super_type;
        }
        None
    }

    fn library(&mut self, method: MethodRef, args: Vec<Value>) -> Result<Option<Value>, Failure> {
        let symbols = self.app.symbols();
        let known = self.app.known();
        let holder = symbols.method_holder(method);
        let name = symbols.method_name(method).to_string();
        let arg = |i: usize| args.get(i).cloned().unwrap_or(Value::Null);
        let enum_field = |value: &Value, field: FieldRef| match value {
            Value::Object(object) => object.fields.borrow().get(&field).cloned(),
            _ => None,
        };

        let result = match name.as_str() {
            "<init>" if holder == known.enum_type => {
                if let Value::Object(object) = arg(0) {
                    let mut fields = object.fields.borrow_mut();
                    fields.insert(known.enum_name_field, arg(1));
                    fields.insert(known.enum_ordinal_field, arg(2));
                }
                None
            }
            "<init>" => None,
            "arraycopy" if holder == known.system => {
                let (Value::Array(source), Value::Array(dest)) = (arg(0), arg(2)) else {
                    return Err(self.thrown(known.npe));
                };
                let offset = |v: Value| v.as_int().and_then(|i| usize::try_from(i).ok()).unwrap_or(0);
                let (from, to, length) = (offset(arg(1)), offset(arg(3)), offset(arg(4)));
                let copied: Vec<Value> = source
                    .borrow()
                    .get(from..from + length)
                    .ok_or_else(|| Self::stuck("arraycopy source out of bounds"))?
                    .to_vec();
                let mut dest = dest.borrow_mut();
                let slots = dest
                    .get_mut(to..to + length)
                    .ok_or_else(|| Self::stuck("arraycopy destination out of bounds"))?;
                slots.clone_from_slice(&copied);
                None
            }
            "clone" => match arg(0) {
                Value::Array(array) => Some(Value::Array(Rc::new(RefCell::new(array.borrow().clone())))),
                other => return Err(Self::stuck(format!("clone of {other:?}"))),
            },
            "append" => {
                if let Value::Object(builder) = arg(0) {
                    let text = match arg(1) {
                        Value::Str(s) => s.to_string(),
                        Value::Int(v) => v.to_string(),
                        Value::Null => "null".to_string(),
                        other => format!("{other:?}"),
                    };
                    builder.text.borrow_mut().push_str(&text);
                }
                Some(arg(0))
            }
            "toString" if holder == known.string_builder.ty => match arg(0) {
                Value::Object(builder) => Some(Value::Str(Arc::from(builder.text.borrow().as_str()))),
                _ => return Err(self.thrown(known.npe)),
            },
            "equals" if holder == known.string => Some(Value::Int(i32::from(arg(0) == arg(1)))),
            "equals" => Some(Value::Int(i32::from(arg(0).same(&arg(1))))),
            "ordinal" => enum_field(&arg(0), known.enum_ordinal_field),
            "name" | "toString" => enum_field(&arg(0), known.enum_name_field),
            "compareTo" => {
                let ordinal = |v: &Value| enum_field(v, known.enum_ordinal_field).and_then(|o| o.as_int());
                match (ordinal(&arg(0)), ordinal(&arg(1))) {
                    (Some(a), Some(b)) => Some(Value::Int(a - b)),
                    _ => return Err(self.thrown(known.npe)),
                }
            }
            "hashCode" => enum_field(&arg(0), known.enum_ordinal_field),
            "requireNonNull" => match arg(0) {
                Value::Null => return Err(self.thrown(known.npe)),
                value => Some(value),
            },
            "valueOf" if holder == known.enum_type => {
                let (Value::Class(ty), wanted) = (arg(0), arg(1)) else {
                    return Err(self.thrown(known.npe));
                };
                self.initialize(ty)?;
                let found = self
                    .app
                    .class(ty)
                    .into_iter()
                    .flat_map(|c| c.static_fields())
                    .filter_map(|f| self.statics.get(&f.field))
                    .find(|v| enum_field(v, known.enum_name_field).as_ref() == Some(&wanted))
                    .cloned();
                match found {
                    Some(value) => Some(value),
                    None => return Err(self.thrown(known.iae)),
                }
            }
            "valueOf" if holder == known.string => match arg(0) {
                Value::Null => Some(Value::Str(Arc::from("null"))),
                Value::Str(s) => Some(Value::Str(s)),
                value => enum_field(&value, known.enum_name_field),
            },
            _ => {
                return Err(Self::stuck(format!(
                    "library method {} is not modeled",
                    symbols.method_to_source(method)
                )))
            }
        };
        if result.is_none() && !symbols.is_void(symbols.proto_data(symbols.method_proto(method)).ret) {
            return Err(Self::stuck(format!("{} produced no value", symbols.method_to_source(method))));
        }
        Ok(result)
    }
}

fn read(env: &HashMap<SsaVarId, Value>, var: SsaVarId) -> Result<Value, Failure> {
    env.get(&var)
        .cloned()
        .ok_or_else(|| Failure::Stuck(format!("{var} is undefined")))
}

fn binary(op: BinaryOp, left: &Value, right: &Value) -> Result<Value, Failure> {
    match (left, right) {
        (Value::Int(a), Value::Int(b)) => {
            let (a, b) = (*a, *b);
            let value = match op {
                BinaryOp::Add => a.wrapping_add(b),
                BinaryOp::Sub => a.wrapping_sub(b),
                BinaryOp::Mul => a.wrapping_mul(b),
                BinaryOp::Div => a.checked_div(b).ok_or_else(|| Failure::Thrown("java.lang.ArithmeticException".into()))?,
                BinaryOp::Rem => a.checked_rem(b).ok_or_else(|| Failure::Thrown("java.lang.ArithmeticException".into()))?,
                BinaryOp::And => a & b,
                BinaryOp::Or => a | b,
                BinaryOp::Xor => a ^ b,
                BinaryOp::Shl => a.wrapping_shl(b.unsigned_abs()),
                BinaryOp::Shr => a.wrapping_shr(b.unsigned_abs()),
            };
            Ok(Value::Int(value))
        }
        (Value::Long(a), Value::Long(b)) => {
            let value = match op {
                BinaryOp::Add => a.wrapping_add(*b),
                BinaryOp::Sub => a.wrapping_sub(*b),
                BinaryOp::Mul => a.wrapping_mul(*b),
                _ => return Err(Failure::Stuck(format!("long {op} is not modeled"))),
            };
            Ok(Value::Long(value))
        }
        _ => Err(Failure::Stuck(format!("{op} on {left:?} and {right:?}"))),
    }
}

fn compare(kind: CmpKind, left: &Value, right: &Value) -> Result<bool, Failure> {
    if let (Value::Int(a), Value::Int(b)) = (left, right) {
        return Ok(match kind {
            CmpKind::Eq => a == b,
            CmpKind::Ne => a != b,
            CmpKind::Lt => a < b,
            CmpKind::Ge => a >= b,
            CmpKind::Gt => a > b,
            CmpKind::Le => a <= b,
        });
    }
    match kind {
        CmpKind::Eq => Ok(left.same(right)),
        CmpKind::Ne => Ok(!left.same(right)),
        _ => Err(Failure::Stuck(format!("cannot order {left:?} and {right:?}"))),
    }
}
