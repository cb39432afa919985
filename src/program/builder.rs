//! Programmatic construction of whole programs.
//!
//! [`ProgramBuilder`] assembles an [`AppView`] and the matching
//! [`CompilerContext`] holding the method bodies. It is what tests, benches
//! and embedders without a class-file front end use.
//!
//! [`EnumClassBuilder`] generates the class shape `javac` emits for an enum:
//!
//! ```text
//! public final enum Color extends java.lang.Enum {
//!     public static final Color RED;           // one per constant
//!     private static final Color[] $VALUES;
//!     private Color(String name, int ordinal, ...instance fields)
//!     static { RED = new Color("RED", 0, ...); ...; $VALUES = {RED, ...}; }
//!     public static Color[] values()           { return $VALUES.clone(); }
//!     public static Color valueOf(String name) { return Enum.valueOf(Color.class, name); }
//! }
//! ```
//!
//! It also records the static field values that whole-program constant
//! propagation would have computed for such a class: the object state of
//! every constant and the contents of `$VALUES`.

use std::{
    ops::{Deref, DerefMut},
    sync::Arc,
};

use crate::{
    analysis::ssa::{
        ConstValue, InvokeKind, SsaFunctionBuilder, SsaFunctionContext, SsaVarId,
    },
    compiler::CompilerContext,
    program::{
        app::AppView,
        class::{AccessFlags, ClassDef, ClassOrigin, FieldDef, MethodDef, MethodOptimizationInfo},
        known::KnownRefs,
        symbols::{FieldRef, MethodRef, Symbols, TypeRef},
        value::{
            AbstractValue, EnumStaticFieldValues, EnumValuesEntry, EnumValuesObjectState,
            ObjectState, StaticFieldValue,
        },
    },
};

/// Builds a program: class definitions plus method bodies.
pub struct ProgramBuilder {
    symbols: Arc<Symbols>,
    known: KnownRefs,
    app: AppView,
    ctx: CompilerContext,
}

impl Default for ProgramBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl ProgramBuilder {
    /// Creates a builder over a fresh symbol table with the library installed.
    #[must_use]
    pub fn new() -> Self {
        let symbols = Arc::new(Symbols::new());
        let app = AppView::new(Arc::clone(&symbols));
        let known = app.known().clone();
        Self {
            symbols,
            known,
            app,
            ctx: CompilerContext::new(),
        }
    }

    /// The symbol table, for interning references ahead of their definition.
    #[must_use]
    pub fn symbols(&self) -> Arc<Symbols> {
        Arc::clone(&self.symbols)
    }

    /// Well-known library references.
    #[must_use]
    pub fn known(&self) -> &KnownRefs {
        &self.known
    }

    /// Defines a program class extending `java.lang.Object`.
    pub fn class<F>(&mut self, name: &str, f: F) -> TypeRef
    where
        F: FnOnce(&mut ClassBuilder<'_>),
    {
        let ty = self.symbols.class(name);
        let mut builder = ClassBuilder::new(
            &self.symbols,
            &self.ctx,
            ClassDef::new(ty, Some(self.known.object), AccessFlags::PUBLIC, ClassOrigin::Program),
        );
        f(&mut builder);
        self.app.add_class(builder.def);
        ty
    }

    /// Defines an enum class in the shape `javac` generates.
    pub fn enum_class<F>(&mut self, name: &str, f: F) -> EnumClass
    where
        F: FnOnce(&mut EnumClassBuilder<'_>),
    {
        let ty = self.symbols.class(name);
        let def = ClassDef::new(
            ty,
            Some(self.known.enum_type),
            AccessFlags::PUBLIC | AccessFlags::FINAL | AccessFlags::ENUM,
            ClassOrigin::Program,
        );
        let mut builder = EnumClassBuilder {
            class: ClassBuilder::new(&self.symbols, &self.ctx, def),
            known: &self.known,
            constants: Vec::new(),
            instance_fields: Vec::new(),
            static_inits: Vec::new(),
            subtypes: Vec::new(),
            record_static_values: true,
            generate_values: true,
            generate_value_of: true,
            init_side_effects: false,
        };
        f(&mut builder);
        let (classes, handle) = builder.finish();
        for class in classes {
            self.app.add_class(class);
        }
        handle
    }

    /// Adds an already-built class definition (library or classpath stubs).
    pub fn add_class(&mut self, class: ClassDef) {
        self.app.add_class(class);
    }

    /// Pins a type.
    pub fn pin_type(&mut self, ty: TypeRef) {
        self.app.keep_mut().pin_type(ty);
    }

    /// Pins a field.
    pub fn pin_field(&mut self, field: FieldRef) {
        self.app.keep_mut().pin_field(field);
    }

    /// Pins a method.
    pub fn pin_method(&mut self, method: MethodRef) {
        self.app.keep_mut().pin_method(method);
    }

    /// Finishes the program.
    #[must_use]
    pub fn build(self) -> (AppView, CompilerContext) {
        (self.app, self.ctx)
    }
}

/// Builds one class definition and the bodies of its methods.
pub struct ClassBuilder<'p> {
    symbols: &'p Symbols,
    ctx: &'p CompilerContext,
    def: ClassDef,
}

impl<'p> ClassBuilder<'p> {
    fn new(symbols: &'p Symbols, ctx: &'p CompilerContext, def: ClassDef) -> Self {
        Self { symbols, ctx, def }
    }

    /// The class being built.
    #[must_use]
    pub fn ty(&self) -> TypeRef {
        self.def.ty
    }

    /// The symbol table.
    #[must_use]
    pub fn symbols(&self) -> &'p Symbols {
        self.symbols
    }

    /// Sets the superclass.
    pub fn super_type(&mut self, ty: TypeRef) -> &mut Self {
        self.def.super_type = Some(ty);
        self
    }

    /// Adds an implemented interface.
    pub fn interface(&mut self, ty: TypeRef) -> &mut Self {
        self.def.interfaces.push(ty);
        self
    }

    /// Replaces the class flags.
    pub fn flags(&mut self, flags: AccessFlags) -> &mut Self {
        self.def.flags = flags;
        self
    }

    /// Sets where the class comes from.
    pub fn origin(&mut self, origin: ClassOrigin) -> &mut Self {
        self.def.origin = origin;
        self
    }

    /// Marks the class initializer as having side effects.
    pub fn class_init_side_effects(&mut self) -> &mut Self {
        self.def.class_init_may_have_side_effects = true;
        self
    }

    /// Declares a field.
    pub fn field(&mut self, name: &str, ty: TypeRef, flags: AccessFlags) -> FieldRef {
        let field = self.symbols.field(self.def.ty, name, ty);
        self.def.fields.push(FieldDef::new(field, flags));
        field
    }

    /// Declares a method with a body. Instance methods receive the receiver
    /// as argument 0.
    pub fn method<F>(
        &mut self,
        name: &str,
        ret: TypeRef,
        params: &[TypeRef],
        flags: AccessFlags,
        body: F,
    ) -> MethodRef
    where
        F: FnOnce(&mut SsaFunctionContext<'_, '_>),
    {
        let method = self.symbols.method(self.def.ty, name, self.symbols.proto(ret, params));
        let mut arg_types = Vec::with_capacity(params.len() + 1);
        if !flags.contains(AccessFlags::STATIC) {
            arg_types.push(self.def.ty);
        }
        arg_types.extend_from_slice(params);
        let ssa = SsaFunctionBuilder::new(self.symbols, &arg_types).build_with(body);
        self.ctx.set_ssa(method, ssa);
        self.def.methods.push(MethodDef::new(method, flags));
        method
    }

    /// Declares a public static method.
    pub fn static_method<F>(&mut self, name: &str, ret: TypeRef, params: &[TypeRef], body: F) -> MethodRef
    where
        F: FnOnce(&mut SsaFunctionContext<'_, '_>),
    {
        self.method(name, ret, params, AccessFlags::PUBLIC | AccessFlags::STATIC, body)
    }

    /// Declares a public virtual method.
    pub fn virtual_method<F>(&mut self, name: &str, ret: TypeRef, params: &[TypeRef], body: F) -> MethodRef
    where
        F: FnOnce(&mut SsaFunctionContext<'_, '_>),
    {
        self.method(name, ret, params, AccessFlags::PUBLIC, body)
    }

    /// Edits the optimization info of a declared method.
    pub fn method_info<F>(&mut self, method: MethodRef, f: F) -> &mut Self
    where
        F: FnOnce(&mut MethodOptimizationInfo),
    {
        if let Some(def) = self.def.method_mut(method) {
            f(&mut def.info);
        }
        self
    }
}

struct EnumConstant {
    name: String,
    args: Vec<ConstValue>,
    body: Option<TypeRef>,
}

struct StaticInit {
    field: FieldRef,
    value: ConstValue,
}

/// The references generated for an enum class.
#[derive(Debug, Clone)]
pub struct EnumClass {
    /// The enum type.
    pub ty: TypeRef,
    /// Constant fields, in ordinal order.
    pub constants: Vec<FieldRef>,
    /// The `$VALUES` field.
    pub values_field: FieldRef,
    /// The generated instance initializer.
    pub init: MethodRef,
    /// `values()`, if generated.
    pub values: Option<MethodRef>,
    /// `valueOf(String)`, if generated.
    pub value_of: Option<MethodRef>,
    /// Declared instance fields, in constructor parameter order.
    pub instance_fields: Vec<FieldRef>,
    /// Constant-body subclasses, in declaration order.
    pub subtypes: Vec<TypeRef>,
}

impl EnumClass {
    /// The constant field with the given ordinal.
    ///
    /// # Panics
    ///
    /// Panics if the ordinal is out of range.
    #[must_use]
    pub fn constant(&self, ordinal: usize) -> FieldRef {
        self.constants[ordinal]
    }
}

/// Builds an enum class; dereferences to a [`ClassBuilder`] for extra
/// members.
pub struct EnumClassBuilder<'p> {
    class: ClassBuilder<'p>,
    known: &'p KnownRefs,
    constants: Vec<EnumConstant>,
    instance_fields: Vec<FieldRef>,
    static_inits: Vec<StaticInit>,
    subtypes: Vec<ClassDef>,
    record_static_values: bool,
    generate_values: bool,
    generate_value_of: bool,
    init_side_effects: bool,
}

impl<'p> Deref for EnumClassBuilder<'p> {
    type Target = ClassBuilder<'p>;

    fn deref(&self) -> &Self::Target {
        &self.class
    }
}

impl DerefMut for EnumClassBuilder<'_> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.class
    }
}

impl EnumClassBuilder<'_> {
    /// Declares an instance field set from the constructor.
    pub fn instance_field(&mut self, name: &str, ty: TypeRef) -> FieldRef {
        let field = self
            .class
            .field(name, ty, AccessFlags::PRIVATE | AccessFlags::FINAL);
        self.instance_fields.push(field);
        field
    }

    /// Declares a constant; `args` initialize the instance fields in order.
    pub fn constant(&mut self, name: &str, args: &[ConstValue]) -> &mut Self {
        self.constants.push(EnumConstant {
            name: name.to_string(),
            args: args.to_vec(),
            body: None,
        });
        self
    }

    /// Declares several constants without instance field arguments.
    pub fn constants(&mut self, names: &[&str]) -> &mut Self {
        for name in names {
            self.constant(name, &[]);
        }
        self
    }

    /// Declares a constant with a body: an anonymous subclass built by `f`.
    pub fn constant_body<F>(&mut self, name: &str, args: &[ConstValue], f: F) -> TypeRef
    where
        F: FnOnce(&mut ClassBuilder<'_>),
    {
        let index = self.subtypes.len() + 1;
        let symbols = self.class.symbols;
        let sub = symbols.sibling_class(self.class.def.ty, &format!("${index}"));
        let mut builder = ClassBuilder::new(
            symbols,
            self.class.ctx,
            ClassDef::new(
                sub,
                Some(self.class.def.ty),
                AccessFlags::FINAL | AccessFlags::ENUM,
                ClassOrigin::Program,
            ),
        );

        // Color$1(String name, int ordinal, fields...) { super(name, ordinal, fields...); }
        let parent_init = self.init_ref();
        let params = self.init_params();
        builder.method("<init>", self.known.void, &params, AccessFlags::empty(), |f| {
            let args: Vec<SsaVarId> = (0..=params.len()).map(|i| f.arg(i)).collect();
            f.block(0, |b| {
                b.call_void(InvokeKind::Direct, parent_init, &args);
                b.ret();
            });
        });
        f(&mut builder);

        self.class.def.flags.remove(AccessFlags::FINAL);
        self.subtypes.push(builder.def);
        self.constants.push(EnumConstant {
            name: name.to_string(),
            args: args.to_vec(),
            body: Some(sub),
        });
        sub
    }

    /// Declares a static field initialized to a constant in `<clinit>`.
    pub fn static_field_init(&mut self, name: &str, ty: TypeRef, value: ConstValue) -> FieldRef {
        let field = self
            .class
            .field(name, ty, AccessFlags::PUBLIC | AccessFlags::STATIC);
        self.static_inits.push(StaticInit { field, value });
        field
    }

    /// Marks the instance initializer as having other side effects.
    pub fn init_side_effects(&mut self) -> &mut Self {
        self.init_side_effects = true;
        self
    }

    /// Does not record static field values for this enum.
    pub fn without_static_values(&mut self) -> &mut Self {
        self.record_static_values = false;
        self
    }

    /// Does not generate `values()`.
    pub fn without_values_method(&mut self) -> &mut Self {
        self.generate_values = false;
        self
    }

    /// Does not generate `valueOf(String)`.
    pub fn without_value_of_method(&mut self) -> &mut Self {
        self.generate_value_of = false;
        self
    }

    fn init_params(&self) -> Vec<TypeRef> {
        let symbols = self.class.symbols;
        let mut params = vec![self.known.string, self.known.int];
        params.extend(self.instance_fields.iter().map(|f| symbols.field_type(*f)));
        params
    }

    fn init_ref(&self) -> MethodRef {
        let symbols = self.class.symbols;
        symbols.method(
            self.class.def.ty,
            "<init>",
            symbols.proto(self.known.void, &self.init_params()),
        )
    }

    fn finish(mut self) -> (Vec<ClassDef>, EnumClass) {
        let symbols = self.class.symbols;
        let known = self.known;
        let ty = self.class.def.ty;
        let array_ty = symbols.array_of(ty);

        // Constant and $VALUES fields.
        let constant_flags =
            AccessFlags::PUBLIC | AccessFlags::STATIC | AccessFlags::FINAL | AccessFlags::ENUM;
        let constant_fields: Vec<FieldRef> = self
            .constants
            .iter()
            .map(|c| self.class.field(&c.name, ty, constant_flags))
            .collect();
        let values_field = self.class.field(
            "$VALUES",
            array_ty,
            AccessFlags::PRIVATE | AccessFlags::STATIC | AccessFlags::FINAL | AccessFlags::SYNTHETIC,
        );

        // private Color(String name, int ordinal, fields...)
        let params = self.init_params();
        let fields = self.instance_fields.clone();
        let init = self.class.method("<init>", known.void, &params, AccessFlags::PRIVATE, |f| {
            let this = f.arg(0);
            let (name, ordinal) = (f.arg(1), f.arg(2));
            let field_args: Vec<SsaVarId> = (0..fields.len()).map(|i| f.arg(3 + i)).collect();
            f.block(0, |b| {
                b.call_void(InvokeKind::Direct, known.enum_init, &[this, name, ordinal]);
                for (field, value) in fields.iter().zip(&field_args) {
                    b.put_field(this, *field, *value);
                }
                b.ret();
            });
        });
        let init_side_effects = self.init_side_effects;
        self.class.method_info(init, |info| {
            info.init_may_have_other_side_effects = init_side_effects;
        });

        // static { ... }
        let constants = &self.constants;
        let static_inits = &self.static_inits;
        let subtype_inits: Vec<Option<MethodRef>> = constants
            .iter()
            .map(|c| c.body.map(|sub| symbols.method_with_holder(init, sub)))
            .collect();
        let constant_fields_ref = &constant_fields;
        self.class.method(
            "<clinit>",
            known.void,
            &[],
            AccessFlags::STATIC,
            |f| {
                f.block(0, |b| {
                    let mut instances = Vec::with_capacity(constants.len());
                    for (ordinal, constant) in constants.iter().enumerate() {
                        let class = constant.body.unwrap_or(ty);
                        let instance = b.new_instance(class);
                        let name = b.const_str(&constant.name);
                        let ord = b.const_i32(i32::try_from(ordinal).unwrap_or(i32::MAX));
                        let mut args = vec![instance, name, ord];
                        for value in &constant.args {
                            args.push(b.const_val(value.clone()));
                        }
                        let target = subtype_inits[ordinal].unwrap_or(init);
                        b.call_void(InvokeKind::Direct, target, &args);
                        b.put_static(constant_fields_ref[ordinal], instance);
                        instances.push(instance);
                    }
                    let values = b.new_array_filled(array_ty, &instances);
                    b.put_static(values_field, values);
                    for static_init in static_inits {
                        let value = b.const_val(static_init.value.clone());
                        b.put_static(static_init.field, value);
                    }
                    b.ret();
                });
            },
        );

        // public static Color[] values() { return (Color[]) $VALUES.clone(); }
        let values = self.generate_values.then(|| {
            let clone = symbols.method(array_ty, "clone", symbols.proto(known.object, &[]));
            self.class.static_method("values", array_ty, &[], |f| {
                f.block(0, |b| {
                    let array = b.get_static(values_field);
                    let copy = b.call(InvokeKind::Virtual, clone, &[array]);
                    let cast = b.check_cast(copy, array_ty);
                    b.ret_val(cast);
                });
            })
        });

        // public static Color valueOf(String name) { return (Color) Enum.valueOf(Color.class, name); }
        let value_of = self.generate_value_of.then(|| {
            self.class.static_method("valueOf", ty, &[known.string], |f| {
                let name = f.arg(0);
                f.block(0, |b| {
                    let class = b.const_class(ty);
                    let value = b.call(InvokeKind::Static, known.enum_value_of, &[class, name]);
                    let cast = b.check_cast(value, ty);
                    b.ret_val(cast);
                });
            })
        });

        if self.record_static_values {
            self.record_values(&constant_fields, values_field);
        }
        for (field, constant) in constant_fields.iter().zip(&self.constants) {
            let exact = constant.body.unwrap_or(ty);
            if let Some(def) = self.class.def.fields.iter_mut().find(|f| f.field == *field) {
                def.info.exact_dynamic_type = Some(exact);
            }
        }

        let handle = EnumClass {
            ty,
            constants: constant_fields,
            values_field,
            init,
            values,
            value_of,
            instance_fields: self.instance_fields.clone(),
            subtypes: self.subtypes.iter().map(|s| s.ty).collect(),
        };
        let mut classes = vec![self.class.def];
        classes.extend(self.subtypes);
        (classes, handle)
    }

    fn record_values(&mut self, constant_fields: &[FieldRef], values_field: FieldRef) {
        let ty = self.class.def.ty;
        let mut recorded = EnumStaticFieldValues::new();
        let mut entries = Vec::with_capacity(self.constants.len());
        for (ordinal, constant) in self.constants.iter().enumerate() {
            let mut state = ObjectState::new()
                .with(
                    self.known.enum_ordinal_field,
                    AbstractValue::Number(i64::try_from(ordinal).unwrap_or(i64::MAX)),
                )
                .with(
                    self.known.enum_name_field,
                    AbstractValue::String(Arc::from(constant.name.as_str())),
                );
            for (field, value) in self.instance_fields.iter().zip(&constant.args) {
                state.set(*field, abstract_value(value));
            }
            recorded.insert(constant_fields[ordinal], StaticFieldValue::Object(state.clone()));
            entries.push(EnumValuesEntry {
                state,
                class: Some(constant.body.unwrap_or(ty)),
            });
        }
        recorded.insert(
            values_field,
            StaticFieldValue::ValuesArray(EnumValuesObjectState::new(entries)),
        );
        self.class.def.static_values = Some(recorded);
    }
}

fn abstract_value(value: &ConstValue) -> AbstractValue {
    match value {
        ConstValue::Int(i) => AbstractValue::Number(i64::from(*i)),
        ConstValue::Long(l) => AbstractValue::Number(*l),
        ConstValue::String(s) => AbstractValue::String(s.clone()),
        ConstValue::Null => AbstractValue::Null,
        // Only integral numbers are tracked.
        ConstValue::Double(_) => AbstractValue::Unknown,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_enum_shape() {
        let mut pb = ProgramBuilder::new();
        let color = pb.enum_class("com.example.Color", |e| {
            e.constants(&["RED", "GREEN", "BLUE"]);
        });
        let (app, ctx) = pb.build();
        let symbols = app.symbols();

        let class = app.class(color.ty).unwrap();
        assert!(class.is_enum());
        assert_eq!(class.super_type, Some(app.known().enum_type));
        assert_eq!(color.constants.len(), 3);
        assert_eq!(symbols.field_name(color.constant(1)), "GREEN");
        assert_eq!(class.static_fields().count(), 4);
        assert_eq!(class.instance_fields().count(), 0);

        let clinit = class.class_initializer(symbols).unwrap().method;
        let body = ctx.ssa(clinit).unwrap();
        body.verify().unwrap();
        let values = ctx.ssa(color.values.unwrap()).unwrap();
        values.verify().unwrap();

        let recorded = class.static_values.as_ref().unwrap();
        let blue = recorded.object_state(color.constant(2)).unwrap();
        assert_eq!(
            blue.get(app.known().enum_ordinal_field),
            &AbstractValue::Number(2)
        );
        assert_eq!(recorded.values_state(color.values_field).unwrap().len(), 3);
        assert_eq!(
            class.field(color.constant(0)).unwrap().info.exact_dynamic_type,
            Some(color.ty)
        );
    }

    #[test]
    fn test_enum_with_fields_and_bodies() {
        let mut pb = ProgramBuilder::new();
        let int = pb.known().int;
        let op = pb.enum_class("com.example.Op", |e| {
            let _code = e.instance_field("code", int);
            e.constant("ADD", &[ConstValue::Int(1)]);
            e.constant_body("SUB", &[ConstValue::Int(2)], |_| {});
        });
        let (app, ctx) = pb.build();
        let symbols = app.symbols();

        assert_eq!(op.subtypes.len(), 1);
        assert_eq!(symbols.source_name(op.subtypes[0]), "com.example.Op$1");
        let sub = app.class(op.subtypes[0]).unwrap();
        assert_eq!(sub.super_type, Some(op.ty));
        assert!(!app.class(op.ty).unwrap().flags.contains(AccessFlags::FINAL));

        let sub_init = sub.instance_initializers(symbols).next().unwrap().method;
        ctx.ssa(sub_init).unwrap().verify().unwrap();

        let recorded = app.class(op.ty).unwrap().static_values.clone().unwrap();
        let sub_state = recorded.object_state(op.constant(1)).unwrap();
        assert_eq!(sub_state.get(op.instance_fields[0]), &AbstractValue::Number(2));
        assert_eq!(
            recorded.values_state(op.values_field).unwrap().class_for_ordinal(1),
            Some(op.subtypes[0])
        );
    }
}
