//! Class, field and method definitions of the whole-program graph.

use std::collections::BTreeMap;

use bitflags::bitflags;

use crate::program::{
    symbols::{FieldRef, MethodRef, Symbols, TypeRef},
    value::{AbstractValue, EnumStaticFieldValues},
};

bitflags! {
    /// Access and property flags shared by classes, fields and methods.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct AccessFlags: u32 {
        /// `public`
        const PUBLIC = 0x0001;
        /// `private`
        const PRIVATE = 0x0002;
        /// `protected`
        const PROTECTED = 0x0004;
        /// `static`
        const STATIC = 0x0008;
        /// `final`
        const FINAL = 0x0010;
        /// Bridge method
        const BRIDGE = 0x0040;
        /// Interface class
        const INTERFACE = 0x0200;
        /// `abstract`
        const ABSTRACT = 0x0400;
        /// Compiler generated
        const SYNTHETIC = 0x1000;
        /// Annotation interface
        const ANNOTATION = 0x2000;
        /// Enum class or enum constant field
        const ENUM = 0x4000;
    }
}

/// Where a class definition comes from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ClassOrigin {
    /// Compiled and rewritten as part of this program.
    Program,
    /// Visible at compile time only; may not be rewritten.
    Classpath,
    /// Part of the platform library.
    Library,
}

/// Facts about a field computed by earlier whole-program analyses.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FieldOptimizationInfo {
    /// The field is never read.
    pub is_dead: bool,
    /// The exact runtime class of the object stored in the field, if known.
    pub exact_dynamic_type: Option<TypeRef>,
}

/// A field definition.
#[derive(Debug, Clone)]
pub struct FieldDef {
    /// The field reference.
    pub field: FieldRef,
    /// Access flags.
    pub flags: AccessFlags,
    /// Optimization facts.
    pub info: FieldOptimizationInfo,
}

impl FieldDef {
    /// Creates a field definition with no optimization facts.
    #[must_use]
    pub fn new(field: FieldRef, flags: AccessFlags) -> Self {
        Self {
            field,
            flags,
            info: FieldOptimizationInfo::default(),
        }
    }

    /// Returns `true` for static fields.
    #[must_use]
    pub fn is_static(&self) -> bool {
        self.flags.contains(AccessFlags::STATIC)
    }
}

/// A method proven to throw if one of its arguments is null, and to have
/// no other observable effect.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CheckNotNullInfo {
    /// Index of the checked argument.
    pub argument: usize,
}

/// Facts about a method computed by earlier whole-program analyses.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MethodOptimizationInfo {
    /// Set for static methods classified as null checks.
    pub check_not_null: Option<CheckNotNullInfo>,
    /// For instance initializers: whether the body may do anything besides
    /// assigning instance fields of the receiver and calling the super
    /// initializer.
    pub init_may_have_other_side_effects: bool,
    /// Known value of each argument over all call sites (receiver first).
    pub argument_values: Vec<AbstractValue>,
    /// Arguments known to always be this constant after enum unboxing.
    pub single_value_arguments: BTreeMap<usize, i64>,
}

/// A method definition.
#[derive(Debug, Clone)]
pub struct MethodDef {
    /// The method reference.
    pub method: MethodRef,
    /// Access flags.
    pub flags: AccessFlags,
    /// Optimization facts.
    pub info: MethodOptimizationInfo,
}

impl MethodDef {
    /// Creates a method definition with no optimization facts.
    #[must_use]
    pub fn new(method: MethodRef, flags: AccessFlags) -> Self {
        Self {
            method,
            flags,
            info: MethodOptimizationInfo::default(),
        }
    }

    /// Returns `true` for static methods.
    #[must_use]
    pub fn is_static(&self) -> bool {
        self.flags.contains(AccessFlags::STATIC)
    }

    /// Returns `true` for abstract methods (no body).
    #[must_use]
    pub fn is_abstract(&self) -> bool {
        self.flags.contains(AccessFlags::ABSTRACT)
    }

    /// Returns `true` if the method can be overridden.
    #[must_use]
    pub fn is_virtual(&self, symbols: &Symbols) -> bool {
        !self.is_static()
            && !self.flags.contains(AccessFlags::PRIVATE)
            && !is_initializer_name(symbols.method_name(self.method))
    }

    /// Returns `true` for `<init>`.
    #[must_use]
    pub fn is_instance_initializer(&self, symbols: &Symbols) -> bool {
        symbols.method_name(self.method) == "<init>"
    }

    /// Returns `true` for `<clinit>`.
    #[must_use]
    pub fn is_class_initializer(&self, symbols: &Symbols) -> bool {
        symbols.method_name(self.method) == "<clinit>"
    }
}

/// Returns `true` for `<init>` and `<clinit>`.
#[must_use]
pub fn is_initializer_name(name: &str) -> bool {
    name == "<init>" || name == "<clinit>"
}

/// A class definition.
#[derive(Debug, Clone)]
pub struct ClassDef {
    /// The class type.
    pub ty: TypeRef,
    /// The direct superclass, `None` only for `java.lang.Object`.
    pub super_type: Option<TypeRef>,
    /// Directly implemented interfaces.
    pub interfaces: Vec<TypeRef>,
    /// Access flags.
    pub flags: AccessFlags,
    /// Program, classpath or library.
    pub origin: ClassOrigin,
    /// Declared fields.
    pub fields: Vec<FieldDef>,
    /// Declared methods.
    pub methods: Vec<MethodDef>,
    /// Whether running `<clinit>` may have effects beyond initializing this
    /// class's own static fields.
    pub class_init_may_have_side_effects: bool,
    /// Static field values recorded for enum classes.
    pub static_values: Option<EnumStaticFieldValues>,
}

impl ClassDef {
    /// Creates an empty class definition.
    #[must_use]
    pub fn new(
        ty: TypeRef,
        super_type: Option<TypeRef>,
        flags: AccessFlags,
        origin: ClassOrigin,
    ) -> Self {
        Self {
            ty,
            super_type,
            interfaces: Vec::new(),
            flags,
            origin,
            fields: Vec::new(),
            methods: Vec::new(),
            class_init_may_have_side_effects: false,
            static_values: None,
        }
    }

    /// Returns `true` for program classes.
    #[must_use]
    pub fn is_program(&self) -> bool {
        self.origin == ClassOrigin::Program
    }

    /// Returns `true` for interfaces.
    #[must_use]
    pub fn is_interface(&self) -> bool {
        self.flags.contains(AccessFlags::INTERFACE)
    }

    /// Returns `true` for annotation interfaces.
    #[must_use]
    pub fn is_annotation(&self) -> bool {
        self.flags.contains(AccessFlags::ANNOTATION)
    }

    /// Returns `true` for enum classes (including constant-body subclasses).
    #[must_use]
    pub fn is_enum(&self) -> bool {
        self.flags.contains(AccessFlags::ENUM)
    }

    /// Looks up a declared method.
    #[must_use]
    pub fn method(&self, method: MethodRef) -> Option<&MethodDef> {
        self.methods.iter().find(|m| m.method == method)
    }

    /// Looks up a declared method mutably.
    pub fn method_mut(&mut self, method: MethodRef) -> Option<&mut MethodDef> {
        self.methods.iter_mut().find(|m| m.method == method)
    }

    /// Looks up a declared method by name and prototype, ignoring the holder.
    #[must_use]
    pub fn method_by_signature(&self, symbols: &Symbols, method: MethodRef) -> Option<&MethodDef> {
        self.methods
            .iter()
            .find(|m| symbols.same_signature(m.method, method))
    }

    /// Looks up a declared field.
    #[must_use]
    pub fn field(&self, field: FieldRef) -> Option<&FieldDef> {
        self.fields.iter().find(|f| f.field == field)
    }

    /// Looks up a declared field by name and type, ignoring the holder.
    #[must_use]
    pub fn field_by_name(&self, symbols: &Symbols, field: FieldRef) -> Option<&FieldDef> {
        let data = symbols.field_data(field);
        self.fields.iter().find(|f| {
            let other = symbols.field_data(f.field);
            other.name == data.name && other.ty == data.ty
        })
    }

    /// Iterates the instance fields.
    pub fn instance_fields(&self) -> impl Iterator<Item = &FieldDef> {
        self.fields.iter().filter(|f| !f.is_static())
    }

    /// Iterates the static fields.
    pub fn static_fields(&self) -> impl Iterator<Item = &FieldDef> {
        self.fields.iter().filter(|f| f.is_static())
    }

    /// Returns the class initializer, if declared.
    #[must_use]
    pub fn class_initializer(&self, symbols: &Symbols) -> Option<&MethodDef> {
        self.methods
            .iter()
            .find(|m| m.is_class_initializer(symbols))
    }

    /// Iterates the instance initializers.
    pub fn instance_initializers<'a>(
        &'a self,
        symbols: &'a Symbols,
    ) -> impl Iterator<Item = &'a MethodDef> + 'a {
        self.methods
            .iter()
            .filter(move |m| m.is_instance_initializer(symbols))
    }
}
