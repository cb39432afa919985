//! Interned references to types, prototypes, methods and fields.
//!
//! Every reference that flows through the optimizer is a small `Copy` handle
//! into a [`Symbols`] table. Handles compare in O(1) and can be hashed and
//! shared freely between threads, while the table keeps the underlying data
//! (descriptors, names, prototypes) exactly once.
//!
//! # Descriptors
//!
//! Types are keyed by their JVM descriptor:
//!
//! | Descriptor | Source name |
//! |------------|-------------|
//! | `I` | `int` |
//! | `Ljava/lang/String;` | `java.lang.String` |
//! | `[Lcom/example/Color;` | `com.example.Color[]` |
//!
//! # Ordering
//!
//! Handle indices depend on interning order, which is not deterministic once
//! several threads intern concurrently. Anything that must be reproducible
//! (report ordering, naming of synthesized members, processing order) sorts
//! by the canonical strings returned from [`Symbols::source_name`] or
//! [`Symbols::method_sort_key`], never by handle index.
//!
//! # Thread Safety
//!
//! Interning takes `&self`. The index maps are sharded [`DashMap`]s and the
//! data lives in append-only [`boxcar::Vec`] arenas, so readers never block.

use std::{fmt, sync::Arc};

use dashmap::{mapref::entry::Entry, DashMap};

/// Handle to an interned type (class, array or primitive).
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TypeRef(u32);

/// Handle to an interned method prototype (return type plus parameter types).
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ProtoRef(u32);

/// Handle to an interned method reference (holder, name, prototype).
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct MethodRef(u32);

/// Handle to an interned field reference (holder, name, type).
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct FieldRef(u32);

macro_rules! impl_handle {
    ($name:ident, $prefix:expr) => {
        impl $name {
            /// Returns the arena index of this handle.
            #[must_use]
            pub const fn index(self) -> usize {
                self.0 as usize
            }

            #[allow(clippy::cast_possible_truncation)]
            const fn from_index(index: usize) -> Self {
                Self(index as u32)
            }
        }

        impl fmt::Debug for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}{}", $prefix, self.0)
            }
        }
    };
}

impl_handle!(TypeRef, "T");
impl_handle!(ProtoRef, "P");
impl_handle!(MethodRef, "M");
impl_handle!(FieldRef, "F");

/// Return and parameter types of a method.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ProtoData {
    /// The return type (`V` for void).
    pub ret: TypeRef,
    /// Parameter types, not including the receiver.
    pub params: Vec<TypeRef>,
}

/// The data behind a [`MethodRef`].
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct MethodData {
    /// The class the reference names as holder.
    pub holder: TypeRef,
    /// The simple method name (`<init>` and `<clinit>` for initializers).
    pub name: Arc<str>,
    /// The method prototype.
    pub proto: ProtoRef,
}

/// The data behind a [`FieldRef`].
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FieldData {
    /// The class the reference names as holder.
    pub holder: TypeRef,
    /// The field name.
    pub name: Arc<str>,
    /// The declared type of the field.
    pub ty: TypeRef,
}

/// Concurrent, append-only symbol table.
pub struct Symbols {
    types: boxcar::Vec<Arc<str>>,
    type_index: DashMap<Arc<str>, TypeRef>,
    protos: boxcar::Vec<ProtoData>,
    proto_index: DashMap<ProtoData, ProtoRef>,
    methods: boxcar::Vec<MethodData>,
    method_index: DashMap<MethodData, MethodRef>,
    fields: boxcar::Vec<FieldData>,
    field_index: DashMap<FieldData, FieldRef>,
}

impl Default for Symbols {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Symbols {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Symbols")
            .field("types", &self.types.count())
            .field("protos", &self.protos.count())
            .field("methods", &self.methods.count())
            .field("fields", &self.fields.count())
            .finish()
    }
}

impl Symbols {
    /// Creates an empty symbol table.
    #[must_use]
    pub fn new() -> Self {
        Self {
            types: boxcar::Vec::new(),
            type_index: DashMap::new(),
            protos: boxcar::Vec::new(),
            proto_index: DashMap::new(),
            methods: boxcar::Vec::new(),
            method_index: DashMap::new(),
            fields: boxcar::Vec::new(),
            field_index: DashMap::new(),
        }
    }

    // ── Types ───────────────────────────────────────────────────────────

    /// Interns a type by JVM descriptor.
    pub fn ty(&self, descriptor: &str) -> TypeRef {
        if let Some(existing) = self.type_index.get(descriptor) {
            return *existing;
        }
        let key: Arc<str> = Arc::from(descriptor);
        match self.type_index.entry(key.clone()) {
            Entry::Occupied(e) => *e.get(),
            Entry::Vacant(e) => {
                let handle = TypeRef::from_index(self.types.push(key));
                *e.insert(handle)
            }
        }
    }

    /// Interns a class type from its canonical source name (`com.example.Color`).
    pub fn class(&self, source_name: &str) -> TypeRef {
        self.ty(&format!("L{};", source_name.replace('.', "/")))
    }

    /// Interns the array type whose elements are `element`.
    pub fn array_of(&self, element: TypeRef) -> TypeRef {
        let descriptor = format!("[{}", self.descriptor(element));
        self.ty(&descriptor)
    }

    /// Returns the JVM descriptor of `ty`.
    #[must_use]
    pub fn descriptor(&self, ty: TypeRef) -> &str {
        &self.types[ty.index()]
    }

    /// Returns `true` for primitive types, including `void`.
    #[must_use]
    pub fn is_primitive(&self, ty: TypeRef) -> bool {
        self.descriptor(ty).len() == 1
    }

    /// Returns `true` for the `void` type.
    #[must_use]
    pub fn is_void(&self, ty: TypeRef) -> bool {
        self.descriptor(ty) == "V"
    }

    /// Returns `true` for array types.
    #[must_use]
    pub fn is_array(&self, ty: TypeRef) -> bool {
        self.descriptor(ty).starts_with('[')
    }

    /// Returns `true` for class (and interface) types.
    #[must_use]
    pub fn is_class(&self, ty: TypeRef) -> bool {
        self.descriptor(ty).starts_with('L')
    }

    /// Returns `true` for reference types (classes and arrays).
    #[must_use]
    pub fn is_reference(&self, ty: TypeRef) -> bool {
        self.is_class(ty) || self.is_array(ty)
    }

    /// Number of array dimensions (0 for non-array types).
    #[must_use]
    pub fn array_nesting(&self, ty: TypeRef) -> usize {
        self.descriptor(ty).bytes().take_while(|b| *b == b'[').count()
    }

    /// Returns the element type of an array type.
    pub fn element_type(&self, ty: TypeRef) -> Option<TypeRef> {
        let descriptor = self.descriptor(ty);
        descriptor
            .strip_prefix('[')
            .map(str::to_owned)
            .map(|element| self.ty(&element))
    }

    /// Returns the innermost element type of an array, or `ty` itself.
    pub fn base_type(&self, ty: TypeRef) -> TypeRef {
        let descriptor = self.descriptor(ty);
        let stripped = descriptor.trim_start_matches('[');
        if stripped.len() == descriptor.len() {
            ty
        } else {
            let stripped = stripped.to_owned();
            self.ty(&stripped)
        }
    }

    /// Rebuilds `ty` with its base type replaced by `f(base)`.
    ///
    /// Returns `ty` unchanged if `f` returns `None`. Array nesting is kept, so
    /// mapping `Color -> int` turns `Color[][]` into `int[][]`.
    pub fn map_base_type<F>(&self, ty: TypeRef, f: F) -> TypeRef
    where
        F: FnOnce(TypeRef) -> Option<TypeRef>,
    {
        let nesting = self.array_nesting(ty);
        let base = self.base_type(ty);
        let Some(mapped) = f(base) else {
            return ty;
        };
        if mapped == base {
            return ty;
        }
        let descriptor = format!("{}{}", "[".repeat(nesting), self.descriptor(mapped));
        self.ty(&descriptor)
    }

    /// Returns the canonical source name (`com.example.Color`, `int[]`).
    #[must_use]
    pub fn source_name(&self, ty: TypeRef) -> String {
        descriptor_to_source(self.descriptor(ty))
    }

    /// Returns the source name with every `.` replaced by `$`.
    ///
    /// Used to build member names that embed a type name.
    #[must_use]
    pub fn compatible_name(&self, ty: TypeRef) -> String {
        self.source_name(ty).replace('.', "$")
    }

    /// Returns the simple (unqualified) class name.
    #[must_use]
    pub fn simple_name(&self, ty: TypeRef) -> String {
        let source = self.source_name(ty);
        match source.rfind('.') {
            Some(pos) => source[pos + 1..].to_string(),
            None => source,
        }
    }

    /// Interns a class type that lives next to `anchor` with the given suffix.
    ///
    /// `sibling_class(Lcom/example/Color;, "$Util")` yields `Lcom/example/Color$Util;`.
    pub fn sibling_class(&self, anchor: TypeRef, suffix: &str) -> TypeRef {
        let descriptor = self.descriptor(anchor);
        let inner = descriptor
            .strip_prefix('L')
            .and_then(|d| d.strip_suffix(';'))
            .unwrap_or(descriptor)
            .to_owned();
        self.ty(&format!("L{inner}{suffix};"))
    }

    // ── Prototypes ──────────────────────────────────────────────────────

    /// Interns a prototype.
    pub fn proto(&self, ret: TypeRef, params: &[TypeRef]) -> ProtoRef {
        let key = ProtoData {
            ret,
            params: params.to_vec(),
        };
        if let Some(existing) = self.proto_index.get(&key) {
            return *existing;
        }
        match self.proto_index.entry(key.clone()) {
            Entry::Occupied(e) => *e.get(),
            Entry::Vacant(e) => {
                let handle = ProtoRef::from_index(self.protos.push(key));
                *e.insert(handle)
            }
        }
    }

    /// Returns the data behind a prototype handle.
    #[must_use]
    pub fn proto_data(&self, proto: ProtoRef) -> &ProtoData {
        &self.protos[proto.index()]
    }

    /// Returns the JVM descriptor of a prototype, for example `(ILjava/lang/String;)V`.
    #[must_use]
    pub fn proto_descriptor(&self, proto: ProtoRef) -> String {
        let data = self.proto_data(proto);
        let mut out = String::from("(");
        for param in &data.params {
            out.push_str(self.descriptor(*param));
        }
        out.push(')');
        out.push_str(self.descriptor(data.ret));
        out
    }

    /// Returns `true` if the return type or any parameter satisfies `pred`.
    pub fn proto_mentions<F>(&self, proto: ProtoRef, mut pred: F) -> bool
    where
        F: FnMut(TypeRef) -> bool,
    {
        let data = self.proto_data(proto);
        pred(data.ret) || data.params.iter().any(|p| pred(*p))
    }

    // ── Methods ─────────────────────────────────────────────────────────

    /// Interns a method reference.
    pub fn method(&self, holder: TypeRef, name: &str, proto: ProtoRef) -> MethodRef {
        let key = MethodData {
            holder,
            name: Arc::from(name),
            proto,
        };
        if let Some(existing) = self.method_index.get(&key) {
            return *existing;
        }
        match self.method_index.entry(key.clone()) {
            Entry::Occupied(e) => *e.get(),
            Entry::Vacant(e) => {
                let handle = MethodRef::from_index(self.methods.push(key));
                *e.insert(handle)
            }
        }
    }

    /// Returns the data behind a method handle.
    #[must_use]
    pub fn method_data(&self, method: MethodRef) -> &MethodData {
        &self.methods[method.index()]
    }

    /// Returns the holder of a method reference.
    #[must_use]
    pub fn method_holder(&self, method: MethodRef) -> TypeRef {
        self.method_data(method).holder
    }

    /// Returns the name of a method reference.
    #[must_use]
    pub fn method_name(&self, method: MethodRef) -> &str {
        &self.method_data(method).name
    }

    /// Returns the prototype of a method reference.
    #[must_use]
    pub fn method_proto(&self, method: MethodRef) -> ProtoRef {
        self.method_data(method).proto
    }

    /// Returns the same method name and prototype on a different holder.
    pub fn method_with_holder(&self, method: MethodRef, holder: TypeRef) -> MethodRef {
        let data = self.method_data(method).clone();
        self.method(holder, &data.name, data.proto)
    }

    /// Returns `true` if both references share name and prototype.
    #[must_use]
    pub fn same_signature(&self, a: MethodRef, b: MethodRef) -> bool {
        let (a, b) = (self.method_data(a), self.method_data(b));
        a.name == b.name && a.proto == b.proto
    }

    /// Returns a deterministic sort key: holder descriptor, name and prototype.
    #[must_use]
    pub fn method_sort_key(&self, method: MethodRef) -> String {
        let data = self.method_data(method);
        format!(
            "{}->{}{}",
            self.descriptor(data.holder),
            data.name,
            self.proto_descriptor(data.proto)
        )
    }

    /// Renders a method in Java source style: `int com.example.Color.ordinal()`.
    #[must_use]
    pub fn method_to_source(&self, method: MethodRef) -> String {
        let data = self.method_data(method);
        let proto = self.proto_data(data.proto);
        let params: Vec<String> = proto.params.iter().map(|p| self.source_name(*p)).collect();
        format!(
            "{} {}.{}({})",
            self.source_name(proto.ret),
            self.source_name(data.holder),
            data.name,
            params.join(", ")
        )
    }

    // ── Fields ──────────────────────────────────────────────────────────

    /// Interns a field reference.
    pub fn field(&self, holder: TypeRef, name: &str, ty: TypeRef) -> FieldRef {
        let key = FieldData {
            holder,
            name: Arc::from(name),
            ty,
        };
        if let Some(existing) = self.field_index.get(&key) {
            return *existing;
        }
        match self.field_index.entry(key.clone()) {
            Entry::Occupied(e) => *e.get(),
            Entry::Vacant(e) => {
                let handle = FieldRef::from_index(self.fields.push(key));
                *e.insert(handle)
            }
        }
    }

    /// Returns the data behind a field handle.
    #[must_use]
    pub fn field_data(&self, field: FieldRef) -> &FieldData {
        &self.fields[field.index()]
    }

    /// Returns the holder of a field reference.
    #[must_use]
    pub fn field_holder(&self, field: FieldRef) -> TypeRef {
        self.field_data(field).holder
    }

    /// Returns the name of a field reference.
    #[must_use]
    pub fn field_name(&self, field: FieldRef) -> &str {
        &self.field_data(field).name
    }

    /// Returns the declared type of a field reference.
    #[must_use]
    pub fn field_type(&self, field: FieldRef) -> TypeRef {
        self.field_data(field).ty
    }

    /// Returns a deterministic sort key for a field reference.
    #[must_use]
    pub fn field_sort_key(&self, field: FieldRef) -> String {
        let data = self.field_data(field);
        format!(
            "{}->{}:{}",
            self.descriptor(data.holder),
            data.name,
            self.descriptor(data.ty)
        )
    }

    /// Renders a field in Java source style: `com.example.Op.code`.
    #[must_use]
    pub fn field_to_source(&self, field: FieldRef) -> String {
        let data = self.field_data(field);
        format!("{}.{}", self.source_name(data.holder), data.name)
    }
}

fn descriptor_to_source(descriptor: &str) -> String {
    if let Some(element) = descriptor.strip_prefix('[') {
        return format!("{}[]", descriptor_to_source(element));
    }
    match descriptor {
        "V" => "void".to_string(),
        "Z" => "boolean".to_string(),
        "B" => "byte".to_string(),
        "S" => "short".to_string(),
        "C" => "char".to_string(),
        "I" => "int".to_string(),
        "J" => "long".to_string(),
        "F" => "float".to_string(),
        "D" => "double".to_string(),
        other => other
            .strip_prefix('L')
            .and_then(|d| d.strip_suffix(';'))
            .unwrap_or(other)
            .replace('/', "."),
    }
}
