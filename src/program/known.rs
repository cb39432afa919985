//! Well-known library references.
//!
//! [`KnownRefs`] interns the handful of `java.lang` / `java.util` types and
//! members that the enum unboxer reasons about: the `Enum` API, the `Object`
//! and `Objects` helpers, string conversion entry points and a few reflective
//! calls. Interning is idempotent, so two `KnownRefs` built from the same
//! [`Symbols`] table hold identical handles.

use crate::program::symbols::{FieldRef, MethodRef, Symbols, TypeRef};

/// Methods shared by `StringBuilder` and `StringBuffer`.
#[derive(Debug, Clone, Copy)]
pub struct StringBuildingMethods {
    /// The string-building class.
    pub ty: TypeRef,
    /// `<init>()V`
    pub init: MethodRef,
    /// `append(Object)`
    pub append_object: MethodRef,
    /// `append(String)`
    pub append_string: MethodRef,
    /// `toString()`
    pub to_string: MethodRef,
}

/// Interned references to library types and members used by the optimizer.
#[derive(Debug, Clone)]
pub struct KnownRefs {
    // Primitive and common types
    /// `void`
    pub void: TypeRef,
    /// `boolean`
    pub boolean: TypeRef,
    /// `int`
    pub int: TypeRef,
    /// `long`
    pub long: TypeRef,
    /// `double`
    pub double: TypeRef,
    /// `int[]`
    pub int_array: TypeRef,
    /// `java.lang.Object`
    pub object: TypeRef,
    /// `java.lang.Object[]`
    pub object_array: TypeRef,
    /// `java.lang.Enum`
    pub enum_type: TypeRef,
    /// `java.lang.String`
    pub string: TypeRef,
    /// `java.lang.Class`
    pub class: TypeRef,
    /// `java.util.Objects`
    pub objects: TypeRef,
    /// `java.lang.System`
    pub system: TypeRef,
    /// `java.lang.reflect.Array`
    pub reflect_array: TypeRef,
    /// `java.lang.NullPointerException`
    pub npe: TypeRef,
    /// `java.lang.IllegalArgumentException`
    pub iae: TypeRef,
    /// `java.lang.invoke.LambdaMetafactory`
    pub lambda_metafactory_type: TypeRef,

    // java.lang.Enum
    /// `Enum.<init>(String, int)`
    pub enum_init: MethodRef,
    /// `Enum.ordinal()`
    pub enum_ordinal: MethodRef,
    /// `Enum.name()`
    pub enum_name: MethodRef,
    /// `Enum.toString()`
    pub enum_to_string: MethodRef,
    /// `Enum.hashCode()`
    pub enum_hash_code: MethodRef,
    /// `Enum.equals(Object)`
    pub enum_equals: MethodRef,
    /// `Enum.compareTo(Enum)`
    pub enum_compare_to: MethodRef,
    /// `Enum.compareTo(Object)` bridge
    pub enum_compare_to_object: MethodRef,
    /// `Enum.valueOf(Class, String)`
    pub enum_value_of: MethodRef,
    /// `Enum.name`
    pub enum_name_field: FieldRef,
    /// `Enum.ordinal`
    pub enum_ordinal_field: FieldRef,

    // java.lang.Object
    /// `Object.<init>()`
    pub object_init: MethodRef,
    /// `Object.getClass()`
    pub object_get_class: MethodRef,
    /// `Object.toString()`
    pub object_to_string: MethodRef,
    /// `Object.hashCode()`
    pub object_hash_code: MethodRef,
    /// `Object.equals(Object)`
    pub object_equals: MethodRef,
    /// `Object.clone()`
    pub object_clone: MethodRef,

    // java.util.Objects
    /// `Objects.requireNonNull(Object)`
    pub objects_require_non_null: MethodRef,
    /// `Objects.requireNonNull(Object, String)`
    pub objects_require_non_null_message: MethodRef,
    /// `Objects.toString(Object)`
    pub objects_to_string: MethodRef,
    /// `Objects.equals(Object, Object)`
    pub objects_equals: MethodRef,

    // java.lang.String
    /// `String.valueOf(Object)`
    pub string_value_of: MethodRef,
    /// `String.equals(Object)`
    pub string_equals: MethodRef,

    /// `StringBuilder` members
    pub string_builder: StringBuildingMethods,
    /// `StringBuffer` members
    pub string_buffer: StringBuildingMethods,

    // java.lang.System
    /// `System.arraycopy(Object, int, Object, int, int)`
    pub system_arraycopy: MethodRef,
    /// `System.identityHashCode(Object)`
    pub system_identity_hash_code: MethodRef,

    // java.lang.Class
    /// `Class.getName()`
    pub class_get_name: MethodRef,
    /// `Class.getSimpleName()`
    pub class_get_simple_name: MethodRef,
    /// `Class.getCanonicalName()`
    pub class_get_canonical_name: MethodRef,
    /// `Class.desiredAssertionStatus()`
    pub class_desired_assertion_status: MethodRef,

    // java.lang.reflect.Array
    /// `Array.newInstance(Class, int[])`
    pub array_new_instance_dims: MethodRef,

    // Exceptions
    /// `NullPointerException.<init>()`
    pub npe_init: MethodRef,
    /// `NullPointerException.<init>(String)`
    pub npe_init_message: MethodRef,
    /// `IllegalArgumentException.<init>(String)`
    pub iae_init_message: MethodRef,

    /// `LambdaMetafactory.metafactory(...)`
    pub lambda_metafactory: MethodRef,
}

impl KnownRefs {
    /// Interns every well-known reference into `symbols`.
    pub fn new(symbols: &Symbols) -> Self {
        let void = symbols.ty("V");
        let boolean = symbols.ty("Z");
        let int = symbols.ty("I");
        let long = symbols.ty("J");
        let double = symbols.ty("D");
        let int_array = symbols.array_of(int);
        let object = symbols.class("java.lang.Object");
        let object_array = symbols.array_of(object);
        let enum_type = symbols.class("java.lang.Enum");
        let string = symbols.class("java.lang.String");
        let class = symbols.class("java.lang.Class");
        let objects = symbols.class("java.util.Objects");
        let system = symbols.class("java.lang.System");
        let reflect_array = symbols.class("java.lang.reflect.Array");
        let npe = symbols.class("java.lang.NullPointerException");
        let iae = symbols.class("java.lang.IllegalArgumentException");
        let lambda_metafactory_type = symbols.class("java.lang.invoke.LambdaMetafactory");

        let m = |holder: TypeRef, name: &str, ret: TypeRef, params: &[TypeRef]| {
            symbols.method(holder, name, symbols.proto(ret, params))
        };

        let string_building = |ty: TypeRef| StringBuildingMethods {
            ty,
            init: m(ty, "<init>", void, &[]),
            append_object: m(ty, "append", ty, &[object]),
            append_string: m(ty, "append", ty, &[string]),
            to_string: m(ty, "toString", string, &[]),
        };

        let lookup = symbols.class("java.lang.invoke.MethodHandles$Lookup");
        let method_type = symbols.class("java.lang.invoke.MethodType");
        let method_handle = symbols.class("java.lang.invoke.MethodHandle");
        let call_site = symbols.class("java.lang.invoke.CallSite");

        Self {
            void,
            boolean,
            int,
            long,
            double,
            int_array,
            object,
            object_array,
            enum_type,
            string,
            class,
            objects,
            system,
            reflect_array,
            npe,
            iae,
            lambda_metafactory_type,

            enum_init: m(enum_type, "<init>", void, &[string, int]),
            enum_ordinal: m(enum_type, "ordinal", int, &[]),
            enum_name: m(enum_type, "name", string, &[]),
            enum_to_string: m(enum_type, "toString", string, &[]),
            enum_hash_code: m(enum_type, "hashCode", int, &[]),
            enum_equals: m(enum_type, "equals", boolean, &[object]),
            enum_compare_to: m(enum_type, "compareTo", int, &[enum_type]),
            enum_compare_to_object: m(enum_type, "compareTo", int, &[object]),
            enum_value_of: m(enum_type, "valueOf", enum_type, &[class, string]),
            enum_name_field: symbols.field(enum_type, "name", string),
            enum_ordinal_field: symbols.field(enum_type, "ordinal", int),

            object_init: m(object, "<init>", void, &[]),
            object_get_class: m(object, "getClass", class, &[]),
            object_to_string: m(object, "toString", string, &[]),
            object_hash_code: m(object, "hashCode", int, &[]),
            object_equals: m(object, "equals", boolean, &[object]),
            object_clone: m(object, "clone", object, &[]),

            objects_require_non_null: m(objects, "requireNonNull", object, &[object]),
            objects_require_non_null_message: m(
                objects,
                "requireNonNull",
                object,
                &[object, string],
            ),
            objects_to_string: m(objects, "toString", string, &[object]),
            objects_equals: m(objects, "equals", boolean, &[object, object]),

            string_value_of: m(string, "valueOf", string, &[object]),
            string_equals: m(string, "equals", boolean, &[object]),

            string_builder: string_building(symbols.class("java.lang.StringBuilder")),
            string_buffer: string_building(symbols.class("java.lang.StringBuffer")),

            system_arraycopy: m(system, "arraycopy", void, &[object, int, object, int, int]),
            system_identity_hash_code: m(system, "identityHashCode", int, &[object]),

            class_get_name: m(class, "getName", string, &[]),
            class_get_simple_name: m(class, "getSimpleName", string, &[]),
            class_get_canonical_name: m(class, "getCanonicalName", string, &[]),
            class_desired_assertion_status: m(class, "desiredAssertionStatus", boolean, &[]),

            array_new_instance_dims: m(reflect_array, "newInstance", object, &[class, int_array]),

            npe_init: m(npe, "<init>", void, &[]),
            npe_init_message: m(npe, "<init>", void, &[string]),
            iae_init_message: m(iae, "<init>", void, &[string]),

            lambda_metafactory: m(
                lambda_metafactory_type,
                "metafactory",
                call_site,
                &[lookup, string, method_type, method_type, method_handle, method_type],
            ),
        }
    }

    /// Returns the string-building class description for `ty`, if it is one.
    #[must_use]
    pub fn string_building(&self, ty: TypeRef) -> Option<&StringBuildingMethods> {
        if ty == self.string_builder.ty {
            Some(&self.string_builder)
        } else if ty == self.string_buffer.ty {
            Some(&self.string_buffer)
        } else {
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_known_refs_are_stable() {
        let symbols = Symbols::new();
        let a = KnownRefs::new(&symbols);
        let b = KnownRefs::new(&symbols);
        assert_eq!(a.enum_ordinal, b.enum_ordinal);
        assert_eq!(a.string_builder.append_object, b.string_builder.append_object);
        assert_eq!(
            symbols.method_to_source(a.enum_compare_to),
            "int java.lang.Enum.compareTo(java.lang.Enum)"
        );
    }

    #[test]
    fn test_string_building_lookup() {
        let symbols = Symbols::new();
        let known = KnownRefs::new(&symbols);
        let builder = symbols.class("java.lang.StringBuilder");
        assert!(known.string_building(builder).is_some());
        assert!(known.string_building(known.string).is_none());
    }
}
