//! The modeled platform library.
//!
//! Only the classes and members the optimizer reasons about are installed.
//! They carry no bodies. What matters is their flags: `Enum.ordinal()` being
//! final is what makes a virtual call on an enum value resolve to a single
//! target.

use crate::program::{
    class::{AccessFlags, ClassDef, ClassOrigin, FieldDef, MethodDef},
    known::{KnownRefs, StringBuildingMethods},
    symbols::{FieldRef, MethodRef, Symbols, TypeRef},
};

const PUBLIC: AccessFlags = AccessFlags::PUBLIC;
const PUBLIC_FINAL: AccessFlags = AccessFlags::PUBLIC.union(AccessFlags::FINAL);
const PUBLIC_STATIC: AccessFlags = AccessFlags::PUBLIC.union(AccessFlags::STATIC);

struct LibraryClass {
    def: ClassDef,
}

impl LibraryClass {
    fn new(ty: TypeRef, super_type: Option<TypeRef>, flags: AccessFlags) -> Self {
        Self {
            def: ClassDef::new(ty, super_type, flags, ClassOrigin::Library),
        }
    }

    fn method(mut self, method: MethodRef, flags: AccessFlags) -> Self {
        self.def.methods.push(MethodDef::new(method, flags));
        self
    }

    fn field(mut self, field: FieldRef, flags: AccessFlags) -> Self {
        self.def.fields.push(FieldDef::new(field, flags));
        self
    }

    fn string_building(methods: &StringBuildingMethods, object: TypeRef) -> Self {
        Self::new(methods.ty, Some(object), PUBLIC_FINAL)
            .method(methods.init, PUBLIC)
            .method(methods.append_object, PUBLIC)
            .method(methods.append_string, PUBLIC)
            .method(methods.to_string, PUBLIC)
    }
}

/// Builds the library class definitions for `known`.
pub fn library_classes(symbols: &Symbols, known: &KnownRefs) -> Vec<ClassDef> {
    let object = Some(known.object);
    let runtime_exception = symbols.class("java.lang.RuntimeException");

    let classes = vec![
        LibraryClass::new(known.object, None, PUBLIC)
            .method(known.object_init, PUBLIC)
            .method(known.object_get_class, PUBLIC_FINAL)
            .method(known.object_to_string, PUBLIC)
            .method(known.object_hash_code, PUBLIC)
            .method(known.object_equals, PUBLIC)
            .method(known.object_clone, AccessFlags::PROTECTED),
        LibraryClass::new(
            known.enum_type,
            object,
            PUBLIC | AccessFlags::ABSTRACT | AccessFlags::ENUM,
        )
        .method(known.enum_init, AccessFlags::PROTECTED)
        .method(known.enum_ordinal, PUBLIC_FINAL)
        .method(known.enum_name, PUBLIC_FINAL)
        .method(known.enum_to_string, PUBLIC)
        .method(known.enum_hash_code, PUBLIC_FINAL)
        .method(known.enum_equals, PUBLIC_FINAL)
        .method(known.enum_compare_to, PUBLIC_FINAL)
        .method(
            known.enum_compare_to_object,
            PUBLIC | AccessFlags::BRIDGE | AccessFlags::SYNTHETIC,
        )
        .method(known.enum_value_of, PUBLIC_STATIC)
        .field(known.enum_name_field, AccessFlags::PRIVATE | AccessFlags::FINAL)
        .field(known.enum_ordinal_field, AccessFlags::PRIVATE | AccessFlags::FINAL),
        LibraryClass::new(known.string, object, PUBLIC_FINAL)
            .method(known.string_value_of, PUBLIC_STATIC)
            .method(known.string_equals, PUBLIC),
        LibraryClass::new(known.class, object, PUBLIC_FINAL)
            .method(known.class_get_name, PUBLIC)
            .method(known.class_get_simple_name, PUBLIC)
            .method(known.class_get_canonical_name, PUBLIC)
            .method(known.class_desired_assertion_status, PUBLIC),
        LibraryClass::new(known.objects, object, PUBLIC_FINAL)
            .method(known.objects_require_non_null, PUBLIC_STATIC)
            .method(known.objects_require_non_null_message, PUBLIC_STATIC)
            .method(known.objects_to_string, PUBLIC_STATIC)
            .method(known.objects_equals, PUBLIC_STATIC),
        LibraryClass::new(known.system, object, PUBLIC_FINAL)
            .method(known.system_arraycopy, PUBLIC_STATIC)
            .method(known.system_identity_hash_code, PUBLIC_STATIC),
        LibraryClass::new(known.reflect_array, object, PUBLIC_FINAL)
            .method(known.array_new_instance_dims, PUBLIC_STATIC),
        LibraryClass::string_building(&known.string_builder, known.object),
        LibraryClass::string_building(&known.string_buffer, known.object),
        LibraryClass::new(runtime_exception, object, PUBLIC),
        LibraryClass::new(known.npe, Some(runtime_exception), PUBLIC)
            .method(known.npe_init, PUBLIC)
            .method(known.npe_init_message, PUBLIC),
        LibraryClass::new(known.iae, Some(runtime_exception), PUBLIC)
            .method(known.iae_init_message, PUBLIC),
        LibraryClass::new(known.lambda_metafactory_type, object, PUBLIC_FINAL)
            .method(known.lambda_metafactory, PUBLIC_STATIC),
    ];

    classes.into_iter().map(|c| c.def).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_enum_final_methods() {
        let symbols = Symbols::new();
        let known = KnownRefs::new(&symbols);
        let classes = library_classes(&symbols, &known);
        let enum_class = classes
            .iter()
            .find(|c| c.ty == known.enum_type)
            .unwrap();

        for m in [
            known.enum_ordinal,
            known.enum_name,
            known.enum_equals,
            known.enum_hash_code,
            known.enum_compare_to,
        ] {
            assert!(enum_class.method(m).unwrap().flags.contains(AccessFlags::FINAL));
        }
        assert!(!enum_class
            .method(known.enum_to_string)
            .unwrap()
            .flags
            .contains(AccessFlags::FINAL));
        assert!(classes.iter().all(|c| c.origin == ClassOrigin::Library));
    }
}
