//! Utility classes holding the code that replaces enum methods.
//!
//! Every unboxed enum gets a *local* utility class that receives its moved
//! methods, its residual class initializer and the accessors the rewriter
//! requests. One *shared* utility class per program holds the helpers that do
//! not depend on a particular enum (`ordinal`, `equals`, `values`, ...).
//!
//! Helper methods are requested while methods are rewritten in parallel, so
//! only their [`MethodRef`] is computed at request time. Their bodies are
//! built afterwards by [`UtilityMethodKind::build_body`].

use std::collections::HashMap;

use crate::{
    analysis::ssa::{
        CmpKind, ConstValue, InvokeKind, SsaBlockBuilder, SsaFunction, SsaFunctionBuilder, SsaVarId,
    },
    compiler::{CompilerContext, EventKind},
    enums::{data::unboxed_value, EnumDataMap},
    program::{
        app::AppView,
        class::{AccessFlags, ClassDef, ClassOrigin, FieldDef, MethodDef},
        known::KnownRefs,
        symbols::{FieldRef, MethodRef, Symbols, TypeRef},
        value::AbstractValue,
    },
    Result,
};

const LOCAL_UTILITY_SUFFIX: &str = "$EnumUnboxingLocalUtility";
const SHARED_UTILITY_SUFFIX: &str = "$EnumUnboxingSharedUtility";
const HELPER_PREFIX: &str = "$enumboxing$";

/// The synthesized utility classes.
#[derive(Debug, Clone)]
pub struct EnumUnboxingUtilityClasses {
    shared: TypeRef,
    local: HashMap<TypeRef, TypeRef>,
    shared_values_field: Option<FieldRef>,
}

impl EnumUnboxingUtilityClasses {
    /// Adds one local utility class per unboxed enum and the shared utility
    /// class to `app`.
    ///
    /// The shared class gets an `int[]` template field holding `[1..max]`,
    /// where `max` is the largest `$VALUES` size, when any enum has one.
    pub fn synthesize(app: &mut AppView, ctx: &CompilerContext, data: &EnumDataMap) -> Self {
        let symbols = app.symbols_arc();
        let known = app.known().clone();
        let flags = AccessFlags::PUBLIC | AccessFlags::FINAL | AccessFlags::SYNTHETIC;

        let mut local = HashMap::new();
        for rep in data.unboxed_types() {
            let ty = symbols.sibling_class(*rep, LOCAL_UTILITY_SUFFIX);
            app.add_class(ClassDef::new(ty, Some(known.object), flags, ClassOrigin::Program));
            local.insert(*rep, ty);
        }

        let anchor = data
            .unboxed_types()
            .iter()
            .copied()
            .min_by_key(|ty| symbols.source_name(*ty))
            .unwrap_or(known.object);
        let shared = symbols.sibling_class(anchor, SHARED_UTILITY_SUFFIX);
        let mut class = ClassDef::new(shared, Some(known.object), flags, ClassOrigin::Program);

        let max = data.max_values_size();
        let shared_values_field = (max > 0).then(|| {
            let field = symbols.field(shared, "$VALUES", known.int_array);
            class.fields.push(FieldDef::new(
                field,
                AccessFlags::PRIVATE | AccessFlags::STATIC | AccessFlags::FINAL | AccessFlags::SYNTHETIC,
            ));

            let clinit = symbols.method(shared, "<clinit>", symbols.proto(known.void, &[]));
            let body = SsaFunctionBuilder::new(&symbols, &[]).build_with(|f| {
                f.block(0, |b| {
                    let values: Vec<SsaVarId> =
                        (0..max).map(|ordinal| b.const_i32(unboxed_value(ordinal))).collect();
                    let array = b.new_array_filled(known.int_array, &values);
                    b.put_static(field, array);
                    b.ret();
                });
            });
            ctx.set_ssa(clinit, body);
            class
                .methods
                .push(MethodDef::new(clinit, AccessFlags::STATIC | AccessFlags::SYNTHETIC));
            field
        });
        app.add_class(class);

        ctx.events
            .record(EventKind::Info)
            .class(shared)
            .message(format!(
                "synthesized {} local utility classes and {}",
                local.len(),
                symbols.source_name(shared)
            ));

        Self {
            shared,
            local,
            shared_values_field,
        }
    }

    /// The shared utility class.
    #[must_use]
    pub fn shared_class(&self) -> TypeRef {
        self.shared
    }

    /// The local utility class of the unboxed enum `rep`.
    #[must_use]
    pub fn local_class(&self, rep: TypeRef) -> Option<TypeRef> {
        self.local.get(&rep).copied()
    }

    /// The `int[]` template copied by `values(int)`.
    #[must_use]
    pub fn values_field(&self) -> Option<FieldRef> {
        self.shared_values_field
    }

    /// Returns `true` if `ty` is one of the utility classes.
    #[must_use]
    pub fn is_utility_class(&self, ty: TypeRef) -> bool {
        ty == self.shared || self.local.values().any(|t| *t == ty)
    }
}

/// A helper method the rewriter can request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UtilityMethodKind {
    /// `$enumboxing$ordinal(int) -> int`
    Ordinal,
    /// `$enumboxing$equals(int, int) -> boolean`
    Equals,
    /// `$enumboxing$compareTo(int, int) -> int`
    CompareTo,
    /// `$enumboxing$objects$equals(int, int) -> boolean`
    ObjectsEquals,
    /// `$enumboxing$zeroCheck(int)`
    ZeroCheck,
    /// `$enumboxing$zeroCheckMessage(int, String)`
    ZeroCheckMessage,
    /// `values(int) -> int[]`
    Values,
    /// Reads an instance field of an unboxed value.
    FieldAccessor {
        /// The unboxed enum.
        enum_ty: TypeRef,
        /// The instance field.
        field: FieldRef,
    },
    /// `String.valueOf` of an unboxed value.
    StringValueOf {
        /// The unboxed enum.
        enum_ty: TypeRef,
    },
    /// `Enum.valueOf` for one unboxed enum.
    ValueOf {
        /// The unboxed enum.
        enum_ty: TypeRef,
    },
}

impl UtilityMethodKind {
    /// The reference of the helper.
    ///
    /// # Errors
    ///
    /// Returns an invariant violation if the helper belongs to an enum
    /// without a local utility class.
    pub fn reference(
        &self,
        symbols: &Symbols,
        known: &KnownRefs,
        utilities: &EnumUnboxingUtilityClasses,
    ) -> Result<MethodRef> {
        let int = known.int;
        let shared = utilities.shared;
        let local = |enum_ty: TypeRef| {
            utilities.local_class(enum_ty).ok_or_else(|| {
                invariant_error!("no local utility class for {}", symbols.source_name(enum_ty))
            })
        };
        let method = match *self {
            Self::Ordinal => symbols.method(
                shared,
                &format!("{HELPER_PREFIX}ordinal"),
                symbols.proto(int, &[int]),
            ),
            Self::Equals => symbols.method(
                shared,
                &format!("{HELPER_PREFIX}equals"),
                symbols.proto(known.boolean, &[int, int]),
            ),
            Self::CompareTo => symbols.method(
                shared,
                &format!("{HELPER_PREFIX}compareTo"),
                symbols.proto(int, &[int, int]),
            ),
            Self::ObjectsEquals => symbols.method(
                shared,
                &format!("{HELPER_PREFIX}objects$equals"),
                symbols.proto(known.boolean, &[int, int]),
            ),
            Self::ZeroCheck => symbols.method(
                shared,
                &format!("{HELPER_PREFIX}zeroCheck"),
                symbols.proto(known.void, &[int]),
            ),
            Self::ZeroCheckMessage => symbols.method(
                shared,
                &format!("{HELPER_PREFIX}zeroCheckMessage"),
                symbols.proto(known.void, &[int, known.string]),
            ),
            Self::Values => symbols.method(shared, "values", symbols.proto(known.int_array, &[int])),
            Self::FieldAccessor { enum_ty, field } => {
                let prefix = if symbols.field_holder(field) == known.enum_type {
                    "Enum$"
                } else {
                    ""
                };
                let name = format!(
                    "get{prefix}{}$${}",
                    symbols.field_name(field),
                    symbols.compatible_name(enum_ty)
                );
                symbols.method(
                    local(enum_ty)?,
                    &name,
                    symbols.proto(symbols.field_type(field), &[int]),
                )
            }
            Self::StringValueOf { enum_ty } => symbols.method(
                local(enum_ty)?,
                &format!("string$valueOf${}", symbols.compatible_name(enum_ty)),
                symbols.proto(known.string, &[int]),
            ),
            Self::ValueOf { enum_ty } => symbols.method(
                local(enum_ty)?,
                &format!("valueOf{}", symbols.compatible_name(enum_ty)),
                symbols.proto(int, &[known.string]),
            ),
        };
        Ok(method)
    }

    /// Builds the body of the helper.
    ///
    /// # Errors
    ///
    /// Returns an invariant violation if the enum data lacks what the helper
    /// reads: the `$VALUES` template for `values`, the name mapping for
    /// `valueOf` and `String.valueOf`, or the field mapping for accessors.
    pub fn build_body(
        &self,
        symbols: &Symbols,
        known: &KnownRefs,
        data: &EnumDataMap,
        utilities: &EnumUnboxingUtilityClasses,
    ) -> Result<SsaFunction> {
        let int = known.int;
        let body = match *self {
            Self::Ordinal => SsaFunctionBuilder::new(symbols, &[int]).build_with(|f| {
                let value = f.arg(0);
                f.block(0, |b| b.if_z(CmpKind::Eq, value, 2, 1));
                f.block(1, |b| {
                    let one = b.const_i32(1);
                    let ordinal = b.sub(value, one);
                    b.ret_val(ordinal);
                });
                f.block(2, |b| throw_npe(b, known, None));
            }),
            Self::Equals => SsaFunctionBuilder::new(symbols, &[int, int]).build_with(|f| {
                let (left, right) = (f.arg(0), f.arg(1));
                f.block(0, |b| b.if_z(CmpKind::Eq, left, 4, 1));
                f.block(1, |b| b.if_cmp(CmpKind::Eq, left, right, 2, 3));
                f.block(2, |b| {
                    let one = b.const_i32(1);
                    b.ret_val(one);
                });
                f.block(3, |b| {
                    let zero = b.const_i32(0);
                    b.ret_val(zero);
                });
                f.block(4, |b| throw_npe(b, known, None));
            }),
            Self::CompareTo => SsaFunctionBuilder::new(symbols, &[int, int]).build_with(|f| {
                let (left, right) = (f.arg(0), f.arg(1));
                f.block(0, |b| b.if_z(CmpKind::Eq, left, 3, 1));
                f.block(1, |b| b.if_z(CmpKind::Eq, right, 3, 2));
                f.block(2, |b| {
                    let diff = b.sub(left, right);
                    b.ret_val(diff);
                });
                f.block(3, |b| throw_npe(b, known, None));
            }),
            Self::ObjectsEquals => SsaFunctionBuilder::new(symbols, &[int, int]).build_with(|f| {
                let (left, right) = (f.arg(0), f.arg(1));
                f.block(0, |b| b.if_cmp(CmpKind::Eq, left, right, 1, 2));
                f.block(1, |b| {
                    let one = b.const_i32(1);
                    b.ret_val(one);
                });
                f.block(2, |b| {
                    let zero = b.const_i32(0);
                    b.ret_val(zero);
                });
            }),
            Self::ZeroCheck => SsaFunctionBuilder::new(symbols, &[int]).build_with(|f| {
                let value = f.arg(0);
                f.block(0, |b| b.if_z(CmpKind::Eq, value, 2, 1));
                f.block(1, |b| b.ret());
                f.block(2, |b| throw_npe(b, known, None));
            }),
            Self::ZeroCheckMessage => {
                SsaFunctionBuilder::new(symbols, &[int, known.string]).build_with(|f| {
                    let (value, message) = (f.arg(0), f.arg(1));
                    f.block(0, |b| b.if_z(CmpKind::Eq, value, 2, 1));
                    f.block(1, |b| b.ret());
                    f.block(2, |b| throw_npe(b, known, Some(message)));
                })
            }
            Self::Values => {
                let template = utilities
                    .values_field()
                    .ok_or_else(|| invariant_error!("values(int) requested without $VALUES"))?;
                SsaFunctionBuilder::new(symbols, &[int]).build_with(|f| {
                    let size = f.arg(0);
                    f.block(0, |b| {
                        let array = b.new_array(known.int_array, size);
                        let source = b.get_static(template);
                        let zero = b.const_i32(0);
                        b.call_void(
                            InvokeKind::Static,
                            known.system_arraycopy,
                            &[source, zero, array, zero, size],
                        );
                        b.ret_val(array);
                    });
                })
            }
            Self::FieldAccessor { enum_ty, field } => {
                let cases = field_cases(symbols, data, enum_ty, field)?;
                let field_ty = symbols.field_type(field);
                build_switch(symbols, int, &cases, |b, value| {
                    let var = const_for(b, symbols, field_ty, value);
                    b.ret_val(var);
                }, |b| throw_npe(b, known, None))
            }
            Self::StringValueOf { enum_ty } => {
                let cases = field_cases(symbols, data, enum_ty, known.enum_name_field)?;
                build_switch(symbols, int, &cases, |b, value| {
                    let var = const_for(b, symbols, known.string, value);
                    b.ret_val(var);
                }, |b| {
                    let null = b.const_str("null");
                    b.ret_val(null);
                })
            }
            Self::ValueOf { enum_ty } => build_value_of(symbols, known, data, enum_ty)?,
        };
        Ok(body)
    }

    /// Short label used in events.
    #[must_use]
    pub fn label(&self) -> &'static str {
        match self {
            Self::Ordinal => "ordinal",
            Self::Equals => "equals",
            Self::CompareTo => "compareTo",
            Self::ObjectsEquals => "objects$equals",
            Self::ZeroCheck => "zeroCheck",
            Self::ZeroCheckMessage => "zeroCheckMessage",
            Self::Values => "values",
            Self::FieldAccessor { .. } => "field accessor",
            Self::StringValueOf { .. } => "string$valueOf",
            Self::ValueOf { .. } => "valueOf",
        }
    }
}

fn throw_npe(b: &mut SsaBlockBuilder<'_, '_>, known: &KnownRefs, message: Option<SsaVarId>) {
    let exception = b.new_instance(known.npe);
    match message {
        Some(message) => b.call_void(InvokeKind::Direct, known.npe_init_message, &[exception, message]),
        None => b.call_void(InvokeKind::Direct, known.npe_init, &[exception]),
    }
    b.throw(exception);
}

/// `(unboxed value, field value)` for every live constant, in ordinal order.
fn field_cases(
    symbols: &Symbols,
    data: &EnumDataMap,
    enum_ty: TypeRef,
    field: FieldRef,
) -> Result<Vec<(i32, AbstractValue)>> {
    let enum_data = data
        .data(enum_ty)
        .ok_or_else(|| invariant_error!("{} is not unboxed", symbols.source_name(enum_ty)))?;
    let field_data = enum_data.instance_field(field).ok_or_else(|| {
        invariant_error!(
            "no data for {} of {}",
            symbols.field_name(field),
            symbols.source_name(enum_ty)
        )
    })?;
    enum_data
        .live_ordinals()
        .into_iter()
        .map(|ordinal| {
            field_data
                .value(ordinal)
                .map(|value| (unboxed_value(ordinal), value))
                .ok_or_else(|| {
                    invariant_error!(
                        "no value of {} for ordinal {ordinal}",
                        symbols.field_name(field)
                    )
                })
        })
        .collect()
}

fn const_for(
    b: &mut SsaBlockBuilder<'_, '_>,
    symbols: &Symbols,
    ty: TypeRef,
    value: &AbstractValue,
) -> SsaVarId {
    match value {
        AbstractValue::String(s) => b.const_val(ConstValue::String(s.clone())),
        // Numbers are integral; floating point fields never get a mapping.
        AbstractValue::Number(n) => match symbols.descriptor(ty) {
            "J" => b.const_val(ConstValue::Long(*n)),
            #[allow(clippy::cast_possible_truncation)]
            _ => b.const_i32(*n as i32),
        },
        _ => b.const_null(),
    }
}

/// `switch (arg0) { case v: on_case(v) ... default: on_default }`
fn build_switch<C, D>(
    symbols: &Symbols,
    int: TypeRef,
    cases: &[(i32, AbstractValue)],
    on_case: C,
    on_default: D,
) -> SsaFunction
where
    C: Fn(&mut SsaBlockBuilder<'_, '_>, &AbstractValue),
    D: FnOnce(&mut SsaBlockBuilder<'_, '_>),
{
    SsaFunctionBuilder::new(symbols, &[int]).build_with(|f| {
        let value = f.arg(0);
        let default = cases.len() + 1;
        let targets: Vec<(i32, usize)> = cases
            .iter()
            .enumerate()
            .map(|(i, (key, _))| (*key, i + 1))
            .collect();
        f.block(0, |b| b.switch(value, &targets, default));
        for (i, (_, case)) in cases.iter().enumerate() {
            f.block(i + 1, |b| on_case(b, case));
        }
        f.block(default, on_default);
    })
}

/// `valueOf<Enum>(String name)`: compares `name` against every constant name.
fn build_value_of(
    symbols: &Symbols,
    known: &KnownRefs,
    data: &EnumDataMap,
    enum_ty: TypeRef,
) -> Result<SsaFunction> {
    let cases = field_cases(symbols, data, enum_ty, known.enum_name_field)?;
    let missing = format!("No enum constant {}.", symbols.source_name(enum_ty));
    let builder = &known.string_builder;

    // 0: null check, 1 + 2k: compare with constant k, 2 + 2k: return it,
    // 1 + 2n: no match, 2 + 2n: null name.
    let no_match = 1 + 2 * cases.len();
    let null_name = no_match + 1;
    Ok(SsaFunctionBuilder::new(symbols, &[known.string]).build_with(|f| {
        let name = f.arg(0);
        f.block(0, |b| b.if_z(CmpKind::Eq, name, null_name, 1));
        for (k, (unboxed, value)) in cases.iter().enumerate() {
            let compare = 1 + 2 * k;
            f.block(compare, |b| {
                let constant = const_for(b, symbols, known.string, value);
                let equal = b.call(InvokeKind::Virtual, known.string_equals, &[constant, name]);
                b.if_z(CmpKind::Ne, equal, compare + 1, compare + 2);
            });
            f.block(compare + 1, |b| {
                let result = b.const_i32(*unboxed);
                b.ret_val(result);
            });
        }
        f.block(no_match, |b| {
            let sb = b.new_instance(builder.ty);
            b.call_void(InvokeKind::Direct, builder.init, &[sb]);
            let prefix = b.const_str(&missing);
            let sb = b.call(InvokeKind::Virtual, builder.append_string, &[sb, prefix]);
            let sb = b.call(InvokeKind::Virtual, builder.append_string, &[sb, name]);
            let message = b.call(InvokeKind::Virtual, builder.to_string, &[sb]);
            let exception = b.new_instance(known.iae);
            b.call_void(InvokeKind::Direct, known.iae_init_message, &[exception, message]);
            b.throw(exception);
        });
        f.block(null_name, |b| throw_npe(b, known, None));
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        enums::{EnumData, InstanceFieldData},
        program::builder::ProgramBuilder,
    };
    use std::{
        collections::{BTreeMap, HashSet},
        sync::Arc,
    };

    fn color_data(app: &AppView, ty: TypeRef, names: &[&str]) -> EnumDataMap {
        let mapping: BTreeMap<usize, AbstractValue> = names
            .iter()
            .enumerate()
            .map(|(i, n)| (i, AbstractValue::String(Arc::from(*n))))
            .collect();
        let mut fields = HashMap::new();
        fields.insert(app.known().enum_name_field, InstanceFieldData::Mapping(mapping));
        let mut map = EnumDataMap::empty();
        map.insert(
            ty,
            EnumData::new(fields, None, HashMap::new(), HashSet::new(), Some(names.len())),
        );
        map
    }

    #[test]
    fn test_synthesize_classes_and_template() {
        let mut builder = ProgramBuilder::new();
        let color = builder.enum_class("com.example.Color", |e| {
            e.constants(&["RED", "GREEN"]);
        });
        let (mut app, ctx) = builder.build();
        let data = color_data(&app, color.ty, &["RED", "GREEN"]);

        let utilities = EnumUnboxingUtilityClasses::synthesize(&mut app, &ctx, &data);
        let symbols = app.symbols_arc();
        assert_eq!(
            symbols.source_name(utilities.shared_class()),
            "com.example.Color$EnumUnboxingSharedUtility"
        );
        let local = utilities.local_class(color.ty).unwrap();
        assert!(app.class(local).is_some());

        let shared = app.class(utilities.shared_class()).unwrap();
        let clinit = shared.class_initializer(&symbols).unwrap().method;
        let body = ctx.ssa(clinit).unwrap();
        body.verify().unwrap();
        assert!(utilities.values_field().is_some());
    }

    #[test]
    fn test_helper_names() {
        let mut builder = ProgramBuilder::new();
        let color = builder.enum_class("com.example.Color", |e| {
            e.constants(&["RED"]);
        });
        let (mut app, ctx) = builder.build();
        let data = color_data(&app, color.ty, &["RED"]);
        let utilities = EnumUnboxingUtilityClasses::synthesize(&mut app, &ctx, &data);
        let symbols = app.symbols_arc();
        let known = app.known();

        let ordinal = UtilityMethodKind::Ordinal.reference(&symbols, known, &utilities).unwrap();
        assert_eq!(symbols.method_name(ordinal), "$enumboxing$ordinal");

        let name = UtilityMethodKind::FieldAccessor {
            enum_ty: color.ty,
            field: known.enum_name_field,
        }
        .reference(&symbols, known, &utilities)
        .unwrap();
        assert_eq!(symbols.method_name(name), "getEnum$name$$com$example$Color");

        let value_of = UtilityMethodKind::ValueOf { enum_ty: color.ty }
            .reference(&symbols, known, &utilities)
            .unwrap();
        assert_eq!(symbols.method_name(value_of), "valueOfcom$example$Color");
        assert_eq!(symbols.method_holder(value_of), utilities.local_class(color.ty).unwrap());
    }

    #[test]
    fn test_helper_bodies_verify() {
        let mut builder = ProgramBuilder::new();
        let color = builder.enum_class("com.example.Color", |e| {
            e.constants(&["RED", "GREEN", "BLUE"]);
        });
        let (mut app, ctx) = builder.build();
        let data = color_data(&app, color.ty, &["RED", "GREEN", "BLUE"]);
        let utilities = EnumUnboxingUtilityClasses::synthesize(&mut app, &ctx, &data);
        let symbols = app.symbols_arc();
        let known = app.known();

        let kinds = [
            UtilityMethodKind::Ordinal,
            UtilityMethodKind::Equals,
            UtilityMethodKind::CompareTo,
            UtilityMethodKind::ObjectsEquals,
            UtilityMethodKind::ZeroCheck,
            UtilityMethodKind::ZeroCheckMessage,
            UtilityMethodKind::Values,
            UtilityMethodKind::FieldAccessor {
                enum_ty: color.ty,
                field: known.enum_name_field,
            },
            UtilityMethodKind::StringValueOf { enum_ty: color.ty },
            UtilityMethodKind::ValueOf { enum_ty: color.ty },
        ];
        for kind in kinds {
            let body = kind.build_body(&symbols, known, &data, &utilities).unwrap();
            body.verify().unwrap_or_else(|e| panic!("{}: {e}", kind.label()));
        }
    }

    #[test]
    fn test_accessor_without_data_is_an_invariant_violation() {
        let mut builder = ProgramBuilder::new();
        let int = builder.known().int;
        let color = builder.enum_class("com.example.Color", |e| {
            e.instance_field("rgb", int);
            e.constant("RED", &[ConstValue::Int(0xff0000)]);
        });
        let (mut app, ctx) = builder.build();
        let data = color_data(&app, color.ty, &["RED"]);
        let utilities = EnumUnboxingUtilityClasses::synthesize(&mut app, &ctx, &data);
        let symbols = app.symbols_arc();

        let kind = UtilityMethodKind::FieldAccessor {
            enum_ty: color.ty,
            field: color.instance_fields[0],
        };
        assert!(matches!(
            kind.build_body(&symbols, app.known(), &data, &utilities),
            Err(crate::Error::InvariantViolation { .. })
        ));
    }
}
