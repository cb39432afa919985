//! Reasons an enum cannot be unboxed.
//!
//! Every rejection is a [`Reason`]; none of them is an error. Reports count
//! reasons through their payload-free discriminant [`ReasonKind`].

use strum::{EnumDiscriminants, EnumIter, IntoStaticStr};

use crate::program::symbols::{FieldRef, MethodRef, Symbols};

/// Identifies the enum instance a data-finalization reason is about.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EnumInstanceRef {
    /// The static field holding the instance.
    Field(FieldRef),
    /// The instance's position in `$VALUES`.
    Ordinal(usize),
}

/// Why an enum is not unboxed.
#[derive(Debug, Clone, PartialEq, Eq, Hash, strum::Display, EnumDiscriminants)]
#[strum_discriminants(name(ReasonKind))]
#[strum_discriminants(doc = "The payload-free kind of a [`Reason`].")]
#[strum_discriminants(allow(missing_docs))]
#[strum_discriminants(derive(Hash, PartialOrd, Ord, strum::Display, EnumIter, IntoStaticStr))]
pub enum Reason {
    /// The use is legal.
    Eligible,
    /// The enum, or a kept member mentioning it, is pinned.
    Pinned,
    /// The enum is returned by an annotation method.
    Annotation,
    /// The enum declares too many instance fields.
    ManyInstanceFields,
    /// The enum has constant bodies and subtypes are disabled.
    SubtypesDisabled,
    /// A subtype declares fields, is extended, or nests deeper than one level.
    InvalidSubtype,
    /// An instance field of the enum is assigned outside its initializer.
    AssignmentOutsideInit,
    /// A `const-class` of the enum is used in an unsupported way.
    ConstClass,
    /// A default interface method is invoked on an enum value.
    DefaultMethodInvoke,
    /// An enum value is cast to a type other than its own.
    DownCast,
    /// An enum method is invoked on `null`.
    EnumMethodCalledWithNullReceiver,
    /// An enum value is returned as a supertype.
    ImplicitUpCastInReturn,
    /// An array store mixes the enum with another type.
    InvalidArrayPut,
    /// The class initializer may have side effects.
    InvalidClinit,
    /// An enum value is stored into a field through an unexpected path.
    InvalidFieldPut,
    /// Two values of different types are compared.
    InvalidIfTypes,
    /// An instance initializer has side effects or is called from elsewhere.
    InvalidInit,
    /// An invoke cannot be resolved to a single target.
    InvalidInvoke,
    /// An enum value reaches a classpath method.
    InvalidInvokeClasspath,
    /// The enum appears in an unsupported `invoke-custom`.
    InvalidInvokeCustom,
    /// An array of the enum is built with foreign elements.
    InvalidInvokeNewArray,
    /// A method other than `clone` is invoked on an enum array.
    InvalidInvokeOnArray,
    /// A phi merges the enum with another type.
    InvalidPhi,
    /// A subtype's instance initializer may have side effects.
    InvalidSubtypeInit,
    /// A subtype has a class initializer.
    SubtypeClinit,
    /// An enum value flows into an instruction the rewriter cannot express.
    OtherUnsupportedInstruction,
    /// An enum value is stored into a field of a different type.
    TypeMismatchFieldPut,
    /// A field access on the enum does not resolve.
    UnresolvableField,
    /// An enum value is passed where the parameter type is less precise.
    IllegalInvokeWithImpreciseParameterType(MethodRef),
    /// An enum value is compared with a value of another type.
    UnboxedValueNonComparable(MethodRef),
    /// An enum value reaches an unmodeled library method.
    UnsupportedLibraryInvoke(MethodRef),
    /// No static field values were recorded for the enum.
    MissingEnumStaticFieldValues,
    /// No object state is known for an enum constant field.
    MissingObjectStateForEnumInstance(FieldRef),
    /// An instance field has no single known value for some constant.
    MissingInstanceFieldValueForEnumInstance {
        /// The instance field, if the value of a specific field is missing.
        field: Option<FieldRef>,
        /// The constant's ordinal, if known.
        ordinal: Option<usize>,
    },
    /// The exact class of a constant is unknown although the enum has
    /// subtypes.
    MissingExactDynamicEnumTypeForEnumWithSubtypes(EnumInstanceRef),
    /// The contents of a `$VALUES` array are unknown.
    MissingContentsForEnumValuesArray(FieldRef),
    /// An instance field holds a value that is neither a number nor a string.
    UnsupportedInstanceFieldValueForEnumInstance {
        /// The instance field.
        field: FieldRef,
        /// The constant's ordinal.
        ordinal: usize,
    },
}

impl Reason {
    /// The payload-free kind of this reason.
    #[must_use]
    pub fn kind(&self) -> ReasonKind {
        ReasonKind::from(self)
    }

    /// Returns `true` for [`Reason::Eligible`].
    #[must_use]
    pub fn is_eligible(&self) -> bool {
        matches!(self, Self::Eligible)
    }

    /// Renders the reason with member names resolved.
    #[must_use]
    pub fn describe(&self, symbols: &Symbols) -> String {
        match self {
            Self::IllegalInvokeWithImpreciseParameterType(method)
            | Self::UnboxedValueNonComparable(method)
            | Self::UnsupportedLibraryInvoke(method) => {
                format!("{self}({})", symbols.method_to_source(*method))
            }
            Self::MissingObjectStateForEnumInstance(field)
            | Self::MissingContentsForEnumValuesArray(field) => {
                format!("{self}({})", symbols.field_to_source(*field))
            }
            Self::MissingInstanceFieldValueForEnumInstance { field, ordinal } => {
                let mut parts = Vec::new();
                if let Some(field) = field {
                    parts.push(symbols.field_to_source(*field));
                }
                if let Some(ordinal) = ordinal {
                    parts.push(format!("ordinal {ordinal}"));
                }
                format!("{self}({})", parts.join(", "))
            }
            Self::MissingExactDynamicEnumTypeForEnumWithSubtypes(instance) => match instance {
                EnumInstanceRef::Field(field) => {
                    format!("{self}({})", symbols.field_to_source(*field))
                }
                EnumInstanceRef::Ordinal(ordinal) => format!("{self}(ordinal {ordinal})"),
            },
            Self::UnsupportedInstanceFieldValueForEnumInstance { field, ordinal } => {
                format!(
                    "{self}({}, ordinal {ordinal})",
                    symbols.field_to_source(*field)
                )
            }
            _ => self.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use strum::IntoEnumIterator;

    use super::*;

    #[test]
    fn test_kind_drops_payload() {
        let symbols = Symbols::new();
        let holder = symbols.class("com.example.Main");
        let method = symbols.method(holder, "run", symbols.proto(symbols.ty("V"), &[]));

        let reason = Reason::UnsupportedLibraryInvoke(method);
        assert_eq!(reason.kind(), ReasonKind::UnsupportedLibraryInvoke);
        assert_eq!(reason.to_string(), "UnsupportedLibraryInvoke");
        assert_eq!(
            reason.describe(&symbols),
            "UnsupportedLibraryInvoke(void com.example.Main.run())"
        );
        let name: &'static str = ReasonKind::Pinned.into();
        assert_eq!(name, "Pinned");
    }

    #[test]
    fn test_kinds_are_enumerable() {
        let kinds: Vec<ReasonKind> = ReasonKind::iter().collect();
        assert!(kinds.contains(&ReasonKind::InvalidPhi));
        assert!(kinds.contains(&ReasonKind::MissingContentsForEnumValuesArray));
        assert_eq!(kinds.first(), Some(&ReasonKind::Eligible));
    }

    #[test]
    fn test_describe_ordinal_payloads() {
        let symbols = Symbols::new();
        let reason = Reason::MissingExactDynamicEnumTypeForEnumWithSubtypes(
            EnumInstanceRef::Ordinal(2),
        );
        assert_eq!(
            reason.describe(&symbols),
            "MissingExactDynamicEnumTypeForEnumWithSubtypes(ordinal 2)"
        );
        assert!(Reason::Eligible.is_eligible());
    }
}
