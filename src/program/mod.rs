//! The program model the optimizer works on.
//!
//! - [`symbols`] interns types, prototypes, methods and fields.
//! - [`class`] holds class, field and method definitions with their
//!   optimization info.
//! - [`app`] is the whole-program view: classes, keep info and the lens chain.
//! - [`lens`] maps references across program rewrites.
//! - [`builder`] assembles programs for tests and embedders.

pub mod app;
pub mod builder;
pub mod class;
pub mod keep;
pub mod known;
pub mod lens;
pub mod library;
pub mod symbols;
pub mod value;

pub use app::AppView;
pub use builder::{ClassBuilder, EnumClass, EnumClassBuilder, ProgramBuilder};
pub use class::{
    AccessFlags, CheckNotNullInfo, ClassDef, ClassOrigin, FieldDef, FieldOptimizationInfo,
    MethodDef, MethodOptimizationInfo,
};
pub use keep::{KeepInfo, PrunedItems};
pub use known::{KnownRefs, StringBuildingMethods};
pub use lens::{GraphLens, LensKind, LensLayer, MethodLookup, RenameLens, RewrittenPrototype};
pub use symbols::{FieldRef, MethodRef, ProtoRef, Symbols, TypeRef};
pub use value::{AbstractValue, ObjectState, StaticFieldValue};
