//! Fixtures shared by the unit tests.

use crate::{
    analysis::{ssa::SsaFunctionContext, SsaOp},
    compiler::CompilerContext,
    program::{
        builder::{EnumClass, ProgramBuilder},
        symbols::{MethodRef, TypeRef},
    },
};

/// Routes `log` output to the test harness.
pub fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// Declares `com.example.Color` with plain constants.
pub fn color_enum(builder: &mut ProgramBuilder, names: &[&str]) -> EnumClass {
    builder.enum_class("com.example.Color", |e| {
        e.constants(names);
    })
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

/// The operations of a method body, in block order.
pub fn body_ops(ctx: &CompilerContext, method: MethodRef) -> Vec<SsaOp> {
    ctx.with_ssa(method, |ssa| {
        ssa.instructions().map(|(_, i)| i.op().clone()).collect()
    })
    .unwrap_or_default()
}
