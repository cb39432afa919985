//! Applies one lens layer to a method body.
//!
//! After a structural rewrite pushed a new [`GraphLens`] layer, the bodies
//! that mention rewritten members still use the old references. The
//! [`LensCodeRewriter`] brings such a body up to date: field and method
//! references (and invoke kinds), the types named by allocation and type-test
//! instructions, call-site prototypes and handles, and the types of the SSA
//! variables themselves.
//!
//! Every variable whose type changed is reported with its previous type, so
//! that a later rewrite can still tell an `int` that used to be an enum from
//! an `int` that always was one.

use std::{collections::HashMap, sync::Arc};

use log::trace;

use crate::{
    analysis::ssa::{
        BootstrapArg, CallSite, HandleMember, MethodHandle, SsaFunction, SsaOp, SsaType, SsaVarId,
    },
    program::{
        lens::{map_method_structurally, GraphLens},
        symbols::{ProtoRef, Symbols, TypeRef},
    },
};

/// Result of rewriting one body.
#[derive(Debug, Default, Clone)]
pub struct LensRewrite {
    /// Whether any instruction or variable changed.
    pub changed: bool,
    /// Previous type of every retyped variable.
    pub original_types: HashMap<SsaVarId, TypeRef>,
}

/// Rewrites bodies against the newest layer of a lens chain.
pub struct LensCodeRewriter<'a> {
    symbols: &'a Symbols,
    lens: &'a GraphLens,
}

impl<'a> LensCodeRewriter<'a> {
    /// Creates a rewriter for the newest layer of `lens`.
    #[must_use]
    pub fn new(symbols: &'a Symbols, lens: &'a GraphLens) -> Self {
        Self { symbols, lens }
    }

    /// Rewrites `ssa` in place.
    pub fn rewrite(&self, ssa: &mut SsaFunction) -> LensRewrite {
        let mut result = LensRewrite::default();

        for block in ssa.blocks_mut() {
            for instr in block.instructions_mut() {
                if self.rewrite_op(instr.op_mut()) {
                    trace!("lens rewrite: {}", instr);
                    result.changed = true;
                }
            }
        }

        let retyped: Vec<(SsaVarId, TypeRef, TypeRef)> = ssa
            .variables()
            .iter()
            .filter_map(|var| {
                let old = var.ty().type_ref()?;
                let new = self.lens.apply_type(self.symbols, old);
                (new != old).then_some((var.id(), old, new))
            })
            .collect();
        for (var, old, new) in retyped {
            ssa.set_var_type(var, SsaType::from_type(self.symbols, new));
            result.original_types.insert(var, old);
            result.changed = true;
        }

        result
    }

    fn map_type(&self, ty: &mut TypeRef) -> bool {
        let mapped = self.lens.apply_type(self.symbols, *ty);
        let changed = mapped != *ty;
        *ty = mapped;
        changed
    }

    fn map_proto(&self, proto: ProtoRef) -> ProtoRef {
        let data = self.symbols.proto_data(proto).clone();
        let ret = self.lens.apply_type(self.symbols, data.ret);
        let params: Vec<TypeRef> = data
            .params
            .iter()
            .map(|p| self.lens.apply_type(self.symbols, *p))
            .collect();
        self.symbols.proto(ret, &params)
    }

    fn rewrite_op(&self, op: &mut SsaOp) -> bool {
        match op {
            SsaOp::LoadField { field, .. }
            | SsaOp::StoreField { field, .. }
            | SsaOp::LoadStaticField { field, .. }
            | SsaOp::StoreStaticField { field, .. } => {
                let mapped = self.lens.apply_field(self.symbols, *field);
                let changed = mapped != *field;
                *field = mapped;
                changed
            }
            SsaOp::Invoke { kind, method, .. } => {
                let lookup = self.lens.apply_method(self.symbols, *method, *kind);
                let changed = lookup.method != *method || lookup.kind != *kind;
                *method = lookup.method;
                *kind = lookup.kind;
                changed
            }
            SsaOp::NewArray { ty, .. }
            | SsaOp::NewArrayFilled { ty, .. }
            | SsaOp::CheckCast { ty, .. }
            | SsaOp::InstanceOf { ty, .. }
            | SsaOp::NewInstance { ty, .. } => self.map_type(ty),
            SsaOp::InvokeCustom { call_site, .. } => {
                let rewritten = self.rewrite_call_site(call_site);
                let changed = rewritten != **call_site;
                if changed {
                    *call_site = Arc::new(rewritten);
                }
                changed
            }
            SsaOp::Const { .. }
            | SsaOp::ConstClass { .. }
            | SsaOp::Binary { .. }
            | SsaOp::If { .. }
            | SsaOp::Jump { .. }
            | SsaOp::Switch { .. }
            | SsaOp::Return { .. }
            | SsaOp::Throw { .. }
            | SsaOp::LoadElement { .. }
            | SsaOp::StoreElement { .. }
            | SsaOp::ArrayLength { .. }
            | SsaOp::NewUnboxedEnumInstance { .. }
            | SsaOp::Nop => false,
        }
    }

    fn rewrite_call_site(&self, site: &CallSite) -> CallSite {
        let args = site
            .args
            .iter()
            .map(|arg| match arg {
                BootstrapArg::MethodType(proto) => BootstrapArg::MethodType(self.map_proto(*proto)),
                BootstrapArg::MethodHandle(handle) => {
                    let member = match handle.member {
                        HandleMember::Method(m) => HandleMember::Method(map_method_structurally(
                            self.symbols,
                            m,
                            |t| self.lens.apply_type(self.symbols, t),
                        )),
                        HandleMember::Field(f) => {
                            HandleMember::Field(self.lens.apply_field(self.symbols, f))
                        }
                    };
                    BootstrapArg::MethodHandle(MethodHandle {
                        kind: handle.kind,
                        member,
                    })
                }
                other => other.clone(),
            })
            .collect();
        CallSite {
            name: site.name.clone(),
            proto: self.map_proto(site.proto),
            bootstrap: site.bootstrap,
            args,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        analysis::ssa::{InvokeKind, SsaFunctionBuilder},
        program::lens::{LensKind, RenameLens},
    };

    #[test]
    fn test_rewrites_references_and_types() {
        let symbols = Symbols::new();
        let old = symbols.class("com.example.Old");
        let new = symbols.class("com.example.New");
        let void = symbols.ty("V");
        let holder = symbols.class("com.example.Main");
        let take = symbols.method(holder, "take", symbols.proto(void, &[old]));
        let field = symbols.field(holder, "value", old);

        let mut ssa = SsaFunctionBuilder::new(&symbols, &[old]).build_with(|f| {
            let arg = f.arg(0);
            f.block(0, |b| {
                b.put_static(field, arg);
                b.call_void(InvokeKind::Static, take, &[arg]);
                let _ = b.check_cast(arg, old);
                b.ret();
            });
        });

        let lens = GraphLens::identity().push(LensKind::Rename(RenameLens::new().with_type(old, new)));
        let result = LensCodeRewriter::new(&symbols, &lens).rewrite(&mut ssa);

        assert!(result.changed);
        let arg = ssa.arguments()[0];
        assert_eq!(ssa.var_type(arg), SsaType::Ref(new));
        assert_eq!(result.original_types.get(&arg), Some(&old));

        let ops: Vec<&SsaOp> = ssa.instructions().map(|(_, i)| i.op()).collect();
        match ops[0] {
            SsaOp::StoreStaticField { field, .. } => {
                assert_eq!(symbols.field_type(*field), new);
            }
            other => panic!("unexpected {other}"),
        }
        match ops[1] {
            SsaOp::Invoke { method, .. } => {
                assert_eq!(symbols.proto_data(symbols.method_proto(*method)).params, vec![new]);
            }
            other => panic!("unexpected {other}"),
        }
        ssa.verify().unwrap();
    }

    #[test]
    fn test_identity_changes_nothing() {
        let symbols = Symbols::new();
        let int = symbols.ty("I");
        let mut ssa = SsaFunctionBuilder::new(&symbols, &[int]).build_with(|f| {
            let arg = f.arg(0);
            f.block(0, |b| b.ret_val(arg));
        });
        let lens = GraphLens::identity();
        let result = LensCodeRewriter::new(&symbols, &lens).rewrite(&mut ssa);
        assert!(!result.changed);
        assert!(result.original_types.is_empty());
    }
}
