//! Call sites of `invoke-custom` instructions.
//!
//! A call site names a bootstrap method and a list of constant bootstrap
//! arguments. The only bootstrap the optimizer understands is the lambda
//! metafactory, from which it infers a [`LambdaDescriptor`]: the erased
//! interface prototype, the implementation handle and the enforced
//! (instantiated) prototype.

use std::sync::Arc;

use crate::program::symbols::{FieldRef, MethodRef, ProtoRef};

/// Kind of a constant method handle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MethodHandleKind {
    /// `REF_getStatic`
    StaticGet,
    /// `REF_putStatic`
    StaticPut,
    /// `REF_getField`
    InstanceGet,
    /// `REF_putField`
    InstancePut,
    /// `REF_invokeStatic`
    InvokeStatic,
    /// `REF_invokeVirtual`
    InvokeVirtual,
    /// `REF_invokeSpecial`
    InvokeDirect,
    /// `REF_newInvokeSpecial`
    NewInvokeSpecial,
    /// `REF_invokeInterface`
    InvokeInterface,
}

/// Member referenced by a method handle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HandleMember {
    /// A method or constructor.
    Method(MethodRef),
    /// A field.
    Field(FieldRef),
}

/// A constant method handle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MethodHandle {
    /// The handle kind.
    pub kind: MethodHandleKind,
    /// The referenced member.
    pub member: HandleMember,
}

impl MethodHandle {
    /// Creates a handle invoking a static method.
    #[must_use]
    pub fn invoke_static(method: MethodRef) -> Self {
        Self {
            kind: MethodHandleKind::InvokeStatic,
            member: HandleMember::Method(method),
        }
    }

    /// Creates a handle invoking a virtual method.
    #[must_use]
    pub fn invoke_virtual(method: MethodRef) -> Self {
        Self {
            kind: MethodHandleKind::InvokeVirtual,
            member: HandleMember::Method(method),
        }
    }
}

/// A constant bootstrap argument.
#[derive(Debug, Clone, PartialEq)]
pub enum BootstrapArg {
    /// A method type.
    MethodType(ProtoRef),
    /// A method handle.
    MethodHandle(MethodHandle),
    /// An integer constant.
    Int(i32),
    /// A string constant.
    String(Arc<str>),
}

/// A dynamic call site.
#[derive(Debug, Clone, PartialEq)]
pub struct CallSite {
    /// The name passed to the bootstrap method (the interface method name for lambdas).
    pub name: Arc<str>,
    /// The call site prototype: captured arguments to the produced type.
    pub proto: ProtoRef,
    /// The bootstrap method.
    pub bootstrap: MethodRef,
    /// Constant bootstrap arguments.
    pub args: Vec<BootstrapArg>,
}

/// The parts of a lambda call site relevant to type checking.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LambdaDescriptor {
    /// The erased interface method prototype.
    pub erased: ProtoRef,
    /// The implementation method handle.
    pub implementation: MethodHandle,
    /// The instantiated prototype enforced at runtime.
    pub enforced: ProtoRef,
}

impl CallSite {
    /// Infers a lambda descriptor if this call site was produced by
    /// `metafactory` with the standard argument shape.
    #[must_use]
    pub fn lambda_descriptor(&self, lambda_metafactory: MethodRef) -> Option<LambdaDescriptor> {
        if self.bootstrap != lambda_metafactory {
            return None;
        }
        match self.args.as_slice() {
            [BootstrapArg::MethodType(erased), BootstrapArg::MethodHandle(implementation), BootstrapArg::MethodType(enforced), ..] => {
                Some(LambdaDescriptor {
                    erased: *erased,
                    implementation: *implementation,
                    enforced: *enforced,
                })
            }
            _ => None,
        }
    }

    /// Iterates the method handles among the bootstrap arguments.
    pub fn method_handles(&self) -> impl Iterator<Item = &MethodHandle> {
        self.args.iter().filter_map(|arg| match arg {
            BootstrapArg::MethodHandle(handle) => Some(handle),
            _ => None,
        })
    }

    /// Iterates the method types among the bootstrap arguments.
    pub fn method_types(&self) -> impl Iterator<Item = ProtoRef> + '_ {
        self.args.iter().filter_map(|arg| match arg {
            BootstrapArg::MethodType(proto) => Some(*proto),
            _ => None,
        })
    }
}
