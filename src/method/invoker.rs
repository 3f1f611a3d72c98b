//! Erased invocation of typed provider methods.

use std::any::Any;
use std::marker::PhantomData;
use std::sync::Arc;

use super::{InjectArgs, MethodReturn};
use crate::class::ClassInspector;
use crate::error::BoxError;
use crate::instance::{Instance, RawValue};
use crate::key::simple_name;

/// Calls a provider method on an erased provider bean.
///
/// One method per call shape: factory and decorator methods produce a value,
/// configure methods do not.
pub trait MethodInvoker: Send + Sync {
    /// Invokes a method that produces a service. `Ok(None)` means the method
    /// produced no value.
    fn invoke_factory(
        &self,
        target: &(dyn Any + Send + Sync),
        args: &[Instance],
        inspector: &Arc<ClassInspector>,
    ) -> Result<Option<RawValue>, BoxError>;

    /// Invokes a configure method.
    fn invoke_configure(
        &self,
        target: &(dyn Any + Send + Sync),
        args: &[Instance],
        inspector: &Arc<ClassInspector>,
    ) -> Result<(), BoxError> {
        self.invoke_factory(target, args, inspector).map(|_| ())
    }
}

/// A method of provider `P` backed by a typed closure.
pub(crate) struct TypedMethod<P, A, R, F> {
    call: F,
    _signature: PhantomData<fn(&P, A) -> R>,
}

impl<P, A, R, F> TypedMethod<P, A, R, F> {
    pub(crate) fn new(call: F) -> Self {
        TypedMethod { call, _signature: PhantomData }
    }
}

fn downcast_target<P: 'static>(target: &(dyn Any + Send + Sync)) -> Result<&P, BoxError> {
    target.downcast_ref::<P>().ok_or_else(|| {
        format!("Target object is not an instance of {}.", simple_name(std::any::type_name::<P>())).into()
    })
}

impl<P, A, R, F> MethodInvoker for TypedMethod<P, A, R, F>
where
    P: Send + Sync + 'static,
    A: InjectArgs,
    R: MethodReturn,
    F: Fn(&P, A) -> R + Send + Sync,
{
    fn invoke_factory(
        &self,
        target: &(dyn Any + Send + Sync),
        args: &[Instance],
        inspector: &Arc<ClassInspector>,
    ) -> Result<Option<RawValue>, BoxError> {
        let target = downcast_target::<P>(target)?;
        let args = A::extract(args, inspector)?;
        (self.call)(target, args).into_value()
    }
}

/// A method inherited from base provider `B`, reached from `P` through a
/// projection.
pub(crate) struct ProjectedMethod<P, B> {
    inner: Arc<dyn MethodInvoker>,
    project: fn(&P) -> &B,
}

impl<P, B> ProjectedMethod<P, B> {
    pub(crate) fn new(inner: Arc<dyn MethodInvoker>, project: fn(&P) -> &B) -> Self {
        ProjectedMethod { inner, project }
    }
}

impl<P, B> MethodInvoker for ProjectedMethod<P, B>
where
    P: Send + Sync + 'static,
    B: Send + Sync + 'static,
{
    fn invoke_factory(
        &self,
        target: &(dyn Any + Send + Sync),
        args: &[Instance],
        inspector: &Arc<ClassInspector>,
    ) -> Result<Option<RawValue>, BoxError> {
        let base = (self.project)(downcast_target::<P>(target)?);
        self.inner.invoke_factory(base, args, inspector)
    }
}
