//! Conversion between realized instances and typed method arguments.

use std::sync::Arc;

use crate::class::{ClassInspector, ServiceType};
use crate::error::BoxError;
use crate::instance::{Instance, InstanceList, RawValue};
use crate::key::{ClassKey, TypeSpec};
use crate::registry::ServiceRegistration;
use crate::traits::ServiceFactory;

/// A value that can be injected as a method or constructor parameter.
///
/// | Rust parameter          | Looked up as  |
/// |-------------------------|---------------|
/// | `Arc<T>`                | `T`           |
/// | `Vec<Arc<T>>`           | `List<T>`     |
/// | `ServiceFactory<T>`     | `Factory<T>`  |
/// | `ServiceRegistration`   | configure methods only |
pub trait Inject: Sized + Send + 'static {
    /// The type this parameter is looked up as.
    fn spec() -> TypeSpec;

    /// Converts the resolved instance into the parameter value.
    fn from_instance(instance: &Instance, inspector: &Arc<ClassInspector>) -> Option<Self>;
}

impl<T: ?Sized + ServiceType + Send + Sync> Inject for Arc<T> {
    fn spec() -> TypeSpec {
        TypeSpec::of::<T>()
    }

    fn from_instance(instance: &Instance, _inspector: &Arc<ClassInspector>) -> Option<Self> {
        instance.cast::<T>()
    }
}

impl<T: ?Sized + ServiceType + Send + Sync> Inject for Vec<Arc<T>> {
    fn spec() -> TypeSpec {
        TypeSpec::list_of(TypeSpec::of::<T>())
    }

    fn from_instance(instance: &Instance, _inspector: &Arc<ClassInspector>) -> Option<Self> {
        instance.cast::<InstanceList>().map(|list| list.cast_all::<T>())
    }
}

impl<T: ?Sized + ServiceType + Send + Sync> Inject for ServiceFactory<T> {
    fn spec() -> TypeSpec {
        TypeSpec::factory_of(TypeSpec::of::<T>())
    }

    fn from_instance(instance: &Instance, inspector: &Arc<ClassInspector>) -> Option<Self> {
        let view = instance.details().factory(inspector)?;
        if !inspector.is_assignable(ClassKey::of::<T>(), view.element) {
            return None;
        }
        Some(ServiceFactory::new(instance.clone(), Arc::clone(inspector)))
    }
}

impl Inject for ServiceRegistration {
    fn spec() -> TypeSpec {
        TypeSpec::of::<ServiceRegistration>()
    }

    fn from_instance(instance: &Instance, _inspector: &Arc<ClassInspector>) -> Option<Self> {
        instance.cast::<ServiceRegistration>().map(|registration| (*registration).clone())
    }
}

/// A tuple of [`Inject`] parameters.
pub trait InjectArgs: Sized + Send + 'static {
    /// Parameter types, in declaration order.
    fn specs() -> Vec<TypeSpec>;

    /// Builds the tuple from resolved instances, one per parameter.
    fn extract(args: &[Instance], inspector: &Arc<ClassInspector>) -> Result<Self, BoxError>;
}

fn extract_arg<I: Inject>(args: &[Instance], index: usize, inspector: &Arc<ClassInspector>) -> Result<I, BoxError> {
    let instance = args
        .get(index)
        .ok_or_else(|| format!("Missing argument for parameter #{}.", index + 1))?;
    I::from_instance(instance, inspector).ok_or_else(|| {
        format!(
            "Argument of type {} for parameter #{} cannot be converted to {}.",
            instance.class(),
            index + 1,
            I::spec()
        )
        .into()
    })
}

macro_rules! impl_inject_args {
    ($($name:ident : $index:tt),*) => {
        impl<$($name: Inject),*> InjectArgs for ($($name,)*) {
            fn specs() -> Vec<TypeSpec> {
                vec![$($name::spec()),*]
            }

            #[allow(unused_variables)]
            fn extract(args: &[Instance], inspector: &Arc<ClassInspector>) -> Result<Self, BoxError> {
                Ok(($(extract_arg::<$name>(args, $index, inspector)?,)*))
            }
        }
    };
}

impl_inject_args!();
impl_inject_args!(A: 0);
impl_inject_args!(A: 0, B: 1);
impl_inject_args!(A: 0, B: 1, C: 2);
impl_inject_args!(A: 0, B: 1, C: 2, D: 3);
impl_inject_args!(A: 0, B: 1, C: 2, D: 3, E: 4);
impl_inject_args!(A: 0, B: 1, C: 2, D: 3, E: 4, F: 5);
impl_inject_args!(A: 0, B: 1, C: 2, D: 3, E: 4, F: 5, G: 6);
impl_inject_args!(A: 0, B: 1, C: 2, D: 3, E: 4, F: 5, G: 6, H: 7);

/// The return value of a provider method.
///
/// `()` marks a configure method. `Option::None` is the "returned null" case
/// and `Err` is a failure raised by the method itself.
pub trait MethodReturn: 'static {
    /// The declared return type, `None` for `()`.
    fn spec() -> Option<TypeSpec>;

    /// Erases the returned value.
    fn into_value(self) -> Result<Option<RawValue>, BoxError>;
}

impl MethodReturn for () {
    fn spec() -> Option<TypeSpec> {
        None
    }

    fn into_value(self) -> Result<Option<RawValue>, BoxError> {
        Ok(None)
    }
}

impl<T: ?Sized + ServiceType + Send + Sync> MethodReturn for Arc<T> {
    fn spec() -> Option<TypeSpec> {
        Some(TypeSpec::of::<T>())
    }

    fn into_value(self) -> Result<Option<RawValue>, BoxError> {
        Ok(Some(RawValue::new(self)))
    }
}

impl<T: ?Sized + ServiceType + Send + Sync> MethodReturn for Option<Arc<T>> {
    fn spec() -> Option<TypeSpec> {
        Some(TypeSpec::of::<T>())
    }

    fn into_value(self) -> Result<Option<RawValue>, BoxError> {
        Ok(self.map(RawValue::new))
    }
}

impl<R, E> MethodReturn for Result<R, E>
where
    R: MethodReturn,
    E: Into<BoxError> + 'static,
{
    fn spec() -> Option<TypeSpec> {
        R::spec()
    }

    fn into_value(self) -> Result<Option<RawValue>, BoxError> {
        self.map_err(Into::into)?.into_value()
    }
}
