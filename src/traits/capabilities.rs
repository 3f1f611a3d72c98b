//! Capabilities the registry calls into: factories and stoppable services.

use std::fmt;
use std::marker::PhantomData;
use std::sync::Arc;

use crate::class::{markers, AnyArc, ClassBuilder, ClassDescriptor, ClassInspector, CreateFn, ServiceType};
use crate::error::{BoxError, RegistryError, RegistryResult};
use crate::instance::{Instance, RawValue};
use crate::key::simple_name;

/// Creates objects of type `T`.
///
/// A service implementing `Factory<T>` is found by
/// [`get_factory`](crate::ServiceRegistryExt::get_factory) for `T` and every
/// supertype of `T`.
pub trait Factory<T: ?Sized>: Send + Sync {
    fn create(&self) -> Arc<T>;
}

impl<E: ?Sized + ServiceType + Send + Sync> ServiceType for dyn Factory<E> {
    fn describe() -> ClassDescriptor {
        let create: CreateFn = Arc::new(|value: &AnyArc| {
            value
                .downcast_ref::<Arc<dyn Factory<E>>>()
                .map(|factory| RawValue::new(factory.create()))
        });
        ClassBuilder::<dyn Factory<E>>::interface()
            .supertype::<markers::Factory>()
            .factory_of::<E>(create)
            .build()
    }
}

/// A service that must be shut down when its registry closes.
pub trait Stoppable: Send + Sync {
    fn stop(&self) -> Result<(), BoxError>;
}

crate::interface_service!(dyn Stoppable);

/// Typed handle on a factory service found by a `Factory<T>` lookup.
pub struct ServiceFactory<T: ?Sized> {
    instance: Instance,
    inspector: Arc<ClassInspector>,
    _element: PhantomData<fn() -> Arc<T>>,
}

impl<T: ?Sized + ServiceType + Send + Sync> ServiceFactory<T> {
    pub(crate) fn new(instance: Instance, inspector: Arc<ClassInspector>) -> Self {
        ServiceFactory { instance, inspector, _element: PhantomData }
    }

    /// The factory service itself.
    pub fn instance(&self) -> &Instance {
        &self.instance
    }

    /// Creates a new object through the factory.
    pub fn create(&self) -> RegistryResult<Arc<T>> {
        let not_a_factory = || {
            RegistryError::IllegalState(format!("Service of type {} is not a factory.", self.instance.class()))
        };
        let view = self.instance.details().factory(&self.inspector).ok_or_else(not_a_factory)?;
        let factory = self.instance.cast_erased(view.interface).ok_or_else(not_a_factory)?;
        let raw = (view.create)(&factory).ok_or_else(not_a_factory)?;
        let produced = Instance::new(self.inspector.details(view.element), raw);
        produced.cast::<T>().ok_or_else(|| {
            RegistryError::IllegalState(format!(
                "Factory of type {} produced an object of type {} which cannot be converted to {}.",
                self.instance.class(),
                view.element,
                simple_name(std::any::type_name::<T>())
            ))
        })
    }
}

impl<T: ?Sized> Clone for ServiceFactory<T> {
    fn clone(&self) -> Self {
        ServiceFactory {
            instance: self.instance.clone(),
            inspector: Arc::clone(&self.inspector),
            _element: PhantomData,
        }
    }
}

impl<T: ?Sized> fmt::Debug for ServiceFactory<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServiceFactory")
            .field("element", &simple_name(std::any::type_name::<T>()))
            .field("instance", &self.instance)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::key::ClassKey;

    struct Widget(u32);
    crate::concrete_service!(Widget);

    struct WidgetFactory;
    impl Factory<Widget> for WidgetFactory {
        fn create(&self) -> Arc<Widget> {
            Arc::new(Widget(7))
        }
    }
    crate::concrete_service!(WidgetFactory: dyn Factory<Widget>);

    #[test]
    fn factory_element_is_found_through_the_hierarchy() {
        let inspector = Arc::new(ClassInspector::new());
        let details = inspector.details(ClassKey::of::<WidgetFactory>());
        let view = details.factory(&inspector).map(|view| (view.interface, view.element));
        assert_eq!(view, Some((ClassKey::of::<dyn Factory<Widget>>(), ClassKey::of::<Widget>())));
        assert!(details.is_subtype_of(ClassKey::of::<markers::Factory>()));

        let instance = Instance::new(details, RawValue::new(Arc::new(WidgetFactory)));
        let factory = ServiceFactory::<Widget>::new(instance, inspector);
        assert_eq!(factory.create().map(|w| w.0).ok(), Some(7));
    }

    #[test]
    fn non_factories_have_no_element() {
        let inspector = ClassInspector::new();
        assert!(inspector.details(ClassKey::of::<Widget>()).factory(&inspector).is_none());
    }
}
