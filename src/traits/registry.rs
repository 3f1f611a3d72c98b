//! Registry traits for service lookup.

use std::sync::Arc;

use crate::class::{ClassInspector, ServiceType};
use crate::error::{RegistryError, RegistryResult};
use crate::instance::Instance;
use crate::key::{simple_name, ClassKey, TypeSpec};
use crate::registry::ServiceRegistration;
use crate::traits::ServiceFactory;

/// Object-safe service lookup.
///
/// This is also the reserved service type under which every registry provides
/// itself; declaring a custom service of this type is rejected.
///
/// Most callers use the typed helpers of [`ServiceRegistryExt`] instead.
pub trait ServiceRegistry: Send + Sync {
    /// Looks up a single service, `None` if nothing matches.
    fn find_any(&self, spec: &TypeSpec) -> RegistryResult<Option<Instance>>;

    /// Looks up a single service, failing with
    /// [`RegistryError::UnknownService`] if nothing matches.
    fn get_any(&self, spec: &TypeSpec) -> RegistryResult<Instance> {
        self.find_any(spec)?.ok_or_else(|| {
            RegistryError::unknown(
                spec.to_string(),
                format!("No service of type {} available in {}.", spec, self.display_name()),
            )
        })
    }

    /// Lookup of a service carrying an annotation. Not supported: always
    /// fails with [`RegistryError::UnknownService`].
    fn get_annotated_any(&self, spec: &TypeSpec, annotation: ClassKey) -> RegistryResult<Instance> {
        Err(RegistryError::unknown(
            spec.to_string(),
            format!(
                "No service of type {} annotated with @{} available in {}.",
                spec,
                annotation,
                self.display_name()
            ),
        ))
    }

    /// Every service assignable to `class`, without duplicates.
    fn get_all_any(&self, class: ClassKey) -> RegistryResult<Vec<Instance>>;

    /// The factory service for objects of `class`.
    fn get_factory_any(&self, class: ClassKey) -> RegistryResult<Instance>;

    /// The class inspector backing this registry.
    fn inspector(&self) -> &Arc<ClassInspector>;

    fn display_name(&self) -> String;
}

crate::interface_service!(dyn ServiceRegistry);

fn convert<T: ?Sized + ServiceType + Send + Sync>(instance: &Instance) -> RegistryResult<Arc<T>> {
    instance.cast::<T>().ok_or_else(|| {
        RegistryError::lookup(format!(
            "Service instance of type {} cannot be converted to {}.",
            instance.class(),
            simple_name(std::any::type_name::<T>())
        ))
    })
}

/// Typed lookup helpers, available on every [`ServiceRegistry`].
///
/// ```rust
/// use std::sync::Arc;
/// use service_registry::{DefaultServiceRegistry, ServiceRegistryExt};
///
/// struct Settings {
///     verbose: bool,
/// }
/// service_registry::concrete_service!(Settings);
///
/// let registry = DefaultServiceRegistry::new();
/// registry.add(Arc::new(Settings { verbose: true })).unwrap();
///
/// assert!(registry.get::<Settings>().unwrap().verbose);
/// assert_eq!(registry.get_all::<Settings>().unwrap().len(), 1);
/// ```
pub trait ServiceRegistryExt: ServiceRegistry {
    /// The single service of type `T`.
    fn get<T: ?Sized + ServiceType + Send + Sync>(&self) -> RegistryResult<Arc<T>> {
        convert(&self.get_any(&TypeSpec::of::<T>())?)
    }

    /// The single service of type `T`, if any.
    fn find<T: ?Sized + ServiceType + Send + Sync>(&self) -> RegistryResult<Option<Arc<T>>> {
        self.find_any(&TypeSpec::of::<T>())?.map(|instance| convert(&instance)).transpose()
    }

    /// Every service of type `T`, without duplicates.
    fn get_all<T: ?Sized + ServiceType + Send + Sync>(&self) -> RegistryResult<Vec<Arc<T>>> {
        self.get_all_any(ClassKey::of::<T>())?.iter().map(convert).collect()
    }

    /// The factory for objects of type `T`.
    fn get_factory<T: ?Sized + ServiceType + Send + Sync>(&self) -> RegistryResult<ServiceFactory<T>> {
        let instance = self.get_factory_any(ClassKey::of::<T>())?;
        Ok(ServiceFactory::new(instance, Arc::clone(self.inspector())))
    }

    /// Creates a new `T` through its factory.
    fn new_instance<T: ?Sized + ServiceType + Send + Sync>(&self) -> RegistryResult<Arc<T>> {
        self.get_factory::<T>()?.create()
    }

    /// Not supported, see [`ServiceRegistry::get_annotated_any`].
    fn get_annotated<T, A>(&self) -> RegistryResult<Arc<T>>
    where
        T: ?Sized + ServiceType + Send + Sync,
        A: ServiceType,
    {
        convert(&self.get_annotated_any(&TypeSpec::of::<T>(), ClassKey::of::<A>())?)
    }
}

impl<R: ServiceRegistry + ?Sized> ServiceRegistryExt for R {}

/// Registers services through a [`ServiceRegistration`].
pub trait ServiceRegistrationAction {
    fn register_services(&self, registration: &ServiceRegistration) -> RegistryResult<()>;
}

impl<F> ServiceRegistrationAction for F
where
    F: Fn(&ServiceRegistration) -> RegistryResult<()>,
{
    fn register_services(&self, registration: &ServiceRegistration) -> RegistryResult<()> {
        self(registration)
    }
}
