//! The services registered directly in one registry.

use std::any::TypeId;
use std::collections::BTreeSet;
use std::fmt::Write as _;
use std::sync::{Arc, Weak};

use ahash::AHashMap;
use parking_lot::RwLock;
use smallvec::SmallVec;

use super::{provider_id, Service, ServiceProvider, ServiceVisitor, SingletonService};
use crate::access::ServiceAccessToken;
use crate::class::{markers, ClassInspector};
use crate::error::{RegistryError, RegistryResult};
use crate::instance::{Instance, RawValue};
use crate::internal::CompositeStoppable;
use crate::key::{format_types, ClassKey, TypeSpec};
use crate::registry::{RegistryInner, RegistryState};
use crate::traits::{AnnotatedServiceLifecycleHandler, LifecycleRegistration, ServiceRegistry};

type Providers = SmallVec<[Arc<dyn ServiceProvider>; 2]>;

/// Own services of a registry, indexed by every class in the hierarchy of
/// each declared type.
pub(crate) struct OwnServices {
    display_name: String,
    inspector: Arc<ClassInspector>,
    state: Arc<RegistryState>,
    providers_by_type: RwLock<AHashMap<TypeId, Providers>>,
    services: RwLock<Vec<Arc<SingletonService>>>,
    lifecycle_handlers: RwLock<Vec<Arc<dyn AnnotatedServiceLifecycleHandler>>>,
}

impl OwnServices {
    pub(crate) fn new(
        registry: Weak<RegistryInner>,
        display_name: String,
        inspector: Arc<ClassInspector>,
        state: Arc<RegistryState>,
    ) -> Self {
        let this_as_service = ThisAsService::new(registry, display_name.clone(), Arc::clone(&inspector));
        let mut providers_by_type = AHashMap::new();
        let reserved: Providers = smallvec::smallvec![this_as_service as Arc<dyn ServiceProvider>];
        providers_by_type.insert(TypeId::of::<dyn ServiceRegistry>(), reserved);
        OwnServices {
            display_name,
            inspector,
            state,
            providers_by_type: RwLock::new(providers_by_type),
            services: RwLock::new(Vec::new()),
            lifecycle_handlers: RwLock::new(Vec::new()),
        }
    }

    fn providers(&self, class: ClassKey) -> Providers {
        self.providers_by_type.read().get(&class.id()).cloned().unwrap_or_default()
    }

    fn ambiguity(&self, header: String, candidates: &[Arc<dyn Service>]) -> RegistryError {
        let descriptions: BTreeSet<String> = candidates.iter().map(|candidate| candidate.display_name()).collect();
        let mut message = header;
        for description in descriptions {
            let _ = write!(message, "\n   - {}", description);
        }
        RegistryError::lookup(message)
    }

    /// Adds a service, indexing it under its whole declared hierarchy.
    pub(crate) fn add(&self, service: Arc<SingletonService>) -> RegistryResult<()> {
        self.state.assert_mutable(&self.display_name)?;

        let object = ClassKey::of::<markers::Object>();
        let reserved = ClassKey::of::<dyn ServiceRegistry>();
        let mut classes = Vec::new();
        for declared in service.declared_classes() {
            for class in self.inspector.details(*declared).hierarchy() {
                if *class == object {
                    continue;
                }
                if *class == reserved {
                    return Err(RegistryError::IllegalArgument(format!(
                        "Cannot define a service of type ServiceRegistry: {}",
                        service.display_name()
                    )));
                }
                classes.push(*class);
            }
        }

        let provider: Arc<dyn ServiceProvider> = service.clone();
        {
            let mut providers_by_type = self.providers_by_type.write();
            for class in classes {
                let providers = providers_by_type.entry(class.id()).or_default();
                if !providers.iter().any(|existing| provider_id(existing) == provider_id(&provider)) {
                    providers.push(Arc::clone(&provider));
                }
            }
        }
        self.services.write().push(Arc::clone(&service));
        tracing::debug!(registry = %self.display_name, service = %service.display_name(), "service registered");

        let handlers = self.lifecycle_handlers.read().clone();
        for handler in &handlers {
            self.notify_handler(handler.as_ref(), &service);
        }
        Ok(())
    }

    /// Checks a freshly realized instance against the lifecycle handlers, and
    /// registers it as a handler when it is one.
    pub(crate) fn instance_realized(&self, service: &SingletonService, instance: &Instance) -> RegistryResult<()> {
        let handler_class = ClassKey::of::<dyn AnnotatedServiceLifecycleHandler>();
        let declared = service.declared_classes();
        if instance.details().is_subtype_of(handler_class) {
            if !declared.iter().any(|class| self.inspector.is_assignable(handler_class, *class)) {
                return Err(RegistryError::IllegalState(format!(
                    "{} implements {} but is not declared as a service of this type. This service is declared as having {}.",
                    service.display_name(),
                    handler_class,
                    format_types("type", service.service_types())
                )));
            }
            let handler = instance.cast::<dyn AnnotatedServiceLifecycleHandler>().ok_or_else(|| {
                RegistryError::IllegalState(format!(
                    "{} cannot be viewed as {}.",
                    service.display_name(),
                    handler_class
                ))
            })?;
            self.handler_created(handler);
        }

        let handlers = self.lifecycle_handlers.read().clone();
        for handler in &handlers {
            for annotation in handler.annotations() {
                let implementation_has_annotation = instance.details().has_annotation(annotation);
                if implementation_has_annotation && !self.any_type_has_annotation(annotation, declared) {
                    return Err(RegistryError::IllegalState(format!(
                        "{} is annotated with @{} but is not declared as a service with this annotation. This service is declared as having {}.",
                        service.display_name(),
                        annotation,
                        format_types("type", service.service_types())
                    )));
                }
            }
        }
        Ok(())
    }

    fn handler_created(&self, handler: Arc<dyn AnnotatedServiceLifecycleHandler>) {
        self.lifecycle_handlers.write().push(Arc::clone(&handler));
        let services = self.services.read().clone();
        for service in &services {
            self.notify_handler(handler.as_ref(), service);
        }
    }

    fn notify_handler(&self, handler: &dyn AnnotatedServiceLifecycleHandler, service: &Arc<SingletonService>) {
        let registration = RegistrationWrapper {
            service: Arc::clone(service),
            state: Arc::clone(&self.state),
            display_name: &self.display_name,
        };
        if let Some(implicit) = handler.implicit_annotation() {
            handler.when_registered(implicit, &registration);
            return;
        }
        for annotation in handler.annotations() {
            if self.any_type_has_annotation(annotation, service.declared_classes()) {
                handler.when_registered(annotation, &registration);
            }
        }
    }

    fn any_type_has_annotation(&self, annotation: ClassKey, types: &[ClassKey]) -> bool {
        types.iter().any(|class| self.inspector.has_annotation(*class, annotation))
    }
}

impl ServiceProvider for OwnServices {
    fn get_service(&self, spec: &TypeSpec, token: Option<&ServiceAccessToken>) -> RegistryResult<Option<Arc<dyn Service>>> {
        let providers = self.providers(spec.erased());
        match providers.as_slice() {
            [] => return Ok(None),
            [single] => return single.get_service(spec, token),
            _ => {}
        }
        let mut services = Vec::with_capacity(providers.len());
        for provider in &providers {
            if let Some(service) = provider.get_service(spec, token)? {
                services.push(service);
            }
        }
        if services.len() <= 1 {
            return Ok(services.pop());
        }
        Err(self.ambiguity(
            format!("Multiple services of type {} available in {}:", spec, self.display_name),
            &services,
        ))
    }

    fn get_factory(&self, element: ClassKey, token: Option<&ServiceAccessToken>) -> RegistryResult<Option<Arc<dyn Service>>> {
        let providers = self.providers(ClassKey::of::<markers::Factory>());
        let mut services = Vec::with_capacity(providers.len());
        for provider in &providers {
            if let Some(service) = provider.get_factory(element, token)? {
                services.push(service);
            }
        }
        if services.len() <= 1 {
            return Ok(services.pop());
        }
        Err(self.ambiguity(
            format!("Multiple factories for objects of type {} available in {}:", element, self.display_name),
            &services,
        ))
    }

    fn get_all(&self, class: ClassKey, token: Option<&ServiceAccessToken>, visitor: &mut ServiceVisitor) -> RegistryResult<()> {
        for provider in &self.providers(class) {
            provider.get_all(class, token, visitor)?;
        }
        Ok(())
    }

    /// Stops the services in registration order. Each service stops the
    /// services depending on it first.
    fn stop(&self) -> RegistryResult<()> {
        let services = self.services.read().clone();
        let mut stoppable = CompositeStoppable::new();
        for service in &services {
            stoppable.stop_provider(service.as_ref());
        }
        stoppable.finish()
    }
}

/// A registered service as offered to lifecycle handlers.
struct RegistrationWrapper<'a> {
    service: Arc<SingletonService>,
    state: Arc<RegistryState>,
    display_name: &'a str,
}

impl LifecycleRegistration for RegistrationWrapper<'_> {
    fn declared_types(&self) -> Vec<ClassKey> {
        self.service.declared_classes().to_vec()
    }

    fn instance(&self) -> RegistryResult<Instance> {
        self.state.service_requested(self.display_name)?;
        self.service.prepared_instance()
    }
}

/// The registry itself, provided as the reserved `ServiceRegistry` service.
struct ThisAsService {
    this: Weak<ThisAsService>,
    registry: Weak<RegistryInner>,
    display_name: String,
    inspector: Arc<ClassInspector>,
}

impl ThisAsService {
    fn new(registry: Weak<RegistryInner>, display_name: String, inspector: Arc<ClassInspector>) -> Arc<Self> {
        Arc::new_cyclic(|this| ThisAsService { this: this.clone(), registry, display_name, inspector })
    }

    fn as_service(&self) -> Option<Arc<dyn Service>> {
        self.this.upgrade().map(|this| this as Arc<dyn Service>)
    }
}

impl Service for ThisAsService {
    fn get(&self) -> RegistryResult<Instance> {
        let registry = self.registry.upgrade().ok_or_else(|| {
            RegistryError::IllegalState(format!("{} has been discarded.", self.display_name()))
        })?;
        let registry: Arc<dyn ServiceRegistry> = registry;
        let details = self.inspector.details(ClassKey::of::<dyn ServiceRegistry>());
        Ok(Instance::new(details, RawValue::new(registry)))
    }

    fn display_name(&self) -> String {
        format!("ServiceRegistry {}", self.display_name)
    }

    fn required_by(&self, _dependent: &Arc<SingletonService>) {}
}

impl ServiceProvider for ThisAsService {
    fn get_service(&self, spec: &TypeSpec, _token: Option<&ServiceAccessToken>) -> RegistryResult<Option<Arc<dyn Service>>> {
        if *spec == TypeSpec::of::<dyn ServiceRegistry>() {
            return Ok(self.as_service());
        }
        Ok(None)
    }

    fn get_factory(&self, _element: ClassKey, _token: Option<&ServiceAccessToken>) -> RegistryResult<Option<Arc<dyn Service>>> {
        Ok(None)
    }

    fn get_all(&self, class: ClassKey, _token: Option<&ServiceAccessToken>, visitor: &mut ServiceVisitor) -> RegistryResult<()> {
        if class == ClassKey::of::<dyn ServiceRegistry>() {
            if let Some(service) = self.as_service() {
                visitor.visit(service);
            }
        }
        Ok(())
    }

    fn stop(&self) -> RegistryResult<()> {
        Ok(())
    }
}
