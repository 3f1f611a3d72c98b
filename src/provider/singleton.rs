//! Lazily realized single-instance services.

use std::any::Any;
use std::cell::RefCell;
use std::sync::atomic::{AtomicBool, AtomicU8, AtomicUsize, Ordering};
use std::sync::{Arc, Weak};

use once_cell::sync::OnceCell;
use parking_lot::{Mutex, ReentrantMutex, RwLock};
use smallvec::SmallVec;

use super::{find, is_satisfied_by, service_id, Service, ServiceProvider, ServiceVisitor};
use crate::access::{ServiceAccessScope, ServiceAccessToken};
use crate::class::{ClassDetails, ClassInspector, ClassKind, Constructor};
use crate::error::{RegistryError, RegistryResult};
use crate::instance::Instance;
use crate::internal::CompositeStoppable;
use crate::key::{format_types, ClassKey, TypeSpec};
use crate::method::ServiceMethod;
use crate::registry::RegistryInner;

const UNBOUND: u8 = 0;
const BINDING: u8 = 1;
const BOUND: u8 = 2;

pub(crate) type ServiceTypes = SmallVec<[TypeSpec; 2]>;

/// What a service instance is created from. Dropped after the first
/// successful creation.
#[derive(Clone)]
enum ServiceSource {
    Method {
        target: Arc<dyn Any + Send + Sync>,
        method: Arc<ServiceMethod>,
    },
    Constructor {
        class: Arc<ClassDetails>,
        constructor: Constructor,
    },
}

impl ServiceSource {
    fn parameter_types(&self) -> Vec<TypeSpec> {
        match self {
            ServiceSource::Method { method, .. } => method.parameter_types().to_vec(),
            ServiceSource::Constructor { constructor, .. } => constructor.params.clone(),
        }
    }

    fn factory_display_name(&self) -> String {
        match self {
            ServiceSource::Method { method, .. } => format!("method {}.{}()", method.owner(), method.name()),
            ServiceSource::Constructor { class, .. } => format!("{} constructor", class.key()),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SourceKind {
    Fixed,
    Method,
    Constructor,
}

#[derive(Default)]
struct Retained {
    source: Option<ServiceSource>,
    params: Option<Vec<Arc<dyn Service>>>,
}

/// A service with exactly one instance, created on first access.
///
/// Binding resolves the parameter services once; creation invokes the factory
/// method or constructor with their instances. Both run under a per-service
/// reentrant monitor, so a service reached again while it is still binding is
/// a dependency cycle.
pub(crate) struct SingletonService {
    this: Weak<SingletonService>,
    owner: Weak<RegistryInner>,
    inspector: Arc<ClassInspector>,
    scope: ServiceAccessScope,
    token: Option<ServiceAccessToken>,
    service_types: ServiceTypes,
    service_classes: SmallVec<[ClassKey; 2]>,
    kind: SourceKind,
    detailed_name: String,
    retains_source: AtomicBool,
    bind_state: AtomicU8,
    monitor: ReentrantMutex<RefCell<Retained>>,
    instance: RwLock<Option<Instance>>,
    dependents: Mutex<Vec<Weak<SingletonService>>>,
    decorates: AtomicUsize,
    factory_element: OnceCell<Option<ClassKey>>,
}

fn validate_implementation(inspector: &ClassInspector, types: &[TypeSpec], implementation: ClassKey) -> RegistryResult<()> {
    for service_type in types {
        let class = service_type.erased();
        if !inspector.is_assignable(class, implementation) {
            return Err(RegistryError::validation(format!(
                "Cannot register implementation '{}' for service '{}', because it does not implement it",
                implementation, class
            )));
        }
    }
    Ok(())
}

impl SingletonService {
    fn build(
        owner: &Arc<RegistryInner>,
        scope: ServiceAccessScope,
        token: Option<ServiceAccessToken>,
        service_types: ServiceTypes,
        kind: SourceKind,
        detailed_name: String,
        source: Option<ServiceSource>,
    ) -> RegistryResult<Arc<Self>> {
        if service_types.is_empty() {
            return Err(RegistryError::IllegalArgument("Expected at least one declared service type".into()));
        }
        let service_classes = service_types.iter().map(TypeSpec::erased).collect();
        let retains_source = source.is_some();
        Ok(Arc::new_cyclic(|this| SingletonService {
            this: this.clone(),
            owner: Arc::downgrade(owner),
            inspector: Arc::clone(owner.class_inspector()),
            scope,
            token,
            service_types,
            service_classes,
            kind,
            detailed_name,
            retains_source: AtomicBool::new(retains_source),
            bind_state: AtomicU8::new(UNBOUND),
            monitor: ReentrantMutex::new(RefCell::new(Retained { source, params: None })),
            instance: RwLock::new(None),
            dependents: Mutex::new(Vec::new()),
            decorates: AtomicUsize::new(0),
            factory_element: OnceCell::new(),
        }))
    }

    /// A service backed by a pre-built instance.
    pub(crate) fn fixed(
        owner: &Arc<RegistryInner>,
        scope: ServiceAccessScope,
        service_type: TypeSpec,
        instance: Instance,
    ) -> RegistryResult<Arc<Self>> {
        let types: ServiceTypes = smallvec::smallvec![service_type];
        validate_implementation(owner.class_inspector(), &types, instance.class())?;
        let name = format!("{} with implementation {}", format_types("Service", &types), instance.class());
        let service = Self::build(owner, scope, None, types, SourceKind::Fixed, name, None)?;
        service.set_instance(instance)?;
        Ok(service)
    }

    /// A service created by a factory or decorator method of a provider.
    pub(crate) fn factory_method(
        owner: &Arc<RegistryInner>,
        scope: ServiceAccessScope,
        token: ServiceAccessToken,
        target: Arc<dyn Any + Send + Sync>,
        method: Arc<ServiceMethod>,
    ) -> RegistryResult<Arc<Self>> {
        let types: ServiceTypes = method.declared_types().into_iter().collect();
        if let Some(returns) = method.service_type() {
            validate_implementation(owner.class_inspector(), &types, returns.erased())?;
        }
        let name = format!("{} via {}.{}()", format_types("Service", &types), method.owner(), method.name());
        let source = ServiceSource::Method { target, method };
        Self::build(owner, scope, Some(token), types, SourceKind::Method, name, Some(source))
    }

    /// A service created by the constructor of `implementation`.
    pub(crate) fn constructor(
        owner: &Arc<RegistryInner>,
        scope: ServiceAccessScope,
        token: ServiceAccessToken,
        types: ServiceTypes,
        implementation: ClassKey,
    ) -> RegistryResult<Arc<Self>> {
        let class = owner.class_inspector().details(implementation);
        if class.kind() == ClassKind::Interface {
            return Err(RegistryError::validation("Cannot register an interface for construction."));
        }
        validate_implementation(owner.class_inspector(), &types, implementation)?;
        let constructor = class.constructor().cloned().ok_or_else(|| {
            RegistryError::validation(format!(
                "Class {} has no constructor that can be used for injection.",
                implementation
            ))
        })?;
        let name = format!("{} via {} constructor", format_types("Service", &types), implementation);
        let source = ServiceSource::Constructor { class, constructor };
        Self::build(owner, scope, Some(token), types, SourceKind::Constructor, name, Some(source))
    }

    pub(crate) fn service_types(&self) -> &[TypeSpec] {
        &self.service_types
    }

    /// The declared types, erased to classes.
    pub(crate) fn declared_classes(&self) -> &[ClassKey] {
        &self.service_classes
    }

    fn arc(&self) -> RegistryResult<Arc<SingletonService>> {
        self.this
            .upgrade()
            .ok_or_else(|| RegistryError::IllegalState(format!("{} has been discarded.", self.display_name())))
    }

    fn owner(&self) -> RegistryResult<Arc<RegistryInner>> {
        self.owner.upgrade().ok_or_else(|| {
            RegistryError::IllegalState(format!("The registry owning {} has been discarded.", self.display_name()))
        })
    }

    /// Binds the service if needed.
    fn prepare(&self) -> RegistryResult<Arc<SingletonService>> {
        let this = self.arc()?;
        if self.bind_state.load(Ordering::Acquire) == BOUND {
            return Ok(this);
        }
        let guard = self.monitor.lock();
        match self.bind_state.load(Ordering::Acquire) {
            BINDING => {
                return Err(RegistryError::validation(format!(
                    "Cycle in dependencies of {} detected",
                    self.display_name()
                )));
            }
            UNBOUND => {
                self.bind_state.store(BINDING, Ordering::Release);
                match self.bind(&guard, &this) {
                    Ok(()) => self.bind_state.store(BOUND, Ordering::Release),
                    Err(error) => {
                        self.bind_state.store(UNBOUND, Ordering::Release);
                        return Err(error);
                    }
                }
            }
            _ => {}
        }
        Ok(this)
    }

    /// Binds and realizes the service.
    pub(crate) fn prepared_instance(&self) -> RegistryResult<Instance> {
        self.prepare()?.get_instance()
    }

    /// Resolves the parameter services. A parameter of one of the declared
    /// types is the decorated service and comes from the parents only.
    fn bind(&self, retained: &RefCell<Retained>, this: &Arc<SingletonService>) -> RegistryResult<()> {
        let (params, factory) = {
            let retained = retained.borrow();
            match &retained.source {
                Some(source) => (source.parameter_types(), source.factory_display_name()),
                None => return Ok(()),
            }
        };
        if params.is_empty() {
            retained.borrow_mut().params = Some(Vec::new());
            return Ok(());
        }

        let owner = self.owner()?;
        let token = self.token.as_ref();
        let mut services = Vec::with_capacity(params.len());
        for (index, param) in params.iter().enumerate() {
            let position = index + 1;
            if self.service_types.contains(param) {
                let found = match owner.parent_services() {
                    Some(parents) => find(param, token, parents.as_ref(), &self.inspector)?,
                    None => None,
                };
                let found = found.ok_or_else(|| {
                    RegistryError::creation(format!(
                        "Cannot create service of {} using {} as required service of type {} for parameter #{} is not available in parent registries.",
                        format_types("type", &self.service_types),
                        factory,
                        param,
                        position
                    ))
                })?;
                self.decorates.store(service_id(&found), Ordering::Release);
                services.push(found);
            } else {
                let found = find(param, token, owner.all_services().as_ref(), &self.inspector).map_err(|error| {
                    if error.is_lookup_failure() {
                        RegistryError::creation_caused_by(
                            format!(
                                "Cannot create service of {} using {} as there is a problem with parameter #{} of type {}.",
                                format_types("type", &self.service_types),
                                factory,
                                position,
                                param
                            ),
                            error,
                        )
                    } else {
                        error
                    }
                })?;
                let found = found.ok_or_else(|| {
                    RegistryError::creation(format!(
                        "Cannot create service of {} using {} as required service of type {} for parameter #{} is not available.",
                        format_types("type", &self.service_types),
                        factory,
                        param,
                        position
                    ))
                })?;
                found.required_by(this);
                services.push(found);
            }
        }
        tracing::trace!(service = %self.display_name(), parameters = services.len(), "service bound");
        retained.borrow_mut().params = Some(services);
        Ok(())
    }

    fn get_instance(&self) -> RegistryResult<Instance> {
        if let Some(instance) = self.instance.read().as_ref() {
            return Ok(instance.clone());
        }
        let guard = self.monitor.lock();
        if let Some(instance) = self.instance.read().as_ref() {
            return Ok(instance.clone());
        }
        let instance = self.create_instance(&guard)?;
        self.set_instance(instance.clone())?;
        Ok(instance)
    }

    fn set_instance(&self, instance: Instance) -> RegistryResult<()> {
        *self.instance.write() = Some(instance.clone());
        tracing::debug!(service = %self.display_name(), class = %instance.class(), "service instance realized");
        self.owner()?.own_services().instance_realized(self, &instance)
    }

    fn discarded(&self) -> RegistryError {
        let types = format_types("service", &self.service_types);
        RegistryError::IllegalState(match self.kind {
            SourceKind::Method => format!("Method is no longer available for the instance of {}", types),
            SourceKind::Constructor => format!("Constructor is no longer available for the instance of {}", types),
            SourceKind::Fixed => format!("The instance of {} is fixed and cannot be created again", types),
        })
    }

    fn create_instance(&self, retained: &RefCell<Retained>) -> RegistryResult<Instance> {
        self.prepare()?;
        let (source, params) = {
            let retained = retained.borrow();
            (retained.source.clone(), retained.params.clone())
        };
        let source = source.ok_or_else(|| self.discarded())?;
        let args = params
            .unwrap_or_default()
            .iter()
            .map(|param| param.get())
            .collect::<RegistryResult<Vec<_>>>()?;

        let instance = match &source {
            ServiceSource::Method { target, method } => {
                let produced = method.invoke(target.as_ref(), &args, &self.inspector).map_err(|error| {
                    RegistryError::creation_caused_by(
                        format!(
                            "Could not create service of {} using {}.{}().",
                            format_types("type", &self.service_types),
                            method.owner(),
                            method.name()
                        ),
                        error,
                    )
                })?;
                let raw = produced.ok_or_else(|| {
                    RegistryError::creation(format!(
                        "Could not create service of {} using {}.{}() as this method returned null.",
                        format_types("type", &self.service_types),
                        method.owner(),
                        method.name()
                    ))
                })?;
                let class = method.service_type().map(TypeSpec::erased).unwrap_or(self.service_classes[0]);
                Instance::new(self.inspector.details(class), raw)
            }
            ServiceSource::Constructor { class, constructor } => {
                let raw = (constructor.invoke)(&args, &self.inspector).map_err(|error| {
                    RegistryError::creation_caused_by(
                        format!("Could not create service of {}.", format_types("type", &self.service_types)),
                        error,
                    )
                })?;
                Instance::new(Arc::clone(class), raw)
            }
        };

        {
            let mut retained = retained.borrow_mut();
            retained.source = None;
            retained.params = None;
        }
        self.retains_source.store(false, Ordering::Release);
        Ok(instance)
    }

    fn is_factory_for(&self, element: ClassKey) -> bool {
        let found = *self.factory_element.get_or_init(|| {
            self.service_types.iter().find_map(|service_type| match service_type {
                TypeSpec::Factory(inner) => inner.as_raw(),
                other => {
                    let class = other.as_raw()?;
                    self.inspector.details(class).factory(&self.inspector).map(|view| view.element)
                }
            })
        });
        found.map_or(false, |found| self.inspector.is_assignable(element, found))
    }
}

impl Service for SingletonService {
    fn get(&self) -> RegistryResult<Instance> {
        self.get_instance()
    }

    fn display_name(&self) -> String {
        if self.kind == SourceKind::Fixed || self.retains_source.load(Ordering::Acquire) {
            self.detailed_name.clone()
        } else {
            format_types("Service", &self.service_types)
        }
    }

    fn required_by(&self, dependent: &Arc<SingletonService>) {
        if Weak::ptr_eq(&self.owner, &dependent.owner) {
            self.dependents.lock().push(Arc::downgrade(dependent));
        }
    }
}

impl ServiceProvider for SingletonService {
    fn get_service(&self, spec: &TypeSpec, token: Option<&ServiceAccessToken>) -> RegistryResult<Option<Arc<dyn Service>>> {
        if !self.scope.contains(token) {
            return Ok(None);
        }
        if !self.service_types.iter().any(|actual| is_satisfied_by(spec, actual, &self.inspector)) {
            return Ok(None);
        }
        let service: Arc<dyn Service> = self.prepare()?;
        Ok(Some(service))
    }

    fn get_factory(&self, element: ClassKey, token: Option<&ServiceAccessToken>) -> RegistryResult<Option<Arc<dyn Service>>> {
        if !self.scope.contains(token) || !self.is_factory_for(element) {
            return Ok(None);
        }
        let service: Arc<dyn Service> = self.prepare()?;
        Ok(Some(service))
    }

    /// A bound decorator hides the service it decorates even from lookups
    /// that cannot see the decorator itself.
    fn get_all(&self, class: ClassKey, token: Option<&ServiceAccessToken>, visitor: &mut ServiceVisitor) -> RegistryResult<()> {
        let decorated = self.decorates.load(Ordering::Acquire);
        if decorated != 0 {
            visitor.exclude(decorated);
        }
        if !self.scope.contains(token) {
            return Ok(());
        }
        if self.service_classes.iter().any(|declared| self.inspector.is_assignable(class, *declared)) {
            visitor.visit(self.prepare()?);
            let decorated = self.decorates.load(Ordering::Acquire);
            if decorated != 0 {
                visitor.exclude(decorated);
            }
        }
        Ok(())
    }

    /// Stops the services that depend on this one, then this instance.
    fn stop(&self) -> RegistryResult<()> {
        let _guard = self.monitor.lock();
        let mut stoppable = CompositeStoppable::new();
        let instance = self.instance.read().clone();
        if let Some(instance) = &instance {
            let dependents: Vec<_> = self.dependents.lock().iter().filter_map(Weak::upgrade).collect();
            for dependent in &dependents {
                stoppable.stop_provider(&**dependent);
            }
            stoppable.stop_instance(instance);
        }
        self.dependents.lock().clear();
        *self.instance.write() = None;
        stoppable.finish()
    }
}
