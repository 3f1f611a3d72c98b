//! The registry facade.
//!
//! A [`DefaultServiceRegistry`] owns its services, delegates to its parents
//! for anything it cannot provide itself, and provides itself as the
//! `dyn ServiceRegistry` service. It is mutable until the first lookup and
//! stops the instances it realized when closed.

mod registration;
mod scoped;

use std::fmt;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::{Arc, Weak};

use ahash::AHashSet;

use crate::access::{create_token, private_scope, public_scope, ServiceAccessScope, ServiceAccessToken};
use crate::class::{ClassInspector, ServiceType};
use crate::config::RegistryConfig;
use crate::error::{RegistryError, RegistryResult};
use crate::instance::{Instance, RawValue};
use crate::key::{simple_name, ClassKey, TypeSpec};
use crate::method::{ProviderBean, ProviderDetails, ServiceMethod};
use crate::provider::{
    assert_valid_service_type, find, CompositeServiceProvider, OwnServices, ParentServices, ServiceProvider,
    ServiceVisitor, SingletonService,
};
use crate::traits::{ServiceRegistrationAction, ServiceRegistry};

pub use registration::ServiceRegistration;
pub use scoped::ScopedServiceRegistry;
pub(crate) use scoped::ScopeValidation;

const DEFAULT_NAME: &str = "DefaultServiceRegistry";

const INIT: u8 = 0;
const STARTED: u8 = 1;
const CLOSED: u8 = 2;

/// Lifecycle of a registry: mutable until the first lookup, then started,
/// then closed for good.
#[derive(Debug, Default)]
pub(crate) struct RegistryState {
    state: AtomicU8,
}

impl RegistryState {
    pub(crate) fn assert_mutable(&self, display_name: &str) -> RegistryResult<()> {
        if self.state.load(Ordering::Acquire) != INIT {
            return Err(RegistryError::IllegalState(format!(
                "Cannot add services to service registry {} as it is no longer mutable",
                display_name
            )));
        }
        Ok(())
    }

    /// Marks the registry as started. Fails once closed.
    pub(crate) fn service_requested(&self, display_name: &str) -> RegistryResult<()> {
        if self.state.load(Ordering::Acquire) == CLOSED {
            return Err(RegistryError::IllegalState(format!("{} has been closed.", display_name)));
        }
        let _ = self.state.compare_exchange(INIT, STARTED, Ordering::AcqRel, Ordering::Acquire);
        Ok(())
    }

    /// Moves to closed. Only the first caller gets `true`.
    pub(crate) fn close(&self) -> bool {
        self.state.swap(CLOSED, Ordering::AcqRel) != CLOSED
    }

    pub(crate) fn is_closed(&self) -> bool {
        self.state.load(Ordering::Acquire) == CLOSED
    }
}

/// Shared state of a registry. Services hold it weakly; child registries and
/// registrations hold it strongly.
pub(crate) struct RegistryInner {
    this: Weak<RegistryInner>,
    display_name: String,
    inspector: Arc<ClassInspector>,
    state: Arc<RegistryState>,
    own_services: Arc<OwnServices>,
    parent_services: Option<Arc<dyn ServiceProvider>>,
    all_services: Arc<dyn ServiceProvider>,
    scope_validation: Option<ScopeValidation>,
}

impl RegistryInner {
    fn new(
        display_name: String,
        inspector: Arc<ClassInspector>,
        parents: &[DefaultServiceRegistry],
        scope_validation: Option<ScopeValidation>,
    ) -> Arc<Self> {
        Arc::new_cyclic(|this: &Weak<RegistryInner>| {
            let state = Arc::new(RegistryState::default());
            let own_services = Arc::new(OwnServices::new(
                this.clone(),
                display_name.clone(),
                Arc::clone(&inspector),
                Arc::clone(&state),
            ));

            let parent_services: Option<Arc<dyn ServiceProvider>> = match parents {
                [] => None,
                [parent] => Some(Arc::new(ParentServices::new(Arc::clone(&parent.inner)))),
                many => {
                    let wrapped = many
                        .iter()
                        .map(|parent| Arc::new(ParentServices::new(Arc::clone(&parent.inner))) as Arc<dyn ServiceProvider>)
                        .collect();
                    Some(Arc::new(CompositeServiceProvider::new(wrapped)))
                }
            };
            let own: Arc<dyn ServiceProvider> = own_services.clone();
            let all_services: Arc<dyn ServiceProvider> = match &parent_services {
                None => own,
                Some(parents) => Arc::new(CompositeServiceProvider::new(vec![own, Arc::clone(parents)])),
            };

            RegistryInner {
                this: this.clone(),
                display_name,
                inspector,
                state,
                own_services,
                parent_services,
                all_services,
                scope_validation,
            }
        })
    }

    pub(crate) fn name(&self) -> &str {
        &self.display_name
    }

    pub(crate) fn class_inspector(&self) -> &Arc<ClassInspector> {
        &self.inspector
    }

    pub(crate) fn parent_services(&self) -> Option<&Arc<dyn ServiceProvider>> {
        self.parent_services.as_ref()
    }

    pub(crate) fn all_services(&self) -> &Arc<dyn ServiceProvider> {
        &self.all_services
    }

    pub(crate) fn own_services(&self) -> &Arc<OwnServices> {
        &self.own_services
    }

    pub(crate) fn assert_mutable(&self) -> RegistryResult<()> {
        self.state.assert_mutable(&self.display_name)
    }

    fn arc(&self) -> RegistryResult<Arc<RegistryInner>> {
        self.this
            .upgrade()
            .ok_or_else(|| RegistryError::IllegalState(format!("{} has been discarded.", self.display_name)))
    }

    pub(crate) fn add_instance(&self, service_type: TypeSpec, instance: Instance) -> RegistryResult<()> {
        self.assert_mutable()?;
        let service = SingletonService::fixed(&self.arc()?, public_scope(), service_type, instance)?;
        self.own_services.add(service)
    }

    pub(crate) fn add_constructor(
        &self,
        token: &ServiceAccessToken,
        types: Vec<TypeSpec>,
        implementation: ClassKey,
    ) -> RegistryResult<()> {
        self.assert_mutable()?;
        let service = SingletonService::constructor(
            &self.arc()?,
            public_scope(),
            token.clone(),
            types.into_iter().collect(),
            implementation,
        )?;
        self.own_services.add(service)
    }

    /// Adds a provider under a fresh token named after it.
    pub(crate) fn add_provider(&self, bean: ProviderBean) -> RegistryResult<()> {
        let token = create_token(bean.simple_name());
        self.add_provider_with(bean, token)
    }

    fn add_provider_with(&self, bean: ProviderBean, token: ServiceAccessToken) -> RegistryResult<()> {
        self.assert_mutable()?;
        let details = bean.details(&self.inspector)?;
        if let Some(validation) = &self.scope_validation {
            validation.validate(&details, &self.display_name)?;
        }
        self.find_provider_methods(&bean, &details, &token)
    }

    fn find_provider_methods(
        &self,
        bean: &ProviderBean,
        details: &ProviderDetails,
        token: &ServiceAccessToken,
    ) -> RegistryResult<()> {
        let owner = self.arc()?;
        let methods = details.methods();
        for method in &methods.decorators {
            if self.parent_services.is_none() {
                return Err(RegistryError::lookup(format!(
                    "Cannot use decorator method {}.{}() when no parent registry is provided.",
                    method.owner(),
                    method.name()
                )));
            }
            self.add_method_service(&owner, bean, method, token)?;
        }
        for method in &methods.factories {
            self.add_method_service(&owner, bean, method, token)?;
        }
        for method in &methods.configurers {
            self.apply_configure(bean, method, token)?;
        }
        tracing::debug!(registry = %self.display_name, provider = %details.name(), "provider added");
        Ok(())
    }

    fn add_method_service(
        &self,
        owner: &Arc<RegistryInner>,
        bean: &ProviderBean,
        method: &Arc<ServiceMethod>,
        token: &ServiceAccessToken,
    ) -> RegistryResult<()> {
        let scope: ServiceAccessScope =
            if method.is_private() { private_scope(token.clone()) } else { public_scope() };
        let service = SingletonService::factory_method(
            owner,
            scope,
            token.clone(),
            Arc::clone(bean.target()),
            Arc::clone(method),
        )?;
        self.own_services.add(service)
    }

    /// Resolves the parameters of a configure method and runs it.
    fn apply_configure(&self, bean: &ProviderBean, method: &ServiceMethod, token: &ServiceAccessToken) -> RegistryResult<()> {
        let registration_type = TypeSpec::of::<ServiceRegistration>();
        let mut args = Vec::with_capacity(method.parameter_types().len());
        for param in method.parameter_types() {
            if *param == registration_type {
                let registration = Arc::new(ServiceRegistration::new(self.arc()?, token.clone()));
                let details = self.inspector.details(ClassKey::of::<ServiceRegistration>());
                args.push(Instance::new(details, RawValue::new(registration)));
                continue;
            }
            let service = find(param, Some(token), self.all_services.as_ref(), &self.inspector)?.ok_or_else(|| {
                RegistryError::lookup(format!(
                    "Cannot configure services using {}.{}() as required service of type {} is not available.",
                    method.owner(),
                    method.name(),
                    param
                ))
            })?;
            args.push(service.get()?);
        }
        method.invoke_configure(bean.target().as_ref(), &args, &self.inspector).map_err(|error| {
            RegistryError::lookup_caused_by(
                format!("Could not configure services using {}.{}().", method.owner(), method.name()),
                error,
            )
        })
    }

    fn close(&self) -> RegistryResult<()> {
        if !self.state.close() {
            return Ok(());
        }
        tracing::info!(registry = %self.display_name, "closing service registry");
        let result = self.all_services.stop();
        if let Err(error) = &result {
            tracing::warn!(registry = %self.display_name, error = %error, "failures while stopping services");
        }
        result
    }
}

impl ServiceRegistry for RegistryInner {
    fn find_any(&self, spec: &TypeSpec) -> RegistryResult<Option<Instance>> {
        assert_valid_service_type(&self.inspector, spec.erased())?;
        self.state.service_requested(&self.display_name)?;
        match find(spec, None, self.all_services.as_ref(), &self.inspector)? {
            Some(service) => service.get().map(Some),
            None => Ok(None),
        }
    }

    fn get_all_any(&self, class: ClassKey) -> RegistryResult<Vec<Instance>> {
        assert_valid_service_type(&self.inspector, class)?;
        self.state.service_requested(&self.display_name)?;
        let mut visitor = ServiceVisitor::new();
        self.all_services.get_all(class, None, &mut visitor)?;
        let mut seen = AHashSet::new();
        let mut instances = Vec::new();
        for service in visitor.into_services() {
            let instance = service.get()?;
            if seen.insert(instance.addr()) {
                instances.push(instance);
            }
        }
        Ok(instances)
    }

    fn get_factory_any(&self, class: ClassKey) -> RegistryResult<Instance> {
        assert_valid_service_type(&self.inspector, class)?;
        self.state.service_requested(&self.display_name)?;
        let factory = self.all_services.get_factory(class, None)?.ok_or_else(|| {
            RegistryError::unknown(
                class.to_string(),
                format!("No factory for objects of type {} available in {}.", class, self.display_name),
            )
        })?;
        factory.get()
    }

    fn inspector(&self) -> &Arc<ClassInspector> {
        &self.inspector
    }

    fn display_name(&self) -> String {
        self.display_name.clone()
    }
}

/// A hierarchical service registry.
///
/// Services are registered as fixed instances, constructor-injected classes,
/// or through the methods of provider beans. Lookups search the registry's
/// own services first, then its parents in declaration order.
///
/// ```rust
/// use std::sync::Arc;
/// use service_registry::{DefaultServiceRegistry, ServiceRegistryExt};
///
/// struct Clock;
/// service_registry::concrete_service!(Clock);
///
/// let parent = DefaultServiceRegistry::named("global");
/// parent.add(Arc::new(Clock)).unwrap();
///
/// let child = DefaultServiceRegistry::with_parents("build", &[parent.clone()]);
/// assert!(child.find::<Clock>().unwrap().is_some());
/// child.close().unwrap();
/// assert!(!parent.is_closed());
/// ```
#[derive(Clone)]
pub struct DefaultServiceRegistry {
    inner: Arc<RegistryInner>,
}

impl DefaultServiceRegistry {
    /// A registry without parents, named `DefaultServiceRegistry`.
    pub fn new() -> Self {
        Self::named(DEFAULT_NAME)
    }

    pub fn named(display_name: impl Into<String>) -> Self {
        Self::with_parents(display_name, &[])
    }

    /// A registry delegating to `parents`, in order. The class inspector of
    /// the first parent is shared.
    pub fn with_parents(display_name: impl Into<String>, parents: &[DefaultServiceRegistry]) -> Self {
        let inspector = Self::inherited_inspector(parents);
        DefaultServiceRegistry { inner: RegistryInner::new(display_name.into(), inspector, parents, None) }
    }

    /// A registry without parents with each of `providers` added.
    pub fn create<I>(providers: I) -> RegistryResult<Self>
    where
        I: IntoIterator,
        I::Item: Into<ProviderBean>,
    {
        let registry = Self::new();
        for provider in providers {
            registry.add_provider(provider)?;
        }
        Ok(registry)
    }

    pub fn builder() -> RegistryBuilder {
        RegistryBuilder::default()
    }

    fn inherited_inspector(parents: &[DefaultServiceRegistry]) -> Arc<ClassInspector> {
        parents
            .first()
            .map(|parent| Arc::clone(parent.inner.class_inspector()))
            .unwrap_or_default()
    }

    /// Registers a fixed instance under its own class.
    pub fn add<C: ServiceType + Send + Sync>(&self, instance: Arc<C>) -> RegistryResult<&Self> {
        self.add_as::<C, C>(instance)
    }

    /// Registers a fixed instance under the service type `S`.
    pub fn add_as<S, C>(&self, instance: Arc<C>) -> RegistryResult<&Self>
    where
        S: ?Sized + ServiceType,
        C: ServiceType + Send + Sync,
    {
        let details = self.inner.class_inspector().details(ClassKey::of::<C>());
        self.inner.add_instance(TypeSpec::of::<S>(), Instance::new(details, RawValue::new(instance)))?;
        Ok(self)
    }

    /// Adds the services declared by the methods of a provider bean, and runs
    /// its configure methods.
    pub fn add_provider(&self, provider: impl Into<ProviderBean>) -> RegistryResult<&Self> {
        self.inner.add_provider(provider.into())?;
        Ok(self)
    }

    /// Runs a registration action against this registry.
    pub fn register<A: ServiceRegistrationAction + ?Sized>(&self, action: &A) -> RegistryResult<&Self> {
        self.inner.assert_mutable()?;
        let token = create_token(simple_name(std::any::type_name::<A>()));
        action.register_services(&ServiceRegistration::new(Arc::clone(&self.inner), token))?;
        Ok(self)
    }

    /// Stops every instance realized by this registry, dependents first.
    /// Parents are left untouched. Only the first call has an effect.
    pub fn close(&self) -> RegistryResult<()> {
        self.inner.close()
    }

    pub fn is_closed(&self) -> bool {
        self.inner.state.is_closed()
    }

    /// This registry as the `dyn ServiceRegistry` it provides to its services.
    pub fn as_service_registry(&self) -> Arc<dyn ServiceRegistry> {
        Arc::clone(&self.inner) as Arc<dyn ServiceRegistry>
    }

    /// Whether both handles refer to the same registry.
    pub fn ptr_eq(&self, other: &DefaultServiceRegistry) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

impl Default for DefaultServiceRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl ServiceRegistry for DefaultServiceRegistry {
    fn find_any(&self, spec: &TypeSpec) -> RegistryResult<Option<Instance>> {
        self.inner.find_any(spec)
    }

    fn get_all_any(&self, class: ClassKey) -> RegistryResult<Vec<Instance>> {
        self.inner.get_all_any(class)
    }

    fn get_factory_any(&self, class: ClassKey) -> RegistryResult<Instance> {
        self.inner.get_factory_any(class)
    }

    fn inspector(&self) -> &Arc<ClassInspector> {
        self.inner.class_inspector()
    }

    fn display_name(&self) -> String {
        self.inner.display_name.clone()
    }
}

impl fmt::Display for DefaultServiceRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.inner.display_name)
    }
}

impl fmt::Debug for DefaultServiceRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DefaultServiceRegistry")
            .field("name", &self.inner.display_name)
            .field("parents", &self.inner.parent_services.is_some())
            .field("closed", &self.is_closed())
            .finish()
    }
}

/// Builder for [`DefaultServiceRegistry`].
///
/// Providers given to the builder are added under one token shared by the
/// registry itself, so their private services see each other.
#[derive(Default)]
pub struct RegistryBuilder {
    display_name: Option<String>,
    parents: Vec<DefaultServiceRegistry>,
    inspector: Option<Arc<ClassInspector>>,
    providers: Vec<ProviderBean>,
    scope_validation: Option<ScopeValidation>,
}

impl RegistryBuilder {
    pub fn name(mut self, display_name: impl Into<String>) -> Self {
        self.display_name = Some(display_name.into());
        self
    }

    pub fn parent(mut self, parent: &DefaultServiceRegistry) -> Self {
        self.parents.push(parent.clone());
        self
    }

    pub fn parents<'a>(mut self, parents: impl IntoIterator<Item = &'a DefaultServiceRegistry>) -> Self {
        self.parents.extend(parents.into_iter().cloned());
        self
    }

    /// Uses `inspector` instead of the first parent's.
    pub fn inspector(mut self, inspector: Arc<ClassInspector>) -> Self {
        self.inspector = Some(inspector);
        self
    }

    pub fn provider(mut self, provider: impl Into<ProviderBean>) -> Self {
        self.providers.push(provider.into());
        self
    }

    /// Applies the display name of `config`, when set.
    pub fn config(mut self, config: &RegistryConfig) -> Self {
        if let Some(name) = &config.display_name {
            self.display_name = Some(name.clone());
        }
        self
    }

    pub(crate) fn scope_validation(mut self, validation: ScopeValidation) -> Self {
        self.scope_validation = Some(validation);
        self
    }

    pub fn build(mut self) -> RegistryResult<DefaultServiceRegistry> {
        let providers = std::mem::take(&mut self.providers);
        let registry = self.build_empty();
        if !providers.is_empty() {
            let token = create_token(registry.inner.display_name.clone());
            for provider in providers {
                registry.inner.add_provider_with(provider, token.clone())?;
            }
        }
        Ok(registry)
    }

    /// Builds the registry, ignoring the providers.
    pub(crate) fn build_empty(self) -> DefaultServiceRegistry {
        let display_name = self.display_name.unwrap_or_else(|| DEFAULT_NAME.to_string());
        let inspector = self.inspector.unwrap_or_else(|| DefaultServiceRegistry::inherited_inspector(&self.parents));
        let inner = RegistryInner::new(display_name, inspector, &self.parents, self.scope_validation);
        DefaultServiceRegistry { inner }
    }
}

impl fmt::Debug for RegistryBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RegistryBuilder")
            .field("display_name", &self.display_name)
            .field("parents", &self.parents.len())
            .field("providers", &self.providers)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn state_moves_forward_only() {
        let state = RegistryState::default();
        assert!(state.assert_mutable("r").is_ok());
        state.service_requested("r").unwrap();
        assert_eq!(
            state.assert_mutable("r").unwrap_err().to_string(),
            "Cannot add services to service registry r as it is no longer mutable"
        );
        assert!(state.close());
        assert!(!state.close());
        assert!(state.is_closed());
        assert_eq!(state.service_requested("r").unwrap_err().to_string(), "r has been closed.");
    }

    #[test]
    fn registry_provides_itself() {
        let registry = DefaultServiceRegistry::named("self");
        let found = registry.get_any(&TypeSpec::of::<dyn ServiceRegistry>()).unwrap();
        let itself = found.cast::<dyn ServiceRegistry>().unwrap();
        assert_eq!(itself.display_name(), "self");
        let address = |registry: &Arc<dyn ServiceRegistry>| Arc::as_ptr(registry) as *const () as usize;
        assert_eq!(address(&itself), address(&registry.as_service_registry()));
    }

    #[test]
    fn display_name_defaults() {
        assert_eq!(DefaultServiceRegistry::new().to_string(), "DefaultServiceRegistry");
        let built = DefaultServiceRegistry::builder().build().unwrap();
        assert_eq!(built.to_string(), "DefaultServiceRegistry");
        let named = DefaultServiceRegistry::builder().name("custom").build().unwrap();
        assert_eq!(named.to_string(), "custom");
    }
}
