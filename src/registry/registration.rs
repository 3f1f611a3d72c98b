use std::fmt;
use std::sync::Arc;

use super::RegistryInner;
use crate::access::ServiceAccessToken;
use crate::class::ServiceType;
use crate::error::RegistryResult;
use crate::instance::{Instance, RawValue};
use crate::key::{ClassKey, TypeSpec};
use crate::method::ProviderBean;

/// Registration surface handed to configure methods and registration actions.
///
/// Services added through it are added to the registry it was created for,
/// under the same mutability rules as the registry's own `add` methods.
/// Constructor-injected services resolve their parameters with the token of
/// the provider or action that received this registration.
#[derive(Clone)]
pub struct ServiceRegistration {
    registry: Arc<RegistryInner>,
    token: ServiceAccessToken,
}

crate::concrete_service!(ServiceRegistration);

impl ServiceRegistration {
    pub(crate) fn new(registry: Arc<RegistryInner>, token: ServiceAccessToken) -> Self {
        ServiceRegistration { registry, token }
    }

    /// Adds a fixed instance as a service of type `S`.
    pub fn add_instance<S, C>(&self, instance: Arc<C>) -> RegistryResult<()>
    where
        S: ?Sized + ServiceType,
        C: ServiceType + Send + Sync,
    {
        let details = self.registry.class_inspector().details(ClassKey::of::<C>());
        self.registry.add_instance(TypeSpec::of::<S>(), Instance::new(details, RawValue::new(instance)))
    }

    /// Adds a service of type `C`, created by its constructor.
    pub fn add_type<C: ServiceType>(&self) -> RegistryResult<()> {
        self.add_type_as::<C, C>()
    }

    /// Adds a service of type `S` implemented by `C`, created by the
    /// constructor of `C`.
    pub fn add_type_as<S: ?Sized + ServiceType, C: ServiceType>(&self) -> RegistryResult<()> {
        self.registry.add_constructor(&self.token, vec![TypeSpec::of::<S>()], ClassKey::of::<C>())
    }

    /// Adds a service declared as both `S1` and `S2`, implemented by `C`.
    pub fn add_type_as2<S1, S2, C>(&self) -> RegistryResult<()>
    where
        S1: ?Sized + ServiceType,
        S2: ?Sized + ServiceType,
        C: ServiceType,
    {
        self.registry.add_constructor(
            &self.token,
            vec![TypeSpec::of::<S1>(), TypeSpec::of::<S2>()],
            ClassKey::of::<C>(),
        )
    }

    /// Adds a provider bean. The provider gets a token of its own.
    pub fn add_provider(&self, provider: impl Into<ProviderBean>) -> RegistryResult<()> {
        self.registry.add_provider(provider.into())
    }
}

impl fmt::Debug for ServiceRegistration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServiceRegistration")
            .field("registry", &self.registry.name())
            .field("token", &self.token)
            .finish()
    }
}
