use std::fmt;
use std::ops::Deref;

use super::{DefaultServiceRegistry, RegistryBuilder};
use crate::class::ServiceType;
use crate::config::{RegistryConfig, ScopeValidationConfig};
use crate::error::{RegistryError, RegistryResult};
use crate::key::ClassKey;
use crate::method::ProviderDetails;

/// Scope check applied to every provider added to a scoped registry.
#[derive(Debug, Clone)]
pub(crate) struct ScopeValidation {
    scope: ClassKey,
    config: ScopeValidationConfig,
}

impl ScopeValidation {
    pub(crate) fn new(scope: ClassKey, config: ScopeValidationConfig) -> Self {
        ScopeValidation { scope, config }
    }

    pub(crate) fn validate(&self, provider: &ProviderDetails, registry: &str) -> RegistryResult<()> {
        if !self.config.strict {
            return Ok(());
        }
        if provider.anonymous && self.config.allow_anonymous {
            return Ok(());
        }
        if self.config.suppressed_types.iter().any(|name| name == provider.type_name) {
            tracing::trace!(provider = provider.type_name, "scope validation suppressed");
            return Ok(());
        }

        match &provider.scopes {
            None => Err(RegistryError::IllegalArgument(format!(
                "The service provider '{}' is not annotated with a service scope. Annotate it with the '{}' scope to register it in the '{}' registry.",
                provider.name, self.scope, registry
            ))),
            Some(scopes) if scopes.contains(&self.scope) => Ok(()),
            Some(scopes) => {
                let declared = scopes.iter().map(ToString::to_string).collect::<Vec<_>>().join(", ");
                Err(RegistryError::IllegalArgument(format!(
                    "The service provider '{}' declares service scopes [{}] but is registered in the '{}' registry with scope '{}'. Add '{}' to its scopes or register it in a matching registry.",
                    provider.name, declared, registry, self.scope, self.scope
                )))
            }
        }
    }
}

/// A registry accepting only providers declared for its scope.
///
/// The scope is a marker type; providers list the scopes they belong to with
/// [`ProviderClass::service_scope`](crate::ProviderClass::service_scope).
/// Everything else behaves like the wrapped [`DefaultServiceRegistry`].
///
/// ```rust
/// use service_registry::{ClassKey, ProviderClass, ScopedServiceRegistry, ServiceRegistrationProvider};
///
/// struct BuildScope;
/// service_registry::annotation_type!(BuildScope);
///
/// struct Unscoped;
/// impl ServiceRegistrationProvider for Unscoped {
///     fn describe(_class: &mut ProviderClass<Self>) {}
/// }
///
/// struct Scoped;
/// impl ServiceRegistrationProvider for Scoped {
///     fn describe(class: &mut ProviderClass<Self>) {
///         class.service_scope(&[ClassKey::of::<BuildScope>()]);
///     }
/// }
///
/// let registry = ScopedServiceRegistry::new::<BuildScope>("build");
/// assert!(registry.add_provider(Scoped).is_ok());
/// assert!(registry.add_provider(Unscoped).is_err());
/// ```
#[derive(Clone)]
pub struct ScopedServiceRegistry {
    registry: DefaultServiceRegistry,
    scope: ClassKey,
}

impl ScopedServiceRegistry {
    /// A scoped registry without parents, with the default validation
    /// settings.
    pub fn new<S: ServiceType>(display_name: impl Into<String>) -> Self {
        Self::with_config::<S>(display_name, &[], ScopeValidationConfig::default())
    }

    /// A scoped registry delegating to `parents`.
    pub fn with_config<S: ServiceType>(
        display_name: impl Into<String>,
        parents: &[DefaultServiceRegistry],
        config: ScopeValidationConfig,
    ) -> Self {
        Self::build(Self::builder::<S>(config).name(display_name).parents(parents), ClassKey::of::<S>())
    }

    /// A scoped registry configured from `config`, delegating to `parents`.
    pub fn from_config<S: ServiceType>(config: &RegistryConfig, parents: &[DefaultServiceRegistry]) -> Self {
        let builder = Self::builder::<S>(config.scope_validation.clone()).config(config).parents(parents);
        Self::build(builder, ClassKey::of::<S>())
    }

    fn builder<S: ServiceType>(config: ScopeValidationConfig) -> RegistryBuilder {
        DefaultServiceRegistry::builder().scope_validation(ScopeValidation::new(ClassKey::of::<S>(), config))
    }

    fn build(builder: RegistryBuilder, scope: ClassKey) -> Self {
        ScopedServiceRegistry { registry: builder.build_empty(), scope }
    }

    /// The scope marker of this registry.
    pub fn scope(&self) -> ClassKey {
        self.scope
    }

    pub fn into_inner(self) -> DefaultServiceRegistry {
        self.registry
    }
}

impl Deref for ScopedServiceRegistry {
    type Target = DefaultServiceRegistry;

    fn deref(&self) -> &DefaultServiceRegistry {
        &self.registry
    }
}

impl fmt::Debug for ScopedServiceRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ScopedServiceRegistry")
            .field("registry", &self.registry)
            .field("scope", &self.scope)
            .finish()
    }
}
