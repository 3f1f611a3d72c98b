//! The service provider tree.
//!
//! Every registry answers lookups through a tree of [`ServiceProvider`]s:
//! its own services (a [`SingletonService`] per registration, indexed by class),
//! a read-only wrapper over each parent, and composites tying them together.
//! A lookup returns a [`Service`], which is realized into an [`Instance`] with
//! [`Service::get`].

mod collection;
mod composite;
mod own;
mod singleton;

use std::sync::Arc;

use ahash::AHashSet;

use crate::access::ServiceAccessToken;
use crate::class::{ClassInspector, ClassKind};
use crate::error::{RegistryError, RegistryResult};
use crate::instance::Instance;
use crate::key::{ClassKey, TypeSpec};

pub(crate) use collection::CollectionService;
pub(crate) use composite::{CompositeServiceProvider, ParentServices};
pub(crate) use own::OwnServices;
pub(crate) use singleton::SingletonService;

/// A service located by a lookup, ready to be realized.
pub(crate) trait Service: Send + Sync {
    /// The service instance, created on first call.
    fn get(&self) -> RegistryResult<Instance>;

    fn display_name(&self) -> String;

    /// Records that `dependent` was bound to this service, so it is stopped
    /// before this service is.
    fn required_by(&self, dependent: &Arc<SingletonService>);
}

/// A node of the provider tree.
pub(crate) trait ServiceProvider: Send + Sync {
    /// A service whose declared types satisfy `spec`, visible to `token`.
    fn get_service(&self, spec: &TypeSpec, token: Option<&ServiceAccessToken>) -> RegistryResult<Option<Arc<dyn Service>>>;

    /// A service that is a factory for `element` or one of its subtypes.
    fn get_factory(&self, element: ClassKey, token: Option<&ServiceAccessToken>) -> RegistryResult<Option<Arc<dyn Service>>>;

    /// Visits every service assignable to `class`.
    fn get_all(&self, class: ClassKey, token: Option<&ServiceAccessToken>, visitor: &mut ServiceVisitor) -> RegistryResult<()>;

    /// Stops every realized instance below this node.
    fn stop(&self) -> RegistryResult<()>;
}

/// Identity of a service: the address of its allocation.
pub(crate) fn service_id(service: &Arc<dyn Service>) -> usize {
    Arc::as_ptr(service) as *const () as usize
}

/// Identity of a provider node.
pub(crate) fn provider_id(provider: &Arc<dyn ServiceProvider>) -> usize {
    Arc::as_ptr(provider) as *const () as usize
}

/// Collects the services of a collect-all lookup, each at most once.
///
/// A decorating service asks the visitor to exclude the service it decorates,
/// so the original found later in a parent is not reported next to its
/// decorator.
#[derive(Default)]
pub(crate) struct ServiceVisitor {
    services: Vec<Arc<dyn Service>>,
    seen: AHashSet<usize>,
    excluded: AHashSet<usize>,
}

impl ServiceVisitor {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn visit(&mut self, service: Arc<dyn Service>) {
        let id = service_id(&service);
        if self.excluded.contains(&id) {
            return;
        }
        if self.seen.insert(id) {
            self.services.push(service);
        }
    }

    pub(crate) fn exclude(&mut self, id: usize) {
        self.excluded.insert(id);
    }

    pub(crate) fn into_services(self) -> Vec<Arc<dyn Service>> {
        self.services
    }
}

/// Rejects classes that can never be looked up.
pub(crate) fn assert_valid_service_type(inspector: &ClassInspector, class: ClassKey) -> RegistryResult<()> {
    match inspector.details(class).kind() {
        ClassKind::Array => Err(RegistryError::validation("Locating services with array type is not supported.")),
        ClassKind::Annotation => Err(RegistryError::validation(
            "Locating services with annotation type is not supported.",
        )),
        ClassKind::Object => Err(RegistryError::validation("Locating services with type Object is not supported.")),
        ClassKind::Concrete | ClassKind::Interface => Ok(()),
    }
}

fn unsupported(spec: &TypeSpec) -> RegistryError {
    RegistryError::validation(format!("Locating services with type {} is not supported.", spec))
}

/// Resolves `spec` against `provider`.
///
/// `Factory<T>` lookups find a factory service, `List<T>` lookups collect every
/// matching service, and plain classes go to a single-service lookup.
pub(crate) fn find(
    spec: &TypeSpec,
    token: Option<&ServiceAccessToken>,
    provider: &dyn ServiceProvider,
    inspector: &Arc<ClassInspector>,
) -> RegistryResult<Option<Arc<dyn Service>>> {
    tracing::trace!(service_type = %spec, "locating service");
    match spec {
        TypeSpec::Factory(element) => find_factory(element, token, provider),
        TypeSpec::List(element) => find_collection(element, token, provider, inspector).map(Some),
        TypeSpec::Raw(class) => {
            assert_valid_service_type(inspector, *class)?;
            provider.get_service(spec, token)
        }
        TypeSpec::Wildcard { .. } => Err(unsupported(spec)),
    }
}

fn find_factory(
    element: &TypeSpec,
    token: Option<&ServiceAccessToken>,
    provider: &dyn ServiceProvider,
) -> RegistryResult<Option<Arc<dyn Service>>> {
    match element {
        TypeSpec::Raw(class) => provider.get_factory(*class, token),
        TypeSpec::Wildcard { upper: None, lower: Some(lower) } => match lower.as_ref() {
            TypeSpec::Raw(class) => provider.get_factory(*class, token),
            _ => Err(unsupported(element)),
        },
        TypeSpec::Wildcard { upper, lower: None } => match upper.as_deref() {
            None => provider.get_factory(ClassKey::of::<crate::class::markers::Object>(), token),
            Some(TypeSpec::Raw(class)) => provider.get_factory(*class, token),
            Some(_) => Err(unsupported(element)),
        },
        _ => Err(unsupported(element)),
    }
}

fn find_collection(
    element: &TypeSpec,
    token: Option<&ServiceAccessToken>,
    provider: &dyn ServiceProvider,
    inspector: &Arc<ClassInspector>,
) -> RegistryResult<Arc<dyn Service>> {
    let class = match element {
        TypeSpec::Raw(class) => *class,
        TypeSpec::Wildcard { upper, lower: None } => match upper.as_deref() {
            None => ClassKey::of::<crate::class::markers::Object>(),
            Some(TypeSpec::Raw(class)) => *class,
            Some(_) => return Err(unsupported(element)),
        },
        _ => return Err(unsupported(element)),
    };
    assert_valid_service_type(inspector, class)?;

    let mut visitor = ServiceVisitor::new();
    provider.get_all(class, token, &mut visitor)?;
    let providers = visitor.into_services();
    let instances = providers.iter().map(|service| service.get()).collect::<RegistryResult<Vec<_>>>()?;
    Ok(Arc::new(CollectionService::new(class, instances, providers, inspector)))
}

/// Whether a service declared as `actual` can answer a lookup for `expected`.
pub(crate) fn is_satisfied_by(expected: &TypeSpec, actual: &TypeSpec, inspector: &ClassInspector) -> bool {
    if expected == actual {
        return true;
    }
    match (expected, actual) {
        (TypeSpec::Raw(expected), TypeSpec::Raw(actual)) => inspector.is_assignable(*expected, *actual),
        (TypeSpec::Raw(expected), TypeSpec::List(_) | TypeSpec::Factory(_)) => {
            inspector.is_assignable(*expected, actual.erased())
        }
        (TypeSpec::List(expected), TypeSpec::List(actual)) => is_satisfied_by(expected, actual, inspector),
        (TypeSpec::Factory(expected), TypeSpec::Factory(actual)) => is_satisfied_by(expected, actual, inspector),
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::class::markers;

    trait Shape: Send + Sync {}
    crate::interface_service!(dyn Shape);

    struct Square;
    impl Shape for Square {}
    crate::concrete_service!(Square: dyn Shape);

    struct Tag;
    crate::annotation_type!(Tag);

    #[test]
    fn raw_types_match_by_assignability() {
        let inspector = ClassInspector::new();
        let shape = TypeSpec::of::<dyn Shape>();
        let square = TypeSpec::of::<Square>();
        assert!(is_satisfied_by(&shape, &square, &inspector));
        assert!(!is_satisfied_by(&square, &shape, &inspector));
        assert!(is_satisfied_by(&square, &square, &inspector));
    }

    #[test]
    fn parameterized_types_match_structurally() {
        let inspector = ClassInspector::new();
        let list_of_shapes = TypeSpec::list_of(TypeSpec::of::<dyn Shape>());
        let list_of_squares = TypeSpec::list_of(TypeSpec::of::<Square>());
        assert!(is_satisfied_by(&list_of_shapes, &list_of_squares, &inspector));
        assert!(!is_satisfied_by(&list_of_squares, &list_of_shapes, &inspector));
        assert!(!is_satisfied_by(&list_of_shapes, &TypeSpec::factory_of(TypeSpec::of::<Square>()), &inspector));
        assert!(is_satisfied_by(&TypeSpec::of::<markers::List>(), &list_of_squares, &inspector));

        let wildcard = TypeSpec::list_of(TypeSpec::extends(TypeSpec::of::<dyn Shape>()));
        assert!(!is_satisfied_by(&wildcard, &list_of_squares, &inspector));
        assert!(is_satisfied_by(&wildcard, &wildcard.clone(), &inspector));
    }

    #[test]
    fn invalid_lookup_types_are_rejected() {
        let inspector = ClassInspector::new();
        let message = |class| assert_valid_service_type(&inspector, class).map_err(|e| e.to_string()).err();
        assert_eq!(message(ClassKey::of::<[Square]>()), Some("Locating services with array type is not supported.".into()));
        assert_eq!(message(ClassKey::of::<Tag>()), Some("Locating services with annotation type is not supported.".into()));
        assert_eq!(message(ClassKey::of::<markers::Object>()), Some("Locating services with type Object is not supported.".into()));
        assert_eq!(message(ClassKey::of::<Square>()), None);
    }
}
