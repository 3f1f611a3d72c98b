//! Lifecycle handler capability.

use crate::error::RegistryResult;
use crate::instance::Instance;
use crate::key::ClassKey;

/// A registered service as seen by a lifecycle handler.
pub trait LifecycleRegistration {
    /// The classes the service is declared as.
    fn declared_types(&self) -> Vec<ClassKey>;

    /// The service instance, created on demand. Marks the registry as started.
    fn instance(&self) -> RegistryResult<Instance>;
}

/// A service that wants to hear about other services carrying certain
/// annotations.
///
/// Once realized, the handler is offered every singleton service already
/// registered in its registry and every one registered afterwards.
pub trait AnnotatedServiceLifecycleHandler: Send + Sync {
    /// Annotations this handler recognizes.
    fn annotations(&self) -> Vec<ClassKey>;

    /// When set, every service is reported with this annotation regardless of
    /// its declared types.
    fn implicit_annotation(&self) -> Option<ClassKey> {
        None
    }

    fn when_registered(&self, annotation: ClassKey, registration: &dyn LifecycleRegistration);
}

crate::interface_service!(dyn AnnotatedServiceLifecycleHandler);
