//! Core traits of the registry.

pub mod capabilities;
pub mod lifecycle;
pub mod registry;

pub use capabilities::{Factory, ServiceFactory, Stoppable};
pub use lifecycle::{AnnotatedServiceLifecycleHandler, LifecycleRegistration};
pub use registry::{ServiceRegistrationAction, ServiceRegistry, ServiceRegistryExt};
