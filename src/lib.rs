//! # service-registry
//!
//! A hierarchical service registry with lazily created singletons.
//!
//! ## Features
//!
//! - **Provider beans**: services are declared by `create*` and `decorate*`
//!   methods of provider objects, configured by their `configure` methods
//! - **Parent delegation**: a registry looks in its own services first, then in
//!   its parents, in declaration order
//! - **Decorators**: a method taking its own return type wraps the service of
//!   that type found in the parents
//! - **Lazy singletons**: each service is bound and created once, on first use,
//!   even under concurrent access; dependency cycles are reported
//! - **Private services**: visible only to the provider that declared them
//! - **Ordered shutdown**: closing a registry stops the instances it created,
//!   each one after the services depending on it
//!
//! ## Quick Start
//!
//! ```rust
//! use std::sync::Arc;
//! use service_registry::{DefaultServiceRegistry, ProviderClass, ServiceRegistrationProvider, ServiceRegistryExt};
//!
//! struct Database {
//!     url: String,
//! }
//! service_registry::concrete_service!(Database);
//!
//! struct UserService {
//!     db: Arc<Database>,
//! }
//! service_registry::concrete_service!(UserService);
//!
//! struct AppServices;
//!
//! impl ServiceRegistrationProvider for AppServices {
//!     fn describe(class: &mut ProviderClass<Self>) {
//!         class.provides("createDatabase", |_: &Self, (): ()| {
//!             Arc::new(Database { url: "postgres://localhost".to_string() })
//!         });
//!         class.provides("createUserService", |_: &Self, (db,): (Arc<Database>,)| {
//!             Arc::new(UserService { db })
//!         });
//!     }
//! }
//!
//! let registry = DefaultServiceRegistry::create([AppServices]).unwrap();
//! let users = registry.get::<UserService>().unwrap();
//! assert_eq!(users.db.url, "postgres://localhost");
//! assert!(Arc::ptr_eq(&users.db, &registry.get::<Database>().unwrap()));
//! registry.close().unwrap();
//! ```
//!
//! ## Decorating a parent's service
//!
//! ```rust
//! use std::sync::Arc;
//! use service_registry::{DefaultServiceRegistry, ProviderClass, ServiceRegistrationProvider, ServiceRegistryExt};
//!
//! struct Greeting(String);
//! service_registry::concrete_service!(Greeting);
//!
//! struct Loud;
//!
//! impl ServiceRegistrationProvider for Loud {
//!     fn describe(class: &mut ProviderClass<Self>) {
//!         class.provides("decorateGreeting", |_: &Self, (inner,): (Arc<Greeting>,)| {
//!             Arc::new(Greeting(inner.0.to_uppercase()))
//!         });
//!     }
//! }
//!
//! let parent = DefaultServiceRegistry::named("parent");
//! parent.add(Arc::new(Greeting("hello".into()))).unwrap();
//!
//! let child = DefaultServiceRegistry::with_parents("child", &[parent.clone()]);
//! child.add_provider(Loud).unwrap();
//!
//! assert_eq!(child.get::<Greeting>().unwrap().0, "HELLO");
//! assert_eq!(parent.get::<Greeting>().unwrap().0, "hello");
//! ```

pub mod access;
pub mod class;
pub mod config;
pub mod error;
pub mod instance;
pub mod key;
pub mod method;
pub mod registry;
pub mod traits;

// Internal modules
mod internal;
mod provider;

pub use access::{create_token, private_scope, public_scope, ServiceAccessScope, ServiceAccessToken};
pub use class::{markers, ClassBuilder, ClassDescriptor, ClassDetails, ClassInspector, ClassKind, ServiceType};
pub use config::{RegistryConfig, ScopeValidationConfig};
pub use error::{BoxError, Causes, RegistryError, RegistryResult};
pub use instance::{Instance, InstanceList, RawValue};
pub use key::{ClassKey, TypeSpec};
pub use method::{
    Inject, InjectArgs, MethodInvoker, MethodKind, MethodOptions, MethodReturn, ProviderBean, ProviderClass,
    ProviderDetails, RelevantMethods, ServiceMethod, ServiceRegistrationProvider,
};
pub use registry::{DefaultServiceRegistry, RegistryBuilder, ScopedServiceRegistry, ServiceRegistration};
pub use traits::{
    AnnotatedServiceLifecycleHandler, Factory, LifecycleRegistration, ServiceFactory, ServiceRegistrationAction,
    ServiceRegistry, ServiceRegistryExt, Stoppable,
};
