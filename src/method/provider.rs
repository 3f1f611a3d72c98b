//! Provider beans and their declared methods.

use std::any::Any;
use std::fmt;
use std::marker::PhantomData;
use std::sync::Arc;

use super::classifier::ProviderDetails;
use super::invoker::{MethodInvoker, ProjectedMethod, TypedMethod};
use super::{InjectArgs, MethodReturn};
use crate::class::{ClassInspector, ServiceType};
use crate::error::RegistryResult;
use crate::key::{simple_name, ClassKey, TypeSpec};

/// An object whose methods register services.
///
/// The provider lists its methods in [`describe`](Self::describe). Method names
/// follow the registry conventions:
///
/// - `create*` and `decorate*` methods must be marked with
///   [`provides`](MethodOptions::provides) and return a service. A method
///   taking its own return type as a parameter decorates the service of that
///   type found in the parent registries.
/// - `configure` methods return `()` and run once when the provider is added.
///   A [`ServiceRegistration`](crate::ServiceRegistration) parameter gives
///   access to the registry being configured.
///
/// ```rust
/// use std::sync::Arc;
/// use service_registry::{ProviderClass, ServiceRegistrationProvider};
///
/// struct Pool {
///     size: usize,
/// }
/// service_registry::concrete_service!(Pool);
///
/// struct PoolServices {
///     size: usize,
/// }
///
/// impl ServiceRegistrationProvider for PoolServices {
///     fn describe(class: &mut ProviderClass<Self>) {
///         class.provides("createPool", |this: &Self, (): ()| Arc::new(Pool { size: this.size }));
///     }
/// }
/// ```
pub trait ServiceRegistrationProvider: Sized + Send + Sync + 'static {
    /// Declares the methods of this provider type.
    fn describe(class: &mut ProviderClass<Self>);
}

/// A method as declared by a provider, before classification.
pub(crate) struct MethodDecl {
    pub(crate) owner: &'static str,
    pub(crate) name: String,
    pub(crate) params: Vec<TypeSpec>,
    pub(crate) returns: Option<TypeSpec>,
    pub(crate) provides: Option<Vec<TypeSpec>>,
    pub(crate) private: bool,
    pub(crate) is_static: bool,
    pub(crate) invoker: Arc<dyn MethodInvoker>,
}

impl MethodDecl {
    fn projected<P, B>(self, project: fn(&P) -> &B) -> MethodDecl
    where
        P: Send + Sync + 'static,
        B: Send + Sync + 'static,
    {
        MethodDecl { invoker: Arc::new(ProjectedMethod::new(self.invoker, project)), ..self }
    }
}

/// The method table of provider type `P`, filled in by
/// [`ServiceRegistrationProvider::describe`].
pub struct ProviderClass<P> {
    pub(crate) methods: Vec<MethodDecl>,
    pub(crate) inherited: Vec<MethodDecl>,
    pub(crate) scopes: Option<Vec<ClassKey>>,
    pub(crate) anonymous: bool,
    _provider: PhantomData<fn(&P)>,
}

impl<P: Send + Sync + 'static> ProviderClass<P> {
    pub(crate) fn new() -> Self {
        ProviderClass {
            methods: Vec::new(),
            inherited: Vec::new(),
            scopes: None,
            anonymous: false,
            _provider: PhantomData,
        }
    }

    /// Declares a method.
    pub fn method<A, R, F>(&mut self, name: impl Into<String>, call: F) -> MethodOptions<'_>
    where
        A: InjectArgs,
        R: MethodReturn,
        F: Fn(&P, A) -> R + Send + Sync + 'static,
    {
        self.methods.push(MethodDecl {
            owner: std::any::type_name::<P>(),
            name: name.into(),
            params: A::specs(),
            returns: R::spec(),
            provides: None,
            private: false,
            is_static: false,
            invoker: Arc::new(TypedMethod::<P, A, R, F>::new(call)),
        });
        let index = self.methods.len() - 1;
        MethodOptions { decl: &mut self.methods[index] }
    }

    /// Declares a method marked with `@Provides`.
    pub fn provides<A, R, F>(&mut self, name: impl Into<String>, call: F) -> MethodOptions<'_>
    where
        A: InjectArgs,
        R: MethodReturn,
        F: Fn(&P, A) -> R + Send + Sync + 'static,
    {
        self.method(name, call).provides()
    }

    /// Inherits the methods of the base provider `B`, reached through
    /// `project`. Methods of `P` take precedence over inherited methods with
    /// the same signature.
    pub fn inherit<B: ServiceRegistrationProvider>(&mut self, project: fn(&P) -> &B) -> &mut Self {
        let mut base = ProviderClass::<B>::new();
        B::describe(&mut base);
        for decl in base.methods.into_iter().chain(base.inherited) {
            self.inherited.push(decl.projected(project));
        }
        self
    }

    /// Annotates the provider with the service scopes it may be registered in.
    pub fn service_scope(&mut self, scopes: &[ClassKey]) -> &mut Self {
        self.scopes = Some(scopes.to_vec());
        self
    }

    /// Marks the provider as an anonymous class.
    pub fn anonymous(&mut self) -> &mut Self {
        self.anonymous = true;
        self
    }
}

/// Options of a declared method.
pub struct MethodOptions<'a> {
    decl: &'a mut MethodDecl,
}

impl MethodOptions<'_> {
    /// Marks the method with `@Provides`, declaring its return type.
    pub fn provides(self) -> Self {
        self.decl.provides.get_or_insert_with(Vec::new);
        self
    }

    /// Marks the method with `@Provides` and adds `S` to its explicit service
    /// types. Explicit types replace the return type as the declared types.
    pub fn provides_as<S: ?Sized + ServiceType>(self) -> Self {
        self.decl.provides.get_or_insert_with(Vec::new).push(TypeSpec::of::<S>());
        self
    }

    /// Marks the method with `@Provides` listing explicit service types.
    pub fn provides_types(self, types: impl IntoIterator<Item = TypeSpec>) -> Self {
        self.decl.provides.get_or_insert_with(Vec::new).extend(types);
        self
    }

    /// Marks the method with `@PrivateService`.
    pub fn private(self) -> Self {
        self.decl.private = true;
        self
    }

    /// Marks the method as static. Static methods are never classified.
    pub fn static_method(self) -> Self {
        self.decl.is_static = true;
        self
    }
}

type DetailsFn = fn(&ClassInspector) -> RegistryResult<Arc<ProviderDetails>>;

/// A provider instance ready to be added to a registry.
pub struct ProviderBean {
    target: Arc<dyn Any + Send + Sync>,
    type_name: &'static str,
    details: DetailsFn,
}

impl ProviderBean {
    /// Wraps a provider.
    pub fn of<P: ServiceRegistrationProvider>(provider: P) -> Self {
        Self::shared(Arc::new(provider))
    }

    /// Wraps a provider shared with other owners.
    pub fn shared<P: ServiceRegistrationProvider>(provider: Arc<P>) -> Self {
        ProviderBean {
            target: provider,
            type_name: std::any::type_name::<P>(),
            details: ClassInspector::provider_details::<P>,
        }
    }

    /// Fully qualified type name of the provider.
    pub fn type_name(&self) -> &'static str {
        self.type_name
    }

    /// Type name of the provider without module paths.
    pub fn simple_name(&self) -> String {
        simple_name(self.type_name)
    }

    pub(crate) fn target(&self) -> &Arc<dyn Any + Send + Sync> {
        &self.target
    }

    pub(crate) fn details(&self, inspector: &ClassInspector) -> RegistryResult<Arc<ProviderDetails>> {
        (self.details)(inspector)
    }
}

impl<P: ServiceRegistrationProvider> From<P> for ProviderBean {
    fn from(provider: P) -> Self {
        ProviderBean::of(provider)
    }
}

impl fmt::Debug for ProviderBean {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProviderBean").field("type", &self.type_name).finish()
    }
}
