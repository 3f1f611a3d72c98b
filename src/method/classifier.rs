//! Classification of provider methods by naming convention.

use std::any::Any;
use std::fmt;
use std::sync::Arc;

use ahash::AHashSet;

use super::invoker::MethodInvoker;
use super::provider::{MethodDecl, ProviderClass, ServiceRegistrationProvider};
use crate::class::ClassInspector;
use crate::error::{BoxError, RegistryError, RegistryResult};
use crate::instance::{Instance, RawValue};
use crate::key::{simple_name, ClassKey, TypeSpec};

/// Role of a classified provider method.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MethodKind {
    Factory,
    Decorator,
    Provider,
    Configurer,
}

/// A classified provider method.
pub struct ServiceMethod {
    kind: MethodKind,
    owner: String,
    name: String,
    params: Vec<TypeSpec>,
    service_type: Option<TypeSpec>,
    explicit_types: Vec<TypeSpec>,
    private: bool,
    invoker: Arc<dyn MethodInvoker>,
}

impl ServiceMethod {
    pub fn kind(&self) -> MethodKind {
        self.kind
    }

    /// Simple name of the declaring provider type.
    pub fn owner(&self) -> &str {
        &self.owner
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn parameter_types(&self) -> &[TypeSpec] {
        &self.params
    }

    /// The return type; `None` for configure methods.
    pub fn service_type(&self) -> Option<&TypeSpec> {
        self.service_type.as_ref()
    }

    /// Types the method is declared to provide: the explicit `@Provides`
    /// types if any, else its return type.
    pub fn declared_types(&self) -> Vec<TypeSpec> {
        if self.explicit_types.is_empty() {
            self.service_type.iter().cloned().collect()
        } else {
            self.explicit_types.clone()
        }
    }

    /// Whether the method is marked `@PrivateService`.
    pub fn is_private(&self) -> bool {
        self.private
    }

    pub(crate) fn invoke(
        &self,
        target: &(dyn Any + Send + Sync),
        args: &[Instance],
        inspector: &Arc<ClassInspector>,
    ) -> Result<Option<RawValue>, BoxError> {
        self.invoker.invoke_factory(target, args, inspector)
    }

    pub(crate) fn invoke_configure(
        &self,
        target: &(dyn Any + Send + Sync),
        args: &[Instance],
        inspector: &Arc<ClassInspector>,
    ) -> Result<(), BoxError> {
        self.invoker.invoke_configure(target, args, inspector)
    }
}

impl fmt::Debug for ServiceMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?} {}.{}()", self.kind, self.owner, self.name)
    }
}

/// The classified methods of one provider type.
#[derive(Debug, Default)]
pub struct RelevantMethods {
    pub decorators: Vec<Arc<ServiceMethod>>,
    pub factories: Vec<Arc<ServiceMethod>>,
    pub providers: Vec<Arc<ServiceMethod>>,
    pub configurers: Vec<Arc<ServiceMethod>>,
}

/// Provider type facts cached by the [`ClassInspector`].
#[derive(Debug)]
pub struct ProviderDetails {
    pub(crate) name: String,
    pub(crate) type_name: &'static str,
    pub(crate) scopes: Option<Vec<ClassKey>>,
    pub(crate) anonymous: bool,
    pub(crate) methods: RelevantMethods,
}

impl ProviderDetails {
    /// Simple name of the provider type.
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn methods(&self) -> &RelevantMethods {
        &self.methods
    }
}

/// Describes and classifies the provider type `P`.
pub(crate) fn classify<P: ServiceRegistrationProvider>() -> RegistryResult<ProviderDetails> {
    let mut class = ProviderClass::<P>::new();
    P::describe(&mut class);
    let decls = std::mem::take(&mut class.methods).into_iter().chain(std::mem::take(&mut class.inherited));
    Ok(ProviderDetails {
        name: simple_name(std::any::type_name::<P>()),
        type_name: std::any::type_name::<P>(),
        scopes: class.scopes.take(),
        anonymous: class.anonymous,
        methods: classify_methods(decls)?,
    })
}

fn starts_with_any(name: &str, prefixes: &[&str]) -> bool {
    prefixes.iter().any(|prefix| name.starts_with(prefix))
}

/// Classifies declared methods, most derived first. A signature seen before
/// belongs to an overridden method and is skipped.
pub(crate) fn classify_methods(decls: impl IntoIterator<Item = MethodDecl>) -> RegistryResult<RelevantMethods> {
    let mut methods = RelevantMethods::default();
    let mut seen: AHashSet<(String, Vec<TypeSpec>)> = AHashSet::new();

    for decl in decls {
        if decl.is_static {
            continue;
        }
        if !seen.insert((decl.name.clone(), decl.params.clone())) {
            continue;
        }
        let owner = simple_name(decl.owner);

        let kind = if decl.name == "configure" {
            if decl.provides.is_some() {
                return Err(RegistryError::validation(format!(
                    "Method {}.{}() must not be annotated with @Provides.",
                    owner, decl.name
                )));
            }
            if decl.returns.is_some() {
                return Err(RegistryError::validation(format!(
                    "Method {}.{}() must return void.",
                    owner, decl.name
                )));
            }
            MethodKind::Configurer
        } else if starts_with_any(&decl.name, &["create", "decorate", "providedBy"]) {
            if decl.provides.is_none() {
                return Err(RegistryError::validation(format!(
                    "Method {}.{}() must be annotated with @Provides.",
                    owner, decl.name
                )));
            }
            let Some(returns) = &decl.returns else {
                return Err(RegistryError::validation(format!(
                    "Method {}.{}() must not return void.",
                    owner, decl.name
                )));
            };
            if decl.name.starts_with("providedBy") {
                if decl.params.len() != 1 {
                    return Err(RegistryError::validation(format!(
                        "Method {}.{}() must take exactly one parameter.",
                        owner, decl.name
                    )));
                }
                MethodKind::Provider
            } else if decl.params.contains(returns) {
                MethodKind::Decorator
            } else {
                MethodKind::Factory
            }
        } else if decl.provides.is_some() {
            return Err(RegistryError::validation(format!(
                "Non-factory method {}.{}() must not be annotated with @Provides.",
                owner, decl.name
            )));
        } else {
            continue;
        };

        let method = Arc::new(ServiceMethod {
            kind,
            owner,
            name: decl.name,
            params: decl.params,
            service_type: decl.returns,
            explicit_types: decl.provides.unwrap_or_default(),
            private: decl.private,
            invoker: decl.invoker,
        });
        match kind {
            MethodKind::Factory => methods.factories.push(method),
            MethodKind::Decorator => methods.decorators.push(method),
            MethodKind::Provider => methods.providers.push(method),
            MethodKind::Configurer => methods.configurers.push(method),
        }
    }
    Ok(methods)
}
