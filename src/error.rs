//! Error types for the service registry.

use std::error::Error as StdError;
use std::fmt;

/// Boxed error used for failures raised by user code (factory methods,
/// constructors, configure methods and `stop()` hooks).
pub type BoxError = Box<dyn StdError + Send + Sync + 'static>;

/// Service registry errors.
///
/// Every variant carries a human readable message naming the offending
/// type(s), method or constructor. Variants with a `source` wrap the failure
/// that caused them, so the whole chain can be walked with [`RegistryError::causes`].
///
/// # Examples
///
/// ```rust
/// use service_registry::{DefaultServiceRegistry, RegistryError, ServiceRegistryExt};
///
/// struct Missing;
/// service_registry::concrete_service!(Missing);
///
/// let registry = DefaultServiceRegistry::named("root");
/// match registry.get::<Missing>() {
///     Err(RegistryError::UnknownService { message, .. }) => {
///         assert_eq!(message, "No service of type Missing available in root.");
///     }
///     _ => unreachable!(),
/// }
/// ```
#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
    /// Structural misuse of the registration conventions, including cycles.
    #[error("{message}")]
    Validation {
        message: String,
        #[source]
        source: Option<BoxError>,
    },
    /// Failure while materializing a service instance.
    #[error("{message}")]
    Creation {
        message: String,
        #[source]
        source: Option<BoxError>,
    },
    /// Ambiguous lookup, or a failure while applying a configure method.
    #[error("{message}")]
    Lookup {
        message: String,
        #[source]
        source: Option<BoxError>,
    },
    /// The requested service type is not available.
    #[error("{message}")]
    UnknownService { service_type: String, message: String },
    /// Mutability or lifecycle violation.
    #[error("{0}")]
    IllegalState(String),
    /// Invalid argument passed to a registration method.
    #[error("{0}")]
    IllegalArgument(String),
    /// One or more `stop()` hooks failed during shutdown.
    #[error("{}", format_stop_failures(.failures))]
    Stop { failures: Vec<BoxError> },
}

fn format_stop_failures(failures: &[BoxError]) -> String {
    match failures {
        [single] => single.to_string(),
        many => {
            let mut message = format!("{} failures occurred while stopping services:", many.len());
            for failure in many {
                message.push_str("\n   - ");
                message.push_str(&failure.to_string());
            }
            message
        }
    }
}

impl RegistryError {
    pub(crate) fn validation(message: impl Into<String>) -> Self {
        RegistryError::Validation { message: message.into(), source: None }
    }

    pub(crate) fn creation(message: impl Into<String>) -> Self {
        RegistryError::Creation { message: message.into(), source: None }
    }

    pub(crate) fn creation_caused_by(message: impl Into<String>, source: impl Into<BoxError>) -> Self {
        RegistryError::Creation { message: message.into(), source: Some(source.into()) }
    }

    pub(crate) fn lookup(message: impl Into<String>) -> Self {
        RegistryError::Lookup { message: message.into(), source: None }
    }

    pub(crate) fn lookup_caused_by(message: impl Into<String>, source: impl Into<BoxError>) -> Self {
        RegistryError::Lookup { message: message.into(), source: Some(source.into()) }
    }

    pub(crate) fn unknown(service_type: impl Into<String>, message: impl Into<String>) -> Self {
        RegistryError::UnknownService { service_type: service_type.into(), message: message.into() }
    }

    /// Returns true for the lookup family of errors: validation, creation,
    /// lookup and unknown-service failures. Parameter binding wraps these and
    /// lets every other kind propagate unchanged.
    pub fn is_lookup_failure(&self) -> bool {
        matches!(
            self,
            RegistryError::Validation { .. }
                | RegistryError::Creation { .. }
                | RegistryError::Lookup { .. }
                | RegistryError::UnknownService { .. }
        )
    }

    /// Iterates over this error followed by every error in its source chain.
    pub fn causes(&self) -> Causes<'_> {
        Causes { next: Some(self) }
    }

    /// Returns the innermost error of the source chain.
    pub fn root_cause(&self) -> &(dyn StdError + 'static) {
        let this: &(dyn StdError + 'static) = self;
        self.causes().last().unwrap_or(this)
    }
}

/// Iterator over an error and its sources, see [`RegistryError::causes`].
pub struct Causes<'a> {
    next: Option<&'a (dyn StdError + 'static)>,
}

impl<'a> Iterator for Causes<'a> {
    type Item = &'a (dyn StdError + 'static);

    fn next(&mut self) -> Option<Self::Item> {
        let current = self.next.take()?;
        self.next = current.source();
        Some(current)
    }
}

impl fmt::Debug for Causes<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Causes").finish_non_exhaustive()
    }
}

/// Result type for registry operations.
pub type RegistryResult<T> = Result<T, RegistryError>;
