//! Registry configuration.
//!
//! Configuration is plain data: a display name for the registry and the
//! settings of scope validation. Values come from code, from the environment
//! or, with the `config` feature, from JSON.

use std::env;

#[cfg(feature = "config")]
use serde::{Deserialize, Serialize};

#[cfg(feature = "config")]
use crate::error::{RegistryError, RegistryResult};

/// Comma separated provider type names that skip scope validation.
pub const SUPPRESSED_SCOPE_TYPES_ENV: &str = "SERVICE_REGISTRY_SUPPRESSED_SCOPE_TYPES";

/// Set to `false` to disable scope validation.
pub const STRICT_SCOPES_ENV: &str = "SERVICE_REGISTRY_STRICT_SCOPES";

/// Settings of the provider scope check of a
/// [`ScopedServiceRegistry`](crate::ScopedServiceRegistry).
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "config", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "config", serde(default))]
pub struct ScopeValidationConfig {
    /// When false, no provider is checked.
    pub strict: bool,
    /// Providers marked anonymous skip the check.
    pub allow_anonymous: bool,
    /// Fully qualified provider type names that skip the check.
    pub suppressed_types: Vec<String>,
}

impl Default for ScopeValidationConfig {
    fn default() -> Self {
        ScopeValidationConfig { strict: true, allow_anonymous: true, suppressed_types: Vec::new() }
    }
}

impl ScopeValidationConfig {
    /// Defaults, overridden by the environment.
    pub fn from_env() -> Self {
        Self::default().with_overrides(env::var(STRICT_SCOPES_ENV).ok(), env::var(SUPPRESSED_SCOPE_TYPES_ENV).ok())
    }

    fn with_overrides(mut self, strict: Option<String>, suppressed: Option<String>) -> Self {
        if let Some(strict) = strict {
            self.strict = !strict.trim().eq_ignore_ascii_case("false");
        }
        if let Some(suppressed) = suppressed {
            self.suppressed_types.extend(
                suppressed.split(',').map(str::trim).filter(|name| !name.is_empty()).map(String::from),
            );
        }
        self
    }
}

/// Configuration of a registry.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
#[cfg_attr(feature = "config", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "config", serde(default))]
pub struct RegistryConfig {
    /// Name used in error messages; `DefaultServiceRegistry` when unset.
    pub display_name: Option<String>,
    pub scope_validation: ScopeValidationConfig,
}

impl RegistryConfig {
    pub fn named(display_name: impl Into<String>) -> Self {
        RegistryConfig { display_name: Some(display_name.into()), ..Self::default() }
    }

    /// Defaults, with scope validation overridden by the environment.
    pub fn from_env() -> Self {
        RegistryConfig { display_name: None, scope_validation: ScopeValidationConfig::from_env() }
    }

    /// Parses a JSON document. Missing fields take their defaults.
    #[cfg(feature = "config")]
    pub fn from_json_str(json: &str) -> RegistryResult<Self> {
        serde_json::from_str(json)
            .map_err(|e| RegistryError::IllegalArgument(format!("Invalid registry configuration: {}", e)))
    }

    #[cfg(feature = "config")]
    pub fn from_json_file(path: impl AsRef<std::path::Path>) -> RegistryResult<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| {
            RegistryError::IllegalArgument(format!("Cannot read registry configuration {}: {}", path.display(), e))
        })?;
        Self::from_json_str(&content)
    }
}
