//! Provider methods: declaration, injection, invocation and classification.

mod classifier;
mod inject;
mod invoker;
mod provider;

pub use classifier::{MethodKind, ProviderDetails, RelevantMethods, ServiceMethod};
pub use inject::{Inject, InjectArgs, MethodReturn};
pub use invoker::MethodInvoker;
pub use provider::{MethodOptions, ProviderBean, ProviderClass, ServiceRegistrationProvider};

pub(crate) use classifier::classify;
