use std::fmt;
use std::sync::Arc;

use super::{Service, ServiceProvider, ServiceVisitor};
use crate::access::ServiceAccessToken;
use crate::error::RegistryResult;
use crate::internal::CompositeStoppable;
use crate::key::{ClassKey, TypeSpec};
use crate::registry::RegistryInner;

/// Tries each delegate in order: the first match wins single lookups, every
/// delegate is visited for collect-all lookups.
pub(crate) struct CompositeServiceProvider {
    providers: Vec<Arc<dyn ServiceProvider>>,
}

impl CompositeServiceProvider {
    pub(crate) fn new(providers: Vec<Arc<dyn ServiceProvider>>) -> Self {
        CompositeServiceProvider { providers }
    }
}

impl ServiceProvider for CompositeServiceProvider {
    fn get_service(&self, spec: &TypeSpec, token: Option<&ServiceAccessToken>) -> RegistryResult<Option<Arc<dyn Service>>> {
        for provider in &self.providers {
            if let Some(service) = provider.get_service(spec, token)? {
                return Ok(Some(service));
            }
        }
        Ok(None)
    }

    fn get_factory(&self, element: ClassKey, token: Option<&ServiceAccessToken>) -> RegistryResult<Option<Arc<dyn Service>>> {
        for provider in &self.providers {
            if let Some(service) = provider.get_factory(element, token)? {
                return Ok(Some(service));
            }
        }
        Ok(None)
    }

    fn get_all(&self, class: ClassKey, token: Option<&ServiceAccessToken>, visitor: &mut ServiceVisitor) -> RegistryResult<()> {
        for provider in &self.providers {
            provider.get_all(class, token, visitor)?;
        }
        Ok(())
    }

    fn stop(&self) -> RegistryResult<()> {
        let mut stoppable = CompositeStoppable::new();
        for provider in &self.providers {
            stoppable.stop_provider(provider.as_ref());
        }
        stoppable.finish()
    }
}

/// Read-only view of a parent registry. Lookups are forwarded to the parent's
/// services; stopping is a no-op, since parents outlive their children.
pub(crate) struct ParentServices {
    parent: Arc<RegistryInner>,
}

impl ParentServices {
    pub(crate) fn new(parent: Arc<RegistryInner>) -> Self {
        ParentServices { parent }
    }
}

impl ServiceProvider for ParentServices {
    fn get_service(&self, spec: &TypeSpec, token: Option<&ServiceAccessToken>) -> RegistryResult<Option<Arc<dyn Service>>> {
        self.parent.all_services().get_service(spec, token)
    }

    fn get_factory(&self, element: ClassKey, token: Option<&ServiceAccessToken>) -> RegistryResult<Option<Arc<dyn Service>>> {
        self.parent.all_services().get_factory(element, token)
    }

    fn get_all(&self, class: ClassKey, token: Option<&ServiceAccessToken>, visitor: &mut ServiceVisitor) -> RegistryResult<()> {
        self.parent.all_services().get_all(class, token, visitor)
    }

    fn stop(&self) -> RegistryResult<()> {
        Ok(())
    }
}

impl fmt::Debug for ParentServices {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("ParentServices").field(&self.parent.name()).finish()
    }
}
