use std::sync::Arc;

use super::{Service, SingletonService};
use crate::class::ClassInspector;
use crate::error::RegistryResult;
use crate::instance::{Instance, InstanceList, RawValue};
use crate::key::ClassKey;

/// The pseudo-service answering a `List<T>` lookup.
pub(crate) struct CollectionService {
    element: ClassKey,
    instance: Instance,
    providers: Vec<Arc<dyn Service>>,
}

impl CollectionService {
    pub(crate) fn new(
        element: ClassKey,
        instances: Vec<Instance>,
        providers: Vec<Arc<dyn Service>>,
        inspector: &ClassInspector,
    ) -> Self {
        let list = Arc::new(InstanceList::new(instances));
        let instance = Instance::new(inspector.details(ClassKey::of::<InstanceList>()), RawValue::new(list));
        CollectionService { element, instance, providers }
    }
}

impl Service for CollectionService {
    fn get(&self) -> RegistryResult<Instance> {
        Ok(self.instance.clone())
    }

    fn display_name(&self) -> String {
        format!("services with type {}", self.element)
    }

    fn required_by(&self, dependent: &Arc<SingletonService>) {
        for provider in &self.providers {
            provider.required_by(dependent);
        }
    }
}
