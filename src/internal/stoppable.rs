//! Failure-collecting shutdown sweep.

use crate::error::{BoxError, RegistryError, RegistryResult};
use crate::instance::Instance;
use crate::provider::ServiceProvider;
use crate::traits::Stoppable;

/// Stops a sequence of providers and instances, collecting every failure
/// instead of stopping at the first one.
///
/// Failures that are themselves aggregated [`RegistryError::Stop`] errors are
/// flattened, so a whole shutdown sweep reports one flat list.
#[derive(Default)]
pub(crate) struct CompositeStoppable {
    failures: Vec<BoxError>,
}

impl CompositeStoppable {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Stops a provider, recording its failure if any.
    pub(crate) fn stop_provider(&mut self, provider: &dyn ServiceProvider) {
        if let Err(error) = provider.stop() {
            self.record(error);
        }
    }

    /// Stops an instance if it can be viewed as [`Stoppable`].
    pub(crate) fn stop_instance(&mut self, instance: &Instance) {
        let Some(stoppable) = instance.cast::<dyn Stoppable>() else {
            return;
        };
        if let Err(failure) = stoppable.stop() {
            tracing::warn!(class = %instance.class(), error = %failure, "service failed to stop");
            self.failures.push(failure);
        }
    }

    fn record(&mut self, error: RegistryError) {
        match error {
            RegistryError::Stop { failures } => self.failures.extend(failures),
            other => self.failures.push(Box::new(other)),
        }
    }

    /// Ends the sweep, failing if anything failed to stop.
    pub(crate) fn finish(self) -> RegistryResult<()> {
        if self.failures.is_empty() {
            Ok(())
        } else {
            Err(RegistryError::Stop { failures: self.failures })
        }
    }
}
