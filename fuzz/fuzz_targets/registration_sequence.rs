#![no_main]

use libfuzzer_sys::fuzz_target;
use service_registry::{
    DefaultServiceRegistry, ProviderClass, RegistryError, ServiceRegistrationProvider, ServiceRegistryExt,
};
use std::sync::Arc;

struct Counter(u8);
service_registry::concrete_service!(Counter);

struct Wrapper {
    inner: Arc<Counter>,
}
service_registry::concrete_service!(Wrapper);

struct WrapperServices;

impl ServiceRegistrationProvider for WrapperServices {
    fn describe(class: &mut ProviderClass<Self>) {
        class.provides("createWrapper", |_: &Self, (inner,): (Arc<Counter>,)| Arc::new(Wrapper { inner }));
    }
}

// Each byte is one operation against a single registry. The registry must
// reject registrations once used and lookups once closed, and never panic.
fuzz_target!(|data: &[u8]| {
    let registry = DefaultServiceRegistry::named("fuzz");
    let mut used = false;
    let mut closed = false;
    let mut counters = 0usize;
    let mut wrappers = 0usize;

    for &op in data.iter().take(64) {
        match op % 6 {
            0 => {
                let added = registry.add(Arc::new(Counter(op))).is_ok();
                assert_eq!(added, !used && !closed);
                if added {
                    counters += 1;
                }
            }
            1 => {
                let added = registry.add_provider(WrapperServices).is_ok();
                assert_eq!(added, !used && !closed);
                if added {
                    wrappers += 1;
                }
            }
            2 => {
                let result = registry.get::<Counter>();
                match (closed, counters) {
                    (true, _) => assert!(matches!(result, Err(RegistryError::IllegalState(_)))),
                    (false, 1) => assert!(result.is_ok()),
                    (false, 0) => assert!(matches!(result, Err(RegistryError::UnknownService { .. }))),
                    (false, _) => assert!(matches!(result, Err(RegistryError::Lookup { .. }))),
                }
                used = true;
            }
            3 => {
                if let Ok(all) = registry.get_all::<Counter>() {
                    assert!(!closed);
                    assert_eq!(all.len(), counters);
                }
                used = true;
            }
            4 => {
                let result = registry.find::<Wrapper>();
                if !closed && wrappers == 1 && counters == 1 {
                    let wrapper = result.ok().flatten();
                    assert!(wrapper.map(|w| w.inner.0 % 6 == 0).unwrap_or(false));
                }
                used = true;
            }
            _ => {
                let _ = registry.close();
                closed = true;
            }
        }
    }
});
