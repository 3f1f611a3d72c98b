#![no_main]

use libfuzzer_sys::fuzz_target;
use service_registry::{DefaultServiceRegistry, ServiceRegistryExt};
use std::sync::Arc;

struct Level(usize);
service_registry::concrete_service!(Level);

// Builds a forest of registries: each byte creates a registry whose parents
// are picked from the ones created before it. Every registry must see its own
// level and the levels of all of its ancestors.
fuzz_target!(|data: &[u8]| {
    let mut registries: Vec<(DefaultServiceRegistry, Vec<usize>)> = Vec::new();

    for (index, &byte) in data.iter().take(16).enumerate() {
        let mut parents = Vec::new();
        if !registries.is_empty() {
            let first = byte as usize % registries.len();
            parents.push(first);
            if byte & 0x80 != 0 {
                let second = (byte as usize / 3) % registries.len();
                if second != first {
                    parents.push(second);
                }
            }
        }

        let handles: Vec<DefaultServiceRegistry> = parents.iter().map(|&p| registries[p].0.clone()).collect();
        let registry = DefaultServiceRegistry::with_parents(format!("r{}", index), &handles);
        if registry.add(Arc::new(Level(index))).is_err() {
            return;
        }

        let mut ancestors: Vec<usize> = vec![index];
        for &p in &parents {
            ancestors.extend(registries[p].1.iter().copied());
        }
        ancestors.sort_unstable();
        ancestors.dedup();
        registries.push((registry, ancestors));
    }

    for (registry, ancestors) in &registries {
        let mut seen: Vec<usize> = match registry.get_all::<Level>() {
            Ok(all) => all.iter().map(|level| level.0).collect(),
            Err(_) => continue,
        };
        seen.sort_unstable();
        assert_eq!(&seen, ancestors);
    }
});
