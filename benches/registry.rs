use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use service_registry::{DefaultServiceRegistry, ProviderClass, ServiceRegistrationProvider, ServiceRegistryExt};
use std::sync::Arc;

struct Config {
    values: Vec<u64>,
}
service_registry::concrete_service!(Config);

struct Cache {
    config: Arc<Config>,
}
service_registry::concrete_service!(Cache);

struct Handler {
    _cache: Arc<Cache>,
}
service_registry::concrete_service!(Handler);

struct AppServices;

impl ServiceRegistrationProvider for AppServices {
    fn describe(class: &mut ProviderClass<Self>) {
        class.provides("createConfig", |_: &Self, (): ()| Arc::new(Config { values: (0..1000).collect() }));
        class.provides("createCache", |_: &Self, (config,): (Arc<Config>,)| Arc::new(Cache { config }));
        class.provides("createHandler", |_: &Self, (cache,): (Arc<Cache>,)| Arc::new(Handler { _cache: cache }));
    }
}

// ===== Micro Benchmarks =====

fn bench_singleton_hit(c: &mut Criterion) {
    let registry = DefaultServiceRegistry::create([AppServices]).unwrap();
    let _ = registry.get::<Cache>().unwrap();

    c.bench_function("singleton_hit", |b| {
        b.iter(|| {
            let cache = registry.get::<Cache>().unwrap();
            black_box(cache.config.values.len());
        })
    });
}

fn bench_cold_creation(c: &mut Criterion) {
    c.bench_function("cold_dependency_chain", |b| {
        b.iter_batched(
            || DefaultServiceRegistry::create([AppServices]).unwrap(),
            |registry| {
                let handler = registry.get::<Handler>().unwrap();
                black_box(handler);
            },
            criterion::BatchSize::SmallInput,
        )
    });
}

fn bench_get_all(c: &mut Criterion) {
    let mut group = c.benchmark_group("get_all");
    for count in [1usize, 10, 100] {
        let registry = DefaultServiceRegistry::named("bench");
        for i in 0..count {
            registry.add(Arc::new(Config { values: vec![i as u64] })).unwrap();
        }
        group.bench_with_input(BenchmarkId::from_parameter(count), &registry, |b, registry| {
            b.iter(|| black_box(registry.get_all::<Config>().unwrap().len()))
        });
    }
    group.finish();
}

fn bench_parent_chain(c: &mut Criterion) {
    let mut group = c.benchmark_group("parent_chain_lookup");
    for depth in [1usize, 4, 16] {
        let mut registry = DefaultServiceRegistry::create([AppServices]).unwrap();
        for level in 0..depth {
            registry = DefaultServiceRegistry::with_parents(format!("level-{}", level), &[registry]);
        }
        let _ = registry.get::<Cache>().unwrap();
        group.bench_with_input(BenchmarkId::from_parameter(depth), &registry, |b, registry| {
            b.iter(|| black_box(registry.get::<Cache>().unwrap()))
        });
    }
    group.finish();
}

criterion_group!(benches, bench_singleton_hit, bench_cold_creation, bench_get_all, bench_parent_chain);
criterion_main!(benches);
