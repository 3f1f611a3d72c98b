use crossbeam_utils::thread;
use service_registry::{
    BoxError, DefaultServiceRegistry, ProviderClass, ServiceRegistrationProvider, ServiceRegistryExt, Stoppable,
};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Barrier};
use std::time::Duration;

const THREADS: usize = 8;

struct Expensive {
    stops: Arc<AtomicUsize>,
}

impl Stoppable for Expensive {
    fn stop(&self) -> Result<(), BoxError> {
        self.stops.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}
service_registry::concrete_service!(Expensive: dyn Stoppable);

struct Consumer {
    expensive: Arc<Expensive>,
}
service_registry::concrete_service!(Consumer);

struct SlowServices {
    created: Arc<AtomicUsize>,
    stops: Arc<AtomicUsize>,
}

impl ServiceRegistrationProvider for SlowServices {
    fn describe(class: &mut ProviderClass<Self>) {
        class.provides("createExpensive", |this: &Self, (): ()| {
            this.created.fetch_add(1, Ordering::SeqCst);
            std::thread::sleep(Duration::from_millis(20));
            Arc::new(Expensive { stops: Arc::clone(&this.stops) })
        });
        class.provides("createConsumer", |_: &Self, (expensive,): (Arc<Expensive>,)| Arc::new(Consumer { expensive }));
    }
}

fn slow_registry() -> (DefaultServiceRegistry, Arc<AtomicUsize>, Arc<AtomicUsize>) {
    let created = Arc::new(AtomicUsize::new(0));
    let stops = Arc::new(AtomicUsize::new(0));
    let registry = DefaultServiceRegistry::named("concurrent");
    registry
        .add_provider(SlowServices { created: Arc::clone(&created), stops: Arc::clone(&stops) })
        .unwrap();
    (registry, created, stops)
}

// ===== Singleton creation =====

#[test]
fn test_concurrent_first_access_creates_once() {
    let (registry, created, _) = slow_registry();
    let barrier = Barrier::new(THREADS);

    let results: Vec<Arc<Expensive>> = thread::scope(|s| {
        let handles: Vec<_> = (0..THREADS)
            .map(|_| {
                s.spawn(|_| {
                    barrier.wait();
                    registry.get::<Expensive>().unwrap()
                })
            })
            .collect();
        handles.into_iter().map(|h| h.join().unwrap()).collect()
    })
    .unwrap();

    assert_eq!(created.load(Ordering::SeqCst), 1);
    assert!(results.windows(2).all(|pair| Arc::ptr_eq(&pair[0], &pair[1])));
}

#[test]
fn test_concurrent_dependents_share_dependency() {
    let (registry, created, _) = slow_registry();
    let barrier = Barrier::new(THREADS);

    thread::scope(|s| {
        for i in 0..THREADS {
            let registry = &registry;
            let barrier = &barrier;
            s.spawn(move |_| {
                barrier.wait();
                if i % 2 == 0 {
                    registry.get::<Consumer>().unwrap();
                } else {
                    registry.get::<Expensive>().unwrap();
                }
            });
        }
    })
    .unwrap();

    assert_eq!(created.load(Ordering::SeqCst), 1);
    let consumer = registry.get::<Consumer>().unwrap();
    assert!(Arc::ptr_eq(&consumer.expensive, &registry.get::<Expensive>().unwrap()));
}

// ===== Closing =====

#[test]
fn test_concurrent_close_stops_once() {
    let (registry, _, stops) = slow_registry();
    registry.get::<Consumer>().unwrap();
    let barrier = Barrier::new(THREADS);

    thread::scope(|s| {
        for _ in 0..THREADS {
            s.spawn(|_| {
                barrier.wait();
                registry.close().unwrap();
            });
        }
    })
    .unwrap();

    assert!(registry.is_closed());
    assert_eq!(stops.load(Ordering::SeqCst), 1);
}

#[test]
fn test_concurrent_lookups_through_parents() {
    let parent = DefaultServiceRegistry::named("parent");
    let created = Arc::new(AtomicUsize::new(0));
    parent
        .add_provider(SlowServices { created: Arc::clone(&created), stops: Arc::new(AtomicUsize::new(0)) })
        .unwrap();
    let children: Vec<DefaultServiceRegistry> = (0..THREADS)
        .map(|i| DefaultServiceRegistry::with_parents(format!("child-{}", i), &[parent.clone()]))
        .collect();
    let barrier = Barrier::new(THREADS);

    thread::scope(|s| {
        for child in &children {
            let barrier = &barrier;
            s.spawn(move |_| {
                barrier.wait();
                assert_eq!(child.get_all::<Expensive>().unwrap().len(), 1);
            });
        }
    })
    .unwrap();

    assert_eq!(created.load(Ordering::SeqCst), 1);
}
