use service_registry::{
    markers, ClassBuilder, ClassDescriptor, ClassKey, DefaultServiceRegistry, Factory, InstanceList, ProviderClass,
    RegistryError, ServiceRegistration, ServiceRegistrationProvider, ServiceRegistry, ServiceRegistryExt,
    ServiceType, TypeSpec,
};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

// ===== Test Services =====

struct Clock {
    name: &'static str,
}
service_registry::concrete_service!(Clock);

trait Greeter: Send + Sync {
    fn greet(&self) -> String;
}
service_registry::interface_service!(dyn Greeter);

struct English;
impl Greeter for English {
    fn greet(&self) -> String {
        "hello".to_string()
    }
}
service_registry::concrete_service!(English: dyn Greeter);

struct French;
impl Greeter for French {
    fn greet(&self) -> String {
        "bonjour".to_string()
    }
}
service_registry::concrete_service!(French: dyn Greeter);

struct Chorus {
    greeters: Vec<Arc<dyn Greeter>>,
}
service_registry::concrete_service!(Chorus);

struct Scheduler {
    clock: Arc<Clock>,
}

impl ServiceType for Scheduler {
    fn describe() -> ClassDescriptor {
        ClassBuilder::<Scheduler>::concrete()
            .constructor(|(clock,): (Arc<Clock>,)| Scheduler { clock })
            .build()
    }
}

struct Widget {
    serial: usize,
}
service_registry::concrete_service!(Widget);

struct WidgetFactory {
    next: AtomicUsize,
}

impl Factory<Widget> for WidgetFactory {
    fn create(&self) -> Arc<Widget> {
        Arc::new(Widget { serial: self.next.fetch_add(1, Ordering::SeqCst) })
    }
}
service_registry::concrete_service!(WidgetFactory: dyn Factory<Widget>);

struct Gadget;
service_registry::concrete_service!(Gadget);

// ===== Providers =====

struct GreeterServices;

impl ServiceRegistrationProvider for GreeterServices {
    fn describe(class: &mut ProviderClass<Self>) {
        class.provides("createEnglish", |_: &Self, (): ()| -> Arc<dyn Greeter> { Arc::new(English) });
        class.provides("createFrench", |_: &Self, (): ()| -> Arc<dyn Greeter> { Arc::new(French) });
        class.provides("createChorus", |_: &Self, (greeters,): (Vec<Arc<dyn Greeter>>,)| {
            Arc::new(Chorus { greeters })
        });
    }
}

struct CountingServices {
    created: Arc<AtomicUsize>,
}

impl ServiceRegistrationProvider for CountingServices {
    fn describe(class: &mut ProviderClass<Self>) {
        class.provides("createClock", |this: &Self, (): ()| {
            this.created.fetch_add(1, Ordering::SeqCst);
            Arc::new(Clock { name: "counted" })
        });
        class.provides("createScheduler", |_: &Self, (clock,): (Arc<Clock>,)| Arc::new(Scheduler { clock }));
    }
}

struct FactoryServices;

impl ServiceRegistrationProvider for FactoryServices {
    fn describe(class: &mut ProviderClass<Self>) {
        class.provides("createWidgetFactory", |_: &Self, (): ()| {
            Arc::new(WidgetFactory { next: AtomicUsize::new(1) })
        });
    }
}

struct ConfiguringServices;

impl ServiceRegistrationProvider for ConfiguringServices {
    fn describe(class: &mut ProviderClass<Self>) {
        class.method("configure", |_: &Self, (registration,): (ServiceRegistration,)| {
            registration.add_instance::<Clock, Clock>(Arc::new(Clock { name: "configured" }))?;
            registration.add_type::<Scheduler>()
        });
    }
}

struct Rogue;

impl ServiceRegistrationProvider for Rogue {
    fn describe(class: &mut ProviderClass<Self>) {
        class.provides("createRegistry", |_: &Self, (): ()| -> Arc<dyn ServiceRegistry> {
            Arc::new(DefaultServiceRegistry::new())
        });
    }
}

// ===== Fixed instances =====

#[test]
fn test_fixed_instance_is_returned_as_is() {
    let registry = DefaultServiceRegistry::named("test");
    let clock = Arc::new(Clock { name: "fixed" });
    registry.add(Arc::clone(&clock)).unwrap();

    let found = registry.get::<Clock>().unwrap();
    assert!(Arc::ptr_eq(&clock, &found));
    assert_eq!(found.name, "fixed");
    assert!(Arc::ptr_eq(&found, &registry.find::<Clock>().unwrap().unwrap()));
}

#[test]
fn test_instance_registered_under_interface() {
    let registry = DefaultServiceRegistry::named("test");
    registry.add_as::<dyn Greeter, English>(Arc::new(English)).unwrap();

    assert_eq!(registry.get::<dyn Greeter>().unwrap().greet(), "hello");
    // Only the declared type is visible.
    assert!(registry.find::<English>().unwrap().is_none());
}

#[test]
fn test_unknown_service() {
    let registry = DefaultServiceRegistry::named("test");
    assert!(registry.find::<Clock>().unwrap().is_none());

    match registry.get::<Clock>() {
        Err(RegistryError::UnknownService { service_type, message }) => {
            assert_eq!(service_type, "Clock");
            assert_eq!(message, "No service of type Clock available in test.");
        }
        other => panic!("unexpected result: {:?}", other.map(|_| ())),
    }
}

// ===== Provider methods =====

#[test]
fn test_factory_methods_create_singletons_lazily() {
    let created = Arc::new(AtomicUsize::new(0));
    let registry = DefaultServiceRegistry::named("test");
    registry.add_provider(CountingServices { created: Arc::clone(&created) }).unwrap();
    assert_eq!(created.load(Ordering::SeqCst), 0);

    let scheduler = registry.get::<Scheduler>().unwrap();
    let clock = registry.get::<Clock>().unwrap();
    assert!(Arc::ptr_eq(&scheduler.clock, &clock));
    assert!(Arc::ptr_eq(&scheduler, &registry.get::<Scheduler>().unwrap()));
    assert_eq!(created.load(Ordering::SeqCst), 1);
}

#[test]
fn test_collect_all_lookups() {
    let registry = DefaultServiceRegistry::create([GreeterServices]).unwrap();

    let mut greetings: Vec<String> = registry.get_all::<dyn Greeter>().unwrap().iter().map(|g| g.greet()).collect();
    greetings.sort();
    assert_eq!(greetings, vec!["bonjour".to_string(), "hello".to_string()]);

    let chorus = registry.get::<Chorus>().unwrap();
    assert_eq!(chorus.greeters.len(), 2);

    let list = registry.get_any(&TypeSpec::list_of(TypeSpec::of::<dyn Greeter>())).unwrap();
    let list = list.cast::<InstanceList>().unwrap();
    assert_eq!(list.len(), 2);
    for greeter in list.cast_all::<dyn Greeter>() {
        assert!(chorus.greeters.iter().any(|g| Arc::ptr_eq(g, &greeter)));
    }

    assert!(registry.get_all::<Clock>().unwrap().is_empty());
}

#[test]
fn test_get_all_returns_each_instance_once() {
    let registry = DefaultServiceRegistry::named("test");
    let english = Arc::new(English);
    registry.add_as::<dyn Greeter, English>(Arc::clone(&english)).unwrap();
    registry.add(Arc::clone(&english)).unwrap();

    let all = registry.get_all::<dyn Greeter>().unwrap();
    assert_eq!(all.len(), 1);
}

#[test]
fn test_configure_methods_register_services() {
    let registry = DefaultServiceRegistry::named("test");
    registry.add_provider(ConfiguringServices).unwrap();

    let scheduler = registry.get::<Scheduler>().unwrap();
    assert_eq!(scheduler.clock.name, "configured");
}

#[test]
fn test_registration_actions() {
    let registry = DefaultServiceRegistry::named("test");
    registry
        .register(&|registration: &ServiceRegistration| {
            registration.add_instance::<Clock, Clock>(Arc::new(Clock { name: "action" }))?;
            registration.add_type::<Scheduler>()
        })
        .unwrap();

    assert_eq!(registry.get::<Scheduler>().unwrap().clock.name, "action");
}

// ===== Factories =====

#[test]
fn test_factory_lookup() {
    let registry = DefaultServiceRegistry::named("test");
    registry.add_provider(FactoryServices).unwrap();

    assert_eq!(registry.new_instance::<Widget>().unwrap().serial, 1);
    let factory = registry.get_factory::<Widget>().unwrap();
    assert_eq!(factory.create().unwrap().serial, 2);

    let by_spec = registry.get_any(&TypeSpec::factory_of(TypeSpec::of::<Widget>())).unwrap();
    assert!(by_spec.same_as(factory.instance()));

    let error = registry.get_factory::<Gadget>().unwrap_err();
    assert_eq!(error.to_string(), "No factory for objects of type Gadget available in test.");
}

// ===== The registry itself =====

#[test]
fn test_registry_provides_itself() {
    let registry = DefaultServiceRegistry::named("test");
    let itself = registry.get::<dyn ServiceRegistry>().unwrap();
    assert_eq!(itself.display_name(), "test");

    let error = DefaultServiceRegistry::named("test").add_provider(Rogue).unwrap_err();
    assert!(matches!(error, RegistryError::IllegalArgument(_)));
    assert_eq!(
        error.to_string(),
        "Cannot define a service of type ServiceRegistry: Service ServiceRegistry via Rogue.createRegistry()"
    );
}

// ===== Invalid lookups =====

#[test]
fn test_invalid_lookup_types() {
    let registry = DefaultServiceRegistry::named("test");

    let object = registry.get_all_any(ClassKey::of::<markers::Object>()).unwrap_err();
    assert_eq!(object.to_string(), "Locating services with type Object is not supported.");

    let array = registry.find_any(&TypeSpec::of::<[Clock]>()).unwrap_err();
    assert_eq!(array.to_string(), "Locating services with array type is not supported.");

    let wildcard = registry.find_any(&TypeSpec::list_of(TypeSpec::super_of(TypeSpec::of::<Clock>()))).unwrap_err();
    assert_eq!(wildcard.to_string(), "Locating services with type ? super Clock is not supported.");
}
