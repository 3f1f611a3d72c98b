use parking_lot::Mutex;
use service_registry::{
    DefaultServiceRegistry, ProviderBean, ProviderClass, ServiceRegistrationProvider, ServiceRegistry,
    ServiceRegistryExt,
};
use std::sync::Arc;

#[derive(Debug)]
struct Greeting(String);
service_registry::concrete_service!(Greeting);

struct Secret(&'static str);
service_registry::concrete_service!(Secret);

struct User {
    secret: Arc<Secret>,
}
service_registry::concrete_service!(User);

#[derive(Debug)]
struct Auditor;
service_registry::concrete_service!(Auditor);

// ===== Providers =====

struct Loud;
impl ServiceRegistrationProvider for Loud {
    fn describe(class: &mut ProviderClass<Self>) {
        class.provides("decorateGreeting", |_: &Self, (inner,): (Arc<Greeting>,)| {
            Arc::new(Greeting(inner.0.to_uppercase()))
        });
    }
}

struct Exclaim;
impl ServiceRegistrationProvider for Exclaim {
    fn describe(class: &mut ProviderClass<Self>) {
        class.provides("decorateGreeting", |_: &Self, (inner,): (Arc<Greeting>,)| {
            Arc::new(Greeting(format!("{}!", inner.0)))
        });
    }
}

struct UserServices;
impl ServiceRegistrationProvider for UserServices {
    fn describe(class: &mut ProviderClass<Self>) {
        class.provides("createSecret", |_: &Self, (): ()| Arc::new(Secret("hunter2"))).private();
        class.provides("createUser", |_: &Self, (secret,): (Arc<Secret>,)| Arc::new(User { secret }));
    }
}

struct SecretServices;
impl ServiceRegistrationProvider for SecretServices {
    fn describe(class: &mut ProviderClass<Self>) {
        class.provides("createSecret", |_: &Self, (): ()| Arc::new(Secret("shared"))).private();
    }
}

struct UserOnly;
impl ServiceRegistrationProvider for UserOnly {
    fn describe(class: &mut ProviderClass<Self>) {
        class.provides("createUser", |_: &Self, (secret,): (Arc<Secret>,)| Arc::new(User { secret }));
    }
}

struct SealedServices {
    seen: Mutex<Option<&'static str>>,
}
impl ServiceRegistrationProvider for SealedServices {
    fn describe(class: &mut ProviderClass<Self>) {
        class.provides("createSecret", |_: &Self, (): ()| Arc::new(Secret("sealed"))).private();
        class.method("configure", |this: &Self, (secret,): (Arc<Secret>,)| {
            *this.seen.lock() = Some(secret.0);
        });
    }
}

struct Banner(String);
service_registry::concrete_service!(Banner);

struct QuietDecoration;
impl ServiceRegistrationProvider for QuietDecoration {
    fn describe(class: &mut ProviderClass<Self>) {
        class
            .provides("decorateGreeting", |_: &Self, (inner,): (Arc<Greeting>,)| {
                Arc::new(Greeting(inner.0.to_lowercase()))
            })
            .private();
        class.provides("createBanner", |_: &Self, (greeting,): (Arc<Greeting>,)| {
            Arc::new(Banner(format!("[{}]", greeting.0)))
        });
    }
}

struct AuditorServices;
impl ServiceRegistrationProvider for AuditorServices {
    fn describe(class: &mut ProviderClass<Self>) {
        class.provides("createAuditor", |_: &Self, (_secret,): (Arc<Secret>,)| Arc::new(Auditor));
    }
}

fn greeting(registry: &DefaultServiceRegistry) -> String {
    registry.get::<Greeting>().unwrap().0.clone()
}

// ===== Parent delegation =====

#[test]
fn test_child_sees_parent_services() {
    let parent = DefaultServiceRegistry::named("parent");
    parent.add(Arc::new(Greeting("from parent".into()))).unwrap();
    let child = DefaultServiceRegistry::with_parents("child", &[parent.clone()]);

    assert_eq!(greeting(&child), "from parent");
    assert!(Arc::ptr_eq(&child.get::<Greeting>().unwrap(), &parent.get::<Greeting>().unwrap()));
}

#[test]
fn test_own_services_win_over_parents() {
    let parent = DefaultServiceRegistry::named("parent");
    parent.add(Arc::new(Greeting("from parent".into()))).unwrap();
    let child = DefaultServiceRegistry::with_parents("child", &[parent.clone()]);
    child.add(Arc::new(Greeting("from child".into()))).unwrap();

    assert_eq!(greeting(&child), "from child");
    assert_eq!(greeting(&parent), "from parent");
    assert_eq!(child.get_all::<Greeting>().unwrap().len(), 2);
}

#[test]
fn test_parents_are_searched_in_order() {
    let first = DefaultServiceRegistry::named("first");
    first.add(Arc::new(Greeting("first".into()))).unwrap();
    let second = DefaultServiceRegistry::named("second");
    second.add(Arc::new(Greeting("second".into()))).unwrap();

    let child = DefaultServiceRegistry::with_parents("child", &[first, second]);
    assert_eq!(greeting(&child), "first");

    let mut all: Vec<String> = child.get_all::<Greeting>().unwrap().iter().map(|g| g.0.clone()).collect();
    all.sort();
    assert_eq!(all, vec!["first".to_string(), "second".to_string()]);
}

#[test]
fn test_builder_shares_the_first_parents_inspector() {
    let parent = DefaultServiceRegistry::named("parent");
    let child = DefaultServiceRegistry::builder().name("child").parent(&parent).build().unwrap();
    assert!(Arc::ptr_eq(parent.inspector(), child.inspector()));
}

// ===== Decorators =====

#[test]
fn test_decorator_wraps_parent_service() {
    let parent = DefaultServiceRegistry::named("parent");
    parent.add(Arc::new(Greeting("hello".into()))).unwrap();
    let child = DefaultServiceRegistry::with_parents("child", &[parent.clone()]);
    child.add_provider(Loud).unwrap();

    assert_eq!(greeting(&child), "HELLO");
    assert_eq!(greeting(&parent), "hello");

    // The decorated original is not reported next to its decorator.
    let all = child.get_all::<Greeting>().unwrap();
    assert_eq!(all.len(), 1);
    assert_eq!(all[0].0, "HELLO");
}

#[test]
fn test_decorators_stack_across_generations() {
    let root = DefaultServiceRegistry::named("root");
    root.add(Arc::new(Greeting("hi".into()))).unwrap();
    let middle = DefaultServiceRegistry::with_parents("middle", &[root]);
    middle.add_provider(Loud).unwrap();
    let leaf = DefaultServiceRegistry::with_parents("leaf", &[middle.clone()]);
    leaf.add_provider(Exclaim).unwrap();

    assert_eq!(greeting(&leaf), "HI!");
    assert_eq!(greeting(&middle), "HI");
}

#[test]
fn test_private_decorator_hides_the_decorated_service() {
    let parent = DefaultServiceRegistry::named("parent");
    parent.add(Arc::new(Greeting("Hello".into()))).unwrap();
    let child = DefaultServiceRegistry::with_parents("child", &[parent.clone()]);
    child.add_provider(QuietDecoration).unwrap();

    assert_eq!(child.get::<Banner>().unwrap().0, "[hello]");

    // The decorator is private and the original it replaces is excluded.
    assert!(child.get_all::<Greeting>().unwrap().is_empty());
    assert_eq!(parent.get_all::<Greeting>().unwrap().len(), 1);
}

#[test]
fn test_decorator_without_service_in_parents() {
    let parent = DefaultServiceRegistry::named("parent");
    let child = DefaultServiceRegistry::with_parents("child", &[parent]);
    child.add_provider(Loud).unwrap();

    let error = child.get::<Greeting>().unwrap_err();
    assert_eq!(
        error.to_string(),
        "Cannot create service of type Greeting using method Loud.decorateGreeting() as required service of type Greeting for parameter #1 is not available in parent registries."
    );
}

// ===== Private services =====

#[test]
fn test_private_services_are_visible_to_their_provider_only() {
    let registry = DefaultServiceRegistry::named("test");
    registry.add_provider(UserServices).unwrap().add_provider(AuditorServices).unwrap();

    assert_eq!(registry.get::<User>().unwrap().secret.0, "hunter2");
    assert!(registry.find::<Secret>().unwrap().is_none());
    assert!(registry.get_all::<Secret>().unwrap().is_empty());

    let error = registry.get::<Auditor>().unwrap_err();
    assert_eq!(
        error.to_string(),
        "Cannot create service of type Auditor using method AuditorServices.createAuditor() as required service of type Secret for parameter #1 is not available."
    );
}

#[test]
fn test_configure_methods_see_their_private_services() {
    let registry = DefaultServiceRegistry::named("test");
    let provider = Arc::new(SealedServices { seen: Mutex::new(None) });
    registry.add_provider(ProviderBean::shared(Arc::clone(&provider))).unwrap();

    assert_eq!(*provider.seen.lock(), Some("sealed"));
    assert!(registry.find::<Secret>().unwrap().is_none());
}

#[test]
fn test_builder_providers_share_a_token() {
    let registry = DefaultServiceRegistry::builder()
        .name("built")
        .provider(SecretServices)
        .provider(UserOnly)
        .build()
        .unwrap();

    assert_eq!(registry.get::<User>().unwrap().secret.0, "shared");
    assert!(registry.find::<Secret>().unwrap().is_none());
}

// ===== Closing =====

#[test]
fn test_closing_a_child_leaves_parents_open() {
    let parent = DefaultServiceRegistry::named("parent");
    parent.add(Arc::new(Greeting("still here".into()))).unwrap();
    let child = DefaultServiceRegistry::with_parents("child", &[parent.clone()]);
    assert_eq!(greeting(&child), "still here");

    child.close().unwrap();
    assert!(child.is_closed());
    assert!(!parent.is_closed());
    assert_eq!(greeting(&parent), "still here");
    assert_eq!(child.get::<Greeting>().unwrap_err().to_string(), "child has been closed.");
}
