//! Memoized class facts.

use std::any::TypeId;
use std::fmt;
use std::sync::Arc;

use ahash::{AHashMap, AHashSet};
use once_cell::sync::OnceCell;
use parking_lot::RwLock;

use super::{Caster, ClassKind, Constructor, CreateFn, FactoryCapability};
use crate::error::RegistryResult;
use crate::key::ClassKey;
use crate::method::{classify, ProviderDetails, ServiceRegistrationProvider};

/// The `Factory<E>` interface a class implements, with its element type.
#[derive(Clone)]
pub(crate) struct FactoryView {
    pub(crate) interface: ClassKey,
    pub(crate) element: ClassKey,
    pub(crate) create: CreateFn,
}

/// Everything the registry needs to know about one class.
///
/// Built once per class and inspector from the class's [`ClassDescriptor`](super::ClassDescriptor)
/// and the details of its supertypes.
pub struct ClassDetails {
    key: ClassKey,
    kind: ClassKind,
    supertypes: Vec<ClassKey>,
    hierarchy: Vec<ClassKey>,
    hierarchy_ids: AHashSet<TypeId>,
    annotations: AHashSet<TypeId>,
    casts: AHashMap<TypeId, Caster>,
    own_factory: Option<FactoryCapability>,
    factory: OnceCell<Option<FactoryView>>,
    constructor: Option<Constructor>,
}

impl ClassDetails {
    /// The class these details describe.
    pub fn key(&self) -> ClassKey {
        self.key
    }

    /// The kind of the class.
    pub fn kind(&self) -> ClassKind {
        self.kind
    }

    /// The class followed by its transitive supertypes, depth first, without
    /// duplicates.
    pub fn hierarchy(&self) -> &[ClassKey] {
        &self.hierarchy
    }

    /// Whether `other` appears in this class's hierarchy.
    pub fn is_subtype_of(&self, other: ClassKey) -> bool {
        other == ClassKey::of::<super::markers::Object>() || self.hierarchy_ids.contains(&other.id())
    }

    /// Whether any class in the hierarchy carries `annotation`.
    pub fn has_annotation(&self, annotation: ClassKey) -> bool {
        self.annotations.contains(&annotation.id())
    }

    pub(crate) fn caster(&self, target: TypeId) -> Option<&Caster> {
        self.casts.get(&target)
    }

    pub(crate) fn constructor(&self) -> Option<&Constructor> {
        self.constructor.as_ref()
    }

    /// Finds the first `Factory<E>` interface in the hierarchy.
    pub(crate) fn factory(&self, inspector: &ClassInspector) -> Option<FactoryView> {
        self.factory
            .get_or_init(|| {
                if let Some(capability) = &self.own_factory {
                    return Some(FactoryView {
                        interface: self.key,
                        element: capability.element,
                        create: Arc::clone(&capability.create),
                    });
                }
                self.supertypes
                    .iter()
                    .find_map(|supertype| inspector.details(*supertype).factory(inspector))
            })
            .clone()
    }
}

impl fmt::Debug for ClassDetails {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClassDetails")
            .field("key", &self.key)
            .field("kind", &self.kind)
            .field("hierarchy", &self.hierarchy)
            .finish()
    }
}

/// Per-class cache of hierarchy, annotation and provider-method facts.
///
/// Entries are computed without holding a lock and inserted put-if-absent, so
/// concurrent callers may compute the same entry twice but all observe the
/// first one stored. One inspector is shared by a registry and every registry
/// created with it as first parent; [`clear`](Self::clear) resets it between
/// test runs.
#[derive(Default)]
pub struct ClassInspector {
    classes: RwLock<AHashMap<TypeId, Arc<ClassDetails>>>,
    providers: RwLock<AHashMap<TypeId, Arc<ProviderDetails>>>,
}

impl ClassInspector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the details of `key`, computing them on first use.
    pub fn details(&self, key: ClassKey) -> Arc<ClassDetails> {
        if let Some(details) = self.classes.read().get(&key.id()) {
            return Arc::clone(details);
        }
        let computed = Arc::new(self.compute(key));
        let mut classes = self.classes.write();
        Arc::clone(classes.entry(key.id()).or_insert(computed))
    }

    /// The transitive hierarchy of `key`, starting with `key` itself.
    pub fn hierarchy(&self, key: ClassKey) -> Vec<ClassKey> {
        self.details(key).hierarchy().to_vec()
    }

    /// Whether a value of class `from` can be used where `target` is expected.
    pub fn is_assignable(&self, target: ClassKey, from: ClassKey) -> bool {
        target == from || self.details(from).is_subtype_of(target)
    }

    /// Does the given class have the given annotation somewhere in its hierarchy?
    pub fn has_annotation(&self, class: ClassKey, annotation: ClassKey) -> bool {
        self.details(class).has_annotation(annotation)
    }

    /// Number of classes currently cached.
    pub fn cached_classes(&self) -> usize {
        self.classes.read().len()
    }

    /// Drops every cached entry.
    pub fn clear(&self) {
        self.classes.write().clear();
        self.providers.write().clear();
    }

    /// Classified methods of the provider type `P`. Failed classifications
    /// are not cached.
    pub(crate) fn provider_details<P: ServiceRegistrationProvider>(&self) -> RegistryResult<Arc<ProviderDetails>> {
        let id = TypeId::of::<P>();
        if let Some(details) = self.providers.read().get(&id) {
            return Ok(Arc::clone(details));
        }
        let computed = Arc::new(classify::<P>()?);
        let mut providers = self.providers.write();
        Ok(Arc::clone(providers.entry(id).or_insert(computed)))
    }

    fn compute(&self, key: ClassKey) -> ClassDetails {
        let descriptor = key.describe();

        let mut hierarchy = vec![key];
        let mut hierarchy_ids = AHashSet::new();
        hierarchy_ids.insert(key.id());
        let mut annotations: AHashSet<TypeId> = descriptor.annotations.iter().map(|a| a.id()).collect();
        let mut casts: AHashMap<TypeId, Caster> = AHashMap::new();
        let mut supertypes = Vec::with_capacity(descriptor.supertypes.len());

        for supertype in &descriptor.supertypes {
            supertypes.push(supertype.key);
            let details = self.details(supertype.key);
            for class in details.hierarchy() {
                if hierarchy_ids.insert(class.id()) {
                    hierarchy.push(*class);
                }
            }
            annotations.extend(details.annotations.iter().copied());

            let Some(cast) = &supertype.cast else { continue };
            casts.entry(supertype.key.id()).or_insert_with(|| Arc::clone(cast));
            for (target, further) in &details.casts {
                if casts.contains_key(target) {
                    continue;
                }
                let first = Arc::clone(cast);
                let second = Arc::clone(further);
                let composed: Caster = Arc::new(move |value| first(value).and_then(|mid| second(&mid)));
                casts.insert(*target, composed);
            }
        }

        ClassDetails {
            key,
            kind: descriptor.kind,
            supertypes,
            hierarchy,
            hierarchy_ids,
            annotations,
            casts,
            own_factory: descriptor.factory,
            factory: OnceCell::new(),
            constructor: descriptor.constructor,
        }
    }
}

impl fmt::Debug for ClassInspector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClassInspector")
            .field("classes", &self.classes.read().len())
            .field("providers", &self.providers.read().len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::instance::{Instance, RawValue};

    trait Animal: Send + Sync {
        fn name(&self) -> &'static str;
    }
    trait Pet: Animal {}
    crate::interface_service!(dyn Animal);
    crate::interface_service!(dyn Pet: dyn Animal);

    struct Dog;
    impl Animal for Dog {
        fn name(&self) -> &'static str {
            "dog"
        }
    }
    impl Pet for Dog {}
    crate::concrete_service!(Dog: dyn Pet);

    struct Marker;
    crate::annotation_type!(Marker);

    struct Tagged;
    impl crate::ServiceType for Tagged {
        fn describe() -> super::super::ClassDescriptor {
            super::super::ClassBuilder::<Tagged>::concrete().annotated::<Marker>().build()
        }
    }

    #[test]
    fn hierarchy_is_transitive_and_ordered() {
        let inspector = ClassInspector::new();
        let hierarchy = inspector.hierarchy(ClassKey::of::<Dog>());
        assert_eq!(
            hierarchy,
            vec![ClassKey::of::<Dog>(), ClassKey::of::<dyn Pet>(), ClassKey::of::<dyn Animal>()]
        );
        assert!(inspector.is_assignable(ClassKey::of::<dyn Animal>(), ClassKey::of::<Dog>()));
        assert!(!inspector.is_assignable(ClassKey::of::<Dog>(), ClassKey::of::<dyn Animal>()));
    }

    #[test]
    fn casts_compose_through_supertypes() {
        let inspector = ClassInspector::new();
        let details = inspector.details(ClassKey::of::<Dog>());
        let instance = Instance::new(details, RawValue::new(Arc::new(Dog)));
        let animal = instance.cast::<dyn Animal>().map(|a| a.name());
        assert_eq!(animal, Some("dog"));
    }

    #[test]
    fn annotations_are_found_in_hierarchy() {
        let inspector = ClassInspector::new();
        assert!(inspector.has_annotation(ClassKey::of::<Tagged>(), ClassKey::of::<Marker>()));
        assert!(!inspector.has_annotation(ClassKey::of::<Dog>(), ClassKey::of::<Marker>()));
    }

    #[test]
    fn details_are_shared_until_cleared() {
        let inspector = ClassInspector::new();
        let first = inspector.details(ClassKey::of::<Dog>());
        let second = inspector.details(ClassKey::of::<Dog>());
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(inspector.cached_classes(), 3);

        inspector.clear();
        assert_eq!(inspector.cached_classes(), 0);
        let third = inspector.details(ClassKey::of::<Dog>());
        assert!(!Arc::ptr_eq(&first, &third));
    }
}
