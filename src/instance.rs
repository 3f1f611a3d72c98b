//! Realized service values.

use std::fmt;
use std::sync::Arc;

use crate::class::{AnyArc, ClassDetails};
use crate::key::ClassKey;

/// An erased `Arc<K>` together with the address identifying the value.
///
/// Opaque outside the crate; produced by provider methods and constructors.
#[derive(Clone)]
pub struct RawValue {
    value: AnyArc,
    addr: usize,
}

impl RawValue {
    pub(crate) fn new<K: ?Sized + Send + Sync + 'static>(value: Arc<K>) -> Self {
        let addr = Arc::as_ptr(&value) as *const () as usize;
        RawValue { value: Arc::new(value), addr }
    }

    pub(crate) fn value(&self) -> &AnyArc {
        &self.value
    }
}

/// A realized service: the value plus the class it was produced as.
///
/// Two instances are the same service value iff [`same_as`](Self::same_as)
/// holds, which compares the address of the underlying allocation. Viewing an
/// instance as one of its supertypes does not change that address.
#[derive(Clone)]
pub struct Instance {
    details: Arc<ClassDetails>,
    raw: RawValue,
}

impl Instance {
    pub(crate) fn new(details: Arc<ClassDetails>, raw: RawValue) -> Self {
        Instance { details, raw }
    }

    /// The class the instance was produced as.
    pub fn class(&self) -> ClassKey {
        self.details.key()
    }

    /// The details of [`class`](Self::class).
    pub fn details(&self) -> &Arc<ClassDetails> {
        &self.details
    }

    /// Address of the underlying allocation.
    pub fn addr(&self) -> usize {
        self.raw.addr
    }

    /// Whether both instances refer to the same value.
    pub fn same_as(&self, other: &Instance) -> bool {
        self.raw.addr == other.raw.addr
    }

    /// Views the instance as `T`, if its class is `T` or declares a castable
    /// supertype `T`.
    pub fn cast<T: ?Sized + Send + Sync + 'static>(&self) -> Option<Arc<T>> {
        if let Some(value) = self.raw.value.downcast_ref::<Arc<T>>() {
            return Some(Arc::clone(value));
        }
        let cast = self.details.caster(std::any::TypeId::of::<T>())?;
        cast(&self.raw.value)?.downcast_ref::<Arc<T>>().cloned()
    }

    /// Views the instance as the erased `Arc` of `target`.
    pub(crate) fn cast_erased(&self, target: ClassKey) -> Option<AnyArc> {
        if target == self.class() {
            return Some(Arc::clone(self.raw.value()));
        }
        self.details.caster(target.id()).and_then(|cast| cast(&self.raw.value))
    }
}

impl fmt::Debug for Instance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Instance")
            .field("class", &self.class())
            .field("addr", &format_args!("{:#x}", self.raw.addr))
            .finish()
    }
}

/// The value of a `List<T>` lookup: every matching instance, without
/// duplicates.
#[derive(Clone, Debug, Default)]
pub struct InstanceList {
    instances: Vec<Instance>,
}

impl InstanceList {
    pub(crate) fn new(instances: Vec<Instance>) -> Self {
        InstanceList { instances }
    }

    pub fn len(&self) -> usize {
        self.instances.len()
    }

    pub fn is_empty(&self) -> bool {
        self.instances.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Instance> {
        self.instances.iter()
    }

    /// Views every instance as `T`, skipping those that cannot be viewed so.
    pub fn cast_all<T: ?Sized + Send + Sync + 'static>(&self) -> Vec<Arc<T>> {
        self.instances.iter().filter_map(Instance::cast::<T>).collect()
    }
}

impl<'a> IntoIterator for &'a InstanceList {
    type Item = &'a Instance;
    type IntoIter = std::slice::Iter<'a, Instance>;

    fn into_iter(self) -> Self::IntoIter {
        self.instances.iter()
    }
}

crate::concrete_service!(InstanceList);

#[cfg(test)]
mod tests {
    use super::*;
    use crate::class::ClassInspector;

    struct Counter(u32);
    crate::concrete_service!(Counter);

    #[test]
    fn identity_follows_the_allocation() {
        let inspector = ClassInspector::new();
        let details = inspector.details(ClassKey::of::<Counter>());
        let value = Arc::new(Counter(1));
        let a = Instance::new(Arc::clone(&details), RawValue::new(Arc::clone(&value)));
        let b = Instance::new(Arc::clone(&details), RawValue::new(value));
        let c = Instance::new(details, RawValue::new(Arc::new(Counter(1))));
        assert!(a.same_as(&b));
        assert!(!a.same_as(&c));
        assert_eq!(a.cast::<Counter>().map(|c| c.0), Some(1));
        assert!(a.cast::<InstanceList>().is_none());
    }
}
