//! Explicit class model for service types.
//!
//! Rust has no runtime class hierarchy, so every type that takes part in the
//! registry describes itself through [`ServiceType::describe`]: its kind, the
//! supertypes it can be viewed as (with the upcast that performs the view), the
//! annotations it carries, and optionally a constructor used for constructor
//! injection. The [`ClassInspector`] turns these descriptors into memoized
//! [`ClassDetails`].

mod inspector;

use std::any::Any;
use std::marker::PhantomData;
use std::sync::Arc;

pub use inspector::{ClassDetails, ClassInspector};

use crate::error::BoxError;
use crate::instance::{Instance, RawValue};
use crate::key::{ClassKey, TypeSpec};
use crate::method::InjectArgs;

/// Erased service value: always an `Arc<K>` boxed again as `Arc<dyn Any>`.
pub(crate) type AnyArc = Arc<dyn Any + Send + Sync>;

/// Converts an erased `Arc<Sub>` into an erased `Arc<Super>`.
pub(crate) type Caster = Arc<dyn Fn(&AnyArc) -> Option<AnyArc> + Send + Sync>;

/// Calls `Factory::create` on an erased `Arc<dyn Factory<E>>`.
pub(crate) type CreateFn = Arc<dyn Fn(&AnyArc) -> Option<RawValue> + Send + Sync>;

pub(crate) type ConstructFn =
    Arc<dyn Fn(&[Instance], &Arc<ClassInspector>) -> Result<RawValue, BoxError> + Send + Sync>;

/// A type that can be registered, requested or used as an annotation.
///
/// Most implementations are generated with [`concrete_service!`](crate::concrete_service),
/// [`interface_service!`](crate::interface_service) or
/// [`annotation_type!`](crate::annotation_type). Implement it by hand to declare
/// a constructor or annotations:
///
/// ```rust
/// use std::sync::Arc;
/// use service_registry::{ClassBuilder, ClassDescriptor, ServiceType};
///
/// struct Clock;
/// service_registry::concrete_service!(Clock);
///
/// struct Scheduler {
///     clock: Arc<Clock>,
/// }
///
/// impl ServiceType for Scheduler {
///     fn describe() -> ClassDescriptor {
///         ClassBuilder::<Scheduler>::concrete()
///             .constructor(|(clock,): (Arc<Clock>,)| Scheduler { clock })
///             .build()
///     }
/// }
/// ```
pub trait ServiceType: 'static {
    /// Describes the class. Called at most a handful of times per inspector.
    fn describe() -> ClassDescriptor;
}

/// What kind of class a [`ServiceType`] is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ClassKind {
    /// A constructible type.
    Concrete,
    /// A trait object type.
    Interface,
    /// An array type. Never a valid lookup type.
    Array,
    /// A marker type used as an annotation. Never a valid lookup type.
    Annotation,
    /// The universal supertype. Never a valid lookup type.
    Object,
}

pub(crate) struct Supertype {
    pub(crate) key: ClassKey,
    pub(crate) cast: Option<Caster>,
}

#[derive(Clone)]
pub(crate) struct Constructor {
    pub(crate) params: Vec<TypeSpec>,
    pub(crate) invoke: ConstructFn,
}

pub(crate) struct FactoryCapability {
    pub(crate) element: ClassKey,
    pub(crate) create: CreateFn,
}

/// Erased description of a class, produced by [`ClassBuilder::build`].
pub struct ClassDescriptor {
    pub(crate) kind: ClassKind,
    pub(crate) supertypes: Vec<Supertype>,
    pub(crate) annotations: Vec<ClassKey>,
    pub(crate) constructor: Option<Constructor>,
    pub(crate) factory: Option<FactoryCapability>,
}

impl ClassDescriptor {
    fn empty(kind: ClassKind) -> Self {
        ClassDescriptor {
            kind,
            supertypes: Vec::new(),
            annotations: Vec::new(),
            constructor: None,
            factory: None,
        }
    }

    /// The kind of the described class.
    pub fn kind(&self) -> ClassKind {
        self.kind
    }
}

/// Typed builder for a [`ClassDescriptor`] of `T`.
pub struct ClassBuilder<T: ?Sized> {
    descriptor: ClassDescriptor,
    _class: PhantomData<fn(Arc<T>)>,
}

impl<T: ?Sized + Send + Sync + 'static> ClassBuilder<T> {
    fn with_kind(kind: ClassKind) -> Self {
        ClassBuilder { descriptor: ClassDescriptor::empty(kind), _class: PhantomData }
    }

    /// Starts the description of a trait object type.
    pub fn interface() -> Self {
        Self::with_kind(ClassKind::Interface)
    }

    /// Starts the description of an annotation marker.
    pub fn annotation() -> Self {
        Self::with_kind(ClassKind::Annotation)
    }

    /// Starts the description of an array type.
    pub fn array() -> Self {
        Self::with_kind(ClassKind::Array)
    }

    /// Declares that `T` can be viewed as `S`, using `cast` to perform the view.
    pub fn implements<S, F>(mut self, cast: F) -> Self
    where
        S: ?Sized + crate::ServiceType + Send + Sync,
        F: Fn(Arc<T>) -> Arc<S> + Send + Sync + 'static,
    {
        let caster: Caster = Arc::new(move |value: &AnyArc| {
            value
                .downcast_ref::<Arc<T>>()
                .map(|this| Arc::new(cast(Arc::clone(this))) as AnyArc)
        });
        self.descriptor.supertypes.push(Supertype { key: ClassKey::of::<S>(), cast: Some(caster) });
        self
    }

    /// Declares `S` as a supertype that instances cannot be converted to.
    ///
    /// Assignability checks see `S`, but an instance of `T` cannot be handed
    /// out as an `Arc<S>`.
    pub fn supertype<S: ?Sized + crate::ServiceType>(mut self) -> Self {
        self.descriptor.supertypes.push(Supertype { key: ClassKey::of::<S>(), cast: None });
        self
    }

    /// Attaches the annotation `A` to the class.
    pub fn annotated<A: crate::ServiceType>(mut self) -> Self {
        self.descriptor.annotations.push(ClassKey::of::<A>());
        self
    }

    pub(crate) fn factory_of<E: ?Sized + crate::ServiceType>(mut self, create: CreateFn) -> Self {
        self.descriptor.factory = Some(FactoryCapability { element: ClassKey::of::<E>(), create });
        self
    }

    /// Finishes the description.
    pub fn build(self) -> ClassDescriptor {
        self.descriptor
    }
}

impl<T: Send + Sync + 'static> ClassBuilder<T> {
    /// Starts the description of a concrete type.
    pub fn concrete() -> Self {
        Self::with_kind(ClassKind::Concrete)
    }

    /// Declares the constructor used when `T` is registered for construction.
    ///
    /// The argument tuple is injected the same way factory method parameters are.
    pub fn constructor<A, F>(self, construct: F) -> Self
    where
        A: InjectArgs,
        F: Fn(A) -> T + Send + Sync + 'static,
    {
        self.try_constructor(move |args: A| Ok::<T, BoxError>(construct(args)))
    }

    /// Declares a fallible constructor.
    pub fn try_constructor<A, F, E>(mut self, construct: F) -> Self
    where
        A: InjectArgs,
        F: Fn(A) -> Result<T, E> + Send + Sync + 'static,
        E: Into<BoxError>,
    {
        let invoke: ConstructFn = Arc::new(move |args: &[Instance], inspector: &Arc<ClassInspector>| {
            let args = A::extract(args, inspector)?;
            let value = construct(args).map_err(Into::into)?;
            Ok(RawValue::new(Arc::new(value)))
        });
        self.descriptor.constructor = Some(Constructor { params: A::specs(), invoke });
        self
    }
}

/// Built-in marker classes.
pub mod markers {
    use super::{ClassBuilder, ClassDescriptor, ClassKind};
    use crate::ServiceType;

    /// The universal supertype.
    pub struct Object;

    /// The raw class of `List<T>` types.
    pub struct List;

    /// The raw class of `Factory<T>` types.
    pub struct Factory;

    impl ServiceType for Object {
        fn describe() -> ClassDescriptor {
            ClassBuilder::<Object>::with_kind(ClassKind::Object).build()
        }
    }

    impl ServiceType for List {
        fn describe() -> ClassDescriptor {
            ClassBuilder::<List>::interface().build()
        }
    }

    impl ServiceType for Factory {
        fn describe() -> ClassDescriptor {
            ClassBuilder::<Factory>::interface().build()
        }
    }

    impl<T: ServiceType + Send + Sync> ServiceType for [T] {
        fn describe() -> ClassDescriptor {
            ClassBuilder::<[T]>::array().build()
        }
    }
}

/// Implements [`ServiceType`] for a concrete type, optionally listing the
/// interfaces it can be viewed as.
///
/// ```rust
/// trait Greeter: Send + Sync {
///     fn greet(&self) -> String;
/// }
/// service_registry::interface_service!(dyn Greeter);
///
/// struct English;
/// impl Greeter for English {
///     fn greet(&self) -> String {
///         "hello".into()
///     }
/// }
/// service_registry::concrete_service!(English: dyn Greeter);
/// ```
#[macro_export]
macro_rules! concrete_service {
    ($ty:ty) => {
        impl $crate::ServiceType for $ty {
            fn describe() -> $crate::ClassDescriptor {
                $crate::ClassBuilder::<$ty>::concrete().build()
            }
        }
    };
    ($ty:ty : $($sup:ty),+ $(,)?) => {
        impl $crate::ServiceType for $ty {
            fn describe() -> $crate::ClassDescriptor {
                $crate::ClassBuilder::<$ty>::concrete()
                    $(.implements::<$sup, _>(
                        |this: ::std::sync::Arc<$ty>| -> ::std::sync::Arc<$sup> { this },
                    ))+
                    .build()
            }
        }
    };
}

/// Implements [`ServiceType`] for a trait object type, optionally listing its
/// supertraits.
#[macro_export]
macro_rules! interface_service {
    ($ty:ty) => {
        impl $crate::ServiceType for $ty {
            fn describe() -> $crate::ClassDescriptor {
                $crate::ClassBuilder::<$ty>::interface().build()
            }
        }
    };
    ($ty:ty : $($sup:ty),+ $(,)?) => {
        impl $crate::ServiceType for $ty {
            fn describe() -> $crate::ClassDescriptor {
                $crate::ClassBuilder::<$ty>::interface()
                    $(.implements::<$sup, _>(
                        |this: ::std::sync::Arc<$ty>| -> ::std::sync::Arc<$sup> { this },
                    ))+
                    .build()
            }
        }
    };
}

/// Implements [`ServiceType`] for an annotation marker type.
#[macro_export]
macro_rules! annotation_type {
    ($ty:ty) => {
        impl $crate::ServiceType for $ty {
            fn describe() -> $crate::ClassDescriptor {
                $crate::ClassBuilder::<$ty>::annotation().build()
            }
        }
    };
}
