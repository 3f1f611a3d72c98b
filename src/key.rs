//! Service type keys and type descriptors.

use std::any::TypeId;
use std::fmt;
use std::hash::{Hash, Hasher};

use crate::class::{markers, ClassDescriptor, ServiceType};

/// Identity of a [`ServiceType`].
///
/// A `ClassKey` is the arena slot of the class model: it is cheap to copy,
/// compares by `TypeId`, and resolves to full [`ClassDetails`](crate::ClassDetails)
/// through a [`ClassInspector`](crate::ClassInspector).
///
/// # Examples
///
/// ```rust
/// use service_registry::ClassKey;
///
/// struct Config;
/// service_registry::concrete_service!(Config);
///
/// let key = ClassKey::of::<Config>();
/// assert_eq!(key.simple_name(), "Config");
/// assert_eq!(key, ClassKey::of::<Config>());
/// ```
#[derive(Clone, Copy)]
pub struct ClassKey {
    id: TypeId,
    type_name: &'static str,
    describe: fn() -> ClassDescriptor,
}

impl ClassKey {
    /// Key of the given service type.
    pub fn of<T: ?Sized + ServiceType>() -> Self {
        ClassKey {
            id: TypeId::of::<T>(),
            type_name: std::any::type_name::<T>(),
            describe: T::describe,
        }
    }

    /// The `TypeId` of the service type.
    pub fn id(&self) -> TypeId {
        self.id
    }

    /// The fully-qualified `std::any::type_name` of the service type.
    pub fn type_name(&self) -> &'static str {
        self.type_name
    }

    /// The type name with module paths and `dyn` markers stripped.
    pub fn simple_name(&self) -> String {
        simple_name(self.type_name)
    }

    pub(crate) fn describe(&self) -> ClassDescriptor {
        (self.describe)()
    }
}

impl PartialEq for ClassKey {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for ClassKey {}

impl Hash for ClassKey {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

impl fmt::Debug for ClassKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ClassKey({})", self.type_name)
    }
}

impl fmt::Display for ClassKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.simple_name())
    }
}

/// Strips module paths and `dyn ` markers from a `std::any::type_name`.
///
/// `alloc::sync::Arc<dyn app::Greeter>` becomes `Arc<Greeter>`.
pub fn simple_name(type_name: &str) -> String {
    let mut out = String::with_capacity(type_name.len());
    let mut segment_start = 0;
    let mut chars = type_name.chars().peekable();
    while let Some(c) = chars.next() {
        if c == ':' && chars.peek() == Some(&':') {
            chars.next();
            out.truncate(segment_start);
            continue;
        }
        out.push(c);
        if !(c.is_alphanumeric() || c == '_') {
            segment_start = out.len();
        }
    }
    out.replace("dyn ", "")
}

/// Type descriptor for lookups and method signatures.
///
/// Computed once at registration or lookup time; the lookup algorithm works on
/// these values instead of re-deriving generic structure on every call.
///
/// - `Raw(C)`: a plain service type.
/// - `List(T)`: all services assignable to `T`.
/// - `Factory(T)`: a service that is a `Factory` of `T` (or of a subtype).
/// - `Wildcard { upper, lower }`: `? extends X` / `? super X`. An absent upper
///   bound stands for `Object`.
#[derive(Clone, PartialEq, Eq, Hash, Debug)]
pub enum TypeSpec {
    Raw(ClassKey),
    List(Box<TypeSpec>),
    Factory(Box<TypeSpec>),
    Wildcard {
        upper: Option<Box<TypeSpec>>,
        lower: Option<Box<TypeSpec>>,
    },
}

impl TypeSpec {
    /// `T`
    pub fn of<T: ?Sized + ServiceType>() -> Self {
        TypeSpec::Raw(ClassKey::of::<T>())
    }

    /// `List<element>`
    pub fn list_of(element: TypeSpec) -> Self {
        TypeSpec::List(Box::new(element))
    }

    /// `Factory<element>`
    pub fn factory_of(element: TypeSpec) -> Self {
        TypeSpec::Factory(Box::new(element))
    }

    /// `? extends bound`
    pub fn extends(bound: TypeSpec) -> Self {
        TypeSpec::Wildcard { upper: Some(Box::new(bound)), lower: None }
    }

    /// `? super bound`
    pub fn super_of(bound: TypeSpec) -> Self {
        TypeSpec::Wildcard { upper: None, lower: Some(Box::new(bound)) }
    }

    /// Returns the raw class of this type.
    ///
    /// `List` and `Factory` erase to their raw marker classes, `? extends X`
    /// erases to `X`, every other wildcard erases to `Object`.
    pub fn erased(&self) -> ClassKey {
        match self {
            TypeSpec::Raw(key) => *key,
            TypeSpec::List(_) => ClassKey::of::<markers::List>(),
            TypeSpec::Factory(_) => ClassKey::of::<markers::Factory>(),
            TypeSpec::Wildcard { upper: Some(upper), lower: None } => match upper.as_ref() {
                TypeSpec::Raw(key) => *key,
                _ => ClassKey::of::<markers::Object>(),
            },
            TypeSpec::Wildcard { .. } => ClassKey::of::<markers::Object>(),
        }
    }

    /// Returns the class when this is a `Raw` type.
    pub fn as_raw(&self) -> Option<ClassKey> {
        match self {
            TypeSpec::Raw(key) => Some(*key),
            _ => None,
        }
    }
}

impl From<ClassKey> for TypeSpec {
    fn from(key: ClassKey) -> Self {
        TypeSpec::Raw(key)
    }
}

impl fmt::Display for TypeSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TypeSpec::Raw(key) => write!(f, "{}", key),
            TypeSpec::List(element) => write!(f, "List<{}>", element),
            TypeSpec::Factory(element) => write!(f, "Factory<{}>", element),
            TypeSpec::Wildcard { upper: Some(upper), .. } => write!(f, "? extends {}", upper),
            TypeSpec::Wildcard { lower: Some(lower), .. } => write!(f, "? super {}", lower),
            TypeSpec::Wildcard { .. } => f.write_str("?"),
        }
    }
}

/// Formats a list of types the way error messages and display names do:
/// `Service Foo` for one type, `Services Foo, Bar` for several.
pub(crate) fn format_types(qualifier: &str, types: &[TypeSpec]) -> String {
    let joined = types.iter().map(|t| t.to_string()).collect::<Vec<_>>().join(", ");
    if types.len() == 1 {
        format!("{} {}", qualifier, joined)
    } else {
        format!("{}s {}", qualifier, joined)
    }
}
