//! Service key types for the dependency injection container.

use std::any::TypeId;
use std::hash::{Hash, Hasher};

/// Key for service storage and lookup.
///
/// Concrete types are keyed by their `TypeId`; trait objects have no
/// `TypeId` of their own, so they are keyed by the trait's type name.
///
/// # Examples
///
/// ```rust
/// use shaper::{key_of_trait, key_of_type, Key};
///
/// trait Logger: Send + Sync {}
///
/// let concrete = key_of_type::<String>();
/// assert_eq!(concrete.display_name(), "alloc::string::String");
///
/// let service = key_of_trait::<dyn Logger>();
/// assert!(matches!(service, Key::Trait(_)));
/// ```
#[derive(Debug, Clone, Copy)]
pub enum Key {
    /// Concrete type key with TypeId and name for diagnostics
    Type(TypeId, &'static str),
    /// Trait object key, identified by the trait's type name
    Trait(&'static str),
}

impl Key {
    /// Get the type or trait name for display
    pub fn display_name(&self) -> &'static str {
        match self {
            Key::Type(_, name) => name,
            Key::Trait(name) => name,
        }
    }

    /// True for trait object keys
    pub fn is_trait(&self) -> bool {
        matches!(self, Key::Trait(_))
    }
}

// TypeId-only comparison for concrete types; the name is diagnostics only.
impl PartialEq for Key {
    #[inline(always)]
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Key::Type(a, _), Key::Type(b, _)) => a == b,
            (Key::Trait(a), Key::Trait(b)) => a == b,
            _ => false,
        }
    }
}

impl Eq for Key {}

impl Hash for Key {
    #[inline(always)]
    fn hash<H: Hasher>(&self, state: &mut H) {
        match self {
            Key::Type(id, _) => {
                0u8.hash(state);
                id.hash(state);
            }
            Key::Trait(name) => {
                1u8.hash(state);
                name.hash(state);
            }
        }
    }
}

/// Key for a concrete service type.
#[inline(always)]
pub fn key_of_type<T: 'static>() -> Key {
    Key::Type(TypeId::of::<T>(), std::any::type_name::<T>())
}

/// Key for a trait object service such as `dyn Logger`.
#[inline(always)]
pub fn key_of_trait<T: ?Sized + 'static>() -> Key {
    Key::Trait(std::any::type_name::<T>())
}
