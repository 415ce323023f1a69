//! Capability keys for the registration table.

use std::any::TypeId;

/// Key for registration storage and lookup.
///
/// A key identifies a *capability*: a concrete type or a trait object such as
/// `dyn Repository`. Trait objects have a `TypeId` too, so both are keyed the
/// same way. Named keys qualify a capability with a string so the same
/// capability can be registered several times.
///
/// # Examples
///
/// ```rust
/// use ferrous_lifetimes::Key;
///
/// trait Repository: Send + Sync {}
///
/// let plain = Key::of::<dyn Repository>();
/// let named = Key::named::<dyn Repository>("audit");
///
/// assert_ne!(plain, named);
/// assert_eq!(plain.type_id(), named.type_id());
/// assert_eq!(named.service_name(), Some("audit"));
/// assert_eq!(named.unnamed(), plain);
/// ```
#[derive(Debug, Clone, Copy)]
pub enum Key {
    /// Unnamed capability key with TypeId and name for diagnostics
    Type(TypeId, &'static str),
    /// Named capability key with TypeId, type name, and registration name
    TypeNamed(TypeId, &'static str, &'static str),
}

impl Key {
    /// Key for an unnamed registration of `C`.
    #[inline(always)]
    pub fn of<C: ?Sized + 'static>() -> Self {
        Key::Type(TypeId::of::<C>(), std::any::type_name::<C>())
    }

    /// Key for a registration of `C` qualified by `name`.
    #[inline(always)]
    pub fn named<C: ?Sized + 'static>(name: &'static str) -> Self {
        Key::TypeNamed(TypeId::of::<C>(), std::any::type_name::<C>(), name)
    }

    /// Get the capability name for display
    ///
    /// This is the `std::any::type_name` of the capability.
    pub fn display_name(&self) -> &'static str {
        match self {
            Key::Type(_, name) => name,
            Key::TypeNamed(_, name, _) => name,
        }
    }

    /// Get the registration name for named keys, or None for unnamed keys
    pub fn service_name(&self) -> Option<&'static str> {
        match self {
            Key::Type(_, _) => None,
            Key::TypeNamed(_, _, name) => Some(name),
        }
    }

    /// The capability's `TypeId`, regardless of naming.
    pub fn type_id(&self) -> TypeId {
        match self {
            Key::Type(id, _) | Key::TypeNamed(id, _, _) => *id,
        }
    }

    /// The unnamed key for the same capability.
    pub fn unnamed(&self) -> Key {
        match self {
            Key::Type(_, _) => *self,
            Key::TypeNamed(id, name, _) => Key::Type(*id, name),
        }
    }
}

// TypeId-only comparison; the type name is diagnostic
impl PartialEq for Key {
    #[inline(always)]
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Key::Type(a, _), Key::Type(b, _)) => a == b,
            (Key::TypeNamed(a, _, name_a), Key::TypeNamed(b, _, name_b)) => a == b && name_a == name_b,
            _ => false,
        }
    }
}

impl Eq for Key {}

impl std::hash::Hash for Key {
    #[inline(always)]
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        match self {
            Key::Type(id, _) => {
                0u8.hash(state);
                id.hash(state);
            }
            Key::TypeNamed(id, _, name) => {
                1u8.hash(state);
                id.hash(state);
                name.hash(state);
            }
        }
    }
}

impl std::fmt::Display for Key {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Key::Type(_, name) => f.write_str(name),
            Key::TypeNamed(_, name, service) => write!(f, "{} ({})", name, service),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    trait Greeter: Send + Sync {}

    #[test]
    fn trait_objects_and_concrete_types_get_distinct_keys() {
        struct Impl;
        assert_ne!(Key::of::<dyn Greeter>(), Key::of::<Impl>());
    }

    #[test]
    fn named_keys_compare_by_name() {
        let a = Key::named::<dyn Greeter>("a");
        let b = Key::named::<dyn Greeter>("b");
        assert_ne!(a, b);
        assert_eq!(a, Key::named::<dyn Greeter>("a"));

        let set: HashSet<Key> = [a, b, Key::of::<dyn Greeter>()].into_iter().collect();
        assert_eq!(set.len(), 3);
    }

    #[test]
    fn display_includes_registration_name() {
        let key = Key::named::<u32>("port");
        assert_eq!(key.to_string(), "u32 (port)");
        assert_eq!(Key::of::<u32>().to_string(), "u32");
    }
}
