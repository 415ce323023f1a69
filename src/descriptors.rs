//! Service descriptors for introspection and diagnostics.

use std::any::TypeId;

use crate::key::Key;
use crate::lifetime::Lifetime;
use crate::registration::{Registration, Registry};

/// Service descriptor for introspection and diagnostics
///
/// Describes one registration: the capability it serves, the implementation
/// behind it and how its lifetime policy caches and disposes instances.
///
/// # Examples
///
/// ```rust
/// use ferrous_lifetimes::{Dispose, Lifetime, LifetimePolicy, ServiceCollection};
/// use std::sync::Arc;
///
/// struct Database;
/// impl Dispose for Database {}
///
/// struct Port(u16);
/// impl Dispose for Port {}
///
/// let mut services = ServiceCollection::new();
/// services.register_factory::<Database, _, _>(Lifetime::ContainerControlled, |_| Ok(Database));
/// services.register_named_instance::<Port, _>("port", Arc::new(Port(5432)), LifetimePolicy::externally_controlled());
///
/// let descriptors = services.descriptors();
///
/// let db = descriptors.iter().find(|d| d.type_name().contains("Database")).unwrap();
/// assert_eq!(db.lifetime, Lifetime::ContainerControlled);
/// assert!(db.owns_disposal);
/// assert!(!db.is_named());
///
/// let port = descriptors.iter().find(|d| d.service_name() == Some("port")).unwrap();
/// assert!(port.is_instance);
/// assert!(!port.owns_disposal);
/// ```
#[derive(Debug, Clone)]
pub struct ServiceDescriptor {
    /// The capability key (type or trait name with optional registration name)
    pub key: Key,
    /// Lifetime of the registration's policy
    pub lifetime: Lifetime,
    /// Implementation type ID
    pub impl_type_id: TypeId,
    /// Implementation type name
    pub impl_type_name: &'static str,
    /// Registered through `register_instance*`
    pub is_instance: bool,
    /// Whether the container disposes instances of this registration
    pub owns_disposal: bool,
    /// Whether the policy is shared with other registrations
    pub shared_policy: bool,
}

impl ServiceDescriptor {
    pub(crate) fn describe(key: &Key, registration: &Registration, registry: &Registry) -> Self {
        Self {
            key: *key,
            lifetime: registration.policy.lifetime(),
            impl_type_id: registration.impl_id,
            impl_type_name: registration.impl_name,
            is_instance: registration.is_instance(),
            owns_disposal: registration.policy.owns_disposal(),
            shared_policy: registry.is_shared(&registration.policy),
        }
    }

    pub(crate) fn collect(registry: &Registry) -> Vec<Self> {
        registry
            .iter()
            .map(|(key, registration)| Self::describe(key, registration, registry))
            .collect()
    }

    /// Get the service name for named services, or None for unnamed services
    pub fn service_name(&self) -> Option<&'static str> {
        self.key.service_name()
    }

    /// Get the capability's type or trait name
    ///
    /// This is the `std::any::type_name` of the capability.
    pub fn type_name(&self) -> &'static str {
        self.key.display_name()
    }

    /// Check if this is a named registration
    pub fn is_named(&self) -> bool {
        self.service_name().is_some()
    }
}
