//! Registration table types.

use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use crate::config::PolicySharing;
use crate::error::{DiError, DiResult};
use crate::key::Key;
use crate::lifetime::LifetimePolicy;
use crate::provider::ResolverContext;
use crate::traits::Dispose;

// Type-erased Arc for storage
pub(crate) type AnyArc = Arc<dyn Any + Send + Sync>;

pub(crate) type Factory = Arc<dyn for<'a> Fn(&ResolverContext<'a>) -> DiResult<Instance> + Send + Sync>;

/// Converts a cached implementation into a boxed `Arc<Capability>`.
pub(crate) type Projection = Arc<dyn Fn(&Instance) -> Option<Box<dyn Any + Send>> + Send + Sync>;

static NEXT_SEQ: AtomicU64 = AtomicU64::new(0);

/// A built implementation as cached by a lifetime policy.
///
/// `value` and `disposer` point at the same allocation. `seq` orders
/// creation so teardown can run in reverse.
#[derive(Clone)]
pub(crate) struct Instance {
    pub(crate) value: AnyArc,
    pub(crate) disposer: Arc<dyn Dispose>,
    pub(crate) key: Key,
    pub(crate) seq: u64,
}

impl Instance {
    pub(crate) fn new<T: Dispose>(key: Key, value: Arc<T>) -> Self {
        Self {
            value: value.clone(),
            disposer: value,
            key,
            seq: NEXT_SEQ.fetch_add(1, Ordering::Relaxed),
        }
    }
}

/// Registration of one (capability, name) pair
pub(crate) struct Registration {
    pub(crate) policy: LifetimePolicy,
    /// `None` for instance registrations
    pub(crate) factory: Option<Factory>,
    pub(crate) project: Projection,
    pub(crate) impl_id: TypeId,
    pub(crate) impl_name: &'static str,
}

impl Registration {
    pub(crate) fn is_instance(&self) -> bool {
        self.factory.is_none()
    }
}

/// Registration table
///
/// Entries keep registration order; re-registering a key replaces the entry
/// in place and drops the old registration together with its policy handle.
#[derive(Default)]
pub(crate) struct Registry {
    entries: Vec<(Key, Registration)>,
    index: HashMap<Key, usize>,
    /// Distinct policies of the current registrations, filled by `finalize`
    policies: Vec<LifetimePolicy>,
}

impl Registry {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Inserts a registration, replacing any previous one for the same key.
    pub(crate) fn insert(&mut self, key: Key, registration: Registration) -> Option<Registration> {
        match self.index.get(&key) {
            Some(&pos) => Some(std::mem::replace(&mut self.entries[pos], (key, registration)).1),
            None => {
                self.index.insert(key, self.entries.len());
                self.entries.push((key, registration));
                None
            }
        }
    }

    #[inline(always)]
    pub(crate) fn get(&self, key: &Key) -> Option<&Registration> {
        self.index.get(key).map(|&pos| &self.entries[pos].1)
    }

    pub(crate) fn contains_key(&self, key: &Key) -> bool {
        self.index.contains_key(key)
    }

    /// Looks up the registration serving `key`.
    ///
    /// An unnamed lookup only matches the unnamed registration. When the
    /// capability has none but several named ones, the failure lists them.
    pub(crate) fn lookup(&self, key: &Key) -> DiResult<(&Key, &Registration)> {
        if let Some(&pos) = self.index.get(key) {
            let (k, r) = &self.entries[pos];
            return Ok((k, r));
        }

        match *key {
            Key::TypeNamed(_, name, service) => Err(DiError::NamedNotFound(name, service)),
            Key::Type(id, name) => {
                let mut names: Vec<&'static str> = self
                    .entries
                    .iter()
                    .filter(|(k, _)| k.type_id() == id)
                    .filter_map(|(k, _)| k.service_name())
                    .collect();
                if names.len() < 2 {
                    return Err(DiError::NotFound(name));
                }
                names.sort_unstable();
                Err(DiError::Ambiguous { capability: name, names })
            }
        }
    }

    /// Whether `lookup` would find a registration or report an ambiguity,
    /// i.e. whether anything is registered to answer `key`.
    pub(crate) fn answers(&self, key: &Key) -> bool {
        !matches!(self.lookup(key), Err(DiError::NotFound(_)))
    }

    pub(crate) fn iter(&self) -> impl Iterator<Item = (&Key, &Registration)> {
        self.entries.iter().map(|(k, r)| (k, r))
    }

    /// Whether `policy` is used by more than one registration.
    pub(crate) fn is_shared(&self, policy: &LifetimePolicy) -> bool {
        self.entries.iter().filter(|(_, r)| r.policy.is_shared_with(policy)).count() > 1
    }

    /// Distinct policies, in first-registration order.
    pub(crate) fn policies(&self) -> &[LifetimePolicy] {
        &self.policies
    }

    /// Collects the distinct policies and enforces the sharing rule.
    pub(crate) fn finalize(&mut self, sharing: PolicySharing) -> DiResult<()> {
        let mut policies: Vec<LifetimePolicy> = Vec::new();
        for (key, reg) in &self.entries {
            if policies.iter().any(|p| p.is_shared_with(&reg.policy)) {
                if sharing == PolicySharing::Forbid {
                    return Err(DiError::InvalidRegistration {
                        capability: key.display_name(),
                        reason: "lifetime policy is shared with another registration".to_string(),
                    });
                }
                continue;
            }
            policies.push(reg.policy.clone());
        }
        self.policies = policies;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Lifetime;

    trait Store: Send + Sync {}

    fn registration(policy: LifetimePolicy) -> Registration {
        Registration {
            policy,
            factory: None,
            project: Arc::new(|_: &Instance| -> Option<Box<dyn Any + Send>> { None }),
            impl_id: TypeId::of::<()>(),
            impl_name: "()",
        }
    }

    #[test]
    fn insert_replaces_in_place() {
        let mut registry = Registry::new();
        assert!(registry.insert(Key::of::<dyn Store>(), registration(Lifetime::Transient.into())).is_none());
        registry.insert(Key::of::<u8>(), registration(Lifetime::Transient.into()));
        let replaced = registry.insert(
            Key::of::<dyn Store>(),
            registration(Lifetime::ContainerControlled.into()),
        );

        assert!(replaced.is_some());
        let keys: Vec<_> = registry.iter().map(|(k, _)| *k).collect();
        assert_eq!(keys, vec![Key::of::<dyn Store>(), Key::of::<u8>()]);
        assert_eq!(
            registry.get(&Key::of::<dyn Store>()).unwrap().policy.lifetime(),
            Lifetime::ContainerControlled
        );
    }

    #[test]
    fn unnamed_lookup_ignores_a_single_named_registration() {
        let mut registry = Registry::new();
        registry.insert(Key::named::<dyn Store>("only"), registration(Lifetime::Transient.into()));

        assert!(matches!(
            registry.lookup(&Key::of::<dyn Store>()),
            Err(DiError::NotFound(_))
        ));
        assert!(!registry.answers(&Key::of::<dyn Store>()));
        assert!(registry.answers(&Key::named::<dyn Store>("only")));
    }

    #[test]
    fn unnamed_lookup_with_several_names_is_ambiguous() {
        let mut registry = Registry::new();
        registry.insert(Key::named::<dyn Store>("b"), registration(Lifetime::Transient.into()));
        registry.insert(Key::named::<dyn Store>("a"), registration(Lifetime::Transient.into()));

        match registry.lookup(&Key::of::<dyn Store>()) {
            Err(DiError::Ambiguous { names, .. }) => assert_eq!(names, vec!["a", "b"]),
            _ => panic!("expected ambiguous lookup"),
        }
        assert!(registry.answers(&Key::of::<dyn Store>()));
        assert!(matches!(
            registry.lookup(&Key::named::<dyn Store>("c")),
            Err(DiError::NamedNotFound(_, "c"))
        ));
    }

    #[test]
    fn finalize_deduplicates_shared_policies() {
        let shared = LifetimePolicy::container_controlled();
        let mut registry = Registry::new();
        registry.insert(Key::of::<dyn Store>(), registration(shared.clone()));
        registry.insert(Key::of::<u8>(), registration(shared.clone()));
        registry.insert(Key::of::<u16>(), registration(Lifetime::Transient.into()));

        registry.finalize(PolicySharing::Collapse).unwrap();
        assert_eq!(registry.policies().len(), 2);
        assert!(registry.is_shared(&shared));

        let err = registry.finalize(PolicySharing::Forbid).unwrap_err();
        assert!(matches!(err, DiError::InvalidRegistration { .. }));
    }
}
