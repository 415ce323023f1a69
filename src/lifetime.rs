//! Lifetime policies: caching and disposal ownership per registration.

use std::any::Any;
use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Weak};
use std::thread::{self, ThreadId};

use parking_lot::{Condvar, Mutex};

use crate::error::{DiError, DiResult};
use crate::internal::{SlotId, WaitEdge};
use crate::provider::ScopeId;
use crate::registration::Instance;
use crate::traits::Dispose;

/// Service lifetimes controlling instance caching and disposal ownership.
///
/// | Lifetime | Caching | Disposed by container |
/// |---|---|---|
/// | `Transient` | never | no |
/// | `ContainerControlled` | once per container | yes, at container teardown |
/// | `ExternallyControlled` | weakly, while the caller keeps it alive | no |
/// | `PerScope` | once per scope | yes, when the scope closes |
///
/// A `Lifetime` converts into a fresh [`LifetimePolicy`], so every
/// registration made with a `Lifetime` value gets its own cache.
///
/// # Examples
///
/// ```rust
/// use ferrous_lifetimes::{Dispose, Injectable, Lifetime, Resolver, ResolverContext, DiResult, ServiceCollection};
/// use std::sync::Arc;
///
/// struct Session;
/// impl Dispose for Session {}
/// impl Injectable for Session {
///     fn construct(_: &ResolverContext<'_>) -> DiResult<Self> { Ok(Session) }
/// }
///
/// let mut services = ServiceCollection::new();
/// services.register_type_with::<Session, Session>(Lifetime::PerScope);
/// let provider = services.build().unwrap();
///
/// let request1 = provider.create_scope();
/// let request2 = provider.create_scope();
///
/// let a = request1.resolve::<Session>().unwrap();
/// let b = request1.resolve::<Session>().unwrap();
/// let c = request2.resolve::<Session>().unwrap();
/// assert!(Arc::ptr_eq(&a, &b));
/// assert!(!Arc::ptr_eq(&a, &c));
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Lifetime {
    /// New instance per resolution, never cached, never disposed
    Transient,
    /// Single instance per container, disposed at container teardown
    ContainerControlled,
    /// Single instance held weakly; the caller owns disposal
    ExternallyControlled,
    /// Single instance per scope, disposed when the scope closes
    PerScope,
}

impl Lifetime {
    /// Whether the container disposes instances of this lifetime.
    pub fn owns_disposal(self) -> bool {
        matches!(self, Lifetime::ContainerControlled | Lifetime::PerScope)
    }
}

impl fmt::Display for Lifetime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Lifetime::Transient => "transient",
            Lifetime::ContainerControlled => "container-controlled",
            Lifetime::ExternallyControlled => "externally-controlled",
            Lifetime::PerScope => "per-scope",
        };
        f.write_str(name)
    }
}

/// Per-policy caching strategy.
///
/// Caching strategies mark a slot as being created while `create` runs, so
/// concurrent first resolutions of one slot construct a single instance
/// without holding a lock across the factory.
pub(crate) trait LifetimeStrategy: Send + Sync {
    fn lifetime(&self) -> Lifetime;

    fn get_or_create(
        &self,
        scope: ScopeId,
        capability: &'static str,
        create: &mut dyn FnMut() -> DiResult<Instance>,
    ) -> DiResult<Instance>;

    /// Stores a caller-built instance; returns the refusal reason otherwise.
    fn preload(&self, instance: Instance) -> Result<(), &'static str>;

    /// Hands back the owned instances created for `scope`.
    fn release_scope(&self, scope: ScopeId) -> Vec<Instance>;

    /// Container teardown: hands back every owned instance and refuses
    /// further resolutions.
    fn shutdown(&self) -> Vec<Instance>;
}

/// Handle to a lifetime policy.
///
/// Cloning the handle shares the policy. Passing clones of one handle to
/// several registrations makes those registrations share one cached
/// implementation instance (and one disposal), which is useful for exposing a
/// single singleton under several capabilities. Use
/// [`PolicySharing::Forbid`](crate::PolicySharing) to reject such sharing.
///
/// ```rust
/// use ferrous_lifetimes::{Lifetime, LifetimePolicy};
///
/// let policy = LifetimePolicy::container_controlled();
/// let shared = policy.clone();
/// assert!(policy.is_shared_with(&shared));
/// assert!(!policy.is_shared_with(&LifetimePolicy::from(Lifetime::ContainerControlled)));
/// ```
#[derive(Clone)]
pub struct LifetimePolicy {
    strategy: Arc<dyn LifetimeStrategy>,
}

impl LifetimePolicy {
    /// Always creates, never caches, never disposes.
    pub fn transient() -> Self {
        Self::from_strategy(TransientStrategy)
    }

    /// Creates once and disposes at container teardown.
    pub fn container_controlled() -> Self {
        Self::from_strategy(ContainerControlledStrategy::default())
    }

    /// Creates once, keeps only a weak reference, never disposes.
    pub fn externally_controlled() -> Self {
        Self::from_strategy(ExternallyControlledStrategy::default())
    }

    /// Creates once per scope and disposes when the scope closes.
    pub fn per_scope() -> Self {
        Self::from_strategy(PerScopeStrategy::default())
    }

    fn from_strategy<S: LifetimeStrategy + 'static>(strategy: S) -> Self {
        Self {
            strategy: Arc::new(strategy),
        }
    }

    pub fn lifetime(&self) -> Lifetime {
        self.strategy.lifetime()
    }

    pub fn owns_disposal(&self) -> bool {
        self.lifetime().owns_disposal()
    }

    /// Whether both handles refer to the same policy.
    pub fn is_shared_with(&self, other: &LifetimePolicy) -> bool {
        Arc::ptr_eq(&self.strategy, &other.strategy)
    }

    /// Address-based identity, stable while any handle is alive.
    pub(crate) fn identity(&self) -> usize {
        Arc::as_ptr(&self.strategy) as *const () as usize
    }

    pub(crate) fn get_or_create(
        &self,
        scope: ScopeId,
        capability: &'static str,
        create: &mut dyn FnMut() -> DiResult<Instance>,
    ) -> DiResult<Instance> {
        self.strategy.get_or_create(scope, capability, create)
    }

    pub(crate) fn preload(&self, instance: Instance) -> Result<(), &'static str> {
        self.strategy.preload(instance)
    }

    pub(crate) fn release_scope(&self, scope: ScopeId) -> Vec<Instance> {
        self.strategy.release_scope(scope)
    }

    pub(crate) fn shutdown(&self) -> Vec<Instance> {
        self.strategy.shutdown()
    }
}

impl From<Lifetime> for LifetimePolicy {
    fn from(lifetime: Lifetime) -> Self {
        match lifetime {
            Lifetime::Transient => LifetimePolicy::transient(),
            Lifetime::ContainerControlled => LifetimePolicy::container_controlled(),
            Lifetime::ExternallyControlled => LifetimePolicy::externally_controlled(),
            Lifetime::PerScope => LifetimePolicy::per_scope(),
        }
    }
}

impl fmt::Debug for LifetimePolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LifetimePolicy")
            .field("lifetime", &self.lifetime())
            .field("handles", &Arc::strong_count(&self.strategy))
            .finish()
    }
}

// ===== Strategies =====

struct TransientStrategy;

impl LifetimeStrategy for TransientStrategy {
    fn lifetime(&self) -> Lifetime {
        Lifetime::Transient
    }

    fn get_or_create(
        &self,
        _scope: ScopeId,
        _capability: &'static str,
        create: &mut dyn FnMut() -> DiResult<Instance>,
    ) -> DiResult<Instance> {
        create()
    }

    fn preload(&self, _instance: Instance) -> Result<(), &'static str> {
        Err("a transient policy cannot hold a registered instance")
    }

    fn release_scope(&self, _scope: ScopeId) -> Vec<Instance> {
        Vec::new()
    }

    fn shutdown(&self) -> Vec<Instance> {
        Vec::new()
    }
}

/// What a cache slot currently holds.
enum Slot<H> {
    Empty,
    /// A factory is running on this thread; other threads wait for it.
    Creating(ThreadId),
    Populated(H),
}

/// How a populated slot keeps its instance.
trait Held: Send {
    fn hold(instance: &Instance) -> Self;

    /// The instance, while it is still alive.
    fn get(&self) -> Option<Instance>;
}

impl Held for Instance {
    fn hold(instance: &Instance) -> Self {
        instance.clone()
    }

    fn get(&self) -> Option<Instance> {
        Some(self.clone())
    }
}

/// Slot storage of one caching strategy.
trait Slots: Send {
    type Held: Held;

    /// The slot serving `scope`, created empty when missing.
    fn slot(&mut self, scope: ScopeId, capability: &'static str) -> DiResult<&mut Slot<Self::Held>>;

    /// The slot serving `scope`, unless it was torn down.
    fn existing(&mut self, scope: ScopeId) -> Option<&mut Slot<Self::Held>>;
}

/// Slots plus the condition variable that threads wait on while a slot is
/// being created elsewhere.
struct SlotCache<S> {
    state: Mutex<S>,
    settled: Condvar,
}

impl<S: Default> Default for SlotCache<S> {
    fn default() -> Self {
        Self {
            state: Mutex::new(S::default()),
            settled: Condvar::new(),
        }
    }
}

impl<S: Slots> SlotCache<S> {
    fn slot_id(&self, scope: ScopeId) -> SlotId {
        SlotId {
            policy: self as *const Self as usize,
            scope,
        }
    }

    /// Returns the instance cached for `scope`, running `create` at most once
    /// per slot across threads.
    ///
    /// The lock is not held while `create` runs. A thread that finds the slot
    /// mid-creation waits for it, unless the builder is (transitively) waiting
    /// on that thread, which is reported as [`DiError::Circular`].
    ///
    /// An instance finished after its slot was torn down is not cached. It is
    /// disposed right away when `owned`, and the caller gets `ObjectDisposed`.
    fn get_or_create(
        &self,
        scope: ScopeId,
        capability: &'static str,
        owned: bool,
        create: &mut dyn FnMut() -> DiResult<Instance>,
    ) -> DiResult<Instance> {
        let me = thread::current().id();
        let mut state = self.state.lock();
        loop {
            let slot = state.slot(scope, capability)?;
            let builder = match &*slot {
                Slot::Populated(held) => match held.get() {
                    Some(instance) => return Ok(instance),
                    None => None,
                },
                Slot::Empty => None,
                Slot::Creating(builder) => Some(*builder),
            };
            match builder {
                None => {
                    *slot = Slot::Creating(me);
                    break;
                }
                Some(builder) if builder == me => {
                    return Err(DiError::Circular(vec![capability, capability]));
                }
                Some(builder) => {
                    let _edge = WaitEdge::record(builder, self.slot_id(scope), capability)?;
                    self.settled.wait(&mut state);
                }
            }
        }
        drop(state);

        let claim = Claim {
            cache: self,
            scope,
            builder: me,
            settled: false,
        };
        let instance = create()?;
        claim.publish(instance, owned, capability)
    }
}

/// A creation in progress. Dropping it unpublished (factory error or panic)
/// empties the slot so a waiting thread can try again.
struct Claim<'a, S: Slots> {
    cache: &'a SlotCache<S>,
    scope: ScopeId,
    builder: ThreadId,
    settled: bool,
}

impl<S: Slots> Claim<'_, S> {
    fn publish(mut self, instance: Instance, owned: bool, capability: &'static str) -> DiResult<Instance> {
        let kept = self.settle(Some(&instance));
        self.settled = true;
        if kept {
            return Ok(instance);
        }

        tracing::debug!(capability, "instance finished after its slot was torn down");
        if owned {
            if let Err(error) = instance.disposer.dispose() {
                tracing::warn!(capability, %error, "dispose failed");
            }
        }
        Err(DiError::ObjectDisposed(capability))
    }

    /// Moves the slot out of `Creating`; false when it no longer exists.
    fn settle(&self, populated: Option<&Instance>) -> bool {
        let mut state = self.cache.state.lock();
        match state.existing(self.scope) {
            Some(slot) if matches!(*slot, Slot::Creating(b) if b == self.builder) => {
                *slot = match populated {
                    Some(instance) => Slot::Populated(S::Held::hold(instance)),
                    None => Slot::Empty,
                };
                true
            }
            _ => false,
        }
    }
}

impl<S: Slots> Drop for Claim<'_, S> {
    fn drop(&mut self) {
        if !self.settled {
            self.settle(None);
        }
        WaitEdge::release(self.cache.slot_id(self.scope));
        self.cache.settled.notify_all();
    }
}

/// The single slot of a container-wide policy.
struct Single<H> {
    slot: Slot<H>,
    disposed: bool,
}

impl<H> Default for Single<H> {
    fn default() -> Self {
        Self {
            slot: Slot::Empty,
            disposed: false,
        }
    }
}

impl<H: Held> Slots for Single<H> {
    type Held = H;

    fn slot(&mut self, _scope: ScopeId, capability: &'static str) -> DiResult<&mut Slot<H>> {
        if self.disposed {
            return Err(DiError::ObjectDisposed(capability));
        }
        Ok(&mut self.slot)
    }

    fn existing(&mut self, _scope: ScopeId) -> Option<&mut Slot<H>> {
        (!self.disposed).then_some(&mut self.slot)
    }
}

#[derive(Default)]
struct ContainerControlledStrategy {
    cache: SlotCache<Single<Instance>>,
}

impl LifetimeStrategy for ContainerControlledStrategy {
    fn lifetime(&self) -> Lifetime {
        Lifetime::ContainerControlled
    }

    fn get_or_create(
        &self,
        _scope: ScopeId,
        capability: &'static str,
        create: &mut dyn FnMut() -> DiResult<Instance>,
    ) -> DiResult<Instance> {
        // One instance per container, whichever scope asks first.
        self.cache.get_or_create(ScopeId::ROOT, capability, true, create)
    }

    fn preload(&self, instance: Instance) -> Result<(), &'static str> {
        let mut state = self.cache.state.lock();
        if state.disposed {
            return Err("the policy has already been disposed");
        }
        state.slot = Slot::Populated(instance);
        Ok(())
    }

    fn release_scope(&self, _scope: ScopeId) -> Vec<Instance> {
        Vec::new()
    }

    fn shutdown(&self) -> Vec<Instance> {
        let mut state = self.cache.state.lock();
        state.disposed = true;
        match std::mem::replace(&mut state.slot, Slot::Empty) {
            Slot::Populated(instance) => vec![instance],
            Slot::Empty | Slot::Creating(_) => Vec::new(),
        }
    }
}

/// Weak view of an instance; holding it never keeps the instance alive.
struct WeakInstance {
    value: Weak<dyn Any + Send + Sync>,
    disposer: Weak<dyn Dispose>,
    template: InstanceTemplate,
}

#[derive(Clone, Copy)]
struct InstanceTemplate {
    key: crate::Key,
    seq: u64,
}

impl Held for WeakInstance {
    fn hold(instance: &Instance) -> Self {
        Self {
            value: Arc::downgrade(&instance.value),
            disposer: Arc::downgrade(&instance.disposer),
            template: InstanceTemplate {
                key: instance.key,
                seq: instance.seq,
            },
        }
    }

    fn get(&self) -> Option<Instance> {
        Some(Instance {
            value: self.value.upgrade()?,
            disposer: self.disposer.upgrade()?,
            key: self.template.key,
            seq: self.template.seq,
        })
    }
}

#[derive(Default)]
struct ExternallyControlledStrategy {
    cache: SlotCache<Single<WeakInstance>>,
}

impl LifetimeStrategy for ExternallyControlledStrategy {
    fn lifetime(&self) -> Lifetime {
        Lifetime::ExternallyControlled
    }

    fn get_or_create(
        &self,
        _scope: ScopeId,
        capability: &'static str,
        create: &mut dyn FnMut() -> DiResult<Instance>,
    ) -> DiResult<Instance> {
        self.cache.get_or_create(ScopeId::ROOT, capability, false, create)
    }

    fn preload(&self, instance: Instance) -> Result<(), &'static str> {
        self.cache.state.lock().slot = Slot::Populated(WeakInstance::hold(&instance));
        Ok(())
    }

    fn release_scope(&self, _scope: ScopeId) -> Vec<Instance> {
        Vec::new()
    }

    fn shutdown(&self) -> Vec<Instance> {
        // Nothing is owned; only forget the weak reference.
        let mut state = self.cache.state.lock();
        if let Slot::Populated(_) = state.slot {
            state.slot = Slot::Empty;
        }
        Vec::new()
    }
}

#[derive(Default)]
struct PerScopeState {
    slots: HashMap<ScopeId, Slot<Instance>>,
    disposed: bool,
}

impl Slots for PerScopeState {
    type Held = Instance;

    fn slot(&mut self, scope: ScopeId, capability: &'static str) -> DiResult<&mut Slot<Instance>> {
        if self.disposed {
            return Err(DiError::ObjectDisposed(capability));
        }
        Ok(self.slots.entry(scope).or_insert(Slot::Empty))
    }

    fn existing(&mut self, scope: ScopeId) -> Option<&mut Slot<Instance>> {
        if self.disposed {
            return None;
        }
        self.slots.get_mut(&scope)
    }
}

/// One slot per scope. The map lock is only held to look a slot up, so
/// first resolutions in different scopes build concurrently.
#[derive(Default)]
struct PerScopeStrategy {
    cache: SlotCache<PerScopeState>,
}

impl LifetimeStrategy for PerScopeStrategy {
    fn lifetime(&self) -> Lifetime {
        Lifetime::PerScope
    }

    fn get_or_create(
        &self,
        scope: ScopeId,
        capability: &'static str,
        create: &mut dyn FnMut() -> DiResult<Instance>,
    ) -> DiResult<Instance> {
        self.cache.get_or_create(scope, capability, true, create)
    }

    fn preload(&self, _instance: Instance) -> Result<(), &'static str> {
        Err("a per-scope policy is populated by each scope, not at registration")
    }

    fn release_scope(&self, scope: ScopeId) -> Vec<Instance> {
        match self.cache.state.lock().slots.remove(&scope) {
            Some(Slot::Populated(instance)) => vec![instance],
            _ => Vec::new(),
        }
    }

    fn shutdown(&self) -> Vec<Instance> {
        let mut state = self.cache.state.lock();
        state.disposed = true;
        state
            .slots
            .drain()
            .filter_map(|(_, slot)| match slot {
                Slot::Populated(instance) => Some(instance),
                Slot::Empty | Slot::Creating(_) => None,
            })
            .collect()
    }
}
