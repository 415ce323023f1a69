//! Diagnostic observers for lifetime events.
//!
//! Observers see every resolution, creation and disposal the container
//! performs. [`TracingObserver`] forwards them to `tracing`;
//! [`StatsObserver`] keeps per-capability counters.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;

use crate::{Key, Lifetime};

/// Hooks for lifetime events.
///
/// All methods default to no-ops.
///
/// # Examples
///
/// ```
/// use ferrous_lifetimes::{DiObserver, Key, Lifetime, ServiceCollection};
/// use std::sync::Arc;
/// use std::sync::atomic::{AtomicUsize, Ordering};
///
/// #[derive(Default)]
/// struct Creations(AtomicUsize);
///
/// impl DiObserver for Creations {
///     fn created(&self, _key: &Key, _lifetime: Lifetime) {
///         self.0.fetch_add(1, Ordering::SeqCst);
///     }
/// }
///
/// let mut services = ServiceCollection::new();
/// services.add_observer(Arc::new(Creations::default()));
/// ```
pub trait DiObserver: Send + Sync {
    /// A resolution of `key` is starting.
    fn resolving(&self, _key: &Key) {}

    /// A resolution of `key` finished, successfully or not.
    fn resolved(&self, _key: &Key, _duration: Duration) {}

    /// A factory produced a new instance for `key`.
    fn created(&self, _key: &Key, _lifetime: Lifetime) {}

    /// The container disposed the instance created for `key`.
    fn disposed(&self, _key: &Key) {}

    /// Disposing the instance created for `key` failed.
    fn dispose_failed(&self, _key: &Key, _message: &str) {}
}

#[derive(Default, Clone)]
pub(crate) struct Observers {
    observers: Vec<Arc<dyn DiObserver>>,
}

impl Observers {
    pub(crate) fn new() -> Self {
        Self { observers: Vec::new() }
    }

    pub(crate) fn add(&mut self, observer: Arc<dyn DiObserver>) {
        self.observers.push(observer);
    }

    #[inline]
    pub(crate) fn has_observers(&self) -> bool {
        !self.observers.is_empty()
    }

    #[inline]
    pub(crate) fn resolving(&self, key: &Key) {
        for observer in &self.observers {
            observer.resolving(key);
        }
    }

    #[inline]
    pub(crate) fn resolved(&self, key: &Key, duration: Duration) {
        for observer in &self.observers {
            observer.resolved(key, duration);
        }
    }

    #[inline]
    pub(crate) fn created(&self, key: &Key, lifetime: Lifetime) {
        for observer in &self.observers {
            observer.created(key, lifetime);
        }
    }

    #[inline]
    pub(crate) fn disposed(&self, key: &Key) {
        for observer in &self.observers {
            observer.disposed(key);
        }
    }

    #[inline]
    pub(crate) fn dispose_failed(&self, key: &Key, message: &str) {
        for observer in &self.observers {
            observer.dispose_failed(key, message);
        }
    }
}

/// Forwards lifetime events to `tracing` at trace/debug level.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingObserver;

impl TracingObserver {
    pub fn new() -> Self {
        Self
    }
}

impl DiObserver for TracingObserver {
    fn resolving(&self, key: &Key) {
        tracing::trace!(capability = %key, "resolving");
    }

    fn resolved(&self, key: &Key, duration: Duration) {
        tracing::trace!(capability = %key, ?duration, "resolved");
    }

    fn created(&self, key: &Key, lifetime: Lifetime) {
        tracing::debug!(capability = %key, %lifetime, "constructor was called");
    }

    fn disposed(&self, key: &Key) {
        tracing::debug!(capability = %key, "dispose was called");
    }

    fn dispose_failed(&self, key: &Key, message: &str) {
        tracing::warn!(capability = %key, error = message, "dispose failed");
    }
}

/// Counters kept by [`StatsObserver`] for one capability key.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct LifecycleStats {
    pub resolutions: usize,
    pub created: usize,
    pub disposed: usize,
    pub dispose_failures: usize,
}

/// Counts resolutions, creations and disposals per capability key.
///
/// ```
/// use ferrous_lifetimes::{Dispose, Injectable, Key, Lifetime, Resolver, ResolverContext, DiResult, ServiceCollection, StatsObserver};
/// use std::sync::Arc;
///
/// struct Cache;
/// impl Dispose for Cache {}
/// impl Injectable for Cache {
///     fn construct(_: &ResolverContext<'_>) -> DiResult<Self> { Ok(Cache) }
/// }
///
/// let stats = Arc::new(StatsObserver::new());
/// let mut services = ServiceCollection::new();
/// services.add_observer(stats.clone());
/// services.register_type_with::<Cache, Cache>(Lifetime::ContainerControlled);
///
/// let provider = services.build().unwrap();
/// provider.resolve::<Cache>().unwrap();
/// provider.resolve::<Cache>().unwrap();
/// provider.dispose();
///
/// let cache = stats.get(&Key::of::<Cache>());
/// assert_eq!((cache.resolutions, cache.created, cache.disposed), (2, 1, 1));
/// ```
#[derive(Debug, Default)]
pub struct StatsObserver {
    stats: Mutex<HashMap<Key, LifecycleStats>>,
}

impl StatsObserver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Counters for `key`; zeroed when nothing was recorded.
    pub fn get(&self, key: &Key) -> LifecycleStats {
        self.stats.lock().get(key).copied().unwrap_or_default()
    }

    /// Sum of the counters over all keys.
    pub fn total(&self) -> LifecycleStats {
        self.stats
            .lock()
            .values()
            .fold(LifecycleStats::default(), |acc, s| LifecycleStats {
                resolutions: acc.resolutions + s.resolutions,
                created: acc.created + s.created,
                disposed: acc.disposed + s.disposed,
                dispose_failures: acc.dispose_failures + s.dispose_failures,
            })
    }

    pub fn reset(&self) {
        self.stats.lock().clear();
    }

    fn update(&self, key: &Key, f: impl FnOnce(&mut LifecycleStats)) {
        f(self.stats.lock().entry(*key).or_default());
    }
}

impl DiObserver for StatsObserver {
    fn resolving(&self, key: &Key) {
        self.update(key, |s| s.resolutions += 1);
    }

    fn created(&self, key: &Key, _lifetime: Lifetime) {
        self.update(key, |s| s.created += 1);
    }

    fn disposed(&self, key: &Key) {
        self.update(key, |s| s.disposed += 1);
    }

    fn dispose_failed(&self, key: &Key, _message: &str) {
        self.update(key, |s| s.dispose_failures += 1);
    }
}
