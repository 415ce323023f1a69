//! Service provider module for dependency injection.
//!
//! This module contains the ServiceProvider type, which resolves capabilities
//! through their lifetime policies and owns container teardown.

use std::any::Any;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;

use crate::config::ContainerOptions;
use crate::disposal::{dispose_instances, Boundary, TeardownReport};
use crate::internal::ResolutionGuard;
use crate::observer::Observers;
use crate::registration::{AnyArc, Instance, Registry};
use crate::traits::{Resolver, ResolverCore};
use crate::{DiError, DiResult, Key, Lifetime, ServiceDescriptor};

pub mod context;
pub mod scope;
pub use context::ResolverContext;
pub use scope::{Scope, ScopeId};

/// Service provider for resolving dependencies from the DI container.
///
/// The provider is the root scope. Each resolution looks up the registration
/// for the requested capability and asks its lifetime policy for an instance;
/// the policy decides whether to reuse a cached one or call the factory.
///
/// Dropping the last handle (provider clones and open scopes all count) runs
/// teardown unless [`ContainerOptions::dispose_on_drop`] is off. Call
/// [`dispose`](ServiceProvider::dispose) to tear down explicitly and inspect
/// the [`TeardownReport`].
///
/// # Thread Safety
///
/// `ServiceProvider` is `Send + Sync` and cheap to clone. Concurrent first
/// resolutions of a caching policy construct exactly one instance.
///
/// # Examples
///
/// ```
/// use ferrous_lifetimes::{Dispose, Lifetime, Resolver, ServiceCollection};
/// use std::sync::Arc;
///
/// struct Database { url: String }
/// impl Dispose for Database {}
///
/// let mut services = ServiceCollection::new();
/// services.register_factory::<Database, _, _>(Lifetime::ContainerControlled, |_| {
///     Ok(Database { url: "postgres://localhost".to_string() })
/// });
///
/// let provider = services.build().unwrap();
/// let db = provider.resolve::<Database>().unwrap();
/// assert_eq!(db.url, "postgres://localhost");
///
/// let report = provider.dispose();
/// assert_eq!(report.disposed, 1);
/// ```
#[derive(Clone)]
pub struct ServiceProvider {
    inner: Arc<ProviderInner>,
}

pub(crate) struct ProviderInner {
    pub(crate) registry: Registry,
    pub(crate) observers: Observers,
    pub(crate) options: ContainerOptions,
    disposed: AtomicBool,
}

impl ServiceProvider {
    pub(crate) fn new(registry: Registry, observers: Observers, options: ContainerOptions) -> Self {
        Self {
            inner: Arc::new(ProviderInner {
                registry,
                observers,
                options,
                disposed: AtomicBool::new(false),
            }),
        }
    }

    #[inline]
    pub(crate) fn inner(&self) -> &ProviderInner {
        &self.inner
    }

    /// Address of the shared state; equal for every clone of one container.
    fn identity(&self) -> usize {
        Arc::as_ptr(&self.inner) as usize
    }

    /// Creates a child scope with its own per-scope instances.
    pub fn create_scope(&self) -> Scope {
        Scope::new(self.clone())
    }

    /// Runs `f` inside a fresh scope and closes the scope afterwards.
    ///
    /// ```
    /// use ferrous_lifetimes::{Dispose, Lifetime, Resolver, ServiceCollection};
    ///
    /// struct Request(u32);
    /// impl Dispose for Request {}
    ///
    /// let mut services = ServiceCollection::new();
    /// services.register_factory::<Request, _, _>(Lifetime::PerScope, |_| Ok(Request(7)));
    /// let provider = services.build().unwrap();
    ///
    /// let id = provider.using_scope(|scope| scope.resolve::<Request>().map(|r| r.0)).unwrap();
    /// assert_eq!(id, 7);
    /// ```
    pub fn using_scope<R>(&self, f: impl FnOnce(&Scope) -> R) -> R {
        let scope = self.create_scope();
        let result = f(&scope);
        scope.dispose();
        result
    }

    /// Tears the container down.
    ///
    /// Disposes every instance the container owns, newest first: container
    /// controlled singletons, registered instances and per-scope instances
    /// still cached (root scope and scopes not yet closed). Later resolutions
    /// fail with [`DiError::ObjectDisposed`]. Calling `dispose` again returns
    /// an empty report.
    pub fn dispose(&self) -> TeardownReport {
        self.inner.teardown()
    }

    pub fn is_disposed(&self) -> bool {
        self.inner.disposed.load(Ordering::Acquire)
    }

    pub fn options(&self) -> &ContainerOptions {
        &self.inner.options
    }

    /// Descriptors of every registration, in registration order.
    pub fn descriptors(&self) -> Vec<ServiceDescriptor> {
        ServiceDescriptor::collect(&self.inner.registry)
    }

    pub(crate) fn resolve_in(
        &self,
        caller: &dyn ResolverCore,
        scope: ScopeId,
        key: &Key,
    ) -> DiResult<Box<dyn Any + Send>> {
        let observers = &self.inner.observers;
        if !observers.has_observers() {
            return self.resolve_registered(caller, scope, key);
        }

        let start = Instant::now();
        observers.resolving(key);
        let result = self.resolve_registered(caller, scope, key);
        observers.resolved(key, start.elapsed());
        result
    }

    fn resolve_registered(
        &self,
        caller: &dyn ResolverCore,
        scope: ScopeId,
        key: &Key,
    ) -> DiResult<Box<dyn Any + Send>> {
        let inner = self.inner();
        inner.ensure_open()?;

        let (registered, registration) = inner.registry.lookup(key)?;
        let policy = &registration.policy;
        let lifetime = policy.lifetime();

        let locked_policy = match lifetime {
            Lifetime::Transient => None,
            _ => Some(policy.identity()),
        };
        let _guard = ResolutionGuard::enter(
            self.identity(),
            *registered,
            locked_policy,
            inner.options.max_depth,
        )?;

        // Singletons are built against the root so they never capture scoped dependencies.
        let builder: &dyn ResolverCore = match lifetime {
            Lifetime::ContainerControlled | Lifetime::ExternallyControlled => self,
            Lifetime::Transient | Lifetime::PerScope => caller,
        };

        let mut create = || -> DiResult<Instance> {
            let factory = registration
                .factory
                .as_ref()
                .ok_or(DiError::ObjectDisposed(registered.display_name()))?;
            let instance = factory(&ResolverContext::new(builder))?;
            tracing::debug!(capability = %registered, %lifetime, %scope, "constructed");
            inner.observers.created(registered, lifetime);
            Ok(instance)
        };

        let instance = policy.get_or_create(scope, key.display_name(), &mut create)?;
        (registration.project)(&instance).ok_or(DiError::TypeMismatch(key.display_name()))
    }

    pub(crate) fn construct_implicit_in(
        &self,
        caller: &dyn ResolverCore,
        key: &Key,
        build: &dyn Fn(&ResolverContext<'_>) -> DiResult<AnyArc>,
    ) -> DiResult<AnyArc> {
        let inner = self.inner();
        inner.ensure_open()?;
        if !inner.options.implicit_registration {
            return Err(DiError::NotFound(key.display_name()));
        }

        let _guard = ResolutionGuard::enter(self.identity(), *key, None, inner.options.max_depth)?;
        let value = build(&ResolverContext::new(caller))?;
        tracing::debug!(capability = %key, "constructed unregistered type as transient");
        inner.observers.created(key, Lifetime::Transient);
        Ok(value)
    }
}

impl ProviderInner {
    fn ensure_open(&self) -> DiResult<()> {
        if self.disposed.load(Ordering::Acquire) {
            return Err(DiError::ObjectDisposed("ServiceProvider"));
        }
        Ok(())
    }

    fn teardown(&self) -> TeardownReport {
        if self.disposed.swap(true, Ordering::AcqRel) {
            return TeardownReport::empty(Boundary::Container);
        }

        let instances = self
            .registry
            .policies()
            .iter()
            .flat_map(|policy| policy.shutdown())
            .collect();
        let report = dispose_instances(Boundary::Container, instances, &self.observers);
        tracing::debug!(
            disposed = report.disposed,
            failed = report.failures.len(),
            "container torn down"
        );
        report
    }
}

impl Drop for ProviderInner {
    fn drop(&mut self) {
        if self.options.dispose_on_drop {
            self.teardown();
        }
    }
}

impl ResolverCore for ServiceProvider {
    fn resolve_erased(&self, key: &Key) -> DiResult<Box<dyn Any + Send>> {
        self.resolve_in(self, ScopeId::ROOT, key)
    }

    fn is_registered(&self, key: &Key) -> bool {
        self.inner.registry.answers(key)
    }

    fn construct_implicit(
        &self,
        key: &Key,
        build: &dyn Fn(&ResolverContext<'_>) -> DiResult<AnyArc>,
    ) -> DiResult<AnyArc> {
        self.construct_implicit_in(self, key, build)
    }
}

impl Resolver for ServiceProvider {}

impl fmt::Debug for ServiceProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServiceProvider")
            .field("registrations", &self.inner.registry.iter().count())
            .field("policies", &self.inner.registry.policies().len())
            .field("disposed", &self.is_disposed())
            .finish()
    }
}
