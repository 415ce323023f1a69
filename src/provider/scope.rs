//! Scoped resolution and scope teardown.

use std::any::Any;
use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use super::{ResolverContext, ServiceProvider};
use crate::disposal::{Boundary, TeardownReport};
use crate::registration::AnyArc;
use crate::traits::{Resolver, ResolverCore};
use crate::{DiError, DiResult, Key};

static NEXT_SCOPE: AtomicU64 = AtomicU64::new(1);

/// Identity of a scope. The container itself is [`ScopeId::ROOT`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ScopeId(u64);

impl ScopeId {
    /// The root scope owned by the service provider.
    pub const ROOT: ScopeId = ScopeId(0);

    pub(crate) fn next() -> Self {
        ScopeId(NEXT_SCOPE.fetch_add(1, Ordering::Relaxed))
    }

    pub fn is_root(self) -> bool {
        self == ScopeId::ROOT
    }
}

impl fmt::Display for ScopeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_root() {
            f.write_str("scope#root")
        } else {
            write!(f, "scope#{}", self.0)
        }
    }
}

/// Child scope for per-scope resolution.
///
/// Per-scope registrations get one instance per scope; container-controlled
/// ones are still shared with the root provider. Closing the scope, either
/// with [`dispose`](Scope::dispose) or by dropping it, disposes the per-scope
/// instances it created, newest first.
///
/// # Examples
///
/// ```
/// use ferrous_lifetimes::{BoxError, Dispose, Lifetime, Resolver, ServiceCollection};
/// use std::sync::Arc;
/// use std::sync::atomic::{AtomicUsize, Ordering};
///
/// static CLOSED: AtomicUsize = AtomicUsize::new(0);
///
/// struct UnitOfWork;
/// impl Dispose for UnitOfWork {
///     fn dispose(&self) -> Result<(), BoxError> {
///         CLOSED.fetch_add(1, Ordering::SeqCst);
///         Ok(())
///     }
/// }
///
/// let mut services = ServiceCollection::new();
/// services.register_factory::<UnitOfWork, _, _>(Lifetime::PerScope, |_| Ok(UnitOfWork));
/// let provider = services.build().unwrap();
///
/// let scope = provider.create_scope();
/// let a = scope.resolve::<UnitOfWork>().unwrap();
/// let b = scope.resolve::<UnitOfWork>().unwrap();
/// assert!(Arc::ptr_eq(&a, &b));
///
/// let report = scope.dispose();
/// assert_eq!(report.disposed, 1);
/// assert_eq!(CLOSED.load(Ordering::SeqCst), 1);
/// assert!(scope.resolve::<UnitOfWork>().is_err());
/// ```
pub struct Scope {
    pub(crate) root: ServiceProvider,
    id: ScopeId,
    disposed: AtomicBool,
}

impl Scope {
    pub(crate) fn new(root: ServiceProvider) -> Self {
        let id = ScopeId::next();
        tracing::debug!(scope = %id, "scope opened");
        Self {
            root,
            id,
            disposed: AtomicBool::new(false),
        }
    }

    pub fn id(&self) -> ScopeId {
        self.id
    }

    /// The provider this scope was created from.
    pub fn provider(&self) -> &ServiceProvider {
        &self.root
    }

    pub fn is_disposed(&self) -> bool {
        self.disposed.load(Ordering::Acquire)
    }

    /// Closes the scope and disposes its per-scope instances.
    ///
    /// Later resolutions through this scope fail with
    /// [`DiError::ObjectDisposed`]. Calling `dispose` again returns an empty
    /// report.
    pub fn dispose(&self) -> TeardownReport {
        let boundary = Boundary::Scope(self.id);
        if self.disposed.swap(true, Ordering::AcqRel) {
            return TeardownReport::empty(boundary);
        }

        let inner = self.root.inner();
        let instances = inner
            .registry
            .policies()
            .iter()
            .flat_map(|policy| policy.release_scope(self.id))
            .collect();
        let report = crate::disposal::dispose_instances(boundary, instances, &inner.observers);
        tracing::debug!(scope = %self.id, disposed = report.disposed, failed = report.failures.len(), "scope closed");
        report
    }

    fn ensure_open(&self) -> DiResult<()> {
        if self.is_disposed() {
            return Err(DiError::ObjectDisposed("Scope"));
        }
        Ok(())
    }
}

impl ResolverCore for Scope {
    fn resolve_erased(&self, key: &Key) -> DiResult<Box<dyn Any + Send>> {
        self.ensure_open()?;
        self.root.resolve_in(self, self.id, key)
    }

    fn is_registered(&self, key: &Key) -> bool {
        self.root.is_registered(key)
    }

    fn construct_implicit(
        &self,
        key: &Key,
        build: &dyn Fn(&ResolverContext<'_>) -> DiResult<AnyArc>,
    ) -> DiResult<AnyArc> {
        self.ensure_open()?;
        self.root.construct_implicit_in(self, key, build)
    }
}

impl Resolver for Scope {}

impl Drop for Scope {
    fn drop(&mut self) {
        if self.root.inner().options.dispose_on_drop {
            self.dispose();
        }
    }
}

impl fmt::Debug for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Scope")
            .field("id", &self.id)
            .field("disposed", &self.is_disposed())
            .finish()
    }
}
