//! Resolver traits for service resolution.

use std::any::Any;
use std::sync::Arc;

use crate::error::{DiError, DiResult};
use crate::key::Key;
use crate::provider::ResolverContext;
use crate::registration::AnyArc;
use crate::traits::Injectable;

/// Object-safe core of every resolver.
///
/// Implemented by [`ServiceProvider`](crate::ServiceProvider) (the root
/// scope), [`Scope`](crate::Scope) and [`ResolverContext`]. Most code uses the
/// typed methods of [`Resolver`] instead.
pub trait ResolverCore: Send + Sync {
    /// Resolves the registration for `key` and returns the capability as a
    /// boxed `Arc<C>`.
    fn resolve_erased(&self, key: &Key) -> DiResult<Box<dyn Any + Send>>;

    /// Whether a registration answers `key` (an ambiguous unnamed key
    /// counts, since resolving it reports the candidates).
    fn is_registered(&self, key: &Key) -> bool;

    /// Builds an unregistered concrete type as an implicit transient.
    fn construct_implicit(
        &self,
        key: &Key,
        build: &dyn Fn(&ResolverContext<'_>) -> DiResult<AnyArc>,
    ) -> DiResult<AnyArc>;
}

/// Typed resolution API.
///
/// # Examples
///
/// ```
/// use ferrous_lifetimes::{provides, Dispose, Lifetime, Resolver, ServiceCollection};
/// use std::sync::Arc;
///
/// trait Clock: Send + Sync { fn now(&self) -> u64; }
///
/// struct FixedClock;
/// impl Dispose for FixedClock {}
/// impl Clock for FixedClock { fn now(&self) -> u64 { 42 } }
/// provides!(FixedClock => dyn Clock);
///
/// let mut services = ServiceCollection::new();
/// services.register_factory::<dyn Clock, _, _>(Lifetime::ContainerControlled, |_| Ok(FixedClock));
/// services.register_named_factory::<dyn Clock, _, _>("backup", Lifetime::Transient, |_| Ok(FixedClock));
///
/// let provider = services.build().unwrap();
/// assert_eq!(provider.resolve::<dyn Clock>().unwrap().now(), 42);
/// assert_eq!(provider.resolve_named::<dyn Clock>("backup").unwrap().now(), 42);
/// ```
pub trait Resolver: ResolverCore {
    /// Resolves the unnamed registration of capability `C`.
    ///
    /// Named registrations never answer this call. When `C` has none of its
    /// own but several named ones, it fails with [`DiError::Ambiguous`];
    /// otherwise with [`DiError::NotFound`].
    fn resolve<C: ?Sized + Send + Sync + 'static>(&self) -> DiResult<Arc<C>> {
        let key = Key::of::<C>();
        downcast::<C>(self.resolve_erased(&key)?)
    }

    /// Resolves the registration of `C` qualified by `name`.
    fn resolve_named<C: ?Sized + Send + Sync + 'static>(&self, name: &'static str) -> DiResult<Arc<C>> {
        let key = Key::named::<C>(name);
        downcast::<C>(self.resolve_erased(&key)?)
    }

    /// Resolves a concrete type, building it as an implicit transient when it
    /// has no registration.
    ///
    /// A registered `T` always goes through its registration, so errors from
    /// its factory (including a missing nested dependency) come back as-is.
    fn resolve_concrete<T: Injectable>(&self) -> DiResult<Arc<T>> {
        let key = Key::of::<T>();
        if self.is_registered(&key) {
            return downcast::<T>(self.resolve_erased(&key)?);
        }

        let built = self.construct_implicit(&key, &|ctx| {
            let value: AnyArc = Arc::new(T::construct(ctx)?);
            Ok(value)
        })?;
        built
            .downcast::<T>()
            .map_err(|_| DiError::TypeMismatch(std::any::type_name::<T>()))
    }

    /// Like [`resolve`](Resolver::resolve) but panics on failure.
    fn resolve_required<C: ?Sized + Send + Sync + 'static>(&self) -> Arc<C> {
        self.resolve::<C>()
            .unwrap_or_else(|e| panic!("Failed to resolve {}: {}", std::any::type_name::<C>(), e))
    }

    /// Like [`resolve_named`](Resolver::resolve_named) but panics on failure.
    fn resolve_named_required<C: ?Sized + Send + Sync + 'static>(&self, name: &'static str) -> Arc<C> {
        self.resolve_named::<C>(name).unwrap_or_else(|e| {
            panic!("Failed to resolve named {} ({}): {}", std::any::type_name::<C>(), name, e)
        })
    }
}

fn downcast<C: ?Sized + Send + Sync + 'static>(any: Box<dyn Any + Send>) -> DiResult<Arc<C>> {
    any.downcast::<Arc<C>>()
        .map(|boxed| *boxed)
        .map_err(|_| DiError::TypeMismatch(std::any::type_name::<C>()))
}
