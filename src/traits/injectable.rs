//! Construction and capability-projection traits.

use std::sync::Arc;

use crate::error::DiResult;
use crate::provider::ResolverContext;
use crate::traits::Dispose;

/// A concrete type the container knows how to build.
///
/// `construct` declares the type's dependencies explicitly by resolving them
/// from the context. Types implementing `Injectable` can be registered with
/// [`register_type`](crate::ServiceCollection::register_type) and can be
/// resolved with [`resolve_concrete`](crate::Resolver::resolve_concrete) even
/// when they were never registered; such resolutions behave as transient.
///
/// # Examples
///
/// ```
/// use ferrous_lifetimes::{DiResult, Dispose, Injectable, ResolverContext, Resolver, ServiceCollection};
/// use std::sync::Arc;
///
/// struct Settings { greeting: &'static str }
/// impl Dispose for Settings {}
///
/// struct Greeter { settings: Arc<Settings> }
/// impl Dispose for Greeter {}
///
/// impl Injectable for Greeter {
///     fn construct(ctx: &ResolverContext<'_>) -> DiResult<Self> {
///         Ok(Greeter { settings: ctx.resolve::<Settings>()? })
///     }
/// }
///
/// let mut services = ServiceCollection::new();
/// services.register_instance::<Settings, _>(Arc::new(Settings { greeting: "hello" }));
///
/// let provider = services.build().unwrap();
/// let greeter = provider.resolve_concrete::<Greeter>().unwrap();
/// assert_eq!(greeter.settings.greeting, "hello");
/// ```
pub trait Injectable: Dispose + Sized {
    /// Builds a new instance, resolving dependencies through `ctx`.
    fn construct(ctx: &ResolverContext<'_>) -> DiResult<Self>;
}

/// Declares that an implementation can be handed out as capability `C`.
///
/// Registration only honours the mappings that are declared: implementing
/// `Provides<dyn A>` and `Provides<dyn B>` does not make a registration under
/// `dyn A` resolvable as `dyn B`. Every type provides itself.
///
/// The [`provides!`](crate::provides) macro writes the usual trait-object
/// impls.
pub trait Provides<C: ?Sized + Send + Sync + 'static>: Dispose {
    /// Converts the shared implementation into the capability.
    fn provide(self: Arc<Self>) -> Arc<C>;
}

impl<T: Dispose> Provides<T> for T {
    fn provide(self: Arc<Self>) -> Arc<T> {
        self
    }
}

/// Implements [`Provides`] for one or more trait-object capabilities.
///
/// ```
/// use ferrous_lifetimes::{provides, Dispose};
///
/// trait Reader: Send + Sync {}
/// trait Writer: Send + Sync {}
///
/// struct File;
/// impl Dispose for File {}
/// impl Reader for File {}
/// impl Writer for File {}
///
/// provides!(File => dyn Reader, dyn Writer);
/// ```
#[macro_export]
macro_rules! provides {
    ($implementation:ty => $($capability:ty),+ $(,)?) => {
        $(
            impl $crate::Provides<$capability> for $implementation {
                fn provide(self: ::std::sync::Arc<Self>) -> ::std::sync::Arc<$capability> {
                    self
                }
            }
        )+
    };
}
