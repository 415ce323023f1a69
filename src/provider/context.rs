//! Resolver context handed to factories.

use std::any::Any;

use crate::registration::AnyArc;
use crate::traits::{Resolver, ResolverCore};
use crate::{DiResult, Key};

/// Context passed to factories and [`Injectable::construct`](crate::Injectable::construct).
///
/// Dependencies resolved through the context come from the same scope as the
/// service being built, except for container-controlled and
/// externally-controlled services, which are always built against the root
/// provider.
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
/// struct UserService { db: Arc<Database> }
/// impl Dispose for UserService {}
///
/// let mut services = ServiceCollection::new();
/// services.register_instance::<Database, _>(Arc::new(Database { url: "postgres://localhost".into() }));
/// services.register_factory::<UserService, _, _>(Lifetime::Transient, |ctx| {
///     Ok(UserService { db: ctx.resolve::<Database>()? })
/// });
///
/// let provider = services.build().unwrap();
/// assert_eq!(provider.resolve::<UserService>().unwrap().db.url, "postgres://localhost");
/// ```
pub struct ResolverContext<'a> {
    resolver: &'a dyn ResolverCore,
}

impl<'a> ResolverContext<'a> {
    pub(crate) fn new(resolver: &'a dyn ResolverCore) -> Self {
        Self { resolver }
    }
}

impl<'a> ResolverCore for ResolverContext<'a> {
    fn resolve_erased(&self, key: &Key) -> DiResult<Box<dyn Any + Send>> {
        self.resolver.resolve_erased(key)
    }

    fn is_registered(&self, key: &Key) -> bool {
        self.resolver.is_registered(key)
    }

    fn construct_implicit(
        &self,
        key: &Key,
        build: &dyn Fn(&ResolverContext<'_>) -> DiResult<AnyArc>,
    ) -> DiResult<AnyArc> {
        self.resolver.construct_implicit(key, build)
    }
}

impl<'a> Resolver for ResolverContext<'a> {}
