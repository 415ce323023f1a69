//! # ferrous-lifetimes
//!
//! Lifetime policies and disposal coordination for a dependency injection
//! container.
//!
//! ## Features
//!
//! - **Pluggable lifetimes**: transient, container-controlled, externally-controlled and per-scope policies
//! - **Capability mapping**: register a concrete type under a trait object and resolve only what was mapped
//! - **Named registrations**: the same capability registered several times under different names
//! - **Deterministic teardown**: owned instances disposed once, newest first, with failures reported
//! - **Thread-safe**: concurrent first resolutions of a caching policy build exactly one instance
//! - **Circular dependency detection**: cycles fail with the resolution path instead of hanging
//!
//! ## Quick Start
//!
//! ```rust
//! use ferrous_lifetimes::{provides, DiResult, Dispose, Injectable, Lifetime, Resolver, ResolverContext, ServiceCollection};
//! use std::sync::Arc;
//!
//! trait Repository: Send + Sync {
//!     fn name(&self) -> &str;
//! }
//!
//! struct Database {
//!     connection_string: String,
//! }
//! impl Dispose for Database {}
//!
//! struct UserRepository {
//!     db: Arc<Database>,
//! }
//! impl Dispose for UserRepository {}
//! impl Repository for UserRepository {
//!     fn name(&self) -> &str { "users" }
//! }
//! impl Injectable for UserRepository {
//!     fn construct(ctx: &ResolverContext<'_>) -> DiResult<Self> {
//!         Ok(UserRepository { db: ctx.resolve::<Database>()? })
//!     }
//! }
//! provides!(UserRepository => dyn Repository);
//!
//! let mut services = ServiceCollection::new();
//! services.register_instance::<Database, _>(Arc::new(Database {
//!     connection_string: "postgres://localhost".to_string(),
//! }));
//! services.register_type_with::<dyn Repository, UserRepository>(Lifetime::ContainerControlled);
//!
//! let provider = services.build().unwrap();
//! let repo = provider.resolve::<dyn Repository>().unwrap();
//! assert_eq!(repo.name(), "users");
//!
//! // Disposes the repository, then the database instance.
//! let report = provider.dispose();
//! assert_eq!(report.disposed, 2);
//! ```
//!
//! ## Service Lifetimes
//!
//! - **Transient**: created on every resolution and never disposed by the container (the default)
//! - **ContainerControlled**: created once, disposed at container teardown
//! - **ExternallyControlled**: created once and held weakly; the caller owns disposal
//! - **PerScope**: created once per scope, disposed when the scope closes
//!
//! Every [`Lifetime`] value converts into a fresh [`LifetimePolicy`]. Cloning a
//! policy handle and passing the clones to several registrations makes them
//! share one cached instance.
//!
//! ## Scoped Services
//!
//! ```rust
//! use ferrous_lifetimes::{Dispose, Lifetime, Resolver, ServiceCollection};
//! use std::sync::Arc;
//! use std::sync::atomic::{AtomicUsize, Ordering};
//!
//! struct RequestId(usize);
//! impl Dispose for RequestId {}
//!
//! let counter = Arc::new(AtomicUsize::new(0));
//! let counter_clone = counter.clone();
//!
//! let mut services = ServiceCollection::new();
//! services.register_factory::<RequestId, _, _>(Lifetime::PerScope, move |_| {
//!     Ok(RequestId(counter_clone.fetch_add(1, Ordering::SeqCst) + 1))
//! });
//!
//! let provider = services.build().unwrap();
//! let scope1 = provider.create_scope();
//! let scope2 = provider.create_scope();
//!
//! assert_eq!(scope1.resolve::<RequestId>().unwrap().0, 1);
//! assert_eq!(scope1.resolve::<RequestId>().unwrap().0, 1);
//! assert_eq!(scope2.resolve::<RequestId>().unwrap().0, 2);
//! ```

// Module declarations
pub mod collection;
pub mod config;
pub mod descriptors;
pub mod disposal;
pub mod error;
pub mod key;
pub mod lifetime;
pub mod observer;
pub mod provider;
pub mod traits;

// Internal modules
mod internal;
mod registration;

pub use collection::ServiceCollection;
pub use config::{ContainerOptions, PolicySharing};
pub use descriptors::ServiceDescriptor;
pub use disposal::{Boundary, DisposalFailure, TeardownReport};
pub use error::{BoxError, DiError, DiResult};
pub use key::Key;
pub use lifetime::{Lifetime, LifetimePolicy};
pub use observer::{DiObserver, LifecycleStats, StatsObserver, TracingObserver};
pub use provider::{ResolverContext, Scope, ScopeId, ServiceProvider};
pub use traits::{Dispose, Injectable, Provides, Resolver, ResolverCore};
