//! Service collection module for dependency injection.
//!
//! This module contains the ServiceCollection type used to register
//! capabilities under lifetime policies and build service providers.

use std::any::{Any, TypeId};
use std::sync::Arc;

use crate::config::ContainerOptions;
use crate::observer::Observers;
use crate::provider::ResolverContext;
use crate::registration::{Factory, Instance, Projection, Registration, Registry};
use crate::traits::{Injectable, Provides};
use crate::{DiError, DiObserver, DiResult, Key, Lifetime, LifetimePolicy, ServiceDescriptor, ServiceProvider};

/// Registration table under construction.
///
/// Each `register_*` call binds a capability (a concrete type or a trait
/// object), optionally qualified by a name, to an implementation and a
/// [`LifetimePolicy`]. Registering the same capability and name again replaces
/// the previous registration. [`build`](ServiceCollection::build) validates
/// the table and produces a [`ServiceProvider`].
///
/// # Examples
///
/// ```
/// use ferrous_lifetimes::{provides, DiResult, Dispose, Injectable, Lifetime, Resolver, ResolverContext, ServiceCollection};
/// use std::sync::Arc;
///
/// trait Greeter: Send + Sync { fn greet(&self) -> String; }
///
/// struct English;
/// impl Dispose for English {}
/// impl Injectable for English {
///     fn construct(_: &ResolverContext<'_>) -> DiResult<Self> { Ok(English) }
/// }
/// impl Greeter for English { fn greet(&self) -> String { "hello".into() } }
/// provides!(English => dyn Greeter);
///
/// let mut services = ServiceCollection::new();
/// services.register_type_with::<dyn Greeter, English>(Lifetime::ContainerControlled);
///
/// let provider = services.build().unwrap();
/// let a = provider.resolve::<dyn Greeter>().unwrap();
/// let b = provider.resolve::<dyn Greeter>().unwrap();
/// assert!(Arc::ptr_eq(&a, &b));
/// assert_eq!(a.greet(), "hello");
/// ```
pub struct ServiceCollection {
    registry: Registry,
    observers: Observers,
    options: ContainerOptions,
    errors: Vec<DiError>,
}

impl Default for ServiceCollection {
    fn default() -> Self {
        Self::new()
    }
}

impl ServiceCollection {
    /// Creates a new empty service collection with default options.
    pub fn new() -> Self {
        Self::with_options(ContainerOptions::default())
    }

    pub fn with_options(options: ContainerOptions) -> Self {
        Self {
            registry: Registry::new(),
            observers: Observers::new(),
            options,
            errors: Vec::new(),
        }
    }

    pub fn options(&self) -> &ContainerOptions {
        &self.options
    }

    // ----- Type registrations -----

    /// Registers `T` as capability `C` with a transient policy.
    ///
    /// This is the default lifetime: every resolution constructs a new `T` and
    /// the container never disposes it.
    pub fn register_type<C, T>(&mut self) -> &mut Self
    where
        C: ?Sized + Send + Sync + 'static,
        T: Injectable + Provides<C>,
    {
        self.register_type_with::<C, T>(Lifetime::Transient)
    }

    /// Registers `T` as capability `C` under `policy`.
    ///
    /// Passing a [`Lifetime`] gives the registration its own policy. Passing a
    /// clone of an existing [`LifetimePolicy`] shares that policy's cache.
    pub fn register_type_with<C, T>(&mut self, policy: impl Into<LifetimePolicy>) -> &mut Self
    where
        C: ?Sized + Send + Sync + 'static,
        T: Injectable + Provides<C>,
    {
        self.insert_factory::<C, T, _>(Key::of::<C>(), policy.into(), T::construct);
        self
    }

    /// Registers `T` as capability `C` under `name`.
    pub fn register_named_type<C, T>(&mut self, name: &'static str, policy: impl Into<LifetimePolicy>) -> &mut Self
    where
        C: ?Sized + Send + Sync + 'static,
        T: Injectable + Provides<C>,
    {
        self.insert_factory::<C, T, _>(Key::named::<C>(name), policy.into(), T::construct);
        self
    }

    // ----- Factory registrations -----

    /// Registers a factory producing the implementation of capability `C`.
    ///
    /// Errors returned by the factory propagate to the caller of `resolve`
    /// and nothing is cached.
    pub fn register_factory<C, T, F>(&mut self, policy: impl Into<LifetimePolicy>, factory: F) -> &mut Self
    where
        C: ?Sized + Send + Sync + 'static,
        T: Provides<C>,
        F: Fn(&ResolverContext<'_>) -> DiResult<T> + Send + Sync + 'static,
    {
        self.insert_factory::<C, T, F>(Key::of::<C>(), policy.into(), factory);
        self
    }

    /// Registers a factory for capability `C` under `name`.
    pub fn register_named_factory<C, T, F>(
        &mut self,
        name: &'static str,
        policy: impl Into<LifetimePolicy>,
        factory: F,
    ) -> &mut Self
    where
        C: ?Sized + Send + Sync + 'static,
        T: Provides<C>,
        F: Fn(&ResolverContext<'_>) -> DiResult<T> + Send + Sync + 'static,
    {
        self.insert_factory::<C, T, F>(Key::named::<C>(name), policy.into(), factory);
        self
    }

    // ----- Instance registrations -----

    /// Registers an existing instance as capability `C`.
    ///
    /// The container treats it as a container-controlled singleton and
    /// disposes it at teardown.
    ///
    /// ```
    /// use ferrous_lifetimes::{Dispose, Resolver, ServiceCollection};
    /// use std::sync::Arc;
    ///
    /// struct Settings { retries: u32 }
    /// impl Dispose for Settings {}
    ///
    /// let settings = Arc::new(Settings { retries: 3 });
    /// let mut services = ServiceCollection::new();
    /// services.register_instance::<Settings, _>(settings.clone());
    ///
    /// let provider = services.build().unwrap();
    /// assert!(Arc::ptr_eq(&provider.resolve::<Settings>().unwrap(), &settings));
    /// ```
    pub fn register_instance<C, T>(&mut self, instance: Arc<T>) -> &mut Self
    where
        C: ?Sized + Send + Sync + 'static,
        T: Provides<C>,
    {
        self.register_instance_with::<C, T>(instance, Lifetime::ContainerControlled)
    }

    /// Registers an existing instance as capability `C` under `policy`.
    ///
    /// Only container-controlled and externally-controlled policies can hold
    /// an instance; other policies make [`build`](ServiceCollection::build)
    /// fail with [`DiError::InvalidRegistration`]. With an externally
    /// controlled policy the container keeps only a weak reference and never
    /// disposes the instance.
    pub fn register_instance_with<C, T>(&mut self, instance: Arc<T>, policy: impl Into<LifetimePolicy>) -> &mut Self
    where
        C: ?Sized + Send + Sync + 'static,
        T: Provides<C>,
    {
        self.insert_instance::<C, T>(Key::of::<C>(), instance, policy.into());
        self
    }

    /// Registers an existing instance as capability `C` under `name`.
    pub fn register_named_instance<C, T>(
        &mut self,
        name: &'static str,
        instance: Arc<T>,
        policy: impl Into<LifetimePolicy>,
    ) -> &mut Self
    where
        C: ?Sized + Send + Sync + 'static,
        T: Provides<C>,
    {
        self.insert_instance::<C, T>(Key::named::<C>(name), instance, policy.into());
        self
    }

    // ----- Conditional registrations -----

    /// Registers `T` as `C` unless `C` already has an unnamed registration.
    ///
    /// Returns `true` when the registration was added.
    ///
    /// ```
    /// use ferrous_lifetimes::{DiResult, Dispose, Injectable, Lifetime, ResolverContext, ServiceCollection};
    ///
    /// struct Clock;
    /// impl Dispose for Clock {}
    /// impl Injectable for Clock {
    ///     fn construct(_: &ResolverContext<'_>) -> DiResult<Self> { Ok(Clock) }
    /// }
    ///
    /// let mut services = ServiceCollection::new();
    /// assert!(services.try_register_type_with::<Clock, Clock>(Lifetime::ContainerControlled));
    /// assert!(!services.try_register_type_with::<Clock, Clock>(Lifetime::Transient));
    /// ```
    pub fn try_register_type_with<C, T>(&mut self, policy: impl Into<LifetimePolicy>) -> bool
    where
        C: ?Sized + Send + Sync + 'static,
        T: Injectable + Provides<C>,
    {
        if self.contains::<C>() {
            return false;
        }
        self.register_type_with::<C, T>(policy);
        true
    }

    /// Registers a factory for `C` unless `C` already has an unnamed registration.
    pub fn try_register_factory<C, T, F>(&mut self, policy: impl Into<LifetimePolicy>, factory: F) -> bool
    where
        C: ?Sized + Send + Sync + 'static,
        T: Provides<C>,
        F: Fn(&ResolverContext<'_>) -> DiResult<T> + Send + Sync + 'static,
    {
        if self.contains::<C>() {
            return false;
        }
        self.register_factory::<C, T, F>(policy, factory);
        true
    }

    /// Registers an instance for `C` unless `C` already has an unnamed registration.
    pub fn try_register_instance<C, T>(&mut self, instance: Arc<T>) -> bool
    where
        C: ?Sized + Send + Sync + 'static,
        T: Provides<C>,
    {
        if self.contains::<C>() {
            return false;
        }
        self.register_instance::<C, T>(instance);
        true
    }

    /// Whether capability `C` has an unnamed registration.
    pub fn contains<C: ?Sized + 'static>(&self) -> bool {
        self.registry.contains_key(&Key::of::<C>())
    }

    /// Whether capability `C` has a registration under `name`.
    pub fn contains_named<C: ?Sized + 'static>(&self, name: &'static str) -> bool {
        self.registry.contains_key(&Key::named::<C>(name))
    }

    /// Adds an observer notified of resolutions, creations and disposals.
    pub fn add_observer(&mut self, observer: Arc<dyn DiObserver>) -> &mut Self {
        self.observers.add(observer);
        self
    }

    /// Descriptors of the current registrations, in registration order.
    pub fn descriptors(&self) -> Vec<ServiceDescriptor> {
        ServiceDescriptor::collect(&self.registry)
    }

    /// Validates the registrations and builds the provider.
    ///
    /// Fails with the first invalid registration, or when a policy is shared
    /// between registrations while [`PolicySharing::Forbid`](crate::PolicySharing::Forbid)
    /// is configured.
    pub fn build(mut self) -> DiResult<ServiceProvider> {
        if !self.errors.is_empty() {
            return Err(self.errors.swap_remove(0));
        }
        self.registry.finalize(self.options.policy_sharing)?;
        tracing::debug!(
            registrations = self.registry.iter().count(),
            policies = self.registry.policies().len(),
            "service provider built"
        );
        Ok(ServiceProvider::new(self.registry, self.observers, self.options))
    }

    // ----- Internals -----

    fn insert_factory<C, T, F>(&mut self, key: Key, policy: LifetimePolicy, factory: F)
    where
        C: ?Sized + Send + Sync + 'static,
        T: Provides<C>,
        F: Fn(&ResolverContext<'_>) -> DiResult<T> + Send + Sync + 'static,
    {
        let factory: Factory = Arc::new(move |ctx: &ResolverContext<'_>| -> DiResult<Instance> {
            let value = factory(ctx)?;
            Ok(Instance::new(key, Arc::new(value)))
        });
        self.insert(key, Registration {
            policy,
            factory: Some(factory),
            project: projection::<C, T>(),
            impl_id: TypeId::of::<T>(),
            impl_name: std::any::type_name::<T>(),
        });
    }

    fn insert_instance<C, T>(&mut self, key: Key, instance: Arc<T>, policy: LifetimePolicy)
    where
        C: ?Sized + Send + Sync + 'static,
        T: Provides<C>,
    {
        if let Err(reason) = policy.preload(Instance::new(key, instance)) {
            self.errors.push(DiError::InvalidRegistration {
                capability: key.display_name(),
                reason: format!("{} instance registration: {}", policy.lifetime(), reason),
            });
        }
        self.insert(key, Registration {
            policy,
            factory: None,
            project: projection::<C, T>(),
            impl_id: TypeId::of::<T>(),
            impl_name: std::any::type_name::<T>(),
        });
    }

    fn insert(&mut self, key: Key, registration: Registration) {
        let lifetime = registration.policy.lifetime();
        if let Some(previous) = self.registry.insert(key, registration) {
            tracing::debug!(
                capability = %key,
                previous = %previous.policy.lifetime(),
                %lifetime,
                "registration replaced"
            );
        }
    }
}

fn projection<C, T>() -> Projection
where
    C: ?Sized + Send + Sync + 'static,
    T: Provides<C>,
{
    Arc::new(|instance: &Instance| -> Option<Box<dyn Any + Send>> {
        let implementation = instance.value.clone().downcast::<T>().ok()?;
        let capability: Arc<C> = <T as Provides<C>>::provide(implementation);
        Some(Box::new(capability))
    })
}
