/// Lifetime policy scenarios
///
/// Each test counts constructions and disposals of `MainService` through a
/// `LifecycleCounters` instance injected into the container, then checks the
/// counts after the container is dropped.

use ferrous_lifetimes::{
    provides, BoxError, DiError, DiResult, Dispose, Injectable, Lifetime, LifetimePolicy, Resolver,
    ResolverContext, ServiceCollection,
};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

// ===== Test Services =====

#[derive(Default)]
struct LifecycleCounters {
    constructed: AtomicUsize,
    disposed: AtomicUsize,
}

impl Dispose for LifecycleCounters {}

impl LifecycleCounters {
    fn constructed(&self) -> usize {
        self.constructed.load(Ordering::SeqCst)
    }

    fn disposed(&self) -> usize {
        self.disposed.load(Ordering::SeqCst)
    }
}

trait Main: Send + Sync {
    fn id(&self) -> usize;
}

trait AnotherMain: Send + Sync {
    fn id(&self) -> usize;
}

struct MainService {
    counters: Arc<LifecycleCounters>,
    id: usize,
}

impl MainService {
    fn new(counters: Arc<LifecycleCounters>) -> Self {
        let id = counters.constructed.fetch_add(1, Ordering::SeqCst) + 1;
        Self { counters, id }
    }
}

impl Injectable for MainService {
    fn construct(ctx: &ResolverContext<'_>) -> DiResult<Self> {
        Ok(MainService::new(ctx.resolve::<LifecycleCounters>()?))
    }
}

impl Dispose for MainService {
    fn dispose(&self) -> Result<(), BoxError> {
        self.counters.disposed.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

impl Main for MainService {
    fn id(&self) -> usize {
        self.id
    }
}

impl AnotherMain for MainService {
    fn id(&self) -> usize {
        self.id
    }
}

provides!(MainService => dyn Main, dyn AnotherMain);

// ===== Helpers =====

fn setup() -> (Arc<LifecycleCounters>, ServiceCollection) {
    let counters = Arc::new(LifecycleCounters::default());
    let mut services = ServiceCollection::new();
    services.register_instance_with::<LifecycleCounters, _>(counters.clone(), Lifetime::ExternallyControlled);
    (counters, services)
}

fn same<A: ?Sized, B: ?Sized>(a: &Arc<A>, b: &Arc<B>) -> bool {
    Arc::as_ptr(a) as *const () == Arc::as_ptr(b) as *const ()
}

// ===== Scenarios =====

#[test]
fn unregistered_concrete_type_is_transient_and_never_disposed() {
    let (counters, services) = setup();
    {
        let provider = services.build().unwrap();
        let a = provider.resolve_concrete::<MainService>().unwrap();
        let b = provider.resolve_concrete::<MainService>().unwrap();

        assert!(!same(&a, &b));
        assert_eq!(counters.constructed(), 2);
    }
    assert_eq!(counters.disposed(), 0);
}

#[test]
fn default_registration_is_transient() {
    let (counters, mut services) = setup();
    services.register_type::<dyn Main, MainService>();
    {
        let provider = services.build().unwrap();
        let a = provider.resolve::<dyn Main>().unwrap();
        let b = provider.resolve::<dyn Main>().unwrap();

        assert!(!same(&a, &b));
        assert_eq!(counters.constructed(), 2);
    }
    assert_eq!(counters.disposed(), 0);
}

#[test]
fn explicit_transient_policy() {
    let (counters, mut services) = setup();
    services.register_type_with::<dyn Main, MainService>(LifetimePolicy::transient());
    {
        let provider = services.build().unwrap();
        let a = provider.resolve::<dyn Main>().unwrap();
        let b = provider.resolve::<dyn Main>().unwrap();

        assert_ne!(a.id(), b.id());
        assert_eq!(counters.constructed(), 2);
    }
    assert_eq!(counters.disposed(), 0);
}

#[test]
fn registered_instance_is_returned_and_disposed_by_container() {
    let (counters, mut services) = setup();
    let instance = Arc::new(MainService::new(counters.clone()));
    services.register_instance::<dyn Main, _>(instance.clone());
    {
        let provider = services.build().unwrap();
        let a = provider.resolve::<dyn Main>().unwrap();
        let b = provider.resolve::<dyn Main>().unwrap();

        assert!(same(&a, &b));
        assert!(same(&a, &instance));
        assert_eq!(counters.constructed(), 1);
    }
    assert_eq!(counters.disposed(), 1);
}

#[test]
fn container_controlled_creates_and_disposes_once() {
    let (counters, mut services) = setup();
    services.register_type_with::<dyn Main, MainService>(Lifetime::ContainerControlled);
    {
        let provider = services.build().unwrap();
        let a = provider.resolve::<dyn Main>().unwrap();
        let b = provider.resolve::<dyn Main>().unwrap();

        assert!(same(&a, &b));
        assert_eq!(counters.constructed(), 1);
    }
    assert_eq!(counters.disposed(), 1);
}

#[test]
fn externally_controlled_is_shared_but_never_disposed() {
    let (counters, mut services) = setup();
    services.register_type_with::<dyn Main, MainService>(Lifetime::ExternallyControlled);
    {
        let provider = services.build().unwrap();
        let a = provider.resolve::<dyn Main>().unwrap();
        let b = provider.resolve::<dyn Main>().unwrap();

        assert!(same(&a, &b));
        assert_eq!(counters.constructed(), 1);
    }
    assert_eq!(counters.disposed(), 0);
}

#[test]
fn externally_controlled_recreates_after_caller_releases() {
    let (counters, mut services) = setup();
    services.register_type_with::<dyn Main, MainService>(Lifetime::ExternallyControlled);
    let provider = services.build().unwrap();

    let first = provider.resolve::<dyn Main>().unwrap().id();
    let second = provider.resolve::<dyn Main>().unwrap().id();

    assert_ne!(first, second);
    assert_eq!(counters.constructed(), 2);
    assert_eq!(counters.disposed(), 0);
}

#[test]
fn named_registrations_have_independent_policies() {
    let (counters, mut services) = setup();
    services.register_named_type::<dyn Main, MainService>("1", Lifetime::ContainerControlled);
    services.register_named_type::<dyn Main, MainService>("2", Lifetime::ContainerControlled);
    {
        let provider = services.build().unwrap();

        let err = provider.resolve::<dyn Main>().err().unwrap();
        assert!(matches!(err, DiError::Ambiguous { .. }));
        assert!(err.is_resolution_failure());

        let one_a = provider.resolve_named::<dyn Main>("1").unwrap();
        let one_b = provider.resolve_named::<dyn Main>("1").unwrap();
        let two_a = provider.resolve_named::<dyn Main>("2").unwrap();
        let two_b = provider.resolve_named::<dyn Main>("2").unwrap();

        assert!(same(&one_a, &one_b));
        assert!(same(&two_a, &two_b));
        assert!(!same(&one_a, &two_a));
        assert_eq!(counters.constructed(), 2);
    }
    assert_eq!(counters.disposed(), 2);
}

#[test]
fn only_mapped_capabilities_resolve() {
    let (counters, mut services) = setup();
    services.register_type_with::<dyn Main, MainService>(Lifetime::ContainerControlled);
    {
        let provider = services.build().unwrap();
        let service = provider.resolve::<dyn Main>().unwrap();

        let err = provider.resolve::<dyn AnotherMain>().err().unwrap();
        assert!(matches!(err, DiError::NotFound(_)));
        assert!(err.is_resolution_failure());

        assert_eq!(service.id(), 1);
        assert_eq!(counters.constructed(), 1);
    }
    assert_eq!(counters.disposed(), 1);
}

#[test]
fn distinct_policies_on_one_type_stay_independent() {
    let (counters, mut services) = setup();
    services.register_type_with::<dyn Main, MainService>(Lifetime::Transient);
    services.register_type_with::<dyn AnotherMain, MainService>(Lifetime::ContainerControlled);
    {
        let provider = services.build().unwrap();
        let a = provider.resolve::<dyn Main>().unwrap();
        let b = provider.resolve::<dyn Main>().unwrap();
        let another_a = provider.resolve::<dyn AnotherMain>().unwrap();
        let another_b = provider.resolve::<dyn AnotherMain>().unwrap();

        assert!(!same(&a, &b));
        assert!(same(&another_a, &another_b));
        assert!(!same(&a, &another_a));
        assert_eq!(counters.constructed(), 3);
    }
    assert_eq!(counters.disposed(), 1);
}

#[test]
fn distinct_policies_on_one_type_stay_independent_in_reverse_order() {
    let (counters, mut services) = setup();
    services.register_type_with::<dyn Main, MainService>(Lifetime::ContainerControlled);
    services.register_type_with::<dyn AnotherMain, MainService>(Lifetime::Transient);
    {
        let provider = services.build().unwrap();
        let a = provider.resolve::<dyn Main>().unwrap();
        let b = provider.resolve::<dyn Main>().unwrap();
        let another_a = provider.resolve::<dyn AnotherMain>().unwrap();
        let another_b = provider.resolve::<dyn AnotherMain>().unwrap();

        assert!(same(&a, &b));
        assert!(!same(&another_a, &another_b));
        assert!(!same(&a, &another_a));
        assert_eq!(counters.constructed(), 3);
    }
    assert_eq!(counters.disposed(), 1);
}

#[test]
fn instance_registered_twice_is_disposed_twice() {
    let (counters, mut services) = setup();
    let instance = Arc::new(MainService::new(counters.clone()));
    services.register_instance::<dyn Main, _>(instance.clone());
    services.register_instance::<dyn AnotherMain, _>(instance.clone());
    {
        let provider = services.build().unwrap();
        let a = provider.resolve::<dyn Main>().unwrap();
        let another = provider.resolve::<dyn AnotherMain>().unwrap();

        assert!(same(&a, &another));
        assert_eq!(counters.constructed(), 1);
    }
    assert_eq!(counters.disposed(), 2);
}

#[test]
fn instance_registered_twice_with_external_ownership_is_disposed_once() {
    let (counters, mut services) = setup();
    let instance = Arc::new(MainService::new(counters.clone()));
    services.register_instance_with::<dyn Main, _>(instance.clone(), Lifetime::ContainerControlled);
    services.register_instance_with::<dyn AnotherMain, _>(instance.clone(), Lifetime::ExternallyControlled);
    {
        let provider = services.build().unwrap();
        let a = provider.resolve::<dyn Main>().unwrap();
        let another = provider.resolve::<dyn AnotherMain>().unwrap();

        assert!(same(&a, &another));
        assert_eq!(counters.constructed(), 1);
    }
    assert_eq!(counters.disposed(), 1);
}

#[test]
fn released_external_instance_registration_reports_disposed() {
    let (counters, mut services) = setup();
    let instance = Arc::new(MainService::new(counters.clone()));
    services.register_instance_with::<dyn Main, _>(instance, Lifetime::ExternallyControlled);
    let provider = services.build().unwrap();

    assert!(matches!(provider.resolve::<dyn Main>(), Err(DiError::ObjectDisposed(_))));
    assert_eq!(counters.constructed(), 1);
}

#[test]
fn per_scope_instances_follow_their_scope() {
    let (counters, mut services) = setup();
    services.register_type_with::<dyn Main, MainService>(Lifetime::PerScope);
    let provider = services.build().unwrap();
    {
        let request = provider.create_scope();
        let a = request.resolve::<dyn Main>().unwrap();
        let b = request.resolve::<dyn Main>().unwrap();
        assert!(same(&a, &b));
    }
    assert_eq!((counters.constructed(), counters.disposed()), (1, 1));

    {
        let request = provider.create_scope();
        request.resolve::<dyn Main>().unwrap();
    }
    assert_eq!((counters.constructed(), counters.disposed()), (2, 2));
}

#[test]
fn container_controlled_services_outlive_scopes() {
    let (counters, mut services) = setup();
    services.register_type_with::<dyn Main, MainService>(Lifetime::ContainerControlled);
    let provider = services.build().unwrap();

    let from_scope = {
        let scope = provider.create_scope();
        scope.resolve::<dyn Main>().unwrap()
    };
    assert_eq!(counters.disposed(), 0);

    let from_root = provider.resolve::<dyn Main>().unwrap();
    assert!(same(&from_scope, &from_root));

    drop(provider);
    assert_eq!(counters.disposed(), 1);
}
