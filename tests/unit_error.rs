use ferrous_lifetimes::{DiError, DiResult, Dispose, Injectable, Lifetime, Resolver, ResolverContext, ServiceCollection};
use std::error::Error;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

struct Flaky;
impl Dispose for Flaky {}

#[test]
fn display_messages() {
    assert_eq!(DiError::NotFound("app::Db").to_string(), "Service not found: app::Db");
    assert_eq!(DiError::NamedNotFound("app::Db", "replica").to_string(), "Service not found: app::Db (replica)");
    assert_eq!(
        DiError::Ambiguous { capability: "app::Db", names: vec!["a", "b"] }.to_string(),
        "Ambiguous resolution for app::Db: registered under [a, b]"
    );
    assert_eq!(DiError::Circular(vec!["A", "B", "A"]).to_string(), "Circular dependency: A -> B -> A");
    assert_eq!(DiError::DepthExceeded(8).to_string(), "Max depth 8 exceeded");
    assert_eq!(DiError::ObjectDisposed("Scope").to_string(), "Cannot access a disposed object: Scope");
}

#[test]
fn resolution_failure_family() {
    assert!(DiError::NotFound("x").is_resolution_failure());
    assert!(DiError::NamedNotFound("x", "n").is_resolution_failure());
    assert!(DiError::Ambiguous { capability: "x", names: vec![] }.is_resolution_failure());
    assert!(DiError::TypeMismatch("x").is_resolution_failure());
    assert!(DiError::Circular(vec!["x"]).is_resolution_failure());
    assert!(DiError::DepthExceeded(1).is_resolution_failure());

    assert!(!DiError::ObjectDisposed("x").is_resolution_failure());
    assert!(!DiError::factory("x", "boom").is_resolution_failure());
    assert!(!DiError::InvalidRegistration { capability: "x", reason: "r".into() }.is_resolution_failure());
}

#[test]
fn factory_errors_keep_their_source() {
    let mut services = ServiceCollection::new();
    services.register_factory::<Flaky, Flaky, _>(Lifetime::ContainerControlled, |_| {
        let io = std::io::Error::new(std::io::ErrorKind::ConnectionRefused, "refused");
        Err(DiError::factory("Flaky", io))
    });

    let provider = services.build().unwrap();
    let err = provider.resolve::<Flaky>().err().unwrap();
    assert_eq!(err.to_string(), "Factory for Flaky failed: refused");
    assert_eq!(err.source().map(|s| s.to_string()), Some("refused".to_string()));
}

#[test]
fn per_scope_instance_registration_is_invalid() {
    let mut services = ServiceCollection::new();
    services.register_instance_with::<Flaky, _>(std::sync::Arc::new(Flaky), Lifetime::PerScope);

    let err = services.build().err().unwrap();
    assert!(matches!(err, DiError::InvalidRegistration { .. }));
    assert!(err.to_string().contains("per-scope"));
}

trait Missing: Send + Sync {}

static IMPLICIT_BUILDS: AtomicUsize = AtomicUsize::new(0);

struct Report;
impl Dispose for Report {}

impl Injectable for Report {
    fn construct(_: &ResolverContext<'_>) -> DiResult<Self> {
        IMPLICIT_BUILDS.fetch_add(1, Ordering::SeqCst);
        Ok(Report)
    }
}

#[test]
fn missing_nested_dependency_of_a_registered_concrete_type_propagates() {
    let factory_calls = Arc::new(AtomicUsize::new(0));
    let calls = factory_calls.clone();
    let mut services = ServiceCollection::new();
    services.register_factory::<Report, _, _>(Lifetime::ContainerControlled, move |ctx| {
        calls.fetch_add(1, Ordering::SeqCst);
        ctx.resolve::<dyn Missing>()?;
        Ok(Report)
    });

    let provider = services.build().unwrap();
    for _ in 0..2 {
        match provider.resolve_concrete::<Report>() {
            Err(DiError::NotFound(name)) => assert!(name.contains("Missing")),
            _ => panic!("expected the nested not-found error"),
        }
    }
    assert!(provider.create_scope().resolve_concrete::<Report>().is_err());
    assert_eq!(factory_calls.load(Ordering::SeqCst), 3);
    assert_eq!(IMPLICIT_BUILDS.load(Ordering::SeqCst), 0);
}
