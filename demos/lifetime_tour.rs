//! Lifetime Tour - every registration policy in one run
//!
//! This example demonstrates:
//! - Resolving unregistered types and default transient registrations
//! - Container-controlled, externally-controlled and per-scope caching
//! - Instance registrations and named (keyed) registrations
//! - One implementation exposed under several capabilities
//! - Teardown reports for scopes and the container
//!
//! Run with `RUST_LOG=ferrous_lifetimes=debug` to watch the container log.

use ferrous_lifetimes::*;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

static NEXT_ID: AtomicUsize = AtomicUsize::new(1);

trait Greeter: Send + Sync {
    fn greet(&self) -> String;
}

trait Farewell: Send + Sync {
    fn bye(&self) -> String;
}

/// Service that reports when the container constructs and disposes it
struct Service {
    id: usize,
}

impl Service {
    fn new() -> Self {
        let id = NEXT_ID.fetch_add(1, Ordering::SeqCst);
        println!("  constructed Service #{}", id);
        Self { id }
    }
}

impl Dispose for Service {
    fn dispose(&self) -> Result<(), BoxError> {
        println!("  disposed Service #{}", self.id);
        Ok(())
    }
}

impl Injectable for Service {
    fn construct(_: &ResolverContext<'_>) -> DiResult<Self> {
        Ok(Service::new())
    }
}

impl Greeter for Service {
    fn greet(&self) -> String {
        format!("hello from #{}", self.id)
    }
}

impl Farewell for Service {
    fn bye(&self) -> String {
        format!("goodbye from #{}", self.id)
    }
}

provides!(Service => dyn Greeter, dyn Farewell);

fn same<A: ?Sized, B: ?Sized>(a: &Arc<A>, b: &Arc<B>) -> bool {
    Arc::as_ptr(a) as *const () == Arc::as_ptr(b) as *const ()
}

fn section(title: &str) {
    println!("\n== {} ==", title);
}

fn main() -> DiResult<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    section("Unregistered type");
    {
        let provider = ServiceCollection::new().build()?;
        let a = provider.resolve_concrete::<Service>()?;
        let b = provider.resolve_concrete::<Service>()?;
        println!("  same instance: {}", same(&a, &b));
    }

    section("Default registration is transient");
    {
        let mut services = ServiceCollection::new();
        services.register_type::<Service, Service>();
        let provider = services.build()?;
        let a = provider.resolve::<Service>()?;
        let b = provider.resolve::<Service>()?;
        println!("  same instance: {}", same(&a, &b));
        println!("  disposed at teardown: {}", provider.dispose().disposed);
    }

    section("Container-controlled");
    {
        let mut services = ServiceCollection::new();
        services.register_type_with::<dyn Greeter, Service>(Lifetime::ContainerControlled);
        let provider = services.build()?;
        let a = provider.resolve::<dyn Greeter>()?;
        let b = provider.create_scope().resolve::<dyn Greeter>()?;
        println!("  {} / same instance: {}", a.greet(), same(&a, &b));
        println!("  disposed at teardown: {}", provider.dispose().disposed);
    }

    section("Externally-controlled");
    {
        let mut services = ServiceCollection::new();
        services.register_type_with::<Service, Service>(Lifetime::ExternallyControlled);
        let provider = services.build()?;
        let held = provider.resolve::<Service>()?;
        println!("  same while held: {}", same(&held, &provider.resolve::<Service>()?));
        drop(held);
        let fresh = provider.resolve::<Service>()?;
        println!("  rebuilt after release: Service #{}", fresh.id);
        println!("  disposed at teardown: {}", provider.dispose().disposed);
    }

    section("Instance registration");
    {
        let existing = Arc::new(Service::new());
        let mut services = ServiceCollection::new();
        services.register_instance::<Service, _>(existing.clone());
        let provider = services.build()?;
        println!("  same as registered: {}", same(&existing, &provider.resolve::<Service>()?));
        println!("  disposed at teardown: {}", provider.dispose().disposed);
    }

    section("Instance registered twice, second externally owned");
    {
        let first = Arc::new(Service::new());
        let second = Arc::new(Service::new());
        let mut services = ServiceCollection::new();
        services.register_named_instance::<Service, _>("owned", first, Lifetime::ContainerControlled);
        services.register_named_instance::<Service, _>("borrowed", second.clone(), Lifetime::ExternallyControlled);
        let provider = services.build()?;
        println!("  borrowed resolves: {}", same(&second, &provider.resolve_named::<Service>("borrowed")?));
        println!("  disposed at teardown: {}", provider.dispose().disposed);
    }

    section("Named registrations");
    {
        let mut services = ServiceCollection::new();
        services.register_named_type::<dyn Greeter, Service>("primary", Lifetime::ContainerControlled);
        services.register_named_type::<dyn Greeter, Service>("backup", Lifetime::ContainerControlled);
        let provider = services.build()?;
        let primary = provider.resolve_named::<dyn Greeter>("primary")?;
        let backup = provider.resolve_named::<dyn Greeter>("backup")?;
        println!("  primary: {}, backup: {}", primary.greet(), backup.greet());
        match provider.resolve::<dyn Greeter>() {
            Err(e) => println!("  unnamed: {}", e),
            Ok(g) => println!("  unnamed: {}", g.greet()),
        }
    }

    section("One policy, several capabilities");
    {
        let policy = LifetimePolicy::container_controlled();
        let mut services = ServiceCollection::new();
        services.register_type_with::<dyn Greeter, Service>(policy.clone());
        services.register_type_with::<dyn Farewell, Service>(policy);
        let provider = services.build()?;
        let greeter = provider.resolve::<dyn Greeter>()?;
        let farewell = provider.resolve::<dyn Farewell>()?;
        println!("  {} / {}", greeter.greet(), farewell.bye());
        println!("  same instance: {}", same(&greeter, &farewell));
        println!("  disposed at teardown: {}", provider.dispose().disposed);
    }

    section("Per scope (per request)");
    {
        let mut services = ServiceCollection::new();
        services.register_type_with::<Service, Service>(Lifetime::PerScope);
        let provider = services.build()?;
        for request in 1..=2 {
            let report = provider.using_scope(|scope| -> DiResult<TeardownReport> {
                let a = scope.resolve::<Service>()?;
                let b = scope.resolve::<Service>()?;
                println!("  request {}: Service #{} / same instance: {}", request, a.id, same(&a, &b));
                Ok(scope.dispose())
            })?;
            println!("  {} closed, disposed {}", report.boundary, report.disposed);
        }
    }

    Ok(())
}
