//! Disposal trait for resource cleanup.

use crate::error::BoxError;

/// Trait for synchronous resource disposal.
///
/// Every implementation registered with the container implements `Dispose`.
/// The default body does nothing, so types without teardown only need an
/// empty `impl`. The container calls `dispose` only for instances whose
/// lifetime policy owns disposal; transient and externally-controlled
/// instances are left to the caller.
///
/// Errors and panics raised here are logged and reported in the
/// [`TeardownReport`](crate::TeardownReport); they never stop the disposal of
/// the remaining instances.
///
/// # Examples
///
/// ```
/// use ferrous_lifetimes::{BoxError, Dispose, Lifetime, ServiceCollection, Resolver};
/// use std::sync::Arc;
/// use std::sync::atomic::{AtomicBool, Ordering};
///
/// struct Connection {
///     closed: AtomicBool,
/// }
///
/// impl Dispose for Connection {
///     fn dispose(&self) -> Result<(), BoxError> {
///         self.closed.store(true, Ordering::SeqCst);
///         Ok(())
///     }
/// }
///
/// let conn = Arc::new(Connection { closed: AtomicBool::new(false) });
/// let mut services = ServiceCollection::new();
/// services.register_instance::<Connection, _>(conn.clone());
///
/// let provider = services.build().unwrap();
/// provider.dispose();
/// assert!(conn.closed.load(Ordering::SeqCst));
/// ```
pub trait Dispose: Send + Sync + 'static {
    /// Perform synchronous cleanup of resources.
    fn dispose(&self) -> Result<(), BoxError> {
        Ok(())
    }
}
