//! Error types for the dependency injection container.

use thiserror::Error;

/// Boxed error used by user factories and `Dispose` implementations.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Dependency injection errors
///
/// Represents the error conditions that can occur during registration,
/// resolution, or teardown. The variants for which
/// [`is_resolution_failure`](DiError::is_resolution_failure) returns `true`
/// form the resolution-failed family.
///
/// # Examples
///
/// ```rust
/// use ferrous_lifetimes::{DiError, ServiceCollection, Resolver};
///
/// trait Clock: Send + Sync {}
///
/// let provider = ServiceCollection::new().build().unwrap();
/// match provider.resolve::<dyn Clock>() {
///     Err(err @ DiError::NotFound(_)) => assert!(err.is_resolution_failure()),
///     _ => unreachable!(),
/// }
/// ```
#[derive(Debug, Error)]
pub enum DiError {
    /// Capability not registered
    #[error("Service not found: {0}")]
    NotFound(&'static str),
    /// Named registration not found
    #[error("Service not found: {0} ({1})")]
    NamedNotFound(&'static str, &'static str),
    /// Unnamed resolution with several named registrations and no default
    #[error("Ambiguous resolution for {capability}: registered under [{}]", .names.join(", "))]
    Ambiguous {
        capability: &'static str,
        names: Vec<&'static str>,
    },
    /// Cached implementation could not be projected to the capability
    #[error("Type mismatch for: {0}")]
    TypeMismatch(&'static str),
    /// Circular dependency detected (includes path)
    #[error("Circular dependency: {}", .0.join(" -> "))]
    Circular(Vec<&'static str>),
    /// Maximum recursion depth exceeded
    #[error("Max depth {0} exceeded")]
    DepthExceeded(usize),
    /// Resolution against a closed scope, a disposed container or a released instance
    #[error("Cannot access a disposed object: {0}")]
    ObjectDisposed(&'static str),
    /// Registration rejected when the collection was built
    #[error("Invalid registration for {capability}: {reason}")]
    InvalidRegistration {
        capability: &'static str,
        reason: String,
    },
    /// Error raised by a user factory
    #[error("Factory for {capability} failed: {source}")]
    Factory {
        capability: &'static str,
        #[source]
        source: BoxError,
    },
    /// Container options could not be parsed
    #[cfg(feature = "config")]
    #[error("Configuration error: {0}")]
    Config(String),
}

impl DiError {
    /// Wraps an arbitrary error raised while constructing `capability`.
    pub fn factory(capability: &'static str, source: impl Into<BoxError>) -> Self {
        DiError::Factory {
            capability,
            source: source.into(),
        }
    }

    /// Whether this error belongs to the resolution-failed family.
    pub fn is_resolution_failure(&self) -> bool {
        matches!(
            self,
            DiError::NotFound(_)
                | DiError::NamedNotFound(_, _)
                | DiError::Ambiguous { .. }
                | DiError::TypeMismatch(_)
                | DiError::Circular(_)
                | DiError::DepthExceeded(_)
        )
    }
}

/// Result type for DI operations
pub type DiResult<T> = Result<T, DiError>;
