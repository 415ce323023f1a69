//! Teardown of owned instances.

use std::any::Any;
use std::fmt;
use std::panic::{catch_unwind, AssertUnwindSafe};

use crate::observer::Observers;
use crate::provider::ScopeId;
use crate::registration::Instance;
use crate::Key;

/// Ownership boundary being torn down.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Boundary {
    /// The service provider (root scope).
    Container,
    /// A scope created with `create_scope`.
    Scope(ScopeId),
}

impl fmt::Display for Boundary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Boundary::Container => f.write_str("container"),
            Boundary::Scope(id) => write!(f, "{}", id),
        }
    }
}

/// A `dispose` call that returned an error or panicked.
#[derive(Debug, Clone)]
pub struct DisposalFailure {
    /// Key of the registration that created the instance.
    pub key: Key,
    pub message: String,
}

/// Outcome of tearing down a boundary.
#[derive(Debug, Clone)]
pub struct TeardownReport {
    pub boundary: Boundary,
    /// Instances whose `dispose` completed successfully.
    pub disposed: usize,
    pub failures: Vec<DisposalFailure>,
}

impl TeardownReport {
    pub(crate) fn empty(boundary: Boundary) -> Self {
        Self {
            boundary,
            disposed: 0,
            failures: Vec::new(),
        }
    }

    /// Number of `dispose` calls made, failed ones included.
    pub fn attempted(&self) -> usize {
        self.disposed + self.failures.len()
    }

    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }
}

/// Disposes `instances` newest first. Every instance gets its `dispose` call
/// even when earlier ones fail.
pub(crate) fn dispose_instances(
    boundary: Boundary,
    mut instances: Vec<Instance>,
    observers: &Observers,
) -> TeardownReport {
    let mut report = TeardownReport::empty(boundary);
    instances.sort_by(|a, b| b.seq.cmp(&a.seq));

    for instance in instances {
        let outcome = catch_unwind(AssertUnwindSafe(|| instance.disposer.dispose()));
        let message = match outcome {
            Ok(Ok(())) => {
                report.disposed += 1;
                tracing::debug!(%boundary, capability = %instance.key, "disposed");
                observers.disposed(&instance.key);
                continue;
            }
            Ok(Err(e)) => e.to_string(),
            Err(payload) => panic_message(payload.as_ref()),
        };

        tracing::warn!(%boundary, capability = %instance.key, error = %message, "dispose failed");
        observers.dispose_failed(&instance.key, &message);
        report.failures.push(DisposalFailure {
            key: instance.key,
            message,
        });
    }

    report
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        format!("panicked: {}", s)
    } else if let Some(s) = payload.downcast_ref::<String>() {
        format!("panicked: {}", s)
    } else {
        "panicked".to_string()
    }
}
