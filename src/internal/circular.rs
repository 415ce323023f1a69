//! Circular dependency detection.
//!
//! Each thread keeps the stack of registrations it is currently building,
//! tagged with the provider doing the building. Entering a registration of
//! the same provider that is already on the stack is a cycle. So is entering
//! another registration backed by a caching policy that is already
//! mid-creation on this thread.
//!
//! Cycles that span threads never show up on one stack. A thread about to
//! wait for a slot another thread is building records a waits-for edge
//! first; if following the edges from the builder leads back to the waiting
//! thread, the threads are building each other and the wait is refused.

use std::cell::RefCell;
use std::thread::{self, ThreadId};

use parking_lot::{const_mutex, Mutex};

use crate::error::{DiError, DiResult};
use crate::key::Key;
use crate::provider::ScopeId;

struct Frame {
    provider: usize,
    key: Key,
    policy: Option<usize>,
}

thread_local! {
    static RESOLUTION_STACK: RefCell<Vec<Frame>> = const { RefCell::new(Vec::new()) };
}

/// Marks a registration as being built on the current thread.
///
/// Pops its frame when dropped, so early returns and unwinding both leave the
/// stack balanced.
pub(crate) struct ResolutionGuard {
    _not_send: std::marker::PhantomData<*const ()>,
}

impl ResolutionGuard {
    /// Pushes `key` after checking for cycles and the depth limit.
    ///
    /// `provider` identifies the container resolving `key`. `policy` is the
    /// identity of the caching policy that will build it, or `None` for
    /// policies that never cache.
    pub(crate) fn enter(
        provider: usize,
        key: Key,
        policy: Option<usize>,
        max_depth: usize,
    ) -> DiResult<Self> {
        RESOLUTION_STACK.with(|stack| {
            let mut stack = stack.borrow_mut();

            // A policy handle can be shared across providers, so it is
            // compared regardless of which provider pushed the frame.
            let reentered = stack.iter().any(|f| {
                (f.provider == provider && f.key == key) || (policy.is_some() && f.policy == policy)
            });
            if reentered {
                let mut path: Vec<&'static str> = stack
                    .iter()
                    .filter(|f| f.provider == provider)
                    .map(|f| f.key.display_name())
                    .collect();
                path.push(key.display_name());
                return Err(DiError::Circular(path));
            }

            if stack.len() >= max_depth {
                return Err(DiError::DepthExceeded(max_depth));
            }

            stack.push(Frame { provider, key, policy });
            Ok(Self {
                _not_send: std::marker::PhantomData,
            })
        })
    }
}

impl Drop for ResolutionGuard {
    fn drop(&mut self) {
        RESOLUTION_STACK.with(|stack| {
            stack.borrow_mut().pop();
        });
    }
}

/// A cache slot: the policy that owns it plus the scope it serves.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct SlotId {
    pub(crate) policy: usize,
    pub(crate) scope: ScopeId,
}

struct Wait {
    waiter: ThreadId,
    builder: ThreadId,
    slot: SlotId,
    capability: &'static str,
}

// A blocked thread waits on one slot at a time, so each thread has at most
// one edge here.
static WAITS: Mutex<Vec<Wait>> = const_mutex(Vec::new());

/// A recorded waits-for edge, removed when dropped.
pub(crate) struct WaitEdge {
    waiter: ThreadId,
}

impl WaitEdge {
    /// Records that the current thread is about to wait for `builder` to
    /// finish building `slot`.
    ///
    /// Fails with [`DiError::Circular`] when `builder` is, directly or
    /// through other builders, waiting on the current thread.
    pub(crate) fn record(builder: ThreadId, slot: SlotId, capability: &'static str) -> DiResult<Self> {
        let waiter = thread::current().id();
        let mut waits = WAITS.lock();

        let mut path = vec![capability];
        let mut next = builder;
        while let Some(edge) = waits.iter().find(|w| w.waiter == next) {
            path.push(edge.capability);
            if edge.builder == waiter {
                path.push(capability);
                return Err(DiError::Circular(path));
            }
            next = edge.builder;
            if path.len() > waits.len() + 1 {
                // Chains that loop without reaching this thread are not ours to report.
                break;
            }
        }

        waits.push(Wait {
            waiter,
            builder,
            slot,
            capability,
        });
        Ok(Self { waiter })
    }

    /// Drops every edge waiting on `slot`; its builder is done with it.
    pub(crate) fn release(slot: SlotId) {
        WAITS.lock().retain(|w| w.slot != slot);
    }
}

impl Drop for WaitEdge {
    fn drop(&mut self) {
        WAITS.lock().retain(|w| w.waiter != self.waiter);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::mpsc;

    struct A;
    struct B;

    const P: usize = 1;

    #[test]
    fn reentering_a_key_reports_the_path() {
        let _a = ResolutionGuard::enter(P, Key::of::<A>(), None, 8).unwrap();
        let _b = ResolutionGuard::enter(P, Key::of::<B>(), None, 8).unwrap();
        match ResolutionGuard::enter(P, Key::of::<A>(), None, 8) {
            Err(DiError::Circular(path)) => {
                assert_eq!(path.len(), 3);
                assert!(path[0].ends_with("A"));
                assert!(path[2].ends_with("A"));
            }
            _ => panic!("expected a cycle"),
        }
    }

    #[test]
    fn reentering_a_locked_policy_is_a_cycle() {
        let _a = ResolutionGuard::enter(P, Key::of::<A>(), Some(1), 8).unwrap();
        assert!(matches!(
            ResolutionGuard::enter(P, Key::of::<B>(), Some(1), 8),
            Err(DiError::Circular(_))
        ));
        assert!(ResolutionGuard::enter(P, Key::of::<B>(), Some(2), 8).is_ok());
    }

    #[test]
    fn same_key_from_another_provider_is_not_a_cycle() {
        let _outer = ResolutionGuard::enter(P, Key::of::<A>(), Some(10), 8).unwrap();
        let _inner = ResolutionGuard::enter(P + 1, Key::of::<A>(), Some(11), 8).unwrap();
        assert!(matches!(
            ResolutionGuard::enter(P + 1, Key::of::<A>(), None, 8),
            Err(DiError::Circular(_))
        ));
    }

    #[test]
    fn frames_are_popped_on_drop() {
        {
            let _a = ResolutionGuard::enter(P, Key::of::<A>(), None, 8).unwrap();
        }
        assert!(ResolutionGuard::enter(P, Key::of::<A>(), None, 8).is_ok());
    }

    #[test]
    fn depth_limit() {
        let _a = ResolutionGuard::enter(P, Key::of::<A>(), None, 1).unwrap();
        assert!(matches!(
            ResolutionGuard::enter(P, Key::of::<B>(), None, 1),
            Err(DiError::DepthExceeded(1))
        ));
    }

    #[test]
    fn waiting_on_a_thread_that_waits_on_us_is_a_cycle() {
        let slot_a = SlotId { policy: 0xa, scope: ScopeId::ROOT };
        let slot_b = SlotId { policy: 0xb, scope: ScopeId::ROOT };
        let me = thread::current().id();

        let (recorded_tx, recorded_rx) = mpsc::channel();
        let (done_tx, done_rx) = mpsc::channel::<()>();
        let other = thread::spawn(move || {
            // The other thread waits for us to finish building A.
            let edge = WaitEdge::record(me, slot_a, "A").unwrap();
            recorded_tx.send(thread::current().id()).unwrap();
            done_rx.recv().unwrap();
            drop(edge);
        });
        let other_id = recorded_rx.recv().unwrap();

        match WaitEdge::record(other_id, slot_b, "B") {
            Err(DiError::Circular(path)) => assert_eq!(path, vec!["B", "A", "B"]),
            _ => panic!("expected a cross-thread cycle"),
        }

        WaitEdge::release(slot_a);
        assert!(WaitEdge::record(other_id, slot_b, "B").is_ok());
        done_tx.send(()).unwrap();
        other.join().unwrap();
    }
}
