//! # Non-blocking fan-out of state transitions to subscribers.
//!
//! [`SubscriberSet`] delivers every new state snapshot to all registered
//! [`StateSubscriber`]s **without awaiting** any of them.
//!
//! ## What it guarantees
//! - `publish` returns immediately; the driver is never blocked by a
//!   subscriber.
//! - Per-subscriber FIFO (queue order).
//!
//! ## What it does **not** guarantee
//! - Delivery under backpressure: a subscriber whose queue is full drops
//!   the update. This is an observability channel; a lost notification
//!   never affects the machine itself.
//!
//! ## Diagram
//! ```text
//!    publish(state)
//!        │                       (Arc-clone per subscriber)
//!        ├───────────────► [queue S1] ─► StateSubscriber::recv()
//!        ├───────────────► [queue S2] ─► StateSubscriber::recv()
//!        └───────────────► [queue SN] ─► StateSubscriber::recv()
//! ```

use std::sync::{
    atomic::{AtomicU64, Ordering},
    Arc,
};

use dashmap::DashMap;
use tokio::sync::mpsc;
use tracing::debug;

use crate::state::State;

/// An active subscription to state transitions.
///
/// Returned by
/// [`Executor::register_state_events`](crate::Executor::register_state_events).
/// Each published state arrives as an `Arc` snapshot; it may already be
/// stale by the time it is read.
pub struct StateSubscriber<E, Env> {
    id: u64,
    rx: mpsc::Receiver<Arc<dyn State<E, Env>>>,
}

impl<E, Env> StateSubscriber<E, Env> {
    /// Receives the next state notification.
    ///
    /// Returns `None` once the executor is gone and the queue is drained.
    pub async fn recv(&mut self) -> Option<Arc<dyn State<E, Env>>> {
        self.rx.recv().await
    }

    /// Receives a notification if one is already queued.
    pub fn try_recv(&mut self) -> Option<Arc<dyn State<E, Env>>> {
        self.rx.try_recv().ok()
    }
}

/// Registry of state subscribers with bounded per-subscriber queues.
pub(crate) struct SubscriberSet<E, Env> {
    next_id: AtomicU64,
    capacity: usize,
    subs: DashMap<u64, mpsc::Sender<Arc<dyn State<E, Env>>>>,
}

impl<E, Env> SubscriberSet<E, Env> {
    /// Creates an empty set whose subscribers buffer up to `capacity`
    /// notifications each.
    pub(crate) fn new(capacity: usize) -> Self {
        Self {
            next_id: AtomicU64::new(0),
            capacity: capacity.max(1),
            subs: DashMap::new(),
        }
    }

    /// Attaches a new subscriber and returns its receiving handle.
    pub(crate) fn register(&self) -> StateSubscriber<E, Env> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let (tx, rx) = mpsc::channel(self.capacity);
        self.subs.insert(id, tx);
        StateSubscriber { id, rx }
    }

    /// Detaches a subscriber. Detaching one that is already gone is a no-op.
    pub(crate) fn remove(&self, sub: StateSubscriber<E, Env>) {
        self.subs.remove(&sub.id);
    }

    /// Fans one state snapshot out to all subscribers (non-blocking).
    ///
    /// A subscriber with a full queue drops the update; a subscriber whose
    /// receiving half was dropped is pruned from the set.
    pub(crate) fn publish(&self, state: Arc<dyn State<E, Env>>) {
        self.subs.retain(|id, tx| match tx.try_send(Arc::clone(&state)) {
            Ok(()) => true,
            Err(mpsc::error::TrySendError::Full(_)) => {
                debug!(subscriber = *id, "dropping state update: queue full");
                true
            }
            Err(mpsc::error::TrySendError::Closed(_)) => false,
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{error::ExecutorError, state::StateTransition};

    struct Numbered(u64);

    impl State<(), ()> for Numbered {
        fn process_event(
            &self,
            _event: (),
            _env: &(),
        ) -> Result<StateTransition<(), ()>, ExecutorError> {
            Ok(StateTransition::to(Arc::new(Numbered(self.0))))
        }

        fn is_terminal(&self) -> bool {
            false
        }
    }

    fn snapshot(n: u64) -> Arc<dyn State<(), ()>> {
        Arc::new(Numbered(n))
    }

    #[tokio::test]
    async fn delivers_in_order_to_all_subscribers() {
        let set = SubscriberSet::new(10);
        let mut a = set.register();
        let mut b = set.register();

        let states: Vec<_> = (0u64..3).map(snapshot).collect();
        for state in &states {
            set.publish(Arc::clone(state));
        }

        for expect in &states {
            let got = a.recv().await.unwrap();
            assert!(Arc::ptr_eq(&got, expect));
        }
        for expect in &states {
            let got = b.recv().await.unwrap();
            assert!(Arc::ptr_eq(&got, expect));
        }
    }

    #[tokio::test]
    async fn full_queue_drops_updates() {
        let set = SubscriberSet::new(2);
        let mut sub = set.register();

        for n in 0..5 {
            set.publish(snapshot(n));
        }

        assert!(sub.try_recv().is_some());
        assert!(sub.try_recv().is_some());
        assert!(sub.try_recv().is_none());
    }

    #[tokio::test]
    async fn dropped_subscriber_is_pruned_on_publish() {
        let set = SubscriberSet::new(2);
        let sub = set.register();
        let _kept = set.register();
        drop(sub);

        set.publish(snapshot(0));
        assert_eq!(set.subs.len(), 1);
    }

    #[tokio::test]
    async fn remove_is_idempotent_with_stale_ids() {
        let set = SubscriberSet::new(2);
        let sub = set.register();
        let sub2 = set.register();

        set.remove(sub);
        // Publishing after removal only reaches the remaining subscriber.
        set.publish(snapshot(0));
        assert_eq!(set.subs.len(), 1);
        set.remove(sub2);
        assert_eq!(set.subs.len(), 0);
    }
}
