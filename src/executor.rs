//! # Public façade over one protocol state machine.
//!
//! [`Executor`] wires together the intake queue, the driver task, the
//! daemon adapters, and the subscription set, and exposes the lifecycle
//! surface callers interact with: `start`, `stop`, `send_event`,
//! `current_state`, and state subscriptions.
//!
//! Construction is pure: nothing runs until [`Executor::start`]. Both
//! `start` and `stop` are idempotent; the first `stop` closes the shutdown
//! token, and every `stop` call waits until the driver and all spawned
//! waiters have drained.

use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc, Mutex,
};

use tokio::{
    sync::{mpsc, oneshot},
    time,
};
use tokio_util::{sync::CancellationToken, task::TaskTracker};

use crate::{
    config::Config,
    daemon::DaemonAdapters,
    driver::{send_or_quit, Driver, StateQuery},
    error::ExecutorError,
    state::{Environment, State},
    subscribers::{StateSubscriber, SubscriberSet},
};

/// The pieces the driver takes ownership of at `start`.
struct Parked<E, Env> {
    driver: Driver<E, Env>,
    events_rx: mpsc::Receiver<E>,
    queries_rx: mpsc::Receiver<StateQuery<E, Env>>,
}

/// Drives one protocol state machine to termination.
///
/// `E` is the protocol's event type; `Env` its [`Environment`]. The
/// executor owns the environment and the current state; concrete side
/// effects go through the [`DaemonAdapters`] handed to [`Executor::new`].
pub struct Executor<E, Env> {
    cfg: Config,
    events_tx: mpsc::Sender<E>,
    queries_tx: mpsc::Sender<StateQuery<E, Env>>,
    subscribers: Arc<SubscriberSet<E, Env>>,
    token: CancellationToken,
    tracker: TaskTracker,
    parked: Mutex<Option<Parked<E, Env>>>,
    stopped: AtomicBool,
}

impl<E, Env> Executor<E, Env>
where
    E: Send + 'static,
    Env: Environment,
{
    /// Creates an executor with the default [`Config`].
    ///
    /// Pure: allocates channels and the subscriber set, spawns nothing.
    pub fn new(
        adapters: Arc<dyn DaemonAdapters>,
        initial_state: Arc<dyn State<E, Env>>,
        env: Env,
    ) -> Self {
        Self::with_config(adapters, initial_state, env, Config::default())
    }

    /// Creates an executor with an explicit [`Config`].
    pub fn with_config(
        adapters: Arc<dyn DaemonAdapters>,
        initial_state: Arc<dyn State<E, Env>>,
        env: Env,
        cfg: Config,
    ) -> Self {
        let (events_tx, events_rx) = mpsc::channel(cfg.intake_capacity.max(1));
        let (queries_tx, queries_rx) = mpsc::channel(1);
        let token = CancellationToken::new();
        let tracker = TaskTracker::new();
        let subscribers = Arc::new(SubscriberSet::new(cfg.subscriber_capacity));

        let driver = Driver {
            cfg: cfg.clone(),
            current_state: initial_state,
            env,
            adapters,
            events_tx: events_tx.clone(),
            subscribers: Arc::clone(&subscribers),
            token: token.clone(),
            tracker: tracker.clone(),
        };

        Self {
            cfg,
            events_tx,
            queries_tx,
            subscribers,
            token,
            tracker,
            parked: Mutex::new(Some(Parked {
                driver,
                events_rx,
                queries_rx,
            })),
            stopped: AtomicBool::new(false),
        }
    }

    /// Starts the driver task. Idempotent: the first call wins.
    ///
    /// The driver publishes the initial state to subscribers before it
    /// waits for input, so subscribers attached before `start` receive it.
    pub fn start(&self) {
        if self.stopped.load(Ordering::SeqCst) {
            return;
        }

        let Ok(mut parked) = self.parked.lock() else {
            return;
        };
        if let Some(parked) = parked.take() {
            self.tracker
                .spawn(parked.driver.run(parked.events_rx, parked.queries_rx));
        }
    }

    /// Stops the executor. Idempotent: the first call closes the shutdown
    /// token; every call blocks until the driver and all spawned waiters
    /// have exited.
    ///
    /// After `stop` returns, anything blocked on enqueueing into this
    /// executor has unblocked with either success or a shutdown indication.
    pub async fn stop(&self) {
        if !self.stopped.swap(true, Ordering::SeqCst) {
            self.token.cancel();
            self.tracker.close();
        }

        self.tracker.wait().await;
    }

    /// Sends a new event to the state machine.
    ///
    /// Blocks until the driver accepts the event or shutdown fires; under
    /// shutdown the event is silently dropped.
    pub async fn send_event(&self, event: E) {
        send_or_quit(&self.events_tx, &self.token, event).await;
    }

    /// Returns a snapshot of the machine's current state.
    ///
    /// The snapshot may already be stale by the time it is inspected.
    /// Fails with [`ExecutorError::ShuttingDown`] if the driver is gone, or
    /// [`ExecutorError::QueryTimeout`] if the reply misses the configured
    /// deadline (a stalled driver).
    pub async fn current_state(&self) -> Result<Arc<dyn State<E, Env>>, ExecutorError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        let query = StateQuery { reply: reply_tx };

        if !send_or_quit(&self.queries_tx, &self.token, query).await {
            return Err(ExecutorError::ShuttingDown);
        }

        match time::timeout(self.cfg.query_timeout, reply_rx).await {
            Ok(Ok(state)) => Ok(state),
            Ok(Err(_)) => Err(ExecutorError::ShuttingDown),
            Err(_) => Err(ExecutorError::QueryTimeout),
        }
    }

    /// Attaches a new subscriber that will be notified of every state
    /// transition, starting with the initial state if attached before
    /// `start`.
    pub fn register_state_events(&self) -> StateSubscriber<E, Env> {
        self.subscribers.register()
    }

    /// Detaches a subscriber from the set.
    pub fn remove_state_sub(&self, sub: StateSubscriber<E, Env>) {
        self.subscribers.remove(sub);
    }
}
