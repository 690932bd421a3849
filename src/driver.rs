//! # The driver task: intake serialisation, transition engine, dispatch.
//!
//! One [`Driver`] task serialises everything that touches the current
//! state: event intake, state queries, and shutdown. No mutex guards the
//! state; the channel topology is the synchronisation.
//!
//! # High-level architecture
//!
//! ```text
//!  send_event ──► [intake queue] ──┐
//!                                  ▼
//!                           ┌─────────────┐   process_event
//!  current_state ◄─ query ─ │   Driver    │ ──────────────► State
//!                           └──────┬──────┘
//!                             daemon events
//!                                  ▼
//!                  ┌───────────────────────────────┐
//!                  │ DaemonAdapters + waiter tasks │──► re-inject events
//!                  └───────────────────────────────┘
//! ```
//!
//! Waiters (predicate polls, spend watches, confirmation watches) re-inject
//! their follow-up events through the same bounded intake queue the outside
//! world uses, always racing the shutdown token. Injection never happens
//! inline from the dispatcher: the intake queue is bounded, and the driver
//! is mid-transition at dispatch time, so an inline send would deadlock.

use std::{collections::VecDeque, sync::Arc};

use tokio::{
    sync::{mpsc, oneshot},
    time,
};
use tokio_util::{sync::CancellationToken, task::TaskTracker};
use tracing::{debug, error, warn};

use crate::{
    config::Config,
    daemon::{DaemonAdapters, DaemonEvent, SendMsgEvent},
    error::ExecutorError,
    state::{Environment, State},
    subscribers::SubscriberSet,
};

/// A rendezvous carrying the reply slot for one current-state query.
pub(crate) struct StateQuery<E, Env> {
    pub(crate) reply: oneshot::Sender<Arc<dyn State<E, Env>>>,
}

/// Sends `value`, giving up if shutdown fires first. Returns whether the
/// value was accepted.
pub(crate) async fn send_or_quit<T: Send>(
    tx: &mpsc::Sender<T>,
    token: &CancellationToken,
    value: T,
) -> bool {
    tokio::select! {
        res = tx.send(value) => res.is_ok(),
        _ = token.cancelled() => false,
    }
}

/// The serialising task behind an [`Executor`](crate::Executor).
///
/// Owns the current state and the environment outright. Spawned once by
/// `start`; exits only on shutdown.
pub(crate) struct Driver<E, Env> {
    pub(crate) cfg: Config,
    pub(crate) current_state: Arc<dyn State<E, Env>>,
    pub(crate) env: Env,
    pub(crate) adapters: Arc<dyn DaemonAdapters>,
    pub(crate) events_tx: mpsc::Sender<E>,
    pub(crate) subscribers: Arc<SubscriberSet<E, Env>>,
    pub(crate) token: CancellationToken,
    pub(crate) tracker: TaskTracker,
}

impl<E, Env> Driver<E, Env>
where
    E: Send + 'static,
    Env: Environment,
{
    /// The main loop: one three-way wait per iteration.
    ///
    /// Reaching a terminal state does not exit the loop. Waiters may still
    /// fire and inject follow-ups that the terminal state should see (and
    /// typically ignore); only shutdown ends the machine, and the caller
    /// owns that decision.
    pub(crate) async fn run(
        mut self,
        mut events_rx: mpsc::Receiver<E>,
        mut queries_rx: mpsc::Receiver<StateQuery<E, Env>>,
    ) {
        let token = self.token.clone();

        // Subscribers attached before start see the starting state first.
        self.subscribers.publish(Arc::clone(&self.current_state));

        let mut cleaned_up = false;

        loop {
            tokio::select! {
                _ = token.cancelled() => return,

                Some(event) = events_rx.recv() => {
                    if let Err(err) = self.apply_events(event).await {
                        error!(label = err.as_label(), error = %err, "unable to apply event");
                        continue;
                    }

                    // First entry into a terminal state releases the
                    // environment. Later terminal re-entries do not run
                    // cleanup again.
                    if self.current_state.is_terminal() && !cleaned_up {
                        cleaned_up = true;
                        if let Err(err) = self.env.clean_up() {
                            error!(error = %err, "unable to clean up env");
                        }
                    }
                }

                Some(query) = queries_rx.recv() => {
                    // The caller may already have timed out; a dead reply
                    // slot is not an error.
                    let _ = query.reply.send(Arc::clone(&self.current_state));
                }

                else => return,
            }
        }
    }

    /// Applies one external event, then chases emitted internal events
    /// until the queue drains.
    ///
    /// The current state advances step by step and every advance is
    /// published, so an error mid-chain leaves the machine at the last
    /// successfully reached state.
    async fn apply_events(&mut self, new_event: E) -> Result<(), ExecutorError> {
        let mut event_queue = VecDeque::from([new_event]);

        while let Some(event) = event_queue.pop_front() {
            let transition = self.current_state.process_event(event, &self.env)?;

            if let Some(emitted) = transition.new_events {
                // Daemon events run before the internal event is queued:
                // the transition's own follow-up is only observed once its
                // side effects went through.
                for daemon_event in emitted.external_events {
                    self.execute_daemon_event(daemon_event).await?;
                }

                if let Some(internal) = emitted.internal_event {
                    event_queue.push_back(internal);
                }
            }

            self.current_state = transition.next_state;
            self.subscribers.publish(Arc::clone(&self.current_state));
        }

        Ok(())
    }

    /// Executes one daemon event: immediate actions synchronously,
    /// conditional and observational ones via a spawned waiter.
    async fn execute_daemon_event(&self, event: DaemonEvent<E>) -> Result<(), ExecutorError> {
        debug!(event = event.as_label(), "executing daemon event");

        match event {
            DaemonEvent::SendMessages(send) => self.execute_send_message(send).await,

            DaemonEvent::BroadcastTxn(broadcast) => self
                .adapters
                .broadcast_transaction(&broadcast.tx, &broadcast.label)
                .await
                .map_err(|err| {
                    ExecutorError::dispatch(format!("unable to broadcast txn: {err}"))
                }),

            DaemonEvent::RegisterSpend(spend) => {
                let handle = self
                    .adapters
                    .register_spend_ntfn(spend.outpoint, &spend.pk_script, spend.height_hint)
                    .await
                    .map_err(|err| {
                        ExecutorError::dispatch(format!("unable to register spend: {err}"))
                    })?;

                let events_tx = self.events_tx.clone();
                let token = self.token.clone();
                self.tracker.spawn(async move {
                    tokio::select! {
                        detail = handle.spend => {
                            // A dropped notifier ends the watch with no
                            // follow-up.
                            if detail.is_ok() {
                                if let Some(post) = spend.post_spend_event {
                                    send_or_quit(&events_tx, &token, post).await;
                                }
                            }
                        }
                        _ = token.cancelled() => {}
                    }
                });

                Ok(())
            }

            DaemonEvent::RegisterConf(conf) => {
                let num_confs = conf.num_confs.unwrap_or(1);
                let handle = self
                    .adapters
                    .register_confirmations_ntfn(
                        Some(conf.txid),
                        &conf.pk_script,
                        num_confs,
                        conf.height_hint,
                    )
                    .await
                    .map_err(|err| {
                        ExecutorError::dispatch(format!("unable to register conf: {err}"))
                    })?;

                let events_tx = self.events_tx.clone();
                let token = self.token.clone();
                self.tracker.spawn(async move {
                    tokio::select! {
                        confirmation = handle.confirmed => {
                            if confirmation.is_ok() {
                                if let Some(post) = conf.post_conf_event {
                                    send_or_quit(&events_tx, &token, post).await;
                                }
                            }
                        }
                        _ = token.cancelled() => {}
                    }
                });

                Ok(())
            }

            #[allow(unreachable_patterns)]
            _ => Err(ExecutorError::UnknownDaemonEvent),
        }
    }

    /// Sends messages to a peer, either immediately or gated on the
    /// event's predicate.
    async fn execute_send_message(&self, send: SendMsgEvent<E>) -> Result<(), ExecutorError> {
        let SendMsgEvent {
            target_peer,
            msgs,
            send_when,
            post_send_event,
        } = send;

        let Some(predicate) = send_when else {
            self.adapters
                .send_messages(target_peer, msgs)
                .await
                .map_err(|err| ExecutorError::dispatch(format!("unable to send msgs: {err}")))?;

            if let Some(post) = post_send_event {
                self.spawn_injector(post);
            }

            return Ok(());
        };

        // Gated send: poll the predicate in the background and send once it
        // first returns true. The waiter exits on shutdown.
        let adapters = Arc::clone(&self.adapters);
        let events_tx = self.events_tx.clone();
        let token = self.token.clone();
        let poll_interval = self.cfg.poll_interval;

        self.tracker.spawn(async move {
            loop {
                tokio::select! {
                    _ = time::sleep(poll_interval) => {
                        if predicate() {
                            break;
                        }
                    }
                    _ = token.cancelled() => return,
                }
            }

            match adapters.send_messages(target_peer, msgs).await {
                Ok(()) => {
                    if let Some(post) = post_send_event {
                        send_or_quit(&events_tx, &token, post).await;
                    }
                }
                Err(err) => warn!(error = %err, "unable to send msgs"),
            }
        });

        Ok(())
    }

    /// Re-injects a follow-up event from a fresh task, racing shutdown.
    fn spawn_injector(&self, event: E) {
        let events_tx = self.events_tx.clone();
        let token = self.token.clone();
        self.tracker.spawn(async move {
            send_or_quit(&events_tx, &token, event).await;
        });
    }
}
