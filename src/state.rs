//! # State and environment contracts.
//!
//! This module defines the two traits protocol authors implement,
//! [`State`] and [`Environment`], plus the value a transition function
//! returns: [`StateTransition`] with its optional [`EmittedEvent`] payload.
//!
//! ## Contract
//! - [`State::process_event`] is pure compute: no I/O, no blocking, no
//!   awaiting. Side effects are requested by emitting
//!   [`DaemonEvent`](crate::DaemonEvent)s; the executor performs them.
//! - States are values. The executor replaces the current state wholesale on
//!   each transition and never mutates one in place, which is why the next
//!   state travels as an `Arc<dyn State>`.
//! - [`Environment::clean_up`] runs at most once per executor lifetime, when
//!   a terminal state is first reached.

use std::sync::Arc;

use crate::{daemon::DaemonEvent, error::ExecutorError};

/// Execution environment for a protocol state machine.
///
/// The environment carries whatever shared resources the protocol's states
/// need (keys, channel parameters, handles). The executor owns it
/// exclusively and only cares about one capability: releasing those
/// resources once the machine reaches a terminal state.
pub trait Environment: Send + Sync + 'static {
    /// Releases any resources the environment allocated.
    ///
    /// Called by the executor exactly once, after the first transition into
    /// a terminal state. Errors are logged by the driver and are not fatal.
    fn clean_up(&self) -> Result<(), ExecutorError>;
}

/// A single protocol state: a transition function plus a terminal marker.
///
/// `E` is the protocol's event type, opaque to the executor. `Env` is the
/// protocol's [`Environment`].
///
/// # Example
/// ```
/// use std::sync::Arc;
/// use statevisor::{Environment, ExecutorError, State, StateTransition};
///
/// struct NoopEnv;
///
/// impl Environment for NoopEnv {
///     fn clean_up(&self) -> Result<(), ExecutorError> {
///         Ok(())
///     }
/// }
///
/// #[derive(Clone)]
/// struct Ping;
///
/// struct Idle;
/// struct Done;
///
/// impl State<Ping, NoopEnv> for Idle {
///     fn process_event(
///         &self,
///         _event: Ping,
///         _env: &NoopEnv,
///     ) -> Result<StateTransition<Ping, NoopEnv>, ExecutorError> {
///         Ok(StateTransition::to(Arc::new(Done)))
///     }
///
///     fn is_terminal(&self) -> bool {
///         false
///     }
/// }
///
/// impl State<Ping, NoopEnv> for Done {
///     fn process_event(
///         &self,
///         _event: Ping,
///         _env: &NoopEnv,
///     ) -> Result<StateTransition<Ping, NoopEnv>, ExecutorError> {
///         Ok(StateTransition::to(Arc::new(Done)))
///     }
///
///     fn is_terminal(&self) -> bool {
///         true
///     }
/// }
/// ```
pub trait State<E, Env>: Send + Sync + 'static {
    /// Applies an event to this state, producing the next state and any
    /// events to emit.
    ///
    /// The executor calls this iteratively until the transition chain runs
    /// out of internal events. On error the chain is aborted; the machine
    /// keeps the last successfully reached state.
    fn process_event(
        &self,
        event: E,
        env: &Env,
    ) -> Result<StateTransition<E, Env>, ExecutorError>;

    /// True if this state is terminal. Must be cheap and idempotent.
    fn is_terminal(&self) -> bool;
}

impl<E: 'static, Env: 'static> std::fmt::Debug for dyn State<E, Env> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("State")
            .field("is_terminal", &self.is_terminal())
            .finish()
    }
}

/// The outcome of one [`State::process_event`] call: the next state, and
/// optionally the events this transition emits.
pub struct StateTransition<E, Env> {
    /// The state the machine moves to.
    pub next_state: Arc<dyn State<E, Env>>,
    /// Events emitted by this transition, if any.
    pub new_events: Option<EmittedEvent<E>>,
}

impl<E, Env> StateTransition<E, Env> {
    /// A transition that only moves to `next_state`, emitting nothing.
    pub fn to(next_state: Arc<dyn State<E, Env>>) -> Self {
        Self {
            next_state,
            new_events: None,
        }
    }

    /// A transition to `next_state` that also emits `events`.
    pub fn with_events(next_state: Arc<dyn State<E, Env>>, events: EmittedEvent<E>) -> Self {
        Self {
            next_state,
            new_events: Some(events),
        }
    }
}

/// Events emitted by a state transition.
///
/// The internal event (if any) is routed back into the machine behind any
/// already queued internal events, letting one external stimulus drive a
/// multi-step transition chain. The external events are handed to the
/// daemon-event dispatcher, in declared order, before the internal event is
/// enqueued.
pub struct EmittedEvent<E> {
    /// Follow-up event routed back to the machine itself.
    pub internal_event: Option<E>,
    /// Daemon actions to dispatch, in order. Empty means none.
    pub external_events: Vec<DaemonEvent<E>>,
}

impl<E> Default for EmittedEvent<E> {
    fn default() -> Self {
        Self {
            internal_event: None,
            external_events: Vec::new(),
        }
    }
}

impl<E> EmittedEvent<E> {
    /// Creates a new empty set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Emits only an internal follow-up event.
    pub fn with_internal(event: E) -> Self {
        Self {
            internal_event: Some(event),
            external_events: Vec::new(),
        }
    }

    /// Emits only external daemon events.
    pub fn with_external(events: Vec<DaemonEvent<E>>) -> Self {
        Self {
            internal_event: None,
            external_events: events,
        }
    }

    /// Emits both external daemon events and an internal follow-up.
    pub fn with_internal_and_external(event: E, events: Vec<DaemonEvent<E>>) -> Self {
        Self {
            internal_event: Some(event),
            external_events: events,
        }
    }
}
