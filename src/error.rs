//! # Error types used by the executor runtime.
//!
//! [`ExecutorError`] covers every failure class the executor produces or
//! classifies:
//!
//! - transition and dispatch failures, which abort the current event chain
//!   but never kill the driver;
//! - lifecycle failures (`ShuttingDown`, `QueryTimeout`) surfaced to
//!   callers of [`Executor::current_state`](crate::Executor::current_state).
//!
//! The type provides an `as_label` helper for logs/metrics.

use thiserror::Error;

/// Errors produced by the executor and its collaborators.
///
/// None of these are fatal to the executor itself: the driver logs
/// transition and dispatch failures and keeps accepting events. Only
/// [`Executor::stop`](crate::Executor::stop) terminates the driver.
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum ExecutorError {
    /// A state's transition function rejected the event. The event chain is
    /// aborted; the current state stays at the last successful step.
    #[error("state transition failed: {reason}")]
    Transition {
        /// Description of what the transition function rejected.
        reason: String,
    },

    /// A daemon adapter call or notification registration failed.
    #[error("daemon dispatch failed: {reason}")]
    DaemonDispatch {
        /// Description of the failing adapter call.
        reason: String,
    },

    /// The dispatcher was handed a daemon event kind it does not know.
    ///
    /// Reaching this is a programming error: a daemon event variant was
    /// added ahead of its dispatcher support.
    #[error("unknown daemon event")]
    UnknownDaemonEvent,

    /// The executor is shutting down; the driver is gone.
    #[error("state machine is shutting down")]
    ShuttingDown,

    /// The driver did not reply to a state query within the deadline.
    #[error("timed out waiting for current state")]
    QueryTimeout,
}

impl ExecutorError {
    /// Returns a short stable label (snake_case) for use in logs/metrics.
    pub fn as_label(&self) -> &'static str {
        match self {
            ExecutorError::Transition { .. } => "transition_error",
            ExecutorError::DaemonDispatch { .. } => "daemon_dispatch_error",
            ExecutorError::UnknownDaemonEvent => "unknown_daemon_event",
            ExecutorError::ShuttingDown => "shutting_down",
            ExecutorError::QueryTimeout => "query_timeout",
        }
    }

    /// Builds a [`ExecutorError::Transition`] from any displayable reason.
    pub fn transition(reason: impl Into<String>) -> Self {
        ExecutorError::Transition {
            reason: reason.into(),
        }
    }

    /// Builds a [`ExecutorError::DaemonDispatch`] from any displayable reason.
    pub fn dispatch(reason: impl Into<String>) -> Self {
        ExecutorError::DaemonDispatch {
            reason: reason.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn labels_are_stable() {
        assert_eq!(ExecutorError::transition("x").as_label(), "transition_error");
        assert_eq!(ExecutorError::dispatch("x").as_label(), "daemon_dispatch_error");
        assert_eq!(ExecutorError::UnknownDaemonEvent.as_label(), "unknown_daemon_event");
        assert_eq!(ExecutorError::ShuttingDown.as_label(), "shutting_down");
        assert_eq!(ExecutorError::QueryTimeout.as_label(), "query_timeout");
    }

    #[test]
    fn display_includes_reason() {
        let err = ExecutorError::dispatch("unable to send msgs: peer gone");
        assert_eq!(
            err.to_string(),
            "daemon dispatch failed: unable to send msgs: peer gone"
        );
    }
}
