//! # Executor configuration.
//!
//! [`Config`] defines the executor's tuning knobs: the predicate poll
//! interval, the current-state query deadline, the per-subscriber buffer
//! size, and the intake channel capacity.
//!
//! The defaults are the contract most callers want; overriding
//! `query_timeout` keeps its semantics (a stalled driver still fails the
//! query, just on a different deadline).
//!
//! # Example
//! ```
//! use std::time::Duration;
//! use statevisor::Config;
//!
//! let mut cfg = Config::default();
//! cfg.query_timeout = Duration::from_secs(5);
//!
//! assert_eq!(cfg.intake_capacity, 1);
//! ```

use std::time::Duration;

/// Configuration for a single executor instance.
#[derive(Clone, Debug)]
pub struct Config {
    /// Interval at which `send_when` predicates are re-polled.
    pub poll_interval: Duration,
    /// Deadline for the driver's reply to a current-state query.
    pub query_timeout: Duration,
    /// Capacity of each state subscriber's buffer. Slow subscribers drop
    /// updates beyond this.
    pub subscriber_capacity: usize,
    /// Capacity of the event intake channel. Producers block once it is
    /// full, so this bounds how far callers can run ahead of the driver.
    pub intake_capacity: usize,
}

impl Default for Config {
    /// Provides the default configuration:
    /// - `poll_interval = 100ms`
    /// - `query_timeout = 1s`
    /// - `subscriber_capacity = 10`
    /// - `intake_capacity = 1`
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_millis(100),
            query_timeout: Duration::from_secs(1),
            subscriber_capacity: 10,
            intake_capacity: 1,
        }
    }
}
