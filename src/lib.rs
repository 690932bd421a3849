//! # statevisor
//!
//! **Statevisor** is a generic executor for event-driven protocol state
//! machines.
//!
//! Protocol logic lives in pure [`State`] values: a transition function
//! takes an event and an environment and returns the next state plus any
//! events to emit. The executor owns everything impure around that core:
//! the event intake loop, the daemon-event dispatcher that bridges to peer
//! messaging and on-chain observation, the background waiters that
//! re-inject follow-up events, and clean shutdown that drains them all.
//!
//! ## Features
//!
//! | Area               | Description                                                       | Key types / traits                       |
//! |--------------------|-------------------------------------------------------------------|------------------------------------------|
//! | **Protocol API**   | Define states as pure transition functions over your event type.  | [`State`], [`StateTransition`]           |
//! | **Environment**    | Shared protocol resources, released once on termination.          | [`Environment`]                          |
//! | **Daemon bridge**  | Request sends, broadcasts, and chain watches without doing I/O.   | [`DaemonEvent`], [`DaemonAdapters`]      |
//! | **Observation**    | Query the live state; subscribe to every transition.              | [`Executor::current_state`], [`StateSubscriber`] |
//! | **Lifecycle**      | Idempotent start/stop; shutdown drains every spawned waiter.      | [`Executor`]                             |
//! | **Errors**         | Typed, non-fatal error classification with stable labels.         | [`ExecutorError`]                        |
//! | **Configuration**  | Poll interval, query deadline, buffer sizes.                      | [`Config`]                               |
//!
//! ```no_run
//! use std::sync::Arc;
//! use statevisor::{
//!     Environment, Executor, ExecutorError, State, StateTransition,
//! };
//! # use statevisor::DaemonAdapters;
//! # fn adapters() -> Arc<dyn DaemonAdapters> { unimplemented!() }
//!
//! struct ChannelEnv;
//!
//! impl Environment for ChannelEnv {
//!     fn clean_up(&self) -> Result<(), ExecutorError> {
//!         Ok(())
//!     }
//! }
//!
//! enum ChannelEvent {
//!     OfferReceived,
//! }
//!
//! struct AwaitingOffer;
//! struct Done;
//!
//! impl State<ChannelEvent, ChannelEnv> for AwaitingOffer {
//!     fn process_event(
//!         &self,
//!         _event: ChannelEvent,
//!         _env: &ChannelEnv,
//!     ) -> Result<StateTransition<ChannelEvent, ChannelEnv>, ExecutorError> {
//!         Ok(StateTransition::to(Arc::new(Done)))
//!     }
//!
//!     fn is_terminal(&self) -> bool {
//!         false
//!     }
//! }
//!
//! impl State<ChannelEvent, ChannelEnv> for Done {
//!     fn process_event(
//!         &self,
//!         _event: ChannelEvent,
//!         _env: &ChannelEnv,
//!     ) -> Result<StateTransition<ChannelEvent, ChannelEnv>, ExecutorError> {
//!         Ok(StateTransition::to(Arc::new(Done)))
//!     }
//!
//!     fn is_terminal(&self) -> bool {
//!         true
//!     }
//! }
//!
//! #[tokio::main(flavor = "current_thread")]
//! async fn main() {
//!     let machine: Executor<ChannelEvent, ChannelEnv> =
//!         Executor::new(adapters(), Arc::new(AwaitingOffer), ChannelEnv);
//!
//!     let mut states = machine.register_state_events();
//!     machine.start();
//!
//!     machine.send_event(ChannelEvent::OfferReceived).await;
//!     let _reached = states.recv().await;
//!
//!     machine.stop().await;
//! }
//! ```
//!
//! ---

mod config;
mod daemon;
mod driver;
mod error;
mod executor;
mod state;
mod subscribers;

// ---- Public re-exports ----

pub use config::Config;
pub use daemon::{
    BroadcastTxn, ConfirmationEvent, DaemonAdapters, DaemonEvent, Message, RegisterConf,
    RegisterSpend, SendMsgEvent, SendPredicate, SpendDetail, SpendEvent, TxConfirmation,
};
pub use error::ExecutorError;
pub use executor::Executor;
pub use state::{EmittedEvent, Environment, State, StateTransition};
pub use subscribers::StateSubscriber;
