//! # Daemon events and the adapter bridge to the outside world.
//!
//! A state transition can request side effects without performing them:
//! it emits [`DaemonEvent`]s, and the executor hands them to a
//! [`DaemonAdapters`] implementation, which is the only component that
//! actually touches the network or the chain.
//!
//! ## The four daemon event kinds
//! - [`SendMsgEvent`]: deliver wire messages to a peer, optionally gated
//!   on a [`SendPredicate`], optionally followed by a re-injected event.
//! - [`BroadcastTxn`]: broadcast a transaction with a label.
//! - [`RegisterSpend`]: watch an outpoint for a spend, optionally followed
//!   by a re-injected event once it fires.
//! - [`RegisterConf`]: watch a txid/script for N confirmations, likewise.
//!
//! Registration handles ([`SpendEvent`], [`ConfirmationEvent`]) are
//! single-shot: the waiter that consumes one owns it outright.

use std::{fmt, io};

use async_trait::async_trait;
use bitcoin::{secp256k1::PublicKey, BlockHash, OutPoint, Script, ScriptBuf, Transaction, Txid};
use tokio::sync::oneshot;

use crate::error::ExecutorError;

/// A wire message carried opaquely through the executor.
///
/// The executor never encodes or inspects messages; it only forwards them
/// to [`DaemonAdapters::send_messages`]. Concrete message types and their
/// codecs live with the protocol, not here.
pub trait Message: fmt::Debug + Send + Sync + 'static {
    /// The numeric type tag of this message on the wire.
    fn msg_type(&self) -> u16;

    /// Serializes the message for transport to the remote peer.
    fn encode(&self, w: &mut dyn io::Write) -> io::Result<()>;
}

/// Predicate gating a [`SendMsgEvent`]. Polled until it first returns true.
pub type SendPredicate = Box<dyn Fn() -> bool + Send + Sync + 'static>;

/// A request to send wire messages to a peer.
pub struct SendMsgEvent<E> {
    /// The peer to send the messages to.
    pub target_peer: PublicKey,
    /// The messages, delivered in order.
    pub msgs: Vec<Box<dyn Message>>,
    /// If set, the send is deferred until this predicate first returns
    /// true. The executor polls it at the configured interval.
    pub send_when: Option<SendPredicate>,
    /// Event re-injected into the machine after a successful send.
    pub post_send_event: Option<E>,
}

/// A request to broadcast a transaction.
pub struct BroadcastTxn {
    /// The transaction to broadcast.
    pub tx: Transaction,
    /// Free-form label attached to the broadcast.
    pub label: String,
}

/// A request to be notified once an outpoint is spent.
pub struct RegisterSpend<E> {
    /// The outpoint to watch.
    pub outpoint: OutPoint,
    /// The script the outpoint creates. Needed by BIP 158-like filtering
    /// backends that match on scripts rather than outpoints.
    pub pk_script: ScriptBuf,
    /// Earliest height the spend can occur at, to bound rescans.
    pub height_hint: u32,
    /// Event re-injected into the machine once the spend fires.
    pub post_spend_event: Option<E>,
}

/// A request to be notified once a transaction reaches a confirmation depth.
pub struct RegisterConf<E> {
    /// The transaction to watch.
    pub txid: Txid,
    /// The script the transaction pays to, for script-matching backends.
    pub pk_script: ScriptBuf,
    /// Required confirmation depth. Defaults to 1 when absent.
    pub num_confs: Option<u32>,
    /// Earliest height the confirmation can occur at.
    pub height_hint: u32,
    /// Event re-injected into the machine once the depth is reached.
    pub post_conf_event: Option<E>,
}

/// An action requested by a state transition, executed by the daemon.
#[non_exhaustive]
pub enum DaemonEvent<E> {
    /// Send wire messages to a peer.
    SendMessages(SendMsgEvent<E>),
    /// Broadcast a transaction.
    BroadcastTxn(BroadcastTxn),
    /// Watch for a spend of an outpoint.
    RegisterSpend(RegisterSpend<E>),
    /// Watch for a confirmation depth.
    RegisterConf(RegisterConf<E>),
}

impl<E> DaemonEvent<E> {
    /// Returns a short stable label for use in logs/metrics.
    pub fn as_label(&self) -> &'static str {
        match self {
            DaemonEvent::SendMessages(_) => "send_messages",
            DaemonEvent::BroadcastTxn(_) => "broadcast_txn",
            DaemonEvent::RegisterSpend(_) => "register_spend",
            DaemonEvent::RegisterConf(_) => "register_conf",
        }
    }
}

/// Details of a confirmed transaction, delivered through
/// [`ConfirmationEvent`].
#[derive(Debug, Clone)]
pub struct TxConfirmation {
    /// Hash of the block that buried the transaction deep enough.
    pub block_hash: BlockHash,
    /// Height of that block.
    pub block_height: u32,
}

/// Single-shot handle for a confirmation watch.
///
/// The notifier backend keeps the sending half; the executor's waiter owns
/// this receiving half and fires at most once.
pub struct ConfirmationEvent {
    /// Fires once the watched transaction reaches the requested depth.
    pub confirmed: oneshot::Receiver<TxConfirmation>,
}

impl ConfirmationEvent {
    /// Creates a linked sender/handle pair.
    pub fn channel() -> (oneshot::Sender<TxConfirmation>, Self) {
        let (tx, rx) = oneshot::channel();
        (tx, Self { confirmed: rx })
    }
}

/// Details of a spend, delivered through [`SpendEvent`].
#[derive(Debug, Clone)]
pub struct SpendDetail {
    /// The transaction that spent the watched outpoint.
    pub spender_txid: Txid,
    /// Height the spending transaction confirmed at.
    pub spending_height: u32,
}

/// Single-shot handle for a spend watch.
pub struct SpendEvent {
    /// Fires once the watched outpoint is spent.
    pub spend: oneshot::Receiver<SpendDetail>,
}

impl SpendEvent {
    /// Creates a linked sender/handle pair.
    pub fn channel() -> (oneshot::Sender<SpendDetail>, Self) {
        let (tx, rx) = oneshot::channel();
        (tx, Self { spend: rx })
    }
}

/// Bridge between the pure state machine world and the daemon.
///
/// Implementations do the actual peer messaging, transaction broadcast, and
/// on-chain notification registration. The executor invokes them from its
/// driver task and classifies every failure as a dispatch error, aborting
/// the event chain that requested the action.
#[async_trait]
pub trait DaemonAdapters: Send + Sync + 'static {
    /// Sends the given messages to the target peer, in order.
    async fn send_messages(
        &self,
        peer: PublicKey,
        msgs: Vec<Box<dyn Message>>,
    ) -> Result<(), ExecutorError>;

    /// Broadcasts a transaction, tagged with a label.
    async fn broadcast_transaction(
        &self,
        tx: &Transaction,
        label: &str,
    ) -> Result<(), ExecutorError>;

    /// Registers an intent to be notified once `txid` reaches `num_confs`
    /// confirmations. A `None` txid means: match on `pk_script` alone, then
    /// wait for the containing transaction to reach `num_confs`.
    async fn register_confirmations_ntfn(
        &self,
        txid: Option<Txid>,
        pk_script: &Script,
        num_confs: u32,
        height_hint: u32,
    ) -> Result<ConfirmationEvent, ExecutorError>;

    /// Registers an intent to be notified once `outpoint` is spent. The
    /// script the outpoint creates must also be given, for script-matching
    /// backends.
    async fn register_spend_ntfn(
        &self,
        outpoint: OutPoint,
        pk_script: &Script,
        height_hint: u32,
    ) -> Result<SpendEvent, ExecutorError>;
}
