//! Request correlation: matching replies to the calls that caused them.
//!
//! Every outbound call gets a fresh id from the connection's
//! [`PacketIdCounter`] and a [`oneshot`] completion slot stored in the pending
//! table.  The reader task hands each reply to [`Correlator::resolve`], which
//! removes the entry and fires the slot.  Because the entry is removed before
//! it fires, a second reply with the same id finds nothing and is dropped.
//!
//! On teardown [`Correlator::close_all`] drops every slot.  Each waiting
//! caller then observes a closed channel exactly once, which
//! [`await_outcome`] turns into [`ClientError::Disconnected`].  The table is
//! also marked closed so a call racing with the teardown cannot register
//! after the drain and wait forever.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use interactive_core::protocol::ReplyPacket;
use interactive_core::{PacketIdCounter, ProtocolError, ReplyError};
use serde_json::Value;
use tokio::sync::oneshot;
use tracing::{debug, info, warn};

use crate::application::lock;
use crate::domain::ClientError;

/// What a completion slot carries: the reply's result or its error object.
pub type ReplyOutcome = Result<Value, ReplyError>;

/// The receiving half handed back to the caller of [`Correlator::register`].
pub type ReplySlot = oneshot::Receiver<ReplyOutcome>;

/// One call waiting for its reply.
#[derive(Debug)]
struct PendingRequest {
    method: String,
    issued_at: Instant,
    slot: oneshot::Sender<ReplyOutcome>,
}

#[derive(Debug, Default)]
struct PendingTable {
    entries: HashMap<u32, PendingRequest>,
    closed: bool,
}

/// Per-connection id allocator plus pending-call table.
#[derive(Debug, Default)]
pub struct Correlator {
    ids: PacketIdCounter,
    pending: Mutex<PendingTable>,
}

impl Correlator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Allocates an id for `method` and registers its completion slot.
    ///
    /// # Errors
    ///
    /// - [`ClientError::Disconnected`] once the connection has been torn down.
    /// - [`ClientError::Protocol`] when the id space is exhausted.
    pub fn register(&self, method: &str) -> Result<(u32, ReplySlot), ClientError> {
        let mut table = lock(&self.pending);
        if table.closed {
            return Err(ClientError::Disconnected);
        }
        // Allocate under the table lock so ids enter the table in order.
        let id = self.ids.next().ok_or(ProtocolError::IdSpaceExhausted)?;
        let (tx, rx) = oneshot::channel();
        table.entries.insert(
            id,
            PendingRequest {
                method: method.to_string(),
                issued_at: Instant::now(),
                slot: tx,
            },
        );
        debug!(id, method, pending = table.entries.len(), "registered pending call");
        Ok((id, rx))
    }

    /// Completes the call whose id the reply echoes.
    ///
    /// Returns `false` (and logs) when no call is waiting on that id, which
    /// covers both unknown ids and duplicate replies.
    pub fn resolve(&self, reply: ReplyPacket) -> bool {
        let entry = lock(&self.pending).entries.remove(&reply.id);
        let Some(entry) = entry else {
            warn!(id = reply.id, "reply for unknown or already answered call (dropped)");
            return false;
        };
        let elapsed = entry.issued_at.elapsed();
        debug!(id = reply.id, method = %entry.method, ?elapsed, "reply received");
        if entry.slot.send(reply.into_outcome()).is_err() {
            debug!(method = %entry.method, "caller stopped waiting before the reply arrived");
        }
        true
    }

    /// Forgets a pending call without completing it.
    pub fn cancel(&self, id: u32) -> bool {
        lock(&self.pending).entries.remove(&id).is_some()
    }

    /// Fails every pending call and refuses new registrations.
    ///
    /// Returns how many calls were cancelled.  Calling it again is harmless.
    pub fn close_all(&self) -> usize {
        let drained: Vec<PendingRequest> = {
            let mut table = lock(&self.pending);
            table.closed = true;
            table.entries.drain().map(|(_, entry)| entry).collect()
        };
        for entry in &drained {
            debug!(method = %entry.method, "cancelling pending call");
        }
        if !drained.is_empty() {
            info!(cancelled = drained.len(), "failed pending calls on disconnect");
        }
        // Dropping the senders wakes each receiver with a closed-channel error.
        drained.len()
    }

    pub fn pending_count(&self) -> usize {
        lock(&self.pending).entries.len()
    }

    /// The id the next call will be given, if any remain.
    pub fn next_id(&self) -> Option<u32> {
        self.ids.peek()
    }
}

/// Waits for a reply slot, optionally bounded by `deadline`.
///
/// On expiry the pending entry `id` is removed from `correlator` so a late
/// reply is treated as unknown.
pub async fn await_outcome(
    correlator: &Correlator,
    id: u32,
    method: &str,
    slot: ReplySlot,
    deadline: Option<Duration>,
) -> Result<Value, ClientError> {
    let received = match deadline {
        Some(limit) => match tokio::time::timeout(limit, slot).await {
            Ok(received) => received,
            Err(_) => {
                correlator.cancel(id);
                warn!(id, method, ?limit, "call timed out");
                return Err(ClientError::Timeout {
                    method: method.to_string(),
                });
            }
        },
        None => slot.await,
    };
    match received {
        Ok(Ok(result)) => Ok(result),
        Ok(Err(error)) => Err(ClientError::Application(error)),
        Err(_) => Err(ClientError::Disconnected),
    }
}
