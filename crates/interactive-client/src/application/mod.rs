//! Application layer: the protocol machinery behind the client.
//!
//! Nothing here touches a socket.  The transport in `infrastructure` feeds
//! inbound frames in through [`inbound::InboundHandler`] and drains outbound
//! frames from a queue; everything between those two points lives here.
//!
//! - **`bootstrap`**: the [`bootstrap::SessionBootstrap`] port that supplies a
//!   connection target per attempt.
//! - **`correlator`**: packet ids and the pending-call table.
//! - **`dispatcher`**: observer registry and per-observer event queues.
//! - **`inbound`**: decodes and routes every inbound frame.
//! - **`throttle`**: local mirror of negotiated bandwidth throttles.
//! - **`cache`**: read-through mirror of scenes, groups, controls and
//!   participants.

use std::sync::{Mutex, MutexGuard, PoisonError};

pub mod bootstrap;
pub mod cache;
pub mod correlator;
pub mod dispatcher;
pub mod inbound;
pub mod throttle;

/// Locks `mutex`, recovering the data if a previous holder panicked.
///
/// Every guarded update here is a single map or vector operation.
pub(crate) fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
