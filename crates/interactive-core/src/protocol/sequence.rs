//! Per-connection packet id allocation.
//!
//! Every method packet the client sends carries an id that the server echoes
//! in its reply.  Ids are handed out from a single atomic counter owned by the
//! connection, so concurrent callers can never be given the same id and ids
//! are strictly increasing in the order they were issued.
//!
//! Unlike a wrapping sequence number, the counter refuses to hand out an id
//! once `u32::MAX` has been used: a reused id could resolve the wrong caller.

use std::sync::atomic::{AtomicU32, Ordering};

use crate::protocol::packet::FIRST_PACKET_ID;

/// A thread-safe, strictly increasing packet id allocator.
///
/// # Examples
///
/// ```rust
/// use interactive_core::protocol::PacketIdCounter;
///
/// let ids = PacketIdCounter::new();
/// assert_eq!(ids.next(), Some(0));
/// assert_eq!(ids.next(), Some(1));
/// ```
#[derive(Debug)]
pub struct PacketIdCounter {
    /// The next id to hand out.
    next: AtomicU32,
    /// Set once `u32::MAX` itself has been issued.
    exhausted: std::sync::atomic::AtomicBool,
}

impl PacketIdCounter {
    /// Creates a counter starting at [`FIRST_PACKET_ID`].
    pub fn new() -> Self {
        Self::starting_at(FIRST_PACKET_ID)
    }

    /// Creates a counter whose first id is `first`.
    pub fn starting_at(first: u32) -> Self {
        Self {
            next: AtomicU32::new(first),
            exhausted: std::sync::atomic::AtomicBool::new(false),
        }
    }

    /// Returns the next id, or `None` once every `u32` has been issued.
    pub fn next(&self) -> Option<u32> {
        if self.exhausted.load(Ordering::Acquire) {
            return None;
        }
        // `fetch_update` retries on contention, so two callers never observe
        // the same previous value.
        let issued = self
            .next
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |current| {
                current.checked_add(1)
            });
        match issued {
            Ok(id) => Some(id),
            Err(last) => {
                // `last` is u32::MAX: hand it out exactly once, then close.
                if self
                    .exhausted
                    .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
                    .is_ok()
                {
                    Some(last)
                } else {
                    None
                }
            }
        }
    }

    /// The id the next call to [`next`](Self::next) would return.
    ///
    /// Diagnostic only: another thread may claim it first.
    pub fn peek(&self) -> Option<u32> {
        if self.exhausted.load(Ordering::Acquire) {
            None
        } else {
            Some(self.next.load(Ordering::Acquire))
        }
    }
}

impl Default for PacketIdCounter {
    fn default() -> Self {
        Self::new()
    }
}
