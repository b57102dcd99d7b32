//! Connection lifecycle states.

use std::fmt;

/// Where a client is in its connection lifecycle.
///
/// ```text
/// Disconnected ─connect─▶ Connecting ─▶ Connected ─ready─▶ Ready
///       ▲                     │             │                │
///       └──────── Disconnecting ◀───────────┴── disconnect ──┘
/// ```
///
/// A failed connect returns straight to `Disconnected`, as does a transport
/// loss detected by the reader.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    /// The socket is open; reads are allowed.
    Connected,
    /// The session has declared itself ready; mutations are allowed.
    Ready,
    Disconnecting,
}

impl ConnectionState {
    /// `true` for states in which read-only calls may be issued.
    pub fn is_open(self) -> bool {
        matches!(self, ConnectionState::Connected | ConnectionState::Ready)
    }
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ConnectionState::Disconnected => "disconnected",
            ConnectionState::Connecting => "connecting",
            ConnectionState::Connected => "connected",
            ConnectionState::Ready => "ready",
            ConnectionState::Disconnecting => "disconnecting",
        })
    }
}
