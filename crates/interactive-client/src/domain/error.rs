//! Errors surfaced to callers of the client.

use interactive_core::{Participant, ProtocolError, ReplyError, ValidationError};
use thiserror::Error;

use crate::domain::state::ConnectionState;

/// Everything a client operation can fail with.
///
/// Server-reported failures ([`ClientError::Application`],
/// [`ClientError::RateLimited`]) only affect the call that received them.
/// Transport failures tear the whole connection down; every call that was in
/// flight then resolves with [`ClientError::Disconnected`].
#[derive(Debug, Error)]
pub enum ClientError {
    /// The websocket could not be opened or written.
    #[error("transport error: {0}")]
    Transport(String),

    /// The server answered with an `error` object.
    #[error(transparent)]
    Application(ReplyError),

    /// The server throttled a paged read part-way through.
    ///
    /// `partial` holds what was gathered before the limit hit; pass
    /// `resume_from` as the cursor to continue later.
    #[error("rate limited after {} participants: {error}", .partial.len())]
    RateLimited {
        error: ReplyError,
        partial: Vec<Participant>,
        resume_from: u64,
    },

    /// The request was refused locally and never sent.
    #[error("invalid request: {0}")]
    Validation(#[from] ValidationError),

    /// The operation is not allowed in the current connection state.
    #[error("`{operation}` is not allowed while {state}")]
    InvalidState {
        operation: &'static str,
        state: ConnectionState,
    },

    /// The connection closed before the reply arrived.
    #[error("connection closed before the call completed")]
    Disconnected,

    /// The configured per-call deadline elapsed.
    #[error("`{method}` timed out waiting for a reply")]
    Timeout { method: String },

    /// The reply's `result` did not have the expected shape.
    #[error("unexpected result for `{method}`: {source}")]
    UnexpectedResult {
        method: String,
        #[source]
        source: serde_json::Error,
    },

    /// The session bootstrap could not produce a connection target.
    #[error("session bootstrap failed: {0:#}")]
    Bootstrap(anyhow::Error),

    #[error(transparent)]
    Protocol(#[from] ProtocolError),
}

impl From<ReplyError> for ClientError {
    fn from(err: ReplyError) -> Self {
        ClientError::Application(err)
    }
}
