//! The seam through which a client learns where and how to connect.
//!
//! Obtaining credentials and picking the project version are outside this
//! crate.  A [`SessionBootstrap`] is asked for a fresh [`ConnectionTarget`] on
//! every connection attempt, so short-lived tokens can be refreshed between
//! attempts.

use std::fmt;

use async_trait::async_trait;
#[cfg(test)]
use mockall::automock;

/// Everything needed to open one session.
#[derive(Clone, PartialEq, Eq)]
pub struct ConnectionTarget {
    /// Websocket URL (`ws://` or `wss://`).
    pub endpoint: String,
    /// Bearer token.
    pub token: String,
    pub version_id: u64,
    pub sharecode: Option<String>,
}

impl fmt::Debug for ConnectionTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionTarget")
            .field("endpoint", &self.endpoint)
            .field("token", &"<redacted>")
            .field("version_id", &self.version_id)
            .field("sharecode", &self.sharecode.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

/// Supplies a connection target per attempt.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait SessionBootstrap: Send + Sync {
    async fn target(&self) -> anyhow::Result<ConnectionTarget>;
}
