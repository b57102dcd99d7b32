//! Client configuration, loaded from TOML.
//!
//! ```toml
//! endpoint = "wss://interactive.example.net/gameClient"
//! token = "..."
//! version_id = 123456
//! call_timeout_ms = 10000
//! ```
//!
//! Every field except the connection target has a default, so a minimal file
//! only names where to connect and with which credentials.  Fields annotated
//! with `#[serde(default = "some_fn")]` take `some_fn()` when absent.

use std::path::{Path, PathBuf};
use std::time::Duration;

use interactive_core::PROTOCOL_VERSION;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Error type for configuration loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The config file could not be read.
    #[error("I/O error reading config at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The TOML content could not be parsed.
    #[error("failed to parse config TOML: {0}")]
    Parse(#[from] toml::de::Error),
}

/// Settings for one [`InteractiveClient`](crate::InteractiveClient).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClientConfig {
    /// Websocket URL of the interactive service.
    #[serde(default)]
    pub endpoint: String,
    /// Bearer token sent in the `Authorization` header.  Never logged.
    #[serde(default)]
    pub token: String,
    /// Which interactive project version the session runs.
    #[serde(default)]
    pub version_id: u64,
    /// Optional share code for unpublished versions.
    #[serde(default)]
    pub sharecode: Option<String>,
    /// Sent as `X-Protocol-Version`.
    #[serde(default = "default_protocol_version")]
    pub protocol_version: String,
    /// Per-call deadline in milliseconds.  `None` waits until reply or disconnect.
    #[serde(default)]
    pub call_timeout_ms: Option<u64>,
    /// Capacity of the outbound frame queue feeding the writer task.
    #[serde(default = "default_outbound_queue")]
    pub outbound_queue: usize,
    /// Upper bound on pages fetched by one `get_all_participants` call.
    #[serde(default = "default_participant_page_limit")]
    pub participant_page_limit: usize,
}

fn default_protocol_version() -> String {
    PROTOCOL_VERSION.to_string()
}

fn default_outbound_queue() -> usize {
    64
}

fn default_participant_page_limit() -> usize {
    100
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            endpoint: String::new(),
            token: String::new(),
            version_id: 0,
            sharecode: None,
            protocol_version: default_protocol_version(),
            call_timeout_ms: None,
            outbound_queue: default_outbound_queue(),
            participant_page_limit: default_participant_page_limit(),
        }
    }
}

impl ClientConfig {
    /// A config pointing at `endpoint` with everything else defaulted.
    pub fn new(endpoint: impl Into<String>, token: impl Into<String>, version_id: u64) -> Self {
        Self {
            endpoint: endpoint.into(),
            token: token.into(),
            version_id,
            ..Self::default()
        }
    }

    /// Parses a config from TOML text.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Parse`] if the TOML is invalid.
    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(text)?)
    }

    /// Reads and parses a config file.
    ///
    /// # Errors
    ///
    /// - [`ConfigError::Io`] if the file cannot be read.
    /// - [`ConfigError::Parse`] if the TOML is invalid.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&text)
    }

    pub fn call_timeout(&self) -> Option<Duration> {
        self.call_timeout_ms.map(Duration::from_millis)
    }
}
