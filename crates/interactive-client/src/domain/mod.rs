//! Domain types of the client: configuration, connection state, errors.
//!
//! Nothing here performs I/O; the application layer uses these types to
//! describe what it is doing and why it failed.

pub mod config;
pub mod error;
pub mod state;

pub use config::{ClientConfig, ConfigError};
pub use error::ClientError;
pub use state::ConnectionState;
