//! Infrastructure layer: adapters to the outside world.
//!
//! **Dependency rule**: this layer may depend on `application` and `domain`,
//! but MUST NOT be imported by them.
//!
//! - **`transport`**: websocket handshake (`tokio-tungstenite`) and the
//!   writer/reader tasks of one connection.
//! - **`bootstrap`**: [`bootstrap::StaticBootstrap`], a session bootstrap that
//!   serves a fixed target from configuration.

pub mod bootstrap;
pub mod transport;
