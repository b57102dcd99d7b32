//! interactive-client library entry point.
//!
//! An async client for the interactive service: a game or app connects over
//! a websocket, publishes scenes of controls, and receives viewer input as
//! JSON packets.
//!
//! # Layers
//!
//! - **`domain`**: configuration, connection state, and the error taxonomy.
//! - **`application`**: transport-agnostic machinery.  Request correlation,
//!   event dispatch, throttle accounting, the resource cache, and the
//!   inbound frame router.
//! - **`infrastructure`**: the websocket transport and the static session
//!   bootstrap.
//! - **`client`**: [`InteractiveClient`], which wires the layers together.
//!
//! # Quick start
//!
//! ```no_run
//! use interactive_client::{ClientConfig, InteractiveClient, WILDCARD};
//!
//! # async fn run() -> anyhow::Result<()> {
//! let client = InteractiveClient::from_config(ClientConfig::load(
//!     std::path::Path::new("interactive.toml"),
//! )?);
//! let mut events = client.subscribe(WILDCARD);
//! client.connect().await?;
//! client.ready().await?;
//! while let Some(event) = events.recv().await {
//!     println!("{}", event.method());
//! }
//! # Ok(())
//! # }
//! ```

pub mod application;
pub mod client;
pub mod domain;
pub mod infrastructure;

pub use application::bootstrap::{ConnectionTarget, SessionBootstrap};
pub use application::dispatcher::{EventObserver, EventStream, WILDCARD};
pub use application::throttle::ThrottleVerdict;
pub use client::InteractiveClient;
pub use domain::{ClientConfig, ClientError, ConfigError, ConnectionState};
pub use infrastructure::bootstrap::StaticBootstrap;
