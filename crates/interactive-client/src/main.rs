//! interactive-watch: connect to the interactive service and watch a session.
//!
//! Opens a session, declares it ready, prints the scenes and groups the
//! service reports, then logs every pushed event until Ctrl+C.
//!
//! # Usage
//!
//! ```text
//! interactive-watch [OPTIONS]
//!
//! Options:
//!   --config      <PATH>  TOML config file (overridden by the flags below)
//!   --endpoint    <URL>   Websocket endpoint
//!   --token       <TOKEN> Bearer token
//!   --version-id  <ID>    Interactive project version
//!   --sharecode   <CODE>  Share code for unpublished versions
//!   --no-ready            Stay in Connected; do not call `ready`
//! ```
//!
//! | Variable                   | Flag           |
//! |----------------------------|----------------|
//! | `INTERACTIVE_CONFIG`       | `--config`     |
//! | `INTERACTIVE_ENDPOINT`     | `--endpoint`   |
//! | `INTERACTIVE_TOKEN`        | `--token`      |
//! | `INTERACTIVE_VERSION_ID`   | `--version-id` |
//! | `INTERACTIVE_SHARECODE`    | `--sharecode`  |
//!
//! Log verbosity follows `RUST_LOG` (default `info`).

use std::path::PathBuf;

use anyhow::Context;
use clap::Parser;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use interactive_client::{ClientConfig, InteractiveClient, WILDCARD};
use interactive_core::ServerEvent;

/// Connects to the interactive service and logs a session's events.
#[derive(Debug, Parser)]
#[command(name = "interactive-watch", version)]
struct Cli {
    /// TOML config file.  Flags and environment variables override its fields.
    #[arg(long, env = "INTERACTIVE_CONFIG")]
    config: Option<PathBuf>,

    #[arg(long, env = "INTERACTIVE_ENDPOINT")]
    endpoint: Option<String>,

    /// Never printed.
    #[arg(long, env = "INTERACTIVE_TOKEN", hide_env_values = true)]
    token: Option<String>,

    #[arg(long, env = "INTERACTIVE_VERSION_ID")]
    version_id: Option<u64>,

    #[arg(long, env = "INTERACTIVE_SHARECODE")]
    sharecode: Option<String>,

    /// Skip the `ready` call.
    #[arg(long)]
    no_ready: bool,
}

impl Cli {
    fn into_client_config(self) -> anyhow::Result<ClientConfig> {
        let mut config = match &self.config {
            Some(path) => ClientConfig::load(path)
                .with_context(|| format!("loading config from {}", path.display()))?,
            None => ClientConfig::default(),
        };
        if let Some(endpoint) = self.endpoint {
            config.endpoint = endpoint;
        }
        if let Some(token) = self.token {
            config.token = token;
        }
        if let Some(version_id) = self.version_id {
            config.version_id = version_id;
        }
        if self.sharecode.is_some() {
            config.sharecode = self.sharecode;
        }
        anyhow::ensure!(
            !config.endpoint.is_empty(),
            "no endpoint: pass --endpoint, INTERACTIVE_ENDPOINT or a config file"
        );
        Ok(config)
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    let go_ready = !cli.no_ready;
    let config = cli.into_client_config()?;
    info!(endpoint = %config.endpoint, version_id = config.version_id, "interactive-watch starting");

    let client = InteractiveClient::from_config(config);
    let mut events = client.subscribe(WILDCARD);
    let mut state = client.watch_state();

    client.connect().await.context("connecting")?;
    if go_ready {
        client.ready().await.context("declaring ready")?;
    }

    for scene in client.get_scenes().await.context("reading scenes")? {
        info!(scene_id = %scene.scene_id, controls = scene.controls.len(), "scene");
    }
    for group in client.get_groups().await.context("reading groups")? {
        info!(group_id = %group.group_id, scene_id = %group.scene_id, "group");
    }

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                info!("received Ctrl+C; disconnecting");
                break;
            }
            changed = state.changed() => {
                if changed.is_err() || !state.borrow().is_open() {
                    error!("session closed by the service");
                    break;
                }
            }
            event = events.recv() => match event {
                Some(event) => log_event(&event),
                None => break,
            },
        }
    }

    client.disconnect().await;
    info!("interactive-watch stopped");
    Ok(())
}

fn log_event(event: &ServerEvent) {
    match event {
        ServerEvent::GiveInput(input) => {
            info!(
                participant = %input.participant_id,
                control = %input.input.control_id,
                event = %input.input.event,
                "input"
            );
        }
        ServerEvent::ParticipantJoin(participants) => {
            info!(count = participants.len(), "participants joined");
        }
        ServerEvent::ParticipantLeave(participants) => {
            info!(count = participants.len(), "participants left");
        }
        other => info!(method = other.method(), "event"),
    }
}
