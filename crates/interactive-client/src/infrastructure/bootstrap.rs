//! A bootstrap that always hands out the same target.

use anyhow::{ensure, Context};
use async_trait::async_trait;

use crate::application::bootstrap::{ConnectionTarget, SessionBootstrap};
use crate::domain::ClientConfig;

/// Serves one fixed [`ConnectionTarget`], usually built from a [`ClientConfig`].
#[derive(Debug, Clone)]
pub struct StaticBootstrap {
    target: ConnectionTarget,
}

impl StaticBootstrap {
    pub fn new(target: ConnectionTarget) -> Self {
        Self { target }
    }

    pub fn from_config(config: &ClientConfig) -> Self {
        Self::new(ConnectionTarget {
            endpoint: config.endpoint.clone(),
            token: config.token.clone(),
            version_id: config.version_id,
            sharecode: config.sharecode.clone(),
        })
    }
}

#[async_trait]
impl SessionBootstrap for StaticBootstrap {
    async fn target(&self) -> anyhow::Result<ConnectionTarget> {
        ensure!(!self.target.endpoint.is_empty(), "no endpoint configured");
        url_scheme(&self.target.endpoint)
            .filter(|scheme| matches!(*scheme, "ws" | "wss"))
            .with_context(|| format!("endpoint `{}` is not a ws:// or wss:// URL", self.target.endpoint))?;
        Ok(self.target.clone())
    }
}

fn url_scheme(url: &str) -> Option<&str> {
    url.split_once("://").map(|(scheme, _)| scheme)
}
