//! Shared application state for the relay binary.
//!
//! Owns the loaded config and the hub, and installs the static-token
//! authentication policy from `auth.tokens`.

use std::collections::HashMap;
use std::sync::Arc;

use serde_json::Value;
use sigrelay_core::protocol::MessageType;
use sigrelay_core::Result;

use crate::config::RelayConfig;
use crate::hub::Hub;

#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
    hub: Hub,
}

struct AppStateInner {
    cfg: RelayConfig,
}

impl AppState {
    /// Build application state. Returns Result so main can fail without
    /// panicking.
    pub fn new(cfg: RelayConfig) -> Result<Self> {
        cfg.validate()?;

        let hub = Hub::new(cfg.hub.clone());
        install_token_auth(&hub, cfg.auth.tokens.clone());

        Ok(Self {
            inner: Arc::new(AppStateInner { cfg }),
            hub,
        })
    }

    pub fn cfg(&self) -> &RelayConfig {
        &self.inner.cfg
    }

    pub fn hub(&self) -> Hub {
        self.hub.clone()
    }
}

/// Accept `auth {id, token}` when `tokens[id] == token`, refuse otherwise.
pub fn install_token_auth(hub: &Hub, tokens: HashMap<String, String>) {
    if tokens.is_empty() {
        tracing::warn!("auth.tokens is empty; every auth request will fail");
    }
    hub.on(MessageType::Auth.as_str(), move |ctx| {
        let content = ctx.content();
        let id = content.get("id").and_then(Value::as_str);
        let token = content.get("token").and_then(Value::as_str);
        match (id, token) {
            (Some(id), Some(token)) if tokens.get(id).map(String::as_str) == Some(token) => {
                ctx.authenticate(id);
            }
            _ => {
                tracing::info!(conn = %ctx.connection(), user = ?id, "auth refused");
                ctx.fail_authentication();
            }
        }
    });
}
