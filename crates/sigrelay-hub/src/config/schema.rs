//! Relay configuration: one strict YAML document, validated as a whole.

use std::collections::HashMap;
use std::path::Path;

use serde::Deserialize;
use sigrelay_core::protocol::{ALL, SERVER};
use sigrelay_core::{RelayError, Result};

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RelayConfig {
    pub version: u32,

    #[serde(default)]
    pub gateway: GatewaySection,

    #[serde(default)]
    pub hub: HubSection,

    #[serde(default)]
    pub auth: AuthSection,
}

impl RelayConfig {
    /// Read and validate the config file at `path`. An unreadable file is
    /// `INTERNAL`; bad yaml or out-of-range values are `BAD_REQUEST`.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .map_err(|e| RelayError::Internal(format!("cannot read {}: {e}", path.display())))?;
        Self::from_yaml(&text).map_err(|e| match e {
            RelayError::BadRequest(msg) => RelayError::BadRequest(format!("{}: {msg}", path.display())),
            other => other,
        })
    }

    /// Parse and validate a YAML document. Unknown keys are rejected at every
    /// level.
    pub fn from_yaml(text: &str) -> Result<Self> {
        let cfg: Self = serde_yaml::from_str(text)
            .map_err(|e| RelayError::BadRequest(format!("invalid relay config: {e}")))?;
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn validate(&self) -> Result<()> {
        if self.version != 1 {
            return Err(RelayError::BadRequest(format!(
                "unsupported config version: {}",
                self.version
            )));
        }

        self.gateway.validate()?;
        self.hub.validate()?;
        self.auth.validate()?;

        Ok(())
    }
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            version: 1,
            gateway: GatewaySection::default(),
            hub: HubSection::default(),
            auth: AuthSection::default(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct GatewaySection {
    #[serde(default = "default_listen")]
    pub listen: String,

    #[serde(default = "default_ping_interval_ms")]
    pub ping_interval_ms: u64,

    #[serde(default = "default_idle_timeout_ms")]
    pub idle_timeout_ms: u64,
}

impl Default for GatewaySection {
    fn default() -> Self {
        Self {
            listen: default_listen(),
            ping_interval_ms: default_ping_interval_ms(),
            idle_timeout_ms: default_idle_timeout_ms(),
        }
    }
}

impl GatewaySection {
    pub fn validate(&self) -> Result<()> {
        if !(5000..=120000).contains(&self.ping_interval_ms) {
            return Err(RelayError::BadRequest(
                "gateway.ping_interval_ms must be between 5000 and 120000".into(),
            ));
        }
        if !(10000..=600000).contains(&self.idle_timeout_ms) {
            return Err(RelayError::BadRequest(
                "gateway.idle_timeout_ms must be between 10000 and 600000".into(),
            ));
        }
        if self.idle_timeout_ms <= self.ping_interval_ms {
            return Err(RelayError::BadRequest(
                "gateway.idle_timeout_ms must be greater than ping_interval_ms".into(),
            ));
        }
        Ok(())
    }
}

fn default_listen() -> String {
    "0.0.0.0:8080".into()
}
fn default_ping_interval_ms() -> u64 {
    20000
}
fn default_idle_timeout_ms() -> u64 {
    60000
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct HubSection {
    /// Per-connection outbound queue capacity.
    #[serde(default = "default_outbound_queue")]
    pub outbound_queue: usize,

    /// Largest accepted text frame.
    #[serde(default = "default_max_frame_bytes")]
    pub max_frame_bytes: usize,

    #[serde(default)]
    pub commands: CommandPolicy,
}

impl Default for HubSection {
    fn default() -> Self {
        Self {
            outbound_queue: default_outbound_queue(),
            max_frame_bytes: default_max_frame_bytes(),
            commands: CommandPolicy::default(),
        }
    }
}

impl HubSection {
    pub fn validate(&self) -> Result<()> {
        if !(1..=65536).contains(&self.outbound_queue) {
            return Err(RelayError::BadRequest(
                "hub.outbound_queue must be between 1 and 65536".into(),
            ));
        }
        if self.max_frame_bytes < 256 {
            return Err(RelayError::BadRequest(
                "hub.max_frame_bytes must be at least 256".into(),
            ));
        }
        Ok(())
    }
}

fn default_outbound_queue() -> usize {
    1024
}
fn default_max_frame_bytes() -> usize {
    65536
}

/// Outcome of a membership command no listener decided on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CommandDefault {
    Allow,
    Deny,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CommandPolicy {
    #[serde(default = "allow")]
    pub join: CommandDefault,
    #[serde(default = "allow")]
    pub leave: CommandDefault,
    #[serde(default = "allow")]
    pub open: CommandDefault,
    #[serde(default = "deny")]
    pub close: CommandDefault,
}

impl Default for CommandPolicy {
    fn default() -> Self {
        Self {
            join: allow(),
            leave: allow(),
            open: allow(),
            close: deny(),
        }
    }
}

fn allow() -> CommandDefault {
    CommandDefault::Allow
}
fn deny() -> CommandDefault {
    CommandDefault::Deny
}

/// Static id -> token table used by the shipped binary.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AuthSection {
    #[serde(default)]
    pub tokens: HashMap<String, String>,
}

impl AuthSection {
    pub fn validate(&self) -> Result<()> {
        for (id, token) in &self.tokens {
            if id.is_empty() || id == ALL || id == SERVER {
                return Err(RelayError::BadRequest(format!(
                    "auth.tokens has a reserved or empty user id: {id:?}"
                )));
            }
            if token.is_empty() {
                return Err(RelayError::BadRequest(format!("auth.tokens.{id} is empty")));
            }
        }
        Ok(())
    }
}
