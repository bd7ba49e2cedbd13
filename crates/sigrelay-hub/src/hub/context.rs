//! Per-envelope context handed to hub listeners.
//!
//! Listeners inspect the envelope and the sending connection, and steer the
//! outcome through the completion callbacks. A rejection is sticky: once any
//! listener rejects, later `accept`/`authenticate` calls are ignored.

use parking_lot::Mutex;
use serde_json::Value;

use sigrelay_core::protocol::{Address, Envelope};
use sigrelay_core::{RelayError, Result};

use crate::config::CommandDefault;
use crate::registry::Channel;

use super::{ConnectionId, Hub};

/// What listeners decided about one inbound envelope.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decision {
    /// No listener spoke up.
    Pending,
    Accepted,
    /// Accepted, binding the connection to this user id (`auth`).
    AcceptedAs(String),
    Rejected(RelayError),
}

impl Decision {
    /// Fold an undecided outcome into the configured default.
    pub(crate) fn resolve(self, default: CommandDefault) -> Result<()> {
        match self {
            Decision::Rejected(e) => Err(e),
            Decision::Accepted | Decision::AcceptedAs(_) => Ok(()),
            Decision::Pending => match default {
                CommandDefault::Allow => Ok(()),
                CommandDefault::Deny => Err(RelayError::Invalid("command denied".into())),
            },
        }
    }
}

pub struct HubContext {
    hub: Hub,
    envelope: Envelope,
    connection: ConnectionId,
    user: Option<String>,
    decision: Mutex<Decision>,
}

impl HubContext {
    pub(crate) fn new(hub: Hub, envelope: Envelope, connection: ConnectionId, user: Option<String>) -> Self {
        Self {
            hub,
            envelope,
            connection,
            user,
            decision: Mutex::new(Decision::Pending),
        }
    }

    pub fn envelope(&self) -> &Envelope {
        &self.envelope
    }

    pub fn content(&self) -> &Value {
        self.envelope.content()
    }

    pub fn connection(&self) -> ConnectionId {
        self.connection
    }

    /// User bound to the connection when the envelope arrived.
    pub fn user(&self) -> Option<&str> {
        self.user.as_deref()
    }

    pub fn is_authenticated(&self) -> bool {
        self.user.is_some()
    }

    pub fn sender_matches_user(&self) -> bool {
        self.user.is_some() && self.envelope.sender_id() == self.user.as_deref()
    }

    /// Snapshot of the addressed channel, if it names an open one.
    pub fn channel(&self) -> Option<Channel> {
        self.envelope
            .channel()
            .and_then(Address::as_id)
            .and_then(|id| self.hub.channel(id))
    }

    pub fn channels_of_user(&self) -> Vec<String> {
        self.user
            .as_deref()
            .map(|u| self.hub.channels_of(u))
            .unwrap_or_default()
    }

    pub fn hub(&self) -> &Hub {
        &self.hub
    }

    pub fn decision(&self) -> Decision {
        self.decision.lock().clone()
    }

    /// Accept an `auth` request as user `id`.
    pub fn authenticate(&self, id: impl Into<String>) {
        let mut d = self.decision.lock();
        if !matches!(*d, Decision::Rejected(_)) {
            *d = Decision::AcceptedAs(id.into());
        }
    }

    pub fn fail_authentication(&self) {
        self.reject(RelayError::AuthFailed);
    }

    pub fn accept(&self) {
        let mut d = self.decision.lock();
        if matches!(*d, Decision::Pending) {
            *d = Decision::Accepted;
        }
    }

    /// First rejection wins.
    pub fn reject(&self, err: RelayError) {
        let mut d = self.decision.lock();
        if !matches!(*d, Decision::Rejected(_)) {
            *d = Decision::Rejected(err);
        }
    }

    /// Answer the envelope on the originating connection.
    pub fn reply(&self, content: impl Into<Value>) -> bool {
        let answer = self
            .envelope
            .as_answer_with(content)
            .with_sender(Address::Server);
        self.hub.deliver(self.connection, answer)
    }

    pub(crate) fn into_parts(self) -> (Envelope, Option<String>, Decision) {
        (self.envelope, self.user, self.decision.into_inner())
    }
}
