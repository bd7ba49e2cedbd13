//! Client-side view of one channel.
//!
//! The member list follows the hub: a `channel` snapshot replaces it, `join`
//! and `leave` deltas edit it. Deltas only count when the envelope is scoped
//! to this channel. Nothing outside the crate can edit the list.

use std::sync::{Arc, Weak};

use parking_lot::RwLock;
use serde_json::Value;

use sigrelay_core::event::{HandlerId, Listeners};
use sigrelay_core::protocol::{Address, Envelope, MessageType};
use sigrelay_core::{RelayError, Result};

use crate::client::ClientInner;
use crate::member::MemberMirror;

/// A mirrored channel. Cheap to clone; clones share state.
#[derive(Clone)]
pub struct ChannelMirror {
    state: Arc<ChannelState>,
}

pub(crate) struct ChannelState {
    id: String,
    client: Weak<ClientInner>,
    members: RwLock<Vec<MemberMirror>>,
    listeners: Listeners<Envelope>,
}

impl ChannelMirror {
    pub(crate) fn new(id: impl Into<String>, client: Weak<ClientInner>) -> Self {
        Self {
            state: Arc::new(ChannelState {
                id: id.into(),
                client,
                members: RwLock::new(Vec::new()),
                listeners: Listeners::new(),
            }),
        }
    }

    pub(crate) fn from_state(state: Arc<ChannelState>) -> Self {
        Self { state }
    }

    pub fn id(&self) -> &str {
        &self.state.id
    }

    /// Snapshot of the current members, in hub order.
    pub fn members(&self) -> Vec<MemberMirror> {
        self.state.members.read().clone()
    }

    pub fn member_ids(&self) -> Vec<String> {
        self.state
            .members
            .read()
            .iter()
            .map(|m| m.id().to_string())
            .collect()
    }

    pub fn member(&self, id: &str) -> Option<MemberMirror> {
        self.state.members.read().iter().find(|m| m.id() == id).cloned()
    }

    pub fn has_member(&self, id: &str) -> bool {
        self.member(id).is_some()
    }

    pub fn on<F>(&self, event: impl Into<String>, handler: F) -> HandlerId
    where
        F: Fn(&Envelope) + Send + Sync + 'static,
    {
        self.state.listeners.on(event, handler)
    }

    pub fn off(&self, event: &str, id: HandlerId) -> bool {
        self.state.listeners.off(event, id)
    }

    /// Send scoped to this channel. Unset `channel` becomes this channel and
    /// unset `receiver` becomes ALL; set values are kept.
    pub fn send(&self, env: Envelope) -> Result<()> {
        let client = self
            .state
            .client
            .upgrade()
            .ok_or_else(|| RelayError::Internal("client dropped".into()))?;
        let env = if env.channel().is_none() {
            env.with_channel(self.id())
        } else {
            env
        };
        let env = if env.receiver().is_none() {
            env.with_receiver(Address::All)
        } else {
            env
        };
        client.send(env)
    }

    pub fn send_typed(&self, msg_type: impl Into<MessageType>, content: impl Into<Value>) -> Result<()> {
        self.send(Envelope::new(msg_type).with_content(content))
    }

    /// Apply one inbound envelope routed to this channel.
    pub(crate) fn handle(&self, env: &Envelope) {
        let sender = env.sender_id();
        match env.channel() {
            Some(Address::All) => {
                // broadcasts across channels only concern channels the sender is in
                if !sender.map(|s| self.has_member(s)).unwrap_or(false) {
                    return;
                }
            }
            Some(Address::Id(c)) if c == self.id() => self.apply(env),
            _ => return,
        }

        if let Some(member) = sender.and_then(|s| self.member(s)) {
            member.handle(env);
        }
        self.state.listeners.trigger(env.msg_type().as_str(), env);
    }

    fn apply(&self, env: &Envelope) {
        match env.msg_type() {
            MessageType::Channel => {
                let ids: Vec<String> = match env.content() {
                    Value::Array(items) => items
                        .iter()
                        .filter_map(Value::as_str)
                        .map(str::to_string)
                        .collect(),
                    other => {
                        tracing::warn!(channel = %self.id(), content = %other, "malformed member list");
                        return;
                    }
                };
                let weak = Arc::downgrade(&self.state);
                let mut members = self.state.members.write();
                let mut next: Vec<MemberMirror> = Vec::with_capacity(ids.len());
                for id in ids {
                    if next.iter().any(|m| m.id() == id) {
                        continue;
                    }
                    // keep existing mirrors so their listeners survive a resync
                    let m = members
                        .iter()
                        .find(|m| m.id() == id)
                        .cloned()
                        .unwrap_or_else(|| MemberMirror::new(id, weak.clone()));
                    next.push(m);
                }
                *members = next;
            }
            MessageType::Join => {
                if let Some(id) = env.content_str() {
                    let mut members = self.state.members.write();
                    if !members.iter().any(|m| m.id() == id) {
                        members.push(MemberMirror::new(id, Arc::downgrade(&self.state)));
                    }
                }
            }
            MessageType::Leave => {
                if let Some(id) = env.content_str() {
                    self.state.members.write().retain(|m| m.id() != id);
                }
            }
            _ => {}
        }
    }
}

impl std::fmt::Debug for ChannelMirror {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChannelMirror")
            .field("id", &self.state.id)
            .field("members", &self.member_ids())
            .finish()
    }
}
