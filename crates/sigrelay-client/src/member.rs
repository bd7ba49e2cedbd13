//! Client-side view of one channel member.

use std::sync::{Arc, Weak};

use serde_json::Value;

use sigrelay_core::event::{HandlerId, Listeners};
use sigrelay_core::protocol::{Address, Envelope, MessageType};
use sigrelay_core::{RelayError, Result};

use crate::channel::{ChannelMirror, ChannelState};

/// A member of a mirrored channel. Cheap to clone.
#[derive(Clone)]
pub struct MemberMirror {
    state: Arc<MemberState>,
}

struct MemberState {
    id: String,
    channel: Weak<ChannelState>,
    listeners: Listeners<Envelope>,
}

impl MemberMirror {
    pub(crate) fn new(id: impl Into<String>, channel: Weak<ChannelState>) -> Self {
        Self {
            state: Arc::new(MemberState {
                id: id.into(),
                channel,
                listeners: Listeners::new(),
            }),
        }
    }

    pub fn id(&self) -> &str {
        &self.state.id
    }

    /// The owning channel mirror, while it is still alive.
    pub fn channel(&self) -> Option<ChannelMirror> {
        self.state.channel.upgrade().map(ChannelMirror::from_state)
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

    /// Send through the owning channel; `receiver` defaults to this member.
    pub fn send(&self, env: Envelope) -> Result<()> {
        let channel = self
            .channel()
            .ok_or_else(|| RelayError::Internal("channel mirror dropped".into()))?;
        let env = if env.receiver().is_none() {
            env.with_receiver(self.id())
        } else {
            env
        };
        channel.send(env)
    }

    pub fn send_typed(&self, msg_type: impl Into<MessageType>, content: impl Into<Value>) -> Result<()> {
        self.send(Envelope::new(msg_type).with_content(content))
    }

    /// Trigger listeners for envelopes this member sent.
    pub(crate) fn handle(&self, env: &Envelope) {
        let from_me = env.sender_id() == Some(self.id());
        if from_me || env.sender() == Some(&Address::All) {
            self.state.listeners.trigger(env.msg_type().as_str(), env);
        }
    }
}

impl std::fmt::Debug for MemberMirror {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemberMirror").field("id", &self.state.id).finish()
    }
}
