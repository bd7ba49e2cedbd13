//! Client handle: mirrored hub state plus correlated requests.
//!
//! Every envelope from the hub goes through [`ClientHandle::handle_inbound`].
//! Outgoing envelopes are pushed onto the outbound queue; whoever owns the
//! receiving half (normally the WebSocket pump in `transport`) writes them.

use std::sync::Arc;
use std::time::Duration;

use parking_lot::RwLock;
use serde_json::{json, Value};
use tokio::sync::mpsc;

use sigrelay_core::event::{HandlerId, Listeners};
use sigrelay_core::protocol::{Address, Envelope, MessageType, Reply};
use sigrelay_core::{RelayError, Result};

use crate::channel::ChannelMirror;
use crate::config::ClientConfig;
use crate::pending::{PendingGuard, PendingRequests};

#[derive(Clone)]
pub struct ClientHandle {
    inner: Arc<ClientInner>,
}

pub(crate) struct ClientInner {
    cfg: ClientConfig,
    id: RwLock<Option<String>>,
    channels: RwLock<Vec<ChannelMirror>>,
    listeners: Listeners<Envelope>,
    pending: PendingRequests,
    outbound: mpsc::Sender<Envelope>,
}

impl ClientInner {
    /// Fill `sender` (own id), `channel` and `receiver` (ALL) when unset and
    /// queue the envelope.
    pub(crate) fn send(&self, env: Envelope) -> Result<()> {
        let mut env = env;
        if env.sender().is_none() {
            if let Some(id) = self.id.read().as_deref() {
                env = env.with_sender(id);
            }
        }
        if env.channel().is_none() {
            env = env.with_channel(Address::All);
        }
        if env.receiver().is_none() {
            env = env.with_receiver(Address::All);
        }

        self.outbound.try_send(env).map_err(|e| match e {
            mpsc::error::TrySendError::Full(_) => RelayError::Internal("outbound queue full".into()),
            mpsc::error::TrySendError::Closed(_) => RelayError::Internal("connection closed".into()),
        })
    }
}

impl ClientHandle {
    pub fn new(outbound: mpsc::Sender<Envelope>, cfg: ClientConfig) -> Self {
        let pending = PendingRequests::new(cfg.max_pending);
        Self {
            inner: Arc::new(ClientInner {
                cfg,
                id: RwLock::new(None),
                channels: RwLock::new(Vec::new()),
                listeners: Listeners::new(),
                pending,
                outbound,
            }),
        }
    }

    /// Own user id; `None` until authenticated.
    pub fn id(&self) -> Option<String> {
        self.inner.id.read().clone()
    }

    /// Snapshot of the joined channels.
    pub fn channels(&self) -> Vec<ChannelMirror> {
        self.inner.channels.read().clone()
    }

    pub fn channel(&self, id: &str) -> Option<ChannelMirror> {
        self.inner.channels.read().iter().find(|c| c.id() == id).cloned()
    }

    pub fn pending_count(&self) -> usize {
        self.inner.pending.len()
    }

    pub fn on<F>(&self, event: impl Into<String>, handler: F) -> HandlerId
    where
        F: Fn(&Envelope) + Send + Sync + 'static,
    {
        self.inner.listeners.on(event, handler)
    }

    pub fn off(&self, event: &str, id: HandlerId) -> bool {
        self.inner.listeners.off(event, id)
    }

    // --------------------
    // Inbound
    // --------------------

    pub fn handle_inbound(&self, env: Envelope) {
        if self.inner.pending.resolve(&env) {
            tracing::trace!(answered = ?env.answered(), "request answered");
        }

        if *env.msg_type() == MessageType::Channel {
            if let Some(id) = env.channel().and_then(Address::as_id) {
                self.ensure_channel(id);
            }
        }

        let targets: Vec<ChannelMirror> = match env.channel() {
            Some(Address::All) => self.channels(),
            Some(Address::Id(c)) => self.channel(c).into_iter().collect(),
            _ => Vec::new(),
        };
        for ch in &targets {
            ch.handle(&env);
        }

        match env.msg_type() {
            MessageType::Leave if env.content_str().is_some() && env.content_str() == self.id().as_deref() => {
                if let Some(c) = env.channel().and_then(Address::as_id) {
                    self.drop_channel(c);
                }
            }
            MessageType::Close => {
                if let Some(c) = env.content_str() {
                    self.drop_channel(c);
                }
            }
            MessageType::Deauth => self.reset(),
            _ => {}
        }

        self.inner.listeners.trigger(env.msg_type().as_str(), &env);
    }

    /// Transport came up.
    pub fn connected(&self) {
        self.inner
            .listeners
            .trigger(MessageType::Connect.as_str(), &Envelope::new(MessageType::Connect));
    }

    /// Transport went away: outstanding requests fail and local state resets.
    pub fn disconnected(&self) {
        let failed = self.inner.pending.clear();
        if failed > 0 {
            tracing::debug!(failed, "pending requests failed by disconnect");
        }
        self.reset();
        self.inner
            .listeners
            .trigger(MessageType::Disconnect.as_str(), &Envelope::new(MessageType::Disconnect));
    }

    // --------------------
    // Outbound
    // --------------------

    pub fn send(&self, env: Envelope) -> Result<()> {
        self.inner.send(env)
    }

    pub fn send_typed(&self, msg_type: impl Into<MessageType>, content: impl Into<Value>) -> Result<()> {
        self.send(Envelope::new(msg_type).with_content(content))
    }

    /// Send a request to the hub and wait for its answer, using the
    /// configured timeout.
    pub async fn request(&self, msg_type: impl Into<MessageType>, content: impl Into<Value>) -> Result<Envelope> {
        let timeout = self.inner.cfg.request_timeout;
        self.request_with_timeout(msg_type, content, timeout).await
    }

    pub async fn request_with_timeout(
        &self,
        msg_type: impl Into<MessageType>,
        content: impl Into<Value>,
        timeout: Duration,
    ) -> Result<Envelope> {
        let env = Envelope::new(msg_type)
            .with_content(content)
            .with_receiver(Address::Server);
        let rx = self.inner.pending.register(env.id())?;
        let _guard = PendingGuard::new(&self.inner.pending, env.id());
        let request_id = env.id().to_string();
        self.inner.send(env)?;

        match tokio::time::timeout(timeout, rx).await {
            Ok(Ok(answer)) => Ok(answer),
            Ok(Err(_)) => Err(RelayError::Internal("connection closed before answer".into())),
            Err(_) => {
                tracing::debug!(request = %request_id, ?timeout, "request timed out");
                Err(RelayError::Timeout)
            }
        }
    }

    // --------------------
    // Commands
    // --------------------

    pub async fn auth(&self, id: &str, token: &str) -> Result<()> {
        let answer = self
            .request(MessageType::Auth, json!({ "id": id, "token": token }))
            .await?;
        expect_success(&answer)?;
        *self.inner.id.write() = Some(id.to_string());
        tracing::info!(user = id, "authenticated");
        Ok(())
    }

    pub async fn deauth(&self) -> Result<()> {
        let answer = self.request(MessageType::Deauth, Value::Null).await?;
        expect_success(&answer)?;
        self.reset();
        Ok(())
    }

    /// Join an open channel. Already joined: returns the existing mirror
    /// without asking the hub.
    pub async fn join(&self, name: &str) -> Result<ChannelMirror> {
        if let Some(ch) = self.channel(name) {
            return Ok(ch);
        }
        let answer = self.request(MessageType::Join, name).await?;
        expect_success(&answer)?;
        Ok(self.ensure_channel(name))
    }

    /// Leave a joined channel. Not joined locally: no-op.
    pub async fn leave(&self, name: &str) -> Result<()> {
        if self.channel(name).is_none() {
            return Ok(());
        }
        let answer = self.request(MessageType::Leave, name).await?;
        expect_success(&answer)?;
        self.drop_channel(name);
        Ok(())
    }

    /// Open a new channel on the hub and join it.
    pub async fn create(&self, name: &str) -> Result<ChannelMirror> {
        if let Some(ch) = self.channel(name) {
            return Ok(ch);
        }
        let answer = self.request(MessageType::Open, name).await?;
        expect_success(&answer)?;
        Ok(self.ensure_channel(name))
    }

    // --------------------
    // Local state
    // --------------------

    fn ensure_channel(&self, id: &str) -> ChannelMirror {
        let mut channels = self.inner.channels.write();
        if let Some(ch) = channels.iter().find(|c| c.id() == id) {
            return ch.clone();
        }
        let ch = ChannelMirror::new(id, Arc::downgrade(&self.inner));
        channels.push(ch.clone());
        ch
    }

    fn drop_channel(&self, id: &str) {
        self.inner.channels.write().retain(|c| c.id() != id);
    }

    fn reset(&self) {
        *self.inner.id.write() = None;
        self.inner.channels.write().clear();
    }
}

/// Success, or the error kind the hub reported (`INVALID` when it gave none).
fn expect_success(answer: &Envelope) -> Result<()> {
    match Reply::from_value(answer.content()) {
        Some(reply) => reply.into_result(),
        None => Err(RelayError::Invalid("malformed reply".into())),
    }
}

impl std::fmt::Debug for ClientHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClientHandle")
            .field("id", &self.id())
            .field("channels", &self.inner.channels.read().len())
            .field("pending", &self.pending_count())
            .finish()
    }
}
