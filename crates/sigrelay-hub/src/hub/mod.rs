//! The hub: sole owner of membership state and router of envelopes.
//!
//! A host (the WebSocket layer, or a test) feeds connection events in:
//! `connect`, `handle_text`/`handle_inbound`, `disconnect`, `fail`. The hub
//! answers by pushing envelopes onto the per-connection outbound queues handed
//! to `connect`.
//!
//! Everything that touches membership runs under one re-entrant gate, so
//! listeners may call back into the hub (`join`, `send`, ...) while an envelope
//! is being processed. The registry lock itself is only held for short
//! sections and never while listeners run.

mod context;
pub mod route;
pub mod sessions;

use std::sync::Arc;

use chrono::Utc;
use parking_lot::{Mutex, ReentrantMutex};
use serde_json::Value;
use tokio::sync::mpsc;

use sigrelay_core::event::{HandlerId, Listeners};
use sigrelay_core::protocol::{codec, Address, Envelope, MessageType, Reply};
use sigrelay_core::{RelayError, Result};

use crate::config::HubSection;
use crate::registry::{Channel, Registry, User};

pub use context::{Decision, HubContext};
pub use sessions::{ConnState, ConnectionId, SessionTable};

/// Listener event fired for every inbound envelope, after the type event.
pub const MESSAGE_EVENT: &str = "message";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Command {
    Auth,
    Deauth,
    Join,
    Leave,
    Open,
    Close,
}

impl Command {
    fn of(t: &MessageType) -> Option<Self> {
        match t {
            MessageType::Auth => Some(Command::Auth),
            MessageType::Deauth => Some(Command::Deauth),
            MessageType::Join => Some(Command::Join),
            MessageType::Leave => Some(Command::Leave),
            MessageType::Open => Some(Command::Open),
            MessageType::Close => Some(Command::Close),
            _ => None,
        }
    }
}

enum Route {
    Command(Command),
    Server,
    Forward,
}

#[derive(Clone)]
pub struct Hub {
    inner: Arc<HubInner>,
}

struct HubInner {
    cfg: HubSection,
    gate: ReentrantMutex<()>,
    registry: Mutex<Registry>,
    sessions: SessionTable,
    listeners: Listeners<HubContext>,
}

impl Hub {
    pub fn new(cfg: HubSection) -> Self {
        Self {
            inner: Arc::new(HubInner {
                cfg,
                gate: ReentrantMutex::new(()),
                registry: Mutex::new(Registry::new()),
                sessions: SessionTable::new(),
                listeners: Listeners::new(),
            }),
        }
    }

    pub fn config(&self) -> &HubSection {
        &self.inner.cfg
    }

    /// Outbound queue sized per `hub.outbound_queue`.
    pub fn outbound_channel(&self) -> (mpsc::Sender<Envelope>, mpsc::Receiver<Envelope>) {
        mpsc::channel(self.inner.cfg.outbound_queue)
    }

    // --------------------
    // Listeners
    // --------------------

    /// Listen for an envelope type, `"message"`, or a lifecycle event
    /// (`"connect"`, `"disconnect"`, `"error"`).
    pub fn on<F>(&self, event: impl Into<String>, handler: F) -> HandlerId
    where
        F: Fn(&HubContext) + Send + Sync + 'static,
    {
        self.inner.listeners.on(event, handler)
    }

    pub fn off(&self, event: &str, id: HandlerId) -> bool {
        self.inner.listeners.off(event, id)
    }

    // --------------------
    // Connection lifecycle
    // --------------------

    pub fn connect(&self, outbound: mpsc::Sender<Envelope>) -> ConnectionId {
        let _gate = self.inner.gate.lock();
        let conn = self.inner.sessions.register(outbound);
        tracing::debug!(%conn, "connection registered");

        let env = Envelope::new(MessageType::Connect).with_receiver(Address::Server);
        let ctx = HubContext::new(self.clone(), env, conn, None);
        self.inner.listeners.trigger(MessageType::Connect.as_str(), &ctx);
        conn
    }

    /// Decode one text frame and process it. Undecodable frames are answered
    /// with a `BAD_REQUEST` error envelope.
    pub fn handle_text(&self, conn: ConnectionId, text: &str) {
        match codec::decode(text) {
            Ok(env) => self.handle_inbound(conn, env),
            Err(e) => {
                tracing::debug!(%conn, error = %e, "undecodable frame");
                let env = Envelope::new(MessageType::Error)
                    .with_content(Reply::err(e.kind()))
                    .with_sender(Address::Server);
                self.deliver(conn, env);
            }
        }
    }

    pub fn handle_inbound(&self, conn: ConnectionId, env: Envelope) {
        let _gate = self.inner.gate.lock();
        match self.inner.sessions.state(conn) {
            Some(s) if !s.is_terminal() => {}
            _ => {
                tracing::debug!(%conn, "envelope for unknown connection dropped");
                return;
            }
        }

        let env = env.with_forwarded(Utc::now());
        let user = self.user_of(conn);

        let checked = route::validate(&self.inner.registry.lock(), &env, user.as_deref());
        if let Err(e) = checked {
            self.reply_error(conn, &env, &e);
            return;
        }

        let route = match Command::of(env.msg_type()) {
            Some(cmd) => Route::Command(cmd),
            None if env.msg_type().is_control() => {
                let e = RelayError::Invalid(format!("{} is not a client command", env.msg_type()));
                self.reply_error(conn, &env, &e);
                return;
            }
            None if env.is_server_bound() => Route::Server,
            None => Route::Forward,
        };

        let ctx = HubContext::new(self.clone(), env, conn, user);
        let event = ctx.envelope().msg_type().as_str().to_string();
        self.inner.listeners.trigger(&event, &ctx);
        if event != MESSAGE_EVENT {
            self.inner.listeners.trigger(MESSAGE_EVENT, &ctx);
        }
        let (env, user, decision) = ctx.into_parts();

        match route {
            Route::Command(cmd) => self.perform(cmd, conn, user, &env, decision),
            Route::Server => {
                if let Decision::Rejected(e) = decision {
                    self.reply_error(conn, &env, &e);
                }
            }
            Route::Forward => match decision {
                Decision::Rejected(e) => self.reply_error(conn, &env, &e),
                _ => {
                    let n = self.send(env);
                    tracing::trace!(%conn, delivered = n, "forwarded");
                }
            },
        }
    }

    /// Transport closed normally.
    pub fn disconnect(&self, conn: ConnectionId) -> Option<ConnState> {
        self.terminate(conn, ConnState::Closed, MessageType::Disconnect, Value::Null)
    }

    /// Transport failed.
    pub fn fail(&self, conn: ConnectionId, reason: &str) -> Option<ConnState> {
        self.terminate(conn, ConnState::Errored, MessageType::Error, Value::from(reason))
    }

    fn terminate(&self, conn: ConnectionId, state: ConnState, event: MessageType, content: Value) -> Option<ConnState> {
        let _gate = self.inner.gate.lock();
        if self.inner.sessions.state(conn)?.is_terminal() {
            return None;
        }
        let user = self.user_of(conn);

        let mut env = Envelope::new(event.clone())
            .with_content(content)
            .with_receiver(Address::Server);
        if let Some(u) = &user {
            env = env.with_sender(u.as_str());
        }
        let ctx = HubContext::new(self.clone(), env, conn, user.clone());
        self.inner.listeners.trigger(event.as_str(), &ctx);

        if let Some(u) = &user {
            self.drop_user(u);
        }
        self.inner.sessions.set_state(conn, state);
        self.inner.sessions.remove(conn);
        tracing::info!(%conn, user = ?user, ?state, "connection ended");
        Some(state)
    }

    // --------------------
    // Host operations
    // --------------------

    /// Route an envelope to its recipients. Returns the number of queues it
    /// was pushed to.
    pub fn send(&self, env: Envelope) -> usize {
        let _gate = self.inner.gate.lock();
        let targets: Vec<ConnectionId> = {
            let reg = self.inner.registry.lock();
            route::resolve_recipients(&reg, &env)
                .iter()
                .filter_map(|id| reg.users.by_id(id).map(|u| u.connection))
                .collect()
        };
        targets
            .into_iter()
            .filter(|c| self.inner.sessions.deliver(*c, env.clone()))
            .count()
    }

    /// Add `user` to `channel`: JOIN to the existing members, then the member
    /// list (without the joiner) to the joiner. `Ok(false)` if already a member.
    pub fn join(&self, user: &str, channel: &str) -> Result<bool> {
        let _gate = self.inner.gate.lock();
        let existing = {
            let mut reg = self.inner.registry.lock();
            if reg.users.by_id(user).is_none() {
                return Err(RelayError::NonExistentReceiver(user.to_string()));
            }
            let Some(ch) = reg.channels.by_id(channel) else {
                return Err(RelayError::NonExistentChannel(channel.to_string()));
            };
            if ch.has_member(user) {
                return Ok(false);
            }
            let existing = ch.members().to_vec();
            reg.join(user, channel);
            existing
        };

        let joined = announcement(MessageType::Join, channel, user);
        self.deliver_to_users(&existing, &joined);

        let snapshot = Envelope::new(MessageType::Channel)
            .with_content(existing)
            .with_channel(channel)
            .with_receiver(user)
            .with_sender(Address::Server);
        self.deliver_to_users(&[user.to_string()], &snapshot);

        tracing::info!(user, channel, "joined");
        Ok(true)
    }

    /// Remove `user` from `channel`, announcing LEAVE to every member
    /// including the leaver. `Ok(false)` if not a member.
    pub fn leave(&self, user: &str, channel: &str) -> Result<bool> {
        let _gate = self.inner.gate.lock();
        let members = {
            let reg = self.inner.registry.lock();
            let Some(ch) = reg.channels.by_id(channel) else {
                return Err(RelayError::NonExistentChannel(channel.to_string()));
            };
            if !ch.has_member(user) {
                return Ok(false);
            }
            ch.members().to_vec()
        };

        self.deliver_to_users(&members, &announcement(MessageType::Leave, channel, user));
        self.inner.registry.lock().leave(user, channel);

        tracing::info!(user, channel, "left");
        Ok(true)
    }

    /// Open an empty channel and announce it to every authenticated user.
    /// False if it is already open or the id is reserved.
    pub fn open(&self, channel: &str) -> bool {
        let _gate = self.inner.gate.lock();
        if !is_plain_id(channel) {
            return false;
        }
        let everyone = {
            let mut reg = self.inner.registry.lock();
            if !reg.channels.open(channel) {
                return false;
            }
            user_ids(reg.users.all())
        };

        self.deliver_to_users(&everyone, &announcement(MessageType::Open, channel, channel));
        tracing::info!(channel, "channel opened");
        true
    }

    /// Announce CLOSE to every authenticated user, then drop the channel.
    /// False if it was not open.
    pub fn close(&self, channel: &str) -> bool {
        let _gate = self.inner.gate.lock();
        let everyone = {
            let reg = self.inner.registry.lock();
            if reg.channels.by_id(channel).is_none() {
                return false;
            }
            user_ids(reg.users.all())
        };

        self.deliver_to_users(&everyone, &announcement(MessageType::Close, channel, channel));
        self.inner.registry.lock().channels.close(channel);
        tracing::info!(channel, "channel closed");
        true
    }

    /// Leave every channel, send DEAUTH, forget the user and close its
    /// connection. False if `user` is not authenticated.
    pub fn unauthenticate(&self, user: &str) -> bool {
        let _gate = self.inner.gate.lock();
        let Some(conn) = self.connection_of(user) else {
            return false;
        };

        self.drop_user(user);
        let deauth = Envelope::new(MessageType::Deauth)
            .with_content(user)
            .with_receiver(user)
            .with_sender(Address::Server);
        self.deliver(conn, deauth);

        self.inner.sessions.set_state(conn, ConnState::Closed);
        self.inner.sessions.remove(conn);
        tracing::info!(%conn, user, "unauthenticated");
        true
    }

    // --------------------
    // Queries
    // --------------------

    pub fn channel(&self, id: &str) -> Option<Channel> {
        self.inner.registry.lock().channels.by_id(id).cloned()
    }

    pub fn channels(&self) -> Vec<Channel> {
        self.inner.registry.lock().channels.all().to_vec()
    }

    pub fn channels_of(&self, user: &str) -> Vec<String> {
        self.inner.registry.lock().channels_of(user)
    }

    pub fn users(&self) -> Vec<String> {
        user_ids(self.inner.registry.lock().users.all())
    }

    pub fn user_of(&self, conn: ConnectionId) -> Option<String> {
        self.inner
            .registry
            .lock()
            .users
            .by_connection(conn)
            .map(|u| u.id.clone())
    }

    pub fn connection_of(&self, user: &str) -> Option<ConnectionId> {
        self.inner.registry.lock().users.by_id(user).map(|u| u.connection)
    }

    pub fn is_authenticated(&self, conn: ConnectionId) -> bool {
        self.connection_state(conn) == Some(ConnState::Authenticated)
    }

    /// `None` once the connection has ended.
    pub fn connection_state(&self, conn: ConnectionId) -> Option<ConnState> {
        self.inner.sessions.state(conn)
    }

    pub fn connection_count(&self) -> usize {
        self.inner.sessions.len()
    }

    // --------------------
    // Internals
    // --------------------

    pub(crate) fn deliver(&self, conn: ConnectionId, env: Envelope) -> bool {
        self.inner.sessions.deliver(conn, env)
    }

    fn deliver_to_users(&self, users: &[String], env: &Envelope) {
        let conns: Vec<ConnectionId> = {
            let reg = self.inner.registry.lock();
            users
                .iter()
                .filter_map(|u| reg.users.by_id(u).map(|u| u.connection))
                .collect()
        };
        for c in conns {
            self.deliver(c, env.clone());
        }
    }

    /// Leave every channel and forget the user, without DEAUTH.
    fn drop_user(&self, user: &str) {
        let channels = self.channels_of(user);
        for c in channels {
            if let Err(e) = self.leave(user, &c) {
                tracing::debug!(user, channel = %c, error = %e, "leave during cleanup failed");
            }
        }
        self.inner.registry.lock().users.unauthenticate(user);
    }

    fn reply_ok(&self, conn: ConnectionId, env: &Envelope) {
        let answer = env.as_answer_with(Reply::ok()).with_sender(Address::Server);
        self.deliver(conn, answer);
    }

    fn reply_error(&self, conn: ConnectionId, env: &Envelope, err: &RelayError) {
        tracing::debug!(%conn, kind = %err.kind(), error = %err, msg_type = %env.msg_type(), "envelope rejected");
        let answer = env
            .as_answer_typed(MessageType::Error, Reply::err(err.kind()))
            .with_sender(Address::Server);
        self.deliver(conn, answer);
    }

    fn perform(&self, cmd: Command, conn: ConnectionId, user: Option<String>, env: &Envelope, decision: Decision) {
        let commands = &self.inner.cfg.commands;
        let outcome = match cmd {
            Command::Auth => self.perform_auth(conn, user.as_deref(), env, decision),
            Command::Deauth => match (decision, user) {
                (Decision::Rejected(e), _) => Err(e),
                (_, None) => Err(RelayError::NotAuthenticated),
                (_, Some(u)) => {
                    self.reply_ok(conn, env);
                    self.unauthenticate(&u);
                    return;
                }
            },
            Command::Join | Command::Leave | Command::Open | Command::Close => {
                let default = match cmd {
                    Command::Join => commands.join,
                    Command::Leave => commands.leave,
                    Command::Open => commands.open,
                    _ => commands.close,
                };
                decision
                    .resolve(default)
                    .and_then(|()| user.ok_or(RelayError::NotAuthenticated))
                    .and_then(|u| self.perform_membership(cmd, &u, &target_channel(env)?))
            }
        };

        match outcome {
            Ok(()) => self.reply_ok(conn, env),
            Err(e) => self.reply_error(conn, env, &e),
        }
    }

    fn perform_auth(&self, conn: ConnectionId, user: Option<&str>, env: &Envelope, decision: Decision) -> Result<()> {
        if user.is_some() {
            return Err(RelayError::Invalid("connection already authenticated".into()));
        }
        let id = match decision {
            Decision::Rejected(e) => return Err(e),
            Decision::Pending => return Err(RelayError::AuthFailed),
            Decision::AcceptedAs(id) => id,
            Decision::Accepted => env
                .content()
                .get("id")
                .and_then(Value::as_str)
                .map(str::to_string)
                .ok_or(RelayError::AuthFailed)?,
        };
        if !is_plain_id(&id) {
            return Err(RelayError::AuthFailed);
        }

        let bound = self
            .inner
            .registry
            .lock()
            .users
            .authenticate(User::new(id.clone(), conn));
        if !bound {
            tracing::warn!(%conn, user = %id, "user id already bound to another connection");
            return Err(RelayError::AuthFailed);
        }
        self.inner.sessions.set_state(conn, ConnState::Authenticated);
        tracing::info!(%conn, user = %id, "authenticated");
        Ok(())
    }

    fn perform_membership(&self, cmd: Command, user: &str, channel: &str) -> Result<()> {
        match cmd {
            Command::Join => self.join(user, channel).map(|_| ()),
            Command::Leave => {
                if self.leave(user, channel)? {
                    Ok(())
                } else {
                    Err(RelayError::SenderNotInChannel(channel.to_string()))
                }
            }
            Command::Open => {
                if !self.open(channel) {
                    return Err(RelayError::Invalid(format!("channel {channel} already exists")));
                }
                self.join(user, channel).map(|_| ())
            }
            Command::Close => {
                if self.close(channel) {
                    Ok(())
                } else {
                    Err(RelayError::NonExistentChannel(channel.to_string()))
                }
            }
            Command::Auth | Command::Deauth => Err(RelayError::Internal("not a membership command".into())),
        }
    }
}

/// Server-originated control envelope scoped to `channel`.
fn announcement(msg_type: MessageType, channel: &str, content: &str) -> Envelope {
    Envelope::new(msg_type)
        .with_content(content)
        .with_channel(channel)
        .with_receiver(Address::All)
        .with_sender(Address::Server)
}

/// Channel named by a command: string content first, then a specific channel.
fn target_channel(env: &Envelope) -> Result<String> {
    let named = env
        .content_str()
        .or_else(|| env.channel().and_then(Address::as_id));
    match named {
        Some(id) if is_plain_id(id) => Ok(id.to_string()),
        Some(id) => Err(RelayError::Invalid(format!("reserved channel id {id:?}"))),
        None => Err(RelayError::Invalid("command names no channel".into())),
    }
}

fn is_plain_id(id: &str) -> bool {
    !id.is_empty() && Address::id(id).is_custom()
}

fn user_ids(users: &[User]) -> Vec<String> {
    users.iter().map(|u| u.id.clone()).collect()
}
