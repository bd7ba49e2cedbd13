//! Connection table: outbound queue and lifecycle state per connection.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

use dashmap::DashMap;
use tokio::sync::mpsc;

use sigrelay_core::protocol::Envelope;

/// Hub-assigned connection handle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ConnectionId(u64);

impl ConnectionId {
    pub fn from_raw(raw: u64) -> Self {
        Self(raw)
    }

    pub fn raw(self) -> u64 {
        self.0
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "conn-{}", self.0)
    }
}

/// Lifecycle: `Unauthenticated -> Authenticated -> (Closed | Errored)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnState {
    Unauthenticated,
    Authenticated,
    Closed,
    Errored,
}

impl ConnState {
    pub fn is_terminal(self) -> bool {
        matches!(self, ConnState::Closed | ConnState::Errored)
    }
}

struct SessionEntry {
    tx: mpsc::Sender<Envelope>,
    state: ConnState,
}

/// Live connections. Entries are removed once a connection reaches a terminal
/// state; dropping the sender ends the host's writer loop.
pub struct SessionTable {
    sessions: DashMap<ConnectionId, SessionEntry>,
    seq: AtomicU64,
}

impl Default for SessionTable {
    fn default() -> Self {
        Self::new()
    }
}

impl SessionTable {
    pub fn new() -> Self {
        Self {
            sessions: DashMap::new(),
            seq: AtomicU64::new(1),
        }
    }

    pub fn register(&self, tx: mpsc::Sender<Envelope>) -> ConnectionId {
        let id = ConnectionId(self.seq.fetch_add(1, Ordering::Relaxed));
        self.sessions.insert(
            id,
            SessionEntry {
                tx,
                state: ConnState::Unauthenticated,
            },
        );
        id
    }

    pub fn state(&self, id: ConnectionId) -> Option<ConnState> {
        self.sessions.get(&id).map(|e| e.state)
    }

    /// Move to `next`. Terminal states are never left.
    pub fn set_state(&self, id: ConnectionId, next: ConnState) -> bool {
        let Some(mut e) = self.sessions.get_mut(&id) else {
            return false;
        };
        if e.state.is_terminal() {
            return false;
        }
        e.state = next;
        true
    }

    /// Forget the connection and drop its outbound sender.
    pub fn remove(&self, id: ConnectionId) -> bool {
        self.sessions.remove(&id).is_some()
    }

    /// Non-blocking delivery. A full or closed queue drops the envelope.
    pub fn deliver(&self, id: ConnectionId, env: Envelope) -> bool {
        let Some(e) = self.sessions.get(&id) else {
            return false;
        };
        match e.tx.try_send(env) {
            Ok(()) => true,
            Err(mpsc::error::TrySendError::Full(_)) => {
                tracing::warn!(conn = %id, "outbound queue full; envelope dropped");
                false
            }
            Err(mpsc::error::TrySendError::Closed(_)) => {
                tracing::debug!(conn = %id, "outbound queue closed; envelope dropped");
                false
            }
        }
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }
}
