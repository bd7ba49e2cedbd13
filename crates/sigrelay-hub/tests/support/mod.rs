//! Shared helpers for hub integration tests.

#![allow(clippy::unwrap_used)]
#![allow(clippy::expect_used)]
#![allow(clippy::panic)]
#![allow(dead_code)]

use std::collections::HashMap;

use serde_json::{json, Value};
use tokio::sync::mpsc;

use sigrelay_core::protocol::{Address, Envelope, MessageType, Reply};
use sigrelay_hub::app_state::install_token_auth;
use sigrelay_hub::config::HubSection;
use sigrelay_hub::{ConnectionId, Hub};

pub const TOKEN: &str = "pw";

/// One connection as seen from the outside.
pub struct Peer {
    pub conn: ConnectionId,
    pub id: String,
    pub rx: mpsc::Receiver<Envelope>,
}

impl Peer {
    /// Everything queued so far.
    pub fn drain(&mut self) -> Vec<Envelope> {
        let mut out = Vec::new();
        while let Ok(env) = self.rx.try_recv() {
            out.push(env);
        }
        out
    }

    /// Send `env` from this peer and return the answer to it, plus anything
    /// else that was queued for the peer meanwhile.
    pub fn roundtrip(&mut self, hub: &Hub, env: Envelope) -> (Envelope, Vec<Envelope>) {
        let id = env.id().to_string();
        hub.handle_inbound(self.conn, env);
        let mut answer = None;
        let mut others = Vec::new();
        for e in self.drain() {
            if answer.is_none() && e.answered() == Some(id.as_str()) {
                answer = Some(e);
            } else {
                others.push(e);
            }
        }
        (answer.expect("no answer"), others)
    }

    pub fn is_closed(&mut self) -> bool {
        matches!(
            self.rx.try_recv(),
            Err(mpsc::error::TryRecvError::Disconnected)
        )
    }

    /// Envelope from this peer's user.
    pub fn env(&self, msg_type: impl Into<MessageType>) -> Envelope {
        Envelope::new(msg_type).with_sender(self.id.as_str())
    }

    /// Command addressed to the hub.
    pub fn command(&self, msg_type: MessageType, content: impl Into<Value>) -> Envelope {
        self.env(msg_type)
            .with_content(content)
            .with_channel(Address::All)
            .with_receiver(Address::Server)
    }
}

pub fn hub() -> Hub {
    hub_with(HubSection::default())
}

/// Hub accepting users `A`..`F` with token `pw`.
pub fn hub_with(cfg: HubSection) -> Hub {
    let hub = Hub::new(cfg);
    let tokens: HashMap<String, String> = ["A", "B", "C", "D", "E", "F"]
        .iter()
        .map(|id| (id.to_string(), TOKEN.to_string()))
        .collect();
    install_token_auth(&hub, tokens);
    hub
}

pub fn connect(hub: &Hub) -> Peer {
    let (tx, rx) = hub.outbound_channel();
    Peer {
        conn: hub.connect(tx),
        id: String::new(),
        rx,
    }
}

pub fn auth_envelope(id: &str, token: &str) -> Envelope {
    Envelope::new(MessageType::Auth)
        .with_content(json!({ "id": id, "token": token }))
        .with_receiver(Address::Server)
}

/// Connect and authenticate; the auth reply is consumed.
pub fn login(hub: &Hub, id: &str) -> Peer {
    let mut peer = connect(hub);
    hub.handle_inbound(peer.conn, auth_envelope(id, TOKEN));
    let replies = peer.drain();
    assert_eq!(replies.len(), 1, "auth reply for {id}");
    assert_eq!(reply_of(&replies[0]), Reply::ok());
    peer.id = id.to_string();
    peer
}

pub fn reply_of(env: &Envelope) -> Reply {
    Reply::from_value(env.content()).expect("reply payload")
}

pub fn error_code(env: &Envelope) -> String {
    assert_eq!(env.msg_type(), &MessageType::Error);
    reply_of(env).error.expect("error code")
}

pub fn types(envs: &[Envelope]) -> Vec<String> {
    envs.iter().map(|e| e.msg_type().to_string()).collect()
}

/// Drain every peer.
pub fn drain_all(peers: &mut [&mut Peer]) {
    for p in peers.iter_mut() {
        p.drain();
    }
}
