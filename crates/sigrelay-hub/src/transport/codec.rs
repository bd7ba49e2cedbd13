//! Frame codec between axum WebSocket messages and hub input.
//!
//! - Text frames are handed to the hub undecoded (`Hub::handle_text` parses
//!   them and answers undecodable ones itself)
//! - Binary frames are rejected
//! - Ping/Pong/Close are surfaced for lifecycle management

use axum::extract::ws::Message;
use sigrelay_core::{
    protocol::{codec, Address, Envelope, MessageType, Reply},
    RelayError, Result,
};

#[derive(Debug)]
pub enum Inbound {
    Text(String),
    Ping(Vec<u8>),
    Pong(Vec<u8>),
    Close,
}

pub fn decode(msg: Message) -> Result<Inbound> {
    match msg {
        Message::Text(s) => Ok(Inbound::Text(s)),
        Message::Binary(_) => Err(RelayError::BadRequest("binary frames are not supported".into())),
        Message::Ping(v) => Ok(Inbound::Ping(v)),
        Message::Pong(v) => Ok(Inbound::Pong(v)),
        Message::Close(_) => Ok(Inbound::Close),
    }
}

pub fn encode(env: &Envelope) -> Result<Message> {
    codec::encode(env).map(Message::Text)
}

/// Unsolicited error envelope for frames the hub never saw.
pub fn error_frame(err: &RelayError) -> Result<Message> {
    let env = Envelope::new(MessageType::Error)
        .with_content(Reply::err(err.kind()))
        .with_sender(Address::Server);
    encode(&env)
}

/// Payload size, measured before anything is decoded.
pub fn frame_len(msg: &Message) -> usize {
    match msg {
        Message::Text(s) => s.len(),
        Message::Binary(b) => b.len(),
        Message::Ping(v) => v.len(),
        Message::Pong(v) => v.len(),
        Message::Close(_) => 0,
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use super::*;
    use sigrelay_core::ErrorKind;

    #[test]
    fn binary_is_bad_request() {
        let err = decode(Message::Binary(vec![1, 2, 3])).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::BadRequest);
    }

    #[test]
    fn error_frame_carries_the_code() {
        let Message::Text(s) = error_frame(&RelayError::BadRequest("x".into())).unwrap() else {
            panic!("expected a text frame");
        };
        let env = codec::decode(&s).unwrap();
        assert_eq!(env.msg_type(), &MessageType::Error);
        assert_eq!(env.content()["error"], "BAD_REQUEST");
    }
}
