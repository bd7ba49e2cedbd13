//! sigrelay client: a read-only mirror of the hub's membership state and
//! correlated request/response over a single connection.
//!
//! [`ClientHandle`] is transport-agnostic: feed it inbound envelopes and drain
//! its outbound queue. [`connect`] does both over a WebSocket.

pub mod channel;
pub mod client;
pub mod config;
pub mod member;
pub mod pending;
pub mod transport;

pub use channel::ChannelMirror;
pub use client::ClientHandle;
pub use config::ClientConfig;
pub use member::MemberMirror;
pub use transport::connect;
