//! sigrelay hub library entry.
//!
//! This crate holds the authoritative side of the relay: membership
//! registries, the hub dispatcher with its listener context, strict config
//! loading, and the WebSocket host. It is consumed by the binary (`main.rs`)
//! and by integration tests.

pub mod app_state;
pub mod config;
pub mod hub;
pub mod registry;
pub mod router;
pub mod transport;

pub use hub::{ConnState, ConnectionId, Decision, Hub, HubContext};
