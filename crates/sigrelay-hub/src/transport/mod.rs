//! Transport layer (WebSocket).
//!
//! Exposes the WS upgrade handler and the frame codec that sits between axum
//! messages and the hub.

pub mod codec;
pub mod ws;
