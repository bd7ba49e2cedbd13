//! Protocol modules.
//!
//! - `types`: message type and address vocabulary (closed control set + open
//!   application types, broadcast/relay sentinels).
//! - `envelope`: the immutable routed message.
//! - `codec`: JSON text framing.
//! - `reply`: command reply payload.
//!
//! All parsers are panic-free: malformed input is reported as `RelayError`.

pub mod codec;
pub mod envelope;
pub mod reply;
pub mod types;

pub use envelope::Envelope;
pub use reply::Reply;
pub use types::{Address, MessageType, ALL, SERVER};
