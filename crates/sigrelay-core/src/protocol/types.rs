//! Message type and address vocabulary.
//!
//! Both are strings on the wire. Reserved values always parse into their
//! dedicated variant, so `Custom` never holds a reserved name and `Id` never
//! holds a sentinel.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Envelope discriminator: reserved control types plus application types.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum MessageType {
    /// Authenticate the connection.
    Auth,
    /// Unauthenticate the connection.
    Deauth,
    /// A member joined a channel / join request.
    Join,
    /// A member left a channel / leave request.
    Leave,
    /// Full member list of a channel.
    Channel,
    /// A channel was opened / open request.
    Open,
    /// A channel was closed / close request.
    Close,
    /// Connection established.
    Connect,
    /// Connection ended.
    Disconnect,
    /// Error report.
    Error,
    /// Application-defined type.
    Custom(String),
}

impl MessageType {
    pub fn as_str(&self) -> &str {
        match self {
            MessageType::Auth => "auth",
            MessageType::Deauth => "deauth",
            MessageType::Join => "join",
            MessageType::Leave => "leave",
            MessageType::Channel => "channel",
            MessageType::Open => "open",
            MessageType::Close => "close",
            MessageType::Connect => "connect",
            MessageType::Disconnect => "disconnect",
            MessageType::Error => "error",
            MessageType::Custom(s) => s,
        }
    }

    /// True for every reserved control type.
    pub fn is_control(&self) -> bool {
        !matches!(self, MessageType::Custom(_))
    }

    pub fn is_custom(&self) -> bool {
        matches!(self, MessageType::Custom(_))
    }

    /// True for the empty application type (missing `type` on the wire).
    pub fn is_empty(&self) -> bool {
        matches!(self, MessageType::Custom(s) if s.is_empty())
    }
}

impl Default for MessageType {
    fn default() -> Self {
        MessageType::Custom(String::new())
    }
}

impl From<&str> for MessageType {
    fn from(s: &str) -> Self {
        match s {
            "auth" => MessageType::Auth,
            "deauth" => MessageType::Deauth,
            "join" => MessageType::Join,
            "leave" => MessageType::Leave,
            "channel" => MessageType::Channel,
            "open" => MessageType::Open,
            "close" => MessageType::Close,
            "connect" => MessageType::Connect,
            "disconnect" => MessageType::Disconnect,
            "error" => MessageType::Error,
            other => MessageType::Custom(other.to_string()),
        }
    }
}

impl From<String> for MessageType {
    fn from(s: String) -> Self {
        match MessageType::from(s.as_str()) {
            MessageType::Custom(_) => MessageType::Custom(s),
            reserved => reserved,
        }
    }
}

impl From<MessageType> for String {
    fn from(t: MessageType) -> Self {
        match t {
            MessageType::Custom(s) => s,
            reserved => reserved.as_str().to_string(),
        }
    }
}

impl fmt::Display for MessageType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Broadcast sentinel.
pub const ALL: &str = "*";
/// Relay sentinel.
pub const SERVER: &str = "@";

/// Channel or user address.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Address {
    /// Everyone / every channel of the sender.
    All,
    /// The relay itself; never forwarded.
    Server,
    /// A concrete user or channel id.
    Id(String),
}

impl Address {
    pub fn id(id: impl Into<String>) -> Self {
        Address::from(id.into())
    }

    pub fn as_str(&self) -> &str {
        match self {
            Address::All => ALL,
            Address::Server => SERVER,
            Address::Id(s) => s,
        }
    }

    /// The concrete id, if this is not a sentinel.
    pub fn as_id(&self) -> Option<&str> {
        match self {
            Address::Id(s) => Some(s),
            _ => None,
        }
    }

    pub fn is_all(&self) -> bool {
        matches!(self, Address::All)
    }

    pub fn is_server(&self) -> bool {
        matches!(self, Address::Server)
    }

    pub fn is_custom(&self) -> bool {
        matches!(self, Address::Id(_))
    }
}

impl From<&str> for Address {
    fn from(s: &str) -> Self {
        match s {
            ALL => Address::All,
            SERVER => Address::Server,
            other => Address::Id(other.to_string()),
        }
    }
}

impl From<String> for Address {
    fn from(s: String) -> Self {
        match s.as_str() {
            ALL => Address::All,
            SERVER => Address::Server,
            _ => Address::Id(s),
        }
    }
}

impl From<Address> for String {
    fn from(a: Address) -> Self {
        match a {
            Address::Id(s) => s,
            other => other.as_str().to_string(),
        }
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
