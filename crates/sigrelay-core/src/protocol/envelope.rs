//! Immutable routed message.
//!
//! Every `with_*` method returns a copy that keeps the id; answers get a fresh
//! id and point back at the original through `answered`.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::types::{Address, MessageType};

/// Fresh correlation token.
pub fn fresh_id() -> String {
    uuid::Uuid::new_v4().simple().to_string()
}

/// Routed message (JSON text frame).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Envelope {
    #[serde(default = "fresh_id")]
    id: String,
    /// Message type (field name is `type` in JSON).
    #[serde(rename = "type", default)]
    msg_type: MessageType,
    #[serde(default)]
    content: Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    channel: Option<Address>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    receiver: Option<Address>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    sender: Option<Address>,
    #[serde(default = "Utc::now")]
    sent: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    forwarded: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    answered: Option<String>,
}

impl Envelope {
    /// New envelope with a fresh id and `sent` set to now.
    pub fn new(msg_type: impl Into<MessageType>) -> Self {
        Self {
            id: fresh_id(),
            msg_type: msg_type.into(),
            content: Value::Null,
            channel: None,
            receiver: None,
            sender: None,
            sent: Utc::now(),
            forwarded: None,
            answered: None,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }
    pub fn msg_type(&self) -> &MessageType {
        &self.msg_type
    }
    pub fn content(&self) -> &Value {
        &self.content
    }
    pub fn channel(&self) -> Option<&Address> {
        self.channel.as_ref()
    }
    pub fn receiver(&self) -> Option<&Address> {
        self.receiver.as_ref()
    }
    pub fn sender(&self) -> Option<&Address> {
        self.sender.as_ref()
    }
    pub fn sent(&self) -> DateTime<Utc> {
        self.sent
    }
    pub fn forwarded(&self) -> Option<DateTime<Utc>> {
        self.forwarded
    }
    pub fn answered(&self) -> Option<&str> {
        self.answered.as_deref()
    }

    /// Sender as a concrete user id (None for sentinels and unset).
    pub fn sender_id(&self) -> Option<&str> {
        self.sender.as_ref().and_then(Address::as_id)
    }

    /// Receiver is the relay itself.
    pub fn is_server_bound(&self) -> bool {
        matches!(self.receiver, Some(Address::Server))
    }

    /// Content as a string, if it is one.
    pub fn content_str(&self) -> Option<&str> {
        self.content.as_str()
    }

    pub fn with_type(&self, msg_type: impl Into<MessageType>) -> Self {
        Self {
            msg_type: msg_type.into(),
            ..self.clone()
        }
    }

    pub fn with_content(&self, content: impl Into<Value>) -> Self {
        Self {
            content: content.into(),
            ..self.clone()
        }
    }

    pub fn with_channel(&self, channel: impl Into<Address>) -> Self {
        Self {
            channel: Some(channel.into()),
            ..self.clone()
        }
    }

    pub fn with_receiver(&self, receiver: impl Into<Address>) -> Self {
        Self {
            receiver: Some(receiver.into()),
            ..self.clone()
        }
    }

    pub fn with_sender(&self, sender: impl Into<Address>) -> Self {
        Self {
            sender: Some(sender.into()),
            ..self.clone()
        }
    }

    /// Relay timestamp; the hub stamps it on every inbound hop.
    pub fn with_forwarded(&self, at: DateTime<Utc>) -> Self {
        Self {
            forwarded: Some(at),
            ..self.clone()
        }
    }

    /// Answer with the same type and content.
    pub fn as_answer(&self) -> Self {
        Self {
            id: fresh_id(),
            sender: self.receiver.clone(),
            receiver: self.sender.clone(),
            sent: Utc::now(),
            answered: Some(self.id.clone()),
            ..self.clone()
        }
    }

    /// Answer with new content.
    pub fn as_answer_with(&self, content: impl Into<Value>) -> Self {
        let mut answer = self.as_answer();
        answer.content = content.into();
        answer
    }

    /// Answer with a new type and content.
    pub fn as_answer_typed(&self, msg_type: impl Into<MessageType>, content: impl Into<Value>) -> Self {
        let mut answer = self.as_answer_with(content);
        answer.msg_type = msg_type.into();
        answer
    }
}
