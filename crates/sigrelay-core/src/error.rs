//! Shared error type across sigrelay crates.

use thiserror::Error;

/// Error kinds reported on the wire (stable API).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Connection has not authenticated yet.
    NotAuthenticated,
    /// Envelope carries no type.
    NoType,
    /// Claimed sender differs from the connection's authenticated user.
    InvalidSender,
    /// Addressed receiver is not authenticated.
    NonExistentReceiver,
    /// Addressed channel is not open.
    NonExistentChannel,
    /// Sender is not a member of the addressed channel.
    SenderNotInChannel,
    /// Receiver is not a member of the addressed channel.
    ReceiverNotInChannel,
    /// Authentication was refused.
    AuthFailed,
    /// Client-side request exceeded its deadline.
    Timeout,
    /// Generic rejected command.
    Invalid,
    /// Undecodable frame.
    BadRequest,
    /// Internal failure.
    Internal,
}

impl ErrorKind {
    /// String representation used in reply payloads.
    pub fn as_str(self) -> &'static str {
        match self {
            ErrorKind::NotAuthenticated => "NOT_AUTHENTICATED",
            ErrorKind::NoType => "NO_TYPE",
            ErrorKind::InvalidSender => "INVALID_SENDER",
            ErrorKind::NonExistentReceiver => "NON_EXISTENT_RECEIVER",
            ErrorKind::NonExistentChannel => "NON_EXISTENT_CHANNEL",
            ErrorKind::SenderNotInChannel => "SENDER_NOT_IN_CHANNEL",
            ErrorKind::ReceiverNotInChannel => "RECEIVER_NOT_IN_CHANNEL",
            ErrorKind::AuthFailed => "AUTH_FAILED",
            ErrorKind::Timeout => "TIMEOUT",
            ErrorKind::Invalid => "INVALID",
            ErrorKind::BadRequest => "BAD_REQUEST",
            ErrorKind::Internal => "INTERNAL",
        }
    }

    /// Parse a wire code back into a kind.
    pub fn from_code(code: &str) -> Option<Self> {
        let kind = match code {
            "NOT_AUTHENTICATED" => ErrorKind::NotAuthenticated,
            "NO_TYPE" => ErrorKind::NoType,
            "INVALID_SENDER" => ErrorKind::InvalidSender,
            "NON_EXISTENT_RECEIVER" => ErrorKind::NonExistentReceiver,
            "NON_EXISTENT_CHANNEL" => ErrorKind::NonExistentChannel,
            "SENDER_NOT_IN_CHANNEL" => ErrorKind::SenderNotInChannel,
            "RECEIVER_NOT_IN_CHANNEL" => ErrorKind::ReceiverNotInChannel,
            "AUTH_FAILED" => ErrorKind::AuthFailed,
            "TIMEOUT" => ErrorKind::Timeout,
            "INVALID" => ErrorKind::Invalid,
            "BAD_REQUEST" => ErrorKind::BadRequest,
            "INTERNAL" => ErrorKind::Internal,
            _ => return None,
        };
        Some(kind)
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Shared result type.
pub type Result<T> = std::result::Result<T, RelayError>;

/// Unified error type used by core, hub and client.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RelayError {
    #[error("not authenticated")]
    NotAuthenticated,
    #[error("message has no type")]
    NoType,
    #[error("sender does not match the authenticated user")]
    InvalidSender,
    #[error("receiver does not exist: {0}")]
    NonExistentReceiver(String),
    #[error("channel does not exist: {0}")]
    NonExistentChannel(String),
    #[error("sender is not a member of channel {0}")]
    SenderNotInChannel(String),
    #[error("receiver is not a member of channel {0}")]
    ReceiverNotInChannel(String),
    #[error("auth failed")]
    AuthFailed,
    #[error("request timed out")]
    Timeout,
    #[error("invalid: {0}")]
    Invalid(String),
    #[error("bad request: {0}")]
    BadRequest(String),
    #[error("internal: {0}")]
    Internal(String),
}

impl RelayError {
    /// Map internal error to a stable wire kind.
    pub fn kind(&self) -> ErrorKind {
        match self {
            RelayError::NotAuthenticated => ErrorKind::NotAuthenticated,
            RelayError::NoType => ErrorKind::NoType,
            RelayError::InvalidSender => ErrorKind::InvalidSender,
            RelayError::NonExistentReceiver(_) => ErrorKind::NonExistentReceiver,
            RelayError::NonExistentChannel(_) => ErrorKind::NonExistentChannel,
            RelayError::SenderNotInChannel(_) => ErrorKind::SenderNotInChannel,
            RelayError::ReceiverNotInChannel(_) => ErrorKind::ReceiverNotInChannel,
            RelayError::AuthFailed => ErrorKind::AuthFailed,
            RelayError::Timeout => ErrorKind::Timeout,
            RelayError::Invalid(_) => ErrorKind::Invalid,
            RelayError::BadRequest(_) => ErrorKind::BadRequest,
            RelayError::Internal(_) => ErrorKind::Internal,
        }
    }

    /// Rebuild an error from a server-supplied code.
    ///
    /// The server only transmits the kind, so detail strings are empty. Unknown
    /// codes become `Invalid` carrying the raw code.
    pub fn from_code(code: &str) -> Self {
        match ErrorKind::from_code(code) {
            Some(ErrorKind::NotAuthenticated) => RelayError::NotAuthenticated,
            Some(ErrorKind::NoType) => RelayError::NoType,
            Some(ErrorKind::InvalidSender) => RelayError::InvalidSender,
            Some(ErrorKind::NonExistentReceiver) => RelayError::NonExistentReceiver(String::new()),
            Some(ErrorKind::NonExistentChannel) => RelayError::NonExistentChannel(String::new()),
            Some(ErrorKind::SenderNotInChannel) => RelayError::SenderNotInChannel(String::new()),
            Some(ErrorKind::ReceiverNotInChannel) => RelayError::ReceiverNotInChannel(String::new()),
            Some(ErrorKind::AuthFailed) => RelayError::AuthFailed,
            Some(ErrorKind::Timeout) => RelayError::Timeout,
            Some(ErrorKind::Invalid) => RelayError::Invalid(String::new()),
            Some(ErrorKind::BadRequest) => RelayError::BadRequest(String::new()),
            Some(ErrorKind::Internal) => RelayError::Internal(String::new()),
            None => RelayError::Invalid(code.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn codes_parse_back_to_the_same_kind() {
        let kinds = [
            ErrorKind::NotAuthenticated,
            ErrorKind::NoType,
            ErrorKind::InvalidSender,
            ErrorKind::NonExistentReceiver,
            ErrorKind::NonExistentChannel,
            ErrorKind::SenderNotInChannel,
            ErrorKind::ReceiverNotInChannel,
            ErrorKind::AuthFailed,
            ErrorKind::Timeout,
            ErrorKind::Invalid,
            ErrorKind::BadRequest,
            ErrorKind::Internal,
        ];
        for k in kinds {
            assert_eq!(ErrorKind::from_code(k.as_str()), Some(k));
            assert_eq!(RelayError::from_code(k.as_str()).kind(), k);
        }
    }

    #[test]
    fn unknown_code_is_invalid() {
        let e = RelayError::from_code("NOPE");
        assert_eq!(e, RelayError::Invalid("NOPE".into()));
    }
}
