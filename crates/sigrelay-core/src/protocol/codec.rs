//! JSON text codec for envelopes.
//!
//! Decoding is panic-free: malformed frames surface as `RelayError::BadRequest`
//! so a hostile client cannot take the relay down.

use crate::error::{RelayError, Result};

use super::envelope::Envelope;

/// Decode one text frame.
pub fn decode(text: &str) -> Result<Envelope> {
    serde_json::from_str(text).map_err(|e| {
        tracing::debug!(error = %e, len = text.len(), "envelope decode failed");
        RelayError::BadRequest(format!("invalid envelope json: {e}"))
    })
}

/// Encode one envelope as a text frame.
pub fn encode(env: &Envelope) -> Result<String> {
    serde_json::to_string(env)
        .map_err(|e| RelayError::Internal(format!("envelope encode failed: {e}")))
}
