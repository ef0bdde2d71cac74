//! Error types for colloquy-protocol

use thiserror::Error;

/// Result type alias using colloquy-protocol Error
pub type Result<T> = std::result::Result<T, ProtocolError>;

/// Errors that can occur while decoding protocol envelopes
#[derive(Error, Debug)]
pub enum ProtocolError {
    /// The envelope is not a well-formed event
    #[error("Malformed event: {reason}")]
    MalformedEvent { reason: String },

    /// A structurally valid event appeared where a different tag was required
    #[error("Unexpected event shape: expected {expected}, got {got}")]
    UnexpectedEventShape { expected: String, got: String },

    /// JSON serialization/deserialization failed
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl ProtocolError {
    /// Create a malformed-event error with a reason
    pub fn malformed(reason: impl Into<String>) -> Self {
        Self::MalformedEvent {
            reason: reason.into(),
        }
    }
}
