//! Error types for colloquy-client

use thiserror::Error;

/// Result type alias using colloquy-client Error
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while synchronizing conversation state
#[derive(Error, Debug)]
pub enum Error {
    /// An error from the wire/decoding layer
    #[error(transparent)]
    Protocol(#[from] colloquy_protocol::ProtocolError),

    /// HTTP request failed
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Server-sent events transport error
    #[error("SSE error: {0}")]
    Sse(String),

    /// A programming-contract violation; should not occur in correct operation
    #[error("Invalid state transition: {0}")]
    InvalidStateTransition(&'static str),

    /// A prompt was submitted while a prior run was unresolved
    #[error("A run is already in progress for this conversation")]
    RunInProgress,

    /// Rehydration failed; the previous session is untouched
    #[error("Rehydration failed: {reason}")]
    Rehydration { reason: String },
}

impl Error {
    /// Wrap a cause as a rehydration failure
    pub(crate) fn rehydration(cause: impl std::fmt::Display) -> Self {
        Self::Rehydration {
            reason: cause.to_string(),
        }
    }
}
