//! Protocol error types.

use thiserror::Error;

/// Result alias for protocol operations.
pub type Result<T> = std::result::Result<T, ProtocolError>;

/// Errors raised while encoding or decoding wire messages.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProtocolError {
    /// Frame was not a valid JSON envelope: bad JSON, unknown event name, or a
    /// payload of the wrong shape (e.g. `lat` missing or not a number).
    #[error("malformed message: {0}")]
    Malformed(String),

    /// Binary WebSocket frames carry no meaning in this protocol.
    #[error("binary frames are not supported")]
    BinaryFrame,
}

impl From<serde_json::Error> for ProtocolError {
    fn from(err: serde_json::Error) -> Self {
        Self::Malformed(err.to_string())
    }
}
