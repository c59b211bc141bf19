//! Driver and executor error types.
//!
//! Provides strongly-typed errors for server operations:
//! - Session management (registration, lookup)
//! - Action execution (send, broadcast)
//!
//! Booking rejections are not errors. They are ordinary outcomes the driver
//! reports to the rider as `bookingFailed`.

use ridematch_proto::ConnectionId;
use thiserror::Error;

/// Errors that can occur while the driver processes an event.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DriverError {
    /// Session not found.
    ///
    /// A message arrived for a connection the driver never accepted or has
    /// already closed. Usually a benign race with disconnect.
    #[error("session not found: {0}")]
    SessionNotFound(ConnectionId),

    /// Session already registered.
    ///
    /// The runtime reported the same connection twice. Connection ids must be
    /// unique, so this is a runtime bug.
    #[error("session already exists: {0}")]
    SessionAlreadyExists(ConnectionId),
}

/// Errors from action execution.
///
/// Delivery is best-effort: these are logged and dropped, never retried.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ExecutorError {
    /// The target connection is gone or its writer has stopped.
    #[error("send failed for session {session_id}: {reason}")]
    SendFailed {
        /// Session that failed
        session_id: ConnectionId,
        /// Error message
        reason: String,
    },

    /// The target's outbound queue is full; the message was dropped.
    #[error("outbound queue full for session {0}")]
    QueueFull(ConnectionId),
}
