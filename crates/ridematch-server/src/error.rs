//! Server error types.

use ridematch_proto::ProtocolError;
use thiserror::Error;

use crate::server_error::DriverError;

/// Errors that can occur in the server runtime.
#[derive(Error, Debug)]
pub enum ServerError {
    /// Configuration error (invalid bind address, missing static directory).
    ///
    /// Fatal: prevents server startup. Fix configuration and restart.
    #[error("configuration error: {0}")]
    Config(String),

    /// Transport/network error (bind failure, listener I/O error).
    ///
    /// Fatal when raised by `bind` or `run`.
    #[error("transport error: {0}")]
    Transport(String),

    /// Protocol error (a server message failed to encode).
    ///
    /// Indicates a bug; the affected action is skipped.
    #[error("protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    /// Driver error (from `ServerDriver` processing).
    ///
    /// Scoped to one connection; the server keeps serving the rest.
    #[error("driver error: {0}")]
    Driver(#[from] DriverError),
}

impl From<std::io::Error> for ServerError {
    fn from(err: std::io::Error) -> Self {
        Self::Transport(err.to_string())
    }
}
