//! Connection identifiers.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Opaque handle the transport mints for each live connection.
///
/// Serialized as a bare JSON string, also when used as an object key in
/// [`DriverSnapshot`](crate::DriverSnapshot). Clients treat it as opaque: a
/// rider books a driver by echoing the driver's id back in `bookDriver`.
///
/// # Invariants
///
/// No two live connections share an id. An id may only be reused after the
/// server has finished disconnect cleanup for its previous owner.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ConnectionId(String);

impl ConnectionId {
    /// Wrap a transport-provided token.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Build an id from 128 bits of entropy, rendered as 32 lowercase hex
    /// characters.
    pub fn from_u128(raw: u128) -> Self {
        Self(format!("{raw:032x}"))
    }

    /// The raw token.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ConnectionId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

impl From<String> for ConnectionId {
    fn from(id: String) -> Self {
        Self(id)
    }
}
