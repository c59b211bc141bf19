//! Ridematch wire protocol.
//!
//! Every message travels as one JSON object per WebSocket text frame:
//!
//! ```text
//! {"event": "driverLocation", "data": {"lat": 52.1, "lng": 4.3, "heading": 90}}
//! ```
//!
//! The `event` field selects the variant, `data` carries its payload. Clients
//! send [`ClientMessage`]s, the server answers with [`ServerMessage`]s.
//!
//! # Components
//!
//! - [`ConnectionId`]: opaque per-connection handle, the key for all state
//! - [`Location`]: reported position plus opaque passthrough metadata
//! - [`DriverRecord`], [`RiderRecord`], [`DriverSnapshot`]: server state as
//!   clients see it
//! - [`BookingRejection`]: why a booking was turned down

#![forbid(unsafe_code)]
#![warn(missing_docs)]

mod errors;
mod id;
pub mod payloads;
mod records;

pub use errors::{ProtocolError, Result};
pub use id::ConnectionId;
pub use payloads::{
    BookingAccepted, BookingRejection, ClientMessage, ErrorPayload, RiderPosition, ServerMessage,
};
pub use records::{DriverRecord, DriverSnapshot, Location, RESERVED_KEYS, RiderRecord};
