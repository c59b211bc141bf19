//! JSON-encoded protocol messages.
//!
//! Messages use serde's adjacent tagging: the variant name (camelCase) goes in
//! `event` and the payload in `data`. Decoding rejects unknown events and
//! payloads of the wrong shape, so everything past [`ClientMessage::decode`]
//! can rely on typed fields.
//!
//! # Invariants
//!
//! Each variant maps to exactly one event name (enforced by match
//! exhaustiveness in `event()`), and that name is the one serde writes.

mod booking;

pub use booking::{BookingAccepted, BookingRejection, RiderPosition};
use serde::{Deserialize, Serialize};

use crate::{ConnectionId, DriverSnapshot, Location, errors::Result};

/// Messages a client sends to the server.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data", rename_all = "camelCase")]
pub enum ClientMessage {
    /// Sender reports its position as a driver.
    DriverLocation(Location),
    /// Sender reports its position as a rider.
    RiderLocation(Location),
    /// Sender (as rider) asks to claim the driver with this id.
    BookDriver(ConnectionId),
}

impl ClientMessage {
    /// Event name as it appears on the wire.
    pub const fn event(&self) -> &'static str {
        match self {
            Self::DriverLocation(_) => "driverLocation",
            Self::RiderLocation(_) => "riderLocation",
            Self::BookDriver(_) => "bookDriver",
        }
    }

    /// Decode a text frame.
    pub fn decode(text: &str) -> Result<Self> {
        Ok(serde_json::from_str(text)?)
    }

    /// Encode into a text frame.
    pub fn encode(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }
}

/// Error payload for malformed client frames.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorPayload {
    /// Human-readable description of what was wrong with the frame.
    pub message: String,
}

/// Messages the server sends to clients.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data", rename_all = "camelCase")]
pub enum ServerMessage {
    /// Full driver registry, broadcast after every driver-state change.
    UpdateDrivers(DriverSnapshot),
    /// A booked rider moved. Sent only to their driver.
    RiderPositionUpdate(RiderPosition),
    /// Booking accepted. Sent to the rider.
    BookingSuccess(BookingAccepted),
    /// Booking rejected. Sent to the rider.
    BookingFailed(BookingRejection),
    /// A rider claimed this driver. Sent to the driver.
    BookingConfirmed(RiderPosition),
    /// The last frame from this client could not be decoded.
    ProtocolError(ErrorPayload),
}

impl ServerMessage {
    /// Event name as it appears on the wire.
    pub const fn event(&self) -> &'static str {
        match self {
            Self::UpdateDrivers(_) => "updateDrivers",
            Self::RiderPositionUpdate(_) => "riderPositionUpdate",
            Self::BookingSuccess(_) => "bookingSuccess",
            Self::BookingFailed(_) => "bookingFailed",
            Self::BookingConfirmed(_) => "bookingConfirmed",
            Self::ProtocolError(_) => "protocolError",
        }
    }

    /// Decode a text frame.
    pub fn decode(text: &str) -> Result<Self> {
        Ok(serde_json::from_str(text)?)
    }

    /// Encode into a text frame.
    pub fn encode(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }
}
