//! Operations for model-based testing.
//!
//! Operations represent all possible actions in the system. They are generated
//! randomly by proptest and applied to both the model and real implementation.

use arbitrary::Arbitrary;
use ridematch_core::{BookingRejection, Location};

/// Client identifier (0-indexed).
///
/// A client is a slot that may hold one connection at a time. Reconnecting
/// gives the slot a fresh connection with no records.
pub type ClientId = u8;

/// Operations that can be applied to the system.
#[derive(Debug, Clone, Arbitrary)]
pub enum Operation {
    /// Client opens a connection.
    Connect {
        /// Client connecting.
        client_id: ClientId,
    },

    /// Client reports a driver position.
    DriverLocation {
        /// Client reporting.
        client_id: ClientId,
        /// Reported position.
        position: GridPosition,
    },

    /// Client reports a rider position.
    RiderLocation {
        /// Client reporting.
        client_id: ClientId,
        /// Reported position.
        position: GridPosition,
    },

    /// Client tries to book another client's driver record.
    BookDriver {
        /// Client booking.
        rider_id: ClientId,
        /// Client whose driver record is requested.
        driver_id: ClientId,
    },

    /// Client sends a frame that does not decode.
    SendGarbage {
        /// Client sending.
        client_id: ClientId,
    },

    /// Client closes its connection.
    Disconnect {
        /// Client disconnecting.
        client_id: ClientId,
    },

    /// Advance simulation time.
    AdvanceTime {
        /// Milliseconds to advance.
        millis: u16,
    },
}

/// Coarse position on an integer grid.
///
/// Keeps generated positions small and exactly representable so model and
/// real results compare with `==`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Arbitrary)]
pub struct GridPosition {
    /// Latitude in whole degrees.
    pub lat: i8,
    /// Longitude in whole degrees.
    pub lng: i8,
}

impl GridPosition {
    /// Position as a wire payload.
    pub fn to_location(self) -> Location {
        Location::new(f64::from(self.lat), f64::from(self.lng))
    }
}

/// Result of applying an operation.
///
/// Used to compare model and real system behavior.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OperationResult {
    /// Operation succeeded.
    Ok,

    /// Operation failed with expected error.
    Error(OperationError),
}

impl OperationResult {
    /// Whether the operation succeeded.
    pub fn is_ok(&self) -> bool {
        matches!(self, Self::Ok)
    }
}

/// Expected errors that can occur during operations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OperationError {
    /// Client has no open connection.
    NotConnected,

    /// Client already has an open connection.
    AlreadyConnected,

    /// Client ID outside the world.
    InvalidClient,

    /// Booking was turned down.
    Rejected(BookingRejection),
}
