//! Booking payloads.

use std::fmt;

use serde::{Deserialize, Deserializer, Serialize, Serializer, de};

use crate::ConnectionId;

/// Why a booking request was turned down.
///
/// These are expected business outcomes, not faults. Checks run in the order
/// of the variants and the first failure wins.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BookingRejection {
    /// No driver record exists for the requested id.
    DriverNotFound,
    /// The driver is already held by a rider.
    DriverAlreadyBooked,
    /// The requester never reported a rider location.
    RiderLocationMissing,
    /// The requester already holds another driver. Keeps the booking relation
    /// one-to-one.
    RiderAlreadyBooked,
}

impl BookingRejection {
    /// Every rejection, in check order.
    pub const ALL: [Self; 4] = [
        Self::DriverNotFound,
        Self::DriverAlreadyBooked,
        Self::RiderLocationMissing,
        Self::RiderAlreadyBooked,
    ];

    /// Human-readable reason sent to the rider.
    pub const fn reason(self) -> &'static str {
        match self {
            Self::DriverNotFound => "Driver not found.",
            Self::DriverAlreadyBooked => "Driver already booked.",
            Self::RiderLocationMissing => "Rider location missing.",
            Self::RiderAlreadyBooked => "Rider already has a driver.",
        }
    }

    /// Parse a reason string back into a rejection.
    pub fn from_reason(reason: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|rejection| rejection.reason() == reason)
    }
}

impl fmt::Display for BookingRejection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.reason())
    }
}

// On the wire a rejection is its bare reason string.
impl Serialize for BookingRejection {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.reason())
    }
}

impl<'de> Deserialize<'de> for BookingRejection {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let reason = String::deserialize(deserializer)?;
        Self::from_reason(&reason)
            .ok_or_else(|| de::Error::custom(format!("unknown booking rejection: {reason}")))
    }
}

/// Acknowledgment sent to a rider whose booking succeeded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BookingAccepted {
    /// Driver now assigned to the rider.
    pub driver_id: ConnectionId,
}

/// A rider's position as relayed to their driver.
///
/// Used both for `bookingConfirmed` (position at booking time) and
/// `riderPositionUpdate` (every later move). Rider metadata is not relayed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RiderPosition {
    /// Rider that moved.
    pub rider_id: ConnectionId,
    /// Latitude in degrees.
    pub lat: f64,
    /// Longitude in degrees.
    pub lng: f64,
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn rejection_reasons_match_wire_strings() {
        assert_eq!(BookingRejection::DriverNotFound.to_string(), "Driver not found.");
        assert_eq!(BookingRejection::DriverAlreadyBooked.to_string(), "Driver already booked.");
        assert_eq!(BookingRejection::RiderLocationMissing.to_string(), "Rider location missing.");
        assert_eq!(BookingRejection::RiderAlreadyBooked.to_string(), "Rider already has a driver.");
    }

    #[test]
    fn every_rejection_parses_back_from_its_reason() {
        assert_eq!(BookingRejection::ALL.len(), 4);
        for rejection in BookingRejection::ALL {
            assert_eq!(BookingRejection::from_reason(rejection.reason()), Some(rejection));
        }
    }

    #[test]
    fn rejection_serializes_as_plain_string() {
        assert_eq!(
            serde_json::to_value(BookingRejection::DriverAlreadyBooked).unwrap(),
            json!("Driver already booked.")
        );
        assert!(serde_json::from_value::<BookingRejection>(json!("Nope.")).is_err());
    }

    #[test]
    fn rider_position_uses_camel_case() {
        let position = RiderPosition { rider_id: ConnectionId::new("r1"), lat: 3.0, lng: 4.0 };
        assert_eq!(
            serde_json::to_value(&position).unwrap(),
            json!({"riderId": "r1", "lat": 3.0, "lng": 4.0})
        );
    }
}
