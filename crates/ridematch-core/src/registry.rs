//! Driver and rider registry with booking rules.
//!
//! The registry keeps every driver and rider record plus a reverse index from
//! rider to booked driver. `bookedBy` on the driver record is the source of
//! truth; the index only makes the relay lookup O(1) and is updated in the
//! same method as every `bookedBy` write.
//!
//! # Invariants
//!
//! - At most one driver has a given `bookedBy` value, and every rider id in
//!   a `bookedBy` belongs to a live rider record.
//! - `assignments[r] == d` iff `drivers[d].booked_by == Some(r)`.
//! - After [`MatchRegistry::remove_connection`] no record or booking mentions
//!   the departed id.

use std::collections::{BTreeMap, HashMap, btree_map::Entry};

use ridematch_proto::{
    BookingRejection, ConnectionId, DriverRecord, DriverSnapshot, Location, RiderRecord,
};

/// A successful booking.
#[derive(Debug, Clone, PartialEq)]
pub struct Booking {
    /// Driver now held by the rider.
    pub driver_id: ConnectionId,
    /// Rider state at booking time (the driver is told this position).
    pub rider: RiderRecord,
}

/// What disconnect cleanup removed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Departure {
    /// The connection had a driver record.
    pub driver_removed: bool,
    /// The connection had a rider record.
    pub rider_removed: bool,
    /// Driver freed because its rider left. It is not told directly; the next
    /// snapshot shows it available.
    pub released_driver: Option<ConnectionId>,
    /// Rider whose driver left, losing the booking.
    pub stranded_rider: Option<ConnectionId>,
}

/// Authoritative in-memory matching state.
///
/// Owns both maps so a single lock (or a single owner) serializes every
/// read-check-write sequence, which is what makes double booking impossible.
#[derive(Debug, Default)]
pub struct MatchRegistry {
    /// Driver id → driver record. Ordered so snapshots are deterministic.
    drivers: BTreeMap<ConnectionId, DriverRecord>,
    /// Rider id → rider record.
    riders: HashMap<ConnectionId, RiderRecord>,
    /// Rider id → booked driver id (reverse of `bookedBy`).
    assignments: HashMap<ConnectionId, ConnectionId>,
}

impl MatchRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a driver position.
    ///
    /// Replaces the previous record wholesale except for `bookedBy`, which
    /// survives position updates.
    pub fn update_driver_location(
        &mut self,
        id: &ConnectionId,
        location: Location,
    ) -> &DriverRecord {
        match self.drivers.entry(id.clone()) {
            Entry::Occupied(entry) => {
                let driver = entry.into_mut();
                let booked_by = driver.booked_by.take();
                *driver = DriverRecord::new(id.clone(), location, booked_by);
                driver
            },
            Entry::Vacant(entry) => entry.insert(DriverRecord::new(id.clone(), location, None)),
        }
    }

    /// Record a rider position.
    ///
    /// Returns the driver currently booked by this rider, who should be told
    /// about the move. `None` means the rider has no booking yet.
    pub fn update_rider_location(
        &mut self,
        id: &ConnectionId,
        location: Location,
    ) -> Option<&ConnectionId> {
        self.riders.insert(id.clone(), RiderRecord::new(id.clone(), location));
        self.assignments.get(id)
    }

    /// Attempt to assign `driver_id` to `rider_id`.
    ///
    /// Checks run in order and the first failure wins: the driver must exist,
    /// must be available, the rider must have reported a location, and the
    /// rider must not already hold another driver. A rejection leaves the
    /// registry untouched.
    pub fn book(
        &mut self,
        rider_id: &ConnectionId,
        driver_id: &ConnectionId,
    ) -> Result<Booking, BookingRejection> {
        let driver = self.drivers.get_mut(driver_id).ok_or(BookingRejection::DriverNotFound)?;

        if !driver.is_available() {
            return Err(BookingRejection::DriverAlreadyBooked);
        }

        let rider = self.riders.get(rider_id).ok_or(BookingRejection::RiderLocationMissing)?;

        if self.assignments.contains_key(rider_id) {
            return Err(BookingRejection::RiderAlreadyBooked);
        }

        driver.booked_by = Some(rider_id.clone());
        self.assignments.insert(rider_id.clone(), driver_id.clone());

        Ok(Booking { driver_id: driver_id.clone(), rider: rider.clone() })
    }

    /// Remove every trace of a connection.
    ///
    /// Deletes its driver and rider records, cancels the booking its driver
    /// record held, and frees the driver it had booked as a rider. Always
    /// succeeds; removing an unknown id is a no-op.
    pub fn remove_connection(&mut self, id: &ConnectionId) -> Departure {
        let mut departure = Departure::default();

        if let Some(driver) = self.drivers.remove(id) {
            departure.driver_removed = true;
            if let Some(rider_id) = driver.booked_by {
                self.assignments.remove(&rider_id);
                if rider_id != *id {
                    departure.stranded_rider = Some(rider_id);
                }
            }
        }

        departure.rider_removed = self.riders.remove(id).is_some();

        if let Some(driver_id) = self.assignments.remove(id) {
            if let Some(driver) = self.drivers.get_mut(&driver_id) {
                driver.booked_by = None;
                departure.released_driver = Some(driver_id);
            }
        }

        departure
    }

    /// Copy of every driver record, for broadcast.
    pub fn snapshot(&self) -> DriverSnapshot {
        self.drivers.values().cloned().collect()
    }

    /// Driver record. `None` if the connection never reported as a driver.
    pub fn driver(&self, id: &ConnectionId) -> Option<&DriverRecord> {
        self.drivers.get(id)
    }

    /// Rider record. `None` if the connection never reported as a rider.
    pub fn rider(&self, id: &ConnectionId) -> Option<&RiderRecord> {
        self.riders.get(id)
    }

    /// Driver booked by a rider. O(1) lookup using the reverse index.
    pub fn driver_for_rider(&self, rider_id: &ConnectionId) -> Option<&ConnectionId> {
        self.assignments.get(rider_id)
    }

    /// All driver records in id order.
    pub fn drivers(&self) -> impl Iterator<Item = &DriverRecord> + '_ {
        self.drivers.values()
    }

    /// All rider records, unordered.
    pub fn riders(&self) -> impl Iterator<Item = &RiderRecord> + '_ {
        self.riders.values()
    }

    /// All `(rider, driver)` pairs from the reverse index, unordered.
    pub fn assignments(&self) -> impl Iterator<Item = (&ConnectionId, &ConnectionId)> + '_ {
        self.assignments.iter()
    }

    /// Number of driver records.
    pub fn driver_count(&self) -> usize {
        self.drivers.len()
    }

    /// Number of rider records.
    pub fn rider_count(&self) -> usize {
        self.riders.len()
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn id(raw: &str) -> ConnectionId {
        ConnectionId::new(raw)
    }

    fn registry_with_driver(driver: &str) -> MatchRegistry {
        let mut registry = MatchRegistry::new();
        registry.update_driver_location(&id(driver), Location::new(1.0, 1.0));
        registry
    }

    #[test]
    fn first_location_registers_available_driver() {
        let registry = registry_with_driver("d");

        let driver = registry.driver(&id("d")).unwrap();
        assert_eq!(driver.id, id("d"));
        assert!(driver.is_available());
        assert_eq!(registry.driver_count(), 1);
    }

    #[test]
    fn driver_update_replaces_fields_but_keeps_booking() {
        let mut registry = registry_with_driver("d");
        registry.update_rider_location(&id("r"), Location::new(2.0, 2.0));
        registry.book(&id("r"), &id("d")).unwrap();

        registry.update_driver_location(&id("d"), Location::new(5.0, 6.0).with_field("car", "van"));
        registry.update_driver_location(&id("d"), Location::new(7.0, 8.0));

        let driver = registry.driver(&id("d")).unwrap();
        assert_eq!((driver.lat, driver.lng), (7.0, 8.0));
        assert!(driver.extra.get("car").is_none());
        assert_eq!(driver.booked_by, Some(id("r")));
    }

    #[test]
    fn rider_update_reports_booked_driver() {
        let mut registry = registry_with_driver("d");

        assert_eq!(registry.update_rider_location(&id("r"), Location::new(2.0, 2.0)), None);

        registry.book(&id("r"), &id("d")).unwrap();
        assert_eq!(
            registry.update_rider_location(&id("r"), Location::new(3.0, 3.0)),
            Some(&id("d"))
        );
        assert_eq!(registry.rider(&id("r")).unwrap().lat, 3.0);
    }

    #[test]
    fn book_unknown_driver_fails_first() {
        let mut registry = MatchRegistry::new();

        let result = registry.book(&id("r"), &id("ghost"));
        assert_eq!(result, Err(BookingRejection::DriverNotFound));
    }

    #[test]
    fn book_without_rider_location_fails() {
        let mut registry = registry_with_driver("d");

        let result = registry.book(&id("r"), &id("d"));
        assert_eq!(result, Err(BookingRejection::RiderLocationMissing));
        assert!(registry.driver(&id("d")).unwrap().is_available());
    }

    #[test]
    fn already_booked_wins_over_missing_location() {
        let mut registry = registry_with_driver("d");
        registry.update_rider_location(&id("r1"), Location::new(2.0, 2.0));
        registry.book(&id("r1"), &id("d")).unwrap();

        // r2 never sent a location, but the booked check comes first
        let result = registry.book(&id("r2"), &id("d"));
        assert_eq!(result, Err(BookingRejection::DriverAlreadyBooked));
        assert_eq!(registry.driver(&id("d")).unwrap().booked_by, Some(id("r1")));
    }

    #[test]
    fn successful_booking_returns_rider_position() {
        let mut registry = registry_with_driver("d");
        registry.update_rider_location(&id("r"), Location::new(2.0, 2.0));

        let booking = registry.book(&id("r"), &id("d")).unwrap();

        assert_eq!(booking.driver_id, id("d"));
        assert_eq!((booking.rider.lat, booking.rider.lng), (2.0, 2.0));
        assert_eq!(registry.driver_for_rider(&id("r")), Some(&id("d")));
    }

    #[test]
    fn rider_cannot_hold_two_drivers() {
        let mut registry = registry_with_driver("d1");
        registry.update_driver_location(&id("d2"), Location::new(0.0, 0.0));
        registry.update_rider_location(&id("r"), Location::new(2.0, 2.0));
        registry.book(&id("r"), &id("d1")).unwrap();

        let result = registry.book(&id("r"), &id("d2"));
        assert_eq!(result, Err(BookingRejection::RiderAlreadyBooked));
        assert!(registry.driver(&id("d2")).unwrap().is_available());
    }

    #[test]
    fn rider_departure_releases_driver() {
        let mut registry = registry_with_driver("d");
        registry.update_rider_location(&id("r"), Location::new(2.0, 2.0));
        registry.book(&id("r"), &id("d")).unwrap();

        let departure = registry.remove_connection(&id("r"));

        assert!(departure.rider_removed);
        assert!(!departure.driver_removed);
        assert_eq!(departure.released_driver, Some(id("d")));
        assert!(registry.driver(&id("d")).unwrap().is_available());
        assert_eq!(registry.driver_for_rider(&id("r")), None);

        registry.update_rider_location(&id("r2"), Location::new(0.0, 0.0));
        assert!(registry.book(&id("r2"), &id("d")).is_ok());
    }

    #[test]
    fn driver_departure_strands_rider() {
        let mut registry = registry_with_driver("d");
        registry.update_rider_location(&id("r"), Location::new(2.0, 2.0));
        registry.book(&id("r"), &id("d")).unwrap();

        let departure = registry.remove_connection(&id("d"));

        assert!(departure.driver_removed);
        assert_eq!(departure.stranded_rider, Some(id("r")));
        assert!(registry.driver(&id("d")).is_none());
        assert_eq!(registry.update_rider_location(&id("r"), Location::new(4.0, 4.0)), None);
    }

    #[test]
    fn dual_role_connection_is_fully_purged() {
        let mut registry = registry_with_driver("x");
        registry.update_rider_location(&id("x"), Location::new(2.0, 2.0));
        registry.book(&id("x"), &id("x")).unwrap();

        let departure = registry.remove_connection(&id("x"));

        assert!(departure.driver_removed && departure.rider_removed);
        assert_eq!(departure.released_driver, None);
        assert_eq!(departure.stranded_rider, None);
        assert_eq!(registry.driver_count(), 0);
        assert_eq!(registry.rider_count(), 0);
        assert_eq!(registry.assignments().count(), 0);
    }

    #[test]
    fn unknown_departure_changes_nothing() {
        let mut registry = registry_with_driver("d");

        let departure = registry.remove_connection(&id("stranger"));

        assert_eq!(departure, Departure::default());
        assert_eq!(registry.driver_count(), 1);
    }

    #[test]
    fn snapshot_reflects_bookings() {
        let mut registry = registry_with_driver("d");
        registry.update_rider_location(&id("r"), Location::new(2.0, 2.0));
        registry.book(&id("r"), &id("d")).unwrap();

        let snapshot = serde_json::to_value(registry.snapshot()).unwrap();
        assert_eq!(snapshot["d"]["bookedBy"], json!("r"));
    }
}
