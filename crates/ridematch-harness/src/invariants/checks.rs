//! Standard invariant checks.
//!
//! These invariants capture behavioral properties that must always hold.
//! They verify WHAT must be true, not specific test scenarios.

use std::collections::{BTreeMap, BTreeSet};

use super::{Invariant, InvariantResult, SystemSnapshot};

/// At most one driver is booked by any given rider.
///
/// The booking relation rider → driver is injective. A rider holding two
/// drivers means a booking check was skipped or raced.
pub struct BookingInjective;

impl Invariant for BookingInjective {
    fn name(&self) -> &'static str {
        "booking_injective"
    }

    fn check(&self, state: &SystemSnapshot) -> InvariantResult {
        let mut holders = BTreeMap::new();

        for driver in &state.drivers {
            if let Some(rider) = &driver.booked_by {
                if let Some(previous) = holders.insert(rider, &driver.id) {
                    return Err(self.violation(format!(
                        "rider {rider} holds both {previous} and {}",
                        driver.id
                    )));
                }
            }
        }
        Ok(())
    }
}

/// Every `bookedBy` names a rider with a live rider record.
///
/// Booking requires a rider record, and the rider's departure clears the
/// booking, so a dangling `bookedBy` means cleanup missed a driver.
pub struct BookedByNamesLiveRider;

impl Invariant for BookedByNamesLiveRider {
    fn name(&self) -> &'static str {
        "booked_by_names_live_rider"
    }

    fn check(&self, state: &SystemSnapshot) -> InvariantResult {
        let riders: BTreeSet<_> = state.riders.iter().map(|r| &r.id).collect();

        for driver in &state.drivers {
            if let Some(rider) = &driver.booked_by {
                if !riders.contains(rider) || !state.live.contains(rider) {
                    return Err(self.violation(format!(
                        "driver {} booked by {rider}, which has no live rider record",
                        driver.id
                    )));
                }
            }
        }
        Ok(())
    }
}

/// The rider → driver index is exactly the inverse of `bookedBy`.
pub struct AssignmentIndexConsistent;

impl Invariant for AssignmentIndexConsistent {
    fn name(&self) -> &'static str {
        "assignment_index_consistent"
    }

    fn check(&self, state: &SystemSnapshot) -> InvariantResult {
        let mut expected: Vec<_> = state
            .drivers
            .iter()
            .filter_map(|d| d.booked_by.clone().map(|rider| (rider, d.id.clone())))
            .collect();
        expected.sort();

        if expected != state.assignments {
            return Err(self.violation(format!(
                "index {:?} disagrees with bookedBy {:?}",
                state.assignments, expected
            )));
        }
        Ok(())
    }
}

/// Closed connections leave nothing behind.
///
/// No driver record, rider record, `bookedBy`, or index entry may mention a
/// connection whose disconnect has been processed.
pub struct DepartedConnectionsPurged;

impl Invariant for DepartedConnectionsPurged {
    fn name(&self) -> &'static str {
        "departed_connections_purged"
    }

    fn check(&self, state: &SystemSnapshot) -> InvariantResult {
        for id in &state.departed {
            if state.mentions(id) {
                return Err(self.violation(format!("departed connection {id} still in state")));
            }
            if state.live.contains(id) {
                return Err(self.violation(format!("departed connection {id} still live")));
            }
        }
        Ok(())
    }
}

/// Only live connections own driver or rider records.
pub struct RecordsBelongToLiveConnections;

impl Invariant for RecordsBelongToLiveConnections {
    fn name(&self) -> &'static str {
        "records_belong_to_live_connections"
    }

    fn check(&self, state: &SystemSnapshot) -> InvariantResult {
        let owners = state.drivers.iter().map(|d| &d.id).chain(state.riders.iter().map(|r| &r.id));

        for id in owners {
            if !state.live.contains(id) {
                return Err(self.violation(format!("record for {id} has no live connection")));
            }
        }
        Ok(())
    }
}
