//! Observable system state for invariant checks.

use std::collections::BTreeSet;

use ridematch_core::{ConnectionId, DriverRecord, Environment, RiderRecord};
use ridematch_server::ServerDriver;

use crate::SimHub;

/// Point-in-time copy of everything the invariants look at.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SystemSnapshot {
    /// Connections the driver considers live.
    pub live: BTreeSet<ConnectionId>,
    /// Connections that have been closed.
    pub departed: BTreeSet<ConnectionId>,
    /// Driver records in id order.
    pub drivers: Vec<DriverRecord>,
    /// Rider records in id order.
    pub riders: Vec<RiderRecord>,
    /// `(rider, driver)` pairs from the reverse index, sorted.
    pub assignments: Vec<(ConnectionId, ConnectionId)>,
}

impl SystemSnapshot {
    /// Snapshot of a system with nothing in it.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Capture a driver's state. `departed` lists connections known to be
    /// closed, which the driver itself no longer remembers.
    pub fn from_driver<E: Environment>(
        driver: &ServerDriver<E>,
        departed: &BTreeSet<ConnectionId>,
    ) -> Self {
        let registry = driver.registry();

        let mut riders: Vec<_> = registry.riders().cloned().collect();
        riders.sort_by(|a, b| a.id.cmp(&b.id));

        let mut assignments: Vec<_> =
            registry.assignments().map(|(rider, driver)| (rider.clone(), driver.clone())).collect();
        assignments.sort();

        Self {
            live: driver.sessions().cloned().collect(),
            departed: departed.clone(),
            drivers: registry.drivers().cloned().collect(),
            riders,
            assignments,
        }
    }

    /// Capture a hub's state.
    pub fn from_hub(hub: &SimHub) -> Self {
        Self::from_driver(hub.driver(), hub.departed())
    }

    /// Whether any record or booking mentions `id`.
    pub fn mentions(&self, id: &ConnectionId) -> bool {
        self.drivers.iter().any(|d| d.id == *id || d.booked_by.as_ref() == Some(id))
            || self.riders.iter().any(|r| r.id == *id)
            || self.assignments.iter().any(|(r, d)| r == id || d == id)
    }
}
