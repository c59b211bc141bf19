//! Positions and the per-connection records built from them.

use std::collections::{BTreeMap, btree_map};

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::ConnectionId;

/// Metadata keys owned by the server. Dropped from client-supplied metadata so
/// they can never shadow the real fields on the wire.
pub const RESERVED_KEYS: [&str; 2] = ["id", "bookedBy"];

/// A reported position.
///
/// `lat` and `lng` are required numbers. Anything else the client sends
/// (heading, vehicle type, ...) lands in `extra` and is passed through
/// untouched.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Location {
    /// Latitude in degrees.
    pub lat: f64,
    /// Longitude in degrees.
    pub lng: f64,
    /// Opaque client metadata.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Location {
    /// A bare position with no metadata.
    pub fn new(lat: f64, lng: f64) -> Self {
        Self { lat, lng, extra: Map::new() }
    }

    /// Attach a metadata field.
    #[must_use]
    pub fn with_field(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.extra.insert(key.into(), value.into());
        self
    }

    fn into_parts(self) -> (f64, f64, Map<String, Value>) {
        let Self { lat, lng, mut extra } = self;
        for key in RESERVED_KEYS {
            extra.remove(key);
        }
        (lat, lng, extra)
    }
}

/// Server-side state for a connection acting as a driver.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DriverRecord {
    /// Owning connection.
    pub id: ConnectionId,
    /// Last reported latitude.
    pub lat: f64,
    /// Last reported longitude.
    pub lng: f64,
    /// Rider holding this driver, `null` while available.
    pub booked_by: Option<ConnectionId>,
    /// Passthrough metadata from the last location update.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl DriverRecord {
    /// Build a record from a location update. Reserved metadata keys are
    /// discarded.
    pub fn new(id: ConnectionId, location: Location, booked_by: Option<ConnectionId>) -> Self {
        let (lat, lng, extra) = location.into_parts();
        Self { id, lat, lng, booked_by, extra }
    }

    /// No rider holds this driver.
    pub fn is_available(&self) -> bool {
        self.booked_by.is_none()
    }
}

/// Server-side state for a connection acting as a rider.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RiderRecord {
    /// Owning connection.
    pub id: ConnectionId,
    /// Last reported latitude.
    pub lat: f64,
    /// Last reported longitude.
    pub lng: f64,
    /// Passthrough metadata from the last location update.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl RiderRecord {
    /// Build a record from a location update. Reserved metadata keys are
    /// discarded.
    pub fn new(id: ConnectionId, location: Location) -> Self {
        let (lat, lng, extra) = location.into_parts();
        Self { id, lat, lng, extra }
    }
}

/// Every driver record, keyed by connection id.
///
/// This is the `updateDrivers` payload. Keys are kept sorted so two snapshots
/// of the same state encode to identical JSON.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DriverSnapshot(BTreeMap<ConnectionId, DriverRecord>);

impl DriverSnapshot {
    /// An empty snapshot.
    pub fn new() -> Self {
        Self::default()
    }

    /// Record for a driver. `None` if the driver is not in the snapshot.
    pub fn get(&self, id: &ConnectionId) -> Option<&DriverRecord> {
        self.0.get(id)
    }

    /// Driver is present in the snapshot.
    pub fn contains(&self, id: &ConnectionId) -> bool {
        self.0.contains_key(id)
    }

    /// Number of drivers.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Snapshot holds no drivers.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Records in id order.
    pub fn iter(&self) -> btree_map::Values<'_, ConnectionId, DriverRecord> {
        self.0.values()
    }
}

impl FromIterator<DriverRecord> for DriverSnapshot {
    fn from_iter<I: IntoIterator<Item = DriverRecord>>(iter: I) -> Self {
        Self(iter.into_iter().map(|record| (record.id.clone(), record)).collect())
    }
}
