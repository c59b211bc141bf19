//! Relay invariants.
//!
//! Each check looks at a [`SystemSnapshot`] (a frozen copy of the registry,
//! the live connections, and the connections already closed) and reports
//! what is wrong with it. Property tests capture a snapshot after every
//! operation and run [`InvariantRegistry::standard`] against it:
//!
//! ```ignore
//! let invariants = InvariantRegistry::standard();
//! invariants.check_hub(&hub)?;
//! ```

mod checks;
mod snapshot;

pub use checks::{
    AssignmentIndexConsistent, BookedByNamesLiveRider, BookingInjective,
    DepartedConnectionsPurged, RecordsBelongToLiveConnections,
};
pub use snapshot::SystemSnapshot;

use crate::SimHub;

/// Outcome of one check.
pub type InvariantResult = Result<(), Violation>;

/// A broken invariant and what broke it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Violation {
    /// `snake_case` name of the check that failed.
    pub invariant: &'static str,
    /// Offending ids and values.
    pub message: String,
}

impl std::fmt::Display for Violation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.invariant, self.message)
    }
}

impl std::error::Error for Violation {}

/// A property of relay state that holds between any two events.
pub trait Invariant: Send + Sync {
    /// Name used in violation reports.
    fn name(&self) -> &'static str;

    /// Inspect `state`, reporting the first problem found.
    fn check(&self, state: &SystemSnapshot) -> InvariantResult;

    /// Violation tagged with [`Invariant::name`].
    fn violation(&self, message: String) -> Violation {
        Violation { invariant: self.name(), message }
    }
}

/// Ordered set of checks run together.
pub struct InvariantRegistry {
    invariants: Vec<Box<dyn Invariant>>,
}

impl Default for InvariantRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl InvariantRegistry {
    /// Registry with no checks.
    pub fn new() -> Self {
        Self { invariants: Vec::new() }
    }

    /// Every relay invariant:
    /// - [`BookingInjective`]: no rider holds two drivers
    /// - [`BookedByNamesLiveRider`]: every booking names a live rider record
    /// - [`AssignmentIndexConsistent`]: reverse index agrees with `bookedBy`
    /// - [`DepartedConnectionsPurged`]: closed connections leave no trace
    /// - [`RecordsBelongToLiveConnections`]: only open connections own records
    pub fn standard() -> Self {
        let mut registry = Self::new();
        registry.add(BookingInjective);
        registry.add(BookedByNamesLiveRider);
        registry.add(AssignmentIndexConsistent);
        registry.add(DepartedConnectionsPurged);
        registry.add(RecordsBelongToLiveConnections);
        registry
    }

    /// Append a check.
    pub fn add<I: Invariant + 'static>(&mut self, invariant: I) {
        self.invariants.push(Box::new(invariant));
    }

    /// Run every check against `state`.
    ///
    /// # Errors
    ///
    /// Every violation found, in registration order.
    pub fn check_all(&self, state: &SystemSnapshot) -> Result<(), Vec<Violation>> {
        let violations: Vec<_> =
            self.invariants.iter().filter_map(|inv| inv.check(state).err()).collect();

        if violations.is_empty() { Ok(()) } else { Err(violations) }
    }

    /// Snapshot `hub` and run every check against it.
    ///
    /// # Errors
    ///
    /// Every violation found, in registration order.
    pub fn check_hub(&self, hub: &SimHub) -> Result<(), Vec<Violation>> {
        self.check_all(&SystemSnapshot::from_hub(hub))
    }

    /// Names of the registered checks, in order.
    pub fn names(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.invariants.iter().map(|inv| inv.name())
    }

    /// Number of checks.
    pub fn len(&self) -> usize {
        self.invariants.len()
    }

    /// No checks registered.
    pub fn is_empty(&self) -> bool {
        self.invariants.is_empty()
    }
}
