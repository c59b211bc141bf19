//! Deterministic simulation harness for the ridematch relay.
//!
//! [`SimEnv`] replaces the clock and the RNG, and [`SimHub`] replaces the
//! WebSocket runtime with in-memory inboxes, so whole sessions replay
//! identically from a seed.
//!
//! # Model-Based Testing
//!
//! The `model` module provides a reference implementation for model-based
//! testing. Operations are applied to both the model and real implementation,
//! and their observable states are compared.
//!
//! # Invariant Testing
//!
//! The `invariants` module provides behavioral testing through invariant
//! checks. Use [`InvariantRegistry::standard()`] for every relay invariant.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod invariants;
pub mod model;
pub mod sim_env;
pub mod sim_hub;

pub use invariants::{
    AssignmentIndexConsistent, BookedByNamesLiveRider, BookingInjective,
    DepartedConnectionsPurged, Invariant, InvariantRegistry, InvariantResult,
    RecordsBelongToLiveConnections, SystemSnapshot, Violation,
};
pub use model::{
    ClientId, GridPosition, ModelWorld, ObservableState, Operation, OperationError,
    OperationResult,
};
pub use sim_env::{SimEnv, SimInstant};
pub use sim_hub::SimHub;
