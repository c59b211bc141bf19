//! Ridematch core.
//!
//! Pure matching logic with no I/O. The [`MatchRegistry`] holds every driver
//! and rider record and enforces the booking rules; callers feed it one
//! message at a time and act on what it returns. Time and randomness come in
//! through [`Environment`] so the same logic runs under the production
//! runtime and under deterministic simulation.
//!
//! # Driver lifecycle
//!
//! ```text
//! unregistered ──location──▶ available ──book──▶ assigned
//!                                ▲                  │
//!                                └─rider departs────┘
//!       (either state) ──driver departs──▶ deleted
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod env;
mod registry;

pub use env::Environment;
pub use registry::{Booking, Departure, MatchRegistry};
pub use ridematch_proto::{BookingRejection, ConnectionId, DriverRecord, Location, RiderRecord};
