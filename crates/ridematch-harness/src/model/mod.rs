//! Reference model for model-based testing.
//!
//! [`ModelWorld`] applies [`Operation`]s with the simplest possible data
//! structures; tests apply the same operations to a [`SimHub`] and compare
//! [`ObservableState`].
//!
//! [`SimHub`]: crate::SimHub

mod operation;
mod world;

pub use operation::{ClientId, GridPosition, Operation, OperationError, OperationResult};
pub use world::{ModelWorld, ObservableState};
