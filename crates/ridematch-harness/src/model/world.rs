//! Model world - the reference relay.
//!
//! A deliberately naive re-statement of the matching rules over small client
//! slots instead of connection ids. It is the oracle the real driver is
//! checked against: same operations in, same observable state out.

use std::collections::BTreeMap;

use ridematch_core::BookingRejection;

use super::operation::{ClientId, GridPosition, Operation, OperationError, OperationResult};

/// Observable state for oracle comparison.
///
/// This is the subset of world state that can be compared
/// against the real implementation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObservableState {
    /// Clients with an open connection, ascending.
    pub connected: Vec<ClientId>,
    /// Driver records as `(client, position, booked_by)`, ascending.
    pub drivers: Vec<(ClientId, GridPosition, Option<ClientId>)>,
    /// Rider records as `(client, position)`, ascending.
    pub riders: Vec<(ClientId, GridPosition)>,
    /// Per-client rider moves relayed to it, in arrival order.
    pub relayed: Vec<Vec<(ClientId, GridPosition)>>,
    /// Per-client booking confirmations received, in arrival order.
    pub confirmations: Vec<Vec<(ClientId, GridPosition)>>,
}

#[derive(Debug, Clone, Copy)]
struct ModelDriver {
    position: GridPosition,
    booked_by: Option<ClientId>,
}

/// Model world - the reference implementation.
#[derive(Debug, Clone)]
pub struct ModelWorld {
    connected: Vec<bool>,
    drivers: BTreeMap<ClientId, ModelDriver>,
    riders: BTreeMap<ClientId, GridPosition>,
    relayed: Vec<Vec<(ClientId, GridPosition)>>,
    confirmations: Vec<Vec<(ClientId, GridPosition)>>,
}

impl ModelWorld {
    /// Create a new model world with the given number of clients.
    pub fn new(num_clients: usize) -> Self {
        Self {
            connected: vec![false; num_clients],
            drivers: BTreeMap::new(),
            riders: BTreeMap::new(),
            relayed: vec![Vec::new(); num_clients],
            confirmations: vec![Vec::new(); num_clients],
        }
    }

    /// Number of clients in the world.
    pub fn num_clients(&self) -> usize {
        self.connected.len()
    }

    /// Whether a client has an open connection.
    pub fn is_connected(&self, client_id: ClientId) -> bool {
        self.connected.get(usize::from(client_id)).copied().unwrap_or(false)
    }

    /// Driver booked by a rider, if any.
    pub fn driver_for(&self, rider_id: ClientId) -> Option<ClientId> {
        self.drivers.iter().find(|(_, d)| d.booked_by == Some(rider_id)).map(|(id, _)| *id)
    }

    /// Apply an operation and return the result.
    ///
    /// This is the main entry point for model-based testing.
    /// The result should match the real implementation's result.
    pub fn apply(&mut self, op: &Operation) -> OperationResult {
        let outcome = match *op {
            Operation::Connect { client_id } => self.apply_connect(client_id),
            Operation::DriverLocation { client_id, position } => {
                self.apply_driver_location(client_id, position)
            },
            Operation::RiderLocation { client_id, position } => {
                self.apply_rider_location(client_id, position)
            },
            Operation::BookDriver { rider_id, driver_id } => {
                self.apply_book_driver(rider_id, driver_id)
            },
            Operation::SendGarbage { client_id } => self.require_connected(client_id),
            Operation::Disconnect { client_id } => self.apply_disconnect(client_id),
            Operation::AdvanceTime { .. } => Ok(()),
        };

        match outcome {
            Ok(()) => OperationResult::Ok,
            Err(e) => OperationResult::Error(e),
        }
    }

    fn require_connected(&self, client_id: ClientId) -> Result<(), OperationError> {
        match self.connected.get(usize::from(client_id)) {
            None => Err(OperationError::InvalidClient),
            Some(false) => Err(OperationError::NotConnected),
            Some(true) => Ok(()),
        }
    }

    fn apply_connect(&mut self, client_id: ClientId) -> Result<(), OperationError> {
        let slot =
            self.connected.get_mut(usize::from(client_id)).ok_or(OperationError::InvalidClient)?;

        if *slot {
            return Err(OperationError::AlreadyConnected);
        }
        *slot = true;
        Ok(())
    }

    fn apply_driver_location(
        &mut self,
        client_id: ClientId,
        position: GridPosition,
    ) -> Result<(), OperationError> {
        self.require_connected(client_id)?;

        self.drivers
            .entry(client_id)
            .and_modify(|d| d.position = position)
            .or_insert(ModelDriver { position, booked_by: None });
        Ok(())
    }

    fn apply_rider_location(
        &mut self,
        client_id: ClientId,
        position: GridPosition,
    ) -> Result<(), OperationError> {
        self.require_connected(client_id)?;

        self.riders.insert(client_id, position);
        if let Some(driver_id) = self.driver_for(client_id) {
            self.relayed[usize::from(driver_id)].push((client_id, position));
        }
        Ok(())
    }

    fn apply_book_driver(
        &mut self,
        rider_id: ClientId,
        driver_id: ClientId,
    ) -> Result<(), OperationError> {
        self.require_connected(rider_id)?;

        let rider_holds_driver = self.driver_for(rider_id).is_some();
        let rider_position = self.riders.get(&rider_id).copied();

        let driver = self
            .drivers
            .get_mut(&driver_id)
            .ok_or(OperationError::Rejected(BookingRejection::DriverNotFound))?;

        if driver.booked_by.is_some() {
            return Err(OperationError::Rejected(BookingRejection::DriverAlreadyBooked));
        }

        let position =
            rider_position.ok_or(OperationError::Rejected(BookingRejection::RiderLocationMissing))?;

        if rider_holds_driver {
            return Err(OperationError::Rejected(BookingRejection::RiderAlreadyBooked));
        }

        driver.booked_by = Some(rider_id);
        self.confirmations[usize::from(driver_id)].push((rider_id, position));
        Ok(())
    }

    fn apply_disconnect(&mut self, client_id: ClientId) -> Result<(), OperationError> {
        self.require_connected(client_id)?;

        self.connected[usize::from(client_id)] = false;
        self.drivers.remove(&client_id);
        self.riders.remove(&client_id);

        for driver in self.drivers.values_mut() {
            if driver.booked_by == Some(client_id) {
                driver.booked_by = None;
            }
        }
        Ok(())
    }

    /// Extract observable state for comparison.
    pub fn observable_state(&self) -> ObservableState {
        ObservableState {
            connected: (0..self.num_clients())
                .filter_map(|i| ClientId::try_from(i).ok())
                .filter(|id| self.is_connected(*id))
                .collect(),
            drivers: self.drivers.iter().map(|(id, d)| (*id, d.position, d.booked_by)).collect(),
            riders: self.riders.iter().map(|(id, position)| (*id, *position)).collect(),
            relayed: self.relayed.clone(),
            confirmations: self.confirmations.clone(),
        }
    }
}
