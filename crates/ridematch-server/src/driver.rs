//! Server driver.
//!
//! Ties together the live connection set and the `MatchRegistry`. The driver
//! performs no I/O: the runtime feeds it [`ServerEvent`]s one at a time and
//! executes the [`ServerAction`]s it returns. Because every event is handled
//! to completion before the next one starts, a booking's read-check-write
//! sequence can never interleave with another.

use std::collections::HashMap;

use ridematch_core::{Booking, ConnectionId, Environment, MatchRegistry};
use ridematch_proto::{
    BookingAccepted, ClientMessage, ErrorPayload, Location, RiderPosition, ServerMessage,
};

use crate::server_error::DriverError;

/// Driver configuration
#[derive(Debug, Clone)]
pub struct DriverConfig {
    /// Maximum concurrent connections
    pub max_connections: usize,
    /// Send the current driver snapshot to each new connection
    pub snapshot_on_connect: bool,
}

impl Default for DriverConfig {
    fn default() -> Self {
        Self { max_connections: 10_000, snapshot_on_connect: false }
    }
}

/// Events that the server driver processes.
///
/// These are produced by the external runtime (simulation or production).
#[derive(Debug, Clone)]
pub enum ServerEvent {
    /// A new connection was accepted
    ConnectionAccepted {
        /// Unique connection ID assigned by the runtime
        session_id: ConnectionId,
    },

    /// A decoded message was received from a connection
    MessageReceived {
        /// Connection that sent the message
        session_id: ConnectionId,
        /// The received message
        message: ClientMessage,
    },

    /// A frame from a connection could not be decoded
    MalformedMessage {
        /// Connection that sent the frame
        session_id: ConnectionId,
        /// Decoder error
        reason: String,
    },

    /// A connection was closed (by peer or error)
    ConnectionClosed {
        /// Connection that was closed
        session_id: ConnectionId,
        /// Reason for closure
        reason: String,
    },
}

/// Actions that the server driver produces.
///
/// These are executed by runtime-specific code (production or simulation).
#[derive(Debug, Clone, PartialEq)]
pub enum ServerAction {
    /// Send a message to a specific session
    SendToSession {
        /// Target session ID
        session_id: ConnectionId,
        /// Message to send
        message: ServerMessage,
    },

    /// Send a message to every live session
    Broadcast {
        /// Message to broadcast
        message: ServerMessage,
    },

    /// Close a connection
    CloseConnection {
        /// Session to close
        session_id: ConnectionId,
        /// Reason for closure
        reason: String,
    },

    /// Log a message (for debugging/monitoring)
    Log {
        /// Log level
        level: LogLevel,
        /// Message to log
        message: String,
    },
}

/// Log levels for server actions
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLevel {
    /// Debug information
    Debug,
    /// Informational message
    Info,
    /// Warning
    Warn,
    /// Error
    Error,
}

/// Action-based server driver.
///
/// Owns all matching state. Connection ids are tracked with the instant they
/// were accepted so disconnect logs can report session length.
pub struct ServerDriver<E>
where
    E: Environment,
{
    /// Live connections (session_id → accepted at)
    connections: HashMap<ConnectionId, E::Instant>,
    /// Driver and rider records plus bookings
    registry: MatchRegistry,
    /// Environment (time, RNG)
    env: E,
    /// Driver configuration
    config: DriverConfig,
}

impl<E> ServerDriver<E>
where
    E: Environment,
{
    /// Create a new server driver.
    pub fn new(env: E, config: DriverConfig) -> Self {
        Self { connections: HashMap::new(), registry: MatchRegistry::new(), env, config }
    }

    /// Process a server event and return actions to execute.
    ///
    /// This is the main entry point for the server driver.
    ///
    /// # Errors
    ///
    /// Returns [`DriverError`] when the runtime reports a session the driver
    /// does not expect. State is unchanged in that case.
    pub fn process_event(&mut self, event: ServerEvent) -> Result<Vec<ServerAction>, DriverError> {
        match event {
            ServerEvent::ConnectionAccepted { session_id } => {
                self.handle_connection_accepted(session_id)
            },
            ServerEvent::MessageReceived { session_id, message } => {
                self.handle_message_received(&session_id, message)
            },
            ServerEvent::MalformedMessage { session_id, reason } => {
                self.handle_malformed_message(session_id, reason)
            },
            ServerEvent::ConnectionClosed { session_id, reason } => {
                Ok(self.handle_connection_closed(&session_id, &reason))
            },
        }
    }

    /// Handle a new connection being accepted.
    fn handle_connection_accepted(
        &mut self,
        session_id: ConnectionId,
    ) -> Result<Vec<ServerAction>, DriverError> {
        if self.connections.contains_key(&session_id) {
            return Err(DriverError::SessionAlreadyExists(session_id));
        }

        if self.connections.len() >= self.config.max_connections {
            return Ok(vec![
                ServerAction::Log {
                    level: LogLevel::Warn,
                    message: format!(
                        "rejecting connection {session_id}: limit of {} reached",
                        self.config.max_connections
                    ),
                },
                ServerAction::CloseConnection {
                    session_id,
                    reason: "max connections exceeded".to_string(),
                },
            ]);
        }

        self.connections.insert(session_id.clone(), self.env.now());

        let mut actions = vec![ServerAction::Log {
            level: LogLevel::Info,
            message: format!("connection {session_id} accepted"),
        }];

        if self.config.snapshot_on_connect {
            actions.push(ServerAction::SendToSession {
                session_id,
                message: ServerMessage::UpdateDrivers(self.registry.snapshot()),
            });
        }

        Ok(actions)
    }

    /// Handle a decoded message from a connection.
    fn handle_message_received(
        &mut self,
        session_id: &ConnectionId,
        message: ClientMessage,
    ) -> Result<Vec<ServerAction>, DriverError> {
        if !self.connections.contains_key(session_id) {
            return Err(DriverError::SessionNotFound(session_id.clone()));
        }

        let actions = match message {
            ClientMessage::DriverLocation(location) => {
                self.registry.update_driver_location(session_id, location);
                vec![self.broadcast_snapshot()]
            },
            ClientMessage::RiderLocation(location) => {
                self.handle_rider_location(session_id, location)
            },
            ClientMessage::BookDriver(driver_id) => self.handle_book_driver(session_id, &driver_id),
        };

        Ok(actions)
    }

    /// Store a rider position and relay it to the booked driver, if any.
    fn handle_rider_location(
        &mut self,
        rider_id: &ConnectionId,
        location: Location,
    ) -> Vec<ServerAction> {
        let (lat, lng) = (location.lat, location.lng);

        match self.registry.update_rider_location(rider_id, location) {
            Some(driver_id) => vec![ServerAction::SendToSession {
                session_id: driver_id.clone(),
                message: ServerMessage::RiderPositionUpdate(RiderPosition {
                    rider_id: rider_id.clone(),
                    lat,
                    lng,
                }),
            }],
            None => Vec::new(),
        }
    }

    fn handle_book_driver(
        &mut self,
        rider_id: &ConnectionId,
        driver_id: &ConnectionId,
    ) -> Vec<ServerAction> {
        match self.registry.book(rider_id, driver_id) {
            Ok(Booking { driver_id, rider }) => vec![
                ServerAction::Log {
                    level: LogLevel::Debug,
                    message: format!("rider {rider_id} booked driver {driver_id}"),
                },
                ServerAction::SendToSession {
                    session_id: rider_id.clone(),
                    message: ServerMessage::BookingSuccess(BookingAccepted {
                        driver_id: driver_id.clone(),
                    }),
                },
                ServerAction::SendToSession {
                    session_id: driver_id,
                    message: ServerMessage::BookingConfirmed(RiderPosition {
                        rider_id: rider.id,
                        lat: rider.lat,
                        lng: rider.lng,
                    }),
                },
                self.broadcast_snapshot(),
            ],
            Err(rejection) => vec![
                ServerAction::Log {
                    level: LogLevel::Debug,
                    message: format!("rider {rider_id} could not book {driver_id}: {rejection}"),
                },
                ServerAction::SendToSession {
                    session_id: rider_id.clone(),
                    message: ServerMessage::BookingFailed(rejection),
                },
            ],
        }
    }

    /// Handle an undecodable frame: tell the sender, touch nothing.
    fn handle_malformed_message(
        &self,
        session_id: ConnectionId,
        reason: String,
    ) -> Result<Vec<ServerAction>, DriverError> {
        if !self.connections.contains_key(&session_id) {
            return Err(DriverError::SessionNotFound(session_id));
        }

        Ok(vec![
            ServerAction::Log {
                level: LogLevel::Warn,
                message: format!("malformed message from {session_id}: {reason}"),
            },
            ServerAction::SendToSession {
                session_id,
                message: ServerMessage::ProtocolError(ErrorPayload { message: reason }),
            },
        ])
    }

    /// Handle a connection closing.
    ///
    /// Idempotent: closing an unknown or already closed session does nothing.
    fn handle_connection_closed(
        &mut self,
        session_id: &ConnectionId,
        reason: &str,
    ) -> Vec<ServerAction> {
        let Some(accepted_at) = self.connections.remove(session_id) else {
            return Vec::new();
        };

        let departure = self.registry.remove_connection(session_id);
        let duration = self.env.now() - accepted_at;

        let mut actions = vec![ServerAction::Log {
            level: LogLevel::Info,
            message: format!("connection {session_id} closed after {duration:?}: {reason}"),
        }];

        if let Some(driver_id) = &departure.released_driver {
            actions.push(ServerAction::Log {
                level: LogLevel::Debug,
                message: format!("driver {driver_id} released by departing rider {session_id}"),
            });
        }

        if let Some(rider_id) = &departure.stranded_rider {
            actions.push(ServerAction::Log {
                level: LogLevel::Debug,
                message: format!("rider {rider_id} lost driver {session_id}"),
            });
        }

        actions.push(self.broadcast_snapshot());
        actions
    }

    fn broadcast_snapshot(&self) -> ServerAction {
        ServerAction::Broadcast { message: ServerMessage::UpdateDrivers(self.registry.snapshot()) }
    }

    /// Matching state.
    pub fn registry(&self) -> &MatchRegistry {
        &self.registry
    }

    /// Number of live connections.
    pub fn connection_count(&self) -> usize {
        self.connections.len()
    }

    /// Whether a session is currently live.
    pub fn is_connected(&self, session_id: &ConnectionId) -> bool {
        self.connections.contains_key(session_id)
    }

    /// Live session ids, unordered.
    pub fn sessions(&self) -> impl Iterator<Item = &ConnectionId> + '_ {
        self.connections.keys()
    }

    /// Driver configuration.
    pub fn config(&self) -> &DriverConfig {
        &self.config
    }

    /// Environment.
    pub fn env(&self) -> &E {
        &self.env
    }
}

impl<E> std::fmt::Debug for ServerDriver<E>
where
    E: Environment,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServerDriver")
            .field("connection_count", &self.connections.len())
            .field("driver_count", &self.registry.driver_count())
            .field("rider_count", &self.registry.rider_count())
            .finish()
    }
}
