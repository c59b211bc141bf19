//! In-memory transport around `ServerDriver`.
//!
//! `SimHub` plays the role of the WebSocket runtime without sockets: it
//! mints connection ids from [`SimEnv`], feeds events to the driver, and
//! executes the resulting actions into per-connection inboxes. Every message
//! is pushed through the JSON codec on the way, so tests observe exactly
//! what a real client would decode.
//!
//! Tests drive the hub explicitly; nothing runs in the background.

use std::{
    collections::{BTreeSet, HashMap},
    time::Duration,
};

use ridematch_core::{ConnectionId, Environment};
use ridematch_proto::{ClientMessage, ServerMessage};
use ridematch_server::{
    DriverConfig, DriverError, LogLevel, ServerAction, ServerDriver, ServerEvent,
};

use crate::SimEnv;

/// Simulated relay with in-memory delivery.
pub struct SimHub {
    /// The action-based server driver
    driver: ServerDriver<SimEnv>,
    /// Shared with the driver
    env: SimEnv,
    /// Undelivered messages per open connection
    inboxes: HashMap<ConnectionId, Vec<ServerMessage>>,
    /// Connections that have been closed, by either side
    departed: BTreeSet<ConnectionId>,
    /// Log actions in emission order
    logs: Vec<(LogLevel, String)>,
}

impl SimHub {
    /// Hub with default driver configuration.
    pub fn new(seed: u64) -> Self {
        Self::with_config(seed, DriverConfig::default())
    }

    /// Hub with custom driver configuration.
    pub fn with_config(seed: u64, config: DriverConfig) -> Self {
        let env = SimEnv::with_seed(seed);
        let driver = ServerDriver::new(env.clone(), config);

        Self {
            driver,
            env,
            inboxes: HashMap::new(),
            departed: BTreeSet::new(),
            logs: Vec::new(),
        }
    }

    /// Open a connection and return its id.
    ///
    /// The connection may already be closed on return if the driver refused
    /// it; check [`SimHub::is_open`].
    ///
    /// # Errors
    ///
    /// Propagates driver errors (a minted id collided with a live one).
    pub fn connect(&mut self) -> Result<ConnectionId, DriverError> {
        let session_id = self.env.connection_id();
        self.inboxes.insert(session_id.clone(), Vec::new());

        match self.driver.process_event(ServerEvent::ConnectionAccepted {
            session_id: session_id.clone(),
        }) {
            Ok(actions) => {
                self.execute_actions(actions);
                Ok(session_id)
            },
            Err(e) => {
                self.inboxes.remove(&session_id);
                Err(e)
            },
        }
    }

    /// Deliver a message from a client.
    ///
    /// # Errors
    ///
    /// `SessionNotFound` if the connection is not open.
    pub fn send(
        &mut self,
        session_id: &ConnectionId,
        message: ClientMessage,
    ) -> Result<(), DriverError> {
        self.dispatch(ServerEvent::MessageReceived { session_id: session_id.clone(), message })
    }

    /// Deliver a raw text frame, decoding it the way the transport does.
    ///
    /// # Errors
    ///
    /// `SessionNotFound` if the connection is not open.
    pub fn send_raw(&mut self, session_id: &ConnectionId, text: &str) -> Result<(), DriverError> {
        let session_id = session_id.clone();
        let event = match ClientMessage::decode(text) {
            Ok(message) => ServerEvent::MessageReceived { session_id, message },
            Err(e) => ServerEvent::MalformedMessage { session_id, reason: e.to_string() },
        };
        self.dispatch(event)
    }

    /// Close a connection from the client side.
    ///
    /// Undelivered messages are discarded. Closing twice is harmless.
    ///
    /// # Errors
    ///
    /// Propagates driver errors.
    pub fn disconnect(&mut self, session_id: &ConnectionId) -> Result<(), DriverError> {
        self.inboxes.remove(session_id);
        self.departed.insert(session_id.clone());
        self.dispatch(ServerEvent::ConnectionClosed {
            session_id: session_id.clone(),
            reason: "client disconnected".to_string(),
        })
    }

    /// Take every undelivered message for a connection, oldest first.
    pub fn drain(&mut self, session_id: &ConnectionId) -> Vec<ServerMessage> {
        self.inboxes.get_mut(session_id).map(std::mem::take).unwrap_or_default()
    }

    /// Move the virtual clock forward.
    pub fn advance(&mut self, duration: Duration) {
        self.env.advance(duration);
    }

    /// Whether the hub still delivers to this connection.
    pub fn is_open(&self, session_id: &ConnectionId) -> bool {
        self.inboxes.contains_key(session_id)
    }

    /// The wrapped driver.
    pub fn driver(&self) -> &ServerDriver<SimEnv> {
        &self.driver
    }

    /// Connections closed so far.
    pub fn departed(&self) -> &BTreeSet<ConnectionId> {
        &self.departed
    }

    /// Log actions emitted so far.
    pub fn logs(&self) -> &[(LogLevel, String)] {
        &self.logs
    }

    /// Simulation environment.
    pub fn env(&self) -> &SimEnv {
        &self.env
    }

    fn dispatch(&mut self, event: ServerEvent) -> Result<(), DriverError> {
        let actions = self.driver.process_event(event)?;
        self.execute_actions(actions);
        Ok(())
    }

    /// Execute server actions.
    fn execute_actions(&mut self, actions: Vec<ServerAction>) {
        for action in actions {
            match action {
                ServerAction::SendToSession { session_id, message } => {
                    if let Some(message) = wire_round_trip(&message) {
                        match self.inboxes.get_mut(&session_id) {
                            Some(inbox) => inbox.push(message),
                            None => {
                                tracing::warn!("SendToSession: session {session_id} not open");
                            },
                        }
                    }
                },

                ServerAction::Broadcast { message } => {
                    if let Some(message) = wire_round_trip(&message) {
                        for inbox in self.inboxes.values_mut() {
                            inbox.push(message.clone());
                        }
                    }
                },

                ServerAction::CloseConnection { session_id, reason } => {
                    tracing::debug!("closing {session_id}: {reason}");
                    self.inboxes.remove(&session_id);
                    self.departed.insert(session_id);
                },

                ServerAction::Log { level, message } => {
                    forward_log(level, &message);
                    self.logs.push((level, message));
                },
            }
        }
    }
}

fn forward_log(level: LogLevel, message: &str) {
    match level {
        LogLevel::Debug => tracing::debug!("{}", message),
        LogLevel::Info => tracing::info!("{}", message),
        LogLevel::Warn => tracing::warn!("{}", message),
        LogLevel::Error => tracing::error!("{}", message),
    }
}

/// Encode and decode a message as the real transport and client would.
fn wire_round_trip(message: &ServerMessage) -> Option<ServerMessage> {
    match message.encode().and_then(|text| ServerMessage::decode(&text)) {
        Ok(decoded) => Some(decoded),
        Err(e) => {
            tracing::error!("dropping {}: {e}", message.event());
            None
        },
    }
}

impl std::fmt::Debug for SimHub {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SimHub")
            .field("seed", &self.env.seed())
            .field("driver", &self.driver)
            .field("open", &self.inboxes.len())
            .field("departed", &self.departed.len())
            .finish()
    }
}
