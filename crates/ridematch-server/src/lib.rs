//! Ridematch production server.
//!
//! Production server implementation using axum WebSockets for transport,
//! Tokio for the async runtime, and system time with OS randomness.
//!
//! # Architecture
//!
//! The [`ServerDriver`] follows the Sans-IO pattern: it owns all matching
//! state and turns [`ServerEvent`]s into [`ServerAction`]s without touching
//! the network. [`Server`] is the glue that reads frames, feeds the driver,
//! and executes the resulting actions.
//!
//! The driver sits behind one `tokio::sync::Mutex`. Every event is processed
//! and its actions executed before the lock is released, so handlers run to
//! completion one at a time and outbound messages leave in the order the
//! driver produced them.
//!
//! # Components
//!
//! - [`ServerDriver`]: Action-based orchestrator (pure logic, no I/O)
//! - [`Server`]: Production runtime that executes ServerDriver actions
//! - [`WsTransport`]: TCP listener serving the WebSocket endpoint
//! - [`SystemEnv`]: Production environment (real time, crypto RNG)

#![forbid(unsafe_code)]
#![warn(missing_docs)]

mod driver;
mod error;
mod server_error;
mod system_env;
mod transport;

use std::{collections::HashMap, path::PathBuf, sync::Arc};

use axum::extract::ws::{Utf8Bytes, WebSocket};
pub use driver::{DriverConfig, LogLevel, ServerAction, ServerDriver, ServerEvent};
pub use error::ServerError;
use futures::{SinkExt, StreamExt};
use ridematch_core::{ConnectionId, Environment};
use ridematch_proto::ServerMessage;
pub use server_error::{DriverError, ExecutorError};
pub use system_env::SystemEnv;
use tokio::sync::{
    Mutex, RwLock,
    mpsc::{self, error::TrySendError},
};
use transport::Inbound;
pub use transport::WsTransport;

/// Outbound queue feeding one connection's writer task.
type Outbound = mpsc::Sender<Utf8Bytes>;

/// State shared by every connection task.
pub(crate) struct RelayState {
    /// The single driver; its lock serializes all events.
    driver: Mutex<ServerDriver<SystemEnv>>,
    /// Map of session ID to outbound queue
    outbound: RwLock<HashMap<ConnectionId, Outbound>>,
    /// Mints connection ids
    env: SystemEnv,
    /// Capacity of each outbound queue
    outbound_buffer: usize,
}

/// Server configuration for the production runtime.
#[derive(Debug, Clone)]
pub struct ServerRuntimeConfig {
    /// Address to bind to (e.g., "0.0.0.0:3000")
    pub bind_address: String,
    /// Directory of static assets served for non-WebSocket paths
    pub static_dir: Option<PathBuf>,
    /// Messages buffered per connection before new ones are dropped
    pub outbound_buffer: usize,
    /// Driver configuration (limits)
    pub driver: DriverConfig,
}

impl Default for ServerRuntimeConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:3000".to_string(),
            static_dir: None,
            outbound_buffer: 256,
            driver: DriverConfig::default(),
        }
    }
}

/// Production Ridematch server.
///
/// Wraps `ServerDriver` with the WebSocket transport and system environment.
pub struct Server {
    /// Bound listener
    transport: WsTransport,
    /// Routes sharing the relay state
    router: axum::Router,
}

impl Server {
    /// Create and bind a new server.
    ///
    /// # Errors
    ///
    /// `Config` for an invalid address, a zero outbound buffer, or a static
    /// directory that does not exist. `Transport` if the address cannot be
    /// bound.
    pub async fn bind(config: ServerRuntimeConfig) -> Result<Self, ServerError> {
        if config.outbound_buffer == 0 {
            return Err(ServerError::Config("outbound buffer must be at least 1".to_string()));
        }

        if let Some(dir) = config.static_dir.as_ref().filter(|dir| !dir.is_dir()) {
            return Err(ServerError::Config(format!(
                "static directory '{}' does not exist",
                dir.display()
            )));
        }

        let env = SystemEnv::new();
        let state = Arc::new(RelayState {
            driver: Mutex::new(ServerDriver::new(env.clone(), config.driver)),
            outbound: RwLock::new(HashMap::new()),
            env,
            outbound_buffer: config.outbound_buffer,
        });

        let transport = WsTransport::bind(&config.bind_address).await?;
        let router = transport::router(state, config.static_dir.as_deref());

        Ok(Self { transport, router })
    }

    /// Run the server, accepting connections and processing messages.
    ///
    /// This method runs until the listener fails.
    ///
    /// # Errors
    ///
    /// `Transport` if the listener fails.
    pub async fn run(self) -> Result<(), ServerError> {
        tracing::info!("Server starting on {}", self.transport.local_addr()?);
        self.transport.serve(self.router).await
    }

    /// Local address the server is bound to.
    ///
    /// # Errors
    ///
    /// `Transport` if the socket cannot report its address.
    pub fn local_addr(&self) -> Result<std::net::SocketAddr, ServerError> {
        self.transport.local_addr()
    }
}

/// Handle a single WebSocket connection from upgrade to cleanup.
pub(crate) async fn handle_connection(socket: WebSocket, state: Arc<RelayState>) {
    let session_id = state.env.connection_id();
    let (mut sink, mut stream) = socket.split();
    let (tx, mut rx) = mpsc::channel::<Utf8Bytes>(state.outbound_buffer);

    state.outbound.write().await.insert(session_id.clone(), tx);

    // Writer ends when the queue is dropped, which is how CloseConnection
    // and cleanup below shut the socket.
    let mut writer = tokio::spawn(async move {
        while let Some(text) = rx.recv().await {
            if sink.send(axum::extract::ws::Message::Text(text)).await.is_err() {
                break;
            }
        }
        let _ = sink.close().await;
    });

    tracing::debug!(session = %session_id, "websocket upgraded");

    if let Err(e) =
        dispatch(&state, ServerEvent::ConnectionAccepted { session_id: session_id.clone() }).await
    {
        tracing::error!(session = %session_id, "accept failed: {e}");
        state.outbound.write().await.remove(&session_id);
        return;
    }

    let reason = loop {
        tokio::select! {
            frame = stream.next() => match frame {
                Some(Ok(frame)) => {
                    let event = match transport::decode_frame(frame) {
                        Inbound::Message(message) => {
                            ServerEvent::MessageReceived { session_id: session_id.clone(), message }
                        },
                        Inbound::Malformed(e) => ServerEvent::MalformedMessage {
                            session_id: session_id.clone(),
                            reason: e.to_string(),
                        },
                        Inbound::Ignored => continue,
                        Inbound::Close => break "peer closed".to_string(),
                    };

                    if let Err(e) = dispatch(&state, event).await {
                        tracing::warn!(session = %session_id, "message processing error: {e}");
                    }
                },
                Some(Err(e)) => break format!("transport error: {e}"),
                None => break "stream ended".to_string(),
            },
            _ = &mut writer => break "writer stopped".to_string(),
        }
    };

    // Drop the queue first so the closing broadcast skips this session.
    state.outbound.write().await.remove(&session_id);

    if let Err(e) = dispatch(&state, ServerEvent::ConnectionClosed { session_id, reason }).await {
        tracing::error!("close processing error: {e}");
    }

    writer.abort();
}

/// Process one event and execute its actions under the driver lock.
async fn dispatch(state: &RelayState, event: ServerEvent) -> Result<(), ServerError> {
    let mut driver = state.driver.lock().await;
    let actions = driver.process_event(event)?;
    execute_actions(state, actions).await;
    Ok(())
}

/// Execute server actions.
///
/// Delivery is at-most-once: a full or closed queue drops the message with a
/// warning and execution continues.
async fn execute_actions(state: &RelayState, actions: Vec<ServerAction>) {
    for action in actions {
        match action {
            ServerAction::SendToSession { session_id, message } => {
                let text = match encode_frame(&message) {
                    Ok(text) => text,
                    Err(e) => {
                        tracing::error!("skipping {}: {e}", message.event());
                        continue;
                    },
                };

                let outbound = state.outbound.read().await;
                match outbound.get(&session_id) {
                    Some(queue) => {
                        if let Err(e) = enqueue(&session_id, queue, text) {
                            tracing::warn!("SendToSession dropped: {e}");
                        }
                    },
                    None => tracing::warn!("SendToSession: session {session_id} not found"),
                }
            },

            ServerAction::Broadcast { message } => {
                let text = match encode_frame(&message) {
                    Ok(text) => text,
                    Err(e) => {
                        tracing::error!("skipping {}: {e}", message.event());
                        continue;
                    },
                };

                let outbound = state.outbound.read().await;
                for (session_id, queue) in outbound.iter() {
                    if let Err(e) = enqueue(session_id, queue, text.clone()) {
                        tracing::warn!("Broadcast dropped: {e}");
                    }
                }
            },

            ServerAction::CloseConnection { session_id, reason } => {
                tracing::info!("Closing connection {session_id}: {reason}");
                state.outbound.write().await.remove(&session_id);
            },

            ServerAction::Log { level, message } => match level {
                LogLevel::Debug => tracing::debug!("{message}"),
                LogLevel::Info => tracing::info!("{message}"),
                LogLevel::Warn => tracing::warn!("{message}"),
                LogLevel::Error => tracing::error!("{message}"),
            },
        }
    }
}

/// Encode a message for the outbound queues. A failure skips the action.
fn encode_frame(message: &ServerMessage) -> Result<Utf8Bytes, ServerError> {
    Ok(transport::encode(message)?)
}

fn enqueue(
    session_id: &ConnectionId,
    queue: &Outbound,
    text: Utf8Bytes,
) -> Result<(), ExecutorError> {
    queue.try_send(text).map_err(|e| match e {
        TrySendError::Full(_) => ExecutorError::QueueFull(session_id.clone()),
        TrySendError::Closed(_) => ExecutorError::SendFailed {
            session_id: session_id.clone(),
            reason: "writer closed".to_string(),
        },
    })
}

#[cfg(test)]
mod tests {
    use ridematch_proto::{BookingRejection, ProtocolError};

    use super::*;

    #[test]
    fn encoded_frames_are_wire_json() {
        let text =
            encode_frame(&ServerMessage::BookingFailed(BookingRejection::DriverNotFound)).unwrap();
        assert_eq!(text.as_str(), r#"{"event":"bookingFailed","data":"Driver not found."}"#);
    }

    #[test]
    fn encode_failures_surface_as_protocol_errors() {
        let err = ServerError::from(ProtocolError::Malformed("key must be a string".to_string()));
        assert!(matches!(err, ServerError::Protocol(_)));
        assert_eq!(err.to_string(), "protocol error: malformed message: key must be a string");
    }

    #[tokio::test]
    async fn queue_errors_name_the_session() {
        let (tx, rx) = mpsc::channel(1);
        let session = ConnectionId::new("s");

        enqueue(&session, &tx, Utf8Bytes::from_static("a")).unwrap();
        let full = enqueue(&session, &tx, Utf8Bytes::from_static("b")).unwrap_err();
        assert_eq!(full, ExecutorError::QueueFull(session.clone()));

        drop(rx);
        let closed = enqueue(&session, &tx, Utf8Bytes::from_static("c")).unwrap_err();
        assert!(matches!(closed, ExecutorError::SendFailed { .. }));
    }
}
