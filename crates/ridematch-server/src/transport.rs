//! WebSocket transport over axum.
//!
//! One TCP listener serves three routes:
//!
//! - `GET /ws` upgrades to a WebSocket carrying JSON text frames
//! - `GET /health` answers `ok`
//! - everything else falls through to an optional static directory (the
//!   browser client), or 404 when none is configured
//!
//! Frames are classified here so the runtime only ever sees decoded
//! [`ClientMessage`]s or a decode error to report back.

use std::{
    net::SocketAddr,
    path::{Path, PathBuf},
    sync::Arc,
};

use axum::{
    Router,
    extract::{
        State, WebSocketUpgrade,
        ws::{Message, Utf8Bytes},
    },
    response::IntoResponse,
    routing::get,
};
use ridematch_proto::{ClientMessage, ProtocolError, ServerMessage};
use tokio::net::TcpListener;
use tower_http::services::ServeDir;

use crate::{RelayState, error::ServerError};

/// TCP listener for the WebSocket endpoint.
pub struct WsTransport {
    listener: TcpListener,
}

impl WsTransport {
    /// Bind a listener.
    ///
    /// # Errors
    ///
    /// `Config` if the address does not parse, `Transport` if binding fails.
    pub async fn bind(address: &str) -> Result<Self, ServerError> {
        let addr: SocketAddr = address
            .parse()
            .map_err(|e| ServerError::Config(format!("invalid bind address '{address}': {e}")))?;

        let listener = TcpListener::bind(addr)
            .await
            .map_err(|e| ServerError::Transport(format!("failed to bind {addr}: {e}")))?;

        Ok(Self { listener })
    }

    /// Local address the listener is bound to.
    ///
    /// # Errors
    ///
    /// `Transport` if the socket cannot report its address.
    pub fn local_addr(&self) -> Result<SocketAddr, ServerError> {
        Ok(self.listener.local_addr()?)
    }

    /// Serve `router` until the listener fails.
    pub(crate) async fn serve(self, router: Router) -> Result<(), ServerError> {
        axum::serve(self.listener, router).await?;
        Ok(())
    }
}

/// What an inbound WebSocket frame means to the runtime.
#[derive(Debug)]
pub(crate) enum Inbound {
    /// A well-formed client message.
    Message(ClientMessage),
    /// A frame that could not be decoded.
    Malformed(ProtocolError),
    /// Control traffic handled by the WebSocket layer itself.
    Ignored,
    /// The peer started the closing handshake.
    Close,
}

/// Classify an inbound frame.
pub(crate) fn decode_frame(frame: Message) -> Inbound {
    match frame {
        Message::Text(text) => match ClientMessage::decode(text.as_str()) {
            Ok(message) => Inbound::Message(message),
            Err(e) => Inbound::Malformed(e),
        },
        Message::Binary(_) => Inbound::Malformed(ProtocolError::BinaryFrame),
        Message::Ping(_) | Message::Pong(_) => Inbound::Ignored,
        Message::Close(_) => Inbound::Close,
    }
}

/// Encode a server message into a text frame body.
///
/// `Utf8Bytes` is reference counted, so one encoded broadcast is shared by
/// every outbound queue.
pub(crate) fn encode(message: &ServerMessage) -> Result<Utf8Bytes, ProtocolError> {
    Ok(Utf8Bytes::from(message.encode()?))
}

/// Build the HTTP router.
pub(crate) fn router(state: Arc<RelayState>, static_dir: Option<&Path>) -> Router {
    let router = Router::new()
        .route("/ws", get(ws_handler))
        .route("/health", get(health_handler))
        .with_state(state);

    match static_dir {
        Some(dir) => router.fallback_service(ServeDir::new(PathBuf::from(dir))),
        None => router,
    }
}

async fn health_handler() -> &'static str {
    "ok"
}

async fn ws_handler(
    ws: WebSocketUpgrade,
    State(state): State<Arc<RelayState>>,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| crate::handle_connection(socket, state))
}
