//! WebSocket session endpoint.
//!
//! The protocol state machine lives in `fabula-scheduler`; this module only
//! adapts an axum WebSocket to its transport seam and runs one session per
//! connection.

use async_trait::async_trait;
use axum::Router;
use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::{Path, State};
use axum::response::Response;
use axum::routing::get;
use fabula_core::error::DomainError;
use fabula_scheduler::session::{ServerMessage, SessionTransport, run_session};
use tracing::{debug, instrument};
use uuid::Uuid;

use crate::state::AppState;

/// `SessionTransport` over an axum WebSocket. Ping/pong frames are handled
/// by axum; binary frames are surfaced as text so the protocol layer rejects
/// them as malformed rather than hanging.
struct WsTransport {
    socket: WebSocket,
}

#[async_trait]
impl SessionTransport for WsTransport {
    async fn recv(&mut self) -> Result<Option<String>, DomainError> {
        loop {
            match self.socket.recv().await {
                Some(Ok(Message::Text(text))) => return Ok(Some(text.to_string())),
                Some(Ok(Message::Binary(bytes))) => {
                    return Ok(Some(String::from_utf8_lossy(&bytes).into_owned()));
                }
                Some(Ok(Message::Ping(_) | Message::Pong(_))) => {}
                Some(Ok(Message::Close(_))) | None => return Ok(None),
                Some(Err(e)) => return Err(DomainError::Storage(e.to_string())),
            }
        }
    }

    async fn send(&mut self, message: &ServerMessage) -> Result<(), DomainError> {
        let json = serde_json::to_string(message)
            .map_err(|e| DomainError::Storage(e.to_string()))?;
        self.socket
            .send(Message::Text(json.into()))
            .await
            .map_err(|e| DomainError::Storage(e.to_string()))
    }
}

/// GET /{id}/stream
#[instrument(skip(state, ws))]
async fn stream(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    ws: WebSocketUpgrade,
) -> Response {
    ws.on_upgrade(move |socket| handle_session(state, id, socket))
}

async fn handle_session(state: AppState, conversation_id: Uuid, socket: WebSocket) {
    let mut transport = WsTransport { socket };
    let outcome = run_session(
        &state.scheduler,
        state.verifier.as_ref(),
        conversation_id,
        &mut transport,
    )
    .await;
    debug!(%conversation_id, ?outcome, "session closed");
    // Best effort; the peer may already be gone.
    let _ = transport.socket.send(Message::Close(None)).await;
}

/// Returns the streaming session router.
pub fn router() -> Router<AppState> {
    Router::new().route("/{id}/stream", get(stream))
}
