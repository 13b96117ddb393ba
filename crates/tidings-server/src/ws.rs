//! WebSocket adapter for the push gateway.

use axum::extract::ws::{CloseFrame, Message, Utf8Bytes, WebSocket, WebSocketUpgrade};
use axum::extract::{Path, State};
use axum::response::Response;
use tidings_push::{CloseCode, Inbound, PushError, PushResult, PushTransport};
use tracing::debug;

use crate::state::AppState;

/// `GET /ws/{token}`: upgrade, then hand the socket to the gateway. The
/// token is checked after the upgrade so a refusal can carry a close code.
pub async fn upgrade(
    State(state): State<AppState>,
    Path(token): Path<String>,
    ws: WebSocketUpgrade,
) -> Response {
    ws.on_upgrade(move |socket| async move {
        let end = state.gateway.serve(&token, WsTransport::new(socket)).await;
        debug!(cause = end.cause(), "push session finished");
    })
}

/// Pings are answered by the WebSocket layer itself.
pub struct WsTransport {
    socket: WebSocket,
}

impl WsTransport {
    pub fn new(socket: WebSocket) -> Self {
        Self { socket }
    }
}

impl PushTransport for WsTransport {
    async fn recv(&mut self) -> Option<Result<Inbound, PushError>> {
        let message = match self.socket.recv().await? {
            Ok(message) => message,
            Err(err) => return Some(Err(PushError::Transport(err.to_string()))),
        };
        Some(Ok(match message {
            Message::Text(text) => Inbound::Text(text.as_str().to_owned()),
            Message::Binary(bytes) => Inbound::Binary(bytes.to_vec()),
            Message::Ping(bytes) => Inbound::Ping(bytes.to_vec()),
            Message::Pong(_) => Inbound::Pong,
            Message::Close(_) => Inbound::Close,
        }))
    }

    async fn send_text(&mut self, payload: String) -> PushResult<()> {
        self.socket
            .send(Message::Text(payload.into()))
            .await
            .map_err(|err| PushError::Transport(err.to_string()))
    }

    async fn close(&mut self, code: CloseCode, reason: &'static str) {
        let frame = CloseFrame {
            code: code.as_u16(),
            reason: Utf8Bytes::from_static(reason),
        };
        if let Err(err) = self.socket.send(Message::Close(Some(frame))).await {
            debug!(error = %err, "close frame not delivered");
        }
    }
}
