//! WebSocket upgrade handler and per-connection event loop.

use axum::extract::ws::{Message, WebSocket};
use axum::extract::{State, WebSocketUpgrade};
use axum::response::IntoResponse;
use axum::routing::get;
use axum::Router;
use battle_common::id::{prefix, prefixed_ulid};
use futures_util::stream::SplitSink;
use futures_util::{SinkExt, StreamExt};
use tokio::sync::mpsc;

use crate::AppState;

use super::events::{ClientMessage, GatewayMessage};
use super::fanout::Outbound;
use super::handler::handle_event;
use super::reconcile::handle_disconnect;

/// Close codes (4000-range for application-level).
pub const CLOSE_INVALID_JSON: u16 = 4000;
pub const CLOSE_UNKNOWN_EVENT: u16 = 4001;
pub const CLOSE_BATTLE_FULL: u16 = 4008;
pub const CLOSE_GOING_AWAY: u16 = 1001;

pub fn router() -> Router<AppState> {
    Router::new().route("/gateway", get(ws_upgrade))
}

async fn ws_upgrade(ws: WebSocketUpgrade, State(state): State<AppState>) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_connection(socket, state))
}

async fn handle_connection(socket: WebSocket, state: AppState) {
    let connection_id = prefixed_ulid(prefix::CONNECTION);
    let outbound = state.hub.register(&connection_id);
    let (mut ws_tx, ws_rx) = socket.split();

    tracing::info!(connection_id = %connection_id, "gateway connection opened");

    let hello = GatewayMessage::connected(&connection_id);
    if send_message(&mut ws_tx, &hello).await.is_ok() {
        run_connection(&state, &connection_id, ws_tx, ws_rx, outbound).await;
    }

    handle_disconnect(&state, &connection_id);

    tracing::info!(connection_id = %connection_id, "gateway connection closed");
}

/// Main event loop: read client events and drain the outbound queue.
async fn run_connection(
    state: &AppState,
    connection_id: &str,
    mut ws_tx: SplitSink<WebSocket, Message>,
    mut ws_rx: futures_util::stream::SplitStream<WebSocket>,
    mut outbound: mpsc::Receiver<Outbound>,
) {
    loop {
        tokio::select! {
            // Client sends us a message.
            msg = ws_rx.next() => {
                match msg {
                    Some(Ok(Message::Text(text))) => {
                        let client_msg: ClientMessage = match serde_json::from_str(&text) {
                            Ok(m) => m,
                            Err(_) => {
                                let _ = send_close(&mut ws_tx, CLOSE_INVALID_JSON, "Invalid JSON").await;
                                break;
                            }
                        };

                        if let Err(reason) = handle_event(state, connection_id, client_msg) {
                            let _ = send_close(&mut ws_tx, CLOSE_UNKNOWN_EVENT, reason).await;
                            break;
                        }
                    }
                    Some(Ok(Message::Ping(_))) | Some(Ok(Message::Pong(_))) => continue,
                    Some(Ok(Message::Close(_))) | None => break,
                    Some(Err(e)) => {
                        tracing::debug!(?e, connection_id = %connection_id, "ws read error");
                        break;
                    }
                    _ => continue,
                }
            }

            // Notification queued by the hub.
            item = outbound.recv() => {
                match item {
                    Some(Outbound::Message(msg)) => {
                        if send_message(&mut ws_tx, &msg).await.is_err() {
                            break;
                        }
                    }
                    Some(Outbound::Close { code, reason }) => {
                        let _ = send_close(&mut ws_tx, code, reason).await;
                        break;
                    }
                    // Evicted by the hub after its queue filled up.
                    None => {
                        tracing::debug!(connection_id = %connection_id, "outbound queue closed");
                        let _ = send_close(&mut ws_tx, CLOSE_GOING_AWAY, "Connection evicted").await;
                        break;
                    }
                }
            }
        }
    }
}

async fn send_message(
    ws_tx: &mut SplitSink<WebSocket, Message>,
    msg: &GatewayMessage,
) -> Result<(), axum::Error> {
    let json = serde_json::to_string(msg).map_err(axum::Error::new)?;
    ws_tx.send(Message::Text(json.into())).await
}

/// Send a WebSocket close frame with a code and reason.
async fn send_close(
    ws_tx: &mut SplitSink<WebSocket, Message>,
    code: u16,
    reason: &str,
) -> Result<(), axum::Error> {
    let close_msg = Message::Close(Some(axum::extract::ws::CloseFrame {
        code,
        reason: reason.to_string().into(),
    }));
    ws_tx.send(close_msg).await
}
