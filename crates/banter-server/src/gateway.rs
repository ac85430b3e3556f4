//! The real-time gateway: one WebSocket per client device.
//!
//! Handshake rules (the authentication gate):
//! - a valid `token` query parameter binds the connection to its
//!   principal, registers the handle, and announces presence;
//! - an invalid token gets an error frame and a forced close (fatal; the
//!   client may reconnect with a fresh credential);
//! - no token leaves the connection open but anonymous: it receives
//!   presence broadcasts only, and sends on it are rejected.
//!
//! Inbound frames are handled strictly in arrival order, which is what
//! yields the per-connection ack-ordering guarantee.

use axum::extract::ws::{Message as WsMessage, WebSocket, WebSocketUpgrade};
use axum::extract::{Query, State};
use axum::response::Response;
use futures::{SinkExt, StreamExt};
use serde::Deserialize;
use tokio::sync::mpsc;
use tracing::{debug, info};

use banter_shared::protocol::{ClientFrame, ServerFrame};
use banter_shared::types::Principal;

use crate::api::AppState;
use crate::auth;
use crate::registry::ConnectionId;
use crate::router::SendRequest;

#[derive(Debug, Deserialize)]
pub struct WsParams {
    /// Optional bearer credential presented in the handshake.
    pub token: Option<String>,
}

pub async fn ws_handler(
    ws: WebSocketUpgrade,
    Query(params): Query<WsParams>,
    State(state): State<AppState>,
) -> Response {
    ws.on_upgrade(move |socket| handle_connection(socket, params.token, state))
}

async fn handle_connection(mut socket: WebSocket, token: Option<String>, state: AppState) {
    let principal: Option<Principal> = match token.as_deref() {
        Some(token) => match auth::verify_token(token, &state.config.jwt_secret) {
            Ok(principal) => Some(principal),
            Err(e) => {
                // Fatal for this connection; not retried server-side.
                let frame = ServerFrame::Error {
                    message: e.to_string(),
                };
                if let Ok(json) = serde_json::to_string(&frame) {
                    let _ = socket.send(WsMessage::Text(json.into())).await;
                }
                let _ = socket.close().await;
                info!("closed connection with invalid credential");
                return;
            }
        },
        None => None,
    };

    let conn_id = ConnectionId::new();
    let (frame_tx, mut frame_rx) = mpsc::unbounded_channel::<ServerFrame>();
    state.links.attach(conn_id, frame_tx).await;

    if let Some(ref p) = principal {
        let came_online = state.registry.register(p.id, conn_id).await;
        info!(user = %p.id, conn = %conn_id, "connection authenticated");
        if came_online {
            state.presence.broadcast_snapshot().await;
        }
    } else {
        debug!(conn = %conn_id, "anonymous connection opened");
    }

    let (mut ws_tx, mut ws_rx) = socket.split();

    // Writer: drain the outbound queue into the socket.
    let mut send_task = tokio::spawn(async move {
        while let Some(frame) = frame_rx.recv().await {
            let json = match serde_json::to_string(&frame) {
                Ok(json) => json,
                Err(e) => {
                    tracing::error!(error = %e, "failed to encode frame");
                    continue;
                }
            };
            if ws_tx.send(WsMessage::Text(json.into())).await.is_err() {
                break;
            }
        }
    });

    // Reader: decode and handle client frames one at a time.
    let reader_state = state.clone();
    let reader_principal = principal.clone();
    let mut recv_task = tokio::spawn(async move {
        while let Some(Ok(msg)) = ws_rx.next().await {
            match msg {
                WsMessage::Text(text) => {
                    let frame = match serde_json::from_str::<ClientFrame>(&text) {
                        Ok(frame) => frame,
                        Err(e) => {
                            debug!(conn = %conn_id, error = %e, "ignoring malformed frame");
                            continue;
                        }
                    };
                    handle_frame(&reader_state, reader_principal.as_ref(), conn_id, frame)
                        .await;
                }
                WsMessage::Close(_) => break,
                _ => {}
            }
        }
    });

    // Whichever side finishes first tears the other down.
    tokio::select! {
        _ = &mut send_task => recv_task.abort(),
        _ = &mut recv_task => send_task.abort(),
    }

    state.links.detach(conn_id).await;
    if let Some(ref p) = principal {
        // None here means another handle of the same principal is still
        // open; presence only changes when the last one closes.
        if state.registry.deregister(conn_id).await.is_some() {
            info!(user = %p.id, conn = %conn_id, "user went offline");
            state.presence.broadcast_snapshot().await;
        } else {
            debug!(user = %p.id, conn = %conn_id, "connection closed");
        }
    }
}

async fn handle_frame(
    state: &AppState,
    principal: Option<&Principal>,
    conn_id: ConnectionId,
    frame: ClientFrame,
) {
    match frame {
        ClientFrame::Send {
            to,
            content,
            file_url,
            file_type,
            client_id,
        } => {
            let request = SendRequest {
                to,
                content,
                file_url,
                file_type,
                client_id,
            };
            let ack = match principal {
                Some(p) => state.router.dispatch(p.id, request).await,
                // Anonymous sends are rejected outright; there is no
                // trusted sender identity to attribute them to.
                None => ServerFrame::ack_failure(request.client_id, "Authentication required"),
            };
            state.links.send_to(conn_id, ack).await;
        }

        ClientFrame::GetPresence => {
            state.presence.send_snapshot_to(conn_id).await;
        }
    }
}
