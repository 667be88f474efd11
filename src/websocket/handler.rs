use std::net::SocketAddr;
use std::sync::Arc;

use axum::{
    extract::{
        ws::{Message, WebSocket},
        ConnectInfo, State, WebSocketUpgrade,
    },
    response::Response,
};
use futures::{SinkExt, StreamExt};
use tokio::sync::mpsc;

use crate::connection_manager::ConnectionHandle;
use crate::metrics::WsMessageMetrics;
use crate::server::AppState;

use super::session::Session;

/// WebSocket upgrade handler
#[tracing::instrument(name = "ws.upgrade", skip(ws, state), fields(remote_addr = %addr))]
pub async fn ws_handler(
    ws: WebSocketUpgrade,
    State(state): State<AppState>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
) -> Response {
    tracing::debug!("WebSocket upgrade requested");
    ws.on_upgrade(move |socket| handle_socket(socket, state, addr))
}

/// Drive an established connection until either side stops
#[tracing::instrument(name = "ws.connection", skip(socket, state))]
async fn handle_socket(socket: WebSocket, state: AppState, addr: SocketAddr) {
    let connection_start = std::time::Instant::now();

    // Single outbound queue: session replies and bridge payloads both land here
    let (tx, mut rx) = mpsc::channel::<String>(state.settings.websocket.outbound_buffer);
    let cancel = state.shutdown.child_token();
    let handle = Arc::new(ConnectionHandle::new(Some(addr), tx, cancel.clone()));
    let connection_id = handle.id;

    WsMessageMetrics::record_opened();
    tracing::info!(connection_id = %connection_id, "WebSocket connection established");

    let (mut ws_sender, mut ws_receiver) = socket.split();

    let writer_cancel = cancel.clone();
    let send_task = tokio::spawn(async move {
        loop {
            tokio::select! {
                _ = writer_cancel.cancelled() => break,
                next = rx.recv() => match next {
                    Some(text) => {
                        if ws_sender.send(Message::Text(text.into())).await.is_err() {
                            break;
                        }
                    }
                    None => break,
                },
            }
        }
        let _ = ws_sender.close().await;
    });

    let session = Session::new(state.relay.clone(), handle.clone());
    let reader_cancel = cancel.clone();
    let recv_task = tokio::spawn(async move {
        loop {
            let result = tokio::select! {
                _ = reader_cancel.cancelled() => break,
                next = ws_receiver.next() => match next {
                    Some(result) => result,
                    None => break,
                },
            };
            match result {
                Ok(msg) => {
                    if !session.process_message(msg).await {
                        break;
                    }
                }
                Err(e) => {
                    tracing::warn!(error = %e, "WebSocket receive error");
                    break;
                }
            }
        }
        session.close();
    });

    tokio::select! {
        _ = send_task => {
            tracing::debug!(connection_id = %connection_id, "Send task completed");
        }
        _ = recv_task => {
            tracing::debug!(connection_id = %connection_id, "Receive task completed");
        }
    }

    // Ends the surviving task and every bridge of this connection
    handle.close();

    let duration = connection_start.elapsed().as_secs_f64();
    WsMessageMetrics::record_closed(duration);

    tracing::info!(
        connection_id = %connection_id,
        connected_at = %handle.connected_at,
        duration_secs = duration,
        "WebSocket connection closed"
    );
}
