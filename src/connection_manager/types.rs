//! Connection handle and related types

use std::net::SocketAddr;

use chrono::{DateTime, Utc};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

/// Identity of one client connection
pub type ConnectionId = Uuid;

/// Handle for a single WebSocket connection.
///
/// Every writer (session replies, channel bridges) goes through `send`,
/// which enqueues onto the connection's single outbound queue.
pub struct ConnectionHandle {
    pub id: ConnectionId,
    /// Diagnostic only
    pub remote_addr: Option<SocketAddr>,
    pub connected_at: DateTime<Utc>,
    sender: mpsc::Sender<String>,
    cancel: CancellationToken,
}

impl ConnectionHandle {
    pub fn new(
        remote_addr: Option<SocketAddr>,
        sender: mpsc::Sender<String>,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            remote_addr,
            connected_at: Utc::now(),
            sender,
            cancel,
        }
    }

    /// Enqueue a text frame for the writer task
    pub async fn send(&self, text: impl Into<String>) -> Result<(), mpsc::error::SendError<String>> {
        self.sender.send(text.into()).await
    }

    /// Token cancelled when the connection closes; bridges run on child tokens
    pub fn cancel_token(&self) -> &CancellationToken {
        &self.cancel
    }

    /// Close the connection's session and every bridge attached to it
    pub fn close(&self) {
        self.cancel.cancel();
    }

    /// Remote address for log fields
    pub fn peer(&self) -> String {
        self.remote_addr
            .map(|a| a.to_string())
            .unwrap_or_else(|| "unknown".to_string())
    }
}
