//! Forwarding from one backend subscription to one connection.

use std::sync::Arc;

use futures::StreamExt;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::connection_manager::{ConnectionHandle, ConnectionRegistry};
use crate::metrics::BridgeMetrics;
use crate::pubsub::MessageStream;

/// Why a bridge stopped forwarding
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BridgeExit {
    /// Connection closed or the subscription was replaced
    Cancelled,
    /// The backend ended the subscription
    StreamEnded,
    /// The connection's outbound queue is gone
    ConnectionGone,
}

/// A subscribed (connection, channel) pair, ready to be spawned.
///
/// Built once the backend subscription exists and the registry entry is
/// written; `spawn` starts forwarding.
pub struct ChannelBridge {
    handle: Arc<ConnectionHandle>,
    registry: Arc<ConnectionRegistry>,
    channel: String,
    subscription_id: Uuid,
    backend: String,
    stream: MessageStream,
    cancel: CancellationToken,
}

impl ChannelBridge {
    pub(crate) fn new(
        handle: Arc<ConnectionHandle>,
        registry: Arc<ConnectionRegistry>,
        channel: String,
        subscription_id: Uuid,
        backend: String,
        stream: MessageStream,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            handle,
            registry,
            channel,
            subscription_id,
            backend,
            stream,
            cancel,
        }
    }

    pub fn channel(&self) -> &str {
        &self.channel
    }

    pub fn subscription_id(&self) -> Uuid {
        self.subscription_id
    }

    /// Run the forward loop as its own task
    pub fn spawn(self) -> JoinHandle<BridgeExit> {
        tokio::spawn(self.run())
    }

    /// Forward payloads verbatim until cancelled or the stream ends, then
    /// release this subscription's registry entry.
    #[tracing::instrument(
        name = "bridge.run",
        skip(self),
        fields(
            connection_id = %self.handle.id,
            channel = %self.channel,
            backend = %self.backend
        )
    )]
    pub async fn run(mut self) -> BridgeExit {
        BridgeMetrics::record_started();
        tracing::info!("Listening for messages on channel");

        let exit = loop {
            tokio::select! {
                biased;
                _ = self.cancel.cancelled() => break BridgeExit::Cancelled,
                next = self.stream.next() => match next {
                    Some(payload) => {
                        tracing::debug!(bytes = payload.len(), "Received message on channel");
                        if self.handle.send(payload).await.is_err() {
                            break BridgeExit::ConnectionGone;
                        }
                        BridgeMetrics::record_forwarded();
                    }
                    None => break BridgeExit::StreamEnded,
                },
            }
        };

        let released = self.registry.release(self.handle.id, self.subscription_id);
        BridgeMetrics::record_stopped();

        tracing::info!(exit = ?exit, released, "Stopped listening on channel");
        exit
    }
}
