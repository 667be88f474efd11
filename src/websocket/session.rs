//! Per-connection control loop logic.

use std::sync::Arc;

use axum::extract::ws::Message;

use crate::connection_manager::ConnectionHandle;
use crate::metrics::WsMessageMetrics;
use crate::relay::Relay;

use super::message::{reply, Action, ClientFrame, SubscriptionMessage};

/// Routes the inbound frames of one connection.
///
/// Every reply goes through the handle's outbound queue, shared with any
/// bridge forwarding to the same connection.
pub struct Session {
    relay: Arc<Relay>,
    handle: Arc<ConnectionHandle>,
}

impl Session {
    pub fn new(relay: Arc<Relay>, handle: Arc<ConnectionHandle>) -> Self {
        Self { relay, handle }
    }

    pub fn handle(&self) -> &Arc<ConnectionHandle> {
        &self.handle
    }

    /// Handle one WebSocket message.
    /// Returns false if the connection should be closed
    pub async fn process_message(&self, msg: Message) -> bool {
        match msg {
            Message::Text(text) => {
                self.handle_frame(text.as_str()).await;
                true
            }
            Message::Binary(data) => {
                match std::str::from_utf8(&data) {
                    Ok(text) => self.handle_frame(text).await,
                    Err(_) => {
                        WsMessageMetrics::record_frame("invalid");
                        self.reply(reply::INVALID_FORMAT).await;
                    }
                }
                true
            }
            // axum replies to pings with pongs itself
            Message::Ping(_) | Message::Pong(_) => true,
            Message::Close(_) => {
                tracing::debug!(connection_id = %self.handle.id, "Received close frame");
                false
            }
        }
    }

    /// Decode one frame and dispatch on its action
    pub async fn handle_frame(&self, text: &str) {
        let frame = match ClientFrame::parse(text) {
            Ok(frame) => frame,
            Err(e) => {
                tracing::warn!(connection_id = %self.handle.id, error = %e, "Failed to parse client message");
                WsMessageMetrics::record_frame("invalid");
                self.reply(reply::INVALID_FORMAT).await;
                return;
            }
        };

        let action = frame.action();
        WsMessageMetrics::record_frame(action.as_str());

        match action {
            Action::Subscribe => self.handle_subscribe(&frame).await,
            Action::Send => self.handle_send(&frame).await,
            Action::Unknown => self.reply(reply::ACTION_MISSING).await,
        }
    }

    #[tracing::instrument(
        name = "ws.subscribe",
        skip(self, frame),
        fields(connection_id = %self.handle.id, channel = ?frame.channel())
    )]
    async fn handle_subscribe(&self, frame: &ClientFrame) {
        let Some(token) = frame.token() else {
            self.reply(reply::INVALID_TOKEN).await;
            return;
        };

        match self.relay.validator().validate(token).await {
            Ok(true) => {}
            Ok(false) => {
                tracing::info!("Token rejected");
                self.reply(reply::VALIDATION_FAILED).await;
                return;
            }
            Err(e) => {
                tracing::warn!(error = %e, "Token validation could not complete");
                self.reply(reply::VALIDATION_FAILED).await;
                return;
            }
        }

        let Some(channel) = frame.channel() else {
            self.reply(reply::CHANNEL_MISSING).await;
            return;
        };

        let bridge = match self.relay.subscribe(&self.handle, channel).await {
            Ok(bridge) => bridge,
            Err(e) => {
                tracing::error!(error = %e, "Failed to subscribe to channel");
                self.reply(reply::SUBSCRIBE_FAILED).await;
                return;
            }
        };

        let confirmation =
            SubscriptionMessage::success(channel, self.relay.ws_url(), self.relay.cache_ttl());
        match serde_json::to_string(&confirmation) {
            Ok(json) => self.reply(json).await,
            Err(e) => tracing::error!(error = %e, "Failed to serialize subscription reply"),
        }

        // Spawned after the confirmation is queued so it precedes any payload
        bridge.spawn();
    }

    #[tracing::instrument(
        name = "ws.send",
        skip(self, frame),
        fields(connection_id = %self.handle.id, channel = ?frame.channel())
    )]
    async fn handle_send(&self, frame: &ClientFrame) {
        let Some(channel) = frame.channel() else {
            self.reply(reply::CHANNEL_MISSING).await;
            return;
        };

        match self.relay.dispatcher().publish(channel, frame.envelope()).await {
            Ok(()) => self.reply(reply::PUBLISH_OK).await,
            Err(e) => {
                tracing::warn!(error = %e, "Publish failed");
                self.reply(reply::PUBLISH_FAILED).await;
            }
        }
    }

    async fn reply(&self, text: impl Into<String>) {
        if self.handle.send(text).await.is_err() {
            tracing::debug!(connection_id = %self.handle.id, "Outbound queue closed, reply dropped");
        }
    }

    /// Stop the session and every bridge attached to the connection
    pub fn close(&self) {
        self.handle.close();
    }
}
