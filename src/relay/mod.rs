//! Relay core: subscriptions, bridges and publish fan-out.
//!
//! `Relay` owns the shared components every session uses. There is no
//! process-wide state; everything is reached through an `Arc<Relay>`.

mod bridge;
mod dispatcher;

use std::sync::Arc;
use std::time::Duration;

pub use bridge::{BridgeExit, ChannelBridge};
pub use dispatcher::{DispatcherStatsSnapshot, PublishDispatcher, PublishError};

use crate::auth::TokenValidator;
use crate::connection_manager::{ConnectionHandle, ConnectionRegistry};
use crate::pubsub::{BackendSet, PubSubError};

pub struct Relay {
    validator: Arc<TokenValidator>,
    registry: Arc<ConnectionRegistry>,
    backends: BackendSet,
    dispatcher: PublishDispatcher,
    ws_url: String,
}

impl Relay {
    pub fn new(validator: Arc<TokenValidator>, backends: BackendSet, ws_url: impl Into<String>) -> Self {
        Self {
            validator,
            registry: Arc::new(ConnectionRegistry::new()),
            dispatcher: PublishDispatcher::new(backends.clone()),
            backends,
            ws_url: ws_url.into(),
        }
    }

    pub fn validator(&self) -> &TokenValidator {
        &self.validator
    }

    pub fn registry(&self) -> &Arc<ConnectionRegistry> {
        &self.registry
    }

    pub fn backends(&self) -> &BackendSet {
        &self.backends
    }

    pub fn dispatcher(&self) -> &PublishDispatcher {
        &self.dispatcher
    }

    /// Public WebSocket URL reported in subscription replies
    pub fn ws_url(&self) -> &str {
        &self.ws_url
    }

    /// Lifetime of a cached token verdict, also used for `expires_at`
    pub fn cache_ttl(&self) -> Duration {
        self.validator.ttl()
    }

    /// Subscribe `handle` to `channel` on the backend selected for it.
    ///
    /// The backend subscription is established before the registry entry is
    /// written, so a failure leaves the registry untouched. A previous
    /// subscription of the same connection is cancelled once the new entry
    /// is in place. The returned bridge still has to be spawned.
    #[tracing::instrument(
        name = "relay.subscribe",
        skip(self, handle),
        fields(connection_id = %handle.id)
    )]
    pub async fn subscribe(
        &self,
        handle: &Arc<ConnectionHandle>,
        channel: &str,
    ) -> Result<ChannelBridge, PubSubError> {
        let backend = self
            .backends
            .select(channel)
            .ok_or_else(|| PubSubError::Unavailable("no backend configured".to_string()))?;

        let stream = backend.subscribe(channel).await?;

        let cancel = handle.cancel_token().child_token();
        let (subscription_id, previous) = self.registry.put(handle.id, channel, cancel.clone());

        if let Some(previous) = previous {
            tracing::debug!(
                previous_channel = %previous.channel,
                "Replacing existing subscription"
            );
            previous.cancel();
        }

        tracing::info!(backend = %backend.name(), "Subscribed to channel");

        Ok(ChannelBridge::new(
            handle.clone(),
            self.registry.clone(),
            channel.to_string(),
            subscription_id,
            backend.name().to_string(),
            stream,
            cancel,
        ))
    }
}
