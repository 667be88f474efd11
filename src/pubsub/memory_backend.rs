//! In-process Pub/Sub backend.
//!
//! Each channel is a `tokio::sync::broadcast` channel. Slow subscribers that
//! fall behind skip messages, matching the at-most-once delivery of Redis
//! Pub/Sub.

use async_trait::async_trait;
use dashmap::DashMap;
use futures::StreamExt;
use tokio::sync::broadcast;
use tokio_stream::wrappers::errors::BroadcastStreamRecvError;
use tokio_stream::wrappers::BroadcastStream;

use super::backend::{MessageStream, PubSubBackend, PubSubError};

/// Capacity of each channel's broadcast buffer
const CHANNEL_CAPACITY: usize = 256;

/// Single-process backend, used for tests and local development
pub struct MemoryBackend {
    name: String,
    channels: DashMap<String, broadcast::Sender<String>>,
}

impl MemoryBackend {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            channels: DashMap::new(),
        }
    }

    /// Number of live subscriptions on a channel
    pub fn subscriber_count(&self, channel: &str) -> usize {
        self.channels
            .get(channel)
            .map(|tx| tx.receiver_count())
            .unwrap_or(0)
    }

    /// Drop a channel, ending every subscription stream on it
    pub fn close_channel(&self, channel: &str) {
        if self.channels.remove(channel).is_some() {
            tracing::debug!(backend = %self.name, channel = %channel, "Closed in-memory channel");
        }
    }
}

#[async_trait]
impl PubSubBackend for MemoryBackend {
    fn name(&self) -> &str {
        &self.name
    }

    async fn publish(&self, channel: &str, payload: &str) -> Result<(), PubSubError> {
        // Err only means nobody is listening
        let idle = match self.channels.get(channel) {
            Some(tx) => tx.send(payload.to_string()).is_err(),
            None => false,
        };

        // The read guard is gone; drop the sender unless someone subscribed meanwhile
        if idle {
            self.channels
                .remove_if(channel, |_, tx| tx.receiver_count() == 0);
        }
        Ok(())
    }

    async fn subscribe(&self, channel: &str) -> Result<MessageStream, PubSubError> {
        let rx = self
            .channels
            .entry(channel.to_string())
            .or_insert_with(|| broadcast::channel(CHANNEL_CAPACITY).0)
            .subscribe();

        let backend = self.name.clone();
        let stream = BroadcastStream::new(rx).filter_map(move |item| {
            let payload = match item {
                Ok(payload) => Some(payload),
                Err(BroadcastStreamRecvError::Lagged(skipped)) => {
                    tracing::warn!(backend = %backend, skipped, "Subscriber lagged, messages dropped");
                    None
                }
            };
            async move { payload }
        });

        Ok(stream.boxed())
    }

    async fn ping(&self) -> Result<(), PubSubError> {
        Ok(())
    }
}
