//! Pub/Sub backend trait definition

use async_trait::async_trait;
use futures::stream::BoxStream;

/// Lazy sequence of payloads delivered by a backend subscription.
///
/// The stream ends when the backend drops the subscription.
pub type MessageStream = BoxStream<'static, String>;

/// Error type for backend operations
#[derive(Debug, thiserror::Error)]
pub enum PubSubError {
    /// Redis operation failed
    #[error("Redis error: {0}")]
    Redis(#[from] redis::RedisError),

    /// Backend is not accepting operations
    #[error("Backend unavailable: {0}")]
    Unavailable(String),

    /// Node address could not be turned into connection info
    #[error("Invalid backend address '{address}': {reason}")]
    InvalidAddress { address: String, reason: String },
}

/// One independent publish/subscribe backend
#[async_trait]
pub trait PubSubBackend: Send + Sync {
    /// Human-readable name used in logs and health output
    fn name(&self) -> &str;

    /// Publish a payload to a channel
    async fn publish(&self, channel: &str, payload: &str) -> Result<(), PubSubError>;

    /// Subscribe to a channel and stream every delivered payload
    async fn subscribe(&self, channel: &str) -> Result<MessageStream, PubSubError>;

    /// Check connectivity
    async fn ping(&self) -> Result<(), PubSubError>;
}
