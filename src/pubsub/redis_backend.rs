//! Redis-backed Pub/Sub node.
//!
//! Commands (PUBLISH, PING, GET/SET for the token cache) share one
//! multiplexed connection. Every subscription opens its own dedicated
//! Pub/Sub connection, since a subscribed connection cannot issue commands.

use async_trait::async_trait;
use futures::StreamExt;
use redis::aio::MultiplexedConnection;
use redis::{AsyncCommands, Client, IntoConnectionInfo, RedisResult};
use tokio::sync::RwLock;

use crate::config::RedisNodeConfig;

use super::backend::{MessageStream, PubSubBackend, PubSubError};

/// A single Redis node used as a Pub/Sub backend
pub struct RedisBackend {
    name: String,
    client: Client,
    connection: RwLock<Option<MultiplexedConnection>>,
}

impl RedisBackend {
    /// Build a backend from a node entry. Does not connect.
    pub fn new(node: &RedisNodeConfig) -> Result<Self, PubSubError> {
        let url = if node.address.contains("://") {
            node.address.clone()
        } else {
            format!("redis://{}", node.address)
        };

        let mut info = url
            .as_str()
            .into_connection_info()
            .map_err(|e| PubSubError::InvalidAddress {
                address: node.address.clone(),
                reason: e.to_string(),
            })?;

        if let Some(password) = node.password.as_ref().filter(|p| !p.is_empty()) {
            info.redis.password = Some(password.clone());
        }

        let client = Client::open(info)?;

        Ok(Self {
            name: node.address.clone(),
            client,
            connection: RwLock::new(None),
        })
    }

    /// Get the shared command connection, connecting on first use
    pub async fn connection(&self) -> Result<MultiplexedConnection, PubSubError> {
        {
            let conn = self.connection.read().await;
            if let Some(ref c) = *conn {
                return Ok(c.clone());
            }
        }

        let mut guard = self.connection.write().await;

        // Double-check in case another task connected while we waited
        if let Some(ref c) = *guard {
            return Ok(c.clone());
        }

        let conn = self.client.get_multiplexed_async_connection().await?;
        *guard = Some(conn.clone());
        tracing::info!(backend = %self.name, "Redis connection established");
        Ok(conn)
    }

    /// Run a command on the shared connection, dropping it on transport errors
    /// so the next call reconnects.
    pub async fn execute<F, T, Fut>(&self, f: F) -> Result<T, PubSubError>
    where
        F: FnOnce(MultiplexedConnection) -> Fut,
        Fut: std::future::Future<Output = RedisResult<T>>,
    {
        let conn = self.connection().await?;

        match f(conn).await {
            Ok(result) => Ok(result),
            Err(e) => {
                if e.is_connection_dropped() || e.is_io_error() {
                    let mut guard = self.connection.write().await;
                    *guard = None;
                    tracing::warn!(backend = %self.name, error = %e, "Redis connection dropped");
                }
                Err(PubSubError::Redis(e))
            }
        }
    }
}

#[async_trait]
impl PubSubBackend for RedisBackend {
    fn name(&self) -> &str {
        &self.name
    }

    async fn publish(&self, channel: &str, payload: &str) -> Result<(), PubSubError> {
        let receivers: i64 = self
            .execute(|mut conn| async move { conn.publish(channel, payload).await })
            .await?;

        tracing::debug!(backend = %self.name, channel = %channel, receivers, "Published message");
        Ok(())
    }

    async fn subscribe(&self, channel: &str) -> Result<MessageStream, PubSubError> {
        let mut pubsub = self.client.get_async_pubsub().await?;
        pubsub.subscribe(channel).await?;

        tracing::debug!(backend = %self.name, channel = %channel, "Subscribed to Redis channel");

        let backend = self.name.clone();
        let stream = pubsub.into_on_message().filter_map(move |msg| {
            let payload = match msg.get_payload::<String>() {
                Ok(p) => Some(p),
                Err(e) => {
                    tracing::warn!(backend = %backend, error = %e, "Failed to get message payload");
                    None
                }
            };
            async move { payload }
        });

        Ok(stream.boxed())
    }

    async fn ping(&self) -> Result<(), PubSubError> {
        let _: String = self
            .execute(|mut conn| async move { redis::cmd("PING").query_async(&mut conn).await })
            .await?;
        Ok(())
    }
}
