//! Pub/Sub backbone.
//!
//! # Modules
//!
//! - `PubSubBackend`: trait every backend implements
//! - `RedisBackend`: one Redis node
//! - `MemoryBackend`: in-process broadcast, for tests and local runs
//! - `BackendSelector`: policy choosing the single backend that serves a key

mod backend;
mod memory_backend;
mod redis_backend;
mod selection;

use std::sync::Arc;

pub use backend::{MessageStream, PubSubBackend, PubSubError};
pub use memory_backend::MemoryBackend;
pub use redis_backend::RedisBackend;
pub use selection::{BackendSelector, FirstBackend};

use crate::config::RedisConfig;

/// Ordered, independent backends treated as a broadcast fan-out set
#[derive(Clone)]
pub struct BackendSet {
    backends: Vec<Arc<dyn PubSubBackend>>,
    selector: Arc<dyn BackendSelector>,
}

impl BackendSet {
    /// Create a set using the default `FirstBackend` policy
    pub fn new(backends: Vec<Arc<dyn PubSubBackend>>) -> Self {
        Self::with_selector(backends, Arc::new(FirstBackend))
    }

    pub fn with_selector(
        backends: Vec<Arc<dyn PubSubBackend>>,
        selector: Arc<dyn BackendSelector>,
    ) -> Self {
        Self { backends, selector }
    }

    /// Every backend, in configuration order
    pub fn all(&self) -> &[Arc<dyn PubSubBackend>] {
        &self.backends
    }

    /// The one backend that serves `key`
    pub fn select(&self, key: &str) -> Option<&Arc<dyn PubSubBackend>> {
        self.selector
            .select(key, self.backends.len())
            .and_then(|idx| self.backends.get(idx))
    }

    pub fn len(&self) -> usize {
        self.backends.len()
    }

    pub fn is_empty(&self) -> bool {
        self.backends.is_empty()
    }
}

/// Build one `RedisBackend` per configured node and PING each.
///
/// Any unreachable node fails the whole call; the relay does not start
/// with a partial backend set.
pub async fn connect_redis_backends(
    config: &RedisConfig,
) -> Result<Vec<Arc<RedisBackend>>, PubSubError> {
    let mut backends = Vec::with_capacity(config.nodes.len());

    for node in &config.nodes {
        let backend = RedisBackend::new(node)?;
        if let Err(e) = backend.ping().await {
            tracing::error!(backend = %node.address, error = %e, "Failed to connect to Redis node");
            return Err(e);
        }
        tracing::info!(backend = %node.address, "Redis node reachable");
        backends.push(Arc::new(backend));
    }

    Ok(backends)
}
