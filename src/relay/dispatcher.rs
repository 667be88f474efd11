use std::sync::atomic::{AtomicU64, Ordering};

use serde::Serialize;
use serde_json::{Map, Value};

use crate::metrics::PublishMetrics;
use crate::pubsub::BackendSet;

/// Error returned by a publish fan-out
#[derive(Debug, thiserror::Error)]
pub enum PublishError {
    #[error("Failed to encode message: {0}")]
    Encode(#[from] serde_json::Error),

    #[error("Publish failed on {failed} of {total} backends")]
    Fanout { failed: usize, total: usize },

    #[error("No backends configured")]
    NoBackends,
}

/// Statistics for the publish dispatcher
#[derive(Debug, Default)]
pub struct DispatcherStats {
    pub total_published: AtomicU64,
    pub total_failed: AtomicU64,
    pub backend_failures: AtomicU64,
}

impl DispatcherStats {
    pub fn snapshot(&self) -> DispatcherStatsSnapshot {
        DispatcherStatsSnapshot {
            total_published: self.total_published.load(Ordering::Relaxed),
            total_failed: self.total_failed.load(Ordering::Relaxed),
            backend_failures: self.backend_failures.load(Ordering::Relaxed),
        }
    }
}

/// Snapshot of dispatcher statistics
#[derive(Debug, Clone, Serialize)]
pub struct DispatcherStatsSnapshot {
    pub total_published: u64,
    pub total_failed: u64,
    pub backend_failures: u64,
}

/// Publishes client `send` envelopes to every backend
pub struct PublishDispatcher {
    backends: BackendSet,
    stats: DispatcherStats,
}

impl PublishDispatcher {
    pub fn new(backends: BackendSet) -> Self {
        Self {
            backends,
            stats: DispatcherStats::default(),
        }
    }

    pub fn stats(&self) -> DispatcherStatsSnapshot {
        self.stats.snapshot()
    }

    /// Serialize the whole envelope and publish it to `channel` on every
    /// backend, one after another.
    ///
    /// Each backend failure is logged on its own. The call fails if any
    /// backend failed; successful publishes are not rolled back.
    #[tracing::instrument(
        name = "dispatcher.publish",
        skip(self, envelope),
        fields(backends = self.backends.len())
    )]
    pub async fn publish(
        &self,
        channel: &str,
        envelope: &Map<String, Value>,
    ) -> Result<(), PublishError> {
        if self.backends.is_empty() {
            PublishMetrics::record_outcome("failure");
            self.stats.total_failed.fetch_add(1, Ordering::Relaxed);
            return Err(PublishError::NoBackends);
        }

        let payload = serde_json::to_string(envelope)?;
        let total = self.backends.len();
        let mut failed = 0;

        for backend in self.backends.all() {
            if let Err(e) = backend.publish(channel, &payload).await {
                failed += 1;
                PublishMetrics::record_backend_failure(backend.name());
                tracing::error!(
                    backend = %backend.name(),
                    channel = %channel,
                    error = %e,
                    "Failed to publish message to backend"
                );
            }
        }

        if failed > 0 {
            PublishMetrics::record_outcome("failure");
            self.stats.total_failed.fetch_add(1, Ordering::Relaxed);
            self.stats
                .backend_failures
                .fetch_add(failed as u64, Ordering::Relaxed);
            return Err(PublishError::Fanout { failed, total });
        }

        PublishMetrics::record_outcome("success");
        self.stats.total_published.fetch_add(1, Ordering::Relaxed);
        tracing::debug!(channel = %channel, bytes = payload.len(), "Message published to all backends");
        Ok(())
    }
}
