use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};

use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use super::stats::RegistryStats;
use super::types::ConnectionId;

/// The current subscription of one connection
#[derive(Debug, Clone)]
pub struct RegistryEntry {
    pub channel: String,
    /// Distinguishes successive subscriptions of the same connection
    pub subscription_id: Uuid,
    cancel: CancellationToken,
}

impl RegistryEntry {
    /// Stop the bridge serving this subscription
    pub fn cancel(&self) {
        self.cancel.cancel();
    }
}

/// Maps each subscribed connection to its channel.
///
/// A single mutex serializes inserts, removals and iteration. Entries are
/// written by the subscribe path and released by the bridge that serves them.
#[derive(Default)]
pub struct ConnectionRegistry {
    entries: Mutex<HashMap<ConnectionId, RegistryEntry>>,
}

impl ConnectionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<ConnectionId, RegistryEntry>> {
        // No code path panics while holding the lock, but never propagate poison
        self.entries.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Record `channel` as the connection's subscription.
    ///
    /// Overwrites any previous entry and returns it so the caller can stop
    /// the bridge that served it.
    pub fn put(
        &self,
        connection_id: ConnectionId,
        channel: &str,
        cancel: CancellationToken,
    ) -> (Uuid, Option<RegistryEntry>) {
        let subscription_id = Uuid::new_v4();
        let entry = RegistryEntry {
            channel: channel.to_string(),
            subscription_id,
            cancel,
        };

        let previous = self.lock().insert(connection_id, entry);

        tracing::debug!(
            connection_id = %connection_id,
            channel = %channel,
            replaced = previous.is_some(),
            "Registry entry written"
        );

        (subscription_id, previous)
    }

    /// Remove the connection's entry regardless of which subscription owns it
    pub fn remove(&self, connection_id: ConnectionId) -> Option<RegistryEntry> {
        self.lock().remove(&connection_id)
    }

    /// Remove the entry only if it still belongs to `subscription_id`.
    ///
    /// A bridge replaced by a newer subscription must not clear the newer entry.
    pub fn release(&self, connection_id: ConnectionId, subscription_id: Uuid) -> bool {
        let mut entries = self.lock();
        match entries.get(&connection_id) {
            Some(entry) if entry.subscription_id == subscription_id => {
                entries.remove(&connection_id);
                true
            }
            _ => false,
        }
    }

    /// Channel the connection is currently subscribed to
    pub fn channel_of(&self, connection_id: ConnectionId) -> Option<String> {
        self.lock().get(&connection_id).map(|e| e.channel.clone())
    }

    pub fn contains(&self, connection_id: ConnectionId) -> bool {
        self.lock().contains_key(&connection_id)
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    /// Subscriber counts per channel
    pub fn stats(&self) -> RegistryStats {
        let entries = self.lock();
        let mut channels = HashMap::new();
        for entry in entries.values() {
            *channels.entry(entry.channel.clone()).or_insert(0) += 1;
        }

        RegistryStats {
            subscribed_connections: entries.len(),
            channels,
        }
    }
}
