//! Registry statistics

use serde::Serialize;
use std::collections::HashMap;

/// Snapshot of the connection registry
#[derive(Debug, Clone, Serialize)]
pub struct RegistryStats {
    pub subscribed_connections: usize,
    pub channels: HashMap<String, usize>,
}
