//! Connection tracking for WebSocket sessions
//!
//! This module provides:
//! - Connection handles with a single outbound queue and a cancellation token
//! - The registry of which connection is subscribed to which channel

mod registry;
mod stats;
mod types;

pub use registry::{ConnectionRegistry, RegistryEntry};
pub use stats::RegistryStats;
pub use types::{ConnectionHandle, ConnectionId};
