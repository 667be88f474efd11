use std::sync::Arc;
use std::time::Instant;

use tokio_util::sync::CancellationToken;

use crate::config::Settings;
use crate::relay::Relay;

#[derive(Clone)]
pub struct AppState {
    pub settings: Arc<Settings>,
    pub relay: Arc<Relay>,
    /// Root token; every connection runs on a child of it
    pub shutdown: CancellationToken,
    pub start_time: Instant,
}

impl AppState {
    pub fn new(settings: Settings, relay: Arc<Relay>, shutdown: CancellationToken) -> Self {
        Self {
            settings: Arc::new(settings),
            relay,
            shutdown,
            start_time: Instant::now(),
        }
    }
}
