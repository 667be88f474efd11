//! Health check and statistics endpoints.

use std::collections::HashMap;
use std::time::Duration;

use axum::{extract::State, Json};
use futures::future::join_all;
use serde::Serialize;

use crate::metrics;
use crate::relay::DispatcherStatsSnapshot;
use crate::server::AppState;

const PING_TIMEOUT: Duration = Duration::from_secs(2);

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub uptime_seconds: u64,
    pub backends: Vec<BackendHealthResponse>,
    pub connections: i64,
    pub subscriptions: usize,
}

#[derive(Debug, Serialize)]
pub struct BackendHealthResponse {
    pub name: String,
    pub healthy: bool,
}

#[derive(Debug, Serialize)]
pub struct StatsResponse {
    pub subscriptions: SubscriptionStats,
    pub publishes: DispatcherStatsSnapshot,
}

#[derive(Debug, Serialize)]
pub struct SubscriptionStats {
    pub subscribed_connections: usize,
    pub channels: HashMap<String, usize>,
}

pub async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    let backends = state.relay.backends().all();

    let pings = backends.iter().map(|backend| async move {
        let healthy = matches!(
            tokio::time::timeout(PING_TIMEOUT, backend.ping()).await,
            Ok(Ok(()))
        );
        if !healthy {
            tracing::warn!(backend = %backend.name(), "Backend health check failed");
        }
        BackendHealthResponse {
            name: backend.name().to_string(),
            healthy,
        }
    });
    let backends = join_all(pings).await;

    let all_healthy = !backends.is_empty() && backends.iter().all(|b| b.healthy);
    let status = if all_healthy { "healthy" } else { "degraded" };

    Json(HealthResponse {
        status: status.to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        uptime_seconds: state.start_time.elapsed().as_secs(),
        backends,
        connections: metrics::CONNECTIONS_ACTIVE.get(),
        subscriptions: state.relay.registry().len(),
    })
}

pub async fn stats(State(state): State<AppState>) -> Json<StatsResponse> {
    let registry = state.relay.registry().stats();

    Json(StatsResponse {
        subscriptions: SubscriptionStats {
            subscribed_connections: registry.subscribed_connections,
            channels: registry.channels,
        },
        publishes: state.relay.dispatcher().stats(),
    })
}
