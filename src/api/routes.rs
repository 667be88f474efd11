use axum::{routing::get, Router};

use crate::server::AppState;

use super::health::{health, stats};
use super::metrics::prometheus_metrics;

pub fn api_routes(health_path: &str) -> Router<AppState> {
    Router::new()
        .route(health_path, get(health))
        .route("/stats", get(stats))
        .route("/metrics", get(prometheus_metrics))
}
