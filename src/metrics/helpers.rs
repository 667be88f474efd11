//! Metrics helper structs for convenient metric recording

use prometheus::{Encoder, TextEncoder};

use super::{
    AUTHORITY_CALLS, BACKEND_PUBLISH_FAILURES, BRIDGE_MESSAGES_FORWARDED, CONNECTIONS_ACTIVE,
    PUBLISHES_TOTAL, SUBSCRIPTIONS_ACTIVE, TOKEN_CACHE_LOOKUPS, WS_CONNECTIONS_CLOSED,
    WS_CONNECTIONS_OPENED, WS_CONNECTION_DURATION, WS_FRAMES_RECEIVED,
};

/// Encode all metrics to Prometheus text format
pub fn encode_metrics() -> Result<String, prometheus::Error> {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    let mut buffer = Vec::new();
    encoder.encode(&metric_families, &mut buffer)?;
    Ok(String::from_utf8(buffer).unwrap_or_default())
}

/// Helper struct for recording WebSocket metrics
pub struct WsMessageMetrics;

impl WsMessageMetrics {
    pub fn record_opened() {
        WS_CONNECTIONS_OPENED.inc();
        CONNECTIONS_ACTIVE.inc();
    }

    pub fn record_closed(duration_secs: f64) {
        WS_CONNECTIONS_CLOSED.inc();
        CONNECTIONS_ACTIVE.dec();
        WS_CONNECTION_DURATION.observe(duration_secs);
    }

    /// Record a client frame by action (`subscribe`, `send`, `unknown`, `invalid`)
    pub fn record_frame(action: &str) {
        WS_FRAMES_RECEIVED.with_label_values(&[action]).inc();
    }
}

/// Helper struct for recording token validation metrics
pub struct AuthMetrics;

impl AuthMetrics {
    pub fn record_cache_hit() {
        TOKEN_CACHE_LOOKUPS.with_label_values(&["hit"]).inc();
    }

    pub fn record_cache_miss() {
        TOKEN_CACHE_LOOKUPS.with_label_values(&["miss"]).inc();
    }

    /// Record an authority call outcome (`valid`, `invalid`, `error`)
    pub fn record_authority_call(outcome: &str) {
        AUTHORITY_CALLS.with_label_values(&[outcome]).inc();
    }
}

/// Helper struct for recording publish metrics
pub struct PublishMetrics;

impl PublishMetrics {
    pub fn record_outcome(outcome: &str) {
        PUBLISHES_TOTAL.with_label_values(&[outcome]).inc();
    }

    pub fn record_backend_failure(backend: &str) {
        BACKEND_PUBLISH_FAILURES.with_label_values(&[backend]).inc();
    }
}

/// Helper struct for recording channel bridge metrics
pub struct BridgeMetrics;

impl BridgeMetrics {
    pub fn record_started() {
        SUBSCRIPTIONS_ACTIVE.inc();
    }

    pub fn record_stopped() {
        SUBSCRIPTIONS_ACTIVE.dec();
    }

    pub fn record_forwarded() {
        BRIDGE_MESSAGES_FORWARDED.inc();
    }
}
