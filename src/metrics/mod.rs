//! Prometheus metrics for the relay.
//!
//! - Connection metrics (opened, closed, active, duration)
//! - Subscription metrics (active bridges, forwarded messages)
//! - Authorization metrics (cache hits/misses, authority call outcomes)
//! - Publish metrics (fan-out outcomes, per-backend failures)

mod helpers;

pub use helpers::{encode_metrics, AuthMetrics, BridgeMetrics, PublishMetrics, WsMessageMetrics};

use lazy_static::lazy_static;
use prometheus::{
    register_histogram, register_int_counter, register_int_counter_vec, register_int_gauge,
    Histogram, IntCounter, IntCounterVec, IntGauge,
};

/// Prefix for all metrics
const METRIC_PREFIX: &str = "relay";

lazy_static! {
    // ============================================================================
    // Connection Metrics
    // ============================================================================

    /// Number of open WebSocket connections
    pub static ref CONNECTIONS_ACTIVE: IntGauge = register_int_gauge!(
        format!("{}_connections_active", METRIC_PREFIX),
        "Number of open WebSocket connections"
    ).unwrap();

    /// Total WebSocket connections opened
    pub static ref WS_CONNECTIONS_OPENED: IntCounter = register_int_counter!(
        format!("{}_ws_connections_opened_total", METRIC_PREFIX),
        "Total WebSocket connections opened"
    ).unwrap();

    /// Total WebSocket connections closed
    pub static ref WS_CONNECTIONS_CLOSED: IntCounter = register_int_counter!(
        format!("{}_ws_connections_closed_total", METRIC_PREFIX),
        "Total WebSocket connections closed"
    ).unwrap();

    /// WebSocket connection duration
    pub static ref WS_CONNECTION_DURATION: Histogram = register_histogram!(
        format!("{}_ws_connection_duration_seconds", METRIC_PREFIX),
        "WebSocket connection duration in seconds",
        vec![1.0, 10.0, 60.0, 300.0, 900.0, 3600.0, 14400.0]
    ).unwrap();

    /// Frames received from clients by action
    pub static ref WS_FRAMES_RECEIVED: IntCounterVec = register_int_counter_vec!(
        format!("{}_ws_frames_received_total", METRIC_PREFIX),
        "Total client frames received by action",
        &["action"]
    ).unwrap();

    // ============================================================================
    // Subscription Metrics
    // ============================================================================

    /// Number of running channel bridges
    pub static ref SUBSCRIPTIONS_ACTIVE: IntGauge = register_int_gauge!(
        format!("{}_subscriptions_active", METRIC_PREFIX),
        "Number of running channel bridges"
    ).unwrap();

    /// Payloads forwarded from backends to clients
    pub static ref BRIDGE_MESSAGES_FORWARDED: IntCounter = register_int_counter!(
        format!("{}_bridge_messages_forwarded_total", METRIC_PREFIX),
        "Total backend payloads forwarded to clients"
    ).unwrap();

    // ============================================================================
    // Authorization Metrics
    // ============================================================================

    /// Token cache lookups by result
    pub static ref TOKEN_CACHE_LOOKUPS: IntCounterVec = register_int_counter_vec!(
        format!("{}_token_cache_lookups_total", METRIC_PREFIX),
        "Token cache lookups by result",
        &["result"]
    ).unwrap();

    /// Authorization service calls by outcome
    pub static ref AUTHORITY_CALLS: IntCounterVec = register_int_counter_vec!(
        format!("{}_authority_calls_total", METRIC_PREFIX),
        "Authorization service calls by outcome",
        &["outcome"]
    ).unwrap();

    // ============================================================================
    // Publish Metrics
    // ============================================================================

    /// Publish requests by outcome
    pub static ref PUBLISHES_TOTAL: IntCounterVec = register_int_counter_vec!(
        format!("{}_publishes_total", METRIC_PREFIX),
        "Publish requests by outcome",
        &["outcome"]
    ).unwrap();

    /// Per-backend publish failures
    pub static ref BACKEND_PUBLISH_FAILURES: IntCounterVec = register_int_counter_vec!(
        format!("{}_backend_publish_failures_total", METRIC_PREFIX),
        "Publish failures by backend",
        &["backend"]
    ).unwrap();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encode_metrics() {
        // lazy_static registers on first access
        CONNECTIONS_ACTIVE.set(1);

        let output = encode_metrics().unwrap();
        assert!(output.contains("relay_connections_active"));
    }

    #[test]
    fn test_helpers_do_not_panic() {
        WsMessageMetrics::record_frame("subscribe");
        AuthMetrics::record_cache_hit();
        AuthMetrics::record_cache_miss();
        AuthMetrics::record_authority_call("valid");
        PublishMetrics::record_outcome("success");
        PublishMetrics::record_backend_failure("localhost:6379");
        BridgeMetrics::record_started();
        BridgeMetrics::record_forwarded();
        BridgeMetrics::record_stopped();
    }
}
