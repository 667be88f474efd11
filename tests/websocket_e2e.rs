//! End-to-end test: the axum router on an ephemeral port, driven by a real
//! WebSocket client.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use futures::{SinkExt, StreamExt};
use tokio::net::TcpListener;
use tokio_tungstenite::tungstenite::Message;
use tokio_util::sync::CancellationToken;
use tower::ServiceExt;
use wiremock::matchers::{header, method};
use wiremock::{Mock, MockServer, ResponseTemplate};

use channel_relay::auth::{HttpAuthority, MemoryTokenCache, TokenValidator};
use channel_relay::config::Settings;
use channel_relay::pubsub::{BackendSet, MemoryBackend, PubSubBackend};
use channel_relay::relay::Relay;
use channel_relay::server::{create_app, AppState};

type Client = tokio_tungstenite::WebSocketStream<
    tokio_tungstenite::MaybeTlsStream<tokio::net::TcpStream>,
>;

fn build_state(authority_url: String, shutdown: CancellationToken) -> AppState {
    let settings = Settings::default();
    let validator = TokenValidator::new(
        Arc::new(HttpAuthority::new(authority_url, Duration::from_secs(5)).unwrap()),
        Arc::new(MemoryTokenCache::default()),
        Duration::from_secs(300),
    );
    let backend: Arc<dyn PubSubBackend> = Arc::new(MemoryBackend::new("mem"));
    let relay = Arc::new(Relay::new(
        Arc::new(validator),
        BackendSet::new(vec![backend]),
        settings.ws_url(),
    ));

    AppState::new(settings, relay, shutdown)
}

async fn start_server(authority_url: String, shutdown: CancellationToken) -> SocketAddr {
    let app = create_app(build_state(authority_url, shutdown.clone()));
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        axum::serve(listener, app.into_make_service_with_connect_info::<SocketAddr>())
            .with_graceful_shutdown(async move { shutdown.cancelled().await })
            .await
            .unwrap();
    });

    addr
}

async fn connect(addr: SocketAddr) -> Client {
    let (client, _) = tokio_tungstenite::connect_async(format!("ws://{}/ws", addr))
        .await
        .unwrap();
    client
}

async fn next_text(client: &mut Client) -> String {
    loop {
        let msg = tokio::time::timeout(Duration::from_secs(2), client.next())
            .await
            .expect("timed out waiting for frame")
            .expect("connection closed")
            .unwrap();
        if let Message::Text(text) = msg {
            return text.to_string();
        }
    }
}

#[tokio::test]
async fn test_subscribe_and_relay_over_websocket() {
    let authority = MockServer::start().await;
    Mock::given(method("POST"))
        .and(header("authorization", "Bearer T1"))
        .respond_with(ResponseTemplate::new(200))
        .mount(&authority)
        .await;

    let shutdown = CancellationToken::new();
    let addr = start_server(authority.uri(), shutdown.clone()).await;

    let mut subscriber = connect(addr).await;
    subscriber
        .send(Message::text(r#"{"action":"subscribe","token":"T1","channel":"room1"}"#))
        .await
        .unwrap();
    let confirmation: serde_json::Value = serde_json::from_str(&next_text(&mut subscriber).await).unwrap();
    assert_eq!(confirmation["status"], "success");
    assert_eq!(confirmation["channel"], "room1");

    let mut publisher = connect(addr).await;
    publisher
        .send(Message::text(r#"{"action":"send","channel":"room1","message":"hi"}"#))
        .await
        .unwrap();
    assert_eq!(next_text(&mut publisher).await, "Message sent successfully");

    let delivered: serde_json::Value = serde_json::from_str(&next_text(&mut subscriber).await).unwrap();
    assert_eq!(delivered["message"], "hi");

    publisher
        .send(Message::text("definitely not json"))
        .await
        .unwrap();
    assert_eq!(next_text(&mut publisher).await, "Invalid message format");

    shutdown.cancel();
}

#[tokio::test]
async fn test_health_endpoint_reports_backends() {
    let shutdown = CancellationToken::new();
    let addr = start_server("http://127.0.0.1:9/authorize".to_string(), shutdown.clone()).await;

    let body: serde_json::Value = reqwest::get(format!("http://{}/health", addr))
        .await
        .unwrap()
        .json()
        .await
        .unwrap();

    assert_eq!(body["status"], "healthy");
    assert_eq!(body["backends"][0]["name"], "mem");
    assert_eq!(body["backends"][0]["healthy"], true);

    shutdown.cancel();
}

#[tokio::test]
async fn test_stats_route_without_network() {
    let app = create_app(build_state(
        "http://127.0.0.1:9/authorize".to_string(),
        CancellationToken::new(),
    ));

    let response = app
        .oneshot(Request::builder().uri("/stats").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(json["subscriptions"]["subscribed_connections"], 0);
    assert_eq!(json["publishes"]["total_published"], 0);
}
