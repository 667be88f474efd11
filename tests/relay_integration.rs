//! Relay integration tests
//!
//! Sessions run against the in-memory backend; the authorization service
//! is a wiremock server. No Redis is required.

use std::sync::Arc;
use std::time::Duration;

use futures::StreamExt;
use serde_json::Value;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use channel_relay::auth::{HttpAuthority, MemoryTokenCache, TokenCache, TokenValidator};
use channel_relay::connection_manager::ConnectionHandle;
use channel_relay::pubsub::{BackendSet, MemoryBackend, PubSubBackend};
use channel_relay::relay::Relay;
use channel_relay::websocket::{reply, Session, SubscriptionMessage};

struct TestEnv {
    relay: Arc<Relay>,
    cache: Arc<MemoryTokenCache>,
    backends: Vec<Arc<MemoryBackend>>,
}

impl TestEnv {
    fn connect(&self) -> (Session, mpsc::Receiver<String>) {
        let (tx, rx) = mpsc::channel(32);
        let handle = Arc::new(ConnectionHandle::new(None, tx, CancellationToken::new()));
        (Session::new(self.relay.clone(), handle), rx)
    }
}

fn create_env(authority_url: &str, timeout: Duration, backend_count: usize) -> TestEnv {
    let cache = Arc::new(MemoryTokenCache::default());
    let authority = HttpAuthority::new(authority_url, timeout).unwrap();
    let validator = TokenValidator::new(Arc::new(authority), cache.clone(), Duration::from_secs(300));

    let backends: Vec<Arc<MemoryBackend>> = (0..backend_count)
        .map(|i| Arc::new(MemoryBackend::new(format!("node-{}", i))))
        .collect();
    let set = BackendSet::new(
        backends
            .iter()
            .map(|b| b.clone() as Arc<dyn PubSubBackend>)
            .collect(),
    );

    TestEnv {
        relay: Arc::new(Relay::new(Arc::new(validator), set, "ws://relay.test:8080/ws")),
        cache,
        backends,
    }
}

async fn authority_accepting(token: &str) -> MockServer {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/authorize"))
        .and(header("authorization", format!("Bearer {}", token).as_str()))
        .respond_with(ResponseTemplate::new(200))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/authorize"))
        .respond_with(ResponseTemplate::new(401))
        .mount(&server)
        .await;
    server
}

async fn recv(rx: &mut mpsc::Receiver<String>) -> String {
    tokio::time::timeout(Duration::from_secs(2), rx.recv())
        .await
        .expect("timed out waiting for frame")
        .expect("outbound queue closed")
}

#[tokio::test]
async fn test_subscribe_then_receive_published_envelope() {
    let server = authority_accepting("T1").await;
    let env = create_env(&format!("{}/authorize", server.uri()), Duration::from_secs(5), 1);

    let (subscriber, mut sub_rx) = env.connect();
    subscriber
        .handle_frame(r#"{"action":"subscribe","token":"T1","channel":"room1"}"#)
        .await;

    let confirmation: SubscriptionMessage = serde_json::from_str(&recv(&mut sub_rx).await).unwrap();
    assert_eq!(confirmation.status, "success");
    assert_eq!(confirmation.channel, "room1");
    assert_eq!(confirmation.event, "subscription");
    assert_eq!(confirmation.ws_url, "ws://relay.test:8080/ws");

    let (publisher, mut pub_rx) = env.connect();
    publisher
        .handle_frame(r#"{"action":"send","channel":"room1","message":"hi"}"#)
        .await;
    assert_eq!(recv(&mut pub_rx).await, reply::PUBLISH_OK);

    let delivered: Value = serde_json::from_str(&recv(&mut sub_rx).await).unwrap();
    assert_eq!(delivered["message"], "hi");
    assert_eq!(delivered["action"], "send");
    assert_eq!(delivered["channel"], "room1");
}

#[tokio::test]
async fn test_send_without_subscription_succeeds() {
    let server = MockServer::start().await;
    let env = create_env(&format!("{}/authorize", server.uri()), Duration::from_secs(5), 1);

    let (session, mut rx) = env.connect();
    session.handle_frame(r#"{"action":"send","channel":"room1"}"#).await;

    assert_eq!(recv(&mut rx).await, reply::PUBLISH_OK);
}

#[tokio::test]
async fn test_subscribe_without_token_creates_no_entry() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;
    let env = create_env(&format!("{}/authorize", server.uri()), Duration::from_secs(5), 1);

    let (session, mut rx) = env.connect();
    session.handle_frame(r#"{"action":"subscribe","channel":"room1"}"#).await;

    assert_eq!(recv(&mut rx).await, reply::INVALID_TOKEN);
    assert!(env.relay.registry().is_empty());
}

#[tokio::test]
async fn test_authority_timeout_is_not_cached() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/authorize"))
        .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_secs(2)))
        .mount(&server)
        .await;
    let env = create_env(&format!("{}/authorize", server.uri()), Duration::from_millis(200), 1);

    tokio_test::assert_err!(env.relay.validator().validate("slow-token").await);
    assert_eq!(env.cache.get("slow-token").await.unwrap(), None);

    let (session, mut rx) = env.connect();
    session
        .handle_frame(r#"{"action":"subscribe","token":"slow-token","channel":"room1"}"#)
        .await;
    assert_eq!(recv(&mut rx).await, reply::VALIDATION_FAILED);
    assert!(env.relay.registry().is_empty());
    assert_eq!(env.cache.get("slow-token").await.unwrap(), None);
}

#[tokio::test]
async fn test_authority_called_once_per_token() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/authorize"))
        .and(header("authorization", "Bearer T1"))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&server)
        .await;
    let env = create_env(&format!("{}/authorize", server.uri()), Duration::from_secs(5), 1);

    for _ in 0..5 {
        assert!(env.relay.validator().validate("T1").await.unwrap());
    }
    assert_eq!(env.cache.get("T1").await.unwrap(), Some(true));

    server.verify().await;
}

#[tokio::test]
async fn test_denied_token_is_cached_as_invalid() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(403))
        .expect(1)
        .mount(&server)
        .await;
    let env = create_env(&format!("{}/authorize", server.uri()), Duration::from_secs(5), 1);

    let (session, mut rx) = env.connect();
    for _ in 0..2 {
        session
            .handle_frame(r#"{"action":"subscribe","token":"nope","channel":"room1"}"#)
            .await;
        assert_eq!(recv(&mut rx).await, reply::VALIDATION_FAILED);
    }
    assert_eq!(env.cache.get("nope").await.unwrap(), Some(false));
}

#[tokio::test]
async fn test_send_reaches_every_backend_identically() {
    let server = MockServer::start().await;
    let env = create_env(&format!("{}/authorize", server.uri()), Duration::from_secs(5), 3);

    let mut streams = Vec::new();
    for backend in &env.backends {
        streams.push(backend.subscribe("room1").await.unwrap());
    }

    let (session, mut rx) = env.connect();
    session
        .handle_frame(r#"{"action":"send","channel":"room1","message":"hi","extra":{"n":1}}"#)
        .await;
    assert_eq!(recv(&mut rx).await, reply::PUBLISH_OK);

    let expected = r#"{"action":"send","channel":"room1","extra":{"n":1},"message":"hi"}"#;
    for stream in &mut streams {
        assert_eq!(stream.next().await.as_deref(), Some(expected));
    }
}

#[tokio::test]
async fn test_subscriber_gets_single_copy_with_many_backends() {
    let server = authority_accepting("T1").await;
    let env = create_env(&format!("{}/authorize", server.uri()), Duration::from_secs(5), 3);

    let (subscriber, mut sub_rx) = env.connect();
    subscriber
        .handle_frame(r#"{"action":"subscribe","token":"T1","channel":"room1"}"#)
        .await;
    recv(&mut sub_rx).await;

    let (publisher, mut pub_rx) = env.connect();
    publisher
        .handle_frame(r#"{"action":"send","channel":"room1","message":"once"}"#)
        .await;
    assert_eq!(recv(&mut pub_rx).await, reply::PUBLISH_OK);

    assert!(recv(&mut sub_rx).await.contains("once"));
    let extra = tokio::time::timeout(Duration::from_millis(200), sub_rx.recv()).await;
    assert!(extra.is_err(), "subscriber received a duplicate");
}

#[tokio::test]
async fn test_resubscribe_keeps_one_entry_and_stops_old_channel() {
    let server = authority_accepting("T1").await;
    let env = create_env(&format!("{}/authorize", server.uri()), Duration::from_secs(5), 1);
    let backend = env.backends[0].clone();

    let (session, mut rx) = env.connect();
    session
        .handle_frame(r#"{"action":"subscribe","token":"T1","channel":"room1"}"#)
        .await;
    recv(&mut rx).await;
    session
        .handle_frame(r#"{"action":"subscribe","token":"T1","channel":"room1"}"#)
        .await;
    recv(&mut rx).await;
    assert_eq!(env.relay.registry().len(), 1);

    session
        .handle_frame(r#"{"action":"subscribe","token":"T1","channel":"room2"}"#)
        .await;
    recv(&mut rx).await;
    assert_eq!(env.relay.registry().len(), 1);
    assert_eq!(
        env.relay.registry().channel_of(session.handle().id).as_deref(),
        Some("room2")
    );

    // Old bridges drop their backend subscriptions once cancelled
    tokio::time::timeout(Duration::from_secs(1), async {
        while backend.subscriber_count("room1") > 0 {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .expect("old bridge still subscribed");

    backend.publish("room2", "new").await.unwrap();
    assert_eq!(recv(&mut rx).await, "new");
}

#[tokio::test]
async fn test_close_removes_registry_entry() {
    let server = authority_accepting("T1").await;
    let env = create_env(&format!("{}/authorize", server.uri()), Duration::from_secs(5), 1);

    let (session, mut rx) = env.connect();
    session
        .handle_frame(r#"{"action":"subscribe","token":"T1","channel":"room1"}"#)
        .await;
    recv(&mut rx).await;
    assert_eq!(env.relay.registry().len(), 1);

    session.close();

    tokio::time::timeout(Duration::from_secs(1), async {
        while !env.relay.registry().is_empty() {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .expect("registry entry not released");
}
