use std::net::SocketAddr;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use axum_server::tls_rustls::RustlsConfig;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;

use channel_relay::auth::{HttpAuthority, RedisTokenCache, TokenValidator};
use channel_relay::config::Settings;
use channel_relay::error::AppError;
use channel_relay::pubsub::{connect_redis_backends, BackendSelector, BackendSet, FirstBackend, PubSubBackend};
use channel_relay::relay::Relay;
use channel_relay::server::{create_app, AppState};
use channel_relay::shutdown::shutdown_signal;
use channel_relay::telemetry::init_tracing;

const TLS_DRAIN_TIMEOUT: Duration = Duration::from_secs(10);

#[tokio::main]
async fn main() -> Result<()> {
    let settings = Settings::new()?;
    init_tracing(&settings.logging)?;
    tracing::info!(environment = %settings.environment, "Configuration loaded");

    // Every node must answer PING before the relay starts
    let redis_backends = connect_redis_backends(&settings.redis).await?;
    tracing::info!(nodes = redis_backends.len(), "Redis backends connected");

    let selector = Arc::new(FirstBackend);
    let cache_node = selector
        .select("token-cache", redis_backends.len())
        .and_then(|idx| redis_backends.get(idx))
        .cloned()
        .ok_or_else(|| AppError::Internal("no Redis node for the token cache".to_string()))?;

    let authority = HttpAuthority::new(settings.authorize.url.clone(), settings.authorize.timeout())?;
    let validator = TokenValidator::new(
        Arc::new(authority),
        Arc::new(RedisTokenCache::new(cache_node)),
        settings.authorize.cache_ttl(),
    );

    let backends = BackendSet::with_selector(
        redis_backends
            .into_iter()
            .map(|b| b as Arc<dyn PubSubBackend>)
            .collect(),
        selector,
    );
    let relay = Arc::new(Relay::new(Arc::new(validator), backends, settings.ws_url()));

    let shutdown = CancellationToken::new();
    tokio::spawn(shutdown_signal(shutdown.clone()));

    let state = AppState::new(settings.clone(), relay, shutdown.clone());
    let app = create_app(state);
    let addr = settings.server_addr();

    if settings.server.tls.enabled {
        let tls = &settings.server.tls;
        for file in [&tls.cert_file, &tls.key_file] {
            if !Path::new(file).exists() {
                return Err(AppError::Tls(format!("file not found: {}", file)).into());
            }
        }

        let rustls = RustlsConfig::from_pem_file(&tls.cert_file, &tls.key_file)
            .await
            .map_err(|e| AppError::Tls(e.to_string()))?;
        let socket_addr: SocketAddr = addr
            .parse()
            .map_err(|e| AppError::Internal(format!("invalid listen address {}: {}", addr, e)))?;

        let handle = axum_server::Handle::new();
        let shutdown_handle = handle.clone();
        let token = shutdown.clone();
        tokio::spawn(async move {
            token.cancelled().await;
            shutdown_handle.graceful_shutdown(Some(TLS_DRAIN_TIMEOUT));
        });

        tracing::info!(ws_url = %settings.ws_url(), "Server listening on {} (TLS)", addr);
        axum_server::bind_rustls(socket_addr, rustls)
            .handle(handle)
            .serve(app.into_make_service_with_connect_info::<SocketAddr>())
            .await?;
    } else {
        let listener = TcpListener::bind(&addr).await?;
        tracing::info!(ws_url = %settings.ws_url(), "Server listening on {}", addr);

        axum::serve(
            listener,
            app.into_make_service_with_connect_info::<SocketAddr>(),
        )
        .with_graceful_shutdown(async move { shutdown.cancelled().await })
        .await?;
    }

    tracing::info!("Server shutdown complete");
    Ok(())
}
