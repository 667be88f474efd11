//! Process shutdown signal.

use tokio::signal;
use tokio_util::sync::CancellationToken;

/// Wait for Ctrl-C or SIGTERM, then cancel `token`.
///
/// Every connection runs on a child of `token`, so cancelling it ends all
/// session loops and bridges.
pub async fn shutdown_signal(token: CancellationToken) {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("Failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!("Received Ctrl+C, initiating graceful shutdown");
        }
        _ = terminate => {
            tracing::info!("Received terminate signal, initiating graceful shutdown");
        }
        _ = token.cancelled() => {}
    }

    token.cancel();
}
