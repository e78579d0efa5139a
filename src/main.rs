use dotenvy::dotenv;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::signal;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use fuse_review_bot::app_state::build_app_state;
use fuse_review_bot::config::Config;
use fuse_review_bot::routes::router;

/// How long shutdown waits for the worker to finish the job in hand.
const WORKER_DRAIN_TIMEOUT: Duration = Duration::from_secs(10);

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = Config::from_env()?;
    info!(?config, "Loaded configuration");

    let (app_state, worker) = build_app_state(&config)?;
    let worker = tokio::spawn(worker.run());

    let app = router(Arc::new(app_state));

    let listener = TcpListener::bind(&config.bind_addr).await?;
    info!(addr = %config.bind_addr, "Listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    // The router (and every queue handle) is gone now, so the worker exits
    // once it finishes what it is running. Anything left is dropped.
    if tokio::time::timeout(WORKER_DRAIN_TIMEOUT, worker).await.is_err() {
        warn!("Job worker did not stop in time, abandoning queued jobs");
    }
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    info!("Signal received, starting graceful shutdown");
}
