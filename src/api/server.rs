use std::net::SocketAddr;
use std::sync::Arc;

use axum::{Router, routing::get, routing::post};
use tokio::net::TcpListener;
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::trace::TraceLayer;
use tracing::{error, info, warn};

use super::{
    services::{download, enqueue, enqueue_batch, health, logs, status, upload_cookies},
    state::AppState,
};
use crate::config::Config;
use crate::cookies::CookieStore;
use crate::fetcher::Fetcher;
use crate::pipeline::Pipeline;
use crate::service::JobService;
use crate::storage::StorageClient;
use crate::worker::WorkerConfig;

type AnyError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// All routes of the facade with tracing and the body size limit applied
pub fn router(state: AppState) -> Router {
    let max_body_bytes = state.config.server.max_body_bytes;

    Router::new()
        .route("/health", get(health))
        .route("/download", post(download))
        .route("/queue", post(enqueue))
        .route("/batch", post(enqueue_batch))
        .route("/status", get(status))
        .route("/logs", get(logs))
        .route("/upload-cookies", post(upload_cookies))
        .with_state(state)
        .layer(RequestBodyLimitLayer::new(max_body_bytes))
        .layer(TraceLayer::new_for_http())
}

/// Serve the facade and run the worker until a shutdown signal arrives
///
/// `address` overrides `server.bind_addr`. After the listener stops, the
/// worker gets `server.shutdown_grace_secs` to finish the job in flight.
pub async fn run(config: Config, address: Option<SocketAddr>) -> Result<(), AnyError> {
    let address = address.unwrap_or(config.server.bind_addr);

    let cookies = CookieStore::new(config.fetcher.cookies_path.clone());
    let storage = StorageClient::from_config(&config.storage)?;
    let storage_configured = storage.is_configured();

    let fetcher = Fetcher::from_config(&config, cookies.clone());
    if !fetcher.tool_available() {
        warn!(binary = %config.fetcher.binary, "Downloader not found, every job will fail");
    }
    if !cookies.exists() {
        warn!(path = %cookies.path().display(), "No cookies file, downloads run unauthenticated");
    }

    let pipeline = Pipeline::new(Arc::new(fetcher), Arc::new(storage));
    let (service, worker) = JobService::new(pipeline, WorkerConfig::default());
    let worker = worker.spawn();

    let grace = config.server.shutdown_grace();
    let state = AppState::new(config, service, cookies, storage_configured);
    let app = router(state);

    let listener = TcpListener::bind(address).await?;
    info!(%address, "vidferry listening");

    let served = axum::serve(listener, app.into_make_service())
        .with_graceful_shutdown(shutdown_signal())
        .await;

    worker.shutdown(grace).await;
    served?;

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{SignalKind, signal};
        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    info!("Shutdown signal received");
}
