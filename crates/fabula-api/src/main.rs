//! Fabula API server entry point.

use std::error::Error;
use std::net::SocketAddr;
use std::sync::Arc;

use axum::Router;
use fabula_api::routes;
use fabula_api::state::AppState;
use fabula_core::auth::LocalTokenVerifier;
use fabula_core::clock::{Clock, SystemClock};
use fabula_core::store::ConversationStore;
use fabula_gateway::GatewayConfig;
use fabula_scheduler::{ContinuationScheduler, TaskRegistry};
use fabula_store::{FsMediaStore, MemoryStore, PendingUnitCache};
use tower_http::cors::CorsLayer;
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    // Initialize tracing subscriber.
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .json()
        .init();

    tracing::info!("Starting Fabula API server");

    // Read configuration from environment.
    let host = std::env::var("HOST").unwrap_or_else(|_| "0.0.0.0".to_string());
    let port: u16 = std::env::var("PORT")
        .unwrap_or_else(|_| "3000".to_string())
        .parse()
        .map_err(|e| format!("PORT must be a valid u16: {e}"))?;
    let media_root = std::env::var("MEDIA_ROOT").unwrap_or_else(|_| "./media".to_string());
    let gateway_config = GatewayConfig::from_env().map_err(|e| e.to_string())?;
    tracing::info!(backend = ?gateway_config.backend, "model backend selected");

    // Wire the pipeline.
    let clock: Arc<dyn Clock> = Arc::new(SystemClock);
    let store: Arc<dyn ConversationStore> = Arc::new(MemoryStore::new(Arc::clone(&clock)));
    let media = Arc::new(FsMediaStore::new(media_root.clone()));
    let gateway = gateway_config.build(media.clone());
    let tasks = Arc::new(TaskRegistry::new());
    let scheduler = Arc::new(ContinuationScheduler::new(
        store,
        gateway,
        media,
        Arc::new(PendingUnitCache::new()),
        Arc::clone(&tasks),
        clock,
    ));

    let app_state = AppState::new(scheduler, Arc::new(LocalTokenVerifier), Arc::clone(&tasks));

    // Build router.
    // TODO: Replace CorsLayer::permissive() with restricted origins for production.
    let app = Router::new()
        .merge(routes::health::router())
        .nest(
            "/api/v1/stories",
            routes::stories::router().merge(routes::stream::router()),
        )
        .nest_service("/media", ServeDir::new(&media_root))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(app_state);

    // Start server.
    let addr: SocketAddr = format!("{host}:{port}")
        .parse()
        .map_err(|e| format!("invalid HOST:PORT combination: {e}"))?;
    tracing::info!("Listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    // Let in-flight pre-generation finish before the process exits.
    tasks.shutdown().await;

    Ok(())
}

async fn shutdown_signal() {
    if let Err(error) = tokio::signal::ctrl_c().await {
        tracing::error!(%error, "failed to install shutdown signal handler");
    }
    tracing::info!("Shutdown signal received");
}
