pub mod auth;
pub mod catalog;
pub mod config;
pub mod content;
pub mod detection;
pub mod error;
pub mod export;
pub mod history;
pub mod imaging;
pub mod inference;
pub mod routes;
pub mod state;
pub mod store;
pub mod upload;

use std::time::Duration;

use anyhow::Context;
use axum::{
    http::{
        header::{AUTHORIZATION, CONTENT_TYPE},
        HeaderValue, Method,
    },
    Router,
};
use tokio::{net::TcpListener, signal};
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use config::Config;
use state::AppState;
use store::Store;

/// All routes with CORS and request tracing applied.
pub fn build_router(state: AppState) -> anyhow::Result<Router> {
    let origin = HeaderValue::from_str(&state.config.server.cors_origin)
        .with_context(|| format!("Invalid CORS origin '{}'", state.config.server.cors_origin))?;

    let cors = CorsLayer::new()
        .allow_origin(origin)
        .allow_credentials(true)
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([CONTENT_TYPE, AUTHORIZATION])
        .max_age(Duration::from_secs(60 * 60));

    Ok(routes::router(state)
        .layer(cors)
        .layer(TraceLayer::new_for_http()))
}

/// Open the database, seed what the configuration asks for and build state.
pub async fn prepare(config: Config) -> anyhow::Result<AppState> {
    let store = Store::open(&config.database.path)?;

    if config.auth.seed_default_users {
        auth::seed_default_users(&store, config.auth.bcrypt_cost).await?;
    }
    if let Err(e) = routes::models::bootstrap(&store, &config.storage).await {
        warn!("Model bootstrap failed: {}", e);
    }

    AppState::new(config, store)
}

pub async fn run() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = Config::load()?;
    let address = config.bind_address();
    info!("Initializing state...");
    let state = prepare(config).await?;
    let app = build_router(state)?;

    let listener = TcpListener::bind(&address)
        .await
        .with_context(|| format!("Failed to bind {}", address))?;
    info!("Server running on {}", address);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Server shut down");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        match signal::ctrl_c().await {
            Ok(()) => info!("Received Ctrl+C, shutting down"),
            Err(e) => {
                error!("Failed to install Ctrl+C handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
                info!("Received terminate signal, shutting down");
            }
            Err(e) => {
                error!("Failed to install terminate handler: {}", e);
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
}
