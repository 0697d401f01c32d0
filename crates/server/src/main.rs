//! blobhub server entry point.

use std::net::SocketAddr;
use std::sync::Arc;

use blobhub_api::{AppState, router as api_router};
use blobhub_common::Config;
use blobhub_core::scheduler::{SchedulerConfig, spawn_scheduler};
use tokio::signal;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use tracing::{error, info};
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

/// Waits for a shutdown signal (SIGINT or SIGTERM).
///
/// On Unix systems, this listens for both SIGINT (Ctrl+C) and SIGTERM.
/// On Windows, this only listens for Ctrl+C.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
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
        () = ctrl_c => {
            info!("Received SIGINT, initiating graceful shutdown...");
        },
        () = terminate => {
            info!("Received SIGTERM, initiating graceful shutdown...");
        },
    }
}

fn init_tracing(json: bool) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "blobhub=debug,tower_http=debug".into());
    let registry = tracing_subscriber::registry().with(filter);

    if json {
        registry.with(tracing_subscriber::fmt::layer().json()).init();
    } else {
        registry.with(tracing_subscriber::fmt::layer()).init();
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // A missing .env file is fine
    let _ = dotenvy::dotenv();

    // Load configuration
    let config = Config::load()?;
    init_tracing(config.logging.json);
    info!("Starting blobhub server...");

    // Open the document store; runs migrations for postgres
    let store = blobhub_db::open_store(&config).await?;
    info!(backend = ?config.database.backend, "Document store ready");

    let limits = config.storage.limits();
    info!(
        chunk_size = limits.chunk_size,
        max_file_bytes = limits.max_file_bytes,
        max_user_bytes = limits.max_user_bytes,
        "Storage limits"
    );

    let state = AppState::new(store, limits, &config.archive);

    // Periodic archive maintenance
    let scheduler = SchedulerConfig::from_archive(&config.archive)
        .map(|scheduler_config| {
            spawn_scheduler(scheduler_config, Arc::new(state.archive_service.clone()))
        });
    if scheduler.is_none() {
        info!("Archive scheduler disabled");
    }

    // Build router
    let app = api_router()
        .layer(TraceLayer::new_for_http())
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .with_state(state);

    // Start server with graceful shutdown
    let addr: SocketAddr = format!("{}:{}", config.server.host, config.server.port).parse()?;
    info!("Listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    if let Some(handle) = scheduler {
        handle.abort();
    }
    info!("Server shutdown complete");
    Ok(())
}
