//! # TaskHub API Server
//!
//! Serves account management and per-user task endpoints over HTTP.
//!
//! ## Usage
//!
//! ```bash
//! DATABASE_URL=postgresql://localhost/taskhub cargo run -p taskhub-api
//! STORAGE_BACKEND=memory cargo run -p taskhub-api
//! ```

use anyhow::Context;
use taskhub_api::{
    app::{build_router, AppState},
    config::{Config, LogFormat, StorageBackend},
};
use taskhub_shared::db::{
    migrations::{ensure_database_exists, run_migrations},
    pool::{close_pool, create_pool, DatabaseConfig},
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = Config::from_env().context("Failed to load configuration")?;
    init_tracing(config.log_format);

    tracing::info!(
        "TaskHub API Server v{} starting...",
        env!("CARGO_PKG_VERSION")
    );

    let bind_address = config.bind_address();

    let (state, pool) = match config.storage.backend {
        StorageBackend::Memory => {
            tracing::warn!("Using in-memory storage; data is lost on shutdown");
            (AppState::in_memory(config), None)
        }
        StorageBackend::Postgres => {
            let url = config
                .storage
                .database_url
                .clone()
                .context("DATABASE_URL is required for the postgres backend")?;

            ensure_database_exists(&url)
                .await
                .context("Failed to create database")?;

            let pool = create_pool(DatabaseConfig {
                max_connections: config.storage.max_connections,
                min_connections: config.storage.min_connections,
                ..DatabaseConfig::new(url)
            })
            .await
            .context("Failed to connect to database")?;

            run_migrations(&pool)
                .await
                .context("Failed to run migrations")?;

            (AppState::postgres(pool.clone(), config), Some(pool))
        }
    };

    let app = build_router(state);

    let listener = tokio::net::TcpListener::bind(&bind_address)
        .await
        .with_context(|| format!("Failed to bind {}", bind_address))?;
    tracing::info!("Server listening on http://{}", bind_address);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    if let Some(pool) = pool {
        close_pool(pool).await;
    }

    tracing::info!("Shutdown complete");
    Ok(())
}

fn init_tracing(format: LogFormat) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "taskhub_api=debug,taskhub_shared=debug,tower_http=debug".into());

    let registry = tracing_subscriber::registry().with(filter);
    match format {
        LogFormat::Json => registry.with(tracing_subscriber::fmt::layer().json()).init(),
        LogFormat::Pretty => registry.with(tracing_subscriber::fmt::layer()).init(),
    }
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received, draining connections...");
}
