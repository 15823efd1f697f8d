//! Tournament points ledger server.
//!
//! Serves the balance and tournament API over HTTP, backed by PostgreSQL or,
//! for local runs, an in-memory store.

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::{Context, Error};
use pico_args::Arguments;
use tourney::db::{Database, MemoryStore, Store};
use tourney::SettlementEngine;
use tourney_server::{
    api,
    config::{Overrides, ServerConfig, StoreBackend},
    logging, metrics,
};

const HELP: &str = "\
Run the tournament points ledger server

USAGE:
  tourney_server [OPTIONS]

OPTIONS:
  --bind       IP:PORT     Server socket bind address  [default: env SERVER_BIND or 127.0.0.1:8080]
  --db-url     URL         Database connection string  [default: env DATABASE_URL]
  --api-path   PATH        Route prefix                [default: env API_PATH or /tournament/v0]

FLAGS:
  --memory                 Keep all state in memory instead of PostgreSQL
  -h, --help               Print help information

ENVIRONMENT:
  SERVER_BIND              Server bind address (e.g., 0.0.0.0:8080)
  DATABASE_URL             PostgreSQL connection string
  MEMORY_STORE             Use the in-memory store when set to true
  CONNECT_ATTEMPTS         Startup connection attempts      [default: 10]
  CONNECT_INTERVAL_SECS    Seconds between attempts         [default: 5]
  TRANSACTION_TIMEOUT_SECS Upper bound for one operation    [default: 10]
  METRICS_BIND             Prometheus scrape address (disabled when unset)
  RUST_LOG                 Log filter
  (See .env file for all configuration options)
";

#[tokio::main]
async fn main() -> Result<(), Error> {
    // Load .env file if it exists
    let _ = dotenvy::dotenv();

    let mut pargs = Arguments::from_env();

    // Help has a higher priority and should be handled separately.
    if pargs.contains(["-h", "--help"]) {
        print!("{HELP}");
        std::process::exit(0);
    }

    let overrides = Overrides {
        bind: pargs
            .opt_value_from_str::<_, SocketAddr>("--bind")
            .context("Invalid --bind address")?,
        database_url: pargs
            .opt_value_from_str("--db-url")
            .context("Invalid --db-url")?,
        api_path: pargs
            .opt_value_from_str("--api-path")
            .context("Invalid --api-path")?,
        memory: pargs.contains("--memory"),
    };

    let config = ServerConfig::from_env(overrides)?;
    config.validate()?;

    logging::init();
    tracing::info!("Starting tournament ledger server at {}", config.bind);

    if let Some(metrics_bind) = config.metrics_bind {
        metrics::init_metrics(metrics_bind).map_err(Error::msg)?;
        tracing::info!("Prometheus metrics exposed on {}", metrics_bind);
    }

    let store: Arc<dyn Store> = match config.backend {
        StoreBackend::Memory => {
            tracing::warn!("Using in-memory store; state is lost on shutdown");
            Arc::new(MemoryStore::new())
        }
        StoreBackend::Postgres => {
            let db = Database::connect_with_retry(&config.database, config.retry)
                .await
                .context("Failed to connect to database")?;
            db.migrate().await.context("Failed to apply migrations")?;
            tracing::info!("Database connected and migrated");
            Arc::new(db.store())
        }
    };

    let engine = SettlementEngine::new(store).with_timeout(config.transaction_timeout);
    let app = api::create_router(api::AppState { engine }, &config.api_path);

    let listener = tokio::net::TcpListener::bind(config.bind)
        .await
        .with_context(|| format!("Failed to bind to {}", config.bind))?;

    tracing::info!(
        "Server is running at http://{}{}. Press Ctrl+C to stop.",
        config.bind,
        config.api_path
    );

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    tracing::info!("Shutting down server...");

    Ok(())
}

/// Graceful shutdown signal
async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for Ctrl+C: {}", e);
        std::future::pending::<()>().await;
    }
}
