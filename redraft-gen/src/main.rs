//! redraft-gen - batch content regeneration service
//!
//! Accepts batches of source documents, rewrites each into several variants
//! through a streaming generation backend, and settles per-item credits.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use redraft_common::config::{
    database_path, default_config_path, load_toml_config, resolve_root_folder, ROOT_FOLDER_ENV,
};
use redraft_common::db::init_database;
use redraft_common::events::EventBus;
use tokio::signal;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use redraft_gen::services::{recover_interrupted_tasks, HttpContentFetcher, StreamingGenerationClient};
use redraft_gen::AppState;

const DEFAULT_PORT: u16 = 5780;

/// Command-line arguments for redraft-gen
#[derive(Parser, Debug)]
#[command(name = "redraft-gen")]
#[command(about = "Batch content regeneration service")]
#[command(version)]
struct Args {
    /// Port to listen on (falls back to TOML `port`, then 5780)
    #[arg(short, long, env = "REDRAFT_PORT")]
    port: Option<u16>,

    /// Root folder holding the database
    #[arg(short, long, env = "REDRAFT_ROOT_FOLDER")]
    root_folder: Option<PathBuf>,

    /// TOML bootstrap config
    #[arg(short, long, env = "REDRAFT_CONFIG")]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let config_path = args.config.clone().unwrap_or_else(default_config_path);
    let toml_config = load_toml_config(&config_path).context("Failed to load configuration")?;

    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(&toml_config.logging.level)),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting redraft-gen v{}", env!("CARGO_PKG_VERSION"));
    if config_path.exists() {
        info!("Config: {}", config_path.display());
    } else {
        warn!("Config file {} not found, using defaults", config_path.display());
    }

    let root_folder = resolve_root_folder(args.root_folder.as_deref(), ROOT_FOLDER_ENV, &toml_config);
    let db_path = database_path(&root_folder);
    info!("Database: {}", db_path.display());

    let db_pool = init_database(&db_path, &toml_config.database)
        .await
        .context("Failed to initialize database")?;

    let api_key = redraft_gen::config::resolve_generation_api_key(&db_pool, &toml_config).await?;
    let generator = Arc::new(
        StreamingGenerationClient::new(&toml_config.generation, api_key)
            .context("Failed to build generation client")?,
    );
    let fetcher = Arc::new(
        HttpContentFetcher::new(&toml_config.fetcher).context("Failed to build content fetcher")?,
    );

    let event_bus = EventBus::new(256);
    let state = AppState::new(db_pool.clone(), event_bus, &toml_config, generator, fetcher)
        .context("Invalid pipeline configuration")?;

    let report = recover_interrupted_tasks(
        &db_pool,
        &state.orchestrator,
        toml_config.pipeline.resume_interrupted,
    )
    .await
    .context("Startup recovery failed")?;
    if report.resumed + report.finalized > 0 {
        info!(
            resumed = report.resumed,
            finalized = report.finalized,
            "Recovered interrupted tasks"
        );
    }

    let app = redraft_gen::build_router(state).layer(TraceLayer::new_for_http());

    let port = args.port.or(toml_config.port).unwrap_or(DEFAULT_PORT);
    let addr = SocketAddr::from(([127, 0, 0, 1], port));
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind to {}", addr))?;
    info!("Listening on http://{}", addr);
    info!("Health check: http://{}/health", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    info!("Server shutdown complete");
    Ok(())
}

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            warn!("Failed to listen for Ctrl+C: {}", e);
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
                warn!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, shutting down");
        },
        _ = terminate => {
            info!("Received terminate signal, shutting down");
        },
    }
}
