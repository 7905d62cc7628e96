//! sitefeed-server - facility review ingestion service
//!
//! Serves the review API over HTTP, storing reviews in SQLite and
//! transcoded photos under `<root_folder>/uploads`.

use anyhow::{Context, Result};
use clap::Parser;
use std::net::SocketAddr;
use std::path::PathBuf;
use tokio::signal;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use sitefeed_common::config::{self, UPLOADS_DIR};
use sitefeed_common::db::init_database;
use sitefeed_server::services::ImageStore;
use sitefeed_server::{build_router, AppState};

/// Command-line arguments for sitefeed-server
#[derive(Parser, Debug)]
#[command(name = "sitefeed-server")]
#[command(about = "Facility review ingestion service")]
#[command(version)]
struct Args {
    /// Port to listen on (overrides the config file)
    #[arg(short, long, env = "SITEFEED_PORT")]
    port: Option<u16>,

    /// Root folder holding the database and uploaded images
    #[arg(short, long, env = "SITEFEED_ROOT_FOLDER")]
    root_folder: Option<PathBuf>,

    /// Explicit TOML config file
    #[arg(short, long, env = "SITEFEED_CONFIG")]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // The config file supplies the default log level, so read it first and
    // report any failure once tracing is up
    let loaded = config::load_toml_config(args.config.as_deref());
    let default_level = loaded
        .as_ref()
        .map(|c| c.logging.level.clone())
        .unwrap_or_else(|_| "info".to_string());

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default_level.into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!(
        "Starting sitefeed-server v{} [{}] built {} ({})",
        env!("CARGO_PKG_VERSION"),
        env!("GIT_HASH"),
        env!("BUILD_TIMESTAMP"),
        env!("BUILD_PROFILE")
    );

    let mut settings = loaded.context("Failed to load configuration")?;
    if let Some(port) = args.port {
        settings.port = port;
    }

    let root_folder = config::resolve_root_folder(args.root_folder.as_deref(), &settings);
    std::fs::create_dir_all(&root_folder).with_context(|| {
        format!("Failed to create root folder {}", root_folder.display())
    })?;
    info!("Root folder: {}", root_folder.display());

    let db_path = config::database_path(&root_folder, &settings);
    info!("Database path: {}", db_path.display());
    let pool = init_database(&db_path)
        .await
        .context("Failed to initialize database")?;
    info!("✓ Database ready");

    let image_store = ImageStore::open(root_folder.join(UPLOADS_DIR))
        .context("Failed to open image store")?;
    info!("Image store: {}", image_store.root().display());

    let addr: SocketAddr = format!("{}:{}", settings.bind_address, settings.port)
        .parse()
        .with_context(|| format!("Invalid bind address {}", settings.bind_address))?;

    let state = AppState::new(pool.clone(), settings, image_store);
    let app = build_router(state);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .context("Failed to bind to address")?;
    info!("sitefeed-server listening on http://{}", addr);
    info!("Health check: http://{}/health", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    pool.close().await;
    info!("Server shutdown complete");
    Ok(())
}

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to install SIGTERM handler: {}", e);
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
