//! hnews-controller - Hacker News filter controller
//!
//! Serves the `HNews` resource API and runs the reconciliation loop that keeps
//! each resource's status in line with the Hacker News top stories.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use hnews_common::config::{RootFolderInitializer, RootFolderResolver, TomlConfig};
use hnews_common::events::EventBus;
use tokio::signal;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use hnews_controller::controller::Controller;
use hnews_controller::hn_client::HackerNewsClient;
use hnews_controller::reconciler::Reconciler;
use hnews_controller::store::{MemoryStore, ResourceStore, SqliteStore};
use hnews_controller::{build_router, AppState};

const MODULE_NAME: &str = "hnews-controller";

/// Command-line arguments for hnews-controller
#[derive(Parser, Debug)]
#[command(name = "hnews-controller")]
#[command(about = "Reconciles HNews filters against the Hacker News top stories")]
#[command(version)]
struct Args {
    /// Port to listen on (overrides [server] port)
    #[arg(short, long, env = "HNEWS_PORT")]
    port: Option<u16>,

    /// Root folder holding hnews.db
    #[arg(short, long)]
    root_folder: Option<PathBuf>,

    /// Keep resources in memory instead of SQLite
    #[arg(long)]
    in_memory: bool,

    /// Hacker News API base URL (overrides [controller] hn_base_url)
    #[arg(long, env = "HNEWS_API_BASE_URL")]
    hn_base_url: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    let mut config = TomlConfig::load(MODULE_NAME);

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| config.logging.level.clone().into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting {} v{}", MODULE_NAME, env!("CARGO_PKG_VERSION"));

    if let Some(port) = args.port {
        config.server.port = port;
    }
    if let Some(url) = args.hn_base_url {
        config.controller.hn_base_url = url;
    }

    let event_bus = EventBus::new(config.controller.event_capacity);

    let store: Arc<dyn ResourceStore> = if args.in_memory {
        info!("Using in-memory resource store");
        Arc::new(MemoryStore::new(event_bus.clone()))
    } else {
        let root_folder = RootFolderResolver::new(MODULE_NAME)
            .with_cli_arg(args.root_folder)
            .resolve();
        let initializer = RootFolderInitializer::new(root_folder);
        initializer
            .ensure_directory_exists()
            .context("Failed to initialize root folder")?;

        let db_path = initializer.database_path();
        if initializer.database_exists() {
            info!("Opening database: {}", db_path.display());
        } else {
            info!("Creating database: {}", db_path.display());
        }

        let pool = hnews_common::db::init_database_pool(&db_path)
            .await
            .context("Failed to open database")?;
        Arc::new(SqliteStore::new(pool, event_bus.clone()))
    };

    let client = HackerNewsClient::from_config(&config.controller)
        .context("Failed to create Hacker News client")?;
    info!("Hacker News API: {}", client.base_url());

    let reconciler = Reconciler::new(store.clone(), Arc::new(client)).with_requeue_after(
        hnews_common::time::secs_to_duration(config.controller.requeue_after_secs),
    );
    let controller = Controller::new(
        Arc::new(reconciler),
        store.clone(),
        event_bus,
        hnews_common::time::secs_to_duration(config.controller.resync_interval_secs),
    );

    let cancel = CancellationToken::new();
    let controller_handle = tokio::spawn(controller.run(cancel.clone()));

    let app = build_router(AppState::new(store));
    let addr: SocketAddr = format!("{}:{}", config.server.bind, config.server.port)
        .parse()
        .context("Invalid [server] bind address")?;

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .context("Failed to bind to address")?;
    info!("Listening on http://{}", addr);
    info!("Health check: http://{}/health", addr);

    let shutdown = cancel.clone();
    let served = axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            shutdown_signal().await;
            shutdown.cancel();
        })
        .await
        .context("Server error");

    // Stop the controller even if the server failed
    cancel.cancel();
    if let Err(e) = controller_handle.await {
        error!("Controller task failed: {}", e);
    }

    served?;
    info!("Shutdown complete");
    Ok(())
}

/// Resolves on Ctrl+C or SIGTERM
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to listen for Ctrl+C: {}", e);
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
                error!("Failed to install SIGTERM handler: {}", e);
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
