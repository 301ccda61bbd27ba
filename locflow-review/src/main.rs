//! locflow-review - Localization review service
//!
//! Hosts workflow runs that take draft translations through Cultural,
//! Regulatory and Quality review and consolidate the approved segments into
//! one final document. Operators drive runs over HTTP REST + SSE.

use std::net::SocketAddr;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use tokio::signal;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use locflow_common::config::{self, LoggingConfig};
use locflow_common::events::EventBus;
use locflow_review::gateway::AnalysisGateway;
use locflow_review::AppState;

const SERVICE_NAME: &str = "locflow-review";
const DEFAULT_PORT: u16 = 5780;
const EVENT_BUS_CAPACITY: usize = 256;

/// Command-line arguments for locflow-review
#[derive(Parser, Debug)]
#[command(name = "locflow-review")]
#[command(about = "Multi-phase localization review service")]
#[command(version)]
struct Args {
    /// Port to listen on
    #[arg(short, long, env = "LOCFLOW_PORT")]
    port: Option<u16>,

    /// Root folder holding the run database (env: LOCFLOW_ROOT_FOLDER)
    #[arg(short, long)]
    root_folder: Option<PathBuf>,

    /// TOML config file
    #[arg(short, long, env = "LOCFLOW_CONFIG")]
    config: Option<PathBuf>,

    /// Base URL of the AI analysis service
    #[arg(long, env = "LOCFLOW_ANALYSIS_ENDPOINT")]
    analysis_endpoint: Option<String>,

    /// API key for the AI analysis service
    #[arg(long, env = "LOCFLOW_ANALYSIS_API_KEY", hide_env_values = true)]
    analysis_api_key: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let mut toml_config = config::load_service_config(args.config.as_deref(), SERVICE_NAME)
        .context("Failed to load configuration")?;

    init_tracing(&toml_config.logging);

    info!("Starting {} v{}", SERVICE_NAME, env!("CARGO_PKG_VERSION"));

    // CLI/env override the file for the analysis service
    if let Some(endpoint) = args.analysis_endpoint {
        toml_config.analysis.endpoint = Some(endpoint);
    }
    if let Some(api_key) = args.analysis_api_key {
        toml_config.analysis.api_key = Some(api_key);
    }

    let root_folder =
        config::resolve_root_folder(args.root_folder.as_deref(), "LOCFLOW_ROOT_FOLDER", &toml_config);
    config::ensure_root_folder(&root_folder)
        .with_context(|| format!("Failed to initialize root folder {}", root_folder.display()))?;
    info!("Root folder: {}", root_folder.display());

    let db_path = config::database_path(&root_folder);
    info!("Database: {}", db_path.display());
    let db_pool = locflow_review::db::init_database_pool(&db_path)
        .await
        .context("Failed to open database")?;

    let gateway = AnalysisGateway::from_config(&toml_config.analysis);
    let event_bus = EventBus::new(EVENT_BUS_CAPACITY);
    let state = AppState::new(db_pool, event_bus, gateway);

    match state.restore_runs().await {
        Ok(count) => info!("Restored {} workflow run(s)", count),
        Err(e) => warn!(error = %e, "Failed to restore workflow runs, starting empty"),
    }

    let app = locflow_review::build_router(state);

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

/// `RUST_LOG` wins; otherwise the TOML level applies to this service's crates
fn init_tracing(logging: &LoggingConfig) {
    let directive = if logging.level.contains('=') {
        logging.level.clone()
    } else {
        let level = &logging.level;
        format!("locflow_review={level},locflow_common={level},tower_http={level}")
    };

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| directive.into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();
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
            Ok(mut sigterm) => {
                sigterm.recv().await;
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
