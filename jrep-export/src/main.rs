//! jrep-export - Build log issue report microservice
//!
//! Accepts build-log text, extracts issue references per build, enriches
//! them from the issue tracker and serves the result as a CSV download,
//! streaming progress over SSE while the lookups run.

use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::signal;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use jrep_common::AggregationMode;
use jrep_export::config::{resolve_config, CliOverrides};
use jrep_export::extract::ReferenceExtractor;
use jrep_export::tracker::JiraClient;
use jrep_export::AppState;

#[derive(Parser, Debug)]
#[command(name = "jrep-export")]
#[command(about = "Build log issue report microservice")]
#[command(version)]
struct Args {
    /// TOML configuration file
    #[arg(short, long, env = "JREP_CONFIG")]
    config: Option<PathBuf>,

    /// Address to listen on (overrides config and JREP_BIND)
    #[arg(short, long)]
    bind: Option<String>,

    /// Aggregation mode used when a request does not name one
    #[arg(short, long)]
    mode: Option<AggregationMode>,

    /// Issue key project prefix (e.g. ITSM)
    #[arg(long)]
    prefix: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,jrep_export=debug,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Log build identification immediately after tracing init
    info!(
        "Starting jrep-export v{} [{}] built {} ({})",
        env!("CARGO_PKG_VERSION"),
        env!("GIT_HASH"),
        env!("BUILD_TIMESTAMP"),
        env!("BUILD_PROFILE")
    );

    let args = Args::parse();

    let config = resolve_config(
        args.config.as_deref(),
        &CliOverrides {
            bind: args.bind,
            default_mode: args.mode,
            project_prefix: args.prefix,
        },
    )
    .context("Failed to load configuration")?;

    let extractor = ReferenceExtractor::new(&config.tracker.project_prefix)
        .context("Invalid issue key prefix")?;
    let lookup = JiraClient::new(&config.tracker).context("Failed to create tracker client")?;

    let state = AppState::new(
        extractor,
        Arc::new(lookup),
        config.server.default_mode,
        Duration::from_secs(config.server.report_retention_secs),
    );
    let app = jrep_export::build_router(state);

    let listener = tokio::net::TcpListener::bind(&config.server.bind)
        .await
        .with_context(|| format!("Failed to bind to {}", config.server.bind))?;
    info!("Listening on http://{}", config.server.bind);
    info!("Health check: http://{}/health", config.server.bind);

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
        signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("Failed to install signal handler")
            .recv()
            .await;
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
