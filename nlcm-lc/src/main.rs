//! nlcm-lc (Classifier Lifecycle) - Main entry point
//!
//! Keeps the remote classifier for one training corpus current: polls the
//! classifier service, switches to the newest available classifier, trains a
//! replacement when the corpus changes and deletes superseded classifiers.
//! A small HTTP API exposes status, lifecycle events and corpus appends.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use nlcm_common::events::EventBus;
use nlcm_lc::config::{CliOverrides, LifecycleConfig};
use nlcm_lc::corpus::TrainingCorpus;
use nlcm_lc::reconciler::spawn_reconciler;
use nlcm_lc::service::HttpClassifierService;
use nlcm_lc::{build_router, AppState};
use tokio::signal;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, reload, util::SubscriberInitExt, EnvFilter};

/// Command-line arguments for nlcm-lc
///
/// Environment variables and `nlcm-lc.toml` supply the same settings at
/// lower priority.
#[derive(Parser, Debug)]
#[command(name = "nlcm-lc")]
#[command(about = "Remote text classifier lifecycle manager")]
#[command(version)]
struct Args {
    /// Config file (default: <config dir>/nlcm/nlcm-lc.toml)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Root folder anchoring relative paths
    #[arg(short, long)]
    root_folder: Option<PathBuf>,

    /// Default log level (RUST_LOG overrides)
    #[arg(long)]
    log_level: Option<String>,

    /// Classifier service base URL
    #[arg(long)]
    service_url: Option<String>,

    /// Training corpus file
    #[arg(long)]
    corpus_file: Option<PathBuf>,

    /// Seconds between reconciliation cycles
    #[arg(long)]
    poll_interval_secs: Option<u64>,

    /// HTTP listen address
    #[arg(short, long)]
    bind: Option<SocketAddr>,
}

impl From<Args> for CliOverrides {
    fn from(args: Args) -> Self {
        CliOverrides {
            config_file: args.config,
            root_folder: args.root_folder,
            log_level: args.log_level,
            service_url: args.service_url,
            corpus_file: args.corpus_file,
            poll_interval_secs: args.poll_interval_secs,
            bind: args.bind,
        }
    }
}

const EVENT_BUS_CAPACITY: usize = 100;

#[tokio::main]
async fn main() -> Result<()> {
    let cli: CliOverrides = Args::parse().into();

    // Config loading logs, so tracing starts first with the CLI level and
    // the filter is swapped once the configured level is known.
    let rust_log_set = std::env::var("RUST_LOG").is_ok();
    let early_level = cli.log_level.clone().unwrap_or_else(|| "info".to_string());
    let (filter, filter_handle) = reload::Layer::new(
        EnvFilter::try_from_default_env().unwrap_or_else(|_| log_filter(&early_level)),
    );
    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Build identification first, before any network delays
    info!(
        "Starting nlcm-lc (Classifier Lifecycle) v{} [{}] built {} ({})",
        env!("CARGO_PKG_VERSION"),
        env!("GIT_HASH"),
        env!("BUILD_TIMESTAMP"),
        env!("BUILD_PROFILE")
    );

    let config = match LifecycleConfig::load(&cli) {
        Ok(config) => config,
        Err(e) => {
            error!("Configuration error: {}", e);
            return Err(e.into());
        }
    };
    if !rust_log_set && config.log_level != early_level {
        if let Err(e) = filter_handle.reload(log_filter(&config.log_level)) {
            warn!("Failed to apply log level {:?}: {}", config.log_level, e);
        }
    }

    info!("Root folder: {}", config.root_folder.display());
    info!("Classifier service: {}", config.service.base_url);
    info!(
        "Classifier family: {} (language: {})",
        config.family_name, config.language
    );

    let corpus = Arc::new(TrainingCorpus::new(
        config.corpus_path.clone(),
        config.language.clone(),
    ));
    if !corpus.exists() {
        warn!(
            "Training corpus {} does not exist yet; training waits for the first example",
            corpus.path().display()
        );
    }

    let service = Arc::new(
        HttpClassifierService::new(config.service.clone())
            .context("Failed to create classifier service client")?,
    );

    let event_bus = EventBus::new(EVENT_BUS_CAPACITY);

    let reconciler = spawn_reconciler(
        service,
        Arc::clone(&corpus),
        config.reconciler_settings(),
        event_bus.clone(),
    );

    // Cancelled on the shutdown signal; also stops the reconciler and ends SSE streams
    let shutdown = CancellationToken::new();
    {
        let shutdown = shutdown.clone();
        let reconciler_cancel = reconciler.cancellation_token();
        tokio::spawn(async move {
            shutdown_signal().await;
            reconciler_cancel.cancel();
            shutdown.cancel();
        });
    }

    let state = AppState::new(
        reconciler.subscribe_status(),
        corpus,
        event_bus,
        shutdown.clone(),
    );
    let app = build_router(state);

    let listener = tokio::net::TcpListener::bind(config.bind)
        .await
        .with_context(|| format!("Failed to bind to {}", config.bind))?;
    info!("nlcm-lc listening on http://{}", config.bind);
    info!("Health check: http://{}/health", config.bind);

    let served = axum::serve(listener, app)
        .with_graceful_shutdown(async move { shutdown.cancelled().await })
        .await
        .context("Server error");

    reconciler.shutdown().await;
    info!("Shutdown complete");
    served
}

fn log_filter(level: &str) -> EnvFilter {
    EnvFilter::new(format!("{},tower_http=info", level))
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
            Ok(mut sig) => {
                sig.recv().await;
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
