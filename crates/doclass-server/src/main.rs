//! doclass server
//!
//! HTTP service classifying uploaded PDFs with a fused text + page-image
//! model. Artifacts are loaded once at startup; when they are missing the
//! server still starts and reports `model_loaded: false`.

use anyhow::Result;
use clap::Parser;
use doclass_classifiers::ClassifierContext;
use doclass_server::{create_router, AppState, Cli, Commands, ServerConfig};
use metrics_exporter_prometheus::PrometheusHandle;
use std::net::SocketAddr;
use tokio::signal;
use tracing::{error, info, warn};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    init_tracing(cli.verbose);

    let config = ServerConfig::load(&cli.config, &cli)?;
    info!("Configuration loaded from {}", cli.config.display());

    match cli.command {
        Some(Commands::Classify { ref path }) => classify_once(&config, path.clone()).await,
        Some(Commands::Serve) | None => serve(config).await,
    }
}

async fn serve(config: ServerConfig) -> Result<()> {
    info!("Starting doclass server");

    let metrics_handle = init_metrics()?;
    let context = load_context(&config).await?;
    let model_loaded = context.is_ready();

    let state = AppState::new(&config, context, Some(metrics_handle));
    let app = create_router(state);

    let addr: SocketAddr = config.bind_address().parse()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;

    info!("{}", "=".repeat(60));
    info!("doclass ML Classification Service");
    info!("{}", "=".repeat(60));
    info!(
        "Model Status: {}",
        if model_loaded { "Loaded" } else { "Not Loaded" }
    );
    info!("Server: http://{}", addr);
    info!("Health Check: http://{}/health", addr);
    info!("{}", "=".repeat(60));

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            shutdown_signal().await;
            warn!("Shutdown signal received, stopping server...");
        })
        .await?;

    info!("Server shutdown complete");
    Ok(())
}

async fn classify_once(config: &ServerConfig, path: std::path::PathBuf) -> Result<()> {
    let context = load_context(config).await?;

    let result = tokio::task::spawn_blocking(move || context.classify(&path)).await??;
    println!("{}", serde_json::to_string_pretty(&result)?);

    Ok(())
}

/// Load artifacts off the async runtime; failure leaves the context not ready
async fn load_context(config: &ServerConfig) -> Result<ClassifierContext> {
    let classifier_config = config.classifier.clone();
    let context =
        tokio::task::spawn_blocking(move || ClassifierContext::load(&classifier_config)).await?;

    if let Some(reason) = context.failure_reason() {
        warn!("Classifier unavailable: {}", reason);
        warn!(
            "Place {} in the configured locations to enable classification",
            context.required_files().join(" and ")
        );
    }

    Ok(context)
}

/// Listen for shutdown signals (SIGTERM, SIGINT)
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to install Ctrl+C handler: {}", e);
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
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}

/// Initialize tracing/logging
fn init_tracing(verbose: bool) {
    use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

    let filter = if verbose {
        EnvFilter::new("doclass=debug,tower_http=debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("doclass=info"))
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .init();
}

/// Initialize metrics exporter and return handle for rendering
fn init_metrics() -> Result<PrometheusHandle> {
    use metrics_exporter_prometheus::PrometheusBuilder;

    let handle = PrometheusBuilder::new()
        .install_recorder()
        .map_err(|e| anyhow::anyhow!("Failed to install metrics: {}", e))?;

    metrics::describe_counter!(
        "doclass_requests_total",
        "Total number of classification requests received"
    );
    metrics::describe_counter!("doclass_errors_total", "Total number of failed requests by kind");
    metrics::describe_counter!(
        "doclass_degradations_total",
        "Preprocessing fallbacks taken, by stage"
    );
    metrics::describe_histogram!(
        "doclass_classify_latency_us",
        metrics::Unit::Microseconds,
        "Document classification latency in microseconds"
    );

    info!("Metrics exporter initialized");
    Ok(handle)
}
