use std::net::SocketAddr;
use std::path::PathBuf;

use autha_login::config::Configuration;
use opentelemetry::global;
use tokio::net::TcpListener;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, fmt};

#[cfg(feature = "dhat-heap")]
#[global_allocator]
static ALLOC: dhat::Alloc = dhat::Alloc;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    #[cfg(feature = "dhat-heap")]
    let _profiler = dhat::Profiler::new_heap();

    // read configuration file. let it in memory.
    let mut config = Configuration::default();
    if let Ok(path) = std::env::var("CONFIG_PATH") {
        config = config.path(PathBuf::from(path));
    }
    let config = config.read()?;

    // initialize tracing, optionally exported via OTLP.
    let (tracer, logging) = match &config.telemetry.otlp_endpoint {
        Some(endpoint) => {
            let tracer = autha_login::telemetry::setup_tracer(endpoint)?;
            global::set_tracer_provider(tracer.clone());
            (
                Some(tracer),
                Some(autha_login::telemetry::setup_logging(endpoint)?),
            )
        },
        None => (None, None),
    };
    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with(fmt::layer())
        .with(logging)
        .init();

    let metrics = if config.telemetry.metrics {
        Some(autha_login::telemetry::setup_metrics_recorder()?)
    } else {
        None
    };

    let port = config.port;
    let (state, db) = autha_login::initialize_state(config, metrics).await?;
    let app = autha_login::app(state);

    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let listener = TcpListener::bind(addr).await?;
    tracing::info!(%addr, "server started");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    db.close().await;
    if let Some(tracer) = tracer {
        if let Err(err) = tracer.shutdown() {
            tracing::warn!(error = %err, "tracer did not shut down cleanly");
        }
    }

    Ok(())
}

/// Resolve on Ctrl+C or SIGTERM.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %err, "failed to install Ctrl+C handler");
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(
            tokio::signal::unix::SignalKind::terminate(),
        ) {
            Ok(mut signal) => {
                signal.recv().await;
            },
            Err(err) => {
                tracing::error!(error = %err, "failed to install signal handler");
                std::future::pending::<()>().await;
            },
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    tracing::info!("shutting down");
}
