//! TISS Claim Engine - API Server Binary
//!
//! # Usage
//!
//! ```bash
//! # Run with default configuration
//! cargo run --bin tiss-api
//!
//! # Run with environment variables
//! API_PORT=8080 API_TISS__XML_OUTPUT_DIR=/var/lib/tiss cargo run --bin tiss-api
//! ```
//!
//! # Environment Variables
//!
//! * `API_HOST` - Server host (default: 0.0.0.0)
//! * `API_PORT` - Server port (default: 8080)
//! * `API_LOG_LEVEL` - Log level: trace, debug, info, warn, error (default: info)
//! * `API_TISS__STANDARD_VERSION` - TISS version rendered (default: 4.02.00)
//! * `API_TISS__SCHEMA_DIR` - Directory with the reference XSD files
//! * `API_TISS__TIMEZONE` - Clinic timezone for header timestamps (default: America/Sao_Paulo)
//! * `API_TISS__XML_OUTPUT_DIR` - Where generated XML is written (default: ./tiss-xml)
//!
//! Clinic and operator master data are read from `config/tiss.toml`.

use std::net::SocketAddr;

use anyhow::Context;
use interface_api::{config::ApiConfig, create_router, AppState};
use tokio::net::TcpListener;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env file if present (useful for local development)
    dotenvy::dotenv().ok();

    let (config, config_error) = match ApiConfig::load() {
        Ok(config) => (config, None),
        Err(e) => (ApiConfig::default(), Some(e)),
    };

    init_tracing(&config.log_level);

    if let Some(e) = config_error {
        tracing::warn!(error = %e, "Configuration could not be loaded, using defaults");
    }

    tracing::info!(
        host = %config.host,
        port = %config.port,
        tiss_version = %config.tiss.standard_version,
        clinics = config.clinics.len(),
        operators = config.operators.len(),
        "Starting TISS API server"
    );

    let addr: SocketAddr = config
        .server_addr()
        .parse()
        .with_context(|| format!("Invalid server address {}", config.server_addr()))?;

    let state = AppState::from_config(config).context("Invalid TISS configuration")?;
    let app = create_router(state);

    tracing::info!(%addr, "Server listening");

    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("Cannot bind {}", addr))?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("Server shutdown complete");
    Ok(())
}

/// Initializes the tracing subscriber for structured logging.
///
/// `RUST_LOG` wins over the configured level.
fn init_tracing(log_level: &str) {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(log_level))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_target(true))
        .init();
}

/// Waits for Ctrl+C or SIGTERM so in-flight requests can complete.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!("Received Ctrl+C, initiating graceful shutdown");
        }
        _ = terminate => {
            tracing::info!("Received SIGTERM, initiating graceful shutdown");
        }
    }
}
