//! E-Klaim Gateway - API Server Binary
//!
//! # Usage
//!
//! ```bash
//! # Run with default configuration
//! cargo run --bin eklaim-gateway
//!
//! # Run with environment variables
//! API_PORT=8080 API_DATABASE_URL=postgres://... cargo run --bin eklaim-gateway
//! ```
//!
//! # Environment Variables
//!
//! * `API_HOST` - Server host (default: 0.0.0.0)
//! * `API_PORT` - Server port (default: 8080)
//! * `API_JWT_SECRET` - JWT signing secret (required in production)
//! * `API_DATABASE_URL` - PostgreSQL connection string
//! * `API_LOG_LEVEL` - Log level: trace, debug, info, warn, error (default: info)
//! * `API_LOG_FORMAT` - `pretty` or `json` (default: pretty)
//! * `API_EKLAIM_HTTP_TIMEOUT_SECS` - Per-attempt timeout towards E-Klaim (default: 30)
//! * `API_EKLAIM_CALL_TIMEOUT_SECS` - Whole-call timeout including retries (default: 150)
//! * `API_AUDIT_PRUNE_INTERVAL_SECS` - Audit retention cadence (default: 86400)

use anyhow::Context;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use domain_claims::{AuditWriter, ClaimGateway};
use infra_db::{create_pool, run_migrations, DatabaseConfig, PgAuditRepository, PgClaimRepository, PgConfigRepository};
use infra_eklaim::{HttpConfig, RateLimiterRegistry, ResilientClient};
use interface_api::config::{ApiConfig, LogFormat};
use interface_api::retention::spawn_audit_retention;
use interface_api::{create_router, AppState};

/// Main entry point for the API server.
///
/// Initializes logging, loads configuration, connects and migrates the
/// database, and serves until Ctrl+C or SIGTERM. Queued audit entries are
/// flushed before the process exits.
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env file if present (useful for local development)
    dotenvy::dotenv().ok();

    let config = ApiConfig::from_env().context("loading API_* configuration")?;

    init_tracing(&config.log_level, config.log_format);

    tracing::info!(
        host = %config.host,
        port = %config.port,
        "Starting E-Klaim gateway"
    );

    let pool = create_pool(
        DatabaseConfig::new(config.database_url.clone()).max_connections(config.database_max_connections),
    )
    .await?;
    run_migrations(&pool).await?;

    let http = HttpConfig::default().with_timeout(config.eklaim_http_timeout());
    let client = ResilientClient::from_http_config(&http, RateLimiterRegistry::new())
        .context("building E-Klaim HTTP client")?
        .with_call_timeout(config.eklaim_call_timeout());

    let claims = Arc::new(PgClaimRepository::new(pool.clone()));
    let audit = AuditWriter::spawn(Arc::new(PgAuditRepository::new(pool.clone())));
    let gateway = ClaimGateway::new(
        client,
        claims.clone(),
        Arc::new(PgConfigRepository::new(pool.clone())),
        audit.clone(),
    );

    let retention = spawn_audit_retention(audit.clone(), config.audit_prune_interval());

    let state = AppState::new(gateway, config.clone()).with_health_check(claims);
    let app = create_router(state);

    let addr: SocketAddr = config.server_addr().parse().context("parsing server address")?;
    tracing::info!(%addr, "Server listening");

    let listener = TcpListener::bind(addr).await?;
    axum::serve(listener, app.into_make_service_with_connect_info::<SocketAddr>())
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    retention.abort();
    audit.flush().await;
    pool.close().await;

    tracing::info!("Server shutdown complete");
    Ok(())
}

/// Initializes the tracing subscriber for structured logging.
fn init_tracing(log_level: &str, format: LogFormat) {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(log_level))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    let registry = tracing_subscriber::registry().with(filter);
    match format {
        LogFormat::Json => registry.with(tracing_subscriber::fmt::layer().json().with_target(true)).init(),
        LogFormat::Pretty => registry.with(tracing_subscriber::fmt::layer().with_target(true)).init(),
    }
}

/// Waits for shutdown signal (Ctrl+C or SIGTERM).
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to install Ctrl+C handler");
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
