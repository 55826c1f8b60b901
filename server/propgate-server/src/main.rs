use std::{env, net::SocketAddr};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing::{info, Level};
use tracing_subscriber::{fmt::{self, time::ChronoUtc}, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use propgate_server::{create_app, GatewayConfig, PropGateServer};

/// PropGate audit and approval gateway
#[derive(Parser, Debug)]
#[command(name = "propgate-server")]
#[command(about = "Audit trail and approval gating API for property management")]
struct Args {
    /// Configuration file path
    #[arg(short, long, default_value = "propgate.toml", env = "PROPGATE_CONFIG")]
    config: String,

    /// Override the configured bind host
    #[arg(long)]
    host: Option<String>,

    /// Override the configured port
    #[arg(short, long)]
    port: Option<u16>,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the HTTP gateway (default)
    Serve,
    /// Delete low/medium severity audit events past the retention window
    Purge {
        /// Retention window in days (defaults to audit.retention_days)
        #[arg(long)]
        days: Option<u32>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let args = Args::parse();

    init_tracing(args.verbose);

    let mut config = GatewayConfig::load(&args.config)
        .with_context(|| format!("Failed to load configuration from {}", args.config))?;
    if let Some(host) = args.host {
        config.server.host = host;
    }
    if let Some(port) = args.port {
        config.server.port = port;
    }

    match args.command.unwrap_or(Command::Serve) {
        Command::Serve => serve(config).await,
        Command::Purge { days } => purge(config, days).await,
    }
}

async fn serve(config: GatewayConfig) -> Result<()> {
    let addr = config.bind_address();
    info!(version = env!("CARGO_PKG_VERSION"), bind = %addr, "Starting PropGate server");

    let server = PropGateServer::new(config).await?;
    let app = create_app(server);

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind to {}", addr))?;

    info!("PropGate server running on http://{}", addr);
    info!("Health check available at: http://{}/health", addr);
    info!("Audit API available at: http://{}/api/v1/audit", addr);

    axum::serve(listener, app.into_make_service_with_connect_info::<SocketAddr>())
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("HTTP server error")?;

    info!("PropGate server stopped");
    Ok(())
}

async fn purge(config: GatewayConfig, days: Option<u32>) -> Result<()> {
    let retention_days = days.unwrap_or(config.audit.retention_days);
    let server = PropGateServer::new(config).await?;

    let deleted = server
        .retention
        .purge(retention_days)
        .await
        .context("Audit retention purge failed")?;

    info!(deleted, retention_days, "Audit retention purge finished");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for shutdown signal");
    }
}

fn init_tracing(verbose: bool) {
    let level = if verbose { Level::DEBUG } else { Level::INFO };

    // Check if we're in development or production
    let is_development = env::var("PROPGATE_ENV").unwrap_or_else(|_| "development".to_string()) == "development";

    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        format!(
            "propgate_server={level},audit_engine={level},approval_engine={level},audit={level},tower_http=info,sqlx=warn"
        )
        .into()
    });

    if is_development {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(
                fmt::layer()
                    .with_target(true)
                    .with_line_number(verbose)
                    .with_timer(ChronoUtc::rfc_3339())
                    .with_ansi(true),
            )
            .init();
    } else {
        // Structured JSON logging for production
        tracing_subscriber::registry()
            .with(env_filter)
            .with(
                fmt::layer()
                    .with_target(true)
                    .with_timer(ChronoUtc::rfc_3339())
                    .with_ansi(false)
                    .json(),
            )
            .init();
    }
}
