//! Beacon Relay Server
//!
//! Listens for signaling clients over WebSocket and serves the `/users`,
//! `/log` and `/dellog` views on the same port.

use std::path::PathBuf;

use anyhow::Context;
use clap::{Parser, ValueEnum};

use beacon_relay::{api, RelayConfig, RelayState};

// ── CLI Arguments ─────────────────────────────────────────────────────────────

#[derive(Parser, Debug)]
#[command(name = "beacon-relay", version, about = "Peer-to-peer call signaling relay")]
struct Args {
    /// Port to listen on
    #[arg(short, long, default_value_t = 3000, env = "RELAY_PORT")]
    port: u16,

    /// Diagnostic journal file served by /log
    #[arg(long, default_value = "server.log", env = "RELAY_LOG_FILE")]
    log_file: PathBuf,

    /// UTC offset for journal timestamps, in minutes (330 = UTC+05:30)
    #[arg(
        long,
        default_value_t = 330,
        env = "RELAY_LOG_UTC_OFFSET_MINUTES",
        allow_hyphen_values = true
    )]
    log_utc_offset_minutes: i32,

    /// Console log format
    #[arg(long, value_enum, default_value_t = LogFormat::Text, env = "RELAY_LOG_FORMAT")]
    log_format: LogFormat,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
enum LogFormat {
    Text,
    Json,
}

// ── Entry Point ───────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    // Initialize tracing
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "beacon_relay=info,tower_http=info".into());
    match args.log_format {
        LogFormat::Text => tracing_subscriber::fmt().with_env_filter(filter).init(),
        LogFormat::Json => tracing_subscriber::fmt().json().with_env_filter(filter).init(),
    }

    let config = RelayConfig {
        port: args.port,
        log_file: args.log_file,
        log_utc_offset_minutes: args.log_utc_offset_minutes,
    };

    let state = RelayState::new(config);
    let journal = state.journal.clone();
    let app = api::router(state.clone());

    let addr = format!("0.0.0.0:{}", state.config.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("failed to bind {}", addr))?;

    tracing::info!(
        addr = addr.as_str(),
        log_file = %state.config.log_file.display(),
        "Server Started..."
    );

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server error")?;

    if let Err(e) = journal.sync().await {
        tracing::warn!(error = %e, "Journal did not flush on shutdown");
    }
    tracing::info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received");
}

// ── Tests ─────────────────────────────────────────────────────────────────────
