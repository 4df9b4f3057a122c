//! # fsyn-daemon
//!
//! Serves the endpoints named in `fsyn.toml` over HTTP.
//!
//! ## Usage
//!
//! ```text
//! fsyn-daemon --config /etc/fsyn/fsyn.toml
//! fsyn-daemon --address 0.0.0.0:9000 --log-json
//! ```
//!
//! Log verbosity follows `RUST_LOG` on top of the `info` defaults.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use tracing_subscriber::EnvFilter;

use fsyn_daemon::{app, AppState, DaemonConfig};

/// fsyn endpoint server.
#[derive(Parser)]
#[command(name = "fsyn-daemon", about = "Serve filesystem endpoints over HTTP")]
struct Cli {
    /// Path to the configuration file.
    #[arg(long, default_value = "fsyn.toml")]
    config: PathBuf,

    /// Listen address, overriding the config file.
    #[arg(long)]
    address: Option<String>,

    /// Emit logs as JSON lines.
    #[arg(long)]
    log_json: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.log_json)?;

    let mut config = DaemonConfig::load(&cli.config)
        .with_context(|| format!("loading {}", cli.config.display()))?;
    if let Some(address) = cli.address {
        config.address = address;
    }

    let state = AppState::from_config(&config)?;
    let table = state.transfer.endpoints();
    if table.is_empty() {
        tracing::warn!("no endpoints configured; only /endpoints/list will answer");
    }
    for (name, root) in table.iter() {
        if root.is_dir() {
            tracing::info!("endpoint {} -> {}", name, root.display());
        } else {
            tracing::warn!(
                "endpoint {} -> {} is not an existing directory",
                name,
                root.display()
            );
        }
    }
    if state.tokens.is_empty() {
        tracing::warn!("no tokens configured; authentication is disabled");
    }

    let listener = tokio::net::TcpListener::bind(&config.address)
        .await
        .with_context(|| format!("binding {}", config.address))?;
    tracing::info!("fsyn daemon listening on {}", listener.local_addr()?);

    axum::serve(listener, app(state, config.limits()))
        .with_graceful_shutdown(shutdown_signal())
        .await
        .inspect_err(|e| tracing::error!("serving error: {:?}", e))?;

    tracing::info!("fsyn daemon shutting down");
    Ok(())
}

fn init_tracing(json: bool) -> Result<()> {
    // Logs go to stderr; stdout stays free for the caller.
    let filter = EnvFilter::from_default_env()
        .add_directive("fsyn_daemon=info".parse()?)
        .add_directive("fsyn_core=info".parse()?)
        .add_directive("tower_http=info".parse()?);

    if json {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .with_ansi(false)
            .init();
    }
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
}
