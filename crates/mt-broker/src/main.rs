//! muxtun broker daemon
//!
//! Listens on a public port for client connections and a mux port for
//! agents, relaying client byte streams as framed traffic over the mux
//! connections.

use std::path::PathBuf;

use anyhow::Result;
use clap::Parser;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use mt_broker::Broker;
use mt_core::config::{self, BrokerConfig};

#[derive(Parser)]
#[command(name = "mt-broker")]
#[command(about = "muxtun broker daemon")]
#[command(version)]
struct Args {
    /// Path to configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Host to bind both listeners to (overrides config)
    #[arg(long)]
    listen_host: Option<String>,

    /// Mux port for agents (overrides config)
    #[arg(long)]
    mux_port: Option<u16>,

    /// Public client port (overrides config)
    #[arg(long)]
    client_port: Option<u16>,

    /// Log level (error, warn, info, debug, trace)
    #[arg(long, default_value = "info")]
    log_level: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| args.log_level.clone()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("muxtun broker starting...");

    let config_path = args
        .config
        .clone()
        .unwrap_or_else(config::broker_config_path);
    let mut config: BrokerConfig = config::load_or_default(&config_path);

    if let Some(listen_host) = args.listen_host {
        config.listen_host = listen_host;
    }
    if let Some(mux_port) = args.mux_port {
        config.mux_port = mux_port;
    }
    if let Some(client_port) = args.client_port {
        config.client_port = client_port;
    }

    let cancel = CancellationToken::new();
    spawn_signal_handler(cancel.clone());

    let broker = Broker::bind(&config).await?;
    broker.run(cancel).await?;

    tracing::info!("broker shutdown complete");
    Ok(())
}

/// Cancel the token on Ctrl+C or SIGTERM
fn spawn_signal_handler(cancel: CancellationToken) {
    tokio::spawn(async move {
        let ctrl_c = tokio::signal::ctrl_c();

        #[cfg(unix)]
        let terminate = async {
            tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
                .expect("failed to install signal handler")
                .recv()
                .await;
        };

        #[cfg(not(unix))]
        let terminate = std::future::pending::<()>();

        tokio::select! {
            _ = ctrl_c => {
                tracing::info!("Received Ctrl+C, initiating shutdown...");
            }
            _ = terminate => {
                tracing::info!("Received SIGTERM, initiating shutdown...");
            }
        }

        cancel.cancel();
    });
}
