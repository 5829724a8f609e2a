//! muxtun agent daemon
//!
//! Dials outward to a broker's mux port and forwards demultiplexed
//! channel traffic to a configured destination, so a single outbound
//! connection from a private network stands in for inbound
//! connectivity.

use std::path::PathBuf;

use anyhow::Result;
use clap::Parser;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use mt_agent::Agent;
use mt_core::config::{self, AgentConfig};

#[derive(Parser)]
#[command(name = "mt-agent")]
#[command(about = "muxtun agent - forwards tunnel channels to a destination")]
#[command(version)]
struct Args {
    /// Path to configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Broker host to connect to (overrides config)
    #[arg(long)]
    broker_host: Option<String>,

    /// Broker mux port (overrides config)
    #[arg(long)]
    mux_port: Option<u16>,

    /// Destination host to forward channels to (overrides config)
    #[arg(long)]
    dst_host: Option<String>,

    /// Destination port to forward channels to (overrides config)
    #[arg(long)]
    dst_port: Option<u16>,

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

    tracing::info!("muxtun agent starting...");

    let config_path = args.config.clone().unwrap_or_else(config::agent_config_path);
    let mut config: AgentConfig = config::load_or_default(&config_path);

    if let Some(broker_host) = args.broker_host {
        config.broker_host = broker_host;
    }
    if let Some(mux_port) = args.mux_port {
        config.mux_port = mux_port;
    }
    if let Some(dst_host) = args.dst_host {
        config.dst_host = dst_host;
    }
    if let Some(dst_port) = args.dst_port {
        config.dst_port = dst_port;
    }

    tracing::info!(
        broker = %config.broker_addr(),
        dst = %config.dst_addr(),
        "forwarding channels"
    );

    let cancel = CancellationToken::new();
    spawn_signal_handler(cancel.clone());

    Agent::new(config).run(cancel).await;

    tracing::info!("agent shutdown complete");
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
