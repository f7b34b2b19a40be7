//! SwarmBus node binary.
//!
//! Boots a coordinator with the loopback transport, logs the event stream
//! and runs until interrupted.

use std::path::PathBuf;

use anyhow::Context;
use clap::Parser;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use swarmbus_coordinator::{CoordinatorConfig, SwarmCoordinator, SwarmRuntime};
use swarmbus_protocol::EventBus;
use swarmbus_routing::LoopbackTransport;

#[derive(Parser, Debug)]
#[command(name = "swarmbus", about = "Swarm coordination node", version)]
struct Args {
    /// Path to a TOML config file (default: ~/.config/swarmbus/config.toml).
    #[arg(long)]
    config: Option<PathBuf>,

    /// Stable node identity; overrides the config file.
    #[arg(long)]
    node_id: Option<String>,

    /// Heartbeat interval in milliseconds; overrides the config file.
    #[arg(long)]
    heartbeat_ms: Option<u64>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse();
    let mut config = CoordinatorConfig::load_or_default(args.config.as_deref())
        .context("failed to load configuration")?;
    if args.node_id.is_some() {
        config.node_id = args.node_id;
    }
    if let Some(heartbeat_ms) = args.heartbeat_ms {
        config.heartbeat_interval_ms = heartbeat_ms;
    }

    let bus = EventBus::default();
    let mut events = bus.subscribe();
    tokio::spawn(async move {
        use tokio::sync::broadcast::error::RecvError;
        loop {
            match events.recv().await {
                Ok(event) => info!(event = ?event, "swarm event"),
                Err(RecvError::Lagged(skipped)) => warn!(skipped, "event stream lagged"),
                Err(RecvError::Closed) => break,
            }
        }
    });

    let coordinator = SwarmCoordinator::new(config, bus, LoopbackTransport::new());
    info!(node_id = %coordinator.local_id(), "swarmbus node starting");
    let (handle, join) = SwarmRuntime::spawn(coordinator);

    tokio::signal::ctrl_c().await.context("signal handler")?;
    info!("interrupt received, shutting down");
    handle.shutdown().await.ok();
    join.await.ok();
    Ok(())
}
