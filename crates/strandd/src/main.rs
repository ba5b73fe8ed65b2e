//! `strandd` — the Strand ring daemon.
//!
//! Binds a UDP socket, spawns the node task, and drives it from an
//! interactive stdin console.
//!
//! # Usage
//!
//! ```text
//! strandd start -c node1.toml               # start with a config file
//! strandd start -i 2 -l 127.0.0.1:4821      # override identity/address
//! strandd digest 3                          # print an identifier's digest
//! ```

mod config;
mod console;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use strand_net::{Directory, StaticDirectory, UdpTransport};
use strand_ring::NodeEvent;
use strand_types::{KeySpace, NodeId, Sha1KeySpace};
use tokio::sync::mpsc;
use tracing::{info, warn};

use config::CliConfig;

#[derive(Parser)]
#[command(name = "strandd", version, about = "Strand ring membership daemon")]
struct Cli {
    /// Path to TOML config file.
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the node and read commands from stdin.
    Start {
        /// Override the node identifier.
        #[arg(short, long)]
        id: Option<String>,

        /// Override the UDP listen address (e.g. "127.0.0.1:4820").
        #[arg(short = 'l', long)]
        listen_addr: Option<String>,

        /// Join via this node immediately instead of waiting for a
        /// console JOIN.
        #[arg(short, long)]
        bootstrap: Option<String>,
    },

    /// Print the ring digest of an identifier and exit.
    Digest {
        /// Identifier to hash.
        id: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let mut config = CliConfig::load(cli.config.as_deref()).context("failed to load config")?;

    setup_tracing(&config.log.level);

    match cli.command {
        Commands::Start {
            id,
            listen_addr,
            bootstrap,
        } => {
            // CLI args override config file values.
            if let Some(id) = id {
                config.node.id = id;
            }
            if let Some(addr) = listen_addr {
                config.node.listen_addr = addr;
            }
            cmd_start(config, bootstrap).await
        }
        Commands::Digest { id } => {
            println!("{}", Sha1KeySpace.digest(&NodeId::from(id)));
            Ok(())
        }
    }
}

/// Initialize the `tracing` subscriber with the given level filter.
///
/// Respects `RUST_LOG` env var if set, otherwise uses the config value.
fn setup_tracing(level: &str) {
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

async fn cmd_start(config: CliConfig, bootstrap: Option<String>) -> Result<()> {
    if config.node.id.is_empty() {
        bail!("no node id configured ([node] id or --id)");
    }
    let node_id = NodeId::from(config.node.id.as_str());
    let ring_config = config.ring_config()?;
    let listen_addr: std::net::SocketAddr = config
        .node
        .listen_addr
        .parse()
        .context("bad listen address")?;

    info!(
        node = %node_id,
        listen_addr = %config.node.listen_addr,
        peers = config.peers.len(),
        "starting strandd"
    );

    // Roster: the [peers] table, plus this node itself.
    let mut directory = StaticDirectory::default();
    for (id, addr) in &config.peers {
        let addr = addr
            .parse()
            .with_context(|| format!("bad peer address for {id}: {addr}"))?;
        directory.insert(NodeId::from(id.as_str()), addr);
    }
    if directory.resolve(&node_id).is_none() {
        directory.insert(node_id.clone(), listen_addr);
    }

    let transport = UdpTransport::bind(listen_addr)
        .await
        .context("failed to bind UDP socket")?;
    info!(addr = %transport.local_addr()?, "listening");

    let (inbound_tx, inbound_rx) = mpsc::channel(256);
    let recv_loop = transport.spawn_recv_loop(inbound_tx);

    let engine = strand_ring::RingEngine::new(
        node_id,
        ring_config,
        Arc::new(Sha1KeySpace),
        Arc::new(transport),
        Arc::new(directory),
    );
    let handle = strand_ring::start(engine, inbound_rx);
    let event_logger = tokio::spawn(log_events(handle.subscribe()));

    match bootstrap {
        Some(bootstrap) => handle.join(NodeId::from(bootstrap)).await?,
        None => handle.create_ring().await?,
    }

    console::run(&handle).await?;

    info!("shutting down");
    handle.shutdown().await;
    recv_loop.abort();
    event_logger.abort();
    Ok(())
}

/// Surface node events in the log until the node stops.
async fn log_events(mut events: tokio::sync::broadcast::Receiver<NodeEvent>) {
    use tokio::sync::broadcast::error::RecvError;

    loop {
        match events.recv().await {
            Ok(NodeEvent::PingSucceeded { peer, text }) => {
                info!(%peer, %text, "ping succeeded");
            }
            Ok(NodeEvent::PingFailed { peer, text }) => {
                warn!(%peer, %text, "ping failed");
            }
            Ok(NodeEvent::PingReceived { from, text }) => {
                info!(%from, %text, "ping received");
            }
            Ok(NodeEvent::WalkVisited { .. }) => {}
            Err(RecvError::Lagged(missed)) => {
                warn!(missed, "event stream lagged");
            }
            Err(RecvError::Closed) => break,
        }
    }
}
