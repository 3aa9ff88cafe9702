//! node-balancer
//!
//! HTTP load balancer that spreads requests across a fixed pool of compute
//! nodes.
//!
//! # Architecture Overview
//!
//! ```text
//!     Client ──▶ http::server ──▶ http::proxy ──▶ load_balancer::engine
//!                    │                 │                  │
//!                    │                 │          round_robin / weighted /
//!                    │                 │          least_conn / least_time
//!                    │                 ▼
//!                    │            stats::store ◀── ConnectionGuard
//!                    │                 │
//!                    ▼                 ▼
//!              http::status      node /api/process
//!
//!     health::active ──probes──▶ node /health ──▶ Node::set_healthy
//! ```
//!
//! Configuration comes from an optional TOML file; command line flags and
//! their environment variables override it.

use clap::Parser;
use std::net::SocketAddr;
use std::path::PathBuf;
use tokio::net::TcpListener;

use node_balancer::config::{read_config, BalancerConfig, NodeConfig};
use node_balancer::lifecycle::{wait_for_signal, Shutdown};
use node_balancer::observability::{logging, metrics};
use node_balancer::{Algorithm, BalancerServer};

#[derive(Parser, Debug)]
#[command(name = "node-balancer", version, about = "HTTP load balancer for compute nodes")]
struct Cli {
    /// TOML configuration file
    #[arg(short, long, env = "LB_CONFIG")]
    config: Option<PathBuf>,

    /// Balancer identifier
    #[arg(long, env = "LB_ID")]
    id: Option<String>,

    /// Listen port (host comes from the config file)
    #[arg(short, long, env = "LB_PORT")]
    port: Option<u16>,

    /// Initial selection algorithm
    #[arg(short, long, env = "ALGORITHM")]
    algorithm: Option<Algorithm>,

    /// Node as `id=address[@weight]`; repeat or comma-separate to list several
    #[arg(short, long = "node", env = "LB_NODES", value_delimiter = ',')]
    nodes: Vec<NodeConfig>,

    /// Log level used when RUST_LOG is unset
    #[arg(long)]
    log_level: Option<String>,
}

impl Cli {
    fn apply(self, config: &mut BalancerConfig) {
        if let Some(id) = self.id {
            config.balancer_id = id;
        }
        if let Some(port) = self.port {
            config.listener.set_port(port);
        }
        if let Some(algorithm) = self.algorithm {
            config.algorithm = algorithm;
        }
        if !self.nodes.is_empty() {
            config.nodes = self.nodes;
        }
        if let Some(level) = self.log_level {
            config.observability.log_level = level;
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => read_config(path)?,
        None => BalancerConfig::default(),
    };
    let config_path = cli.config.clone();
    cli.apply(&mut config);

    logging::init_logging(&config.observability.log_level);

    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        config = ?config_path,
        "node-balancer starting"
    );
    tracing::info!(
        balancer_id = %config.balancer_id,
        bind_address = %config.listener.bind_address,
        algorithm = %config.algorithm,
        nodes = config.nodes.len(),
        health_interval_secs = config.health_check.interval_secs,
        backend_timeout_secs = config.timeouts.backend_secs,
        "Configuration loaded"
    );
    for node in &config.nodes {
        tracing::info!(node = %node.id, address = %node.address, weight = node.weight, "Node registered");
    }

    if config.observability.metrics_enabled {
        match config.observability.metrics_address.parse::<SocketAddr>() {
            Ok(addr) => metrics::init_metrics(addr),
            Err(e) => tracing::error!(
                metrics_address = %config.observability.metrics_address,
                error = %e,
                "Failed to parse metrics address"
            ),
        }
    }

    let bind_address = config.listener.bind_address.clone();
    let server = BalancerServer::new(config)?;
    let listener = TcpListener::bind(&bind_address).await?;

    let shutdown = Shutdown::new();
    let receiver = shutdown.subscribe();
    tokio::spawn(async move {
        wait_for_signal().await;
        tracing::info!("Shutdown signal received");
        shutdown.trigger();
    });

    server.run(listener, receiver).await?;

    tracing::info!("Shutdown complete");
    Ok(())
}
