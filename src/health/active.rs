//! Active health checking.
//!
//! # Responsibilities
//! - Periodically probe every node's health endpoint
//! - Flip each node's liveness flag from the probe result
//!
//! Probes run concurrently, so one cycle takes about one probe timeout no
//! matter how many nodes are slow. A failed probe only ever affects its own
//! node's flag.

use axum::body::Body;
use axum::http::{Request, StatusCode};
use futures_util::future::join_all;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tokio::time::{self, MissedTickBehavior};

use crate::config::HealthCheckConfig;
use crate::http::client::NodeClient;
use crate::load_balancer::{Node, NodeRegistry};
use crate::observability::metrics;

/// Why a probe marked a node unhealthy.
#[derive(Debug, thiserror::Error)]
pub enum ProbeError {
    #[error("timed out after {0:?}")]
    Timeout(Duration),
    #[error("connection error: {0}")]
    Transport(String),
    #[error("non-success status {0}")]
    Status(StatusCode),
    #[error("invalid probe request: {0}")]
    Request(String),
}

pub struct HealthMonitor {
    registry: Arc<NodeRegistry>,
    config: HealthCheckConfig,
    client: NodeClient,
}

impl HealthMonitor {
    pub fn new(registry: Arc<NodeRegistry>, config: HealthCheckConfig, client: NodeClient) -> Self {
        Self {
            registry,
            config,
            client,
        }
    }

    /// Run the monitor on its own task.
    pub fn spawn(self, shutdown: broadcast::Receiver<()>) -> JoinHandle<()> {
        tokio::spawn(self.run(shutdown))
    }

    pub async fn run(self, mut shutdown: broadcast::Receiver<()>) {
        if !self.config.enabled {
            tracing::info!("Active health checks disabled");
            return;
        }

        tracing::info!(
            interval = self.config.interval_secs,
            timeout = self.config.timeout_secs,
            path = %self.config.path,
            nodes = self.registry.len(),
            "Health monitor starting"
        );

        let mut ticker = time::interval(Duration::from_secs(self.config.interval_secs));
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    tokio::select! {
                        _ = self.check_all() => {}
                        _ = shutdown.recv() => {
                            tracing::info!("Health monitor received shutdown signal mid-cycle, exiting loop");
                            break;
                        }
                    }
                }
                _ = shutdown.recv() => {
                    tracing::info!("Health monitor received shutdown signal, exiting loop");
                    break;
                }
            }
        }
    }

    /// Probe every node once and update its flag.
    pub async fn check_all(&self) {
        let probes = self.registry.all().iter().map(|node| async move {
            let result = self.probe(node).await;
            (node, result)
        });

        for (node, result) in join_all(probes).await {
            let healthy = match result {
                Ok(()) => true,
                Err(e) => {
                    tracing::debug!(node = %node.id, error = %e, "Health probe failed");
                    false
                }
            };

            let was_healthy = node.set_healthy(healthy);
            if was_healthy != healthy {
                if healthy {
                    tracing::info!(node = %node.id, address = %node.address, "Node recovered");
                } else {
                    tracing::warn!(node = %node.id, address = %node.address, "Node marked unhealthy");
                }
            }

            metrics::record_node_health(&node.id, healthy);
        }
    }

    async fn probe(&self, node: &Node) -> Result<(), ProbeError> {
        let request = Request::builder()
            .method("GET")
            .uri(node.endpoint(&self.config.path))
            .header("user-agent", "node-balancer-health-check")
            .body(Body::empty())
            .map_err(|e| ProbeError::Request(e.to_string()))?;

        let timeout = Duration::from_secs(self.config.timeout_secs);
        match time::timeout(timeout, self.client.request(request)).await {
            Ok(Ok(response)) if response.status().is_success() => Ok(()),
            Ok(Ok(response)) => Err(ProbeError::Status(response.status())),
            Ok(Err(e)) => Err(ProbeError::Transport(e.to_string())),
            Err(_) => Err(ProbeError::Timeout(timeout)),
        }
    }
}
