//! Status reporting for the `/status` endpoint.

use serde::Serialize;
use std::sync::Arc;

use crate::load_balancer::{Algorithm, NodeRegistry, SelectionEngine};
use crate::stats::{round_to, GlobalStats, MetricsStore, RequestRecord};

/// Per-node view in a status report.
#[derive(Debug, Clone, Serialize)]
pub struct NodeStatus {
    pub id: String,
    pub url: String,
    pub healthy: bool,
    pub active_connections: usize,
    pub weight: u32,
    pub total_requests: u64,
    pub failed_requests: u64,
    /// Seconds, rounded to 3 decimals.
    pub avg_response_time: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct StatusReport {
    pub load_balancer_id: String,
    pub algorithm: Algorithm,
    /// Seconds since startup or the last reset, rounded to 2 decimals.
    pub uptime: f64,
    pub statistics: GlobalStats,
    pub backend_servers: Vec<NodeStatus>,
    pub recent_requests: Vec<RequestRecord>,
}

/// Read-only aggregation of registry, engine and metrics.
pub struct StatusReporter {
    balancer_id: String,
    registry: Arc<NodeRegistry>,
    engine: Arc<SelectionEngine>,
    metrics: Arc<MetricsStore>,
    window: usize,
}

impl StatusReporter {
    pub fn new(
        balancer_id: impl Into<String>,
        registry: Arc<NodeRegistry>,
        engine: Arc<SelectionEngine>,
        metrics: Arc<MetricsStore>,
        window: usize,
    ) -> Self {
        Self {
            balancer_id: balancer_id.into(),
            registry,
            engine,
            metrics,
            window,
        }
    }

    pub fn report(&self) -> StatusReport {
        // Counters come from a single locked copy.
        let snapshot = self.metrics.snapshot(self.window);

        let backend_servers = self
            .registry
            .all()
            .iter()
            .map(|node| {
                let metrics = snapshot.nodes.get(node.slot).cloned().unwrap_or_default();
                NodeStatus {
                    id: node.id.clone(),
                    url: node.address.clone(),
                    healthy: node.is_healthy(),
                    active_connections: metrics.active_connections,
                    weight: node.weight,
                    total_requests: metrics.total_requests,
                    failed_requests: metrics.failed_requests,
                    avg_response_time: round_to(metrics.avg_response_time, 3),
                }
            })
            .collect();

        StatusReport {
            load_balancer_id: self.balancer_id.clone(),
            algorithm: self.engine.algorithm(),
            uptime: round_to(snapshot.uptime.as_secs_f64(), 2),
            statistics: snapshot.global,
            backend_servers,
            recent_requests: snapshot.recent,
        }
    }
}
