//! Least Connections load balancing strategy.

use std::sync::Arc;

use crate::load_balancer::{backend::Node, LoadBalancer, SelectionContext};

/// Least connections selector.
/// Selects the node with the minimum number of in-flight requests.
#[derive(Debug, Default)]
pub struct LeastConnections;

impl LeastConnections {
    pub fn new() -> Self {
        Self
    }
}

impl LoadBalancer for LeastConnections {
    fn next_server(&self, healthy: &[Arc<Node>], ctx: &SelectionContext<'_>) -> Option<Arc<Node>> {
        // In case of tie, the first one in registry order is selected
        healthy
            .iter()
            .min_by_key(|node| ctx.load.get(node).active_connections)
            .cloned()
    }
}
