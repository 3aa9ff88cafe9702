//! Least response time load balancing strategy.

use std::sync::Arc;

use crate::load_balancer::{backend::Node, LoadBalancer, SelectionContext};

/// Selects the node with the lowest EWMA response time.
///
/// Nodes without samples are scored as `untested_default`. With the default
/// of zero they win over any node that has a positive average, so fresh or
/// freshly reset nodes get traffic first.
#[derive(Debug, Default)]
pub struct LeastResponseTime {
    untested_default: f64,
}

impl LeastResponseTime {
    pub fn new(untested_default: f64) -> Self {
        Self { untested_default }
    }
}

impl LoadBalancer for LeastResponseTime {
    fn next_server(&self, healthy: &[Arc<Node>], ctx: &SelectionContext<'_>) -> Option<Arc<Node>> {
        let score = |node: &Arc<Node>| {
            ctx.load
                .get(node)
                .avg_response_time
                .unwrap_or(self.untested_default)
        };

        // min_by keeps the first of equal elements, i.e. registry order.
        healthy
            .iter()
            .min_by(|a, b| score(*a).total_cmp(&score(*b)))
            .cloned()
    }
}
