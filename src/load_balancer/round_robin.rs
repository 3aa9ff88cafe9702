//! Round-robin load balancing strategy.

use std::sync::atomic::Ordering;
use std::sync::Arc;

use crate::load_balancer::{backend::Node, LoadBalancer, SelectionContext};

/// Round-robin selector.
/// Indexes the healthy subset with the shared rotation counter.
#[derive(Debug, Default)]
pub struct RoundRobin;

impl RoundRobin {
    pub fn new() -> Self {
        Self
    }
}

impl LoadBalancer for RoundRobin {
    fn next_server(&self, healthy: &[Arc<Node>], ctx: &SelectionContext<'_>) -> Option<Arc<Node>> {
        if healthy.is_empty() {
            return None;
        }

        // The cycle is exact only while the healthy set is stable.
        let count = ctx.counter.fetch_add(1, Ordering::Relaxed);
        Some(healthy[count % healthy.len()].clone())
    }
}
