//! Weighted round-robin strategy.
//!
//! Each healthy node occupies `weight` consecutive positions of a virtual
//! sequence laid out in registry order. The shared rotation counter indexes
//! that sequence modulo its length, so weights {A:3, B:2, C:1} produce
//! A, A, A, B, B, C and then repeat. The sequence is never materialized.

use std::sync::atomic::Ordering;
use std::sync::Arc;

use crate::load_balancer::{backend::Node, LoadBalancer, SelectionContext};

/// Deterministic weighted round robin.
#[derive(Debug, Default)]
pub struct Weighted;

impl Weighted {
    pub fn new() -> Self {
        Self
    }
}

impl LoadBalancer for Weighted {
    fn next_server(&self, healthy: &[Arc<Node>], ctx: &SelectionContext<'_>) -> Option<Arc<Node>> {
        let total: u64 = healthy.iter().map(|n| u64::from(n.weight)).sum();
        if total == 0 {
            return None;
        }

        let count = ctx.counter.fetch_add(1, Ordering::Relaxed) as u64;
        let mut position = count % total;
        for node in healthy {
            let weight = u64::from(node.weight);
            if position < weight {
                return Some(node.clone());
            }
            position -= weight;
        }

        None
    }
}
