//! Load balancing subsystem.
//!
//! # Data Flow
//! ```text
//! Request admitted by the gateway
//!     → pool.rs (healthy subset, registry order)
//!     → stats (LoadSnapshot: active connections, response times)
//!     → engine.rs (active Algorithm → strategy lookup):
//!         - round_robin.rs (rotate through healthy nodes)
//!         - least_conn.rs (pick node with fewest in-flight requests)
//!         - weighted.rs (weighted round robin over the healthy subset)
//!         - least_time.rs (pick node with lowest EWMA response time)
//!     → Selected node, or None when nothing is healthy
//! ```
//!
//! # Design Decisions
//! - Strategies are stateless; the shared rotation counter lives in the engine
//! - Unhealthy nodes are filtered before any strategy runs
//! - The active connection count is informational, never a throttle

pub mod backend;
pub mod engine;
pub mod least_conn;
pub mod least_time;
pub mod pool;
pub mod round_robin;
pub mod weighted;

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::atomic::AtomicUsize;
use std::sync::Arc;

pub use backend::{Node, NodeError};
pub use engine::{Selection, SelectionEngine};
pub use pool::NodeRegistry;

/// A node selection strategy.
pub trait LoadBalancer: Send + Sync + fmt::Debug {
    /// Pick a node from `healthy`, or `None` if it is empty.
    fn next_server(&self, healthy: &[Arc<Node>], ctx: &SelectionContext<'_>) -> Option<Arc<Node>>;
}

/// Shared inputs handed to every strategy call.
pub struct SelectionContext<'a> {
    /// Rotation counter shared by round robin and weighted.
    pub counter: &'a AtomicUsize,
    /// Live load figures per node.
    pub load: &'a LoadSnapshot,
}

/// Load figures for one node at selection time.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct NodeLoad {
    pub active_connections: usize,
    /// EWMA response time in seconds; `None` until the first sample.
    pub avg_response_time: Option<f64>,
}

/// Per-node load figures, indexed by registry slot.
#[derive(Debug, Clone, Default)]
pub struct LoadSnapshot {
    slots: Vec<NodeLoad>,
}

impl LoadSnapshot {
    pub fn new(slots: Vec<NodeLoad>) -> Self {
        Self { slots }
    }

    /// Figures for `node`; nodes without an entry read as idle and untested.
    pub fn get(&self, node: &Node) -> NodeLoad {
        self.slots.get(node.slot).copied().unwrap_or_default()
    }
}

/// Selection algorithm identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Algorithm {
    RoundRobin,
    LeastConnections,
    Weighted,
    LeastResponseTime,
}

impl Algorithm {
    pub const ALL: [Algorithm; 4] = [
        Algorithm::RoundRobin,
        Algorithm::LeastConnections,
        Algorithm::Weighted,
        Algorithm::LeastResponseTime,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Algorithm::RoundRobin => "round_robin",
            Algorithm::LeastConnections => "least_connections",
            Algorithm::Weighted => "weighted",
            Algorithm::LeastResponseTime => "least_response_time",
        }
    }

    /// Wire names of every algorithm, in declaration order.
    pub fn valid_options() -> Vec<&'static str> {
        Self::ALL.iter().map(Algorithm::as_str).collect()
    }
}

impl fmt::Display for Algorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Returned when an algorithm name is not recognized.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown algorithm '{0}'")]
pub struct UnknownAlgorithm(pub String);

impl FromStr for Algorithm {
    type Err = UnknownAlgorithm;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .iter()
            .copied()
            .find(|a| a.as_str() == s)
            .ok_or_else(|| UnknownAlgorithm(s.to_string()))
    }
}
