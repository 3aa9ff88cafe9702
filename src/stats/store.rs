//! Metrics store.
//!
//! # Responsibilities
//! - Per-node counters: requests, failures, active connections, EWMA latency
//! - Global counters and the recent-request history
//! - Consistent snapshots for selection and status reporting
//!
//! # Design Decisions
//! - One mutex guards every counter so correlated fields change together and
//!   readers never observe a half-applied update
//! - Active connections are tracked with an RAII guard; the count is restored
//!   exactly once however the request ends, including cancellation
//! - Each reset starts a new generation; requests admitted earlier only
//!   release their connection slot and never write into the fresh counters

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use crate::load_balancer::{LoadSnapshot, Node, NodeLoad};
use crate::stats::history::{Outcome, RequestHistory, RequestRecord};
use crate::stats::round_to;

/// Weight of the newest sample in the response time average.
pub const EWMA_ALPHA: f64 = 0.2;

/// Counters for one node.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct NodeMetrics {
    pub total_requests: u64,
    pub failed_requests: u64,
    pub active_connections: usize,
    /// EWMA of backend call time in seconds.
    pub avg_response_time: f64,
    /// Number of samples folded into the average.
    #[serde(skip)]
    pub samples: u64,
}

impl NodeMetrics {
    fn record_sample(&mut self, secs: f64) {
        self.avg_response_time = (1.0 - EWMA_ALPHA) * self.avg_response_time + EWMA_ALPHA * secs;
        self.samples += 1;
    }

    fn clear_counters(&mut self) {
        // In-flight requests still hold their connection slots.
        let active_connections = self.active_connections;
        *self = Self {
            active_connections,
            ..Self::default()
        };
    }

    fn load(&self) -> NodeLoad {
        NodeLoad {
            active_connections: self.active_connections,
            avg_response_time: (self.samples > 0).then_some(self.avg_response_time),
        }
    }
}

/// Balancer-wide counters.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GlobalStats {
    pub total_requests: u64,
    #[serde(rename = "successful_requests")]
    pub success_count: u64,
    pub failed_requests: u64,
    pub start_time: DateTime<Utc>,
}

impl GlobalStats {
    fn new() -> Self {
        Self {
            total_requests: 0,
            success_count: 0,
            failed_requests: 0,
            start_time: Utc::now(),
        }
    }
}

/// Consistent copy of the whole store.
#[derive(Debug, Clone)]
pub struct MetricsSnapshot {
    pub uptime: Duration,
    pub global: GlobalStats,
    /// Indexed by registry slot.
    pub nodes: Vec<NodeMetrics>,
    pub recent: Vec<RequestRecord>,
}

/// Proof that a request was counted, tagged with the generation it belongs to.
#[derive(Debug, Clone, Copy)]
pub struct RequestTicket {
    generation: u64,
}

#[derive(Debug)]
struct StoreState {
    generation: u64,
    started: Instant,
    global: GlobalStats,
    nodes: Vec<NodeMetrics>,
    history: RequestHistory,
}

/// Shared, synchronized store for all request bookkeeping.
#[derive(Debug)]
pub struct MetricsStore {
    state: Mutex<StoreState>,
}

impl MetricsStore {
    pub fn new(node_count: usize, history_capacity: usize) -> Self {
        Self {
            state: Mutex::new(StoreState {
                generation: 0,
                started: Instant::now(),
                global: GlobalStats::new(),
                nodes: vec![NodeMetrics::default(); node_count],
                history: RequestHistory::with_capacity(history_capacity),
            }),
        }
    }

    fn lock(&self) -> MutexGuard<'_, StoreState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Count an inbound request.
    pub fn open_request(&self) -> RequestTicket {
        let mut state = self.lock();
        state.global.total_requests += 1;
        RequestTicket {
            generation: state.generation,
        }
    }

    /// Count a request that found no node to go to.
    pub fn reject(&self, ticket: RequestTicket) {
        let mut state = self.lock();
        if state.generation == ticket.generation {
            state.global.failed_requests += 1;
        }
    }

    /// Current load figures for the selection engine.
    pub fn load_snapshot(&self) -> LoadSnapshot {
        let state = self.lock();
        LoadSnapshot::new(state.nodes.iter().map(NodeMetrics::load).collect())
    }

    /// Mark a request as in flight to `node`.
    pub fn dispatch(
        self: &Arc<Self>,
        ticket: RequestTicket,
        node: &Arc<Node>,
        request_id: impl Into<String>,
    ) -> ConnectionGuard {
        {
            let mut state = self.lock();
            let current = state.generation == ticket.generation;
            if let Some(metrics) = state.nodes.get_mut(node.slot) {
                metrics.active_connections += 1;
                if current {
                    metrics.total_requests += 1;
                }
            }
        }

        ConnectionGuard {
            store: self.clone(),
            node: node.clone(),
            generation: ticket.generation,
            request_id: request_id.into(),
            started: Instant::now(),
            released: false,
        }
    }

    /// Zero global and per-node counters, clear history, restart the clock.
    pub fn reset(&self) {
        let mut state = self.lock();
        state.generation += 1;
        state.started = Instant::now();
        state.global = GlobalStats::new();
        state.nodes.iter_mut().for_each(NodeMetrics::clear_counters);
        state.history.clear();
    }

    /// Everything at once, with the last `recent` history entries.
    pub fn snapshot(&self, recent: usize) -> MetricsSnapshot {
        let state = self.lock();
        MetricsSnapshot {
            uptime: state.started.elapsed(),
            global: state.global.clone(),
            nodes: state.nodes.clone(),
            recent: state.history.recent(recent),
        }
    }

    /// Counters for a single node.
    pub fn node(&self, node: &Node) -> NodeMetrics {
        self.lock().nodes.get(node.slot).cloned().unwrap_or_default()
    }

    pub fn global(&self) -> GlobalStats {
        self.lock().global.clone()
    }

    fn finish(&self, guard: &mut ConnectionGuard, outcome: Outcome, elapsed: Duration) {
        if guard.released {
            return;
        }
        guard.released = true;

        let mut state = self.lock();
        let current = state.generation == guard.generation;

        if let Some(metrics) = state.nodes.get_mut(guard.node.slot) {
            metrics.active_connections = metrics.active_connections.saturating_sub(1);
        }

        if !current {
            return;
        }

        let secs = elapsed.as_secs_f64();
        match outcome {
            Outcome::Success => {
                state.global.success_count += 1;
                if let Some(metrics) = state.nodes.get_mut(guard.node.slot) {
                    metrics.record_sample(secs);
                }
            }
            Outcome::Failed => {
                state.global.failed_requests += 1;
                if let Some(metrics) = state.nodes.get_mut(guard.node.slot) {
                    metrics.failed_requests += 1;
                }
            }
        }

        state.history.push(RequestRecord {
            timestamp: Utc::now(),
            request_id: guard.request_id.clone(),
            node_id: guard.node.id.clone(),
            response_time_secs: round_to(secs, 3),
            outcome,
        });
    }
}

/// Holds one active connection slot on a node until finished or dropped.
#[derive(Debug)]
pub struct ConnectionGuard {
    store: Arc<MetricsStore>,
    node: Arc<Node>,
    generation: u64,
    request_id: String,
    started: Instant,
    released: bool,
}

impl ConnectionGuard {
    pub fn node(&self) -> &Arc<Node> {
        &self.node
    }

    /// Record a completed backend call and release the slot.
    pub fn succeed(mut self, elapsed: Duration) {
        let store = self.store.clone();
        store.finish(&mut self, Outcome::Success, elapsed);
    }

    /// Record a failed backend call and release the slot.
    pub fn fail(mut self, elapsed: Duration) {
        let store = self.store.clone();
        store.finish(&mut self, Outcome::Failed, elapsed);
    }
}

/// An unfinished guard means the caller went away mid-call; that request
/// counts as failed.
impl Drop for ConnectionGuard {
    fn drop(&mut self) {
        if self.released {
            return;
        }
        tracing::debug!(
            request_id = %self.request_id,
            node = %self.node.id,
            "Request abandoned before the node answered"
        );
        let elapsed = self.started.elapsed();
        let store = self.store.clone();
        store.finish(self, Outcome::Failed, elapsed);
    }
}
