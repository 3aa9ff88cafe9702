//! Selection engine.
//!
//! # Responsibilities
//! - Own the active algorithm and the shared rotation counter
//! - Map each `Algorithm` to its strategy through a lookup table
//! - Linearize algorithm switches against selections
//!
//! # Design Decisions
//! - The active-algorithm lock is held for the whole selection, so a switch
//!   is either fully before or fully after any given pick
//! - Switching never resets the counter

use std::collections::HashMap;
use std::sync::atomic::AtomicUsize;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use crate::load_balancer::{
    backend::Node, least_conn::LeastConnections, least_time::LeastResponseTime,
    round_robin::RoundRobin, weighted::Weighted, Algorithm, LoadBalancer, LoadSnapshot,
    SelectionContext,
};

/// Outcome of a successful selection.
#[derive(Debug, Clone)]
pub struct Selection {
    pub node: Arc<Node>,
    /// Algorithm that made the pick.
    pub algorithm: Algorithm,
}

/// Runtime-switchable strategy dispatcher.
#[derive(Debug)]
pub struct SelectionEngine {
    active: Mutex<Algorithm>,
    counter: AtomicUsize,
    strategies: HashMap<Algorithm, Box<dyn LoadBalancer>>,
}

impl SelectionEngine {
    /// Create an engine starting with `initial`.
    ///
    /// `untested_default` is the response time assumed by least-response-time
    /// for nodes without samples.
    pub fn new(initial: Algorithm, untested_default: f64) -> Self {
        let mut strategies: HashMap<Algorithm, Box<dyn LoadBalancer>> = HashMap::new();
        strategies.insert(Algorithm::RoundRobin, Box::new(RoundRobin::new()));
        strategies.insert(Algorithm::LeastConnections, Box::new(LeastConnections::new()));
        strategies.insert(Algorithm::Weighted, Box::new(Weighted::new()));
        strategies.insert(
            Algorithm::LeastResponseTime,
            Box::new(LeastResponseTime::new(untested_default)),
        );

        Self {
            active: Mutex::new(initial),
            counter: AtomicUsize::new(0),
            strategies,
        }
    }

    fn lock_active(&self) -> MutexGuard<'_, Algorithm> {
        self.active.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Currently active algorithm.
    pub fn algorithm(&self) -> Algorithm {
        *self.lock_active()
    }

    /// Switch algorithms, returning the previous one.
    pub fn set_algorithm(&self, algorithm: Algorithm) -> Algorithm {
        let mut active = self.lock_active();
        std::mem::replace(&mut *active, algorithm)
    }

    /// Pick a node from `healthy` with the active algorithm.
    ///
    /// Returns `None` iff `healthy` is empty.
    pub fn select(&self, healthy: &[Arc<Node>], load: &LoadSnapshot) -> Option<Selection> {
        let active = self.lock_active();
        let algorithm = *active;
        let strategy = self.strategies.get(&algorithm)?;

        let ctx = SelectionContext {
            counter: &self.counter,
            load,
        };
        let node = strategy.next_server(healthy, &ctx)?;

        Some(Selection { node, algorithm })
    }
}
