//! Request statistics: per-node and global counters plus recent history.

pub mod history;
pub mod store;

pub use history::{Outcome, RequestHistory, RequestRecord};
pub use store::{ConnectionGuard, GlobalStats, MetricsSnapshot, MetricsStore, NodeMetrics, RequestTicket};

/// Round `value` to `decimals` places for display.
pub fn round_to(value: f64, decimals: i32) -> f64 {
    let factor = 10f64.powi(decimals);
    (value * factor).round() / factor
}
