//! Health checking subsystem.
//!
//! # Data Flow
//! ```text
//! Active health checks (active.rs):
//!     Periodic timer
//!     → Probe each node concurrently (bounded by timeout)
//!     → Store liveness flag on the node
//!     → Selection reads the flags when building the healthy subset
//! ```
//!
//! # Design Decisions
//! - A single probe decides the flag; no thresholds, no backoff
//! - A flapping node is simply re-probed next cycle
//! - Health state is per-node; probe errors never leave the monitor

pub mod active;

pub use active::HealthMonitor;
