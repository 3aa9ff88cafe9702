//! Structured logging.
//!
//! # Responsibilities
//! - Initialize the tracing subscriber once at startup
//! - Honor `RUST_LOG` over the configured level
//!
//! # Design Decisions
//! - Uses tracing crate for structured logging
//! - Human-readable fmt layer; fields carry node ids and request ids

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Install the global subscriber.
///
/// `default_level` applies to this crate and `tower_http` when `RUST_LOG` is
/// unset. Calling this twice is harmless; the second call is ignored.
pub fn init_logging(default_level: &str) {
    init_logging_for("node_balancer", default_level);
}

/// Same as `init_logging`, for a binary whose log target is `target`.
pub fn init_logging_for(target: &str, default_level: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(format!(
            "{target}={level},node_balancer={level},tower_http={level}",
            target = target,
            level = default_level
        ))
    });

    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .try_init();
}
