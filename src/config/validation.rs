//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Check node identity and weights
//! - Validate value ranges (timeouts > 0, capacities > 0)
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: BalancerConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use std::collections::HashSet;

use crate::config::schema::BalancerConfig;
use crate::load_balancer::backend::parse_node_address;

/// A single semantic problem found in a configuration.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("balancer_id must not be empty")]
    EmptyBalancerId,
    #[error("at least one node must be configured")]
    NoNodes,
    #[error("node #{index} has an empty id")]
    EmptyNodeId { index: usize },
    #[error("duplicate node id '{id}'")]
    DuplicateNodeId { id: String },
    #[error("node '{id}' has weight 0; weight must be at least 1")]
    ZeroWeight { id: String },
    #[error("node '{id}' has invalid address '{address}': {reason}")]
    InvalidAddress {
        id: String,
        address: String,
        reason: String,
    },
    #[error("{field} must be greater than zero")]
    NotPositive { field: &'static str },
    #[error("health_check.path must start with '/'")]
    InvalidHealthPath,
    #[error("selection.untested_response_time_secs must be a finite value >= 0")]
    InvalidUntestedDefault,
}

/// Check a configuration, collecting every problem found.
pub fn validate_config(config: &BalancerConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.balancer_id.trim().is_empty() {
        errors.push(ValidationError::EmptyBalancerId);
    }

    if config.nodes.is_empty() {
        errors.push(ValidationError::NoNodes);
    }

    let mut seen = HashSet::new();
    for (index, node) in config.nodes.iter().enumerate() {
        if node.id.trim().is_empty() {
            errors.push(ValidationError::EmptyNodeId { index });
        } else if !seen.insert(node.id.as_str()) {
            errors.push(ValidationError::DuplicateNodeId { id: node.id.clone() });
        }

        if node.weight == 0 {
            errors.push(ValidationError::ZeroWeight { id: node.id.clone() });
        }

        if let Err(reason) = parse_node_address(&node.address) {
            errors.push(ValidationError::InvalidAddress {
                id: node.id.clone(),
                address: node.address.clone(),
                reason,
            });
        }
    }

    if config.health_check.interval_secs == 0 {
        errors.push(ValidationError::NotPositive { field: "health_check.interval_secs" });
    }
    if config.health_check.timeout_secs == 0 {
        errors.push(ValidationError::NotPositive { field: "health_check.timeout_secs" });
    }
    if !config.health_check.path.starts_with('/') {
        errors.push(ValidationError::InvalidHealthPath);
    }
    if config.timeouts.backend_secs == 0 {
        errors.push(ValidationError::NotPositive { field: "timeouts.backend_secs" });
    }
    if config.history.capacity == 0 {
        errors.push(ValidationError::NotPositive { field: "history.capacity" });
    }
    if config.history.status_window == 0 {
        errors.push(ValidationError::NotPositive { field: "history.status_window" });
    }
    if config.limits.max_body_bytes == 0 {
        errors.push(ValidationError::NotPositive { field: "limits.max_body_bytes" });
    }

    let untested = config.selection.untested_response_time_secs;
    if !untested.is_finite() || untested < 0.0 {
        errors.push(ValidationError::InvalidUntestedDefault);
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
