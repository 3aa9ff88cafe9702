//! Error responses.
//!
//! # Responsibilities
//! - Name every way a balancer request can fail
//! - Map each failure to its HTTP status and JSON body
//!
//! # Design Decisions
//! - No-node is 503; any failure of the chosen node is 500 and names the node
//! - Bodies always carry the balancer id so callers can tell which instance answered

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use std::time::Duration;

use crate::load_balancer::Algorithm;

/// Request-level failures.
#[derive(Debug, thiserror::Error)]
pub enum ProxyError {
    #[error("No healthy backend servers available")]
    NoHealthyNode,

    #[error("backend '{node_id}' did not respond within {timeout:?}")]
    BackendTimeout { node_id: String, timeout: Duration },

    #[error("backend '{node_id}' failed: {detail}")]
    Backend { node_id: String, detail: String },

    #[error("Invalid algorithm")]
    InvalidAlgorithm,
}

impl ProxyError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            ProxyError::NoHealthyNode => StatusCode::SERVICE_UNAVAILABLE,
            ProxyError::BackendTimeout { .. } | ProxyError::Backend { .. } => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
            ProxyError::InvalidAlgorithm => StatusCode::BAD_REQUEST,
        }
    }

    /// Node that failed, if the error is attributable to one.
    pub fn node_id(&self) -> Option<&str> {
        match self {
            ProxyError::BackendTimeout { node_id, .. } | ProxyError::Backend { node_id, .. } => {
                Some(node_id)
            }
            _ => None,
        }
    }

    /// Attach the answering balancer's id for rendering.
    pub fn with_balancer(self, balancer_id: &str) -> ErrorResponse {
        ErrorResponse {
            balancer_id: balancer_id.to_string(),
            error: self,
        }
    }
}

/// A `ProxyError` ready to be sent to the caller.
#[derive(Debug)]
pub struct ErrorResponse {
    pub balancer_id: String,
    pub error: ProxyError,
}

impl ErrorResponse {
    fn body(&self) -> serde_json::Value {
        match &self.error {
            ProxyError::NoHealthyNode => json!({
                "error": self.error.to_string(),
                "load_balancer": self.balancer_id,
            }),
            ProxyError::BackendTimeout { node_id, .. } | ProxyError::Backend { node_id, .. } => json!({
                "error": self.error.to_string(),
                "server": node_id,
                "load_balancer": self.balancer_id,
            }),
            ProxyError::InvalidAlgorithm => json!({
                "error": self.error.to_string(),
                "valid_options": Algorithm::valid_options(),
            }),
        }
    }
}

impl IntoResponse for ErrorResponse {
    fn into_response(self) -> Response {
        (self.error.status_code(), Json(self.body())).into_response()
    }
}
