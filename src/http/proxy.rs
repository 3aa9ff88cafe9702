//! Proxy gateway.
//!
//! # Responsibilities
//! - Count the request, select a node, forward, measure, record
//! - Augment the node's JSON payload with balancer id and algorithm
//! - Turn every failure into a per-request `ProxyError`
//!
//! # Design Decisions
//! - One attempt per request: no retry, no failover to another node
//! - The timeout covers the whole call, response body included
//! - The connection slot is held by a guard, so it is released exactly once
//!   even when the caller disconnects mid-flight

use axum::body::{Body, Bytes};
use axum::http::{header, HeaderMap, Method, Request, StatusCode};
use serde_json::{Map, Value};
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::http::client::NodeClient;
use crate::http::request::{request_id, X_REQUEST_ID};
use crate::http::response::ProxyError;
use crate::load_balancer::{Node, NodeRegistry, SelectionEngine};
use crate::observability::metrics;
use crate::stats::MetricsStore;

/// Path every node serves work on.
pub const PROCESS_PATH: &str = "/api/process";

/// Successful proxied reply: the node's status and augmented payload.
#[derive(Debug)]
pub struct Proxied {
    pub status: StatusCode,
    pub payload: Value,
}

pub struct ProxyGateway {
    balancer_id: String,
    registry: Arc<NodeRegistry>,
    engine: Arc<SelectionEngine>,
    metrics: Arc<MetricsStore>,
    client: NodeClient,
    timeout: Duration,
    max_body_bytes: usize,
}

impl ProxyGateway {
    pub fn new(
        balancer_id: impl Into<String>,
        registry: Arc<NodeRegistry>,
        engine: Arc<SelectionEngine>,
        metrics: Arc<MetricsStore>,
        client: NodeClient,
        timeout: Duration,
        max_body_bytes: usize,
    ) -> Self {
        Self {
            balancer_id: balancer_id.into(),
            registry,
            engine,
            metrics,
            client,
            timeout,
            max_body_bytes,
        }
    }

    /// Handle one inbound request end to end.
    pub async fn handle(
        &self,
        method: Method,
        headers: &HeaderMap,
        body: Bytes,
    ) -> Result<Proxied, ProxyError> {
        let request_id = request_id(headers);
        let ticket = self.metrics.open_request();

        let healthy = self.registry.healthy();
        let load = self.metrics.load_snapshot();
        let Some(selection) = self.engine.select(&healthy, &load) else {
            self.metrics.reject(ticket);
            metrics::record_request("none", "rejected", Duration::ZERO);
            tracing::warn!(request_id = %request_id, "No healthy backend servers available");
            return Err(ProxyError::NoHealthyNode);
        };

        let node = selection.node;
        let guard = self.metrics.dispatch(ticket, &node, request_id.clone());

        tracing::debug!(
            request_id = %request_id,
            node = %node.id,
            algorithm = %selection.algorithm,
            method = %method,
            "Forwarding request"
        );

        let started = Instant::now();
        let result = self.forward(&node, method, headers, body, &request_id).await;
        let elapsed = started.elapsed();

        match result {
            Ok((status, mut payload)) => {
                guard.succeed(elapsed);
                metrics::record_request(&node.id, "success", elapsed);

                payload.insert("load_balancer_id".to_string(), Value::from(self.balancer_id.as_str()));
                payload.insert("algorithm".to_string(), Value::from(selection.algorithm.as_str()));

                tracing::debug!(
                    request_id = %request_id,
                    node = %node.id,
                    status = %status,
                    elapsed_ms = elapsed.as_millis() as u64,
                    "Request completed"
                );
                Ok(Proxied {
                    status,
                    payload: Value::Object(payload),
                })
            }
            Err(e) => {
                guard.fail(elapsed);
                metrics::record_request(&node.id, "failed", elapsed);
                tracing::warn!(request_id = %request_id, node = %node.id, error = %e, "Upstream error");
                Err(e)
            }
        }
    }

    async fn forward(
        &self,
        node: &Node,
        method: Method,
        headers: &HeaderMap,
        body: Bytes,
        request_id: &str,
    ) -> Result<(StatusCode, Map<String, Value>), ProxyError> {
        let backend_error = |detail: String| ProxyError::Backend {
            node_id: node.id.clone(),
            detail,
        };

        let mut builder = Request::builder()
            .method(method)
            .uri(node.endpoint(PROCESS_PATH))
            .header(X_REQUEST_ID, request_id);
        for name in [header::CONTENT_TYPE, header::ACCEPT] {
            if let Some(value) = headers.get(&name) {
                builder = builder.header(name, value.clone());
            }
        }
        let request = builder
            .body(Body::from(body))
            .map_err(|e| backend_error(format!("invalid upstream request: {}", e)))?;

        let call = async {
            let response = self
                .client
                .request(request)
                .await
                .map_err(|e| backend_error(format!("connection error: {}", e)))?;
            let status = response.status();
            let bytes = axum::body::to_bytes(Body::new(response.into_body()), self.max_body_bytes)
                .await
                .map_err(|e| backend_error(format!("failed to read response: {}", e)))?;
            Ok::<_, ProxyError>((status, bytes))
        };

        let (status, bytes) = tokio::time::timeout(self.timeout, call)
            .await
            .map_err(|_| ProxyError::BackendTimeout {
                node_id: node.id.clone(),
                timeout: self.timeout,
            })??;

        if status.is_server_error() {
            return Err(backend_error(format!("responded with status {}", status)));
        }

        match serde_json::from_slice::<Value>(&bytes) {
            Ok(Value::Object(payload)) => Ok((status, payload)),
            Ok(_) => Err(backend_error("payload is not a JSON object".to_string())),
            Err(e) => Err(backend_error(format!("invalid JSON payload: {}", e))),
        }
    }
}
