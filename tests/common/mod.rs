//! Shared utilities for integration tests.

#![allow(dead_code)]

use axum::{
    body::Bytes,
    extract::State,
    http::{Method, StatusCode},
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use serde_json::{json, Value};
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;

use node_balancer::config::{BalancerConfig, NodeConfig};
use node_balancer::http::AppState;
use node_balancer::lifecycle::Shutdown;
use node_balancer::BalancerServer;

/// How a mock node answers `/api/process`.
#[derive(Debug, Clone)]
pub enum Behavior {
    /// 200 with a JSON payload after `delay`.
    Ok { delay: Duration },
    /// The given status with a JSON error payload.
    Status(u16),
    /// 200 with a body that is not JSON.
    NotJson,
}

impl Behavior {
    pub fn fast() -> Self {
        Behavior::Ok {
            delay: Duration::ZERO,
        }
    }

    pub fn slow(millis: u64) -> Self {
        Behavior::Ok {
            delay: Duration::from_millis(millis),
        }
    }
}

struct MockNode {
    id: String,
    behavior: Behavior,
    hits: AtomicU64,
}

/// Handle to a running mock node.
pub struct NodeHandle {
    pub id: String,
    pub addr: SocketAddr,
    node: Arc<MockNode>,
}

impl NodeHandle {
    pub fn config(&self, weight: u32) -> NodeConfig {
        NodeConfig::new(self.id.clone(), format!("http://{}", self.addr), weight)
    }

    pub fn hits(&self) -> u64 {
        self.node.hits.load(Ordering::SeqCst)
    }
}

/// Start a mock node on an ephemeral port.
pub async fn start_mock_node(id: &str, behavior: Behavior) -> NodeHandle {
    let node = Arc::new(MockNode {
        id: id.to_string(),
        behavior,
        hits: AtomicU64::new(0),
    });

    let app = Router::new()
        .route("/health", get(health))
        .route("/api/process", get(process).post(process))
        .with_state(node.clone());

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        let _ = axum::serve(listener, app).await;
    });

    NodeHandle {
        id: id.to_string(),
        addr,
        node,
    }
}

async fn health(State(node): State<Arc<MockNode>>) -> impl IntoResponse {
    Json(json!({ "status": "healthy", "server_id": node.id }))
}

async fn process(State(node): State<Arc<MockNode>>, method: Method, body: Bytes) -> Response {
    node.hits.fetch_add(1, Ordering::SeqCst);
    match &node.behavior {
        Behavior::Ok { delay } => {
            tokio::time::sleep(*delay).await;
            let request_data = if method == Method::POST {
                serde_json::from_slice::<Value>(&body).unwrap_or(Value::Null)
            } else {
                Value::Null
            };
            Json(json!({
                "message": "Request processed successfully",
                "server_id": node.id,
                "method": method.as_str(),
                "request_data": request_data,
            }))
            .into_response()
        }
        Behavior::Status(code) => {
            let status = StatusCode::from_u16(*code).unwrap();
            (status, Json(json!({ "error": "mock failure", "server_id": node.id }))).into_response()
        }
        Behavior::NotJson => "plain text".into_response(),
    }
}

/// An address nothing listens on.
pub async fn closed_addr() -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    listener.local_addr().unwrap()
}

/// Balancer config for tests: no health checks unless a test turns them on.
pub fn test_config(nodes: Vec<NodeConfig>) -> BalancerConfig {
    let mut config = BalancerConfig {
        balancer_id: "lb_test".to_string(),
        nodes,
        ..BalancerConfig::default()
    };
    config.listener.bind_address = "127.0.0.1:0".to_string();
    config.health_check.enabled = false;
    config
}

/// A running balancer.
pub struct TestBalancer {
    pub url: String,
    pub state: AppState,
    pub shutdown: Shutdown,
}

impl TestBalancer {
    pub async fn start(config: BalancerConfig) -> Self {
        let server = BalancerServer::new(config).unwrap();
        let state = server.state().clone();
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let shutdown = Shutdown::new();
        let receiver = shutdown.subscribe();
        tokio::spawn(async move {
            let _ = server.run(listener, receiver).await;
        });

        Self {
            url: format!("http://{}", addr),
            state,
            shutdown,
        }
    }

    pub async fn get(&self, path: &str) -> (u16, Value) {
        let res = reqwest::get(format!("{}{}", self.url, path)).await.unwrap();
        let status = res.status().as_u16();
        (status, res.json().await.unwrap())
    }

    pub async fn post(&self, path: &str, body: Value) -> (u16, Value) {
        let res = reqwest::Client::new()
            .post(format!("{}{}", self.url, path))
            .json(&body)
            .send()
            .await
            .unwrap();
        let status = res.status().as_u16();
        (status, res.json().await.unwrap())
    }

    /// Node ids of `n` sequential `/api/process` calls.
    pub async fn sequence(&self, n: usize) -> Vec<String> {
        let mut ids = Vec::with_capacity(n);
        for _ in 0..n {
            let (status, body) = self.get("/api/process").await;
            assert_eq!(status, 200, "unexpected response: {}", body);
            ids.push(body["server_id"].as_str().unwrap().to_string());
        }
        ids
    }
}

impl Drop for TestBalancer {
    fn drop(&mut self) {
        self.shutdown.trigger();
    }
}
