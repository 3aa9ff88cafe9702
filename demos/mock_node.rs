//! Simulated compute node for local demos.
//!
//! ```text
//! cargo run --example mock_node -- --id backend_1 --port 5001
//! ```
//!
//! Serves `/health` and `/api/process`. Processing sleeps for `delay` plus a
//! random jitter and fails with probability `failure_rate`.

use axum::{
    body::Bytes,
    extract::State,
    http::{Method, StatusCode},
    response::IntoResponse,
    routing::get,
    Json, Router,
};
use clap::Parser;
use serde_json::{json, Value};
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::net::TcpListener;

use node_balancer::lifecycle::wait_for_signal;
use node_balancer::observability::logging;

#[derive(Parser, Debug, Clone)]
#[command(name = "mock_node", about = "Simulated backend node")]
struct Cli {
    /// Identifier returned as `server_id`
    #[arg(long, env = "SERVER_ID", default_value = "backend_default")]
    id: String,

    #[arg(short, long, env = "SERVER_PORT", default_value_t = 5001)]
    port: u16,

    /// Base processing time in seconds
    #[arg(long, env = "RESPONSE_DELAY", default_value_t = 0.1)]
    delay: f64,

    /// Extra random processing time in seconds, added on top of `delay`
    #[arg(long, default_value_t = 0.2)]
    jitter: f64,

    /// Probability in [0, 1] that a request answers 500
    #[arg(long, default_value_t = 0.0)]
    failure_rate: f64,
}

struct NodeState {
    cli: Cli,
    started: Instant,
    handled: AtomicU64,
    errors: AtomicU64,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    logging::init_logging_for("mock_node", "info");

    let addr = SocketAddr::from(([0, 0, 0, 0], cli.port));
    let state = Arc::new(NodeState {
        cli,
        started: Instant::now(),
        handled: AtomicU64::new(0),
        errors: AtomicU64::new(0),
    });

    let app = Router::new()
        .route("/health", get(health))
        .route("/api/process", get(process).post(process))
        .with_state(state.clone());

    let listener = TcpListener::bind(addr).await?;
    tracing::info!(node = %state.cli.id, address = %addr, "Mock node listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(wait_for_signal())
        .await?;
    Ok(())
}

async fn health(State(state): State<Arc<NodeState>>) -> impl IntoResponse {
    Json(json!({
        "status": "healthy",
        "server_id": state.cli.id,
        "port": state.cli.port,
        "uptime": state.started.elapsed().as_secs_f64(),
        "requests_handled": state.handled.load(Ordering::Relaxed),
        "errors": state.errors.load(Ordering::Relaxed),
    }))
}

async fn process(
    State(state): State<Arc<NodeState>>,
    method: Method,
    body: Bytes,
) -> impl IntoResponse {
    let started = Instant::now();
    let number = state.handled.fetch_add(1, Ordering::Relaxed) + 1;

    let sleep = state.cli.delay.max(0.0) + fastrand::f64() * state.cli.jitter.max(0.0);
    tokio::time::sleep(Duration::from_secs_f64(sleep)).await;

    if fastrand::f64() < state.cli.failure_rate {
        state.errors.fetch_add(1, Ordering::Relaxed);
        tracing::warn!(request = number, "Injected failure");
        return (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({
                "error": "Internal server error",
                "server_id": state.cli.id,
                "details": "injected failure",
            })),
        );
    }

    let request_data = if method == Method::POST {
        Some(serde_json::from_slice::<Value>(&body).unwrap_or_else(|_| json!({})))
    } else {
        None
    };

    let elapsed = started.elapsed().as_secs_f64();
    tracing::info!(request = number, elapsed_secs = elapsed, "Processed request");

    (
        StatusCode::OK,
        Json(json!({
            "message": "Request processed successfully",
            "server_id": state.cli.id,
            "server_port": state.cli.port,
            "request_number": number,
            "processing_time": elapsed,
            "timestamp": chrono::Utc::now().to_rfc3339(),
            "method": method.as_str(),
            "request_data": request_data,
        })),
    )
}
