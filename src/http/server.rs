//! HTTP server setup and configuration.
//!
//! # Responsibilities
//! - Build every subsystem from a validated `BalancerConfig`
//! - Create the Axum router with the balancer's endpoints
//! - Wire up middleware (request id, tracing, CORS, body limit)
//! - Run the health monitor alongside the listener until shutdown

use axum::{
    body::Bytes,
    extract::{DefaultBodyLimit, State},
    http::{HeaderMap, Method},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tower::ServiceBuilder;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::config::{validate_config, BalancerConfig, ConfigError};
use crate::health::HealthMonitor;
use crate::http::client::build_client;
use crate::http::proxy::{ProxyGateway, PROCESS_PATH};
use crate::http::request::{propagate_request_id_layer, set_request_id_layer};
use crate::http::response::ProxyError;
use crate::http::status::StatusReporter;
use crate::load_balancer::{Algorithm, NodeRegistry, SelectionEngine};
use crate::stats::MetricsStore;

/// Application state injected into handlers.
#[derive(Clone)]
pub struct AppState {
    pub balancer_id: String,
    pub registry: Arc<NodeRegistry>,
    pub engine: Arc<SelectionEngine>,
    pub metrics: Arc<MetricsStore>,
    pub gateway: Arc<ProxyGateway>,
    pub reporter: Arc<StatusReporter>,
}

/// The load balancer's HTTP front end.
pub struct BalancerServer {
    router: Router,
    state: AppState,
    monitor: HealthMonitor,
}

impl BalancerServer {
    /// Validate `config` and assemble every subsystem.
    pub fn new(config: BalancerConfig) -> Result<Self, ConfigError> {
        validate_config(&config).map_err(ConfigError::Validation)?;

        let registry = Arc::new(NodeRegistry::new(&config.nodes)?);
        let metrics = Arc::new(MetricsStore::new(registry.len(), config.history.capacity));
        let engine = Arc::new(SelectionEngine::new(
            config.algorithm,
            config.selection.untested_response_time_secs,
        ));
        let client = build_client();

        let gateway = Arc::new(ProxyGateway::new(
            config.balancer_id.clone(),
            registry.clone(),
            engine.clone(),
            metrics.clone(),
            client.clone(),
            Duration::from_secs(config.timeouts.backend_secs),
            config.limits.max_body_bytes,
        ));
        let reporter = Arc::new(StatusReporter::new(
            config.balancer_id.clone(),
            registry.clone(),
            engine.clone(),
            metrics.clone(),
            config.history.status_window,
        ));
        let monitor = HealthMonitor::new(registry.clone(), config.health_check.clone(), client);

        let state = AppState {
            balancer_id: config.balancer_id.clone(),
            registry,
            engine,
            metrics,
            gateway,
            reporter,
        };
        let router = Self::build_router(state.clone(), config.limits.max_body_bytes);

        Ok(Self {
            router,
            state,
            monitor,
        })
    }

    /// Build the Axum router with all middleware layers.
    fn build_router(state: AppState, max_body_bytes: usize) -> Router {
        Router::new()
            .route("/health", get(health_handler))
            .route(PROCESS_PATH, get(process_handler).post(process_handler))
            .route("/status", get(status_handler))
            .route("/algorithm", post(algorithm_handler))
            .route("/reset", post(reset_handler))
            .with_state(state)
            .layer(DefaultBodyLimit::max(max_body_bytes))
            .layer(
                ServiceBuilder::new()
                    .layer(set_request_id_layer())
                    .layer(TraceLayer::new_for_http())
                    .layer(propagate_request_id_layer())
                    .layer(CorsLayer::permissive()),
            )
    }

    /// A clone of the router, for serving or in-process testing.
    pub fn router(&self) -> Router {
        self.router.clone()
    }

    pub fn state(&self) -> &AppState {
        &self.state
    }

    /// Serve on `listener` until `shutdown` fires, then stop the health monitor.
    pub async fn run(
        self,
        listener: TcpListener,
        mut shutdown: broadcast::Receiver<()>,
    ) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        tracing::info!(
            address = %addr,
            balancer_id = %self.state.balancer_id,
            algorithm = %self.state.engine.algorithm(),
            nodes = self.state.registry.len(),
            "Load balancer listening"
        );

        let monitor = self.monitor.spawn(shutdown.resubscribe());

        axum::serve(listener, self.router)
            .with_graceful_shutdown(async move {
                let _ = shutdown.recv().await;
            })
            .await?;

        if let Err(e) = monitor.await {
            tracing::error!(error = %e, "Health monitor task failed");
        }

        tracing::info!("HTTP server stopped");
        Ok(())
    }
}

async fn health_handler(State(state): State<AppState>) -> impl IntoResponse {
    Json(json!({
        "status": "healthy",
        "load_balancer_id": state.balancer_id,
    }))
}

async fn process_handler(
    State(state): State<AppState>,
    method: Method,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    match state.gateway.handle(method, &headers, body).await {
        Ok(proxied) => (proxied.status, Json(proxied.payload)).into_response(),
        Err(e) => e.with_balancer(&state.balancer_id).into_response(),
    }
}

async fn status_handler(State(state): State<AppState>) -> impl IntoResponse {
    Json(state.reporter.report())
}

#[derive(Debug, Deserialize)]
struct AlgorithmRequest {
    algorithm: Option<String>,
}

async fn algorithm_handler(State(state): State<AppState>, body: Bytes) -> Response {
    let given = serde_json::from_slice::<AlgorithmRequest>(&body)
        .ok()
        .and_then(|req| req.algorithm);

    let algorithm = match given.as_deref().map(str::parse::<Algorithm>) {
        Some(Ok(algorithm)) => algorithm,
        _ => {
            tracing::warn!(given = ?given, "Rejected algorithm change");
            return ProxyError::InvalidAlgorithm
                .with_balancer(&state.balancer_id)
                .into_response();
        }
    };

    let previous = state.engine.set_algorithm(algorithm);
    tracing::info!(previous = %previous, current = %algorithm, "Algorithm changed");

    Json(json!({
        "message": format!("Algorithm changed to {}", algorithm),
        "current": algorithm,
        "previous": previous,
    }))
    .into_response()
}

async fn reset_handler(State(state): State<AppState>) -> impl IntoResponse {
    state.metrics.reset();
    tracing::info!("Statistics reset");
    Json(json!({ "message": "Statistics reset successfully" }))
}
