//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! Inbound request
//!     → server.rs (Axum router, request id, tracing, CORS)
//!     → proxy.rs (select node, forward, record outcome)
//!         → client.rs (pooled connection to the node)
//!     → response.rs (error mapping)
//!     → Send to client
//!
//! GET /status
//!     → status.rs (registry + engine + metrics snapshot)
//! ```

pub mod client;
pub mod proxy;
pub mod request;
pub mod response;
pub mod server;
pub mod status;

pub use proxy::{ProxyGateway, PROCESS_PATH};
pub use request::X_REQUEST_ID;
pub use response::{ErrorResponse, ProxyError};
pub use server::{AppState, BalancerServer};
pub use status::{NodeStatus, StatusReport, StatusReporter};
