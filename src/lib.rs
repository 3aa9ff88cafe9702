//! HTTP load balancer for a fixed pool of compute nodes.

pub mod config;
pub mod health;
pub mod http;
pub mod lifecycle;
pub mod load_balancer;
pub mod observability;
pub mod stats;

pub use config::schema::BalancerConfig;
pub use http::BalancerServer;
pub use lifecycle::Shutdown;
pub use load_balancer::Algorithm;
