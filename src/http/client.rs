//! Outbound HTTP client shared by the gateway and the health monitor.

use axum::body::Body;
use hyper_util::{
    client::legacy::{connect::HttpConnector, Client},
    rt::TokioExecutor,
};

/// Pooled HTTP/1.1 client for talking to nodes.
pub type NodeClient = Client<HttpConnector, Body>;

pub fn build_client() -> NodeClient {
    let mut connector = HttpConnector::new();
    connector.set_nodelay(true);
    Client::builder(TokioExecutor::new()).build(connector)
}
