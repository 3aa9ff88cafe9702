//! End-to-end tests: a real balancer in front of mock nodes.

use serde_json::json;
use std::time::{Duration, Instant};

mod common;

use common::{start_mock_node, test_config, Behavior, TestBalancer};
use node_balancer::Algorithm;

#[tokio::test]
async fn test_round_robin_rotates_in_order() {
    let a = start_mock_node("a", Behavior::fast()).await;
    let b = start_mock_node("b", Behavior::fast()).await;
    let c = start_mock_node("c", Behavior::fast()).await;
    let lb = TestBalancer::start(test_config(vec![a.config(1), b.config(1), c.config(1)])).await;

    assert_eq!(lb.sequence(6).await, ["a", "b", "c", "a", "b", "c"]);
}

#[tokio::test]
async fn test_payload_is_augmented() {
    let a = start_mock_node("a", Behavior::fast()).await;
    let lb = TestBalancer::start(test_config(vec![a.config(1)])).await;

    let (status, body) = lb.get("/api/process").await;
    assert_eq!(status, 200);
    assert_eq!(body["server_id"], "a");
    assert_eq!(body["message"], "Request processed successfully");
    assert_eq!(body["load_balancer_id"], "lb_test");
    assert_eq!(body["algorithm"], "round_robin");
}

#[tokio::test]
async fn test_weighted_follows_weights() {
    let a = start_mock_node("a", Behavior::fast()).await;
    let b = start_mock_node("b", Behavior::fast()).await;
    let c = start_mock_node("c", Behavior::fast()).await;
    let mut config = test_config(vec![a.config(3), b.config(2), c.config(1)]);
    config.algorithm = Algorithm::Weighted;
    let lb = TestBalancer::start(config).await;

    assert_eq!(
        lb.sequence(12).await,
        ["a", "a", "a", "b", "b", "c", "a", "a", "a", "b", "b", "c"]
    );
}

#[tokio::test]
async fn test_post_body_is_forwarded() {
    let a = start_mock_node("a", Behavior::fast()).await;
    let lb = TestBalancer::start(test_config(vec![a.config(1)])).await;

    let (status, body) = lb
        .post("/api/process", json!({ "task": "resize", "size": [640, 480] }))
        .await;
    assert_eq!(status, 200);
    assert_eq!(body["method"], "POST");
    assert_eq!(body["request_data"], json!({ "task": "resize", "size": [640, 480] }));
}

#[tokio::test]
async fn test_all_unhealthy_returns_503() {
    let a = start_mock_node("a", Behavior::fast()).await;
    let b = start_mock_node("b", Behavior::fast()).await;
    let lb = TestBalancer::start(test_config(vec![a.config(1), b.config(1)])).await;
    for node in lb.state.registry.all() {
        node.set_healthy(false);
    }

    let (status, body) = lb.get("/api/process").await;
    assert_eq!(status, 503);
    assert_eq!(body["error"], "No healthy backend servers available");
    assert_eq!(body["load_balancer"], "lb_test");
    assert_eq!(a.hits() + b.hits(), 0);

    let (_, status) = lb.get("/status").await;
    assert_eq!(status["statistics"]["total_requests"], 1);
    assert_eq!(status["statistics"]["failed_requests"], 1);
    assert_eq!(status["recent_requests"].as_array().unwrap().len(), 0);
    for node in status["backend_servers"].as_array().unwrap() {
        assert_eq!(node["total_requests"], 0);
    }
}

#[tokio::test]
async fn test_unhealthy_node_is_skipped() {
    let a = start_mock_node("a", Behavior::fast()).await;
    let b = start_mock_node("b", Behavior::fast()).await;
    let lb = TestBalancer::start(test_config(vec![a.config(1), b.config(1)])).await;
    lb.state.registry.get("a").unwrap().set_healthy(false);

    assert_eq!(lb.sequence(3).await, ["b", "b", "b"]);
    assert_eq!(a.hits(), 0);
}

#[tokio::test]
async fn test_backend_error_names_node() {
    let a = start_mock_node("a", Behavior::Status(500)).await;
    let lb = TestBalancer::start(test_config(vec![a.config(1)])).await;

    let (status, body) = lb.get("/api/process").await;
    assert_eq!(status, 500);
    assert_eq!(body["server"], "a");
    assert_eq!(body["load_balancer"], "lb_test");

    let (_, status) = lb.get("/status").await;
    assert_eq!(status["statistics"]["total_requests"], 1);
    assert_eq!(status["statistics"]["failed_requests"], 1);
    assert_eq!(status["statistics"]["successful_requests"], 0);
    let node = &status["backend_servers"][0];
    assert_eq!(node["failed_requests"], 1);
    assert_eq!(node["total_requests"], 1);
    assert_eq!(node["active_connections"], 0);
    assert_eq!(node["avg_response_time"], 0.0);
    assert_eq!(status["recent_requests"][0]["status"], "failed");
}

#[tokio::test]
async fn test_non_json_payload_is_backend_error() {
    let a = start_mock_node("a", Behavior::NotJson).await;
    let lb = TestBalancer::start(test_config(vec![a.config(1)])).await;

    let (status, body) = lb.get("/api/process").await;
    assert_eq!(status, 500);
    assert_eq!(body["server"], "a");
}

#[tokio::test]
async fn test_client_error_passes_through() {
    let a = start_mock_node("a", Behavior::Status(404)).await;
    let lb = TestBalancer::start(test_config(vec![a.config(1)])).await;

    let (status, body) = lb.get("/api/process").await;
    assert_eq!(status, 404);
    assert_eq!(body["server_id"], "a");
    assert_eq!(body["load_balancer_id"], "lb_test");
}

#[tokio::test]
async fn test_backend_timeout() {
    let a = start_mock_node("a", Behavior::slow(3_000)).await;
    let mut config = test_config(vec![a.config(1)]);
    config.timeouts.backend_secs = 1;
    let lb = TestBalancer::start(config).await;

    let started = Instant::now();
    let (status, body) = lb.get("/api/process").await;
    assert_eq!(status, 500);
    assert_eq!(body["server"], "a");
    assert!(started.elapsed() < Duration::from_millis(2_500));

    let (_, status) = lb.get("/status").await;
    let node = &status["backend_servers"][0];
    assert_eq!(node["failed_requests"], 1);
    assert_eq!(node["active_connections"], 0);
}

#[tokio::test]
async fn test_unreachable_node_fails_request() {
    let addr = common::closed_addr().await;
    let config = test_config(vec![node_balancer::config::NodeConfig::new(
        "gone",
        format!("http://{}", addr),
        1,
    )]);
    let lb = TestBalancer::start(config).await;

    let (status, body) = lb.get("/api/process").await;
    assert_eq!(status, 500);
    assert_eq!(body["server"], "gone");
}

#[tokio::test]
async fn test_algorithm_switch() {
    let a = start_mock_node("a", Behavior::fast()).await;
    let lb = TestBalancer::start(test_config(vec![a.config(1)])).await;

    let (status, body) = lb.post("/algorithm", json!({ "algorithm": "bogus" })).await;
    assert_eq!(status, 400);
    assert_eq!(body["error"], "Invalid algorithm");
    assert_eq!(
        body["valid_options"],
        json!(["round_robin", "least_connections", "weighted", "least_response_time"])
    );
    assert_eq!(lb.get("/status").await.1["algorithm"], "round_robin");

    let (status, body) = lb
        .post("/algorithm", json!({ "algorithm": "least_connections" }))
        .await;
    assert_eq!(status, 200);
    assert_eq!(body["message"], "Algorithm changed to least_connections");
    assert_eq!(lb.get("/status").await.1["algorithm"], "least_connections");

    let (_, body) = lb.get("/api/process").await;
    assert_eq!(body["algorithm"], "least_connections");
}

#[tokio::test]
async fn test_least_response_time_prefers_faster_node() {
    let slow = start_mock_node("slow", Behavior::slow(200)).await;
    let fast = start_mock_node("fast", Behavior::slow(10)).await;
    let lb = TestBalancer::start(test_config(vec![slow.config(1), fast.config(1)])).await;

    // Round robin gives both nodes a sample first.
    assert_eq!(lb.sequence(2).await, ["slow", "fast"]);

    lb.post("/algorithm", json!({ "algorithm": "least_response_time" }))
        .await;
    assert_eq!(lb.sequence(3).await, ["fast", "fast", "fast"]);
}

#[tokio::test]
async fn test_reset_zeroes_statistics() {
    let a = start_mock_node("a", Behavior::fast()).await;
    let b = start_mock_node("b", Behavior::Status(500)).await;
    let lb = TestBalancer::start(test_config(vec![a.config(1), b.config(1)])).await;
    for _ in 0..4 {
        lb.get("/api/process").await;
    }

    let (status, body) = lb.post("/reset", json!({})).await;
    assert_eq!(status, 200);
    assert_eq!(body["message"], "Statistics reset successfully");

    let (_, status) = lb.get("/status").await;
    assert_eq!(status["statistics"]["total_requests"], 0);
    assert_eq!(status["statistics"]["successful_requests"], 0);
    assert_eq!(status["statistics"]["failed_requests"], 0);
    assert_eq!(status["recent_requests"].as_array().unwrap().len(), 0);
    for node in status["backend_servers"].as_array().unwrap() {
        assert_eq!(node["total_requests"], 0);
        assert_eq!(node["failed_requests"], 0);
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_reset_during_in_flight_request() {
    let a = start_mock_node("a", Behavior::slow(500)).await;
    let lb = TestBalancer::start(test_config(vec![a.config(1)])).await;

    let url = format!("{}/api/process", lb.url);
    let in_flight = tokio::spawn(async move { reqwest::get(url).await.unwrap().status() });

    tokio::time::sleep(Duration::from_millis(150)).await;
    assert_eq!(lb.get("/status").await.1["backend_servers"][0]["active_connections"], 1);
    lb.post("/reset", json!({})).await;

    assert_eq!(in_flight.await.unwrap().as_u16(), 200);

    let (_, status) = lb.get("/status").await;
    assert_eq!(status["statistics"]["total_requests"], 0);
    assert_eq!(status["statistics"]["successful_requests"], 0);
    assert_eq!(status["recent_requests"].as_array().unwrap().len(), 0);
    assert_eq!(status["backend_servers"][0]["active_connections"], 0);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_requests_keep_counters_consistent() {
    let a = start_mock_node("a", Behavior::slow(20)).await;
    let b = start_mock_node("b", Behavior::slow(20)).await;
    let mut config = test_config(vec![a.config(1), b.config(1)]);
    config.algorithm = Algorithm::LeastConnections;
    let lb = TestBalancer::start(config).await;

    let client = reqwest::Client::new();
    let mut tasks = Vec::new();
    for _ in 0..40 {
        let client = client.clone();
        let url = format!("{}/api/process", lb.url);
        tasks.push(tokio::spawn(async move {
            client.get(url).send().await.unwrap().status().as_u16()
        }));
    }
    for task in tasks {
        assert_eq!(task.await.unwrap(), 200);
    }

    let (_, status) = lb.get("/status").await;
    assert_eq!(status["statistics"]["total_requests"], 40);
    assert_eq!(status["statistics"]["successful_requests"], 40);

    let nodes = status["backend_servers"].as_array().unwrap();
    let per_node: u64 = nodes
        .iter()
        .map(|n| n["total_requests"].as_u64().unwrap())
        .sum();
    assert_eq!(per_node, 40);
    assert_eq!(a.hits() + b.hits(), 40);
    for node in nodes {
        assert_eq!(node["active_connections"], 0);
    }
    assert_eq!(status["recent_requests"].as_array().unwrap().len(), 20);
}

#[tokio::test]
async fn test_health_monitor_marks_dead_node() {
    let a = start_mock_node("a", Behavior::fast()).await;
    let dead = common::closed_addr().await;
    let mut config = test_config(vec![
        a.config(1),
        node_balancer::config::NodeConfig::new("dead", format!("http://{}", dead), 1),
    ]);
    config.health_check.enabled = true;
    config.health_check.interval_secs = 1;
    config.health_check.timeout_secs = 1;
    let lb = TestBalancer::start(config).await;

    let deadline = Instant::now() + Duration::from_secs(5);
    loop {
        let (_, status) = lb.get("/status").await;
        if status["backend_servers"][1]["healthy"] == false {
            assert_eq!(status["backend_servers"][0]["healthy"], true);
            break;
        }
        assert!(Instant::now() < deadline, "dead node never marked unhealthy");
        tokio::time::sleep(Duration::from_millis(100)).await;
    }

    assert_eq!(lb.sequence(4).await, ["a", "a", "a", "a"]);
}

#[tokio::test]
async fn test_request_id_is_echoed() {
    let a = start_mock_node("a", Behavior::fast()).await;
    let lb = TestBalancer::start(test_config(vec![a.config(1)])).await;

    let res = reqwest::Client::new()
        .get(format!("{}/api/process", lb.url))
        .header("x-request-id", "trace-42")
        .send()
        .await
        .unwrap();
    assert_eq!(res.headers()["x-request-id"], "trace-42");

    let (_, status) = lb.get("/status").await;
    assert_eq!(status["recent_requests"][0]["request_id"], "trace-42");
    assert_eq!(status["recent_requests"][0]["server_id"], "a");
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_abandoned_request_is_recorded_as_failed() {
    let a = start_mock_node("a", Behavior::slow(800)).await;
    let lb = TestBalancer::start(test_config(vec![a.config(1)])).await;

    let impatient = reqwest::Client::builder()
        .timeout(Duration::from_millis(200))
        .build()
        .unwrap();
    let result = impatient.get(format!("{}/api/process", lb.url)).send().await;
    assert!(result.is_err());

    let deadline = Instant::now() + Duration::from_secs(3);
    let status = loop {
        let (_, status) = lb.get("/status").await;
        if status["backend_servers"][0]["active_connections"] == 0 {
            break status;
        }
        assert!(Instant::now() < deadline, "connection slot never released");
        tokio::time::sleep(Duration::from_millis(50)).await;
    };

    let stats = &status["statistics"];
    assert_eq!(stats["total_requests"], 1);
    assert_eq!(stats["successful_requests"], 0);
    assert_eq!(stats["failed_requests"], 1);
    assert_eq!(status["backend_servers"][0]["failed_requests"], 1);
    assert_eq!(status["recent_requests"][0]["status"], "failed");
}

#[tokio::test]
async fn test_cors_allows_any_origin() {
    let a = start_mock_node("a", Behavior::fast()).await;
    let lb = TestBalancer::start(test_config(vec![a.config(1)])).await;

    let res = reqwest::Client::new()
        .get(format!("{}/status", lb.url))
        .header("origin", "http://dashboard.local")
        .send()
        .await
        .unwrap();
    assert_eq!(res.status().as_u16(), 200);
    assert_eq!(res.headers()["access-control-allow-origin"], "*");
}
