use clap::{Parser, Subcommand};
use futures_util::stream::{self, StreamExt};
use serde_json::{json, Value};
use std::collections::BTreeMap;
use std::time::{Duration, Instant};

#[derive(Parser)]
#[command(name = "balancer-cli")]
#[command(about = "Management CLI for node-balancer", long_about = None)]
struct Cli {
    #[arg(short, long, default_value = "http://localhost:9000", env = "LB_URL")]
    url: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show balancer status, nodes and recent requests
    Status,
    /// Switch the selection algorithm
    Algorithm {
        /// round_robin, least_connections, weighted or least_response_time
        name: String,
    },
    /// Zero all statistics
    Reset,
    /// Send a burst of requests and report how they were distributed
    Send {
        /// Number of requests
        #[arg(short = 'n', long, default_value_t = 20)]
        requests: usize,

        /// Requests in flight at once
        #[arg(short, long, default_value_t = 1)]
        concurrency: usize,
    },
}

/// Outcome of one request sent by `send`.
struct Sample {
    node: Option<String>,
    elapsed: Duration,
    error: Option<String>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let client = reqwest::Client::builder()
        .timeout(Duration::from_secs(10))
        .build()?;

    match cli.command {
        Commands::Status => {
            let res = client.get(format!("{}/status", cli.url)).send().await?;
            print_response(res).await?;
        }
        Commands::Algorithm { name } => {
            let res = client
                .post(format!("{}/algorithm", cli.url))
                .json(&json!({ "algorithm": name }))
                .send()
                .await?;
            print_response(res).await?;
        }
        Commands::Reset => {
            let res = client.post(format!("{}/reset", cli.url)).send().await?;
            print_response(res).await?;
        }
        Commands::Send {
            requests,
            concurrency,
        } => {
            send_burst(&client, &cli.url, requests, concurrency.max(1)).await?;
        }
    }

    Ok(())
}

async fn send_one(client: &reqwest::Client, url: &str) -> Sample {
    let started = Instant::now();
    let result = async {
        let res = client.get(format!("{}/api/process", url)).send().await?;
        let status = res.status();
        let body: Value = res.json().await?;
        Ok::<_, reqwest::Error>((status, body))
    }
    .await;
    let elapsed = started.elapsed();

    match result {
        Ok((status, body)) if status.is_success() => Sample {
            node: body
                .get("server_id")
                .and_then(Value::as_str)
                .map(str::to_string),
            elapsed,
            error: None,
        },
        Ok((status, body)) => Sample {
            node: None,
            elapsed,
            error: Some(format!(
                "status {}: {}",
                status,
                body.get("error").and_then(Value::as_str).unwrap_or("unknown")
            )),
        },
        Err(e) => Sample {
            node: None,
            elapsed,
            error: Some(e.to_string()),
        },
    }
}

async fn send_burst(
    client: &reqwest::Client,
    url: &str,
    requests: usize,
    concurrency: usize,
) -> Result<(), Box<dyn std::error::Error>> {
    println!("Sending {} requests ({} at a time) to {}", requests, concurrency, url);

    let started = Instant::now();
    let samples: Vec<Sample> = stream::iter(0..requests)
        .map(|_| send_one(client, url))
        .buffered(concurrency)
        .collect()
        .await;
    let total = started.elapsed();

    for (n, sample) in samples.iter().enumerate() {
        match (&sample.node, &sample.error) {
            (Some(node), _) => println!(
                "Request {:3}: {:12} | {:.3}s",
                n + 1,
                node,
                sample.elapsed.as_secs_f64()
            ),
            (None, error) => println!(
                "Request {:3}: FAILED - {}",
                n + 1,
                error.as_deref().unwrap_or("no node id in response")
            ),
        }
    }

    let succeeded: Vec<&Sample> = samples.iter().filter(|s| s.node.is_some()).collect();
    println!();
    println!("Success rate: {}/{}", succeeded.len(), requests);
    println!("Total time:   {:.3}s", total.as_secs_f64());

    if succeeded.is_empty() {
        return Ok(());
    }

    let mut distribution: BTreeMap<&str, usize> = BTreeMap::new();
    for sample in &succeeded {
        if let Some(node) = &sample.node {
            *distribution.entry(node.as_str()).or_default() += 1;
        }
    }
    println!();
    println!("Distribution:");
    for (node, count) in &distribution {
        let share = *count as f64 * 100.0 / succeeded.len() as f64;
        println!(
            "  {:12}: {:3} ({:5.1}%) {}",
            node,
            count,
            share,
            "#".repeat((share / 2.0) as usize)
        );
    }

    let times: Vec<f64> = succeeded.iter().map(|s| s.elapsed.as_secs_f64()).collect();
    let avg = times.iter().sum::<f64>() / times.len() as f64;
    let min = times.iter().copied().fold(f64::INFINITY, f64::min);
    let max = times.iter().copied().fold(0.0, f64::max);
    println!();
    println!("Response time: avg {:.3}s, min {:.3}s, max {:.3}s", avg, min, max);

    Ok(())
}

async fn print_response(res: reqwest::Response) -> Result<(), Box<dyn std::error::Error>> {
    let status = res.status();
    if !status.is_success() {
        eprintln!("Error: balancer returned status {}", status);
        if let Ok(text) = res.text().await {
            eprintln!("Response: {}", text);
        }
        return Ok(());
    }

    let json: Value = res.json().await?;
    println!("{}", serde_json::to_string_pretty(&json)?);
    Ok(())
}
