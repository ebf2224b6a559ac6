//! Concurrent HTTP fetches against a set of JSON endpoints.

use std::time::{Duration, Instant};

use anyhow::{bail, ensure, Context, Result};
use futures::future::join_all;
use reqwest::Client;
use serde_json::Value;
use tracing::debug;

use super::{Details, Workload};

pub struct NetworkWorkload {
    endpoints: Vec<String>,
    timeout: Duration,
    use_system_proxy: bool,
}

impl NetworkWorkload {
    pub fn new(endpoints: Vec<String>, timeout_secs: u64) -> Self {
        Self {
            endpoints,
            timeout: Duration::from_secs(timeout_secs),
            use_system_proxy: true,
        }
    }

    /// Connect directly, ignoring `HTTP_PROXY` and friends.
    pub fn without_proxy(mut self) -> Self {
        self.use_system_proxy = false;
        self
    }
}

struct FetchResult {
    url: String,
    elapsed_ms: f64,
    outcome: Result<Value>,
}

async fn fetch(client: &Client, url: &str) -> FetchResult {
    let start = Instant::now();
    let outcome = async {
        let response = client
            .get(url)
            .send()
            .await
            .with_context(|| format!("request to {url} failed"))?
            .error_for_status()?;
        let body = response.json::<Value>().await?;
        Ok::<_, anyhow::Error>(body)
    }
    .await;

    FetchResult {
        url: url.to_string(),
        elapsed_ms: start.elapsed().as_secs_f64() * 1000.0,
        outcome,
    }
}

fn describe(body: &Value) -> String {
    let stars = body.get("stargazers_count").and_then(Value::as_u64);
    let forks = body.get("forks_count").and_then(Value::as_u64);
    match (stars, forks) {
        (Some(s), Some(f)) => format!("{s} stars, {f} forks"),
        _ => "ok".to_string(),
    }
}

#[async_trait::async_trait]
impl Workload for NetworkWorkload {
    fn id(&self) -> &'static str {
        "network"
    }

    fn display_name(&self) -> &'static str {
        "Network Operations"
    }

    fn description(&self) -> &'static str {
        "Fetch several JSON endpoints concurrently and time the responses"
    }

    async fn execute(&self) -> Result<Details> {
        ensure!(!self.endpoints.is_empty(), "no network endpoints configured");

        let mut builder = Client::builder()
            .timeout(self.timeout)
            .user_agent(concat!("perfscope/", env!("CARGO_PKG_VERSION")));
        if !self.use_system_proxy {
            builder = builder.no_proxy();
        }
        let client = builder.build().context("failed to build HTTP client")?;

        let results = join_all(self.endpoints.iter().map(|url| fetch(&client, url))).await;

        let (ok, failed): (Vec<_>, Vec<_>) = results.iter().partition(|r| r.outcome.is_ok());
        for r in &failed {
            if let Err(e) = &r.outcome {
                debug!(url = %r.url, error = %e, "fetch failed");
            }
        }

        if ok.is_empty() {
            let first = failed
                .first()
                .and_then(|r| r.outcome.as_ref().err())
                .map(|e| format!("{e:#}"))
                .unwrap_or_default();
            bail!("all {} requests failed: {first}", results.len());
        }

        let avg_ms = ok.iter().map(|r| r.elapsed_ms).sum::<f64>() / ok.len() as f64;

        let mut details = Details::new("Network Operations Results")
            .line("Total Requests", results.len())
            .line("Successful", ok.len())
            .line("Failed", failed.len())
            .line("Average Response Time", format!("{avg_ms:.2}ms"));
        for r in &ok {
            if let Ok(body) = &r.outcome {
                details = details.line(r.url.clone(), describe(body));
            }
        }
        Ok(details)
    }
}
