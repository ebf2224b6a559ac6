//! JSON encode/decode throughput over a nested document.

use std::time::Instant;

use anyhow::{ensure, Result};
use rand::distributions::Alphanumeric;
use rand::Rng;
use serde::{Deserialize, Serialize};

use super::{Details, Workload};

const ENTRIES: usize = 1000;

#[derive(Debug, Serialize, Deserialize)]
struct Entry {
    id: f64,
    values: Vec<f64>,
    kind: char,
    tags: Vec<String>,
}

#[derive(Debug, Serialize, Deserialize)]
struct Document {
    id: u64,
    timestamp: i64,
    data: Vec<Entry>,
}

fn build_document() -> Document {
    let mut rng = rand::thread_rng();
    let data = (0..ENTRIES)
        .map(|_| Entry {
            id: rng.gen(),
            values: (0..50).map(|_| rng.gen()).collect(),
            kind: ['A', 'B', 'C'][rng.gen_range(0..3)],
            tags: (0..5)
                .map(|_| (&mut rng).sample_iter(&Alphanumeric).take(6).map(char::from).collect())
                .collect(),
        })
        .collect();
    Document {
        id: 1,
        timestamp: chrono::Utc::now().timestamp_millis(),
        data,
    }
}

struct JsonTimings {
    bytes: usize,
    stringify_ms: f64,
    parse_ms: f64,
}

fn run(iterations: usize) -> Result<JsonTimings> {
    let document = build_document();

    let start = Instant::now();
    let mut encoded = String::new();
    for _ in 0..iterations {
        encoded = serde_json::to_string(&document)?;
    }
    let stringify_ms = start.elapsed().as_secs_f64() * 1000.0;

    let start = Instant::now();
    for _ in 0..iterations {
        let parsed: Document = serde_json::from_str(&encoded)?;
        ensure!(parsed.data.len() == ENTRIES, "decoded document lost entries");
    }
    let parse_ms = start.elapsed().as_secs_f64() * 1000.0;

    Ok(JsonTimings {
        bytes: encoded.len(),
        stringify_ms,
        parse_ms,
    })
}

pub struct JsonWorkload {
    iterations: usize,
}

impl JsonWorkload {
    pub fn new(iterations: usize) -> Self {
        Self { iterations }
    }
}

#[async_trait::async_trait]
impl Workload for JsonWorkload {
    fn id(&self) -> &'static str {
        "json"
    }

    fn display_name(&self) -> &'static str {
        "JSON Operations"
    }

    fn description(&self) -> &'static str {
        "Repeatedly serialize and parse a nested JSON document"
    }

    async fn execute(&self) -> Result<Details> {
        let iterations = self.iterations;
        ensure!(iterations > 0, "iterations must be positive");

        let timings = tokio::task::spawn_blocking(move || run(iterations)).await??;

        Ok(Details::new("JSON Operations Results")
            .line("Iterations", iterations)
            .line("Object Size", format!("{} bytes", timings.bytes))
            .line("Stringify Time", format!("{:.2}ms", timings.stringify_ms))
            .line("Parse Time", format!("{:.2}ms", timings.parse_ms)))
    }
}
