//! Serialize a settings document, persist it, read it back and delete it.

use std::collections::HashSet;

use anyhow::{ensure, Context, Result};
use rand::distributions::Alphanumeric;
use rand::Rng;
use rusqlite::{params, Connection};
use serde::{Deserialize, Serialize};

use super::{Details, Workload};
use crate::storage::schema;

const CATEGORIES: [&str; 4] = ["system", "user", "network", "security"];
const SCRATCH_KEY: &str = "app_settings";

#[derive(Debug, Serialize, Deserialize)]
struct Setting {
    id: String,
    value: f64,
    enabled: bool,
    timestamp: i64,
    category: String,
    priority: u8,
    tags: Vec<String>,
}

#[derive(Debug, Serialize, Deserialize)]
struct SettingsDocument {
    settings: Vec<Setting>,
}

fn build_document(count: usize) -> SettingsDocument {
    let mut rng = rand::thread_rng();
    let now = chrono::Utc::now().timestamp_millis();
    let settings = (0..count)
        .map(|i| Setting {
            id: format!("setting_{i}"),
            value: rng.gen(),
            enabled: rng.gen_bool(0.5),
            timestamp: now,
            category: CATEGORIES[i % CATEGORIES.len()].to_string(),
            priority: rng.gen_range(0..5),
            tags: (0..3)
                .map(|_| (&mut rng).sample_iter(&Alphanumeric).take(8).map(char::from).collect())
                .collect(),
        })
        .collect();
    SettingsDocument { settings }
}

struct RoundTrip {
    records: usize,
    bytes: usize,
    overhead_ratio: f64,
    categories: usize,
}

fn round_trip(count: usize) -> Result<RoundTrip> {
    let document = build_document(count);
    let serialized = serde_json::to_string(&document)?;
    let bare = serde_json::to_string(&document.settings)?;

    let conn = Connection::open_in_memory().context("failed to open scratch database")?;
    schema::migrate(&conn)?;

    conn.execute(
        "INSERT INTO kv_store (key, value) VALUES (?1, ?2)",
        params![SCRATCH_KEY, serialized],
    )?;
    let stored: String = conn.query_row(
        "SELECT value FROM kv_store WHERE key = ?1",
        params![SCRATCH_KEY],
        |row| row.get(0),
    )?;
    let retrieved: SettingsDocument =
        serde_json::from_str(&stored).context("stored settings did not parse back")?;
    conn.execute("DELETE FROM kv_store WHERE key = ?1", params![SCRATCH_KEY])?;

    ensure!(
        retrieved.settings.len() == count,
        "read back {} settings, wrote {count}",
        retrieved.settings.len()
    );

    let categories: HashSet<&str> = retrieved
        .settings
        .iter()
        .map(|s| s.category.as_str())
        .collect();

    Ok(RoundTrip {
        records: retrieved.settings.len(),
        bytes: serialized.len(),
        overhead_ratio: serialized.len() as f64 / bare.len() as f64,
        categories: categories.len(),
    })
}

pub struct StorageWorkload {
    record_count: usize,
}

impl StorageWorkload {
    pub fn new(record_count: usize) -> Self {
        Self { record_count }
    }
}

#[async_trait::async_trait]
impl Workload for StorageWorkload {
    fn id(&self) -> &'static str {
        "storage"
    }

    fn display_name(&self) -> &'static str {
        "Storage Operations"
    }

    fn description(&self) -> &'static str {
        "Write, read back and delete a serialized settings document in SQLite"
    }

    async fn execute(&self) -> Result<Details> {
        let count = self.record_count;
        let trip = tokio::task::spawn_blocking(move || round_trip(count))
            .await?
            .context("storage operation failed")?;

        Ok(Details::new("Storage Operations Results")
            .line("Records", trip.records)
            .line("Data Size", format!("{:.2} KB", trip.bytes as f64 / 1024.0))
            .line("Envelope Ratio", format!("{:.2}", trip.overhead_ratio))
            .line("Categories", trip.categories))
    }
}
