//! Allocation-heavy record building and aggregation.

use std::collections::BTreeMap;

use anyhow::{ensure, Result};
use rand::distributions::Alphanumeric;
use rand::Rng;

use super::{Details, Workload};

const CATEGORIES: [&str; 3] = ["user", "system", "network"];

struct Record {
    values: Vec<f64>,
    category: &'static str,
    priority: u8,
    tags: Vec<String>,
}

#[derive(Debug, PartialEq)]
struct CategoryStats {
    count: usize,
    avg_priority: f64,
}

fn build_records(count: usize) -> Vec<Record> {
    let mut rng = rand::thread_rng();
    (0..count)
        .map(|id| Record {
            values: (0..20).map(|_| rng.gen::<f64>()).collect(),
            category: CATEGORIES[id % CATEGORIES.len()],
            priority: rng.gen_range(0..5),
            tags: (0..5)
                .map(|_| (&mut rng).sample_iter(&Alphanumeric).take(6).map(char::from).collect())
                .collect(),
        })
        .collect()
}

fn aggregate(records: &[Record]) -> BTreeMap<&'static str, CategoryStats> {
    let mut grouped: BTreeMap<&'static str, (usize, u64)> = BTreeMap::new();
    for record in records {
        let entry = grouped.entry(record.category).or_default();
        entry.0 += 1;
        entry.1 += record.priority as u64;
    }
    grouped
        .into_iter()
        .map(|(category, (count, priority_sum))| {
            (
                category,
                CategoryStats {
                    count,
                    avg_priority: priority_sum as f64 / count as f64,
                },
            )
        })
        .collect()
}

pub struct MemoryWorkload {
    record_count: usize,
}

impl MemoryWorkload {
    pub fn new(record_count: usize) -> Self {
        Self { record_count }
    }
}

#[async_trait::async_trait]
impl Workload for MemoryWorkload {
    fn id(&self) -> &'static str {
        "memory"
    }

    fn display_name(&self) -> &'static str {
        "Memory Operations"
    }

    fn description(&self) -> &'static str {
        "Build a large set of nested records and aggregate them by category"
    }

    async fn execute(&self) -> Result<Details> {
        let count = self.record_count;
        ensure!(count > 0, "record count must be positive");

        let (stats, value_bytes, tag_count) = tokio::task::spawn_blocking(move || {
            let records = build_records(count);
            let value_bytes: usize = records
                .iter()
                .map(|r| r.values.len() * std::mem::size_of::<f64>())
                .sum();
            let tag_count: usize = records.iter().map(|r| r.tags.len()).sum();
            (aggregate(&records), value_bytes, tag_count)
        })
        .await?;

        let mut details = Details::new("Data Processing Results")
            .line("Records Processed", count)
            .line("Categories", stats.len())
            .line("Value Payload", format!("{:.2} MB", value_bytes as f64 / 1_048_576.0))
            .line("Tags Generated", tag_count);
        for (category, s) in &stats {
            details = details.line(
                *category,
                format!("{} records (Avg Priority: {:.2})", s.count, s.avg_priority),
            );
        }
        Ok(details)
    }
}
