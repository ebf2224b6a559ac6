//! Numeric, string and struct sorting throughput.

use std::time::Instant;

use anyhow::{ensure, Result};
use rand::distributions::Alphanumeric;
use rand::Rng;

use super::{Details, Workload};

#[derive(Debug, Clone)]
struct Item {
    value: String,
    priority: u8,
}

struct SortTimings {
    numeric_ms: f64,
    string_ms: f64,
    object_ms: f64,
}

fn elapsed_ms(start: Instant) -> f64 {
    start.elapsed().as_secs_f64() * 1000.0
}

fn random_string(rng: &mut impl Rng) -> String {
    rng.sample_iter(&Alphanumeric).take(6).map(char::from).collect()
}

fn sort_all(size: usize) -> SortTimings {
    let mut rng = rand::thread_rng();

    let mut numbers: Vec<f64> = (0..size).map(|_| rng.gen_range(0.0..10_000.0)).collect();
    let start = Instant::now();
    numbers.sort_by(f64::total_cmp);
    let numeric_ms = elapsed_ms(start);

    let mut strings: Vec<String> = (0..size).map(|_| random_string(&mut rng)).collect();
    let start = Instant::now();
    strings.sort();
    let string_ms = elapsed_ms(start);

    let mut items: Vec<Item> = (0..size)
        .map(|_| Item {
            value: random_string(&mut rng),
            priority: rng.gen_range(0..100),
        })
        .collect();
    let start = Instant::now();
    items.sort_by(|a, b| a.priority.cmp(&b.priority).then_with(|| a.value.cmp(&b.value)));
    let object_ms = elapsed_ms(start);

    debug_assert!(numbers.windows(2).all(|w| w[0] <= w[1]));
    debug_assert!(items.windows(2).all(|w| w[0].priority <= w[1].priority));

    SortTimings {
        numeric_ms,
        string_ms,
        object_ms,
    }
}

pub struct SortWorkload {
    array_size: usize,
}

impl SortWorkload {
    pub fn new(array_size: usize) -> Self {
        Self { array_size }
    }
}

#[async_trait::async_trait]
impl Workload for SortWorkload {
    fn id(&self) -> &'static str {
        "sort"
    }

    fn display_name(&self) -> &'static str {
        "Sort Performance"
    }

    fn description(&self) -> &'static str {
        "Sort large arrays of floats, strings and records"
    }

    async fn execute(&self) -> Result<Details> {
        let size = self.array_size;
        ensure!(size > 0, "array size must be positive");

        let timings = tokio::task::spawn_blocking(move || sort_all(size)).await?;

        Ok(Details::new("Sort Performance Results")
            .line("Array Size", size)
            .line("Numeric Sort", format!("{:.2}ms", timings.numeric_ms))
            .line("String Sort", format!("{:.2}ms", timings.string_ms))
            .line("Object Sort", format!("{:.2}ms", timings.object_ms)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_execute() {
        let details = SortWorkload::new(500).execute().await.unwrap();
        assert_eq!(details.get("Array Size"), Some("500"));
        assert!(details.get("Object Sort").unwrap().ends_with("ms"));
    }

    #[tokio::test]
    async fn test_empty_array_is_an_error() {
        assert!(SortWorkload::new(0).execute().await.is_err());
    }
}
