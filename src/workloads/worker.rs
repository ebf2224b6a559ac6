//! Fan math jobs out over blocking worker threads and join the results.

use anyhow::{ensure, Result};
use futures::future::try_join_all;

use super::{Details, Workload};

fn crunch(iterations: u64) -> f64 {
    (0..iterations)
        .map(|i| {
            let x = i as f64;
            x.sqrt() * x.sin() * x.cos()
        })
        .sum()
}

pub struct WorkerWorkload {
    /// `0` means one worker per available core.
    workers: usize,
    iterations: u64,
}

impl WorkerWorkload {
    pub fn new(workers: usize, iterations: u64) -> Self {
        Self {
            workers,
            iterations,
        }
    }

    fn worker_count(&self) -> usize {
        if self.workers > 0 {
            return self.workers;
        }
        std::thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(4)
    }
}

#[async_trait::async_trait]
impl Workload for WorkerWorkload {
    fn id(&self) -> &'static str {
        "worker"
    }

    fn display_name(&self) -> &'static str {
        "Worker Threading"
    }

    fn description(&self) -> &'static str {
        "Run the same numeric job on every core in parallel"
    }

    async fn execute(&self) -> Result<Details> {
        let workers = self.worker_count();
        let iterations = self.iterations;
        ensure!(iterations > 0, "iterations must be positive");

        let handles = (0..workers).map(|_| tokio::task::spawn_blocking(move || crunch(iterations)));
        let results = try_join_all(handles).await?;
        let average = results.iter().sum::<f64>() / results.len() as f64;

        Ok(Details::new("Worker Threading Results")
            .line("Workers Used", workers)
            .line("Calculations Per Worker", iterations)
            .line("Total Calculations", iterations * workers as u64)
            .line("Average Result", format!("{average:.2}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_crunch_is_deterministic() {
        assert_eq!(crunch(1000), crunch(1000));
        assert_eq!(crunch(0), 0.0);
    }

    #[tokio::test]
    async fn test_execute_fixed_workers() {
        let details = WorkerWorkload::new(3, 100).execute().await.unwrap();
        assert_eq!(details.get("Workers Used"), Some("3"));
        assert_eq!(details.get("Total Calculations"), Some("300"));
    }

    #[test]
    fn test_auto_worker_count() {
        assert!(WorkerWorkload::new(0, 1).worker_count() >= 1);
    }
}
