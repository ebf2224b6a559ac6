//! Workload runner -- times a workload, records memory movement, and folds
//! successful runs into the history store and the session chart.
//!
//! The runner never fails: workload errors and panics both come back as
//! [`RunResult::Error`] on the outcome.

pub mod memory;

use std::any::Any;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Instant;

use chrono::{DateTime, Utc};
use futures::FutureExt;
use serde::Serialize;
use thiserror::Error;
use tracing::{info, warn};
use uuid::Uuid;

use self::memory::{MemoryReader, ProcessMemory};
use crate::chart::ChartFeed;
use crate::history::HistoryStore;
use crate::workloads::{Details, Workload};

/// Why a workload did not produce a result.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize)]
#[error("{message}")]
pub struct WorkloadFailure {
    pub message: String,
}

impl WorkloadFailure {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }

    fn from_panic(payload: Box<dyn Any + Send>) -> Self {
        let reason = payload
            .downcast_ref::<&str>()
            .map(|s| s.to_string())
            .or_else(|| payload.downcast_ref::<String>().cloned())
            .unwrap_or_else(|| "unknown panic payload".to_string());
        Self::new(format!("workload panicked: {reason}"))
    }
}

impl From<anyhow::Error> for WorkloadFailure {
    fn from(err: anyhow::Error) -> Self {
        Self::new(format!("{err:#}"))
    }
}

/// Exactly one of a success payload or an error.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RunResult {
    Details(Details),
    Error(WorkloadFailure),
}

/// What happened when the run was written to history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case", tag = "status", content = "reason")]
pub enum PersistStatus {
    /// Failed runs are never recorded.
    Skipped,
    Saved,
    Failed(String),
}

/// Result of one runner invocation.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RunOutcome {
    pub run_id: Uuid,
    pub test_name: String,
    pub started_at: DateTime<Utc>,
    /// Full precision; round only for display.
    pub duration_ms: f64,
    /// `None` when the host cannot report memory usage.
    pub memory_delta_bytes: Option<i64>,
    #[serde(flatten)]
    pub result: RunResult,
    pub persisted: PersistStatus,
}

impl RunOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self.result, RunResult::Details(_))
    }

    pub fn details(&self) -> Option<&Details> {
        match &self.result {
            RunResult::Details(d) => Some(d),
            RunResult::Error(_) => None,
        }
    }

    pub fn error(&self) -> Option<&WorkloadFailure> {
        match &self.result {
            RunResult::Error(e) => Some(e),
            RunResult::Details(_) => None,
        }
    }
}

/// Runs workloads against one history store and one session chart.
#[derive(Clone)]
pub struct WorkloadRunner {
    history: HistoryStore,
    chart: Arc<Mutex<ChartFeed>>,
    memory: Arc<dyn MemoryReader>,
}

impl WorkloadRunner {
    pub fn new(history: HistoryStore) -> Self {
        Self::with_memory_reader(history, Arc::new(ProcessMemory))
    }

    pub fn with_memory_reader(history: HistoryStore, memory: Arc<dyn MemoryReader>) -> Self {
        Self {
            history,
            chart: Arc::new(Mutex::new(ChartFeed::new())),
            memory,
        }
    }

    pub fn history(&self) -> &HistoryStore {
        &self.history
    }

    /// Snapshot of the session chart.
    pub fn chart(&self) -> ChartFeed {
        self.chart
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Run a registered workload under its display name.
    pub async fn run_workload(&self, workload: &dyn Workload) -> RunOutcome {
        self.run(workload.display_name(), || workload.execute()).await
    }

    /// Time `workload` and record it under `test_name`.
    ///
    /// There is no timeout: a workload that never settles keeps this future pending.
    pub async fn run<F, Fut>(&self, test_name: &str, workload: F) -> RunOutcome
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = anyhow::Result<Details>>,
    {
        let run_id = Uuid::new_v4();
        let started_at = Utc::now();
        info!(test = %test_name, %run_id, "workload started");

        let memory_start = self.memory.used_bytes();
        let start = Instant::now();
        let result = AssertUnwindSafe(async move { workload().await })
            .catch_unwind()
            .await;
        let duration_ms = start.elapsed().as_secs_f64() * 1000.0;
        let memory_end = self.memory.used_bytes();

        let result = match result {
            Ok(Ok(details)) => RunResult::Details(details),
            Ok(Err(err)) => RunResult::Error(WorkloadFailure::from(err)),
            Err(panic) => RunResult::Error(WorkloadFailure::from_panic(panic)),
        };

        let memory_delta_bytes = memory::delta(memory_start, memory_end);

        let persisted = match &result {
            RunResult::Details(_) => {
                info!(
                    test = %test_name,
                    %run_id,
                    duration_ms,
                    memory_delta_bytes = ?memory_delta_bytes,
                    "workload completed"
                );
                self.record(test_name, duration_ms)
            }
            RunResult::Error(failure) => {
                warn!(test = %test_name, %run_id, duration_ms, error = %failure, "workload failed");
                PersistStatus::Skipped
            }
        };

        RunOutcome {
            run_id,
            test_name: test_name.to_string(),
            started_at,
            duration_ms,
            memory_delta_bytes,
            result,
            persisted,
        }
    }

    fn record(&self, test_name: &str, duration_ms: f64) -> PersistStatus {
        let status = match self.history.append(test_name, duration_ms) {
            Ok(_) => PersistStatus::Saved,
            Err(e) => {
                warn!(test = %test_name, error = %e, "could not record run in history");
                PersistStatus::Failed(e.to_string())
            }
        };

        self.chart
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .record(test_name, duration_ms, &self.history);

        status
    }
}
