//! perfscope -- Synthetic workload benchmarking with a rolling performance history.
//!
//! This crate provides the workload runner, the persisted history store with
//! its retention rules, the session chart feed, and the built-in workloads.

pub mod chart;
pub mod clock;
pub mod config;
pub mod history;
pub mod report;
pub mod runner;
pub mod scheduler;
pub mod storage;
pub mod workloads;

use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use tokio::io::{AsyncBufReadExt, BufReader};

use crate::config::PerfscopeConfig;
use crate::history::HistoryStore;
use crate::runner::WorkloadRunner;
use crate::storage::SqliteStore;
use crate::workloads::WorkloadRegistry;

/// Open the SQLite-backed history store described by `config`.
///
/// `db_override` takes precedence over `storage.db_path`.
pub fn open_history(config: &PerfscopeConfig, db_override: Option<&Path>) -> Result<HistoryStore> {
    let db_path = db_override.unwrap_or(config.storage.db_path.as_path());
    tracing::info!(db_path = %db_path.display(), "Initializing database");
    let backend = SqliteStore::open(db_path)
        .with_context(|| format!("failed to open history database {}", db_path.display()))?;
    Ok(HistoryStore::open(
        Arc::new(backend),
        config.storage.key.clone(),
        config.history.policy(),
    ))
}

/// Interactive session: read workload ids from stdin, one per line, until EOF
/// or `quit`, with the retention sweeper running in the background.
pub async fn run_session(
    config: &PerfscopeConfig,
    registry: &WorkloadRegistry,
    runner: &WorkloadRunner,
) -> Result<()> {
    let sweeper = tokio::spawn(scheduler::run_sweep_loop(
        runner.history().clone(),
        config.history.sweep_interval(),
    ));

    println!("perfscope session. Enter a workload id, `list`, `history`, or `quit`.");
    print!("{}", report::render_workloads(registry));

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        let input = line.trim();
        match input {
            "" => continue,
            "quit" | "exit" => break,
            "list" => print!("{}", report::render_workloads(registry)),
            "history" => print!("{}", report::render_summaries(&runner.history().summaries())),
            key => match registry.get(key) {
                Some(workload) => {
                    println!("Running {}...", workload.display_name());
                    let outcome = runner.run_workload(workload.as_ref()).await;
                    print!("{}", report::render_outcome(&outcome));
                    print!("{}", report::render_chart(&runner.chart()));
                }
                None => println!("Unknown workload: {key}"),
            },
        }
    }

    sweeper.abort();
    if runner.history().is_dirty() {
        runner
            .history()
            .flush()
            .context("failed to save history before exit")?;
    }
    tracing::info!(runs = runner.chart().len(), "Session finished");
    Ok(())
}
