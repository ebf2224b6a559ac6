//! Synthetic workloads and the registry that maps test ids to them.

use std::fmt::Display;
use std::sync::Arc;

use anyhow::Result;
use serde::{Deserialize, Serialize};

use crate::config::WorkloadsConfig;

pub mod cpu;
pub mod frames;
pub mod json;
pub mod memory;
pub mod network;
pub mod sort;
pub mod storage;
pub mod worker;

/// One labelled value in a workload's report.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DetailLine {
    pub label: String,
    pub value: String,
}

/// Opaque success payload of a workload, shown as-is to the user.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Details {
    pub heading: String,
    pub lines: Vec<DetailLine>,
}

impl Details {
    pub fn new(heading: impl Into<String>) -> Self {
        Self {
            heading: heading.into(),
            lines: Vec::new(),
        }
    }

    pub fn line(mut self, label: impl Into<String>, value: impl Display) -> Self {
        self.lines.push(DetailLine {
            label: label.into(),
            value: value.to_string(),
        });
        self
    }

    pub fn get(&self, label: &str) -> Option<&str> {
        self.lines
            .iter()
            .find(|l| l.label == label)
            .map(|l| l.value.as_str())
    }
}

/// Trait for all benchmark workloads.
#[async_trait::async_trait]
pub trait Workload: Send + Sync {
    /// Stable identifier used on the command line.
    fn id(&self) -> &'static str;

    /// Name samples are recorded under.
    fn display_name(&self) -> &'static str;

    fn description(&self) -> &'static str;

    /// Do the work. Takes no input; returns a display payload or a descriptive error.
    async fn execute(&self) -> Result<Details>;
}

/// Ordered mapping from test id to workload.
#[derive(Default, Clone)]
pub struct WorkloadRegistry {
    entries: Vec<Arc<dyn Workload>>,
}

impl WorkloadRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every built-in workload, configured from `config`.
    pub fn with_defaults(config: &WorkloadsConfig) -> Self {
        let mut registry = Self::new();
        registry.register(Arc::new(cpu::CpuWorkload::new(config.cpu_image_size)));
        registry.register(Arc::new(memory::MemoryWorkload::new(config.memory_records)));
        registry.register(Arc::new(network::NetworkWorkload::new(
            config.network_endpoints.clone(),
            config.network_timeout_secs,
        )));
        registry.register(Arc::new(storage::StorageWorkload::new(config.storage_records)));
        registry.register(Arc::new(frames::FrameWorkload::new(
            config.frame_window_ms,
            config.frame_particles,
        )));
        registry.register(Arc::new(worker::WorkerWorkload::new(
            config.worker_count,
            config.worker_iterations,
        )));
        registry.register(Arc::new(sort::SortWorkload::new(config.sort_array_size)));
        registry.register(Arc::new(json::JsonWorkload::new(config.json_iterations)));
        registry
    }

    /// Add a workload, replacing any existing one with the same id.
    pub fn register(&mut self, workload: Arc<dyn Workload>) {
        match self.entries.iter().position(|w| w.id() == workload.id()) {
            Some(idx) => self.entries[idx] = workload,
            None => self.entries.push(workload),
        }
    }

    /// Look up by id or display name, ignoring case.
    pub fn get(&self, key: &str) -> Option<Arc<dyn Workload>> {
        let needle = key.trim();
        if needle.is_empty() {
            return None;
        }
        self.entries
            .iter()
            .find(|w| w.id().eq_ignore_ascii_case(needle) || w.display_name().eq_ignore_ascii_case(needle))
            .cloned()
    }

    pub fn ids(&self) -> Vec<&'static str> {
        self.entries.iter().map(|w| w.id()).collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Arc<dyn Workload>> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
