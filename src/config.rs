//! TOML configuration for perfscope.
//!
//! Layered lookup: an explicit path, then the `PERFSCOPE_CONFIG` environment
//! variable, then `./perfscope.toml`, then compiled-in defaults.

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::history::{
    RetentionPolicy, DEFAULT_MAX_SAMPLES_PER_TEST, DEFAULT_RETENTION_DAYS, DEFAULT_STORAGE_KEY,
};

pub const CONFIG_ENV_VAR: &str = "PERFSCOPE_CONFIG";
pub const LOCAL_CONFIG_FILE: &str = "perfscope.toml";

// ---------------------------------------------------------------------------
// Top-level config
// ---------------------------------------------------------------------------

/// Root configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PerfscopeConfig {
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub history: HistoryConfig,
    #[serde(default)]
    pub workloads: WorkloadsConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl PerfscopeConfig {
    /// Load configuration from a TOML file at `path`.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config file: {}", path.display()))?;
        let config: Self = toml::from_str(&content)
            .with_context(|| format!("failed to parse config file: {}", path.display()))?;
        config
            .validate()
            .with_context(|| format!("invalid config file: {}", path.display()))?;
        info!(path = %path.display(), "loaded configuration");
        Ok(config)
    }

    /// An explicit path must load; the fallbacks are best-effort.
    pub fn resolve(explicit: Option<&Path>) -> Result<Self> {
        match explicit {
            Some(path) => Self::load(path),
            None => Ok(Self::load_or_default()),
        }
    }

    /// Try to load configuration from, in order:
    /// 1. The path in the `PERFSCOPE_CONFIG` environment variable.
    /// 2. `./perfscope.toml`.
    /// 3. Compiled-in defaults.
    pub fn load_or_default() -> Self {
        if let Ok(env_path) = std::env::var(CONFIG_ENV_VAR) {
            let path = Path::new(&env_path);
            match Self::load(path) {
                Ok(cfg) => return cfg,
                Err(e) => {
                    warn!(
                        path = %path.display(),
                        error = %e,
                        "PERFSCOPE_CONFIG set but file could not be loaded, trying fallback"
                    );
                }
            }
        }

        let local_path = Path::new(LOCAL_CONFIG_FILE);
        if local_path.exists() {
            match Self::load(local_path) {
                Ok(cfg) => return cfg,
                Err(e) => {
                    warn!(
                        path = %local_path.display(),
                        error = %e,
                        "local config file exists but could not be loaded, using defaults"
                    );
                }
            }
        }

        debug!("no config file found, using compiled-in defaults");
        Self::default()
    }

    pub fn validate(&self) -> Result<()> {
        anyhow::ensure!(
            self.history.max_samples_per_test > 0,
            "history.max_samples_per_test must be at least 1"
        );
        anyhow::ensure!(
            self.history.sweep_interval_secs > 0,
            "history.sweep_interval_secs must be at least 1"
        );
        anyhow::ensure!(!self.storage.key.trim().is_empty(), "storage.key must not be empty");
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Storage
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// SQLite database holding the history log.
    pub db_path: PathBuf,
    /// Key the serialized log is stored under.
    pub key: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            db_path: PathBuf::from("data/perfscope.db"),
            key: DEFAULT_STORAGE_KEY.to_string(),
        }
    }
}

// ---------------------------------------------------------------------------
// History
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HistoryConfig {
    pub max_samples_per_test: usize,
    pub retention_days: u64,
    /// How often the background sweep evicts expired samples.
    pub sweep_interval_secs: u64,
}

impl Default for HistoryConfig {
    fn default() -> Self {
        Self {
            max_samples_per_test: DEFAULT_MAX_SAMPLES_PER_TEST,
            retention_days: DEFAULT_RETENTION_DAYS,
            sweep_interval_secs: 24 * 60 * 60,
        }
    }
}

impl HistoryConfig {
    pub fn policy(&self) -> RetentionPolicy {
        RetentionPolicy {
            max_samples_per_test: self.max_samples_per_test,
            retention: Duration::from_secs(self.retention_days.saturating_mul(24 * 60 * 60)),
        }
    }

    pub fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.sweep_interval_secs)
    }
}

// ---------------------------------------------------------------------------
// Workloads
// ---------------------------------------------------------------------------

/// Sizes of the built-in synthetic workloads.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WorkloadsConfig {
    pub cpu_image_size: usize,
    pub memory_records: usize,
    pub network_endpoints: Vec<String>,
    pub network_timeout_secs: u64,
    pub storage_records: usize,
    pub frame_window_ms: u64,
    pub frame_particles: usize,
    /// `0` uses one worker per core.
    pub worker_count: usize,
    pub worker_iterations: u64,
    pub sort_array_size: usize,
    pub json_iterations: usize,
}

impl Default for WorkloadsConfig {
    fn default() -> Self {
        Self {
            cpu_image_size: 2000,
            memory_records: 200_000,
            network_endpoints: vec![
                "https://api.github.com/repos/microsoft/vscode".to_string(),
                "https://api.github.com/repos/facebook/react".to_string(),
                "https://api.github.com/repos/tensorflow/tensorflow".to_string(),
                "https://api.github.com/repos/kubernetes/kubernetes".to_string(),
            ],
            network_timeout_secs: 15,
            storage_records: 1000,
            frame_window_ms: 5000,
            frame_particles: 1000,
            worker_count: 0,
            worker_iterations: 1_000_000,
            sort_array_size: 1_000_000,
            json_iterations: 200,
        }
    }
}

// ---------------------------------------------------------------------------
// Logging
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Default filter when `RUST_LOG` is unset.
    pub level: String,
    /// Emit JSON lines instead of human-readable output.
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: false,
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let cfg = PerfscopeConfig::default();
        assert_eq!(cfg.storage.db_path, PathBuf::from("data/perfscope.db"));
        assert_eq!(cfg.storage.key, "performanceData");
        assert_eq!(cfg.history.max_samples_per_test, 100);
        assert_eq!(cfg.history.retention_days, 30);
        assert_eq!(cfg.history.sweep_interval_secs, 86_400);
        assert_eq!(cfg.workloads.network_endpoints.len(), 4);
        assert_eq!(cfg.logging.level, "info");
        assert!(!cfg.logging.json);
        assert_eq!(cfg.history.policy(), RetentionPolicy::default());
    }

    #[test]
    fn test_parse_example_toml() {
        let toml_str = r#"
[storage]
db_path = "/var/lib/perfscope/history.db"
key = "bench"

[history]
max_samples_per_test = 25
retention_days = 7
sweep_interval_secs = 3600

[workloads]
cpu_image_size = 64
network_endpoints = ["http://localhost:9000/a"]
worker_count = 2

[logging]
level = "debug"
json = true
"#;

        let cfg: PerfscopeConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(cfg.storage.db_path, PathBuf::from("/var/lib/perfscope/history.db"));
        assert_eq!(cfg.storage.key, "bench");
        assert_eq!(cfg.history.max_samples_per_test, 25);
        assert_eq!(cfg.history.policy().retention, Duration::from_secs(7 * 86_400));
        assert_eq!(cfg.history.sweep_interval(), Duration::from_secs(3600));
        assert_eq!(cfg.workloads.cpu_image_size, 64);
        assert_eq!(cfg.workloads.network_endpoints, vec!["http://localhost:9000/a"]);
        assert_eq!(cfg.workloads.worker_count, 2);
        // Unspecified workload fields keep their defaults.
        assert_eq!(cfg.workloads.sort_array_size, 1_000_000);
        assert_eq!(cfg.logging.level, "debug");
        assert!(cfg.logging.json);
    }

    #[test]
    fn test_empty_toml_uses_all_defaults() {
        let cfg: PerfscopeConfig = toml::from_str("").unwrap();
        let defaults = PerfscopeConfig::default();
        assert_eq!(cfg.storage.db_path, defaults.storage.db_path);
        assert_eq!(
            cfg.history.max_samples_per_test,
            defaults.history.max_samples_per_test
        );
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("perfscope.toml");
        std::fs::write(&path, "[history]\nretention_days = 3\n").unwrap();

        let cfg = PerfscopeConfig::load(&path).unwrap();
        assert_eq!(cfg.history.retention_days, 3);
    }

    #[test]
    fn test_load_rejects_zero_cap() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("perfscope.toml");
        std::fs::write(&path, "[history]\nmax_samples_per_test = 0\n").unwrap();
        assert!(PerfscopeConfig::load(&path).is_err());
    }

    #[test]
    fn test_huge_retention_saturates() {
        let cfg: PerfscopeConfig =
            toml::from_str(&format!("[history]\nretention_days = {}\n", i64::MAX)).unwrap();
        let policy = cfg.history.policy();
        assert_eq!(policy.retention, Duration::from_secs(u64::MAX));
        assert_eq!(policy.retention_ms(), i64::MAX);
    }

    #[test]
    fn test_load_missing_file_errors() {
        let result = PerfscopeConfig::resolve(Some(Path::new("/nonexistent/perfscope.toml")));
        assert!(result.is_err());
    }

    #[test]
    fn test_serialization_roundtrip() {
        let cfg = PerfscopeConfig::default();
        let toml_str = toml::to_string_pretty(&cfg).unwrap();
        let roundtripped: PerfscopeConfig = toml::from_str(&toml_str).unwrap();
        assert_eq!(cfg.storage.key, roundtripped.storage.key);
        assert_eq!(
            cfg.workloads.network_endpoints,
            roundtripped.workloads.network_endpoints
        );
    }
}
