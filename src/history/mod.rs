//! Rolling performance history -- bounded per-test sample log with durable persistence.
//!
//! The [`HistoryStore`] owns the in-memory [`HistoryLog`] and mirrors it to a
//! [`LogStore`] after every mutation. Every mutation holds the store lock for the
//! whole read-modify-write including the persistence write, so concurrent runs
//! can never interleave and lose each other's samples.

pub mod codec;

use std::collections::HashSet;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::clock::{Clock, EpochMillis, SystemClock, MILLIS_PER_DAY};
use crate::storage::{LogStore, StoreError};

/// Storage key the log is written under unless configured otherwise.
pub const DEFAULT_STORAGE_KEY: &str = "performanceData";
pub const DEFAULT_MAX_SAMPLES_PER_TEST: usize = 100;
pub const DEFAULT_RETENTION_DAYS: u64 = 30;

#[derive(Debug, Error)]
pub enum HistoryError {
    #[error("duration must be a finite, non-negative number of milliseconds (got {0})")]
    InvalidDuration(f64),

    #[error("test name must not be empty")]
    EmptyTestName,

    #[error("failed to serialize history log: {0}")]
    Encode(#[from] serde_json::Error),

    #[error("failed to persist history log: {0}")]
    Persistence(#[from] StoreError),

    #[error("stored history uses schema version {found} (this build writes {supported}); not overwriting it")]
    NewerSchema { found: u32, supported: u32 },
}

/// One completed measurement.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Sample {
    #[serde(rename = "test")]
    pub test_name: String,
    #[serde(
        rename = "time",
        deserialize_with = "codec::duration_from_number_or_string"
    )]
    pub duration_ms: f64,
    pub timestamp: EpochMillis,
}

/// Aggregate view of one test's retained samples.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TestSummary {
    pub test_name: String,
    pub count: usize,
    pub average_ms: f64,
    pub min_ms: f64,
    pub max_ms: f64,
    pub latest_timestamp: EpochMillis,
}

/// Bounds applied to the log.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetentionPolicy {
    pub max_samples_per_test: usize,
    pub retention: Duration,
}

impl Default for RetentionPolicy {
    fn default() -> Self {
        Self {
            max_samples_per_test: DEFAULT_MAX_SAMPLES_PER_TEST,
            retention: Duration::from_secs(DEFAULT_RETENTION_DAYS * 24 * 60 * 60),
        }
    }
}

impl RetentionPolicy {
    pub fn retention_ms(&self) -> i64 {
        i64::try_from(self.retention.as_millis()).unwrap_or(i64::MAX)
    }

    pub fn retention_days(&self) -> f64 {
        self.retention_ms() as f64 / MILLIS_PER_DAY as f64
    }
}

/// The full collection of samples, in insertion order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct HistoryLog {
    samples: Vec<Sample>,
}

impl HistoryLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_samples(samples: Vec<Sample>) -> Self {
        Self { samples }
    }

    pub fn samples(&self) -> &[Sample] {
        &self.samples
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn push(&mut self, sample: Sample) {
        self.samples.push(sample);
    }

    /// Distinct test names in first-seen order.
    pub fn test_names(&self) -> Vec<&str> {
        let mut seen = HashSet::new();
        self.samples
            .iter()
            .map(|s| s.test_name.as_str())
            .filter(|name| seen.insert(*name))
            .collect()
    }

    pub fn count_for(&self, test_name: &str) -> usize {
        self.samples
            .iter()
            .filter(|s| s.test_name == test_name)
            .count()
    }

    /// Samples for one test, newest first.
    pub fn samples_for(&self, test_name: &str) -> Vec<&Sample> {
        let mut matching: Vec<&Sample> = self
            .samples
            .iter()
            .filter(|s| s.test_name == test_name)
            .collect();
        matching.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
        matching
    }

    /// Mean duration over every retained sample for `test_name`.
    pub fn rolling_average(&self, test_name: &str) -> Option<f64> {
        let (sum, count) = self
            .samples
            .iter()
            .filter(|s| s.test_name == test_name)
            .fold((0.0_f64, 0_usize), |(sum, count), s| {
                (sum + s.duration_ms, count + 1)
            });
        (count > 0).then(|| sum / count as f64)
    }

    /// Keep only the `cap` most recent samples for `test_name`. Other tests are untouched.
    /// Returns how many samples were dropped.
    pub fn trim_test(&mut self, test_name: &str, cap: usize) -> usize {
        let mut positions: Vec<(EpochMillis, usize)> = self
            .samples
            .iter()
            .enumerate()
            .filter(|(_, s)| s.test_name == test_name)
            .map(|(idx, s)| (s.timestamp, idx))
            .collect();

        if positions.len() <= cap {
            return 0;
        }

        // Newest first; on equal timestamps the later insertion wins.
        positions.sort_by(|a, b| b.cmp(a));
        let dropped: HashSet<usize> = positions[cap..].iter().map(|(_, idx)| *idx).collect();

        let mut idx = 0;
        self.samples.retain(|_| {
            let keep = !dropped.contains(&idx);
            idx += 1;
            keep
        });
        dropped.len()
    }

    /// Apply the per-test cap to every test in the log.
    pub fn trim_all(&mut self, cap: usize) -> usize {
        let names: Vec<String> = self.test_names().into_iter().map(str::to_string).collect();
        names.iter().map(|name| self.trim_test(name, cap)).sum()
    }

    /// Remove every sample with `timestamp < cutoff`. Returns how many were removed.
    pub fn evict_older_than(&mut self, cutoff: EpochMillis) -> usize {
        let before = self.samples.len();
        self.samples.retain(|s| s.timestamp >= cutoff);
        before - self.samples.len()
    }

    /// Remove all samples for one test, or everything when `test_name` is `None`.
    pub fn clear(&mut self, test_name: Option<&str>) -> usize {
        let before = self.samples.len();
        match test_name {
            Some(name) => self.samples.retain(|s| s.test_name != name),
            None => self.samples.clear(),
        }
        before - self.samples.len()
    }

    pub fn summaries(&self) -> Vec<TestSummary> {
        self.test_names()
            .into_iter()
            .filter_map(|name| {
                let samples = self.samples_for(name);
                let latest = samples.first()?;
                let count = samples.len();
                let sum: f64 = samples.iter().map(|s| s.duration_ms).sum();
                let min_ms = samples
                    .iter()
                    .map(|s| s.duration_ms)
                    .fold(f64::INFINITY, f64::min);
                let max_ms = samples
                    .iter()
                    .map(|s| s.duration_ms)
                    .fold(f64::NEG_INFINITY, f64::max);
                Some(TestSummary {
                    test_name: name.to_string(),
                    count,
                    average_ms: sum / count as f64,
                    min_ms,
                    max_ms,
                    latest_timestamp: latest.timestamp,
                })
            })
            .collect()
    }
}

/// What [`read_log`] found under the key.
#[derive(Debug, Clone, PartialEq)]
pub struct LoadedLog {
    pub log: HistoryLog,
    /// Set when the stored document uses a newer layout than this build writes.
    /// The log is then empty and the stored value must not be overwritten.
    pub newer_version: Option<u32>,
}

/// Read the persisted log. A missing, unreadable or corrupt entry yields an empty log.
pub fn load(backend: &dyn LogStore, key: &str) -> HistoryLog {
    read_log(backend, key).log
}

/// Like [`load`], but reports a stored layout this build cannot read.
pub fn read_log(backend: &dyn LogStore, key: &str) -> LoadedLog {
    let empty = LoadedLog {
        log: HistoryLog::new(),
        newer_version: None,
    };
    let raw = match backend.read(key) {
        Ok(Some(raw)) => raw,
        Ok(None) => {
            debug!(%key, "no persisted history, starting empty");
            return empty;
        }
        Err(e) => {
            warn!(%key, error = %e, "failed to read persisted history, starting empty");
            return empty;
        }
    };

    match codec::decode(&raw) {
        Ok(decoded) => {
            if decoded.skipped > 0 {
                warn!(%key, skipped = decoded.skipped, "dropped malformed history records");
            }
            let total = decoded.samples.len();
            let valid: Vec<Sample> = decoded
                .samples
                .into_iter()
                .filter(|s| s.duration_ms.is_finite() && s.duration_ms >= 0.0)
                .collect();
            if valid.len() != total {
                warn!(%key, skipped = total - valid.len(), "dropped samples with invalid durations");
            }
            if decoded.version < codec::CURRENT_SCHEMA_VERSION {
                info!(%key, from = decoded.version, to = codec::CURRENT_SCHEMA_VERSION, "history will be migrated on next save");
            }
            LoadedLog {
                log: HistoryLog::from_samples(valid),
                newer_version: None,
            }
        }
        Err(codec::CodecError::UnsupportedVersion { found }) => {
            warn!(
                %key,
                found,
                supported = codec::CURRENT_SCHEMA_VERSION,
                "history was written by a newer version; it will be left untouched"
            );
            LoadedLog {
                log: HistoryLog::new(),
                newer_version: Some(found),
            }
        }
        Err(e) => {
            warn!(%key, error = %e, "persisted history is corrupt, starting empty");
            empty
        }
    }
}

struct State {
    log: HistoryLog,
    last_timestamp: Option<EpochMillis>,
    dirty: bool,
}

struct Inner {
    backend: Arc<dyn LogStore>,
    key: String,
    policy: RetentionPolicy,
    clock: Arc<dyn Clock>,
    /// Stored layout version this build cannot write over.
    newer_version: Option<u32>,
    state: Mutex<State>,
}

/// Shared handle to the persisted history. Cloning is cheap and every clone sees the same log.
#[derive(Clone)]
pub struct HistoryStore {
    inner: Arc<Inner>,
}

impl HistoryStore {
    /// Load the log stored under `key` in `backend`, using the system clock.
    pub fn open(backend: Arc<dyn LogStore>, key: impl Into<String>, policy: RetentionPolicy) -> Self {
        Self::open_with_clock(backend, key, policy, Arc::new(SystemClock))
    }

    pub fn open_with_clock(
        backend: Arc<dyn LogStore>,
        key: impl Into<String>,
        policy: RetentionPolicy,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let key = key.into();
        let LoadedLog {
            mut log,
            newer_version,
        } = read_log(backend.as_ref(), &key);
        let trimmed = log.trim_all(policy.max_samples_per_test);
        if trimmed > 0 {
            info!(%key, trimmed, cap = policy.max_samples_per_test, "trimmed loaded history to per-test cap");
        }
        info!(%key, samples = log.len(), tests = log.test_names().len(), "history loaded");

        Self {
            inner: Arc::new(Inner {
                backend,
                key,
                policy,
                clock,
                newer_version,
                state: Mutex::new(State {
                    log,
                    last_timestamp: None,
                    dirty: trimmed > 0,
                }),
            }),
        }
    }

    pub fn policy(&self) -> RetentionPolicy {
        self.inner.policy
    }

    pub fn now_ms(&self) -> EpochMillis {
        self.inner.clock.now_ms()
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        self.inner
            .state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    /// Record a completed run, enforce the per-test cap and persist the whole log.
    ///
    /// When persistence fails the sample stays in memory and the store is marked
    /// dirty; a later [`HistoryStore::flush`] or mutation retries the write.
    pub fn append(&self, test_name: &str, duration_ms: f64) -> Result<Sample, HistoryError> {
        if test_name.trim().is_empty() {
            return Err(HistoryError::EmptyTestName);
        }
        if !duration_ms.is_finite() || duration_ms < 0.0 {
            return Err(HistoryError::InvalidDuration(duration_ms));
        }

        let mut state = self.lock();

        let now = self.inner.clock.now_ms();
        let timestamp = match state.last_timestamp {
            Some(last) if now <= last => last + 1,
            _ => now,
        };
        state.last_timestamp = Some(timestamp);

        let sample = Sample {
            test_name: test_name.to_string(),
            duration_ms,
            timestamp,
        };
        state.log.push(sample.clone());
        let trimmed = state
            .log
            .trim_test(test_name, self.inner.policy.max_samples_per_test);

        debug!(
            test = %test_name,
            duration_ms,
            timestamp,
            trimmed,
            retained = state.log.count_for(test_name),
            "sample appended"
        );

        self.persist_locked(&mut state)?;
        Ok(sample)
    }

    /// Mean duration of the retained samples for `test_name`.
    pub fn rolling_average(&self, test_name: &str) -> Option<f64> {
        self.lock().log.rolling_average(test_name)
    }

    /// Drop samples older than the retention window relative to `now_ms`, then persist.
    pub fn evict_expired(&self, now_ms: EpochMillis) -> Result<usize, HistoryError> {
        let cutoff = now_ms.saturating_sub(self.inner.policy.retention_ms());
        let mut state = self.lock();
        let removed = state.log.evict_older_than(cutoff);
        if removed > 0 {
            info!(removed, cutoff, remaining = state.log.len(), "expired samples evicted");
        } else {
            debug!(cutoff, "no expired samples");
        }
        self.persist_locked(&mut state)?;
        Ok(removed)
    }

    /// Remove history for one test, or for all tests.
    pub fn clear(&self, test_name: Option<&str>) -> Result<usize, HistoryError> {
        let mut state = self.lock();
        let removed = state.log.clear(test_name);
        info!(test = ?test_name, removed, "history cleared");
        self.persist_locked(&mut state)?;
        Ok(removed)
    }

    /// Retry persisting the current in-memory log.
    pub fn flush(&self) -> Result<(), HistoryError> {
        let mut state = self.lock();
        self.persist_locked(&mut state)
    }

    /// Whether the in-memory log holds changes the backend has not accepted yet.
    pub fn is_dirty(&self) -> bool {
        self.lock().dirty
    }

    pub fn snapshot(&self) -> HistoryLog {
        self.lock().log.clone()
    }

    pub fn summaries(&self) -> Vec<TestSummary> {
        self.lock().log.summaries()
    }

    /// Samples for one test, newest first.
    pub fn samples_for(&self, test_name: &str) -> Vec<Sample> {
        self.lock()
            .log
            .samples_for(test_name)
            .into_iter()
            .cloned()
            .collect()
    }

    pub fn len(&self) -> usize {
        self.lock().log.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().log.is_empty()
    }

    /// Whether the stored history uses a newer layout and will not be written.
    pub fn is_read_only(&self) -> bool {
        self.inner.newer_version.is_some()
    }

    fn persist_locked(&self, state: &mut State) -> Result<(), HistoryError> {
        if let Some(found) = self.inner.newer_version {
            state.dirty = true;
            return Err(HistoryError::NewerSchema {
                found,
                supported: codec::CURRENT_SCHEMA_VERSION,
            });
        }
        let raw = codec::encode(state.log.samples())?;
        match self.inner.backend.write(&self.inner.key, &raw) {
            Ok(()) => {
                state.dirty = false;
                Ok(())
            }
            Err(e) => {
                state.dirty = true;
                warn!(key = %self.inner.key, error = %e, "history write failed; keeping changes in memory");
                Err(e.into())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::storage::MemoryStore;
    use std::sync::atomic::{AtomicBool, Ordering};

    fn store_with_clock(policy: RetentionPolicy) -> (HistoryStore, Arc<MemoryStore>, Arc<ManualClock>) {
        let backend = Arc::new(MemoryStore::new());
        let clock = Arc::new(ManualClock::new(1_000));
        let store = HistoryStore::open_with_clock(
            backend.clone(),
            DEFAULT_STORAGE_KEY,
            policy,
            clock.clone(),
        );
        (store, backend, clock)
    }

    /// Backend whose writes can be switched off.
    #[derive(Default)]
    struct FlakyStore {
        inner: MemoryStore,
        failing: AtomicBool,
    }

    impl LogStore for FlakyStore {
        fn read(&self, key: &str) -> Result<Option<String>, StoreError> {
            self.inner.read(key)
        }

        fn write(&self, key: &str, value: &str) -> Result<(), StoreError> {
            if self.failing.load(Ordering::SeqCst) {
                return Err(StoreError::Unavailable("quota exceeded".to_string()));
            }
            self.inner.write(key, value)
        }
    }

    #[test]
    fn test_rolling_average_scenario() {
        let (store, _, clock) = store_with_clock(RetentionPolicy::default());
        store.append("CPU Processing", 12.34).unwrap();
        clock.advance(5);
        store.append("CPU Processing", 7.66).unwrap();

        let avg = store.rolling_average("CPU Processing").unwrap();
        assert!((avg - 10.0).abs() < 1e-9, "avg was {avg}");
    }

    #[test]
    fn test_rolling_average_absent_for_unknown_test() {
        let (store, _, _) = store_with_clock(RetentionPolicy::default());
        assert_eq!(store.rolling_average("Nope"), None);
    }

    #[test]
    fn test_rolling_average_is_mean_of_retained() {
        let (store, _, _) = store_with_clock(RetentionPolicy::default());
        let durations = [0.0, 3.5, 100.25, 42.0, 0.125];
        for d in durations {
            store.append("Sort Performance", d).unwrap();
        }
        let expected = durations.iter().sum::<f64>() / durations.len() as f64;
        let avg = store.rolling_average("Sort Performance").unwrap();
        assert!((avg - expected).abs() < 1e-9);
    }

    #[test]
    fn test_cap_keeps_most_recent() {
        let (store, _, clock) = store_with_clock(RetentionPolicy::default());
        for i in 0..150 {
            clock.advance(10);
            store.append("CPU Processing", i as f64).unwrap();
        }

        let retained = store.samples_for("CPU Processing");
        assert_eq!(retained.len(), 100);
        // Newest first: durations 149 down to 50.
        assert_eq!(retained.first().unwrap().duration_ms, 149.0);
        assert_eq!(retained.last().unwrap().duration_ms, 50.0);
    }

    #[test]
    fn test_cap_drops_oldest_timestamp() {
        let (store, _, clock) = store_with_clock(RetentionPolicy::default());
        for ts in 1..=101 {
            clock.set(ts);
            store.append("Memory Operations", 1.0).unwrap();
        }

        let mut timestamps: Vec<i64> = store
            .samples_for("Memory Operations")
            .iter()
            .map(|s| s.timestamp)
            .collect();
        timestamps.sort();
        assert_eq!(timestamps, (2..=101).collect::<Vec<_>>());
    }

    #[test]
    fn test_per_test_isolation() {
        let policy = RetentionPolicy {
            max_samples_per_test: 3,
            ..RetentionPolicy::default()
        };
        let (store, _, _) = store_with_clock(policy);
        store.append("B", 1.0).unwrap();
        store.append("B", 2.0).unwrap();
        let before = store.samples_for("B");

        for i in 0..10 {
            store.append("A", i as f64).unwrap();
        }

        assert_eq!(store.samples_for("A").len(), 3);
        assert_eq!(store.samples_for("B"), before);
    }

    #[test]
    fn test_timestamps_strictly_increase_when_clock_stalls() {
        let (store, _, _) = store_with_clock(RetentionPolicy::default());
        let a = store.append("x", 1.0).unwrap();
        let b = store.append("x", 1.0).unwrap();
        let c = store.append("y", 1.0).unwrap();
        assert!(a.timestamp < b.timestamp && b.timestamp < c.timestamp);
    }

    #[test]
    fn test_rejects_invalid_input() {
        let (store, _, _) = store_with_clock(RetentionPolicy::default());
        assert!(matches!(
            store.append("x", -1.0),
            Err(HistoryError::InvalidDuration(_))
        ));
        assert!(matches!(
            store.append("x", f64::NAN),
            Err(HistoryError::InvalidDuration(_))
        ));
        assert!(matches!(store.append("  ", 1.0), Err(HistoryError::EmptyTestName)));
        assert!(store.is_empty());
    }

    #[test]
    fn test_evict_expired_respects_horizon() {
        let (store, _, clock) = store_with_clock(RetentionPolicy::default());
        let day = MILLIS_PER_DAY;
        let now = 100 * day;
        let ages_in_days = [45, 31, 30, 29, 1, 0];
        for age in ages_in_days {
            clock.set(now - age * day);
            store.append("Storage Operations", age as f64).unwrap();
        }

        let removed = store.evict_expired(now).unwrap();
        assert_eq!(removed, 2);

        let mut kept: Vec<f64> = store
            .samples_for("Storage Operations")
            .iter()
            .map(|s| s.duration_ms)
            .collect();
        kept.sort_by(|a, b| a.partial_cmp(b).unwrap());
        // Exactly 30 days old sits on the horizon and survives.
        assert_eq!(kept, vec![0.0, 1.0, 29.0, 30.0]);
    }

    #[test]
    fn test_evict_spans_all_tests() {
        let (store, _, clock) = store_with_clock(RetentionPolicy::default());
        clock.set(0);
        store.append("A", 1.0).unwrap();
        store.append("B", 1.0).unwrap();
        clock.set(40 * MILLIS_PER_DAY);
        store.append("B", 2.0).unwrap();

        assert_eq!(store.evict_expired(40 * MILLIS_PER_DAY).unwrap(), 2);
        assert_eq!(store.rolling_average("A"), None);
        assert_eq!(store.rolling_average("B"), Some(2.0));
    }

    #[test]
    fn test_reload_reconstructs_log() {
        let backend = Arc::new(MemoryStore::new());
        let store = HistoryStore::open(backend.clone(), "k", RetentionPolicy::default());
        store.append("CPU Processing", 12.375).unwrap();
        store.append("Memory Operations", 3.0).unwrap();
        let before = store.snapshot();
        drop(store);

        let reopened = HistoryStore::open(backend, "k", RetentionPolicy::default());
        assert_eq!(reopened.snapshot(), before);
        assert_eq!(
            reopened.samples_for("CPU Processing")[0].duration_ms,
            12.375
        );
    }

    #[test]
    fn test_load_corrupt_value_yields_empty() {
        let backend = MemoryStore::new();
        backend.write("k", "{{{ definitely not json").unwrap();
        assert!(load(&backend, "k").is_empty());
    }

    #[test]
    fn test_load_missing_value_yields_empty() {
        assert!(load(&MemoryStore::new(), "k").is_empty());
    }

    #[test]
    fn test_load_skips_negative_durations() {
        let backend = MemoryStore::new();
        backend
            .write(
                "k",
                r#"[{"test":"a","time":"-4.00","timestamp":1},{"test":"a","time":"4.00","timestamp":2}]"#,
            )
            .unwrap();
        let log = load(&backend, "k");
        assert_eq!(log.len(), 1);
        assert_eq!(log.rolling_average("a"), Some(4.0));
    }

    #[test]
    fn test_newer_schema_is_never_overwritten() {
        let backend = Arc::new(MemoryStore::new());
        let stored = r#"{"schema_version":2,"samples":[{"test":"CPU Processing","time":3.0,"timestamp":1},{"test":"CPU Processing","time":5.0,"timestamp":2}]}"#;
        backend.write("k", stored).unwrap();

        let loaded = read_log(backend.as_ref(), "k");
        assert_eq!(loaded.newer_version, Some(2));
        assert!(loaded.log.is_empty());

        let store = HistoryStore::open(backend.clone(), "k", RetentionPolicy::default());
        assert!(store.is_read_only());
        assert!(matches!(
            store.append("CPU Processing", 1.0),
            Err(HistoryError::NewerSchema { found: 2, supported: 1 })
        ));
        assert!(store.evict_expired(i64::MAX).is_err());
        assert!(store.clear(None).is_err());
        assert!(store.flush().is_err());

        assert_eq!(backend.read("k").unwrap().as_deref(), Some(stored));
    }

    #[test]
    fn test_malformed_record_does_not_cost_the_rest() {
        let backend = Arc::new(MemoryStore::new());
        backend
            .write(
                "k",
                r#"[{"test":"a","time":"fast","timestamp":1},{"test":"a","time":"2.00","timestamp":2},{"test":"b","time":6.0,"timestamp":3}]"#,
            )
            .unwrap();

        let store = HistoryStore::open(backend.clone(), "k", RetentionPolicy::default());
        assert!(!store.is_read_only());
        assert_eq!(store.len(), 2);
        store.append("a", 4.0).unwrap();

        let reloaded = load(backend.as_ref(), "k");
        assert_eq!(reloaded.len(), 3);
        assert_eq!(reloaded.rolling_average("a"), Some(3.0));
        assert_eq!(reloaded.rolling_average("b"), Some(6.0));
    }

    #[test]
    fn test_open_trims_oversized_history() {
        let backend = Arc::new(MemoryStore::new());
        let samples: Vec<Sample> = (0..10)
            .map(|i| Sample {
                test_name: "a".to_string(),
                duration_ms: i as f64,
                timestamp: i,
            })
            .collect();
        backend.write("k", &codec::encode(&samples).unwrap()).unwrap();

        let policy = RetentionPolicy {
            max_samples_per_test: 4,
            ..RetentionPolicy::default()
        };
        let store = HistoryStore::open(backend, "k", policy);
        assert_eq!(store.len(), 4);
        assert!(store.is_dirty());
        assert_eq!(store.rolling_average("a"), Some(7.5));
    }

    #[test]
    fn test_write_failure_is_surfaced_and_retried() {
        let backend = Arc::new(FlakyStore::default());
        let store = HistoryStore::open(backend.clone(), "k", RetentionPolicy::default());
        store.append("a", 1.0).unwrap();

        backend.failing.store(true, Ordering::SeqCst);
        let err = store.append("a", 3.0).unwrap_err();
        assert!(matches!(err, HistoryError::Persistence(_)));
        assert!(store.is_dirty());
        // The in-memory log still has the sample.
        assert_eq!(store.rolling_average("a"), Some(2.0));
        // The backend still has the last good state.
        assert_eq!(load(backend.as_ref(), "k").len(), 1);

        backend.failing.store(false, Ordering::SeqCst);
        store.flush().unwrap();
        assert!(!store.is_dirty());
        assert_eq!(load(backend.as_ref(), "k").len(), 2);
    }

    #[test]
    fn test_clear_single_test() {
        let (store, backend, _) = store_with_clock(RetentionPolicy::default());
        store.append("a", 1.0).unwrap();
        store.append("b", 1.0).unwrap();
        assert_eq!(store.clear(Some("a")).unwrap(), 1);
        assert_eq!(store.rolling_average("a"), None);
        assert_eq!(load(backend.as_ref(), DEFAULT_STORAGE_KEY).len(), 1);
    }

    #[test]
    fn test_summaries() {
        let (store, _, clock) = store_with_clock(RetentionPolicy::default());
        store.append("a", 2.0).unwrap();
        clock.advance(1);
        store.append("b", 5.0).unwrap();
        clock.advance(1);
        store.append("a", 4.0).unwrap();

        let summaries = store.summaries();
        assert_eq!(summaries.len(), 2);
        assert_eq!(summaries[0].test_name, "a");
        assert_eq!(summaries[0].count, 2);
        assert_eq!(summaries[0].average_ms, 3.0);
        assert_eq!(summaries[0].min_ms, 2.0);
        assert_eq!(summaries[0].max_ms, 4.0);
        assert_eq!(summaries[0].latest_timestamp, 1_002);
        assert_eq!(summaries[1].test_name, "b");
    }

    #[test]
    fn test_concurrent_appends_are_not_lost() {
        let backend = Arc::new(MemoryStore::new());
        let store = HistoryStore::open(backend.clone(), "k", RetentionPolicy::default());

        let handles: Vec<_> = (0..8)
            .map(|t| {
                let store = store.clone();
                std::thread::spawn(move || {
                    for i in 0..10 {
                        store.append(&format!("test-{t}"), i as f64).unwrap();
                    }
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }

        assert_eq!(store.len(), 80);
        assert_eq!(load(backend.as_ref(), "k").len(), 80);
    }
}
