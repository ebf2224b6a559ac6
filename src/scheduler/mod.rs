//! Background retention sweep.
//!
//! The history store evicts expired samples on a fixed interval for as long
//! as the process lives. The `evict` command runs a single pass.

use std::time::Duration;

use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info};

use crate::history::{HistoryError, HistoryStore};

/// Run one eviction pass against the store's current time.
pub fn sweep_once(store: &HistoryStore) -> Result<usize, HistoryError> {
    let now = store.now_ms();
    debug!(now, "Running retention sweep");
    store.evict_expired(now)
}

/// Main sweep loop. The first tick fires immediately.
pub async fn run_sweep_loop(store: HistoryStore, interval: Duration) {
    info!(interval_secs = interval.as_secs(), "Retention sweeper started");

    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        ticker.tick().await;

        if let Err(e) = sweep_once(&store) {
            error!(error = %e, "Retention sweep failed");
        }
    }
}
