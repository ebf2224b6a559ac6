//! Session chart feed: this session's runs next to their historical averages.

use serde::Serialize;

use crate::history::HistoryStore;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChartPoint {
    pub label: String,
    pub value_ms: f64,
}

/// Two aligned series. `current[i]` is the i-th successful run of the session and
/// `historical[i]` is the rolling average for the same label (0 when unknown).
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ChartFeed {
    current: Vec<ChartPoint>,
    historical: Vec<ChartPoint>,
}

impl ChartFeed {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a completed run and recompute the historical series.
    pub fn record(&mut self, label: &str, duration_ms: f64, history: &HistoryStore) {
        self.current.push(ChartPoint {
            label: label.to_string(),
            value_ms: duration_ms,
        });
        self.refresh(history);
    }

    /// Recompute every historical point from the store.
    pub fn refresh(&mut self, history: &HistoryStore) {
        self.historical = self
            .current
            .iter()
            .map(|point| ChartPoint {
                label: point.label.clone(),
                value_ms: history.rolling_average(&point.label).unwrap_or(0.0),
            })
            .collect();
    }

    pub fn current(&self) -> &[ChartPoint] {
        &self.current
    }

    pub fn historical(&self) -> &[ChartPoint] {
        &self.historical
    }

    pub fn len(&self) -> usize {
        self.current.len()
    }

    pub fn is_empty(&self) -> bool {
        self.current.is_empty()
    }
}
