//! Plain-text rendering for the CLI. Values are rounded to two decimals here and nowhere else.

use std::fmt::Write as _;

use chrono::{DateTime, Utc};

use crate::chart::ChartFeed;
use crate::clock::EpochMillis;
use crate::history::{Sample, TestSummary};
use crate::runner::{PersistStatus, RunOutcome};
use crate::workloads::WorkloadRegistry;

const BYTES_PER_MB: f64 = 1024.0 * 1024.0;

pub fn format_ms(ms: f64) -> String {
    format!("{ms:.2}ms")
}

/// Signed memory delta in MB, or "Not available".
pub fn format_memory(delta_bytes: Option<i64>) -> String {
    match delta_bytes {
        Some(bytes) => format!("{:.2} MB", bytes as f64 / BYTES_PER_MB),
        None => "Not available".to_string(),
    }
}

pub fn format_timestamp(ms: EpochMillis) -> String {
    DateTime::<Utc>::from_timestamp_millis(ms)
        .map(|t| t.format("%Y-%m-%d %H:%M:%S%.3f UTC").to_string())
        .unwrap_or_else(|| ms.to_string())
}

pub fn render_workloads(registry: &WorkloadRegistry) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "{:<8} | {:<20} | Description", "ID", "Name");
    let _ = writeln!(out, "{:-<8}-|-{:-<20}-|-{:-<40}", "", "", "");
    for w in registry.iter() {
        let _ = writeln!(
            out,
            "{:<8} | {:<20} | {}",
            w.id(),
            w.display_name(),
            w.description()
        );
    }
    out
}

pub fn render_outcome(outcome: &RunOutcome) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "\n=== {} ===", outcome.test_name);
    let _ = writeln!(out, "Execution Time: {}", format_ms(outcome.duration_ms));
    let _ = writeln!(out, "Memory Usage:   {}", format_memory(outcome.memory_delta_bytes));

    match (outcome.details(), outcome.error()) {
        (Some(details), _) => {
            let _ = writeln!(out, "\n{}", details.heading);
            for line in &details.lines {
                let _ = writeln!(out, "  {}: {}", line.label, line.value);
            }
        }
        (None, Some(err)) => {
            let _ = writeln!(out, "Error: {err}");
        }
        (None, None) => {}
    }

    match &outcome.persisted {
        PersistStatus::Saved => {}
        PersistStatus::Skipped => {
            let _ = writeln!(out, "(not recorded in history)");
        }
        PersistStatus::Failed(reason) => {
            let _ = writeln!(out, "Warning: history not saved: {reason}");
        }
    }
    out
}

/// Session runs beside the historical average for the same test.
pub fn render_chart(chart: &ChartFeed) -> String {
    let mut out = String::new();
    if chart.is_empty() {
        return out;
    }
    let _ = writeln!(out, "\n=== Performance Comparison ===");
    let _ = writeln!(
        out,
        "{:<20} | {:>14} | {:>18}",
        "Test", "Current Run", "Historical Average"
    );
    let _ = writeln!(out, "{:-<20}-|-{:->14}-|-{:->18}", "", "", "");
    for (current, historical) in chart.current().iter().zip(chart.historical()) {
        let _ = writeln!(
            out,
            "{:<20} | {:>14} | {:>18}",
            current.label,
            format_ms(current.value_ms),
            format_ms(historical.value_ms)
        );
    }
    out
}

pub fn render_summaries(summaries: &[TestSummary]) -> String {
    if summaries.is_empty() {
        return "No history recorded.\n".to_string();
    }
    let mut out = String::new();
    let _ = writeln!(
        out,
        "{:<20} | {:>5} | {:>12} | {:>12} | {:>12} | Last Run",
        "Test", "Runs", "Average", "Min", "Max"
    );
    let _ = writeln!(
        out,
        "{:-<20}-|-{:->5}-|-{:->12}-|-{:->12}-|-{:->12}-|-{:-<27}",
        "", "", "", "", "", ""
    );
    for s in summaries {
        let _ = writeln!(
            out,
            "{:<20} | {:>5} | {:>12} | {:>12} | {:>12} | {}",
            s.test_name,
            s.count,
            format_ms(s.average_ms),
            format_ms(s.min_ms),
            format_ms(s.max_ms),
            format_timestamp(s.latest_timestamp)
        );
    }
    out
}

/// One test's samples, in the order given.
pub fn render_samples(test_name: &str, samples: &[Sample]) -> String {
    if samples.is_empty() {
        return format!("No history recorded for {test_name}.\n");
    }
    let mut out = String::new();
    let _ = writeln!(out, "{test_name} ({} samples)", samples.len());
    let _ = writeln!(out, "{:<27} | {:>12}", "Recorded", "Duration");
    let _ = writeln!(out, "{:-<27}-|-{:->12}", "", "");
    for s in samples {
        let _ = writeln!(
            out,
            "{:<27} | {:>12}",
            format_timestamp(s.timestamp),
            format_ms(s.duration_ms)
        );
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runner::{RunResult, WorkloadFailure};
    use crate::workloads::Details;
    use uuid::Uuid;

    fn outcome(result: RunResult, persisted: PersistStatus) -> RunOutcome {
        RunOutcome {
            run_id: Uuid::new_v4(),
            test_name: "Sort Performance".to_string(),
            started_at: Utc::now(),
            duration_ms: 12.3456,
            memory_delta_bytes: None,
            result,
            persisted,
        }
    }

    #[test]
    fn test_rounding_happens_at_display() {
        assert_eq!(format_ms(12.3456), "12.35ms");
        assert_eq!(format_ms(10.0), "10.00ms");
    }

    #[test]
    fn test_format_memory() {
        assert_eq!(format_memory(None), "Not available");
        assert_eq!(format_memory(Some(3 * 1024 * 1024)), "3.00 MB");
        assert_eq!(format_memory(Some(-512 * 1024)), "-0.50 MB");
    }

    #[test]
    fn test_format_timestamp() {
        assert_eq!(format_timestamp(0), "1970-01-01 00:00:00.000 UTC");
    }

    #[test]
    fn test_render_success_outcome() {
        let details = Details::new("Sort Performance Results").line("Array Size", 10);
        let text = render_outcome(&outcome(RunResult::Details(details), PersistStatus::Saved));
        assert!(text.contains("Execution Time: 12.35ms"));
        assert!(text.contains("Memory Usage:   Not available"));
        assert!(text.contains("  Array Size: 10"));
        assert!(!text.contains("Warning"));
    }

    #[test]
    fn test_render_failed_outcome() {
        let text = render_outcome(&outcome(
            RunResult::Error(WorkloadFailure::new("X")),
            PersistStatus::Skipped,
        ));
        assert!(text.contains("Error: X"));
        assert!(text.contains("not recorded"));
    }

    #[test]
    fn test_render_persist_failure() {
        let details = Details::new("Results");
        let text = render_outcome(&outcome(
            RunResult::Details(details),
            PersistStatus::Failed("disk full".to_string()),
        ));
        assert!(text.contains("Warning: history not saved: disk full"));
    }

    #[test]
    fn test_render_empty_chart() {
        assert!(render_chart(&ChartFeed::new()).is_empty());
    }

    #[test]
    fn test_render_empty_summaries() {
        assert_eq!(render_summaries(&[]), "No history recorded.\n");
    }

    #[test]
    fn test_render_summaries_rows() {
        let rows = vec![TestSummary {
            test_name: "JSON Operations".to_string(),
            count: 2,
            average_ms: 10.0,
            min_ms: 7.66,
            max_ms: 12.34,
            latest_timestamp: 0,
        }];
        let text = render_summaries(&rows);
        assert!(text.contains("JSON Operations"));
        assert!(text.contains("10.00ms"));
        assert!(text.contains("7.66ms"));
    }

    #[test]
    fn test_render_samples() {
        let samples = vec![Sample {
            test_name: "CPU Processing".to_string(),
            duration_ms: 1.005,
            timestamp: 1_000,
        }];
        let text = render_samples("CPU Processing", &samples);
        assert!(text.starts_with("CPU Processing (1 samples)"));
        assert!(text.contains("1970-01-01 00:00:01.000 UTC"));
        assert_eq!(
            render_samples("Nope", &[]),
            "No history recorded for Nope.\n"
        );
    }
}
