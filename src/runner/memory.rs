//! Best-effort process memory introspection.

/// Reports how much memory the process currently uses, when the host can tell.
pub trait MemoryReader: Send + Sync {
    fn used_bytes(&self) -> Option<u64>;
}

/// Resident set size of the current process (Linux `/proc/self/status`).
#[derive(Debug, Default, Clone, Copy)]
pub struct ProcessMemory;

impl MemoryReader for ProcessMemory {
    #[cfg(target_os = "linux")]
    fn used_bytes(&self) -> Option<u64> {
        let status = std::fs::read_to_string("/proc/self/status").ok()?;
        parse_vm_rss(&status)
    }

    #[cfg(not(target_os = "linux"))]
    fn used_bytes(&self) -> Option<u64> {
        None
    }
}

/// For hosts (or tests) without memory introspection.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoMemoryReading;

impl MemoryReader for NoMemoryReading {
    fn used_bytes(&self) -> Option<u64> {
        None
    }
}

/// Parse `VmRSS:   123456 kB` into bytes.
pub fn parse_vm_rss(status: &str) -> Option<u64> {
    let kb: u64 = status
        .lines()
        .find(|l| l.starts_with("VmRSS:"))
        .and_then(|l| l.split_whitespace().nth(1))
        .and_then(|s| s.parse().ok())?;
    Some(kb * 1024)
}

/// Signed difference between two readings; `None` if either is missing.
pub fn delta(start: Option<u64>, end: Option<u64>) -> Option<i64> {
    let start = i64::try_from(start?).ok()?;
    let end = i64::try_from(end?).ok()?;
    end.checked_sub(start)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_vm_rss() {
        let status = "Name:\tperfscope\nVmPeak:\t  20000 kB\nVmRSS:\t   1536 kB\nThreads:\t4\n";
        assert_eq!(parse_vm_rss(status), Some(1536 * 1024));
    }

    #[test]
    fn test_parse_vm_rss_missing() {
        assert_eq!(parse_vm_rss("Name:\tperfscope\n"), None);
    }

    #[test]
    fn test_delta_requires_both_readings() {
        assert_eq!(delta(Some(100), Some(40)), Some(-60));
        assert_eq!(delta(None, Some(40)), None);
        assert_eq!(delta(Some(100), None), None);
    }

    #[test]
    fn test_delta_out_of_range_readings() {
        assert_eq!(delta(Some(u64::MAX), Some(0)), None);
        assert_eq!(delta(Some(0), Some(i64::MAX as u64)), Some(i64::MAX));
    }

    #[cfg(target_os = "linux")]
    #[test]
    fn test_process_memory_reports_on_linux() {
        assert!(ProcessMemory.used_bytes().unwrap_or(0) > 0);
    }
}
