//! Cooperative memory pressure check for the embedder's batch sizing.
//!
//! `sysinfo::System::refresh_memory` stands in for a `psutil`-style
//! system memory read. This is deliberately a small standalone type
//! rather than an inline percentage check in the embedder, so the
//! embedder's tests can inject a fake reading without touching real
//! system memory.

use sysinfo::System;

/// A snapshot of system memory usage at the moment it was taken.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MemoryStats {
    pub percent_used: f32,
    pub available_gb: f64,
    pub total_gb: f64,
}

/// Reports whether the embedder should halve its batch size before
/// starting the next batch.
pub struct MemoryManager {
    max_memory_percent: f32,
}

impl MemoryManager {
    pub fn new(max_memory_percent: f32) -> Self {
        Self { max_memory_percent }
    }

    pub fn max_memory_percent(&self) -> f32 {
        self.max_memory_percent
    }

    /// Reads current system memory usage via `sysinfo`.
    pub fn current_stats(&self) -> MemoryStats {
        let mut sys = System::new();
        sys.refresh_memory();
        let total = sys.total_memory();
        let available = sys.available_memory();
        let used_percent = if total == 0 {
            0.0
        } else {
            let used = total.saturating_sub(available);
            (used as f64 / total as f64 * 100.0) as f32
        };
        const BYTES_PER_GB: f64 = 1024.0 * 1024.0 * 1024.0;
        MemoryStats {
            percent_used: used_percent,
            available_gb: available as f64 / BYTES_PER_GB,
            total_gb: total as f64 / BYTES_PER_GB,
        }
    }

    /// True when `stats.percent_used` has crossed the configured ceiling.
    pub fn is_under_pressure(&self, stats: &MemoryStats) -> bool {
        stats.percent_used > self.max_memory_percent
    }

    /// Equivalent of the reference implementation's GC-and-free-caches
    /// hook, run at batch boundaries. There is no GPU cache to release
    /// for a CPU-side batch encoder; the owned batch buffers are freed
    /// simply by going out of scope in the caller, so this is a no-op
    /// reserved for a future local-inference backend.
    pub fn cleanup(&self) {}
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pressure_triggers_above_ceiling() {
        let manager = MemoryManager::new(80.0);
        let under = MemoryStats {
            percent_used: 50.0,
            available_gb: 8.0,
            total_gb: 16.0,
        };
        let over = MemoryStats {
            percent_used: 95.0,
            available_gb: 1.0,
            total_gb: 16.0,
        };
        assert!(!manager.is_under_pressure(&under));
        assert!(manager.is_under_pressure(&over));
    }

    #[test]
    fn current_stats_reports_nonzero_total_on_a_real_machine() {
        let manager = MemoryManager::new(80.0);
        let stats = manager.current_stats();
        assert!(stats.total_gb > 0.0);
        assert!(stats.percent_used >= 0.0);
    }
}
