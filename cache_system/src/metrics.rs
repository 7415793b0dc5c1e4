//! Cache metrics and health reports
//!
//! Counters are process-wide and only ever grow; they reset when the
//! process restarts.

use crate::connection::ConnectionState;
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

/// Shared operation counters
#[derive(Debug, Default)]
pub struct CacheMetrics {
    hits: AtomicU64,
    misses: AtomicU64,
    errors: AtomicU64,
    total_commands: AtomicU64,
    avg_response_ms: Mutex<f64>,
}

/// Point-in-time copy of the counters
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MetricsSnapshot {
    pub hits: u64,
    pub misses: u64,
    pub errors: u64,
    pub total_commands: u64,
    /// Running average command latency in milliseconds
    pub avg_response_time: f64,
}

impl CacheMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_hit(&self) {
        self.hits.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_miss(&self) {
        self.misses.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_error(&self) {
        self.errors.fetch_add(1, Ordering::Relaxed);
    }

    /// Count one command and fold its latency into the running average
    pub fn record_command(&self, elapsed: Duration) {
        let n = self.total_commands.fetch_add(1, Ordering::Relaxed) + 1;
        let latest = elapsed.as_secs_f64() * 1000.0;
        // A poisoned lock only means another recorder panicked mid-update
        let mut avg = self
            .avg_response_ms
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        *avg = (*avg * (n - 1) as f64 + latest) / n as f64;
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        let avg_response_time = *self
            .avg_response_ms
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        MetricsSnapshot {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            errors: self.errors.load(Ordering::Relaxed),
            total_commands: self.total_commands.load(Ordering::Relaxed),
            avg_response_time,
        }
    }
}

impl MetricsSnapshot {
    /// `hits / (hits + misses) * 100`, or 0 before any lookup
    pub fn hit_rate(&self) -> f64 {
        let lookups = self.hits + self.misses;
        if lookups == 0 {
            0.0
        } else {
            self.hits as f64 / lookups as f64 * 100.0
        }
    }

    /// `errors / total_commands * 100`, or 0 before any command
    pub fn error_rate(&self) -> f64 {
        if self.total_commands == 0 {
            0.0
        } else {
            self.errors as f64 / self.total_commands as f64 * 100.0
        }
    }
}

/// Stats snapshot returned by `CacheManager::stats`
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CacheStats {
    pub connected: bool,
    pub state: ConnectionState,
    pub metrics: MetricsSnapshot,
    /// Percentage, 0 when no lookups happened
    pub hit_rate: f64,
    /// Percentage of commands that failed
    pub error_rate: f64,
    pub ttl_policies: BTreeMap<&'static str, u64>,
    pub timestamp: chrono::DateTime<chrono::Utc>,
}

/// Result of a liveness probe
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthReport {
    pub healthy: bool,
    /// Probe round-trip, present when the probe was sent
    pub latency_ms: Option<u64>,
    pub connected: bool,
    pub error: Option<String>,
    pub stats: Option<CacheStats>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn snapshot_starts_at_zero() {
        let metrics = CacheMetrics::new();
        let snapshot = metrics.snapshot();
        assert_eq!(snapshot, MetricsSnapshot::default());
        assert_eq!(snapshot.hit_rate(), 0.0);
        assert_eq!(snapshot.error_rate(), 0.0);
    }

    #[test]
    fn hit_rate_is_a_percentage() {
        let metrics = CacheMetrics::new();
        metrics.record_hit();
        metrics.record_hit();
        metrics.record_hit();
        metrics.record_miss();
        assert_eq!(metrics.snapshot().hit_rate(), 75.0);
    }

    #[test]
    fn running_average_weights_every_command() {
        let metrics = CacheMetrics::new();
        metrics.record_command(Duration::from_millis(10));
        metrics.record_command(Duration::from_millis(20));
        metrics.record_command(Duration::from_millis(30));

        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.total_commands, 3);
        assert!((snapshot.avg_response_time - 20.0).abs() < 1e-9);
    }

    #[test]
    fn error_rate_uses_total_commands() {
        let metrics = CacheMetrics::new();
        for _ in 0..4 {
            metrics.record_command(Duration::from_millis(1));
        }
        metrics.record_error();
        assert_eq!(metrics.snapshot().error_rate(), 25.0);
    }

    #[test]
    fn concurrent_increments_are_not_lost() {
        let metrics = std::sync::Arc::new(CacheMetrics::new());
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let metrics = std::sync::Arc::clone(&metrics);
                std::thread::spawn(move || {
                    for _ in 0..1000 {
                        metrics.record_hit();
                        metrics.record_command(Duration::from_micros(5));
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.hits, 8000);
        assert_eq!(snapshot.total_commands, 8000);
    }
}
