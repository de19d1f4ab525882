//! Transaction usage statistics
//!
//! Incrementally-updated counters over every transactional call, including
//! pass-throughs and failures. Readers only ever see snapshot copies.

use std::sync::Mutex;

use serde::Serialize;

#[derive(Debug, Default)]
struct StatsInner {
    total: u64,
    succeeded: u64,
    failed: u64,
    duration_sum_ms: u64,
    min_duration_ms: u64,
    max_duration_ms: u64,
}

/// Snapshot of the collected statistics
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StatsSnapshot {
    pub total: u64,
    pub succeeded: u64,
    pub failed: u64,
    pub avg_duration_ms: f64,
    pub min_duration_ms: u64,
    pub max_duration_ms: u64,
}

/// Mutable statistics collector shared by all transactional calls.
///
/// The aggregate set moves together, so a mutex guards it rather than
/// individual atomics.
#[derive(Debug, Default)]
pub struct TransactionStats {
    inner: Mutex<StatsInner>,
}

impl TransactionStats {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record one finished call.
    ///
    /// Durations are floored at 1 ms so instant completions against mocks
    /// still register.
    pub fn update(&self, duration_ms: u64, success: bool) {
        let duration = duration_ms.max(1);
        let mut inner = self.inner.lock().unwrap_or_else(|e| e.into_inner());

        if inner.total == 0 || duration < inner.min_duration_ms {
            inner.min_duration_ms = duration;
        }
        if duration > inner.max_duration_ms {
            inner.max_duration_ms = duration;
        }

        inner.total += 1;
        if success {
            inner.succeeded += 1;
        } else {
            inner.failed += 1;
        }
        inner.duration_sum_ms += duration;
    }

    /// Clear all counters and the running sum
    pub fn reset(&self) {
        let mut inner = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        *inner = StatsInner::default();
    }

    /// Copy the current counters, excluding the internal running sum
    pub fn snapshot(&self) -> StatsSnapshot {
        let inner = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        let avg = if inner.total > 0 {
            inner.duration_sum_ms as f64 / inner.total as f64
        } else {
            0.0
        };
        StatsSnapshot {
            total: inner.total,
            succeeded: inner.succeeded,
            failed: inner.failed,
            avg_duration_ms: avg,
            min_duration_ms: inner.min_duration_ms,
            max_duration_ms: inner.max_duration_ms,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_initial_snapshot_is_zero() {
        let stats = TransactionStats::new();
        let snapshot = stats.snapshot();
        assert_eq!(snapshot.total, 0);
        assert_eq!(snapshot.succeeded, 0);
        assert_eq!(snapshot.failed, 0);
        assert_eq!(snapshot.avg_duration_ms, 0.0);
        assert_eq!(snapshot.min_duration_ms, 0);
        assert_eq!(snapshot.max_duration_ms, 0);
    }

    #[test]
    fn test_update_tracks_success_and_failure() {
        let stats = TransactionStats::new();
        stats.update(10, true);
        stats.update(30, false);
        stats.update(20, true);

        let snapshot = stats.snapshot();
        assert_eq!(snapshot.total, 3);
        assert_eq!(snapshot.succeeded, 2);
        assert_eq!(snapshot.failed, 1);
        assert_eq!(snapshot.succeeded + snapshot.failed, snapshot.total);
        assert_eq!(snapshot.avg_duration_ms, 20.0);
        assert_eq!(snapshot.min_duration_ms, 10);
        assert_eq!(snapshot.max_duration_ms, 30);
    }

    #[test]
    fn test_zero_duration_floored_to_one() {
        let stats = TransactionStats::new();
        stats.update(0, true);

        let snapshot = stats.snapshot();
        assert_eq!(snapshot.min_duration_ms, 1);
        assert_eq!(snapshot.max_duration_ms, 1);
        assert_eq!(snapshot.avg_duration_ms, 1.0);
    }

    #[test]
    fn test_min_set_by_first_observation() {
        let stats = TransactionStats::new();
        stats.update(500, true);
        assert_eq!(stats.snapshot().min_duration_ms, 500);

        stats.update(100, true);
        let snapshot = stats.snapshot();
        assert_eq!(snapshot.min_duration_ms, 100);
        assert_eq!(snapshot.max_duration_ms, 500);
    }

    #[test]
    fn test_reset_clears_everything() {
        let stats = TransactionStats::new();
        stats.update(42, true);
        stats.update(7, false);
        stats.reset();

        let snapshot = stats.snapshot();
        assert_eq!(snapshot.total, 0);
        assert_eq!(snapshot.avg_duration_ms, 0.0);
        assert_eq!(snapshot.min_duration_ms, 0);

        // Counters resume cleanly after a reset
        stats.update(9, true);
        let snapshot = stats.snapshot();
        assert_eq!(snapshot.total, 1);
        assert_eq!(snapshot.min_duration_ms, 9);
    }
}
