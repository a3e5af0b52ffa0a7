//! Per-operation request counters

use serde::Serialize;
use std::collections::{BTreeMap, HashMap};
use std::sync::Mutex;
use std::time::Duration;

/// Key under which the aggregate of all operations is reported
pub const TOTAL_KEY: &str = "__total__";

#[derive(Debug, Default, Clone, Copy)]
struct Bucket {
    count: u64,
    total_ms: f64,
}

/// Snapshot of one operation's counters
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct MetricSummary {
    pub count: u64,
    /// Mean latency, rounded to two decimals
    pub avg_ms: f64,
}

/// Request count and latency per operation
///
/// Owned by whoever serves requests and shared by reference; there is no
/// process-global registry.
#[derive(Debug, Default)]
pub struct RequestMetrics {
    buckets: Mutex<HashMap<String, Bucket>>,
}

impl RequestMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records one call of `operation` that took `elapsed`
    pub fn observe(&self, operation: &str, elapsed: Duration) {
        let ms = elapsed.as_secs_f64() * 1000.0;
        let Ok(mut buckets) = self.buckets.lock() else {
            tracing::warn!(operation, "Metrics lock poisoned, dropping observation");
            return;
        };

        for key in [operation, TOTAL_KEY] {
            let bucket = buckets.entry(key.to_string()).or_default();
            bucket.count += 1;
            bucket.total_ms += ms;
        }
    }

    /// Returns count and mean latency per operation, plus the total
    pub fn snapshot(&self) -> BTreeMap<String, MetricSummary> {
        let mut out = BTreeMap::new();
        out.insert(
            TOTAL_KEY.to_string(),
            MetricSummary {
                count: 0,
                avg_ms: 0.0,
            },
        );

        let Ok(buckets) = self.buckets.lock() else {
            return out;
        };

        for (operation, bucket) in buckets.iter() {
            let avg = if bucket.count == 0 {
                0.0
            } else {
                bucket.total_ms / bucket.count as f64
            };
            out.insert(
                operation.clone(),
                MetricSummary {
                    count: bucket.count,
                    avg_ms: (avg * 100.0).round() / 100.0,
                },
            );
        }
        out
    }

    /// Zeroes every counter
    pub fn reset(&self) {
        if let Ok(mut buckets) = self.buckets.lock() {
            buckets.clear();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fresh_snapshot_has_zero_total() {
        let metrics = RequestMetrics::new();
        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.len(), 1);
        assert_eq!(snapshot[TOTAL_KEY].count, 0);
        assert_eq!(snapshot[TOTAL_KEY].avg_ms, 0.0);
    }

    #[test]
    fn test_observe_updates_operation_and_total() {
        let metrics = RequestMetrics::new();
        metrics.observe("submit", Duration::from_millis(10));
        metrics.observe("submit", Duration::from_millis(20));
        metrics.observe("get_result", Duration::from_millis(3));

        let snapshot = metrics.snapshot();
        assert_eq!(snapshot["submit"].count, 2);
        assert_eq!(snapshot["submit"].avg_ms, 15.0);
        assert_eq!(snapshot["get_result"].count, 1);
        assert_eq!(snapshot[TOTAL_KEY].count, 3);
        assert_eq!(snapshot[TOTAL_KEY].avg_ms, 11.0);
    }

    #[test]
    fn test_average_is_rounded() {
        let metrics = RequestMetrics::new();
        metrics.observe("op", Duration::from_micros(1234));
        metrics.observe("op", Duration::from_micros(1000));
        assert_eq!(metrics.snapshot()["op"].avg_ms, 1.12);
    }

    #[test]
    fn test_reset() {
        let metrics = RequestMetrics::new();
        metrics.observe("submit", Duration::from_millis(10));
        metrics.reset();

        let snapshot = metrics.snapshot();
        assert!(!snapshot.contains_key("submit"));
        assert_eq!(snapshot[TOTAL_KEY].count, 0);
    }
}
