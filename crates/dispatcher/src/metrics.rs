//! Dispatch metrics for observability

use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;

use contracts::{ConversationId, DeliveryOutcome, DeliveryStatus, TargetUrl};
use observability::{RunningStats, StatsSummary};
use serde::Serialize;

/// Totals for one dispatcher
#[derive(Debug, Default)]
pub struct DispatchMetrics {
    /// Events that resolved to at least one target
    dispatched: AtomicU64,
    /// Events with no route
    no_route: AtomicU64,
    /// Delivery attempts started
    attempts: AtomicU64,
    delivered: AtomicU64,
    rejected: AtomicU64,
    failed: AtomicU64,
    timed_out: AtomicU64,
    /// Per-attempt latency in milliseconds, all outcomes
    latency: Mutex<RunningStats>,
}

impl DispatchMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn inc_dispatched(&self) {
        self.dispatched.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_no_route(&self) {
        self.no_route.fetch_add(1, Ordering::Relaxed);
    }

    pub fn add_attempts(&self, n: u64) {
        self.attempts.fetch_add(n, Ordering::Relaxed);
    }

    /// Count a finished attempt by its status
    pub fn record(&self, status: DeliveryStatus) {
        let counter = match status {
            DeliveryStatus::Delivered => &self.delivered,
            DeliveryStatus::Rejected => &self.rejected,
            DeliveryStatus::Failed => &self.failed,
            DeliveryStatus::Timeout => &self.timed_out,
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_latency(&self, latency_ms: f64) {
        if let Ok(mut stats) = self.latency.lock() {
            stats.push(latency_ms);
        }
    }

    pub fn latency(&self) -> StatsSummary {
        self.latency
            .lock()
            .map(|stats| stats.summary())
            .unwrap_or_default()
    }

    pub fn delivered(&self) -> u64 {
        self.delivered.load(Ordering::Relaxed)
    }

    /// Get snapshot of all metrics
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            dispatched: self.dispatched.load(Ordering::Relaxed),
            no_route: self.no_route.load(Ordering::Relaxed),
            attempts: self.attempts.load(Ordering::Relaxed),
            delivered: self.delivered(),
            rejected: self.rejected.load(Ordering::Relaxed),
            failed: self.failed.load(Ordering::Relaxed),
            timed_out: self.timed_out.load(Ordering::Relaxed),
        }
    }
}

/// Snapshot of dispatch metrics (for reporting)
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct MetricsSnapshot {
    pub dispatched: u64,
    pub no_route: u64,
    pub attempts: u64,
    pub delivered: u64,
    pub rejected: u64,
    pub failed: u64,
    pub timed_out: u64,
}

impl MetricsSnapshot {
    /// Attempts that did not end in `Delivered`
    pub fn failures(&self) -> u64 {
        self.rejected + self.failed + self.timed_out
    }
}

/// Successful deliveries per (conversation, target)
///
/// In-memory only; resets with the process.
#[derive(Debug, Default)]
pub struct ExecutionCounts {
    counts: Mutex<HashMap<(ConversationId, TargetUrl), u64>>,
}

impl ExecutionCounts {
    pub fn new() -> Self {
        Self::default()
    }

    /// Count the outcome if it was a success
    pub fn record(&self, outcome: &DeliveryOutcome) {
        if !outcome.success {
            return;
        }
        if let Ok(mut counts) = self.counts.lock() {
            *counts
                .entry((outcome.conversation_id.clone(), outcome.target.clone()))
                .or_insert(0) += 1;
        }
    }

    pub fn get(&self, conversation_id: &str, target: &str) -> u64 {
        self.counts
            .lock()
            .ok()
            .and_then(|counts| {
                counts
                    .get(&(ConversationId::from(conversation_id), TargetUrl::from(target)))
                    .copied()
            })
            .unwrap_or(0)
    }

    /// conversation id -> target -> count, sorted
    pub fn snapshot(&self) -> BTreeMap<String, BTreeMap<String, u64>> {
        let mut out: BTreeMap<String, BTreeMap<String, u64>> = BTreeMap::new();
        if let Ok(counts) = self.counts.lock() {
            for ((id, target), count) in counts.iter() {
                out.entry(id.to_string())
                    .or_default()
                    .insert(target.to_string(), *count);
            }
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_status_counters() {
        let metrics = DispatchMetrics::new();
        metrics.add_attempts(3);
        metrics.record(DeliveryStatus::Delivered);
        metrics.record(DeliveryStatus::Timeout);
        metrics.record(DeliveryStatus::Rejected);

        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.attempts, 3);
        assert_eq!(snapshot.delivered, 1);
        assert_eq!(snapshot.failures(), 2);
    }

    #[test]
    fn test_execution_counts_only_successes() {
        let counts = ExecutionCounts::new();
        let id = ConversationId::from("555@x");
        let target = TargetUrl::from("http://a.test/h1");

        counts.record(&DeliveryOutcome::delivered(id.clone(), target.clone(), Duration::ZERO));
        counts.record(&DeliveryOutcome::delivered(id.clone(), target.clone(), Duration::ZERO));
        counts.record(&DeliveryOutcome::failed(
            id,
            target,
            DeliveryStatus::Failed,
            "refused",
            Duration::ZERO,
        ));

        assert_eq!(counts.get("555@x", "http://a.test/h1"), 2);
        assert_eq!(counts.snapshot()["555@x"]["http://a.test/h1"], 2);
        assert_eq!(counts.get("999@x", "http://a.test/h1"), 0);
    }
}
