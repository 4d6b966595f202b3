//! Run statistics printed at shutdown.

use std::time::Duration;

use dispatcher::MetricsSnapshot;
use observability::StatsSummary;

/// Statistics from one router run
#[derive(Debug, Clone, Default)]
pub struct RunStats {
    /// Total uptime
    pub duration: Duration,

    /// Dispatcher counters at shutdown
    pub deliveries: MetricsSnapshot,

    /// Attempt latency in milliseconds
    pub latency: StatsSummary,

    /// Last published config version
    pub config_version: u64,

    /// Routes in the last published snapshot
    pub route_count: usize,

    /// In-flight deliveries finished within the grace period
    pub drained: bool,
}

impl RunStats {
    /// Share of attempts that ended delivered, as percentage
    pub fn success_rate(&self) -> f64 {
        if self.deliveries.attempts > 0 {
            (self.deliveries.delivered as f64 / self.deliveries.attempts as f64) * 100.0
        } else {
            0.0
        }
    }

    /// Print detailed summary
    pub fn print_summary(&self) {
        let d = &self.deliveries;

        println!("\n=== Router Statistics ===\n");

        println!("Overview");
        println!("   ├─ Uptime: {:.2}s", self.duration.as_secs_f64());
        println!("   ├─ Config version: {}", self.config_version);
        println!("   ├─ Routes: {}", self.route_count);
        println!("   └─ Drained cleanly: {}", self.drained);

        println!("\nDeliveries");
        println!("   ├─ Events dispatched: {}", d.dispatched);
        println!("   ├─ Events without route: {}", d.no_route);
        println!("   ├─ Attempts: {}", d.attempts);
        println!("   ├─ Delivered: {} ({:.2}%)", d.delivered, self.success_rate());
        println!("   ├─ Rejected: {}", d.rejected);
        println!("   ├─ Failed: {}", d.failed);
        println!("   ├─ Timed out: {}", d.timed_out);
        println!("   └─ Latency (ms): {}", self.latency);

        println!();
    }
}
