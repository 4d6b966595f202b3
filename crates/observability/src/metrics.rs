//! Router 指标收集模块
//!
//! Thin wrappers over the `metrics` facade. Without an installed recorder
//! every call is a no-op.

use contracts::{DeliveryStatus, ListenerState};
use metrics::{counter, gauge, histogram};

fn status_label(status: DeliveryStatus) -> &'static str {
    match status {
        DeliveryStatus::Delivered => "delivered",
        DeliveryStatus::Timeout => "timeout",
        DeliveryStatus::Rejected => "rejected",
        DeliveryStatus::Failed => "failed",
    }
}

/// 记录一次投递结果
pub fn record_delivery(status: DeliveryStatus, latency_ms: f64) {
    counter!("router_deliveries_total", "status" => status_label(status)).increment(1);
    histogram!("router_delivery_latency_ms").record(latency_ms);
}

/// 记录未配置路由的事件
pub fn record_no_route() {
    counter!("router_no_route_total").increment(1);
}

/// 记录配置重载
pub fn record_config_reload(success: bool) {
    let status = if success { "success" } else { "error" };
    counter!("router_config_reloads_total", "status" => status).increment(1);
}

/// Listener state as a gauge (0 stopped, 1 starting, 2 running, 3 restarting)
pub fn record_listener_state(state: ListenerState) {
    gauge!("router_listener_state").set(state.as_gauge());
}

/// 统计摘要
#[derive(Debug, Clone, Copy, Default, PartialEq, serde::Serialize)]
pub struct StatsSummary {
    pub count: u64,
    pub min: f64,
    pub max: f64,
    pub mean: f64,
    pub std_dev: f64,
}

impl From<&RunningStats> for StatsSummary {
    fn from(stats: &RunningStats) -> Self {
        Self {
            count: stats.count,
            min: stats.min,
            max: stats.max,
            mean: stats.mean(),
            std_dev: stats.std_dev(),
        }
    }
}

impl std::fmt::Display for StatsSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.count == 0 {
            write!(f, "N/A")
        } else {
            write!(
                f,
                "min={:.1}, max={:.1}, mean={:.1}, std={:.1} (n={})",
                self.min, self.max, self.mean, self.std_dev, self.count
            )
        }
    }
}

/// 在线统计计算器 (Welford's algorithm)
#[derive(Debug, Clone, Default)]
pub struct RunningStats {
    count: u64,
    mean: f64,
    m2: f64,
    min: f64,
    max: f64,
}

impl RunningStats {
    /// 添加新值
    pub fn push(&mut self, value: f64) {
        self.count += 1;

        if self.count == 1 {
            self.min = value;
            self.max = value;
            self.mean = value;
            self.m2 = 0.0;
        } else {
            self.min = self.min.min(value);
            self.max = self.max.max(value);

            let delta = value - self.mean;
            self.mean += delta / self.count as f64;
            let delta2 = value - self.mean;
            self.m2 += delta * delta2;
        }
    }

    pub fn count(&self) -> u64 {
        self.count
    }

    pub fn mean(&self) -> f64 {
        if self.count == 0 {
            0.0
        } else {
            self.mean
        }
    }

    /// 方差
    pub fn variance(&self) -> f64 {
        if self.count < 2 {
            0.0
        } else {
            self.m2 / (self.count - 1) as f64
        }
    }

    pub fn std_dev(&self) -> f64 {
        self.variance().sqrt()
    }

    pub fn summary(&self) -> StatsSummary {
        StatsSummary::from(self)
    }
}
