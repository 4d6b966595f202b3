//! # Dispatcher
//!
//! 事件分发模块。
//!
//! 负责：
//! - 按会话 id 解析目标集合 (纯函数, 基于快照)
//! - Fan-out 到每个 webhook 目标, 单次尝试, 互不影响
//! - 每次尝试产生一个 `DeliveryOutcome` 并上报 NotificationSink

pub mod client;
pub mod dispatcher;
pub mod error;
pub mod handle;
pub mod metrics;

pub use client::{DeliveryClient, HttpDeliveryClient, LocalDeliveryClient};
pub use dispatcher::{Dispatcher, DispatcherConfig};
pub use error::DeliveryError;
pub use handle::DispatchHandle;
pub use metrics::{DispatchMetrics, ExecutionCounts, MetricsSnapshot};
