//! Router runtime assembly and run statistics.

mod app;
mod stats;

pub use app::{RouterRuntime, RuntimeConfig};
pub use stats::RunStats;
