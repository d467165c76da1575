//! Core infrastructure shared by the orchestration engine
//!
//! - `error`: error taxonomy and result alias
//! - `metrics`: per-backend counters, response-time statistics and reports

pub mod error;
pub mod metrics;

pub use error::{LifecycleOperation, Result, TtsError};
pub use metrics::{
    MetricsSnapshot, MetricsStore, PerformanceReport, ResponseTimeStats, TotalsSnapshot,
};
