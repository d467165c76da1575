//! Per-backend performance metrics
//!
//! Tracks request counters and response-time samples for every registered
//! backend. Counters are lock-free atomics inside a `DashMap` entry; the
//! response-time ring buffer sits behind a small mutex.

use std::collections::{BTreeMap, VecDeque};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use serde::{Deserialize, Serialize};

use super::error::{Result, TtsError};

/// Default cap on retained response-time samples per backend
pub const DEFAULT_MAX_SAMPLES: usize = 1000;

/// Live counters for one backend
struct BackendMetrics {
    total_requests: AtomicU64,
    successful_requests: AtomicU64,
    failed_requests: AtomicU64,
    health_checks: AtomicU64,
    failed_health_checks: AtomicU64,
    response_times_ms: Mutex<VecDeque<f64>>,
    last_used: Mutex<Option<DateTime<Utc>>>,
}

impl BackendMetrics {
    fn new() -> Self {
        Self {
            total_requests: AtomicU64::new(0),
            successful_requests: AtomicU64::new(0),
            failed_requests: AtomicU64::new(0),
            health_checks: AtomicU64::new(0),
            failed_health_checks: AtomicU64::new(0),
            response_times_ms: Mutex::new(VecDeque::new()),
            last_used: Mutex::new(None),
        }
    }

    fn snapshot(&self) -> MetricsSnapshot {
        let mut sorted: Vec<f64> = self
            .response_times_ms
            .lock()
            .map(|samples| samples.iter().copied().collect())
            .unwrap_or_default();
        sorted.sort_by(|a, b| a.total_cmp(b));

        let total = self.total_requests.load(Ordering::Acquire);
        let successful = self.successful_requests.load(Ordering::Acquire);
        let failed = self.failed_requests.load(Ordering::Acquire);

        MetricsSnapshot {
            total_requests: total,
            successful_requests: successful,
            failed_requests: failed,
            health_checks: self.health_checks.load(Ordering::Relaxed),
            failed_health_checks: self.failed_health_checks.load(Ordering::Relaxed),
            response_time: ResponseTimeStats::from_sorted(&sorted),
            last_used: self.last_used.lock().ok().and_then(|t| *t),
        }
    }
}

/// Summary statistics over the retained response-time samples
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ResponseTimeStats {
    /// Number of samples
    pub count: usize,
    /// Mean response time in milliseconds
    pub avg_ms: f64,
    /// Minimum response time in milliseconds
    pub min_ms: f64,
    /// Maximum response time in milliseconds
    pub max_ms: f64,
    /// 50th percentile
    pub p50_ms: f64,
    /// 95th percentile
    pub p95_ms: f64,
    /// 99th percentile
    pub p99_ms: f64,
}

impl ResponseTimeStats {
    fn from_sorted(sorted: &[f64]) -> Self {
        if sorted.is_empty() {
            return Self::default();
        }
        Self {
            count: sorted.len(),
            avg_ms: sorted.iter().sum::<f64>() / sorted.len() as f64,
            min_ms: sorted[0],
            max_ms: sorted[sorted.len() - 1],
            p50_ms: percentile(sorted, 0.5),
            p95_ms: percentile(sorted, 0.95),
            p99_ms: percentile(sorted, 0.99),
        }
    }
}

/// Point-in-time copy of one backend's metrics
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MetricsSnapshot {
    pub total_requests: u64,
    pub successful_requests: u64,
    pub failed_requests: u64,
    pub health_checks: u64,
    pub failed_health_checks: u64,
    pub response_time: ResponseTimeStats,
    pub last_used: Option<DateTime<Utc>>,
}

impl MetricsSnapshot {
    /// Fraction of requests that succeeded, 0.0 without history
    pub fn success_rate(&self) -> f64 {
        if self.total_requests == 0 {
            0.0
        } else {
            self.successful_requests as f64 / self.total_requests as f64
        }
    }

    /// Fraction of completed requests that failed, 0.0 without history
    pub fn error_rate(&self) -> f64 {
        let completed = self.successful_requests + self.failed_requests;
        if completed == 0 {
            0.0
        } else {
            self.failed_requests as f64 / completed as f64
        }
    }

    /// Requests that have not (yet) succeeded
    pub fn outstanding_load(&self) -> u64 {
        self.total_requests.saturating_sub(self.successful_requests)
    }

    /// Requests started but not finished
    pub fn in_flight(&self) -> u64 {
        self.total_requests
            .saturating_sub(self.successful_requests + self.failed_requests)
    }
}

/// Aggregate counters over every backend
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TotalsSnapshot {
    pub backends: usize,
    pub total_requests: u64,
    pub successful_requests: u64,
    pub failed_requests: u64,
    pub success_rate: f64,
    pub avg_response_time_ms: f64,
}

/// Complete per-backend report
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PerformanceReport {
    pub per_backend: BTreeMap<String, MetricsSnapshot>,
    pub totals: TotalsSnapshot,
    pub generated_at: DateTime<Utc>,
}

impl PerformanceReport {
    /// Format as human-readable string
    pub fn format(&self) -> String {
        let mut output = String::new();

        output.push_str("=== Backends ===\n");
        for (name, m) in &self.per_backend {
            output.push_str(&format!(
                "{}: {} requests, {} ok, {} failed, success={:.1}%, avg={:.2}ms, p95={:.2}ms\n",
                name,
                m.total_requests,
                m.successful_requests,
                m.failed_requests,
                m.success_rate() * 100.0,
                m.response_time.avg_ms,
                m.response_time.p95_ms,
            ));
        }
        output.push('\n');

        output.push_str("=== Totals ===\n");
        output.push_str(&format!(
            "{} backends, {} requests, success={:.1}%, avg={:.2}ms\n",
            self.totals.backends,
            self.totals.total_requests,
            self.totals.success_rate * 100.0,
            self.totals.avg_response_time_ms,
        ));

        output
    }
}

/// Metrics store keyed by backend name
///
/// Cloning shares the underlying maps.
#[derive(Clone)]
pub struct MetricsStore {
    backends: Arc<DashMap<String, Arc<BackendMetrics>>>,
    max_samples: usize,
}

impl Default for MetricsStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MetricsStore {
    /// Create a new metrics store
    pub fn new() -> Self {
        Self::with_max_samples(DEFAULT_MAX_SAMPLES)
    }

    /// Create a store retaining at most `max_samples` response times per backend
    pub fn with_max_samples(max_samples: usize) -> Self {
        Self {
            backends: Arc::new(DashMap::new()),
            max_samples: max_samples.max(1),
        }
    }

    /// Create a zeroed entry; existing entries are left untouched
    pub fn create(&self, name: &str) {
        self.backends
            .entry(name.to_string())
            .or_insert_with(|| Arc::new(BackendMetrics::new()));
    }

    /// Remove a backend's entry
    pub fn remove(&self, name: &str) -> bool {
        self.backends.remove(name).is_some()
    }

    /// Whether an entry exists
    pub fn contains(&self, name: &str) -> bool {
        self.backends.contains_key(name)
    }

    fn entry(&self, name: &str) -> Result<Arc<BackendMetrics>> {
        self.backends
            .get(name)
            .map(|r| Arc::clone(r.value()))
            .ok_or_else(|| TtsError::NotFound {
                name: name.to_string(),
            })
    }

    /// Record the start of a synthesis attempt
    pub fn record_request(&self, name: &str) -> Result<()> {
        let metrics = self.entry(name)?;
        metrics.total_requests.fetch_add(1, Ordering::AcqRel);
        if let Ok(mut last_used) = metrics.last_used.lock() {
            *last_used = Some(Utc::now());
        }
        Ok(())
    }

    /// Record a successful attempt and its latency
    pub fn record_success(&self, name: &str, elapsed: Duration) -> Result<()> {
        let metrics = self.entry(name)?;
        metrics.successful_requests.fetch_add(1, Ordering::AcqRel);
        self.push_sample(&metrics, elapsed);
        Ok(())
    }

    /// Record a failed attempt and its latency
    pub fn record_failure(&self, name: &str, elapsed: Duration) -> Result<()> {
        let metrics = self.entry(name)?;
        metrics.failed_requests.fetch_add(1, Ordering::AcqRel);
        self.push_sample(&metrics, elapsed);
        Ok(())
    }

    /// Record a health check outcome
    pub fn record_health_check(&self, name: &str, healthy: bool) -> Result<()> {
        let metrics = self.entry(name)?;
        metrics.health_checks.fetch_add(1, Ordering::Relaxed);
        if !healthy {
            metrics.failed_health_checks.fetch_add(1, Ordering::Relaxed);
        }
        Ok(())
    }

    fn push_sample(&self, metrics: &BackendMetrics, elapsed: Duration) {
        if let Ok(mut samples) = metrics.response_times_ms.lock() {
            samples.push_back(elapsed.as_secs_f64() * 1000.0);
            while samples.len() > self.max_samples {
                samples.pop_front();
            }
        }
    }

    /// Snapshot one backend
    pub fn get(&self, name: &str) -> Option<MetricsSnapshot> {
        self.backends.get(name).map(|r| r.value().snapshot())
    }

    /// Snapshot one backend, zeroed if it has no entry
    pub fn get_or_default(&self, name: &str) -> MetricsSnapshot {
        self.get(name).unwrap_or_default()
    }

    /// Zero one backend's counters without removing it
    pub fn reset(&self, name: &str) -> Result<()> {
        self.entry(name)?;
        self.backends
            .insert(name.to_string(), Arc::new(BackendMetrics::new()));
        Ok(())
    }

    /// Names with a metrics entry
    pub fn names(&self) -> Vec<String> {
        self.backends.iter().map(|r| r.key().clone()).collect()
    }

    /// Generate a report across all backends
    pub fn report(&self) -> PerformanceReport {
        let per_backend: BTreeMap<String, MetricsSnapshot> = self
            .backends
            .iter()
            .map(|r| (r.key().clone(), r.value().snapshot()))
            .collect();

        let mut totals = TotalsSnapshot {
            backends: per_backend.len(),
            ..Default::default()
        };
        let mut weighted_time = 0.0;
        let mut sample_count = 0usize;
        for m in per_backend.values() {
            totals.total_requests += m.total_requests;
            totals.successful_requests += m.successful_requests;
            totals.failed_requests += m.failed_requests;
            weighted_time += m.response_time.avg_ms * m.response_time.count as f64;
            sample_count += m.response_time.count;
        }
        if totals.total_requests > 0 {
            totals.success_rate =
                totals.successful_requests as f64 / totals.total_requests as f64;
        }
        if sample_count > 0 {
            totals.avg_response_time_ms = weighted_time / sample_count as f64;
        }

        PerformanceReport {
            per_backend,
            totals,
            generated_at: Utc::now(),
        }
    }
}

/// Calculate percentile from sorted samples
fn percentile(sorted_samples: &[f64], p: f64) -> f64 {
    if sorted_samples.is_empty() {
        return 0.0;
    }

    let index = (p * (sorted_samples.len() - 1) as f64).round() as usize;
    sorted_samples[index.min(sorted_samples.len() - 1)]
}
