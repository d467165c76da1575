//! Performance monitoring and alerting
//!
//! Compares synthesis samples against [`PerformanceThresholds`] and raises
//! at most one [`Alert`] per evaluation. Repeated alerts for the same
//! backend and metric are rate-limited by a cooldown.

use std::collections::HashMap;
use std::sync::{Mutex, PoisonError};
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use tracing::{debug, error, warn};
use uuid::Uuid;

use super::config::PerformanceThresholds;

/// Default cooldown between alerts for one backend and metric
pub const DEFAULT_ALERT_COOLDOWN: Duration = Duration::from_secs(60);

const ALERT_CHANNEL_CAPACITY: usize = 256;

/// Alert severity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AlertLevel {
    Normal,
    Warning,
    Critical,
}

/// Monitored metric
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AlertMetric {
    SynthesisRate,
    ResponseTime,
    MemoryUsage,
    ErrorRate,
}

impl AlertMetric {
    fn recommendations(&self) -> Vec<String> {
        let items: &[&str] = match self {
            AlertMetric::SynthesisRate => &[
                "Check backend resource availability",
                "Consider routing long texts to a faster backend",
            ],
            AlertMetric::ResponseTime => &[
                "Check backend load and network latency",
                "Consider lowering this backend's priority",
            ],
            AlertMetric::MemoryUsage => &[
                "Release unused models or voices",
                "Restart the backend to reclaim memory",
            ],
            AlertMetric::ErrorRate => &[
                "Inspect backend logs for recurring failures",
                "Run a health check and consider unregistering the backend",
            ],
        };
        items.iter().map(|s| s.to_string()).collect()
    }
}

impl std::fmt::Display for AlertMetric {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AlertMetric::SynthesisRate => write!(f, "synthesis_rate"),
            AlertMetric::ResponseTime => write!(f, "response_time"),
            AlertMetric::MemoryUsage => write!(f, "memory_usage"),
            AlertMetric::ErrorRate => write!(f, "error_rate"),
        }
    }
}

/// Observation of one synthesis attempt
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PerformanceSample {
    /// Characters per second, when the attempt produced output
    pub synthesis_rate: Option<f64>,
    pub response_time_ms: f64,
    pub memory_usage_mb: Option<f64>,
    pub error_rate: f64,
}

/// Threshold violation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Alert {
    pub id: String,
    pub timestamp: DateTime<Utc>,
    pub level: AlertLevel,
    pub metric: AlertMetric,
    pub value: f64,
    pub threshold: f64,
    pub backend: Option<String>,
    pub recommendations: Vec<String>,
}

/// Checks run in this order; the first violation wins
fn first_violation(
    sample: &PerformanceSample,
    thresholds: &PerformanceThresholds,
) -> Option<(AlertMetric, AlertLevel, f64, f64)> {
    if let (Some(min), Some(rate)) = (thresholds.min_synthesis_rate, sample.synthesis_rate) {
        if rate < min {
            return Some((AlertMetric::SynthesisRate, AlertLevel::Warning, rate, min));
        }
    }
    if let Some(max) = thresholds.max_response_time_ms {
        if sample.response_time_ms > max {
            return Some((AlertMetric::ResponseTime, AlertLevel::Critical, sample.response_time_ms, max));
        }
    }
    if let (Some(max), Some(memory)) = (thresholds.max_memory_mb, sample.memory_usage_mb) {
        if memory > max {
            return Some((AlertMetric::MemoryUsage, AlertLevel::Critical, memory, max));
        }
    }
    if let Some(max) = thresholds.max_error_rate {
        if sample.error_rate > max {
            return Some((AlertMetric::ErrorRate, AlertLevel::Critical, sample.error_rate, max));
        }
    }
    None
}

/// Performance monitor
pub struct PerformanceMonitor {
    cooldown: Duration,
    last_alert: Mutex<HashMap<(String, AlertMetric), Instant>>,
    sender: broadcast::Sender<Alert>,
}

impl Default for PerformanceMonitor {
    fn default() -> Self {
        Self::new(DEFAULT_ALERT_COOLDOWN)
    }
}

impl PerformanceMonitor {
    /// Create a monitor with the given cooldown
    pub fn new(cooldown: Duration) -> Self {
        let (sender, _) = broadcast::channel(ALERT_CHANNEL_CAPACITY);
        Self {
            cooldown,
            last_alert: Mutex::new(HashMap::new()),
            sender,
        }
    }

    /// Receive every emitted alert
    pub fn subscribe(&self) -> broadcast::Receiver<Alert> {
        self.sender.subscribe()
    }

    /// Evaluate a sample now
    pub fn evaluate(
        &self,
        backend: &str,
        sample: &PerformanceSample,
        thresholds: &PerformanceThresholds,
    ) -> Option<Alert> {
        self.evaluate_at(backend, sample, thresholds, Instant::now())
    }

    /// Evaluate a sample at an explicit instant
    ///
    /// Every violating check, emitted or suppressed, restarts the cooldown
    /// for its backend and metric.
    pub fn evaluate_at(
        &self,
        backend: &str,
        sample: &PerformanceSample,
        thresholds: &PerformanceThresholds,
        now: Instant,
    ) -> Option<Alert> {
        let (metric, level, value, threshold) = first_violation(sample, thresholds)?;

        let suppressed = {
            let mut last_alert = self.last_alert.lock().unwrap_or_else(PoisonError::into_inner);
            let key = (backend.to_string(), metric);
            let suppressed = last_alert
                .get(&key)
                .is_some_and(|last| now.saturating_duration_since(*last) < self.cooldown);
            last_alert.insert(key, now);
            suppressed
        };
        if suppressed {
            debug!(backend = %backend, metric = %metric, value, "Alert suppressed by cooldown");
            return None;
        }

        let alert = Alert {
            id: Uuid::new_v4().to_string(),
            timestamp: Utc::now(),
            level,
            metric,
            value,
            threshold,
            backend: Some(backend.to_string()),
            recommendations: metric.recommendations(),
        };
        match level {
            AlertLevel::Critical => {
                error!(backend = %backend, metric = %metric, value, threshold, "Performance alert")
            }
            _ => warn!(backend = %backend, metric = %metric, value, threshold, "Performance alert"),
        }
        // No subscribers is fine.
        let _ = self.sender.send(alert.clone());
        Some(alert)
    }

    /// Forget cooldown state for a backend
    pub fn forget(&self, backend: &str) {
        self.last_alert
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .retain(|(name, _), _| name != backend);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn thresholds() -> PerformanceThresholds {
        PerformanceThresholds {
            min_synthesis_rate: Some(100.0),
            max_response_time_ms: Some(1000.0),
            max_memory_mb: Some(512.0),
            max_error_rate: Some(0.1),
        }
    }

    fn healthy_sample() -> PerformanceSample {
        PerformanceSample {
            synthesis_rate: Some(400.0),
            response_time_ms: 200.0,
            memory_usage_mb: Some(128.0),
            error_rate: 0.0,
        }
    }

    #[test]
    fn test_no_violation() {
        let monitor = PerformanceMonitor::default();
        assert!(monitor.evaluate("a", &healthy_sample(), &thresholds()).is_none());
    }

    #[test]
    fn test_priority_order() {
        let monitor = PerformanceMonitor::default();
        let sample = PerformanceSample {
            synthesis_rate: Some(10.0),
            response_time_ms: 5000.0,
            memory_usage_mb: Some(4096.0),
            error_rate: 0.9,
        };
        let alert = monitor.evaluate("a", &sample, &thresholds()).unwrap();
        assert_eq!(alert.metric, AlertMetric::SynthesisRate);
        assert_eq!(alert.level, AlertLevel::Warning);

        let sample = PerformanceSample {
            synthesis_rate: None,
            ..sample
        };
        let alert = monitor.evaluate("a", &sample, &thresholds()).unwrap();
        assert_eq!(alert.metric, AlertMetric::ResponseTime);
        assert_eq!(alert.level, AlertLevel::Critical);
        assert_eq!(alert.threshold, 1000.0);
        assert!(!alert.recommendations.is_empty());
    }

    #[test]
    fn test_memory_and_error_rate() {
        let monitor = PerformanceMonitor::default();
        let sample = PerformanceSample {
            memory_usage_mb: Some(1024.0),
            ..healthy_sample()
        };
        assert_eq!(
            monitor.evaluate("a", &sample, &thresholds()).unwrap().metric,
            AlertMetric::MemoryUsage
        );

        let sample = PerformanceSample {
            error_rate: 0.5,
            ..healthy_sample()
        };
        assert_eq!(
            monitor.evaluate("a", &sample, &thresholds()).unwrap().metric,
            AlertMetric::ErrorRate
        );
    }

    #[test]
    fn test_cooldown_suppresses_repeats() {
        let monitor = PerformanceMonitor::default();
        let slow = PerformanceSample {
            response_time_ms: 3000.0,
            ..healthy_sample()
        };
        let t0 = Instant::now();

        assert!(monitor.evaluate_at("a", &slow, &thresholds(), t0).is_some());
        assert!(monitor
            .evaluate_at("a", &slow, &thresholds(), t0 + Duration::from_secs(30))
            .is_none());
        // Another backend has its own cooldown.
        assert!(monitor
            .evaluate_at("b", &slow, &thresholds(), t0 + Duration::from_secs(30))
            .is_some());
    }

    #[test]
    fn test_suppressed_check_restarts_cooldown() {
        let monitor = PerformanceMonitor::default();
        let slow = PerformanceSample {
            response_time_ms: 3000.0,
            ..healthy_sample()
        };
        let t0 = Instant::now();

        assert!(monitor.evaluate_at("a", &slow, &thresholds(), t0).is_some());
        assert!(monitor
            .evaluate_at("a", &slow, &thresholds(), t0 + Duration::from_secs(50))
            .is_none());
        assert!(monitor
            .evaluate_at("a", &slow, &thresholds(), t0 + Duration::from_secs(100))
            .is_none());
        assert!(monitor
            .evaluate_at("a", &slow, &thresholds(), t0 + Duration::from_secs(161))
            .is_some());
    }

    #[test]
    fn test_forget_clears_cooldown() {
        let monitor = PerformanceMonitor::default();
        let slow = PerformanceSample {
            response_time_ms: 3000.0,
            ..healthy_sample()
        };
        assert!(monitor.evaluate("a", &slow, &thresholds()).is_some());
        monitor.forget("a");
        assert!(monitor.evaluate("a", &slow, &thresholds()).is_some());
    }

    #[tokio::test]
    async fn test_subscribers_receive_alerts() {
        let monitor = PerformanceMonitor::default();
        let mut rx = monitor.subscribe();
        let sample = PerformanceSample {
            error_rate: 1.0,
            ..healthy_sample()
        };
        let alert = monitor.evaluate("a", &sample, &thresholds()).unwrap();
        assert_eq!(rx.recv().await.unwrap(), alert);
    }
}
