//! Fallback execution
//!
//! Runs a synthesis request down a fallback chain: one attempt per backend,
//! strictly in chain order, stopping at the first success. Metrics are
//! updated before each attempt's outcome is acted on.

use std::sync::Arc;
use std::time::{Duration, Instant};

use serde_json::Value;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::core::error::{Result, TtsError};
use crate::core::metrics::MetricsStore;
use super::config::PerformanceThresholds;
use super::monitor::{PerformanceMonitor, PerformanceSample};
use super::registry::BackendRegistry;
use super::selection::SelectionResult;
use super::traits::{SynthesisRequest, SynthesisResponse};

/// Backend that produced the response
pub const META_ADAPTER: &str = "adapter";
/// Whether a backend other than the first choice produced the response
pub const META_FALLBACK_USED: &str = "fallback_used";
/// First backend in the chain
pub const META_ORIGINAL_ADAPTER: &str = "original_adapter";
/// Backend that produced the response after a fallback
pub const META_FALLBACK_ADAPTER: &str = "fallback_adapter";
/// Request id the response belongs to
pub const META_REQUEST_ID: &str = "request_id";

/// Keys owned by the orchestrator; pass-through fields never overwrite them
pub const RESERVED_METADATA_KEYS: [&str; 5] = [
    META_ADAPTER,
    META_FALLBACK_USED,
    META_ORIGINAL_ADAPTER,
    META_FALLBACK_ADAPTER,
    META_REQUEST_ID,
];

/// Fallback executor
pub struct FallbackExecutor {
    metrics: MetricsStore,
    monitor: Arc<PerformanceMonitor>,
    thresholds: PerformanceThresholds,
}

impl FallbackExecutor {
    /// Create an executor
    pub fn new(
        metrics: MetricsStore,
        monitor: Arc<PerformanceMonitor>,
        thresholds: PerformanceThresholds,
    ) -> Self {
        Self {
            metrics,
            monitor,
            thresholds,
        }
    }

    /// Synthesize along `selection.fallback_chain`
    ///
    /// A chain name that is not registered aborts immediately with
    /// `BackendNotFound`. When every backend fails, the error wraps the
    /// failure of the last backend tried.
    pub async fn execute(
        &self,
        registry: &BackendRegistry,
        request: &SynthesisRequest,
        selection: &SelectionResult,
    ) -> Result<SynthesisResponse> {
        let chain = &selection.fallback_chain;
        let original = chain.first().ok_or(TtsError::NoBackendsAvailable)?;
        let request_id = request
            .request_id
            .clone()
            .unwrap_or_else(|| Uuid::new_v4().to_string());

        let mut last_failure: Option<(String, TtsError)> = None;
        for (attempt, name) in chain.iter().enumerate() {
            let backend = registry
                .get(name)
                .await
                .ok_or_else(|| TtsError::BackendNotFound { name: name.clone() })?;
            self.metrics
                .record_request(name)
                .map_err(|_| TtsError::BackendNotFound { name: name.clone() })?;

            debug!(backend = %name, request_id = %request_id, attempt, "Synthesis attempt");
            let start = Instant::now();
            let outcome = backend.synthesize(request).await;
            let elapsed = start.elapsed();

            match outcome {
                Ok(mut response) => {
                    let _ = self.metrics.record_success(name, elapsed);
                    self.observe(name, request, elapsed, response.memory_usage_mb, true);
                    enrich_metadata(&mut response, request, &request_id, original, name);
                    if attempt > 0 {
                        info!(
                            request_id = %request_id,
                            original = %original,
                            fallback = %name,
                            "Synthesis succeeded on fallback backend"
                        );
                    }
                    return Ok(response);
                }
                Err(e) => {
                    let _ = self.metrics.record_failure(name, elapsed);
                    self.observe(name, request, elapsed, None, false);
                    warn!(
                        backend = %name,
                        request_id = %request_id,
                        attempt,
                        retryable = e.is_retryable(),
                        error = %e,
                        "Synthesis attempt failed"
                    );
                    last_failure = Some((name.clone(), e));
                }
            }
        }

        match last_failure {
            Some((last_backend, source)) => Err(TtsError::AllBackendsFailed {
                request_id,
                last_backend,
                attempted: chain.len(),
                source: Box::new(source),
            }),
            None => Err(TtsError::NoBackendsAvailable),
        }
    }

    fn observe(
        &self,
        name: &str,
        request: &SynthesisRequest,
        elapsed: Duration,
        memory_usage_mb: Option<f64>,
        succeeded: bool,
    ) {
        let secs = elapsed.as_secs_f64();
        let synthesis_rate = (succeeded && secs > 0.0)
            .then(|| request.text.chars().count() as f64 / secs);
        let sample = PerformanceSample {
            synthesis_rate,
            response_time_ms: secs * 1000.0,
            memory_usage_mb,
            error_rate: self.metrics.get_or_default(name).error_rate(),
        };
        self.monitor.evaluate(name, &sample, &self.thresholds);
    }
}

/// Merge pass-through request fields and orchestrator fields into the
/// response metadata. Backend-provided fields are kept.
fn enrich_metadata(
    response: &mut SynthesisResponse,
    request: &SynthesisRequest,
    request_id: &str,
    original: &str,
    used: &str,
) {
    for (key, value) in &request.metadata {
        if RESERVED_METADATA_KEYS.contains(&key.as_str()) {
            continue;
        }
        response
            .metadata
            .entry(key.clone())
            .or_insert_with(|| value.clone());
    }

    let metadata = &mut response.metadata;
    metadata.insert(META_ADAPTER.to_string(), Value::from(used));
    metadata.insert(META_REQUEST_ID.to_string(), Value::from(request_id));
    let fallback_used = used != original;
    metadata.insert(META_FALLBACK_USED.to_string(), Value::Bool(fallback_used));
    if fallback_used {
        metadata.insert(META_ORIGINAL_ADAPTER.to_string(), Value::from(original));
        metadata.insert(META_FALLBACK_ADAPTER.to_string(), Value::from(used));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_enrich_primary_success() {
        let request = SynthesisRequest::new("hi", "v").with_metadata("chapter", 3);
        let mut response = SynthesisResponse::default();
        enrich_metadata(&mut response, &request, "req-1", "a", "a");

        assert_eq!(response.metadata[META_ADAPTER], "a");
        assert_eq!(response.metadata[META_FALLBACK_USED], false);
        assert_eq!(response.metadata["chapter"], 3);
        assert!(!response.metadata.contains_key(META_ORIGINAL_ADAPTER));
    }

    #[test]
    fn test_enrich_fallback_success() {
        let request = SynthesisRequest::new("hi", "v");
        let mut response = SynthesisResponse::default();
        response
            .metadata
            .insert("model".to_string(), Value::from("large"));
        enrich_metadata(&mut response, &request, "req-1", "a", "c");

        assert_eq!(response.metadata[META_FALLBACK_USED], true);
        assert_eq!(response.metadata[META_ORIGINAL_ADAPTER], "a");
        assert_eq!(response.metadata[META_FALLBACK_ADAPTER], "c");
        assert_eq!(response.metadata["model"], "large");
        assert_eq!(response.metadata[META_REQUEST_ID], "req-1");
    }

    #[test]
    fn test_pass_through_cannot_override_reserved_keys() {
        let request = SynthesisRequest::new("hi", "v")
            .with_metadata(META_ADAPTER, "spoofed")
            .with_metadata(META_FALLBACK_USED, false)
            .with_metadata(META_ORIGINAL_ADAPTER, "spoofed");
        let mut response = SynthesisResponse::default();
        enrich_metadata(&mut response, &request, "req-1", "a", "b");

        assert_eq!(response.metadata[META_ADAPTER], "b");
        assert_eq!(response.metadata[META_FALLBACK_USED], true);
        assert_eq!(response.metadata[META_ORIGINAL_ADAPTER], "a");
    }
}
