//! Backend lifecycle management
//!
//! Runs `initialize`, `cleanup` and `health_check` against backends and
//! turns their outcomes into values the registry can store. The fan-out
//! variants run every backend concurrently and never let one backend's
//! failure abort its siblings.

use std::sync::Arc;
use std::time::Instant;

use chrono::Utc;
use futures::future::join_all;
use tracing::{debug, error, info, warn};

use crate::core::error::{LifecycleOperation, Result, TtsError};
use crate::core::metrics::MetricsStore;
use super::traits::{HealthResult, TtsBackend};

/// Shared handle to a backend
pub type BackendHandle = Arc<dyn TtsBackend>;

/// Lifecycle manager
#[derive(Clone)]
pub struct LifecycleManager {
    metrics: MetricsStore,
}

impl LifecycleManager {
    /// Create a lifecycle manager recording into `metrics`
    pub fn new(metrics: MetricsStore) -> Self {
        Self { metrics }
    }

    /// Initialize one backend and probe it once
    ///
    /// On success the returned health result decides availability. On
    /// failure the error carries the backend name and operation.
    pub async fn initialize(&self, name: &str, backend: &BackendHandle) -> Result<HealthResult> {
        let start = Instant::now();
        if let Err(e) = backend.initialize().await {
            error!(backend = %name, error = %e, "Backend initialization failed");
            return Err(TtsError::Initialization {
                backend: name.to_string(),
                operation: LifecycleOperation::Initialize,
                message: e.to_string(),
            });
        }
        debug!(
            backend = %name,
            elapsed_ms = start.elapsed().as_millis() as u64,
            "Backend initialized"
        );

        let health = self.health_check(name, backend).await;
        info!(backend = %name, status = %health.status, "Backend ready");
        Ok(health)
    }

    /// Initialize several backends concurrently
    pub async fn initialize_all(
        &self,
        backends: Vec<(String, BackendHandle)>,
    ) -> Vec<(String, Result<HealthResult>)> {
        let futures = backends.into_iter().map(|(name, backend)| async move {
            let result = self.initialize(&name, &backend).await;
            (name, result)
        });
        let results = join_all(futures).await;

        let failed = results.iter().filter(|(_, r)| r.is_err()).count();
        if failed > 0 {
            warn!(failed, total = results.len(), "Some backends failed to initialize");
        }
        results
    }

    /// Clean up one backend
    pub async fn cleanup(&self, name: &str, backend: &BackendHandle) -> Result<()> {
        backend.cleanup().await.map_err(|e| {
            warn!(backend = %name, error = %e, "Backend cleanup failed");
            TtsError::Initialization {
                backend: name.to_string(),
                operation: LifecycleOperation::Cleanup,
                message: e.to_string(),
            }
        })?;
        debug!(backend = %name, "Backend cleaned up");
        Ok(())
    }

    /// Clean up several backends concurrently; failures are only logged
    pub async fn cleanup_all(&self, backends: Vec<(String, BackendHandle)>) -> Vec<(String, Result<()>)> {
        let futures = backends.into_iter().map(|(name, backend)| async move {
            let result = self.cleanup(&name, &backend).await;
            (name, result)
        });
        join_all(futures).await
    }

    /// Probe one backend
    ///
    /// A panicking health check is converted into an `unhealthy` result.
    pub async fn health_check(&self, name: &str, backend: &BackendHandle) -> HealthResult {
        let start = Instant::now();
        let probe = Arc::clone(backend);
        let outcome = tokio::spawn(async move { probe.health_check().await }).await;
        let elapsed_ms = start.elapsed().as_millis() as u64;

        let mut result = match outcome {
            Ok(result) => result,
            Err(join_error) => {
                let message = panic_message(join_error);
                warn!(backend = %name, error = %message, "Health check aborted");
                HealthResult::unhealthy(name, message)
            }
        };
        // Cache freshness is judged from this stamp, never the backend's clock.
        result.timestamp = Utc::now();
        result.backend_name = name.to_string();
        if result.response_time_ms == 0 {
            result.response_time_ms = elapsed_ms;
        }

        // The entry may already be gone if the backend was unregistered mid-check.
        let _ = self.metrics.record_health_check(name, result.is_healthy());
        result
    }

    /// Probe several backends concurrently, one result per backend
    pub async fn health_check_all(&self, backends: Vec<(String, BackendHandle)>) -> Vec<HealthResult> {
        let futures = backends
            .iter()
            .map(|(name, backend)| self.health_check(name, backend));
        join_all(futures).await
    }
}

fn panic_message(err: tokio::task::JoinError) -> String {
    if err.is_cancelled() {
        return "health check cancelled".to_string();
    }
    match err.try_into_panic() {
        Ok(payload) => {
            if let Some(s) = payload.downcast_ref::<&str>() {
                format!("health check panicked: {}", s)
            } else if let Some(s) = payload.downcast_ref::<String>() {
                format!("health check panicked: {}", s)
            } else {
                "health check panicked".to_string()
            }
        }
        Err(err) => err.to_string(),
    }
}
