//! Orchestrator facade
//!
//! Ties the registry, selector, fallback executor and performance monitor
//! into the API exposed to callers. An `Orchestrator` is an ordinary value:
//! construct one, share it behind an `Arc`, and every method may be called
//! from concurrent tasks.

use std::borrow::Cow;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::broadcast;
use tracing::{debug, info};
use uuid::Uuid;

use crate::core::error::{Result, TtsError};
use crate::core::metrics::{MetricsStore, PerformanceReport};
use super::config::EngineConfig;
use super::fallback::FallbackExecutor;
use super::lifecycle::BackendHandle;
use super::monitor::{Alert, PerformanceMonitor};
use super::registry::{BackendRegistry, Registration, RegistryStats};
use super::selection::{BackendSelector, SelectionCriteria, SelectionResult};
use super::traits::{HealthResult, SynthesisRequest, SynthesisResponse};

/// Multi-backend synthesis orchestrator
pub struct Orchestrator {
    config: EngineConfig,
    metrics: MetricsStore,
    registry: BackendRegistry,
    selector: BackendSelector,
    executor: FallbackExecutor,
    monitor: Arc<PerformanceMonitor>,
}

impl Orchestrator {
    /// Create an orchestrator with no backends
    pub fn new(config: EngineConfig) -> Self {
        let metrics = MetricsStore::with_max_samples(config.max_response_samples);
        let monitor = Arc::new(PerformanceMonitor::new(Duration::from_secs(
            config.alert_cooldown_secs,
        )));
        let registry = BackendRegistry::new(metrics.clone())
            .with_health_cache(Duration::from_millis(config.health_cache_ttl_ms));
        let executor = FallbackExecutor::new(
            metrics.clone(),
            Arc::clone(&monitor),
            config.thresholds.clone(),
        );

        Self {
            selector: BackendSelector::new(config.strategy),
            config,
            metrics,
            registry,
            executor,
            monitor,
        }
    }

    /// Register and initialize a backend
    ///
    /// Becomes the default backend when its name matches the configured one.
    pub async fn register_backend(&self, name: &str, backend: BackendHandle) -> Result<()> {
        self.registry.register(name, backend).await?;
        if self.config.default_backend.as_deref() == Some(name) {
            self.registry.set_default(name).await?;
        }
        Ok(())
    }

    /// Unregister a backend; false when it was not registered
    pub async fn unregister_backend(&self, name: &str) -> bool {
        match self.registry.unregister(name).await {
            Ok(()) => {
                self.monitor.forget(name);
                true
            }
            Err(e) => {
                debug!(backend = %name, error = %e, "Unregister skipped");
                false
            }
        }
    }

    /// Choose a backend and fallback chain for `request`
    pub async fn select_best_backend(
        &self,
        request: &SynthesisRequest,
        criteria: Option<&SelectionCriteria>,
    ) -> Result<SelectionResult> {
        let available = self.registry.list_available().await;
        self.selector
            .select_best(&self.registry, request, &available, criteria)
            .await
    }

    /// Select a backend and synthesize with automatic fallback
    pub async fn synthesize(
        &self,
        request: &SynthesisRequest,
        criteria: Option<&SelectionCriteria>,
    ) -> Result<SynthesisResponse> {
        let request = match request.request_id {
            Some(_) => Cow::Borrowed(request),
            None => {
                let mut owned = request.clone();
                owned.request_id = Some(Uuid::new_v4().to_string());
                Cow::Owned(owned)
            }
        };

        let selection = self.select_best_backend(&request, criteria).await?;
        info!(
            request_id = request.request_id.as_deref().unwrap_or_default(),
            backend = %selection.chosen_backend,
            reason = %selection.reason,
            "Dispatching synthesis"
        );
        self.executor
            .execute(&self.registry, &request, &selection)
            .await
    }

    /// Names of initialized, healthy backends
    pub async fn get_available_backends(&self) -> Vec<String> {
        self.registry.list_available().await
    }

    /// Per-backend metrics and totals
    pub fn get_performance_report(&self) -> PerformanceReport {
        self.metrics.report()
    }

    /// Health-check every backend
    pub async fn health_check_all(&self) -> Vec<HealthResult> {
        self.registry.health_check_all().await
    }

    /// Re-initialize every backend; returns how many succeeded
    pub async fn initialize_all(&self) -> usize {
        self.registry.initialize_all().await
    }

    /// Clean up every backend
    pub async fn cleanup_all(&self) {
        self.registry.cleanup_all().await;
        info!("All backends cleaned up");
    }

    /// Set the default backend
    pub async fn set_default_backend(&self, name: &str) -> Result<()> {
        self.registry.set_default(name).await
    }

    /// Current default backend
    pub fn default_backend(&self) -> Option<String> {
        self.registry.default_backend()
    }

    /// Receive performance alerts
    pub fn subscribe_alerts(&self) -> broadcast::Receiver<Alert> {
        self.monitor.subscribe()
    }

    /// Registration snapshot for one backend
    pub async fn registration(&self, name: &str) -> Result<Registration> {
        self.registry
            .registration(name)
            .await
            .ok_or_else(|| TtsError::NotFound {
                name: name.to_string(),
            })
    }

    /// Registry statistics
    pub async fn registry_stats(&self) -> RegistryStats {
        self.registry.stats().await
    }

    /// Underlying registry
    pub fn registry(&self) -> &BackendRegistry {
        &self.registry
    }

    /// Active configuration
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }
}
