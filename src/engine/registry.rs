//! Backend registry
//!
//! Owns the set of registered backends and their registration state. Adding
//! or removing a backend takes the registry's write lock, so it never
//! interleaves with a health-check pass over the registered set.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, PoisonError, RwLock as StdRwLock};
use std::time::Duration;

use chrono::{DateTime, Utc};
use futures::future::join_all;
use serde::Serialize;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use crate::core::error::{Result, TtsError};
use crate::core::metrics::MetricsStore;
use super::lifecycle::{BackendHandle, LifecycleManager};
use super::traits::HealthResult;

/// Mutable part of a registration
#[derive(Debug, Clone, Default)]
struct RegistrationState {
    is_initialized: bool,
    is_available: bool,
    last_health_check: Option<HealthResult>,
}

struct RegistrationEntry {
    name: String,
    backend: BackendHandle,
    registered_at: DateTime<Utc>,
    seq: u64,
    state: StdRwLock<RegistrationState>,
}

impl RegistrationEntry {
    fn state(&self) -> RegistrationState {
        self.state
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn update<F: FnOnce(&mut RegistrationState)>(&self, f: F) {
        let mut state = self.state.write().unwrap_or_else(PoisonError::into_inner);
        f(&mut state);
    }

    fn apply_initialize(&self, outcome: &Result<HealthResult>) {
        self.update(|state| match outcome {
            Ok(health) => {
                state.is_initialized = true;
                state.is_available = health.is_healthy();
                state.last_health_check = Some(health.clone());
            }
            Err(_) => {
                state.is_initialized = false;
                state.is_available = false;
            }
        });
    }

    fn mark_uninitialized(&self) {
        self.update(|state| {
            state.is_initialized = false;
            state.is_available = false;
        });
    }

    fn apply_health(&self, health: &HealthResult) {
        self.update(|state| {
            state.is_available = state.is_initialized && health.is_healthy();
            state.last_health_check = Some(health.clone());
        });
    }

    fn snapshot(&self) -> Registration {
        let state = self.state();
        Registration {
            name: self.name.clone(),
            registered_at: self.registered_at,
            is_initialized: state.is_initialized,
            is_available: state.is_available,
            last_health_check: state.last_health_check,
        }
    }
}

/// Registration as seen from outside the registry
#[derive(Debug, Clone, Serialize)]
pub struct Registration {
    pub name: String,
    pub registered_at: DateTime<Utc>,
    pub is_initialized: bool,
    pub is_available: bool,
    pub last_health_check: Option<HealthResult>,
}

/// Registry statistics
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RegistryStats {
    /// Number of registered backends
    pub registered_backends: usize,
    /// Number of initialized backends
    pub initialized_backends: usize,
    /// Number of backends whose last check was healthy
    pub available_backends: usize,
    /// Default backend name
    pub default_backend: Option<String>,
}

/// Backend registry
pub struct BackendRegistry {
    entries: RwLock<HashMap<String, Arc<RegistrationEntry>>>,
    default_backend: StdRwLock<Option<String>>,
    lifecycle: LifecycleManager,
    metrics: MetricsStore,
    next_seq: AtomicU64,
    health_cache_ttl: Duration,
}

impl BackendRegistry {
    /// Create a registry sharing `metrics` with the rest of the engine
    pub fn new(metrics: MetricsStore) -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            default_backend: StdRwLock::new(None),
            lifecycle: LifecycleManager::new(metrics.clone()),
            metrics,
            next_seq: AtomicU64::new(0),
            health_cache_ttl: Duration::ZERO,
        }
    }

    /// Reuse health results younger than `ttl` in `list_available`
    pub fn with_health_cache(mut self, ttl: Duration) -> Self {
        self.health_cache_ttl = ttl;
        self
    }

    /// Register a backend and initialize it
    ///
    /// Duplicate names are rejected. A failed initialization keeps the
    /// registration, marked uninitialized.
    pub async fn register(&self, name: &str, backend: BackendHandle) -> Result<()> {
        {
            let mut entries = self.entries.write().await;
            if entries.contains_key(name) {
                return Err(TtsError::DuplicateName {
                    name: name.to_string(),
                });
            }
            entries.insert(
                name.to_string(),
                Arc::new(RegistrationEntry {
                    name: name.to_string(),
                    backend,
                    registered_at: Utc::now(),
                    seq: self.next_seq.fetch_add(1, Ordering::Relaxed),
                    state: StdRwLock::new(RegistrationState::default()),
                }),
            );
            self.metrics.create(name);
        }
        info!(backend = %name, "Backend registered");

        if let Err(e) = self.initialize(name).await {
            warn!(backend = %name, error = %e, "Registered backend without successful initialization");
        }
        Ok(())
    }

    /// Unregister a backend, cleaning it up and dropping its metrics
    pub async fn unregister(&self, name: &str) -> Result<()> {
        let entry = {
            let mut entries = self.entries.write().await;
            let entry = entries.remove(name).ok_or_else(|| TtsError::NotFound {
                name: name.to_string(),
            })?;
            self.metrics.remove(name);
            self.reassign_default(name, &entries);
            entry
        };

        // Cleanup errors are logged by the lifecycle manager and go no further.
        let _ = self.lifecycle.cleanup(name, &entry.backend).await;
        info!(backend = %name, "Backend unregistered");
        Ok(())
    }

    fn reassign_default(&self, removed: &str, remaining: &HashMap<String, Arc<RegistrationEntry>>) {
        let mut default = self
            .default_backend
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        if default.as_deref() != Some(removed) {
            return;
        }
        *default = remaining
            .values()
            .min_by_key(|e| e.seq)
            .map(|e| e.name.clone());
        match default.as_deref() {
            Some(next) => info!(removed = %removed, default = %next, "Default backend reassigned"),
            None => info!(removed = %removed, "Default backend cleared"),
        }
    }

    /// Clone one entry out of the map so the guard is released before any
    /// backend call is awaited
    async fn entry(&self, name: &str) -> Result<Arc<RegistrationEntry>> {
        self.entries
            .read()
            .await
            .get(name)
            .cloned()
            .ok_or_else(|| TtsError::NotFound {
                name: name.to_string(),
            })
    }

    /// Entries in registration order, cloned out of the map
    async fn ordered_entries(&self) -> Vec<Arc<RegistrationEntry>> {
        let entries = self.entries.read().await;
        let mut ordered: Vec<Arc<RegistrationEntry>> = entries.values().cloned().collect();
        ordered.sort_by_key(|e| e.seq);
        ordered
    }

    /// Run the lifecycle initialization for one registered backend
    ///
    /// Registry membership changes are not blocked while the backend
    /// initializes.
    pub async fn initialize(&self, name: &str) -> Result<HealthResult> {
        let entry = self.entry(name).await?;
        let outcome = self.lifecycle.initialize(name, &entry.backend).await;
        entry.apply_initialize(&outcome);
        outcome
    }

    /// Initialize every registered backend concurrently
    ///
    /// Returns the number of backends that initialized successfully.
    pub async fn initialize_all(&self) -> usize {
        let ordered = self.ordered_entries().await;
        let targets = ordered
            .iter()
            .map(|e| (e.name.clone(), Arc::clone(&e.backend)))
            .collect();
        let results = self.lifecycle.initialize_all(targets).await;

        let mut succeeded = 0;
        for (entry, (_, outcome)) in ordered.iter().zip(&results) {
            entry.apply_initialize(outcome);
            if outcome.is_ok() {
                succeeded += 1;
            }
        }
        succeeded
    }

    /// Clean up one backend, keeping its registration
    ///
    /// Only a missing name is an error; cleanup failures are logged.
    pub async fn cleanup(&self, name: &str) -> Result<()> {
        let entry = self.entry(name).await?;
        let _ = self.lifecycle.cleanup(name, &entry.backend).await;
        entry.mark_uninitialized();
        Ok(())
    }

    /// Clean up every registered backend concurrently
    ///
    /// Registrations stay in place but become ineligible for selection.
    pub async fn cleanup_all(&self) {
        let ordered = self.ordered_entries().await;
        let targets = ordered
            .iter()
            .map(|e| (e.name.clone(), Arc::clone(&e.backend)))
            .collect();
        self.lifecycle.cleanup_all(targets).await;
        for entry in &ordered {
            entry.mark_uninitialized();
        }
    }

    /// Health-check every registered backend concurrently
    pub async fn health_check_all(&self) -> Vec<HealthResult> {
        let entries = self.entries.read().await;
        let targets = Self::handles(&entries);
        let results = self.lifecycle.health_check_all(targets).await;
        for health in &results {
            if let Some(entry) = entries.get(&health.backend_name) {
                entry.apply_health(health);
            }
        }
        results
    }

    /// Names of initialized backends that currently report healthy
    ///
    /// Re-checks every initialized backend unless a health cache TTL is set
    /// and its last result is fresh enough.
    pub async fn list_available(&self) -> Vec<String> {
        let entries = self.entries.read().await;
        let mut initialized: Vec<&Arc<RegistrationEntry>> = entries
            .values()
            .filter(|e| e.state().is_initialized)
            .collect();
        initialized.sort_by_key(|e| e.seq);

        let checks = initialized.iter().map(|entry| async move {
            if let Some(cached) = self.cached_health(entry) {
                debug!(backend = %entry.name, "Using cached health result");
                return cached;
            }
            let health = self.lifecycle.health_check(&entry.name, &entry.backend).await;
            entry.apply_health(&health);
            health
        });
        let results = join_all(checks).await;

        results
            .into_iter()
            .filter(HealthResult::is_healthy)
            .map(|h| h.backend_name)
            .collect()
    }

    fn cached_health(&self, entry: &RegistrationEntry) -> Option<HealthResult> {
        if self.health_cache_ttl.is_zero() {
            return None;
        }
        let last = entry.state().last_health_check?;
        let age = Utc::now().signed_duration_since(last.timestamp).to_std().ok()?;
        (age < self.health_cache_ttl).then_some(last)
    }

    fn handles(entries: &HashMap<String, Arc<RegistrationEntry>>) -> Vec<(String, BackendHandle)> {
        let mut ordered: Vec<&Arc<RegistrationEntry>> = entries.values().collect();
        ordered.sort_by_key(|e| e.seq);
        ordered
            .into_iter()
            .map(|e| (e.name.clone(), Arc::clone(&e.backend)))
            .collect()
    }

    /// Get a backend by name
    pub async fn get(&self, name: &str) -> Option<BackendHandle> {
        self.entries
            .read()
            .await
            .get(name)
            .map(|e| Arc::clone(&e.backend))
    }

    /// Check if a backend is registered
    pub async fn contains(&self, name: &str) -> bool {
        self.entries.read().await.contains_key(name)
    }

    /// Registration snapshot for one backend
    pub async fn registration(&self, name: &str) -> Option<Registration> {
        self.entries.read().await.get(name).map(|e| e.snapshot())
    }

    /// Registration snapshots in registration order
    pub async fn registrations(&self) -> Vec<Registration> {
        let entries = self.entries.read().await;
        let mut ordered: Vec<&Arc<RegistrationEntry>> = entries.values().collect();
        ordered.sort_by_key(|e| e.seq);
        ordered.into_iter().map(|e| e.snapshot()).collect()
    }

    /// Registered names in registration order
    pub async fn list_names(&self) -> Vec<String> {
        self.registrations().await.into_iter().map(|r| r.name).collect()
    }

    /// Set the default backend
    pub async fn set_default(&self, name: &str) -> Result<()> {
        if !self.contains(name).await {
            return Err(TtsError::NotFound {
                name: name.to_string(),
            });
        }
        let mut default = self
            .default_backend
            .write()
            .map_err(|_| TtsError::lock_poisoned("BackendRegistry::set_default"))?;
        *default = Some(name.to_string());
        Ok(())
    }

    /// Get the default backend name
    pub fn default_backend(&self) -> Option<String> {
        self.default_backend
            .read()
            .map(|d| d.clone())
            .unwrap_or(None)
    }

    /// Get registry statistics
    pub async fn stats(&self) -> RegistryStats {
        let registrations = self.registrations().await;
        RegistryStats {
            registered_backends: registrations.len(),
            initialized_backends: registrations.iter().filter(|r| r.is_initialized).count(),
            available_backends: registrations.iter().filter(|r| r.is_available).count(),
            default_backend: self.default_backend(),
        }
    }

    /// Shared metrics store
    pub fn metrics(&self) -> &MetricsStore {
        &self.metrics
    }
}
