//! Orchestrator builder
//!
//! Provides a fluent API for orchestrator construction.

use std::path::Path;

use crate::core::error::Result;
use super::config::{EngineConfig, PerformanceThresholds, SelectionPolicy};
use super::lifecycle::BackendHandle;
use super::orchestrator::Orchestrator;

/// Builder for fluent orchestrator initialization
pub struct OrchestratorBuilder {
    config: EngineConfig,
    backends: Vec<(String, BackendHandle)>,
    logging: bool,
}

impl OrchestratorBuilder {
    /// Create new builder with default config
    pub fn new() -> Self {
        Self::from_config(EngineConfig::default())
    }

    /// Create builder from config
    pub fn from_config(config: EngineConfig) -> Self {
        Self {
            config,
            backends: Vec::new(),
            logging: false,
        }
    }

    /// Create builder from a YAML config file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        Ok(Self::from_config(EngineConfig::load(path)?))
    }

    /// Set default backend
    pub fn default_backend(mut self, name: impl Into<String>) -> Self {
        self.config.default_backend = Some(name.into());
        self
    }

    /// Set selection policy
    pub fn strategy(mut self, strategy: SelectionPolicy) -> Self {
        self.config.strategy = strategy;
        self
    }

    /// Set alert thresholds
    pub fn thresholds(mut self, thresholds: PerformanceThresholds) -> Self {
        self.config.thresholds = thresholds;
        self
    }

    /// Register a backend during build, in call order
    pub fn backend(mut self, name: impl Into<String>, backend: BackendHandle) -> Self {
        self.backends.push((name.into(), backend));
        self
    }

    /// Install a tracing subscriber during build
    pub fn with_logging(mut self, enable: bool) -> Self {
        self.logging = enable;
        self
    }

    /// Build the orchestrator and register the queued backends
    pub async fn build(self) -> Result<Orchestrator> {
        self.config.validate()?;
        if self.logging {
            self.init_logging();
        }

        let orchestrator = Orchestrator::new(self.config);
        for (name, backend) in self.backends {
            orchestrator.register_backend(&name, backend).await?;
        }
        Ok(orchestrator)
    }

    /// Initialize logging based on config
    fn init_logging(&self) {
        use tracing_subscriber::{fmt, EnvFilter};

        let filter = EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new(&self.config.log_level));

        // An application-installed subscriber takes precedence.
        let _ = fmt()
            .with_target(false)
            .with_thread_ids(false)
            .with_env_filter(filter)
            .try_init();
    }
}

impl Default for OrchestratorBuilder {
    fn default() -> Self {
        Self::new()
    }
}
