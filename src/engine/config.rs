//! Orchestrator configuration
//!
//! Loaded from YAML or assembled with [`EngineConfigBuilder`].

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::core::error::{Result, TtsError};
use crate::core::metrics::DEFAULT_MAX_SAMPLES;

/// Backend selection policy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SelectionPolicy {
    /// Fewest total requests first
    RoundRobin,
    /// Fewest outstanding (not yet successful) requests first
    LeastLoad,
    /// Highest score first
    #[default]
    BestQuality,
}

impl std::fmt::Display for SelectionPolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SelectionPolicy::RoundRobin => write!(f, "round-robin"),
            SelectionPolicy::LeastLoad => write!(f, "least-load"),
            SelectionPolicy::BestQuality => write!(f, "best-quality"),
        }
    }
}

/// Alert thresholds; an absent value disables that check
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PerformanceThresholds {
    /// Minimum characters synthesized per second
    #[serde(default)]
    pub min_synthesis_rate: Option<f64>,
    /// Maximum response time
    #[serde(default)]
    pub max_response_time_ms: Option<f64>,
    /// Maximum reported memory
    #[serde(default)]
    pub max_memory_mb: Option<f64>,
    /// Maximum error rate, 0.0 - 1.0
    #[serde(default)]
    pub max_error_rate: Option<f64>,
}

/// Orchestrator configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Backend preferred in scoring and tie-breaks
    #[serde(default)]
    pub default_backend: Option<String>,
    /// Selection policy
    #[serde(default)]
    pub strategy: SelectionPolicy,
    /// Performance alert thresholds
    #[serde(default)]
    pub thresholds: PerformanceThresholds,
    /// Minimum seconds between alerts for the same backend and metric
    #[serde(default = "default_cooldown_secs")]
    pub alert_cooldown_secs: u64,
    /// Reuse health results younger than this; 0 re-checks every time
    #[serde(default)]
    pub health_cache_ttl_ms: u64,
    /// Response-time samples kept per backend
    #[serde(default = "default_max_samples")]
    pub max_response_samples: usize,
    /// Log filter used when RUST_LOG is unset
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

fn default_cooldown_secs() -> u64 {
    60
}

fn default_max_samples() -> usize {
    DEFAULT_MAX_SAMPLES
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            default_backend: None,
            strategy: SelectionPolicy::default(),
            thresholds: PerformanceThresholds::default(),
            alert_cooldown_secs: default_cooldown_secs(),
            health_cache_ttl_ms: 0,
            max_response_samples: default_max_samples(),
            log_level: default_log_level(),
        }
    }
}

impl EngineConfig {
    /// Load from a YAML file
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| TtsError::Io {
            message: format!("Failed to read config file: {}", e),
            path: Some(path.to_path_buf()),
        })?;

        Self::from_yaml_str(&content).map_err(|e| match e {
            TtsError::Config { message, .. } => TtsError::Config {
                message,
                path: Some(path.to_path_buf()),
            },
            other => other,
        })
    }

    /// Parse and validate YAML
    pub fn from_yaml_str(yaml: &str) -> Result<Self> {
        let config: Self = serde_yaml::from_str(yaml)?;
        config.validate()?;
        Ok(config)
    }

    /// Save to a YAML file
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let content = serde_yaml::to_string(self)?;
        std::fs::write(path.as_ref(), content)?;
        Ok(())
    }

    /// Check value ranges
    pub fn validate(&self) -> Result<()> {
        if let Some(rate) = self.thresholds.max_error_rate {
            if !(0.0..=1.0).contains(&rate) {
                return Err(TtsError::Config {
                    message: format!("max_error_rate must be within [0, 1], got {}", rate),
                    path: None,
                });
            }
        }
        if self.alert_cooldown_secs == 0 {
            return Err(TtsError::Config {
                message: "alert_cooldown_secs must be greater than 0".to_string(),
                path: None,
            });
        }
        if self.max_response_samples == 0 {
            return Err(TtsError::Config {
                message: "max_response_samples must be greater than 0".to_string(),
                path: None,
            });
        }
        Ok(())
    }
}

/// Engine configuration builder
pub struct EngineConfigBuilder {
    config: EngineConfig,
}

impl EngineConfigBuilder {
    /// Create a builder with default values
    pub fn new() -> Self {
        Self {
            config: EngineConfig::default(),
        }
    }

    /// Set the default backend
    pub fn default_backend(mut self, name: impl Into<String>) -> Self {
        self.config.default_backend = Some(name.into());
        self
    }

    /// Set the selection policy
    pub fn strategy(mut self, strategy: SelectionPolicy) -> Self {
        self.config.strategy = strategy;
        self
    }

    /// Set all thresholds
    pub fn thresholds(mut self, thresholds: PerformanceThresholds) -> Self {
        self.config.thresholds = thresholds;
        self
    }

    /// Set the minimum synthesis rate
    pub fn min_synthesis_rate(mut self, chars_per_sec: f64) -> Self {
        self.config.thresholds.min_synthesis_rate = Some(chars_per_sec);
        self
    }

    /// Set the maximum response time
    pub fn max_response_time_ms(mut self, ms: f64) -> Self {
        self.config.thresholds.max_response_time_ms = Some(ms);
        self
    }

    /// Set the maximum memory
    pub fn max_memory_mb(mut self, mb: f64) -> Self {
        self.config.thresholds.max_memory_mb = Some(mb);
        self
    }

    /// Set the maximum error rate
    pub fn max_error_rate(mut self, rate: f64) -> Self {
        self.config.thresholds.max_error_rate = Some(rate);
        self
    }

    /// Set the alert cooldown
    pub fn alert_cooldown_secs(mut self, secs: u64) -> Self {
        self.config.alert_cooldown_secs = secs;
        self
    }

    /// Set the health cache TTL
    pub fn health_cache_ttl_ms(mut self, ms: u64) -> Self {
        self.config.health_cache_ttl_ms = ms;
        self
    }

    /// Set the response sample cap
    pub fn max_response_samples(mut self, samples: usize) -> Self {
        self.config.max_response_samples = samples;
        self
    }

    /// Set the fallback log level
    pub fn log_level(mut self, level: impl Into<String>) -> Self {
        self.config.log_level = level.into();
        self
    }

    /// Build and validate the configuration
    pub fn build(self) -> Result<EngineConfig> {
        self.config.validate()?;
        Ok(self.config)
    }
}

impl Default for EngineConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}
