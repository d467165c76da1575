//! # SDKWork-TTS Orchestrator
//!
//! Multi-backend synthesis orchestration for text-to-speech engines.
//!
//! ## Features
//!
//! - **Backend Registry**: register interchangeable engines behind the `TtsBackend` trait
//! - **Lifecycle Management**: concurrent initialize / cleanup / health-check fan-out
//! - **Adaptive Selection**: round-robin, least-load or score-based backend choice
//! - **Automatic Failover**: one attempt per backend along a ranked fallback chain
//! - **Performance Monitoring**: per-backend metrics and rate-limited threshold alerts
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use sdkwork_tts_orchestrator::{OrchestratorBuilder, SelectionPolicy, SynthesisRequest};
//!
//! let orchestrator = OrchestratorBuilder::new()
//!     .strategy(SelectionPolicy::BestQuality)
//!     .default_backend("kokoro")
//!     .backend("kokoro", Arc::new(KokoroBackend::new()))
//!     .backend("piper", Arc::new(PiperBackend::new()))
//!     .with_logging(true)
//!     .build()
//!     .await?;
//!
//! let request = SynthesisRequest::new("Hello world", "af_heart");
//! let response = orchestrator.synthesize(&request, None).await?;
//! println!("{}", orchestrator.get_performance_report().format());
//! ```

pub mod core;
pub mod engine;

pub use crate::core::{
    error::{LifecycleOperation, Result, TtsError},
    metrics::{MetricsSnapshot, MetricsStore, PerformanceReport},
};

pub use crate::engine::{
    Alert, AlertLevel, AlertMetric, BackendCapabilities, BackendHandle, BackendRegistry,
    BackendSelector, EngineConfig, EngineConfigBuilder, FallbackExecutor, HealthResult,
    HealthStatus, LifecycleManager, Orchestrator, OrchestratorBuilder, PerformanceMonitor,
    PerformanceRequirements, PerformanceSample, PerformanceThresholds, QualityRequirements,
    Registration, RegistryStats, SelectionCriteria, SelectionPolicy, SelectionResult,
    SynthesisRequest, SynthesisResponse, TtsBackend, ValidationResult, VoiceConfig, VoiceInfo,
};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Framework name
pub const FRAMEWORK_NAME: &str = "SDKWork-TTS Orchestrator";
