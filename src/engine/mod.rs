//! Multi-backend synthesis orchestration
//!
//! Registers interchangeable TTS backends, picks the best one per request,
//! fails over along a ranked chain and tracks backend health and
//! performance so routing adapts over time.
//!
//! # Architecture
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                    Orchestrator facade                      │
//! │     register / select / synthesize / report / health        │
//! ├─────────────────────────────────────────────────────────────┤
//! │  ┌──────────────┐  ┌──────────────┐  ┌──────────────────┐  │
//! │  │  Selection   │─▶│   Fallback   │─▶│   Performance    │  │
//! │  │  + Scoring   │  │   Executor   │  │     Monitor      │  │
//! │  └──────┬───────┘  └──────┬───────┘  └────────┬─────────┘  │
//! ├─────────┼─────────────────┼───────────────────┼────────────┤
//! │  ┌──────▼───────┐  ┌──────▼─────────────────────────────┐  │
//! │  │   Registry   │─▶│  Lifecycle Manager    Metrics Store │  │
//! │  └──────────────┘  └────────────────────────────────────┘  │
//! ├─────────────────────────────────────────────────────────────┤
//! │                 TtsBackend trait (per engine)               │
//! └─────────────────────────────────────────────────────────────┘
//! ```

pub mod builder;
pub mod config;
pub mod fallback;
pub mod lifecycle;
pub mod monitor;
pub mod orchestrator;
pub mod registry;
pub mod scoring;
pub mod selection;
pub mod traits;

pub use builder::OrchestratorBuilder;
pub use config::{EngineConfig, EngineConfigBuilder, PerformanceThresholds, SelectionPolicy};
pub use fallback::{FallbackExecutor, RESERVED_METADATA_KEYS};
pub use lifecycle::{BackendHandle, LifecycleManager};
pub use monitor::{Alert, AlertLevel, AlertMetric, PerformanceMonitor, PerformanceSample};
pub use orchestrator::Orchestrator;
pub use registry::{BackendRegistry, Registration, RegistryStats};
pub use scoring::{score, score_breakdown, ScoreBreakdown, ScoreInput};
pub use selection::{
    BackendSelector, PerformanceRequirements, QualityRequirements, SelectionCriteria,
    SelectionResult,
};
pub use traits::{
    BackendCapabilities, HealthResult, HealthStatus, SynthesisRequest, SynthesisResponse,
    TtsBackend, ValidationResult, VoiceConfig, VoiceInfo,
};
