//! Backend capability interface
//!
//! Every interchangeable TTS engine plugs into the orchestrator through the
//! [`TtsBackend`] trait. The orchestration core depends only on this trait,
//! never on concrete engine types.

use std::collections::HashSet;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::core::error::Result;

/// Core trait for all TTS backends
///
/// Methods take `&self`: a backend is shared behind an `Arc` and may serve
/// several synthesis calls at once. Any concurrency limit is the backend's
/// own business.
#[async_trait]
pub trait TtsBackend: Send + Sync {
    /// Prepare the backend (load models, open connections)
    async fn initialize(&self) -> Result<()>;

    /// Release everything acquired by `initialize`
    async fn cleanup(&self) -> Result<()>;

    /// Probe the backend. Implementations report problems through the
    /// returned status rather than panicking.
    async fn health_check(&self) -> HealthResult;

    /// Synthesize speech
    async fn synthesize(&self, request: &SynthesisRequest) -> Result<SynthesisResponse>;

    /// Voices this backend can speak with
    async fn supported_voices(&self) -> Result<Vec<VoiceInfo>>;

    /// Static capability description
    fn capabilities(&self) -> BackendCapabilities;

    /// Check whether a voice configuration is usable on this backend
    async fn validate_voice(&self, voice: &VoiceConfig) -> ValidationResult;
}

/// Health status of a backend
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    Healthy,
    Degraded,
    Unhealthy,
}

impl std::fmt::Display for HealthStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            HealthStatus::Healthy => write!(f, "healthy"),
            HealthStatus::Degraded => write!(f, "degraded"),
            HealthStatus::Unhealthy => write!(f, "unhealthy"),
        }
    }
}

/// Outcome of one health check
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HealthResult {
    /// Registered backend name
    pub backend_name: String,
    /// Reported status
    pub status: HealthStatus,
    /// When the check completed
    pub timestamp: DateTime<Utc>,
    /// Time the check took
    pub response_time_ms: u64,
    /// Optional detail
    pub message: Option<String>,
}

impl HealthResult {
    /// Create a result with the given status
    pub fn new(backend_name: impl Into<String>, status: HealthStatus) -> Self {
        Self {
            backend_name: backend_name.into(),
            status,
            timestamp: Utc::now(),
            response_time_ms: 0,
            message: None,
        }
    }

    /// Healthy result
    pub fn healthy(backend_name: impl Into<String>) -> Self {
        Self::new(backend_name, HealthStatus::Healthy)
    }

    /// Unhealthy result carrying a reason
    pub fn unhealthy(backend_name: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(backend_name, HealthStatus::Unhealthy).with_message(message)
    }

    /// Attach a message
    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }

    /// Whether the status is healthy
    pub fn is_healthy(&self) -> bool {
        self.status == HealthStatus::Healthy
    }
}

/// Voice selection passed to a backend
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct VoiceConfig {
    /// Voice identifier, in the backend's own naming scheme
    pub id: String,
    /// Language code (BCP 47 or ISO 639-1)
    #[serde(default)]
    pub language: Option<String>,
    /// Speed multiplier
    #[serde(default)]
    pub speed: Option<f32>,
}

impl VoiceConfig {
    /// Create a voice config for an identifier
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            ..Default::default()
        }
    }

    /// Set the language
    pub fn with_language(mut self, language: impl Into<String>) -> Self {
        self.language = Some(language.into());
        self
    }
}

/// Voice description
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VoiceInfo {
    /// Voice ID
    pub id: String,
    /// Display name
    pub name: String,
    /// Language code
    pub language: String,
    /// Gender
    pub gender: Option<String>,
}

/// Capability description of a backend
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BackendCapabilities {
    /// Supported language codes; empty means unrestricted
    pub languages: Vec<String>,
    /// Feature flags (e.g. "streaming", "ssml", "voice-cloning")
    pub features: HashSet<String>,
    /// Voice id prefixes this backend recognises; empty accepts any id
    pub voice_prefixes: Vec<String>,
    /// Maximum text length in characters
    pub max_text_length: usize,
    /// Expected initialization time
    pub typical_init_time_ms: Option<u64>,
    /// Expected resident memory
    pub memory_usage_mb: Option<f64>,
    /// Expected throughput in characters per second
    pub synthesis_rate: Option<f64>,
    /// Self-reported quality, 0.0 - 1.0
    pub quality_score: f32,
}

impl BackendCapabilities {
    /// Whether `voice_id` follows this backend's naming convention
    pub fn accepts_voice(&self, voice_id: &str) -> bool {
        self.voice_prefixes.is_empty()
            || self
                .voice_prefixes
                .iter()
                .any(|prefix| voice_id.starts_with(prefix.as_str()))
    }

    /// Whether the language is supported, matching on the primary subtag
    pub fn supports_language(&self, language: &str) -> bool {
        if self.languages.is_empty() {
            return true;
        }
        let primary = primary_subtag(language);
        self.languages
            .iter()
            .any(|l| l.eq_ignore_ascii_case(language) || primary_subtag(l).eq_ignore_ascii_case(primary))
    }

    /// Whether every feature in `required` is present
    pub fn has_features(&self, required: &HashSet<String>) -> bool {
        required.iter().all(|f| self.features.contains(f))
    }
}

fn primary_subtag(language: &str) -> &str {
    language.split(['-', '_']).next().unwrap_or(language)
}

/// Outcome of a voice validation
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ValidationResult {
    pub valid: bool,
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
}

impl ValidationResult {
    /// Passing result
    pub fn ok() -> Self {
        Self {
            valid: true,
            ..Default::default()
        }
    }

    /// Failing result with one error
    pub fn invalid(error: impl Into<String>) -> Self {
        Self {
            valid: false,
            errors: vec![error.into()],
            warnings: Vec::new(),
        }
    }
}

/// Synthesis request
///
/// The orchestrator reads `text`, `voice` and `request_id`; `metadata` is
/// passed through untouched into the response.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SynthesisRequest {
    /// Text to synthesize
    pub text: String,
    /// Voice selection
    pub voice: VoiceConfig,
    /// Request ID for tracking
    #[serde(default)]
    pub request_id: Option<String>,
    /// Pass-through fields copied into the response metadata
    #[serde(default)]
    pub metadata: Map<String, Value>,
}

impl SynthesisRequest {
    /// Create a request for text and a voice id
    pub fn new(text: impl Into<String>, voice_id: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            voice: VoiceConfig::new(voice_id),
            ..Default::default()
        }
    }

    /// Set the request id
    pub fn with_request_id(mut self, id: impl Into<String>) -> Self {
        self.request_id = Some(id.into());
        self
    }

    /// Set the voice language
    pub fn with_language(mut self, language: impl Into<String>) -> Self {
        self.voice.language = Some(language.into());
        self
    }

    /// Add a pass-through metadata field
    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }
}

/// Synthesis response
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SynthesisResponse {
    /// Encoded audio
    pub audio: Vec<u8>,
    /// Sample rate
    pub sample_rate: u32,
    /// Audio duration in seconds
    pub duration_secs: f32,
    /// Memory the backend used for this call, if it reports it
    pub memory_usage_mb: Option<f64>,
    /// Backend and orchestrator metadata
    pub metadata: Map<String, Value>,
}
