//! Shared test fixtures: a scriptable in-memory backend

#![allow(dead_code)]

use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;

use sdkwork_tts_orchestrator::{
    BackendCapabilities, BackendHandle, HealthResult, HealthStatus, Result, SynthesisRequest,
    SynthesisResponse, TtsBackend, TtsError, ValidationResult, VoiceConfig, VoiceInfo,
};

/// Backend whose every behaviour is set by the test
pub struct MockBackend {
    name: String,
    capabilities: BackendCapabilities,
    fail_init: bool,
    fail_cleanup: bool,
    panic_on_health: bool,
    health: Mutex<HealthStatus>,
    fail_synthesis: AtomicBool,
    fatal_synthesis: bool,
    stale_timestamps: bool,
    delay: Duration,
    init_delay: Duration,
    rejected_voices: HashSet<String>,
    pub init_calls: AtomicUsize,
    pub cleanup_calls: AtomicUsize,
    pub health_calls: AtomicUsize,
    pub synth_calls: AtomicUsize,
}

impl MockBackend {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            capabilities: BackendCapabilities {
                max_text_length: 5000,
                quality_score: 0.8,
                ..Default::default()
            },
            fail_init: false,
            fail_cleanup: false,
            panic_on_health: false,
            health: Mutex::new(HealthStatus::Healthy),
            fail_synthesis: AtomicBool::new(false),
            fatal_synthesis: false,
            stale_timestamps: false,
            delay: Duration::from_millis(1),
            init_delay: Duration::ZERO,
            rejected_voices: HashSet::new(),
            init_calls: AtomicUsize::new(0),
            cleanup_calls: AtomicUsize::new(0),
            health_calls: AtomicUsize::new(0),
            synth_calls: AtomicUsize::new(0),
        }
    }

    pub fn failing(name: &str) -> Self {
        Self::new(name).with_failing_synthesis()
    }

    pub fn with_failing_init(mut self) -> Self {
        self.fail_init = true;
        self
    }

    pub fn with_failing_cleanup(mut self) -> Self {
        self.fail_cleanup = true;
        self
    }

    pub fn with_panicking_health(mut self) -> Self {
        self.panic_on_health = true;
        self
    }

    pub fn with_health(self, status: HealthStatus) -> Self {
        self.set_health(status);
        self
    }

    pub fn with_failing_synthesis(self) -> Self {
        self.fail_synthesis.store(true, Ordering::SeqCst);
        self
    }

    /// Fail synthesis with a non-recoverable error
    pub fn with_fatal_synthesis(mut self) -> Self {
        self.fatal_synthesis = true;
        self.with_failing_synthesis()
    }

    /// Report health results stamped a day in the past
    pub fn with_stale_timestamps(mut self) -> Self {
        self.stale_timestamps = true;
        self
    }

    pub fn with_init_delay(mut self, delay: Duration) -> Self {
        self.init_delay = delay;
        self
    }

    pub fn with_quality(mut self, score: f32) -> Self {
        self.capabilities.quality_score = score;
        self
    }

    pub fn with_voice_prefixes(mut self, prefixes: &[&str]) -> Self {
        self.capabilities.voice_prefixes = prefixes.iter().map(|p| p.to_string()).collect();
        self
    }

    pub fn with_languages(mut self, languages: &[&str]) -> Self {
        self.capabilities.languages = languages.iter().map(|l| l.to_string()).collect();
        self
    }

    pub fn with_features(mut self, features: &[&str]) -> Self {
        self.capabilities.features = features.iter().map(|f| f.to_string()).collect();
        self
    }

    pub fn with_memory_mb(mut self, mb: f64) -> Self {
        self.capabilities.memory_usage_mb = Some(mb);
        self
    }

    pub fn rejecting_voice(mut self, voice: &str) -> Self {
        self.rejected_voices.insert(voice.to_string());
        self
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn set_health(&self, status: HealthStatus) {
        *self.health.lock().unwrap() = status;
    }

    pub fn set_failing(&self, failing: bool) {
        self.fail_synthesis.store(failing, Ordering::SeqCst);
    }

    pub fn synth_count(&self) -> usize {
        self.synth_calls.load(Ordering::SeqCst)
    }

    pub fn handle(self) -> (Arc<MockBackend>, BackendHandle) {
        let mock = Arc::new(self);
        let handle: BackendHandle = mock.clone();
        (mock, handle)
    }
}

#[async_trait]
impl TtsBackend for MockBackend {
    async fn initialize(&self) -> Result<()> {
        self.init_calls.fetch_add(1, Ordering::SeqCst);
        if !self.init_delay.is_zero() {
            tokio::time::sleep(self.init_delay).await;
        }
        if self.fail_init {
            return Err(TtsError::synthesis(&self.name, "model files missing"));
        }
        Ok(())
    }

    async fn cleanup(&self) -> Result<()> {
        self.cleanup_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_cleanup {
            return Err(TtsError::synthesis(&self.name, "device busy"));
        }
        Ok(())
    }

    async fn health_check(&self) -> HealthResult {
        self.health_calls.fetch_add(1, Ordering::SeqCst);
        if self.panic_on_health {
            panic!("{} health probe crashed", self.name);
        }
        let status = *self.health.lock().unwrap();
        let mut result = HealthResult::new(&self.name, status);
        if self.stale_timestamps {
            result.timestamp = chrono::Utc::now() - chrono::Duration::days(1);
        }
        result
    }

    async fn synthesize(&self, request: &SynthesisRequest) -> Result<SynthesisResponse> {
        self.synth_calls.fetch_add(1, Ordering::SeqCst);
        tokio::time::sleep(self.delay).await;
        if self.fail_synthesis.load(Ordering::SeqCst) {
            return Err(TtsError::Synthesis {
                backend: self.name.clone(),
                message: format!("{} exploded", self.name),
                recoverable: !self.fatal_synthesis,
            });
        }

        let mut response = SynthesisResponse {
            audio: request.text.as_bytes().to_vec(),
            sample_rate: 24000,
            duration_secs: request.text.len() as f32 / 15.0,
            ..Default::default()
        };
        response
            .metadata
            .insert("engine".to_string(), Value::from(self.name.clone()));
        Ok(response)
    }

    async fn supported_voices(&self) -> Result<Vec<VoiceInfo>> {
        Ok(vec![VoiceInfo {
            id: format!("{}_default", self.name),
            name: "Default".to_string(),
            language: "en".to_string(),
            gender: None,
        }])
    }

    fn capabilities(&self) -> BackendCapabilities {
        self.capabilities.clone()
    }

    async fn validate_voice(&self, voice: &VoiceConfig) -> ValidationResult {
        if self.rejected_voices.contains(&voice.id) {
            ValidationResult::invalid(format!("unknown voice '{}'", voice.id))
        } else {
            ValidationResult::ok()
        }
    }
}

/// A request for a neutral voice id every mock accepts
pub fn request(text: &str) -> SynthesisRequest {
    SynthesisRequest::new(text, "default")
}
