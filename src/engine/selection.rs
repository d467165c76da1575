//! Backend selection
//!
//! Narrows the available backends to those able to serve a request, picks
//! one according to the configured [`SelectionPolicy`], and orders the rest
//! into a fallback chain.

use std::cmp::Ordering;
use std::collections::HashSet;

use futures::future::join_all;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::core::error::{Result, TtsError};
use crate::core::metrics::MetricsSnapshot;
use super::config::SelectionPolicy;
use super::lifecycle::BackendHandle;
use super::registry::BackendRegistry;
use super::scoring::{score, ScoreInput};
use super::traits::{BackendCapabilities, SynthesisRequest};

/// Performance limits a backend must meet
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PerformanceRequirements {
    #[serde(default)]
    pub max_init_time_ms: Option<u64>,
    #[serde(default)]
    pub max_memory_usage_mb: Option<f64>,
    #[serde(default)]
    pub min_synthesis_rate: Option<f64>,
    /// Falls back to twice `max_init_time_ms` when unset
    #[serde(default)]
    pub max_response_time_ms: Option<f64>,
}

impl PerformanceRequirements {
    /// Response-time limit, explicit or derived from the init-time limit
    ///
    /// The 2x derivation is a heuristic, not a guarantee.
    pub fn effective_max_response_time_ms(&self) -> Option<f64> {
        self.max_response_time_ms
            .or_else(|| self.max_init_time_ms.map(|ms| ms as f64 * 2.0))
    }
}

/// Quality expectations
///
/// Backends whose self-reported `quality_score` is below
/// `min_overall_quality` are filtered out. The mere presence of quality
/// requirements also raises the default backend's score bonus.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct QualityRequirements {
    /// 0.0 - 1.0
    pub min_overall_quality: f32,
}

/// Optional constraints on backend choice
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SelectionCriteria {
    #[serde(default)]
    pub preferred_engine: Option<String>,
    #[serde(default)]
    pub language: Option<String>,
    #[serde(default)]
    pub required_features: HashSet<String>,
    #[serde(default)]
    pub performance_requirements: Option<PerformanceRequirements>,
    #[serde(default)]
    pub quality_requirements: Option<QualityRequirements>,
}

impl SelectionCriteria {
    /// Criteria preferring one engine
    pub fn preferring(engine: impl Into<String>) -> Self {
        Self {
            preferred_engine: Some(engine.into()),
            ..Default::default()
        }
    }

    /// Require a language
    pub fn with_language(mut self, language: impl Into<String>) -> Self {
        self.language = Some(language.into());
        self
    }

    /// Require a feature
    pub fn require_feature(mut self, feature: impl Into<String>) -> Self {
        self.required_features.insert(feature.into());
        self
    }

    /// Require a minimum self-reported quality
    pub fn with_min_quality(mut self, min_overall_quality: f32) -> Self {
        self.quality_requirements = Some(QualityRequirements { min_overall_quality });
        self
    }

    /// Reject malformed values before any backend is consulted
    pub fn validate(&self) -> Result<()> {
        if self.preferred_engine.as_deref().is_some_and(|e| e.trim().is_empty()) {
            return Err(TtsError::validation("preferred_engine", "preferred engine name is empty"));
        }
        if self.language.as_deref().is_some_and(|l| l.trim().is_empty()) {
            return Err(TtsError::validation("language", "language code is empty"));
        }
        if self.required_features.iter().any(|f| f.trim().is_empty()) {
            return Err(TtsError::validation("required_features", "feature name is empty"));
        }
        if let Some(quality) = &self.quality_requirements {
            if !(0.0..=1.0).contains(&quality.min_overall_quality) {
                return Err(TtsError::validation(
                    "quality_requirements.min_overall_quality",
                    format!("must be within [0, 1], got {}", quality.min_overall_quality),
                ));
            }
        }
        if let Some(perf) = &self.performance_requirements {
            let limits = [
                ("performance_requirements.max_memory_usage_mb", perf.max_memory_usage_mb),
                ("performance_requirements.max_response_time_ms", perf.max_response_time_ms),
            ];
            for (field, value) in limits {
                if value.is_some_and(|v| !(v > 0.0)) {
                    return Err(TtsError::validation(field, "must be a positive number"));
                }
            }
            if perf.min_synthesis_rate.is_some_and(|v| !(v >= 0.0)) {
                return Err(TtsError::validation(
                    "performance_requirements.min_synthesis_rate",
                    "must not be negative",
                ));
            }
        }
        Ok(())
    }
}

/// Outcome of a selection
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SelectionResult {
    pub chosen_backend: String,
    pub reason: String,
    pub score: f64,
    /// Chosen backend first, then the fallback order
    pub fallback_chain: Vec<String>,
}

/// A backend that passed the suitability filter
struct Candidate {
    name: String,
    capabilities: BackendCapabilities,
    metrics: MetricsSnapshot,
}

/// Backend selector
#[derive(Debug, Clone, Copy, Default)]
pub struct BackendSelector {
    policy: SelectionPolicy,
}

impl BackendSelector {
    /// Create a selector applying `policy`
    pub fn new(policy: SelectionPolicy) -> Self {
        Self { policy }
    }

    /// Configured policy
    pub fn policy(&self) -> SelectionPolicy {
        self.policy
    }

    /// Choose the best backend among `available` for `request`
    pub async fn select_best(
        &self,
        registry: &BackendRegistry,
        request: &SynthesisRequest,
        available: &[String],
        criteria: Option<&SelectionCriteria>,
    ) -> Result<SelectionResult> {
        if let Some(criteria) = criteria {
            criteria.validate()?;
        }
        if available.is_empty() {
            return Err(TtsError::NoBackendsAvailable);
        }

        let candidates = self.filter_suitable(registry, request, available, criteria).await;
        if candidates.is_empty() {
            return Err(TtsError::NoSuitableBackends {
                considered: available.len(),
            });
        }

        let default_backend = registry.default_backend();
        let suitable: Vec<String> = candidates.iter().map(|c| c.name.clone()).collect();
        let score_of = |c: &Candidate| {
            score(&ScoreInput {
                backend_name: &c.name,
                request,
                criteria,
                capabilities: &c.capabilities,
                metrics: &c.metrics,
                suitable: &suitable,
                default_backend: default_backend.as_deref(),
            })
        };

        let chosen_idx = match self.policy {
            SelectionPolicy::RoundRobin => pick_round_robin(&candidates, default_backend.as_deref()),
            SelectionPolicy::LeastLoad => pick_least_load(&candidates),
            SelectionPolicy::BestQuality => pick_best_quality(&candidates, score_of),
        };
        let chosen = &candidates[chosen_idx];

        let mut fallback_chain = Vec::with_capacity(suitable.len());
        fallback_chain.push(chosen.name.clone());
        fallback_chain.extend(suitable.iter().filter(|n| **n != chosen.name).cloned());

        let result = SelectionResult {
            chosen_backend: chosen.name.clone(),
            reason: self.reason(chosen, criteria, default_backend.as_deref(), candidates.len()),
            score: score_of(chosen),
            fallback_chain,
        };
        debug!(
            backend = %result.chosen_backend,
            score = result.score,
            chain = ?result.fallback_chain,
            "Backend selected"
        );
        Ok(result)
    }

    /// Apply the suitability filter, keeping candidate order
    async fn filter_suitable(
        &self,
        registry: &BackendRegistry,
        request: &SynthesisRequest,
        available: &[String],
        criteria: Option<&SelectionCriteria>,
    ) -> Vec<Candidate> {
        let checks = available.iter().map(|name| async move {
            let backend = registry.get(name).await?;
            let metrics = registry.metrics().get_or_default(name);
            let capabilities = backend.capabilities();
            let suitable =
                is_suitable(name, &backend, &capabilities, &metrics, request, criteria).await;
            suitable.then(|| Candidate {
                name: name.clone(),
                capabilities,
                metrics,
            })
        });
        join_all(checks).await.into_iter().flatten().collect()
    }

    fn reason(
        &self,
        chosen: &Candidate,
        criteria: Option<&SelectionCriteria>,
        default_backend: Option<&str>,
        candidate_count: usize,
    ) -> String {
        let mut parts = Vec::new();
        if criteria.and_then(|c| c.preferred_engine.as_deref()) == Some(chosen.name.as_str()) {
            parts.push("matches preferred engine".to_string());
        }
        if default_backend == Some(chosen.name.as_str()) {
            parts.push("default backend".to_string());
        }
        if chosen.metrics.total_requests > 0 {
            parts.push(format!(
                "success rate {:.1}%",
                chosen.metrics.success_rate() * 100.0
            ));
        }
        if candidate_count > 1 {
            parts.push(format!("{} policy over {} candidates", self.policy, candidate_count));
        }
        if parts.is_empty() {
            "only suitable backend".to_string()
        } else {
            parts.join(", ")
        }
    }
}

async fn is_suitable(
    name: &str,
    backend: &BackendHandle,
    capabilities: &BackendCapabilities,
    metrics: &MetricsSnapshot,
    request: &SynthesisRequest,
    criteria: Option<&SelectionCriteria>,
) -> bool {
    if let Some(preferred) = criteria.and_then(|c| c.preferred_engine.as_deref()) {
        if preferred != name {
            return false;
        }
    }

    let mut voice = request.voice.clone();
    if let Some(language) = criteria.and_then(|c| c.language.as_ref()) {
        voice.language = Some(language.clone());
    }
    if let Some(language) = voice.language.as_deref() {
        if !capabilities.supports_language(language) {
            debug!(backend = %name, language, "Rejected: language unsupported");
            return false;
        }
    }
    if !voice.id.is_empty() || voice.language.is_some() {
        let validation = backend.validate_voice(&voice).await;
        if !validation.valid {
            debug!(backend = %name, errors = ?validation.errors, "Rejected: voice validation failed");
            return false;
        }
    }

    if let Some(criteria) = criteria {
        if !capabilities.has_features(&criteria.required_features) {
            debug!(backend = %name, "Rejected: missing required features");
            return false;
        }
        if let Some(perf) = &criteria.performance_requirements {
            if !meets_performance(capabilities, metrics, perf) {
                debug!(backend = %name, "Rejected: performance requirements not met");
                return false;
            }
        }
        if let Some(quality) = &criteria.quality_requirements {
            if capabilities.quality_score < quality.min_overall_quality {
                debug!(
                    backend = %name,
                    quality = capabilities.quality_score,
                    "Rejected: below minimum quality"
                );
                return false;
            }
        }
    }
    true
}

/// Unknown capability values pass; only known violations reject
fn meets_performance(
    capabilities: &BackendCapabilities,
    metrics: &MetricsSnapshot,
    perf: &PerformanceRequirements,
) -> bool {
    if let (Some(max), Some(init)) = (perf.max_init_time_ms, capabilities.typical_init_time_ms) {
        if init > max {
            return false;
        }
    }
    if let Some(max) = perf.effective_max_response_time_ms() {
        if metrics.response_time.count > 0 && metrics.response_time.avg_ms > max {
            return false;
        }
    }
    if let (Some(max), Some(memory)) = (perf.max_memory_usage_mb, capabilities.memory_usage_mb) {
        if memory > max {
            return false;
        }
    }
    if let (Some(min), Some(rate)) = (perf.min_synthesis_rate, capabilities.synthesis_rate) {
        if rate < min {
            return false;
        }
    }
    true
}

/// Fewest total requests; ties prefer the default, then the name
fn pick_round_robin(candidates: &[Candidate], default_backend: Option<&str>) -> usize {
    let mut best = 0;
    for (idx, candidate) in candidates.iter().enumerate().skip(1) {
        let current = &candidates[best];
        let ordering = candidate
            .metrics
            .total_requests
            .cmp(&current.metrics.total_requests)
            .then_with(|| {
                let is_default = |c: &Candidate| default_backend == Some(c.name.as_str());
                is_default(current).cmp(&is_default(candidate))
            })
            .then_with(|| candidate.name.cmp(&current.name));
        if ordering == Ordering::Less {
            best = idx;
        }
    }
    best
}

/// Fewest outstanding requests; ties prefer the less used backend, then
/// candidate order
fn pick_least_load(candidates: &[Candidate]) -> usize {
    let mut best = 0;
    for (idx, candidate) in candidates.iter().enumerate().skip(1) {
        let current = &candidates[best];
        let ordering = candidate
            .metrics
            .outstanding_load()
            .cmp(&current.metrics.outstanding_load())
            .then_with(|| {
                candidate
                    .metrics
                    .total_requests
                    .cmp(&current.metrics.total_requests)
            });
        if ordering == Ordering::Less {
            best = idx;
        }
    }
    best
}

/// Highest score; the first candidate wins exact ties
fn pick_best_quality<F: Fn(&Candidate) -> f64>(candidates: &[Candidate], score_of: F) -> usize {
    let mut best = 0;
    let mut best_score = f64::NEG_INFINITY;
    for (idx, candidate) in candidates.iter().enumerate() {
        let s = score_of(candidate);
        if s > best_score {
            best = idx;
            best_score = s;
        }
    }
    best
}
