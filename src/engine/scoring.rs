//! Backend scoring
//!
//! A pure, additive score of how well a backend suits a request. The same
//! inputs always give the same score.
//!
//! Known limitation: the load-balancing term is `1 - total / max(total, 1)`,
//! which is 1 for an unused backend and 0 for every backend that has served
//! at least one request. It only separates fresh backends from used ones.

use serde::Serialize;

use crate::core::metrics::MetricsSnapshot;
use super::selection::SelectionCriteria;
use super::traits::{BackendCapabilities, SynthesisRequest};

pub const BASE_SCORE: f64 = 10.0;
/// Large enough that no combination of the other terms can bridge the
/// gap between a compatible and an incompatible voice
pub const VOICE_COMPATIBLE_BONUS: f64 = 1000.0;
pub const VOICE_INCOMPATIBLE_PENALTY: f64 = -1000.0;
pub const SUCCESS_RATE_WEIGHT: f64 = 50.0;
pub const LOAD_BALANCE_WEIGHT: f64 = 10.0;
pub const DEFAULT_BACKEND_BONUS: f64 = 20.0;
pub const DEFAULT_BACKEND_QUALITY_BONUS: f64 = 40.0;
pub const RANK_STEP: f64 = 0.01;

/// Everything the score depends on
#[derive(Debug, Clone, Copy)]
pub struct ScoreInput<'a> {
    pub backend_name: &'a str,
    pub request: &'a SynthesisRequest,
    pub criteria: Option<&'a SelectionCriteria>,
    pub capabilities: &'a BackendCapabilities,
    pub metrics: &'a MetricsSnapshot,
    /// Suitable backends in candidate order
    pub suitable: &'a [String],
    pub default_backend: Option<&'a str>,
}

/// Individual score terms
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ScoreBreakdown {
    pub base: f64,
    pub voice_compatibility: f64,
    pub success_rate: f64,
    pub load_balance: f64,
    pub default_backend: f64,
    pub rank: f64,
}

impl ScoreBreakdown {
    /// Sum of all terms
    pub fn total(&self) -> f64 {
        self.base
            + self.voice_compatibility
            + self.success_rate
            + self.load_balance
            + self.default_backend
            + self.rank
    }
}

/// Compute each term of the score
pub fn score_breakdown(input: &ScoreInput<'_>) -> ScoreBreakdown {
    let voice_compatibility = if input.capabilities.accepts_voice(&input.request.voice.id) {
        VOICE_COMPATIBLE_BONUS
    } else {
        VOICE_INCOMPATIBLE_PENALTY
    };

    let total = input.metrics.total_requests;
    let load_balance = (1.0 - total as f64 / total.max(1) as f64) * LOAD_BALANCE_WEIGHT;

    let default_backend = if input.default_backend == Some(input.backend_name) {
        let under_quality_pressure = input
            .criteria
            .is_some_and(|c| c.quality_requirements.is_some());
        if under_quality_pressure {
            DEFAULT_BACKEND_QUALITY_BONUS
        } else {
            DEFAULT_BACKEND_BONUS
        }
    } else {
        0.0
    };

    let rank = input
        .suitable
        .iter()
        .position(|name| name == input.backend_name)
        .map(|idx| (input.suitable.len() - idx) as f64 * RANK_STEP)
        .unwrap_or(0.0);

    ScoreBreakdown {
        base: BASE_SCORE,
        voice_compatibility,
        success_rate: input.metrics.success_rate() * SUCCESS_RATE_WEIGHT,
        load_balance,
        default_backend,
        rank,
    }
}

/// Total score
pub fn score(input: &ScoreInput<'_>) -> f64 {
    score_breakdown(input).total()
}
