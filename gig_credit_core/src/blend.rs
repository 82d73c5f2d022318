use serde::{Deserialize, Serialize};

use crate::category::{RiskCategory, CATEGORY_COUNT};
use crate::cfg::BlendCfg;
use crate::ensemble::Prediction;
use crate::signals::{Signal, SignalVector};

// ---------------------------------------------------------------------
// Explainability factors: computed from raw signals only, never from
// model output.
// ---------------------------------------------------------------------

/// Human-readable sub-scores, each a percentage in [0, 100].
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Factors {
    pub gig_consistency: f64,
    pub payment_history: f64,
    pub financial_health: f64,
}

impl Factors {
    pub fn from_signals(s: &SignalVector) -> Self {
        Self {
            gig_consistency: (s.get(Signal::CompletedGigs) * 5.0).clamp(0.0, 100.0),
            payment_history: (100.0 - s.get(Signal::PaymentDelays) * 10.0).clamp(0.0, 100.0),
            financial_health: (s.get(Signal::WalletBalance) / 500.0).clamp(0.0, 100.0),
        }
    }
}

/// Final output of one scoring request.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct ScoreResult {
    /// Always within the configured floor and ceiling (300..=850 by default).
    pub score: i32,
    pub factors: Factors,
    pub raw: Prediction,
}

impl ScoreResult {
    pub fn category(&self) -> RiskCategory {
        RiskCategory::from_score(self.score as f64)
    }
}

/// Expected score under the classifier's distribution.
pub fn expected_category_score(probs: &[f64; CATEGORY_COUNT], anchors: &[f64; CATEGORY_COUNT]) -> f64 {
    probs.iter().zip(anchors).map(|(p, a)| p * a).sum()
}

/// Merge both model outputs with an adjustment and clip into the score range.
///
/// Clipping is the last step; a non-finite blend lands on the floor.
pub fn blend_score(prediction: &Prediction, adjustment: f64, cfg: &BlendCfg) -> i32 {
    let expected = expected_category_score(&prediction.classifier_probs, &cfg.category_anchors);
    let blended = cfg.regressor_weight * prediction.regressor_value + cfg.classifier_weight * expected;
    let total = blended + adjustment;

    let clipped = if total.is_finite() {
        total.max(cfg.score_floor).min(cfg.score_ceiling)
    } else {
        cfg.score_floor
    };
    clipped.trunc() as i32
}

/// Build the full result for one request.
pub fn compose(
    prediction: Prediction,
    signals: &SignalVector,
    adjustment: f64,
    cfg: &BlendCfg,
) -> ScoreResult {
    ScoreResult {
        score: blend_score(&prediction, adjustment, cfg),
        factors: Factors::from_signals(signals),
        raw: prediction,
    }
}
