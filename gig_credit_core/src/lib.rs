pub mod signals;
pub mod category;
pub mod synth;

pub mod scaler;
pub mod forest;
pub mod logistic;
pub mod ensemble;
pub mod blend;
pub mod adjust;
pub mod cfg;
pub mod error;

pub use signals::{Signal, SignalVector, SIGNAL_COUNT, STATE_FIELDS};
pub use category::{RiskCategory, CATEGORY_COUNT};
pub use synth::{label_score, synthesize, Synthesizer, TrainingExample};

pub use scaler::StandardScaler;
pub use forest::RandomForestRegressor;
pub use logistic::LogisticClassifier;
pub use ensemble::{most_likely, EnsembleModel, FitReport, FittedModel, Prediction};
pub use blend::{blend_score, compose, expected_category_score, Factors, ScoreResult};
pub use adjust::{AdjustmentTable, RestoreStats, StateKey, UpdateOutcome};
pub use cfg::{BlendCfg, EngineCfg, ForestCfg, LearningCfg, LogisticCfg, ModelCfg, SynthCfg};
pub use error::{CreditError, Result};

/// Score one signal vector against a fitted ensemble and an adjustment table.
///
/// Only the configured boost action is consulted; the table is read, never written.
pub fn score(
    model: &EnsembleModel,
    table: &AdjustmentTable,
    signals: &SignalVector,
    cfg: &BlendCfg,
) -> Result<ScoreResult> {
    let prediction = model.predict(signals)?;
    let key = StateKey::from_state(&signals.state());
    let adjustment = table.lookup(&key, &cfg.boost_action);
    Ok(compose(prediction, signals, adjustment, cfg))
}
