//! Regressor + classifier pair sharing one frozen scaler.

use rand::seq::SliceRandom;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::category::{RiskCategory, CATEGORY_COUNT};
use crate::cfg::ModelCfg;
use crate::error::{CreditError, Result};
use crate::forest::RandomForestRegressor;
use crate::logistic::LogisticClassifier;
use crate::scaler::StandardScaler;
use crate::signals::{SignalVector, SIGNAL_COUNT};
use crate::synth::TrainingExample;

/// Raw outputs of both models for one signal vector.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Prediction {
    pub regressor_value: f64,
    /// Ordered Poor, Fair, Good, Excellent.
    pub classifier_probs: [f64; CATEGORY_COUNT],
}

/// Everything produced by one fit. Replaced wholesale on re-training.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct FittedModel {
    pub scaler: StandardScaler,
    pub regressor: RandomForestRegressor,
    pub classifier: LogisticClassifier,
}

impl FittedModel {
    /// Structural sanity check for state restored from storage.
    pub fn is_valid(&self) -> bool {
        self.scaler.is_valid() && self.regressor.is_valid() && self.classifier.is_valid()
    }
}

/// Holdout quality of a fit.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct FitReport {
    pub train_rows: usize,
    pub holdout_rows: usize,
    /// Mean absolute error of the regressor on the holdout rows.
    pub holdout_mae: Option<f64>,
    /// Fraction of holdout rows whose most likely category matches the label.
    pub holdout_accuracy: Option<f64>,
}

#[derive(Clone, Debug, Default)]
pub struct EnsembleModel {
    fitted: Option<FittedModel>,
}

impl EnsembleModel {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_fitted(fitted: FittedModel) -> Self {
        Self {
            fitted: Some(fitted),
        }
    }

    pub fn is_fitted(&self) -> bool {
        self.fitted.is_some()
    }

    pub fn fitted(&self) -> Option<&FittedModel> {
        self.fitted.as_ref()
    }

    /// Fit scaler, regressor and classifier on all of `examples`.
    pub fn fit(&mut self, examples: &[TrainingExample], cfg: &ModelCfg) -> Result<()> {
        if examples.is_empty() {
            return Err(CreditError::EmptyTrainingSet);
        }

        let raw: Vec<[f64; SIGNAL_COUNT]> = examples.iter().map(|e| *e.signals.as_array()).collect();
        let scaler = StandardScaler::fit(&raw)?;
        let scaled: Vec<[f64; SIGNAL_COUNT]> = raw.iter().map(|r| scaler.transform(r)).collect();

        let scores: Vec<f64> = examples.iter().map(|e| e.score).collect();
        let labels: Vec<usize> = examples.iter().map(|e| e.category.index()).collect();

        let regressor = RandomForestRegressor::fit(&scaled, &scores, &cfg.forest)?;
        let classifier = LogisticClassifier::fit(&scaled, &labels, &cfg.logistic)?;

        debug!(rows = examples.len(), "ensemble fitted");
        self.fitted = Some(FittedModel {
            scaler,
            regressor,
            classifier,
        });
        Ok(())
    }

    /// Shuffle with `seed`, hold out `holdout_fraction` of the rows, fit on the rest and
    /// score the holdout.
    pub fn fit_with_holdout(
        &mut self,
        examples: &[TrainingExample],
        cfg: &ModelCfg,
        holdout_fraction: f64,
        seed: u64,
    ) -> Result<FitReport> {
        if examples.is_empty() {
            return Err(CreditError::EmptyTrainingSet);
        }

        let mut order: Vec<usize> = (0..examples.len()).collect();
        order.shuffle(&mut ChaCha8Rng::seed_from_u64(seed));

        let fraction = if holdout_fraction.is_finite() {
            holdout_fraction.clamp(0.0, 1.0)
        } else {
            0.0
        };
        // Always leave at least one row to train on.
        let n_holdout = ((examples.len() as f64 * fraction).round() as usize).min(examples.len() - 1);
        let (holdout_idx, train_idx) = order.split_at(n_holdout);

        let train: Vec<TrainingExample> = train_idx.iter().map(|&i| examples[i].clone()).collect();
        self.fit(&train, cfg)?;

        let mut report = FitReport {
            train_rows: train.len(),
            holdout_rows: holdout_idx.len(),
            ..FitReport::default()
        };

        if !holdout_idx.is_empty() {
            let mut abs_err = 0.0;
            let mut correct = 0usize;
            for &i in holdout_idx {
                let ex = &examples[i];
                let p = self.predict(&ex.signals)?;
                abs_err += (p.regressor_value - ex.score).abs();
                if most_likely(&p.classifier_probs) == ex.category {
                    correct += 1;
                }
            }
            let n = holdout_idx.len() as f64;
            report.holdout_mae = Some(abs_err / n);
            report.holdout_accuracy = Some(correct as f64 / n);
        }

        info!(
            train_rows = report.train_rows,
            holdout_rows = report.holdout_rows,
            holdout_mae = ?report.holdout_mae,
            holdout_accuracy = ?report.holdout_accuracy,
            "ensemble trained"
        );
        Ok(report)
    }

    /// Scale with the frozen fit-time statistics and run both models.
    pub fn predict(&self, signals: &SignalVector) -> Result<Prediction> {
        let fitted = self.fitted.as_ref().ok_or(CreditError::UnfitModel)?;
        let scaled = fitted.scaler.transform(signals.as_array());
        Ok(Prediction {
            regressor_value: fitted.regressor.predict(&scaled),
            classifier_probs: fitted.classifier.predict_proba(&scaled),
        })
    }
}

/// Category with the highest probability; ties go to the lower category.
pub fn most_likely(probs: &[f64; CATEGORY_COUNT]) -> RiskCategory {
    let mut best = 0;
    for k in 1..CATEGORY_COUNT {
        if probs[k] > probs[best] {
            best = k;
        }
    }
    RiskCategory::ALL[best]
}
