use serde::{Deserialize, Serialize};

/// Blending weights and score bounds.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BlendCfg {
    /// Weight on the regressor's continuous prediction.
    pub regressor_weight: f64,
    /// Weight on the classifier's expected category score.
    pub classifier_weight: f64,
    /// Representative score per category, ordered Poor, Fair, Good, Excellent.
    pub category_anchors: [f64; 4],
    pub score_floor: f64,
    pub score_ceiling: f64,
    /// The only adjustment-table action consulted while scoring.
    pub boost_action: String,
}

impl Default for BlendCfg {
    fn default() -> Self {
        Self {
            regressor_weight: 0.7,
            classifier_weight: 0.3,
            category_anchors: [400.0, 550.0, 700.0, 800.0],
            score_floor: 300.0,
            score_ceiling: 850.0,
            boost_action: "score_boost".to_string(),
        }
    }
}

/// Temporal-difference hyperparameters for the adjustment table.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LearningCfg {
    /// Learning rate.
    pub alpha: f64,
    /// Discount factor.
    pub gamma: f64,
}

impl Default for LearningCfg {
    fn default() -> Self {
        Self { alpha: 0.1, gamma: 0.9 }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ForestCfg {
    pub n_trees: usize,
    /// `None` grows each tree until its leaves are pure or too small to split.
    pub max_depth: Option<usize>,
    pub min_samples_split: usize,
    pub min_samples_leaf: usize,
    /// Seed for the per-tree bootstrap draws.
    pub seed: u64,
}

impl Default for ForestCfg {
    fn default() -> Self {
        Self {
            n_trees: 100,
            max_depth: None,
            min_samples_split: 2,
            min_samples_leaf: 1,
            seed: 42,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LogisticCfg {
    /// Inverse L2 regularization strength.
    pub c: f64,
    pub learning_rate: f64,
    pub max_iter: usize,
    /// Stop once the largest gradient component falls below this.
    pub tol: f64,
}

impl Default for LogisticCfg {
    fn default() -> Self {
        Self {
            c: 1.0,
            learning_rate: 0.5,
            max_iter: 500,
            tol: 1e-5,
        }
    }
}

/// Synthetic bootstrap dataset parameters.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SynthCfg {
    pub n_samples: usize,
    pub seed: u64,
    /// Fraction of the synthetic set held out from fitting.
    pub holdout_fraction: f64,
}

impl Default for SynthCfg {
    fn default() -> Self {
        Self {
            n_samples: 1000,
            seed: 42,
            holdout_fraction: 0.2,
        }
    }
}

/// Model-side configuration (what `fit` needs).
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelCfg {
    pub forest: ForestCfg,
    pub logistic: LogisticCfg,
}

/// Everything the engine is tuned by.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineCfg {
    pub blend: BlendCfg,
    pub learning: LearningCfg,
    pub model: ModelCfg,
    pub synth: SynthCfg,
}

impl EngineCfg {
    /// Load a (possibly partial) JSON config; omitted fields keep their defaults.
    pub fn from_json_file(path: impl AsRef<std::path::Path>) -> crate::Result<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|e| crate::CreditError::Config {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;
        serde_json::from_str(&raw).map_err(|e| crate::CreditError::Config {
            path: path.to_path_buf(),
            message: e.to_string(),
        })
    }
}
