use std::path::PathBuf;

use thiserror::Error;

/// Result alias used across the scoring crates.
pub type Result<T> = std::result::Result<T, CreditError>;

/// Failures surfaced by the scoring engine.
///
/// Malformed signal input is never an error: the vectorizer coerces it to 0.
#[derive(Error, Debug)]
pub enum CreditError {
    /// `predict` was called before the ensemble was fitted.
    #[error("model has not been fitted; call fit() or activate the engine first")]
    UnfitModel,

    /// `fit` was called with zero training examples.
    #[error("cannot fit on an empty training set")]
    EmptyTrainingSet,

    /// A learning update was rejected before touching the adjustment table.
    #[error("invalid learning update: {reason}")]
    InvalidUpdate { reason: String },

    /// The blob store could not load or save a named blob.
    #[error("storage unavailable for blob '{name}': {reason}")]
    StorageUnavailable { name: String, reason: String },

    /// A stored blob exists but could not be decoded.
    #[error("blob '{name}' is corrupt: {reason}")]
    CorruptBlob { name: String, reason: String },

    /// A bootstrap sampling distribution was given invalid parameters.
    #[error("invalid sampling distribution: {reason}")]
    Sampling { reason: String },

    /// Configuration file could not be read or parsed.
    #[error("invalid configuration in {path}: {message}")]
    Config { path: PathBuf, message: String },
}

impl CreditError {
    pub fn invalid_update(reason: impl Into<String>) -> Self {
        Self::InvalidUpdate { reason: reason.into() }
    }

    pub fn sampling(reason: impl Into<String>) -> Self {
        Self::Sampling { reason: reason.into() }
    }

    pub fn storage(name: impl Into<String>, reason: impl ToString) -> Self {
        Self::StorageUnavailable {
            name: name.into(),
            reason: reason.to_string(),
        }
    }

    pub fn corrupt(name: impl Into<String>, reason: impl ToString) -> Self {
        Self::CorruptBlob {
            name: name.into(),
            reason: reason.to_string(),
        }
    }
}
