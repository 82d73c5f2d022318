//! gig_credit_supervisor
//!
//! Outside-world facing orchestration layer for `gig_credit_core`.
//!
//! Responsibilities:
//! - own the fitted ensemble and the adjustment table (`CreditEngine`)
//! - train-or-load on activation, persist after every learning update
//! - convert request payloads into signal vectors and learning requests
//!
//! Non-goals:
//! - no HTTP
//! - no async
//! - no scoring policy (lives in core)

pub mod adapter;
pub mod engine;
pub mod store;

pub use adapter::{coerce_number, LearnRequest, SignalAdapter, SignalKeys};

pub use engine::{
    train_fresh,
    ActivationReport,
    CreditEngine,
    ModelSource,
    CLASSIFIER_BLOB,
    REGRESSOR_BLOB,
    SCALER_BLOB,
    TABLE_BLOB,
};

pub use store::{BlobStore, DirStore, MemoryStore};
