//! Engine context and model lifecycle.
//!
//! `CreditEngine` is the one object request handlers are given:
//! - owns the fitted ensemble (immutable after activation)
//! - owns the adjustment table (many readers, one writer)
//! - trains from synthetic data when nothing usable is stored
//! - persists model and table after every learning update
//!
//! Scoring takes a read lock only. Learning updates are serialized by a writer
//! mutex held across update and persist, so two updates never interleave and the
//! store never sees an older table after a newer one.

use std::sync::Arc;

use parking_lot::{Mutex, RwLock};
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::{debug, info, warn};

use gig_credit_core::{
    synthesize, AdjustmentTable, CreditError, EngineCfg, EnsembleModel, FitReport, FittedModel,
    LogisticClassifier, RandomForestRegressor, RestoreStats, Result, ScoreResult, SignalVector,
    StandardScaler, STATE_FIELDS,
};

use crate::adapter::{LearnRequest, SignalAdapter};
use crate::store::BlobStore;

pub const SCALER_BLOB: &str = "scaler.json";
pub const REGRESSOR_BLOB: &str = "regressor.json";
pub const CLASSIFIER_BLOB: &str = "classifier.json";
pub const TABLE_BLOB: &str = "adjustment_table.json";

/// Where the fitted model came from at activation.
#[derive(Clone, Debug, PartialEq)]
pub enum ModelSource {
    Loaded,
    Trained(FitReport),
}

#[derive(Clone, Debug, PartialEq)]
pub struct ActivationReport {
    pub model: ModelSource,
    /// States in the adjustment table after activation.
    pub table_states: usize,
}

pub struct CreditEngine {
    cfg: EngineCfg,
    model: EnsembleModel,
    /// Encoded once; the model never changes after activation.
    model_blobs: Vec<(&'static str, Vec<u8>)>,
    table: RwLock<AdjustmentTable>,
    writer: Mutex<()>,
    /// `None` runs in-memory only.
    store: Option<Arc<dyn BlobStore>>,
    adapter: SignalAdapter,
    activation: ActivationReport,
}

impl std::fmt::Debug for CreditEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CreditEngine")
            .field("activation", &self.activation)
            .field("table_states", &self.table.read().len())
            .field("persistent", &self.store.is_some())
            .finish()
    }
}

fn encode<T: serde::Serialize>(name: &str, value: &T) -> Result<Vec<u8>> {
    serde_json::to_vec(value).map_err(|e| CreditError::storage(name, e))
}

fn decode<T: DeserializeOwned>(name: &str, bytes: &[u8]) -> Result<T> {
    serde_json::from_slice(bytes).map_err(|e| CreditError::corrupt(name, e))
}

fn load_blob<T: DeserializeOwned>(store: &dyn BlobStore, name: &str) -> Result<Option<T>> {
    match store.load(name)? {
        Some(bytes) => decode(name, &bytes).map(Some),
        None => Ok(None),
    }
}

/// `Ok(None)` if any part is missing; `Err` if a part is unreadable or inconsistent.
fn load_model(store: &dyn BlobStore) -> Result<Option<FittedModel>> {
    let scaler: Option<StandardScaler> = load_blob(store, SCALER_BLOB)?;
    let regressor: Option<RandomForestRegressor> = load_blob(store, REGRESSOR_BLOB)?;
    let classifier: Option<LogisticClassifier> = load_blob(store, CLASSIFIER_BLOB)?;

    let (Some(scaler), Some(regressor), Some(classifier)) = (scaler, regressor, classifier) else {
        return Ok(None);
    };
    let fitted = FittedModel {
        scaler,
        regressor,
        classifier,
    };
    if !fitted.is_valid() {
        return Err(CreditError::corrupt(REGRESSOR_BLOB, "stored model failed validation"));
    }
    Ok(Some(fitted))
}

fn load_table(store: &dyn BlobStore) -> Result<Option<AdjustmentTable>> {
    let table: Option<AdjustmentTable> = load_blob(store, TABLE_BLOB)?;
    match table {
        Some(t) if !t.is_valid() => Err(CreditError::corrupt(TABLE_BLOB, "non-finite adjustment value")),
        other => Ok(other),
    }
}

fn encode_model(fitted: &FittedModel) -> Result<Vec<(&'static str, Vec<u8>)>> {
    Ok(vec![
        (SCALER_BLOB, encode(SCALER_BLOB, &fitted.scaler)?),
        (REGRESSOR_BLOB, encode(REGRESSOR_BLOB, &fitted.regressor)?),
        (CLASSIFIER_BLOB, encode(CLASSIFIER_BLOB, &fitted.classifier)?),
    ])
}

/// Synthesize the bootstrap set and fit on its training split.
pub fn train_fresh(cfg: &EngineCfg) -> Result<(EnsembleModel, FitReport)> {
    let data = synthesize(&cfg.synth)?;
    let mut model = EnsembleModel::new();
    let report = model.fit_with_holdout(&data, &cfg.model, cfg.synth.holdout_fraction, cfg.synth.seed)?;
    Ok((model, report))
}

impl CreditEngine {
    fn assemble(
        cfg: EngineCfg,
        model: EnsembleModel,
        table: AdjustmentTable,
        store: Option<Arc<dyn BlobStore>>,
        activation: ActivationReport,
    ) -> Result<Self> {
        let fitted = model.fitted().ok_or(CreditError::UnfitModel)?;
        let model_blobs = encode_model(fitted)?;
        Ok(Self {
            cfg,
            model,
            model_blobs,
            table: RwLock::new(table),
            writer: Mutex::new(()),
            store,
            adapter: SignalAdapter::default(),
            activation,
        })
    }

    /// Load model and table from `store`, training and persisting when the model is
    /// missing or unreadable.
    ///
    /// A missing or undecodable table starts empty. Fails if a blob cannot be read from
    /// the store, if training fails, or if the recovered state cannot be saved.
    pub fn activate(cfg: EngineCfg, store: Arc<dyn BlobStore>) -> Result<Self> {
        let loaded = match load_model(store.as_ref()) {
            Ok(Some(fitted)) => Some(fitted),
            Ok(None) => {
                info!("no stored model; training from synthetic data");
                None
            }
            Err(e @ CreditError::CorruptBlob { .. }) => {
                warn!(error = %e, "stored model unusable; training from synthetic data");
                None
            }
            Err(e) => return Err(e),
        };

        // A read failure must not be followed by a save of an empty table.
        let (table, table_recovered) = match load_table(store.as_ref()) {
            Ok(Some(t)) => (t, false),
            Ok(None) => (AdjustmentTable::new(), false),
            Err(e @ CreditError::CorruptBlob { .. }) => {
                warn!(error = %e, "stored adjustment table unusable; starting empty");
                (AdjustmentTable::new(), true)
            }
            Err(e) => return Err(e),
        };

        let (model, source) = match loaded {
            Some(fitted) => (EnsembleModel::from_fitted(fitted), ModelSource::Loaded),
            None => {
                let (model, report) = train_fresh(&cfg)?;
                (model, ModelSource::Trained(report))
            }
        };

        let activation = ActivationReport {
            model: source,
            table_states: table.len(),
        };
        let needs_save = table_recovered || matches!(activation.model, ModelSource::Trained(_));
        let engine = Self::assemble(cfg, model, table, Some(store), activation)?;

        if needs_save {
            engine.persist()?;
        }
        info!(
            source = ?engine.activation.model,
            table_states = engine.activation.table_states,
            "credit engine activated"
        );
        Ok(engine)
    }

    /// Train a fresh model with no backing store.
    pub fn in_memory(cfg: EngineCfg) -> Result<Self> {
        let (model, report) = train_fresh(&cfg)?;
        let activation = ActivationReport {
            model: ModelSource::Trained(report),
            table_states: 0,
        };
        Self::assemble(cfg, model, AdjustmentTable::new(), None, activation)
    }

    pub fn cfg(&self) -> &EngineCfg {
        &self.cfg
    }

    pub fn activation(&self) -> &ActivationReport {
        &self.activation
    }

    pub fn model(&self) -> &EnsembleModel {
        &self.model
    }

    pub fn is_persistent(&self) -> bool {
        self.store.is_some()
    }

    pub fn score(&self, signals: &SignalVector) -> Result<ScoreResult> {
        let table = self.table.read();
        gig_credit_core::score(&self.model, &table, signals, &self.cfg.blend)
    }

    /// Score a JSON object of named signals (snake_case or camelCase keys).
    pub fn score_json(&self, payload: &Value) -> Result<ScoreResult> {
        self.score(&self.adapter.vectorize(payload))
    }

    /// Apply one TD update and persist. Returns the new stored value.
    ///
    /// If persisting fails the update is undone and `StorageUnavailable` is returned.
    pub fn learn(
        &self,
        state: &[f64; STATE_FIELDS],
        action: &str,
        reward: f64,
        next_state: &[f64; STATE_FIELDS],
    ) -> Result<f64> {
        let _writer = self.writer.lock();

        let outcome = self
            .table
            .write()
            .update(state, action, reward, next_state, &self.cfg.learning)?;

        if let Err(e) = self.persist_locked() {
            self.table.write().revert(&outcome);
            warn!(error = %e, state = %outcome.state, action, "persist failed; learning update reverted");
            return Err(e);
        }

        debug!(state = %outcome.state, action, value = outcome.value, "learning update committed");
        Ok(outcome.value)
    }

    pub fn learn_request(&self, req: &LearnRequest) -> Result<f64> {
        self.learn(&req.state, &req.action, req.reward, &req.next_state)
    }

    pub fn learn_json(&self, payload: &Value) -> Result<f64> {
        self.learn_request(&LearnRequest::from_json(payload)?)
    }

    /// Copy of the current adjustment table.
    pub fn table_snapshot(&self) -> AdjustmentTable {
        self.table.read().clone()
    }

    /// Replace (or merge into) the adjustment table and persist.
    /// On a persist failure the previous table is put back.
    pub fn restore_table(&self, incoming: AdjustmentTable, merge: bool) -> Result<RestoreStats> {
        if !incoming.is_valid() {
            return Err(CreditError::invalid_update("restored table has non-finite values"));
        }
        let _writer = self.writer.lock();

        let previous = self.table.read().clone();
        let stats = {
            let mut table = self.table.write();
            if merge {
                table.restore_merge(incoming)
            } else {
                table.restore(incoming)
            }
        };

        if let Err(e) = self.persist_locked() {
            *self.table.write() = previous;
            warn!(error = %e, "persist failed; table restore reverted");
            return Err(e);
        }
        info!(applied = stats.applied, overwritten = stats.overwritten, merge, "adjustment table restored");
        Ok(stats)
    }

    /// Save model and table. No-op without a store.
    pub fn persist(&self) -> Result<()> {
        let _writer = self.writer.lock();
        self.persist_locked()
    }

    /// Caller holds `writer`.
    fn persist_locked(&self) -> Result<()> {
        let Some(store) = &self.store else {
            return Ok(());
        };
        let table_bytes = {
            let table = self.table.read();
            encode(TABLE_BLOB, &*table)?
        };
        for (name, bytes) in &self.model_blobs {
            store.save(name, bytes)?;
        }
        store.save(TABLE_BLOB, &table_bytes)
    }
}
