#![allow(clippy::missing_safety_doc)]

use std::ptr;
use std::sync::Arc;

use gig_credit_core::{AdjustmentTable, CreditError, EngineCfg, SignalVector, STATE_FIELDS};
use gig_credit_supervisor::{CreditEngine, DirStore};

/// FFI ABI version for gig_credit_ffi.
///
/// Bump this when any `#[repr(C)]` struct layout or exported function signature changes.
pub const GIG_CREDIT_FFI_VERSION: u32 = 2;

#[no_mangle]
pub extern "C" fn gig_credit_ffi_version() -> u32 {
    GIG_CREDIT_FFI_VERSION
}

// Return codes shared by the exported functions.
pub const GC_OK: i32 = 0;
pub const GC_ERR_NULL: i32 = -1;
pub const GC_ERR_UNFIT: i32 = -2;
pub const GC_ERR_INVALID_UPDATE: i32 = -3;
pub const GC_ERR_STORAGE: i32 = -4;
pub const GC_ERR_DECODE: i32 = -5;
pub const GC_ERR_OTHER: i32 = -9;

fn rc_for(e: &CreditError) -> i32 {
    match e {
        CreditError::UnfitModel | CreditError::EmptyTrainingSet => GC_ERR_UNFIT,
        CreditError::InvalidUpdate { .. } => GC_ERR_INVALID_UPDATE,
        CreditError::StorageUnavailable { .. } => GC_ERR_STORAGE,
        CreditError::CorruptBlob { .. } => GC_ERR_DECODE,
        CreditError::Sampling { .. } | CreditError::Config { .. } => GC_ERR_OTHER,
    }
}

/// Opaque handle exposed over FFI.
pub struct GcEngine {
    inner: CreditEngine,
}

/// FFI string view (UTF-8 bytes).
#[repr(C)]
#[derive(Clone, Copy)]
pub struct GcStr {
    pub ptr: *const u8,
    pub len: usize,
}

impl GcStr {
    fn as_str(&self) -> Option<&str> {
        if self.ptr.is_null() {
            return None;
        }
        let bytes = unsafe { std::slice::from_raw_parts(self.ptr, self.len) };
        std::str::from_utf8(bytes).ok()
    }
}

/// One named signal, e.g. `{ "completed_gigs", 20.0 }`.
#[repr(C)]
#[derive(Clone, Copy)]
pub struct GcSignalKV {
    pub key: GcStr,
    pub val: f64,
}

/// Scoring result. `rc != 0` means the other fields are zeroed.
#[repr(C)]
#[derive(Clone, Copy, Debug, Default)]
pub struct GcScore {
    pub rc: i32,
    pub score: i32,
    pub gig_consistency: f64,
    pub payment_history: f64,
    pub financial_health: f64,
    pub regressor_value: f64,
    /// Poor, Fair, Good, Excellent.
    pub classifier_probs: [f64; 4],
}

/// Owned byte buffer (adjustment table snapshot).
#[repr(C)]
pub struct GcBytes {
    pub ptr: *mut u8,
    pub len: usize,
}

/// Restore result statistics (FFI-safe).
#[repr(C)]
pub struct GcRestoreStats {
    pub applied: u32,
    pub overwritten: u32,
    pub rc: i32,
}

/// Engine cfg for FFI (keep it minimal).
#[repr(C)]
#[derive(Clone, Copy)]
pub struct GcCfg {
    pub regressor_weight: f64,
    pub classifier_weight: f64,
    pub alpha: f64,
    pub gamma: f64,
    pub n_trees: u32,
    /// 0 means unlimited.
    pub max_depth: u32,
    pub n_samples: u32,
    /// Bootstrap sampling and tree-building seed (`model.forest.seed`).
    pub forest_seed: u64,
    /// Synthetic dataset and holdout shuffle seed (`synth.seed`).
    pub synth_seed: u64,
}

#[no_mangle]
pub extern "C" fn gig_credit_cfg_default() -> GcCfg {
    let d = EngineCfg::default();
    GcCfg {
        regressor_weight: d.blend.regressor_weight,
        classifier_weight: d.blend.classifier_weight,
        alpha: d.learning.alpha,
        gamma: d.learning.gamma,
        n_trees: d.model.forest.n_trees as u32,
        max_depth: d.model.forest.max_depth.map(|v| v as u32).unwrap_or(0),
        n_samples: d.synth.n_samples as u32,
        forest_seed: d.model.forest.seed,
        synth_seed: d.synth.seed,
    }
}

fn cfg_from_ffi(c: GcCfg) -> EngineCfg {
    let mut cfg = EngineCfg::default();
    cfg.blend.regressor_weight = c.regressor_weight;
    cfg.blend.classifier_weight = c.classifier_weight;
    cfg.learning.alpha = c.alpha;
    cfg.learning.gamma = c.gamma;
    cfg.model.forest.n_trees = c.n_trees as usize;
    cfg.model.forest.max_depth = if c.max_depth == 0 { None } else { Some(c.max_depth as usize) };
    cfg.model.forest.seed = c.forest_seed;
    cfg.synth.n_samples = c.n_samples as usize;
    cfg.synth.seed = c.synth_seed;
    cfg
}

fn into_handle(engine: CreditEngine) -> *mut GcEngine {
    Box::into_raw(Box::new(GcEngine { inner: engine }))
}

/// Train a fresh engine with no backing store. Returns null on failure.
#[no_mangle]
pub extern "C" fn gig_credit_engine_new(cfg: GcCfg) -> *mut GcEngine {
    match CreditEngine::in_memory(cfg_from_ffi(cfg)) {
        Ok(engine) => into_handle(engine),
        Err(_) => ptr::null_mut(),
    }
}

/// Activate an engine backed by a directory (created if missing). Returns null on failure.
#[no_mangle]
pub unsafe extern "C" fn gig_credit_engine_open(dir: GcStr, cfg: GcCfg) -> *mut GcEngine {
    let Some(path) = dir.as_str() else {
        return ptr::null_mut();
    };
    let store = match DirStore::open(path) {
        Ok(s) => Arc::new(s),
        Err(_) => return ptr::null_mut(),
    };
    match CreditEngine::activate(cfg_from_ffi(cfg), store) {
        Ok(engine) => into_handle(engine),
        Err(_) => ptr::null_mut(),
    }
}

#[no_mangle]
pub unsafe extern "C" fn gig_credit_engine_free(h: *mut GcEngine) {
    if !h.is_null() {
        drop(Box::from_raw(h));
    }
}

/// Score a flat list of named signals. Unknown keys are ignored, missing ones are 0.
#[no_mangle]
pub unsafe extern "C" fn gig_credit_score(
    h: *const GcEngine,
    signals_ptr: *const GcSignalKV,
    signals_len: usize,
) -> GcScore {
    if h.is_null() {
        return GcScore { rc: GC_ERR_NULL, ..GcScore::default() };
    }
    let handle = &*h;

    let pairs: Vec<(&str, f64)> = if signals_ptr.is_null() || signals_len == 0 {
        Vec::new()
    } else {
        std::slice::from_raw_parts(signals_ptr, signals_len)
            .iter()
            .filter_map(|kv| kv.key.as_str().map(|k| (k, kv.val)))
            .collect()
    };
    let signals = SignalVector::from_pairs(pairs);

    match handle.inner.score(&signals) {
        Ok(r) => GcScore {
            rc: GC_OK,
            score: r.score,
            gig_consistency: r.factors.gig_consistency,
            payment_history: r.factors.payment_history,
            financial_health: r.factors.financial_health,
            regressor_value: r.raw.regressor_value,
            classifier_probs: r.raw.classifier_probs,
        },
        Err(e) => GcScore { rc: rc_for(&e), ..GcScore::default() },
    }
}

/// One learning update. `state` and `next_state` point at 4 doubles each.
/// On success writes the new value to `out_value` (if non-null).
#[no_mangle]
pub unsafe extern "C" fn gig_credit_learn(
    h: *const GcEngine,
    state: *const f64,
    action: GcStr,
    reward: f64,
    next_state: *const f64,
    out_value: *mut f64,
) -> i32 {
    if h.is_null() || state.is_null() || next_state.is_null() {
        return GC_ERR_NULL;
    }
    let Some(action) = action.as_str() else {
        return GC_ERR_INVALID_UPDATE;
    };
    let handle = &*h;

    let mut s = [0.0; STATE_FIELDS];
    s.copy_from_slice(std::slice::from_raw_parts(state, STATE_FIELDS));
    let mut next = [0.0; STATE_FIELDS];
    next.copy_from_slice(std::slice::from_raw_parts(next_state, STATE_FIELDS));

    match handle.inner.learn(&s, action, reward, &next) {
        Ok(v) => {
            if !out_value.is_null() {
                *out_value = v;
            }
            GC_OK
        }
        Err(e) => rc_for(&e),
    }
}

/// Snapshot the adjustment table as JSON bytes (free with `gig_credit_bytes_free`).
#[no_mangle]
pub unsafe extern "C" fn gig_credit_table_snapshot(h: *const GcEngine) -> GcBytes {
    if h.is_null() {
        return GcBytes { ptr: ptr::null_mut(), len: 0 };
    }
    let handle = &*h;
    let buf = match serde_json::to_vec(&handle.inner.table_snapshot()) {
        Ok(b) => b,
        Err(_) => return GcBytes { ptr: ptr::null_mut(), len: 0 },
    };

    let mut boxed = buf.into_boxed_slice();
    let ptr = boxed.as_mut_ptr();
    let len = boxed.len();
    std::mem::forget(boxed);

    GcBytes { ptr, len }
}

#[no_mangle]
pub unsafe extern "C" fn gig_credit_bytes_free(b: GcBytes) {
    if !b.ptr.is_null() {
        let slice_ptr = std::ptr::slice_from_raw_parts_mut(b.ptr, b.len);
        drop(Box::from_raw(slice_ptr));
    }
}

/// Restore the adjustment table from JSON bytes; `merge != 0` keeps existing entries.
#[no_mangle]
pub unsafe extern "C" fn gig_credit_table_restore(
    h: *const GcEngine,
    bytes: *const u8,
    len: usize,
    merge: u8,
) -> GcRestoreStats {
    if h.is_null() || bytes.is_null() {
        return GcRestoreStats { applied: 0, overwritten: 0, rc: GC_ERR_NULL };
    }
    let handle = &*h;
    let data = std::slice::from_raw_parts(bytes, len);

    let table: AdjustmentTable = match serde_json::from_slice(data) {
        Ok(t) => t,
        Err(_) => return GcRestoreStats { applied: 0, overwritten: 0, rc: GC_ERR_DECODE },
    };

    match handle.inner.restore_table(table, merge != 0) {
        Ok(stats) => GcRestoreStats {
            applied: stats.applied as u32,
            overwritten: stats.overwritten as u32,
            rc: GC_OK,
        },
        Err(e) => GcRestoreStats { applied: 0, overwritten: 0, rc: rc_for(&e) },
    }
}
