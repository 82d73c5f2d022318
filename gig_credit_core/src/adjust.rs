//! Sparse state -> action -> value table updated by a one-step TD rule.
//!
//! Keys are never evicted; the table only grows across successful updates.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::cfg::LearningCfg;
use crate::error::{CreditError, Result};
use crate::signals::STATE_FIELDS;

/// Canonical text form of a state tuple, e.g. `"(1.0, 2.0, 3.0, 4.0)"`.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StateKey(String);

impl StateKey {
    pub fn from_state(state: &[f64; STATE_FIELDS]) -> Self {
        // `+ 0.0` folds -0.0 into 0.0 so both spell the same key.
        let parts: Vec<String> = state.iter().map(|v| format!("{:?}", v + 0.0)).collect();
        Self(format!("({})", parts.join(", ")))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for StateKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// What an update changed, enough to undo it.
#[derive(Clone, Debug, PartialEq)]
pub struct UpdateOutcome {
    pub state: StateKey,
    pub action: String,
    /// Value before the update; `None` if the entry was created by it.
    pub previous: Option<f64>,
    pub value: f64,
}

/// Counters returned by restore operations.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RestoreStats {
    /// Entries applied from the incoming table.
    pub applied: usize,
    /// Existing entries that were overwritten.
    pub overwritten: usize,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AdjustmentTable {
    entries: BTreeMap<StateKey, BTreeMap<String, f64>>,
}

fn check_state(label: &str, state: &[f64; STATE_FIELDS]) -> Result<()> {
    if state.iter().all(|v| v.is_finite()) {
        Ok(())
    } else {
        Err(CreditError::invalid_update(format!("{label} contains a non-finite value")))
    }
}

impl AdjustmentTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stored value, or 0 for an unseen state or action.
    pub fn lookup(&self, state: &StateKey, action: &str) -> f64 {
        self.entries
            .get(state)
            .and_then(|actions| actions.get(action))
            .copied()
            .unwrap_or(0.0)
    }

    /// Largest value recorded for `state`, 0 if it has none.
    pub fn max_value(&self, state: &StateKey) -> f64 {
        self.entries
            .get(state)
            .and_then(|actions| actions.values().copied().reduce(f64::max))
            .unwrap_or(0.0)
    }

    /// `Q[s][a] += alpha * (reward + gamma * max_a' Q[s'][a'] - Q[s][a])`.
    ///
    /// Inputs are validated before anything is written; a rejected update leaves the
    /// table untouched.
    pub fn update(
        &mut self,
        state: &[f64; STATE_FIELDS],
        action: &str,
        reward: f64,
        next_state: &[f64; STATE_FIELDS],
        cfg: &LearningCfg,
    ) -> Result<UpdateOutcome> {
        check_state("state", state)?;
        check_state("next_state", next_state)?;
        if !reward.is_finite() {
            return Err(CreditError::invalid_update("reward must be a finite number"));
        }
        if action.is_empty() {
            return Err(CreditError::invalid_update("action name is empty"));
        }

        let key = StateKey::from_state(state);
        let next_key = StateKey::from_state(next_state);

        let previous = self.entries.get(&key).and_then(|a| a.get(action)).copied();
        let mut next_max = self.max_value(&next_key);
        if previous.is_none() && next_key == key {
            // The unseen entry exists at 0 before the update and counts toward the max.
            next_max = next_max.max(0.0);
        }
        let old = previous.unwrap_or(0.0);
        let value = old + cfg.alpha * (reward + cfg.gamma * next_max - old);
        if !value.is_finite() {
            return Err(CreditError::invalid_update("update would overflow the stored value"));
        }

        self.entries
            .entry(key.clone())
            .or_default()
            .insert(action.to_string(), value);

        debug!(
            state = %key,
            action,
            reward,
            next_max,
            value,
            "adjustment updated"
        );

        Ok(UpdateOutcome {
            state: key,
            action: action.to_string(),
            previous,
            value,
        })
    }

    /// Undo a single update.
    pub fn revert(&mut self, outcome: &UpdateOutcome) {
        match outcome.previous {
            Some(v) => {
                if let Some(actions) = self.entries.get_mut(&outcome.state) {
                    actions.insert(outcome.action.clone(), v);
                }
            }
            None => {
                if let Some(actions) = self.entries.get_mut(&outcome.state) {
                    actions.remove(&outcome.action);
                    if actions.is_empty() {
                        self.entries.remove(&outcome.state);
                    }
                }
            }
        }
    }

    /// Number of distinct states.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Number of (state, action) entries.
    pub fn entry_count(&self) -> usize {
        self.entries.values().map(BTreeMap::len).sum()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&StateKey, &str, f64)> {
        self.entries
            .iter()
            .flat_map(|(s, actions)| actions.iter().map(move |(a, v)| (s, a.as_str(), *v)))
    }

    /// Replace the whole table.
    pub fn restore(&mut self, other: AdjustmentTable) -> RestoreStats {
        let applied = other.entry_count();
        self.entries = other.entries;
        RestoreStats {
            applied,
            overwritten: 0,
        }
    }

    /// Merge `other` in; its entries win on conflict.
    pub fn restore_merge(&mut self, other: AdjustmentTable) -> RestoreStats {
        let mut stats = RestoreStats::default();
        for (state, actions) in other.entries {
            let slot = self.entries.entry(state).or_default();
            for (action, value) in actions {
                if slot.insert(action, value).is_some() {
                    stats.overwritten += 1;
                }
                stats.applied += 1;
            }
        }
        stats
    }

    /// True when every stored value is finite.
    pub fn is_valid(&self) -> bool {
        self.entries.values().flat_map(BTreeMap::values).all(|v| v.is_finite())
    }
}
