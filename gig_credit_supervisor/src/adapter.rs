//! Request adapter layer: convert loosely-typed payloads into core types.
//!
//! Kept policy-light:
//! - No IO
//! - Scoring payloads never fail; malformed values become 0
//! - Learning payloads are validated and rejected as `InvalidUpdate`

use serde_json::{Map, Value};

use gig_credit_core::{CreditError, Result, Signal, SignalVector, SIGNAL_COUNT, STATE_FIELDS};

/// Payload key used for each signal, indexed in vector order.
#[derive(Clone, Debug)]
pub struct SignalKeys {
    pub names: [&'static str; SIGNAL_COUNT],
}

impl Default for SignalKeys {
    fn default() -> Self {
        Self {
            names: Signal::ALL.map(Signal::name),
        }
    }
}

impl SignalKeys {
    /// camelCase names used by the public web API.
    pub fn camel_case() -> Self {
        Self {
            names: [
                "totalEarnings",
                "walletBalance",
                "completedGigs",
                "avgRating",
                "daysActive",
                "paymentDelays",
                "saccoContributions",
                "loanRepayments",
            ],
        }
    }
}

/// Lenient numeric read: numbers and numeric strings count, everything else is 0.
pub fn coerce_number(value: &Value) -> f64 {
    let v = match value {
        Value::Number(n) => n.as_f64().unwrap_or(0.0),
        Value::String(s) => s.trim().parse::<f64>().unwrap_or(0.0),
        _ => 0.0,
    };
    if v.is_finite() {
        v
    } else {
        0.0
    }
}

/// Maps request payloads onto signal vectors. Accepts any of its key sets.
#[derive(Clone, Debug)]
pub struct SignalAdapter {
    pub key_sets: Vec<SignalKeys>,
}

impl Default for SignalAdapter {
    fn default() -> Self {
        Self {
            key_sets: vec![SignalKeys::default(), SignalKeys::camel_case()],
        }
    }
}

impl SignalAdapter {
    pub fn new(keys: SignalKeys) -> Self {
        Self {
            key_sets: vec![keys],
        }
    }

    /// Earlier key sets win when a payload carries a signal under more than one name.
    pub fn vectorize_map(&self, payload: &Map<String, Value>) -> SignalVector {
        let mut out = SignalVector::default();
        for signal in Signal::ALL {
            let found = self
                .key_sets
                .iter()
                .find_map(|keys| payload.get(keys.names[signal.index()]));
            if let Some(v) = found {
                out.set(signal, coerce_number(v));
            }
        }
        out
    }

    /// Non-object payloads yield the all-zero vector.
    pub fn vectorize(&self, payload: &Value) -> SignalVector {
        match payload {
            Value::Object(map) => self.vectorize_map(map),
            _ => SignalVector::default(),
        }
    }
}

/// A validated learning update.
#[derive(Clone, Debug, PartialEq)]
pub struct LearnRequest {
    pub state: [f64; STATE_FIELDS],
    pub action: String,
    pub reward: f64,
    pub next_state: [f64; STATE_FIELDS],
}

fn parse_state(payload: &Map<String, Value>, keys: &[&str]) -> Result<[f64; STATE_FIELDS]> {
    let label = keys[0];
    let raw = keys
        .iter()
        .find_map(|k| payload.get(*k))
        .ok_or_else(|| CreditError::invalid_update(format!("missing '{label}'")))?;
    let items = raw
        .as_array()
        .ok_or_else(|| CreditError::invalid_update(format!("'{label}' must be an array")))?;
    if items.len() != STATE_FIELDS {
        return Err(CreditError::invalid_update(format!(
            "'{label}' must have {STATE_FIELDS} numbers, got {}",
            items.len()
        )));
    }

    let mut out = [0.0; STATE_FIELDS];
    for (slot, item) in out.iter_mut().zip(items) {
        *slot = item
            .as_f64()
            .filter(|v| v.is_finite())
            .ok_or_else(|| CreditError::invalid_update(format!("'{label}' contains a non-numeric value")))?;
    }
    Ok(out)
}

impl LearnRequest {
    /// Parse `{ "state": [..4], "action": "...", "reward": n, "nextState": [..4] }`.
    /// `next_state` is accepted as an alias for `nextState`.
    pub fn from_json(payload: &Value) -> Result<Self> {
        let map = payload
            .as_object()
            .ok_or_else(|| CreditError::invalid_update("payload must be an object"))?;

        let state = parse_state(map, &["state"])?;
        let next_state = parse_state(map, &["nextState", "next_state"])?;

        let action = map
            .get("action")
            .and_then(Value::as_str)
            .ok_or_else(|| CreditError::invalid_update("'action' must be a string"))?
            .to_string();

        let reward = map
            .get("reward")
            .and_then(Value::as_f64)
            .ok_or_else(|| CreditError::invalid_update("'reward' must be a number"))?;

        Ok(Self {
            state,
            action,
            reward,
            next_state,
        })
    }
}
