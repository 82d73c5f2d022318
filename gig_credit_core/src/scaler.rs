use serde::{Deserialize, Serialize};

use crate::error::{CreditError, Result};
use crate::signals::SIGNAL_COUNT;

/// Per-field standardization frozen at fit time.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct StandardScaler {
    pub mean: [f64; SIGNAL_COUNT],
    /// Population variance.
    pub var: [f64; SIGNAL_COUNT],
}

impl StandardScaler {
    pub fn fit(rows: &[[f64; SIGNAL_COUNT]]) -> Result<Self> {
        if rows.is_empty() {
            return Err(CreditError::EmptyTrainingSet);
        }
        let n = rows.len() as f64;

        let mut mean = [0.0; SIGNAL_COUNT];
        for row in rows {
            for (m, x) in mean.iter_mut().zip(row) {
                *m += x;
            }
        }
        mean.iter_mut().for_each(|m| *m /= n);

        let mut var = [0.0; SIGNAL_COUNT];
        for row in rows {
            for ((v, x), m) in var.iter_mut().zip(row).zip(&mean) {
                *v += (x - m) * (x - m);
            }
        }
        var.iter_mut().for_each(|v| *v /= n);

        Ok(Self { mean, var })
    }

    /// Standardize one row. Constant fields are only centered.
    pub fn transform(&self, row: &[f64; SIGNAL_COUNT]) -> [f64; SIGNAL_COUNT] {
        let mut out = [0.0; SIGNAL_COUNT];
        for i in 0..SIGNAL_COUNT {
            let std = self.var[i].sqrt();
            let scale = if std > f64::EPSILON { std } else { 1.0 };
            out[i] = (row[i] - self.mean[i]) / scale;
        }
        out
    }

    pub(crate) fn is_valid(&self) -> bool {
        self.mean.iter().chain(&self.var).all(|v| v.is_finite()) && self.var.iter().all(|v| *v >= 0.0)
    }
}
