use serde::{Deserialize, Serialize};

/// Number of fields in a signal vector.
pub const SIGNAL_COUNT: usize = 8;

/// Number of leading signal fields that make up an adjustment-table state.
pub const STATE_FIELDS: usize = 4;

/// One named behavioral or financial signal.
///
/// Declaration order is the vector order used at training time and at serve time.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Signal {
    TotalEarnings,
    WalletBalance,
    CompletedGigs,
    AvgRating,
    DaysActive,
    PaymentDelays,
    SaccoContributions,
    LoanRepayments,
}

impl Signal {
    pub const ALL: [Signal; SIGNAL_COUNT] = [
        Signal::TotalEarnings,
        Signal::WalletBalance,
        Signal::CompletedGigs,
        Signal::AvgRating,
        Signal::DaysActive,
        Signal::PaymentDelays,
        Signal::SaccoContributions,
        Signal::LoanRepayments,
    ];

    #[inline]
    pub fn index(self) -> usize {
        self as usize
    }

    /// Canonical snake_case name.
    pub fn name(self) -> &'static str {
        match self {
            Signal::TotalEarnings => "total_earnings",
            Signal::WalletBalance => "wallet_balance",
            Signal::CompletedGigs => "completed_gigs",
            Signal::AvgRating => "avg_rating",
            Signal::DaysActive => "days_active",
            Signal::PaymentDelays => "payment_delays",
            Signal::SaccoContributions => "sacco_contributions",
            Signal::LoanRepayments => "loan_repayments",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Signal::ALL.iter().copied().find(|s| s.name() == name)
    }
}

/// Fixed-order numeric profile of one user.
///
/// Every field is finite: anything else is stored as 0.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct SignalVector {
    values: [f64; SIGNAL_COUNT],
}

#[inline]
fn coerce(v: f64) -> f64 {
    if v.is_finite() {
        v
    } else {
        0.0
    }
}

impl SignalVector {
    pub fn new(values: [f64; SIGNAL_COUNT]) -> Self {
        Self {
            values: values.map(coerce),
        }
    }

    /// Build from `(name, value)` pairs. Unknown names are ignored, missing ones stay 0,
    /// and a repeated name keeps its last value.
    pub fn from_pairs<I, K>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, f64)>,
        K: AsRef<str>,
    {
        let mut out = Self::default();
        for (name, value) in pairs {
            if let Some(sig) = Signal::from_name(name.as_ref()) {
                out.set(sig, value);
            }
        }
        out
    }

    #[inline]
    pub fn get(&self, signal: Signal) -> f64 {
        self.values[signal.index()]
    }

    #[inline]
    pub fn set(&mut self, signal: Signal, value: f64) {
        self.values[signal.index()] = coerce(value);
    }

    pub fn with(mut self, signal: Signal, value: f64) -> Self {
        self.set(signal, value);
        self
    }

    #[inline]
    pub fn as_array(&self) -> &[f64; SIGNAL_COUNT] {
        &self.values
    }

    /// Leading fields used as the adjustment-table state.
    pub fn state(&self) -> [f64; STATE_FIELDS] {
        [self.values[0], self.values[1], self.values[2], self.values[3]]
    }
}

impl From<[f64; SIGNAL_COUNT]> for SignalVector {
    fn from(values: [f64; SIGNAL_COUNT]) -> Self {
        Self::new(values)
    }
}
