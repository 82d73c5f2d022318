//! Synthetic bootstrap dataset.
//!
//! Only used when no fitted model exists yet. Each signal is drawn from its own
//! distribution and labeled by a fixed weighted-sum rule, so the models have
//! something plausible to learn from until real outcomes are available.

use rand::distributions::Uniform;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use rand_distr::{Distribution, Normal, Poisson};
use serde::{Deserialize, Serialize};

use crate::category::RiskCategory;
use crate::cfg::SynthCfg;
use crate::error::{CreditError, Result};
use crate::signals::{Signal, SignalVector, SIGNAL_COUNT};

/// One labeled row of training data.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TrainingExample {
    pub signals: SignalVector,
    /// Continuous label, already clipped to [300, 850].
    pub score: f64,
    pub category: RiskCategory,
}

impl TrainingExample {
    /// Label a signal vector with the bootstrap rule.
    pub fn labeled(signals: SignalVector) -> Self {
        let score = label_score(&signals);
        Self {
            signals,
            score,
            category: RiskCategory::from_score(score),
        }
    }
}

/// Weighted-sum bootstrap label, clipped to [300, 850].
pub fn label_score(s: &SignalVector) -> f64 {
    let mut score = 300.0;
    score += (s.get(Signal::TotalEarnings) / 1000.0).min(200.0);
    score += (s.get(Signal::WalletBalance) / 500.0).min(100.0);
    score += s.get(Signal::CompletedGigs) * 5.0;
    score += s.get(Signal::AvgRating) * 30.0;
    score += s.get(Signal::DaysActive) * 0.5;
    score -= s.get(Signal::PaymentDelays) * 20.0;
    score += (s.get(Signal::SaccoContributions) / 100.0).min(50.0);
    score += s.get(Signal::LoanRepayments) * 10.0;
    score.clamp(300.0, 850.0)
}

/// Per-signal sampling distribution.
enum Column {
    Normal(Normal<f64>),
    Poisson(Poisson<f64>),
    UniformInt(Uniform<i64>),
}

impl Column {
    fn normal(mean: f64, std: f64) -> Result<Self> {
        Normal::new(mean, std)
            .map(Column::Normal)
            .map_err(|e| CreditError::sampling(format!("normal({mean}, {std}): {e}")))
    }

    fn poisson(lambda: f64) -> Result<Self> {
        Poisson::new(lambda)
            .map(Column::Poisson)
            .map_err(|e| CreditError::sampling(format!("poisson({lambda}): {e}")))
    }

    /// Uniform integer in `[low, high)`.
    fn uniform_int(low: i64, high: i64) -> Self {
        Column::UniformInt(Uniform::new(low, high))
    }

    fn for_signal(signal: Signal) -> Result<Self> {
        Ok(match signal {
            Signal::TotalEarnings => Column::normal(50_000.0, 20_000.0)?,
            Signal::WalletBalance => Column::normal(10_000.0, 5_000.0)?,
            Signal::CompletedGigs => Column::poisson(15.0)?,
            Signal::AvgRating => Column::normal(4.2, 0.8)?,
            Signal::DaysActive => Column::uniform_int(30, 365),
            Signal::PaymentDelays => Column::poisson(2.0)?,
            Signal::SaccoContributions => Column::normal(5_000.0, 2_000.0)?,
            Signal::LoanRepayments => Column::uniform_int(0, 5),
        })
    }

    fn sample<R: Rng + ?Sized>(&self, rng: &mut R) -> f64 {
        match self {
            Column::Normal(d) => d.sample(rng),
            Column::Poisson(d) => d.sample(rng),
            Column::UniformInt(d) => d.sample(rng) as f64,
        }
    }
}

/// Seeded generator for bootstrap training sets.
pub struct Synthesizer {
    rng: ChaCha8Rng,
}

impl Synthesizer {
    pub fn new(seed: u64) -> Self {
        Self {
            rng: ChaCha8Rng::seed_from_u64(seed),
        }
    }

    fn column(&mut self, signal: Signal, n: usize) -> Result<Vec<f64>> {
        let dist = Column::for_signal(signal)?;
        Ok((0..n).map(|_| dist.sample(&mut self.rng)).collect())
    }

    /// Draw `n` labeled examples. Columns are drawn one signal at a time, in vector order.
    pub fn generate(&mut self, n: usize) -> Result<Vec<TrainingExample>> {
        let columns = Signal::ALL
            .iter()
            .map(|&s| self.column(s, n))
            .collect::<Result<Vec<Vec<f64>>>>()?;

        Ok((0..n)
            .map(|row| {
                let mut values = [0.0; SIGNAL_COUNT];
                for (field, col) in values.iter_mut().zip(&columns) {
                    *field = col[row];
                }
                TrainingExample::labeled(SignalVector::new(values))
            })
            .collect())
    }
}

/// Generate the bootstrap dataset described by `cfg`.
pub fn synthesize(cfg: &SynthCfg) -> Result<Vec<TrainingExample>> {
    Synthesizer::new(cfg.seed).generate(cfg.n_samples)
}
