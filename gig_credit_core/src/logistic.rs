use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::category::CATEGORY_COUNT;
use crate::cfg::LogisticCfg;
use crate::error::{CreditError, Result};
use crate::signals::SIGNAL_COUNT;

type Row = [f64; SIGNAL_COUNT];

/// Multinomial (softmax) logistic regression with an L2 penalty on the weights.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct LogisticClassifier {
    pub weights: [[f64; SIGNAL_COUNT]; CATEGORY_COUNT],
    pub bias: [f64; CATEGORY_COUNT],
}

/// Scaled features are saturated here before the dot product so logits stay finite.
const FEATURE_LIMIT: f64 = 1e6;

/// Always returns a distribution. NaN logits get no mass; if the largest logit is
/// infinite the mass is split evenly across the largest ones.
fn softmax(logits: [f64; CATEGORY_COUNT]) -> [f64; CATEGORY_COUNT] {
    let max = logits
        .iter()
        .copied()
        .filter(|z| !z.is_nan())
        .fold(f64::NEG_INFINITY, f64::max);

    if !max.is_finite() {
        let top = logits.map(|z| if z == max { 1.0 } else { 0.0 });
        let count: f64 = top.iter().sum();
        if count == 0.0 {
            return [1.0 / CATEGORY_COUNT as f64; CATEGORY_COUNT];
        }
        return top.map(|t| t / count);
    }

    let exp = logits.map(|z| if z.is_nan() { 0.0 } else { (z - max).exp() });
    let sum: f64 = exp.iter().sum();
    exp.map(|e| e / sum)
}

impl LogisticClassifier {
    fn zeros() -> Self {
        Self {
            weights: [[0.0; SIGNAL_COUNT]; CATEGORY_COUNT],
            bias: [0.0; CATEGORY_COUNT],
        }
    }

    fn logits(&self, row: &Row) -> [f64; CATEGORY_COUNT] {
        let mut z = self.bias;
        for (zk, wk) in z.iter_mut().zip(&self.weights) {
            *zk += wk
                .iter()
                .zip(row)
                .map(|(w, x)| w * x.clamp(-FEATURE_LIMIT, FEATURE_LIMIT))
                .sum::<f64>();
        }
        z
    }

    /// Full-batch gradient descent on mean cross-entropy plus `|W|^2 / (2 C n)`.
    ///
    /// `labels` are category indices in `0..CATEGORY_COUNT`.
    pub fn fit(x: &[Row], labels: &[usize], cfg: &LogisticCfg) -> Result<Self> {
        if x.is_empty() || x.len() != labels.len() {
            return Err(CreditError::EmptyTrainingSet);
        }
        let n = x.len() as f64;
        let l2 = if cfg.c > 0.0 { 1.0 / (cfg.c * n) } else { 0.0 };
        let mut model = Self::zeros();

        let mut iterations = 0;
        for _ in 0..cfg.max_iter {
            iterations += 1;
            let mut grad_w = [[0.0; SIGNAL_COUNT]; CATEGORY_COUNT];
            let mut grad_b = [0.0; CATEGORY_COUNT];

            for (row, &label) in x.iter().zip(labels) {
                let p = softmax(model.logits(row));
                for k in 0..CATEGORY_COUNT {
                    let err = p[k] - if k == label { 1.0 } else { 0.0 };
                    grad_b[k] += err;
                    for (g, xi) in grad_w[k].iter_mut().zip(row) {
                        *g += err * xi;
                    }
                }
            }

            let mut max_grad = 0.0_f64;
            for k in 0..CATEGORY_COUNT {
                grad_b[k] /= n;
                max_grad = max_grad.max(grad_b[k].abs());
                model.bias[k] -= cfg.learning_rate * grad_b[k];
                for j in 0..SIGNAL_COUNT {
                    let g = grad_w[k][j] / n + l2 * model.weights[k][j];
                    max_grad = max_grad.max(g.abs());
                    model.weights[k][j] -= cfg.learning_rate * g;
                }
            }

            if max_grad < cfg.tol {
                break;
            }
        }

        debug!(rows = x.len(), iterations, "logistic classifier fitted");
        Ok(model)
    }

    /// Class probabilities ordered Poor, Fair, Good, Excellent.
    pub fn predict_proba(&self, row: &Row) -> [f64; CATEGORY_COUNT] {
        softmax(self.logits(row))
    }

    pub(crate) fn is_valid(&self) -> bool {
        self.weights.iter().flatten().chain(&self.bias).all(|v| v.is_finite())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn softmax_is_a_distribution() {
        let p = softmax([1000.0, 0.0, -3.0, 2.0]);
        assert!((p.iter().sum::<f64>() - 1.0).abs() < 1e-12);
        assert!(p[0] > 0.99);
    }

    #[test]
    fn softmax_survives_non_finite_logits() {
        let p = softmax([f64::INFINITY, f64::NEG_INFINITY, f64::NAN, 0.0]);
        assert_eq!(p, [1.0, 0.0, 0.0, 0.0]);

        let p = softmax([f64::INFINITY, f64::INFINITY, 1.0, 0.0]);
        assert_eq!(p, [0.5, 0.5, 0.0, 0.0]);

        let p = softmax([f64::NAN; CATEGORY_COUNT]);
        assert_eq!(p, [0.25; CATEGORY_COUNT]);

        let p = softmax([f64::NAN, 3.0, f64::NEG_INFINITY, 3.0]);
        assert_eq!(p, [0.0, 0.5, 0.0, 0.5]);
    }

    #[test]
    fn extreme_rows_still_give_a_distribution() {
        let mut model = LogisticClassifier::zeros();
        model.weights[0][0] = 50.0;
        model.weights[1][0] = -50.0;
        model.weights[2][1] = 50.0;
        let row = [1e308, -1e308, 1e308, -1e308, 1e308, -1e308, 1e308, -1e308];
        let p = model.predict_proba(&row);
        assert!(p.iter().all(|v| v.is_finite()));
        assert!((p.iter().sum::<f64>() - 1.0).abs() < 1e-12);
        assert!(p[0] > 0.99);
    }

    #[test]
    fn separable_classes_are_learned() {
        // Each class sits on its own axis direction in the (x0, x1) plane.
        let dirs = [(1.0, 0.0), (0.0, 1.0), (-1.0, 0.0), (0.0, -1.0)];
        let x: Vec<Row> = (0..40)
            .map(|i| {
                let (a, b) = dirs[i / 10];
                let jitter = (i % 10) as f64 * 0.02;
                let mut r = [0.0; SIGNAL_COUNT];
                r[0] = a + jitter;
                r[1] = b - jitter;
                r
            })
            .collect();
        let labels: Vec<usize> = (0..40).map(|i| i / 10).collect();
        let model = LogisticClassifier::fit(&x, &labels, &LogisticCfg::default()).unwrap();

        for (row, &label) in x.iter().zip(&labels) {
            let p = model.predict_proba(row);
            let argmax = (0..CATEGORY_COUNT)
                .max_by(|&a, &b| p[a].total_cmp(&p[b]))
                .unwrap();
            assert_eq!(argmax, label);
        }
    }

    #[test]
    fn absent_class_still_gets_a_probability() {
        let x: Vec<Row> = (0..10)
            .map(|i| {
                let mut r = [0.0; SIGNAL_COUNT];
                r[1] = i as f64;
                r
            })
            .collect();
        let labels = vec![1usize; 10];
        let model = LogisticClassifier::fit(&x, &labels, &LogisticCfg::default()).unwrap();
        let p = model.predict_proba(&x[0]);
        assert_eq!(p.len(), CATEGORY_COUNT);
        assert!(p[1] > p[3]);
        assert!((p.iter().sum::<f64>() - 1.0).abs() < 1e-9);
    }
}
