//! Bagged regression trees.
//!
//! Each tree is grown on a bootstrap resample of the (scaled) training rows,
//! splitting on whichever feature/threshold gives the largest reduction in
//! squared error. The forest predicts the mean of its trees.

use rand::Rng;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::cfg::ForestCfg;
use crate::error::{CreditError, Result};
use crate::signals::SIGNAL_COUNT;

type Row = [f64; SIGNAL_COUNT];

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Node {
    Leaf {
        value: f64,
    },
    Split {
        feature: usize,
        /// Rows with `x[feature] <= threshold` go left.
        threshold: f64,
        left: usize,
        right: usize,
    },
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RegressionTree {
    /// Root is `nodes[0]`.
    nodes: Vec<Node>,
}

struct Candidate {
    feature: usize,
    threshold: f64,
    /// Rows going left once sorted by `feature`.
    n_left: usize,
    gain: f64,
}

struct TreeBuilder<'a> {
    x: &'a [Row],
    y: &'a [f64],
    cfg: &'a ForestCfg,
    nodes: Vec<Node>,
}

impl<'a> TreeBuilder<'a> {
    fn mean(&self, idx: &[usize]) -> f64 {
        idx.iter().map(|&i| self.y[i]).sum::<f64>() / idx.len() as f64
    }

    fn is_constant(&self, idx: &[usize]) -> bool {
        let first = self.y[idx[0]];
        idx.iter().all(|&i| (self.y[i] - first).abs() <= f64::EPSILON * first.abs().max(1.0))
    }

    /// Best split over all features, maximizing `sum_l^2/n_l + sum_r^2/n_r`
    /// (equivalent to minimizing the children's squared error).
    fn best_split(&self, idx: &mut [usize]) -> Option<Candidate> {
        let n = idx.len();
        let min_leaf = self.cfg.min_samples_leaf.max(1);
        let total: f64 = idx.iter().map(|&i| self.y[i]).sum();
        let parent = total * total / n as f64;

        let mut best: Option<Candidate> = None;
        for feature in 0..SIGNAL_COUNT {
            idx.sort_by(|&a, &b| self.x[a][feature].total_cmp(&self.x[b][feature]));

            let mut sum_left = 0.0;
            for k in 1..n {
                sum_left += self.y[idx[k - 1]];
                if k < min_leaf || n - k < min_leaf {
                    continue;
                }
                let lo = self.x[idx[k - 1]][feature];
                let hi = self.x[idx[k]][feature];
                if lo >= hi {
                    continue;
                }
                let sum_right = total - sum_left;
                let score = sum_left * sum_left / k as f64 + sum_right * sum_right / (n - k) as f64;
                let gain = score - parent;
                if gain > 1e-12 && best.as_ref().map_or(true, |b| gain > b.gain) {
                    let mid = lo + (hi - lo) / 2.0;
                    best = Some(Candidate {
                        feature,
                        threshold: if mid < hi { mid } else { lo },
                        n_left: k,
                        gain,
                    });
                }
            }
        }
        best
    }

    fn grow(&mut self, idx: &mut [usize], depth: usize) -> usize {
        let node_id = self.nodes.len();
        let value = self.mean(idx);
        self.nodes.push(Node::Leaf { value });

        let depth_ok = self.cfg.max_depth.map_or(true, |d| depth < d);
        if !depth_ok || idx.len() < self.cfg.min_samples_split.max(2) || self.is_constant(idx) {
            return node_id;
        }

        let Some(split) = self.best_split(idx) else {
            return node_id;
        };

        idx.sort_by(|&a, &b| self.x[a][split.feature].total_cmp(&self.x[b][split.feature]));
        let (left_idx, right_idx) = idx.split_at_mut(split.n_left);
        let left = self.grow(left_idx, depth + 1);
        let right = self.grow(right_idx, depth + 1);

        self.nodes[node_id] = Node::Split {
            feature: split.feature,
            threshold: split.threshold,
            left,
            right,
        };
        node_id
    }
}

impl RegressionTree {
    fn fit(x: &[Row], y: &[f64], mut sample: Vec<usize>, cfg: &ForestCfg) -> Self {
        let mut builder = TreeBuilder {
            x,
            y,
            cfg,
            nodes: Vec::new(),
        };
        builder.grow(&mut sample, 0);
        Self {
            nodes: builder.nodes,
        }
    }

    pub fn predict(&self, row: &Row) -> f64 {
        let mut id = 0;
        loop {
            match self.nodes.get(id) {
                Some(Node::Leaf { value }) => return *value,
                Some(Node::Split {
                    feature,
                    threshold,
                    left,
                    right,
                }) => {
                    id = if row[*feature] <= *threshold { *left } else { *right };
                }
                None => return 0.0,
            }
        }
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /// Every child index points forward to an existing node and features are in range.
    pub(crate) fn is_valid(&self) -> bool {
        !self.nodes.is_empty()
            && self.nodes.iter().enumerate().all(|(id, node)| match node {
                Node::Leaf { value } => value.is_finite(),
                Node::Split {
                    feature,
                    threshold,
                    left,
                    right,
                } => {
                    *feature < SIGNAL_COUNT
                        && threshold.is_finite()
                        && *left > id
                        && *right > id
                        && *left < self.nodes.len()
                        && *right < self.nodes.len()
                }
            })
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RandomForestRegressor {
    trees: Vec<RegressionTree>,
}

impl RandomForestRegressor {
    pub fn fit(x: &[Row], y: &[f64], cfg: &ForestCfg) -> Result<Self> {
        if x.is_empty() || x.len() != y.len() {
            return Err(CreditError::EmptyTrainingSet);
        }
        let n = x.len();
        let mut rng = ChaCha8Rng::seed_from_u64(cfg.seed);

        let trees: Vec<RegressionTree> = (0..cfg.n_trees.max(1))
            .map(|_| {
                let sample: Vec<usize> = (0..n).map(|_| rng.gen_range(0..n)).collect();
                RegressionTree::fit(x, y, sample, cfg)
            })
            .collect();

        debug!(
            trees = trees.len(),
            rows = n,
            nodes = trees.iter().map(RegressionTree::node_count).sum::<usize>(),
            "random forest fitted"
        );
        Ok(Self { trees })
    }

    pub fn predict(&self, row: &Row) -> f64 {
        if self.trees.is_empty() {
            return 0.0;
        }
        self.trees.iter().map(|t| t.predict(row)).sum::<f64>() / self.trees.len() as f64
    }

    pub fn n_trees(&self) -> usize {
        self.trees.len()
    }

    pub(crate) fn is_valid(&self) -> bool {
        !self.trees.is_empty() && self.trees.iter().all(RegressionTree::is_valid)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(v: f64) -> Row {
        let mut r = [0.0; SIGNAL_COUNT];
        r[2] = v;
        r
    }

    #[test]
    fn single_tree_learns_a_step() {
        let x: Vec<Row> = (0..20).map(|i| row(i as f64)).collect();
        let y: Vec<f64> = (0..20).map(|i| if i < 10 { 1.0 } else { 5.0 }).collect();
        let cfg = ForestCfg {
            n_trees: 1,
            ..ForestCfg::default()
        };
        let tree = RegressionTree::fit(&x, &y, (0..20).collect(), &cfg);

        assert_eq!(tree.predict(&row(3.0)), 1.0);
        assert_eq!(tree.predict(&row(15.0)), 5.0);
        // one split, two leaves
        assert_eq!(tree.node_count(), 3);
        assert!(tree.is_valid());
    }

    #[test]
    fn constant_target_is_a_single_leaf() {
        let x: Vec<Row> = (0..8).map(|i| row(i as f64)).collect();
        let y = vec![2.5; 8];
        let tree = RegressionTree::fit(&x, &y, (0..8).collect(), &ForestCfg::default());
        assert_eq!(tree.node_count(), 1);
        assert_eq!(tree.predict(&row(100.0)), 2.5);
    }

    #[test]
    fn max_depth_limits_growth() {
        let x: Vec<Row> = (0..64).map(|i| row(i as f64)).collect();
        let y: Vec<f64> = (0..64).map(|i| i as f64).collect();
        let cfg = ForestCfg {
            max_depth: Some(2),
            ..ForestCfg::default()
        };
        let tree = RegressionTree::fit(&x, &y, (0..64).collect(), &cfg);
        assert!(tree.node_count() <= 7);
    }

    #[test]
    fn forest_is_deterministic_for_a_seed() {
        let x: Vec<Row> = (0..50).map(|i| row((i * 7 % 13) as f64)).collect();
        let y: Vec<f64> = x.iter().map(|r| r[2] * 2.0).collect();
        let cfg = ForestCfg {
            n_trees: 5,
            ..ForestCfg::default()
        };
        let a = RandomForestRegressor::fit(&x, &y, &cfg).unwrap();
        let b = RandomForestRegressor::fit(&x, &y, &cfg).unwrap();
        assert_eq!(a, b);
        assert_eq!(a.n_trees(), 5);
    }

    #[test]
    fn empty_input_is_rejected() {
        let err = RandomForestRegressor::fit(&[], &[], &ForestCfg::default()).unwrap_err();
        assert!(matches!(err, CreditError::EmptyTrainingSet));
    }
}
