//! Gradient-boosted decision trees for multiclass classification.
//!
//! Softmax objective with second-order (Newton) leaf values, the same shape
//! as the usual `gbtree` booster: each round fits one regression tree per
//! class to the gradient/hessian of the softmax loss.

use anyhow::{Result, anyhow};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::PipelineError;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoostParams {
    pub max_depth: usize,
    pub n_estimators: usize,
    pub learning_rate: f64,
    /// L2 penalty on leaf weights.
    pub lambda: f64,
    /// Minimum hessian sum in a child.
    pub min_child_weight: f64,
}

impl Default for BoostParams {
    fn default() -> Self {
        Self {
            max_depth: 2,
            n_estimators: 100,
            learning_rate: 0.1,
            lambda: 1.0,
            min_child_weight: 1.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Node {
    Leaf {
        value: f64,
    },
    Split {
        feature: usize,
        threshold: f64,
        left: usize,
        right: usize,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegressionTree {
    pub nodes: Vec<Node>,
}

impl RegressionTree {
    pub fn predict(&self, row: &[f64]) -> f64 {
        let mut idx = 0usize;
        loop {
            match &self.nodes[idx] {
                Node::Leaf { value } => return *value,
                Node::Split {
                    feature,
                    threshold,
                    left,
                    right,
                } => {
                    let x = row.get(*feature).copied().unwrap_or(f64::NAN);
                    // NaN goes right.
                    idx = if x < *threshold { *left } else { *right };
                }
            }
        }
    }

    pub fn depth(&self) -> usize {
        fn walk(nodes: &[Node], idx: usize) -> usize {
            match &nodes[idx] {
                Node::Leaf { .. } => 0,
                Node::Split { left, right, .. } => 1 + walk(nodes, *left).max(walk(nodes, *right)),
            }
        }
        if self.nodes.is_empty() {
            0
        } else {
            walk(&self.nodes, 0)
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct SplitCandidate {
    feature: usize,
    threshold: f64,
    gain: f64,
}

struct TreeBuilder<'a> {
    x: &'a [Vec<f64>],
    grad: &'a [f64],
    hess: &'a [f64],
    params: &'a BoostParams,
    nodes: Vec<Node>,
}

impl TreeBuilder<'_> {
    fn leaf_value(&self, g: f64, h: f64) -> f64 {
        -g / (h + self.params.lambda)
    }

    fn score(&self, g: f64, h: f64) -> f64 {
        g * g / (h + self.params.lambda)
    }

    fn build(&mut self, indices: Vec<usize>, depth: usize) -> usize {
        let (g, h) = indices
            .iter()
            .fold((0.0, 0.0), |(g, h), &i| (g + self.grad[i], h + self.hess[i]));

        let node_idx = self.nodes.len();
        self.nodes.push(Node::Leaf {
            value: self.leaf_value(g, h),
        });

        if depth >= self.params.max_depth || indices.len() < 2 {
            return node_idx;
        }
        let Some(best) = self.best_split(&indices, g, h) else {
            return node_idx;
        };

        let (left_idx, right_idx): (Vec<usize>, Vec<usize>) = indices
            .into_iter()
            .partition(|&i| self.x[i][best.feature] < best.threshold);

        let left = self.build(left_idx, depth + 1);
        let right = self.build(right_idx, depth + 1);
        self.nodes[node_idx] = Node::Split {
            feature: best.feature,
            threshold: best.threshold,
            left,
            right,
        };
        node_idx
    }

    fn best_split(&self, indices: &[usize], g_total: f64, h_total: f64) -> Option<SplitCandidate> {
        let n_features = self.x.first().map(|r| r.len()).unwrap_or(0);
        let parent = self.score(g_total, h_total);

        (0..n_features)
            .into_par_iter()
            .filter_map(|feature| {
                self.best_split_for_feature(feature, indices, g_total, h_total, parent)
            })
            .reduce_with(|a, b| {
                // Ties go to the lower feature index so fits are reproducible.
                if b.gain > a.gain || (b.gain == a.gain && b.feature < a.feature) {
                    b
                } else {
                    a
                }
            })
    }

    fn best_split_for_feature(
        &self,
        feature: usize,
        indices: &[usize],
        g_total: f64,
        h_total: f64,
        parent: f64,
    ) -> Option<SplitCandidate> {
        let mut order = indices.to_vec();
        order.sort_by(|&a, &b| self.x[a][feature].total_cmp(&self.x[b][feature]));

        let mut best: Option<SplitCandidate> = None;
        let mut g_left = 0.0;
        let mut h_left = 0.0;
        for w in 0..order.len() - 1 {
            let i = order[w];
            g_left += self.grad[i];
            h_left += self.hess[i];

            let here = self.x[i][feature];
            let next = self.x[order[w + 1]][feature];
            if here == next {
                continue;
            }
            let h_right = h_total - h_left;
            if h_left < self.params.min_child_weight || h_right < self.params.min_child_weight {
                continue;
            }
            let g_right = g_total - g_left;
            let gain =
                0.5 * (self.score(g_left, h_left) + self.score(g_right, h_right) - parent);
            if gain <= 1e-12 {
                continue;
            }
            if best.is_none_or(|b| gain > b.gain) {
                best = Some(SplitCandidate {
                    feature,
                    threshold: here + (next - here) / 2.0,
                    gain,
                });
            }
        }
        best
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BoostedClassifier {
    pub classes: Vec<u8>,
    pub n_features: usize,
    pub learning_rate: f64,
    /// `rounds[r][k]` is the tree for class `k` in boosting round `r`.
    pub rounds: Vec<Vec<RegressionTree>>,
}

impl BoostedClassifier {
    pub fn fit(x: &[Vec<f64>], y: &[u8], params: &BoostParams) -> Result<Self> {
        if x.is_empty() || y.is_empty() {
            return Err(PipelineError::EmptyTrainingSet.into());
        }
        if x.len() != y.len() {
            return Err(anyhow!(
                "feature rows ({}) and labels ({}) differ",
                x.len(),
                y.len()
            ));
        }
        let n_features = x[0].len();
        if n_features == 0 {
            return Err(PipelineError::EmptyTrainingSet.into());
        }
        if let Some(bad) = x.iter().position(|r| r.len() != n_features) {
            return Err(anyhow!(
                "row {bad} has {} features, expected {n_features}",
                x[bad].len()
            ));
        }

        let mut classes = y.to_vec();
        classes.sort_unstable();
        classes.dedup();
        if classes.len() < 2 {
            return Err(PipelineError::SingleClass(classes[0]).into());
        }

        let n = x.len();
        let k = classes.len();
        let targets = y
            .iter()
            .map(|label| classes.binary_search(label).unwrap_or(0))
            .collect::<Vec<_>>();

        let mut margins = vec![vec![0.0_f64; k]; n];
        let mut rounds = Vec::with_capacity(params.n_estimators);
        let mut grad = vec![0.0_f64; n];
        let mut hess = vec![0.0_f64; n];

        for _ in 0..params.n_estimators {
            let probs = margins.iter().map(|m| softmax(m)).collect::<Vec<_>>();
            let mut round = Vec::with_capacity(k);
            for class in 0..k {
                for i in 0..n {
                    let p = probs[i][class];
                    let t = if targets[i] == class { 1.0 } else { 0.0 };
                    grad[i] = p - t;
                    hess[i] = (p * (1.0 - p)).max(1e-16);
                }
                let mut builder = TreeBuilder {
                    x,
                    grad: &grad,
                    hess: &hess,
                    params,
                    nodes: Vec::new(),
                };
                builder.build((0..n).collect(), 0);
                let tree = RegressionTree {
                    nodes: builder.nodes,
                };
                for (i, row) in x.iter().enumerate() {
                    margins[i][class] += params.learning_rate * tree.predict(row);
                }
                round.push(tree);
            }
            rounds.push(round);
        }

        Ok(Self {
            classes,
            n_features,
            learning_rate: params.learning_rate,
            rounds,
        })
    }

    pub fn margins(&self, row: &[f64]) -> Vec<f64> {
        let mut out = vec![0.0_f64; self.classes.len()];
        for round in &self.rounds {
            for (class, tree) in round.iter().enumerate() {
                out[class] += self.learning_rate * tree.predict(row);
            }
        }
        out
    }

    /// Probabilities in the order of `classes`.
    pub fn predict_proba(&self, row: &[f64]) -> Vec<f64> {
        softmax(&self.margins(row))
    }

    pub fn predict(&self, row: &[f64]) -> u8 {
        let probs = self.predict_proba(row);
        let mut best = 0usize;
        for (i, p) in probs.iter().enumerate() {
            if *p > probs[best] {
                best = i;
            }
        }
        self.classes[best]
    }

    /// Share of rows predicted correctly; 0 for an empty set.
    pub fn score(&self, x: &[Vec<f64>], y: &[u8]) -> f64 {
        if x.is_empty() || x.len() != y.len() {
            return 0.0;
        }
        let correct = x
            .iter()
            .zip(y)
            .filter(|(row, label)| self.predict(row) == **label)
            .count();
        correct as f64 / x.len() as f64
    }
}

fn softmax(margins: &[f64]) -> Vec<f64> {
    let mx = margins.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    let exps = margins.iter().map(|m| (m - mx).exp()).collect::<Vec<_>>();
    let den = exps.iter().sum::<f64>().max(1e-300);
    exps.into_iter().map(|e| e / den).collect()
}
