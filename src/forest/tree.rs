//! CART decision tree (Gini impurity) used as the forest's base learner

use rand::rngs::StdRng;
use rand::seq::index;
use serde::{Deserialize, Serialize};

/// A node in the flattened tree.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum TreeNode {
    /// Terminal node holding the fraction of class-1 samples that reached it.
    Leaf {
        /// P(class = 1)
        value: f64,
    },
    /// Internal node: rows with `x[feature] <= threshold` go left.
    Split {
        /// Column index
        feature: usize,
        /// Midpoint between two distinct training values
        threshold: f64,
        /// Index of the left child
        left: usize,
        /// Index of the right child
        right: usize,
    },
}

/// Growth limits shared by every tree in a forest.
#[derive(Debug, Clone, Copy)]
pub(crate) struct TreeLimits {
    pub max_depth: Option<usize>,
    pub min_samples_leaf: usize,
    pub max_features: usize,
}

/// A fitted binary classification tree stored as a node arena (root at 0).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DecisionTree {
    nodes: Vec<TreeNode>,
    #[serde(skip)]
    importances: Vec<f64>,
}

impl DecisionTree {
    /// Grow a tree over `samples` (row indices, duplicates allowed for
    /// bootstrap draws).
    pub(crate) fn fit(
        x: &[Vec<f64>],
        y: &[u8],
        samples: Vec<usize>,
        limits: TreeLimits,
        rng: &mut StdRng,
    ) -> Self {
        let n_features = x.first().map_or(0, Vec::len);
        let mut builder = Builder {
            x,
            y,
            limits,
            n_features,
            nodes: Vec::new(),
            decrease: vec![0.0; n_features],
            rng,
        };
        builder.grow(samples, 0);

        let total: f64 = builder.decrease.iter().sum();
        let importances = if total > 0.0 {
            builder.decrease.iter().map(|d| d / total).collect()
        } else {
            vec![0.0; n_features]
        };

        Self {
            nodes: builder.nodes,
            importances,
        }
    }

    /// Probability of class 1 for one row.
    #[must_use]
    pub fn predict_row(&self, row: &[f64]) -> f64 {
        let mut at = 0;
        loop {
            match &self.nodes[at] {
                TreeNode::Leaf { value } => return *value,
                TreeNode::Split {
                    feature,
                    threshold,
                    left,
                    right,
                } => {
                    at = if row[*feature] <= *threshold { *left } else { *right };
                }
            }
        }
    }

    /// Nodes in arena order.
    #[must_use]
    pub fn nodes(&self) -> &[TreeNode] {
        &self.nodes
    }

    /// Number of nodes.
    #[must_use]
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /// Depth of the deepest leaf (a lone root leaf has depth 0).
    #[must_use]
    pub fn depth(&self) -> usize {
        fn walk(nodes: &[TreeNode], at: usize) -> usize {
            match &nodes[at] {
                TreeNode::Leaf { .. } => 0,
                TreeNode::Split { left, right, .. } => {
                    1 + walk(nodes, *left).max(walk(nodes, *right))
                }
            }
        }
        walk(&self.nodes, 0)
    }

    /// Normalised impurity decrease per feature, summing to 1 (or all zero
    /// for a single-leaf tree). Not persisted with the model.
    #[must_use]
    pub fn feature_importances(&self) -> &[f64] {
        &self.importances
    }
}

struct Builder<'a> {
    x: &'a [Vec<f64>],
    y: &'a [u8],
    limits: TreeLimits,
    n_features: usize,
    nodes: Vec<TreeNode>,
    decrease: Vec<f64>,
    rng: &'a mut StdRng,
}

struct BestSplit {
    feature: usize,
    threshold: f64,
    child_impurity: f64,
}

impl Builder<'_> {
    fn grow(&mut self, samples: Vec<usize>, depth: usize) -> usize {
        let id = self.nodes.len();
        let n = samples.len();
        let positives = samples.iter().filter(|&&i| self.y[i] == 1).count();
        #[allow(clippy::cast_precision_loss)]
        let value = positives as f64 / n as f64;
        self.nodes.push(TreeNode::Leaf { value });

        let at_depth_limit = self.limits.max_depth.is_some_and(|d| depth >= d);
        let pure = positives == 0 || positives == n;
        if at_depth_limit || pure || n < 2 * self.limits.min_samples_leaf.max(1) {
            return id;
        }

        let parent_impurity = n as f64 * gini(positives, n);
        let Some(best) = self.best_split(&samples) else {
            return id;
        };
        let gain = parent_impurity - best.child_impurity;
        if gain <= 1e-12 {
            return id;
        }
        self.decrease[best.feature] += gain;

        let (left_rows, right_rows): (Vec<usize>, Vec<usize>) = samples
            .into_iter()
            .partition(|&i| self.x[i][best.feature] <= best.threshold);

        let left = self.grow(left_rows, depth + 1);
        let right = self.grow(right_rows, depth + 1);
        self.nodes[id] = TreeNode::Split {
            feature: best.feature,
            threshold: best.threshold,
            left,
            right,
        };
        id
    }

    fn best_split(&mut self, samples: &[usize]) -> Option<BestSplit> {
        let n = samples.len();
        let total_pos = samples.iter().filter(|&&i| self.y[i] == 1).count();
        let min_leaf = self.limits.min_samples_leaf.max(1);
        let k = self.limits.max_features.clamp(1, self.n_features);

        let mut best: Option<BestSplit> = None;
        let mut sorted = samples.to_vec();
        for feature in index::sample(&mut *self.rng, self.n_features, k) {
            let x = self.x;
            sorted.sort_by(|&a, &b| x[a][feature].total_cmp(&x[b][feature]));

            let mut left_pos = 0;
            for split_at in 1..n {
                if self.y[sorted[split_at - 1]] == 1 {
                    left_pos += 1;
                }
                let lo = x[sorted[split_at - 1]][feature];
                let hi = x[sorted[split_at]][feature];
                if lo >= hi || split_at < min_leaf || n - split_at < min_leaf {
                    continue;
                }
                let right_n = n - split_at;
                let right_pos = total_pos - left_pos;
                #[allow(clippy::cast_precision_loss)]
                let child_impurity = split_at as f64 * gini(left_pos, split_at)
                    + right_n as f64 * gini(right_pos, right_n);
                if best.as_ref().map_or(true, |b| child_impurity < b.child_impurity) {
                    best = Some(BestSplit {
                        feature,
                        threshold: lo + (hi - lo) / 2.0,
                        child_impurity,
                    });
                }
            }
        }
        best
    }
}

#[allow(clippy::cast_precision_loss)]
fn gini(positives: usize, n: usize) -> f64 {
    if n == 0 {
        return 0.0;
    }
    let p = positives as f64 / n as f64;
    2.0 * p * (1.0 - p)
}
