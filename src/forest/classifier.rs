//! Random forest classifier (bagged CART trees)

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
#[cfg(feature = "rayon")]
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::tree::{DecisionTree, TreeLimits};
use crate::dataset::Dataset;
use crate::{Error, Result};

/// Number of features considered at each split.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MaxFeatures {
    /// `floor(sqrt(n_features))`
    Sqrt,
    /// `floor(log2(n_features))`
    Log2,
    /// Every feature
    All,
    /// A fixed count (clamped to `1..=n_features`)
    Count(usize),
}

impl MaxFeatures {
    #[allow(clippy::cast_precision_loss, clippy::cast_sign_loss, clippy::cast_possible_truncation)]
    fn resolve(self, n_features: usize) -> usize {
        let k = match self {
            Self::Sqrt => (n_features as f64).sqrt() as usize,
            Self::Log2 => (n_features as f64).log2() as usize,
            Self::All => n_features,
            Self::Count(k) => k,
        };
        k.clamp(1, n_features.max(1))
    }
}

/// Hyperparameters for [`RandomForestClassifier`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ForestParams {
    /// Number of trees
    pub n_estimators: usize,
    /// Depth limit (`None` grows until leaves are pure)
    pub max_depth: Option<usize>,
    /// Minimum rows in each leaf
    pub min_samples_leaf: usize,
    /// Features tried per split
    pub max_features: MaxFeatures,
    /// Draw each tree's rows with replacement
    pub bootstrap: bool,
    /// Seed for bootstrap and feature sampling
    pub seed: u64,
}

impl Default for ForestParams {
    fn default() -> Self {
        Self {
            n_estimators: 100,
            max_depth: Some(5),
            min_samples_leaf: 1,
            max_features: MaxFeatures::Sqrt,
            bootstrap: true,
            seed: 42,
        }
    }
}

impl ForestParams {
    /// Set the number of trees.
    #[must_use]
    pub const fn n_estimators(mut self, n: usize) -> Self {
        self.n_estimators = n;
        self
    }

    /// Set the depth limit.
    #[must_use]
    pub const fn max_depth(mut self, depth: Option<usize>) -> Self {
        self.max_depth = depth;
        self
    }

    /// Set the minimum leaf size.
    #[must_use]
    pub const fn min_samples_leaf(mut self, n: usize) -> Self {
        self.min_samples_leaf = n;
        self
    }

    /// Set the per-split feature budget.
    #[must_use]
    pub const fn max_features(mut self, max_features: MaxFeatures) -> Self {
        self.max_features = max_features;
        self
    }

    /// Enable or disable bootstrap sampling.
    #[must_use]
    pub const fn bootstrap(mut self, bootstrap: bool) -> Self {
        self.bootstrap = bootstrap;
        self
    }

    /// Set the random seed.
    #[must_use]
    pub const fn seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    /// Check the params before fitting.
    ///
    /// # Errors
    ///
    /// `Error::InvalidParameter` for zero trees, zero leaf size or a zero
    /// feature budget.
    pub fn validate(&self) -> Result<()> {
        if self.n_estimators == 0 {
            return Err(Error::InvalidParameter("n_estimators must be at least 1".to_string()));
        }
        if self.min_samples_leaf == 0 {
            return Err(Error::InvalidParameter(
                "min_samples_leaf must be at least 1".to_string(),
            ));
        }
        if self.max_features == MaxFeatures::Count(0) {
            return Err(Error::InvalidParameter("max_features must be at least 1".to_string()));
        }
        Ok(())
    }
}

/// A fitted random forest for binary classification.
///
/// Each tree is grown on a bootstrap sample with a seed derived from the
/// forest seed and the tree index, so results do not depend on whether trees
/// are fitted in parallel.
///
/// # Example
///
/// ```rust
/// use mltrack::dataset::Dataset;
/// use mltrack::forest::{ForestParams, RandomForestClassifier};
///
/// # fn main() -> mltrack::Result<()> {
/// let split = Dataset::builtin().train_test_split(0.2, 42, true)?;
/// let params = ForestParams::default().n_estimators(10);
/// let model = RandomForestClassifier::fit(&params, &split.train)?;
///
/// let proba = model.predict_proba(split.test.features())?;
/// assert_eq!(proba.len(), split.test.n_samples());
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RandomForestClassifier {
    params: ForestParams,
    n_features: usize,
    feature_importances: Vec<f64>,
    trees: Vec<DecisionTree>,
}

impl RandomForestClassifier {
    /// Fit a forest on `data`.
    ///
    /// # Errors
    ///
    /// Returns `Error::InvalidParameter` for a zero tree count, leaf size or
    /// feature budget.
    pub fn fit(params: &ForestParams, data: &Dataset) -> Result<Self> {
        params.validate()?;
        let n_features = data.n_features();
        let limits = TreeLimits {
            max_depth: params.max_depth,
            min_samples_leaf: params.min_samples_leaf,
            max_features: params.max_features.resolve(n_features),
        };
        debug!(
            n_estimators = params.n_estimators,
            n_samples = data.n_samples(),
            max_features = limits.max_features,
            "fitting random forest"
        );

        let fit_one = |tree_index: usize| {
            let mut rng = StdRng::seed_from_u64(tree_seed(params.seed, tree_index));
            let n = data.n_samples();
            let samples: Vec<usize> = if params.bootstrap {
                (0..n).map(|_| rng.gen_range(0..n)).collect()
            } else {
                (0..n).collect()
            };
            DecisionTree::fit(data.features(), data.labels(), samples, limits, &mut rng)
        };

        #[cfg(feature = "rayon")]
        let trees: Vec<DecisionTree> = (0..params.n_estimators).into_par_iter().map(fit_one).collect();
        #[cfg(not(feature = "rayon"))]
        let trees: Vec<DecisionTree> = (0..params.n_estimators).map(fit_one).collect();

        let mut feature_importances = vec![0.0; n_features];
        for tree in &trees {
            for (acc, v) in feature_importances.iter_mut().zip(tree.feature_importances()) {
                *acc += v;
            }
        }
        let total: f64 = feature_importances.iter().sum();
        if total > 0.0 {
            for v in &mut feature_importances {
                *v /= total;
            }
        }

        Ok(Self {
            params: params.clone(),
            n_features,
            feature_importances,
            trees,
        })
    }

    /// Mean class-1 probability across trees, one value per row.
    ///
    /// # Errors
    ///
    /// Returns `Error::InvalidInput` if a row's width differs from the
    /// training width.
    pub fn predict_proba(&self, rows: &[Vec<f64>]) -> Result<Vec<f64>> {
        if let Some(bad) = rows.iter().find(|r| r.len() != self.n_features) {
            return Err(Error::InvalidInput(format!(
                "row has {} features, model expects {}",
                bad.len(),
                self.n_features
            )));
        }
        #[allow(clippy::cast_precision_loss)]
        let n_trees = self.trees.len() as f64;
        Ok(rows
            .iter()
            .map(|row| self.trees.iter().map(|t| t.predict_row(row)).sum::<f64>() / n_trees)
            .collect())
    }

    /// Hard class predictions (`proba >= 0.5` is class 1).
    ///
    /// # Errors
    ///
    /// Same as [`Self::predict_proba`].
    pub fn predict(&self, rows: &[Vec<f64>]) -> Result<Vec<u8>> {
        Ok(self
            .predict_proba(rows)?
            .into_iter()
            .map(|p| u8::from(p >= 0.5))
            .collect())
    }

    /// Mean decrease in impurity per feature, summing to 1.
    #[must_use]
    pub fn feature_importances(&self) -> &[f64] {
        &self.feature_importances
    }

    /// Hyperparameters the forest was fitted with.
    #[must_use]
    pub const fn params(&self) -> &ForestParams {
        &self.params
    }

    /// Fitted trees.
    #[must_use]
    pub fn trees(&self) -> &[DecisionTree] {
        &self.trees
    }

    /// Training feature count.
    #[must_use]
    pub const fn n_features(&self) -> usize {
        self.n_features
    }
}

fn tree_seed(seed: u64, tree_index: usize) -> u64 {
    seed ^ (tree_index as u64 + 1).wrapping_mul(0x9E37_79B9_7F4A_7C15)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn small_params() -> ForestParams {
        ForestParams::default().n_estimators(15)
    }

    #[test]
    fn test_max_features_resolve() {
        assert_eq!(MaxFeatures::Sqrt.resolve(30), 5);
        assert_eq!(MaxFeatures::Log2.resolve(30), 4);
        assert_eq!(MaxFeatures::All.resolve(30), 30);
        assert_eq!(MaxFeatures::Count(100).resolve(30), 30);
    }

    #[test]
    fn test_zero_estimators_rejected() {
        let ds = Dataset::builtin();
        let err = RandomForestClassifier::fit(&small_params().n_estimators(0), &ds).unwrap_err();
        assert!(matches!(err, Error::InvalidParameter(_)));
    }

    #[test]
    fn test_fit_is_deterministic() {
        let ds = Dataset::builtin();
        let a = RandomForestClassifier::fit(&small_params(), &ds).unwrap();
        let b = RandomForestClassifier::fit(&small_params(), &ds).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_respects_depth_limit() {
        let ds = Dataset::builtin();
        let model = RandomForestClassifier::fit(&small_params().max_depth(Some(3)), &ds).unwrap();
        assert!(model.trees().iter().all(|t| t.depth() <= 3));
        assert_eq!(model.trees().len(), 15);
    }

    #[test]
    fn test_importances_sum_to_one() {
        let ds = Dataset::builtin();
        let model = RandomForestClassifier::fit(&small_params(), &ds).unwrap();
        let total: f64 = model.feature_importances().iter().sum();
        assert!((total - 1.0).abs() < 1e-9);
        assert_eq!(model.feature_importances().len(), 30);
    }

    #[test]
    fn test_predict_proba_in_unit_interval() {
        let split = Dataset::builtin().train_test_split(0.2, 42, true).unwrap();
        let model = RandomForestClassifier::fit(&small_params(), &split.train).unwrap();
        let proba = model.predict_proba(split.test.features()).unwrap();
        assert!(proba.iter().all(|p| (0.0..=1.0).contains(p)));
        let preds = model.predict(split.test.features()).unwrap();
        for (p, c) in proba.iter().zip(&preds) {
            assert_eq!(*c, u8::from(*p >= 0.5));
        }
    }

    #[test]
    fn test_predict_rejects_wrong_width() {
        let ds = Dataset::builtin();
        let model = RandomForestClassifier::fit(&small_params().n_estimators(2), &ds).unwrap();
        assert!(model.predict(&[vec![1.0, 2.0]]).is_err());
    }

    #[test]
    fn test_serde_preserves_predictions() {
        let split = Dataset::builtin().train_test_split(0.2, 42, true).unwrap();
        let model = RandomForestClassifier::fit(&small_params(), &split.train).unwrap();
        let json = serde_json::to_string(&model).unwrap();
        let restored: RandomForestClassifier = serde_json::from_str(&json).unwrap();
        let before = model.predict_proba(split.test.features()).unwrap();
        let after = restored.predict_proba(split.test.features()).unwrap();
        for (a, b) in before.iter().zip(&after) {
            assert!((a - b).abs() < 1e-12);
        }
    }
}
