//! Tree-ensemble classifier
//!
//! ```text
//! RandomForestClassifier
//!   ├── ForestParams (n_estimators, max_depth, min_samples_leaf, ...)
//!   └──< DecisionTree (N) [bootstrap sample, Gini splits]
//! ```

mod classifier;
mod tree;

pub use classifier::{ForestParams, MaxFeatures, RandomForestClassifier};
pub use tree::{DecisionTree, TreeNode};
