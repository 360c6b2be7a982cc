//! Pipeline configuration
//!
//! Defaults reproduce the demo run. The binary reads overrides from the
//! environment:
//!
//! | Variable               | Effect                                     |
//! |------------------------|--------------------------------------------|
//! | `MLTRACK_CONFIG`       | JSON file holding a full `PipelineConfig`   |
//! | `MLTRACK_TRACKING_DIR` | tracking directory (default `mlruns`)       |
//! | `MLTRACK_EXPERIMENT`   | experiment name                            |

use std::collections::BTreeMap;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::forest::ForestParams;
use crate::{Error, Result};

/// Path of an optional JSON config file.
pub const CONFIG_ENV: &str = "MLTRACK_CONFIG";
/// Tracking directory override.
pub const TRACKING_DIR_ENV: &str = "MLTRACK_TRACKING_DIR";
/// Experiment name override.
pub const EXPERIMENT_ENV: &str = "MLTRACK_EXPERIMENT";

/// Default tracking directory, relative to the working directory.
pub const DEFAULT_TRACKING_DIR: &str = "mlruns";
/// Default experiment name.
pub const DEFAULT_EXPERIMENT: &str = "demo-mlflow-artifacts";
/// Default run name.
pub const DEFAULT_RUN_NAME: &str = "random_forest_breast_cancer";

/// Everything `run_pipeline` needs to know.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    tracking_dir: PathBuf,
    experiment_name: String,
    run_name: String,
    forest: ForestParams,
    test_size: f64,
    split_seed: u64,
    stratify: bool,
    top_k_features: usize,
    tags: BTreeMap<String, String>,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        let tags = [
            ("model_type", "RandomForestClassifier"),
            ("dataset", "builtin_breast_cancer"),
            ("owner", "demo"),
        ]
        .into_iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();
        Self {
            tracking_dir: PathBuf::from(DEFAULT_TRACKING_DIR),
            experiment_name: DEFAULT_EXPERIMENT.to_string(),
            run_name: DEFAULT_RUN_NAME.to_string(),
            forest: ForestParams::default().min_samples_leaf(2),
            test_size: 0.2,
            split_seed: 42,
            stratify: true,
            top_k_features: 12,
            tags,
        }
    }
}

impl PipelineConfig {
    /// Defaults, then `MLTRACK_CONFIG`, then the single-value overrides.
    ///
    /// # Errors
    ///
    /// IO or JSON errors reading the config file, or an invalid result.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Same as [`PipelineConfig::from_env`] with a custom variable source.
    ///
    /// # Errors
    ///
    /// IO or JSON errors reading the config file, or an invalid result.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let mut config = match lookup(CONFIG_ENV).filter(|p| !p.is_empty()) {
            Some(path) => Self::from_file(path)?,
            None => Self::default(),
        };
        if let Some(dir) = lookup(TRACKING_DIR_ENV).filter(|v| !v.is_empty()) {
            config.tracking_dir = PathBuf::from(dir);
        }
        if let Some(name) = lookup(EXPERIMENT_ENV).filter(|v| !v.is_empty()) {
            config.experiment_name = name;
        }
        config.validate()?;
        Ok(config)
    }

    /// Load a JSON config file. Missing fields take their defaults.
    ///
    /// # Errors
    ///
    /// IO and JSON errors.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        debug!(path = %path.display(), "loading pipeline config");
        let config: Self = serde_json::from_slice(&fs::read(path)?)?;
        Ok(config)
    }

    /// Check value ranges.
    ///
    /// # Errors
    ///
    /// `Error::InvalidParameter` naming the first bad field.
    pub fn validate(&self) -> Result<()> {
        if !(self.test_size > 0.0 && self.test_size < 1.0) {
            return Err(Error::InvalidParameter(format!(
                "test_size must be in (0, 1), got {}",
                self.test_size
            )));
        }
        if self.top_k_features == 0 {
            return Err(Error::InvalidParameter(
                "top_k_features must be at least 1".to_string(),
            ));
        }
        if self.experiment_name.trim().is_empty() {
            return Err(Error::InvalidParameter(
                "experiment_name must not be empty".to_string(),
            ));
        }
        self.forest.validate()
    }

    /// Set the tracking directory.
    #[must_use]
    pub fn with_tracking_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.tracking_dir = dir.into();
        self
    }

    /// Set the experiment name.
    #[must_use]
    pub fn with_experiment_name(mut self, name: impl Into<String>) -> Self {
        self.experiment_name = name.into();
        self
    }

    /// Set the run name.
    #[must_use]
    pub fn with_run_name(mut self, name: impl Into<String>) -> Self {
        self.run_name = name.into();
        self
    }

    /// Set the forest hyperparameters.
    #[must_use]
    pub fn with_forest(mut self, forest: ForestParams) -> Self {
        self.forest = forest;
        self
    }

    /// Set the test fraction.
    #[must_use]
    pub fn with_test_size(mut self, test_size: f64) -> Self {
        self.test_size = test_size;
        self
    }

    /// Set the split seed.
    #[must_use]
    pub fn with_split_seed(mut self, seed: u64) -> Self {
        self.split_seed = seed;
        self
    }

    /// Enable or disable stratified splitting.
    #[must_use]
    pub fn with_stratify(mut self, stratify: bool) -> Self {
        self.stratify = stratify;
        self
    }

    /// Set how many bars the importance chart shows.
    #[must_use]
    pub fn with_top_k_features(mut self, k: usize) -> Self {
        self.top_k_features = k;
        self
    }

    /// Add or replace a run tag.
    #[must_use]
    pub fn with_tag(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.tags.insert(key.into(), value.into());
        self
    }

    /// Tracking directory.
    #[must_use]
    pub fn tracking_dir(&self) -> &Path {
        &self.tracking_dir
    }

    /// Experiment name.
    #[must_use]
    pub fn experiment_name(&self) -> &str {
        &self.experiment_name
    }

    /// Run name.
    #[must_use]
    pub fn run_name(&self) -> &str {
        &self.run_name
    }

    /// Forest hyperparameters.
    #[must_use]
    pub const fn forest(&self) -> &ForestParams {
        &self.forest
    }

    /// Test fraction.
    #[must_use]
    pub const fn test_size(&self) -> f64 {
        self.test_size
    }

    /// Split seed.
    #[must_use]
    pub const fn split_seed(&self) -> u64 {
        self.split_seed
    }

    /// Whether the split is stratified.
    #[must_use]
    pub const fn stratify(&self) -> bool {
        self.stratify
    }

    /// Bars in the importance chart.
    #[must_use]
    pub const fn top_k_features(&self) -> usize {
        self.top_k_features
    }

    /// Run tags.
    #[must_use]
    pub const fn tags(&self) -> &BTreeMap<String, String> {
        &self.tags
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        move |key: &str| map.get(key).cloned()
    }

    #[test]
    fn test_defaults_match_demo() {
        let config = PipelineConfig::default();
        assert_eq!(config.tracking_dir(), Path::new("mlruns"));
        assert_eq!(config.experiment_name(), "demo-mlflow-artifacts");
        assert_eq!(config.forest().n_estimators, 100);
        assert_eq!(config.forest().max_depth, Some(5));
        assert_eq!(config.forest().min_samples_leaf, 2);
        assert_eq!(config.forest().seed, 42);
        assert_eq!(config.tags()["owner"], "demo");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_env_overrides() {
        let config = PipelineConfig::from_lookup(lookup(&[
            (TRACKING_DIR_ENV, "/tmp/runs"),
            (EXPERIMENT_ENV, "other"),
        ]))
        .unwrap();
        assert_eq!(config.tracking_dir(), Path::new("/tmp/runs"));
        assert_eq!(config.experiment_name(), "other");
    }

    #[test]
    fn test_empty_override_ignored() {
        let config = PipelineConfig::from_lookup(lookup(&[(EXPERIMENT_ENV, "")])).unwrap();
        assert_eq!(config.experiment_name(), DEFAULT_EXPERIMENT);
    }

    #[test]
    fn test_config_file_partial() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        fs::write(&path, r#"{"run_name": "short", "top_k_features": 5}"#).unwrap();

        let config = PipelineConfig::from_lookup(lookup(&[
            (CONFIG_ENV, path.to_str().unwrap()),
            (EXPERIMENT_ENV, "from-env"),
        ]))
        .unwrap();
        assert_eq!(config.run_name(), "short");
        assert_eq!(config.top_k_features(), 5);
        assert_eq!(config.experiment_name(), "from-env");
        assert_eq!(config.forest().n_estimators, 100);
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        assert!(PipelineConfig::default().with_test_size(0.0).validate().is_err());
        assert!(PipelineConfig::default().with_test_size(1.0).validate().is_err());
        assert!(PipelineConfig::default().with_top_k_features(0).validate().is_err());
        let forest = ForestParams::default().n_estimators(0);
        assert!(PipelineConfig::default().with_forest(forest).validate().is_err());
    }
}
