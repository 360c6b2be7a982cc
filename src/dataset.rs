//! Dataset loading and train/test splitting
//!
//! The built-in dataset is a fixed 569 × 30 binary classification table with
//! the class balance of the classic breast-cancer diagnostic set (212 negative,
//! 357 positive). It is produced by a fixed-seed generator, so every call
//! returns the same values.

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};

use crate::{Error, Result};

/// Number of rows in the built-in dataset.
pub const BUILTIN_SAMPLES: usize = 569;
/// Number of feature columns in the built-in dataset.
pub const BUILTIN_FEATURES: usize = 30;
/// Rows labelled 0 in the built-in dataset.
pub const BUILTIN_NEGATIVES: usize = 212;

const BUILTIN_SEED: u64 = 0x0569_0030;

// Per-column scale of the "mean" block; the "error" and "worst" blocks are
// derived from it.
const BASE_SCALE: [f64; 10] = [
    14.1, 19.3, 92.0, 655.0, 0.096, 0.104, 0.089, 0.049, 0.181, 0.063,
];
// How strongly each "mean" column follows the latent class signal.
const LOADING: [f64; 10] = [0.9, 0.35, 0.92, 0.88, 0.3, 0.6, 0.8, 0.95, 0.25, 0.05];

/// In-memory tabular dataset with binary labels.
#[derive(Debug, Clone, PartialEq)]
pub struct Dataset {
    features: Vec<Vec<f64>>,
    labels: Vec<u8>,
    feature_names: Vec<String>,
}

/// Train and test partitions produced by [`Dataset::train_test_split`].
#[derive(Debug, Clone)]
pub struct Split {
    /// Training partition
    pub train: Dataset,
    /// Held-out partition
    pub test: Dataset,
}

impl Dataset {
    /// Create a dataset from row-major features and labels.
    ///
    /// # Errors
    ///
    /// Returns `Error::InvalidDataset` if the table is empty or ragged, if the
    /// label count differs from the row count, if a label is not 0 or 1, if a
    /// value is not finite, or if the name count differs from the column count.
    pub fn new(
        features: Vec<Vec<f64>>,
        labels: Vec<u8>,
        feature_names: Vec<String>,
    ) -> Result<Self> {
        if features.is_empty() {
            return Err(Error::InvalidDataset("no rows".to_string()));
        }
        let width = features[0].len();
        if width == 0 {
            return Err(Error::InvalidDataset("no feature columns".to_string()));
        }
        if let Some((i, row)) = features.iter().enumerate().find(|(_, r)| r.len() != width) {
            return Err(Error::InvalidDataset(format!(
                "row {i} has {} columns, expected {width}",
                row.len()
            )));
        }
        if labels.len() != features.len() {
            return Err(Error::InvalidDataset(format!(
                "{} labels for {} rows",
                labels.len(),
                features.len()
            )));
        }
        if let Some(bad) = labels.iter().find(|&&l| l > 1) {
            return Err(Error::InvalidDataset(format!("label {bad} is not binary")));
        }
        if features.iter().flatten().any(|v| !v.is_finite()) {
            return Err(Error::InvalidDataset("non-finite feature value".to_string()));
        }
        if feature_names.len() != width {
            return Err(Error::InvalidDataset(format!(
                "{} feature names for {width} columns",
                feature_names.len()
            )));
        }
        Ok(Self {
            features,
            labels,
            feature_names,
        })
    }

    /// Load the fixed built-in dataset.
    #[must_use]
    pub fn builtin() -> Self {
        let mut rng = StdRng::seed_from_u64(BUILTIN_SEED);

        let mut labels: Vec<u8> = std::iter::repeat(0)
            .take(BUILTIN_NEGATIVES)
            .chain(std::iter::repeat(1).take(BUILTIN_SAMPLES - BUILTIN_NEGATIVES))
            .collect();
        labels.shuffle(&mut rng);

        let features = labels
            .iter()
            .map(|&label| builtin_row(label, &mut rng))
            .collect();

        Self {
            features,
            labels,
            feature_names: (0..BUILTIN_FEATURES).map(|i| format!("f{i}")).collect(),
        }
    }

    /// Number of rows.
    #[must_use]
    pub fn n_samples(&self) -> usize {
        self.labels.len()
    }

    /// Number of feature columns.
    #[must_use]
    pub fn n_features(&self) -> usize {
        self.feature_names.len()
    }

    /// Row-major feature matrix.
    #[must_use]
    pub fn features(&self) -> &[Vec<f64>] {
        &self.features
    }

    /// Label vector.
    #[must_use]
    pub fn labels(&self) -> &[u8] {
        &self.labels
    }

    /// Column names.
    #[must_use]
    pub fn feature_names(&self) -> &[String] {
        &self.feature_names
    }

    /// Row counts for class 0 and class 1.
    #[must_use]
    pub fn class_counts(&self) -> [usize; 2] {
        let positives = self.labels.iter().filter(|&&l| l == 1).count();
        [self.labels.len() - positives, positives]
    }

    /// Rows selected by `indices`, in that order.
    #[must_use]
    pub fn subset(&self, indices: &[usize]) -> Self {
        Self {
            features: indices.iter().map(|&i| self.features[i].clone()).collect(),
            labels: indices.iter().map(|&i| self.labels[i]).collect(),
            feature_names: self.feature_names.clone(),
        }
    }

    /// Shuffle and partition rows into train and test sets.
    ///
    /// With `stratify`, each class contributes `round(test_size × count)` rows
    /// to the test set. Without it, the test set holds
    /// `ceil(test_size × n_samples)` rows. The same seed always yields the same
    /// partition.
    ///
    /// # Errors
    ///
    /// Returns `Error::InvalidParameter` if `test_size` is outside (0, 1) or
    /// if either partition would be empty.
    pub fn train_test_split(&self, test_size: f64, seed: u64, stratify: bool) -> Result<Split> {
        if !(test_size > 0.0 && test_size < 1.0) {
            return Err(Error::InvalidParameter(format!(
                "test_size must be in (0, 1), got {test_size}"
            )));
        }
        let mut rng = StdRng::seed_from_u64(seed);

        let (mut train_idx, mut test_idx) = if stratify {
            let mut train = Vec::new();
            let mut test = Vec::new();
            for class in 0..=1u8 {
                let mut members: Vec<usize> = (0..self.n_samples())
                    .filter(|&i| self.labels[i] == class)
                    .collect();
                members.shuffle(&mut rng);
                let n_test = class_test_count(members.len(), test_size);
                test.extend_from_slice(&members[..n_test]);
                train.extend_from_slice(&members[n_test..]);
            }
            (train, test)
        } else {
            let mut all: Vec<usize> = (0..self.n_samples()).collect();
            all.shuffle(&mut rng);
            #[allow(clippy::cast_precision_loss, clippy::cast_sign_loss, clippy::cast_possible_truncation)]
            let n_test = (test_size * self.n_samples() as f64).ceil() as usize;
            let n_test = n_test.min(all.len());
            let train = all.split_off(n_test);
            (train, all)
        };

        if train_idx.is_empty() || test_idx.is_empty() {
            return Err(Error::InvalidParameter(format!(
                "test_size {test_size} leaves an empty partition for {} rows",
                self.n_samples()
            )));
        }

        train_idx.shuffle(&mut rng);
        test_idx.shuffle(&mut rng);

        Ok(Split {
            train: self.subset(&train_idx),
            test: self.subset(&test_idx),
        })
    }
}

#[allow(clippy::cast_precision_loss, clippy::cast_sign_loss, clippy::cast_possible_truncation)]
fn class_test_count(count: usize, test_size: f64) -> usize {
    ((test_size * count as f64).round() as usize).min(count)
}

/// Draw from N(0, 1) via Box-Muller.
fn standard_normal(rng: &mut StdRng) -> f64 {
    let u1: f64 = rng.gen_range(f64::EPSILON..1.0);
    let u2: f64 = rng.gen();
    (-2.0 * u1.ln()).sqrt() * (2.0 * std::f64::consts::PI * u2).cos()
}

fn builtin_row(label: u8, rng: &mut StdRng) -> Vec<f64> {
    // Negative rows sit high on the latent axis, positive rows low.
    let latent = standard_normal(rng) + if label == 0 { 1.8 } else { -1.1 };

    let mut row = Vec::with_capacity(BUILTIN_FEATURES);
    for (scale, loading) in BASE_SCALE.iter().zip(LOADING) {
        let noise = standard_normal(rng);
        row.push(scale * (1.0 + 0.22 * loading * latent + 0.12 * noise).max(0.05));
    }
    for (scale, loading) in BASE_SCALE.iter().zip(LOADING) {
        let noise = standard_normal(rng);
        let error_scale = scale * 0.08;
        row.push(error_scale * (1.0 + 0.3 * loading * latent + 0.35 * noise).max(0.05));
    }
    for mean in row[..10].to_vec() {
        let noise = standard_normal(rng);
        row.push(mean * (1.18 + 0.06 * noise).max(1.0));
    }
    row
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtin_shape() {
        let ds = Dataset::builtin();
        assert_eq!(ds.n_samples(), BUILTIN_SAMPLES);
        assert_eq!(ds.n_features(), BUILTIN_FEATURES);
        assert_eq!(ds.class_counts(), [212, 357]);
        assert_eq!(ds.feature_names()[7], "f7");
        assert!(ds.features().iter().flatten().all(|v| v.is_finite() && *v > 0.0));
    }

    #[test]
    fn test_builtin_is_fixed() {
        assert_eq!(Dataset::builtin(), Dataset::builtin());
    }

    #[test]
    fn test_new_rejects_ragged_rows() {
        let err = Dataset::new(
            vec![vec![1.0, 2.0], vec![3.0]],
            vec![0, 1],
            vec!["a".into(), "b".into()],
        )
        .unwrap_err();
        assert!(matches!(err, Error::InvalidDataset(_)));
    }

    #[test]
    fn test_new_rejects_non_binary_label() {
        let err = Dataset::new(vec![vec![1.0]], vec![2], vec!["a".into()]).unwrap_err();
        assert!(err.to_string().contains("not binary"));
    }

    #[test]
    fn test_new_rejects_nan() {
        let err = Dataset::new(vec![vec![f64::NAN]], vec![0], vec!["a".into()]).unwrap_err();
        assert!(matches!(err, Error::InvalidDataset(_)));
    }

    #[test]
    fn test_stratified_split_sizes() {
        let ds = Dataset::builtin();
        let split = ds.train_test_split(0.2, 42, true).unwrap();
        // round(0.2 * 212) = 42, round(0.2 * 357) = 71
        assert_eq!(split.test.class_counts(), [42, 71]);
        assert_eq!(split.train.class_counts(), [170, 286]);
        assert_eq!(split.train.n_samples() + split.test.n_samples(), ds.n_samples());
    }

    #[test]
    fn test_unstratified_split_sizes() {
        let ds = Dataset::builtin();
        let split = ds.train_test_split(0.2, 7, false).unwrap();
        assert_eq!(split.test.n_samples(), 114);
        assert_eq!(split.train.n_samples(), 455);
    }

    #[test]
    fn test_split_is_deterministic() {
        let ds = Dataset::builtin();
        let a = ds.train_test_split(0.2, 42, true).unwrap();
        let b = ds.train_test_split(0.2, 42, true).unwrap();
        assert_eq!(a.test, b.test);
        let c = ds.train_test_split(0.2, 43, true).unwrap();
        assert_ne!(a.test, c.test);
    }

    #[test]
    fn test_split_rejects_bad_test_size() {
        let ds = Dataset::builtin();
        assert!(ds.train_test_split(0.0, 1, true).is_err());
        assert!(ds.train_test_split(1.0, 1, false).is_err());
    }
}
