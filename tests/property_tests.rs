//! Property-based tests for mltrack
//!
//! - Metric ranges and symmetries
//! - Split partition invariants
//! - Tracking write policies
//! - Run with ProptestConfig::with_cases(100)

use mltrack::dataset::Dataset;
use mltrack::experiment::keys::{normalize_artifact_path, validate_key};
use mltrack::experiment::{MemoryStore, RunStatus, TrackingClient};
use mltrack::metrics::{accuracy, classification_report, confusion_matrix, roc_auc, roc_curve};
use mltrack::Error;
use proptest::prelude::*;

// ============================================================================
// Property Test Generators (Strategies)
// ============================================================================

/// Labels containing both classes, with matching scores
fn arb_scored_labels(max_len: usize) -> impl Strategy<Value = (Vec<u8>, Vec<f64>)> {
    (2..=max_len)
        .prop_flat_map(|n| {
            (
                proptest::collection::vec(0u8..=1, n),
                proptest::collection::vec(0.0f64..1.0, n),
            )
        })
        .prop_filter("needs both classes", |(labels, _)| {
            labels.contains(&0) && labels.contains(&1)
        })
}

/// Paired label/prediction vectors
fn arb_predictions(max_len: usize) -> impl Strategy<Value = (Vec<u8>, Vec<u8>)> {
    (1..=max_len).prop_flat_map(|n| {
        (
            proptest::collection::vec(0u8..=1, n),
            proptest::collection::vec(0u8..=1, n),
        )
    })
}

/// Small labelled dataset with at least two rows per class
fn arb_dataset() -> impl Strategy<Value = Dataset> {
    (4usize..60).prop_flat_map(|n| {
        (
            proptest::collection::vec(proptest::collection::vec(-10.0f64..10.0, 3), n),
            proptest::collection::vec(0u8..=1, n),
        )
            .prop_filter("needs two rows per class", |(_, labels)| {
                labels.iter().filter(|&&l| l == 0).count() >= 2
                    && labels.iter().filter(|&&l| l == 1).count() >= 2
            })
            .prop_map(|(rows, labels)| {
                let names = vec!["a".to_string(), "b".to_string(), "c".to_string()];
                Dataset::new(rows, labels, names).unwrap()
            })
    })
}

/// Keys made only of allowed characters
fn arb_valid_key() -> impl Strategy<Value = String> {
    "[a-zA-Z0-9_][a-zA-Z0-9_ .-]{0,40}".prop_filter("no '..'", |k| !k.contains(".."))
}

// ============================================================================
// Property Tests
// ============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(100))]

    // ========================================================================
    // Metric Properties
    // ========================================================================

    /// Property: accuracy lies in [0, 1]
    #[test]
    fn prop_accuracy_in_unit_interval((y_true, y_pred) in arb_predictions(200)) {
        let acc = accuracy(&y_true, &y_pred).unwrap();
        prop_assert!((0.0..=1.0).contains(&acc));
    }

    /// Property: accuracy equals the confusion-matrix diagonal share
    #[test]
    fn prop_accuracy_matches_confusion((y_true, y_pred) in arb_predictions(200)) {
        let cm = confusion_matrix(&y_true, &y_pred).unwrap();
        let total: usize = cm.iter().flatten().sum();
        prop_assert_eq!(total, y_true.len());
        let diag = (cm[0][0] + cm[1][1]) as f64 / total as f64;
        prop_assert!((accuracy(&y_true, &y_pred).unwrap() - diag).abs() < 1e-12);
    }

    /// Property: ROC AUC lies in [0, 1]
    #[test]
    fn prop_roc_auc_in_unit_interval((y_true, scores) in arb_scored_labels(200)) {
        let auc = roc_auc(&y_true, &scores).unwrap();
        prop_assert!((0.0..=1.0).contains(&auc), "auc = {}", auc);
    }

    /// Property: negating the scores mirrors the AUC
    #[test]
    fn prop_roc_auc_negation((y_true, scores) in arb_scored_labels(200)) {
        let negated: Vec<f64> = scores.iter().map(|s| -s).collect();
        let sum = roc_auc(&y_true, &scores).unwrap() + roc_auc(&y_true, &negated).unwrap();
        prop_assert!((sum - 1.0).abs() < 1e-9);
    }

    /// Property: ROC curve runs from (0, 0) to (1, 1) monotonically
    #[test]
    fn prop_roc_curve_monotonic((y_true, scores) in arb_scored_labels(200)) {
        let curve = roc_curve(&y_true, &scores).unwrap();
        prop_assert_eq!(curve.fpr.first().copied(), Some(0.0));
        prop_assert_eq!(curve.tpr.first().copied(), Some(0.0));
        prop_assert!((curve.fpr.last().copied().unwrap() - 1.0).abs() < 1e-12);
        prop_assert!((curve.tpr.last().copied().unwrap() - 1.0).abs() < 1e-12);
        for w in curve.fpr.windows(2) {
            prop_assert!(w[0] <= w[1]);
        }
        for w in curve.tpr.windows(2) {
            prop_assert!(w[0] <= w[1]);
        }
    }

    /// Property: report supports add up to the row count
    #[test]
    fn prop_report_support((y_true, y_pred) in arb_predictions(200)) {
        let report = classification_report(&y_true, &y_pred).unwrap();
        let support = report.classes[0].support + report.classes[1].support;
        prop_assert_eq!(support, y_true.len());
        for class in &report.classes {
            prop_assert!((0.0..=1.0).contains(&class.precision));
            prop_assert!((0.0..=1.0).contains(&class.recall));
            prop_assert!((0.0..=1.0).contains(&class.f1));
        }
    }

    // ========================================================================
    // Split Properties
    // ========================================================================

    /// Property: a split partitions the rows without loss
    #[test]
    fn prop_split_partitions_rows(
        data in arb_dataset(),
        test_size in 0.2f64..0.5,
        seed in any::<u64>(),
        stratify in any::<bool>()
    ) {
        match data.train_test_split(test_size, seed, stratify) {
            Ok(split) => {
                prop_assert_eq!(split.train.n_samples() + split.test.n_samples(), data.n_samples());
                let counts = data.class_counts();
                let train = split.train.class_counts();
                let test = split.test.class_counts();
                prop_assert_eq!(train[0] + test[0], counts[0]);
                prop_assert_eq!(train[1] + test[1], counts[1]);
            }
            Err(e) => prop_assert!(matches!(e, Error::InvalidParameter(_))),
        }
    }

    /// Property: the same seed gives the same split
    #[test]
    fn prop_split_deterministic(data in arb_dataset(), seed in any::<u64>()) {
        let a = data.train_test_split(0.3, seed, true);
        let b = data.train_test_split(0.3, seed, true);
        if let (Ok(a), Ok(b)) = (a, b) {
            prop_assert_eq!(a.test.features(), b.test.features());
            prop_assert_eq!(a.test.labels(), b.test.labels());
        }
    }

    // ========================================================================
    // Tracking Properties
    // ========================================================================

    /// Property: generated keys pass validation
    #[test]
    fn prop_valid_keys_accepted(key in arb_valid_key()) {
        prop_assert!(validate_key(&key).is_ok());
    }

    /// Property: normalised artifact paths never contain '..'
    #[test]
    fn prop_normalized_paths_stay_inside(path in "[a-z./\\\\]{0,30}") {
        if let Ok(normalized) = normalize_artifact_path(&path) {
            prop_assert!(!normalized.split('/').any(|p| p == ".."));
            prop_assert!(!normalized.starts_with('/'));
        }
    }

    /// Property: a param accepts its own value again and rejects any other
    #[test]
    fn prop_param_write_once(first in "[a-z0-9]{1,12}", second in "[a-z0-9]{1,12}") {
        let mut client = TrackingClient::new(MemoryStore::new());
        let exp = client.get_or_create_experiment("prop").unwrap();
        let mut run = client.start_run(exp.experiment_id(), None).unwrap();
        run.log_param("k", &first).unwrap();
        prop_assert!(run.log_param("k", &first).is_ok());
        let again = run.log_param("k", &second);
        if first == second {
            prop_assert!(again.is_ok());
        } else {
            prop_assert!(matches!(again, Err(Error::ParamConflict { .. })), "expected a param conflict");
        }
        let closed = run.finish().unwrap();
        prop_assert_eq!(closed.status(), RunStatus::Finished);
    }
}
