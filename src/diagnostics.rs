//! Evaluation of a fitted classifier and the files logged with each run

use std::fs;
use std::path::{Path, PathBuf};

use serde::Serialize;
use tracing::debug;

use crate::metrics::{self, ClassificationReport, RocCurve};
use crate::plot;
use crate::Result;

/// Artifact directory for the three charts.
pub const PLOTS_DIR: &str = "plots";
/// Artifact directory for the text report.
pub const REPORTS_DIR: &str = "reports";
/// Confusion matrix heatmap file name.
pub const CONFUSION_MATRIX_FILE: &str = "confusion_matrix.svg";
/// ROC curve file name.
pub const ROC_CURVE_FILE: &str = "roc_curve.svg";
/// Feature importance chart file name.
pub const FEATURE_IMPORTANCE_FILE: &str = "feature_importance.svg";
/// Classification report file name.
pub const REPORT_FILE: &str = "classification_report.txt";

/// Relative artifact paths every successful run ends up with.
pub const ARTIFACT_PATHS: [&str; 4] = [
    "plots/confusion_matrix.svg",
    "plots/roc_curve.svg",
    "plots/feature_importance.svg",
    "reports/classification_report.txt",
];

/// Scores of a classifier on held-out rows.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Evaluation {
    /// Fraction of correct hard predictions
    pub accuracy: f64,
    /// Area under the ROC curve of the class-1 scores
    pub roc_auc: f64,
    /// `[[tn, fp], [fn, tp]]`
    pub confusion: [[usize; 2]; 2],
    /// ROC curve points
    pub roc: RocCurve,
    /// Per-class precision, recall and F1
    pub report: ClassificationReport,
}

impl Evaluation {
    /// Score hard predictions and class-1 probabilities against labels.
    ///
    /// # Errors
    ///
    /// `Error::InvalidInput` for empty or mismatched inputs, or when
    /// `y_true` holds a single class.
    pub fn compute(y_true: &[u8], y_pred: &[u8], scores: &[f64]) -> Result<Self> {
        Ok(Self {
            accuracy: metrics::accuracy(y_true, y_pred)?,
            roc_auc: metrics::roc_auc(y_true, scores)?,
            confusion: metrics::confusion_matrix(y_true, y_pred)?,
            roc: metrics::roc_curve(y_true, scores)?,
            report: metrics::classification_report(y_true, y_pred)?,
        })
    }
}

/// A file written by [`render`], waiting to be logged.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedArtifact {
    /// Where the file was written
    pub local_path: PathBuf,
    /// Artifact directory it belongs in
    pub artifact_dir: &'static str,
}

/// Write the three charts and the text report under `dir`.
///
/// Files are written flat into `dir`; each carries the artifact directory it
/// is logged to.
///
/// # Errors
///
/// Plot and IO errors.
pub fn render(
    dir: &Path,
    evaluation: &Evaluation,
    importances: &[f64],
    top_k: usize,
) -> Result<Vec<RenderedArtifact>> {
    let mut rendered = Vec::with_capacity(ARTIFACT_PATHS.len());

    let path = dir.join(CONFUSION_MATRIX_FILE);
    plot::write_svg(&path, &plot::confusion_matrix_svg(&evaluation.confusion, "Confusion Matrix")?)?;
    rendered.push(RenderedArtifact {
        local_path: path,
        artifact_dir: PLOTS_DIR,
    });

    let path = dir.join(ROC_CURVE_FILE);
    plot::write_svg(&path, &plot::roc_curve_svg(&evaluation.roc, evaluation.roc_auc)?)?;
    rendered.push(RenderedArtifact {
        local_path: path,
        artifact_dir: PLOTS_DIR,
    });

    let path = dir.join(FEATURE_IMPORTANCE_FILE);
    plot::write_svg(&path, &plot::feature_importance_svg(importances, top_k)?)?;
    rendered.push(RenderedArtifact {
        local_path: path,
        artifact_dir: PLOTS_DIR,
    });

    let path = dir.join(REPORT_FILE);
    fs::write(&path, evaluation.report.to_string())?;
    rendered.push(RenderedArtifact {
        local_path: path,
        artifact_dir: REPORTS_DIR,
    });

    debug!(dir = %dir.display(), files = rendered.len(), "rendered diagnostics");
    Ok(rendered)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Error;

    fn evaluation() -> Evaluation {
        let y_true = [0, 0, 1, 1, 1, 0];
        let y_pred = [0, 1, 1, 1, 0, 0];
        let scores = [0.1, 0.6, 0.8, 0.9, 0.4, 0.2];
        Evaluation::compute(&y_true, &y_pred, &scores).unwrap()
    }

    #[test]
    fn test_compute() {
        let eval = evaluation();
        assert!((eval.accuracy - 4.0 / 6.0).abs() < 1e-12);
        assert!((eval.roc_auc - 8.0 / 9.0).abs() < 1e-12);
        assert_eq!(eval.confusion, [[2, 1], [1, 2]]);
        assert_eq!(eval.report.classes[1].support, 3);
    }

    #[test]
    fn test_compute_single_class() {
        let err = Evaluation::compute(&[1, 1], &[1, 1], &[0.9, 0.8]).unwrap_err();
        assert!(matches!(err, Error::InvalidInput(_)));
    }

    #[test]
    fn test_render_writes_all_files() {
        let dir = tempfile::tempdir().unwrap();
        let importances = [0.1, 0.4, 0.2, 0.3];
        let rendered = render(dir.path(), &evaluation(), &importances, 12).unwrap();

        let logged: Vec<String> = rendered
            .iter()
            .map(|r| {
                assert!(r.local_path.is_file());
                let name = r.local_path.file_name().unwrap().to_string_lossy();
                format!("{}/{name}", r.artifact_dir)
            })
            .collect();
        assert_eq!(logged, ARTIFACT_PATHS);

        let report = fs::read_to_string(dir.path().join(REPORT_FILE)).unwrap();
        assert!(report.contains("precision"));
        let roc = fs::read_to_string(dir.path().join(ROC_CURVE_FILE)).unwrap();
        assert!(roc.contains("ROC Curve (AUC=0.889)"));
    }
}
