//! Binary classification metrics
//!
//! All functions take labels in {0, 1}. Probabilities/scores are for class 1.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::{Error, Result};

fn check_lengths(a: usize, b: usize, what: &str) -> Result<()> {
    if a == 0 {
        return Err(Error::InvalidInput(format!("{what}: empty input")));
    }
    if a != b {
        return Err(Error::InvalidInput(format!(
            "{what}: {a} labels but {b} predictions"
        )));
    }
    Ok(())
}

/// Fraction of predictions equal to the true label.
///
/// # Errors
///
/// Returns `Error::InvalidInput` for empty or mismatched inputs.
#[allow(clippy::cast_precision_loss)]
pub fn accuracy(y_true: &[u8], y_pred: &[u8]) -> Result<f64> {
    check_lengths(y_true.len(), y_pred.len(), "accuracy")?;
    let correct = y_true.iter().zip(y_pred).filter(|(t, p)| t == p).count();
    Ok(correct as f64 / y_true.len() as f64)
}

/// Area under the ROC curve, computed as the normalised Mann-Whitney U
/// statistic with average ranks for tied scores.
///
/// # Errors
///
/// Returns `Error::InvalidInput` for empty or mismatched inputs, or when only
/// one class is present.
#[allow(clippy::cast_precision_loss)]
pub fn roc_auc(y_true: &[u8], scores: &[f64]) -> Result<f64> {
    check_lengths(y_true.len(), scores.len(), "roc_auc")?;
    let (n_pos, n_neg) = class_totals(y_true)?;

    let mut order: Vec<usize> = (0..scores.len()).collect();
    order.sort_by(|&a, &b| scores[a].total_cmp(&scores[b]));

    let mut pos_rank_sum = 0.0;
    let mut i = 0;
    while i < order.len() {
        let mut j = i;
        while j + 1 < order.len() && scores[order[j + 1]] == scores[order[i]] {
            j += 1;
        }
        // Ranks are 1-based; tied block i..=j shares the mean rank.
        let avg_rank = (i + j) as f64 / 2.0 + 1.0;
        for &k in &order[i..=j] {
            if y_true[k] == 1 {
                pos_rank_sum += avg_rank;
            }
        }
        i = j + 1;
    }

    let (p, n) = (n_pos as f64, n_neg as f64);
    Ok((pos_rank_sum - p * (p + 1.0) / 2.0) / (p * n))
}

/// Points of the ROC curve.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RocCurve {
    /// False positive rate per threshold
    pub fpr: Vec<f64>,
    /// True positive rate per threshold
    pub tpr: Vec<f64>,
    /// Decreasing score thresholds; the first is `+inf` for the (0, 0) point
    pub thresholds: Vec<f64>,
}

/// Compute the ROC curve, one point per distinct score plus the origin.
///
/// # Errors
///
/// Same conditions as [`roc_auc`].
#[allow(clippy::cast_precision_loss)]
pub fn roc_curve(y_true: &[u8], scores: &[f64]) -> Result<RocCurve> {
    check_lengths(y_true.len(), scores.len(), "roc_curve")?;
    let (n_pos, n_neg) = class_totals(y_true)?;

    let mut order: Vec<usize> = (0..scores.len()).collect();
    order.sort_by(|&a, &b| scores[b].total_cmp(&scores[a]));

    let mut curve = RocCurve {
        fpr: vec![0.0],
        tpr: vec![0.0],
        thresholds: vec![f64::INFINITY],
    };
    let (mut tp, mut fp) = (0usize, 0usize);
    for (pos, &idx) in order.iter().enumerate() {
        if y_true[idx] == 1 {
            tp += 1;
        } else {
            fp += 1;
        }
        let last_of_threshold = order
            .get(pos + 1)
            .map_or(true, |&next| scores[next] != scores[idx]);
        if last_of_threshold {
            curve.fpr.push(fp as f64 / n_neg as f64);
            curve.tpr.push(tp as f64 / n_pos as f64);
            curve.thresholds.push(scores[idx]);
        }
    }
    Ok(curve)
}

fn class_totals(y_true: &[u8]) -> Result<(usize, usize)> {
    let n_pos = y_true.iter().filter(|&&l| l == 1).count();
    let n_neg = y_true.len() - n_pos;
    if n_pos == 0 || n_neg == 0 {
        return Err(Error::InvalidInput(
            "ROC requires both classes in y_true".to_string(),
        ));
    }
    Ok((n_pos, n_neg))
}

/// 2 × 2 confusion matrix, rows = true class, columns = predicted class:
/// `[[tn, fp], [fn, tp]]`.
///
/// # Errors
///
/// Returns `Error::InvalidInput` for empty or mismatched inputs.
pub fn confusion_matrix(y_true: &[u8], y_pred: &[u8]) -> Result<[[usize; 2]; 2]> {
    check_lengths(y_true.len(), y_pred.len(), "confusion_matrix")?;
    let mut cm = [[0usize; 2]; 2];
    for (&t, &p) in y_true.iter().zip(y_pred) {
        cm[usize::from(t.min(1))][usize::from(p.min(1))] += 1;
    }
    Ok(cm)
}

/// Precision, recall, F1 and support for one class or one average.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ClassScores {
    /// TP / (TP + FP), 0 when nothing was predicted
    pub precision: f64,
    /// TP / (TP + FN), 0 when the class is absent
    pub recall: f64,
    /// Harmonic mean of precision and recall
    pub f1: f64,
    /// Number of true rows of the class
    pub support: usize,
}

/// Per-class scores plus accuracy and averages.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassificationReport {
    /// Scores for class 0 and class 1
    pub classes: [ClassScores; 2],
    /// Overall accuracy
    pub accuracy: f64,
    /// Unweighted mean of the class scores
    pub macro_avg: ClassScores,
    /// Support-weighted mean of the class scores
    pub weighted_avg: ClassScores,
}

/// Build a [`ClassificationReport`]; its `Display` form is the text artifact.
///
/// # Errors
///
/// Returns `Error::InvalidInput` for empty or mismatched inputs.
#[allow(clippy::cast_precision_loss)]
pub fn classification_report(y_true: &[u8], y_pred: &[u8]) -> Result<ClassificationReport> {
    let cm = confusion_matrix(y_true, y_pred)?;
    let total = y_true.len();

    let score = |class: usize| {
        let other = 1 - class;
        let tp = cm[class][class] as f64;
        let predicted = tp + cm[other][class] as f64;
        let support = cm[class][0] + cm[class][1];
        let precision = if predicted > 0.0 { tp / predicted } else { 0.0 };
        let recall = if support > 0 { tp / support as f64 } else { 0.0 };
        let f1 = if precision + recall > 0.0 {
            2.0 * precision * recall / (precision + recall)
        } else {
            0.0
        };
        ClassScores {
            precision,
            recall,
            f1,
            support,
        }
    };
    let classes = [score(0), score(1)];

    let macro_avg = ClassScores {
        precision: (classes[0].precision + classes[1].precision) / 2.0,
        recall: (classes[0].recall + classes[1].recall) / 2.0,
        f1: (classes[0].f1 + classes[1].f1) / 2.0,
        support: total,
    };
    let weight = |c: &ClassScores| c.support as f64 / total as f64;
    let weighted_avg = ClassScores {
        precision: classes.iter().map(|c| c.precision * weight(c)).sum(),
        recall: classes.iter().map(|c| c.recall * weight(c)).sum(),
        f1: classes.iter().map(|c| c.f1 * weight(c)).sum(),
        support: total,
    };

    Ok(ClassificationReport {
        classes,
        accuracy: (cm[0][0] + cm[1][1]) as f64 / total as f64,
        macro_avg,
        weighted_avg,
    })
}

impl fmt::Display for ClassificationReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let row = |f: &mut fmt::Formatter<'_>, name: &str, s: &ClassScores| {
            writeln!(
                f,
                "{name:>12}  {:>9.2} {:>9.2} {:>9.2} {:>9}",
                s.precision, s.recall, s.f1, s.support
            )
        };

        writeln!(
            f,
            "{:>12}  {:>9} {:>9} {:>9} {:>9}",
            "", "precision", "recall", "f1-score", "support"
        )?;
        writeln!(f)?;
        for (label, scores) in self.classes.iter().enumerate() {
            row(f, &label.to_string(), scores)?;
        }
        writeln!(f)?;
        writeln!(
            f,
            "{:>12}  {:>9} {:>9} {:>9.2} {:>9}",
            "accuracy", "", "", self.accuracy, self.macro_avg.support
        )?;
        row(f, "macro avg", &self.macro_avg)?;
        row(f, "weighted avg", &self.weighted_avg)
    }
}
