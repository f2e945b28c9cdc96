//! Classification metrics
//!
//! Accuracy, per-class precision/recall/F1, macro and support-weighted averages, and
//! confusion matrices over class indices. Undefined ratios (zero denominators) are 0.
//! Macro averages run over the classes present in either the truth or the predictions.

use serde::{Deserialize, Serialize};

/// Precision, recall, F1 and support for one class
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ClassScores {
    pub precision: f64,
    pub recall: f64,
    pub f1: f64,
    pub support: usize,
}

/// `matrix[actual][predicted]`
pub fn confusion_matrix(y_true: &[usize], y_pred: &[usize], n_classes: usize) -> Vec<Vec<usize>> {
    let mut matrix = vec![vec![0usize; n_classes]; n_classes];
    for (&t, &p) in y_true.iter().zip(y_pred) {
        if t < n_classes && p < n_classes {
            matrix[t][p] += 1;
        }
    }
    matrix
}

pub fn accuracy(y_true: &[usize], y_pred: &[usize]) -> f64 {
    if y_true.is_empty() {
        return 0.0;
    }
    let correct = y_true.iter().zip(y_pred).filter(|(t, p)| t == p).count();
    correct as f64 / y_true.len() as f64
}

fn ratio(num: usize, den: usize) -> f64 {
    if den == 0 {
        0.0
    } else {
        num as f64 / den as f64
    }
}

/// Per-class scores
pub fn class_scores(y_true: &[usize], y_pred: &[usize], n_classes: usize) -> Vec<ClassScores> {
    let matrix = confusion_matrix(y_true, y_pred, n_classes);
    (0..n_classes)
        .map(|c| {
            let tp = matrix[c][c];
            let predicted: usize = (0..n_classes).map(|r| matrix[r][c]).sum();
            let support: usize = matrix[c].iter().sum();
            let precision = ratio(tp, predicted);
            let recall = ratio(tp, support);
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
        })
        .collect()
}

/// Classes that occur in the truth or the predictions
fn present_classes(y_true: &[usize], y_pred: &[usize], n_classes: usize) -> Vec<usize> {
    (0..n_classes)
        .filter(|c| y_true.contains(c) || y_pred.contains(c))
        .collect()
}

/// Macro averages `(precision, recall, f1)`
pub fn macro_average(y_true: &[usize], y_pred: &[usize], n_classes: usize) -> (f64, f64, f64) {
    let scores = class_scores(y_true, y_pred, n_classes);
    let present = present_classes(y_true, y_pred, n_classes);
    if present.is_empty() {
        return (0.0, 0.0, 0.0);
    }
    let k = present.len() as f64;
    let sum = |f: fn(&ClassScores) -> f64| present.iter().map(|&c| f(&scores[c])).sum::<f64>() / k;
    (sum(|s| s.precision), sum(|s| s.recall), sum(|s| s.f1))
}

/// F1 averaged with class support as weights
pub fn weighted_f1(y_true: &[usize], y_pred: &[usize], n_classes: usize) -> f64 {
    let scores = class_scores(y_true, y_pred, n_classes);
    let total: usize = scores.iter().map(|s| s.support).sum();
    if total == 0 {
        return 0.0;
    }
    scores.iter().map(|s| s.f1 * s.support as f64).sum::<f64>() / total as f64
}

/// Shannon entropy (nats) of a probability vector
pub fn entropy(probabilities: &[f64]) -> f64 {
    -probabilities.iter().map(|p| p * (p + 1e-15).ln()).sum::<f64>()
}

/// Mean and population standard deviation
pub fn mean_std(values: &[f64]) -> (f64, f64) {
    if values.is_empty() {
        return (0.0, 0.0);
    }
    let n = values.len() as f64;
    let mean = values.iter().sum::<f64>() / n;
    let var = values.iter().map(|v| (v - mean) * (v - mean)).sum::<f64>() / n;
    (mean, var.sqrt())
}
