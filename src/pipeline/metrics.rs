//! Binary classification metrics used for scoring and reporting

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{ChurnError, Result};

/// Metric name -> value, attached to persisted artifacts.
pub type MetricsRecord = BTreeMap<String, f64>;

/// Scorers available to the hyperparameter search.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Metric {
    Accuracy,
    F1,
    RocAuc,
}

impl Metric {
    /// The scorers every candidate is evaluated on, in report order.
    pub const ALL: [Metric; 3] = [Metric::Accuracy, Metric::F1, Metric::RocAuc];

    pub fn name(&self) -> &'static str {
        match self {
            Metric::Accuracy => "accuracy",
            Metric::F1 => "f1",
            Metric::RocAuc => "roc_auc",
        }
    }

    /// Score one fold. Undefined scores (ROC-AUC on a single-class fold) are NaN.
    pub fn score(&self, y_true: &[f64], y_pred: &[u8], y_score: &[f64]) -> f64 {
        match self {
            Metric::Accuracy => accuracy_score(y_true, y_pred),
            Metric::F1 => f1_score(y_true, y_pred),
            Metric::RocAuc => roc_auc_score(y_true, y_score).unwrap_or(f64::NAN),
        }
    }
}

impl fmt::Display for Metric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl std::str::FromStr for Metric {
    type Err = ChurnError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "accuracy" => Ok(Metric::Accuracy),
            "f1" => Ok(Metric::F1),
            "roc_auc" => Ok(Metric::RocAuc),
            other => Err(ChurnError::Config(format!(
                "Unknown metric '{}'. Supported: accuracy, f1, roc_auc",
                other
            ))),
        }
    }
}

fn is_positive(y: f64) -> bool {
    y >= 0.5
}

/// Fraction of predictions equal to the true label.
pub fn accuracy_score(y_true: &[f64], y_pred: &[u8]) -> f64 {
    if y_true.is_empty() {
        return 0.0;
    }
    let correct = y_true
        .iter()
        .zip(y_pred.iter())
        .filter(|(&t, &p)| is_positive(t) == (p == 1))
        .count();
    correct as f64 / y_true.len() as f64
}

/// F1 of the positive class. Zero when there are no true or predicted positives.
pub fn f1_score(y_true: &[f64], y_pred: &[u8]) -> f64 {
    let mut tp = 0usize;
    let mut fp = 0usize;
    let mut fn_ = 0usize;

    for (&t, &p) in y_true.iter().zip(y_pred.iter()) {
        match (is_positive(t), p == 1) {
            (true, true) => tp += 1,
            (false, true) => fp += 1,
            (true, false) => fn_ += 1,
            (false, false) => {}
        }
    }

    let denom = 2 * tp + fp + fn_;
    if denom == 0 {
        0.0
    } else {
        (2 * tp) as f64 / denom as f64
    }
}

/// Area under the ROC curve via the Mann-Whitney U statistic.
///
/// Tied scores share their average rank. Returns `None` when only one class is
/// present, where the curve is undefined.
pub fn roc_auc_score(y_true: &[f64], y_score: &[f64]) -> Option<f64> {
    if y_true.len() != y_score.len() || y_true.is_empty() {
        return None;
    }

    let mut pairs: Vec<(f64, bool)> = y_score
        .iter()
        .copied()
        .zip(y_true.iter().map(|&t| is_positive(t)))
        .collect();
    pairs.sort_by(|a, b| a.0.partial_cmp(&b.0).unwrap_or(std::cmp::Ordering::Equal));

    let total_pos = pairs.iter().filter(|(_, t)| *t).count() as f64;
    let total_neg = pairs.len() as f64 - total_pos;
    if total_pos == 0.0 || total_neg == 0.0 {
        return None;
    }

    let n = pairs.len();
    let mut rank_sum_pos = 0.0;
    let mut i = 0;
    while i < n {
        let mut j = i;
        while j < n && pairs[j].0 == pairs[i].0 {
            j += 1;
        }
        // Ranks i+1..=j share their mean
        let avg_rank = (i + 1 + j) as f64 / 2.0;
        let pos_in_group = pairs[i..j].iter().filter(|(_, t)| *t).count() as f64;
        rank_sum_pos += avg_rank * pos_in_group;
        i = j;
    }

    let u = rank_sum_pos - total_pos * (total_pos + 1.0) / 2.0;
    Some(u / (total_pos * total_neg))
}

/// Accuracy, ROC-AUC and F1 for a held-out set, keyed as they are persisted.
pub fn evaluate(y_true: &[f64], y_pred: &[u8], y_score: &[f64]) -> Result<MetricsRecord> {
    if y_true.is_empty() {
        return Err(ChurnError::InvalidShape(
            "cannot compute metrics on an empty dataset".to_string(),
        ));
    }
    if y_true.len() != y_pred.len() || y_true.len() != y_score.len() {
        return Err(ChurnError::InvalidShape(format!(
            "metric inputs disagree in length: {} labels, {} predictions, {} scores",
            y_true.len(),
            y_pred.len(),
            y_score.len()
        )));
    }

    let roc_auc = roc_auc_score(y_true, y_score).ok_or_else(|| {
        ChurnError::InvalidInput(
            "ROC AUC is undefined when only one class is present in y_true".to_string(),
        )
    })?;

    let mut record = MetricsRecord::new();
    record.insert("accuracy".to_string(), accuracy_score(y_true, y_pred));
    record.insert("roc_auc_score".to_string(), roc_auc);
    record.insert("f1_score".to_string(), f1_score(y_true, y_pred));
    Ok(record)
}
