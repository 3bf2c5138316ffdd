//! Correlation-with-target feature selection

use polars::prelude::*;
use serde::{Deserialize, Serialize};

use super::Transformer;
use crate::data::frame::{numeric_values, require_columns};
use crate::error::{ChurnError, Result};

pub const DEFAULT_SELECTION_THRESHOLD: f64 = 0.1;

/// Keeps the columns whose absolute Pearson correlation with the target is at
/// least `threshold`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureSelector {
    threshold: f64,
    /// (column, |r|) per fitted column; `None` when the correlation is undefined
    scores: Vec<(String, Option<f64>)>,
    selected: Option<Vec<String>>,
}

impl Default for FeatureSelector {
    fn default() -> Self {
        Self::new(DEFAULT_SELECTION_THRESHOLD)
    }
}

impl FeatureSelector {
    pub fn new(threshold: f64) -> Self {
        Self {
            threshold,
            scores: Vec::new(),
            selected: None,
        }
    }

    pub fn threshold(&self) -> f64 {
        self.threshold
    }

    pub fn set_threshold(&mut self, threshold: f64) {
        self.threshold = threshold;
        self.scores.clear();
        self.selected = None;
    }

    /// Retained columns in input order.
    pub fn selected_features(&self) -> Option<&[String]> {
        self.selected.as_deref()
    }

    pub fn scores(&self) -> &[(String, Option<f64>)] {
        &self.scores
    }
}

/// Pearson correlation over rows where `x` is present.
///
/// `None` when fewer than two rows remain or either side has zero variance.
fn pearson_correlation(x: &[Option<f64>], y: &[f64]) -> Option<f64> {
    let pairs: Vec<(f64, f64)> = x
        .iter()
        .zip(y.iter())
        .filter_map(|(xv, &yv)| xv.map(|xv| (xv, yv)))
        .collect();

    let n = pairs.len();
    if n < 2 {
        return None;
    }

    let mean_x = pairs.iter().map(|(a, _)| a).sum::<f64>() / n as f64;
    let mean_y = pairs.iter().map(|(_, b)| b).sum::<f64>() / n as f64;

    let mut cov = 0.0;
    let mut var_x = 0.0;
    let mut var_y = 0.0;
    for (a, b) in &pairs {
        let dx = a - mean_x;
        let dy = b - mean_y;
        cov += dx * dy;
        var_x += dx * dx;
        var_y += dy * dy;
    }

    if var_x == 0.0 || var_y == 0.0 {
        return None;
    }

    let r = cov / (var_x.sqrt() * var_y.sqrt());
    if r.is_nan() {
        None
    } else {
        Some(r)
    }
}

impl Transformer for FeatureSelector {
    fn fit(&mut self, df: &DataFrame, target: Option<&[f64]>) -> Result<()> {
        let target = target.ok_or_else(|| {
            ChurnError::InvalidInput("FeatureSelector requires a target to fit".to_string())
        })?;

        // Type check every column before any arithmetic
        for column in df.get_columns() {
            if !column.dtype().is_primitive_numeric() {
                return Err(ChurnError::InvalidType {
                    column: column.name().to_string(),
                    expected: "numeric".to_string(),
                    actual: column.dtype().to_string(),
                });
            }
        }

        if df.width() > 0 && (df.height() == 0 || df.height() != target.len()) {
            return Err(ChurnError::InvalidShape(format!(
                "FeatureSelector got {} rows but {} target values",
                df.height(),
                target.len()
            )));
        }

        let mut scores = Vec::with_capacity(df.width());
        let mut selected = Vec::new();
        for column in df.get_columns() {
            let values = numeric_values(column)?;
            let score = pearson_correlation(&values, target).map(f64::abs);
            if matches!(score, Some(s) if s >= self.threshold) {
                selected.push(column.name().to_string());
            }
            scores.push((column.name().to_string(), score));
        }

        tracing::debug!(
            threshold = self.threshold,
            kept = selected.len(),
            total = scores.len(),
            "Feature selection fitted"
        );

        self.scores = scores;
        self.selected = Some(selected);
        Ok(())
    }

    fn transform(&self, df: &DataFrame) -> Result<DataFrame> {
        let selected = self
            .selected
            .as_ref()
            .ok_or(ChurnError::NotFitted("FeatureSelector"))?;
        let fitted: Vec<String> = self.scores.iter().map(|(name, _)| name.clone()).collect();
        require_columns(df, &fitted, "FeatureSelector")?;

        Ok(df.select(selected.iter().map(|s| s.as_str()))?)
    }

    fn is_fitted(&self) -> bool {
        self.selected.is_some()
    }
}
