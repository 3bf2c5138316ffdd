//! IQR-based outlier clipping

use polars::prelude::*;
use serde::{Deserialize, Serialize};

use super::Transformer;
use crate::data::frame::{ensure_non_empty, numeric_values, require_columns};
use crate::error::{ChurnError, Result};

/// Default multiple of the IQR added beyond the quartiles.
pub const DEFAULT_CLIP_FACTOR: f64 = 1.5;

/// Fitted bounds for a column
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClipBounds {
    pub column: String,
    #[serde(with = "crate::utils::serde_float")]
    pub lower: f64,
    #[serde(with = "crate::utils::serde_float")]
    pub upper: f64,
}

/// Clips every value into `[Q1 - factor * IQR, Q3 + factor * IQR]` of its column.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutlierClipper {
    factor: f64,
    bounds: Option<Vec<ClipBounds>>,
}

impl Default for OutlierClipper {
    fn default() -> Self {
        Self::new(DEFAULT_CLIP_FACTOR)
    }
}

impl OutlierClipper {
    pub fn new(factor: f64) -> Self {
        Self {
            factor,
            bounds: None,
        }
    }

    pub fn factor(&self) -> f64 {
        self.factor
    }

    /// Change the factor. Any learned bounds are discarded.
    pub fn set_factor(&mut self, factor: f64) {
        self.factor = factor;
        self.bounds = None;
    }

    /// Bounds learned by the last `fit`, in column order.
    pub fn bounds(&self) -> Option<&[ClipBounds]> {
        self.bounds.as_deref()
    }

    fn compute_bounds(&self, name: &str, values: &[Option<f64>]) -> ClipBounds {
        let mut sorted: Vec<f64> = values.iter().flatten().copied().collect();
        if sorted.is_empty() {
            // No observed values: nothing to clip against
            return ClipBounds {
                column: name.to_string(),
                lower: f64::NEG_INFINITY,
                upper: f64::INFINITY,
            };
        }
        sorted.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));

        let q1 = percentile(&sorted, 25.0);
        let q3 = percentile(&sorted, 75.0);
        let iqr = q3 - q1;

        ClipBounds {
            column: name.to_string(),
            lower: q1 - self.factor * iqr,
            upper: q3 + self.factor * iqr,
        }
    }
}

/// Percentile of sorted values, interpolating linearly between closest ranks.
pub fn percentile(sorted: &[f64], pct: f64) -> f64 {
    let n = sorted.len();
    if n == 1 {
        return sorted[0];
    }
    let rank = pct / 100.0 * (n - 1) as f64;
    let lo = rank.floor() as usize;
    let hi = rank.ceil() as usize;
    let frac = rank - lo as f64;
    sorted[lo] + frac * (sorted[hi] - sorted[lo])
}

impl Transformer for OutlierClipper {
    fn fit(&mut self, df: &DataFrame, _target: Option<&[f64]>) -> Result<()> {
        if !(self.factor >= 0.0) {
            return Err(ChurnError::InvalidParameter {
                name: "factor".to_string(),
                value: self.factor.to_string(),
                reason: "must be non-negative".to_string(),
            });
        }
        ensure_non_empty(df, "OutlierClipper")?;

        let mut bounds = Vec::with_capacity(df.width());
        for column in df.get_columns() {
            let values = numeric_values(column)?;
            bounds.push(self.compute_bounds(column.name(), &values));
        }

        self.bounds = Some(bounds);
        Ok(())
    }

    fn transform(&self, df: &DataFrame) -> Result<DataFrame> {
        let bounds = self
            .bounds
            .as_ref()
            .ok_or(ChurnError::NotFitted("OutlierClipper"))?;
        let names: Vec<String> = bounds.iter().map(|b| b.column.clone()).collect();
        require_columns(df, &names, "OutlierClipper")?;

        let mut columns = Vec::with_capacity(bounds.len());
        for b in bounds {
            let values = numeric_values(df.column(&b.column)?)?;
            let clipped: Vec<Option<f64>> = values
                .into_iter()
                .map(|v| v.map(|x| x.clamp(b.lower, b.upper)))
                .collect();
            columns.push(Column::new(b.column.as_str().into(), clipped));
        }

        Ok(DataFrame::new(columns)?)
    }

    fn is_fitted(&self) -> bool {
        self.bounds.is_some()
    }
}
