use polars::prelude::*;
use serde::{Deserialize, Serialize};

use super::Transformer;
use crate::data::frame::{ensure_non_empty, numeric_values, require_columns};
use crate::error::{ChurnError, Result};

/// Per-column mean and population standard deviation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColumnScale {
    pub column: String,
    pub mean: f64,
    pub std: f64,
}

/// Standardizes numeric columns to zero mean and unit variance.
///
/// A column with zero spread is only centered.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StandardScaler {
    scales: Option<Vec<ColumnScale>>,
}

impl StandardScaler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn scales(&self) -> Option<&[ColumnScale]> {
        self.scales.as_deref()
    }
}

impl Transformer for StandardScaler {
    fn fit(&mut self, df: &DataFrame, _target: Option<&[f64]>) -> Result<()> {
        ensure_non_empty(df, "StandardScaler")?;

        let mut scales = Vec::with_capacity(df.width());
        for column in df.get_columns() {
            let present: Vec<f64> = numeric_values(column)?.into_iter().flatten().collect();
            let n = present.len();
            let (mean, std) = if n == 0 {
                (0.0, 1.0)
            } else {
                let mean = present.iter().sum::<f64>() / n as f64;
                let var = present.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n as f64;
                let std = var.sqrt();
                (mean, if std > 0.0 { std } else { 1.0 })
            };
            scales.push(ColumnScale {
                column: column.name().to_string(),
                mean,
                std,
            });
        }

        self.scales = Some(scales);
        Ok(())
    }

    fn transform(&self, df: &DataFrame) -> Result<DataFrame> {
        let scales = self
            .scales
            .as_ref()
            .ok_or(ChurnError::NotFitted("StandardScaler"))?;
        let names: Vec<String> = scales.iter().map(|s| s.column.clone()).collect();
        require_columns(df, &names, "StandardScaler")?;

        let mut columns = Vec::with_capacity(scales.len());
        for s in scales {
            let scaled: Vec<Option<f64>> = numeric_values(df.column(&s.column)?)?
                .into_iter()
                .map(|v| v.map(|x| (x - s.mean) / s.std))
                .collect();
            columns.push(Column::new(s.column.as_str().into(), scaled));
        }

        Ok(DataFrame::new(columns)?)
    }

    fn is_fitted(&self) -> bool {
        self.scales.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_standardizes_column() {
        let df = df! { "x" => [1.0f64, 2.0, 3.0, 4.0] }.unwrap();
        let mut scaler = StandardScaler::new();
        let out = scaler.fit_transform(&df, None).unwrap();

        let values: Vec<f64> = out.column("x").unwrap().f64().unwrap().into_no_null_iter().collect();
        let mean = values.iter().sum::<f64>() / 4.0;
        let var = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / 4.0;
        assert!(mean.abs() < 1e-12);
        assert!((var - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_constant_column_is_centered_only() {
        let df = df! { "x" => [7.0f64, 7.0, 7.0] }.unwrap();
        let mut scaler = StandardScaler::new();
        let out = scaler.fit_transform(&df, None).unwrap();

        assert_eq!(scaler.scales().unwrap()[0].std, 1.0);
        assert!(out.column("x").unwrap().f64().unwrap().into_no_null_iter().all(|v| v == 0.0));
    }
}
