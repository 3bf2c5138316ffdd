//! Missing value imputation

use polars::prelude::*;
use serde::{Deserialize, Serialize};

use super::Transformer;
use crate::data::frame::{ensure_non_empty, numeric_values, require_columns, string_values};
use crate::error::{ChurnError, Result};

/// Fill value used by the categorical branch.
pub const MISSING_CATEGORY: &str = "missing";

/// Replaces missing numeric values with the column median seen at fit.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MedianImputer {
    medians: Option<Vec<(String, f64)>>,
}

impl MedianImputer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn medians(&self) -> Option<&[(String, f64)]> {
        self.medians.as_deref()
    }
}

fn median(values: &[Option<f64>]) -> Option<f64> {
    let mut present: Vec<f64> = values.iter().flatten().copied().collect();
    if present.is_empty() {
        return None;
    }
    present.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
    let mid = present.len() / 2;
    if present.len() % 2 == 0 {
        Some((present[mid - 1] + present[mid]) / 2.0)
    } else {
        Some(present[mid])
    }
}

impl Transformer for MedianImputer {
    fn fit(&mut self, df: &DataFrame, _target: Option<&[f64]>) -> Result<()> {
        ensure_non_empty(df, "MedianImputer")?;

        let mut medians = Vec::with_capacity(df.width());
        for column in df.get_columns() {
            let values = numeric_values(column)?;
            let fill = median(&values).unwrap_or_else(|| {
                tracing::warn!(
                    column = column.name().as_str(),
                    "Column has no observed values, imputing 0.0"
                );
                0.0
            });
            medians.push((column.name().to_string(), fill));
        }

        self.medians = Some(medians);
        Ok(())
    }

    fn transform(&self, df: &DataFrame) -> Result<DataFrame> {
        let medians = self
            .medians
            .as_ref()
            .ok_or(ChurnError::NotFitted("MedianImputer"))?;
        let names: Vec<String> = medians.iter().map(|(n, _)| n.clone()).collect();
        require_columns(df, &names, "MedianImputer")?;

        let mut columns = Vec::with_capacity(medians.len());
        for (name, fill) in medians {
            let filled: Vec<f64> = numeric_values(df.column(name)?)?
                .into_iter()
                .map(|v| v.unwrap_or(*fill))
                .collect();
            columns.push(Column::new(name.as_str().into(), filled));
        }

        Ok(DataFrame::new(columns)?)
    }

    fn is_fitted(&self) -> bool {
        self.medians.is_some()
    }
}

/// Replaces missing values with a fixed string; output columns are String.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConstantImputer {
    fill_value: String,
    columns: Option<Vec<String>>,
}

impl Default for ConstantImputer {
    fn default() -> Self {
        Self::new(MISSING_CATEGORY)
    }
}

impl ConstantImputer {
    pub fn new(fill_value: impl Into<String>) -> Self {
        Self {
            fill_value: fill_value.into(),
            columns: None,
        }
    }

    pub fn fill_value(&self) -> &str {
        &self.fill_value
    }
}

impl Transformer for ConstantImputer {
    fn fit(&mut self, df: &DataFrame, _target: Option<&[f64]>) -> Result<()> {
        ensure_non_empty(df, "ConstantImputer")?;
        self.columns = Some(
            df.get_column_names()
                .into_iter()
                .map(|n| n.to_string())
                .collect(),
        );
        Ok(())
    }

    fn transform(&self, df: &DataFrame) -> Result<DataFrame> {
        let names = self
            .columns
            .as_ref()
            .ok_or(ChurnError::NotFitted("ConstantImputer"))?;
        require_columns(df, names, "ConstantImputer")?;

        let mut columns = Vec::with_capacity(names.len());
        for name in names {
            let filled: Vec<String> = string_values(df.column(name)?)?
                .into_iter()
                .map(|v| v.unwrap_or_else(|| self.fill_value.clone()))
                .collect();
            columns.push(Column::new(name.as_str().into(), filled));
        }

        Ok(DataFrame::new(columns)?)
    }

    fn is_fitted(&self) -> bool {
        self.columns.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_median_odd_and_even() {
        assert_eq!(median(&[Some(3.0), Some(1.0), Some(2.0)]), Some(2.0));
        assert_eq!(median(&[Some(4.0), None, Some(1.0), Some(2.0), Some(3.0)]), Some(2.5));
        assert_eq!(median(&[None, None]), None);
    }

    #[test]
    fn test_median_imputer_fills_nulls() {
        let df = df! { "x" => [Some(1i64), None, Some(5), Some(3)] }.unwrap();
        let mut imputer = MedianImputer::new();
        let out = imputer.fit_transform(&df, None).unwrap();

        let values: Vec<Option<f64>> = out.column("x").unwrap().f64().unwrap().into_iter().collect();
        assert_eq!(values, vec![Some(1.0), Some(3.0), Some(5.0), Some(3.0)]);
    }

    #[test]
    fn test_median_imputer_uses_fitted_median_on_new_data() {
        let train = df! { "x" => [1.0f64, 2.0, 3.0] }.unwrap();
        let test = df! { "x" => [None::<f64>, Some(10.0)] }.unwrap();
        let mut imputer = MedianImputer::new();
        imputer.fit(&train, None).unwrap();

        let out = imputer.transform(&test).unwrap();
        assert_eq!(out.column("x").unwrap().f64().unwrap().get(0), Some(2.0));
    }

    #[test]
    fn test_constant_imputer_fills_missing() {
        let df = df! { "contract" => [Some("monthly"), None, Some("yearly")] }.unwrap();
        let mut imputer = ConstantImputer::default();
        let out = imputer.fit_transform(&df, None).unwrap();

        let values: Vec<Option<&str>> = out.column("contract").unwrap().str().unwrap().into_iter().collect();
        assert_eq!(values, vec![Some("monthly"), Some("missing"), Some("yearly")]);
    }

    #[test]
    fn test_unfit_imputers_error() {
        let df = df! { "x" => [1.0f64] }.unwrap();
        assert!(matches!(
            MedianImputer::new().transform(&df),
            Err(ChurnError::NotFitted(_))
        ));
        assert!(matches!(
            ConstantImputer::default().transform(&df),
            Err(ChurnError::NotFitted(_))
        ));
    }
}
