//! One-hot encoding of categorical columns

use std::collections::BTreeSet;

use polars::prelude::*;
use serde::{Deserialize, Serialize};

use super::Transformer;
use crate::data::frame::{ensure_non_empty, ensure_unique_names, require_columns, string_values};
use crate::error::{ChurnError, Result};

/// Sorted categories seen for a column at fit time
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColumnCategories {
    pub column: String,
    pub categories: Vec<String>,
}

/// Expands each categorical column into one 0/1 indicator column per category.
///
/// Indicator columns are named `<column>_<category>`; fitting fails if two of
/// those names coincide. A value not seen at fit encodes to all zeros.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OneHotEncoder {
    categories: Option<Vec<ColumnCategories>>,
}

impl OneHotEncoder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn categories(&self) -> Option<&[ColumnCategories]> {
        self.categories.as_deref()
    }

    /// Names of the indicator columns `transform` produces, in output order.
    pub fn output_names(&self) -> Vec<String> {
        self.categories
            .iter()
            .flatten()
            .flat_map(|c| {
                c.categories
                    .iter()
                    .map(move |cat| format!("{}_{}", c.column, cat))
            })
            .collect()
    }
}

impl Transformer for OneHotEncoder {
    fn fit(&mut self, df: &DataFrame, _target: Option<&[f64]>) -> Result<()> {
        ensure_non_empty(df, "OneHotEncoder")?;

        let mut fitted = Vec::with_capacity(df.width());
        for column in df.get_columns() {
            let unique: BTreeSet<String> = string_values(column)?.into_iter().flatten().collect();
            fitted.push(ColumnCategories {
                column: column.name().to_string(),
                categories: unique.into_iter().collect(),
            });
        }

        let encoder = Self {
            categories: Some(fitted),
        };
        ensure_unique_names(&encoder.output_names(), "OneHotEncoder")?;
        *self = encoder;
        Ok(())
    }

    fn transform(&self, df: &DataFrame) -> Result<DataFrame> {
        let fitted = self
            .categories
            .as_ref()
            .ok_or(ChurnError::NotFitted("OneHotEncoder"))?;
        let names: Vec<String> = fitted.iter().map(|c| c.column.clone()).collect();
        require_columns(df, &names, "OneHotEncoder")?;

        let mut columns = Vec::new();
        for c in fitted {
            let values = string_values(df.column(&c.column)?)?;
            for category in &c.categories {
                let indicator: Vec<f64> = values
                    .iter()
                    .map(|v| match v {
                        Some(v) if v == category => 1.0,
                        _ => 0.0,
                    })
                    .collect();
                let name = format!("{}_{}", c.column, category);
                columns.push(Column::new(name.into(), indicator));
            }
        }

        Ok(DataFrame::new(columns)?)
    }

    fn is_fitted(&self) -> bool {
        self.categories.is_some()
    }
}
