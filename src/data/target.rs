//! Target column encoding
//!
//! The classifier trains on a binary 0/1 target. Numeric 0/1 and boolean
//! targets are used as-is; any other two-valued target needs the value that
//! marks the positive class (e.g. `"Yes"` for churned customers).

use std::collections::BTreeSet;

use polars::prelude::*;
use serde::{Deserialize, Serialize};

use crate::error::{ChurnError, Result};

/// Tolerance for floating point comparison when checking binary 0/1 values
const TOLERANCE: f64 = 1e-9;

/// How raw target values map onto 0/1.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum TargetEncoding {
    /// Target is already numeric 0/1 or boolean
    Binary,
    /// `positive` maps to 1 and every other known value to 0
    Labels {
        positive: String,
        negative: Option<String>,
    },
}

impl TargetEncoding {
    /// Infer the encoding from the training target.
    pub fn infer(target: &Series, positive_label: Option<&str>) -> Result<Self> {
        validate_target(target)?;

        if is_binary_column(target)? && positive_label.is_none() {
            return Ok(TargetEncoding::Binary);
        }

        let unique = unique_values_as_strings(target)?;
        if unique.len() > 2 {
            return Err(ChurnError::InvalidInput(format!(
                "Target column '{}' must be binary, found {} distinct values",
                target.name(),
                unique.len()
            )));
        }

        let positive = positive_label.ok_or_else(|| {
            ChurnError::InvalidInput(format!(
                "Target column '{}' is not 0/1 (values: {:?}); set 'positive_label' in the model configuration",
                target.name(),
                unique
            ))
        })?;

        if !unique.contains(positive) {
            return Err(ChurnError::InvalidInput(format!(
                "Positive label '{}' does not occur in target column '{}' (values: {:?})",
                positive,
                target.name(),
                unique
            )));
        }

        let negative = unique.iter().find(|v| v.as_str() != positive).cloned();
        Ok(TargetEncoding::Labels {
            positive: positive.to_string(),
            negative,
        })
    }

    /// Encode a target series to 0.0/1.0.
    pub fn encode(&self, target: &Series) -> Result<Vec<f64>> {
        validate_target(target)?;

        match self {
            TargetEncoding::Binary => {
                if !is_binary_column(target)? {
                    return Err(ChurnError::InvalidInput(format!(
                        "Target column '{}' must contain only 0/1 values",
                        target.name()
                    )));
                }
                let cast = target.cast(&DataType::Float64)?;
                Ok(cast
                    .f64()?
                    .into_iter()
                    .map(|v| if v.unwrap_or(0.0) > 0.5 { 1.0 } else { 0.0 })
                    .collect())
            }
            TargetEncoding::Labels { positive, negative } => {
                let cast = target.cast(&DataType::String)?;
                let mut encoded = Vec::with_capacity(cast.len());
                for value in cast.str()?.into_iter().flatten() {
                    if value == positive {
                        encoded.push(1.0);
                    } else if negative.as_deref().map_or(true, |n| n == value) {
                        encoded.push(0.0);
                    } else {
                        return Err(ChurnError::InvalidInput(format!(
                            "Target value '{}' was not seen during training",
                            value
                        )));
                    }
                }
                Ok(encoded)
            }
        }
    }

    /// Label for an encoded class, in the raw target's vocabulary.
    pub fn decode(&self, class: u8) -> String {
        match self {
            TargetEncoding::Binary => class.to_string(),
            TargetEncoding::Labels { positive, negative } => {
                if class == 1 {
                    positive.clone()
                } else {
                    negative.clone().unwrap_or_else(|| format!("not {}", positive))
                }
            }
        }
    }
}

fn validate_target(target: &Series) -> Result<()> {
    if target.is_empty() {
        return Err(ChurnError::InvalidShape(format!(
            "Target column '{}' is empty",
            target.name()
        )));
    }
    if target.null_count() > 0 {
        return Err(ChurnError::InvalidInput(format!(
            "Target column '{}' contains {} null value(s)",
            target.name(),
            target.null_count()
        )));
    }
    Ok(())
}

/// True if the column is boolean or numeric with only 0 and 1 values.
fn is_binary_column(target: &Series) -> Result<bool> {
    if matches!(target.dtype(), DataType::Boolean) {
        return Ok(true);
    }
    if !target.dtype().is_primitive_numeric() {
        return Ok(false);
    }

    let float_col = target.cast(&DataType::Float64)?;
    let is_binary = float_col
        .f64()?
        .into_iter()
        .flatten()
        .all(|v| (v - 0.0).abs() < TOLERANCE || (v - 1.0).abs() < TOLERANCE);
    Ok(is_binary)
}

/// Unique values as strings, sorted for stable messages and encodings.
fn unique_values_as_strings(target: &Series) -> Result<BTreeSet<String>> {
    let cast = target.cast(&DataType::String)?;
    let values = cast
        .str()?
        .into_iter()
        .flatten()
        .map(|s| s.to_string())
        .collect();
    Ok(values)
}
