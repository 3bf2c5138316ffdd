//! Column-type partition of the feature frame

use polars::prelude::*;
use serde::{Deserialize, Serialize};

use crate::config::DropFeatures;
use crate::data::frame::is_categorical_dtype;

/// Numeric and categorical feature names, disjoint and in frame order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeaturePartition {
    pub numeric: Vec<String>,
    pub categorical: Vec<String>,
}

impl FeaturePartition {
    /// Partition `df` by dtype. Columns of any other dtype are ignored.
    ///
    /// The drop-lists are not applied here; they are handed to the
    /// preprocessing stage, which owns the effective feature lists.
    pub fn from_frame(df: &DataFrame) -> Self {
        let mut partition = Self::default();
        for column in df.get_columns() {
            let dtype = column.dtype();
            if dtype.is_primitive_numeric() {
                partition.numeric.push(column.name().to_string());
            } else if is_categorical_dtype(dtype) {
                partition.categorical.push(column.name().to_string());
            } else {
                tracing::debug!(
                    column = column.name().as_str(),
                    dtype = %dtype,
                    "Ignoring column with unsupported dtype"
                );
            }
        }
        partition
    }

    /// Names left after removing the drop-lists, universe order kept.
    pub fn without(&self, drop: &DropFeatures) -> Self {
        Self {
            numeric: retain_missing(&self.numeric, &drop.numerical),
            categorical: retain_missing(&self.categorical, &drop.categorical),
        }
    }

    pub fn len(&self) -> usize {
        self.numeric.len() + self.categorical.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

fn retain_missing(universe: &[String], drop: &[String]) -> Vec<String> {
    universe
        .iter()
        .filter(|name| !drop.contains(name))
        .cloned()
        .collect()
}
