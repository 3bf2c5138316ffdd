//! Per-type preprocessing branches composed into one stage

use polars::prelude::*;
use serde::{Deserialize, Serialize};

use crate::config::DropFeatures;
use crate::data::frame::ensure_unique_names;
use crate::data::FeaturePartition;
use crate::error::{ChurnError, Result};
use crate::transformers::{
    ConstantImputer, MedianImputer, OneHotEncoder, OutlierClipper, StandardScaler, Transformer,
};

/// Median impute, clip outliers, standardize.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NumericBranch {
    pub imputer: MedianImputer,
    pub outlier_clipper: OutlierClipper,
    pub scaler: StandardScaler,
}

impl NumericBranch {
    pub fn new(outlier_factor: f64) -> Self {
        Self {
            imputer: MedianImputer::new(),
            outlier_clipper: OutlierClipper::new(outlier_factor),
            scaler: StandardScaler::new(),
        }
    }

    fn fit(&mut self, df: &DataFrame) -> Result<()> {
        let imputed = self.imputer.fit_transform(df, None)?;
        let clipped = self.outlier_clipper.fit_transform(&imputed, None)?;
        self.scaler.fit(&clipped, None)
    }

    fn transform(&self, df: &DataFrame) -> Result<DataFrame> {
        let imputed = self.imputer.transform(df)?;
        let clipped = self.outlier_clipper.transform(&imputed)?;
        self.scaler.transform(&clipped)
    }
}

/// Constant impute, one-hot encode.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CategoricalBranch {
    pub imputer: ConstantImputer,
    pub onehot: OneHotEncoder,
}

impl CategoricalBranch {
    fn fit(&mut self, df: &DataFrame) -> Result<()> {
        let imputed = self.imputer.fit_transform(df, None)?;
        self.onehot.fit(&imputed, None)
    }

    fn transform(&self, df: &DataFrame) -> Result<DataFrame> {
        let imputed = self.imputer.transform(df)?;
        self.onehot.transform(&imputed)
    }
}

/// Routes numeric and categorical features through their own branch and
/// concatenates the results, numeric columns first.
///
/// The effective feature lists are fixed when the stage is built; columns
/// outside them are dropped on transform.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Preprocessor {
    features: FeaturePartition,
    pub numerical: NumericBranch,
    pub categorical: CategoricalBranch,
    fitted: bool,
}

impl Preprocessor {
    pub fn new(universe: &FeaturePartition, drop: &DropFeatures, outlier_factor: f64) -> Self {
        Self {
            features: universe.without(drop),
            numerical: NumericBranch::new(outlier_factor),
            categorical: CategoricalBranch::default(),
            fitted: false,
        }
    }

    pub fn numeric_features(&self) -> &[String] {
        &self.features.numeric
    }

    pub fn categorical_features(&self) -> &[String] {
        &self.features.categorical
    }

    /// Columns `transform` produces, in order. Empty before `fit`.
    pub fn output_names(&self) -> Vec<String> {
        if !self.fitted {
            return Vec::new();
        }
        let mut names = self.features.numeric.clone();
        names.extend(self.categorical.onehot.output_names());
        names
    }

    fn select(df: &DataFrame, names: &[String]) -> Result<DataFrame> {
        for name in names {
            if df.column(name).is_err() {
                return Err(ChurnError::FeatureNotFound(format!(
                    "feature '{}' is missing from the input frame",
                    name
                )));
            }
        }
        Ok(df.select(names.iter().map(|s| s.as_str()))?)
    }
}

impl Transformer for Preprocessor {
    fn fit(&mut self, df: &DataFrame, _target: Option<&[f64]>) -> Result<()> {
        if self.features.is_empty() {
            return Err(ChurnError::InvalidShape(
                "no numeric or categorical features left to preprocess".to_string(),
            ));
        }
        self.fitted = false;

        if !self.features.numeric.is_empty() {
            let numeric = Self::select(df, &self.features.numeric)?;
            self.numerical.fit(&numeric)?;
        }
        if !self.features.categorical.is_empty() {
            let categorical = Self::select(df, &self.features.categorical)?;
            self.categorical.fit(&categorical)?;
        }

        self.fitted = true;
        if let Err(err) = ensure_unique_names(&self.output_names(), "Preprocessor") {
            self.fitted = false;
            return Err(err);
        }

        tracing::debug!(
            numeric = self.features.numeric.len(),
            categorical = self.features.categorical.len(),
            "Preprocessing fitted"
        );
        Ok(())
    }

    fn transform(&self, df: &DataFrame) -> Result<DataFrame> {
        if !self.fitted {
            return Err(ChurnError::NotFitted("Preprocessor"));
        }

        let mut columns: Vec<Column> = Vec::new();
        if !self.features.numeric.is_empty() {
            let numeric = Self::select(df, &self.features.numeric)?;
            columns.extend(self.numerical.transform(&numeric)?.take_columns());
        }
        if !self.features.categorical.is_empty() {
            let categorical = Self::select(df, &self.features.categorical)?;
            columns.extend(self.categorical.transform(&categorical)?.take_columns());
        }

        Ok(DataFrame::new(columns)?)
    }

    fn is_fitted(&self) -> bool {
        self.fitted
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn frame() -> DataFrame {
        df! {
            "tenure" => [Some(1i64), Some(12), None, Some(40)],
            "contract" => [Some("monthly"), None, Some("yearly"), Some("monthly")],
            "customer_id" => ["a", "b", "c", "d"],
        }
        .unwrap()
    }

    #[test]
    fn test_numeric_then_categorical_output() {
        let df = frame();
        let drop = DropFeatures {
            numerical: vec![],
            categorical: vec!["customer_id".into()],
        };
        let mut pre = Preprocessor::new(&FeaturePartition::from_frame(&df), &drop, 1.5);
        let out = pre.fit_transform(&df, None).unwrap();

        assert_eq!(
            out.get_column_names(),
            &["tenure", "contract_missing", "contract_monthly", "contract_yearly"]
        );
        assert_eq!(out.height(), 4);
        assert_eq!(out.column("tenure").unwrap().null_count(), 0);
    }

    #[test]
    fn test_missing_feature_at_transform() {
        let df = frame();
        let mut pre = Preprocessor::new(
            &FeaturePartition::from_frame(&df),
            &DropFeatures::default(),
            1.5,
        );
        pre.fit(&df, None).unwrap();

        let without = df.drop("tenure").unwrap();
        assert!(matches!(
            pre.transform(&without),
            Err(ChurnError::FeatureNotFound(_))
        ));
    }

    #[test]
    fn test_no_features_is_shape_error() {
        let df = frame();
        let mut pre = Preprocessor::new(&FeaturePartition::default(), &DropFeatures::default(), 1.5);
        assert!(matches!(pre.fit(&df, None), Err(ChurnError::InvalidShape(_))));
    }

    #[test]
    fn test_categorical_only() {
        let df = frame();
        let universe = FeaturePartition {
            numeric: vec![],
            categorical: vec!["contract".into()],
        };
        let mut pre = Preprocessor::new(&universe, &DropFeatures::default(), 1.5);
        let out = pre.fit_transform(&df, None).unwrap();
        assert_eq!(out.width(), 3);
        assert_eq!(pre.output_names().len(), 3);
    }
}
