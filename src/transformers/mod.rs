//! Fit/transform stages composed by the preprocessing pipeline
//!
//! Every stage learns its state in [`Transformer::fit`] and applies it in
//! [`Transformer::transform`]. Calling `transform` on an unfit stage is a
//! [`ChurnError::NotFitted`](crate::error::ChurnError::NotFitted) error, and
//! fitting again replaces whatever was learned before.

pub mod feature_selector;
pub mod imputer;
pub mod onehot;
pub mod outlier_clipper;
pub mod scaler;

pub use feature_selector::*;
pub use imputer::*;
pub use onehot::*;
pub use outlier_clipper::*;
pub use scaler::*;

use polars::prelude::DataFrame;

use crate::error::Result;

/// A stage with learned state.
pub trait Transformer {
    /// Learn state from `df`. Only supervised stages read `target`.
    fn fit(&mut self, df: &DataFrame, target: Option<&[f64]>) -> Result<()>;

    /// Apply the learned state to `df`.
    fn transform(&self, df: &DataFrame) -> Result<DataFrame>;

    fn is_fitted(&self) -> bool;

    fn fit_transform(&mut self, df: &DataFrame, target: Option<&[f64]>) -> Result<DataFrame> {
        self.fit(df, target)?;
        self.transform(df)
    }
}
