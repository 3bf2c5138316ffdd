//! churnml: churn-prediction library
//!
//! Preprocessing (imputation, outlier clipping, scaling, one-hot encoding),
//! correlation-based feature selection, an MLP classifier tuned by
//! stratified cross-validated grid search, and a processor facade that trains,
//! evaluates, predicts and persists the fitted model as a JSON artifact.

pub mod cli;
pub mod config;
pub mod data;
pub mod error;
pub mod job;
pub mod pipeline;
pub mod processor;
pub mod report;
pub mod transformers;
pub mod utils;

pub use error::{ChurnError, Result};
