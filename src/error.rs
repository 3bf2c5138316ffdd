//! Error types for the churn training pipeline.
//!
//! Every fallible library operation returns [`Result`]. The variants keep the
//! failure classes apart so callers (and the job runner's retry loop) can tell
//! an unfit estimator from a bad input frame from a broken artifact file.

use std::path::PathBuf;

use thiserror::Error;

/// Result type alias for churnml operations
pub type Result<T> = std::result::Result<T, ChurnError>;

/// Errors raised by the preprocessing stages, the search and the processor.
#[derive(Error, Debug)]
pub enum ChurnError {
    /// An inference, metric or transform operation ran before the matching fit.
    #[error("{0} is not fitted yet. Call 'fit'/'train' before using this estimator")]
    NotFitted(&'static str),

    /// Empty frames, row-count mismatches, missing fitted columns.
    #[error("Invalid shape: {0}")]
    InvalidShape(String),

    /// Non-numeric data fed to a numeric-only operation.
    #[error("Invalid type for column '{column}': expected {expected}, got {actual}")]
    InvalidType {
        column: String,
        expected: String,
        actual: String,
    },

    #[error("Invalid parameter: {name} = {value}, {reason}")]
    InvalidParameter {
        name: String,
        value: String,
        reason: String,
    },

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Feature not found: {0}")]
    FeatureNotFound(String),

    #[error("Model artifact not found: {}", .0.display())]
    ArtifactNotFound(PathBuf),

    #[error("Corrupt model artifact {}: {reason}", .path.display())]
    CorruptArtifact { path: PathBuf, reason: String },

    #[error("Model configuration not found: {}", .0.display())]
    ConfigNotFound(PathBuf),

    #[error("Malformed model configuration {}: {reason}", .path.display())]
    ConfigParse { path: PathBuf, reason: String },

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Hyperparameter search exceeded its {0}s timeout")]
    SearchTimeout(u64),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Data error: {0}")]
    Data(#[from] polars::error::PolarsError),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl From<serde_json::Error> for ChurnError {
    fn from(err: serde_json::Error) -> Self {
        ChurnError::Serialization(err.to_string())
    }
}

impl From<ndarray::ShapeError> for ChurnError {
    fn from(err: ndarray::ShapeError) -> Self {
        ChurnError::InvalidShape(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error;
    use std::io;

    #[test]
    fn test_not_fitted_display() {
        let err = ChurnError::NotFitted("OutlierClipper");
        assert!(err.to_string().starts_with("OutlierClipper is not fitted yet"));
    }

    #[test]
    fn test_invalid_type_display() {
        let err = ChurnError::InvalidType {
            column: "state".to_string(),
            expected: "numeric".to_string(),
            actual: "str".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "Invalid type for column 'state': expected numeric, got str"
        );
    }

    #[test]
    fn test_artifact_not_found_display() {
        let err = ChurnError::ArtifactNotFound(PathBuf::from("models/model.json"));
        assert_eq!(err.to_string(), "Model artifact not found: models/model.json");
    }

    #[test]
    fn test_from_io_error_keeps_source() {
        let io_err = io::Error::new(io::ErrorKind::PermissionDenied, "access denied");
        let err: ChurnError = io_err.into();
        assert!(matches!(err, ChurnError::Io(_)));
        assert!(err.source().is_some());
    }

    #[test]
    fn test_from_serde_json_error() {
        let json_err = serde_json::from_str::<serde_json::Value>("{not json").unwrap_err();
        let err: ChurnError = json_err.into();
        assert!(matches!(err, ChurnError::Serialization(_)));
    }
}
