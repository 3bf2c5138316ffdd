//! DataFrame helpers shared by the transform stages and the search

use ndarray::Array2;
use polars::prelude::*;

use crate::error::{ChurnError, Result};

/// Text-valued columns, routed to the categorical branch.
pub fn is_categorical_dtype(dtype: &DataType) -> bool {
    matches!(dtype, DataType::String)
}

/// Fail with an invalid-shape error when there is nothing to fit on.
pub fn ensure_non_empty(df: &DataFrame, stage: &str) -> Result<()> {
    if df.width() == 0 || df.height() == 0 {
        return Err(ChurnError::InvalidShape(format!(
            "{} received an empty input ({} rows x {} columns)",
            stage,
            df.height(),
            df.width()
        )));
    }
    Ok(())
}

/// Check that every column a stage was fitted on is present.
pub fn require_columns(df: &DataFrame, columns: &[String], stage: &str) -> Result<()> {
    for name in columns {
        if df.column(name).is_err() {
            return Err(ChurnError::InvalidShape(format!(
                "{} was fitted on column '{}' which is missing from the input",
                stage, name
            )));
        }
    }
    Ok(())
}

/// Fail when two output columns of a stage would share a name.
pub fn ensure_unique_names(names: &[String], stage: &str) -> Result<()> {
    let mut seen = std::collections::HashSet::with_capacity(names.len());
    for name in names {
        if !seen.insert(name.as_str()) {
            return Err(ChurnError::InvalidShape(format!(
                "{} would produce column '{}' more than once",
                stage, name
            )));
        }
    }
    Ok(())
}

/// Values of a numeric column as `f64`; nulls and NaNs become `None`.
///
/// Non-numeric columns are rejected with a type error before any cast is tried.
pub fn numeric_values(column: &Column) -> Result<Vec<Option<f64>>> {
    let dtype = column.dtype();
    if !dtype.is_primitive_numeric() {
        return Err(ChurnError::InvalidType {
            column: column.name().to_string(),
            expected: "numeric".to_string(),
            actual: dtype.to_string(),
        });
    }

    let cast = column.cast(&DataType::Float64)?;
    let values = cast
        .f64()?
        .into_iter()
        .map(|v| v.filter(|x| !x.is_nan()))
        .collect();
    Ok(values)
}

/// Values of a column as strings (nulls stay `None`).
pub fn string_values(column: &Column) -> Result<Vec<Option<String>>> {
    let cast = column.cast(&DataType::String)?;
    let values = cast
        .str()?
        .into_iter()
        .map(|v| v.map(|s| s.to_string()))
        .collect();
    Ok(values)
}

/// Rows at `indices`, in that order.
pub fn take_rows(df: &DataFrame, indices: &[usize]) -> Result<DataFrame> {
    let idx = IdxCa::from_vec(
        "idx".into(),
        indices.iter().map(|&i| i as IdxSize).collect(),
    );
    Ok(df.take(&idx)?)
}

/// Dense row-major matrix of an all-numeric frame.
///
/// `n_rows` is passed explicitly because a frame with no columns carries no
/// row count of its own.
pub fn to_matrix(df: &DataFrame, n_rows: usize) -> Result<Array2<f64>> {
    let mut columns: Vec<Vec<f64>> = Vec::with_capacity(df.width());

    for column in df.get_columns() {
        let values = numeric_values(column)?;
        if values.len() != n_rows {
            return Err(ChurnError::InvalidShape(format!(
                "column '{}' has {} rows, expected {}",
                column.name(),
                values.len(),
                n_rows
            )));
        }
        let dense: Option<Vec<f64>> = values.into_iter().collect();
        let dense = dense.ok_or_else(|| {
            ChurnError::InvalidInput(format!(
                "column '{}' still contains missing values after preprocessing",
                column.name()
            ))
        })?;
        columns.push(dense);
    }

    let n_cols = columns.len();
    Ok(Array2::from_shape_fn((n_rows, n_cols), |(i, j)| columns[j][i]))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_numeric_values_rejects_strings() {
        let df = df! { "state" => ["CA", "NY"] }.unwrap();
        let result = numeric_values(df.column("state").unwrap());
        assert!(matches!(result, Err(ChurnError::InvalidType { .. })));
    }

    #[test]
    fn test_numeric_values_maps_nan_to_none() {
        let df = df! { "x" => [1.0f64, f64::NAN, 3.0] }.unwrap();
        let values = numeric_values(df.column("x").unwrap()).unwrap();
        assert_eq!(values, vec![Some(1.0), None, Some(3.0)]);
    }

    #[test]
    fn test_take_rows_preserves_order() {
        let df = df! { "x" => [10i64, 20, 30, 40] }.unwrap();
        let taken = take_rows(&df, &[3, 0]).unwrap();
        let values: Vec<Option<i64>> = taken.column("x").unwrap().i64().unwrap().into_iter().collect();
        assert_eq!(values, vec![Some(40), Some(10)]);
    }

    #[test]
    fn test_to_matrix_row_major() {
        let df = df! {
            "a" => [1.0f64, 2.0],
            "b" => [3i32, 4],
        }
        .unwrap();
        let m = to_matrix(&df, 2).unwrap();
        assert_eq!(m.shape(), &[2, 2]);
        assert_eq!(m[(0, 1)], 3.0);
        assert_eq!(m[(1, 0)], 2.0);
    }

    #[test]
    fn test_to_matrix_rejects_nulls() {
        let df = df! { "a" => [Some(1.0f64), None] }.unwrap();
        assert!(matches!(to_matrix(&df, 2), Err(ChurnError::InvalidInput(_))));
    }

    #[test]
    fn test_ensure_non_empty() {
        let df = df! { "a" => Vec::<f64>::new() }.unwrap();
        assert!(matches!(
            ensure_non_empty(&df, "Stage"),
            Err(ChurnError::InvalidShape(_))
        ));
    }

    #[test]
    fn test_duplicate_output_names_rejected() {
        let names = vec!["a_b_c".to_string(), "x".to_string(), "a_b_c".to_string()];
        assert!(matches!(
            ensure_unique_names(&names, "OneHotEncoder"),
            Err(ChurnError::InvalidShape(msg)) if msg.contains("a_b_c")
        ));
        assert!(ensure_unique_names(&names[..2], "OneHotEncoder").is_ok());
    }
}
