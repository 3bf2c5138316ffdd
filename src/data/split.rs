//! Feature/target separation and the seeded train/test split

use polars::prelude::*;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;

use crate::data::frame::take_rows;
use crate::error::{ChurnError, Result};

/// Held-out split of features and target.
#[derive(Debug, Clone)]
pub struct TrainTestSplit {
    pub x_train: DataFrame,
    pub x_test: DataFrame,
    pub y_train: Series,
    pub y_test: Series,
}

/// Separate the target column from the features.
pub fn split_features_target(df: &DataFrame, target: &str) -> Result<(DataFrame, Series)> {
    let y = df
        .column(target)
        .map_err(|_| {
            ChurnError::FeatureNotFound(format!(
                "target column '{}' not found in dataset. Available columns: {:?}",
                target,
                df.get_column_names()
            ))
        })?
        .as_materialized_series()
        .clone();
    let x = df.drop(target)?;
    Ok((x, y))
}

/// Shuffle rows with `seed` and hold out `ceil(test_size * n)` of them.
pub fn train_test_split(
    x: &DataFrame,
    y: &Series,
    test_size: f64,
    seed: u64,
) -> Result<TrainTestSplit> {
    let n = x.height();
    if y.len() != n {
        return Err(ChurnError::InvalidShape(format!(
            "features have {} rows but target has {}",
            n,
            y.len()
        )));
    }
    if !(test_size > 0.0 && test_size < 1.0) {
        return Err(ChurnError::InvalidParameter {
            name: "test_size".to_string(),
            value: test_size.to_string(),
            reason: "must be between 0 and 1 (exclusive)".to_string(),
        });
    }

    let n_test = (test_size * n as f64).ceil() as usize;
    if n_test == 0 || n_test >= n {
        return Err(ChurnError::InvalidInput(format!(
            "test_size={} with {} rows leaves an empty train or test set",
            test_size, n
        )));
    }

    let mut indices: Vec<usize> = (0..n).collect();
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    indices.shuffle(&mut rng);

    let (test_idx, train_idx) = indices.split_at(n_test);

    let y_frame = DataFrame::new(vec![Column::from(y.clone())])?;
    let y_train = take_rows(&y_frame, train_idx)?
        .get_columns()[0]
        .as_materialized_series()
        .clone();
    let y_test = take_rows(&y_frame, test_idx)?
        .get_columns()[0]
        .as_materialized_series()
        .clone();

    Ok(TrainTestSplit {
        x_train: take_rows(x, train_idx)?,
        x_test: take_rows(x, test_idx)?,
        y_train,
        y_test,
    })
}
