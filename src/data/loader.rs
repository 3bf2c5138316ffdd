//! Dataset loader and writer for CSV and Parquet files

use std::path::Path;

use polars::prelude::*;

use crate::error::{ChurnError, Result};

fn file_extension(path: &Path) -> String {
    path.extension()
        .and_then(|e| e.to_str())
        .unwrap_or("")
        .to_lowercase()
}

/// Load a dataset lazily (CSV or Parquet based on extension)
pub fn load_dataset(path: &Path) -> Result<LazyFrame> {
    if !path.exists() {
        return Err(ChurnError::Io(std::io::Error::new(
            std::io::ErrorKind::NotFound,
            format!("Dataset not found: {}", path.display()),
        )));
    }

    let extension = file_extension(path);
    let lf = match extension.as_str() {
        "csv" => LazyCsvReader::new(path).with_has_header(true).finish()?,
        "parquet" => LazyFrame::scan_parquet(path, Default::default())?,
        _ => {
            return Err(ChurnError::InvalidInput(format!(
                "Unsupported file format: {}. Supported formats: csv, parquet",
                extension
            )))
        }
    };

    Ok(lf)
}

/// Load and collect a dataset into memory.
pub fn read_dataset(path: &Path) -> Result<DataFrame> {
    let df = load_dataset(path)?.collect()?;
    tracing::info!(
        path = %path.display(),
        rows = df.height(),
        columns = df.width(),
        "Read dataset"
    );
    Ok(df)
}

/// Save dataset to file (CSV or Parquet based on extension)
pub fn write_dataset(df: &mut DataFrame, path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }

    let extension = file_extension(path);
    match extension.as_str() {
        "csv" => {
            let mut file = std::fs::File::create(path)?;
            CsvWriter::new(&mut file).finish(df)?;
        }
        "parquet" => {
            let file = std::fs::File::create(path)?;
            ParquetWriter::new(file).finish(df)?;
        }
        _ => {
            return Err(ChurnError::InvalidInput(format!(
                "Unsupported output format: {}. Supported formats: csv, parquet",
                extension
            )))
        }
    }

    tracing::info!(path = %path.display(), rows = df.height(), "Wrote dataset");
    Ok(())
}
