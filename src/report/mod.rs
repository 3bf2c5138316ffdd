//! Report module - summarizing training runs and stored artifacts

pub mod summary;

pub use summary::*;
