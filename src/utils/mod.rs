//! Terminal output helpers and serde adapters

pub mod progress;
pub mod serde_float;
pub mod styling;

pub use progress::*;
pub use styling::*;
