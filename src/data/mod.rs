//! Dataset I/O and frame plumbing

pub mod frame;
pub mod loader;
pub mod partition;
pub mod split;
pub mod target;

pub use frame::{take_rows, to_matrix};
pub use loader::{load_dataset, read_dataset, write_dataset};
pub use partition::FeaturePartition;
pub use split::{split_features_target, train_test_split, TrainTestSplit};
pub use target::TargetEncoding;
