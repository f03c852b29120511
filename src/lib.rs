pub mod analysis;
pub mod config;
pub mod detection;
pub mod input;
pub mod models;
pub mod output;
pub mod reputation;
pub mod tor;

#[cfg(test)]
mod test_support;

// Re-export commonly used types
pub use models::{LogRecord, FileReport, ReputationEntry};
pub use detection::{AggregationState, IpCounter};
pub use input::RecordReader;
pub use reputation::{ReputationClient, ReputationDocument};
pub use tor::{ExitNodeClassifier, ExitNodeSet};
