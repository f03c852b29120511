pub mod aggregation;
pub mod classifier;

pub use aggregation::{AggregationState, Counter, IpCounter};
pub use classifier::classify;
