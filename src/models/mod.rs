pub mod event;
pub mod report;

pub use event::LogRecord;
pub use report::{ActionCount, FileReport, ReputationEntry};
