pub mod log_directory;
pub mod record_reader;

pub use log_directory::list_log_files;
pub use record_reader::{ReadError, RecordReader};
