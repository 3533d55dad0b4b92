pub mod reader;
pub mod types;

// Re-export commonly used items
pub use reader::{hosts_by_priority, reader_hosts_by_priority, ReaderFailoverHandler};
pub use types::{FailoverMode, ReaderFailoverResult};
