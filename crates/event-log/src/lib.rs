pub mod error;
pub mod file;
pub mod memory;
pub mod publisher;
pub mod store;

pub use error::{PublishError, Result};
pub use file::FileEventLog;
pub use memory::{InMemoryEventLog, LogRecord};
pub use publisher::{EventPublisher, PublishStats};
pub use store::LogClient;
