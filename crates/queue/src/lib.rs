pub mod batcher;
pub mod error;
pub mod memory;
pub mod queue;
pub mod sqs;

pub use batcher::MicroBatcher;
pub use error::QueueError;
pub use memory::MemoryQueue;
pub use queue::{Queue, QueueHealth, QueueItem};
pub use sqs::SqsQueue;
