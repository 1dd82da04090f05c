pub mod scheduler;
pub mod service;

pub use scheduler::{BatchScheduler, FlushRequests, FlushTrigger, flush_channel};
pub use service::{BufferConfig, BufferError, MessageBuffer, ProcessOutcome};
