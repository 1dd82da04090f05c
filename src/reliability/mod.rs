pub mod dead_letter;
pub mod metrics;
pub mod retry;

pub use dead_letter::{DeadLetterError, DeadLetterStore, ReplayOutcome};
pub use metrics::{BufferMetrics, MetricsError};
pub use retry::{RetryConfig, RetryController, RetryOutcome, RetryStrategy};
