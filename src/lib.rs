#![deny(rust_2024_compatibility)]
// Specific pedantic lints enforced (not blanket allow):
#![deny(
    clippy::explicit_iter_loop,
    clippy::manual_let_else,
    clippy::semicolon_if_nothing_returned,
    clippy::inconsistent_struct_constructor
)]
// Noisy pedantic lints suppressed with justification:
#![allow(
    clippy::cast_possible_truncation, // Durations in ms fit in u64
    clippy::cast_precision_loss,      // Acceptable for metrics/display
    clippy::missing_errors_doc,       // Internal API
    clippy::missing_panics_doc,       // Internal API
    clippy::module_name_repetitions,  // e.g. QueueError in queue module
    clippy::must_use_candidate,       // Annotated selectively on critical APIs
    clippy::doc_markdown              // Internal API
)]

pub mod app;
pub mod buffer;
pub mod domain;
pub mod queue;
pub mod reliability;
pub mod sender;

// Re-export main types for easy access
pub use app::{App, Config};
pub use buffer::{BatchScheduler, MessageBuffer, ProcessOutcome};
pub use domain::{BufferStatus, DeadLetterEntry, IncomingMessage, Message, MessageType};

// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
