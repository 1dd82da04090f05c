//! Domain layer for chat-buffer.
//!
//! Contains the canonical types shared across all modules:
//! - `Message`: a buffered chat message, the pipeline's core data type
//! - `IncomingMessage`: what producers hand to the ingestion API
//! - `DeadLetterEntry`: a batch that exhausted its persistence attempts
//! - `BufferStatus`: read-only operational projection

pub mod dead_letter;
pub mod message;
pub mod status;

pub use dead_letter::DeadLetterEntry;
pub use message::{IncomingMessage, Message, MessageType};
pub use status::BufferStatus;
