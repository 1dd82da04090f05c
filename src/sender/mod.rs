pub mod client;
pub mod payload;

pub use client::{ClientConfig, ClientError, HttpPersistenceClient};
pub use payload::{BATCH_SIZE_HEADER, BatchPayload, SERVICE_NAME_HEADER, WireMessage};

use crate::domain::Message;
use std::future::Future;
use std::time::Duration;
use thiserror::Error;

/// Why a single persistence attempt failed. Every variant is treated the
/// same by the retry controller; the split only matters for logs.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PersistError {
    #[error("Request timed out after {0:?}")]
    Timeout(Duration),
    #[error("Transport error: {0}")]
    Transport(String),
    #[error("HTTP error: {status} - {body}")]
    Status { status: u16, body: String },
    #[error("Serialization error: {0}")]
    Serialization(String),
}

/// Single-attempt write of one batch to the downstream store.
///
/// Implementations carry no retry logic.
pub trait PersistenceClient: Send + Sync + 'static {
    fn save(&self, batch: &[Message]) -> impl Future<Output = Result<(), PersistError>> + Send;
}
