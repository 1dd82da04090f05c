use serde::{Deserialize, Serialize};

/// Operational snapshot of the buffer. Derived on demand, never stored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BufferStatus {
    pub buffer_size: usize,
    pub dead_letter_size: usize,
    pub is_processing: bool,
    pub batch_size: usize,
    pub batch_interval_ms: u64,
}
