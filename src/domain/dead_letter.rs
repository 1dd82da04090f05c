use super::Message;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A batch that exhausted every persistence attempt.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeadLetterEntry {
    pub messages: Vec<Message>,
    pub failed_at: DateTime<Utc>,
    pub retry_count: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_error: Option<String>,
}

impl DeadLetterEntry {
    pub fn new(messages: Vec<Message>, retry_count: u32, last_error: Option<String>) -> Self {
        Self {
            messages,
            failed_at: Utc::now(),
            retry_count,
            last_error,
        }
    }
}
