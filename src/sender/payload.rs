use crate::domain::{Message, MessageType};
use chrono::{DateTime, Utc};
use serde::Serialize;

pub const SERVICE_NAME_HEADER: &str = "x-service-name";
pub const BATCH_SIZE_HEADER: &str = "x-batch-size";

/// One message in the shape the chat store expects. Buffer-internal fields
/// (`id`, `bufferedAt`) are not sent.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WireMessage<'a> {
    pub user_id: &'a str,
    pub username: &'a str,
    pub content: &'a str,
    pub message_type: &'a MessageType,
    pub timestamp: DateTime<Utc>,
}

impl<'a> From<&'a Message> for WireMessage<'a> {
    fn from(message: &'a Message) -> Self {
        Self {
            user_id: message.user_id(),
            username: message.username(),
            content: message.content(),
            message_type: message.message_type(),
            timestamp: message.timestamp(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct BatchPayload<'a> {
    pub messages: Vec<WireMessage<'a>>,
}

impl<'a> BatchPayload<'a> {
    pub fn from_messages(batch: &'a [Message]) -> Self {
        Self {
            messages: batch.iter().map(WireMessage::from).collect(),
        }
    }
}
