use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Kind of chat content carried by a message.
///
/// Serialized as its lowercase tag. Tags outside the known set are kept
/// verbatim in `Other` so producers can introduce new kinds.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum MessageType {
    #[default]
    Text,
    Image,
    File,
    System,
    Command,
    Other(String),
}

impl MessageType {
    pub fn as_str(&self) -> &str {
        match self {
            MessageType::Text => "text",
            MessageType::Image => "image",
            MessageType::File => "file",
            MessageType::System => "system",
            MessageType::Command => "command",
            MessageType::Other(tag) => tag,
        }
    }
}

impl From<String> for MessageType {
    fn from(tag: String) -> Self {
        match tag.as_str() {
            "text" => MessageType::Text,
            "image" => MessageType::Image,
            "file" => MessageType::File,
            "system" => MessageType::System,
            "command" => MessageType::Command,
            _ => MessageType::Other(tag),
        }
    }
}

impl From<MessageType> for String {
    fn from(kind: MessageType) -> Self {
        match kind {
            MessageType::Other(tag) => tag,
            known => known.as_str().to_string(),
        }
    }
}

/// A raw chat message as handed over by a producer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IncomingMessage {
    pub user_id: String,
    pub username: String,
    pub content: String,
    #[serde(default)]
    pub message_type: Option<MessageType>,
    /// Event time reported by the producer.
    #[serde(default)]
    pub timestamp: Option<DateTime<Utc>>,
}

impl IncomingMessage {
    pub fn text(
        user_id: impl Into<String>,
        username: impl Into<String>,
        content: impl Into<String>,
    ) -> Self {
        Self {
            user_id: user_id.into(),
            username: username.into(),
            content: content.into(),
            message_type: None,
            timestamp: None,
        }
    }
}

/// A chat message owned by the durable buffer.
///
/// Fields are private; once stamped at enqueue time a message is never
/// modified, only moved between the queue, a batch and the dead-letter store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    id: String,
    user_id: String,
    username: String,
    content: String,
    #[serde(default)]
    message_type: MessageType,
    timestamp: DateTime<Utc>,
    buffered_at: DateTime<Utc>,
}

impl Message {
    /// Stamps a producer message with a fresh id and the enqueue time.
    pub fn stamp(incoming: IncomingMessage) -> Self {
        let buffered_at = Utc::now();
        Self {
            id: Uuid::new_v4().to_string(),
            user_id: incoming.user_id,
            username: incoming.username,
            content: incoming.content,
            message_type: incoming.message_type.unwrap_or_default(),
            timestamp: incoming.timestamp.unwrap_or(buffered_at),
            buffered_at,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn user_id(&self) -> &str {
        &self.user_id
    }

    pub fn username(&self) -> &str {
        &self.username
    }

    pub fn content(&self) -> &str {
        &self.content
    }

    pub fn message_type(&self) -> &MessageType {
        &self.message_type
    }

    pub fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }

    pub fn buffered_at(&self) -> DateTime<Utc> {
        self.buffered_at
    }
}
