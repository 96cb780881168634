use serde::{Deserialize, Serialize};

use crate::broker::message::Message;

/// Query string accepted by `GET /sse`.
#[derive(Debug, Default, Deserialize)]
pub struct SubscribeQuery {
    #[serde(default)]
    pub username: String,
}

/// Form (or query) accepted by `/send`.
#[derive(Debug, Default, Deserialize)]
pub struct SendRequest {
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub message: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EventType {
    NewChatMessage,
}

/// The body of every event pushed to subscribers.
///
/// Built by the `/send` handler and encoded to JSON before it is handed to
/// the broker, which never looks inside it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatEvent {
    pub username: String,
    pub event_type: EventType,
    pub message: String,
    /// Unix timestamp in seconds.
    pub timestamp: i64,
}

impl ChatEvent {
    pub fn new_chat_message(username: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            event_type: EventType::NewChatMessage,
            message: message.into(),
            timestamp: chrono::Utc::now().timestamp(),
        }
    }

    pub fn encode(&self) -> Result<Message, serde_json::Error> {
        serde_json::to_vec(self).map(Message::from)
    }
}
