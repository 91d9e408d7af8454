//! HTTP API DTOs for the message history service.
//!
//! These types define the JSON shape of `GET /messages` and `POST /messages`
//! and are shared with the client crate.

use serde::{Deserialize, Serialize};

use crate::domain::{
    MessageContent, MessageKind, RoomId, SenderName, StoredMessage, Timestamp, ValueObjectError,
};

/// Query parameters for `GET /messages`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HistoryQuery {
    pub room_id: String,
}

/// Request body for `POST /messages`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateMessageDto {
    pub room_id: String,
    pub sender: String,
    pub content: String,
    #[serde(default = "default_message_type")]
    pub message_type: String,
}

/// A message as returned by the history service
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageDto {
    pub room_id: String,
    pub sender: String,
    pub content: String,
    #[serde(default = "default_message_type")]
    pub message_type: String,
    /// RFC 3339; absent on messages that never reached the store
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<String>,
}

fn default_message_type() -> String {
    MessageKind::Text.as_str().to_string()
}

/// Validated fields of a create request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewMessage {
    pub room_id: RoomId,
    pub sender: SenderName,
    pub content: MessageContent,
    pub kind: MessageKind,
}

impl TryFrom<CreateMessageDto> for NewMessage {
    type Error = ValueObjectError;

    fn try_from(dto: CreateMessageDto) -> Result<Self, Self::Error> {
        Ok(Self {
            room_id: RoomId::new(dto.room_id)?,
            sender: SenderName::new(dto.sender)?,
            content: MessageContent::new(dto.content)?,
            kind: MessageKind::try_from(dto.message_type.as_str())?,
        })
    }
}

impl From<&StoredMessage> for MessageDto {
    fn from(message: &StoredMessage) -> Self {
        Self {
            room_id: message.room_id.as_str().to_string(),
            sender: message.sender.as_str().to_string(),
            content: message.content.as_str().to_string(),
            message_type: message.kind.as_str().to_string(),
            created_at: Some(message.created_at.to_rfc3339()),
        }
    }
}

impl MessageDto {
    /// Creation time in Unix milliseconds, if present and well formed.
    pub fn created_at_millis(&self) -> Option<Timestamp> {
        self.created_at
            .as_deref()
            .and_then(nebula_shared::time::parse_rfc3339)
            .map(Timestamp::new)
    }
}
