//! Conversions between the history service DTOs and [`ChatMessage`].

use nebula_server::infrastructure::dto::http::{CreateMessageDto, MessageDto};

use crate::domain::{
    ChatMessage, MessageContent, MessageKind, RoomId, SenderName, Timestamp, ValueObjectError,
};

/// Validate a message received from the wire.
///
/// A missing or unparsable `created_at` falls back to the receive time.
pub fn chat_message_from_dto(dto: MessageDto) -> Result<ChatMessage, ValueObjectError> {
    let created_at = dto.created_at_millis().unwrap_or_else(Timestamp::now);
    Ok(ChatMessage::confirmed(
        RoomId::new(dto.room_id)?,
        SenderName::new(dto.sender)?,
        MessageContent::new(dto.content)?,
        MessageKind::try_from(dto.message_type.as_str())?,
        created_at,
    ))
}

pub fn chat_message_to_dto(message: &ChatMessage) -> MessageDto {
    MessageDto {
        room_id: message.room_id.as_str().to_string(),
        sender: message.sender.as_str().to_string(),
        content: message.content.as_str().to_string(),
        message_type: message.kind.as_str().to_string(),
        created_at: Some(message.created_at.to_rfc3339()),
    }
}

pub fn create_message_dto(message: &ChatMessage) -> CreateMessageDto {
    CreateMessageDto {
        room_id: message.room_id.as_str().to_string(),
        sender: message.sender.as_str().to_string(),
        content: message.content.as_str().to_string(),
        message_type: message.kind.as_str().to_string(),
    }
}
