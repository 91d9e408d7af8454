//! Core domain models for the message store.

use serde::{Deserialize, Serialize};

use super::value_object::{MessageContent, MessageKind, RoomId, SenderName, Timestamp};

/// Default number of messages kept per room
pub const DEFAULT_HISTORY_CAPACITY: usize = 1000;

/// A chat message accepted by the store
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredMessage {
    /// Room the message belongs to
    pub room_id: RoomId,
    /// Display name of the sender (not unique)
    pub sender: SenderName,
    /// Message content
    pub content: MessageContent,
    /// Message kind (currently only text)
    pub kind: MessageKind,
    /// Timestamp when the store accepted the message
    pub created_at: Timestamp,
}

impl StoredMessage {
    /// Create a new text message
    pub fn text(
        room_id: RoomId,
        sender: SenderName,
        content: MessageContent,
        created_at: Timestamp,
    ) -> Self {
        Self {
            room_id,
            sender,
            content,
            kind: MessageKind::Text,
            created_at,
        }
    }
}
