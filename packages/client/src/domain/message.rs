//! Chat message as seen by one client.

use super::value_object::{MessageContent, MessageKind, RoomId, SenderName, Timestamp};

/// Where a timeline entry came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Origin {
    /// Authored here, not yet acknowledged by the history store
    LocalPending,
    /// Loaded from history, received from a peer, or acknowledged
    Confirmed,
}

/// One chat message in a room timeline.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatMessage {
    pub room_id: RoomId,
    pub sender: SenderName,
    pub content: MessageContent,
    pub kind: MessageKind,
    pub created_at: Timestamp,
    pub origin: Origin,
}

impl ChatMessage {
    /// A text message authored by the local user.
    pub fn local(
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
            origin: Origin::LocalPending,
        }
    }

    /// A message that already exists elsewhere (history or a peer).
    pub fn confirmed(
        room_id: RoomId,
        sender: SenderName,
        content: MessageContent,
        kind: MessageKind,
        created_at: Timestamp,
    ) -> Self {
        Self {
            room_id,
            sender,
            content,
            kind,
            created_at,
            origin: Origin::Confirmed,
        }
    }

    pub fn is_pending(&self) -> bool {
        self.origin == Origin::LocalPending
    }

    /// Mark as acknowledged. Returns `false` if it already was.
    pub(crate) fn confirm(&mut self) -> bool {
        if self.origin == Origin::Confirmed {
            return false;
        }
        self.origin = Origin::Confirmed;
        true
    }
}
