//! Message history store seam.

use async_trait::async_trait;

use super::error::StoreError;
use super::message::ChatMessage;
use super::value_object::RoomId;

/// Remote history of chat messages per room.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait MessageStore: Send + Sync {
    /// Fetch the stored messages of a room, oldest first.
    async fn fetch_history(&self, room_id: &RoomId) -> Result<Vec<ChatMessage>, StoreError>;

    /// Persist one message.
    async fn persist(&self, message: &ChatMessage) -> Result<(), StoreError>;
}
