//! Repository trait for message history.
//!
//! The domain layer owns the abstraction; infrastructure provides the
//! implementations (dependency inversion).

use async_trait::async_trait;

use super::{RepositoryError, RoomId, StoredMessage};

/// Storage for per-room message history
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait MessageRepository: Send + Sync {
    /// Messages of a room in insertion order
    async fn list_messages(&self, room_id: &RoomId) -> Result<Vec<StoredMessage>, RepositoryError>;

    /// Append a message to its room and return the stored copy
    async fn append_message(&self, message: StoredMessage) -> Result<StoredMessage, RepositoryError>;
}
