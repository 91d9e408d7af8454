//! In-process message store, for running without a history service.

use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::Mutex;

use crate::domain::{ChatMessage, MessageStore, Origin, RoomId, StoreError};

#[derive(Debug, Default)]
pub struct InMemoryMessageStore {
    rooms: Mutex<HashMap<RoomId, Vec<ChatMessage>>>,
}

impl InMemoryMessageStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl MessageStore for InMemoryMessageStore {
    async fn fetch_history(&self, room_id: &RoomId) -> Result<Vec<ChatMessage>, StoreError> {
        let rooms = self.rooms.lock().await;
        Ok(rooms.get(room_id).cloned().unwrap_or_default())
    }

    async fn persist(&self, message: &ChatMessage) -> Result<(), StoreError> {
        let mut stored = message.clone();
        stored.origin = Origin::Confirmed;
        let mut rooms = self.rooms.lock().await;
        rooms
            .entry(stored.room_id.clone())
            .or_default()
            .push(stored);
        Ok(())
    }
}
