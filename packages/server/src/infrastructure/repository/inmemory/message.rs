//! InMemory Message Repository 実装
//!
//! ドメイン層が定義する MessageRepository trait の具体的な実装。
//! HashMap をインメモリ DB として使用します。
//! ルームごとに最大 `capacity` 件を保持し、超えた分は古いものから破棄します。

use std::collections::{HashMap, VecDeque};

use async_trait::async_trait;
use tokio::sync::Mutex;

use crate::domain::{
    MessageRepository, RepositoryError, RoomId, StoredMessage, entity::DEFAULT_HISTORY_CAPACITY,
};

/// インメモリ Message Repository 実装
pub struct InMemoryMessageRepository {
    /// ルーム ID ごとのメッセージ履歴
    rooms: Mutex<HashMap<RoomId, VecDeque<StoredMessage>>>,
    /// ルームあたりの保持件数
    capacity: usize,
}

impl InMemoryMessageRepository {
    /// 新しい InMemoryMessageRepository を作成
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_HISTORY_CAPACITY)
    }

    /// 保持件数を指定して作成
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            rooms: Mutex::new(HashMap::new()),
            capacity: capacity.max(1),
        }
    }
}

impl Default for InMemoryMessageRepository {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl MessageRepository for InMemoryMessageRepository {
    async fn list_messages(&self, room_id: &RoomId) -> Result<Vec<StoredMessage>, RepositoryError> {
        let rooms = self.rooms.lock().await;
        Ok(rooms
            .get(room_id)
            .map(|history| history.iter().cloned().collect())
            .unwrap_or_default())
    }

    async fn append_message(&self, message: StoredMessage) -> Result<StoredMessage, RepositoryError> {
        let mut rooms = self.rooms.lock().await;
        let history = rooms.entry(message.room_id.clone()).or_default();
        if history.len() >= self.capacity {
            history.pop_front();
        }
        history.push_back(message.clone());
        Ok(message)
    }
}
