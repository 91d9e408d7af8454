//! Server state and relay membership.

use std::{collections::HashMap, sync::Arc};

use tokio::sync::{Mutex, mpsc};
use uuid::Uuid;

use crate::domain::{MessageRepository, RoomId};

/// Relay connection information
pub struct MemberInfo {
    /// Frame sender channel for this connection
    pub sender: mpsc::UnboundedSender<String>,
}

/// Shared application state
pub struct AppState {
    /// Repository（データアクセス層の抽象化）
    pub repository: Arc<dyn MessageRepository>,
    /// Relay members keyed by room, then by connection id
    pub rooms: Mutex<HashMap<RoomId, HashMap<Uuid, MemberInfo>>>,
}

impl AppState {
    /// Create state backed by the given repository
    pub fn new(repository: Arc<dyn MessageRepository>) -> Self {
        Self {
            repository,
            rooms: Mutex::new(HashMap::new()),
        }
    }

    /// Register a relay connection in a room
    pub async fn join(&self, room_id: &RoomId, member_id: Uuid, info: MemberInfo) {
        let mut rooms = self.rooms.lock().await;
        rooms.entry(room_id.clone()).or_default().insert(member_id, info);
    }

    /// Remove a relay connection; empty rooms are dropped
    pub async fn leave(&self, room_id: &RoomId, member_id: &Uuid) {
        let mut rooms = self.rooms.lock().await;
        if let Some(members) = rooms.get_mut(room_id) {
            members.remove(member_id);
            if members.is_empty() {
                rooms.remove(room_id);
            }
        }
    }

    /// Forward a frame to every other member of the room.
    ///
    /// Returns the number of members the frame was queued for.
    pub async fn relay(&self, room_id: &RoomId, from: &Uuid, frame: &str) -> usize {
        let rooms = self.rooms.lock().await;
        let Some(members) = rooms.get(room_id) else {
            return 0;
        };

        let mut delivered = 0;
        for (id, member) in members.iter() {
            if id == from {
                continue;
            }
            if member.sender.send(frame.to_string()).is_err() {
                tracing::warn!("Failed to relay frame to member '{}' in room '{}'", id, room_id);
            } else {
                delivered += 1;
            }
        }
        delivered
    }

    /// Number of live relay connections in a room
    pub async fn member_count(&self, room_id: &RoomId) -> usize {
        let rooms = self.rooms.lock().await;
        rooms.get(room_id).map(HashMap::len).unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::repository::InMemoryMessageRepository;

    fn room(id: &str) -> RoomId {
        RoomId::new(id.to_string()).unwrap()
    }

    fn member() -> (MemberInfo, mpsc::UnboundedReceiver<String>) {
        let (sender, receiver) = mpsc::unbounded_channel();
        (
            MemberInfo { sender },
            receiver,
        )
    }

    #[tokio::test]
    async fn test_relay_skips_sender_and_other_rooms() {
        // テスト項目: 送信者自身と他のルームにはフレームが届かない
        // given (前提条件):
        let state = AppState::new(Arc::new(InMemoryMessageRepository::new()));
        let (a, mut a_rx) = member();
        let (b, mut b_rx) = member();
        let (c, mut c_rx) = member();
        let (a_id, b_id, c_id) = (Uuid::new_v4(), Uuid::new_v4(), Uuid::new_v4());
        state.join(&room("r1"), a_id, a).await;
        state.join(&room("r1"), b_id, b).await;
        state.join(&room("r2"), c_id, c).await;

        // when (操作):
        let delivered = state.relay(&room("r1"), &a_id, "{\"type\":\"chat\"}").await;

        // then (期待する結果):
        assert_eq!(delivered, 1);
        assert_eq!(b_rx.try_recv().unwrap(), "{\"type\":\"chat\"}");
        assert!(a_rx.try_recv().is_err());
        assert!(c_rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_leave_drops_empty_room() {
        // テスト項目: 最後のメンバーが抜けるとルームが削除される
        // given (前提条件):
        let state = AppState::new(Arc::new(InMemoryMessageRepository::new()));
        let (a, _a_rx) = member();
        let a_id = Uuid::new_v4();
        state.join(&room("r1"), a_id, a).await;
        assert_eq!(state.member_count(&room("r1")).await, 1);

        // when (操作):
        state.leave(&room("r1"), &a_id).await;

        // then (期待する結果):
        assert_eq!(state.member_count(&room("r1")).await, 0);
        assert!(state.rooms.lock().await.is_empty());
    }
}
