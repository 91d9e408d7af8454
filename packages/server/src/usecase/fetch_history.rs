//! UseCase: 履歴取得処理

use std::sync::Arc;

use crate::domain::{MessageRepository, RoomId, StoredMessage};

use super::error::FetchHistoryError;

/// 履歴取得のユースケース
pub struct FetchHistoryUseCase {
    /// Repository（データアクセス層の抽象化）
    repository: Arc<dyn MessageRepository>,
}

impl FetchHistoryUseCase {
    /// 新しい FetchHistoryUseCase を作成
    pub fn new(repository: Arc<dyn MessageRepository>) -> Self {
        Self { repository }
    }

    /// ルームの履歴を挿入順で取得
    pub async fn execute(&self, room_id: String) -> Result<Vec<StoredMessage>, FetchHistoryError> {
        let room_id = RoomId::new(room_id)?;
        Ok(self.repository.list_messages(&room_id).await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        domain::{MessageContent, SenderName, Timestamp, ValueObjectError},
        infrastructure::repository::InMemoryMessageRepository,
    };

    #[tokio::test]
    async fn test_fetch_history_returns_room_messages() {
        // テスト項目: 指定したルームの履歴だけが返される
        // given (前提条件):
        let repository = Arc::new(InMemoryMessageRepository::new());
        for room in ["r1", "r2"] {
            repository
                .append_message(StoredMessage::text(
                    RoomId::new(room.to_string()).unwrap(),
                    SenderName::new("A".to_string()).unwrap(),
                    MessageContent::new(format!("hello {room}")).unwrap(),
                    Timestamp::new(1),
                ))
                .await
                .unwrap();
        }
        let usecase = FetchHistoryUseCase::new(repository);

        // when (操作):
        let result = usecase.execute("r1".to_string()).await.unwrap();

        // then (期待する結果):
        assert_eq!(result.len(), 1);
        assert_eq!(result[0].content.as_str(), "hello r1");
    }

    #[tokio::test]
    async fn test_fetch_history_invalid_room_id() {
        // テスト項目: 空のルーム ID はエラーになる
        // given (前提条件):
        let usecase = FetchHistoryUseCase::new(Arc::new(InMemoryMessageRepository::new()));

        // when (操作):
        let result = usecase.execute(String::new()).await;

        // then (期待する結果):
        assert_eq!(
            result,
            Err(FetchHistoryError::InvalidRoomId(ValueObjectError::RoomIdEmpty))
        );
    }
}
