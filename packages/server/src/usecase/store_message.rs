//! UseCase: メッセージ保存処理
//!
//! ## テスト実装の作業記録
//!
//! ### 何をテストしているか
//! - StoreMessageUseCase::execute() メソッド
//!
//! ### どのような状況を想定しているか
//! - 正常系：作成時刻を付与して保存される
//! - 異常系：バリデーションエラー、保存先の障害

use std::sync::Arc;

use crate::{
    domain::{MessageRepository, StoredMessage, Timestamp},
    infrastructure::dto::http::{CreateMessageDto, NewMessage},
};

use super::error::StoreMessageError;

/// メッセージ保存のユースケース
pub struct StoreMessageUseCase {
    /// Repository（データアクセス層の抽象化）
    repository: Arc<dyn MessageRepository>,
}

impl StoreMessageUseCase {
    /// 新しい StoreMessageUseCase を作成
    pub fn new(repository: Arc<dyn MessageRepository>) -> Self {
        Self { repository }
    }

    /// メッセージ保存を実行
    ///
    /// 作成時刻はサーバー側で付与します。
    ///
    /// # Returns
    ///
    /// * `Ok(StoredMessage)` - 保存されたメッセージ
    /// * `Err(StoreMessageError)` - 保存失敗
    pub async fn execute(&self, request: CreateMessageDto) -> Result<StoredMessage, StoreMessageError> {
        let new_message = NewMessage::try_from(request)?;
        let message = StoredMessage {
            room_id: new_message.room_id,
            sender: new_message.sender,
            content: new_message.content,
            kind: new_message.kind,
            created_at: Timestamp::now(),
        };

        let stored = self.repository.append_message(message).await?;
        tracing::debug!(room_id = %stored.room_id, sender = %stored.sender, "Stored message");
        Ok(stored)
    }
}
