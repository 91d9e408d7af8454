//! UseCase 層のエラー定義

use thiserror::Error;

use crate::domain::{RepositoryError, ValueObjectError};

/// メッセージ保存のエラー
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum StoreMessageError {
    /// リクエストの内容が不正
    #[error("Invalid message: {0}")]
    Invalid(#[from] ValueObjectError),

    /// 保存先が利用できない
    #[error("Failed to store message: {0}")]
    Repository(#[from] RepositoryError),
}

/// 履歴取得のエラー
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum FetchHistoryError {
    /// ルーム ID が不正
    #[error("Invalid room id: {0}")]
    InvalidRoomId(#[from] ValueObjectError),

    /// 保存先が利用できない
    #[error("Failed to load history: {0}")]
    Repository(#[from] RepositoryError),
}
