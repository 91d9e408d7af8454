//! UseCase 層
//!
//! ビジネスロジックを実装するレイヤー。
//! UI 層から呼び出され、Domain 層を操作します。

pub mod error;
pub mod fetch_history;
pub mod store_message;

pub use error::{FetchHistoryError, StoreMessageError};
pub use fetch_history::FetchHistoryUseCase;
pub use store_message::StoreMessageUseCase;
