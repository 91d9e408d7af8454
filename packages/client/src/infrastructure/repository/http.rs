//! History store backed by the `/messages` HTTP API.

use std::time::Duration;

use async_trait::async_trait;
use nebula_server::infrastructure::dto::http::MessageDto;
use tracing::debug;

use crate::domain::{ChatMessage, MessageStore, RoomId, StoreError};
use crate::infrastructure::dto::message::{chat_message_from_dto, create_message_dto};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Clone)]
pub struct HttpMessageStore {
    client: reqwest::Client,
    base_url: String,
}

impl HttpMessageStore {
    /// `base_url` is the HTTP origin of the service, e.g. `http://localhost:8000`.
    pub fn new(base_url: impl Into<String>) -> Self {
        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .unwrap_or_default();
        Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    fn messages_url(&self) -> String {
        format!("{}/messages", self.base_url)
    }
}

fn transport(error: reqwest::Error) -> StoreError {
    StoreError::Transport(error.to_string())
}

#[async_trait]
impl MessageStore for HttpMessageStore {
    async fn fetch_history(&self, room_id: &RoomId) -> Result<Vec<ChatMessage>, StoreError> {
        let response = self
            .client
            .get(self.messages_url())
            .query(&[("room_id", room_id.as_str())])
            .send()
            .await
            .map_err(transport)?;
        let status = response.status();
        if !status.is_success() {
            return Err(StoreError::Status(status.as_u16()));
        }
        let dtos: Vec<MessageDto> = response
            .json()
            .await
            .map_err(|e| StoreError::Decode(e.to_string()))?;

        let messages = dtos
            .into_iter()
            .filter_map(|dto| match chat_message_from_dto(dto) {
                Ok(message) => Some(message),
                Err(e) => {
                    debug!("Skipping invalid history entry: {e}");
                    None
                }
            })
            .collect();
        Ok(messages)
    }

    async fn persist(&self, message: &ChatMessage) -> Result<(), StoreError> {
        let response = self
            .client
            .post(self.messages_url())
            .json(&create_message_dto(message))
            .send()
            .await
            .map_err(transport)?;
        let status = response.status();
        if !status.is_success() {
            return Err(StoreError::Status(status.as_u16()));
        }
        Ok(())
    }
}
