//! HTTP API endpoint handlers.

use std::sync::Arc;

use axum::{
    Json,
    extract::{Query, State},
    http::StatusCode,
};

use crate::{
    infrastructure::dto::http::{CreateMessageDto, HistoryQuery, MessageDto},
    ui::state::AppState,
    usecase::{FetchHistoryError, FetchHistoryUseCase, StoreMessageError, StoreMessageUseCase},
};

/// Health check endpoint
pub async fn health_check() -> Json<serde_json::Value> {
    Json(serde_json::json!({"status": "ok"}))
}

/// `GET /messages?room_id=<id>`: room history in insertion order
pub async fn list_messages(
    State(state): State<Arc<AppState>>,
    Query(query): Query<HistoryQuery>,
) -> Result<Json<Vec<MessageDto>>, StatusCode> {
    let usecase = FetchHistoryUseCase::new(state.repository.clone());

    match usecase.execute(query.room_id.clone()).await {
        Ok(messages) => Ok(Json(messages.iter().map(MessageDto::from).collect())),
        Err(FetchHistoryError::InvalidRoomId(e)) => {
            tracing::warn!("Invalid room_id '{}': {}", query.room_id, e);
            Err(StatusCode::BAD_REQUEST)
        }
        Err(FetchHistoryError::Repository(e)) => {
            tracing::error!("Failed to load history for '{}': {}", query.room_id, e);
            Err(StatusCode::SERVICE_UNAVAILABLE)
        }
    }
}

/// `POST /messages`: store a message and return it with its creation time
pub async fn create_message(
    State(state): State<Arc<AppState>>,
    Json(request): Json<CreateMessageDto>,
) -> Result<(StatusCode, Json<MessageDto>), StatusCode> {
    let usecase = StoreMessageUseCase::new(state.repository.clone());

    match usecase.execute(request).await {
        Ok(stored) => Ok((StatusCode::CREATED, Json(MessageDto::from(&stored)))),
        Err(StoreMessageError::Invalid(e)) => {
            tracing::warn!("Rejected message: {}", e);
            Err(StatusCode::UNPROCESSABLE_ENTITY)
        }
        Err(StoreMessageError::Repository(e)) => {
            tracing::error!("Failed to store message: {}", e);
            Err(StatusCode::SERVICE_UNAVAILABLE)
        }
    }
}
