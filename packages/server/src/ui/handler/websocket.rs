//! WebSocket relay handlers.
//!
//! Every text frame received on `/ws/{room_id}` is forwarded verbatim to the
//! other connections of the same room. The relay never parses the frames and
//! never echoes them back to the sender.

use std::sync::Arc;

use axum::{
    extract::{
        Path, State,
        ws::{Message, WebSocket, WebSocketUpgrade},
    },
    http::StatusCode,
    response::IntoResponse,
};
use futures_util::{sink::SinkExt, stream::StreamExt};
use tokio::sync::mpsc;
use uuid::Uuid;

use crate::{
    domain::RoomId,
    ui::state::{AppState, MemberInfo},
};

pub async fn websocket_handler(
    ws: WebSocketUpgrade,
    State(state): State<Arc<AppState>>,
    Path(room_id): Path<String>,
) -> Result<impl IntoResponse, StatusCode> {
    // Convert String -> RoomId (Domain Model)
    let room_id = match RoomId::try_from(room_id.clone()) {
        Ok(id) => id,
        Err(e) => {
            tracing::warn!("Invalid room_id '{}': {}", room_id, e);
            return Err(StatusCode::BAD_REQUEST);
        }
    };

    Ok(ws.on_upgrade(move |socket| handle_socket(socket, state, room_id)))
}

async fn handle_socket(socket: WebSocket, state: Arc<AppState>, room_id: RoomId) {
    let member_id = Uuid::new_v4();
    let (mut sender, mut receiver) = socket.split();

    // Create a channel for this connection to receive relayed frames
    let (tx, mut rx) = mpsc::unbounded_channel::<String>();
    state
        .join(
            &room_id,
            member_id,
            MemberInfo { sender: tx },
        )
        .await;
    tracing::info!("Member '{}' joined room '{}'", member_id, room_id);

    let room_clone = room_id.clone();
    let state_clone = state.clone();

    // Spawn a task to receive frames from this connection
    let mut recv_task = tokio::spawn(async move {
        while let Some(msg) = receiver.next().await {
            let msg = match msg {
                Ok(msg) => msg,
                Err(e) => {
                    tracing::error!("WebSocket error: {}", e);
                    break;
                }
            };

            match msg {
                Message::Text(text) => {
                    let delivered = state_clone
                        .relay(&room_clone, &member_id, text.as_str())
                        .await;
                    tracing::debug!(
                        "Relayed frame from '{}' in room '{}' to {} member(s)",
                        member_id,
                        room_clone,
                        delivered
                    );
                }
                Message::Ping(_) => {
                    tracing::debug!("Received ping");
                    // Ping/pong is handled automatically by the WebSocket protocol
                }
                Message::Close(_) => {
                    tracing::info!("Member '{}' requested close", member_id);
                    break;
                }
                _ => {}
            }
        }
    });

    // Spawn a task to forward relayed frames to this connection
    let mut send_task = tokio::spawn(async move {
        while let Some(frame) = rx.recv().await {
            if sender.send(Message::Text(frame.into())).await.is_err() {
                break;
            }
        }
    });

    // If any one of the tasks completes, abort the other
    tokio::select! {
        _ = &mut recv_task => send_task.abort(),
        _ = &mut send_task => recv_task.abort(),
    };

    state.leave(&room_id, &member_id).await;
    tracing::info!("Member '{}' left room '{}'", member_id, room_id);
}
