//! WebSocket connector for the room relay.
//!
//! Each connection is split into a writer task draining the outbound queue
//! into the socket and a reader task forwarding text frames to the inbound
//! queue.

use async_trait::async_trait;
use futures_util::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tokio_tungstenite::{connect_async, tungstenite::protocol::Message};
use tracing::{debug, info, warn};

use crate::domain::{ChannelError, RoomId, SignalingConnector, SignalingLink};

/// Connects to `{ws_base_url}/ws/{room_id}`.
#[derive(Debug, Clone)]
pub struct WsConnector {
    ws_base_url: String,
}

impl WsConnector {
    /// `ws_base_url` is the relay origin, e.g. `ws://localhost:8000`.
    pub fn new(ws_base_url: impl Into<String>) -> Self {
        Self {
            ws_base_url: ws_base_url.into().trim_end_matches('/').to_string(),
        }
    }

    pub fn room_url(&self, room_id: &RoomId) -> String {
        format!("{}/ws/{}", self.ws_base_url, room_id)
    }
}

#[async_trait]
impl SignalingConnector for WsConnector {
    async fn connect(&self, room_id: &RoomId) -> Result<SignalingLink, ChannelError> {
        let url = self.room_url(room_id);
        let (stream, _response) = connect_async(url.as_str())
            .await
            .map_err(|e| ChannelError::ConnectFailed(e.to_string()))?;
        info!("Connected to {url}");

        let (mut sender, mut receiver) = stream.split();
        let (outbound_tx, mut outbound_rx) = mpsc::unbounded_channel::<String>();
        let (inbound_tx, inbound_rx) = mpsc::unbounded_channel::<String>();

        tokio::spawn(async move {
            while let Some(text) = outbound_rx.recv().await {
                if let Err(e) = sender.send(Message::Text(text.into())).await {
                    warn!("Failed to write to relay: {e}");
                    break;
                }
            }
            let _ = sender.close().await;
        });

        tokio::spawn(async move {
            while let Some(frame) = receiver.next().await {
                match frame {
                    Ok(Message::Text(text)) => {
                        if inbound_tx.send(text.as_str().to_string()).is_err() {
                            break;
                        }
                    }
                    Ok(Message::Close(_)) => break,
                    Ok(_) => {}
                    Err(e) => {
                        debug!("Relay connection error: {e}");
                        break;
                    }
                }
            }
        });

        Ok(SignalingLink {
            outbound: outbound_tx,
            inbound: inbound_rx,
        })
    }
}
