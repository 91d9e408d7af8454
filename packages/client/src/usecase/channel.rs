//! Signaling channel: one reconnectable duplex connection to a room relay.
//!
//! The channel owns a pump task per connection. The pump opens the link
//! through the [`SignalingConnector`], decodes inbound frames and reports
//! everything as [`ChannelNotice`]s tagged with the connection generation.
//! Notices from an older generation are ignored by [`SignalingChannel::on_notice`].

use std::fmt;
use std::sync::Arc;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::domain::{RoomId, SignalingConnector, SignalingEnvelope, SignalingLink};
use crate::infrastructure::dto::websocket::{decode_envelope, encode_envelope};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelState {
    Idle,
    Connecting,
    Open,
    Closed,
}

impl fmt::Display for ChannelState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ChannelState::Idle => "idle",
            ChannelState::Connecting => "connecting",
            ChannelState::Open => "open",
            ChannelState::Closed => "closed",
        };
        write!(f, "{name}")
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChannelEvent {
    Opened,
    Closed { reason: Option<String> },
    Envelope(SignalingEnvelope),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChannelNotice {
    pub generation: u64,
    pub event: ChannelEvent,
}

pub struct SignalingChannel {
    connector: Arc<dyn SignalingConnector>,
    notices: mpsc::UnboundedSender<ChannelNotice>,
    state: ChannelState,
    generation: u64,
    room_id: Option<RoomId>,
    outbound: Option<mpsc::UnboundedSender<String>>,
    pump: Option<JoinHandle<()>>,
}

impl SignalingChannel {
    pub fn new(
        connector: Arc<dyn SignalingConnector>,
        notices: mpsc::UnboundedSender<ChannelNotice>,
    ) -> Self {
        Self {
            connector,
            notices,
            state: ChannelState::Idle,
            generation: 0,
            room_id: None,
            outbound: None,
            pump: None,
        }
    }

    pub fn state(&self) -> ChannelState {
        self.state
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn room_id(&self) -> Option<&RoomId> {
        self.room_id.as_ref()
    }

    /// Open a connection to `room_id`, closing the current one first.
    pub fn connect(&mut self, room_id: RoomId) {
        self.disconnect();
        self.generation += 1;
        self.state = ChannelState::Connecting;
        info!("Connecting signaling channel to room {room_id}");

        let (outbound_tx, outbound_rx) = mpsc::unbounded_channel();
        self.outbound = Some(outbound_tx);
        self.pump = Some(tokio::spawn(pump(
            Arc::clone(&self.connector),
            room_id.clone(),
            self.generation,
            outbound_rx,
            self.notices.clone(),
        )));
        self.room_id = Some(room_id);
    }

    /// Queue an envelope for the relay.
    ///
    /// Returns `false` when the channel is not open; the envelope is dropped.
    pub fn send(&self, envelope: &SignalingEnvelope) -> bool {
        let outbound = match (&self.outbound, self.state) {
            (Some(outbound), ChannelState::Open) => outbound,
            _ => {
                debug!(
                    "Dropping {} envelope: channel {}",
                    envelope.signal.name(),
                    self.state
                );
                return false;
            }
        };
        let text = match encode_envelope(envelope) {
            Ok(text) => text,
            Err(e) => {
                warn!("Failed to encode {} envelope: {}", envelope.signal.name(), e);
                return false;
            }
        };
        outbound.send(text).is_ok()
    }

    /// Close the current connection, if any. No notice is emitted.
    pub fn disconnect(&mut self) {
        if let Some(pump) = self.pump.take() {
            pump.abort();
        }
        self.outbound = None;
        if self.state != ChannelState::Idle {
            if self.state != ChannelState::Closed {
                info!("Signaling channel generation {} closed", self.generation);
            }
            self.state = ChannelState::Closed;
        }
    }

    /// Apply a notice from a pump. Returns the event if it belongs to the
    /// current connection.
    pub fn on_notice(&mut self, notice: ChannelNotice) -> Option<ChannelEvent> {
        if notice.generation != self.generation || self.state == ChannelState::Closed {
            debug!(
                "Ignoring notice from channel generation {} (current {})",
                notice.generation, self.generation
            );
            return None;
        }
        match &notice.event {
            ChannelEvent::Opened => {
                self.state = ChannelState::Open;
            }
            ChannelEvent::Closed { reason } => {
                match reason {
                    Some(reason) => warn!("Signaling channel closed: {reason}"),
                    None => info!("Signaling channel closed by relay"),
                }
                self.state = ChannelState::Closed;
                self.outbound = None;
                self.pump = None;
            }
            ChannelEvent::Envelope(_) => {}
        }
        Some(notice.event)
    }
}

impl Drop for SignalingChannel {
    fn drop(&mut self) {
        if let Some(pump) = self.pump.take() {
            pump.abort();
        }
    }
}

async fn pump(
    connector: Arc<dyn SignalingConnector>,
    room_id: RoomId,
    generation: u64,
    mut outbound_rx: mpsc::UnboundedReceiver<String>,
    notices: mpsc::UnboundedSender<ChannelNotice>,
) {
    let notify = |event: ChannelEvent| {
        let _ = notices.send(ChannelNotice { generation, event });
    };

    let SignalingLink {
        outbound,
        mut inbound,
    } = match connector.connect(&room_id).await {
        Ok(link) => link,
        Err(e) => {
            notify(ChannelEvent::Closed {
                reason: Some(e.to_string()),
            });
            return;
        }
    };
    notify(ChannelEvent::Opened);

    loop {
        tokio::select! {
            frame = inbound.recv() => {
                let Some(text) = frame else {
                    break;
                };
                match decode_envelope(&text) {
                    Ok(Some(envelope)) => notify(ChannelEvent::Envelope(envelope)),
                    Ok(None) => debug!("Ignoring envelope of unknown type"),
                    Err(e) => debug!("Dropping inbound frame: {e}"),
                }
            }
            queued = outbound_rx.recv() => {
                let Some(text) = queued else {
                    break;
                };
                if outbound.send(text).is_err() {
                    break;
                }
            }
        }
    }
    notify(ChannelEvent::Closed { reason: None });
}
