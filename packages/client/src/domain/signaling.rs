//! Signaling envelopes and the relay connection seam.

use async_trait::async_trait;
use tokio::sync::mpsc;

use super::error::ChannelError;
use super::media::{IceCandidate, SessionDescription};
use super::message::ChatMessage;
use super::value_object::{CallId, RoomId, SessionId};

/// Payload of a signaling envelope.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Signal {
    Chat(ChatMessage),
    Offer {
        call_id: Option<CallId>,
        description: SessionDescription,
    },
    Answer {
        call_id: Option<CallId>,
        description: SessionDescription,
    },
    IceCandidate(IceCandidate),
}

impl Signal {
    pub fn name(&self) -> &'static str {
        match self {
            Signal::Chat(_) => "chat",
            Signal::Offer { .. } => "offer",
            Signal::Answer { .. } => "answer",
            Signal::IceCandidate(_) => "ice",
        }
    }
}

/// Message exchanged over the room relay.
///
/// `from` is absent on envelopes sent by clients that do not stamp their
/// session id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignalingEnvelope {
    pub from: Option<SessionId>,
    pub signal: Signal,
}

impl SignalingEnvelope {
    pub fn new(from: SessionId, signal: Signal) -> Self {
        Self {
            from: Some(from),
            signal,
        }
    }

    pub fn anonymous(signal: Signal) -> Self {
        Self { from: None, signal }
    }
}

/// Text frame pipes of one relay connection.
///
/// Dropping `outbound` closes the connection; `inbound` ends when the relay
/// goes away.
#[derive(Debug)]
pub struct SignalingLink {
    pub outbound: mpsc::UnboundedSender<String>,
    pub inbound: mpsc::UnboundedReceiver<String>,
}

/// Opens relay connections for a room.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait SignalingConnector: Send + Sync {
    async fn connect(&self, room_id: &RoomId) -> Result<SignalingLink, ChannelError>;
}
