//! Peer connection and media abstractions.
//!
//! The negotiation logic talks to these traits only. The WebRTC backed
//! implementation lives in `infrastructure::webrtc`; tests use fakes.

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::mpsc;
use uuid::Uuid;

use super::error::{MediaError, NegotiationError};
use super::value_object::NegotiationId;

/// Kind of a session description.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SdpType {
    Offer,
    Answer,
}

impl SdpType {
    pub fn as_str(&self) -> &'static str {
        match self {
            SdpType::Offer => "offer",
            SdpType::Answer => "answer",
        }
    }
}

/// Session description exchanged during negotiation.
///
/// The SDP text is opaque to the client and passed through untouched.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionDescription {
    pub sdp_type: SdpType,
    pub sdp: String,
}

impl SessionDescription {
    pub fn offer(sdp: impl Into<String>) -> Self {
        Self {
            sdp_type: SdpType::Offer,
            sdp: sdp.into(),
        }
    }

    pub fn answer(sdp: impl Into<String>) -> Self {
        Self {
            sdp_type: SdpType::Answer,
            sdp: sdp.into(),
        }
    }
}

/// ICE candidate in its JSON form.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IceCandidate {
    pub candidate: String,
    pub sdp_mid: Option<String>,
    pub sdp_mline_index: Option<u16>,
    pub username_fragment: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrackKind {
    Audio,
    Video,
}

impl fmt::Display for TrackKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TrackKind::Audio => write!(f, "audio"),
            TrackKind::Video => write!(f, "video"),
        }
    }
}

/// What to request from the media devices.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MediaConstraints {
    pub audio: bool,
    pub video: bool,
}

impl Default for MediaConstraints {
    fn default() -> Self {
        Self {
            audio: true,
            video: true,
        }
    }
}

/// A captured local track.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocalTrack {
    pub id: String,
    pub stream_id: String,
    pub kind: TrackKind,
    pub live: bool,
}

/// Local audio/video stream owned by the session controller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocalStream {
    pub id: String,
    pub tracks: Vec<LocalTrack>,
}

impl LocalStream {
    /// Build a stream with one live track per requested kind.
    pub fn from_constraints(constraints: MediaConstraints) -> Self {
        let id = Uuid::new_v4().to_string();
        let kinds = [
            (constraints.audio, TrackKind::Audio),
            (constraints.video, TrackKind::Video),
        ];
        let tracks = kinds
            .into_iter()
            .filter(|(wanted, _)| *wanted)
            .map(|(_, kind)| LocalTrack {
                id: Uuid::new_v4().to_string(),
                stream_id: id.clone(),
                kind,
                live: true,
            })
            .collect();
        Self { id, tracks }
    }

    /// Stop every track. Stopping twice is harmless.
    pub fn stop_all(&mut self) {
        for track in &mut self.tracks {
            track.live = false;
        }
    }

    pub fn is_live(&self) -> bool {
        self.tracks.iter().any(|track| track.live)
    }
}

/// A track received from the remote peer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteTrack {
    pub id: String,
    pub stream_id: String,
    pub kind: TrackKind,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PeerConnectionState {
    New,
    Connecting,
    Connected,
    Disconnected,
    Failed,
    Closed,
}

impl fmt::Display for PeerConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            PeerConnectionState::New => "new",
            PeerConnectionState::Connecting => "connecting",
            PeerConnectionState::Connected => "connected",
            PeerConnectionState::Disconnected => "disconnected",
            PeerConnectionState::Failed => "failed",
            PeerConnectionState::Closed => "closed",
        };
        write!(f, "{name}")
    }
}

/// Asynchronous notifications raised by a peer connection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PeerEvent {
    LocalCandidate(IceCandidate),
    RemoteTrack(RemoteTrack),
    StateChanged(PeerConnectionState),
}

/// A peer event tagged with the negotiation that owns the connection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PeerSignal {
    pub negotiation: NegotiationId,
    pub event: PeerEvent,
}

/// Where a peer connection reports its events.
#[derive(Debug, Clone)]
pub struct PeerEventSink {
    negotiation: NegotiationId,
    tx: mpsc::UnboundedSender<PeerSignal>,
}

impl PeerEventSink {
    pub fn new(negotiation: NegotiationId, tx: mpsc::UnboundedSender<PeerSignal>) -> Self {
        Self { negotiation, tx }
    }

    pub fn negotiation(&self) -> NegotiationId {
        self.negotiation
    }

    /// Forward an event. Returns `false` once the session is gone.
    pub fn emit(&self, event: PeerEvent) -> bool {
        self.tx
            .send(PeerSignal {
                negotiation: self.negotiation,
                event,
            })
            .is_ok()
    }
}

/// One peer connection, as used by the negotiation state machine.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait PeerConnection: Send + Sync {
    /// Attach a local track so it is offered to the remote peer.
    async fn add_track(&self, track: &LocalTrack) -> Result<(), NegotiationError>;

    async fn create_offer(&self) -> Result<SessionDescription, NegotiationError>;

    async fn create_answer(&self) -> Result<SessionDescription, NegotiationError>;

    async fn set_local_description(
        &self,
        description: &SessionDescription,
    ) -> Result<(), NegotiationError>;

    async fn set_remote_description(
        &self,
        description: &SessionDescription,
    ) -> Result<(), NegotiationError>;

    async fn add_ice_candidate(&self, candidate: &IceCandidate) -> Result<(), NegotiationError>;

    /// Release the connection. Further calls on it may fail.
    async fn close(&self);
}

/// Creates peer connections that report into the given sink.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait PeerConnectionFactory: Send + Sync {
    async fn create(
        &self,
        events: PeerEventSink,
    ) -> Result<Arc<dyn PeerConnection>, NegotiationError>;
}

/// Access to local capture devices.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait MediaDevices: Send + Sync {
    async fn get_user_media(
        &self,
        constraints: MediaConstraints,
    ) -> Result<LocalStream, MediaError>;

    /// Give the devices behind a stopped stream back to the platform.
    fn release(&self, stream: &LocalStream);
}
