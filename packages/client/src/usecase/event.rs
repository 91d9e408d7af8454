//! Messages flowing into and out of the session controller.

use tokio::sync::oneshot;

use super::channel::ChannelState;
use crate::domain::{
    ChatMessage, LocalMessageId, LocalStream, MediaError, NegotiationError, NegotiationPhase,
    PeerConnectionState, RemoteTrack, RoomId, SenderName, SessionDescription, SessionId,
    StoreError, Ticket,
};

/// Requests from the presentation layer.
#[derive(Debug)]
pub enum Intent {
    JoinRoom(String),
    SetName(String),
    SendMessage(String),
    StartCall,
    EndCall,
    Leave,
    Snapshot(oneshot::Sender<SessionSnapshot>),
    Shutdown,
}

/// Progress of the current call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CallStatus {
    AcquiringMedia,
    Phase(NegotiationPhase),
    /// Offer/answer exchange finished; media flows once ICE connects
    Established,
    Connection(PeerConnectionState),
    Ended,
    Failed(String),
}

/// Notifications for the presentation layer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionUpdate {
    Channel(ChannelState),
    /// A new room became active; its timeline starts empty
    TimelineReset(RoomId),
    HistoryLoaded {
        room_id: RoomId,
        messages: Vec<ChatMessage>,
    },
    MessageAppended(ChatMessage),
    MessageConfirmed(ChatMessage),
    Call(CallStatus),
    LocalMedia(LocalStream),
    RemoteTrack(RemoteTrack),
    Notice(String),
}

/// Point-in-time view of the session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionSnapshot {
    pub session_id: SessionId,
    pub name: SenderName,
    pub room_id: Option<RoomId>,
    pub channel: ChannelState,
    pub phase: NegotiationPhase,
    pub local_media_live: bool,
    pub messages: Vec<ChatMessage>,
}

/// Completions of work the controller spawned.
///
/// Room scoped results carry the room generation they were issued for;
/// negotiation results carry their ticket.
#[derive(Debug)]
pub(crate) enum SessionEvent {
    HistoryLoaded {
        room_generation: u64,
        result: Result<Vec<ChatMessage>, StoreError>,
    },
    MessagePersisted {
        room_generation: u64,
        local_id: LocalMessageId,
        result: Result<(), StoreError>,
    },
    MediaAcquired {
        room_generation: u64,
        request: u64,
        result: Result<LocalStream, MediaError>,
    },
    OfferCreated {
        ticket: Ticket,
        result: Result<SessionDescription, NegotiationError>,
    },
    AnswerCreated {
        ticket: Ticket,
        result: Result<SessionDescription, NegotiationError>,
    },
    AnswerApplied {
        ticket: Ticket,
        result: Result<(), NegotiationError>,
    },
    ReconnectDue {
        room_generation: u64,
        channel_generation: u64,
    },
}
