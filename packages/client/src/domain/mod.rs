//! Domain layer of the client: chat timeline, signaling envelopes and the
//! call negotiation state machine.
//!
//! Room ids, sender names and message content reuse the server's value
//! objects so both ends validate input identically.

pub mod error;
pub mod media;
pub mod message;
pub mod negotiation;
pub mod repository;
pub mod signaling;
pub mod timeline;
pub mod value_object;

pub use error::{ChannelError, MediaError, NegotiationError, StoreError};
pub use media::{
    IceCandidate, LocalStream, LocalTrack, MediaConstraints, MediaDevices, PeerConnection,
    PeerConnectionFactory, PeerConnectionState, PeerEvent, PeerEventSink, PeerSignal, RemoteTrack,
    SdpType, SessionDescription, TrackKind,
};
pub use message::{ChatMessage, Origin};
pub use negotiation::{Negotiation, NegotiationCommand, NegotiationPhase, Ticket};
pub use repository::MessageStore;
pub use signaling::{Signal, SignalingConnector, SignalingEnvelope, SignalingLink};
pub use timeline::Timeline;
pub use value_object::{
    CallId, LocalMessageId, MessageContent, MessageKind, NegotiationId, RoomId, SenderName,
    SessionId, Timestamp, ValueObjectError,
};
