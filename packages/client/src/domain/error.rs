//! Domain layer error definitions.

use thiserror::Error;

use super::negotiation::NegotiationPhase;

/// Errors raised by the signaling channel
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ChannelError {
    /// The relay could not be reached
    #[error("Failed to connect to signaling relay: {0}")]
    ConnectFailed(String),

    /// The channel is not open
    #[error("Signaling channel is not open")]
    NotOpen,
}

/// Errors raised while negotiating a call
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum NegotiationError {
    /// Operation attempted in a phase that does not allow it
    #[error("Cannot {operation} while {phase}")]
    InvalidState {
        operation: &'static str,
        phase: NegotiationPhase,
    },

    /// A session description was rejected by the peer connection
    #[error("Session description rejected: {0}")]
    Description(String),

    /// The peer connection itself failed
    #[error("Peer connection error: {0}")]
    PeerConnection(String),

    /// Remote ICE candidate could not be applied
    #[error("ICE candidate rejected: {0}")]
    Candidate(String),
}

/// Errors returned by the message history store
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum StoreError {
    /// The store could not be reached
    #[error("History store unreachable: {0}")]
    Transport(String),

    /// The store answered with a non-success status
    #[error("History store returned status {0}")]
    Status(u16),

    /// The response body could not be decoded
    #[error("Invalid history response: {0}")]
    Decode(String),
}

/// Errors raised while acquiring local media
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum MediaError {
    /// The user or platform refused access
    #[error("Media access denied")]
    PermissionDenied,

    /// No device matches the requested constraints
    #[error("Media unavailable: {0}")]
    Unavailable(String),
}
