//! WebSocket envelope DTOs.
//!
//! Every text frame on `/ws/{room_id}` is one JSON object tagged by `type`:
//!
//! ```json
//! {"type":"chat","payload":{"room_id":"r1","sender":"A","content":"hi","message_type":"text"}}
//! {"type":"offer","sdp":{"type":"offer","sdp":"v=0..."},"call_id":"..."}
//! {"type":"answer","sdp":{"type":"answer","sdp":"v=0..."},"call_id":"..."}
//! {"type":"ice","candidate":{"candidate":"candidate:...","sdpMid":"0","sdpMLineIndex":0}}
//! ```
//!
//! Any envelope may also carry `from`, the sender's session id.

use nebula_server::infrastructure::dto::http::MessageDto;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::message::{chat_message_from_dto, chat_message_to_dto};
use crate::domain::{
    CallId, IceCandidate, SdpType, SessionDescription, SessionId, Signal, SignalingEnvelope,
    ValueObjectError,
};

/// `RTCSessionDescriptionInit` JSON shape
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionDescriptionDto {
    #[serde(rename = "type")]
    pub sdp_type: String,
    pub sdp: String,
}

/// `RTCIceCandidateInit` JSON shape
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IceCandidateDto {
    pub candidate: String,
    #[serde(rename = "sdpMid", default, skip_serializing_if = "Option::is_none")]
    pub sdp_mid: Option<String>,
    #[serde(
        rename = "sdpMLineIndex",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub sdp_mline_index: Option<u16>,
    #[serde(
        rename = "usernameFragment",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub username_fragment: Option<String>,
}

/// One relay frame
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum EnvelopeDto {
    Chat {
        payload: MessageDto,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        from: Option<String>,
    },
    Offer {
        sdp: SessionDescriptionDto,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        from: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        call_id: Option<String>,
    },
    Answer {
        sdp: SessionDescriptionDto,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        from: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        call_id: Option<String>,
    },
    Ice {
        candidate: IceCandidateDto,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        from: Option<String>,
    },
    /// Any other `type`; ignored by receivers
    #[serde(other)]
    Unknown,
}

/// Why an inbound frame could not be turned into an envelope
#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("Malformed envelope: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Invalid chat payload: {0}")]
    Chat(#[from] ValueObjectError),

    #[error("Session description type mismatch: expected {expected}, got {actual}")]
    SdpType {
        expected: &'static str,
        actual: String,
    },
}

/// Parse one text frame.
///
/// Returns `Ok(None)` for well formed frames of an unknown type.
pub fn decode_envelope(text: &str) -> Result<Option<SignalingEnvelope>, DecodeError> {
    let dto: EnvelopeDto = serde_json::from_str(text)?;
    let envelope = match dto {
        EnvelopeDto::Chat { payload, from } => SignalingEnvelope {
            from: parse_from(from),
            signal: Signal::Chat(chat_message_from_dto(payload)?),
        },
        EnvelopeDto::Offer { sdp, from, call_id } => SignalingEnvelope {
            from: parse_from(from),
            signal: Signal::Offer {
                call_id: call_id.as_deref().and_then(CallId::parse),
                description: description_from_dto(sdp, SdpType::Offer)?,
            },
        },
        EnvelopeDto::Answer { sdp, from, call_id } => SignalingEnvelope {
            from: parse_from(from),
            signal: Signal::Answer {
                call_id: call_id.as_deref().and_then(CallId::parse),
                description: description_from_dto(sdp, SdpType::Answer)?,
            },
        },
        EnvelopeDto::Ice { candidate, from } => SignalingEnvelope {
            from: parse_from(from),
            signal: Signal::IceCandidate(IceCandidate {
                candidate: candidate.candidate,
                sdp_mid: candidate.sdp_mid,
                sdp_mline_index: candidate.sdp_mline_index,
                username_fragment: candidate.username_fragment,
            }),
        },
        EnvelopeDto::Unknown => return Ok(None),
    };
    Ok(Some(envelope))
}

/// Serialize an envelope into one text frame.
pub fn encode_envelope(envelope: &SignalingEnvelope) -> Result<String, serde_json::Error> {
    serde_json::to_string(&EnvelopeDto::from(envelope))
}

impl From<&SignalingEnvelope> for EnvelopeDto {
    fn from(envelope: &SignalingEnvelope) -> Self {
        let from = envelope.from.as_ref().map(|id| id.as_str().to_string());
        match &envelope.signal {
            Signal::Chat(message) => EnvelopeDto::Chat {
                payload: chat_message_to_dto(message),
                from,
            },
            Signal::Offer {
                call_id,
                description,
            } => EnvelopeDto::Offer {
                sdp: description_to_dto(description),
                from,
                call_id: call_id.as_ref().map(|id| id.as_str().to_string()),
            },
            Signal::Answer {
                call_id,
                description,
            } => EnvelopeDto::Answer {
                sdp: description_to_dto(description),
                from,
                call_id: call_id.as_ref().map(|id| id.as_str().to_string()),
            },
            Signal::IceCandidate(candidate) => EnvelopeDto::Ice {
                candidate: IceCandidateDto {
                    candidate: candidate.candidate.clone(),
                    sdp_mid: candidate.sdp_mid.clone(),
                    sdp_mline_index: candidate.sdp_mline_index,
                    username_fragment: candidate.username_fragment.clone(),
                },
                from,
            },
        }
    }
}

fn parse_from(from: Option<String>) -> Option<SessionId> {
    from.as_deref().and_then(SessionId::parse)
}

fn description_from_dto(
    dto: SessionDescriptionDto,
    expected: SdpType,
) -> Result<SessionDescription, DecodeError> {
    if dto.sdp_type != expected.as_str() {
        return Err(DecodeError::SdpType {
            expected: expected.as_str(),
            actual: dto.sdp_type,
        });
    }
    Ok(SessionDescription {
        sdp_type: expected,
        sdp: dto.sdp,
    })
}

fn description_to_dto(description: &SessionDescription) -> SessionDescriptionDto {
    SessionDescriptionDto {
        sdp_type: description.sdp_type.as_str().to_string(),
        sdp: description.sdp.clone(),
    }
}
