//! Infrastructure layer: wire DTOs and adapters for the relay, the history
//! service and WebRTC.

pub mod dto;
pub mod repository;
pub mod rtc;
pub mod signaling;
