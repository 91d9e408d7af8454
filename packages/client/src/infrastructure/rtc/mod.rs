//! `webrtc` crate backed peer connections and local media.

pub mod media;
pub mod peer;

pub use media::SampleTrackMedia;
pub use peer::{WebRtcPeer, WebRtcPeerFactory};
