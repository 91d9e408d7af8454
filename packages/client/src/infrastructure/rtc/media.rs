//! Local media backed by sample tracks.
//!
//! Capture devices are not opened: each requested kind yields a track
//! descriptor that the peer adapter materialises as a `TrackLocalStaticSample`
//! which stays silent until a capture pipeline writes samples into it.

use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use tracing::info;

use crate::domain::{LocalStream, MediaConstraints, MediaDevices, MediaError};

#[derive(Debug, Default)]
pub struct SampleTrackMedia {
    live_streams: AtomicUsize,
}

impl SampleTrackMedia {
    pub fn new() -> Self {
        Self::default()
    }

    /// Streams handed out and not yet released.
    pub fn live_streams(&self) -> usize {
        self.live_streams.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl MediaDevices for SampleTrackMedia {
    async fn get_user_media(
        &self,
        constraints: MediaConstraints,
    ) -> Result<LocalStream, MediaError> {
        if !constraints.audio && !constraints.video {
            return Err(MediaError::Unavailable(
                "neither audio nor video requested".to_string(),
            ));
        }
        let stream = LocalStream::from_constraints(constraints);
        self.live_streams.fetch_add(1, Ordering::SeqCst);
        info!(
            "Local stream {} ready with {} track(s)",
            stream.id,
            stream.tracks.len()
        );
        Ok(stream)
    }

    fn release(&self, stream: &LocalStream) {
        let _ = self
            .live_streams
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1));
        info!("Local stream {} released", stream.id);
    }
}
