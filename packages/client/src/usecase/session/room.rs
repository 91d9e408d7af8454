//! Room lifecycle: join, leave, channel notices and history.

use tracing::{debug, info, warn};

use super::{ActiveRoom, Call, SessionController};
use crate::domain::{ChatMessage, RoomId, StoreError, Timeline};
use crate::usecase::channel::{ChannelEvent, ChannelNotice, ChannelState};
use crate::usecase::error::SessionError;
use crate::usecase::event::{CallStatus, SessionEvent, SessionUpdate};

impl SessionController {
    /// Make `room_id` the active room.
    ///
    /// Joining the active room again only reconnects its channel.
    pub(super) fn join_room(&mut self, room_id: RoomId) {
        if self.room.as_ref().is_some_and(|room| room.id == room_id) {
            info!("Reconnecting to room {room_id}");
            self.channel.connect(room_id);
            self.updates
                .emit(SessionUpdate::Channel(ChannelState::Connecting));
            return;
        }

        self.teardown_room();
        self.room_generation += 1;
        let generation = self.room_generation;
        info!("Joining room {room_id} (generation {generation})");

        self.room = Some(ActiveRoom {
            id: room_id.clone(),
            generation,
            timeline: Timeline::new(room_id.clone()),
            call: Call::default(),
        });
        self.updates
            .emit(SessionUpdate::TimelineReset(room_id.clone()));

        self.channel.connect(room_id.clone());
        self.updates
            .emit(SessionUpdate::Channel(ChannelState::Connecting));

        let store = self.deps.store.clone();
        let events = self.events.clone();
        tokio::spawn(async move {
            let result = store.fetch_history(&room_id).await;
            let _ = events.send(SessionEvent::HistoryLoaded {
                room_generation: generation,
                result,
            });
        });
    }

    pub(super) fn leave_room(&mut self) {
        if self.room.is_none() {
            self.updates.refuse(SessionError::NoActiveRoom);
            return;
        }
        self.teardown_room();
    }

    /// Release the call and the channel of the active room, then forget it.
    pub(super) fn teardown_room(&mut self) {
        let Some(mut room) = self.room.take() else {
            return;
        };
        info!("Leaving room {}", room.id);
        if room.call.release(self.deps.media.as_ref()) {
            self.updates.emit(SessionUpdate::Call(CallStatus::Ended));
        }
        self.channel.disconnect();
        self.updates
            .emit(SessionUpdate::Channel(ChannelState::Closed));
    }

    pub(super) async fn handle_notice(&mut self, notice: ChannelNotice) {
        let Some(event) = self.channel.on_notice(notice) else {
            return;
        };
        match event {
            ChannelEvent::Opened => {
                self.updates.emit(SessionUpdate::Channel(ChannelState::Open));
            }
            ChannelEvent::Closed { reason } => {
                if let Some(reason) = reason {
                    self.updates.notice(format!("Signaling lost: {reason}"));
                }
                self.updates
                    .emit(SessionUpdate::Channel(ChannelState::Closed));
                self.schedule_reconnect();
            }
            ChannelEvent::Envelope(envelope) => self.handle_envelope(envelope).await,
        }
    }

    fn schedule_reconnect(&self) {
        let (Some(delay), Some(room)) = (self.config.reconnect_after, self.room.as_ref()) else {
            return;
        };
        info!("Reconnecting to room {} in {:?}", room.id, delay);
        let events = self.events.clone();
        let room_generation = room.generation;
        let channel_generation = self.channel.generation();
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            let _ = events.send(SessionEvent::ReconnectDue {
                room_generation,
                channel_generation,
            });
        });
    }

    pub(super) fn on_reconnect_due(&mut self, room_generation: u64, channel_generation: u64) {
        let Some(room) = self.room.as_ref() else {
            return;
        };
        if room.generation != room_generation
            || self.channel.generation() != channel_generation
            || self.channel.state() != ChannelState::Closed
        {
            debug!("Skipping reconnect: room or channel changed meanwhile");
            return;
        }
        let room_id = room.id.clone();
        self.channel.connect(room_id);
        self.updates
            .emit(SessionUpdate::Channel(ChannelState::Connecting));
    }

    pub(super) fn on_history_loaded(
        &mut self,
        room_generation: u64,
        result: Result<Vec<ChatMessage>, StoreError>,
    ) {
        let Some(room) = self.room.as_mut().filter(|room| room.generation == room_generation)
        else {
            debug!("Discarding history for a room that is no longer active");
            return;
        };
        match result {
            Ok(history) => {
                let loaded = room.timeline.load_history(history);
                info!("Loaded {loaded} messages of history for room {}", room.id);
                let messages = room.timeline.messages().take(loaded).cloned().collect();
                self.updates.emit(SessionUpdate::HistoryLoaded {
                    room_id: room.id.clone(),
                    messages,
                });
            }
            Err(e) => {
                warn!("Failed to load history for room {}: {}", room.id, e);
                self.updates.notice(format!("History unavailable: {e}"));
            }
        }
    }
}
