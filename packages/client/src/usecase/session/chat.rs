//! Chat: sending, receiving and acknowledging messages.

use tracing::{debug, info, warn};

use super::SessionController;
use crate::domain::{
    ChatMessage, LocalMessageId, MessageContent, Signal, SignalingEnvelope, StoreError, Timestamp,
};
use crate::usecase::error::SessionError;
use crate::usecase::event::{SessionEvent, SessionUpdate};

impl SessionController {
    /// Show a message at once, then persist and broadcast it independently.
    pub(super) fn send_message(&mut self, text: String) {
        let Some(room) = self.room.as_mut() else {
            self.updates.refuse(SessionError::NoActiveRoom);
            return;
        };
        let content = match MessageContent::new(text) {
            Ok(content) => content,
            Err(e) => {
                debug!("Not sending message: {e}");
                return;
            }
        };
        let message = ChatMessage::local(
            room.id.clone(),
            self.name.clone(),
            content,
            Timestamp::now(),
        );
        let Some(local_id) = room.timeline.append_local(message.clone()) else {
            return;
        };
        self.updates
            .emit(SessionUpdate::MessageAppended(message.clone()));

        let store = self.deps.store.clone();
        let events = self.events.clone();
        let room_generation = room.generation;
        let persisted = message.clone();
        tokio::spawn(async move {
            let result = store.persist(&persisted).await;
            let _ = events.send(SessionEvent::MessagePersisted {
                room_generation,
                local_id,
                result,
            });
        });

        let envelope = SignalingEnvelope::new(self.session_id.clone(), Signal::Chat(message));
        if !self.channel.send(&envelope) {
            info!("Message kept locally; signaling channel is not open");
        }
    }

    pub(super) fn on_message_persisted(
        &mut self,
        room_generation: u64,
        local_id: LocalMessageId,
        result: Result<(), StoreError>,
    ) {
        let Some(room) = self.room.as_mut().filter(|room| room.generation == room_generation)
        else {
            debug!("Ignoring persist result for a room that is no longer active");
            return;
        };
        match result {
            Ok(()) => {
                if let Some(message) = room.timeline.confirm(local_id) {
                    self.updates
                        .emit(SessionUpdate::MessageConfirmed(message.clone()));
                }
            }
            Err(e) => warn!("Failed to persist message: {e}"),
        }
    }

    pub(super) fn on_remote_chat(&mut self, message: ChatMessage) {
        let Some(room) = self.room.as_mut() else {
            return;
        };
        if room.timeline.append_remote(message.clone()) {
            self.updates.emit(SessionUpdate::MessageAppended(message));
        }
    }
}
