//! Session controller: the single actor that owns the active room.
//!
//! The controller runs as one tokio task. It selects over user intents,
//! completions of work it spawned, peer connection events and signaling
//! channel notices, and is the only place where session state changes.
//! Nothing here is behind a lock.

mod call;
mod chat;
mod room;

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, info};

use super::channel::{ChannelNotice, SignalingChannel};
use super::error::SessionError;
use super::event::{Intent, SessionEvent, SessionSnapshot, SessionUpdate};
use crate::domain::{
    LocalStream, MediaConstraints, MediaDevices, MessageStore, Negotiation, NegotiationPhase,
    PeerConnectionFactory, PeerSignal, RoomId, SenderName, SessionId, Signal, SignalingConnector,
    SignalingEnvelope, Timeline,
};

/// Behaviour knobs of a session.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    pub display_name: SenderName,
    /// Delay before reconnecting after an unexpected channel loss; `None`
    /// disables reconnecting
    pub reconnect_after: Option<Duration>,
    pub media_constraints: MediaConstraints,
}

/// Collaborators of a session.
#[derive(Clone)]
pub struct SessionDeps {
    pub store: Arc<dyn MessageStore>,
    pub connector: Arc<dyn SignalingConnector>,
    pub peers: Arc<dyn PeerConnectionFactory>,
    pub media: Arc<dyn MediaDevices>,
}

/// Handle used by the presentation layer to drive a running session.
pub struct SessionHandle {
    intents: mpsc::UnboundedSender<Intent>,
    task: JoinHandle<()>,
}

impl SessionHandle {
    pub fn send(&self, intent: Intent) -> Result<(), SessionError> {
        self.intents.send(intent).map_err(|_| SessionError::Closed)
    }

    pub async fn snapshot(&self) -> Result<SessionSnapshot, SessionError> {
        let (tx, rx) = oneshot::channel();
        self.send(Intent::Snapshot(tx))?;
        rx.await.map_err(|_| SessionError::Closed)
    }

    /// Stop the session, releasing the room, and wait for the actor to exit.
    pub async fn shutdown(self) {
        let _ = self.intents.send(Intent::Shutdown);
        if let Err(e) = self.task.await {
            debug!("Session task ended abnormally: {e}");
        }
    }
}

/// Sender side of the update stream.
#[derive(Clone)]
struct Updates(mpsc::UnboundedSender<SessionUpdate>);

impl Updates {
    fn emit(&self, update: SessionUpdate) {
        let _ = self.0.send(update);
    }

    fn notice(&self, message: impl Into<String>) {
        self.emit(SessionUpdate::Notice(message.into()));
    }

    fn refuse(&self, error: SessionError) {
        self.notice(error.to_string());
    }
}

/// Call related state of the active room.
struct Call {
    negotiation: Option<Negotiation>,
    local_stream: Option<LocalStream>,
    /// Outstanding media request, if the user started a call
    pending_media: Option<u64>,
    /// Last phase reported to the presentation layer
    reported_phase: NegotiationPhase,
}

impl Default for Call {
    fn default() -> Self {
        Self {
            negotiation: None,
            local_stream: None,
            pending_media: None,
            reported_phase: NegotiationPhase::Idle,
        }
    }
}

impl Call {
    fn phase(&self) -> NegotiationPhase {
        self.negotiation
            .as_ref()
            .map_or(NegotiationPhase::Idle, Negotiation::phase)
    }

    fn is_active(&self) -> bool {
        self.pending_media.is_some()
            || self.negotiation.as_ref().is_some_and(Negotiation::is_busy)
    }
}

struct ActiveRoom {
    id: RoomId,
    generation: u64,
    timeline: Timeline,
    call: Call,
}

pub struct SessionController {
    session_id: SessionId,
    name: SenderName,
    config: SessionConfig,
    deps: SessionDeps,
    channel: SignalingChannel,
    room: Option<ActiveRoom>,
    room_generation: u64,
    negotiation_seq: u64,
    media_seq: u64,
    events: mpsc::UnboundedSender<SessionEvent>,
    peer_events: mpsc::UnboundedSender<PeerSignal>,
    updates: Updates,
}

struct Inboxes {
    intents: mpsc::UnboundedReceiver<Intent>,
    events: mpsc::UnboundedReceiver<SessionEvent>,
    peer_events: mpsc::UnboundedReceiver<PeerSignal>,
    notices: mpsc::UnboundedReceiver<ChannelNotice>,
}

impl SessionController {
    /// Start a session actor.
    ///
    /// Returns the handle to drive it and the stream of updates it emits.
    pub fn spawn(
        config: SessionConfig,
        deps: SessionDeps,
    ) -> (SessionHandle, mpsc::UnboundedReceiver<SessionUpdate>) {
        let (intents_tx, intents_rx) = mpsc::unbounded_channel();
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let (peer_tx, peer_rx) = mpsc::unbounded_channel();
        let (notices_tx, notices_rx) = mpsc::unbounded_channel();
        let (updates_tx, updates_rx) = mpsc::unbounded_channel();

        let controller = Self {
            session_id: SessionId::generate(),
            name: config.display_name.clone(),
            channel: SignalingChannel::new(Arc::clone(&deps.connector), notices_tx),
            config,
            deps,
            room: None,
            room_generation: 0,
            negotiation_seq: 0,
            media_seq: 0,
            events: events_tx,
            peer_events: peer_tx,
            updates: Updates(updates_tx),
        };
        info!("Session {} started", controller.session_id);

        let inboxes = Inboxes {
            intents: intents_rx,
            events: events_rx,
            peer_events: peer_rx,
            notices: notices_rx,
        };
        let task = tokio::spawn(controller.run(inboxes));
        (
            SessionHandle {
                intents: intents_tx,
                task,
            },
            updates_rx,
        )
    }

    async fn run(mut self, mut inboxes: Inboxes) {
        loop {
            tokio::select! {
                intent = inboxes.intents.recv() => match intent {
                    Some(Intent::Shutdown) | None => break,
                    Some(intent) => self.handle_intent(intent),
                },
                Some(event) = inboxes.events.recv() => self.handle_event(event).await,
                Some(signal) = inboxes.peer_events.recv() => self.handle_peer_signal(signal),
                Some(notice) = inboxes.notices.recv() => self.handle_notice(notice).await,
            }
        }
        self.teardown_room();
        info!("Session {} stopped", self.session_id);
    }

    fn handle_intent(&mut self, intent: Intent) {
        match intent {
            Intent::JoinRoom(room) => match RoomId::new(room) {
                Ok(room_id) => self.join_room(room_id),
                Err(e) => self.updates.refuse(e.into()),
            },
            Intent::SetName(name) => match SenderName::new(name) {
                Ok(name) => {
                    info!("Display name set to {name}");
                    self.updates.notice(format!("You are now {name}"));
                    self.name = name;
                }
                Err(e) => self.updates.refuse(e.into()),
            },
            Intent::SendMessage(text) => self.send_message(text),
            Intent::StartCall => self.start_call(),
            Intent::EndCall => self.end_call(),
            Intent::Leave => self.leave_room(),
            Intent::Snapshot(reply) => {
                let _ = reply.send(self.snapshot());
            }
            Intent::Shutdown => {}
        }
    }

    async fn handle_event(&mut self, event: SessionEvent) {
        match event {
            SessionEvent::HistoryLoaded {
                room_generation,
                result,
            } => self.on_history_loaded(room_generation, result),
            SessionEvent::MessagePersisted {
                room_generation,
                local_id,
                result,
            } => self.on_message_persisted(room_generation, local_id, result),
            SessionEvent::MediaAcquired {
                room_generation,
                request,
                result,
            } => self.on_media_acquired(room_generation, request, result).await,
            SessionEvent::OfferCreated { ticket, result } => {
                let commands = match self.negotiation_for(ticket.negotiation) {
                    Some(negotiation) => negotiation.on_offer_created(ticket, result),
                    None => Vec::new(),
                };
                self.execute(commands).await;
            }
            SessionEvent::AnswerCreated { ticket, result } => {
                let commands = match self.negotiation_for(ticket.negotiation) {
                    Some(negotiation) => negotiation.on_answer_created(ticket, result),
                    None => Vec::new(),
                };
                self.execute(commands).await;
            }
            SessionEvent::AnswerApplied { ticket, result } => {
                let commands = match self.negotiation_for(ticket.negotiation) {
                    Some(negotiation) => negotiation.on_answer_applied(ticket, result),
                    None => Vec::new(),
                };
                self.execute(commands).await;
            }
            SessionEvent::ReconnectDue {
                room_generation,
                channel_generation,
            } => self.on_reconnect_due(room_generation, channel_generation),
        }
    }

    async fn handle_envelope(&mut self, envelope: SignalingEnvelope) {
        if envelope.from.as_ref() == Some(&self.session_id) {
            debug!("Ignoring echo of own {} envelope", envelope.signal.name());
            return;
        }
        let SignalingEnvelope { from, signal } = envelope;
        match signal {
            Signal::Chat(message) => self.on_remote_chat(message),
            Signal::Offer {
                call_id,
                description,
            } => self.on_remote_offer(description, from, call_id).await,
            Signal::Answer {
                call_id,
                description,
            } => self.on_remote_answer(description, call_id).await,
            Signal::IceCandidate(candidate) => self.on_remote_candidate(candidate).await,
        }
    }

    fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot {
            session_id: self.session_id.clone(),
            name: self.name.clone(),
            room_id: self.room.as_ref().map(|room| room.id.clone()),
            channel: self.channel.state(),
            phase: self
                .room
                .as_ref()
                .map_or(NegotiationPhase::Idle, |room| room.call.phase()),
            local_media_live: self
                .room
                .as_ref()
                .and_then(|room| room.call.local_stream.as_ref())
                .is_some_and(LocalStream::is_live),
            messages: self
                .room
                .as_ref()
                .map(|room| room.timeline.snapshot())
                .unwrap_or_default(),
        }
    }
}
