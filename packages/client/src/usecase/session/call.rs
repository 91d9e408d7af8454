//! Calls: media acquisition, negotiation commands and peer events.

use std::collections::VecDeque;

use tracing::{debug, info, warn};

use super::{Call, SessionController};
use crate::domain::{
    CallId, IceCandidate, LocalStream, LocalTrack, MediaDevices, MediaError, Negotiation,
    NegotiationCommand, NegotiationError, NegotiationId, NegotiationPhase, PeerConnection,
    PeerEvent, PeerEventSink, PeerSignal, SessionDescription, SessionId, Signal,
    SignalingEnvelope,
};
use crate::usecase::error::SessionError;
use crate::usecase::event::{CallStatus, SessionEvent, SessionUpdate};

impl Call {
    /// Live local tracks to attach to a peer connection.
    fn local_tracks(&self) -> Vec<LocalTrack> {
        self.local_stream
            .as_ref()
            .map(|stream| {
                stream
                    .tracks
                    .iter()
                    .filter(|track| track.live)
                    .cloned()
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Stop local media and close the peer connection.
    ///
    /// The negotiation stays in place in `Closed` so late results and
    /// envelopes for it are recognised and dropped. Returns whether anything
    /// was released.
    pub(super) fn release(&mut self, media: &dyn MediaDevices) -> bool {
        let mut released = self.pending_media.take().is_some();
        if let Some(mut stream) = self.local_stream.take() {
            stream.stop_all();
            media.release(&stream);
            released = true;
        }
        if let Some(peer) = self.negotiation.as_mut().and_then(Negotiation::close) {
            tokio::spawn(async move { peer.close().await });
            released = true;
        }
        self.reported_phase = self.phase();
        released
    }
}

impl SessionController {
    pub(super) fn start_call(&mut self) {
        let Some(room) = self.room.as_mut() else {
            self.updates.refuse(SessionError::NoActiveRoom);
            return;
        };
        if room.call.is_active() {
            self.updates.refuse(SessionError::CallInProgress);
            return;
        }
        self.media_seq += 1;
        let request = self.media_seq;
        room.call.pending_media = Some(request);
        info!("Starting call in room {}", room.id);

        let media = self.deps.media.clone();
        let events = self.events.clone();
        let constraints = self.config.media_constraints;
        let room_generation = room.generation;
        tokio::spawn(async move {
            let result = media.get_user_media(constraints).await;
            let _ = events.send(SessionEvent::MediaAcquired {
                room_generation,
                request,
                result,
            });
        });
        self.updates
            .emit(SessionUpdate::Call(CallStatus::AcquiringMedia));
    }

    pub(super) fn end_call(&mut self) {
        let Some(room) = self.room.as_mut() else {
            self.updates.refuse(SessionError::NoActiveRoom);
            return;
        };
        if !room.call.release(self.deps.media.as_ref()) {
            self.updates.refuse(SessionError::NoCall);
            return;
        }
        info!("Call ended in room {}", room.id);
        self.updates.emit(SessionUpdate::Call(CallStatus::Ended));
    }

    pub(super) async fn on_media_acquired(
        &mut self,
        room_generation: u64,
        request: u64,
        result: Result<LocalStream, MediaError>,
    ) {
        let Some(room) = self.room.as_mut().filter(|room| {
            room.generation == room_generation && room.call.pending_media == Some(request)
        }) else {
            if let Ok(mut stream) = result {
                debug!("Releasing media acquired for an abandoned call");
                stream.stop_all();
                self.deps.media.release(&stream);
            }
            return;
        };
        room.call.pending_media = None;

        let stream = match result {
            Ok(stream) => stream,
            Err(e) => {
                warn!("Call aborted, media unavailable: {e}");
                self.updates
                    .emit(SessionUpdate::Call(CallStatus::Failed(e.to_string())));
                return;
            }
        };
        if room.call.negotiation.as_ref().is_some_and(Negotiation::is_busy) {
            let mut stream = stream;
            stream.stop_all();
            self.deps.media.release(&stream);
            self.updates.refuse(SessionError::CallInProgress);
            return;
        }
        room.call.local_stream = Some(stream.clone());
        self.updates.emit(SessionUpdate::LocalMedia(stream.clone()));

        if let Err(e) = self.ensure_negotiation().await {
            self.fail_call(e);
            return;
        }
        let started = match self.current_negotiation() {
            Some(negotiation) => negotiation.start_call(stream.tracks),
            None => return,
        };
        match started {
            Ok(command) => self.execute(vec![command]).await,
            Err(e) => self.fail_call(e),
        }
    }

    /// Make sure the room has a negotiation that is not closed, creating a
    /// fresh peer connection if needed.
    async fn ensure_negotiation(&mut self) -> Result<(), NegotiationError> {
        let Some(room) = self.room.as_ref() else {
            return Err(NegotiationError::PeerConnection("no active room".to_string()));
        };
        let live = room
            .call
            .negotiation
            .as_ref()
            .is_some_and(|negotiation| negotiation.phase() != NegotiationPhase::Closed);
        if live {
            return Ok(());
        }

        self.negotiation_seq += 1;
        let id = NegotiationId::new(self.negotiation_seq);
        let sink = PeerEventSink::new(id, self.peer_events.clone());
        let peer = self.deps.peers.create(sink).await?;
        debug!("Negotiation {id} created");

        match self.room.as_mut() {
            Some(room) => {
                room.call.negotiation = Some(Negotiation::new(id, self.session_id.clone(), peer));
                Ok(())
            }
            None => {
                peer.close().await;
                Err(NegotiationError::PeerConnection("no active room".to_string()))
            }
        }
    }

    fn current_negotiation(&mut self) -> Option<&mut Negotiation> {
        self.room.as_mut()?.call.negotiation.as_mut()
    }

    /// The live negotiation, if it is the one identified by `id`.
    pub(super) fn negotiation_for(&mut self, id: NegotiationId) -> Option<&mut Negotiation> {
        let negotiation = self.current_negotiation()?;
        if negotiation.id() != id {
            debug!("Ignoring result for released negotiation {id}");
            return None;
        }
        Some(negotiation)
    }

    pub(super) async fn on_remote_offer(
        &mut self,
        offer: SessionDescription,
        from: Option<SessionId>,
        call_id: Option<CallId>,
    ) {
        if self.room.is_none() {
            return;
        }
        if let Err(e) = self.ensure_negotiation().await {
            self.fail_call(e);
            return;
        }
        let Some(room) = self.room.as_mut() else {
            return;
        };
        let tracks = room.call.local_tracks();
        let commands = match room.call.negotiation.as_mut() {
            Some(negotiation) => negotiation.on_remote_offer(offer, from.as_ref(), call_id, tracks),
            None => Vec::new(),
        };
        self.execute(commands).await;
    }

    pub(super) async fn on_remote_answer(
        &mut self,
        answer: SessionDescription,
        call_id: Option<CallId>,
    ) {
        let commands = match self.current_negotiation() {
            Some(negotiation) => negotiation.on_remote_answer(answer, call_id.as_ref()),
            None => {
                debug!("Answer discarded: no call");
                Vec::new()
            }
        };
        self.execute(commands).await;
    }

    pub(super) async fn on_remote_candidate(&mut self, candidate: IceCandidate) {
        let command = match self.current_negotiation() {
            Some(negotiation) => negotiation.on_remote_candidate(candidate),
            None => {
                debug!("ICE candidate discarded: no call");
                None
            }
        };
        self.execute(command.into_iter().collect()).await;
    }

    pub(super) fn handle_peer_signal(&mut self, signal: PeerSignal) {
        let id = signal.negotiation;
        match signal.event {
            PeerEvent::LocalCandidate(candidate) => {
                let command = self
                    .negotiation_for(id)
                    .and_then(|negotiation| negotiation.on_local_candidate(candidate));
                if let Some(NegotiationCommand::Send(signal)) = command {
                    self.broadcast(signal);
                }
            }
            PeerEvent::RemoteTrack(track) => {
                if self.negotiation_for(id).is_some() {
                    info!("Remote {} track {} received", track.kind, track.id);
                    self.updates.emit(SessionUpdate::RemoteTrack(track));
                }
            }
            PeerEvent::StateChanged(state) => {
                if self.negotiation_for(id).is_some() {
                    info!("Peer connection {state}");
                    self.updates
                        .emit(SessionUpdate::Call(CallStatus::Connection(state)));
                }
            }
        }
    }

    /// Carry out the commands of the negotiation state machine.
    pub(super) async fn execute(&mut self, commands: Vec<NegotiationCommand>) {
        let mut queue = VecDeque::from(commands);
        while let Some(command) = queue.pop_front() {
            match command {
                NegotiationCommand::CreateOffer {
                    ticket,
                    peer,
                    tracks,
                } => {
                    let events = self.events.clone();
                    tokio::spawn(async move {
                        let result = create_offer(peer.as_ref(), &tracks).await;
                        let _ = events.send(SessionEvent::OfferCreated { ticket, result });
                    });
                }
                NegotiationCommand::CreateAnswer {
                    ticket,
                    peer,
                    offer,
                    tracks,
                } => {
                    let events = self.events.clone();
                    tokio::spawn(async move {
                        let result = create_answer(peer.as_ref(), &offer, &tracks).await;
                        let _ = events.send(SessionEvent::AnswerCreated { ticket, result });
                    });
                }
                NegotiationCommand::ApplyAnswer {
                    ticket,
                    peer,
                    answer,
                } => {
                    let events = self.events.clone();
                    tokio::spawn(async move {
                        let result = peer.set_remote_description(&answer).await;
                        let _ = events.send(SessionEvent::AnswerApplied { ticket, result });
                    });
                }
                NegotiationCommand::AddCandidate { peer, candidate } => {
                    tokio::spawn(async move {
                        if let Err(e) = peer.add_ice_candidate(&candidate).await {
                            debug!("Ignoring remote ICE candidate: {e}");
                        }
                    });
                }
                NegotiationCommand::Send(signal) => self.broadcast(signal),
                NegotiationCommand::Restart {
                    offer,
                    call_id,
                    from,
                } => {
                    let follow_up = self.restart_negotiation(offer, call_id, from).await;
                    queue.extend(follow_up);
                }
                NegotiationCommand::Established => {
                    self.report_phase();
                    self.updates
                        .emit(SessionUpdate::Call(CallStatus::Established));
                }
                NegotiationCommand::Failed(e) => self.fail_call(e),
            }
        }
        self.report_phase();
    }

    /// Glare lost: drop the current peer connection and answer the remote
    /// offer on a fresh one. The local stream is kept.
    async fn restart_negotiation(
        &mut self,
        offer: SessionDescription,
        call_id: Option<CallId>,
        from: Option<SessionId>,
    ) -> Vec<NegotiationCommand> {
        let Some(room) = self.room.as_mut() else {
            return Vec::new();
        };
        if let Some(peer) = room.call.negotiation.as_mut().and_then(Negotiation::close) {
            tokio::spawn(async move { peer.close().await });
        }
        room.call.negotiation = None;

        if let Err(e) = self.ensure_negotiation().await {
            return vec![NegotiationCommand::Failed(e)];
        }
        let Some(room) = self.room.as_mut() else {
            return Vec::new();
        };
        let tracks = room.call.local_tracks();
        match room.call.negotiation.as_mut() {
            Some(negotiation) => negotiation.on_remote_offer(offer, from.as_ref(), call_id, tracks),
            None => Vec::new(),
        }
    }

    /// Retire the negotiation after a failed attempt and release its media.
    fn fail_call(&mut self, error: NegotiationError) {
        warn!("Call failed: {error}");
        if let Some(room) = self.room.as_mut() {
            room.call.release(self.deps.media.as_ref());
            room.call.negotiation = None;
            room.call.reported_phase = NegotiationPhase::Idle;
        }
        self.updates
            .emit(SessionUpdate::Call(CallStatus::Failed(error.to_string())));
    }

    fn report_phase(&mut self) {
        let Some(room) = self.room.as_mut() else {
            return;
        };
        let phase = room.call.phase();
        if phase != room.call.reported_phase {
            room.call.reported_phase = phase;
            self.updates.emit(SessionUpdate::Call(CallStatus::Phase(phase)));
        }
    }

    fn broadcast(&self, signal: Signal) {
        let name = signal.name();
        let envelope = SignalingEnvelope::new(self.session_id.clone(), signal);
        if !self.channel.send(&envelope) {
            debug!("{name} envelope not delivered: channel {}", self.channel.state());
        }
    }
}

async fn create_offer(
    peer: &dyn PeerConnection,
    tracks: &[LocalTrack],
) -> Result<SessionDescription, NegotiationError> {
    for track in tracks {
        peer.add_track(track).await?;
    }
    let offer = peer.create_offer().await?;
    peer.set_local_description(&offer).await?;
    Ok(offer)
}

async fn create_answer(
    peer: &dyn PeerConnection,
    offer: &SessionDescription,
    tracks: &[LocalTrack],
) -> Result<SessionDescription, NegotiationError> {
    peer.set_remote_description(offer).await?;
    for track in tracks {
        peer.add_track(track).await?;
    }
    let answer = peer.create_answer().await?;
    peer.set_local_description(&answer).await?;
    Ok(answer)
}
