//! Negotiation state machine for one peer connection.
//!
//! The machine is synchronous: each input returns the commands the session
//! controller has to carry out (spawn a description task, send an envelope,
//! ...). Asynchronous steps are issued with a [`Ticket`] and their results
//! are fed back through the matching `on_*` method. A result whose ticket no
//! longer matches the live attempt is dropped.
//!
//! ```text
//! Idle ──start_call──▶ (creating offer) ──▶ HaveLocalOffer ──answer──▶ Stable
//!  │                                                                    │
//!  └──remote offer──▶ HaveRemoteOffer ──answer created──▶ Stable ◀──────┘
//!
//! any phase ──close──▶ Closed
//! ```

use std::fmt;
use std::sync::Arc;

use tracing::{debug, info};

use super::error::NegotiationError;
use super::media::{IceCandidate, LocalTrack, PeerConnection, SessionDescription};
use super::signaling::Signal;
use super::value_object::{CallId, NegotiationId, SessionId};

/// Candidates kept per direction while their description is not out yet
pub const MAX_PENDING_CANDIDATES: usize = 64;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NegotiationPhase {
    Idle,
    HaveLocalOffer,
    HaveRemoteOffer,
    Stable,
    Closed,
}

impl fmt::Display for NegotiationPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            NegotiationPhase::Idle => "idle",
            NegotiationPhase::HaveLocalOffer => "have-local-offer",
            NegotiationPhase::HaveRemoteOffer => "have-remote-offer",
            NegotiationPhase::Stable => "stable",
            NegotiationPhase::Closed => "closed",
        };
        write!(f, "{name}")
    }
}

/// Identifies one asynchronous step of one negotiation attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Ticket {
    pub negotiation: NegotiationId,
    pub attempt: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Step {
    None,
    CreatingOffer,
    CreatingAnswer,
    ApplyingAnswer,
}

/// Work requested by the state machine.
pub enum NegotiationCommand {
    /// Attach `tracks`, create an offer and set it as local description
    CreateOffer {
        ticket: Ticket,
        peer: Arc<dyn PeerConnection>,
        tracks: Vec<LocalTrack>,
    },
    /// Apply `offer`, attach `tracks`, create an answer and set it locally
    CreateAnswer {
        ticket: Ticket,
        peer: Arc<dyn PeerConnection>,
        offer: SessionDescription,
        tracks: Vec<LocalTrack>,
    },
    /// Apply the remote answer
    ApplyAnswer {
        ticket: Ticket,
        peer: Arc<dyn PeerConnection>,
        answer: SessionDescription,
    },
    /// Add a remote candidate; failures are ignored
    AddCandidate {
        peer: Arc<dyn PeerConnection>,
        candidate: IceCandidate,
    },
    /// Broadcast an envelope to the room
    Send(Signal),
    /// Glare lost: release this instance and answer `offer` on a fresh one
    Restart {
        offer: SessionDescription,
        call_id: Option<CallId>,
        from: Option<SessionId>,
    },
    /// The offer/answer exchange completed
    Established,
    /// The attempt was aborted back to `Idle`
    Failed(NegotiationError),
}

impl fmt::Debug for NegotiationCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NegotiationCommand::CreateOffer { ticket, tracks, .. } => f
                .debug_struct("CreateOffer")
                .field("ticket", ticket)
                .field("tracks", &tracks.len())
                .finish(),
            NegotiationCommand::CreateAnswer { ticket, tracks, .. } => f
                .debug_struct("CreateAnswer")
                .field("ticket", ticket)
                .field("tracks", &tracks.len())
                .finish(),
            NegotiationCommand::ApplyAnswer { ticket, .. } => f
                .debug_struct("ApplyAnswer")
                .field("ticket", ticket)
                .finish(),
            NegotiationCommand::AddCandidate { candidate, .. } => f
                .debug_struct("AddCandidate")
                .field("candidate", &candidate.candidate)
                .finish(),
            NegotiationCommand::Send(signal) => f.debug_tuple("Send").field(&signal.name()).finish(),
            NegotiationCommand::Restart { call_id, from, .. } => f
                .debug_struct("Restart")
                .field("call_id", call_id)
                .field("from", from)
                .finish(),
            NegotiationCommand::Established => write!(f, "Established"),
            NegotiationCommand::Failed(error) => f.debug_tuple("Failed").field(error).finish(),
        }
    }
}

/// State of one negotiation instance.
pub struct Negotiation {
    id: NegotiationId,
    local_session: SessionId,
    phase: NegotiationPhase,
    step: Step,
    attempt: u64,
    peer: Option<Arc<dyn PeerConnection>>,
    call_id: Option<CallId>,
    remote_applied: bool,
    pending_candidates: Vec<IceCandidate>,
    local_sent: bool,
    pending_local: Vec<IceCandidate>,
}

impl Negotiation {
    pub fn new(id: NegotiationId, local_session: SessionId, peer: Arc<dyn PeerConnection>) -> Self {
        Self {
            id,
            local_session,
            phase: NegotiationPhase::Idle,
            step: Step::None,
            attempt: 0,
            peer: Some(peer),
            call_id: None,
            remote_applied: false,
            pending_candidates: Vec::new(),
            local_sent: false,
            pending_local: Vec::new(),
        }
    }

    pub fn id(&self) -> NegotiationId {
        self.id
    }

    pub fn phase(&self) -> NegotiationPhase {
        self.phase
    }

    pub fn call_id(&self) -> Option<&CallId> {
        self.call_id.as_ref()
    }

    /// True while an exchange is in progress or established.
    pub fn is_busy(&self) -> bool {
        self.step != Step::None
            || matches!(
                self.phase,
                NegotiationPhase::HaveLocalOffer
                    | NegotiationPhase::HaveRemoteOffer
                    | NegotiationPhase::Stable
            )
    }

    /// Begin an outbound call.
    pub fn start_call(
        &mut self,
        tracks: Vec<LocalTrack>,
    ) -> Result<NegotiationCommand, NegotiationError> {
        if self.phase != NegotiationPhase::Idle || self.step != Step::None {
            return Err(self.invalid("start a call"));
        }
        let peer = self.peer("start a call")?;
        self.step = Step::CreatingOffer;
        self.call_id = Some(CallId::generate());
        let ticket = self.next_ticket();
        info!("Negotiation {}: creating offer", self.id);
        Ok(NegotiationCommand::CreateOffer {
            ticket,
            peer,
            tracks,
        })
    }

    pub fn on_offer_created(
        &mut self,
        ticket: Ticket,
        result: Result<SessionDescription, NegotiationError>,
    ) -> Vec<NegotiationCommand> {
        if !self.is_current(ticket, Step::CreatingOffer) {
            debug!("Negotiation {}: discarding stale offer", self.id);
            return Vec::new();
        }
        self.step = Step::None;
        match result {
            Ok(description) => {
                self.phase = NegotiationPhase::HaveLocalOffer;
                info!("Negotiation {}: offer sent", self.id);
                let mut commands = vec![NegotiationCommand::Send(Signal::Offer {
                    call_id: self.call_id.clone(),
                    description,
                })];
                commands.extend(self.flush_local_candidates());
                commands
            }
            Err(error) => self.abort(error),
        }
    }

    /// Handle an offer from the remote peer, resolving glare.
    pub fn on_remote_offer(
        &mut self,
        offer: SessionDescription,
        from: Option<&SessionId>,
        call_id: Option<CallId>,
        tracks: Vec<LocalTrack>,
    ) -> Vec<NegotiationCommand> {
        match self.phase {
            NegotiationPhase::Closed => {
                debug!("Negotiation {}: offer ignored, closed", self.id);
                Vec::new()
            }
            NegotiationPhase::HaveRemoteOffer => {
                debug!("Negotiation {}: second remote offer ignored", self.id);
                Vec::new()
            }
            NegotiationPhase::HaveLocalOffer if self.keeps_local_offer(from) => {
                info!("Negotiation {}: glare, keeping local offer", self.id);
                Vec::new()
            }
            NegotiationPhase::HaveLocalOffer => {
                info!("Negotiation {}: glare, yielding to remote offer", self.id);
                vec![NegotiationCommand::Restart {
                    offer,
                    call_id,
                    from: from.cloned(),
                }]
            }
            NegotiationPhase::Idle if self.step == Step::CreatingOffer => {
                info!(
                    "Negotiation {}: remote offer before ours was sent, yielding",
                    self.id
                );
                vec![NegotiationCommand::Restart {
                    offer,
                    call_id,
                    from: from.cloned(),
                }]
            }
            NegotiationPhase::Idle | NegotiationPhase::Stable => {
                let peer = match self.peer("answer an offer") {
                    Ok(peer) => peer,
                    Err(error) => return self.abort(error),
                };
                self.phase = NegotiationPhase::HaveRemoteOffer;
                self.step = Step::CreatingAnswer;
                self.call_id = call_id;
                let ticket = self.next_ticket();
                info!("Negotiation {}: answering remote offer", self.id);
                vec![NegotiationCommand::CreateAnswer {
                    ticket,
                    peer,
                    offer,
                    tracks,
                }]
            }
        }
    }

    pub fn on_answer_created(
        &mut self,
        ticket: Ticket,
        result: Result<SessionDescription, NegotiationError>,
    ) -> Vec<NegotiationCommand> {
        if !self.is_current(ticket, Step::CreatingAnswer) {
            debug!("Negotiation {}: discarding stale answer", self.id);
            return Vec::new();
        }
        self.step = Step::None;
        match result {
            Ok(description) => {
                self.phase = NegotiationPhase::Stable;
                self.remote_applied = true;
                let mut commands = vec![
                    NegotiationCommand::Send(Signal::Answer {
                        call_id: self.call_id.clone(),
                        description,
                    }),
                    NegotiationCommand::Established,
                ];
                commands.extend(self.flush_local_candidates());
                commands.extend(self.flush_candidates());
                commands
            }
            Err(error) => self.abort(error),
        }
    }

    /// Handle an answer from the remote peer.
    ///
    /// Answers outside `HaveLocalOffer`, answers racing one already being
    /// applied, and answers for another call are discarded untouched.
    pub fn on_remote_answer(
        &mut self,
        answer: SessionDescription,
        call_id: Option<&CallId>,
    ) -> Vec<NegotiationCommand> {
        if self.phase != NegotiationPhase::HaveLocalOffer || self.step != Step::None {
            debug!(
                "Negotiation {}: answer discarded in phase {}",
                self.id, self.phase
            );
            return Vec::new();
        }
        if let (Some(ours), Some(theirs)) = (self.call_id.as_ref(), call_id)
            && ours != theirs
        {
            debug!(
                "Negotiation {}: answer for call {} discarded (outstanding: {})",
                self.id, theirs, ours
            );
            return Vec::new();
        }
        let peer = match self.peer("apply an answer") {
            Ok(peer) => peer,
            Err(error) => return self.abort(error),
        };
        self.step = Step::ApplyingAnswer;
        let ticket = self.next_ticket();
        vec![NegotiationCommand::ApplyAnswer {
            ticket,
            peer,
            answer,
        }]
    }

    pub fn on_answer_applied(
        &mut self,
        ticket: Ticket,
        result: Result<(), NegotiationError>,
    ) -> Vec<NegotiationCommand> {
        if !self.is_current(ticket, Step::ApplyingAnswer) {
            debug!("Negotiation {}: discarding stale answer result", self.id);
            return Vec::new();
        }
        self.step = Step::None;
        match result {
            Ok(()) => {
                self.phase = NegotiationPhase::Stable;
                self.remote_applied = true;
                info!("Negotiation {}: stable", self.id);
                let mut commands = vec![NegotiationCommand::Established];
                commands.extend(self.flush_candidates());
                commands
            }
            Err(error) => self.abort(error),
        }
    }

    /// Handle a remote ICE candidate.
    ///
    /// Candidates that arrive before any remote description is applied are
    /// held back and released once one is. The phase never changes here.
    pub fn on_remote_candidate(&mut self, candidate: IceCandidate) -> Option<NegotiationCommand> {
        let peer = match (&self.peer, self.phase) {
            (_, NegotiationPhase::Closed) | (None, _) => {
                debug!("Negotiation {}: candidate dropped, no connection", self.id);
                return None;
            }
            (Some(peer), _) => Arc::clone(peer),
        };
        if self.remote_applied {
            return Some(NegotiationCommand::AddCandidate { peer, candidate });
        }
        if self.pending_candidates.len() < MAX_PENDING_CANDIDATES {
            self.pending_candidates.push(candidate);
        } else {
            debug!("Negotiation {}: candidate buffer full", self.id);
        }
        None
    }

    /// Forward a candidate gathered by the local peer connection.
    ///
    /// Candidates gathered before our first description went out are queued
    /// and sent right behind it, so the remote side never sees a candidate
    /// ahead of the offer or answer it belongs to.
    pub fn on_local_candidate(&mut self, candidate: IceCandidate) -> Option<NegotiationCommand> {
        if self.phase == NegotiationPhase::Closed {
            return None;
        }
        if !self.local_sent {
            if self.pending_local.len() < MAX_PENDING_CANDIDATES {
                self.pending_local.push(candidate);
            } else {
                debug!("Negotiation {}: local candidate buffer full", self.id);
            }
            return None;
        }
        Some(NegotiationCommand::Send(Signal::IceCandidate(candidate)))
    }

    /// Enter `Closed` and hand back the peer connection to release.
    ///
    /// Returns `None` if the instance was already closed.
    pub fn close(&mut self) -> Option<Arc<dyn PeerConnection>> {
        if self.phase == NegotiationPhase::Closed {
            return None;
        }
        info!("Negotiation {}: closed in phase {}", self.id, self.phase);
        self.phase = NegotiationPhase::Closed;
        self.step = Step::None;
        self.attempt += 1;
        self.pending_candidates.clear();
        self.pending_local.clear();
        self.peer.take()
    }

    fn abort(&mut self, error: NegotiationError) -> Vec<NegotiationCommand> {
        info!("Negotiation {}: attempt aborted: {}", self.id, error);
        self.phase = NegotiationPhase::Idle;
        self.step = Step::None;
        self.attempt += 1;
        self.remote_applied = false;
        self.pending_candidates.clear();
        self.pending_local.clear();
        vec![NegotiationCommand::Failed(error)]
    }

    /// Glare tie-break: the greater session id keeps its offer. A peer that
    /// does not identify itself always wins.
    fn keeps_local_offer(&self, from: Option<&SessionId>) -> bool {
        match from {
            Some(remote) => self.local_session > *remote,
            None => false,
        }
    }

    fn flush_local_candidates(&mut self) -> Vec<NegotiationCommand> {
        self.local_sent = true;
        self.pending_local
            .drain(..)
            .map(|candidate| NegotiationCommand::Send(Signal::IceCandidate(candidate)))
            .collect()
    }

    fn flush_candidates(&mut self) -> Vec<NegotiationCommand> {
        let Some(peer) = &self.peer else {
            return Vec::new();
        };
        self.pending_candidates
            .drain(..)
            .map(|candidate| NegotiationCommand::AddCandidate {
                peer: Arc::clone(peer),
                candidate,
            })
            .collect()
    }

    fn next_ticket(&mut self) -> Ticket {
        self.attempt += 1;
        Ticket {
            negotiation: self.id,
            attempt: self.attempt,
        }
    }

    fn is_current(&self, ticket: Ticket, step: Step) -> bool {
        ticket.negotiation == self.id
            && ticket.attempt == self.attempt
            && self.step == step
            && self.phase != NegotiationPhase::Closed
    }

    fn peer(&self, operation: &'static str) -> Result<Arc<dyn PeerConnection>, NegotiationError> {
        self.peer
            .clone()
            .ok_or_else(|| self.invalid(operation))
    }

    fn invalid(&self, operation: &'static str) -> NegotiationError {
        NegotiationError::InvalidState {
            operation,
            phase: self.phase,
        }
    }
}
