//! Test fixtures: an in-memory relay, fake peer connections and media, and
//! a session wrapper that waits for updates with a timeout.
#![allow(dead_code)]

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use nebula_client::domain::{
    ChannelError, ChatMessage, IceCandidate, LocalStream, LocalTrack, MediaConstraints,
    MediaDevices, MediaError, MessageStore, NegotiationError, PeerConnection,
    PeerConnectionFactory, PeerEvent, PeerEventSink, RoomId, SenderName, SessionDescription,
    SessionId, Signal, SignalingConnector, SignalingEnvelope, SignalingLink, StoreError,
};
use nebula_client::infrastructure::dto::websocket::{decode_envelope, encode_envelope};
use nebula_client::usecase::{
    ChannelState, Intent, SessionConfig, SessionController, SessionDeps, SessionHandle, SessionSnapshot,
    SessionUpdate,
};
use nebula_server::infrastructure::repository::InMemoryMessageRepository;
use tokio::net::TcpListener;
use tokio::sync::{mpsc, oneshot};

pub const TIMEOUT: Duration = Duration::from_secs(5);

// ---------------------------------------------------------------------------
// Relay

struct Member {
    id: u64,
    tx: mpsc::UnboundedSender<String>,
}

#[derive(Default)]
struct RelayState {
    next_id: u64,
    rooms: HashMap<String, Vec<Member>>,
    refuse: bool,
    connects: Vec<String>,
}

/// Room relay living in the test process. Frames go to every other member
/// of the room unless `echo` is set.
#[derive(Default)]
pub struct MemoryRelay {
    state: Arc<Mutex<RelayState>>,
    echo: bool,
}

impl MemoryRelay {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// A relay that also sends every frame back to its sender.
    pub fn echoing() -> Arc<Self> {
        Arc::new(Self {
            echo: true,
            ..Self::default()
        })
    }

    pub fn members(&self, room: &str) -> usize {
        let state = self.state.lock().unwrap();
        state.rooms.get(room).map_or(0, Vec::len)
    }

    /// Rooms connected to, in order.
    pub fn connects(&self) -> Vec<String> {
        self.state.lock().unwrap().connects.clone()
    }

    pub fn refuse_connections(&self, refuse: bool) {
        self.state.lock().unwrap().refuse = refuse;
    }

    /// Cut every connection of a room, as if the relay went away.
    pub fn drop_room(&self, room: &str) {
        self.state.lock().unwrap().rooms.remove(room);
    }

    /// Join a room as a bare wire-level participant.
    pub async fn join_raw(&self, room: &str) -> RawPeer {
        let room_id = RoomId::new(room.to_string()).unwrap();
        let link = self.connect(&room_id).await.unwrap();
        RawPeer {
            session_id: SessionId::generate(),
            link,
        }
    }
}

#[async_trait]
impl SignalingConnector for MemoryRelay {
    async fn connect(&self, room_id: &RoomId) -> Result<SignalingLink, ChannelError> {
        let room = room_id.as_str().to_string();
        let (inbound_tx, inbound_rx) = mpsc::unbounded_channel();
        let (outbound_tx, mut outbound_rx) = mpsc::unbounded_channel::<String>();

        let id = {
            let mut state = self.state.lock().unwrap();
            if state.refuse {
                return Err(ChannelError::ConnectFailed("relay unavailable".to_string()));
            }
            state.next_id += 1;
            let id = state.next_id;
            state.rooms.entry(room.clone()).or_default().push(Member {
                id,
                tx: inbound_tx,
            });
            state.connects.push(room.clone());
            id
        };

        let state = Arc::clone(&self.state);
        let echo = self.echo;
        tokio::spawn(async move {
            while let Some(frame) = outbound_rx.recv().await {
                let guard = state.lock().unwrap();
                if let Some(members) = guard.rooms.get(&room) {
                    for member in members.iter().filter(|m| echo || m.id != id) {
                        let _ = member.tx.send(frame.clone());
                    }
                }
            }
            let mut guard = state.lock().unwrap();
            if let Some(members) = guard.rooms.get_mut(&room) {
                members.retain(|m| m.id != id);
            }
        });

        Ok(SignalingLink {
            outbound: outbound_tx,
            inbound: inbound_rx,
        })
    }
}

/// A participant that speaks raw envelopes, standing in for another client.
pub struct RawPeer {
    pub session_id: SessionId,
    link: SignalingLink,
}

impl RawPeer {
    pub fn send(&self, signal: Signal) {
        let envelope = SignalingEnvelope::new(self.session_id.clone(), signal);
        self.link
            .outbound
            .send(encode_envelope(&envelope).unwrap())
            .unwrap();
    }

    /// Wait for the next envelope whose signal matches.
    pub async fn expect(&mut self, pred: impl Fn(&Signal) -> bool) -> SignalingEnvelope {
        tokio::time::timeout(TIMEOUT, async {
            loop {
                let frame = self.link.inbound.recv().await.expect("relay closed");
                if let Ok(Some(envelope)) = decode_envelope(&frame)
                    && pred(&envelope.signal)
                {
                    return envelope;
                }
            }
        })
        .await
        .expect("timed out waiting for an envelope")
    }
}

// ---------------------------------------------------------------------------
// Peer connections

pub fn fake_candidate(tag: &str) -> IceCandidate {
    IceCandidate {
        candidate: format!("candidate:{tag} 1 udp 2122260223 192.0.2.1 54400 typ host"),
        sdp_mid: Some("0".to_string()),
        sdp_mline_index: Some(0),
        username_fragment: None,
    }
}

/// Peer connection double. Rejects remote descriptions containing
/// `malformed` and candidates that arrive before a remote description.
pub struct FakePeer {
    events: PeerEventSink,
    tracks: Mutex<Vec<LocalTrack>>,
    remote: Mutex<Option<SessionDescription>>,
    candidates: Mutex<Vec<IceCandidate>>,
    closed: AtomicBool,
}

impl FakePeer {
    fn new(events: PeerEventSink) -> Self {
        Self {
            events,
            tracks: Mutex::new(Vec::new()),
            remote: Mutex::new(None),
            candidates: Mutex::new(Vec::new()),
            closed: AtomicBool::new(false),
        }
    }

    pub fn track_count(&self) -> usize {
        self.tracks.lock().unwrap().len()
    }

    pub fn candidates(&self) -> Vec<IceCandidate> {
        self.candidates.lock().unwrap().clone()
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl PeerConnection for FakePeer {
    async fn add_track(&self, track: &LocalTrack) -> Result<(), NegotiationError> {
        self.tracks.lock().unwrap().push(track.clone());
        Ok(())
    }

    async fn create_offer(&self) -> Result<SessionDescription, NegotiationError> {
        Ok(SessionDescription::offer(format!(
            "v=0 fake-offer tracks={}",
            self.track_count()
        )))
    }

    async fn create_answer(&self) -> Result<SessionDescription, NegotiationError> {
        if self.remote.lock().unwrap().is_none() {
            return Err(NegotiationError::PeerConnection(
                "no remote offer".to_string(),
            ));
        }
        Ok(SessionDescription::answer(format!(
            "v=0 fake-answer tracks={}",
            self.track_count()
        )))
    }

    async fn set_local_description(
        &self,
        _description: &SessionDescription,
    ) -> Result<(), NegotiationError> {
        self.events
            .emit(PeerEvent::LocalCandidate(fake_candidate("local")));
        Ok(())
    }

    async fn set_remote_description(
        &self,
        description: &SessionDescription,
    ) -> Result<(), NegotiationError> {
        if description.sdp.contains("malformed") {
            return Err(NegotiationError::Description("malformed sdp".to_string()));
        }
        *self.remote.lock().unwrap() = Some(description.clone());
        Ok(())
    }

    async fn add_ice_candidate(&self, candidate: &IceCandidate) -> Result<(), NegotiationError> {
        if self.remote.lock().unwrap().is_none() {
            return Err(NegotiationError::Candidate(
                "no remote description".to_string(),
            ));
        }
        self.candidates.lock().unwrap().push(candidate.clone());
        Ok(())
    }

    async fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
    }
}

#[derive(Default)]
pub struct FakePeerFactory {
    peers: Mutex<Vec<Arc<FakePeer>>>,
}

impl FakePeerFactory {
    pub fn created(&self) -> usize {
        self.peers.lock().unwrap().len()
    }

    pub fn last(&self) -> Option<Arc<FakePeer>> {
        self.peers.lock().unwrap().last().cloned()
    }

    pub fn all(&self) -> Vec<Arc<FakePeer>> {
        self.peers.lock().unwrap().clone()
    }
}

#[async_trait]
impl PeerConnectionFactory for FakePeerFactory {
    async fn create(
        &self,
        events: PeerEventSink,
    ) -> Result<Arc<dyn PeerConnection>, NegotiationError> {
        let peer = Arc::new(FakePeer::new(events));
        self.peers.lock().unwrap().push(Arc::clone(&peer));
        let peer: Arc<dyn PeerConnection> = peer;
        Ok(peer)
    }
}

// ---------------------------------------------------------------------------
// Media and storage

/// Capture device double counting streams handed out and given back.
#[derive(Default)]
pub struct FakeMedia {
    acquired: AtomicUsize,
    released: AtomicUsize,
    deny: AtomicBool,
    delay_ms: AtomicU64,
}

impl FakeMedia {
    pub fn acquired(&self) -> usize {
        self.acquired.load(Ordering::SeqCst)
    }

    pub fn released(&self) -> usize {
        self.released.load(Ordering::SeqCst)
    }

    pub fn deny(&self) {
        self.deny.store(true, Ordering::SeqCst);
    }

    pub fn delay(&self, delay: Duration) {
        self.delay_ms
            .store(delay.as_millis() as u64, Ordering::SeqCst);
    }
}

#[async_trait]
impl MediaDevices for FakeMedia {
    async fn get_user_media(
        &self,
        constraints: MediaConstraints,
    ) -> Result<LocalStream, MediaError> {
        let delay = self.delay_ms.load(Ordering::SeqCst);
        if delay > 0 {
            tokio::time::sleep(Duration::from_millis(delay)).await;
        }
        if self.deny.load(Ordering::SeqCst) {
            return Err(MediaError::PermissionDenied);
        }
        self.acquired.fetch_add(1, Ordering::SeqCst);
        Ok(LocalStream::from_constraints(constraints))
    }

    fn release(&self, _stream: &LocalStream) {
        self.released.fetch_add(1, Ordering::SeqCst);
    }
}

/// History service that is always down.
pub struct FailingStore;

#[async_trait]
impl MessageStore for FailingStore {
    async fn fetch_history(&self, _room_id: &RoomId) -> Result<Vec<ChatMessage>, StoreError> {
        Err(StoreError::Status(503))
    }

    async fn persist(&self, _message: &ChatMessage) -> Result<(), StoreError> {
        Err(StoreError::Status(503))
    }
}

// ---------------------------------------------------------------------------
// Sessions

pub fn session_config(name: &str) -> SessionConfig {
    SessionConfig {
        display_name: SenderName::new(name.to_string()).unwrap(),
        reconnect_after: Some(Duration::from_millis(100)),
        media_constraints: MediaConstraints::default(),
    }
}

/// A running session with fake peers and media.
pub struct TestSession {
    pub handle: SessionHandle,
    pub updates: mpsc::UnboundedReceiver<SessionUpdate>,
    pub peers: Arc<FakePeerFactory>,
    pub media: Arc<FakeMedia>,
}

impl TestSession {
    pub fn start(
        config: SessionConfig,
        connector: Arc<dyn SignalingConnector>,
        store: Arc<dyn MessageStore>,
    ) -> Self {
        let peers = Arc::new(FakePeerFactory::default());
        let media = Arc::new(FakeMedia::default());
        let deps = SessionDeps {
            store,
            connector,
            peers: peers.clone(),
            media: media.clone(),
        };
        let (handle, updates) = SessionController::spawn(config, deps);
        Self {
            handle,
            updates,
            peers,
            media,
        }
    }

    pub fn send(&self, intent: Intent) {
        self.handle.send(intent).expect("session stopped");
    }

    /// Join a room and wait until its channel is open.
    pub async fn join(&mut self, room: &str) {
        self.send(Intent::JoinRoom(room.to_string()));
        self.expect(|u| *u == SessionUpdate::Channel(ChannelState::Open))
            .await;
    }

    /// Skip updates until one matches.
    pub async fn expect(&mut self, pred: impl Fn(&SessionUpdate) -> bool) -> SessionUpdate {
        self.collect_until(pred)
            .await
            .pop()
            .expect("collect_until returns the match")
    }

    /// Every update up to and including the first match.
    pub async fn collect_until(
        &mut self,
        pred: impl Fn(&SessionUpdate) -> bool,
    ) -> Vec<SessionUpdate> {
        let updates = &mut self.updates;
        tokio::time::timeout(TIMEOUT, async {
            let mut seen = Vec::new();
            loop {
                let update = updates.recv().await.expect("session stopped");
                let matched = pred(&update);
                seen.push(update);
                if matched {
                    return seen;
                }
            }
        })
        .await
        .expect("timed out waiting for an update")
    }

    /// Assert that no matching update arrives within `window`.
    pub async fn expect_none(&mut self, pred: impl Fn(&SessionUpdate) -> bool, window: Duration) {
        let deadline = tokio::time::Instant::now() + window;
        while let Ok(Some(update)) =
            tokio::time::timeout_at(deadline, self.updates.recv()).await
        {
            assert!(!pred(&update), "unexpected update: {update:?}");
        }
    }

    pub async fn snapshot(&self) -> SessionSnapshot {
        self.handle.snapshot().await.expect("session stopped")
    }

    /// Poll snapshots until one satisfies `pred`.
    pub async fn wait_for(&self, pred: impl Fn(&SessionSnapshot) -> bool) -> SessionSnapshot {
        tokio::time::timeout(TIMEOUT, async {
            loop {
                let snapshot = self.snapshot().await;
                if pred(&snapshot) {
                    return snapshot;
                }
                tokio::time::sleep(Duration::from_millis(20)).await;
            }
        })
        .await
        .expect("timed out waiting for session state")
    }
}

/// Poll until `cond` holds.
pub async fn eventually(cond: impl Fn() -> bool) {
    tokio::time::timeout(TIMEOUT, async {
        while !cond() {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .expect("condition not reached in time");
}

// ---------------------------------------------------------------------------
// Server

/// Nebula server on an ephemeral port, stopped when dropped.
pub struct TestServer {
    addr: SocketAddr,
    _shutdown: oneshot::Sender<()>,
}

impl TestServer {
    pub async fn start() -> Self {
        let listener = TcpListener::bind("127.0.0.1:0")
            .await
            .expect("Failed to bind test listener");
        let addr = listener.local_addr().expect("Failed to read local addr");
        let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();

        tokio::spawn(async move {
            let _ = nebula_server::serve(
                listener,
                Arc::new(InMemoryMessageRepository::new()),
                async move {
                    let _ = shutdown_rx.await;
                },
            )
            .await;
        });

        Self {
            addr,
            _shutdown: shutdown_tx,
        }
    }

    pub fn base_url(&self) -> String {
        format!("http://{}", self.addr)
    }

    pub fn ws_base_url(&self) -> String {
        format!("ws://{}", self.addr)
    }
}
