//! Call negotiation between sessions and against a raw wire-level peer.

mod fixtures;

use std::sync::Arc;
use std::time::Duration;

use fixtures::{MemoryRelay, TestSession, eventually, fake_candidate, session_config};
use nebula_client::domain::{CallId, NegotiationPhase, SessionDescription, SessionId, Signal};
use nebula_client::infrastructure::repository::InMemoryMessageStore;
use nebula_client::usecase::{CallStatus, ChannelState, Intent, SessionUpdate};

fn session(name: &str, relay: &Arc<MemoryRelay>) -> TestSession {
    TestSession::start(
        session_config(name),
        relay.clone(),
        Arc::new(InMemoryMessageStore::new()),
    )
}

fn established(update: &SessionUpdate) -> bool {
    *update == SessionUpdate::Call(CallStatus::Established)
}

fn is_offer(signal: &Signal) -> bool {
    matches!(signal, Signal::Offer { .. })
}

fn is_answer(signal: &Signal) -> bool {
    matches!(signal, Signal::Answer { .. })
}

/// Two sessions in `r1` with an established call started by the first.
async fn call_between(relay: &Arc<MemoryRelay>) -> (TestSession, TestSession) {
    let mut alice = session("Alice", relay);
    let mut bob = session("Bob", relay);
    alice.join("r1").await;
    bob.join("r1").await;
    alice.send(Intent::StartCall);
    alice.expect(established).await;
    bob.expect(established).await;
    (alice, bob)
}

#[tokio::test]
async fn test_caller_and_callee_reach_stable() {
    // テスト項目: オファーとアンサーの交換で双方が stable になる
    // given (前提条件):
    let relay = MemoryRelay::new();

    // when (操作):
    let (alice, bob) = call_between(&relay).await;

    // then (期待する結果):
    alice
        .wait_for(|s| s.phase == NegotiationPhase::Stable && s.local_media_live)
        .await;
    bob.wait_for(|s| s.phase == NegotiationPhase::Stable).await;
    assert_eq!(alice.media.acquired(), 1);
    assert_eq!(bob.media.acquired(), 0);
    assert_eq!(alice.peers.last().unwrap().track_count(), 2);

    // local candidates cross over once each side has the remote description
    eventually(|| {
        alice
            .peers
            .last()
            .is_some_and(|peer| !peer.candidates().is_empty())
            && bob
                .peers
                .last()
                .is_some_and(|peer| !peer.candidates().is_empty())
    })
    .await;
}

#[tokio::test]
async fn test_candidate_before_call_is_ignored() {
    // テスト項目: 通話前に届いた ICE 候補は状態を変えずに破棄される
    // given (前提条件):
    let relay = MemoryRelay::new();
    let mut alice = session("Alice", &relay);
    alice.join("r1").await;
    let raw = relay.join_raw("r1").await;

    // when (操作):
    raw.send(Signal::IceCandidate(fake_candidate("early")));
    tokio::time::sleep(Duration::from_millis(100)).await;

    // then (期待する結果):
    let snapshot = alice.snapshot().await;
    assert_eq!(snapshot.phase, NegotiationPhase::Idle);
    assert_eq!(alice.peers.created(), 0);
}

#[tokio::test]
async fn test_early_candidate_is_buffered_until_answer() {
    // テスト項目: アンサー前の ICE 候補はフェーズを変えず、適用後に追加される
    // given (前提条件):
    let relay = MemoryRelay::new();
    let mut alice = session("Alice", &relay);
    alice.join("r1").await;
    let mut raw = relay.join_raw("r1").await;
    alice.send(Intent::StartCall);
    let offer = raw.expect(is_offer).await;
    let Signal::Offer { call_id, .. } = offer.signal else {
        unreachable!()
    };

    // when (操作):
    raw.send(Signal::IceCandidate(fake_candidate("early")));
    tokio::time::sleep(Duration::from_millis(100)).await;

    // then (期待する結果):
    assert_eq!(alice.snapshot().await.phase, NegotiationPhase::HaveLocalOffer);
    let peer = alice.peers.last().unwrap();
    assert!(peer.candidates().is_empty());

    raw.send(Signal::Answer {
        call_id,
        description: SessionDescription::answer("v=0 raw-answer"),
    });
    alice.expect(established).await;
    eventually(|| peer.candidates().contains(&fake_candidate("early"))).await;
    assert_eq!(alice.snapshot().await.phase, NegotiationPhase::Stable);
}

#[tokio::test]
async fn test_local_candidates_follow_offer() {
    // テスト項目: ローカルの ICE 候補はオファーの後に送られる
    // given (前提条件):
    let relay = MemoryRelay::new();
    let mut alice = session("Alice", &relay);
    alice.join("r1").await;
    let mut raw = relay.join_raw("r1").await;

    // when (操作):
    alice.send(Intent::StartCall);

    // then (期待する結果):
    let first = raw
        .expect(|s| matches!(s, Signal::Offer { .. } | Signal::IceCandidate(_)))
        .await;
    assert!(is_offer(&first.signal));
    let candidate = raw.expect(|s| matches!(s, Signal::IceCandidate(_))).await;
    assert_eq!(
        candidate.signal,
        Signal::IceCandidate(fake_candidate("local"))
    );
}

#[tokio::test]
async fn test_answering_remote_offer() {
    // テスト項目: リモートのオファーに同じ通話 ID でアンサーを返す
    // given (前提条件):
    let relay = MemoryRelay::new();
    let mut alice = session("Alice", &relay);
    alice.join("r1").await;
    let mut raw = relay.join_raw("r1").await;
    let call_id = CallId::generate();

    // when (操作):
    raw.send(Signal::Offer {
        call_id: Some(call_id.clone()),
        description: SessionDescription::offer("v=0 raw-offer"),
    });

    // then (期待する結果):
    let answer = raw.expect(is_answer).await;
    assert_eq!(answer.from, Some(alice.snapshot().await.session_id));
    let Signal::Answer {
        call_id: answered,
        description,
    } = answer.signal
    else {
        unreachable!()
    };
    assert_eq!(answered, Some(call_id));
    assert!(description.sdp.starts_with("v=0 fake-answer"));
    alice.expect(established).await;
    assert_eq!(alice.snapshot().await.phase, NegotiationPhase::Stable);
    assert_eq!(alice.media.acquired(), 0);
}

#[tokio::test]
async fn test_malformed_offer_fails_call_and_recovers() {
    // テスト項目: 不正なオファーは通話失敗となり、その後の通話は成立する
    // given (前提条件):
    let relay = MemoryRelay::new();
    let mut alice = session("Alice", &relay);
    alice.join("r1").await;
    let mut raw = relay.join_raw("r1").await;

    // when (操作):
    raw.send(Signal::Offer {
        call_id: None,
        description: SessionDescription::offer("malformed"),
    });

    // then (期待する結果):
    alice
        .expect(|u| matches!(u, SessionUpdate::Call(CallStatus::Failed(_))))
        .await;
    assert_eq!(alice.snapshot().await.phase, NegotiationPhase::Idle);
    let failed_peer = alice.peers.last().unwrap();
    eventually(|| failed_peer.is_closed()).await;

    raw.send(Signal::Offer {
        call_id: None,
        description: SessionDescription::offer("v=0 raw-offer"),
    });
    raw.expect(is_answer).await;
    alice
        .wait_for(|s| s.phase == NegotiationPhase::Stable)
        .await;
    assert_eq!(alice.peers.created(), 2);
}

#[tokio::test]
async fn test_end_call_mid_negotiation_releases_media() {
    // テスト項目: ネゴシエーション途中で通話を終了するとメディアと接続が解放される
    // given (前提条件):
    let relay = MemoryRelay::new();
    let mut alice = session("Alice", &relay);
    alice.join("r1").await;
    let mut raw = relay.join_raw("r1").await;
    alice.send(Intent::StartCall);
    raw.expect(is_offer).await;

    // when (操作):
    alice.send(Intent::EndCall);

    // then (期待する結果):
    alice
        .expect(|u| *u == SessionUpdate::Call(CallStatus::Ended))
        .await;
    assert_eq!(alice.media.acquired(), 1);
    assert_eq!(alice.media.released(), 1);
    let peer = alice.peers.last().unwrap();
    eventually(|| peer.is_closed()).await;
    let snapshot = alice.snapshot().await;
    assert!(!snapshot.local_media_live);
    assert_eq!(snapshot.phase, NegotiationPhase::Closed);
}

#[tokio::test]
async fn test_late_answer_after_end_is_discarded() {
    // テスト項目: 通話終了後に届いたアンサーは破棄される
    // given (前提条件):
    let relay = MemoryRelay::new();
    let mut alice = session("Alice", &relay);
    alice.join("r1").await;
    let mut raw = relay.join_raw("r1").await;
    alice.send(Intent::StartCall);
    let offer = raw.expect(is_offer).await;
    let Signal::Offer { call_id, .. } = offer.signal else {
        unreachable!()
    };
    alice.send(Intent::EndCall);
    alice
        .expect(|u| *u == SessionUpdate::Call(CallStatus::Ended))
        .await;

    // when (操作):
    raw.send(Signal::Answer {
        call_id,
        description: SessionDescription::answer("v=0 late-answer"),
    });

    // then (期待する結果):
    alice
        .expect_none(established, Duration::from_millis(200))
        .await;
    assert_eq!(alice.snapshot().await.phase, NegotiationPhase::Closed);
}

#[tokio::test]
async fn test_end_call_while_acquiring_media() {
    // テスト項目: メディア取得中に通話を終了すると、取得したメディアは到着時に解放される
    // given (前提条件):
    let relay = MemoryRelay::new();
    let mut alice = session("Alice", &relay);
    alice.media.delay(Duration::from_millis(150));
    alice.join("r1").await;
    alice.send(Intent::StartCall);
    alice
        .expect(|u| *u == SessionUpdate::Call(CallStatus::AcquiringMedia))
        .await;

    // when (操作):
    alice.send(Intent::EndCall);

    // then (期待する結果):
    alice
        .expect(|u| *u == SessionUpdate::Call(CallStatus::Ended))
        .await;
    let media = alice.media.clone();
    eventually(|| media.acquired() == 1 && media.released() == 1).await;
    assert_eq!(alice.peers.created(), 0);
    assert!(!alice.snapshot().await.local_media_live);
}

#[tokio::test]
async fn test_media_denied_aborts_call() {
    // テスト項目: カメラ・マイクが拒否されると通話は開始されない
    // given (前提条件):
    let relay = MemoryRelay::new();
    let mut alice = session("Alice", &relay);
    alice.media.deny();
    alice.join("r1").await;

    // when (操作):
    alice.send(Intent::StartCall);

    // then (期待する結果):
    alice
        .expect(|u| matches!(u, SessionUpdate::Call(CallStatus::Failed(_))))
        .await;
    assert_eq!(alice.peers.created(), 0);
    assert_eq!(alice.snapshot().await.phase, NegotiationPhase::Idle);

    // a later attempt is not blocked
    alice.send(Intent::StartCall);
    alice
        .expect(|u| *u == SessionUpdate::Call(CallStatus::AcquiringMedia))
        .await;
}

#[tokio::test]
async fn test_second_start_call_is_refused() {
    // テスト項目: 通話中に再度通話を開始しようとすると拒否される
    // given (前提条件):
    let relay = MemoryRelay::new();
    let (mut alice, _bob) = call_between(&relay).await;

    // when (操作):
    alice.send(Intent::StartCall);

    // then (期待する結果):
    let notice = alice
        .expect(|u| matches!(u, SessionUpdate::Notice(_)))
        .await;
    assert_eq!(
        notice,
        SessionUpdate::Notice("A call is already in progress".to_string())
    );
    assert_eq!(alice.media.acquired(), 1);
}

#[tokio::test]
async fn test_simultaneous_calls_converge() {
    // テスト項目: 双方が同時に発信しても双方 stable に収束する
    // given (前提条件):
    let relay = MemoryRelay::new();
    let mut alice = session("Alice", &relay);
    let mut bob = session("Bob", &relay);
    alice.join("r1").await;
    bob.join("r1").await;

    // when (操作):
    alice.send(Intent::StartCall);
    bob.send(Intent::StartCall);

    // then (期待する結果):
    alice
        .wait_for(|s| s.phase == NegotiationPhase::Stable)
        .await;
    bob.wait_for(|s| s.phase == NegotiationPhase::Stable).await;
    // whoever gave up an offer did so on a fresh connection
    for side in [&alice, &bob] {
        if side.peers.created() > 1 {
            let abandoned = side.peers.all()[0].clone();
            eventually(|| abandoned.is_closed()).await;
        }
    }
}

#[tokio::test]
async fn test_glare_yields_to_greater_session() {
    // テスト項目: グレア時、相手のセッション ID が大きければ自分のオファーを取り下げて応答する
    // given (前提条件):
    let relay = MemoryRelay::new();
    let mut alice = session("Alice", &relay);
    alice.join("r1").await;
    let mut raw = relay.join_raw("r1").await;
    // '~' sorts after every character of a generated id
    raw.session_id = SessionId::parse("~remote").unwrap();
    alice.send(Intent::StartCall);
    raw.expect(is_offer).await;
    let call_id = CallId::generate();

    // when (操作):
    raw.send(Signal::Offer {
        call_id: Some(call_id.clone()),
        description: SessionDescription::offer("v=0 raw-offer"),
    });

    // then (期待する結果):
    let answer = raw.expect(is_answer).await;
    assert!(matches!(answer.signal, Signal::Answer { call_id: Some(id), .. } if id == call_id));
    alice
        .wait_for(|s| s.phase == NegotiationPhase::Stable && s.local_media_live)
        .await;
    assert_eq!(alice.peers.created(), 2);
    let abandoned = alice.peers.all()[0].clone();
    eventually(|| abandoned.is_closed()).await;
    // the fresh connection still carries the local tracks
    assert_eq!(alice.peers.last().unwrap().track_count(), 2);
    assert_eq!(alice.media.released(), 0);
}

#[tokio::test]
async fn test_glare_keeps_offer_against_smaller_session() {
    // テスト項目: グレア時、相手のセッション ID が小さければ自分のオファーを維持する
    // given (前提条件):
    let relay = MemoryRelay::new();
    let mut alice = session("Alice", &relay);
    alice.join("r1").await;
    let mut raw = relay.join_raw("r1").await;
    // '!' sorts before every character of a generated id
    raw.session_id = SessionId::parse("!remote").unwrap();
    alice.send(Intent::StartCall);
    let offer = raw.expect(is_offer).await;
    let Signal::Offer { call_id, .. } = offer.signal else {
        unreachable!()
    };

    // when (操作):
    raw.send(Signal::Offer {
        call_id: Some(CallId::generate()),
        description: SessionDescription::offer("v=0 raw-offer"),
    });
    tokio::time::sleep(Duration::from_millis(100)).await;

    // then (期待する結果):
    assert_eq!(alice.snapshot().await.phase, NegotiationPhase::HaveLocalOffer);
    assert_eq!(alice.peers.created(), 1);

    raw.send(Signal::Answer {
        call_id,
        description: SessionDescription::answer("v=0 raw-answer"),
    });
    alice.expect(established).await;
    assert_eq!(alice.snapshot().await.phase, NegotiationPhase::Stable);
}

#[tokio::test]
async fn test_channel_loss_keeps_call_and_chat() {
    // テスト項目: 通話中にチャネルが切れても通話状態は保たれ、再接続後にチャットできる
    // given (前提条件):
    let relay = MemoryRelay::new();
    let (mut alice, mut bob) = call_between(&relay).await;

    // when (操作):
    relay.drop_room("r1");
    alice
        .expect(|u| *u == SessionUpdate::Channel(ChannelState::Closed))
        .await;
    alice
        .expect(|u| *u == SessionUpdate::Channel(ChannelState::Open))
        .await;
    bob.expect(|u| *u == SessionUpdate::Channel(ChannelState::Open))
        .await;

    // then (期待する結果):
    assert_eq!(alice.snapshot().await.phase, NegotiationPhase::Stable);
    assert_eq!(bob.snapshot().await.phase, NegotiationPhase::Stable);
    assert!(!alice.peers.last().unwrap().is_closed());

    alice.send(Intent::SendMessage("still there?".to_string()));
    let received = bob
        .expect(|u| matches!(u, SessionUpdate::MessageAppended(_)))
        .await;
    assert!(
        matches!(received, SessionUpdate::MessageAppended(m) if m.content.as_str() == "still there?")
    );
}

#[tokio::test]
async fn test_room_switch_ends_call() {
    // テスト項目: 通話中にルームを切り替えると通話が終了しメディアが解放される
    // given (前提条件):
    let relay = MemoryRelay::new();
    let (mut alice, _bob) = call_between(&relay).await;

    // when (操作):
    alice.send(Intent::JoinRoom("r2".to_string()));

    // then (期待する結果):
    let updates = alice
        .collect_until(|u| *u == SessionUpdate::Channel(ChannelState::Open))
        .await;
    assert!(updates.contains(&SessionUpdate::Call(CallStatus::Ended)));
    assert_eq!(alice.media.released(), 1);
    let peer = alice.peers.last().unwrap();
    eventually(|| peer.is_closed()).await;
    let snapshot = alice.snapshot().await;
    assert_eq!(snapshot.phase, NegotiationPhase::Idle);
    assert!(!snapshot.local_media_live);
}
