mod support;

use konnekt_voice_signaling::infrastructure::MediaCall;
use konnekt_voice_signaling::{
    CoordinatorConfig, DiscardReason, IceCandidate, PeerId, RoomId, SessionState, SignalEnvelope,
    SignalKind, SignalOutcome, SignalPayload, Timestamp,
};
use std::time::Duration;
use support::{peer, ManualPeer};

fn envelope(from: &str, to: &str, payload: SignalPayload) -> SignalEnvelope {
    SignalEnvelope::new(
        peer(from),
        peer(to),
        RoomId::default(),
        payload,
        Duration::from_secs(60),
    )
}

fn offer(from: &str, to: &str) -> SignalEnvelope {
    envelope(
        from,
        to,
        SignalPayload::Offer {
            sdp: "v=0 offer".to_string(),
        },
    )
}

fn candidate(from: &str, to: &str, n: u32) -> SignalEnvelope {
    envelope(
        from,
        to,
        SignalPayload::Candidate {
            candidate: IceCandidate::new(format!("candidate:{} 1 udp 1 198.51.100.{} 5000 typ host", n, n)),
        },
    )
}

/// Positions of set-remote-description and add-candidate calls in the log
fn call_positions(calls: &[MediaCall]) -> (Option<usize>, Vec<usize>) {
    let remote = calls
        .iter()
        .position(|call| matches!(call, MediaCall::SetRemoteDescription { .. }));
    let candidates = calls
        .iter()
        .enumerate()
        .filter(|(_, call)| matches!(call, MediaCall::AddCandidate { .. }))
        .map(|(i, _)| i)
        .collect();
    (remote, candidates)
}

/// Heap's algorithm
fn permutations<T: Clone>(items: &[T]) -> Vec<Vec<T>> {
    fn generate<T: Clone>(k: usize, items: &mut Vec<T>, out: &mut Vec<Vec<T>>) {
        if k <= 1 {
            out.push(items.clone());
            return;
        }
        generate(k - 1, items, out);
        for i in 0..k - 1 {
            if k % 2 == 0 {
                items.swap(i, k - 1);
            } else {
                items.swap(0, k - 1);
            }
            generate(k - 1, items, out);
        }
    }

    let mut items = items.to_vec();
    let mut out = Vec::new();
    generate(items.len(), &mut items, &mut out);
    out
}

#[test]
fn test_candidates_before_offer_are_applied_after_it() {
    let mut bob = ManualPeer::new("bob");

    for envelope in [candidate("alice", "bob", 1), candidate("alice", "bob", 2), offer("alice", "bob")] {
        bob.coordinator.on_message(envelope);
    }

    let (remote, candidates) = call_positions(&bob.media.calls());
    let remote = remote.unwrap();
    assert_eq!(candidates.len(), 2);
    assert!(candidates.iter().all(|i| *i > remote));
    assert_eq!(
        bob.coordinator.session_state(&peer("alice")),
        Some(SessionState::Negotiating)
    );
}

#[test]
fn test_candidates_before_answer_are_applied_after_it() {
    let mut alice = ManualPeer::new("alice");
    alice.coordinator.initiate(peer("bob")).unwrap();

    assert_eq!(
        alice.coordinator.on_message(candidate("bob", "alice", 1)),
        SignalOutcome::Buffered
    );
    assert_eq!(alice.coordinator.pending_candidate_count(&peer("bob")), 1);

    let answer = envelope(
        "bob",
        "alice",
        SignalPayload::Answer {
            sdp: "v=0 answer".to_string(),
        },
    );
    assert!(alice.coordinator.on_message(answer).is_applied());
    assert_eq!(alice.coordinator.pending_candidate_count(&peer("bob")), 0);

    // once the description is in, candidates go straight through
    assert_eq!(
        alice.coordinator.on_message(candidate("bob", "alice", 2)),
        SignalOutcome::Applied
    );
    let (remote, candidates) = call_positions(&alice.media.calls());
    assert_eq!(candidates.len(), 2);
    assert!(candidates.iter().all(|i| *i > remote.unwrap()));
}

#[test]
fn test_every_arrival_order_reaches_the_same_outcome() {
    let first = candidate("alice", "bob", 1);
    let second = candidate("alice", "bob", 2);
    let offer = offer("alice", "bob");
    let inputs = vec![first, second, offer.clone(), offer];

    for order in permutations(&inputs) {
        let mut bob = ManualPeer::new("bob");
        for envelope in order {
            bob.coordinator.on_message(envelope);
            assert!(bob.coordinator.live_session_count() <= 1);
        }

        assert_eq!(
            bob.coordinator.session_state(&peer("alice")),
            Some(SessionState::Negotiating)
        );
        let (remote, candidates) = call_positions(&bob.media.calls());
        assert_eq!(candidates.len(), 2);
        assert!(candidates.iter().all(|i| *i > remote.unwrap()));
        assert_eq!(
            bob.signal
                .take_sent()
                .iter()
                .filter(|e| e.kind() == SignalKind::Answer)
                .count(),
            1
        );
    }
}

#[test]
fn test_duplicate_answer_is_noop() {
    let mut alice = ManualPeer::new("alice");
    let mut bob = ManualPeer::new("bob");
    alice.coordinator.initiate(peer("bob")).unwrap();
    for envelope in alice.signal.take_sent() {
        bob.coordinator.on_message(envelope);
    }
    let answer = bob.signal.take_sent().remove(0);

    assert!(alice.coordinator.on_message(answer.clone()).is_applied());
    let calls_after_first = alice.media.calls().len();
    let events_after_first = alice.coordinator.drain_events();

    // redelivered as-is, and re-sent with a fresh id
    assert_eq!(
        alice.coordinator.on_message(answer.clone()),
        SignalOutcome::Discarded(DiscardReason::Duplicate)
    );
    let resent = envelope("bob", "alice", answer.payload.clone());
    assert_eq!(
        alice.coordinator.on_message(resent),
        SignalOutcome::Discarded(DiscardReason::Unexpected)
    );

    assert_eq!(
        alice.coordinator.session_state(&peer("bob")),
        Some(SessionState::Negotiating)
    );
    assert_eq!(alice.media.calls().len(), calls_after_first);
    assert!(alice.coordinator.drain_events().is_empty());
    assert!(!events_after_first.is_empty());
}

#[test]
fn test_expired_envelopes_are_never_applied() {
    let past = Timestamp::now().as_millis() - 120_000;
    let expired = |env: SignalEnvelope| {
        env.with_window(
            Timestamp::from_millis(past),
            Timestamp::from_millis(past + 60_000),
        )
    };

    let mut bob = ManualPeer::new("bob");
    bob.coordinator.initiate(peer("carol")).unwrap();
    let baseline = bob.media.calls().len();

    let stale = [
        expired(offer("alice", "bob")),
        expired(envelope(
            "carol",
            "bob",
            SignalPayload::Answer {
                sdp: "v=0".to_string(),
            },
        )),
        expired(candidate("alice", "bob", 1)),
    ];
    for envelope in stale {
        assert_eq!(
            bob.coordinator.on_message(envelope),
            SignalOutcome::Discarded(DiscardReason::Stale)
        );
    }

    assert_eq!(bob.media.calls().len(), baseline);
    assert!(bob.coordinator.session_state(&peer("alice")).is_none());
    assert_eq!(
        bob.coordinator.session_state(&peer("carol")),
        Some(SessionState::Offering)
    );
}

#[test]
fn test_inverted_window_is_stale() {
    let mut bob = ManualPeer::new("bob");
    let now = Timestamp::now().as_millis();
    let env = offer("alice", "bob").with_window(
        Timestamp::from_millis(now + 10_000),
        Timestamp::from_millis(now + 5_000),
    );

    assert_eq!(
        bob.coordinator.on_message(env),
        SignalOutcome::Discarded(DiscardReason::Stale)
    );
}

#[test]
fn test_idle_placeholder_is_collected() {
    let config = CoordinatorConfig::default().with_idle_timeout(Duration::from_millis(20));
    let media = konnekt_voice_signaling::SimulatedMedia::new();
    let signal = support::manual_signal::ManualSignal::new();
    let mut bob = konnekt_voice_signaling::CoordinatorBuilder::new(PeerId::from("bob"))
        .config(config)
        .join(signal, media)
        .unwrap();

    bob.on_message(candidate("alice", "bob", 1));
    assert_eq!(bob.session_state(&peer("alice")), Some(SessionState::Idle));

    std::thread::sleep(Duration::from_millis(40));
    assert_eq!(bob.sweep_stale(), 1);
    assert!(bob.session_state(&peer("alice")).is_none());
    assert!(bob.drain_events().is_empty());
}
