use cucumber::{given, then, when};
use konnekt_voice_signaling::infrastructure::MediaCall;
use konnekt_voice_signaling::{SignalOutcome, Timestamp};
use konnekt_voice_tests::RoomWorld;

fn outcome_label(outcome: &SignalOutcome) -> String {
    let value = serde_json::to_value(outcome).expect("outcome serializes");
    match value["reason"].as_str() {
        Some(reason) => format!("discarded as {}", reason),
        None => value["outcome"].as_str().unwrap_or_default().to_string(),
    }
}

// ===== Given Steps =====

#[given(expr = "{string} has queued a(n) {string} for {string}")]
async fn has_queued(world: &mut RoomWorld, from: String, kind: String, to: String) {
    let envelope = world.craft(&from, &to, &kind);
    world.held.push(envelope);
}

#[given(expr = "{string} has queued an expired {string} for {string}")]
async fn has_queued_expired(world: &mut RoomWorld, from: String, kind: String, to: String) {
    let now = Timestamp::now().as_millis();
    let envelope = world.craft(&from, &to, &kind).with_window(
        Timestamp::from_millis(now - 120_000),
        Timestamp::from_millis(now - 60_000),
    );
    world.held.push(envelope);
}

// ===== When Steps =====

#[when(expr = "{string} receives the queued envelopes")]
async fn receives_queued(world: &mut RoomWorld, name: String) {
    world.deliver_held(&name, false);
}

#[when(expr = "{string} receives its inbox in reverse order")]
async fn receives_reversed(world: &mut RoomWorld, name: String) {
    world.intercept(&name);
    world.deliver_held(&name, true);
}

#[when(expr = "{string} receives its inbox twice")]
async fn receives_twice(world: &mut RoomWorld, name: String) {
    world.intercept(&name);
    let copies = world.held.clone();
    world.deliver_held(&name, false);
    let first_round = std::mem::take(&mut world.outcomes);

    world.held.extend(copies);
    world.deliver_held(&name, false);
    let second_round = std::mem::take(&mut world.outcomes);

    world.outcomes = first_round.into_iter().chain(second_round).collect();
}

#[when(expr = "{string} sends {string} a late {string}")]
async fn sends_late(world: &mut RoomWorld, from: String, to: String, kind: String) {
    let envelope = world.craft(&from, &to, &kind);
    world.deliver(envelope);
}

// ===== Then Steps =====

#[then(expr = "the delivery should be {string}")]
async fn delivery_should_be(world: &mut RoomWorld, expected: String) {
    assert_eq!(world.outcomes.len(), 1, "expected a single delivery");
    assert_eq!(outcome_label(&world.outcomes[0]), expected);
}

#[then(expr = "the delivery should be discarded as {string}")]
async fn delivery_discarded_as(world: &mut RoomWorld, reason: String) {
    assert_eq!(world.outcomes.len(), 1, "expected a single delivery");
    assert_eq!(
        outcome_label(&world.outcomes[0]),
        format!("discarded as {}", reason)
    );
}

#[then(expr = "the deliveries should be {string}")]
async fn deliveries_should_be(world: &mut RoomWorld, expected: String) {
    let labels: Vec<String> = world.outcomes.iter().map(outcome_label).collect();
    let expected: Vec<&str> = expected.split(", ").collect();
    assert_eq!(labels, expected);
}

#[then(expr = "every repeated delivery should be discarded as {string}")]
async fn repeats_discarded(world: &mut RoomWorld, reason: String) {
    let half = world.outcomes.len() / 2;
    assert!(half > 0, "nothing was delivered");
    for outcome in &world.outcomes[half..] {
        assert_eq!(outcome_label(outcome), format!("discarded as {}", reason));
    }
}

#[then(
    expr = "the media transport of {string} should have applied {int} candidate(s) after the remote description"
)]
async fn candidates_after_description(world: &mut RoomWorld, name: String, count: usize) {
    let calls = world.media_calls(&name);
    let remote = calls
        .iter()
        .position(|call| matches!(call, MediaCall::SetRemoteDescription { .. }))
        .expect("remote description was never applied");
    let positions: Vec<usize> = calls
        .iter()
        .enumerate()
        .filter(|(_, call)| matches!(call, MediaCall::AddCandidate { .. }))
        .map(|(i, _)| i)
        .collect();

    assert_eq!(positions.len(), count);
    assert!(positions.iter().all(|i| *i > remote));
}

#[then(expr = "the media transport of {string} should have applied {int} remote description(s)")]
async fn remote_descriptions(world: &mut RoomWorld, name: String, count: usize) {
    let applied = world
        .media_calls(&name)
        .iter()
        .filter(|call| matches!(call, MediaCall::SetRemoteDescription { .. }))
        .count();
    assert_eq!(applied, count);
}

#[then(expr = "the media transport of {string} should not have been touched")]
async fn media_untouched(world: &mut RoomWorld, name: String) {
    let session_calls: Vec<MediaCall> = world
        .media_calls(&name)
        .into_iter()
        .filter(|call| !matches!(call, MediaCall::OpenLocalMedia))
        .collect();
    assert!(session_calls.is_empty(), "unexpected calls: {:?}", session_calls);
}
