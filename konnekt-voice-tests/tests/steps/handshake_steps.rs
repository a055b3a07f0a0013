use cucumber::{given, then, when};
use konnekt_voice_signaling::{PeerId, SignalKind, TransportState};
use konnekt_voice_tests::{parse_state, RoomWorld};

fn parse_kind(kind: &str) -> SignalKind {
    match kind {
        "offer" => SignalKind::Offer,
        "answer" => SignalKind::Answer,
        "candidate" => SignalKind::Candidate,
        other => panic!("unknown signal kind '{}'", other),
    }
}

fn parse_transport_state(state: &str) -> TransportState {
    serde_json::from_value(serde_json::Value::String(state.to_string()))
        .unwrap_or_else(|_| panic!("unknown transport state '{}'", state))
}

// ===== Given Steps =====

#[given(expr = "{string} and {string} are in the room")]
async fn two_in_room(world: &mut RoomWorld, first: String, second: String) {
    world.join(&first);
    world.join(&second);
}

#[given(expr = "{string} and {string} are connected")]
async fn two_connected(world: &mut RoomWorld, first: String, second: String) {
    world.join(&first);
    world.join(&second);
    world.initiate(&first, &second);
    world.settle();

    report_state(world, &first, &second, TransportState::Connected);
    report_state(world, &second, &first, TransportState::Connected);

    assert_eq!(world.state(&first, &second), Some(parse_state("connected")));
    assert_eq!(world.state(&second, &first), Some(parse_state("connected")));
}

// ===== When Steps =====

#[when(expr = "{string} initiates a session with {string}")]
async fn initiates(world: &mut RoomWorld, name: String, other: String) {
    world.initiate(&name, &other);
}

#[when(expr = "{string} processes its inbox")]
async fn processes_inbox(world: &mut RoomWorld, name: String) {
    world.intercept(&name);
    world.deliver_held(&name, false);
    world.poll(&name);
}

#[when("the room settles")]
async fn room_settles(world: &mut RoomWorld) {
    world.settle();
}

#[when(expr = "the media transport of {string} reports {string} for {string}")]
async fn transport_reports(world: &mut RoomWorld, name: String, state: String, other: String) {
    report_state(world, &name, &other, parse_transport_state(&state));
}

fn report_state(world: &mut RoomWorld, name: &str, other: &str, state: TransportState) {
    world
        .participant(name)
        .media
        .report_peer_state(&PeerId::from(other), state);
    world.poll(name);
}

// ===== Then Steps =====

#[then(expr = "{string} should see {string} as {string}")]
async fn should_see_as(world: &mut RoomWorld, name: String, other: String, state: String) {
    assert_eq!(
        world.state(&name, &other),
        Some(parse_state(&state)),
        "{} sees {} in the wrong state",
        name,
        other
    );
}

#[then(expr = "{string} should have {int} {word} waiting from {string}")]
async fn should_have_waiting(
    world: &mut RoomWorld,
    name: String,
    count: usize,
    kind: String,
    sender: String,
) {
    world.intercept(&name);
    let kind = parse_kind(kind.trim_end_matches('s'));
    let receiver = PeerId::from(name.as_str());
    let sender = PeerId::from(sender.as_str());
    let waiting = world
        .held
        .iter()
        .filter(|envelope| envelope.receiver == receiver && envelope.sender == sender)
        .filter(|envelope| envelope.kind() == kind)
        .count();
    assert_eq!(waiting, count);
}

#[then(expr = "{string} should have emitted {int} {string} event(s) for {string}")]
async fn should_have_emitted(
    world: &mut RoomWorld,
    name: String,
    count: usize,
    kind: String,
    other: String,
) {
    assert_eq!(world.count_events(&name, &other, &kind), count);
}
