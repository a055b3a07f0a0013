use cucumber::{then, when};
use konnekt_voice_signaling::PeerId;
use konnekt_voice_tests::RoomWorld;

#[when(expr = "{string} closes the session with {string}")]
async fn closes_session(world: &mut RoomWorld, name: String, other: String) {
    let participant = world.participant_mut(&name);
    assert!(participant.coordinator.close(&PeerId::from(other.as_str())));
    let events = participant.coordinator.drain_events();
    participant.events.extend(events);
}

#[when(expr = "{string} leaves the room")]
async fn leaves_room(world: &mut RoomWorld, name: String) {
    let participant = world.participant_mut(&name);
    participant.coordinator.shutdown();
    let events = participant.coordinator.drain_events();
    participant.events.extend(events);
}

#[when("the relay traffic is marked")]
async fn mark_traffic(world: &mut RoomWorld) {
    world.mark_traffic();
}

#[then(expr = "{string} should have no session for {string}")]
async fn no_session(world: &mut RoomWorld, name: String, other: String) {
    assert_eq!(world.state(&name, &other), None);
}

#[then(expr = "{string} should have {int} live session(s)")]
async fn live_sessions(world: &mut RoomWorld, name: String, count: usize) {
    assert_eq!(
        world.participant(&name).coordinator.live_session_count(),
        count
    );
}

#[then(expr = "{string} should have {int} open media session(s)")]
async fn open_media_sessions(world: &mut RoomWorld, name: String, count: usize) {
    assert_eq!(world.participant(&name).media.open_sessions(), count);
}

#[then("no signal should have been relayed since the mark")]
async fn no_traffic(world: &mut RoomWorld) {
    assert_eq!(world.traffic_since_mark(), 0);
}

#[then(expr = "{string} should have released its microphone")]
async fn released_microphone(world: &mut RoomWorld, name: String) {
    let participant = world.participant(&name);
    assert!(!participant.coordinator.has_local_media());
    assert_eq!(participant.media.local_media_enabled(), None);
}
