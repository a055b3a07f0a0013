use cucumber::then;
use konnekt_voice_signaling::domain::MediaHandle;
use konnekt_voice_signaling::infrastructure::MediaCall;
use konnekt_voice_signaling::PeerId;
use konnekt_voice_tests::{parse_state, RoomWorld};

fn negotiated_handle(world: &RoomWorld, name: &str, other: &str) -> MediaHandle {
    assert_eq!(world.state(name, other), Some(parse_state("negotiating")));
    world
        .participant(name)
        .coordinator
        .media_handle(&PeerId::from(other))
        .expect("negotiating session owns a media handle")
}

#[then(expr = "{string} should have negotiated {string} with its own offer")]
async fn negotiated_own_offer(world: &mut RoomWorld, name: String, other: String) {
    let handle = negotiated_handle(world, &name, &other);
    let calls = world.media_calls(&name);

    assert!(calls.contains(&MediaCall::CreateOffer(handle)));
    assert!(!calls.contains(&MediaCall::CreateAnswer(handle)));
}

#[then(expr = "{string} should have negotiated {string} with the received offer")]
async fn negotiated_received_offer(world: &mut RoomWorld, name: String, other: String) {
    let handle = negotiated_handle(world, &name, &other);
    let calls = world.media_calls(&name);

    assert!(calls.contains(&MediaCall::CreateAnswer(handle)));
    assert!(!calls.contains(&MediaCall::CreateOffer(handle)));
}
