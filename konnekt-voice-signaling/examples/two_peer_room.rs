use konnekt_voice_signaling::{
    CoordinatorBuilder, PeerId, RoomEvent, RoomId, RoomRuntime, SignalRelay, SimulatedMedia,
};
use std::time::Duration;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt::init();

    let relay = SignalRelay::new();
    let room = RoomId::new("standup");

    let alice = CoordinatorBuilder::new(PeerId::from("alice"))
        .room(room.clone())
        .join_relay(&relay, SimulatedMedia::new().with_auto_connect())?;
    let bob = CoordinatorBuilder::new(PeerId::from("bob"))
        .room(room.clone())
        .join_relay(&relay, SimulatedMedia::new().with_auto_connect())?;

    let alice = RoomRuntime::spawn(alice);
    let bob = RoomRuntime::spawn(bob);
    let mut alice_events = alice.events();
    let mut bob_events = bob.events();

    println!("📞 alice calls bob in room {}", room);
    alice.initiate(PeerId::from("bob")).await?;

    let wait = async {
        let mut joined = 0;
        while joined < 2 {
            tokio::select! {
                Ok(event) = alice_events.recv() => {
                    println!("   alice: {:?}", event);
                    joined += usize::from(matches!(event, RoomEvent::MembershipAdded { .. }));
                }
                Ok(event) = bob_events.recv() => {
                    println!("   bob:   {:?}", event);
                    joined += usize::from(matches!(event, RoomEvent::MembershipAdded { .. }));
                }
                else => break,
            }
        }
    };
    tokio::time::timeout(Duration::from_secs(5), wait).await?;

    println!(
        "✅ alice sees {} peer(s), bob sees {} peer(s)",
        alice.snapshot().peer_count(),
        bob.snapshot().peer_count()
    );

    alice.shutdown().await;
    bob.shutdown().await;
    Ok(())
}
