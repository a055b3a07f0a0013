#![allow(dead_code)]

pub mod manual_signal;

use konnekt_voice_signaling::domain::SessionState;
use konnekt_voice_signaling::{
    CoordinatorBuilder, CoordinatorConfig, PeerId, RelaySignalTransport, RoomEvent, SignalRelay,
    SignalingCoordinator, SimulatedMedia,
};
use manual_signal::ManualSignal;
use std::collections::BTreeMap;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

pub type RelayCoordinator = SignalingCoordinator<RelaySignalTransport, SimulatedMedia>;
pub type ManualCoordinator = SignalingCoordinator<ManualSignal, SimulatedMedia>;

pub fn init_test_tracing() {
    let _ = tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with(fmt::layer().with_test_writer())
        .try_init();
}

pub fn peer(name: &str) -> PeerId {
    PeerId::from(name)
}

/// One participant wired to the shared relay
pub struct Participant {
    pub coordinator: RelayCoordinator,
    pub media: SimulatedMedia,
    pub events: Vec<RoomEvent>,
}

/// Participants in one room, talking through an in-process relay
pub struct RoomFixture {
    pub relay: SignalRelay,
    participants: BTreeMap<String, Participant>,
}

impl RoomFixture {
    /// Media connects on its own once the handshake completes
    pub fn new(names: &[&str]) -> Self {
        Self::with_config(names, CoordinatorConfig::default())
    }

    pub fn with_config(names: &[&str], config: CoordinatorConfig) -> Self {
        init_test_tracing();
        let relay = SignalRelay::new();
        let mut participants = BTreeMap::new();
        for name in names {
            let media = SimulatedMedia::new().with_auto_connect();
            let coordinator = CoordinatorBuilder::new(peer(name))
                .config(config.clone())
                .join_relay(&relay, media.clone())
                .unwrap();
            participants.insert(
                name.to_string(),
                Participant {
                    coordinator,
                    media,
                    events: Vec::new(),
                },
            );
        }
        Self {
            relay,
            participants,
        }
    }

    pub fn get(&self, name: &str) -> &Participant {
        self.participants
            .get(name)
            .unwrap_or_else(|| panic!("no participant {}", name))
    }

    pub fn get_mut(&mut self, name: &str) -> &mut Participant {
        self.participants
            .get_mut(name)
            .unwrap_or_else(|| panic!("no participant {}", name))
    }

    pub fn coordinator(&mut self, name: &str) -> &mut RelayCoordinator {
        &mut self.get_mut(name).coordinator
    }

    pub fn state(&self, name: &str, other: &str) -> Option<SessionState> {
        self.get(name).coordinator.session_state(&peer(other))
    }

    pub fn events(&self, name: &str) -> &[RoomEvent] {
        &self.get(name).events
    }

    pub fn count_events(&self, name: &str, wanted: impl Fn(&RoomEvent) -> bool) -> usize {
        self.get(name).events.iter().filter(|event| wanted(event)).count()
    }

    /// Poll every participant once (in name order); returns inputs processed
    pub fn tick(&mut self) -> usize {
        let mut processed = 0;
        for participant in self.participants.values_mut() {
            processed += participant.coordinator.poll();
            participant
                .events
                .extend(participant.coordinator.drain_events());
        }
        processed
    }

    /// Tick until nothing moves for a few rounds
    pub fn run_until_idle(&mut self, max_ticks: usize) -> usize {
        let mut quiet = 0;
        for i in 0..max_ticks {
            if self.tick() == 0 {
                quiet += 1;
                if quiet >= 3 {
                    return i + 1;
                }
            } else {
                quiet = 0;
            }
        }
        tracing::warn!("⚠️ Room did not settle after {} ticks", max_ticks);
        max_ticks
    }
}

/// A participant whose envelopes are delivered by the test
pub struct ManualPeer {
    pub coordinator: ManualCoordinator,
    pub signal: ManualSignal,
    pub media: SimulatedMedia,
}

impl ManualPeer {
    pub fn new(name: &str) -> Self {
        Self::with_media(name, SimulatedMedia::new())
    }

    pub fn with_media(name: &str, media: SimulatedMedia) -> Self {
        init_test_tracing();
        let signal = ManualSignal::new();
        let coordinator = CoordinatorBuilder::new(peer(name))
            .join(signal.clone(), media.clone())
            .unwrap();
        Self {
            coordinator,
            signal,
            media,
        }
    }
}
