use cucumber::World;
use konnekt_voice_signaling::infrastructure::MediaCall;
use konnekt_voice_signaling::{
    CoordinatorBuilder, CoordinatorConfig, IceCandidate, PeerId, RelaySignalTransport, RoomEvent,
    RoomId, SessionState, SignalEnvelope, SignalOutcome, SignalPayload, SignalRelay,
    SignalTransport, SignalingCoordinator, SimulatedMedia,
};
use std::collections::BTreeMap;
use std::fmt;
use std::time::Duration;

pub type RoomCoordinator = SignalingCoordinator<RelaySignalTransport, SimulatedMedia>;

/// One participant of the room under test
pub struct Participant {
    pub coordinator: RoomCoordinator,
    pub media: SimulatedMedia,
    /// Every room event emitted so far
    pub events: Vec<RoomEvent>,
}

impl Participant {
    fn collect_events(&mut self) {
        let events = self.coordinator.drain_events();
        self.events.extend(events);
    }
}

#[derive(World)]
#[world(init = Self::new)]
pub struct RoomWorld {
    pub relay: SignalRelay,
    pub config: CoordinatorConfig,
    pub participants: BTreeMap<String, Participant>,

    /// Envelopes pulled out of inboxes (or crafted) for manual delivery
    pub held: Vec<SignalEnvelope>,

    /// Outcomes of the last manual delivery, in delivery order
    pub outcomes: Vec<SignalOutcome>,

    pub last_error: Option<String>,

    /// Relay traffic counter at the last mark
    pub routed_mark: u64,
}

impl fmt::Debug for RoomWorld {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let states: BTreeMap<&str, Vec<(PeerId, SessionState)>> = self
            .participants
            .iter()
            .map(|(name, p)| (name.as_str(), p.coordinator.peer_states()))
            .collect();
        f.debug_struct("RoomWorld")
            .field("room", &self.config.room)
            .field("states", &states)
            .field("held", &self.held.len())
            .field("outcomes", &self.outcomes)
            .field("last_error", &self.last_error)
            .finish()
    }
}

impl RoomWorld {
    pub fn new() -> Self {
        Self {
            relay: SignalRelay::new(),
            config: CoordinatorConfig::default(),
            participants: BTreeMap::new(),
            held: Vec::new(),
            outcomes: Vec::new(),
            last_error: None,
            routed_mark: 0,
        }
    }

    /// Subscribe a participant to the relay with its own simulated media
    pub fn join(&mut self, name: &str) {
        let media = SimulatedMedia::new();
        let coordinator = CoordinatorBuilder::new(PeerId::from(name))
            .config(self.config.clone())
            .join_relay(&self.relay, media.clone())
            .expect("participant should join");
        self.participants.insert(
            name.to_string(),
            Participant {
                coordinator,
                media,
                events: Vec::new(),
            },
        );
    }

    pub fn participant(&self, name: &str) -> &Participant {
        self.participants
            .get(name)
            .unwrap_or_else(|| panic!("Participant '{}' not found", name))
    }

    pub fn participant_mut(&mut self, name: &str) -> &mut Participant {
        self.participants
            .get_mut(name)
            .unwrap_or_else(|| panic!("Participant '{}' not found", name))
    }

    pub fn initiate(&mut self, name: &str, other: &str) {
        let participant = self.participant_mut(name);
        let result = participant.coordinator.initiate(PeerId::from(other));
        participant.collect_events();
        self.last_error = result.err().map(|e| e.to_string());
    }

    /// Let one participant process its inbox
    pub fn poll(&mut self, name: &str) {
        let participant = self.participant_mut(name);
        participant.coordinator.poll();
        participant.collect_events();
    }

    /// Poll everyone in name order until the relay goes quiet
    pub fn settle(&mut self) {
        for _ in 0..10 {
            let before = self.relay.routed();
            let names: Vec<String> = self.participants.keys().cloned().collect();
            for name in &names {
                self.poll(name);
            }
            if self.relay.routed() == before {
                break;
            }
        }
    }

    /// Move everything waiting in `name`'s inbox into `held`
    pub fn intercept(&mut self, name: &str) {
        let participant = self.participant_mut(name);
        let mut taken = Vec::new();
        while let Some(envelope) = participant.coordinator.signal_mut().try_recv() {
            taken.push(envelope);
        }
        self.held.extend(taken);
    }

    /// Hand every held envelope addressed to `name` to its coordinator
    pub fn deliver_held(&mut self, name: &str, reverse: bool) {
        let receiver = PeerId::from(name);
        let (mut mine, rest): (Vec<_>, Vec<_>) = std::mem::take(&mut self.held)
            .into_iter()
            .partition(|envelope| envelope.receiver == receiver);
        self.held = rest;
        if reverse {
            mine.reverse();
        }

        let participant = self.participant_mut(name);
        let outcomes: Vec<SignalOutcome> = mine
            .into_iter()
            .map(|envelope| participant.coordinator.on_message(envelope))
            .collect();
        participant.collect_events();
        self.outcomes = outcomes;
    }

    /// Deliver one envelope directly, bypassing the relay
    pub fn deliver(&mut self, envelope: SignalEnvelope) -> SignalOutcome {
        let name = envelope.receiver.to_string();
        let participant = self.participant_mut(&name);
        let outcome = participant.coordinator.on_message(envelope);
        participant.collect_events();
        self.outcomes = vec![outcome];
        outcome
    }

    pub fn craft(&self, from: &str, to: &str, kind: &str) -> SignalEnvelope {
        let payload = match kind {
            "offer" => SignalPayload::Offer {
                sdp: format!("v=0 offer from {}", from),
            },
            "answer" => SignalPayload::Answer {
                sdp: format!("v=0 answer from {}", from),
            },
            "candidate" => SignalPayload::Candidate {
                candidate: IceCandidate::new(format!(
                    "candidate:{} 1 udp 2122260223 192.0.2.{} 54400 typ host",
                    self.held.len() + 1,
                    self.held.len() + 10
                )),
            },
            other => panic!("unknown signal kind '{}'", other),
        };
        SignalEnvelope::new(
            PeerId::from(from),
            PeerId::from(to),
            RoomId::default(),
            payload,
            Duration::from_secs(60),
        )
    }

    pub fn state(&self, name: &str, other: &str) -> Option<SessionState> {
        self.participant(name)
            .coordinator
            .session_state(&PeerId::from(other))
    }

    pub fn count_events(&self, name: &str, other: &str, kind: &str) -> usize {
        let other = PeerId::from(other);
        self.participant(name)
            .events
            .iter()
            .filter(|event| event.peer() == &other)
            .filter(|event| match (kind, event) {
                ("membership-added", RoomEvent::MembershipAdded { .. }) => true,
                ("membership-removed", RoomEvent::MembershipRemoved { .. }) => true,
                ("state-changed", RoomEvent::SessionStateChanged { .. }) => true,
                _ => false,
            })
            .count()
    }

    pub fn media_calls(&self, name: &str) -> Vec<MediaCall> {
        self.participant(name).media.calls()
    }

    pub fn mark_traffic(&mut self) {
        self.routed_mark = self.relay.routed();
    }

    pub fn traffic_since_mark(&self) -> u64 {
        self.relay.routed() - self.routed_mark
    }
}

impl Default for RoomWorld {
    fn default() -> Self {
        Self::new()
    }
}

/// Parse a lower-case state name as used in feature files
pub fn parse_state(name: &str) -> SessionState {
    serde_json::from_value(serde_json::Value::String(name.to_string()))
        .unwrap_or_else(|_| panic!("unknown session state '{}'", name))
}
