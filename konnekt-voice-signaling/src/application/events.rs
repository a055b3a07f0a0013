use crate::domain::{PeerId, SessionState, SignalEnvelope};
use crate::infrastructure::media_transport::MediaEvent;
use serde::Serialize;

/// Notifications for whoever renders the room
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum RoomEvent {
    /// Audio path to the peer is up
    MembershipAdded { peer: PeerId },
    /// Peer is gone (closed, failed or timed out)
    MembershipRemoved { peer: PeerId },
    SessionStateChanged { peer: PeerId, state: SessionState },
}

impl RoomEvent {
    pub fn peer(&self) -> &PeerId {
        match self {
            RoomEvent::MembershipAdded { peer }
            | RoomEvent::MembershipRemoved { peer }
            | RoomEvent::SessionStateChanged { peer, .. } => peer,
        }
    }
}

/// Anything that may mutate the session table, serialized through one queue
#[derive(Debug, Clone)]
pub enum CoordinatorInput {
    Signal(SignalEnvelope),
    Media(MediaEvent),
}

impl From<SignalEnvelope> for CoordinatorInput {
    fn from(envelope: SignalEnvelope) -> Self {
        CoordinatorInput::Signal(envelope)
    }
}

impl From<MediaEvent> for CoordinatorInput {
    fn from(event: MediaEvent) -> Self {
        CoordinatorInput::Media(event)
    }
}

/// Why an inbound envelope was not applied
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DiscardReason {
    /// Coordinator already shut down
    ShutDown,
    /// Wrong receiver or room
    Misaddressed,
    Stale,
    /// Same envelope id seen before
    Duplicate,
    /// Incoming offer lost the glare tie-break
    GlareIgnored,
    /// Offer for a peer that is already negotiating or connected
    SessionActive,
    /// Answer with no matching offer
    Unexpected,
    /// Media transport rejected a description
    HandshakeFailed,
}

/// What `on_message` did with an envelope
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", content = "reason", rename_all = "snake_case")]
pub enum SignalOutcome {
    Applied,
    /// Candidate held until the remote description exists
    Buffered,
    Discarded(DiscardReason),
}

impl SignalOutcome {
    pub fn is_applied(&self) -> bool {
        matches!(self, SignalOutcome::Applied)
    }
}
