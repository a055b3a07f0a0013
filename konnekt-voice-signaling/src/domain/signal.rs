use crate::domain::{PeerId, RoomId, Timestamp};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;
use uuid::Uuid;

/// Kind of a signaling message (closed set)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum SignalKind {
    Offer,
    Answer,
    Candidate,
}

impl fmt::Display for SignalKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SignalKind::Offer => write!(f, "offer"),
            SignalKind::Answer => write!(f, "answer"),
            SignalKind::Candidate => write!(f, "candidate"),
        }
    }
}

/// Which half of the description exchange an SDP blob is
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum SdpKind {
    Offer,
    Answer,
}

/// Session description produced or consumed by the media transport
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct SessionDescription {
    pub kind: SdpKind,
    pub sdp: String,
}

impl SessionDescription {
    pub fn offer(sdp: impl Into<String>) -> Self {
        Self {
            kind: SdpKind::Offer,
            sdp: sdp.into(),
        }
    }

    pub fn answer(sdp: impl Into<String>) -> Self {
        Self {
            kind: SdpKind::Answer,
            sdp: sdp.into(),
        }
    }
}

/// One discovered network path, shaped like the browser's `RTCIceCandidateInit`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct IceCandidate {
    pub candidate: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sdp_mid: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sdp_m_line_index: Option<u16>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username_fragment: Option<String>,
}

impl IceCandidate {
    pub fn new(candidate: impl Into<String>) -> Self {
        Self {
            candidate: candidate.into(),
            sdp_mid: Some("0".to_string()),
            sdp_m_line_index: Some(0),
            username_fragment: None,
        }
    }
}

/// Handshake payload, tagged by message type
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(tag = "type", content = "payload", rename_all = "snake_case")]
pub enum SignalPayload {
    Offer { sdp: String },
    Answer { sdp: String },
    Candidate { candidate: IceCandidate },
}

impl SignalPayload {
    pub fn kind(&self) -> SignalKind {
        match self {
            SignalPayload::Offer { .. } => SignalKind::Offer,
            SignalPayload::Answer { .. } => SignalKind::Answer,
            SignalPayload::Candidate { .. } => SignalKind::Candidate,
        }
    }
}

impl From<SessionDescription> for SignalPayload {
    fn from(description: SessionDescription) -> Self {
        match description.kind {
            SdpKind::Offer => SignalPayload::Offer {
                sdp: description.sdp,
            },
            SdpKind::Answer => SignalPayload::Answer {
                sdp: description.sdp,
            },
        }
    }
}

/// A message relayed through the signaling channel. Never mutated after creation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct SignalEnvelope {
    /// Unique per envelope; duplicates of the same delivery share it
    pub id: Uuid,
    pub sender: PeerId,
    pub receiver: PeerId,
    pub room: RoomId,
    pub sent_at: Timestamp,
    pub expires_at: Timestamp,

    #[serde(flatten)]
    pub payload: SignalPayload,
}

impl SignalEnvelope {
    /// Stamp a new envelope that stays valid for `ttl`
    pub fn new(
        sender: PeerId,
        receiver: PeerId,
        room: RoomId,
        payload: SignalPayload,
        ttl: Duration,
    ) -> Self {
        let sent_at = Timestamp::now();
        Self {
            id: Uuid::new_v4(),
            sender,
            receiver,
            room,
            sent_at,
            expires_at: sent_at.saturating_add(ttl),
            payload,
        }
    }

    /// Override the validity window (replays, tests)
    pub fn with_window(mut self, sent_at: Timestamp, expires_at: Timestamp) -> Self {
        self.sent_at = sent_at;
        self.expires_at = expires_at;
        self
    }

    pub fn kind(&self) -> SignalKind {
        self.payload.kind()
    }

    /// Stale envelopes are never applied: either the window is empty or it has passed
    pub fn is_stale_at(&self, now: Timestamp) -> bool {
        self.sent_at >= self.expires_at || now >= self.expires_at
    }
}
