use crate::domain::{IceCandidate, IceServer, MediaHandle, PeerId, SessionDescription};
use crate::infrastructure::error::Result;
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Connection state reported by the media transport
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransportState {
    Connecting,
    Connected,
    Disconnected,
    Failed,
    Closed,
}

impl fmt::Display for TransportState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            TransportState::Connecting => "connecting",
            TransportState::Connected => "connected",
            TransportState::Disconnected => "disconnected",
            TransportState::Failed => "failed",
            TransportState::Closed => "closed",
        };
        f.write_str(label)
    }
}

/// Things the media transport reports asynchronously
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MediaEvent {
    /// A local network path was discovered and should be signaled to the peer
    CandidateGathered {
        peer: PeerId,
        handle: MediaHandle,
        candidate: IceCandidate,
    },
    /// The media path changed state
    StateChanged {
        peer: PeerId,
        handle: MediaHandle,
        state: TransportState,
    },
}

impl MediaEvent {
    pub fn peer(&self) -> &PeerId {
        match self {
            MediaEvent::CandidateGathered { peer, .. } | MediaEvent::StateChanged { peer, .. } => {
                peer
            }
        }
    }

    pub fn handle(&self) -> MediaHandle {
        match self {
            MediaEvent::CandidateGathered { handle, .. }
            | MediaEvent::StateChanged { handle, .. } => *handle,
        }
    }
}

/// Capture settings for the local microphone
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AudioConstraints {
    pub echo_cancellation: bool,
    pub noise_suppression: bool,
}

impl Default for AudioConstraints {
    fn default() -> Self {
        Self {
            echo_cancellation: true,
            noise_suppression: true,
        }
    }
}

/// Handle to the local capture, attached read-only to every peer session
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocalMedia {
    pub id: Uuid,
    pub constraints: AudioConstraints,
}

impl LocalMedia {
    pub fn new(constraints: AudioConstraints) -> Self {
        Self {
            id: Uuid::new_v4(),
            constraints,
        }
    }
}

/// Port to the engine that negotiates and carries audio between two participants
///
/// Description generation is synchronous; anything the engine discovers on
/// its own (local candidates, connection-state changes) is surfaced through
/// [`MediaTransport::poll_event`] so it can enter the coordinator's queue.
pub trait MediaTransport {
    fn open_local_media(&mut self, constraints: &AudioConstraints) -> Result<LocalMedia>;
    fn set_local_media_enabled(&mut self, media: &LocalMedia, enabled: bool) -> Result<()>;
    fn release_local_media(&mut self, media: LocalMedia);

    fn create_session(&mut self, peer: &PeerId, ice_servers: &[IceServer]) -> Result<MediaHandle>;
    fn attach_local_media(&mut self, handle: MediaHandle, media: &LocalMedia) -> Result<()>;
    fn create_offer(&mut self, handle: MediaHandle) -> Result<SessionDescription>;
    fn create_answer(&mut self, handle: MediaHandle) -> Result<SessionDescription>;
    fn set_remote_description(
        &mut self,
        handle: MediaHandle,
        description: &SessionDescription,
    ) -> Result<()>;
    fn add_candidate(&mut self, handle: MediaHandle, candidate: &IceCandidate) -> Result<()>;
    fn close_session(&mut self, handle: MediaHandle);

    fn poll_event(&mut self) -> Option<MediaEvent>;
}
